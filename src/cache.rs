//! In-memory caching of per-course and per-professor rating metrics.
//! Uses moka for TTL-based caching with LRU eviction.

use crate::orm::reviews;
use crate::rating::{RatingMetrics, Subject};
use moka::sync::Cache;
use sea_orm::{DatabaseConnection, DbErr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Metrics keyed by subject. Every approve, reject, edit and delete of a
/// review must invalidate the subjects it touches.
///
/// `generation` moves on every invalidation. A value computed from a read
/// that started before an invalidation is never left in the cache.
#[derive(Clone)]
pub struct RatingCache {
    metrics: Cache<Subject, RatingMetrics>,
    generation: Arc<AtomicU64>,
}

impl RatingCache {
    pub fn new(ttl: Duration, capacity: u64) -> Self {
        Self {
            metrics: Cache::builder()
                .time_to_live(ttl)
                .max_capacity(capacity)
                .build(),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn get(&self, subject: Subject) -> Option<RatingMetrics> {
        self.metrics.get(&subject)
    }

    /// Get metrics for a subject, using cache if available.
    /// Falls back to database query if cache miss.
    pub async fn get_or_compute(
        &self,
        db: &DatabaseConnection,
        subject: Subject,
    ) -> Result<RatingMetrics, DbErr> {
        Ok(self.get_or_compute_with_status(db, subject).await?.0)
    }

    /// Get metrics for a subject with cache hit status.
    /// Returns (RatingMetrics, was_cache_hit).
    pub async fn get_or_compute_with_status(
        &self,
        db: &DatabaseConnection,
        subject: Subject,
    ) -> Result<(RatingMetrics, bool), DbErr> {
        if let Some(cached) = self.metrics.get(&subject) {
            return Ok((cached, true));
        }

        let seen = self.generation();
        let metrics = crate::moderation::subject_metrics(db, subject).await?;
        self.store(subject, metrics, seen);
        Ok((metrics, false))
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Cache `metrics` computed after observing generation `seen`. If any
    /// invalidation ran since, the entry is dropped again.
    fn store(&self, subject: Subject, metrics: RatingMetrics, seen: u64) {
        self.metrics.insert(subject, metrics);
        if self.generation() != seen {
            self.metrics.invalidate(&subject);
        }
    }

    pub fn invalidate(&self, subject: Subject) {
        // Bump before evicting so a concurrent store sees the change.
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.metrics.invalidate(&subject);
    }

    /// Invalidate every subject a review touches.
    pub fn invalidate_review(&self, review: &reviews::Model) {
        for subject in Subject::of_review(review) {
            self.invalidate(subject);
        }
    }
}

impl Default for RatingCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(60), 10_000)
    }
}

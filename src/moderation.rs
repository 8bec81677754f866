//! Review moderation and platform statistics.

use crate::cache::RatingCache;
use crate::orm::reports::{self, ReportStatus};
use crate::orm::{courses, professors, reviews, users};
use crate::rating::{compute_average_rating, compute_metrics, RatingMetrics, Subject};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, ModelTrait,
    PaginatorTrait, QueryFilter, Set,
};
use serde::{Deserialize, Serialize};

/// Moderation state of a review. Stored as the `is_approved` flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewState {
    Pending,
    Approved,
}

impl ReviewState {
    pub fn of(review: &reviews::Model) -> Self {
        if review.is_approved {
            ReviewState::Approved
        } else {
            ReviewState::Pending
        }
    }

    /// State after an owner or admin edit. Edits always go back to the queue.
    pub fn after_edit(self) -> Self {
        ReviewState::Pending
    }

    /// State after an admin approval. Approving twice changes nothing.
    pub fn after_approve(self) -> Self {
        ReviewState::Approved
    }

    pub fn is_public(self) -> bool {
        self == ReviewState::Approved
    }
}

/// Approve a review. Returns None when it does not exist.
pub async fn approve_review(
    db: &DatabaseConnection,
    cache: &RatingCache,
    review_id: i32,
) -> Result<Option<reviews::Model>, DbErr> {
    let review = match reviews::Entity::find_by_id(review_id).one(db).await? {
        Some(review) => review,
        None => return Ok(None),
    };

    let state = ReviewState::of(&review);
    if state.after_approve() == state {
        return Ok(Some(review));
    }

    let mut active: reviews::ActiveModel = review.into();
    active.is_approved = Set(true);
    active.updated_at = Set(Utc::now().naive_utc());
    let review = active.update(db).await?;

    cache.invalidate_review(&review);
    log::info!("Review {} approved", review.id);
    Ok(Some(review))
}

/// Reject a review by deleting it along with its comments, likes and reports.
/// Nothing of the review is kept. Returns the deleted row, or None when it
/// does not exist.
pub async fn reject_review(
    db: &DatabaseConnection,
    cache: &RatingCache,
    review_id: i32,
) -> Result<Option<reviews::Model>, DbErr> {
    let review = match reviews::Entity::find_by_id(review_id).one(db).await? {
        Some(review) => review,
        None => return Ok(None),
    };

    review.clone().delete(db).await?;
    cache.invalidate_review(&review);
    log::info!("Review {} rejected and deleted", review.id);
    Ok(Some(review))
}

/// Metrics over the approved reviews of one course or professor.
pub async fn subject_metrics(
    db: &DatabaseConnection,
    subject: Subject,
) -> Result<RatingMetrics, DbErr> {
    let query = reviews::Entity::find().filter(reviews::Column::IsApproved.eq(true));
    let query = match subject {
        Subject::Course(id) => query.filter(reviews::Column::CourseId.eq(id)),
        Subject::Professor(id) => query.filter(reviews::Column::ProfessorId.eq(id)),
    };
    let reviews = query.all(db).await?;
    Ok(compute_metrics(&reviews))
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Total {
    pub total: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewStats {
    pub total: u64,
    pub approved: u64,
    pub pending: u64,
    pub average_rating: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReportStats {
    pub total: u64,
    pub pending: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlatformStats {
    pub users: Total,
    pub courses: Total,
    pub professors: Total,
    pub reviews: ReviewStats,
    pub reports: ReportStats,
}

/// Platform-wide counts. The global average scans every approved review.
pub async fn platform_stats(db: &DatabaseConnection) -> Result<PlatformStats, DbErr> {
    let users = users::Entity::find().count(db).await?;
    let courses = courses::Entity::find().count(db).await?;
    let professors = professors::Entity::find().count(db).await?;

    let total_reviews = reviews::Entity::find().count(db).await?;
    let approved = reviews::Entity::find()
        .filter(reviews::Column::IsApproved.eq(true))
        .all(db)
        .await?;

    let total_reports = reports::Entity::find().count(db).await?;
    let pending_reports = reports::Entity::find()
        .filter(reports::Column::Status.eq(ReportStatus::Pending))
        .count(db)
        .await?;

    let approved_count = approved.len() as u64;
    Ok(PlatformStats {
        users: Total { total: users },
        courses: Total { total: courses },
        professors: Total { total: professors },
        reviews: ReviewStats {
            total: total_reviews,
            approved: approved_count,
            pending: total_reviews.saturating_sub(approved_count),
            average_rating: compute_average_rating(&approved),
        },
        reports: ReportStats {
            total: total_reports,
            pending: pending_reports,
        },
    })
}

//! Rating aggregation over approved reviews.

use crate::orm::reviews;
use serde::Serialize;

/// A course or professor that reviews are written about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Subject {
    Course(i32),
    Professor(i32),
}

impl Subject {
    /// Subjects touched by a review.
    pub fn of_review(review: &reviews::Model) -> Vec<Subject> {
        let mut subjects = Vec::with_capacity(2);
        if let Some(id) = review.course_id {
            subjects.push(Subject::Course(id));
        }
        if let Some(id) = review.professor_id {
            subjects.push(Subject::Professor(id));
        }
        subjects
    }
}

/// Anything that carries a review's scores.
pub trait Rated {
    fn rating(&self) -> i32;
    fn difficulty(&self) -> Option<i32>;
    fn workload(&self) -> Option<i32>;
    fn is_approved(&self) -> bool;
}

impl Rated for reviews::Model {
    fn rating(&self) -> i32 {
        self.rating
    }

    fn difficulty(&self) -> Option<i32> {
        self.difficulty
    }

    fn workload(&self) -> Option<i32> {
        self.workload
    }

    fn is_approved(&self) -> bool {
        self.is_approved
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingMetrics {
    pub average_rating: f64,
    pub average_difficulty: f64,
    pub average_workload: f64,
    pub total_reviews: u64,
}

/// Round to one decimal place.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn mean(values: impl Iterator<Item = i32>) -> f64 {
    let (sum, count) = values.fold((0i64, 0u64), |(sum, count), v| (sum + v as i64, count + 1));
    if count == 0 {
        0.0
    } else {
        sum as f64 / count as f64
    }
}

/// Mean rating over approved reviews, rounded to one decimal. Zero when
/// nothing is approved.
pub fn compute_average_rating<R: Rated>(reviews: &[R]) -> f64 {
    round1(mean(
        reviews.iter().filter(|r| r.is_approved()).map(|r| r.rating()),
    ))
}

/// Averages over approved reviews. Difficulty and workload only count the
/// reviews that actually set them.
pub fn compute_metrics<R: Rated>(reviews: &[R]) -> RatingMetrics {
    let approved: Vec<&R> = reviews.iter().filter(|r| r.is_approved()).collect();

    RatingMetrics {
        average_rating: round1(mean(approved.iter().map(|r| r.rating()))),
        average_difficulty: round1(mean(approved.iter().filter_map(|r| r.difficulty()))),
        average_workload: round1(mean(approved.iter().filter_map(|r| r.workload()))),
        total_reviews: approved.len() as u64,
    }
}

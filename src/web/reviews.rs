//! Reviews, likes and comments.

use super::error::ApiError;
use super::pagination::Paging;
use super::query::count_by;
use crate::app_config::AppConfig;
use crate::cache::RatingCache;
use crate::middleware::ClientCtx;
use crate::moderation::ReviewState;
use crate::orm::{comments, courses, likes, professors, reports, reviews, users};
use crate::permission::Action;
use actix_web::{delete, get, post, put, web, HttpResponse};
use chrono::{NaiveDateTime, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    entity::*, query::*, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(list_reviews)
        .service(create_review)
        .service(view_review)
        .service(update_review)
        .service(delete_review)
        .service(toggle_like)
        .service(list_comments)
        .service(create_comment)
        .service(delete_comment);
}

/// Who a review is being rendered for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Audience {
    /// Anonymous authors are masked.
    Public,
    /// Authors are always shown, with email, and report counts are included.
    Admin,
}

/// Review author as shown to readers.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorView {
    pub id: Option<i32>,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl AuthorView {
    pub fn anonymous() -> Self {
        Self {
            id: None,
            first_name: "Anonymous".to_owned(),
            last_name: "User".to_owned(),
            email: None,
        }
    }

    pub fn of(user: &users::Model, with_email: bool) -> Self {
        Self {
            id: Some(user.id),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: with_email.then(|| user.email.clone()),
        }
    }

    fn missing() -> Self {
        Self {
            id: None,
            first_name: "Deleted".to_owned(),
            last_name: "User".to_owned(),
            email: None,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct CourseRef {
    pub id: i32,
    pub code: String,
    pub name: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfessorRef {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct ReviewCounts {
    pub likes: u64,
    pub comments: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reports: Option<u64>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewView {
    pub id: i32,
    pub course_id: Option<i32>,
    pub professor_id: Option<i32>,
    pub rating: i32,
    pub difficulty: Option<i32>,
    pub workload: Option<i32>,
    pub content: String,
    pub is_anonymous: bool,
    pub is_approved: bool,
    pub is_edited: bool,
    pub status: ReviewState,
    pub helpful_count: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub user: AuthorView,
    pub course: Option<CourseRef>,
    pub professor: Option<ProfessorRef>,
    #[serde(rename = "_count")]
    pub count: ReviewCounts,
}

/// Render reviews with their author, targets and counters, batching every
/// lookup.
pub async fn present_reviews(
    db: &DatabaseConnection,
    reviews: Vec<reviews::Model>,
    audience: Audience,
) -> Result<Vec<ReviewView>, DbErr> {
    if reviews.is_empty() {
        return Ok(Vec::new());
    }

    let review_ids: Vec<i32> = reviews.iter().map(|r| r.id).collect();
    let user_ids: Vec<i32> = reviews.iter().map(|r| r.user_id).collect();
    let course_ids: Vec<i32> = reviews.iter().filter_map(|r| r.course_id).collect();
    let professor_ids: Vec<i32> = reviews.iter().filter_map(|r| r.professor_id).collect();

    let authors: HashMap<i32, users::Model> = users::Entity::find()
        .filter(users::Column::Id.is_in(user_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();
    let course_map: HashMap<i32, courses::Model> = if course_ids.is_empty() {
        HashMap::new()
    } else {
        courses::Entity::find()
            .filter(courses::Column::Id.is_in(course_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect()
    };
    let professor_map: HashMap<i32, professors::Model> = if professor_ids.is_empty() {
        HashMap::new()
    } else {
        professors::Entity::find()
            .filter(professors::Column::Id.is_in(professor_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect()
    };

    let like_counts = count_by::<likes::Entity>(db, likes::Column::ReviewId, &review_ids).await?;
    let comment_counts =
        count_by::<comments::Entity>(db, comments::Column::ReviewId, &review_ids).await?;
    let report_counts = match audience {
        Audience::Admin => {
            Some(count_by::<reports::Entity>(db, reports::Column::ReviewId, &review_ids).await?)
        }
        Audience::Public => None,
    };

    Ok(reviews
        .into_iter()
        .map(|review| {
            let user = if review.is_anonymous && audience == Audience::Public {
                AuthorView::anonymous()
            } else {
                authors
                    .get(&review.user_id)
                    .map(|u| AuthorView::of(u, audience == Audience::Admin))
                    .unwrap_or_else(AuthorView::missing)
            };
            let course = review
                .course_id
                .and_then(|id| course_map.get(&id))
                .map(|c| CourseRef {
                    id: c.id,
                    code: c.code.clone(),
                    name: c.name.clone(),
                });
            let professor = review
                .professor_id
                .and_then(|id| professor_map.get(&id))
                .map(|p| ProfessorRef {
                    id: p.id,
                    first_name: p.first_name.clone(),
                    last_name: p.last_name.clone(),
                });
            let count = ReviewCounts {
                likes: like_counts.get(&review.id).copied().unwrap_or(0),
                comments: comment_counts.get(&review.id).copied().unwrap_or(0),
                reports: report_counts
                    .as_ref()
                    .map(|counts| counts.get(&review.id).copied().unwrap_or(0)),
            };

            ReviewView {
                id: review.id,
                course_id: review.course_id,
                professor_id: review.professor_id,
                rating: review.rating,
                difficulty: review.difficulty,
                workload: review.workload,
                status: ReviewState::of(&review),
                content: review.content,
                is_anonymous: review.is_anonymous,
                is_approved: review.is_approved,
                is_edited: review.is_edited,
                helpful_count: review.helpful_count,
                created_at: review.created_at,
                updated_at: review.updated_at,
                user,
                course,
                professor,
                count,
            }
        })
        .collect())
}

async fn present_review(
    db: &DatabaseConnection,
    review: reviews::Model,
) -> Result<ReviewView, ApiError> {
    present_reviews(db, vec![review], Audience::Public)
        .await?
        .pop()
        .ok_or(ApiError::Internal)
}

/// Load a review the client is allowed to see. Unapproved reviews are only
/// visible to their author and admins; for everyone else they do not exist.
pub(super) async fn find_visible_review(
    db: &DatabaseConnection,
    client: &ClientCtx,
    id: i32,
) -> Result<reviews::Model, ApiError> {
    match reviews::Entity::find_by_id(id).one(db).await? {
        Some(review) if review.is_approved || client.is_owner_or_admin(review.user_id) => {
            Ok(review)
        }
        _ => Err(ApiError::not_found("Review")),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewQuery {
    pub course_id: Option<i32>,
    pub professor_id: Option<i32>,
    pub user_id: Option<i32>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[get("/reviews")]
async fn list_reviews(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
    query: web::Query<ReviewQuery>,
) -> Result<HttpResponse, ApiError> {
    let paging = Paging::new(query.page, query.limit, &config.limits);

    let mut select = reviews::Entity::find().filter(reviews::Column::IsApproved.eq(true));
    if let Some(course_id) = query.course_id {
        select = select.filter(reviews::Column::CourseId.eq(course_id));
    }
    if let Some(professor_id) = query.professor_id {
        select = select.filter(reviews::Column::ProfessorId.eq(professor_id));
    }
    if let Some(user_id) = query.user_id {
        select = select.filter(reviews::Column::UserId.eq(user_id));
        // Listing a user's reviews must not unmask their anonymous ones.
        if !client.is_owner_or_admin(user_id) {
            select = select.filter(reviews::Column::IsAnonymous.eq(false));
        }
    }

    let paginator = select
        .order_by_desc(reviews::Column::CreatedAt)
        .order_by_desc(reviews::Column::Id)
        .paginate(db.get_ref(), paging.limit);
    let total = paginator.num_items().await?;
    let rows = paginator.fetch_page(paging.index()).await?;

    let reviews = present_reviews(db.get_ref(), rows, Audience::Public).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "reviews": reviews,
        "pagination": paging.describe(total),
    })))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateReviewForm {
    pub course_id: Option<i32>,
    pub professor_id: Option<i32>,
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i32,
    #[validate(range(min = 1, max = 5, message = "Difficulty must be between 1 and 5"))]
    pub difficulty: Option<i32>,
    #[validate(range(min = 1, max = 5, message = "Workload must be between 1 and 5"))]
    pub workload: Option<i32>,
    #[validate(length(min = 10, message = "Review must be at least 10 characters"))]
    pub content: String,
    #[serde(default)]
    pub is_anonymous: bool,
}

#[post("/reviews")]
async fn create_review(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    form: web::Json<CreateReviewForm>,
) -> Result<HttpResponse, ApiError> {
    let user_id = client.require(Action::SubmitReview)?.id;
    let form = form.into_inner();
    form.validate()?;

    if form.course_id.is_none() && form.professor_id.is_none() {
        return Err(ApiError::bad_request(
            "Either courseId or professorId must be provided",
        ));
    }

    let db = db.get_ref();
    if let Some(course_id) = form.course_id {
        if courses::Entity::find_by_id(course_id).one(db).await?.is_none() {
            return Err(ApiError::not_found("Course"));
        }
    }
    if let Some(professor_id) = form.professor_id {
        if professors::Entity::find_by_id(professor_id).one(db).await?.is_none() {
            return Err(ApiError::not_found("Professor"));
        }
    }

    let now = Utc::now().naive_utc();
    let review = reviews::ActiveModel {
        user_id: Set(user_id),
        course_id: Set(form.course_id),
        professor_id: Set(form.professor_id),
        rating: Set(form.rating),
        difficulty: Set(form.difficulty),
        workload: Set(form.workload),
        content: Set(form.content),
        is_anonymous: Set(form.is_anonymous),
        is_approved: Set(false),
        is_edited: Set(false),
        helpful_count: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(|e| {
        ApiError::conflict_or_internal(
            e,
            "You have already submitted a review for this course/professor",
        )
    })?;

    log::info!("Review {} submitted by user {}", review.id, user_id);
    Ok(HttpResponse::Created().json(present_review(db, review).await?))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: i32,
    pub review_id: i32,
    pub content: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub user: AuthorView,
}

async fn present_comments(
    db: &DatabaseConnection,
    rows: Vec<comments::Model>,
) -> Result<Vec<CommentView>, DbErr> {
    let user_ids: Vec<i32> = rows.iter().map(|c| c.user_id).collect();
    let authors: HashMap<i32, users::Model> = if user_ids.is_empty() {
        HashMap::new()
    } else {
        users::Entity::find()
            .filter(users::Column::Id.is_in(user_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect()
    };

    Ok(rows
        .into_iter()
        .map(|c| CommentView {
            user: authors
                .get(&c.user_id)
                .map(|u| AuthorView::of(u, false))
                .unwrap_or_else(AuthorView::missing),
            id: c.id,
            review_id: c.review_id,
            content: c.content,
            created_at: c.created_at,
            updated_at: c.updated_at,
        })
        .collect())
}

async fn review_comments(
    db: &DatabaseConnection,
    review_id: i32,
) -> Result<Vec<CommentView>, DbErr> {
    let rows = comments::Entity::find()
        .filter(comments::Column::ReviewId.eq(review_id))
        .order_by_asc(comments::Column::CreatedAt)
        .order_by_asc(comments::Column::Id)
        .all(db)
        .await?;
    present_comments(db, rows).await
}

#[derive(Serialize)]
struct ReviewDetail {
    #[serde(flatten)]
    review: ReviewView,
    comments: Vec<CommentView>,
}

#[get("/reviews/{id}")]
async fn view_review(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let db = db.get_ref();
    let review = find_visible_review(db, &client, path.into_inner()).await?;
    let comments = review_comments(db, review.id).await?;

    Ok(HttpResponse::Ok().json(ReviewDetail {
        review: present_review(db, review).await?,
        comments,
    }))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateReviewForm {
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: Option<i32>,
    #[validate(range(min = 1, max = 5, message = "Difficulty must be between 1 and 5"))]
    pub difficulty: Option<i32>,
    #[validate(range(min = 1, max = 5, message = "Workload must be between 1 and 5"))]
    pub workload: Option<i32>,
    #[validate(length(min = 10, message = "Review must be at least 10 characters"))]
    pub content: Option<String>,
}

/// Any edit sends the review back to moderation.
#[put("/reviews/{id}")]
async fn update_review(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    cache: web::Data<RatingCache>,
    path: web::Path<i32>,
    form: web::Json<UpdateReviewForm>,
) -> Result<HttpResponse, ApiError> {
    client.require_login()?;
    let db = db.get_ref();
    let review = find_visible_review(db, &client, path.into_inner()).await?;
    client.require_on(Action::EditReview, review.user_id)?;

    let form = form.into_inner();
    form.validate()?;

    let state = ReviewState::of(&review).after_edit();
    let mut active: reviews::ActiveModel = review.into();
    if let Some(rating) = form.rating {
        active.rating = Set(rating);
    }
    if let Some(difficulty) = form.difficulty {
        active.difficulty = Set(Some(difficulty));
    }
    if let Some(workload) = form.workload {
        active.workload = Set(Some(workload));
    }
    if let Some(content) = form.content {
        active.content = Set(content);
    }
    active.is_approved = Set(state.is_public());
    active.is_edited = Set(true);
    active.updated_at = Set(Utc::now().naive_utc());

    let review = active.update(db).await?;
    cache.invalidate_review(&review);

    Ok(HttpResponse::Ok().json(present_review(db, review).await?))
}

#[delete("/reviews/{id}")]
async fn delete_review(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    cache: web::Data<RatingCache>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    client.require_login()?;
    let db = db.get_ref();
    let review = find_visible_review(db, &client, path.into_inner()).await?;
    let user = client.require_on(Action::DeleteReview, review.user_id)?;

    review.clone().delete(db).await?;
    cache.invalidate_review(&review);
    log::info!("Review {} deleted by user {}", review.id, user.id);

    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "Review deleted successfully" })))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LikeResponse {
    message: &'static str,
    liked: bool,
    helpful_count: i32,
}

/// Toggle the caller's like. The like row and the helpful counter change in
/// one transaction, and the insert tolerates a concurrent duplicate.
#[post("/reviews/{id}/like")]
async fn toggle_like(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let user_id = client.require(Action::ToggleLike)?.id;
    let review_id = find_visible_review(db.get_ref(), &client, path.into_inner())
        .await?
        .id;

    let txn = db.begin().await?;

    let removed = likes::Entity::delete_many()
        .filter(likes::Column::ReviewId.eq(review_id))
        .filter(likes::Column::UserId.eq(user_id))
        .exec(&txn)
        .await?
        .rows_affected;

    let liked = if removed > 0 {
        reviews::Entity::update_many()
            .col_expr(
                reviews::Column::HelpfulCount,
                Expr::col(reviews::Column::HelpfulCount).sub(removed as i32),
            )
            .filter(reviews::Column::Id.eq(review_id))
            .exec(&txn)
            .await?;
        false
    } else {
        let inserted = likes::Entity::insert(likes::ActiveModel {
            review_id: Set(review_id),
            user_id: Set(user_id),
            created_at: Set(Utc::now().naive_utc()),
            ..Default::default()
        })
        .on_conflict(
            OnConflict::columns([likes::Column::ReviewId, likes::Column::UserId])
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(&txn)
        .await?;

        if inserted > 0 {
            reviews::Entity::update_many()
                .col_expr(
                    reviews::Column::HelpfulCount,
                    Expr::col(reviews::Column::HelpfulCount).add(1),
                )
                .filter(reviews::Column::Id.eq(review_id))
                .exec(&txn)
                .await?;
        }
        true
    };

    let helpful_count = reviews::Entity::find_by_id(review_id)
        .one(&txn)
        .await?
        .map(|r| r.helpful_count)
        .ok_or_else(|| ApiError::not_found("Review"))?;

    txn.commit().await?;

    Ok(HttpResponse::Ok().json(LikeResponse {
        message: if liked { "Review liked" } else { "Review unliked" },
        liked,
        helpful_count,
    }))
}

#[get("/reviews/{id}/comments")]
async fn list_comments(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let db = db.get_ref();
    let review = find_visible_review(db, &client, path.into_inner()).await?;
    let comments = review_comments(db, review.id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "comments": comments })))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CommentForm {
    #[validate(length(min = 1, message = "Comment cannot be empty"))]
    pub content: String,
}

#[post("/reviews/{id}/comments")]
async fn create_comment(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
    form: web::Json<CommentForm>,
) -> Result<HttpResponse, ApiError> {
    let user_id = client.require(Action::SubmitComment)?.id;
    let form = form.into_inner();
    form.validate()?;

    let db = db.get_ref();
    let review = find_visible_review(db, &client, path.into_inner()).await?;

    let now = Utc::now().naive_utc();
    let comment = comments::ActiveModel {
        review_id: Set(review.id),
        user_id: Set(user_id),
        content: Set(form.content),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    let view = present_comments(db, vec![comment])
        .await?
        .pop()
        .ok_or(ApiError::Internal)?;
    Ok(HttpResponse::Created().json(view))
}

#[delete("/reviews/{id}/comments/{comment_id}")]
async fn delete_comment(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<(i32, i32)>,
) -> Result<HttpResponse, ApiError> {
    client.require_login()?;
    let (review_id, comment_id) = path.into_inner();
    let db = db.get_ref();
    let review = find_visible_review(db, &client, review_id).await?;

    let comment = comments::Entity::find_by_id(comment_id)
        .filter(comments::Column::ReviewId.eq(review.id))
        .one(db)
        .await?
        .ok_or_else(|| ApiError::not_found("Comment"))?;
    client.require_on(Action::DeleteComment, comment.user_id)?;

    comment.delete(db).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "Comment deleted successfully" })))
}

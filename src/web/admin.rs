//! Admin endpoints: statistics, review moderation and account status.

use super::auth::UserView;
use super::error::ApiError;
use super::pagination::Paging;
use super::reviews::{present_reviews, Audience};
use crate::app_config::AppConfig;
use crate::cache::RatingCache;
use crate::middleware::ClientCtx;
use crate::moderation::{approve_review, platform_stats, reject_review};
use crate::orm::{reviews, users};
use crate::permission::Action;
use actix_web::{get, post, web, HttpResponse};
use chrono::Utc;
use sea_orm::{entity::*, query::*, ColumnTrait, DatabaseConnection, EntityTrait, QueryOrder};
use serde::Deserialize;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_stats)
        .service(view_reviews)
        .service(approve)
        .service(reject)
        .service(deactivate_user)
        .service(activate_user);
}

#[get("/admin/stats")]
async fn view_stats(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, ApiError> {
    client.require(Action::ViewStats)?;
    Ok(HttpResponse::Ok().json(platform_stats(db.get_ref()).await?))
}

/// Moderation queue filter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueFilter {
    Pending,
    Approved,
    #[default]
    All,
}

#[derive(Debug, Deserialize)]
pub struct QueueQuery {
    #[serde(default)]
    pub status: QueueFilter,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[get("/admin/reviews")]
async fn view_reviews(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
    query: web::Query<QueueQuery>,
) -> Result<HttpResponse, ApiError> {
    client.require(Action::ModerateReviews)?;
    let db = db.get_ref();
    let paging = Paging::new(query.page, query.limit, &config.limits);

    let select = match query.status {
        QueueFilter::Pending => {
            reviews::Entity::find().filter(reviews::Column::IsApproved.eq(false))
        }
        QueueFilter::Approved => {
            reviews::Entity::find().filter(reviews::Column::IsApproved.eq(true))
        }
        QueueFilter::All => reviews::Entity::find(),
    };

    let paginator = select
        .order_by_desc(reviews::Column::CreatedAt)
        .order_by_desc(reviews::Column::Id)
        .paginate(db, paging.limit);
    let total = paginator.num_items().await?;
    let rows = paginator.fetch_page(paging.index()).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "reviews": present_reviews(db, rows, Audience::Admin).await?,
        "pagination": paging.describe(total),
    })))
}

#[post("/admin/reviews/{id}/approve")]
async fn approve(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    cache: web::Data<RatingCache>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    client.require(Action::ModerateReviews)?;
    let db = db.get_ref();
    let review = approve_review(db, &cache, path.into_inner())
        .await?
        .ok_or_else(|| ApiError::not_found("Review"))?;

    let review = present_reviews(db, vec![review], Audience::Admin)
        .await?
        .pop()
        .ok_or(ApiError::Internal)?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Review approved successfully",
        "review": review,
    })))
}

#[post("/admin/reviews/{id}/reject")]
async fn reject(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    cache: web::Data<RatingCache>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    client.require(Action::ModerateReviews)?;
    reject_review(db.get_ref(), &cache, path.into_inner())
        .await?
        .ok_or_else(|| ApiError::not_found("Review"))?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Review rejected and deleted successfully",
    })))
}

async fn set_active(
    client: &ClientCtx,
    db: &DatabaseConnection,
    user_id: i32,
    active: bool,
) -> Result<HttpResponse, ApiError> {
    let admin = client.require(Action::ManageUsers)?;
    if !active && admin.id == user_id {
        return Err(ApiError::bad_request("You cannot deactivate your own account"));
    }

    let user = users::Entity::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    let mut model: users::ActiveModel = user.into();
    model.is_active = Set(active);
    model.updated_at = Set(Utc::now().naive_utc());
    let user = model.update(db).await?;

    log::info!(
        "User {} {} by admin {}",
        user.id,
        if active { "activated" } else { "deactivated" },
        admin.id
    );
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": if active { "User activated" } else { "User deactivated" },
        "user": UserView::from(&user),
    })))
}

#[post("/admin/users/{id}/deactivate")]
async fn deactivate_user(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    set_active(&client, db.get_ref(), path.into_inner(), false).await
}

#[post("/admin/users/{id}/activate")]
async fn activate_user(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    set_active(&client, db.get_ref(), path.into_inner(), true).await
}

//! Report submission and management endpoints

use super::error::ApiError;
use super::pagination::Paging;
use super::reviews::{find_visible_review, AuthorView};
use crate::app_config::AppConfig;
use crate::middleware::ClientCtx;
use crate::orm::reports::{self, ReportReason, ReportStatus};
use crate::orm::{reviews, users};
use crate::permission::Action;
use actix_web::{get, post, put, web, HttpResponse};
use chrono::{NaiveDateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    entity::*, query::*, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(submit_report)
        .service(view_reports)
        .service(view_report)
        .service(update_report_status);
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReportedReview {
    id: i32,
    content: String,
    rating: i32,
    user_id: i32,
    is_approved: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReportView {
    id: i32,
    review_id: i32,
    reason: ReportReason,
    description: Option<String>,
    status: ReportStatus,
    resolved_by: Option<i32>,
    resolved_at: Option<NaiveDateTime>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<AuthorView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    review: Option<ReportedReview>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resolver: Option<AuthorView>,
}

impl ReportView {
    fn bare(report: reports::Model) -> Self {
        Self {
            id: report.id,
            review_id: report.review_id,
            reason: report.reason,
            description: report.description,
            status: report.status,
            resolved_by: report.resolved_by,
            resolved_at: report.resolved_at,
            created_at: report.created_at,
            updated_at: report.updated_at,
            user: None,
            review: None,
            resolver: None,
        }
    }
}

/// Reports with reporter, resolver and the reported review, for admins.
async fn present_reports(
    db: &DatabaseConnection,
    rows: Vec<reports::Model>,
) -> Result<Vec<ReportView>, DbErr> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let user_ids: Vec<i32> = rows
        .iter()
        .flat_map(|r| std::iter::once(r.user_id).chain(r.resolved_by))
        .collect();
    let review_ids: Vec<i32> = rows.iter().map(|r| r.review_id).collect();

    let people: HashMap<i32, users::Model> = users::Entity::find()
        .filter(users::Column::Id.is_in(user_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();
    let reviewed: HashMap<i32, reviews::Model> = reviews::Entity::find()
        .filter(reviews::Column::Id.is_in(review_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|r| (r.id, r))
        .collect();

    Ok(rows
        .into_iter()
        .map(|report| {
            let user = people.get(&report.user_id).map(|u| AuthorView::of(u, true));
            let resolver = report
                .resolved_by
                .and_then(|id| people.get(&id))
                .map(|u| AuthorView::of(u, true));
            let review = reviewed.get(&report.review_id).map(|r| ReportedReview {
                id: r.id,
                content: r.content.clone(),
                rating: r.rating,
                user_id: r.user_id,
                is_approved: r.is_approved,
            });
            ReportView {
                user,
                review,
                resolver,
                ..ReportView::bare(report)
            }
        })
        .collect())
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReportForm {
    pub review_id: i32,
    pub reason: ReportReason,
    #[validate(length(max = 2000, message = "Description is too long"))]
    pub description: Option<String>,
}

/// Submit a report. One open report per reporter and review.
#[post("/reports")]
async fn submit_report(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    form: web::Json<ReportForm>,
) -> Result<HttpResponse, ApiError> {
    let reporter_id = client.require(Action::SubmitReport)?.id;
    let form = form.into_inner();
    form.validate()?;

    let db = db.get_ref();
    let review = find_visible_review(db, &client, form.review_id).await?;

    let now = Utc::now().naive_utc();
    let report = reports::ActiveModel {
        review_id: Set(review.id),
        user_id: Set(reporter_id),
        reason: Set(form.reason),
        description: Set(form.description.filter(|d| !d.trim().is_empty())),
        status: Set(ReportStatus::Pending),
        resolved_by: Set(None),
        resolved_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(|e| ApiError::conflict_or_internal(e, "You have already reported this review"))?;

    log::info!(
        "Report {} filed by user {} against review {} ({:?})",
        report.id,
        reporter_id,
        review.id,
        report.reason
    );
    Ok(HttpResponse::Created().json(ReportView::bare(report)))
}

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub status: Option<ReportStatus>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[get("/reports")]
async fn view_reports(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
    query: web::Query<ReportQuery>,
) -> Result<HttpResponse, ApiError> {
    client.require(Action::ManageReports)?;
    let db = db.get_ref();
    let paging = Paging::new(query.page, query.limit, &config.limits);

    let mut select = reports::Entity::find();
    if let Some(status) = query.status {
        select = select.filter(reports::Column::Status.eq(status));
    }

    let paginator = select
        .order_by_desc(reports::Column::CreatedAt)
        .order_by_desc(reports::Column::Id)
        .paginate(db, paging.limit);
    let total = paginator.num_items().await?;
    let rows = paginator.fetch_page(paging.index()).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "reports": present_reports(db, rows).await?,
        "pagination": paging.describe(total),
    })))
}

async fn find_report(db: &DatabaseConnection, id: i32) -> Result<ReportView, ApiError> {
    let report = reports::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| ApiError::not_found("Report"))?;
    present_reports(db, vec![report])
        .await?
        .pop()
        .ok_or(ApiError::Internal)
}

#[get("/reports/{id}")]
async fn view_report(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    client.require(Action::ManageReports)?;
    Ok(HttpResponse::Ok().json(find_report(db.get_ref(), path.into_inner()).await?))
}

#[derive(Debug, Deserialize)]
pub struct ReportStatusForm {
    pub status: ReportStatus,
}

/// Close a pending report. The acting admin is recorded as resolver; only
/// RESOLVED stamps the resolution time. The reported review is left alone.
#[put("/reports/{id}")]
async fn update_report_status(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
    form: web::Json<ReportStatusForm>,
) -> Result<HttpResponse, ApiError> {
    let admin_id = client.require(Action::ManageReports)?.id;
    let db = db.get_ref();
    let id = path.into_inner();
    let next = form.into_inner().status;

    let report = reports::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| ApiError::not_found("Report"))?;
    if !report.status.can_transition_to(next) {
        return Err(ApiError::conflict(format!(
            "Cannot change report status from {:?} to {:?}",
            report.status, next
        )));
    }

    let now = Utc::now().naive_utc();
    let resolved_at = (next == ReportStatus::Resolved).then(|| now);

    // Guarded on the current status so two admins cannot both close it.
    let updated = reports::Entity::update_many()
        .col_expr(reports::Column::Status, Expr::value(next))
        .col_expr(reports::Column::ResolvedBy, Expr::value(Some(admin_id)))
        .col_expr(reports::Column::ResolvedAt, Expr::value(resolved_at))
        .col_expr(reports::Column::UpdatedAt, Expr::value(now))
        .filter(reports::Column::Id.eq(id))
        .filter(reports::Column::Status.eq(ReportStatus::Pending))
        .exec(db)
        .await?
        .rows_affected;
    if updated == 0 {
        return Err(ApiError::conflict("Report has already been handled"));
    }

    log::info!("Report {} moved to {:?} by admin {}", id, next, admin_id);
    Ok(HttpResponse::Ok().json(find_report(db, id).await?))
}

//! Professor directory endpoints.

use super::courses::ReviewTotal;
use super::error::ApiError;
use super::pagination::Paging;
use super::query::{count_by, search_any};
use super::reviews::{present_reviews, Audience, ReviewView};
use crate::app_config::AppConfig;
use crate::cache::RatingCache;
use crate::middleware::ClientCtx;
use crate::orm::{course_professors, courses, professors, reviews};
use crate::permission::Action;
use crate::rating::{RatingMetrics, Subject};
use actix_web::{delete, get, post, put, web, HttpResponse};
use chrono::Utc;
use sea_orm::{
    entity::*, query::*, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(list_professors)
        .service(create_professor)
        .service(view_professor)
        .service(update_professor)
        .service(delete_professor);
}

#[derive(Serialize)]
struct ProfessorListItem {
    #[serde(flatten)]
    professor: professors::Model,
    courses: Vec<courses::Model>,
    #[serde(rename = "_count")]
    count: ReviewTotal,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProfessorDetail {
    #[serde(flatten)]
    professor: professors::Model,
    courses: Vec<courses::Model>,
    reviews: Vec<ReviewView>,
    #[serde(rename = "_count")]
    count: ReviewTotal,
    average_rating: f64,
    metrics: RatingMetrics,
}

/// Courses taught by each of `professor_ids`, by code.
async fn courses_by_professor(
    db: &DatabaseConnection,
    professor_ids: &[i32],
) -> Result<HashMap<i32, Vec<courses::Model>>, DbErr> {
    let mut map: HashMap<i32, Vec<courses::Model>> = HashMap::new();
    if professor_ids.is_empty() {
        return Ok(map);
    }

    let rows = course_professors::Entity::find()
        .filter(course_professors::Column::ProfessorId.is_in(professor_ids.iter().copied()))
        .find_also_related(courses::Entity)
        .order_by_asc(courses::Column::Code)
        .all(db)
        .await?;

    for (link, course) in rows {
        if let Some(course) = course {
            map.entry(link.professor_id).or_default().push(course);
        }
    }
    Ok(map)
}

#[derive(Debug, Deserialize)]
pub struct ProfessorQuery {
    pub search: Option<String>,
    pub department: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[get("/professors")]
async fn list_professors(
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
    query: web::Query<ProfessorQuery>,
) -> Result<HttpResponse, ApiError> {
    let db = db.get_ref();
    let paging = Paging::new(query.page, query.limit, &config.limits);

    let mut select = professors::Entity::find();
    if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
        select = select.filter(search_any(
            search,
            &[
                professors::Column::FirstName,
                professors::Column::LastName,
                professors::Column::Email,
            ],
        ));
    }
    if let Some(department) = query.department.as_deref().filter(|d| !d.is_empty()) {
        select = select.filter(professors::Column::Department.eq(department));
    }

    let paginator = select
        .order_by_asc(professors::Column::LastName)
        .order_by_asc(professors::Column::FirstName)
        .order_by_asc(professors::Column::Id)
        .paginate(db, paging.limit);
    let total = paginator.num_items().await?;
    let rows = paginator.fetch_page(paging.index()).await?;

    let ids: Vec<i32> = rows.iter().map(|p| p.id).collect();
    let mut course_map = courses_by_professor(db, &ids).await?;
    let review_counts =
        count_by::<reviews::Entity>(db, reviews::Column::ProfessorId, &ids).await?;

    let professors: Vec<ProfessorListItem> = rows
        .into_iter()
        .map(|professor| ProfessorListItem {
            courses: course_map.remove(&professor.id).unwrap_or_default(),
            count: ReviewTotal {
                reviews: review_counts.get(&professor.id).copied().unwrap_or(0),
            },
            professor,
        })
        .collect();

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "professors": professors,
        "pagination": paging.describe(total),
    })))
}

#[get("/professors/{id}")]
async fn view_professor(
    db: web::Data<DatabaseConnection>,
    cache: web::Data<RatingCache>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let db = db.get_ref();
    let professor = professors::Entity::find_by_id(path.into_inner())
        .one(db)
        .await?
        .ok_or_else(|| ApiError::not_found("Professor"))?;

    let courses = courses_by_professor(db, &[professor.id])
        .await?
        .remove(&professor.id)
        .unwrap_or_default();

    let approved = reviews::Entity::find()
        .filter(reviews::Column::ProfessorId.eq(professor.id))
        .filter(reviews::Column::IsApproved.eq(true))
        .order_by_desc(reviews::Column::CreatedAt)
        .order_by_desc(reviews::Column::Id)
        .all(db)
        .await?;
    let total = reviews::Entity::find()
        .filter(reviews::Column::ProfessorId.eq(professor.id))
        .count(db)
        .await?;

    let metrics = cache
        .get_or_compute(db, Subject::Professor(professor.id))
        .await?;

    Ok(HttpResponse::Ok().json(ProfessorDetail {
        professor,
        courses,
        reviews: present_reviews(db, approved, Audience::Public).await?,
        count: ReviewTotal { reviews: total },
        average_rating: metrics.average_rating,
        metrics,
    }))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProfessorForm {
    #[validate(length(min = 1, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "Last name is required"))]
    pub last_name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    #[validate(length(min = 1, message = "Department is required"))]
    pub department: String,
    pub bio: Option<String>,
}

#[post("/professors")]
async fn create_professor(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    form: web::Json<ProfessorForm>,
) -> Result<HttpResponse, ApiError> {
    client.require(Action::ManageCatalog)?;
    let form = form.into_inner();
    form.validate()?;

    let now = Utc::now().naive_utc();
    let professor = professors::ActiveModel {
        first_name: Set(form.first_name),
        last_name: Set(form.last_name),
        email: Set(form.email),
        department: Set(form.department),
        bio: Set(form.bio),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db.get_ref())
    .await?;

    log::info!("Professor {} created", professor.id);
    Ok(HttpResponse::Created().json(professor))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfessorForm {
    #[validate(length(min = 1, message = "First name is required"))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, message = "Last name is required"))]
    pub last_name: Option<String>,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    #[validate(length(min = 1, message = "Department is required"))]
    pub department: Option<String>,
    pub bio: Option<String>,
}

#[put("/professors/{id}")]
async fn update_professor(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
    form: web::Json<UpdateProfessorForm>,
) -> Result<HttpResponse, ApiError> {
    client.require(Action::ManageCatalog)?;
    let form = form.into_inner();
    form.validate()?;

    let db = db.get_ref();
    let professor = professors::Entity::find_by_id(path.into_inner())
        .one(db)
        .await?
        .ok_or_else(|| ApiError::not_found("Professor"))?;

    let mut active: professors::ActiveModel = professor.into();
    if let Some(first_name) = form.first_name {
        active.first_name = Set(first_name);
    }
    if let Some(last_name) = form.last_name {
        active.last_name = Set(last_name);
    }
    if let Some(email) = form.email {
        active.email = Set(Some(email));
    }
    if let Some(department) = form.department {
        active.department = Set(department);
    }
    if let Some(bio) = form.bio {
        active.bio = Set(Some(bio));
    }
    active.updated_at = Set(Utc::now().naive_utc());

    let professor = active.update(db).await?;
    Ok(HttpResponse::Ok().json(professor))
}

#[delete("/professors/{id}")]
async fn delete_professor(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    cache: web::Data<RatingCache>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    client.require(Action::ManageCatalog)?;
    let db = db.get_ref();
    let professor = professors::Entity::find_by_id(path.into_inner())
        .one(db)
        .await?
        .ok_or_else(|| ApiError::not_found("Professor"))?;

    let doomed = reviews::Entity::find()
        .filter(reviews::Column::ProfessorId.eq(professor.id))
        .all(db)
        .await?;

    let id = professor.id;
    professor.delete(db).await?;

    cache.invalidate(Subject::Professor(id));
    for review in &doomed {
        cache.invalidate_review(review);
    }
    log::info!("Professor {} deleted with {} reviews", id, doomed.len());

    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "Professor deleted successfully" })))
}

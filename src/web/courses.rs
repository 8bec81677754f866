//! Course catalog endpoints.

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
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    entity::*, query::*, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(list_courses)
        .service(create_course)
        .service(view_course)
        .service(update_course)
        .service(delete_course)
        .service(link_professor)
        .service(unlink_professor);
}

#[derive(Serialize)]
pub struct ReviewTotal {
    pub reviews: u64,
}

#[derive(Serialize)]
struct CourseListItem {
    #[serde(flatten)]
    course: courses::Model,
    professors: Vec<professors::Model>,
    #[serde(rename = "_count")]
    count: ReviewTotal,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CourseDetail {
    #[serde(flatten)]
    course: courses::Model,
    professors: Vec<professors::Model>,
    reviews: Vec<ReviewView>,
    #[serde(rename = "_count")]
    count: ReviewTotal,
    average_rating: f64,
    metrics: RatingMetrics,
}

/// Professors teaching each of `course_ids`, by last name.
async fn professors_by_course(
    db: &DatabaseConnection,
    course_ids: &[i32],
) -> Result<HashMap<i32, Vec<professors::Model>>, DbErr> {
    let mut map: HashMap<i32, Vec<professors::Model>> = HashMap::new();
    if course_ids.is_empty() {
        return Ok(map);
    }

    let rows = course_professors::Entity::find()
        .filter(course_professors::Column::CourseId.is_in(course_ids.iter().copied()))
        .find_also_related(professors::Entity)
        .order_by_asc(professors::Column::LastName)
        .order_by_asc(professors::Column::FirstName)
        .all(db)
        .await?;

    for (link, professor) in rows {
        if let Some(professor) = professor {
            map.entry(link.course_id).or_default().push(professor);
        }
    }
    Ok(map)
}

#[derive(Debug, Deserialize)]
pub struct CourseQuery {
    pub search: Option<String>,
    pub department: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[get("/courses")]
async fn list_courses(
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
    query: web::Query<CourseQuery>,
) -> Result<HttpResponse, ApiError> {
    let db = db.get_ref();
    let paging = Paging::new(query.page, query.limit, &config.limits);

    let mut select = courses::Entity::find();
    if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
        select = select.filter(search_any(
            search,
            &[
                courses::Column::Code,
                courses::Column::Name,
                courses::Column::Description,
            ],
        ));
    }
    if let Some(department) = query.department.as_deref().filter(|d| !d.is_empty()) {
        select = select.filter(courses::Column::Department.eq(department));
    }

    let paginator = select
        .order_by_desc(courses::Column::CreatedAt)
        .order_by_desc(courses::Column::Id)
        .paginate(db, paging.limit);
    let total = paginator.num_items().await?;
    let rows = paginator.fetch_page(paging.index()).await?;

    let ids: Vec<i32> = rows.iter().map(|c| c.id).collect();
    let mut professor_map = professors_by_course(db, &ids).await?;
    let review_counts = count_by::<reviews::Entity>(db, reviews::Column::CourseId, &ids).await?;

    let courses: Vec<CourseListItem> = rows
        .into_iter()
        .map(|course| CourseListItem {
            professors: professor_map.remove(&course.id).unwrap_or_default(),
            count: ReviewTotal {
                reviews: review_counts.get(&course.id).copied().unwrap_or(0),
            },
            course,
        })
        .collect();

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "courses": courses,
        "pagination": paging.describe(total),
    })))
}

#[get("/courses/{id}")]
async fn view_course(
    db: web::Data<DatabaseConnection>,
    cache: web::Data<RatingCache>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let db = db.get_ref();
    let course = courses::Entity::find_by_id(path.into_inner())
        .one(db)
        .await?
        .ok_or_else(|| ApiError::not_found("Course"))?;

    let professors = professors_by_course(db, &[course.id])
        .await?
        .remove(&course.id)
        .unwrap_or_default();

    let approved = reviews::Entity::find()
        .filter(reviews::Column::CourseId.eq(course.id))
        .filter(reviews::Column::IsApproved.eq(true))
        .order_by_desc(reviews::Column::CreatedAt)
        .order_by_desc(reviews::Column::Id)
        .all(db)
        .await?;
    let total = reviews::Entity::find()
        .filter(reviews::Column::CourseId.eq(course.id))
        .count(db)
        .await?;

    let metrics = cache.get_or_compute(db, Subject::Course(course.id)).await?;

    Ok(HttpResponse::Ok().json(CourseDetail {
        course,
        professors,
        reviews: present_reviews(db, approved, Audience::Public).await?,
        count: ReviewTotal { reviews: total },
        average_rating: metrics.average_rating,
        metrics,
    }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CourseForm {
    #[validate(length(min = 1, message = "Course code is required"))]
    pub code: String,
    #[validate(length(min = 1, message = "Course name is required"))]
    pub name: String,
    pub description: Option<String>,
    #[validate(length(min = 1, message = "Department is required"))]
    pub department: String,
    #[validate(range(min = 1, max = 10, message = "Credits must be between 1 and 10"))]
    pub credits: i32,
}

#[post("/courses")]
async fn create_course(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    form: web::Json<CourseForm>,
) -> Result<HttpResponse, ApiError> {
    client.require(Action::ManageCatalog)?;
    let form = form.into_inner();
    form.validate()?;

    let now = Utc::now().naive_utc();
    let course = courses::ActiveModel {
        code: Set(form.code),
        name: Set(form.name),
        description: Set(form.description),
        department: Set(form.department),
        credits: Set(form.credits),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db.get_ref())
    .await
    .map_err(|e| ApiError::conflict_or_internal(e, "Course with this code already exists"))?;

    log::info!("Course {} ({}) created", course.id, course.code);
    Ok(HttpResponse::Created().json(course))
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCourseForm {
    #[validate(length(min = 1, message = "Course code is required"))]
    pub code: Option<String>,
    #[validate(length(min = 1, message = "Course name is required"))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[validate(length(min = 1, message = "Department is required"))]
    pub department: Option<String>,
    #[validate(range(min = 1, max = 10, message = "Credits must be between 1 and 10"))]
    pub credits: Option<i32>,
}

#[put("/courses/{id}")]
async fn update_course(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
    form: web::Json<UpdateCourseForm>,
) -> Result<HttpResponse, ApiError> {
    client.require(Action::ManageCatalog)?;
    let form = form.into_inner();
    form.validate()?;

    let db = db.get_ref();
    let course = courses::Entity::find_by_id(path.into_inner())
        .one(db)
        .await?
        .ok_or_else(|| ApiError::not_found("Course"))?;

    let mut active: courses::ActiveModel = course.into();
    if let Some(code) = form.code {
        active.code = Set(code);
    }
    if let Some(name) = form.name {
        active.name = Set(name);
    }
    if let Some(description) = form.description {
        active.description = Set(Some(description));
    }
    if let Some(department) = form.department {
        active.department = Set(department);
    }
    if let Some(credits) = form.credits {
        active.credits = Set(credits);
    }
    active.updated_at = Set(Utc::now().naive_utc());

    let course = active
        .update(db)
        .await
        .map_err(|e| ApiError::conflict_or_internal(e, "Course with this code already exists"))?;
    Ok(HttpResponse::Ok().json(course))
}

/// Deleting a course takes its reviews with it, so every professor those
/// reviews also rated needs fresh metrics.
#[delete("/courses/{id}")]
async fn delete_course(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    cache: web::Data<RatingCache>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    client.require(Action::ManageCatalog)?;
    let db = db.get_ref();
    let course = courses::Entity::find_by_id(path.into_inner())
        .one(db)
        .await?
        .ok_or_else(|| ApiError::not_found("Course"))?;

    let doomed = reviews::Entity::find()
        .filter(reviews::Column::CourseId.eq(course.id))
        .all(db)
        .await?;

    let id = course.id;
    course.delete(db).await?;

    cache.invalidate(Subject::Course(id));
    for review in &doomed {
        cache.invalidate_review(review);
    }
    log::info!("Course {} deleted with {} reviews", id, doomed.len());

    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "Course deleted successfully" })))
}

async fn find_pair(
    db: &DatabaseConnection,
    course_id: i32,
    professor_id: i32,
) -> Result<(), ApiError> {
    if courses::Entity::find_by_id(course_id).one(db).await?.is_none() {
        return Err(ApiError::not_found("Course"));
    }
    if professors::Entity::find_by_id(professor_id).one(db).await?.is_none() {
        return Err(ApiError::not_found("Professor"));
    }
    Ok(())
}

/// Link a professor to a course. Linking twice is harmless.
#[post("/courses/{id}/professors/{professor_id}")]
async fn link_professor(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<(i32, i32)>,
) -> Result<HttpResponse, ApiError> {
    client.require(Action::ManageCatalog)?;
    let (course_id, professor_id) = path.into_inner();
    let db = db.get_ref();
    find_pair(db, course_id, professor_id).await?;

    course_professors::Entity::insert(course_professors::ActiveModel {
        course_id: Set(course_id),
        professor_id: Set(professor_id),
        created_at: Set(Utc::now().naive_utc()),
    })
    .on_conflict(
        OnConflict::columns([
            course_professors::Column::CourseId,
            course_professors::Column::ProfessorId,
        ])
        .do_nothing()
        .to_owned(),
    )
    .exec_without_returning(db)
    .await?;

    let professors = professors_by_course(db, &[course_id])
        .await?
        .remove(&course_id)
        .unwrap_or_default();
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Professor linked to course",
        "professors": professors,
    })))
}

#[delete("/courses/{id}/professors/{professor_id}")]
async fn unlink_professor(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<(i32, i32)>,
) -> Result<HttpResponse, ApiError> {
    client.require(Action::ManageCatalog)?;
    let (course_id, professor_id) = path.into_inner();
    let db = db.get_ref();
    find_pair(db, course_id, professor_id).await?;

    let removed = course_professors::Entity::delete_many()
        .filter(course_professors::Column::CourseId.eq(course_id))
        .filter(course_professors::Column::ProfessorId.eq(professor_id))
        .exec(db)
        .await?
        .rows_affected;
    if removed == 0 {
        return Err(ApiError::NotFound(
            "Professor is not linked to this course".to_owned(),
        ));
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "Professor unlinked from course" })))
}

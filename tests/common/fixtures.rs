//! Test fixtures for creating test data and driving requests
#![allow(dead_code)]

use actix_web::body::MessageBody;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::{header, StatusCode};
use actix_web::test;
use campus_reviews::orm::users::{self, Role};
use campus_reviews::orm::{courses, professors, reviews};
use campus_reviews::AppState;
use chrono::Utc;
use sea_orm::{entity::*, ActiveValue::Set, DatabaseConnection, DbErr};
use serde_json::Value;

pub const TEST_PASSWORD: &str = "password123";

/// Create an active user with `TEST_PASSWORD`.
pub async fn create_test_user(
    db: &DatabaseConnection,
    email: &str,
    role: Role,
) -> Result<users::Model, DbErr> {
    let password_hash = campus_reviews::auth::hash_password(TEST_PASSWORD)
        .map_err(|e| DbErr::Custom(format!("Password hashing failed: {}", e)))?;
    let now = Utc::now().naive_utc();

    users::ActiveModel {
        email: Set(email.to_lowercase()),
        password_hash: Set(password_hash),
        first_name: Set("Test".to_owned()),
        last_name: Set(format!("{:?}", role)),
        role: Set(role),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
}

/// Create a user and sign a token for it.
pub async fn create_user_with_token(
    state: &AppState,
    email: &str,
    role: Role,
) -> (users::Model, String) {
    let user = create_test_user(state.db.get_ref(), email, role)
        .await
        .expect("Failed to create test user");
    let token = state
        .tokens
        .generate_token(&user)
        .expect("Failed to sign token");
    (user, token)
}

pub async fn create_test_course(
    db: &DatabaseConnection,
    code: &str,
    name: &str,
    department: &str,
) -> Result<courses::Model, DbErr> {
    let now = Utc::now().naive_utc();
    courses::ActiveModel {
        code: Set(code.to_owned()),
        name: Set(name.to_owned()),
        description: Set(Some(format!("About {}", name))),
        department: Set(department.to_owned()),
        credits: Set(6),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
}

pub async fn create_test_professor(
    db: &DatabaseConnection,
    first_name: &str,
    last_name: &str,
) -> Result<professors::Model, DbErr> {
    let now = Utc::now().naive_utc();
    professors::ActiveModel {
        first_name: Set(first_name.to_owned()),
        last_name: Set(last_name.to_owned()),
        email: Set(Some(format!(
            "{}.{}@ada.edu.az",
            first_name.to_lowercase(),
            last_name.to_lowercase()
        ))),
        department: Set("Computer Science".to_owned()),
        bio: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
}

/// Insert a review directly, bypassing moderation.
pub async fn create_test_review(
    db: &DatabaseConnection,
    user_id: i32,
    course_id: Option<i32>,
    professor_id: Option<i32>,
    rating: i32,
    approved: bool,
) -> Result<reviews::Model, DbErr> {
    let now = Utc::now().naive_utc();
    reviews::ActiveModel {
        user_id: Set(user_id),
        course_id: Set(course_id),
        professor_id: Set(professor_id),
        rating: Set(rating),
        difficulty: Set(None),
        workload: Set(None),
        content: Set("A perfectly reasonable review".to_owned()),
        is_anonymous: Set(false),
        is_approved: Set(approved),
        is_edited: Set(false),
        helpful_count: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
}

/// Authorization header for a bearer token.
pub fn bearer(token: &str) -> (header::HeaderName, String) {
    (header::AUTHORIZATION, format!("Bearer {}", token))
}

/// Call the service and decode the body as JSON (Null when empty).
pub async fn send<S, R, B>(app: &S, req: R) -> (StatusCode, Value)
where
    S: Service<R, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let resp = test::call_service(app, req).await;
    let status = resp.status();
    let body = test::read_body(resp).await;
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

//! Registration, login and the current-user endpoint.

use super::error::{ApiError, FieldError};
use crate::app_config::AppConfig;
use crate::auth::{hash_password, validate_institutional_email, verify_password, TokenKeys};
use crate::middleware::ClientCtx;
use crate::orm::users::{self, Role};
use actix_web::{get, post, web, HttpResponse};
use chrono::{NaiveDateTime, Utc};
use sea_orm::{entity::*, ColumnTrait, DatabaseConnection, QueryFilter};
use serde::{Deserialize, Serialize};
use validator::Validate;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(register)
        .service(login)
        .service(logout)
        .service(me);
}

/// A user as returned to its owner and to admins. Never carries the hash.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: i32,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

impl From<&users::Model> for UserView {
    fn from(user: &users::Model) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            role: user.role,
            is_active: user.is_active,
            created_at: user.created_at,
        }
    }
}

#[derive(Serialize)]
struct SessionResponse {
    message: &'static str,
    user: UserView,
    token: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterForm {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(length(min = 1, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "Last name is required"))]
    pub last_name: String,
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginForm {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

fn issue_token(keys: &TokenKeys, user: &users::Model) -> Result<String, ApiError> {
    keys.generate_token(user).map_err(|e| {
        log::error!("Unable to sign token for user {}: {}", user.id, e);
        ApiError::Internal
    })
}

#[post("/auth/register")]
async fn register(
    db: web::Data<DatabaseConnection>,
    keys: web::Data<TokenKeys>,
    config: web::Data<AppConfig>,
    form: web::Json<RegisterForm>,
) -> Result<HttpResponse, ApiError> {
    let form = form.into_inner();
    form.validate()?;

    let domain = &config.auth.institutional_domain;
    if !validate_institutional_email(&form.email, domain) {
        return Err(ApiError::bad_request(format!(
            "Only institutional email addresses (@{}) are allowed",
            domain
        )));
    }

    let role = match form.role.unwrap_or(Role::Student) {
        Role::Admin => {
            return Err(ApiError::Validation(vec![FieldError::new(
                "role",
                "Role must be STUDENT or PROFESSOR",
            )]))
        }
        role => role,
    };

    let password = form.password;
    let password_hash = web::block(move || hash_password(&password))
        .await?
        .map_err(|e| {
            log::error!("Password hashing failed: {}", e);
            ApiError::Internal
        })?;

    let now = Utc::now().naive_utc();
    let user = users::ActiveModel {
        email: Set(form.email.trim().to_lowercase()),
        password_hash: Set(password_hash),
        first_name: Set(form.first_name),
        last_name: Set(form.last_name),
        role: Set(role),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db.get_ref())
    .await
    .map_err(|e| ApiError::conflict_or_internal(e, "User with this email already exists"))?;

    log::info!("Registered user {} ({:?})", user.id, user.role);

    let token = issue_token(&keys, &user)?;
    Ok(HttpResponse::Created().json(SessionResponse {
        message: "User registered successfully",
        user: UserView::from(&user),
        token,
    }))
}

#[post("/auth/login")]
async fn login(
    db: web::Data<DatabaseConnection>,
    keys: web::Data<TokenKeys>,
    form: web::Json<LoginForm>,
) -> Result<HttpResponse, ApiError> {
    let form = form.into_inner();
    form.validate()?;

    let email = form.email.trim().to_lowercase();
    let user = users::Entity::find()
        .filter(users::Column::Email.eq(email.as_str()))
        .one(db.get_ref())
        .await?;

    let user = match user {
        Some(user) => user,
        None => {
            log::warn!("Failed login for unknown email {}", email);
            return Err(ApiError::unauthorized("Invalid credentials"));
        }
    };

    let password = form.password;
    let hash = user.password_hash.clone();
    let verified = web::block(move || verify_password(&password, &hash)).await?;
    if !verified {
        log::warn!("Failed login for user {}", user.id);
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    if !user.is_active {
        return Err(ApiError::forbidden("Account is deactivated"));
    }

    let token = issue_token(&keys, &user)?;
    Ok(HttpResponse::Ok().json(SessionResponse {
        message: "Login successful",
        user: UserView::from(&user),
        token,
    }))
}

/// Tokens are not revoked server-side; the client drops its copy.
#[post("/auth/logout")]
async fn logout() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "message": "Logout successful" }))
}

#[get("/auth/me")]
async fn me(client: ClientCtx) -> Result<HttpResponse, ApiError> {
    let user = client.require_login()?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "user": UserView::from(user) })))
}

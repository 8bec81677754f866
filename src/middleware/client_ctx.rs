use crate::auth::{resolve_user, TokenKeys};
use crate::orm::users;
use crate::permission::{is_permitted, Action};
use crate::web::error::ApiError;
use actix_web::dev::Payload;
use actix_web::http::header::AUTHORIZATION;
use actix_web::{web::Data, FromRequest, HttpRequest};
use futures::future::LocalBoxFuture;
use sea_orm::DatabaseConnection;

/// Who is making the request.
#[derive(Clone, Debug)]
pub enum Identity {
    /// No Authorization header.
    Guest,
    /// A bearer token was sent but is invalid, expired, or names an
    /// inactive or deleted user.
    Rejected,
    User(users::Model),
}

/// Client context passed to routes.
/// Built once per request from the bearer token; handlers never read
/// identity from anywhere else.
#[derive(Clone, Debug)]
pub struct ClientCtx {
    identity: Identity,
}

impl Default for ClientCtx {
    fn default() -> Self {
        Self {
            identity: Identity::Guest,
        }
    }
}

impl ClientCtx {
    pub fn new(identity: Identity) -> Self {
        Self { identity }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Returns either the user's id or None.
    pub fn get_id(&self) -> Option<i32> {
        self.get_user().map(|u| u.id)
    }

    pub fn get_user(&self) -> Option<&users::Model> {
        match &self.identity {
            Identity::User(user) => Some(user),
            _ => None,
        }
    }

    pub fn is_user(&self) -> bool {
        self.get_user().is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.get_user().map_or(false, |u| u.is_admin())
    }

    /// True for the owner of a resource and for admins.
    pub fn is_owner_or_admin(&self, owner_id: i32) -> bool {
        self.get_user()
            .map_or(false, |u| u.id == owner_id || u.is_admin())
    }

    /// Require user to be logged in. Returns the user or 401.
    pub fn require_login(&self) -> Result<&users::Model, ApiError> {
        match &self.identity {
            Identity::User(user) => Ok(user),
            Identity::Rejected => Err(ApiError::unauthorized("Invalid or expired token")),
            Identity::Guest => Err(ApiError::unauthorized("Authentication required")),
        }
    }

    /// Require the policy to allow `action` for this user. 401 for guests,
    /// 403 when denied.
    pub fn require(&self, action: Action) -> Result<&users::Model, ApiError> {
        let user = self.require_login()?;
        if !is_permitted(user.role, action, false) {
            return Err(ApiError::forbidden("Insufficient permissions"));
        }
        Ok(user)
    }

    /// Same as `require`, for an action on a resource owned by `owner_id`.
    pub fn require_on(&self, action: Action, owner_id: i32) -> Result<&users::Model, ApiError> {
        let user = self.require_login()?;
        if !is_permitted(user.role, action, user.id == owner_id) {
            return Err(ApiError::forbidden("You don't own this resource"));
        }
        Ok(user)
    }
}

/// Token from an `Authorization: Bearer <token>` header.
fn bearer_token(req: &HttpRequest) -> Option<String> {
    let value = req.headers().get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_owned())
}

/// This implementation is what actually provides the `client: ClientCtx` in the parameters of route functions.
impl FromRequest for ClientCtx {
    type Error = ApiError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let has_header = req.headers().contains_key(AUTHORIZATION);
        let token = bearer_token(req);
        let db = req.app_data::<Data<DatabaseConnection>>().cloned();
        let keys = req.app_data::<Data<TokenKeys>>().cloned();

        Box::pin(async move {
            let token = match token {
                Some(token) => token,
                None if has_header => return Ok(ClientCtx::new(Identity::Rejected)),
                None => return Ok(ClientCtx::default()),
            };

            let (db, keys) = match (db, keys) {
                (Some(db), Some(keys)) => (db, keys),
                _ => {
                    log::error!("ClientCtx extracted without database or token keys registered");
                    return Err(ApiError::Internal);
                }
            };

            let identity = match resolve_user(&db, &keys, &token).await? {
                Some(user) => Identity::User(user),
                None => Identity::Rejected,
            };
            Ok(ClientCtx::new(identity))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orm::users::Role;
    use actix_web::test::TestRequest;
    use chrono::Utc;

    fn user(id: i32, role: Role) -> users::Model {
        let now = Utc::now().naive_utc();
        users::Model {
            id,
            email: format!("user{}@ada.edu.az", id),
            password_hash: String::new(),
            first_name: "Test".to_owned(),
            last_name: "User".to_owned(),
            role,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_bearer_token_parsing() {
        let req = TestRequest::default()
            .insert_header((AUTHORIZATION, "Bearer abc.def.ghi"))
            .to_http_request();
        assert_eq!(bearer_token(&req).as_deref(), Some("abc.def.ghi"));

        let req = TestRequest::default()
            .insert_header((AUTHORIZATION, "bearer   xyz"))
            .to_http_request();
        assert_eq!(bearer_token(&req).as_deref(), Some("xyz"));

        let req = TestRequest::default()
            .insert_header((AUTHORIZATION, "Basic dXNlcjpwYXNz"))
            .to_http_request();
        assert!(bearer_token(&req).is_none());

        let req = TestRequest::default().to_http_request();
        assert!(bearer_token(&req).is_none());
    }

    #[test]
    fn test_guest_requires_login() {
        let client = ClientCtx::default();
        assert!(!client.is_user());
        assert!(matches!(client.require_login(), Err(ApiError::Unauthorized(_))));
        assert!(matches!(
            client.require(Action::SubmitReview),
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_rejected_token_message() {
        let client = ClientCtx::new(Identity::Rejected);
        match client.require_login() {
            Err(ApiError::Unauthorized(msg)) => assert_eq!(msg, "Invalid or expired token"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_student_forbidden_from_admin_actions() {
        let client = ClientCtx::new(Identity::User(user(1, Role::Student)));
        assert!(client.require(Action::SubmitReview).is_ok());
        assert!(matches!(
            client.require(Action::ModerateReviews),
            Err(ApiError::Forbidden(_))
        ));
    }

    #[test]
    fn test_ownership() {
        let client = ClientCtx::new(Identity::User(user(1, Role::Student)));
        assert!(client.require_on(Action::EditReview, 1).is_ok());
        assert!(matches!(
            client.require_on(Action::EditReview, 2),
            Err(ApiError::Forbidden(_))
        ));

        let admin = ClientCtx::new(Identity::User(user(9, Role::Admin)));
        assert!(admin.require_on(Action::DeleteComment, 2).is_ok());
        assert!(admin.is_owner_or_admin(2));
    }
}

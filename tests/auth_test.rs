//! Registration, login and bearer token integration tests

mod common;

use actix_web::http::StatusCode;
use actix_web::{test, App};
use campus_reviews::orm::users::Role;
use common::{database::*, fixtures::*};
use serde_json::json;

#[actix_rt::test]
async fn test_register_returns_user_and_token() {
    let state = setup_test_state().await.expect("Failed to setup test state");
    let app = test::init_service(App::new().configure(|conf| state.configure(conf))).await;

    let req = test::TestRequest::post()
        .uri("/auth/register")
        .set_json(json!({
            "email": "Student@ADA.edu.az",
            "password": "password123",
            "firstName": "Aysel",
            "lastName": "Mammadova",
        }))
        .to_request();
    let (status, body) = send(&app, req).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["email"], "student@ada.edu.az");
    assert_eq!(body["user"]["role"], "STUDENT");
    assert_eq!(body["user"]["firstName"], "Aysel");
    assert!(body["user"].get("passwordHash").is_none());
    assert!(body["token"].as_str().map_or(false, |t| !t.is_empty()));

    // The issued token works right away.
    let token = body["token"].as_str().unwrap().to_owned();
    let req = test::TestRequest::get()
        .uri("/auth/me")
        .insert_header(bearer(&token))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "student@ada.edu.az");
}

#[actix_rt::test]
async fn test_register_rejects_foreign_domain() {
    let state = setup_test_state().await.expect("Failed to setup test state");
    let app = test::init_service(App::new().configure(|conf| state.configure(conf))).await;

    let req = test::TestRequest::post()
        .uri("/auth/register")
        .set_json(json!({
            "email": "student@gmail.com",
            "password": "password123",
            "firstName": "A",
            "lastName": "B",
        }))
        .to_request();
    let (status, body) = send(&app, req).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("ada.edu.az"));
}

#[actix_rt::test]
async fn test_register_validation_details() {
    let state = setup_test_state().await.expect("Failed to setup test state");
    let app = test::init_service(App::new().configure(|conf| state.configure(conf))).await;

    let req = test::TestRequest::post()
        .uri("/auth/register")
        .set_json(json!({
            "email": "student@ada.edu.az",
            "password": "short",
            "firstName": "",
            "lastName": "B",
        }))
        .to_request();
    let (status, body) = send(&app, req).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let fields: Vec<&str> = body["details"]
        .as_array()
        .expect("details should be a list")
        .iter()
        .map(|d| d["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"password"));
    assert!(fields.contains(&"firstName"));
}

#[actix_rt::test]
async fn test_register_cannot_claim_admin() {
    let state = setup_test_state().await.expect("Failed to setup test state");
    let app = test::init_service(App::new().configure(|conf| state.configure(conf))).await;

    let req = test::TestRequest::post()
        .uri("/auth/register")
        .set_json(json!({
            "email": "sneaky@ada.edu.az",
            "password": "password123",
            "firstName": "A",
            "lastName": "B",
            "role": "ADMIN",
        }))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/auth/register")
        .set_json(json!({
            "email": "prof@ada.edu.az",
            "password": "password123",
            "firstName": "A",
            "lastName": "B",
            "role": "PROFESSOR",
        }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["role"], "PROFESSOR");
}

#[actix_rt::test]
async fn test_register_duplicate_email_conflicts() {
    let state = setup_test_state().await.expect("Failed to setup test state");
    create_test_user(state.db.get_ref(), "taken@ada.edu.az", Role::Student)
        .await
        .expect("Failed to create user");
    let app = test::init_service(App::new().configure(|conf| state.configure(conf))).await;

    let req = test::TestRequest::post()
        .uri("/auth/register")
        .set_json(json!({
            "email": "TAKEN@ada.edu.az",
            "password": "password123",
            "firstName": "A",
            "lastName": "B",
        }))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[actix_rt::test]
async fn test_login() {
    let state = setup_test_state().await.expect("Failed to setup test state");
    create_test_user(state.db.get_ref(), "student@ada.edu.az", Role::Student)
        .await
        .expect("Failed to create user");
    let app = test::init_service(App::new().configure(|conf| state.configure(conf))).await;

    let req = test::TestRequest::post()
        .uri("/auth/login")
        .set_json(json!({ "email": "student@ada.edu.az", "password": TEST_PASSWORD }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "student@ada.edu.az");
    assert!(body["token"].is_string());

    let req = test::TestRequest::post()
        .uri("/auth/login")
        .set_json(json!({ "email": "student@ada.edu.az", "password": "wrong-password" }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid credentials");

    let req = test::TestRequest::post()
        .uri("/auth/login")
        .set_json(json!({ "email": "nobody@ada.edu.az", "password": TEST_PASSWORD }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid credentials");
}

#[actix_rt::test]
async fn test_malformed_json_is_bad_request() {
    let state = setup_test_state().await.expect("Failed to setup test state");
    let app = test::init_service(App::new().configure(|conf| state.configure(conf))).await;

    let req = test::TestRequest::post()
        .uri("/auth/login")
        .insert_header(("content-type", "application/json"))
        .set_payload("{not json")
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[actix_rt::test]
async fn test_me_requires_valid_token() {
    let state = setup_test_state().await.expect("Failed to setup test state");
    let app = test::init_service(App::new().configure(|conf| state.configure(conf))).await;

    let req = test::TestRequest::get().uri("/auth/me").to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::get()
        .uri("/auth/me")
        .insert_header(bearer("not.a.token"))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid or expired token");
}

#[actix_rt::test]
async fn test_expired_token_is_rejected() {
    let state = setup_test_state().await.expect("Failed to setup test state");
    let user = create_test_user(state.db.get_ref(), "student@ada.edu.az", Role::Student)
        .await
        .expect("Failed to create user");
    let token = state
        .tokens
        .generate_token_with_ttl(user.id, &user.email, user.role, chrono::Duration::hours(-2))
        .expect("Failed to sign token");
    let app = test::init_service(App::new().configure(|conf| state.configure(conf))).await;

    let req = test::TestRequest::get()
        .uri("/auth/me")
        .insert_header(bearer(&token))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_rt::test]
async fn test_deactivated_user_is_locked_out() {
    let state = setup_test_state().await.expect("Failed to setup test state");
    let (student, student_token) =
        create_user_with_token(&state, "student@ada.edu.az", Role::Student).await;
    let (_, admin_token) = create_user_with_token(&state, "admin@ada.edu.az", Role::Admin).await;
    let app = test::init_service(App::new().configure(|conf| state.configure(conf))).await;

    let req = test::TestRequest::post()
        .uri(&format!("/admin/users/{}/deactivate", student.id))
        .insert_header(bearer(&admin_token))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["isActive"], false);

    // Existing tokens stop resolving immediately.
    let req = test::TestRequest::get()
        .uri("/auth/me")
        .insert_header(bearer(&student_token))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Correct password, but the account is off.
    let req = test::TestRequest::post()
        .uri("/auth/login")
        .set_json(json!({ "email": "student@ada.edu.az", "password": TEST_PASSWORD }))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let req = test::TestRequest::post()
        .uri(&format!("/admin/users/{}/activate", student.id))
        .insert_header(bearer(&admin_token))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);

    let req = test::TestRequest::get()
        .uri("/auth/me")
        .insert_header(bearer(&student_token))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
}

#[actix_rt::test]
async fn test_logout_is_acknowledged() {
    let state = setup_test_state().await.expect("Failed to setup test state");
    let app = test::init_service(App::new().configure(|conf| state.configure(conf))).await;

    let req = test::TestRequest::post().uri("/auth/logout").to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].is_string());
}

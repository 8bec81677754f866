//! Admin statistics and account management integration tests

mod common;

use actix_web::http::StatusCode;
use actix_web::{test, App};
use campus_reviews::orm::users::Role;
use common::{database::*, fixtures::*};
use serde_json::json;

#[actix_rt::test]
async fn test_admin_routes_are_gated() {
    let state = setup_test_state().await.expect("Failed to setup test state");
    let (_, student) = create_user_with_token(&state, "student@ada.edu.az", Role::Student).await;
    let (_, professor) =
        create_user_with_token(&state, "professor@ada.edu.az", Role::Professor).await;
    let app = test::init_service(App::new().configure(|conf| state.configure(conf))).await;

    for uri in ["/admin/stats", "/admin/reviews"] {
        let req = test::TestRequest::get().uri(uri).to_request();
        let (status, _) = send(&app, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", uri);

        for token in [&student, &professor] {
            let req = test::TestRequest::get()
                .uri(uri)
                .insert_header(bearer(token))
                .to_request();
            let (status, _) = send(&app, req).await;
            assert_eq!(status, StatusCode::FORBIDDEN, "{}", uri);
        }
    }

    let req = test::TestRequest::post()
        .uri("/admin/users/1/deactivate")
        .insert_header(bearer(&student))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_rt::test]
async fn test_platform_stats() {
    let state = setup_test_state().await.expect("Failed to setup test state");
    let db = state.db.get_ref();
    let course = create_test_course(db, "CS101", "Intro to Programming", "Computer Science")
        .await
        .expect("Failed to create course");
    let professor = create_test_professor(db, "Jane", "Doe")
        .await
        .expect("Failed to create professor");
    let (_, admin) = create_user_with_token(&state, "admin@ada.edu.az", Role::Admin).await;
    let (first, first_token) =
        create_user_with_token(&state, "first@ada.edu.az", Role::Student).await;
    let (second, _) = create_user_with_token(&state, "second@ada.edu.az", Role::Student).await;
    let approved = create_test_review(db, first.id, Some(course.id), None, 5, true)
        .await
        .expect("Failed to create review");
    create_test_review(db, second.id, None, Some(professor.id), 2, true)
        .await
        .expect("Failed to create review");
    create_test_review(db, second.id, Some(course.id), None, 1, false)
        .await
        .expect("Failed to create review");
    let app = test::init_service(App::new().configure(|conf| state.configure(conf))).await;

    let req = test::TestRequest::post()
        .uri("/reports")
        .insert_header(bearer(&first_token))
        .set_json(json!({ "reviewId": approved.id, "reason": "OTHER" }))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::CREATED);

    let req = test::TestRequest::get()
        .uri("/admin/stats")
        .insert_header(bearer(&admin))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["users"]["total"], 3);
    assert_eq!(body["courses"]["total"], 1);
    assert_eq!(body["professors"]["total"], 1);
    assert_eq!(body["reviews"]["total"], 3);
    assert_eq!(body["reviews"]["approved"], 2);
    assert_eq!(body["reviews"]["pending"], 1);
    assert_eq!(body["reviews"]["averageRating"], 3.5);
    assert_eq!(body["reports"]["total"], 1);
    assert_eq!(body["reports"]["pending"], 1);
}

#[actix_rt::test]
async fn test_review_queue_filters() {
    let state = setup_test_state().await.expect("Failed to setup test state");
    let db = state.db.get_ref();
    let course = create_test_course(db, "CS101", "Intro to Programming", "Computer Science")
        .await
        .expect("Failed to create course");
    let (_, admin) = create_user_with_token(&state, "admin@ada.edu.az", Role::Admin).await;
    for (n, approved) in [true, false, false].into_iter().enumerate() {
        let user = create_test_user(db, &format!("s{}@ada.edu.az", n), Role::Student)
            .await
            .expect("Failed to create user");
        create_test_review(db, user.id, Some(course.id), None, 3, approved)
            .await
            .expect("Failed to create review");
    }
    let app = test::init_service(App::new().configure(|conf| state.configure(conf))).await;

    for (filter, expected) in [("", 3), ("?status=all", 3), ("?status=pending", 2), ("?status=approved", 1)] {
        let req = test::TestRequest::get()
            .uri(&format!("/admin/reviews{}", filter))
            .insert_header(bearer(&admin))
            .to_request();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pagination"]["total"], expected, "filter {:?}", filter);
    }

    let req = test::TestRequest::get()
        .uri("/admin/reviews?status=sideways")
        .insert_header(bearer(&admin))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_rt::test]
async fn test_account_status_management() {
    let state = setup_test_state().await.expect("Failed to setup test state");
    let (admin_user, admin) = create_user_with_token(&state, "admin@ada.edu.az", Role::Admin).await;
    let app = test::init_service(App::new().configure(|conf| state.configure(conf))).await;

    let req = test::TestRequest::post()
        .uri(&format!("/admin/users/{}/deactivate", admin_user.id))
        .insert_header(bearer(&admin))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/admin/users/999/deactivate")
        .insert_header(bearer(&admin))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "User not found");

    // Still usable afterwards.
    let req = test::TestRequest::get()
        .uri("/auth/me")
        .insert_header(bearer(&admin))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["isActive"], true);
}

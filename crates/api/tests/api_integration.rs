//! API integration tests.
//!
//! These tests drive the full router (auth middleware included) against a
//! mock database.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::redundant_clone)]

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
    middleware,
};
use chrono::Utc;
use coursehub_api::{health_router, middleware::AppState, router as api_router};
use coursehub_common::config::{AuthConfig, Config, CreditConfig, DatabaseConfig, ServerConfig};
use coursehub_db::entities::user::{self, Role, UserStatus};
use sea_orm::{DatabaseBackend, MockDatabase};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

/// Create a test configuration.
fn create_test_config() -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 3000,
        },
        database: DatabaseConfig {
            url: "postgres://localhost/test".to_string(),
            max_connections: 10,
            min_connections: 1,
        },
        auth: AuthConfig {
            jwt_secret: "integration-secret".to_string(),
            token_ttl_secs: 3600,
        },
        credit: CreditConfig::default(),
    }
}

fn test_user(id: &str, role: Role) -> user::Model {
    user::Model {
        id: id.to_string(),
        username: id.to_string(),
        password_hash: String::new(),
        name: None,
        phone: None,
        role,
        status: UserStatus::Active,
        organization_id: None,
        advisor_id: None,
        created_at: Utc::now().into(),
        updated_at: None,
    }
}

/// Create test app state over the given mock database.
fn create_test_state(db: MockDatabase) -> AppState {
    AppState::new(Arc::new(db.into_connection()), &create_test_config())
}

/// Create the app the way the server binary does.
fn create_test_app(state: AppState) -> Router {
    Router::new()
        .merge(health_router())
        .nest("/api", api_router())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            coursehub_api::middleware::auth_middleware,
        ))
        .with_state(state)
}

/// Token for `user`, plus a mock database that resolves it once.
fn authenticated(user: &user::Model) -> (AppState, String) {
    let db = MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[user.clone()]]);
    let state = create_test_state(db);
    let (token, _) = state.user_service.issue_token(user).unwrap();
    (state, token)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app(create_test_state(MockDatabase::new(DatabaseBackend::Postgres)));

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["code"], 200);
    assert_eq!(body["msg"], "success");
    assert_eq!(body["data"]["status"], "ok");
}

#[tokio::test]
async fn test_me_without_token_is_unauthorized() {
    let app = create_test_app(create_test_state(MockDatabase::new(DatabaseBackend::Postgres)));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/auth/me")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["code"], 2000);
    assert!(body["data"].is_null());
}

#[tokio::test]
async fn test_me_with_token() {
    let user = test_user("u1", Role::Student);
    let (state, token) = authenticated(&user);
    let app = create_test_app(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/auth/me")
                .header("Authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["id"], "u1");
    assert_eq!(body["data"]["role"], "STUDENT");
    assert!(body["data"].get("passwordHash").is_none());
}

#[tokio::test]
async fn test_login_unknown_user() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([Vec::<user::Model>::new()]);
    let app = create_test_app(create_test_state(db));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/auth/login")
                .method("POST")
                .header("Content-Type", "application/json")
                .body(Body::from(r#"{"username":"ghost","password":"password123"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["code"], 3003);
}

#[tokio::test]
async fn test_register_with_invalid_json_returns_error() {
    let app = create_test_app(create_test_state(MockDatabase::new(DatabaseBackend::Postgres)));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/auth/register")
                .method("POST")
                .header("Content-Type", "application/json")
                .body(Body::from("not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_student_cannot_allocate_credits() {
    let user = test_user("u1", Role::Student);
    let (state, token) = authenticated(&user);
    let app = create_test_app(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/credits/allocate")
                .method("POST")
                .header("Authorization", format!("Bearer {token}"))
                .header("Content-Type", "application/json")
                .body(Body::from(r#"{"userId":"u2","amount":10}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(body["code"], 2002);
}

#[tokio::test]
async fn test_teacher_permissions_listed() {
    let user = test_user("t1", Role::Teacher);
    let (state, token) = authenticated(&user);
    let app = create_test_app(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/permissions/mine")
                .header("Authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let permissions = body["data"]["permissions"].as_array().unwrap();
    assert!(permissions.iter().any(|p| p == "course:create"));
    assert!(!permissions.iter().any(|p| p == "permission:manage"));
}

#[tokio::test]
async fn test_unknown_endpoint_returns_404() {
    let app = create_test_app(create_test_state(MockDatabase::new(DatabaseBackend::Postgres)));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/nonexistent")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

//! Integration tests for registration, email verification, and login.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;

/// Start the server on a random port; returns (base_url, db).
async fn start_test_server() -> (String, taskwire_server::db::DbPool) {
    let tmp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let data_dir = tmp_dir.path().to_str().unwrap().to_string();

    let db = taskwire_server::db::init_db(&data_dir).expect("Failed to init DB");
    let jwt_secret = taskwire_server::auth::jwt::load_or_generate_jwt_secret(&data_dir)
        .expect("Failed to generate JWT secret");

    let state = taskwire_server::state::AppState {
        db: db.clone(),
        jwt_secret,
        hub: Arc::new(taskwire_server::realtime::dispatcher::EventHub::new()),
        mailer: taskwire_server::mailer::Mailer::Log,
        public_base_url: "http://localhost:8080".to_string(),
        cors_origin: "http://localhost:3000".to_string(),
    };

    let app = taskwire_server::routes::build_router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
        let _keep = tmp_dir;
    });

    (format!("http://{}", addr), db)
}

fn verification_token(db: &taskwire_server::db::DbPool, user_id: i64) -> String {
    let conn = db.lock().unwrap();
    conn.query_row(
        "SELECT verification_token FROM users WHERE id = ?1",
        [user_id],
        |row| row.get(0),
    )
    .unwrap()
}

#[tokio::test]
async fn test_register_verify_login_flow() {
    let (base_url, db) = start_test_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/auth/register", base_url))
        .json(&serde_json::json!({
            "username": "carol",
            "email": "carol@example.com",
            "password": "secret-password",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: serde_json::Value = resp.json().await.unwrap();
    let user_id = body["user_id"].as_i64().unwrap();
    assert!(user_id > 0);

    // Login before verification is refused
    let resp = client
        .post(format!("{}/auth/login", base_url))
        .json(&serde_json::json!({ "email": "carol@example.com", "password": "secret-password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let token = verification_token(&db, user_id);
    let resp = client
        .get(format!("{}/auth/verify-email?token={}", base_url, token))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client
        .post(format!("{}/auth/login", base_url))
        .json(&serde_json::json!({ "email": "carol@example.com", "password": "secret-password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(!body["access_token"].as_str().unwrap().is_empty());
    assert_eq!(body["user"]["username"], "carol");
    assert_eq!(body["user"]["email"], "carol@example.com");
}

#[tokio::test]
async fn test_duplicate_username_and_email_rejected() {
    let (base_url, _db) = start_test_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/auth/register", base_url))
        .json(&serde_json::json!({
            "username": "dave",
            "email": "dave@example.com",
            "password": "secret-password",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    // Same username, different email
    let resp = client
        .post(format!("{}/auth/register", base_url))
        .json(&serde_json::json!({
            "username": "dave",
            "email": "dave2@example.com",
            "password": "secret-password",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);

    // Same email, different username
    let resp = client
        .post(format!("{}/auth/register", base_url))
        .json(&serde_json::json!({
            "username": "dave2",
            "email": "dave@example.com",
            "password": "secret-password",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);
}

#[tokio::test]
async fn test_invalid_registration_input_rejected() {
    let (base_url, _db) = start_test_server().await;
    let client = reqwest::Client::new();

    // Email without @
    let resp = client
        .post(format!("{}/auth/register", base_url))
        .json(&serde_json::json!({
            "username": "erin",
            "email": "not-an-email",
            "password": "secret-password",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    // Password too short
    let resp = client
        .post(format!("{}/auth/register", base_url))
        .json(&serde_json::json!({
            "username": "erin",
            "email": "erin@example.com",
            "password": "short",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    // Username collapses below the length floor
    let resp = client
        .post(format!("{}/auth/register", base_url))
        .json(&serde_json::json!({
            "username": "!!",
            "email": "erin@example.com",
            "password": "secret-password",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_wrong_password_rejected() {
    let (base_url, db) = start_test_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/auth/register", base_url))
        .json(&serde_json::json!({
            "username": "frank",
            "email": "frank@example.com",
            "password": "secret-password",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: serde_json::Value = resp.json().await.unwrap();
    let token = verification_token(&db, body["user_id"].as_i64().unwrap());
    client
        .get(format!("{}/auth/verify-email?token={}", base_url, token))
        .send()
        .await
        .unwrap();

    let resp = client
        .post(format!("{}/auth/login", base_url))
        .json(&serde_json::json!({ "email": "frank@example.com", "password": "wrong-password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    // Unknown email gets the same answer
    let resp = client
        .post(format!("{}/auth/login", base_url))
        .json(&serde_json::json!({ "email": "nobody@example.com", "password": "wrong-password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_invalid_verification_token_rejected() {
    let (base_url, _db) = start_test_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{}/auth/verify-email?token=bogus", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let (base_url, _db) = start_test_server().await;
    let client = reqwest::Client::new();

    let resp = client.get(format!("{}/tasks", base_url)).send().await.unwrap();
    assert_eq!(resp.status(), 401);

    let resp = client
        .get(format!("{}/tasks", base_url))
        .bearer_auth("garbage-token")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

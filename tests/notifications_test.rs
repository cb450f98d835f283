//! Integration tests for the notification endpoints and the writer that
//! records CRUD activity.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

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

async fn register_and_login(
    base_url: &str,
    db: &taskwire_server::db::DbPool,
    username: &str,
) -> String {
    let client = reqwest::Client::new();
    let email = format!("{}@example.com", username);

    let resp = client
        .post(format!("{}/auth/register", base_url))
        .json(&serde_json::json!({
            "username": username,
            "email": email,
            "password": "correct-horse",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201, "Registration failed for {}", username);
    let body: serde_json::Value = resp.json().await.unwrap();
    let user_id = body["user_id"].as_i64().unwrap();

    let token: String = {
        let conn = db.lock().unwrap();
        conn.query_row(
            "SELECT verification_token FROM users WHERE id = ?1",
            [user_id],
            |row| row.get(0),
        )
        .unwrap()
    };
    client
        .get(format!("{}/auth/verify-email?token={}", base_url, token))
        .send()
        .await
        .unwrap();

    let resp = client
        .post(format!("{}/auth/login", base_url))
        .json(&serde_json::json!({ "email": email, "password": "correct-horse" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200, "Login failed for {}", username);
    let body: serde_json::Value = resp.json().await.unwrap();
    body["access_token"].as_str().unwrap().to_string()
}

async fn create_task(base_url: &str, token: &str, title: &str) {
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{}/tasks", base_url))
        .bearer_auth(token)
        .json(&serde_json::json!({ "title": title, "status": "pending" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
}

#[tokio::test]
async fn test_mutations_write_notifications_newest_first() {
    let (base_url, db) = start_test_server().await;
    let token = register_and_login(&base_url, &db, "notifuser1").await;
    let client = reqwest::Client::new();

    create_task(&base_url, &token, "first").await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    create_task(&base_url, &token, "second").await;

    let resp = client
        .get(format!("{}/notifications", base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    let notifications = body["notifications"].as_array().unwrap();
    assert_eq!(notifications.len(), 2);
    assert_eq!(notifications[0]["message"], "New task created: second");
    assert_eq!(notifications[1]["message"], "New task created: first");
    assert_eq!(notifications[0]["isRead"], false);
}

#[tokio::test]
async fn test_mark_all_notifications_read() {
    let (base_url, db) = start_test_server().await;
    let token = register_and_login(&base_url, &db, "notifuser2").await;
    let client = reqwest::Client::new();

    create_task(&base_url, &token, "one").await;
    create_task(&base_url, &token, "two").await;

    let resp = client
        .patch(format!("{}/notifications/read", base_url))
        .bearer_auth(&token)
        .json(&serde_json::json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client
        .get(format!("{}/notifications", base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    for notification in body["notifications"].as_array().unwrap() {
        assert_eq!(notification["isRead"], true);
    }
}

#[tokio::test]
async fn test_mark_specific_notifications_read() {
    let (base_url, db) = start_test_server().await;
    let token = register_and_login(&base_url, &db, "notifuser3").await;
    let client = reqwest::Client::new();

    create_task(&base_url, &token, "one").await;
    create_task(&base_url, &token, "two").await;

    let resp = client
        .get(format!("{}/notifications", base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    let first_id = body["notifications"][0]["id"].as_i64().unwrap();

    let resp = client
        .patch(format!("{}/notifications/read", base_url))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "notificationIDs": [first_id] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client
        .get(format!("{}/notifications", base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    for notification in body["notifications"].as_array().unwrap() {
        let expect_read = notification["id"].as_i64().unwrap() == first_id;
        assert_eq!(notification["isRead"], expect_read);
    }
}

#[tokio::test]
async fn test_mark_read_with_no_notifications_is_404() {
    let (base_url, db) = start_test_server().await;
    let token = register_and_login(&base_url, &db, "notifuser4").await;
    let client = reqwest::Client::new();

    let resp = client
        .patch(format!("{}/notifications/read", base_url))
        .bearer_auth(&token)
        .json(&serde_json::json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_notifications_scoped_to_caller() {
    let (base_url, db) = start_test_server().await;
    let token_a = register_and_login(&base_url, &db, "notif_owner_a").await;
    let token_b = register_and_login(&base_url, &db, "notif_owner_b").await;
    let client = reqwest::Client::new();

    create_task(&base_url, &token_a, "a-task").await;

    let resp = client
        .get(format!("{}/notifications", base_url))
        .bearer_auth(&token_b)
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["notifications"].as_array().unwrap().is_empty());
}

//! Integration tests for the project CRUD endpoints.

use std::net::SocketAddr;
use std::sync::Arc;

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

#[tokio::test]
async fn test_project_crud_lifecycle() {
    let (base_url, db) = start_test_server().await;
    let token = register_and_login(&base_url, &db, "projuser1").await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/projects", base_url))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "name": "Kitchen remodel", "description": "spring" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: serde_json::Value = resp.json().await.unwrap();
    let project_id = body["project"]["id"].as_i64().unwrap();
    assert_eq!(body["project"]["name"], "Kitchen remodel");

    let resp = client
        .get(format!("{}/projects", base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["projects"].as_array().unwrap().len(), 1);

    let resp = client
        .get(format!("{}/projects/{}", base_url, project_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client
        .put(format!("{}/projects/{}", base_url, project_id))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "name": "Kitchen remodel 2.0", "description": "summer" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["project"]["name"], "Kitchen remodel 2.0");

    let resp = client
        .delete(format!("{}/projects/{}", base_url, project_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client
        .get(format!("{}/projects/{}", base_url, project_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_empty_project_name_rejected() {
    let (base_url, db) = start_test_server().await;
    let token = register_and_login(&base_url, &db, "projuser2").await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/projects", base_url))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "name": "  " }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_deleting_project_removes_its_tasks() {
    let (base_url, db) = start_test_server().await;
    let token = register_and_login(&base_url, &db, "projuser3").await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/projects", base_url))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "name": "Doomed project" }))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    let project_id = body["project"]["id"].as_i64().unwrap();

    // Two tasks inside the project, one outside
    for title in ["attached one", "attached two"] {
        let resp = client
            .post(format!("{}/tasks", base_url))
            .bearer_auth(&token)
            .json(&serde_json::json!({
                "title": title,
                "status": "pending",
                "project_id": project_id,
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
    }
    let resp = client
        .post(format!("{}/tasks", base_url))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "title": "standalone", "status": "pending" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    let resp = client
        .delete(format!("{}/projects/{}", base_url, project_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // Only the standalone task survives
    let resp = client
        .get(format!("{}/tasks", base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    let tasks = body["tasks"].as_array().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["title"], "standalone");
}

#[tokio::test]
async fn test_projects_are_scoped_to_their_owner() {
    let (base_url, db) = start_test_server().await;
    let token_a = register_and_login(&base_url, &db, "proj_owner_a").await;
    let token_b = register_and_login(&base_url, &db, "proj_owner_b").await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/projects", base_url))
        .bearer_auth(&token_a)
        .json(&serde_json::json!({ "name": "A's project" }))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    let project_id = body["project"]["id"].as_i64().unwrap();

    let resp = client
        .get(format!("{}/projects/{}", base_url, project_id))
        .bearer_auth(&token_b)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let resp = client
        .delete(format!("{}/projects/{}", base_url, project_id))
        .bearer_auth(&token_b)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

/// Database row types for all tables.
/// These correspond 1:1 to the SQLite schema defined in migrations.rs.
/// Serialize impls define the wire shape the web client parses, both in
/// REST responses and in event payloads.
use serde::Serialize;

/// User record in the users table. Never serialized whole — `UserView`
/// picks the public fields.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub verified: bool,
    pub verification_token: Option<String>,
    pub created_at: String,
}

/// Public view of a user returned by the /users endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    pub user_id: i64,
    pub username: String,
    pub email: String,
}

/// Task row; `project_id` is optional, a task may live outside any
/// project.
#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub id: i64,
    pub user_id: i64,
    pub project_id: Option<i64>,
    pub title: String,
    pub description: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Project row.
#[derive(Debug, Clone, Serialize)]
pub struct Project {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub description: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Notification row. The client's notification view predates the other
/// endpoints and expects camelCase keys with `userID` spelled with a
/// capital D.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: i64,
    #[serde(rename = "userID")]
    pub user_id: i64,
    pub message: String,
    pub is_read: bool,
    pub created_at: String,
    pub updated_at: String,
}

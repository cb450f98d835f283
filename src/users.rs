//! User directory endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::auth::middleware::Claims;
use crate::db::models::UserView;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub message: String,
    pub users: Vec<UserView>,
}

#[derive(Debug, Serialize)]
pub struct UserDetailsResponse {
    pub message: String,
    pub user: UserView,
}

fn db_error<E>(_: E) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
}

/// GET /users
pub async fn list_users(
    State(state): State<AppState>,
    _claims: Claims,
) -> Result<Json<UserListResponse>, (StatusCode, String)> {
    let db = state.db.clone();

    let users = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(db_error)?;
        let mut stmt = conn
            .prepare("SELECT id, username, email FROM users")
            .map_err(db_error)?;

        let users: Vec<UserView> = stmt
            .query_map([], |row| {
                Ok(UserView {
                    user_id: row.get(0)?,
                    username: row.get(1)?,
                    email: row.get(2)?,
                })
            })
            .map_err(db_error)?
            .filter_map(|r| r.ok())
            .collect();

        Ok::<_, (StatusCode, String)>(users)
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??;

    Ok(Json(UserListResponse {
        message: "Users retrieved successfully".to_string(),
        users,
    }))
}

/// GET /users/{id}
pub async fn user_details(
    State(state): State<AppState>,
    _claims: Claims,
    Path(id): Path<i64>,
) -> Result<Json<UserDetailsResponse>, (StatusCode, String)> {
    let db = state.db.clone();

    let user = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(db_error)?;
        let result = conn.query_row(
            "SELECT id, username, email FROM users WHERE id = ?1",
            [id],
            |row| {
                Ok(UserView {
                    user_id: row.get(0)?,
                    username: row.get(1)?,
                    email: row.get(2)?,
                })
            },
        );
        match result {
            Ok(user) => Ok(user),
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                Err((StatusCode::NOT_FOUND, "User not found".to_string()))
            }
            Err(e) => Err(db_error(e)),
        }
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??;

    Ok(Json(UserDetailsResponse {
        message: "User details retrieved".to_string(),
        user,
    }))
}

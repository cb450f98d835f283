//! Task CRUD endpoints. Every successful mutation writes a notification
//! and publishes the task event after the row is committed.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::auth::middleware::Claims;
use crate::db::models::Task;
use crate::notifications;
use crate::realtime::events::EventPayload;
use crate::realtime::StreamChannel;
use crate::state::AppState;

const VALID_STATUSES: [&str; 3] = ["pending", "in-progress", "done"];

// --- Request/response types ---

#[derive(Debug, Deserialize)]
pub struct TaskInput {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: String,
    #[serde(default)]
    pub project_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct StatusInput {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct TaskResponse {
    pub message: String,
    pub task: Task,
}

#[derive(Debug, Serialize)]
pub struct TaskListResponse {
    pub message: String,
    pub tasks: Vec<Task>,
}

fn validate_status(status: &str) -> Result<(), (StatusCode, String)> {
    if VALID_STATUSES.contains(&status) {
        Ok(())
    } else {
        Err((
            StatusCode::BAD_REQUEST,
            format!("status must be one of: {}", VALID_STATUSES.join(", ")),
        ))
    }
}

fn validate_input(input: &TaskInput) -> Result<(), (StatusCode, String)> {
    if input.title.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "title is required".to_string()));
    }
    validate_status(&input.status)
}

/// Fetch one task scoped to its owner.
fn fetch_task(conn: &Connection, id: i64, user_id: i64) -> Result<Task, rusqlite::Error> {
    conn.query_row(
        "SELECT id, user_id, project_id, title, description, status, created_at, updated_at
         FROM tasks WHERE id = ?1 AND user_id = ?2",
        rusqlite::params![id, user_id],
        |row| {
            Ok(Task {
                id: row.get(0)?,
                user_id: row.get(1)?,
                project_id: row.get(2)?,
                title: row.get(3)?,
                description: row.get(4)?,
                status: row.get(5)?,
                created_at: row.get(6)?,
                updated_at: row.get(7)?,
            })
        },
    )
}

fn not_found(id: i64) -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, format!("Task with ID {} not found", id))
}

fn db_error<E>(_: E) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
}

// --- Handlers ---

/// GET /tasks — all tasks owned by the caller.
pub async fn list_tasks(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<Json<TaskListResponse>, (StatusCode, String)> {
    let db = state.db.clone();
    let user_id = claims.sub;

    let tasks = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(db_error)?;
        let mut stmt = conn
            .prepare(
                "SELECT id, user_id, project_id, title, description, status, created_at, updated_at
                 FROM tasks WHERE user_id = ?1",
            )
            .map_err(db_error)?;

        let tasks: Vec<Task> = stmt
            .query_map([user_id], |row| {
                Ok(Task {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    project_id: row.get(2)?,
                    title: row.get(3)?,
                    description: row.get(4)?,
                    status: row.get(5)?,
                    created_at: row.get(6)?,
                    updated_at: row.get(7)?,
                })
            })
            .map_err(db_error)?
            .filter_map(|r| r.ok())
            .collect();

        Ok::<_, (StatusCode, String)>(tasks)
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??;

    Ok(Json(TaskListResponse {
        message: "Tasks retrieved successfully".to_string(),
        tasks,
    }))
}

/// GET /tasks/{id}
pub async fn task_details(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i64>,
) -> Result<Json<TaskResponse>, (StatusCode, String)> {
    let db = state.db.clone();
    let user_id = claims.sub;

    let task = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(db_error)?;
        match fetch_task(&conn, id, user_id) {
            Ok(task) => Ok(task),
            Err(rusqlite::Error::QueryReturnedNoRows) => Err(not_found(id)),
            Err(e) => Err(db_error(e)),
        }
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??;

    Ok(Json(TaskResponse {
        message: "Task retrieved successfully".to_string(),
        task,
    }))
}

/// POST /tasks
pub async fn create_task(
    State(state): State<AppState>,
    claims: Claims,
    Json(input): Json<TaskInput>,
) -> Result<(StatusCode, Json<TaskResponse>), (StatusCode, String)> {
    validate_input(&input)?;

    let db = state.db.clone();
    let user_id = claims.sub;

    let task = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(db_error)?;
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO tasks (user_id, project_id, title, description, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            rusqlite::params![user_id, input.project_id, input.title, input.description, input.status, now],
        )
        .map_err(db_error)?;

        fetch_task(&conn, conn.last_insert_rowid(), user_id).map_err(db_error)
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??;

    notifications::send_notification(&state, user_id, &format!("New task created: {}", task.title))
        .await;
    state
        .hub
        .publish(user_id, StreamChannel::Tasks, &EventPayload::TaskUpdated(task.clone()))
        .await;

    Ok((
        StatusCode::CREATED,
        Json(TaskResponse {
            message: "Task created successfully".to_string(),
            task,
        }),
    ))
}

/// PUT /tasks/{id}
pub async fn update_task(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i64>,
    Json(input): Json<TaskInput>,
) -> Result<Json<TaskResponse>, (StatusCode, String)> {
    validate_input(&input)?;

    let db = state.db.clone();
    let user_id = claims.sub;

    let task = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(db_error)?;
        let now = Utc::now().to_rfc3339();
        let updated = conn
            .execute(
                "UPDATE tasks SET title = ?1, description = ?2, status = ?3, project_id = ?4, updated_at = ?5
                 WHERE id = ?6 AND user_id = ?7",
                rusqlite::params![input.title, input.description, input.status, input.project_id, now, id, user_id],
            )
            .map_err(db_error)?;

        if updated == 0 {
            return Err(not_found(id));
        }
        fetch_task(&conn, id, user_id).map_err(db_error)
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??;

    notifications::send_notification(&state, user_id, &format!("Task updated: {}", task.title))
        .await;
    state
        .hub
        .publish(user_id, StreamChannel::Tasks, &EventPayload::TaskUpdated(task.clone()))
        .await;

    Ok(Json(TaskResponse {
        message: "Task updated successfully".to_string(),
        task,
    }))
}

/// PATCH /tasks/{id}/status
pub async fn update_task_status(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i64>,
    Json(input): Json<StatusInput>,
) -> Result<Json<TaskResponse>, (StatusCode, String)> {
    validate_status(&input.status)?;

    let db = state.db.clone();
    let user_id = claims.sub;

    let task = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(db_error)?;
        let now = Utc::now().to_rfc3339();
        let updated = conn
            .execute(
                "UPDATE tasks SET status = ?1, updated_at = ?2 WHERE id = ?3 AND user_id = ?4",
                rusqlite::params![input.status, now, id, user_id],
            )
            .map_err(db_error)?;

        if updated == 0 {
            return Err(not_found(id));
        }
        fetch_task(&conn, id, user_id).map_err(db_error)
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??;

    notifications::send_notification(
        &state,
        user_id,
        &format!("Task status updated to {}: {}", task.status, task.title),
    )
    .await;
    state
        .hub
        .publish(user_id, StreamChannel::Tasks, &EventPayload::TaskUpdated(task.clone()))
        .await;

    Ok(Json(TaskResponse {
        message: "Task status updated successfully".to_string(),
        task,
    }))
}

/// DELETE /tasks/{id}
pub async fn delete_task(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let db = state.db.clone();
    let user_id = claims.sub;

    // Fetch before deleting so the event carries the final snapshot.
    let task = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(db_error)?;
        let task = match fetch_task(&conn, id, user_id) {
            Ok(task) => task,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Err(not_found(id)),
            Err(e) => return Err(db_error(e)),
        };

        conn.execute(
            "DELETE FROM tasks WHERE id = ?1 AND user_id = ?2",
            rusqlite::params![id, user_id],
        )
        .map_err(db_error)?;

        Ok::<_, (StatusCode, String)>(task)
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??;

    notifications::send_notification(&state, user_id, &format!("Task deleted: {}", task.title))
        .await;
    state
        .hub
        .publish(user_id, StreamChannel::Tasks, &EventPayload::TaskDeleted(task))
        .await;

    Ok(Json(serde_json::json!({ "message": "Task deleted successfully" })))
}

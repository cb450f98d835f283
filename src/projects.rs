//! Project CRUD endpoints. Mutations notify and publish project events
//! after commit; deleting a project removes its tasks first.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::auth::middleware::Claims;
use crate::db::models::Project;
use crate::notifications;
use crate::realtime::events::EventPayload;
use crate::realtime::StreamChannel;
use crate::state::AppState;

// --- Request/response types ---

#[derive(Debug, Deserialize)]
pub struct ProjectInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct ProjectResponse {
    pub message: String,
    pub project: Project,
}

#[derive(Debug, Serialize)]
pub struct ProjectListResponse {
    pub message: String,
    pub projects: Vec<Project>,
}

fn validate_input(input: &ProjectInput) -> Result<(), (StatusCode, String)> {
    if input.name.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "name is required".to_string()));
    }
    Ok(())
}

fn fetch_project(conn: &Connection, id: i64, user_id: i64) -> Result<Project, rusqlite::Error> {
    conn.query_row(
        "SELECT id, user_id, name, description, created_at, updated_at
         FROM projects WHERE id = ?1 AND user_id = ?2",
        rusqlite::params![id, user_id],
        |row| {
            Ok(Project {
                id: row.get(0)?,
                user_id: row.get(1)?,
                name: row.get(2)?,
                description: row.get(3)?,
                created_at: row.get(4)?,
                updated_at: row.get(5)?,
            })
        },
    )
}

fn not_found(id: i64) -> (StatusCode, String) {
    (
        StatusCode::NOT_FOUND,
        format!("Project with ID {} not found", id),
    )
}

fn db_error<E>(_: E) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
}

// --- Handlers ---

/// GET /projects
pub async fn list_projects(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<Json<ProjectListResponse>, (StatusCode, String)> {
    let db = state.db.clone();
    let user_id = claims.sub;

    let projects = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(db_error)?;
        let mut stmt = conn
            .prepare(
                "SELECT id, user_id, name, description, created_at, updated_at
                 FROM projects WHERE user_id = ?1",
            )
            .map_err(db_error)?;

        let projects: Vec<Project> = stmt
            .query_map([user_id], |row| {
                Ok(Project {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    name: row.get(2)?,
                    description: row.get(3)?,
                    created_at: row.get(4)?,
                    updated_at: row.get(5)?,
                })
            })
            .map_err(db_error)?
            .filter_map(|r| r.ok())
            .collect();

        Ok::<_, (StatusCode, String)>(projects)
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??;

    Ok(Json(ProjectListResponse {
        message: "Projects retrieved successfully".to_string(),
        projects,
    }))
}

/// GET /projects/{id}
pub async fn project_details(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i64>,
) -> Result<Json<ProjectResponse>, (StatusCode, String)> {
    let db = state.db.clone();
    let user_id = claims.sub;

    let project = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(db_error)?;
        match fetch_project(&conn, id, user_id) {
            Ok(project) => Ok(project),
            Err(rusqlite::Error::QueryReturnedNoRows) => Err(not_found(id)),
            Err(e) => Err(db_error(e)),
        }
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??;

    Ok(Json(ProjectResponse {
        message: "Project retrieved successfully".to_string(),
        project,
    }))
}

/// POST /projects
pub async fn create_project(
    State(state): State<AppState>,
    claims: Claims,
    Json(input): Json<ProjectInput>,
) -> Result<(StatusCode, Json<ProjectResponse>), (StatusCode, String)> {
    validate_input(&input)?;

    let db = state.db.clone();
    let user_id = claims.sub;

    let project = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(db_error)?;
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO projects (user_id, name, description, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            rusqlite::params![user_id, input.name, input.description, now],
        )
        .map_err(db_error)?;

        fetch_project(&conn, conn.last_insert_rowid(), user_id).map_err(db_error)
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??;

    notifications::send_notification(
        &state,
        user_id,
        &format!("New project created: {}", project.name),
    )
    .await;
    state
        .hub
        .publish(
            user_id,
            StreamChannel::Projects,
            &EventPayload::ProjectCreated(project.clone()),
        )
        .await;

    Ok((
        StatusCode::CREATED,
        Json(ProjectResponse {
            message: "Project created successfully".to_string(),
            project,
        }),
    ))
}

/// PUT /projects/{id}
pub async fn update_project(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i64>,
    Json(input): Json<ProjectInput>,
) -> Result<Json<ProjectResponse>, (StatusCode, String)> {
    validate_input(&input)?;

    let db = state.db.clone();
    let user_id = claims.sub;

    let project = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(db_error)?;
        let now = Utc::now().to_rfc3339();
        let updated = conn
            .execute(
                "UPDATE projects SET name = ?1, description = ?2, updated_at = ?3
                 WHERE id = ?4 AND user_id = ?5",
                rusqlite::params![input.name, input.description, now, id, user_id],
            )
            .map_err(db_error)?;

        if updated == 0 {
            return Err(not_found(id));
        }
        fetch_project(&conn, id, user_id).map_err(db_error)
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??;

    notifications::send_notification(&state, user_id, &format!("Project updated: {}", project.name))
        .await;
    state
        .hub
        .publish(
            user_id,
            StreamChannel::Projects,
            &EventPayload::ProjectUpdated(project.clone()),
        )
        .await;

    Ok(Json(ProjectResponse {
        message: "Project updated successfully".to_string(),
        project,
    }))
}

/// DELETE /projects/{id} — removes the project's tasks first.
pub async fn delete_project(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let db = state.db.clone();
    let user_id = claims.sub;

    let project = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(db_error)?;
        let project = match fetch_project(&conn, id, user_id) {
            Ok(project) => project,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Err(not_found(id)),
            Err(e) => return Err(db_error(e)),
        };

        conn.execute(
            "DELETE FROM tasks WHERE project_id = ?1 AND user_id = ?2",
            rusqlite::params![id, user_id],
        )
        .map_err(db_error)?;

        conn.execute(
            "DELETE FROM projects WHERE id = ?1 AND user_id = ?2",
            rusqlite::params![id, user_id],
        )
        .map_err(db_error)?;

        Ok::<_, (StatusCode, String)>(project)
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??;

    notifications::send_notification(&state, user_id, &format!("Project deleted: {}", project.name))
        .await;
    state
        .hub
        .publish(
            user_id,
            StreamChannel::Projects,
            &EventPayload::ProjectDeleted(project),
        )
        .await;

    Ok(Json(serde_json::json!({ "message": "Project deleted successfully" })))
}

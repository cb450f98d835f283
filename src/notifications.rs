//! Notification endpoints and the persistent-notification writer.
//!
//! `send_notification` is the write path the CRUD producers call: it
//! commits the row, then publishes the `notification` event — making it
//! a producer itself in the fan-out contract.

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

use crate::auth::middleware::Claims;
use crate::db::models::Notification;
use crate::realtime::events::EventPayload;
use crate::realtime::StreamChannel;
use crate::state::AppState;

// --- Request/response types ---

#[derive(Debug, Deserialize)]
pub struct MarkReadRequest {
    /// Specific notification ids to mark; empty means mark all.
    #[serde(default, rename = "notificationIDs")]
    pub notification_ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub struct NotificationListResponse {
    pub message: String,
    pub notifications: Vec<Notification>,
}

fn db_error<E>(_: E) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
}

// --- Handlers ---

/// GET /notifications — the caller's notifications, newest first.
pub async fn list_notifications(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<Json<NotificationListResponse>, (StatusCode, String)> {
    let db = state.db.clone();
    let user_id = claims.sub;

    let notifications = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(db_error)?;
        let mut stmt = conn
            .prepare(
                "SELECT id, user_id, message, is_read, created_at, updated_at
                 FROM notifications WHERE user_id = ?1 ORDER BY created_at DESC",
            )
            .map_err(db_error)?;

        let notifications: Vec<Notification> = stmt
            .query_map([user_id], |row| {
                Ok(Notification {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    message: row.get(2)?,
                    is_read: row.get(3)?,
                    created_at: row.get(4)?,
                    updated_at: row.get(5)?,
                })
            })
            .map_err(db_error)?
            .filter_map(|r| r.ok())
            .collect();

        Ok::<_, (StatusCode, String)>(notifications)
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??;

    Ok(Json(NotificationListResponse {
        message: "Notifications retrieved successfully".to_string(),
        notifications,
    }))
}

/// PATCH /notifications/read — mark the given ids (or all) as read.
pub async fn mark_notifications_read(
    State(state): State<AppState>,
    claims: Claims,
    Json(req): Json<MarkReadRequest>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let db = state.db.clone();
    let user_id = claims.sub;
    let ids: Vec<i64> = req.notification_ids.into_iter().filter(|id| *id > 0).collect();

    let updated = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(db_error)?;
        let now = Utc::now().to_rfc3339();

        let updated = if ids.is_empty() {
            conn.execute(
                "UPDATE notifications SET is_read = 1, updated_at = ?1 WHERE user_id = ?2",
                rusqlite::params![now, user_id],
            )
            .map_err(db_error)?
        } else {
            let placeholders = vec!["?"; ids.len()].join(", ");
            let sql = format!(
                "UPDATE notifications SET is_read = 1, updated_at = ? WHERE user_id = ? AND id IN ({})",
                placeholders
            );
            let mut params: Vec<Value> = Vec::with_capacity(ids.len() + 2);
            params.push(Value::from(now));
            params.push(Value::from(user_id));
            params.extend(ids.iter().map(|id| Value::from(*id)));

            conn.execute(&sql, rusqlite::params_from_iter(params))
                .map_err(db_error)?
        };

        Ok::<_, (StatusCode, String)>(updated)
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??;

    if updated == 0 {
        return Err((
            StatusCode::NOT_FOUND,
            "No notifications found to mark as read".to_string(),
        ));
    }

    Ok(Json(serde_json::json!({ "message": "Notifications marked as read" })))
}

// --- Writer ---

/// Persist a notification for `user_id`, then push it to their live
/// notification streams. Called by the CRUD producers after their own
/// mutation has committed; a write failure here is logged, not bubbled —
/// the triggering mutation already succeeded.
pub async fn send_notification(state: &AppState, user_id: i64, message: &str) {
    let db = state.db.clone();
    let text = message.to_string();

    let inserted = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|e| e.to_string())?;
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO notifications (user_id, message, is_read, created_at, updated_at)
             VALUES (?1, ?2, 0, ?3, ?3)",
            rusqlite::params![user_id, text, now],
        )
        .map_err(|e| e.to_string())?;

        let id = conn.last_insert_rowid();
        conn.query_row(
            "SELECT id, user_id, message, is_read, created_at, updated_at
             FROM notifications WHERE id = ?1",
            [id],
            |row| {
                Ok(Notification {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    message: row.get(2)?,
                    is_read: row.get(3)?,
                    created_at: row.get(4)?,
                    updated_at: row.get(5)?,
                })
            },
        )
        .map_err(|e| e.to_string())
    })
    .await;

    match inserted {
        Ok(Ok(notification)) => {
            state
                .hub
                .publish(
                    user_id,
                    StreamChannel::Notifications,
                    &EventPayload::Notification(notification),
                )
                .await;
        }
        Ok(Err(err)) => {
            tracing::warn!(user_id, error = %err, "Failed to persist notification");
        }
        Err(err) => {
            tracing::warn!(user_id, error = %err, "Notification writer task failed");
        }
    }
}

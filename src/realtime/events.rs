use axum::extract::ws::Message;
use serde::Serialize;

use crate::db::models::{Notification, Project, Task};

/// Mutation event pushed to live clients.
///
/// Serializes to the fixed two-field envelope `{"type": ..., "data": ...}`
/// the web client parses, with the entity snapshot as `data`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum EventPayload {
    #[serde(rename = "task_update")]
    TaskUpdated(Task),
    #[serde(rename = "task_deleted")]
    TaskDeleted(Task),
    #[serde(rename = "project_created")]
    ProjectCreated(Project),
    #[serde(rename = "project_updated")]
    ProjectUpdated(Project),
    #[serde(rename = "project_deleted")]
    ProjectDeleted(Project),
    #[serde(rename = "notification")]
    Notification(Notification),
}

impl EventPayload {
    /// Event kind label as it appears on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TaskUpdated(_) => "task_update",
            Self::TaskDeleted(_) => "task_deleted",
            Self::ProjectCreated(_) => "project_created",
            Self::ProjectUpdated(_) => "project_updated",
            Self::ProjectDeleted(_) => "project_deleted",
            Self::Notification(_) => "notification",
        }
    }

    /// Serialize once into a text frame shared by every delivery of this
    /// publish.
    pub fn to_frame(&self) -> Option<Message> {
        match serde_json::to_string(self) {
            Ok(json) => Some(Message::Text(json.into())),
            Err(err) => {
                tracing::error!(kind = self.kind(), error = %err, "Failed to serialize event");
                None
            }
        }
    }
}

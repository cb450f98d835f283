use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use serde::Deserialize;

use crate::auth::jwt;
use crate::state::AppState;
use super::{actor, StreamChannel};

/// Query parameters for WebSocket connection. Browsers cannot set an
/// Authorization header on the upgrade request, so auth rides in
/// `?token=JWT`.
#[derive(Debug, Deserialize)]
pub struct WsAuthQuery {
    pub token: String,
}

/// WebSocket close codes:
/// 4001 = token expired
/// 4002 = token invalid
const CLOSE_TOKEN_EXPIRED: u16 = 4001;
const CLOSE_TOKEN_INVALID: u16 = 4002;

/// GET /ws/notifications?token=JWT
pub async fn ws_notifications(
    state: State<AppState>,
    params: Query<WsAuthQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    upgrade(state, params, ws, StreamChannel::Notifications)
}

/// GET /ws/tasks?token=JWT
pub async fn ws_tasks(
    state: State<AppState>,
    params: Query<WsAuthQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    upgrade(state, params, ws, StreamChannel::Tasks)
}

/// GET /ws/projects?token=JWT
pub async fn ws_projects(
    state: State<AppState>,
    params: Query<WsAuthQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    upgrade(state, params, ws, StreamChannel::Projects)
}

/// Authenticate, then hand the socket to the connection actor. On auth
/// failure the upgrade still completes so the client can read a close
/// code instead of a bare HTTP error.
fn upgrade(
    State(state): State<AppState>,
    Query(params): Query<WsAuthQuery>,
    ws: WebSocketUpgrade,
    channel: StreamChannel,
) -> Response {
    match jwt::validate_access_token(&state.jwt_secret, &params.token) {
        Ok(claims) => {
            tracing::info!(
                user_id = claims.sub,
                username = %claims.username,
                channel = channel.as_str(),
                "WebSocket connection authenticated"
            );
            ws.on_upgrade(move |socket| actor::run_connection(socket, state, claims.sub, channel))
        }
        Err(err) => {
            let (close_code, reason) = match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    (CLOSE_TOKEN_EXPIRED, "Token expired")
                }
                _ => (CLOSE_TOKEN_INVALID, "Token invalid"),
            };

            tracing::warn!(
                close_code,
                reason,
                channel = channel.as_str(),
                "WebSocket auth failed"
            );

            ws.on_upgrade(move |mut socket| async move {
                let close_frame = CloseFrame {
                    code: close_code,
                    reason: reason.into(),
                };
                let _ = socket.send(Message::Close(Some(close_frame))).await;
            })
        }
    }
}

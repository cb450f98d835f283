use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};

use crate::state::AppState;
use super::{ConnectionHandle, StreamChannel};

/// Server sends a WebSocket ping at this interval to surface dead
/// connections that never error out of the read loop.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// If a pong does not come back within this window the connection is
/// considered gone.
const PONG_TIMEOUT: Duration = Duration::from_secs(10);

/// Run one authenticated connection to completion.
///
/// The socket splits into a writer task that owns the sink and drains
/// the connection's send queue, and a reader loop whose only job is
/// liveness: the protocol is push-only, so inbound Text/Binary frames
/// are discarded. Registration happens before the first await on the
/// socket, so the connection is a fan-out target the moment it is open.
///
/// Any read error, write error, client close, or server-side shutdown
/// lands in the same cleanup path, and unregistration is idempotent
/// against a concurrent fan-out failure removing the handle first.
pub async fn run_connection(
    socket: WebSocket,
    state: AppState,
    user_id: i64,
    channel: StreamChannel,
) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (handle, rx) = ConnectionHandle::new(user_id, channel);
    let connection_id = handle.id;
    let shutdown = handle.shutdown_signal();

    let registry = state.hub.registry(channel);
    registry.register(handle.clone());

    tracing::info!(
        user_id,
        connection_id = %connection_id,
        channel = channel.as_str(),
        "WebSocket connection opened"
    );

    // Writer task: forwards queued frames to the socket sink.
    let writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    // Ping task: periodic keepalive, closes the connection on a missed pong.
    let (pong_tx, mut pong_rx) = mpsc::unbounded_channel::<()>();
    let ping_handle = tokio::spawn({
        let handle = handle.clone();
        async move {
            let mut ping_timer = interval(PING_INTERVAL);
            // Skip the first immediate tick
            ping_timer.tick().await;

            loop {
                ping_timer.tick().await;

                if handle.send_frame(Message::Ping(Vec::new().into())).await.is_err() {
                    // Writer task has died — connection is gone
                    break;
                }

                match timeout(PONG_TIMEOUT, pong_rx.recv()).await {
                    Ok(Some(())) => {}
                    _ => {
                        tracing::warn!(
                            user_id,
                            connection_id = %handle.id,
                            "Pong timeout, closing connection"
                        );
                        handle.close();
                        break;
                    }
                }
            }
        }
    });

    // Reader loop: watch for peer-initiated close, protocol errors, and
    // the handle's shutdown signal. Client frames carry no payload.
    loop {
        tokio::select! {
            incoming = ws_receiver.next() => match incoming {
                Some(Ok(msg)) => match msg {
                    Message::Text(_) | Message::Binary(_) => {}
                    Message::Ping(data) => {
                        let _ = handle.send_frame(Message::Pong(data)).await;
                    }
                    Message::Pong(_) => {
                        let _ = pong_tx.send(());
                    }
                    Message::Close(frame) => {
                        tracing::info!(
                            user_id,
                            connection_id = %connection_id,
                            reason = ?frame,
                            "Client initiated close"
                        );
                        break;
                    }
                },
                Some(Err(err)) => {
                    tracing::warn!(
                        user_id,
                        connection_id = %connection_id,
                        error = %err,
                        "WebSocket receive error"
                    );
                    break;
                }
                None => {
                    tracing::info!(
                        user_id,
                        connection_id = %connection_id,
                        "WebSocket stream ended"
                    );
                    break;
                }
            },
            _ = shutdown.notified() => {
                tracing::info!(
                    user_id,
                    connection_id = %connection_id,
                    "Server closed connection"
                );
                break;
            }
        }
    }

    ping_handle.abort();
    registry.unregister(user_id, connection_id);

    // Drop our sender clones so the writer drains what is queued, sends
    // a close frame, and exits. In-flight publishes may briefly hold
    // snapshot clones, hence the bounded join instead of an abort.
    drop(handle);
    let _ = timeout(Duration::from_secs(5), writer_handle).await;

    tracing::info!(
        user_id,
        connection_id = %connection_id,
        channel = channel.as_str(),
        "WebSocket connection closed"
    );
}

/// Writer task: owns the sink, forwards frames from the send queue. Exits
/// when the queue closes (connection torn down) or a write fails.
async fn writer_task(mut ws_sender: SplitSink<WebSocket, Message>, mut rx: mpsc::Receiver<Message>) {
    while let Some(frame) = rx.recv().await {
        if ws_sender.send(frame).await.is_err() {
            // Socket is broken — connection is gone
            return;
        }
    }

    // Queue closed cleanly; say goodbye if the peer is still there.
    let _ = ws_sender.send(Message::Close(None)).await;
}

use crate::error::ServerError;
use crate::state::{AppState, WsConfig};
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::{IntoResponse, Response};
use markd_core::ReloadChannel;
use std::net::SocketAddr;
use tokio::time::{Instant, MissedTickBehavior};

/// The handler for the HTTP request (this gets called when the HTTP GET lands at the start
/// of websocket negotiation). After this completes, the actual switching from HTTP to
/// websocket protocol will occur.
pub async fn live_reload(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
) -> Result<Response, ServerError> {
    if !state.live_reload() {
        return Err(ServerError::NotFound("/__livereload".into()));
    }

    let peer = connect_info.map(|ConnectInfo(addr)| addr);
    let config = state.ws();

    Ok(ws
        .on_upgrade(move |socket| async move {
            let channel = state.broadcaster().register();
            tracing::debug!(?peer, channel = channel.id(), "Live reload client connected");
            handle_websocket(socket, channel, config).await;
            tracing::debug!(?peer, "Live reload client disconnected");
        })
        .into_response())
}

/// Pumps reload instructions into `socket` until either side goes away.
///
/// The channel is dropped on return, which unregisters it.
async fn handle_websocket(mut socket: WebSocket, mut channel: ReloadChannel, config: WsConfig) {
    let mut ping = tokio::time::interval_at(
        Instant::now() + config.ping_interval,
        config.ping_interval,
    );
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_seen = Instant::now();

    loop {
        tokio::select! {
            instruction = channel.recv() => {
                let Some(instruction) = instruction else {
                    // Unregistered, most likely by server shutdown.
                    break;
                };
                let text = match serde_json::to_string(&instruction) {
                    Ok(text) => text,
                    Err(err) => {
                        tracing::error!(?err, "Failed to encode reload instruction");
                        continue;
                    }
                };
                if socket.send(WsMessage::Text(text)).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => match incoming {
                Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => last_seen = Instant::now(),
            },
            _ = ping.tick() => {
                if last_seen.elapsed() >= config.idle_timeout {
                    tracing::debug!(channel = channel.id(), "Live reload client timed out");
                    break;
                }
                if socket.send(WsMessage::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
        }
    }

    let _ = socket.send(WsMessage::Close(None)).await;
}

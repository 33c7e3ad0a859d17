//! WebSocket upgrade handler

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

use crate::app::{AppState, Shutdown};
use crate::game::{Connection, ConnectionId, MessageRouter, Outbox, Outgoing};
use crate::util::rate_limit::FrameRateLimiter;

/// How long the writer gets to flush a close frame after the reader is done
const WRITER_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, remote, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, remote: SocketAddr, state: AppState) {
    if state.shutdown.is_triggered() {
        debug!(%remote, "Refusing connection during shutdown");
        return;
    }
    let _open = state.track_socket();

    let (conn, outbox) = Connection::channel(state.config.outbound_queue);
    info!(conn_id = %conn.id(), %remote, "New WebSocket connection");

    let router = state.router.clone();
    router.on_open(&conn);

    let (ws_sink, ws_stream) = socket.split();
    let mut writer = tokio::spawn(write_loop(conn.id(), ws_sink, outbox));

    let mut limiter = FrameRateLimiter::new(state.config.input_rate_limit);
    let reason = read_loop(&router, &conn, ws_stream, &state.shutdown, &mut limiter).await;

    router.on_close(&conn, &reason);

    // Flush the close frame, but never wait on a stuck peer for long
    conn.close();
    drop(conn);
    if tokio::time::timeout(WRITER_FLUSH_TIMEOUT, &mut writer).await.is_err() {
        writer.abort();
    }

    info!(
        %remote,
        reason = %reason,
        rate_limited = limiter.dropped(),
        "WebSocket connection closed"
    );
}

/// Reader loop: WebSocket -> router, one frame at a time in arrival order.
/// Returns why the loop ended.
async fn read_loop(
    router: &MessageRouter,
    conn: &Arc<Connection>,
    mut ws_stream: SplitStream<WebSocket>,
    shutdown: &Shutdown,
    limiter: &mut FrameRateLimiter,
) -> String {
    loop {
        let next = tokio::select! {
            next = ws_stream.next() => next,
            _ = shutdown.wait() => return "server shutting down".to_string(),
        };

        match next {
            Some(Ok(Message::Binary(frame))) => {
                if !limiter.admit() {
                    debug!(conn_id = %conn.id(), "Rate limited inbound frame");
                    continue;
                }
                router.on_message(conn, &frame);
            }
            Some(Ok(Message::Text(_))) => {
                warn!(conn_id = %conn.id(), "Received text message, ignoring");
            }
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {}
            Some(Ok(Message::Close(frame))) => {
                return match frame {
                    Some(frame) => format!("client closed ({}: {})", frame.code, frame.reason),
                    None => "client closed".to_string(),
                };
            }
            Some(Err(e)) => return format!("socket error: {e}"),
            None => return "stream ended".to_string(),
        }
    }
}

/// Writer loop: outbox -> WebSocket
async fn write_loop(
    conn_id: ConnectionId,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut outbox: Outbox,
) {
    while let Some(outgoing) = outbox.next().await {
        match outgoing {
            Outgoing::Frame(frame) => {
                if let Err(e) = ws_sink.send(Message::Binary(frame.to_vec())).await {
                    debug!(conn_id = %conn_id, error = %e, "WebSocket send failed");
                    return;
                }
            }
            Outgoing::Close => {
                let _ = ws_sink.send(Message::Close(None)).await;
                break;
            }
        }
    }
    let _ = ws_sink.close().await;
}

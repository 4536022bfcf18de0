use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use blastgrid_core::net::messages::{ClientMessage, ErrorMsg, MessageType, ServerMessage};
use blastgrid_core::net::protocol::{decode_client_message, encode_server_message};
use blastgrid_core::player::PlayerId;

use crate::game_loop::{ConnId, PlayerSender};
use crate::state::{AppState, ConnectionGuard};

pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let max_ws = state.config.limits.max_ws_connections;
    let current = state.ws_connection_count.load(Ordering::Relaxed);
    if current >= max_ws {
        tracing::warn!(current, max = max_ws, "WS connection limit reached");
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    ws.max_message_size(state.config.limits.max_message_size)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

/// What an attached connection is allowed to do.
#[derive(Debug, Clone, Copy)]
enum Role {
    Player(PlayerId),
    Spectator,
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let _guard = ConnectionGuard::new(Arc::clone(&state.ws_connection_count));
    let (ws_sender, mut ws_receiver) = socket.split();

    let (tx, rx) = mpsc::channel::<Bytes>(state.config.limits.player_message_buffer);
    spawn_writer(ws_sender, rx);

    let rate = state.config.limits.ws_rate_limit_per_sec;
    let mut rate_limiter = RateLimiter::new(rate, rate);

    let Some((code, conn_id, role)) =
        await_attach(&mut ws_receiver, &state, &tx, &mut rate_limiter).await
    else {
        return;
    };

    read_loop(&mut ws_receiver, &state, &code, role, &mut rate_limiter).await;

    let mut sessions = state.sessions.write().await;
    sessions.detach_connection(&code, conn_id);
    drop(sessions);

    tracing::info!(session = %code, conn_id, ?role, "Connection closed");
}

/// Forward queued frames to the socket. A `SessionEnded` frame is followed
/// by a close frame.
fn spawn_writer(mut ws_sender: SplitSink<WebSocket, Message>, mut rx: mpsc::Receiver<Bytes>) {
    tokio::spawn(async move {
        while let Some(data) = rx.recv().await {
            let ended = data.first() == Some(&(MessageType::SessionEnded as u8));
            if ws_sender.send(Message::Binary(data)).await.is_err() {
                break;
            }
            if ended {
                if let Err(e) = ws_sender.send(Message::Close(None)).await {
                    tracing::debug!(error = %e, "Failed to send close frame");
                }
                break;
            }
        }
    });
}

fn send_error(tx: &PlayerSender, message: String) {
    let msg = ServerMessage::Error(ErrorMsg { message });
    match encode_server_message(&msg) {
        Ok(data) => {
            if let Err(e) = tx.try_send(Bytes::from(data)) {
                tracing::debug!(error = %e, "Failed to queue error reply");
            }
        },
        Err(e) => tracing::error!(error = %e, "Failed to encode Error"),
    }
}

/// Read inbound binary frames, applying the rate limit. Returns None when
/// the socket closes.
async fn next_frame(
    ws_receiver: &mut SplitStream<WebSocket>,
    rate_limiter: &mut RateLimiter,
) -> Option<ClientMessage> {
    while let Some(Ok(msg)) = ws_receiver.next().await {
        let data = match msg {
            Message::Binary(d) => d,
            Message::Close(_) => return None,
            _ => continue,
        };

        if !rate_limiter.allow() {
            tracing::warn!("Rate limited");
            continue;
        }

        match decode_client_message(&data) {
            Ok(msg) => return Some(msg),
            Err(e) => tracing::debug!(error = %e, "Dropped undecodable frame"),
        }
    }
    None
}

/// Wait for a successful `Join` or `Spectate`. Failed attempts are answered
/// with `Error` and the client may retry; anything else is ignored.
async fn await_attach(
    ws_receiver: &mut SplitStream<WebSocket>,
    state: &AppState,
    tx: &PlayerSender,
    rate_limiter: &mut RateLimiter,
) -> Option<(String, ConnId, Role)> {
    loop {
        let msg = next_frame(ws_receiver, rate_limiter).await?;
        let mut sessions = state.sessions.write().await;
        let attached = match msg {
            ClientMessage::Join(join) => {
                let code = join.code.trim().to_string();
                sessions
                    .attach_player(&code, join.name.as_deref(), tx.clone())
                    .map(|(conn_id, player_id)| (code, conn_id, Role::Player(player_id)))
            },
            ClientMessage::Spectate(spectate) => {
                let code = spectate.code.trim().to_string();
                sessions
                    .attach_spectator(&code, tx.clone())
                    .map(|conn_id| (code, conn_id, Role::Spectator))
            },
            _ => continue,
        };
        drop(sessions);

        match attached {
            Ok(attached) => return Some(attached),
            Err(e) => {
                tracing::warn!(error = %e, "Attach rejected");
                send_error(tx, e.to_string());
            },
        }
    }
}

async fn read_loop(
    ws_receiver: &mut SplitStream<WebSocket>,
    state: &AppState,
    code: &str,
    role: Role,
    rate_limiter: &mut RateLimiter,
) {
    while let Some(msg) = next_frame(ws_receiver, rate_limiter).await {
        let Role::Player(player_id) = role else {
            // Spectators are read-only.
            continue;
        };

        let sessions = state.sessions.read().await;
        match msg {
            ClientMessage::Input(input) => sessions.dispatch_input(code, player_id, input.action),
            ClientMessage::Start => sessions.request_start(code),
            ClientMessage::Reset => sessions.request_reset(code),
            ClientMessage::Join(_) | ClientMessage::Spectate(_) => {
                tracing::debug!(session = code, player_id, "Ignored repeated attach");
            },
        }
    }
}

/// Per-connection rate limiter (token bucket).
struct RateLimiter {
    tokens: f64,
    last_refill: tokio::time::Instant,
    max_tokens: f64,
    refill_rate: f64, // tokens per second
}

impl RateLimiter {
    fn new(max_tokens: f64, refill_rate: f64) -> Self {
        Self {
            tokens: max_tokens,
            last_refill: tokio::time::Instant::now(),
            max_tokens,
            refill_rate,
        }
    }

    /// Returns true if the message is allowed; false if rate-limited.
    fn allow(&mut self) -> bool {
        let now = tokio::time::Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

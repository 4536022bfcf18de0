#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use blastgrid_core::net::messages::{ClientMessage, JoinMsg, JoinedMsg, ServerMessage, SpectateMsg};
use blastgrid_core::net::protocol::{decode_server_message, encode_client_message};
use blastgrid_engine::config::GameRules;

use blastgrid_server::config::{AuthFileConfig, ServerConfig};
use blastgrid_server::{build_app, spawn_state_sweeper};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestServer {
    pub addr: SocketAddr,
    _shutdown: tokio::task::JoinHandle<()>,
    _sweeper: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Start a test server with no auth and fast, brick-free rules.
    pub async fn new() -> Self {
        Self::from_parts(ServerConfig::default(), fast_rules()).await
    }

    /// Start a test server whose admin API requires `token`.
    pub async fn with_admin_token(token: &str) -> Self {
        let config = ServerConfig {
            auth: AuthFileConfig {
                admin_token: Some(token.to_string()),
            },
            ..ServerConfig::default()
        };
        Self::from_parts(config, fast_rules()).await
    }

    pub async fn from_parts(config: ServerConfig, rules: GameRules) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (app, state) = build_app(config, rules);
        let sweeper = spawn_state_sweeper(state);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give the server a moment to start accepting
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self {
            addr,
            _shutdown: handle,
            _sweeper: sweeper,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    /// Create a session through the admin API and return its code.
    pub async fn create_lobby(&self, board_size: usize) -> String {
        let resp = reqwest::Client::new()
            .post(format!("{}/api/admin/lobbies", self.base_url()))
            .json(&serde_json::json!({ "board_size": board_size }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
        let body: serde_json::Value = resp.json().await.unwrap();
        body["code"].as_str().unwrap().to_string()
    }
}

/// Short fuse, fast tick, no destructible blocks.
pub fn fast_rules() -> GameRules {
    GameRules {
        tick_ms: 20,
        fuse_ms: 100,
        explosion_ms: 60,
        brick_density: 0.0,
        powerup_chance: 0.0,
        ..GameRules::default()
    }
}

/// Connect a WebSocket client to the given URL.
pub async fn ws_connect(url: &str) -> WsStream {
    let (stream, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    stream
}

/// Send a ClientMessage from a WS stream.
pub async fn ws_send_client_msg(stream: &mut WsStream, msg: &ClientMessage) {
    let encoded = encode_client_message(msg).unwrap();
    stream.send(Message::Binary(encoded.into())).await.unwrap();
}

/// Join `code` as a player and return the `Joined` reply.
pub async fn ws_join(stream: &mut WsStream, code: &str, name: Option<&str>) -> JoinedMsg {
    let msg = ClientMessage::Join(JoinMsg {
        code: code.to_string(),
        name: name.map(str::to_string),
    });
    ws_send_client_msg(stream, &msg).await;
    match ws_read_server_msg(stream).await {
        ServerMessage::Joined(joined) => joined,
        other => panic!("Expected Joined, got: {other:?}"),
    }
}

/// Send a Spectate request and return whatever the server answers.
pub async fn ws_spectate(stream: &mut WsStream, code: &str) -> ServerMessage {
    let msg = ClientMessage::Spectate(SpectateMsg {
        code: code.to_string(),
    });
    ws_send_client_msg(stream, &msg).await;
    ws_read_server_msg(stream).await
}

/// Read raw binary data from a WebSocket stream (5s timeout).
pub async fn ws_read_raw(stream: &mut WsStream) -> Vec<u8> {
    let deadline = Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => return data.to_vec(),
                Some(Ok(Message::Close(_))) => panic!("WebSocket closed unexpectedly"),
                Some(Err(e)) => panic!("WebSocket error: {e}"),
                None => panic!("WebSocket stream ended"),
                _ => continue,
            }
        }
    })
    .await
    .expect("Timed out waiting for WebSocket message")
}

/// Try to read raw binary data, returning None on timeout.
pub async fn ws_try_read_raw(stream: &mut WsStream, timeout_ms: u64) -> Option<Vec<u8>> {
    let deadline = Duration::from_millis(timeout_ms);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => return data.to_vec(),
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                    panic!("WebSocket error or closed")
                },
                _ => continue,
            }
        }
    })
    .await
    .ok()
}

/// Read the next ServerMessage from a WebSocket stream (5s timeout).
pub async fn ws_read_server_msg(stream: &mut WsStream) -> ServerMessage {
    let data = ws_read_raw(stream).await;
    decode_server_message(&data).unwrap()
}

/// Read messages until one matches, or panic after 5s.
pub async fn ws_read_until<F>(stream: &mut WsStream, mut pred: F) -> ServerMessage
where
    F: FnMut(&ServerMessage) -> bool,
{
    let deadline = Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        loop {
            let msg = ws_read_server_msg(stream).await;
            if pred(&msg) {
                return msg;
            }
        }
    })
    .await
    .expect("Timed out waiting for matching message")
}

/// Wait until the socket is closed by the server (5s timeout).
pub async fn ws_expect_close(stream: &mut WsStream) {
    let deadline = Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return,
                _ => continue,
            }
        }
    })
    .await
    .expect("Timed out waiting for close");
}

//! Scripted analysis backend for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use axum::routing::get;
use axum::Router;

#[derive(Debug, Clone)]
pub enum Frame {
    Text(String),
    Close,
}

impl Frame {
    pub fn json(value: serde_json::Value) -> Self {
        Frame::Text(value.to_string())
    }
}

/// Frames played when a document connects and whenever it receives a command.
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub on_connect: Vec<Frame>,
    pub on_action: Vec<Frame>,
}

#[derive(Clone, Default)]
struct MockState {
    scripts: Arc<HashMap<String, Script>>,
    log: Arc<Mutex<Vec<String>>>,
    handshake_delay: Duration,
}

impl MockState {
    fn record(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }
}

pub struct MockBackend {
    addr: SocketAddr,
    log: Arc<Mutex<Vec<String>>>,
}

impl MockBackend {
    pub async fn start(scripts: Vec<(&str, Script)>) -> Self {
        Self::start_with_handshake_delay(scripts, Duration::ZERO).await
    }

    /// Like [`MockBackend::start`], but holds every upgrade response for `delay`.
    pub async fn start_with_handshake_delay(
        scripts: Vec<(&str, Script)>,
        delay: Duration,
    ) -> Self {
        let state = MockState {
            scripts: Arc::new(
                scripts
                    .into_iter()
                    .map(|(id, script)| (id.to_string(), script))
                    .collect(),
            ),
            log: Arc::default(),
            handshake_delay: delay,
        };
        let log = state.log.clone();
        let app = Router::new()
            .route("/ws/paper/{id}", get(ws_handler))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self { addr, log }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    /// Poll the request log until `entry` shows up.
    pub async fn wait_for(&self, entry: &str) -> bool {
        for _ in 0..200 {
            if self.log().iter().any(|line| line == entry) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        false
    }
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(id): Path<String>,
    State(state): State<MockState>,
) -> Response {
    if !state.handshake_delay.is_zero() {
        tokio::time::sleep(state.handshake_delay).await;
    }
    ws.on_upgrade(move |socket| serve(socket, id, state))
}

async fn serve(mut socket: WebSocket, id: String, state: MockState) {
    state.record(format!("open:{id}"));
    let script = state.scripts.get(&id).cloned().unwrap_or_default();

    if play(&mut socket, &script.on_connect).await {
        while let Some(msg) = socket.recv().await {
            match msg {
                Ok(Message::Text(text)) => {
                    state.record(format!("recv:{id}:{}", text.as_str()));
                    if !play(&mut socket, &script.on_action).await {
                        break;
                    }
                }
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(_) => {}
            }
        }
    }
    state.record(format!("closed:{id}"));
}

async fn play(socket: &mut WebSocket, frames: &[Frame]) -> bool {
    for frame in frames {
        match frame {
            Frame::Text(text) => {
                if socket.send(Message::Text(text.clone().into())).await.is_err() {
                    return false;
                }
            }
            Frame::Close => {
                let _ = socket.send(Message::Close(None)).await;
                return false;
            }
        }
    }
    true
}

pub fn status(msg: &str) -> Frame {
    Frame::json(serde_json::json!({"type": "status_change", "msg": msg}))
}

pub fn chunk(content: &str) -> Frame {
    Frame::json(serde_json::json!({"type": "step1_stream", "content": content}))
}

pub fn done(data: serde_json::Value) -> Frame {
    Frame::json(serde_json::json!({"type": "step1_done", "data": data}))
}

//! In-process stand-ins for the manager's HTTP API and control channel.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response as HttpResponse};
use axum::routing::{get, post};
use axum::Router;
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;

/// A request as the fake manager saw it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: HashMap<String, String>,
    pub body: String,
}

#[derive(Clone)]
struct ManagerState {
    response: Arc<Mutex<(u16, String)>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl ManagerState {
    async fn record(&self, request: RecordedRequest) -> HttpResponse {
        self.requests.lock().await.push(request);
        let (status, body) = self.response.lock().await.clone();
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
    }
}

async fn list_portals(
    State(state): State<ManagerState>,
    Query(query): Query<HashMap<String, String>>,
) -> HttpResponse {
    state
        .record(RecordedRequest {
            method: "GET".to_string(),
            path: "/api/public/portals".to_string(),
            query,
            body: String::new(),
        })
        .await
}

async fn report_players(
    State(state): State<ManagerState>,
    Path(server_id): Path<String>,
    body: String,
) -> HttpResponse {
    state
        .record(RecordedRequest {
            method: "POST".to_string(),
            path: format!("/api/servers/{server_id}/players"),
            query: HashMap::new(),
            body,
        })
        .await
}

/// The manager's HTTP API, answering every route with one canned response
/// and recording what it was asked.
pub struct FakeManagerHttp {
    pub addr: SocketAddr,
    state: ManagerState,
}

impl FakeManagerHttp {
    pub async fn start(status: u16, body: impl Into<String>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = ManagerState {
            response: Arc::new(Mutex::new((status, body.into()))),
            requests: Arc::new(Mutex::new(Vec::new())),
        };

        let router = Router::new()
            .route("/api/public/portals", get(list_portals))
            .route("/api/servers/:server_id/players", post(report_players))
            .with_state(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub async fn respond_with(&self, status: u16, body: impl Into<String>) {
        *self.state.response.lock().await = (status, body.into());
    }

    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().await.clone()
    }
}

/// What the fake control channel server observed on one connection.
#[derive(Debug, Clone)]
pub struct Session {
    pub accepted_at: Instant,
    pub path: String,
    pub first_message: Option<String>,
}

/// Script for one accepted control channel connection.
pub enum SessionScript {
    /// Read the register frame, then close.
    CloseAfterRegister,
    /// Read the register frame, then drop the TCP stream without a close frame.
    DropAfterRegister,
    /// Read the register frame, then hold the socket without reading from it,
    /// so pings go unanswered.
    SilentAfterRegister,
    /// Read the register frame, send these frames, then keep the socket open.
    SendAndHold(Vec<String>),
}

/// WebSocket server that plays one script per accepted connection and
/// reports every session on a channel.
pub struct FakeControlServer {
    pub addr: SocketAddr,
    pub sessions: mpsc::UnboundedReceiver<Session>,
}

impl FakeControlServer {
    pub async fn start(scripts: Vec<SessionScript>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, sessions) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let mut scripts = scripts.into_iter();
            while let Ok((stream, _)) = listener.accept().await {
                let accepted_at = Instant::now();
                let script = scripts.next().unwrap_or(SessionScript::SendAndHold(Vec::new()));
                let tx = tx.clone();
                tokio::spawn(async move {
                    run_session(stream, accepted_at, script, tx).await;
                });
            }
        });

        Self { addr, sessions }
    }

    pub fn manager_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/dashboard", self.addr)
    }
}

async fn run_session(
    stream: TcpStream,
    accepted_at: Instant,
    script: SessionScript,
    sessions: mpsc::UnboundedSender<Session>,
) {
    let path = Arc::new(std::sync::Mutex::new(String::new()));
    let seen_path = Arc::clone(&path);
    let callback = move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        if let Ok(mut slot) = seen_path.lock() {
            *slot = request.uri().path().to_string();
        }
        Ok(response)
    };

    let Ok(mut socket) = tokio_tungstenite::accept_hdr_async(stream, callback).await else {
        return;
    };

    let first_message = match socket.next().await {
        Some(Ok(Message::Text(text))) => Some(text.as_str().to_string()),
        _ => None,
    };
    let path = path.lock().map(|p| p.clone()).unwrap_or_default();
    let _ = sessions.send(Session {
        accepted_at,
        path,
        first_message,
    });

    match script {
        SessionScript::CloseAfterRegister => {
            let _ = socket.close(None).await;
            while let Some(Ok(_)) = socket.next().await {}
        }
        SessionScript::DropAfterRegister => drop(socket),
        SessionScript::SilentAfterRegister => {
            let _held = socket;
            std::future::pending::<()>().await;
        }
        SessionScript::SendAndHold(frames) => {
            for frame in frames {
                if socket.send(Message::text(frame)).await.is_err() {
                    return;
                }
            }
            while let Some(Ok(_)) = socket.next().await {}
        }
    }
}

/// Accepts TCP connections and never answers the WebSocket handshake.
/// Reports the instant of every accepted connection.
pub async fn start_mute_listener() -> (SocketAddr, mpsc::UnboundedReceiver<Instant>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, accepted) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            let _ = tx.send(Instant::now());
            held.push(stream);
        }
    });

    (addr, accepted)
}

pub fn portal_json(id: &str, shape: &str, x: i32, y: i32, z: i32) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "name": format!("portal-{id}"),
        "targetServerId": "srv-lobby",
        "targetServerName": "lobby",
        "world": "world",
        "x": x, "y": y, "z": z,
        "shape": shape
    })
}

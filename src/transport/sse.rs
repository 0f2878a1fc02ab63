//! SSE + HTTP POST transport.
//!
//! `GET /sse` opens the event stream; its first event is an `endpoint` event
//! carrying the POST URL with a fresh session ID. `POST /message?sessionId=…`
//! delivers a JSON-RPC frame; the response is pushed to the session's stream
//! as a `data:` event. The POST reply itself is just an acknowledgement.

use crate::db::ConnectionManager;
use crate::error::{DbError, DbResult};
use crate::mcp::Dispatcher;
use crate::transport::{Transport, stdio::wait_for_signal};
use axum::body::{Body, Bytes};
use axum::extract::{Query, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{RwLock, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Per-stream outbound message buffer.
const SESSION_BUFFER: usize = 32;

struct SseState {
    dispatcher: Arc<Dispatcher>,
    sessions: RwLock<HashMap<String, mpsc::Sender<String>>>,
}

pub struct SseTransport {
    dispatcher: Arc<Dispatcher>,
    manager: Arc<ConnectionManager>,
    host: String,
    port: u16,
}

impl SseTransport {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        manager: Arc<ConnectionManager>,
        host: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            dispatcher,
            manager,
            host: host.into(),
            port,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Transport for SseTransport {
    async fn run(&self) -> DbResult<()> {
        let addr = self.bind_addr();
        info!(addr = %addr, "starting SSE transport");

        let state = Arc::new(SseState {
            dispatcher: self.dispatcher.clone(),
            sessions: RwLock::new(HashMap::new()),
        });

        let app = Router::new()
            .route("/sse", get(handle_sse))
            .route("/message", post(handle_message).options(handle_preflight))
            .with_state(state);

        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| DbError::connection(format!("failed to bind to {}: {}", addr, e)))?;

        info!("SSE endpoint ready at /sse, message endpoint at /message");

        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                wait_for_signal().await;
            })
            .await
            .map_err(|e| DbError::internal(format!("HTTP server error: {}", e)))?;

        self.manager.close_all().await;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "sse"
    }
}

async fn handle_sse(State(state): State<Arc<SseState>>) -> Response {
    let session_id = Uuid::new_v4().simple().to_string();
    let (tx, rx) = mpsc::channel::<String>(SESSION_BUFFER);

    {
        let mut sessions = state.sessions.write().await;
        sessions.insert(session_id.clone(), tx);
    }
    info!(session_id = %session_id, "SSE stream opened");

    let endpoint_frame = format!(
        "event: endpoint\ndata: /message?sessionId={}\n\n",
        session_id
    );
    let stream = tokio_stream::once(Ok::<Bytes, Infallible>(Bytes::from(endpoint_frame))).chain(
        ReceiverStream::new(rx)
            .map(|message| Ok::<Bytes, Infallible>(Bytes::from(format!("data: {}\n\n", message)))),
    );

    match axum::http::Response::builder()
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .header(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")
        .body(Body::from_stream(stream))
    {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, "failed to build SSE response");
            let mut response = Response::new(Body::empty());
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
        }
    }
}

async fn handle_message(
    State(state): State<Arc<SseState>>,
    Query(params): Query<HashMap<String, String>>,
    body: String,
) -> Response {
    let Some(session_id) = params.get("sessionId") else {
        return plain_response(StatusCode::BAD_REQUEST, "missing sessionId");
    };

    let sender = {
        let sessions = state.sessions.read().await;
        sessions.get(session_id).cloned()
    };
    let Some(sender) = sender else {
        return plain_response(StatusCode::BAD_REQUEST, "unknown session");
    };

    debug!(session_id = %session_id, "received message");

    if let Some(response) = state.dispatcher.handle_frame(&body).await {
        match serde_json::to_string(&response) {
            Ok(json) => {
                if sender.send(json).await.is_err() {
                    // Stream is gone; drop the session.
                    let mut sessions = state.sessions.write().await;
                    sessions.remove(session_id);
                    return plain_response(StatusCode::BAD_REQUEST, "session closed");
                }
            }
            Err(e) => {
                warn!(error = %e, "failed to serialize response");
                return plain_response(StatusCode::INTERNAL_SERVER_ERROR, "serialization error");
            }
        }
    }

    plain_response(StatusCode::ACCEPTED, "Accepted")
}

async fn handle_preflight() -> Response {
    let mut response = plain_response(StatusCode::NO_CONTENT, "");
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    response
}

fn plain_response(status: StatusCode, body: &str) -> Response {
    let mut response = Response::new(Body::from(body.to_string()));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    response
}

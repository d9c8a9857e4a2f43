//! HTTP and WebSocket routes.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::{Html, Json, Response};
use axum::routing::get;
use axum::Router;
use futures::stream::StreamExt;
use futures::SinkExt;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tracing::debug;

use rsm_engine::WorkflowSnapshot;

use crate::controller::WorkflowController;

const DASHBOARD_HTML: &str = include_str!("../static/index.html");

pub fn router(controller: Arc<WorkflowController>) -> Router {
    Router::new()
        .route("/", get(serve_dashboard))
        .route("/api/state", get(serve_state))
        .route("/health", get(health))
        .route("/ws", get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(controller)
}

async fn serve_dashboard() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}

async fn serve_state(State(controller): State<Arc<WorkflowController>>) -> Json<WorkflowSnapshot> {
    Json(controller.snapshot())
}

async fn health(State(controller): State<Arc<WorkflowController>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "rsm-dashboard",
        "running": controller.is_running(),
        "clients": controller.registry().len(),
    }))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(controller): State<Arc<WorkflowController>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, controller))
}

async fn handle_socket(socket: WebSocket, controller: Arc<WorkflowController>) {
    let (mut sender, mut receiver) = socket.split();
    let (id, mut events) = controller.connect();

    // Registry → socket.
    let forward = tokio::spawn(async move {
        while let Some(text) = events.recv().await {
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    // Socket → controller.
    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => controller.handle_control(&id, &text),
            Message::Close(_) => break,
            _ => debug!(client = %id, "ignoring non-text frame"),
        }
    }

    controller.disconnect(&id);
    forward.abort();
}

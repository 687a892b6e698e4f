//! WebSocket endpoint: upgrades requests on the status path and hands each
//! socket to its own session task.

use axum::{
    extract::{ws::WebSocketUpgrade, State},
    response::Response,
    routing::get,
    Router,
};
use tokio::net::TcpListener;

use crate::config::{AgentConfig, STATUS_PATH};
use crate::error::AgentError;
use crate::session::Session;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(STATUS_PATH, get(ws_handler))
        .with_state(state)
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    // axum runs the upgraded connection on its own task
    ws.on_upgrade(move |socket| Session::new(state).run(socket))
}

/// Bind the configured listen address. Failure is fatal to the process.
pub async fn bind(config: &AgentConfig) -> Result<TcpListener, AgentError> {
    let addr = config.listen_addr()?;
    TcpListener::bind(addr)
        .await
        .map_err(|source| AgentError::Bind { addr, source })
}

/// Accept connections until the process exits.
pub async fn serve(listener: TcpListener, state: AppState) -> Result<(), AgentError> {
    axum::serve(listener, router(state))
        .await
        .map_err(AgentError::Serve)
}

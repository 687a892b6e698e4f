//! status_agent: pushes host status to WebSocket clients every interval and
//! answers latency pings on the same connection.

pub mod clock;
pub mod config;
pub mod error;
pub mod metrics;
pub mod session;
pub mod state;
pub mod types;
pub mod ws;

pub use config::{AgentConfig, Invocation};
pub use error::AgentError;
pub use state::AppState;

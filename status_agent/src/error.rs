//! Error type for the agent's fallible edges: configuration and startup.

use std::net::SocketAddr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("invalid value {value:?} for {key}")]
    InvalidConfig { key: &'static str, value: String },

    #[error("unexpected argument {0:?}")]
    UnexpectedArg(String),

    #[error("failed to bind {addr}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid listen address {0:?}")]
    Addr(String),

    #[error("server error")]
    Serve(#[source] std::io::Error),
}

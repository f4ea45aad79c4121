//! Errors raised by the transport layer
//!
//! Client mistakes never show up here: the relay answers them with
//! `serverFull` or ignores them.

use thiserror::Error;
use tokio_tungstenite::tungstenite;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("could not bind any of {attempted:?}: {source}")]
    Bind {
        attempted: Vec<String>,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("malformed message: {0}")]
    Protocol(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ServerError>;

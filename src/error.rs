//! Error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Request failed: {0}")]
    Request(#[from] ureq::Error),

    #[error("HTTP error: {0}")]
    HttpStatus(u16),

    #[error("No channel with id {0}")]
    UnknownChannel(String),

    #[error("Channel '{0}' has no manifest URL")]
    NotPlayable(String),

    #[error("Failed to launch player '{player}': {source}")]
    PlayerLaunch {
        player: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

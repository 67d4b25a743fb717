use thiserror::Error;

use crate::retrieve::RetrieveError;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Pushbullet rejected the access token (HTTP {0})")]
    InvalidKey(u16),

    #[error("No Pushbullet device named '{0}'")]
    DeviceNotFound(String),

    #[error("Pushbullet API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Pushbullet returned no body for {0}")]
    EmptyResponse(&'static str),

    #[error(transparent)]
    Retrieve(#[from] RetrieveError),

    #[error("Stream connection error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Unreadable stream message: {0}")]
    StreamDecode(#[from] serde_json::Error),

    #[error("Stream closed by the server")]
    StreamClosed,

    #[error("Stream silent for {0} seconds")]
    StreamSilent(u64),
}

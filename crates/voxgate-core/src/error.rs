use thiserror::Error;

/// Errors produced by the voxgate protocol and session layers.
#[derive(Debug, Error)]
pub enum VoxError {
    #[error("gateway endpoint unavailable")]
    EndpointUnavailable,

    #[error("handshake timed out waiting for a session id")]
    HandshakeTimeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("voice join not confirmed in time")]
    VoiceJoinTimeout,

    #[error("not connected to a voice channel")]
    NotInVoice,

    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("invalid command: {0}")]
    InvalidCommand(String),

    #[error("slot {slot} out of range (loaded slots: 0-{max})")]
    SlotOutOfRange { slot: usize, max: usize },

    #[error("reconnect attempts exhausted")]
    ReconnectExhausted,

    #[error("codec error: {0}")]
    Codec(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for VoxError {
    fn from(e: serde_json::Error) -> Self {
        VoxError::Codec(e.to_string())
    }
}

pub type VoxResult<T> = Result<T, VoxError>;

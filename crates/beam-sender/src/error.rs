use beam_common::{ConfigError, PayloadError};

/// Failures reported by the embedder's media layer.
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("capture not permitted: {0}")]
    PermissionDenied(String),

    #[error("session setup failed: {0}")]
    Session(String),

    #[error("negotiation failed: {0}")]
    Negotiation(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SenderError {
    #[error("capture authorization has not been granted")]
    MissingAuthorization,

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("signaling error: {0}")]
    Signaling(String),

    /// The orchestrator broke its own pipeline bookkeeping.
    #[error("contract violation: {0}")]
    Contract(&'static str),
}

impl SenderError {
    /// Fatal errors stop the signaling task instead of being logged and
    /// skipped.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Contract(_))
    }
}

pub type Result<T> = std::result::Result<T, SenderError>;

use std::path::PathBuf;

/// Why a text frame could not be turned into a protocol message.
///
/// None of these are ever reported back to the peer: endpoints log the
/// error at debug level and drop the frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("frame has no separator: {0:?}")]
    MissingSeparator(String),

    #[error("frame for command {0:?} carries no receiver key")]
    MissingKey(String),

    #[error("unknown command: {0:?}")]
    UnknownCommand(String),
}

#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("payload encode error: {0}")]
    Encode(String),

    #[error("payload decode error: {0}")]
    Decode(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("config validation error: {0}")]
    ValidationError(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Engine channel closed")]
    ChannelClosed,

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Cache error: {0}")]
    Cache(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Transport unavailable")]
    Unavailable,

    #[error("Request rejected: {0}")]
    Rejected(String),
}

//! Error taxonomy shared by both sides of the channel.
//!
//! None of these are fatal: callers log them, optionally surface a notice,
//! and keep whatever content is currently displayed.

use thiserror::Error;

pub use crate::codec::ParseError;

/// Malformed envelopes or frames on the message channel.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("envelope has no json payload")]
    MissingPayload,
    #[error("invalid envelope json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("frame too large: {len} > {max}")]
    FrameTooLarge { len: usize, max: usize },
}

/// Failures reported by the host application's APIs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("edit rejected for {uri}: {reason}")]
    EditRejected { uri: String, reason: String },
    #[error("failed to open {uri}: {reason}")]
    OpenFailed { uri: String, reason: String },
    #[error("failed to create panel: {0}")]
    PanelCreation(String),
    #[error("failed to post message to panel: {0}")]
    PostFailed(String),
}

/// Failure raised by the tree widget inside the isolated surface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct WidgetError(pub String);

impl WidgetError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Umbrella error; `surface::run` returns it when the frame stream breaks.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("frame stream failed: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Host(#[from] HostError),
    #[error(transparent)]
    Widget(#[from] WidgetError),
}

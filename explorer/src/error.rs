//! Session-fatal error taxonomy.
//!
//! Every variant ends the exploration session. Nothing here is retried: the
//! controller classifies these as an aborted session, while plumbing errors
//! (filesystem, config) keep flowing through `anyhow` to the caller.

use thiserror::Error;

/// A Device Driver primitive failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("device command `{command}` failed: {detail}")]
pub struct DeviceError {
    pub command: String,
    pub detail: String,
}

impl DeviceError {
    pub fn new(command: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            detail: detail.into(),
        }
    }
}

/// The reasoning service answered with an error payload, or could not be reached.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("reasoning service error: {message}")]
pub struct ReasoningError {
    pub message: String,
}

impl ReasoningError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Fatal conditions that abort an exploration session.
#[derive(Debug, Error)]
pub enum ExploreError {
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// Tagged-field extraction failed. `raw` keeps the reply for diagnostics.
    #[error("malformed reasoning reply: {reason}")]
    MalformedReply { reason: String, raw: String },

    #[error("undefined action `{0}`")]
    UndefinedAction(String),

    #[error("undefined decision `{0}`")]
    UndefinedDecision(String),

    #[error(transparent)]
    Reasoning(#[from] ReasoningError),

    #[error("malformed ui tree: {0}")]
    MalformedUiTree(String),

    #[error("target element {index} out of range (1..={len})")]
    TargetOutOfRange { index: usize, len: usize },
}

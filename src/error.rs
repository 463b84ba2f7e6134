use std::time::Duration;
use thiserror::Error;

/// A call payload could not be built from the supplied arguments.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    #[error("{function} expects {expected} argument(s), got {actual}")]
    Arity {
        function: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{function} argument #{index} must be {expected}, got {actual}")]
    ArgumentType {
        function: &'static str,
        index: usize,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("{function} argument #{index} must be {expected} bytes wide, got {actual}")]
    ArgumentWidth {
        function: &'static str,
        index: usize,
        expected: usize,
        actual: usize,
    },
}

/// A return payload could not be turned into the function's declared outputs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodingError {
    #[error("{function} returned {actual} bytes, need at least {expected}")]
    InsufficientData {
        function: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{function} return data is malformed: {reason}")]
    Malformed {
        function: &'static str,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("remote rejected request: {0}")]
    Rejected(String),
}

/// Failure of a single ledger read, whichever stage produced it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
    #[error("encoding failed: {0}")]
    Encoding(#[from] EncodingError),

    #[error("network call failed: {0}")]
    Network(#[from] NetworkError),

    #[error("decoding failed: {0}")]
    Decoding(#[from] DecodingError),
}

impl ReadError {
    /// Only network failures are worth repeating; codec failures will fail the same way again.
    pub fn is_transient(&self) -> bool {
        matches!(self, ReadError::Network(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("ding token shouldn't be empty when mute isn't true")]
    MissingWebhookToken,

    #[error("invalid {field} address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("invalid duration {0:?}")]
    InvalidDuration(String),

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("threshold must be a finite number, got {0}")]
    InvalidThreshold(String),

    #[error("at least one node URL must be provided")]
    NoNodeUrl,

    #[error("invalid node URL {0:?}")]
    InvalidNodeUrl(String),

    #[error("node {url} is unreachable: {reason}")]
    NodeUnreachable { url: String, reason: String },
}

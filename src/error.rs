//! Operation-level failures surfaced to the request layer.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StationError {
    /// Auth gate rejected the presented credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// A required argument was missing or malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Positional access outside of the current list bounds.
    #[error("index {index} out of range (len {len})")]
    OutOfRange { index: usize, len: usize },

    /// The radio did not report a link to the requested network before the
    /// join deadline.
    #[error("failed to join {ssid} within {}ms", waited.as_millis())]
    JoinTimeout { ssid: String, waited: Duration },

    /// Persistent storage could not be opened, read or written. The message
    /// carries the whole context chain.
    #[error("config store unavailable: {0:#}")]
    StoreUnavailable(anyhow::Error),

    /// Radio, process or other platform collaborator failed.
    #[error("platform failure: {0:#}")]
    Platform(anyhow::Error),
}

impl StationError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

pub type StationResult<T> = std::result::Result<T, StationError>;

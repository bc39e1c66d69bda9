//! Fatal session errors.
//!
//! Only these conditions reach the peer; their `Display` strings become the
//! wire-level `ERROR: <reason>` markers emitted before the channel closes.
//! Everything else (malformed control messages, unresolvable mid-stream model
//! switches, end-of-stream, disconnects) is silent by design so the stream is
//! never interrupted.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StreamError {
    /// The source descriptor named a capture device with a malformed index.
    /// Raised before any resource is acquired.
    #[error("invalid device index: {0}")]
    InvalidDeviceIndex(String),

    /// The video source could not be opened.
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// The detector identifier did not resolve to a model in the store.
    /// Fatal at session start; a mid-stream selection failure is ignored
    /// instead and never constructs this.
    #[error("model not found: {0}")]
    ModelNotFound(String),
}

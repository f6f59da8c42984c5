//! Error Types
//!
//! Errors are split by who caused them:
//! - [`UsageError`]: the caller misused a streaming result (fatal, never retried)
//! - [`DecodeError`]: the stream itself was malformed or unreadable
//! - [`StreamError`]: what a consumer of a streaming result observes
//! - [`ClientError`]: HTTP-level failures from the feed client

use std::sync::Arc;

use thiserror::Error;

/// Caller mistakes against a streaming result
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum UsageError {
    /// The result was already consumed (or is being consumed) by another view
    #[error("Streaming result can only be consumed once")]
    AlreadyConsumed,

    /// The result was disposed before consumption started
    #[error("Streaming result has been disposed")]
    Disposed,

    /// A push subscription was requested outside a tokio runtime
    #[error("Push subscription requires a running tokio runtime")]
    NoRuntime,
}

/// Failures while reading records from the underlying stream
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The XML was not well formed
    #[error("Malformed XML at byte {position}: {message}")]
    Xml {
        /// Byte offset reported by the parser
        position: u64,
        /// Parser message
        message: String,
    },

    /// The stream ended while an element was still open
    #[error("Unexpected end of stream inside <{element}>")]
    UnexpectedEof {
        /// Local name of the innermost open element
        element: String,
    },

    /// A structurally valid record could not be interpreted
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Reading from the underlying stream failed
    #[error("I/O error while reading stream: {0}")]
    Io(#[from] std::io::Error),

    /// Fetching a follow-up page failed
    #[error("Failed to fetch page {url}: {message}")]
    Page {
        /// Address of the page
        url: String,
        /// What went wrong
        message: String,
    },

    /// The reader panicked while producing a record
    #[error("Record reader panicked: {0}")]
    ReaderPanicked(String),
}

/// Errors surfaced to the consumer of a streaming result
#[derive(Debug, Error)]
pub enum StreamError {
    /// The result was used incorrectly
    #[error("Usage error: {0}")]
    Usage(#[from] UsageError),

    /// Production stopped on a decode failure
    ///
    /// The same allocation is retained by [`StreamingResult::last_error`],
    /// so `Arc::ptr_eq` identifies the original error.
    ///
    /// [`StreamingResult::last_error`]: crate::streaming::StreamingResult::last_error
    #[error("Decode error: {0}")]
    Decode(Arc<DecodeError>),

    /// The producer thread could not be started
    #[error("Failed to start record producer: {0}")]
    Spawn(#[source] std::io::Error),

    /// The producer stopped without reporting a terminal state
    #[error("Record producer stopped unexpectedly")]
    ProducerLost,
}

impl StreamError {
    /// Check if this is a usage error
    #[must_use]
    pub fn is_usage(&self) -> bool {
        matches!(self, Self::Usage(_))
    }

    /// Get the decode error, if this is one
    #[must_use]
    pub fn decode_error(&self) -> Option<&Arc<DecodeError>> {
        match self {
            Self::Decode(e) => Some(e),
            _ => None,
        }
    }
}

/// Errors from the HTTP feed client
#[derive(Debug, Error)]
pub enum ClientError {
    /// Request could not be sent or the body could not be read
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("Server returned {status} for {url}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Requested address
        url: String,
    },

    /// Server reported the resource is not ready yet
    #[error("Resource {url} not ready (status {status})")]
    NotReady {
        /// HTTP status code
        status: u16,
        /// Requested address
        url: String,
    },

    /// Requested entity does not exist
    #[error("Entity not found at {0}")]
    NotFound(String),

    /// Base URL, namespace or resource could not form an address
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// The current tokio runtime cannot drive background page reads
    #[error("Streaming queries require a multi-threaded tokio runtime")]
    UnsupportedRuntime,

    /// The response body was not a usable Atom document
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The streaming result could not be consumed
    #[error(transparent)]
    Stream(#[from] StreamError),
}

impl ClientError {
    /// Whether a retry policy should try again
    #[must_use]
    pub fn is_not_ready(&self) -> bool {
        matches!(self, Self::NotReady { .. })
    }
}

//! Error types for Reforge Core
//!
//! `ReforgeError` is what a whole call can fail with. `OracleError` is the narrower set of
//! failures an oracle round-trip can produce; the attempt cycle decides which of those it absorbs.

use thiserror::Error;

/// Result type alias for Reforge operations
pub type Result<T> = std::result::Result<T, ReforgeError>;

/// Main error type for Reforge operations
#[derive(Error, Debug)]
pub enum ReforgeError {
    /// Oracle-layer errors that escaped the attempt cycle
    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    /// Invalid or incomplete configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Options that cannot be resolved into a valid run
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    /// A per-file task ended outside the attempt cycle (panic or cancellation)
    #[error("Task for {path} failed: {reason}")]
    TaskFailed { path: String, reason: String },

    /// JSON encoding or decoding
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Any of the above, prefixed with what was being attempted
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        source: Box<ReforgeError>,
    },
}

/// Errors raised while talking to the Transformation or Compiler Oracle
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("Oracle unreachable: {0}")]
    Unreachable(String),

    #[error("Oracle timed out after {0}s")]
    Timeout(u64),

    #[error("Oracle rejected the request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Malformed oracle response: {0}")]
    Malformed(String),
}

impl OracleError {
    /// Transport failures are recovered locally; everything else escapes the cycle.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Unreachable(_) | Self::Timeout(_))
    }
}

impl ReforgeError {
    /// Add context to an error
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

/// `.context(..)` for any result whose error converts into [`ReforgeError`]
pub trait ResultExt<T> {
    fn context(self, context: impl Into<String>) -> Result<T>;

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E: Into<ReforgeError>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| Into::<ReforgeError>::into(e).context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| Into::<ReforgeError>::into(e).context(f()))
    }
}

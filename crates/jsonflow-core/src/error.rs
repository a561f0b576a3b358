//! Error types for the streaming JSON engine.

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can surface from the core engine.
///
/// Contract violations (ill-formed token streams, misuse of a value
/// iterator or a cursor) are *not* represented here: they panic, per the
/// "panics used for contract checks" design note. Only the three kinds
/// described for the engine's external surface live in this enum.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// Invalid query syntax, a disallowed literal, or an unknown/mismatched
    /// function call. Always reported at compile time.
    #[error("parse error: {message}")]
    Parse {
        /// Human-readable description of the syntax problem.
        message: String,
    },

    /// A syntactically valid query shape that is deliberately unsupported,
    /// e.g. a reverse-step slice with an open-ended bound under descent.
    #[error("unimplemented feature: {0}")]
    UnimplementedFeature(String),

    /// A `Source` failed to produce tokens (wraps a decoder/IO failure).
    #[error("source error: {0}")]
    Source(String),

    /// A `Sink` failed to consume tokens (wraps an encoder/IO failure).
    #[error("sink error: {0}")]
    Sink(String),

    /// The downstream end of a pipeline channel was closed. The pipeline
    /// driver treats this as a clean early termination, not a failure.
    #[error("broken pipe")]
    BrokenPipe,
}

impl Error {
    /// Build a [`Error::Parse`] from any displayable message.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Build an [`Error::UnimplementedFeature`].
    pub fn unimplemented(message: impl Into<String>) -> Self {
        Self::UnimplementedFeature(message.into())
    }

    /// True if this error represents a broken-pipe condition, which the
    /// pipeline driver recovers from silently.
    pub fn is_broken_pipe(&self) -> bool {
        matches!(self, Error::BrokenPipe)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::BrokenPipe {
            Error::BrokenPipe
        } else {
            Error::Sink(err.to_string())
        }
    }
}

//! Error types for dhkex operations.

use dhkex_proto::Field;

/// Alias for `Result<T, dhkex::Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by key exchange operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The stream failed: closed, reset, timed out, or carried a malformed
    /// frame.
    #[error("transport: {0}")]
    Transport(#[from] std::io::Error),

    /// A frame arrived intact but its value is unusable.
    #[error("protocol: bad {field}: {reason}")]
    Protocol {
        /// Which value was being read.
        field: Field,
        /// Why it was rejected.
        reason: String,
    },

    /// Random or prime generation was misused or gave up.
    #[error("generation: {0}")]
    Generation(String),

    /// Invalid address, port, or policy, caught before any session starts.
    #[error("config: {0}")]
    Config(String),
}

impl Error {
    /// Shorthand for an [`Error::Protocol`].
    pub(crate) fn protocol(field: Field, reason: impl Into<String>) -> Self {
        Self::Protocol {
            field,
            reason: reason.into(),
        }
    }

    /// Returns `true` for [`Error::Transport`].
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

//! Error types for book operations.

/// Errors produced by the book and its resolver.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A method was called against an absent logbook. Never produced by
    /// the book itself; callers holding an optional book return it.
    #[error("logbook: does not exist")]
    NoLogbook,
    /// An id or name resolved to no log.
    #[error("logbook: not found")]
    NotFound,
    /// A dataset reference could not be resolved.
    #[error("reference not found")]
    RefNotFound,
    /// A foreign log would shrink an existing one. Because logs are
    /// append-only, passing a shorter log than the one on file is grounds
    /// for rejection.
    #[error("logbook: log is too short")]
    LogTooShort,
    /// Two histories share no common prefix.
    #[error("logbook: divergent history")]
    DivergentHistory,
    /// A write against a log the book's author does not own.
    #[error("access denied: you do not have write access")]
    AccessDenied,
    /// A proposed username or dataset name failed validation.
    #[error("logbook: name {0:?} invalid")]
    InvalidName(String),
    /// A dataset init collided with an existing non-empty log.
    #[error("logbook: dataset named {0:?} already exists")]
    AlreadyExists(String),
    /// A foreign log's signature was missing or did not verify.
    #[error("logbook: invalid signature")]
    SignatureInvalid,
    /// A save's commit run id did not match the provided run state.
    #[error("logbook: commit run id does not match the provided run id")]
    RunIdMismatch,
    /// The operation's cancellation handle fired.
    #[error("logbook: operation cancelled")]
    Cancelled,
    /// A log violated a structural expectation.
    #[error("logbook: {0}")]
    Malformed(String),
    /// An engine failure with no book-level mapping.
    #[error(transparent)]
    Engine(oplog::Error),
    /// Filesystem failure while loading or persisting.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<oplog::Error> for Error {
    fn from(err: oplog::Error) -> Self {
        match err {
            oplog::Error::NotFound => Error::NotFound,
            oplog::Error::DivergentHistory => Error::DivergentHistory,
            oplog::Error::SignatureInvalid => Error::SignatureInvalid,
            other => Error::Engine(other),
        }
    }
}

/// Result type for book operations.
pub type Result<T> = std::result::Result<T, Error>;

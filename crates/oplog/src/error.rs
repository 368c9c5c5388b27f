//! Error types for the oplog engine.

/// Errors produced by log and journal operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An id or name path resolved to no log.
    #[error("oplog: not found")]
    NotFound,
    /// A merge encountered two histories that do not share a prefix.
    #[error("oplog: divergent history")]
    DivergentHistory,
    /// A signature was missing or did not verify.
    #[error("oplog: invalid signature")]
    SignatureInvalid,
    /// An init operation was appended anywhere but index 0.
    #[error("oplog: init operation must be the first operation in a log")]
    InitNotFirst,
    /// A byte sequence did not decode as a valid log.
    #[error("oplog: invalid wire encoding: {0}")]
    Wire(String),
    /// Encryption or decryption of the at-rest form failed.
    #[error("oplog: cipher failure")]
    Cipher,
}

/// Result type for oplog operations.
pub type Result<T> = std::result::Result<T, Error>;

//! Unified error type for filesniff.
//!
//! Only programming errors in the decode utilities and genuine source I/O
//! failures surface to callers. Everything a scanner can trip over while
//! inspecting malformed input is converted to "no match" before it gets here.
use thiserror::Error;

/// Main error type for filesniff operations.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error from the underlying source
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Decode utility called with arguments that violate its contract
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Not enough data to decode the requested value
    #[error("Insufficient data: expected {expected}, got {available}")]
    InsufficientData { expected: usize, available: usize },

    /// Source does not carry the compound file signature
    #[error("Not a valid compound file")]
    NotCompoundFile,

    /// Corrupted or malformed container
    #[error("Corrupted file: {0}")]
    CorruptedFile(String),

    /// Stream not present in a compound file
    #[error("Stream not found")]
    StreamNotFound,

    /// ZIP archive error
    #[error("Archive error: {0}")]
    Archive(String),
}

impl Error {
    /// Whether this error only means the source ended before a structure did.
    ///
    /// Scanners treat truncation as "no match" and let every other I/O error
    /// propagate.
    pub fn is_truncation(&self) -> bool {
        match self {
            Error::Io(e) => e.kind() == std::io::ErrorKind::UnexpectedEof,
            Error::InsufficientData { .. } => true,
            _ => false,
        }
    }

    /// Whether this error must propagate out of a scanner instead of turning
    /// into "no match".
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Io(_)) && !self.is_truncation()
    }
}

/// Result type for filesniff operations.
pub type Result<T> = std::result::Result<T, Error>;

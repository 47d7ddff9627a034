//! Error conversion implementations.
//!
//! This module contains From trait implementations to convert from the
//! container libraries' error types to the unified Error type.

#[cfg(feature = "archive")]
use super::types::Error;

#[cfg(feature = "archive")]
impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(e) => Error::Io(e),
            other => Error::Archive(other.to_string()),
        }
    }
}

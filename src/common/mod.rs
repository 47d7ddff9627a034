//! Decode utilities and error types shared by every scanner family.

#[cfg(feature = "archive")]
pub mod archive;
pub mod binary;
pub mod error;

pub use binary::Endian;
pub use error::{Error, Result};

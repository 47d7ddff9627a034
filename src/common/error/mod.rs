//! Unified error types for filesniff.
//!
//! This module provides the single error type surfaced by the decode
//! utilities, the container readers and the scan entry points.

// Submodule declarations
pub mod conversions;
pub mod types;

// Re-exports
pub use types::{Error, Result};

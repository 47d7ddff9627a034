//! Content-based format detection.
//!
//! A [`ScannerRegistry`] reads the first and last bytes of a source, runs
//! every registered [`Scanner`] against a [`ScanJob`] and resolves the
//! matches to one [`FileFormat`] by priority.

pub mod cache;
pub mod format;
pub mod job;
pub mod options;
pub mod registry;
pub mod scanner;
pub mod scanners;

pub use cache::JobCache;
pub use format::{Bitness, FileFormat, FormatKind, OdfClass, OfficeApp, PstEncoding, SwfCompression, UofClass};
pub use job::{ScanJob, Source, read_windows};
pub use options::ScanOptions;
pub use registry::ScannerRegistry;
pub use scanner::Scanner;

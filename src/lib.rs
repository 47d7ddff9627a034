//! Filesniff - content-based file format detection
//!
//! This library identifies the format of a file from its bytes rather than
//! its name. Every scanner looks at the first and last 4096 bytes of the
//! source; container-aware scanners open the source as a ZIP archive or an
//! OLE2 compound file to tell apart the formats that share one envelope.
//!
//! # Features
//!
//! - **Signature scanners**: images, archives, executables, media, PDF, Flash,
//!   Mobipocket e-books
//! - **Archive refinement** (`archive`): Office Open XML with the macro flag,
//!   OpenDocument, EPUB, NuGet and Java archives
//! - **Compound file refinement** (`ole`): legacy Word, Excel and PowerPoint,
//!   Windows Installer packages, Outlook messages, Publisher documents
//! - **UOF documents** (`uof`): text, spreadsheet and presentation files
//!   told apart by their root element
//! - **Async entry points** (`async`): the same scan over tokio sources
//!
//! # Example - Detecting a file
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! match filesniff::detect_path("report.xlsx")? {
//!     Some(format) => println!("{} ({:?})", format, format.content_type()),
//!     None => println!("Unknown format"),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Example - Detecting a buffer
//!
//! ```
//! use filesniff::FormatKind;
//!
//! let mut data = b"%PDF-1.7\n1 0 obj << >> endobj\n".to_vec();
//! data.extend_from_slice(b"%%EOF\n");
//! let format = filesniff::detect_bytes(&data).unwrap().unwrap();
//! assert_eq!(format.kind(), FormatKind::Pdf);
//! assert_eq!(format.extension(), Some("pdf"));
//! ```
//!
//! # Example - Custom scanners
//!
//! ```
//! use filesniff::{FileFormat, FormatKind, Result, ScanJob, Scanner, ScannerRegistry};
//!
//! struct RarOnly;
//!
//! impl Scanner for RarOnly {
//!     fn name(&self) -> &'static str {
//!         "rar-only"
//!     }
//!
//!     fn detect(&self, job: &mut ScanJob<'_>) -> Result<Option<FileFormat>> {
//!         let rar = FileFormat::new(FormatKind::Rar, &["application/vnd.rar"], &["rar"], "RAR");
//!         Ok(job.start_bytes().starts_with(b"Rar!").then_some(rar))
//!     }
//! }
//!
//! let mut registry = ScannerRegistry::new();
//! registry.register(RarOnly);
//! assert!(registry.detect_bytes(b"Rar!\x1A\x07\x00").unwrap().is_some());
//! ```

use std::io::{Read, Seek};
use std::path::Path;

/// Decode utilities, archive helpers and the error type
pub mod common;

/// Content-based detection: descriptors, scan jobs, scanners and the registry
pub mod detection;

/// OLE2 compound file reader
///
/// Read-only access to the storages and streams of a compound file, plus
/// property set decoding for the summary information streams.
#[cfg(feature = "ole")]
pub mod ole;

pub use common::error::{Error, Result};
pub use detection::{
    Bitness, FileFormat, FormatKind, JobCache, OdfClass, OfficeApp, PstEncoding, ScanJob, ScanOptions, Scanner,
    ScannerRegistry, SwfCompression, UofClass,
};

/// Detect the format of a seekable source with the builtin scanners.
pub fn detect<R: Read + Seek>(source: &mut R) -> Result<Option<FileFormat>> {
    ScannerRegistry::shared().detect(source)
}

/// Detect the format of an in-memory buffer with the builtin scanners.
pub fn detect_bytes(data: &[u8]) -> Result<Option<FileFormat>> {
    ScannerRegistry::shared().detect_bytes(data)
}

/// Open a file and detect its format with the builtin scanners.
pub fn detect_path<P: AsRef<Path>>(path: P) -> Result<Option<FileFormat>> {
    ScannerRegistry::shared().detect_path(path)
}

/// Detect the format of an async source with the builtin scanners.
#[cfg(feature = "async")]
pub async fn detect_async<S>(source: &mut S) -> Result<Option<FileFormat>>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncSeek + Unpin + ?Sized,
{
    ScannerRegistry::shared().detect_async(source).await
}

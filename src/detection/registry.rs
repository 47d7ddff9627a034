//! Ordered collection of scanners and the detection entry points.

use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::Path;

use once_cell::sync::Lazy;
use tracing::debug;

use super::format::FileFormat;
use super::job::{ScanJob, read_windows};
use super::options::ScanOptions;
use super::scanner::Scanner;
use super::scanners::register_builtin;
use crate::common::error::Result;

/// Builtin registry shared by the crate level entry points.
static SHARED: Lazy<ScannerRegistry> = Lazy::new(ScannerRegistry::builtin);

/// Append-only list of scanners, run in registration order.
///
/// # Examples
///
/// ```
/// use filesniff::ScannerRegistry;
///
/// let registry = ScannerRegistry::builtin();
/// let format = registry.detect_bytes(b"GIF89a\x01\x00\x01\x00\x80\x00\x00\xFF\xFF\xFF").unwrap();
/// assert_eq!(format.unwrap().extension(), Some("gif"));
/// ```
#[derive(Default)]
pub struct ScannerRegistry {
    scanners: Vec<Box<dyn Scanner>>,
}

impl ScannerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every builtin scanner.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        register_builtin(&mut registry);
        debug!(scanners = registry.len(), "Built scanner registry");
        registry
    }

    /// The builtin registry, built on first use.
    pub fn shared() -> &'static ScannerRegistry {
        &SHARED
    }

    /// Append a scanner. It runs after every scanner registered before it.
    pub fn register<S: Scanner + 'static>(&mut self, scanner: S) -> &mut Self {
        self.scanners.push(Box::new(scanner));
        self
    }

    pub fn register_boxed(&mut self, scanner: Box<dyn Scanner>) -> &mut Self {
        self.scanners.push(scanner);
        self
    }

    pub fn scanners(&self) -> &[Box<dyn Scanner>] {
        &self.scanners
    }

    /// Scanner names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.scanners.iter().map(|s| s.name())
    }

    pub fn len(&self) -> usize {
        self.scanners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scanners.is_empty()
    }

    /// Detect the format of a seekable source with default options.
    ///
    /// `Ok(None)` means no scanner recognized the content. Errors are I/O
    /// failures of the source only.
    pub fn detect<R: Read + Seek>(&self, source: &mut R) -> Result<Option<FileFormat>> {
        self.detect_with(source, &ScanOptions::default())
    }

    /// Detect the format of a seekable source.
    pub fn detect_with<R: Read + Seek>(&self, source: &mut R, options: &ScanOptions) -> Result<Option<FileFormat>> {
        let (start, end) = read_windows(source, options.window_size())?;
        let mut job = ScanJob::new(&self.scanners, &start, &end, source);
        job.scan()
    }

    /// Detect the format of an in-memory buffer.
    pub fn detect_bytes(&self, data: &[u8]) -> Result<Option<FileFormat>> {
        self.detect(&mut Cursor::new(data))
    }

    /// Open a file and detect its format.
    pub fn detect_path<P: AsRef<Path>>(&self, path: P) -> Result<Option<FileFormat>> {
        let mut file = File::open(path.as_ref())?;
        let format = self.detect(&mut file)?;
        debug!(path = %path.as_ref().display(), format = ?format.as_ref().map(FileFormat::description), "Detected file");
        Ok(format)
    }
}

#[cfg(feature = "async")]
mod asynchronous {
    use tokio::io::{AsyncRead, AsyncSeek};

    use super::ScannerRegistry;
    use crate::common::error::Result;
    use crate::detection::format::FileFormat;
    use crate::detection::job::{read_windows_async, scan_async};
    use crate::detection::options::ScanOptions;

    impl ScannerRegistry {
        /// Async counterpart of [`detect`](ScannerRegistry::detect).
        pub async fn detect_async<S: AsyncRead + AsyncSeek + Unpin + ?Sized>(
            &self,
            source: &mut S,
        ) -> Result<Option<FileFormat>> {
            self.detect_async_with(source, &ScanOptions::default()).await
        }

        /// Async counterpart of [`detect_with`](ScannerRegistry::detect_with).
        ///
        /// Container scanners work on an in-memory copy of the source, which
        /// is taken only when it is at most `options.max_snapshot_size` bytes.
        pub async fn detect_async_with<S: AsyncRead + AsyncSeek + Unpin + ?Sized>(
            &self,
            source: &mut S,
            options: &ScanOptions,
        ) -> Result<Option<FileFormat>> {
            let (start, end) = read_windows_async(source, options.window_size()).await?;
            scan_async(self.scanners(), &start, &end, source, options).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::format::FormatKind;

    fn pdf() -> Vec<u8> {
        b"%PDF-1.5\n1 0 obj\n<< /Type /Catalog >>\nendobj\ntrailer\n<< /Root 1 0 R >>\n%%EOF\r\n".to_vec()
    }

    #[test]
    fn test_registration_order() {
        let mut registry = ScannerRegistry::new();
        assert!(registry.is_empty());
        registry
            .register(crate::detection::scanners::others::PdfScanner)
            .register(crate::detection::scanners::others::SwfScanner);
        assert_eq!(registry.names().collect::<Vec<_>>(), ["pdf", "swf"]);
    }

    #[test]
    fn test_builtin_names_unique() {
        let registry = ScannerRegistry::builtin();
        let mut names: Vec<_> = registry.names().collect();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total);
        assert!(std::ptr::eq(ScannerRegistry::shared(), ScannerRegistry::shared()));
    }

    #[test]
    fn test_pdf_end_to_end() {
        let registry = ScannerRegistry::shared();
        let data = pdf();
        assert_eq!(registry.detect_bytes(&data).unwrap().unwrap().kind(), FormatKind::Pdf);

        let truncated = &data[..data.len() - 7];
        assert_eq!(registry.detect_bytes(truncated).unwrap(), None);
    }

    #[test]
    fn test_unknown_and_empty() {
        let registry = ScannerRegistry::shared();
        assert_eq!(registry.detect_bytes(b"").unwrap(), None);
        assert_eq!(registry.detect_bytes(b"just some plain text").unwrap(), None);
    }

    #[test]
    fn test_empty_registry() {
        assert_eq!(ScannerRegistry::new().detect_bytes(&pdf()).unwrap(), None);
    }

    #[test]
    fn test_small_window_option() {
        let data = pdf();
        let options = ScanOptions::default().with_window_size(8);
        let found = ScannerRegistry::shared().detect_with(&mut Cursor::new(&data), &options).unwrap();
        // An 8 byte start window is below the PDF minimum
        assert_eq!(found, None);
    }

    #[test]
    fn test_detect_path() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&pdf()).unwrap();
        file.flush().unwrap();
        let found = ScannerRegistry::shared().detect_path(file.path()).unwrap().unwrap();
        assert_eq!(found.content_type(), Some("application/pdf"));

        let missing = ScannerRegistry::shared().detect_path(file.path().with_extension("missing"));
        assert!(missing.is_err());
    }

    #[cfg(feature = "archive")]
    #[test]
    fn test_spreadsheet_package_beats_archive() {
        use crate::detection::format::OfficeApp;
        use crate::detection::scanners::tests::zip_archive;

        let types = br#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/></Types>"#;
        let data = zip_archive(&[("[Content_Types].xml", types), ("xl/workbook.xml", b"<workbook/>")]);
        assert_eq!(&data[..4], b"PK\x03\x04");

        let found = ScannerRegistry::shared().detect_bytes(&data).unwrap().unwrap();
        assert_eq!(
            found.kind(),
            FormatKind::OfficeOpenXml { app: OfficeApp::Excel, template: false, macros: false }
        );

        let plain = zip_archive(&[("readme.txt", b"hello")]);
        let found = ScannerRegistry::shared().detect_bytes(&plain).unwrap().unwrap();
        assert_eq!(found.kind(), FormatKind::Zip);
    }

    #[cfg(feature = "archive")]
    #[test]
    fn test_zip_precondition_shared_by_family() {
        use crate::detection::cache::keys;
        use crate::detection::scanners::tests::zip_archive;

        let data = zip_archive(&[("mimetype", b"application/epub+zip")]);
        let registry = ScannerRegistry::shared();
        let mut source = Cursor::new(&data);
        let (start, end) = read_windows(&mut source, 4096).unwrap();
        let mut job = ScanJob::new(registry.scanners(), &start, &end, &mut source);
        let found = job.scan().unwrap().unwrap();
        assert_eq!(found.kind(), FormatKind::Epub);
        assert!(job.cache().exists(keys::IS_ZIP));
        assert!(job.cache().exists(keys::ZIP_ENTRIES));
        assert!(job.cache().exists(keys::MIMETYPE));
    }

    #[cfg(feature = "ole")]
    #[test]
    fn test_installer_package_end_to_end() {
        use crate::ole::consts::{PIDSI_APPNAME, PIDSI_TITLE, SUMMARY_INFORMATION, VT_LPSTR};
        use crate::ole::fixture::CompoundBuilder;
        use crate::ole::{build_property_set, lpstr};

        let summary = build_property_set(&[
            (PIDSI_TITLE, VT_LPSTR, lpstr(b"Installation Database")),
            (PIDSI_APPNAME, VT_LPSTR, lpstr(b"Windows Installer XML Toolset (3.11)")),
        ]);
        let data = CompoundBuilder::new().stream(SUMMARY_INFORMATION, summary).build();
        let found = ScannerRegistry::shared().detect_bytes(&data).unwrap().unwrap();
        assert_eq!(found.kind(), FormatKind::InstallerPackage);
        assert_eq!(found.extension(), Some("msi"));
    }

    #[test]
    fn test_mobi_end_to_end() {
        let mut data = b"Pride_and_Prejudice".to_vec();
        data.resize(60, 0);
        data.extend_from_slice(b"BOOKMOBI");
        data.resize(512, 0);
        let found = ScannerRegistry::shared().detect_bytes(&data).unwrap().unwrap();
        assert_eq!(found.kind(), FormatKind::Mobi);
    }

    #[cfg(feature = "uof")]
    #[test]
    fn test_uof_end_to_end() {
        use crate::detection::format::UofClass;

        let data = br#"<?xml version="1.0" encoding="UTF-8"?>
<uof:UOF xmlns:uof="http://schemas.uof.org/cn/2003/uof" uof:mimetype="vnd.uof.spreadsheet"><uof:metadata/></uof:UOF>"#;
        let found = ScannerRegistry::shared().detect_bytes(data).unwrap().unwrap();
        assert_eq!(found.kind(), FormatKind::UnifiedOffice { class: UofClass::Spreadsheet });
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn test_async_matches_blocking() {
        let registry = ScannerRegistry::shared();
        let mut samples = vec![pdf(), b"GIF89a\x01\x00\x01\x00\x80\x00\x00\xFF\xFF\xFF".to_vec(), Vec::new()];
        #[cfg(feature = "archive")]
        samples.push(crate::detection::scanners::tests::zip_archive(&[(
            "mimetype",
            b"application/vnd.oasis.opendocument.text",
        )]));

        for data in samples {
            let blocking = registry.detect_bytes(&data).unwrap();
            let asynchronous = registry.detect_async(&mut Cursor::new(data.clone())).await.unwrap();
            assert_eq!(blocking, asynchronous);
        }
    }

    #[cfg(all(feature = "async", feature = "archive"))]
    #[tokio::test]
    async fn test_async_snapshot_limit() {
        use crate::detection::scanners::tests::zip_archive;

        let data = zip_archive(&[("mimetype", b"application/epub+zip")]);
        let options = ScanOptions::default().with_max_snapshot_size(16);
        let found = ScannerRegistry::shared()
            .detect_async_with(&mut Cursor::new(data), &options)
            .await
            .unwrap();
        // Container scanners are skipped; nothing else knows the bytes
        assert_eq!(found, None);
    }
}

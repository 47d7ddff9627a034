//! The scanner contract and the preconditions shared by container families.
//!
//! A refining scanner never re-validates its envelope on its own. It calls
//! the family precondition here, which evaluates the check once per job and
//! stores the verdict in the job cache under a fixed key, so every sibling
//! of the family reuses it.

use memchr::memmem;
use tracing::trace;

use super::cache::keys;
use super::format::FileFormat;
use super::job::ScanJob;
use crate::common::binary::{Endian, match_at, match_start, read_u32};
use crate::common::error::Result;

/// A unit that recognizes one format, or one family of related formats.
///
/// Implementations hold no per-scan state. A scanner must not fail on
/// malformed or truncated input; that is a `None` verdict. Only I/O errors
/// of the source itself are returned.
pub trait Scanner: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Try to recognize the format of the job's source.
    fn detect(&self, job: &mut ScanJob<'_>) -> Result<Option<FileFormat>>;

    /// Whether [`detect`](Scanner::detect) reads the source beyond the
    /// windows. The async scan only buffers the source for these scanners.
    fn reads_source(&self) -> bool {
        false
    }
}

/// Whether `needle` occurs in `haystack`.
pub(crate) fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    memmem::find(haystack, needle).is_some()
}

/// Turn a container failure into "no match" unless the source itself failed.
pub(crate) fn recover<T>(result: Result<T>, scanner: &'static str) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            trace!(scanner, error = %e, "Container not readable");
            Ok(None)
        },
    }
}

/// Local file header signature `PK\x03\x04`.
const ZIP_LOCAL_HEADER: u32 = 0x0403_4B50;

/// `RIFF`
const RIFF_MAGIC: u32 = 0x4646_4952;

const EBML_MAGIC: [Option<u8>; 4] = [Some(0x1A), Some(0x45), Some(0xDF), Some(0xA3)];

const FTYP: [Option<u8>; 8] = [None, None, None, None, Some(b'f'), Some(b't'), Some(b'y'), Some(b'p')];

/// Start window carries a ZIP local file header.
pub fn is_zip(job: &mut ScanJob<'_>) -> bool {
    job.memoize(keys::IS_ZIP, |job| {
        let start = job.start_bytes();
        start.len() > 30 && read_u32(start, 0, Endian::Little).is_ok_and(|sig| sig == ZIP_LOCAL_HEADER)
    })
}

/// Start window carries a RIFF header.
pub fn is_riff(job: &mut ScanJob<'_>) -> bool {
    job.memoize(keys::IS_RIFF, |job| {
        let start = job.start_bytes();
        start.len() > 12 && read_u32(start, 0, Endian::Little).is_ok_and(|sig| sig == RIFF_MAGIC)
    })
}

/// Start window carries an ISO base media `ftyp` box.
pub fn is_base_media(job: &mut ScanJob<'_>) -> bool {
    job.memoize(keys::IS_QUICKTIME, |job| {
        let start = job.start_bytes();
        start.len() > 12 && match_start(start, &FTYP)
    })
}

/// Start window carries an EBML header.
pub fn is_ebml(job: &mut ScanJob<'_>) -> bool {
    job.memoize(keys::IS_EBML, |job| {
        let start = job.start_bytes();
        start.len() > 4 && match_at(start, 0, &EBML_MAGIC)
    })
}

#[cfg(feature = "archive")]
mod archive {
    use std::sync::Arc;

    use super::*;
    use crate::common::archive::{entry_names, open_archive, read_entry_text};

    type Entries = Option<Arc<Vec<String>>>;
    type Text = Option<Arc<str>>;

    /// Entry names of the ZIP archive, listed once per job.
    ///
    /// `None` when the start window is not a ZIP header or the source does
    /// not open as an archive.
    pub fn zip_entries(job: &mut ScanJob<'_>) -> Result<Entries> {
        if !is_zip(job) {
            return Ok(None);
        }
        if let Some(cached) = job.cache().get::<Entries>(keys::ZIP_ENTRIES) {
            return Ok(cached.clone());
        }

        let entries = open_archive(job.source())?.map(|archive| Arc::new(entry_names(&archive)));
        if entries.is_none() {
            trace!("Source does not open as a ZIP archive");
        }
        job.cache_mut().set(keys::ZIP_ENTRIES, entries.clone());
        Ok(entries)
    }

    /// Text of one archive entry, read once per job and kept under `key`.
    ///
    /// A missing entry reads as the empty string.
    fn entry_text(job: &mut ScanJob<'_>, key: &str, name: &str) -> Result<Text> {
        if !is_zip(job) {
            return Ok(None);
        }
        if let Some(cached) = job.cache().get::<Text>(key) {
            return Ok(cached.clone());
        }

        let text: Text = match open_archive(job.source())? {
            Some(mut archive) => read_entry_text(&mut archive, name)?.map(Arc::from),
            None => None,
        };
        job.cache_mut().set(key, text.clone());
        Ok(text)
    }

    /// Text of `[Content_Types].xml`.
    pub fn content_types(job: &mut ScanJob<'_>) -> Result<Text> {
        entry_text(job, keys::CONTENT_TYPES, "[Content_Types].xml")
    }

    /// Text of the `mimetype` entry.
    pub fn mimetype(job: &mut ScanJob<'_>) -> Result<Text> {
        entry_text(job, keys::MIMETYPE, "mimetype")
    }
}

#[cfg(feature = "archive")]
pub use archive::{content_types, mimetype, zip_entries};

#[cfg(feature = "ole")]
mod compound {
    use std::sync::Arc;

    use super::*;
    use crate::detection::job::Source;
    use crate::ole::OleFile;
    use crate::ole::consts::MAGIC;

    type Entries = Option<Arc<Vec<String>>>;

    /// Start window carries the compound file signature.
    pub fn is_compound_file(job: &mut ScanJob<'_>) -> bool {
        job.memoize(keys::IS_OLE_CFS, |job| {
            let start = job.start_bytes();
            start.len() > 8 && start.starts_with(MAGIC)
        })
    }

    /// Open the source as a compound file.
    ///
    /// `None` when the signature is missing or the structure is damaged.
    pub fn open_compound<'s>(
        job: &'s mut ScanJob<'_>,
        scanner: &'static str,
    ) -> Result<Option<OleFile<&'s mut dyn Source>>> {
        if !is_compound_file(job) {
            return Ok(None);
        }
        recover(OleFile::open(job.source()), scanner)
    }

    /// Names of every storage and stream in the compound file, listed once
    /// per job.
    pub fn compound_entries(job: &mut ScanJob<'_>) -> Result<Entries> {
        if !is_compound_file(job) {
            return Ok(None);
        }
        if let Some(cached) = job.cache().get::<Entries>(keys::OLE_ENTRIES) {
            return Ok(cached.clone());
        }

        let entries = open_compound(job, "compound")?.map(|ole| Arc::new(ole.entry_names()));
        job.cache_mut().set(keys::OLE_ENTRIES, entries.clone());
        Ok(entries)
    }
}

#[cfg(feature = "ole")]
pub use compound::{compound_entries, is_compound_file, open_compound};

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn with_job<T>(data: &[u8], f: impl FnOnce(&mut ScanJob<'_>) -> T) -> T {
        let mut source = Cursor::new(data.to_vec());
        let mut job = ScanJob::new(&[], data, data, &mut source);
        f(&mut job)
    }

    #[test]
    fn test_is_zip_requires_full_header() {
        let mut data = b"PK\x03\x04".to_vec();
        assert!(!with_job(&data, |job| is_zip(job)));
        data.resize(64, 0);
        assert!(with_job(&data, |job| is_zip(job)));
    }

    #[test]
    fn test_precondition_cached_under_key() {
        let mut data = b"RIFF\0\0\0\0WAVEfmt ".to_vec();
        data.resize(32, 0);
        with_job(&data, |job| {
            assert!(is_riff(job));
            assert_eq!(job.cache().get::<bool>("isriff"), Some(&true));
            assert!(is_riff(job));
            assert_eq!(job.cache().count(), 1);
        });
    }

    #[test]
    fn test_base_media_and_ebml() {
        let mut ftyp = b"\0\0\0\x18ftypisom".to_vec();
        ftyp.resize(24, 0);
        assert!(with_job(&ftyp, |job| is_base_media(job)));
        assert!(!with_job(b"\0\0\0\x18moovisom\0\0\0\0", |job| is_base_media(job)));
        assert!(with_job(b"\x1A\x45\xDF\xA3\x01\x00", |job| is_ebml(job)));
        assert!(!with_job(b"\x1A\x45\xDF", |job| is_ebml(job)));
    }

    #[test]
    fn test_recover_only_propagates_io() {
        use crate::common::error::Error;
        assert!(recover::<()>(Err(Error::NotCompoundFile), "t").unwrap().is_none());
        let eof = std::io::Error::from(std::io::ErrorKind::UnexpectedEof);
        assert!(recover::<()>(Err(Error::Io(eof)), "t").unwrap().is_none());
        let denied = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        assert!(recover::<()>(Err(Error::Io(denied)), "t").is_err());
    }

    #[cfg(feature = "archive")]
    #[test]
    fn test_zip_entries_cached_once() {
        use std::io::Write;
        use zip::write::{SimpleFileOptions, ZipWriter};

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer.start_file("mimetype", SimpleFileOptions::default()).unwrap();
        writer.write_all(b"application/epub+zip").unwrap();
        let data = writer.finish().unwrap().into_inner();

        with_job(&data, |job| {
            let entries = zip_entries(job).unwrap().unwrap();
            assert_eq!(entries.as_slice(), ["mimetype".to_string()]);
            assert!(job.cache().exists(keys::ZIP_ENTRIES));
            let again = zip_entries(job).unwrap().unwrap();
            assert!(std::sync::Arc::ptr_eq(&entries, &again));
            assert_eq!(mimetype(job).unwrap().as_deref(), Some("application/epub+zip"));
        });
    }

    #[cfg(feature = "archive")]
    #[test]
    fn test_broken_zip_is_no_entries() {
        let mut data = b"PK\x03\x04".to_vec();
        data.resize(200, 0xEE);
        with_job(&data, |job| {
            assert!(zip_entries(job).unwrap().is_none());
            assert!(content_types(job).unwrap().is_none());
        });
    }

    #[cfg(feature = "ole")]
    #[test]
    fn test_compound_entries() {
        use crate::ole::fixture::CompoundBuilder;

        let data = CompoundBuilder::new().stream("WordDocument", vec![1; 16]).build();
        with_job(&data, |job| {
            let entries = compound_entries(job).unwrap().unwrap();
            assert!(entries.iter().any(|name| name == "WordDocument"));
            assert!(job.cache().exists(keys::OLE_ENTRIES));
        });

        let mut fake = crate::ole::consts::MAGIC.to_vec();
        fake.resize(600, 0);
        with_job(&fake, |job| {
            assert!(is_compound_file(job));
            assert!(compound_entries(job).unwrap().is_none());
        });
    }
}

//! ZIP archive helpers for the archive-packaged scanner family.
//!
//! Opening failures split in two: a source that is not a readable archive
//! (bad central directory, truncated data, unsupported compression) is just
//! "not an archive" and yields `Ok(None)`, while a failing reader propagates.
//!
//! The archive reads through [`SourceReader`], which tags every error the
//! source itself raises. Entry decoding can then tell a disk failure from a
//! corrupt deflate stream or a checksum mismatch even when both share an
//! [`io::ErrorKind`].

use std::fmt;
use std::io::{self, Read, Seek, SeekFrom};

use tracing::trace;
use zip::ZipArchive;

use crate::common::error::{Error, Result};

/// Upper bound on the text read from a single entry.
pub const MAX_TEXT_ENTRY_SIZE: u64 = 4 * 1024 * 1024;

/// Wrapper carried inside errors raised by the source of a [`SourceReader`].
#[derive(Debug)]
struct SourceFailure(io::Error);

impl fmt::Display for SourceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for SourceFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

/// Reader adapter that tags the errors of the wrapped source.
#[derive(Debug)]
pub struct SourceReader<R> {
    inner: R,
}

fn tag(err: io::Error) -> io::Error {
    io::Error::new(err.kind(), SourceFailure(err))
}

impl<R: Read> Read for SourceReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf).map_err(tag)
    }
}

impl<R: Seek> Seek for SourceReader<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos).map_err(tag)
    }
}

/// `Ok` with the source's own error, or `Err` with an error raised while
/// decoding the archive.
fn source_failure(err: io::Error) -> std::result::Result<io::Error, io::Error> {
    if !err.get_ref().is_some_and(|inner| inner.is::<SourceFailure>()) {
        return Err(err);
    }
    match err.into_inner().map(|inner| inner.downcast::<SourceFailure>()) {
        Some(Ok(failure)) => Ok(failure.0),
        Some(Err(other)) => Err(io::Error::other(other)),
        None => Err(io::Error::other("untagged archive error")),
    }
}

/// Convert a container failure into "no match" unless it is a real I/O error.
fn recover<T>(result: std::result::Result<T, zip::result::ZipError>, context: &str) -> Result<Option<T>> {
    let err = match result {
        Ok(value) => return Ok(Some(value)),
        Err(zip::result::ZipError::Io(e)) => match source_failure(e) {
            Ok(source) => Error::Io(source),
            Err(decoding) => Error::Archive(decoding.to_string()),
        },
        Err(other) => Error::from(other),
    };
    if err.is_fatal() {
        return Err(err);
    }
    trace!(error = %err, context, "Archive not readable");
    Ok(None)
}

/// Open a ZIP archive over the source.
///
/// Returns `Ok(None)` if the source is not a valid archive.
pub fn open_archive<R: Read + Seek>(source: R) -> Result<Option<ZipArchive<SourceReader<R>>>> {
    recover(ZipArchive::new(SourceReader { inner: source }), "open")
}

/// Names of every entry in the archive, in central directory order.
pub fn entry_names<R: Read + Seek>(archive: &ZipArchive<R>) -> Vec<String> {
    archive.file_names().map(str::to_string).collect()
}

/// Find an entry by name.
///
/// An exact match on the full entry name wins; otherwise the first entry
/// whose file-name component equals `name` is used.
fn find_entry<R: Read + Seek>(archive: &ZipArchive<R>, name: &str) -> Option<usize> {
    archive.index_for_name(name).or_else(|| {
        (0..archive.len()).find(|&i| {
            archive
                .name_for_index(i)
                .is_some_and(|full| full.rsplit('/').next() == Some(name))
        })
    })
}

/// Read the text of one entry from an already open archive.
///
/// Returns `Ok(Some(String::new()))` when the entry does not exist and
/// `Ok(None)` when the entry exists but cannot be decompressed. Failures of
/// the source itself are only told apart for archives from [`open_archive`].
pub fn read_entry_text<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Option<String>> {
    let Some(index) = find_entry(archive, name) else {
        return Ok(Some(String::new()));
    };
    let Some(entry) = recover(archive.by_index(index), name)? else {
        return Ok(None);
    };

    let mut bytes = Vec::new();
    match entry.take(MAX_TEXT_ENTRY_SIZE).read_to_end(&mut bytes) {
        Ok(_) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
        Err(e) => match source_failure(e) {
            Ok(source) => {
                let err = Error::Io(source);
                if err.is_fatal() {
                    return Err(err);
                }
                trace!(error = %err, entry = name, "Archive entry truncated");
                Ok(None)
            },
            Err(decoding) => {
                trace!(error = %decoding, entry = name, "Archive entry not readable");
                Ok(None)
            },
        },
    }
}

/// Read an entry's text straight from a source.
///
/// * `Ok(Some(text))` when the entry exists,
/// * `Ok(Some(String::new()))` when the archive opens but has no such entry,
/// * `Ok(None)` when the source is not a readable archive.
///
/// # Examples
///
/// ```
/// use std::io::{Cursor, Write};
/// use filesniff::common::archive::read_text_entry;
/// use zip::write::{SimpleFileOptions, ZipWriter};
///
/// let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
/// writer.start_file("mimetype", SimpleFileOptions::default()).unwrap();
/// writer.write_all(b"application/epub+zip").unwrap();
/// let bytes = writer.finish().unwrap().into_inner();
///
/// let text = read_text_entry(Cursor::new(bytes), "mimetype").unwrap();
/// assert_eq!(text.as_deref(), Some("application/epub+zip"));
/// ```
pub fn read_text_entry<R: Read + Seek>(source: R, name: &str) -> Result<Option<String>> {
    match open_archive(source)? {
        Some(mut archive) => read_entry_text(&mut archive, name),
        None => Ok(None),
    }
}

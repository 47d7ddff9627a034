//! Scan job: the per-call context every scanner runs against.

use std::cmp::Reverse;
use std::io::{Read, Seek, SeekFrom};

use smallvec::SmallVec;
use tracing::{debug, trace};

use super::cache::JobCache;
use super::format::FileFormat;
use super::scanner::Scanner;
use crate::common::binary::read_bytes_from;
use crate::common::error::Result;

/// A random-access byte source.
pub trait Source: Read + Seek {}

impl<T: Read + Seek + ?Sized> Source for T {}

/// Candidates collected during one scan; most inputs match at most a few scanners.
type Candidates = SmallVec<[FileFormat; 4]>;

/// Bundles the byte windows, the source and the cache of one detection call.
///
/// The job borrows the scanner list, both windows and the source; it owns
/// only its [`JobCache`], which is dropped with it.
pub struct ScanJob<'a> {
    scanners: &'a [Box<dyn Scanner>],
    start: &'a [u8],
    end: &'a [u8],
    source: &'a mut dyn Source,
    cache: JobCache,
}

impl<'a> ScanJob<'a> {
    /// Create a job with an empty cache.
    ///
    /// `start` and `end` are the first and last bytes of the source, at most
    /// 4096 each, and equal when the source is no longer than a window.
    pub fn new(
        scanners: &'a [Box<dyn Scanner>],
        start: &'a [u8],
        end: &'a [u8],
        source: &'a mut dyn Source,
    ) -> Self {
        Self::with_cache(scanners, start, end, source, JobCache::new())
    }

    /// Create a job that continues with an existing cache.
    pub fn with_cache(
        scanners: &'a [Box<dyn Scanner>],
        start: &'a [u8],
        end: &'a [u8],
        source: &'a mut dyn Source,
        cache: JobCache,
    ) -> Self {
        ScanJob {
            scanners,
            start,
            end,
            source,
            cache,
        }
    }

    /// First bytes of the source.
    pub fn start_bytes(&self) -> &'a [u8] {
        self.start
    }

    /// Last bytes of the source.
    pub fn end_bytes(&self) -> &'a [u8] {
        self.end
    }

    /// The underlying source. Its position is 0 when a scanner starts.
    pub fn source(&mut self) -> &mut dyn Source {
        &mut *self.source
    }

    pub fn cache(&self) -> &JobCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut JobCache {
        &mut self.cache
    }

    /// Give up the job, keeping its cache.
    pub fn into_cache(self) -> JobCache {
        self.cache
    }

    /// Evaluate a boolean precondition once per job under `key`.
    pub fn memoize(&mut self, key: &str, check: impl FnOnce(&Self) -> bool) -> bool {
        if let Some(&cached) = self.cache.get::<bool>(key) {
            return cached;
        }
        let result = check(self);
        self.cache.set(key, result);
        result
    }

    /// Run every scanner in registration order and resolve the verdict.
    ///
    /// The source is rewound before each scanner. Only I/O failures of the
    /// source abort the scan.
    pub fn scan(&mut self) -> Result<Option<FileFormat>> {
        let scanners = self.scanners;
        let mut candidates = Candidates::new();

        for scanner in scanners {
            self.source.seek(SeekFrom::Start(0))?;
            if let Some(format) = scanner.detect(self)? {
                collect(&mut candidates, scanner.as_ref(), format);
            }
        }

        Ok(resolve(candidates))
    }
}

/// Append a match unless the same format is already a candidate.
fn collect(candidates: &mut Candidates, scanner: &dyn Scanner, format: FileFormat) {
    trace!(scanner = scanner.name(), format = %format, priority = format.priority(), "Scanner matched");
    if !candidates.contains(&format) {
        candidates.push(format);
    }
}

/// Pick the highest priority candidate; ties go to the earliest registered.
fn resolve(mut candidates: Candidates) -> Option<FileFormat> {
    // Stable sort keeps registration order among equal priorities
    candidates.sort_by_key(|f| Reverse(f.priority()));
    let verdict = candidates.into_iter().next();
    match &verdict {
        Some(format) => debug!(format = %format, "Resolved file format"),
        None => debug!("No scanner matched"),
    }
    verdict
}

/// Read the start and end windows of a source.
///
/// Both windows are the whole content when it fits in `window` bytes.
pub fn read_windows<R: Read + Seek + ?Sized>(source: &mut R, window: usize) -> Result<(Vec<u8>, Vec<u8>)> {
    let len = source.seek(SeekFrom::End(0))?;
    source.seek(SeekFrom::Start(0))?;
    let start = read_bytes_from(source, window)?;

    let end = if len > window as u64 {
        source.seek(SeekFrom::End(-(window as i64)))?;
        read_bytes_from(source, window)?
    } else {
        start.clone()
    };
    source.seek(SeekFrom::Start(0))?;
    Ok((start, end))
}

#[cfg(feature = "async")]
mod asynchronous {
    use std::io::{Cursor, SeekFrom};

    use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt};
    use tracing::trace;

    use super::{Candidates, ScanJob, collect, resolve};
    use crate::common::error::Result;
    use crate::detection::cache::JobCache;
    use crate::detection::format::FileFormat;
    use crate::detection::options::ScanOptions;
    use crate::detection::scanner::Scanner;

    /// Copy of the source for scanners that open containers.
    enum Snapshot {
        NotLoaded,
        Loaded(Vec<u8>),
        TooLarge,
    }

    /// Read the start and end windows of an async source.
    pub async fn read_windows_async<S: AsyncRead + AsyncSeek + Unpin + ?Sized>(
        source: &mut S,
        window: usize,
    ) -> Result<(Vec<u8>, Vec<u8>)> {
        let len = source.seek(SeekFrom::End(0)).await?;
        source.seek(SeekFrom::Start(0)).await?;
        let mut start = Vec::with_capacity(window);
        (&mut *source).take(window as u64).read_to_end(&mut start).await?;

        let end = if len > window as u64 {
            source.seek(SeekFrom::End(-(window as i64))).await?;
            let mut end = Vec::with_capacity(window);
            (&mut *source).take(window as u64).read_to_end(&mut end).await?;
            end
        } else {
            start.clone()
        };
        source.seek(SeekFrom::Start(0)).await?;
        Ok((start, end))
    }

    async fn load_snapshot<S: AsyncRead + AsyncSeek + Unpin + ?Sized>(
        source: &mut S,
        limit: u64,
    ) -> Result<Snapshot> {
        let len = source.seek(SeekFrom::End(0)).await?;
        source.seek(SeekFrom::Start(0)).await?;
        if len > limit {
            trace!(len, limit, "Source too large to buffer");
            return Ok(Snapshot::TooLarge);
        }
        let mut data = Vec::with_capacity(len as usize);
        source.read_to_end(&mut data).await?;
        Ok(Snapshot::Loaded(data))
    }

    /// Async counterpart of [`ScanJob::scan`].
    ///
    /// Scanners still run one at a time in registration order. The source
    /// is rewound before each scanner. Scanners that read the source work on
    /// an in-memory copy that is loaded the first time one of them runs;
    /// the others only see the windows. The cache carries over between
    /// scanners exactly as in the blocking scan.
    pub async fn scan_async<S: AsyncRead + AsyncSeek + Unpin + ?Sized>(
        scanners: &[Box<dyn Scanner>],
        start: &[u8],
        end: &[u8],
        source: &mut S,
        options: &ScanOptions,
    ) -> Result<Option<FileFormat>> {
        let mut cache = JobCache::new();
        let mut snapshot = Snapshot::NotLoaded;
        let mut candidates = Candidates::new();

        for scanner in scanners {
            source.seek(SeekFrom::Start(0)).await?;

            if scanner.reads_source() && matches!(snapshot, Snapshot::NotLoaded) {
                snapshot = load_snapshot(source, options.max_snapshot_size).await?;
            }
            let data: &[u8] = match (&snapshot, scanner.reads_source()) {
                (Snapshot::Loaded(data), true) => data,
                (_, true) => continue,
                (_, false) => &[],
            };

            let mut cursor = Cursor::new(data);
            let mut job = ScanJob::with_cache(scanners, start, end, &mut cursor, cache);
            let found = scanner.detect(&mut job)?;
            cache = job.into_cache();

            if let Some(format) = found {
                collect(&mut candidates, scanner.as_ref(), format);
            }
        }

        Ok(resolve(candidates))
    }
}

#[cfg(feature = "async")]
pub use asynchronous::{read_windows_async, scan_async};

//! General purpose archive signatures.

use zerocopy::{LE, U16, U32};
use zerocopy_derive::FromBytes as DeriveFromBytes;

use crate::common::binary::{match_start, read_struct};
use crate::common::error::Result;
use crate::detection::format::{FileFormat, FormatKind};
use crate::detection::job::ScanJob;
use crate::detection::scanner::Scanner;

pub const ZIP: FileFormat = FileFormat::new(
    FormatKind::Zip,
    &["application/zip", "application/x-zip-compressed"],
    &["zip"],
    "ZIP Archive",
);

pub const RAR: FileFormat = FileFormat::new(
    FormatKind::Rar,
    &["application/vnd.rar", "application/x-rar-compressed"],
    &["rar"],
    "RAR Archive",
);

pub const BZIP2: FileFormat = FileFormat::new(
    FormatKind::Bzip2,
    &["application/x-bzip2"],
    &["bz2", "tbz2"],
    "BZip2 Archive",
);

pub const CABINET: FileFormat = FileFormat::new(
    FormatKind::Cabinet,
    &["application/vnd.ms-cab-compressed"],
    &["cab"],
    "Microsoft Cabinet Archive",
);

/// Generic ZIP archive: a local file header and a central directory that opens.
#[cfg(feature = "archive")]
pub struct ZipScanner;

#[cfg(feature = "archive")]
impl Scanner for ZipScanner {
    fn name(&self) -> &'static str {
        "zip"
    }

    fn detect(&self, job: &mut ScanJob<'_>) -> Result<Option<FileFormat>> {
        let entries = crate::detection::scanner::zip_entries(job)?;
        Ok(entries.map(|_| ZIP))
    }

    fn reads_source(&self) -> bool {
        true
    }
}

const RAR_SIGNATURE: &[u8] = b"Rar!\x1A\x07";

pub struct RarScanner;

impl Scanner for RarScanner {
    fn name(&self) -> &'static str {
        "rar"
    }

    fn detect(&self, job: &mut ScanJob<'_>) -> Result<Option<FileFormat>> {
        Ok(job.start_bytes().starts_with(RAR_SIGNATURE).then_some(RAR))
    }
}

/// `BZh` + block size + the block header magic `1AY&SY`.
const BZIP2_SIGNATURE: [Option<u8>; 10] = [
    Some(b'B'),
    Some(b'Z'),
    None,
    None,
    Some(0x31),
    Some(0x41),
    Some(0x59),
    Some(0x26),
    Some(0x53),
    Some(0x59),
];

pub struct Bzip2Scanner;

impl Scanner for Bzip2Scanner {
    fn name(&self) -> &'static str {
        "bzip2"
    }

    fn detect(&self, job: &mut ScanJob<'_>) -> Result<Option<FileFormat>> {
        let start = job.start_bytes();
        if !match_start(start, &BZIP2_SIGNATURE) {
            return Ok(None);
        }
        let (mode, level) = (start[2], start[3]);
        if mode != b'h' && mode != 0 {
            return Ok(None);
        }
        Ok((b'1'..=b'9').contains(&level).then_some(BZIP2))
    }
}

/// `CFHEADER`
#[allow(dead_code)]
#[derive(Debug, DeriveFromBytes)]
#[repr(C)]
struct CabinetHeader {
    signature: [u8; 4],
    reserved1: U32<LE>,
    cabinet_size: U32<LE>,
    reserved2: U32<LE>,
    first_offset: U32<LE>,
    reserved3: U32<LE>,
    version_minor: u8,
    version_major: u8,
    folder_count: U16<LE>,
    file_count: U16<LE>,
    flags: U16<LE>,
    set_id: U16<LE>,
    cabinet_id: U16<LE>,
}

const CABINET_HEADER_SIZE: usize = 36;

/// Cabinet file of format version 1.3.
pub struct CabinetScanner;

impl Scanner for CabinetScanner {
    fn name(&self) -> &'static str {
        "cabinet"
    }

    fn detect(&self, job: &mut ScanJob<'_>) -> Result<Option<FileFormat>> {
        let start = job.start_bytes();
        if start.len() < CABINET_HEADER_SIZE {
            return Ok(None);
        }
        let header: CabinetHeader = read_struct(start, 0)?;
        if &header.signature != b"MSCF" {
            return Ok(None);
        }
        Ok((header.version_major == 1 && header.version_minor == 3).then_some(CABINET))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::scanners::tests::run;

    #[test]
    fn test_rar() {
        assert_eq!(run(&RarScanner, b"Rar!\x1A\x07\x01\x00"), Some(RAR));
        assert_eq!(run(&RarScanner, b"Rar!\x1A"), None);
    }

    #[test]
    fn test_bzip2() {
        let data = b"BZh91AY&SY\x00\x00";
        assert_eq!(run(&Bzip2Scanner, data), Some(BZIP2));
        assert_eq!(run(&Bzip2Scanner, b"BZh01AY&SY"), None);
        assert_eq!(run(&Bzip2Scanner, b"BZx91AY&SY"), None);
        assert_eq!(run(&Bzip2Scanner, b"BZh9"), None);
    }

    fn cabinet(minor: u8, major: u8) -> Vec<u8> {
        let mut data = b"MSCF".to_vec();
        data.resize(24, 0);
        data.push(minor);
        data.push(major);
        data.resize(64, 0);
        data
    }

    #[test]
    fn test_cabinet_version() {
        assert_eq!(run(&CabinetScanner, &cabinet(3, 1)), Some(CABINET));
        assert_eq!(run(&CabinetScanner, &cabinet(2, 1)), None);
        assert_eq!(run(&CabinetScanner, b"MSCF"), None);
    }

    #[cfg(feature = "archive")]
    #[test]
    fn test_zip_requires_readable_archive() {
        use crate::detection::scanners::tests::zip_archive;

        let data = zip_archive(&[("readme.txt", b"hello")]);
        assert_eq!(run(&ZipScanner, &data), Some(ZIP));

        let mut broken = data[..40].to_vec();
        broken.resize(64, 0);
        assert_eq!(run(&ZipScanner, &broken), None);
    }
}

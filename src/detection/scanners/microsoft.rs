//! Microsoft formats recognized from their fixed headers.

use zerocopy::{LE, U16, U32, U64};
use zerocopy_derive::FromBytes as DeriveFromBytes;

use crate::common::binary::read_struct_from;
use crate::common::error::Result;
use crate::detection::format::{FileFormat, FormatKind, PstEncoding};
use crate::detection::job::ScanJob;
use crate::detection::scanner::Scanner;

pub const ACCESS_DATABASE: FileFormat = FileFormat::new(
    FormatKind::AccessDatabase,
    &["application/vnd.ms-access", "application/x-msaccess"],
    &["mdb", "accdb"],
    "Microsoft Access Database",
);

pub const fn outlook_pst(encoding: PstEncoding) -> FileFormat {
    FileFormat::new(
        FormatKind::OutlookPst { encoding },
        &["application/vnd.ms-outlook-pst"],
        &["pst", "ost"],
        "Microsoft Outlook Personal Folders",
    )
}

const JET_SIGNATURE: &[u8; 16] = b"Standard Jet DB\0";
const ACE_SIGNATURE: &[u8; 16] = b"Standard ACE DB\0";

/// Jet (`.mdb`) and ACE (`.accdb`) database files.
pub struct AccessDatabaseScanner;

impl Scanner for AccessDatabaseScanner {
    fn name(&self) -> &'static str {
        "access"
    }

    fn detect(&self, job: &mut ScanJob<'_>) -> Result<Option<FileFormat>> {
        let start = job.start_bytes();
        if start.len() < 20 {
            return Ok(None);
        }
        let signature = &start[4..20];
        Ok((signature == JET_SIGNATURE || signature == ACE_SIGNATURE).then_some(ACCESS_DATABASE))
    }
}

/// PST file header up to the platform bytes.
#[allow(dead_code)]
#[derive(Debug, DeriveFromBytes)]
#[repr(C)]
struct PstHeader {
    magic: U32<LE>,
    crc_partial: U32<LE>,
    magic_client: U16<LE>,
    version: U16<LE>,
    client_version: U16<LE>,
    platform_create: u8,
    platform_access: u8,
    reserved: U64<LE>,
}

const PST_HEADER_SIZE: usize = 24;

/// `!BDN`
const PST_MAGIC: u32 = 0x4E44_4221;
/// `SM`
const PST_MAGIC_CLIENT: u16 = 0x4D53;
const PST_CLIENT_VERSION: u16 = 19;

/// Outlook personal folders file; the format version selects ANSI or Unicode.
pub struct OutlookPstScanner;

impl Scanner for OutlookPstScanner {
    fn name(&self) -> &'static str {
        "pst"
    }

    fn detect(&self, job: &mut ScanJob<'_>) -> Result<Option<FileFormat>> {
        let mut start = job.start_bytes();
        if start.len() <= PST_HEADER_SIZE {
            return Ok(None);
        }
        let header: PstHeader = read_struct_from(&mut start, false)?;
        if header.magic.get() != PST_MAGIC || header.magic_client.get() != PST_MAGIC_CLIENT {
            return Ok(None);
        }
        if header.client_version.get() != PST_CLIENT_VERSION {
            return Ok(None);
        }
        if header.platform_create != 1 && header.platform_access != 1 {
            return Ok(None);
        }

        let encoding = match header.version.get() {
            14 | 15 => PstEncoding::Ansi,
            v if v >= 23 => PstEncoding::Unicode,
            _ => PstEncoding::Unknown,
        };
        Ok(Some(outlook_pst(encoding)))
    }
}

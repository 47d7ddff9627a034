//! Raster image signatures.

use zerocopy::{LE, U16, U32};
use zerocopy_derive::FromBytes as DeriveFromBytes;

use crate::common::binary::{Endian, match_start, read_struct, read_u32};
use crate::common::error::Result;
use crate::detection::format::{FileFormat, FormatKind};
use crate::detection::job::ScanJob;
use crate::detection::scanner::Scanner;

pub const BMP: FileFormat = FileFormat::new(FormatKind::Bmp, &["image/bmp"], &["bmp", "dib"], "Bitmap Image");

pub const GIF: FileFormat = FileFormat::new(FormatKind::Gif, &["image/gif"], &["gif"], "GIF Image");

pub const PNG: FileFormat = FileFormat::new(FormatKind::Png, &["image/png"], &["png"], "PNG Image");

pub const TIFF: FileFormat = FileFormat::new(FormatKind::Tiff, &["image/tiff"], &["tif", "tiff"], "TIFF Image");

pub const fn jpeg(exif: bool) -> FileFormat {
    FileFormat::new(
        FormatKind::Jpeg { exif },
        &["image/jpeg"],
        &["jpg", "jpeg", "jpe", "jfif"],
        "JPEG Image",
    )
}

/// `BITMAPFILEHEADER`
#[allow(dead_code)]
#[derive(Debug, DeriveFromBytes)]
#[repr(C)]
struct BitmapFileHeader {
    signature: [u8; 2],
    size: U32<LE>,
    reserved1: U16<LE>,
    reserved2: U16<LE>,
    bitmap_offset: U32<LE>,
}

const BITMAP_FILE_HEADER_SIZE: usize = 14;
const BITMAP_INFO_HEADER_SIZE: u32 = 40;

/// Windows bitmap with a `BITMAPINFOHEADER`.
pub struct BmpScanner;

impl Scanner for BmpScanner {
    fn name(&self) -> &'static str {
        "bmp"
    }

    fn detect(&self, job: &mut ScanJob<'_>) -> Result<Option<FileFormat>> {
        let start = job.start_bytes();
        if start.len() <= BITMAP_FILE_HEADER_SIZE + BITMAP_INFO_HEADER_SIZE as usize {
            return Ok(None);
        }
        let header: BitmapFileHeader = read_struct(start, 0)?;
        if &header.signature != b"BM" {
            return Ok(None);
        }
        let info_size = read_u32(start, BITMAP_FILE_HEADER_SIZE, Endian::Little)?;
        Ok((info_size == BITMAP_INFO_HEADER_SIZE).then_some(BMP))
    }
}

/// Logical screen descriptor follows the 6-byte signature.
const GIF_HEADER_SIZE: usize = 13;

pub struct GifScanner;

impl Scanner for GifScanner {
    fn name(&self) -> &'static str {
        "gif"
    }

    fn detect(&self, job: &mut ScanJob<'_>) -> Result<Option<FileFormat>> {
        let start = job.start_bytes();
        if start.len() <= GIF_HEADER_SIZE {
            return Ok(None);
        }
        Ok((start.starts_with(b"GIF87a") || start.starts_with(b"GIF89a")).then_some(GIF))
    }
}

/// SOI, APPn marker and the JFIF header body.
const JFIF_HEADER_SIZE: usize = 20;

const APP0: [u8; 2] = [0xFF, 0xE0];
const APP1: [u8; 2] = [0xFF, 0xE1];

/// JPEG starting with a JFIF (`APP0`) or EXIF (`APP1`) segment.
pub struct JpegScanner;

impl Scanner for JpegScanner {
    fn name(&self) -> &'static str {
        "jpeg"
    }

    fn detect(&self, job: &mut ScanJob<'_>) -> Result<Option<FileFormat>> {
        let start = job.start_bytes();
        if start.len() <= JFIF_HEADER_SIZE || !start.starts_with(&[0xFF, 0xD8]) {
            return Ok(None);
        }
        let app = &start[2..4];
        if app == APP0 {
            Ok(Some(jpeg(false)))
        } else if app == APP1 {
            Ok(Some(jpeg(true)))
        } else {
            Ok(None)
        }
    }
}

const PNG_SIGNATURE: [Option<u8>; 8] = [
    Some(0x89),
    Some(b'P'),
    Some(b'N'),
    Some(b'G'),
    Some(0x0D),
    Some(0x0A),
    Some(0x1A),
    Some(0x0A),
];

/// Length and type of a PNG chunk.
const CHUNK_HEADER_SIZE: usize = 8;
const IHDR_SIZE: usize = 13;

/// PNG with an `IHDR` first chunk and an `IEND` trailer.
pub struct PngScanner;

impl Scanner for PngScanner {
    fn name(&self) -> &'static str {
        "png"
    }

    fn detect(&self, job: &mut ScanJob<'_>) -> Result<Option<FileFormat>> {
        let start = job.start_bytes();
        if start.len() < PNG_SIGNATURE.len() + CHUNK_HEADER_SIZE + IHDR_SIZE || !match_start(start, &PNG_SIGNATURE) {
            return Ok(None);
        }
        if &start[12..16] != b"IHDR" {
            return Ok(None);
        }

        // Trailer chunk: zero length, type, CRC
        let end = job.end_bytes();
        if end.len() < 12 {
            return Ok(None);
        }
        let trailer = &end[end.len() - 12..];
        Ok((&trailer[4..8] == b"IEND").then_some(PNG))
    }
}

/// Little-endian (`II*\0`) or big-endian (`MM\0*`) TIFF.
pub struct TiffScanner;

impl Scanner for TiffScanner {
    fn name(&self) -> &'static str {
        "tiff"
    }

    fn detect(&self, job: &mut ScanJob<'_>) -> Result<Option<FileFormat>> {
        let start = job.start_bytes();
        if start.len() <= 4 {
            return Ok(None);
        }
        Ok((start.starts_with(b"II*\0") || start.starts_with(b"MM\0*")).then_some(TIFF))
    }
}

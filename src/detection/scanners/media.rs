//! Audio and video containers.
//!
//! RIFF, ISO base media and EBML files are recognized in two steps: the
//! shared container precondition, then a refinement on the form type, the
//! major brand or the doctype.

use zerocopy::{LE, U32};
use zerocopy_derive::FromBytes as DeriveFromBytes;

use crate::common::binary::{match_at, match_start, read_struct};
use crate::common::error::Result;
use crate::detection::cache::keys;
use crate::detection::format::{FileFormat, FormatKind};
use crate::detection::job::ScanJob;
use crate::detection::scanner::{Scanner, contains, is_base_media, is_ebml, is_riff};

/// Priority of a container refined by form type, brand or doctype.
const REFINED: i32 = 10;
/// Priority of a refinement that overlaps another refinement.
const SPECIALIZED: i32 = 20;

/// Leaf media formats without a shared container need a full window.
const MIN_MEDIA_WINDOW: usize = 1024;

pub const AVI: FileFormat = FileFormat::new(
    FormatKind::Avi,
    &["video/x-msvideo", "video/avi"],
    &["avi"],
    "Audio Video Interleave",
)
.with_priority(REFINED);

pub const WAVE: FileFormat = FileFormat::new(
    FormatKind::Wave,
    &["audio/wav", "audio/x-wav"],
    &["wav"],
    "Waveform Audio",
)
.with_priority(REFINED);

pub const BASE_MEDIA: FileFormat = FileFormat::new(
    FormatKind::BaseMedia,
    &["application/mp4"],
    &["mp4"],
    "ISO Base Media File",
);

pub const MP4: FileFormat = FileFormat::new(
    FormatKind::Mp4,
    &["video/mp4"],
    &["mp4", "m4v"],
    "MPEG-4 Video",
)
.with_priority(REFINED);

pub const M4A: FileFormat = FileFormat::new(
    FormatKind::M4a,
    &["audio/mp4", "audio/x-m4a"],
    &["m4a", "m4b", "m4p"],
    "MPEG-4 Audio",
)
.with_priority(SPECIALIZED);

pub const THREE_GPP: FileFormat = FileFormat::new(
    FormatKind::ThreeGpp,
    &["video/3gpp", "audio/3gpp"],
    &["3gp"],
    "3GPP Multimedia",
)
.with_priority(SPECIALIZED);

pub const THREE_GPP2: FileFormat = FileFormat::new(
    FormatKind::ThreeGpp2,
    &["video/3gpp2", "audio/3gpp2"],
    &["3g2"],
    "3GPP2 Multimedia",
)
.with_priority(SPECIALIZED);

pub const FLASH_VIDEO: FileFormat = FileFormat::new(
    FormatKind::FlashVideo,
    &["video/x-flv"],
    &["flv"],
    "Flash Video",
);

pub const ASF: FileFormat = FileFormat::new(
    FormatKind::Asf,
    &["video/x-ms-asf", "application/vnd.ms-asf"],
    &["asf", "wmv", "wma"],
    "Advanced Systems Format",
);

pub const AIFF: FileFormat = FileFormat::new(
    FormatKind::Aiff,
    &["audio/aiff", "audio/x-aiff"],
    &["aif", "aiff"],
    "Audio Interchange File Format",
);

pub const REAL_MEDIA: FileFormat = FileFormat::new(
    FormatKind::RealMedia,
    &["application/vnd.rn-realmedia", "audio/x-pn-realaudio"],
    &["rm", "ra", "rmvb"],
    "RealMedia",
);

pub const MATROSKA: FileFormat = FileFormat::new(
    FormatKind::Matroska,
    &["video/x-matroska", "audio/x-matroska"],
    &["mkv", "mka", "mks"],
    "Matroska Media",
)
.with_priority(REFINED);

pub const WEBM: FileFormat = FileFormat::new(FormatKind::WebM, &["video/webm", "audio/webm"], &["webm"], "WebM Media")
    .with_priority(SPECIALIZED);

/// RIFF chunk header with the form type.
#[allow(dead_code)]
#[derive(Debug, DeriveFromBytes)]
#[repr(C)]
struct RiffHeader {
    magic: U32<LE>,
    size: U32<LE>,
    form: U32<LE>,
}

/// `AVI `
const FORM_AVI: u32 = 0x2049_5641;
/// `WAVE`
const FORM_WAVE: u32 = 0x4556_4157;

/// RIFF file with a known form type.
pub struct RiffScanner {
    name: &'static str,
    form: u32,
    format: FileFormat,
}

impl RiffScanner {
    pub const AVI: Self = RiffScanner {
        name: "avi",
        form: FORM_AVI,
        format: AVI,
    };
    pub const WAVE: Self = RiffScanner {
        name: "wave",
        form: FORM_WAVE,
        format: WAVE,
    };
}

impl Scanner for RiffScanner {
    fn name(&self) -> &'static str {
        self.name
    }

    fn detect(&self, job: &mut ScanJob<'_>) -> Result<Option<FileFormat>> {
        if !is_riff(job) {
            return Ok(None);
        }
        let header: RiffHeader = read_struct(job.start_bytes(), 0)?;
        Ok((header.form.get() == self.form).then(|| self.format.clone()))
    }
}

/// Major brand of the `ftyp` box, with `None` for a padding wildcard.
type Brand = [Option<u8>; 4];

const fn brand(code: &[u8; 4]) -> Brand {
    [Some(code[0]), Some(code[1]), Some(code[2]), Some(code[3])]
}

/// Three-letter brand followed by any byte.
const fn brand3(code: &[u8; 3]) -> Brand {
    [Some(code[0]), Some(code[1]), Some(code[2]), None]
}

const MAJOR_BRAND_OFFSET: usize = 8;

fn has_brand(job: &ScanJob<'_>, brands: &[Brand]) -> bool {
    brands.iter().any(|b| match_at(job.start_bytes(), MAJOR_BRAND_OFFSET, b))
}

const MP4_BRANDS: [Brand; 8] = [
    brand(b"isom"),
    brand(b"iso2"),
    brand(b"mp41"),
    brand(b"mp42"),
    brand(b"avc1"),
    brand(b"dash"),
    brand(b"mmp4"),
    brand(b"M4V "),
];

const M4A_BRANDS: [Brand; 3] = [brand3(b"M4A"), brand3(b"M4B"), brand3(b"M4P")];

const THREE_GPP_BRANDS: [Brand; 15] = [
    brand(b"3ge6"),
    brand(b"3ge7"),
    brand(b"3gg6"),
    brand(b"3gp1"),
    brand(b"3gp2"),
    brand(b"3gp3"),
    brand(b"3gp4"),
    brand(b"3gp5"),
    brand(b"3gp6"),
    brand(b"3gp7"),
    brand(b"3gr6"),
    brand(b"3gr7"),
    brand(b"3gs6"),
    brand(b"3gs7"),
    brand(b"kddi"),
];

const THREE_GPP2_BRANDS: [Brand; 1] = [brand(b"3g2a")];

/// Any file opening with an `ftyp` box.
pub struct BaseMediaScanner;

impl Scanner for BaseMediaScanner {
    fn name(&self) -> &'static str {
        "base-media"
    }

    fn detect(&self, job: &mut ScanJob<'_>) -> Result<Option<FileFormat>> {
        Ok(is_base_media(job).then_some(BASE_MEDIA))
    }
}

/// Base media file with a general MPEG-4 major brand.
pub struct Mp4Scanner;

impl Scanner for Mp4Scanner {
    fn name(&self) -> &'static str {
        "mp4"
    }

    fn detect(&self, job: &mut ScanJob<'_>) -> Result<Option<FileFormat>> {
        Ok((is_base_media(job) && has_brand(job, &MP4_BRANDS)).then_some(MP4))
    }
}

/// Audio-only MPEG-4, including audio books and protected audio.
pub struct M4aScanner;

impl Scanner for M4aScanner {
    fn name(&self) -> &'static str {
        "m4a"
    }

    fn detect(&self, job: &mut ScanJob<'_>) -> Result<Option<FileFormat>> {
        Ok((is_base_media(job) && has_brand(job, &M4A_BRANDS)).then_some(M4A))
    }
}

/// 3GPP and 3GPP2 mobile multimedia.
pub struct ThreeGppScanner;

impl Scanner for ThreeGppScanner {
    fn name(&self) -> &'static str {
        "3gpp"
    }

    fn detect(&self, job: &mut ScanJob<'_>) -> Result<Option<FileFormat>> {
        if !is_base_media(job) {
            return Ok(None);
        }
        if has_brand(job, &THREE_GPP_BRANDS) {
            return Ok(Some(THREE_GPP));
        }
        Ok(has_brand(job, &THREE_GPP2_BRANDS).then_some(THREE_GPP2))
    }
}

const FLV_SIGNATURE: [Option<u8>; 4] = [Some(b'F'), Some(b'L'), Some(b'V'), Some(0x01)];

/// Flash video, version 1, carrying audio, video or both.
pub struct FlashVideoScanner;

impl Scanner for FlashVideoScanner {
    fn name(&self) -> &'static str {
        "flv"
    }

    fn detect(&self, job: &mut ScanJob<'_>) -> Result<Option<FileFormat>> {
        let start = job.start_bytes();
        if start.len() < 5 || !match_start(start, &FLV_SIGNATURE) {
            return Ok(None);
        }
        // TypeFlags: 0x04 audio, 0x01 video
        Ok(matches!(start[4], 0x01 | 0x04 | 0x05).then_some(FLASH_VIDEO))
    }
}

/// ASF header object GUID `75B22630-668E-11CF-A6D9-00AA0062CE6C`.
const ASF_HEADER_GUID: [u8; 16] = [
    0x30, 0x26, 0xB2, 0x75, 0x8E, 0x66, 0xCF, 0x11, 0xA6, 0xD9, 0x00, 0xAA, 0x00, 0x62, 0xCE, 0x6C,
];

pub struct AsfScanner;

impl Scanner for AsfScanner {
    fn name(&self) -> &'static str {
        "asf"
    }

    fn detect(&self, job: &mut ScanJob<'_>) -> Result<Option<FileFormat>> {
        let start = job.start_bytes();
        Ok((start.len() >= MIN_MEDIA_WINDOW && start.starts_with(&ASF_HEADER_GUID)).then_some(ASF))
    }
}

/// `FORM` + size + `AIFFCOMM`
const AIFF_SIGNATURE: [Option<u8>; 16] = [
    Some(b'F'),
    Some(b'O'),
    Some(b'R'),
    Some(b'M'),
    None,
    None,
    None,
    None,
    Some(b'A'),
    Some(b'I'),
    Some(b'F'),
    Some(b'F'),
    Some(b'C'),
    Some(b'O'),
    Some(b'M'),
    Some(b'M'),
];

/// AIFF with the common chunk first.
pub struct AiffScanner;

impl Scanner for AiffScanner {
    fn name(&self) -> &'static str {
        "aiff"
    }

    fn detect(&self, job: &mut ScanJob<'_>) -> Result<Option<FileFormat>> {
        let start = job.start_bytes();
        Ok((start.len() >= MIN_MEDIA_WINDOW && match_start(start, &AIFF_SIGNATURE)).then_some(AIFF))
    }
}

/// `.RMF` file header chunk of 18 bytes.
const REAL_MEDIA_SIGNATURE: &[u8] = b".RMF\x00\x00\x00\x12";

pub struct RealMediaScanner;

impl Scanner for RealMediaScanner {
    fn name(&self) -> &'static str {
        "realmedia"
    }

    fn detect(&self, job: &mut ScanJob<'_>) -> Result<Option<FileFormat>> {
        let start = job.start_bytes();
        Ok((start.len() >= MIN_MEDIA_WINDOW && start.starts_with(REAL_MEDIA_SIGNATURE)).then_some(REAL_MEDIA))
    }
}

/// EBML file naming the `matroska` doctype.
pub struct MatroskaScanner;

impl Scanner for MatroskaScanner {
    fn name(&self) -> &'static str {
        "matroska"
    }

    fn detect(&self, job: &mut ScanJob<'_>) -> Result<Option<FileFormat>> {
        if !is_ebml(job) {
            return Ok(None);
        }
        let matroska = job.memoize(keys::IS_MATROSKA, |job| contains(job.start_bytes(), b"matroska"));
        Ok(matroska.then_some(MATROSKA))
    }
}

/// EBML file naming the `webm` doctype.
pub struct WebMScanner;

impl Scanner for WebMScanner {
    fn name(&self) -> &'static str {
        "webm"
    }

    fn detect(&self, job: &mut ScanJob<'_>) -> Result<Option<FileFormat>> {
        if !is_ebml(job) {
            return Ok(None);
        }
        Ok(contains(job.start_bytes(), b"webm").then_some(WEBM))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::scanners::tests::run;

    fn riff(form: &[u8; 4]) -> Vec<u8> {
        let mut data = b"RIFF".to_vec();
        data.extend_from_slice(&1000u32.to_le_bytes());
        data.extend_from_slice(form);
        data.resize(64, 0);
        data
    }

    #[test]
    fn test_riff_forms() {
        assert_eq!(run(&RiffScanner::AVI, &riff(b"AVI ")), Some(AVI));
        assert_eq!(run(&RiffScanner::WAVE, &riff(b"AVI ")), None);
        assert_eq!(run(&RiffScanner::WAVE, &riff(b"WAVE")), Some(WAVE));
        assert_eq!(run(&RiffScanner::WAVE, &riff(b"WAVE")[..12]), None);
    }

    fn ftyp(brand: &[u8; 4]) -> Vec<u8> {
        let mut data = vec![0, 0, 0, 0x20];
        data.extend_from_slice(b"ftyp");
        data.extend_from_slice(brand);
        data.resize(64, 0);
        data
    }

    #[test]
    fn test_base_media_brands() {
        assert_eq!(run(&BaseMediaScanner, &ftyp(b"qt  ")), Some(BASE_MEDIA));
        assert_eq!(run(&Mp4Scanner, &ftyp(b"isom")), Some(MP4));
        assert_eq!(run(&Mp4Scanner, &ftyp(b"qt  ")), None);
        assert_eq!(run(&M4aScanner, &ftyp(b"M4A ")), Some(M4A));
        assert_eq!(run(&M4aScanner, &ftyp(b"M4Bx")), Some(M4A));
        assert_eq!(run(&M4aScanner, &ftyp(b"mp42")), None);
        assert_eq!(run(&ThreeGppScanner, &ftyp(b"3gp4")), Some(THREE_GPP));
        assert_eq!(run(&ThreeGppScanner, &ftyp(b"3g2a")), Some(THREE_GPP2));
        assert_eq!(run(&ThreeGppScanner, &ftyp(b"3gp9")), None);
    }

    #[test]
    fn test_brand_without_ftyp() {
        let mut data = ftyp(b"isom");
        data[4..8].copy_from_slice(b"moov");
        assert_eq!(run(&BaseMediaScanner, &data), None);
        assert_eq!(run(&Mp4Scanner, &data), None);
    }

    #[test]
    fn test_flash_video_flags() {
        assert_eq!(run(&FlashVideoScanner, b"FLV\x01\x05\x00\x00\x00\x09"), Some(FLASH_VIDEO));
        assert_eq!(run(&FlashVideoScanner, b"FLV\x01\x04"), Some(FLASH_VIDEO));
        assert_eq!(run(&FlashVideoScanner, b"FLV\x01\x02\x00\x00\x00\x09"), None);
        assert_eq!(run(&FlashVideoScanner, b"FLV\x02\x05\x00\x00\x00\x09"), None);
        assert_eq!(run(&FlashVideoScanner, b"FLV\x01"), None);
    }

    #[test]
    fn test_window_sized_signatures() {
        let mut asf = ASF_HEADER_GUID.to_vec();
        asf.resize(1024, 0);
        assert_eq!(run(&AsfScanner, &asf), Some(ASF));
        assert_eq!(run(&AsfScanner, &asf[..512]), None);

        let mut aiff = b"FORM\0\0\x10\0AIFFCOMM".to_vec();
        aiff.resize(1024, 0);
        assert_eq!(run(&AiffScanner, &aiff), Some(AIFF));
        aiff[8..12].copy_from_slice(b"AIFC");
        assert_eq!(run(&AiffScanner, &aiff), None);

        let mut rm = REAL_MEDIA_SIGNATURE.to_vec();
        rm.resize(2048, 0);
        assert_eq!(run(&RealMediaScanner, &rm), Some(REAL_MEDIA));
        assert_eq!(run(&RealMediaScanner, &rm[..100]), None);
    }

    fn ebml(doctype: &[u8]) -> Vec<u8> {
        let mut data = vec![0x1A, 0x45, 0xDF, 0xA3, 0x9F, 0x42, 0x86, 0x81, 0x01, 0x42, 0x82, 0x88];
        data.extend_from_slice(doctype);
        data.resize(128, 0);
        data
    }

    #[test]
    fn test_ebml_doctypes() {
        assert_eq!(run(&MatroskaScanner, &ebml(b"matroska")), Some(MATROSKA));
        assert_eq!(run(&WebMScanner, &ebml(b"matroska")), None);
        assert_eq!(run(&WebMScanner, &ebml(b"webm")), Some(WEBM));
        assert_eq!(run(&MatroskaScanner, &ebml(b"webm")), None);

        let mut not_ebml = ebml(b"matroska");
        not_ebml[0] = 0;
        assert_eq!(run(&MatroskaScanner, &not_ebml), None);
    }
}

//! Document and animation formats with no container family.

use crate::common::binary::match_at;
use crate::common::error::Result;
use crate::detection::format::{FileFormat, FormatKind, SwfCompression};
use crate::detection::job::ScanJob;
use crate::detection::scanner::Scanner;

pub const PDF: FileFormat = FileFormat::new(
    FormatKind::Pdf,
    &["application/pdf"],
    &["pdf"],
    "Portable Document Format",
);

pub const fn swf(compression: SwfCompression) -> FileFormat {
    FileFormat::new(
        FormatKind::Swf { compression },
        &["application/x-shockwave-flash", "application/vnd.adobe.flash.movie"],
        &["swf"],
        "Shockwave Flash",
    )
}

/// Mobipocket e-books rank above PalmDB lookalikes.
pub const MOBI: FileFormat = FileFormat::new(
    FormatKind::Mobi,
    &["application/x-mobipocket-ebook"],
    &["mobi"],
    "Amazon/MobiPocket eBook",
)
.with_priority(10);

const PDF_HEADER: &[u8] = b"%PDF-";
const PDF_TRAILER: &[u8] = b"%EOF";
const MIN_PDF_WINDOW: usize = 20;

/// PDF with its header at the start and the end-of-file marker at the end.
///
/// Line terminators and padding whitespace after `%EOF` are ignored.
pub struct PdfScanner;

impl Scanner for PdfScanner {
    fn name(&self) -> &'static str {
        "pdf"
    }

    fn detect(&self, job: &mut ScanJob<'_>) -> Result<Option<FileFormat>> {
        let start = job.start_bytes();
        if start.len() < MIN_PDF_WINDOW || !start.starts_with(PDF_HEADER) {
            return Ok(None);
        }
        let end = job.end_bytes().trim_ascii_end();
        Ok(end.ends_with(PDF_TRAILER).then_some(PDF))
    }
}

const MIN_SWF_WINDOW: usize = 1024;

pub struct SwfScanner;

impl Scanner for SwfScanner {
    fn name(&self) -> &'static str {
        "swf"
    }

    fn detect(&self, job: &mut ScanJob<'_>) -> Result<Option<FileFormat>> {
        let start = job.start_bytes();
        if start.len() < MIN_SWF_WINDOW {
            return Ok(None);
        }
        let compression = match &start[..3] {
            b"FWS" => SwfCompression::None,
            b"CWS" => SwfCompression::Zlib,
            b"ZWS" => SwfCompression::Lzma,
            _ => return Ok(None),
        };
        Ok(Some(swf(compression)))
    }
}

/// Database type and creator of a PalmDB header, 60 bytes in.
const PALMDB_TYPE_OFFSET: usize = 60;
const MOBI_TYPE_CREATOR: [Option<u8>; 8] =
    [Some(b'B'), Some(b'O'), Some(b'O'), Some(b'K'), Some(b'M'), Some(b'O'), Some(b'B'), Some(b'I')];
/// Fixed PalmDB header size, up to the record count
const PALMDB_HEADER_SIZE: usize = 78;

/// Mobipocket e-book stored as a PalmDB `BOOKMOBI` database.
pub struct MobiScanner;

impl Scanner for MobiScanner {
    fn name(&self) -> &'static str {
        "mobi"
    }

    fn detect(&self, job: &mut ScanJob<'_>) -> Result<Option<FileFormat>> {
        let start = job.start_bytes();
        if start.len() < PALMDB_HEADER_SIZE {
            return Ok(None);
        }
        Ok(match_at(start, PALMDB_TYPE_OFFSET, &MOBI_TYPE_CREATOR).then_some(MOBI))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::scanners::tests::run;

    fn pdf(trailer: &[u8]) -> Vec<u8> {
        let mut data = b"%PDF-1.7\n%\xE2\xE3\xCF\xD3\n1 0 obj\n<< >>\nendobj\n".to_vec();
        data.extend_from_slice(b"trailer\n<< /Root 1 0 R >>\nstartxref\n9\n");
        data.extend_from_slice(trailer);
        data
    }

    #[test]
    fn test_pdf_trailer() {
        assert_eq!(run(&PdfScanner, &pdf(b"%%EOF")), Some(PDF));
        assert_eq!(run(&PdfScanner, &pdf(b"%%EOF\n")), Some(PDF));
        assert_eq!(run(&PdfScanner, &pdf(b"%%EOF\r\n")), Some(PDF));
        assert_eq!(run(&PdfScanner, &pdf(b"")), None);
    }

    #[test]
    fn test_pdf_trailer_in_separate_window() {
        let mut data = pdf(b"");
        data.resize(10_000, b' ');
        data.extend_from_slice(b"\n%%EOF\n");
        assert_eq!(run(&PdfScanner, &data), Some(PDF));
    }

    #[test]
    fn test_pdf_header_required() {
        assert_eq!(run(&PdfScanner, b"%PDF-1.4\n%%EOF"), None);
        let mut data = pdf(b"%%EOF");
        data[1] = b'X';
        assert_eq!(run(&PdfScanner, &data), None);
    }

    #[test]
    fn test_swf_compression() {
        let kind = |signature: &[u8]| {
            let mut data = signature.to_vec();
            data.resize(1024, 0);
            run(&SwfScanner, &data).map(|f| f.kind())
        };
        assert_eq!(kind(b"FWS\x0A"), Some(FormatKind::Swf { compression: SwfCompression::None }));
        assert_eq!(kind(b"CWS\x0A"), Some(FormatKind::Swf { compression: SwfCompression::Zlib }));
        assert_eq!(kind(b"ZWS\x0D"), Some(FormatKind::Swf { compression: SwfCompression::Lzma }));
        assert_eq!(kind(b"XWS\x0A"), None);
        assert_eq!(run(&SwfScanner, b"FWS\x0A"), None);
    }

    fn palm_database(type_creator: &[u8]) -> Vec<u8> {
        let mut data = b"The_Adventures_of_Sherlock_Holm".to_vec();
        data.resize(PALMDB_TYPE_OFFSET, 0);
        data.extend_from_slice(type_creator);
        data.resize(PALMDB_HEADER_SIZE + 8, 0);
        data
    }

    #[test]
    fn test_mobi() {
        let found = run(&MobiScanner, &palm_database(b"BOOKMOBI")).unwrap();
        assert_eq!(found.kind(), FormatKind::Mobi);
        assert_eq!(found.priority(), 10);
        assert_eq!(found.content_type(), Some("application/x-mobipocket-ebook"));
        assert_eq!(found.extension(), Some("mobi"));
    }

    #[test]
    fn test_other_palm_databases() {
        assert_eq!(run(&MobiScanner, &palm_database(b"TEXtREAd")), None);
        assert_eq!(run(&MobiScanner, &palm_database(b"BOOKmobi")), None);
        // Header cut short right after the type and creator
        assert_eq!(run(&MobiScanner, &palm_database(b"BOOKMOBI")[..70]), None);
    }
}

//! Unified Office Format documents.
//!
//! A UOF file is one XML document. Its root `uof:UOF` element carries the
//! document class in a `uof:mimetype` attribute, so only the root start tag
//! is parsed.

use std::io::{Seek, SeekFrom};

use phf::phf_map;
use quick_xml::Reader;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesStart, Event};
use tracing::trace;

use crate::common::binary::read_bytes_from;
use crate::common::error::Result;
use crate::detection::format::{FileFormat, FormatKind, UofClass};
use crate::detection::job::ScanJob;
use crate::detection::scanner::Scanner;

/// Bytes read from the source while looking for the root element
const MAX_PROLOG_SIZE: usize = 64 * 1024;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

pub const fn unified_office(class: UofClass) -> FileFormat {
    let (content_type, extension, description): (&'static [&'static str], &'static [&'static str], &'static str) =
        match class {
            UofClass::Text => (&["application/vnd.uof.text"], &["uot", "uof"], "UOF Text Document"),
            UofClass::Spreadsheet => (&["application/vnd.uof.spreadsheet"], &["uos", "uof"], "UOF Spreadsheet"),
            UofClass::Presentation => (&["application/vnd.uof.presentation"], &["uop", "uof"], "UOF Presentation"),
        };
    FileFormat::new(FormatKind::UnifiedOffice { class }, content_type, extension, description)
}

/// `uof:mimetype` attribute value to document class.
static UOF_MIME_TYPES: phf::Map<&'static str, UofClass> = phf_map! {
    "vnd.uof.text" => UofClass::Text,
    "vnd.uof.spreadsheet" => UofClass::Spreadsheet,
    "vnd.uof.presentation" => UofClass::Presentation,
};

/// Split a qualified name at its first colon.
fn split_qname(name: &[u8]) -> (Option<&[u8]>, &[u8]) {
    match memchr::memchr(b':', name) {
        Some(i) => (Some(&name[..i]), &name[i + 1..]),
        None => (None, name),
    }
}

/// Namespace bound to `prefix` (or the default namespace) on the element.
fn declared_namespace<'a>(attributes: &'a [Attribute<'a>], prefix: Option<&[u8]>) -> Option<&'a [u8]> {
    attributes.iter().find_map(|a| {
        let declares = match split_qname(a.key.as_ref()) {
            (Some(b"xmlns"), name) => Some(name),
            (None, b"xmlns") => None,
            _ => return None,
        };
        (declares == prefix).then_some(a.value.as_ref())
    })
}

/// Value of the `mimetype` attribute in the UOF namespace, if `root` is a
/// `UOF` element in that same namespace.
fn uof_mimetype(root: &BytesStart<'_>) -> Option<String> {
    let attributes: Vec<Attribute<'_>> = root.attributes().flatten().collect();
    let name = root.name();
    let (prefix, local) = split_qname(name.as_ref());
    if local != b"UOF" {
        return None;
    }

    let uof = declared_namespace(&attributes, Some(b"uof".as_slice()))?;
    if declared_namespace(&attributes, prefix)? != uof {
        return None;
    }

    // Unprefixed attributes belong to no namespace
    attributes.iter().find_map(|a| {
        let (prefix, local) = split_qname(a.key.as_ref());
        let prefix = prefix.filter(|p| *p != b"xmlns")?;
        (local == b"mimetype" && declared_namespace(&attributes, Some(prefix)) == Some(uof))
            .then(|| String::from_utf8_lossy(&a.value).into_owned())
    })
}

/// Parse up to the first element and return its UOF mimetype.
fn root_mimetype(xml: &[u8]) -> Option<String> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => return uof_mimetype(e),
            Ok(Event::Eof) => return None,
            Err(e) => {
                trace!(error = %e, "Prolog is not well-formed XML");
                return None;
            },
            Ok(_) => {},
        }
        buf.clear();
    }
}

/// UOF text, spreadsheet or presentation.
pub struct UnifiedOfficeScanner;

impl Scanner for UnifiedOfficeScanner {
    fn name(&self) -> &'static str {
        "uof"
    }

    fn detect(&self, job: &mut ScanJob<'_>) -> Result<Option<FileFormat>> {
        let start = job.start_bytes();
        let start = start.strip_prefix(UTF8_BOM).unwrap_or(start).trim_ascii_start();
        if !start.starts_with(b"<") {
            return Ok(None);
        }

        let source = job.source();
        source.seek(SeekFrom::Start(0))?;
        let prolog = read_bytes_from(source, MAX_PROLOG_SIZE)?;
        let xml = prolog.strip_prefix(UTF8_BOM).unwrap_or(&prolog);
        let Some(mimetype) = root_mimetype(xml) else {
            return Ok(None);
        };
        Ok(UOF_MIME_TYPES.get(mimetype.trim()).map(|class| unified_office(*class)))
    }

    fn reads_source(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::scanners::tests::run;

    const UOF_NS: &str = "http://schemas.uof.org/cn/2003/uof";

    fn document(root: &str) -> Vec<u8> {
        let prolog = r#"<?xml version="1.0" encoding="UTF-8"?><!-- generated -->"#;
        format!("{prolog}{root}<uof:metadata/></uof:UOF>").into_bytes()
    }

    #[test]
    fn test_document_classes() {
        for (mimetype, class, extension) in [
            ("vnd.uof.text", UofClass::Text, "uot"),
            ("vnd.uof.spreadsheet", UofClass::Spreadsheet, "uos"),
            ("vnd.uof.presentation", UofClass::Presentation, "uop"),
        ] {
            let root = format!(r#"<uof:UOF xmlns:uof="{UOF_NS}" uof:language="cn" uof:mimetype="{mimetype}">"#);
            let data = document(&root);
            let found = run(&UnifiedOfficeScanner, &data).unwrap();
            assert_eq!(found.kind(), FormatKind::UnifiedOffice { class });
            assert_eq!(found.extension(), Some(extension));
        }
    }

    #[test]
    fn test_prefix_bound_to_same_namespace() {
        let default = format!(
            r#"<?xml version="1.0"?><UOF xmlns="{UOF_NS}" xmlns:uof="{UOF_NS}" uof:mimetype="vnd.uof.text"></UOF>"#
        );
        let found = run(&UnifiedOfficeScanner, default.as_bytes()).unwrap();
        assert_eq!(found.kind(), FormatKind::UnifiedOffice { class: UofClass::Text });

        let other = document(&format!(
            r#"<uof:UOF xmlns:uof="{UOF_NS}" xmlns:u2="{UOF_NS}" u2:mimetype="vnd.uof.spreadsheet">"#
        ));
        let found = run(&UnifiedOfficeScanner, &other).unwrap();
        assert_eq!(found.kind(), FormatKind::UnifiedOffice { class: UofClass::Spreadsheet });
    }

    #[test]
    fn test_rejects_lookalikes() {
        // Attribute without a namespace
        let unprefixed = document(&format!(r#"<uof:UOF xmlns:uof="{UOF_NS}" mimetype="vnd.uof.text">"#));
        assert_eq!(run(&UnifiedOfficeScanner, &unprefixed), None);

        // Root in a different namespace than the uof prefix
        let foreign = format!(r#"<UOF xmlns="urn:other" xmlns:uof="{UOF_NS}" uof:mimetype="vnd.uof.text"/>"#);
        assert_eq!(run(&UnifiedOfficeScanner, foreign.as_bytes()), None);

        let unknown = document(&format!(r#"<uof:UOF xmlns:uof="{UOF_NS}" uof:mimetype="vnd.uof.drawing">"#));
        assert_eq!(run(&UnifiedOfficeScanner, &unknown), None);

        let other_root = br#"<?xml version="1.0"?><office:document xmlns:office="urn:oasis"/>"#;
        assert_eq!(run(&UnifiedOfficeScanner, other_root), None);
        assert_eq!(run(&UnifiedOfficeScanner, b"<<<not xml"), None);
        assert_eq!(run(&UnifiedOfficeScanner, b"%PDF-1.7"), None);
    }

    #[test]
    fn test_byte_order_mark_and_whitespace() {
        let mut data = b"\xEF\xBB\xBF\r\n".to_vec();
        data.extend_from_slice(&document(&format!(
            r#"<uof:UOF xmlns:uof="{UOF_NS}" uof:mimetype="vnd.uof.presentation">"#
        )));
        let found = run(&UnifiedOfficeScanner, &data).unwrap();
        assert_eq!(found.kind(), FormatKind::UnifiedOffice { class: UofClass::Presentation });
    }
}

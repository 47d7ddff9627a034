//! OLE2 compound file family.
//!
//! Every refinement in this module first goes through the shared compound
//! file precondition, then decides on the names of the storages and streams
//! inside the file. The installer package additionally decodes the summary
//! information property set.

use tracing::trace;

use crate::common::error::Result;
use crate::detection::format::{FileFormat, FormatKind};
use crate::detection::job::ScanJob;
use crate::detection::scanner::{Scanner, compound_entries, is_compound_file, open_compound, recover};
use crate::ole::PropertySet;
use crate::ole::consts::SUMMARY_INFORMATION;

/// Priority of every format refined from a compound file.
const REFINED: i32 = 10;

pub const COMPOUND_FILE: FileFormat = FileFormat::new(
    FormatKind::CompoundFile,
    &["application/x-ole-storage", "application/x-cfb"],
    &["cfb"],
    "OLE2 Compound File",
);

pub const WORD_DOCUMENT: FileFormat = FileFormat::new(
    FormatKind::WordDocument,
    &["application/msword"],
    &["doc", "dot"],
    "Microsoft Word 97-2003 Document",
)
.with_priority(REFINED);

pub const EXCEL_WORKBOOK: FileFormat = FileFormat::new(
    FormatKind::ExcelWorkbook,
    &["application/vnd.ms-excel"],
    &["xls", "xlt", "xla"],
    "Microsoft Excel 97-2003 Workbook",
)
.with_priority(REFINED);

pub const POWERPOINT_PRESENTATION: FileFormat = FileFormat::new(
    FormatKind::PowerPointPresentation,
    &["application/vnd.ms-powerpoint"],
    &["ppt", "pps", "pot"],
    "Microsoft PowerPoint 97-2003 Presentation",
)
.with_priority(REFINED);

pub const INSTALLER_PACKAGE: FileFormat = FileFormat::new(
    FormatKind::InstallerPackage,
    &["application/x-msi", "application/x-ole-storage"],
    &["msi"],
    "Windows Installer Package",
)
.with_priority(REFINED);

pub const OUTLOOK_MESSAGE: FileFormat = FileFormat::new(
    FormatKind::OutlookMessage,
    &["application/vnd.ms-outlook"],
    &["msg"],
    "Microsoft Outlook Message",
)
.with_priority(REFINED);

pub const PUBLISHER_DOCUMENT: FileFormat = FileFormat::new(
    FormatKind::PublisherDocument,
    &["application/vnd.ms-publisher", "application/x-mspublisher"],
    &["pub"],
    "Microsoft Publisher Document",
)
.with_priority(REFINED);

/// Test applied to the name of one storage or stream.
#[derive(Debug, Clone, Copy)]
pub enum Marker {
    /// Name equals the text
    Exact(&'static str),
    /// Name equals the text, ignoring ASCII case
    ExactIgnoreCase(&'static str),
    /// Name contains the text
    Contains(&'static str),
}

impl Marker {
    pub fn matches(&self, name: &str) -> bool {
        match *self {
            Marker::Exact(text) => name == text,
            Marker::ExactIgnoreCase(text) => name.eq_ignore_ascii_case(text),
            Marker::Contains(text) => name.contains(text),
        }
    }
}

const WORD_MARKERS: &[&[Marker]] = &[
    &[Marker::Exact("WordDocument")],
    &[Marker::Contains("SummaryInformation")],
    &[Marker::Contains("CompObj")],
];

const EXCEL_MARKERS: &[&[Marker]] = &[&[Marker::Exact("Workbook"), Marker::Exact("Book")]];

const POWERPOINT_MARKERS: &[&[Marker]] = &[&[Marker::Exact("PowerPoint Document")]];

const OUTLOOK_MESSAGE_MARKERS: &[&[Marker]] = &[
    &[Marker::ExactIgnoreCase("__nameid_version1.0")],
    &[Marker::ExactIgnoreCase("__substg1.0_001A001F")],
    &[Marker::ExactIgnoreCase("__properties_version1.0")],
];

const PUBLISHER_MARKERS: &[&[Marker]] = &[
    &[Marker::Exact("Quill")],
    &[Marker::Contains("Contents")],
    &[Marker::Contains("Envelope")],
];

/// Generic compound file: the signature alone.
pub struct CompoundFileScanner;

impl Scanner for CompoundFileScanner {
    fn name(&self) -> &'static str {
        "compound-file"
    }

    fn detect(&self, job: &mut ScanJob<'_>) -> Result<Option<FileFormat>> {
        Ok(is_compound_file(job).then_some(COMPOUND_FILE))
    }
}

/// A compound file document recognized by the items it contains.
///
/// Each group must be satisfied by at least one item; every group must be
/// satisfied.
pub struct CompoundDocumentScanner {
    name: &'static str,
    required: &'static [&'static [Marker]],
    format: FileFormat,
}

impl CompoundDocumentScanner {
    pub const fn new(name: &'static str, required: &'static [&'static [Marker]], format: FileFormat) -> Self {
        CompoundDocumentScanner { name, required, format }
    }

    /// Legacy Word: the `WordDocument` stream next to summary and CompObj streams.
    pub const fn word() -> Self {
        Self::new("word-97", WORD_MARKERS, WORD_DOCUMENT)
    }

    /// Legacy Excel: a BIFF8 `Workbook` or BIFF5 `Book` stream.
    pub const fn excel() -> Self {
        Self::new("excel-97", EXCEL_MARKERS, EXCEL_WORKBOOK)
    }

    pub const fn powerpoint() -> Self {
        Self::new("powerpoint-97", POWERPOINT_MARKERS, POWERPOINT_PRESENTATION)
    }

    /// Outlook message: named property mapping, subject and property streams.
    pub const fn outlook_message() -> Self {
        Self::new("outlook-msg", OUTLOOK_MESSAGE_MARKERS, OUTLOOK_MESSAGE)
    }

    pub const fn publisher() -> Self {
        Self::new("publisher", PUBLISHER_MARKERS, PUBLISHER_DOCUMENT)
    }

    fn accepts(&self, entries: &[String]) -> bool {
        self.required
            .iter()
            .all(|group| entries.iter().any(|name| group.iter().any(|m| m.matches(name))))
    }
}

impl Scanner for CompoundDocumentScanner {
    fn name(&self) -> &'static str {
        self.name
    }

    fn detect(&self, job: &mut ScanJob<'_>) -> Result<Option<FileFormat>> {
        let Some(entries) = compound_entries(job)? else {
            return Ok(None);
        };
        Ok(self.accepts(&entries).then(|| self.format.clone()))
    }

    fn reads_source(&self) -> bool {
        true
    }
}

const INSTALLER_TITLE: &str = "Installation Database";
const INSTALLER_TOOLSET: &str = "windows installer xml toolset";

/// Windows Installer package, recognized from its summary information.
pub struct InstallerPackageScanner;

impl InstallerPackageScanner {
    fn accepts(properties: &PropertySet) -> bool {
        let title = properties
            .title()
            .is_some_and(|t| t.trim_matches('\0').eq_ignore_ascii_case(INSTALLER_TITLE));
        let toolset = properties
            .app_name()
            .is_some_and(|a| a.trim_matches('\0').to_lowercase().contains(INSTALLER_TOOLSET));
        title && toolset
    }
}

impl Scanner for InstallerPackageScanner {
    fn name(&self) -> &'static str {
        "msi"
    }

    fn detect(&self, job: &mut ScanJob<'_>) -> Result<Option<FileFormat>> {
        let Some(mut ole) = open_compound(job, self.name())? else {
            return Ok(None);
        };
        let Some(summary) = ole
            .entries()
            .iter()
            .find(|e| e.name == SUMMARY_INFORMATION)
            .map(|e| e.path.clone())
        else {
            return Ok(None);
        };

        let path: Vec<&str> = summary.iter().map(String::as_str).collect();
        let Some(stream) = recover(ole.open_stream(&path), self.name())? else {
            return Ok(None);
        };
        let Some(properties) = recover(PropertySet::parse(&stream), self.name())? else {
            return Ok(None);
        };

        if !Self::accepts(&properties) {
            trace!(title = ?properties.title(), app = ?properties.app_name(), "Summary does not describe an installer");
            return Ok(None);
        }
        Ok(Some(INSTALLER_PACKAGE))
    }

    fn reads_source(&self) -> bool {
        true
    }
}

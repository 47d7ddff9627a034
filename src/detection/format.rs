//! Format descriptors returned by a scan.

use serde::{Deserialize, Serialize};

use crate::common::binary::Endian;

/// Word size of an executable image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Bitness {
    Bits32,
    Bits64,
}

/// Body compression of a Shockwave Flash file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SwfCompression {
    /// `FWS`
    None,
    /// `CWS`
    Zlib,
    /// `ZWS`
    Lzma,
}

/// String encoding of an Outlook personal folders file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PstEncoding {
    Unknown,
    Ansi,
    Unicode,
}

/// Application family of an Office Open XML package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OfficeApp {
    Word,
    Excel,
    PowerPoint,
}

/// Document class of an OpenDocument package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OdfClass {
    Text,
    Spreadsheet,
    Presentation,
    Drawing,
    Chart,
    Formula,
    Image,
    MasterDocument,
    Database,
}

/// Document class of a Unified Office Format file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UofClass {
    Text,
    Spreadsheet,
    Presentation,
}

/// Identity of a recognized format, with its format-specific attributes.
///
/// Two descriptors describe the same format exactly when their kinds are
/// equal, attributes included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormatKind {
    // Images
    Bmp,
    Gif,
    Jpeg { exif: bool },
    Png,
    Tiff,

    // Archives
    Zip,
    Rar,
    Bzip2,
    Cabinet,

    // Executables
    PortableExecutable { bits: Bitness, clr: bool },
    Elf { bits: Bitness, endian: Endian },
    MachO { bits: Bitness, endian: Endian },

    // Compound files
    CompoundFile,
    WordDocument,
    ExcelWorkbook,
    PowerPointPresentation,
    InstallerPackage,
    OutlookMessage,
    PublisherDocument,

    // Other Microsoft formats
    AccessDatabase,
    OutlookPst { encoding: PstEncoding },

    // Archive-packaged documents
    OfficeOpenXml { app: OfficeApp, template: bool, macros: bool },
    OpenDocument { class: OdfClass, template: bool },
    Epub,
    NuGetPackage,
    JavaArchive,

    // Media
    Avi,
    Wave,
    BaseMedia,
    Mp4,
    M4a,
    ThreeGpp,
    ThreeGpp2,
    FlashVideo,
    Asf,
    Aiff,
    RealMedia,
    Matroska,
    WebM,

    // Others
    Pdf,
    Swf { compression: SwfCompression },
    Mobi,
    UnifiedOffice { class: UofClass },
}

/// Immutable description of a recognized format.
///
/// Descriptors are built by scanners at the moment they recognize a match
/// and handed to the caller; there are no mutators.
#[derive(Debug, Clone, Serialize)]
pub struct FileFormat {
    kind: FormatKind,
    content_types: &'static [&'static str],
    extensions: &'static [&'static str],
    description: &'static str,
    priority: i32,
}

impl FileFormat {
    /// Create a descriptor with the default priority of 0.
    pub const fn new(
        kind: FormatKind,
        content_types: &'static [&'static str],
        extensions: &'static [&'static str],
        description: &'static str,
    ) -> Self {
        FileFormat {
            kind,
            content_types,
            extensions,
            description,
            priority: 0,
        }
    }

    /// Same descriptor with another priority.
    pub const fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn kind(&self) -> FormatKind {
        self.kind
    }

    /// MIME content types, most specific first.
    pub fn content_types(&self) -> &'static [&'static str] {
        self.content_types
    }

    /// Preferred MIME content type.
    pub fn content_type(&self) -> Option<&'static str> {
        self.content_types.first().copied()
    }

    /// File extensions without the leading dot, preferred first.
    pub fn extensions(&self) -> &'static [&'static str] {
        self.extensions
    }

    pub fn extension(&self) -> Option<&'static str> {
        self.extensions.first().copied()
    }

    pub fn description(&self) -> &'static str {
        self.description
    }

    /// Resolution priority; the highest wins when several scanners match.
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Whether an Office Open XML package declares macro-enabled content.
    pub fn macros(&self) -> Option<bool> {
        match self.kind {
            FormatKind::OfficeOpenXml { macros, .. } => Some(macros),
            _ => None,
        }
    }

    /// Word size of an executable image.
    pub fn bitness(&self) -> Option<Bitness> {
        match self.kind {
            FormatKind::PortableExecutable { bits, .. }
            | FormatKind::Elf { bits, .. }
            | FormatKind::MachO { bits, .. } => Some(bits),
            _ => None,
        }
    }
}

impl PartialEq for FileFormat {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl Eq for FileFormat {}

impl std::hash::Hash for FileFormat {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
    }
}

impl std::fmt::Display for FileFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description)
    }
}

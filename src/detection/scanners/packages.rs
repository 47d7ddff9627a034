//! Documents packaged as ZIP archives.
//!
//! Office Open XML packages declare their main part in
//! `[Content_Types].xml`; OpenDocument and EPUB store their media type in a
//! `mimetype` entry. Both texts are read once per job through the shared
//! archive preconditions and mapped to a descriptor through static tables.

use memchr::memmem;
use phf::phf_map;

use crate::common::error::Result;
use crate::detection::format::{FileFormat, FormatKind, OdfClass, OfficeApp};
use crate::detection::job::ScanJob;
use crate::detection::scanner::{Scanner, content_types, contains, mimetype, zip_entries};

/// Priority of formats refined from a ZIP archive.
const REFINED: i32 = 10;
/// EPUB shares the `mimetype` convention with OpenDocument.
const EPUB_PRIORITY: i32 = 20;

pub const fn office_open_xml(app: OfficeApp, template: bool, macros: bool) -> FileFormat {
    let (content_type, extension, description): (&'static [&'static str], &'static [&'static str], &'static str) =
        match (app, template, macros) {
            (OfficeApp::Word, false, false) => (
                &["application/vnd.openxmlformats-officedocument.wordprocessingml.document"],
                &["docx"],
                "Microsoft Word Document",
            ),
            (OfficeApp::Word, false, true) => (
                &["application/vnd.ms-word.document.macroEnabled.12"],
                &["docm"],
                "Microsoft Word Macro-Enabled Document",
            ),
            (OfficeApp::Word, true, false) => (
                &["application/vnd.openxmlformats-officedocument.wordprocessingml.template"],
                &["dotx"],
                "Microsoft Word Template",
            ),
            (OfficeApp::Word, true, true) => (
                &["application/vnd.ms-word.template.macroEnabled.12"],
                &["dotm"],
                "Microsoft Word Macro-Enabled Template",
            ),
            (OfficeApp::Excel, false, false) => (
                &["application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"],
                &["xlsx"],
                "Microsoft Excel Workbook",
            ),
            (OfficeApp::Excel, false, true) => (
                &["application/vnd.ms-excel.sheet.macroEnabled.12"],
                &["xlsm"],
                "Microsoft Excel Macro-Enabled Workbook",
            ),
            (OfficeApp::Excel, true, false) => (
                &["application/vnd.openxmlformats-officedocument.spreadsheetml.template"],
                &["xltx"],
                "Microsoft Excel Template",
            ),
            (OfficeApp::Excel, true, true) => (
                &["application/vnd.ms-excel.template.macroEnabled.12"],
                &["xltm"],
                "Microsoft Excel Macro-Enabled Template",
            ),
            (OfficeApp::PowerPoint, false, false) => (
                &["application/vnd.openxmlformats-officedocument.presentationml.presentation"],
                &["pptx"],
                "Microsoft PowerPoint Presentation",
            ),
            (OfficeApp::PowerPoint, false, true) => (
                &["application/vnd.ms-powerpoint.presentation.macroEnabled.12"],
                &["pptm"],
                "Microsoft PowerPoint Macro-Enabled Presentation",
            ),
            (OfficeApp::PowerPoint, true, false) => (
                &["application/vnd.openxmlformats-officedocument.presentationml.template"],
                &["potx"],
                "Microsoft PowerPoint Template",
            ),
            (OfficeApp::PowerPoint, true, true) => (
                &["application/vnd.ms-powerpoint.template.macroEnabled.12"],
                &["potm"],
                "Microsoft PowerPoint Macro-Enabled Template",
            ),
        };
    FileFormat::new(
        FormatKind::OfficeOpenXml { app, template, macros },
        content_type,
        extension,
        description,
    )
    .with_priority(REFINED)
}

fn word_document(macros: bool) -> FileFormat {
    office_open_xml(OfficeApp::Word, false, macros)
}

fn word_template(macros: bool) -> FileFormat {
    office_open_xml(OfficeApp::Word, true, macros)
}

fn excel_workbook(macros: bool) -> FileFormat {
    office_open_xml(OfficeApp::Excel, false, macros)
}

fn excel_template(macros: bool) -> FileFormat {
    office_open_xml(OfficeApp::Excel, true, macros)
}

fn powerpoint_presentation(macros: bool) -> FileFormat {
    office_open_xml(OfficeApp::PowerPoint, false, macros)
}

fn powerpoint_template(macros: bool) -> FileFormat {
    office_open_xml(OfficeApp::PowerPoint, true, macros)
}

/// Main document part content type to descriptor factory. The factory takes
/// the macro flag, which comes from a separate check.
static MAIN_PART_TYPES: phf::Map<&'static str, fn(bool) -> FileFormat> = phf_map! {
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml" => word_document,
    "application/vnd.ms-word.document.macroEnabled.main+xml" => word_document,
    "application/vnd.openxmlformats-officedocument.wordprocessingml.template.main+xml" => word_template,
    "application/vnd.ms-word.template.macroEnabledTemplate.main+xml" => word_template,
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml" => excel_workbook,
    "application/vnd.ms-excel.sheet.macroEnabled.main+xml" => excel_workbook,
    "application/vnd.openxmlformats-officedocument.spreadsheetml.template.main+xml" => excel_template,
    "application/vnd.ms-excel.template.macroEnabled.main+xml" => excel_template,
    "application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml" => powerpoint_presentation,
    "application/vnd.ms-powerpoint.presentation.macroEnabled.main+xml" => powerpoint_presentation,
    "application/vnd.openxmlformats-officedocument.presentationml.template.main+xml" => powerpoint_template,
    "application/vnd.ms-powerpoint.template.macroEnabled.main+xml" => powerpoint_template,
};

const MACRO_ENABLED_PARTS: [&str; 6] = [
    "application/vnd.ms-word.document.macroEnabled.main+xml",
    "application/vnd.ms-word.template.macroEnabledTemplate.main+xml",
    "application/vnd.ms-excel.sheet.macroEnabled.main+xml",
    "application/vnd.ms-excel.template.macroEnabled.main+xml",
    "application/vnd.ms-powerpoint.presentation.macroEnabled.main+xml",
    "application/vnd.ms-powerpoint.template.macroEnabled.main+xml",
];

/// Values of every `ContentType="..."` attribute in a content types part.
fn declared_content_types(text: &str) -> impl Iterator<Item = &str> {
    const ATTRIBUTE: &str = "ContentType=\"";
    memmem::find_iter(text.as_bytes(), ATTRIBUTE).filter_map(move |at| {
        let value = &text[at + ATTRIBUTE.len()..];
        value.find('"').map(|end| &value[..end])
    })
}

/// Office Open XML package of one application.
pub struct OfficeOpenXmlScanner {
    app: OfficeApp,
}

impl OfficeOpenXmlScanner {
    pub const WORD: Self = OfficeOpenXmlScanner { app: OfficeApp::Word };
    pub const EXCEL: Self = OfficeOpenXmlScanner { app: OfficeApp::Excel };
    pub const POWERPOINT: Self = OfficeOpenXmlScanner { app: OfficeApp::PowerPoint };

    fn classify(&self, text: &str) -> Option<FileFormat> {
        let macros = MACRO_ENABLED_PARTS.iter().any(|part| contains(text.as_bytes(), part.as_bytes()));
        declared_content_types(text)
            .filter_map(|content_type| MAIN_PART_TYPES.get(content_type))
            .map(|factory| factory(macros))
            .find(|format| matches!(format.kind(), FormatKind::OfficeOpenXml { app, .. } if app == self.app))
    }
}

impl Scanner for OfficeOpenXmlScanner {
    fn name(&self) -> &'static str {
        match self.app {
            OfficeApp::Word => "ooxml-word",
            OfficeApp::Excel => "ooxml-excel",
            OfficeApp::PowerPoint => "ooxml-powerpoint",
        }
    }

    fn detect(&self, job: &mut ScanJob<'_>) -> Result<Option<FileFormat>> {
        let Some(text) = content_types(job)? else {
            return Ok(None);
        };
        if text.trim().is_empty() {
            return Ok(None);
        }
        Ok(self.classify(&text))
    }

    fn reads_source(&self) -> bool {
        true
    }
}

pub const fn open_document(class: OdfClass, template: bool) -> FileFormat {
    let (content_type, extension, description): (&'static [&'static str], &'static [&'static str], &'static str) =
        match (class, template) {
            (OdfClass::Text, false) => (&["application/vnd.oasis.opendocument.text"], &["odt"], "OpenDocument Text"),
            (OdfClass::Text, true) => (
                &["application/vnd.oasis.opendocument.text-template"],
                &["ott"],
                "OpenDocument Text Template",
            ),
            (OdfClass::Spreadsheet, false) => (
                &["application/vnd.oasis.opendocument.spreadsheet"],
                &["ods"],
                "OpenDocument Spreadsheet",
            ),
            (OdfClass::Spreadsheet, true) => (
                &["application/vnd.oasis.opendocument.spreadsheet-template"],
                &["ots"],
                "OpenDocument Spreadsheet Template",
            ),
            (OdfClass::Presentation, false) => (
                &["application/vnd.oasis.opendocument.presentation"],
                &["odp"],
                "OpenDocument Presentation",
            ),
            (OdfClass::Presentation, true) => (
                &["application/vnd.oasis.opendocument.presentation-template"],
                &["otp"],
                "OpenDocument Presentation Template",
            ),
            (OdfClass::Drawing, false) => (
                &["application/vnd.oasis.opendocument.graphics"],
                &["odg"],
                "OpenDocument Drawing",
            ),
            (OdfClass::Drawing, true) => (
                &["application/vnd.oasis.opendocument.graphics-template"],
                &["otg"],
                "OpenDocument Drawing Template",
            ),
            (OdfClass::Chart, false) => (&["application/vnd.oasis.opendocument.chart"], &["odc"], "OpenDocument Chart"),
            (OdfClass::Chart, true) => (
                &["application/vnd.oasis.opendocument.chart-template"],
                &["otc"],
                "OpenDocument Chart Template",
            ),
            (OdfClass::Formula, false) => (
                &["application/vnd.oasis.opendocument.formula"],
                &["odf"],
                "OpenDocument Formula",
            ),
            (OdfClass::Formula, true) => (
                &["application/vnd.oasis.opendocument.formula-template"],
                &["otf"],
                "OpenDocument Formula Template",
            ),
            // Image templates resolve to the image descriptor
            (OdfClass::Image, _) => (&["application/vnd.oasis.opendocument.image"], &["odi"], "OpenDocument Image"),
            (OdfClass::MasterDocument, false) => (
                &["application/vnd.oasis.opendocument.text-master"],
                &["odm"],
                "OpenDocument Master Document",
            ),
            (OdfClass::MasterDocument, true) => (
                &["application/vnd.oasis.opendocument.text-master-template"],
                &["otm"],
                "OpenDocument Master Document Template",
            ),
            (OdfClass::Database, _) => (
                &["application/vnd.oasis.opendocument.base", "application/vnd.sun.xml.base"],
                &["odb"],
                "OpenDocument Database",
            ),
        };
    let template = template && !matches!(class, OdfClass::Image | OdfClass::Database);
    FileFormat::new(
        FormatKind::OpenDocument { class, template },
        content_type,
        extension,
        description,
    )
    .with_priority(REFINED)
}

fn odf_text() -> FileFormat {
    open_document(OdfClass::Text, false)
}

fn odf_spreadsheet() -> FileFormat {
    open_document(OdfClass::Spreadsheet, false)
}

fn odf_presentation() -> FileFormat {
    open_document(OdfClass::Presentation, false)
}

fn odf_drawing() -> FileFormat {
    open_document(OdfClass::Drawing, false)
}

fn odf_chart() -> FileFormat {
    open_document(OdfClass::Chart, false)
}

fn odf_formula() -> FileFormat {
    open_document(OdfClass::Formula, false)
}

fn odf_image() -> FileFormat {
    open_document(OdfClass::Image, false)
}

fn odf_master_document() -> FileFormat {
    open_document(OdfClass::MasterDocument, false)
}

fn odf_database() -> FileFormat {
    open_document(OdfClass::Database, false)
}

fn odf_text_template() -> FileFormat {
    open_document(OdfClass::Text, true)
}

fn odf_spreadsheet_template() -> FileFormat {
    open_document(OdfClass::Spreadsheet, true)
}

fn odf_presentation_template() -> FileFormat {
    open_document(OdfClass::Presentation, true)
}

fn odf_drawing_template() -> FileFormat {
    open_document(OdfClass::Drawing, true)
}

fn odf_chart_template() -> FileFormat {
    open_document(OdfClass::Chart, true)
}

fn odf_formula_template() -> FileFormat {
    open_document(OdfClass::Formula, true)
}

fn odf_master_document_template() -> FileFormat {
    open_document(OdfClass::MasterDocument, true)
}

/// `mimetype` entry text to descriptor factory.
static ODF_MIME_TYPES: phf::Map<&'static str, fn() -> FileFormat> = phf_map! {
    "application/vnd.oasis.opendocument.text" => odf_text,
    "application/vnd.oasis.opendocument.spreadsheet" => odf_spreadsheet,
    "application/vnd.oasis.opendocument.presentation" => odf_presentation,
    "application/vnd.oasis.opendocument.graphics" => odf_drawing,
    "application/vnd.oasis.opendocument.chart" => odf_chart,
    "application/vnd.oasis.opendocument.formula" => odf_formula,
    "application/vnd.oasis.opendocument.image" => odf_image,
    "application/vnd.oasis.opendocument.text-master" => odf_master_document,
    "application/vnd.oasis.opendocument.base" => odf_database,
    "application/vnd.oasis.opendocument.database" => odf_database,
    "application/vnd.sun.xml.base" => odf_database,
    "application/vnd.oasis.opendocument.text-template" => odf_text_template,
    "application/vnd.oasis.opendocument.spreadsheet-template" => odf_spreadsheet_template,
    "application/vnd.oasis.opendocument.presentation-template" => odf_presentation_template,
    "application/vnd.oasis.opendocument.graphics-template" => odf_drawing_template,
    "application/vnd.oasis.opendocument.chart-template" => odf_chart_template,
    "application/vnd.oasis.opendocument.formula-template" => odf_formula_template,
    "application/vnd.oasis.opendocument.image-template" => odf_image,
    "application/vnd.oasis.opendocument.text-master-template" => odf_master_document_template,
};

/// OpenDocument package of any class.
pub struct OpenDocumentScanner;

impl Scanner for OpenDocumentScanner {
    fn name(&self) -> &'static str {
        "opendocument"
    }

    fn detect(&self, job: &mut ScanJob<'_>) -> Result<Option<FileFormat>> {
        let Some(text) = mimetype(job)? else {
            return Ok(None);
        };
        Ok(ODF_MIME_TYPES.get(text.trim()).map(|factory| factory()))
    }

    fn reads_source(&self) -> bool {
        true
    }
}

pub const EPUB: FileFormat = FileFormat::new(
    FormatKind::Epub,
    &["application/epub+zip"],
    &["epub"],
    "EPUB Electronic Publication",
)
.with_priority(EPUB_PRIORITY);

pub struct EpubScanner;

impl Scanner for EpubScanner {
    fn name(&self) -> &'static str {
        "epub"
    }

    fn detect(&self, job: &mut ScanJob<'_>) -> Result<Option<FileFormat>> {
        let Some(text) = mimetype(job)? else {
            return Ok(None);
        };
        Ok((text.trim() == "application/epub+zip").then_some(EPUB))
    }

    fn reads_source(&self) -> bool {
        true
    }
}

pub const NUGET_PACKAGE: FileFormat = FileFormat::new(
    FormatKind::NuGetPackage,
    &["application/octet-stream", "application/zip"],
    &["nupkg"],
    "NuGet Package",
)
.with_priority(REFINED);

const NUSPEC_DEFAULT: &str = r#"<Default Extension="nuspec" ContentType="application/octet" />"#;

/// NuGet package: a `.nuspec` manifest declared in the content types.
pub struct NuGetPackageScanner;

impl Scanner for NuGetPackageScanner {
    fn name(&self) -> &'static str {
        "nuget"
    }

    fn detect(&self, job: &mut ScanJob<'_>) -> Result<Option<FileFormat>> {
        let Some(text) = content_types(job)? else {
            return Ok(None);
        };
        if !contains(text.as_bytes(), NUSPEC_DEFAULT.as_bytes()) {
            return Ok(None);
        }
        let Some(entries) = zip_entries(job)? else {
            return Ok(None);
        };
        Ok(entries.iter().any(|name| name.ends_with(".nuspec")).then_some(NUGET_PACKAGE))
    }

    fn reads_source(&self) -> bool {
        true
    }
}

pub const JAVA_ARCHIVE: FileFormat = FileFormat::new(
    FormatKind::JavaArchive,
    &["application/java-archive", "application/x-java-archive"],
    &["jar"],
    "Java Archive",
)
.with_priority(REFINED);

const JAR_MANIFEST: &str = "META-INF/MANIFEST.MF";

pub struct JavaArchiveScanner;

impl Scanner for JavaArchiveScanner {
    fn name(&self) -> &'static str {
        "jar"
    }

    fn detect(&self, job: &mut ScanJob<'_>) -> Result<Option<FileFormat>> {
        let Some(entries) = zip_entries(job)? else {
            return Ok(None);
        };
        Ok(entries.iter().any(|name| name == JAR_MANIFEST).then_some(JAVA_ARCHIVE))
    }

    fn reads_source(&self) -> bool {
        true
    }
}

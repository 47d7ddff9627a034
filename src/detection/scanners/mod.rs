//! Builtin scanners, grouped by format family.
//!
//! Generic container scanners are registered before their refinements.
//! Resolution is by priority, so the order only settles ties.

pub mod archives;
#[cfg(feature = "ole")]
pub mod compound;
pub mod executables;
pub mod images;
pub mod media;
pub mod microsoft;
pub mod others;
#[cfg(feature = "archive")]
pub mod packages;
#[cfg(feature = "uof")]
pub mod uof;

use super::registry::ScannerRegistry;

/// Register every builtin scanner.
pub fn register_builtin(registry: &mut ScannerRegistry) {
    register_images(registry);
    register_archives(registry);
    #[cfg(feature = "ole")]
    register_compound(registry);
    register_executables(registry);
    register_microsoft(registry);
    register_media(registry);
    register_others(registry);
}

fn register_images(registry: &mut ScannerRegistry) {
    registry.register(images::BmpScanner);
    registry.register(images::GifScanner);
    registry.register(images::JpegScanner);
    registry.register(images::PngScanner);
    registry.register(images::TiffScanner);
}

/// General archives, then the documents packaged as ZIP archives.
fn register_archives(registry: &mut ScannerRegistry) {
    #[cfg(feature = "archive")]
    registry.register(archives::ZipScanner);
    registry.register(archives::RarScanner);
    registry.register(archives::Bzip2Scanner);
    registry.register(archives::CabinetScanner);

    #[cfg(feature = "archive")]
    {
        registry.register(packages::OfficeOpenXmlScanner::WORD);
        registry.register(packages::OfficeOpenXmlScanner::EXCEL);
        registry.register(packages::OfficeOpenXmlScanner::POWERPOINT);
        registry.register(packages::OpenDocumentScanner);
        registry.register(packages::EpubScanner);
        registry.register(packages::NuGetPackageScanner);
        registry.register(packages::JavaArchiveScanner);
    }
}

#[cfg(feature = "ole")]
fn register_compound(registry: &mut ScannerRegistry) {
    registry.register(compound::CompoundFileScanner);
    registry.register(compound::CompoundDocumentScanner::word());
    registry.register(compound::CompoundDocumentScanner::excel());
    registry.register(compound::CompoundDocumentScanner::powerpoint());
    registry.register(compound::InstallerPackageScanner);
    registry.register(compound::CompoundDocumentScanner::outlook_message());
    registry.register(compound::CompoundDocumentScanner::publisher());
}

fn register_executables(registry: &mut ScannerRegistry) {
    registry.register(executables::PortableExecutableScanner);
    registry.register(executables::ElfScanner);
    registry.register(executables::MachOScanner);
}

fn register_microsoft(registry: &mut ScannerRegistry) {
    registry.register(microsoft::AccessDatabaseScanner);
    registry.register(microsoft::OutlookPstScanner);
}

fn register_media(registry: &mut ScannerRegistry) {
    registry.register(media::MatroskaScanner);
    registry.register(media::WebMScanner);
    registry.register(media::BaseMediaScanner);
    registry.register(media::Mp4Scanner);
    registry.register(media::M4aScanner);
    registry.register(media::ThreeGppScanner);
    registry.register(media::FlashVideoScanner);
    registry.register(media::RiffScanner::AVI);
    registry.register(media::RiffScanner::WAVE);
    registry.register(media::AsfScanner);
    registry.register(media::AiffScanner);
    registry.register(media::RealMediaScanner);
}

fn register_others(registry: &mut ScannerRegistry) {
    registry.register(others::PdfScanner);
    registry.register(others::SwfScanner);
    registry.register(others::MobiScanner);
    #[cfg(feature = "uof")]
    registry.register(uof::UnifiedOfficeScanner);
}

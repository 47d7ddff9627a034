//! Executable image headers: PE/COFF, ELF and Mach-O.

use zerocopy::{LE, U16, U32};
use zerocopy_derive::FromBytes as DeriveFromBytes;

use crate::common::binary::{Endian, read_i32, read_struct, read_u16, read_u32};
use crate::common::error::Result;
use crate::detection::format::{Bitness, FileFormat, FormatKind};
use crate::detection::job::ScanJob;
use crate::detection::scanner::Scanner;

/// Executable scanners look at a larger prefix than other leaves.
const MIN_IMAGE_WINDOW: usize = 1024;

pub const fn portable_executable(bits: Bitness, clr: bool) -> FileFormat {
    let description = match (bits, clr) {
        (Bitness::Bits32, false) => "Windows Executable (32-bit)",
        (Bitness::Bits64, false) => "Windows Executable (64-bit)",
        (Bitness::Bits32, true) => ".NET Assembly (32-bit)",
        (Bitness::Bits64, true) => ".NET Assembly (64-bit)",
    };
    FileFormat::new(
        FormatKind::PortableExecutable { bits, clr },
        &["application/vnd.microsoft.portable-executable", "application/x-msdownload"],
        &["exe", "dll", "sys"],
        description,
    )
}

pub const fn elf(bits: Bitness, endian: Endian) -> FileFormat {
    FileFormat::new(
        FormatKind::Elf { bits, endian },
        &["application/x-elf", "application/x-executable"],
        &["elf", "so", "o"],
        "ELF Executable",
    )
}

pub const fn mach_o(bits: Bitness, endian: Endian) -> FileFormat {
    FileFormat::new(
        FormatKind::MachO { bits, endian },
        &["application/x-mach-binary"],
        &["dylib", "bundle", "o"],
        "Mach-O Executable",
    )
}

/// `IMAGE_DOS_HEADER` size; `e_lfanew` is its last field.
const DOS_HEADER_SIZE: usize = 64;
const E_LFANEW_OFFSET: usize = 0x3C;
const MAX_LFANEW: i32 = 256 * 1024 * 1024;

/// `IMAGE_FILE_HEADER` preceded by the `PE\0\0` signature.
#[allow(dead_code)]
#[derive(Debug, DeriveFromBytes)]
#[repr(C)]
struct NtFileHeader {
    signature: [u8; 4],
    machine: U16<LE>,
    number_of_sections: U16<LE>,
    time_date_stamp: U32<LE>,
    pointer_to_symbol_table: U32<LE>,
    number_of_symbols: U32<LE>,
    size_of_optional_header: U16<LE>,
    characteristics: U16<LE>,
}

const NT_FILE_HEADER_SIZE: usize = 24;

/// `IMAGE_DATA_DIRECTORY`
#[derive(Debug, DeriveFromBytes)]
#[repr(C)]
struct DataDirectory {
    virtual_address: U32<LE>,
    size: U32<LE>,
}

const PE32_MAGIC: u16 = 0x10B;
const PE32_PLUS_MAGIC: u16 = 0x20B;

/// Optional header sizes with all 16 data directories.
const OPTIONAL_HEADER32_SIZE: usize = 224;
const OPTIONAL_HEADER64_SIZE: usize = 240;

/// Offset of the data directory array inside the optional header.
const DATA_DIRECTORIES32: usize = 96;
const DATA_DIRECTORIES64: usize = 112;

const CLR_RUNTIME_HEADER: usize = 14;

/// PE image, with the CLR runtime header marking .NET assemblies.
pub struct PortableExecutableScanner;

impl Scanner for PortableExecutableScanner {
    fn name(&self) -> &'static str {
        "pe"
    }

    fn detect(&self, job: &mut ScanJob<'_>) -> Result<Option<FileFormat>> {
        let start = job.start_bytes();
        if start.len() < DOS_HEADER_SIZE + 64 + NT_FILE_HEADER_SIZE + OPTIONAL_HEADER64_SIZE {
            return Ok(None);
        }
        if !start.starts_with(b"MZ") {
            return Ok(None);
        }

        let lfanew = read_i32(start, E_LFANEW_OFFSET, Endian::Little)?;
        if lfanew == 0
            || lfanew >= MAX_LFANEW
            || lfanew % 4 != 0
            || lfanew < DOS_HEADER_SIZE as i32
            || lfanew as usize + NT_FILE_HEADER_SIZE + 2 > start.len()
        {
            return Ok(None);
        }
        let nt_offset = lfanew as usize;

        let header: NtFileHeader = read_struct(start, nt_offset)?;
        if &header.signature != b"PE\0\0" {
            return Ok(None);
        }

        let optional = nt_offset + NT_FILE_HEADER_SIZE;
        let (bits, size, directories) = match read_u16(start, optional, Endian::Little)? {
            PE32_MAGIC => (Bitness::Bits32, OPTIONAL_HEADER32_SIZE, DATA_DIRECTORIES32),
            PE32_PLUS_MAGIC => (Bitness::Bits64, OPTIONAL_HEADER64_SIZE, DATA_DIRECTORIES64),
            _ => return Ok(None),
        };
        if optional + size >= start.len() {
            return Ok(None);
        }

        let clr: DataDirectory = read_struct(start, optional + directories + CLR_RUNTIME_HEADER * 8)?;
        let is_clr = clr.size.get() > 0 && clr.virtual_address.get() > 0;
        Ok(Some(portable_executable(bits, is_clr)))
    }
}

const ELF_MAGIC: &[u8] = b"\x7FELF";

/// ELF image of either class and byte order.
pub struct ElfScanner;

impl Scanner for ElfScanner {
    fn name(&self) -> &'static str {
        "elf"
    }

    fn detect(&self, job: &mut ScanJob<'_>) -> Result<Option<FileFormat>> {
        let start = job.start_bytes();
        if start.len() < MIN_IMAGE_WINDOW || !start.starts_with(ELF_MAGIC) {
            return Ok(None);
        }

        let bits = match start[4] {
            1 => Bitness::Bits32,
            2 => Bitness::Bits64,
            _ => return Ok(None),
        };
        let endian = match start[5] {
            1 => Endian::Little,
            2 => Endian::Big,
            _ => return Ok(None),
        };
        // EI_VERSION and e_version are both EV_CURRENT
        if start[6] != 1 || read_u32(start, 20, endian)? != 1 {
            return Ok(None);
        }
        Ok(Some(elf(bits, endian)))
    }
}

const MH_MAGIC: u32 = 0xFEED_FACE;
const MH_CIGAM: u32 = 0xCEFA_EDFE;
const MH_MAGIC_64: u32 = 0xFEED_FACF;
const MH_CIGAM_64: u32 = 0xCFFA_EDFE;

/// Thin Mach-O image.
pub struct MachOScanner;

impl Scanner for MachOScanner {
    fn name(&self) -> &'static str {
        "mach-o"
    }

    fn detect(&self, job: &mut ScanJob<'_>) -> Result<Option<FileFormat>> {
        let start = job.start_bytes();
        if start.len() < MIN_IMAGE_WINDOW {
            return Ok(None);
        }
        // Magic read big-endian, so the swapped forms mean a little-endian image
        let format = match read_u32(start, 0, Endian::Big)? {
            MH_MAGIC => mach_o(Bitness::Bits32, Endian::Big),
            MH_CIGAM => mach_o(Bitness::Bits32, Endian::Little),
            MH_MAGIC_64 => mach_o(Bitness::Bits64, Endian::Big),
            MH_CIGAM_64 => mach_o(Bitness::Bits64, Endian::Little),
            _ => return Ok(None),
        };
        Ok(Some(format))
    }
}

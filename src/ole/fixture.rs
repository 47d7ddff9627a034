//! Minimal compound file generator for tests.
//!
//! Produces version 3 files (512-byte sectors) with one FAT sector. Streams
//! below the mini stream cutoff are packed into the root entry's mini stream
//! and chained through a MiniFAT; larger streams live in regular sectors.

use super::consts::*;

const SECTOR: usize = 512;
const MINI_SECTOR: usize = 64;
const FATSECT: u32 = 0xFFFFFFFD;
const MINI_STREAM_CUTOFF: usize = 4096;

struct Item {
    name: String,
    entry_type: u8,
    /// Index of the enclosing storage, `None` for the root
    parent: Option<usize>,
    data: Vec<u8>,
}

#[derive(Clone, Copy)]
enum Placement {
    Unallocated,
    Mini(u32),
    Regular(u32),
}

/// Compound file builder
#[derive(Default)]
pub struct CompoundBuilder {
    items: Vec<Item>,
}

impl CompoundBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a stream directly under the root storage
    pub fn stream(mut self, name: &str, data: Vec<u8>) -> Self {
        self.items.push(Item {
            name: name.to_string(),
            entry_type: STGTY_STREAM,
            parent: None,
            data,
        });
        self
    }

    /// Add a stream inside a storage added earlier
    pub fn stream_in(mut self, storage: &str, name: &str, data: Vec<u8>) -> Self {
        let parent = self
            .items
            .iter()
            .position(|item| item.entry_type == STGTY_STORAGE && item.name == storage);
        assert!(parent.is_some(), "storage {storage} must be added before its streams");
        self.items.push(Item {
            name: name.to_string(),
            entry_type: STGTY_STREAM,
            parent,
            data,
        });
        self
    }

    /// Add an empty storage directly under the root storage
    pub fn storage(mut self, name: &str) -> Self {
        self.items.push(Item {
            name: name.to_string(),
            entry_type: STGTY_STORAGE,
            parent: None,
            data: Vec::new(),
        });
        self
    }

    /// Generate the file image
    pub fn build(self) -> Vec<u8> {
        let count = self.items.len();
        let dir_sectors = (count + 1).div_ceil(SECTOR / DIRENTRY_SIZE);

        // Small streams go to the mini stream first
        let mut minifat: Vec<u32> = Vec::new();
        let mut ministream: Vec<u8> = Vec::new();
        let mut placed = vec![Placement::Unallocated; count];
        for (item, place) in self.items.iter().zip(placed.iter_mut()) {
            if item.entry_type != STGTY_STREAM || item.data.is_empty() || item.data.len() >= MINI_STREAM_CUTOFF {
                continue;
            }
            let start = minifat.len();
            let sectors = item.data.len().div_ceil(MINI_SECTOR);
            minifat.resize(start + sectors, FREESECT);
            chain(&mut minifat, start, sectors);
            ministream.extend_from_slice(&item.data);
            ministream.resize((start + sectors) * MINI_SECTOR, 0);
            *place = Placement::Mini(start as u32);
        }

        // Regular sectors: FAT, directory, MiniFAT, mini stream, large streams
        let minifat_sectors = (minifat.len() * 4).div_ceil(SECTOR);
        let ministream_sectors = ministream.len().div_ceil(SECTOR);
        let minifat_start = 1 + dir_sectors;
        let ministream_start = minifat_start + minifat_sectors;
        let mut next_sector = ministream_start + ministream_sectors;
        for (item, place) in self.items.iter().zip(placed.iter_mut()) {
            if item.entry_type == STGTY_STREAM && item.data.len() >= MINI_STREAM_CUTOFF {
                *place = Placement::Regular(next_sector as u32);
                next_sector += item.data.len().div_ceil(SECTOR);
            }
        }
        let total_sectors = next_sector;
        assert!(total_sectors <= SECTOR / 4, "fixture needs a single FAT sector");

        let mut out = vec![0u8; SECTOR * (1 + total_sectors)];
        let minifat_location = (minifat_sectors > 0).then_some(minifat_start as u32);
        write_header(&mut out[..SECTOR], minifat_location, minifat_sectors as u32);

        let mut fat = vec![FREESECT; SECTOR / 4];
        fat[0] = FATSECT;
        chain(&mut fat, 1, dir_sectors);
        chain(&mut fat, minifat_start, minifat_sectors);
        chain(&mut fat, ministream_start, ministream_sectors);
        for (item, place) in self.items.iter().zip(&placed) {
            if let Placement::Regular(start) = place {
                chain(&mut fat, *start as usize, item.data.len().div_ceil(SECTOR));
            }
        }
        for (i, entry) in fat.iter().enumerate() {
            put_u32(&mut out, SECTOR + i * 4, *entry);
        }

        minifat.resize(minifat_sectors * SECTOR / 4, FREESECT);
        let minifat_offset = SECTOR * (minifat_start + 1);
        for (i, entry) in minifat.iter().enumerate() {
            put_u32(&mut out, minifat_offset + i * 4, *entry);
        }
        let ministream_offset = SECTOR * (ministream_start + 1);
        out[ministream_offset..ministream_offset + ministream.len()].copy_from_slice(&ministream);

        // Siblings of one storage are chained through their right links
        let mut right = vec![NOSTREAM; count + 1];
        let mut child = vec![NOSTREAM; count + 1];
        for parent in std::iter::once(None).chain((0..count).map(Some)) {
            let sids: Vec<usize> = (0..count)
                .filter(|&i| self.items[i].parent == parent)
                .map(|i| i + 1)
                .collect();
            if let Some(&first) = sids.first() {
                child[parent.map_or(0, |p| p + 1)] = first as u32;
            }
            for pair in sids.windows(2) {
                right[pair[0]] = pair[1] as u32;
            }
        }

        let dir_offset = SECTOR * 2;
        let (root_start, root_size) = if ministream.is_empty() {
            (ENDOFCHAIN, 0)
        } else {
            (ministream_start as u32, ministream.len() as u64)
        };
        write_entry(&mut out[dir_offset..], "Root Entry", STGTY_ROOT, NOSTREAM, child[0], root_start, root_size);
        for (i, (item, place)) in self.items.iter().zip(&placed).enumerate() {
            let sid = i + 1;
            let start = match place {
                Placement::Unallocated => ENDOFCHAIN,
                Placement::Mini(start) | Placement::Regular(start) => *start,
            };
            let offset = dir_offset + sid * DIRENTRY_SIZE;
            let size = item.data.len() as u64;
            write_entry(&mut out[offset..], &item.name, item.entry_type, right[sid], child[sid], start, size);
        }
        // Unused trailing slots stay empty but keep NOSTREAM links
        for sid in count + 1..dir_sectors * (SECTOR / DIRENTRY_SIZE) {
            let offset = dir_offset + sid * DIRENTRY_SIZE;
            put_u32(&mut out, offset + 0x44, NOSTREAM);
            put_u32(&mut out, offset + 0x48, NOSTREAM);
            put_u32(&mut out, offset + 0x4C, NOSTREAM);
        }

        for (item, place) in self.items.iter().zip(&placed) {
            if let Placement::Regular(start) = place {
                let offset = SECTOR * (*start as usize + 1);
                out[offset..offset + item.data.len()].copy_from_slice(&item.data);
            }
        }

        out
    }
}

/// Byte offset of MiniFAT entry `index` in a built file.
pub fn minifat_entry_offset(data: &[u8], index: usize) -> usize {
    let first = u32::from_le_bytes([data[0x3C], data[0x3D], data[0x3E], data[0x3F]]) as usize;
    SECTOR * (first + 1) + index * 4
}

fn chain(table: &mut [u32], start: usize, count: usize) {
    for i in 0..count {
        table[start + i] = if i + 1 == count {
            ENDOFCHAIN
        } else {
            (start + i + 1) as u32
        };
    }
}

fn put_u16(out: &mut [u8], offset: usize, value: u16) {
    out[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

fn put_u32(out: &mut [u8], offset: usize, value: u32) {
    out[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

fn write_header(out: &mut [u8], minifat_start: Option<u32>, minifat_sectors: u32) {
    out[0..8].copy_from_slice(MAGIC);
    put_u16(out, 0x18, 0x003E);
    put_u16(out, 0x1A, 3);
    put_u16(out, 0x1C, BYTE_ORDER_LE);
    put_u16(out, 0x1E, SECTOR_SHIFT_V3);
    put_u16(out, 0x20, 6);
    put_u32(out, 0x2C, 1);
    put_u32(out, 0x30, 1);
    put_u32(out, 0x38, MINI_STREAM_CUTOFF as u32);
    put_u32(out, 0x3C, minifat_start.unwrap_or(ENDOFCHAIN));
    put_u32(out, 0x40, minifat_sectors);
    put_u32(out, 0x44, ENDOFCHAIN);
    put_u32(out, 0x48, 0);
    put_u32(out, 0x4C, 0);
    for i in 1..HEADER_DIFAT_ENTRIES {
        put_u32(out, 0x4C + i * 4, FREESECT);
    }
}

fn write_entry(out: &mut [u8], name: &str, entry_type: u8, right: u32, child: u32, start: u32, size: u64) {
    let units: Vec<u16> = name.encode_utf16().take(31).collect();
    for (i, unit) in units.iter().enumerate() {
        put_u16(out, i * 2, *unit);
    }
    put_u16(out, 0x40, ((units.len() + 1) * 2) as u16);
    out[0x42] = entry_type;
    out[0x43] = 1;
    put_u32(out, 0x44, NOSTREAM);
    put_u32(out, 0x48, right);
    put_u32(out, 0x4C, child);
    put_u32(out, 0x74, start);
    out[0x78..0x80].copy_from_slice(&size.to_le_bytes());
}

use super::consts::*;
use crate::common::binary::read_struct;
use crate::common::error::{Error, Result};
use fixedbitset::FixedBitSet;
use std::io::{Read, Seek, SeekFrom};
use tracing::trace;
use zerocopy::{FromBytes, LE, U16, U32, U64};
use zerocopy_derive::FromBytes as DeriveFromBytes;

/// Fixed 512-byte compound file header.
#[allow(dead_code)]
#[derive(Debug, Clone, DeriveFromBytes)]
#[repr(C)]
struct RawHeader {
    signature: [u8; 8],
    clsid: [u8; 16],
    minor_version: U16<LE>,
    major_version: U16<LE>,
    byte_order: U16<LE>,
    sector_shift: U16<LE>,
    mini_sector_shift: U16<LE>,
    reserved: [u8; 6],
    num_dir_sectors: U32<LE>,
    num_fat_sectors: U32<LE>,
    first_dir_sector: U32<LE>,
    transaction_signature: U32<LE>,
    mini_stream_cutoff: U32<LE>,
    first_minifat_sector: U32<LE>,
    num_minifat_sectors: U32<LE>,
    first_difat_sector: U32<LE>,
    num_difat_sectors: U32<LE>,
    difat: [U32<LE>; HEADER_DIFAT_ENTRIES],
}

/// On-disk directory entry (128 bytes).
#[allow(dead_code)]
#[derive(Debug, Clone, DeriveFromBytes)]
#[repr(C)]
struct RawDirectoryEntry {
    /// Entry name in UTF-16LE (64 bytes, null-padded)
    name: [u8; 64],
    /// Length of name in bytes (including null terminator)
    name_len: U16<LE>,
    entry_type: u8,
    node_color: u8,
    sid_left: U32<LE>,
    sid_right: U32<LE>,
    sid_child: U32<LE>,
    clsid: [u8; 16],
    state_bits: U32<LE>,
    creation_time: U64<LE>,
    modified_time: U64<LE>,
    start_sector: U32<LE>,
    stream_size: U64<LE>,
}

/// Kind of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Empty,
    Storage,
    Stream,
    Root,
    /// Lock bytes, property and unknown object types
    Other(u8),
}

impl From<u8> for EntryKind {
    fn from(value: u8) -> Self {
        match value {
            STGTY_EMPTY => EntryKind::Empty,
            STGTY_STORAGE => EntryKind::Storage,
            STGTY_STREAM => EntryKind::Stream,
            STGTY_ROOT => EntryKind::Root,
            other => EntryKind::Other(other),
        }
    }
}

/// A storage or stream reachable from the root storage.
#[derive(Debug, Clone)]
pub struct DirectoryEntry {
    /// Index in the directory stream
    pub sid: u32,
    /// Entry name (UTF-16 decoded)
    pub name: String,
    /// Storage names leading to this entry, followed by its own name
    pub path: Vec<String>,
    pub kind: EntryKind,
    /// First sector of the stream
    pub start_sector: u32,
    /// Size of the stream in bytes
    pub size: u64,
}

/// Read-only view of an OLE2 compound file.
///
/// Opening parses the header, the FAT, the MiniFAT and the whole directory
/// tree. Stream contents are only read on request. A damaged allocation
/// table or directory tree (cycles, out-of-range indexes) is reported as
/// [`Error::CorruptedFile`], never as a hang.
#[derive(Debug)]
pub struct OleFile<R: Read + Seek> {
    reader: R,
    file_size: u64,
    sector_size: usize,
    mini_sector_size: usize,
    mini_stream_cutoff: u32,
    fat: Vec<u32>,
    minifat: Vec<u32>,
    /// Root storage (sid 0)
    root: RawEntryLinks,
    /// Entries reachable from the root, in depth-first order
    entries: Vec<DirectoryEntry>,
    /// Mini stream data (loaded on demand)
    ministream: Option<Vec<u8>>,
}

/// Tree links and stream location of one parsed directory slot.
#[derive(Debug, Clone)]
struct RawEntryLinks {
    name: String,
    kind: EntryKind,
    left: u32,
    right: u32,
    child: u32,
    start_sector: u32,
    size: u64,
}

impl<R: Read + Seek> OleFile<R> {
    /// Open and parse a compound file from a reader.
    ///
    /// # Errors
    ///
    /// [`Error::NotCompoundFile`] when the signature or the size is wrong,
    /// [`Error::CorruptedFile`] for inconsistent structures and
    /// [`Error::Io`] when the reader fails.
    pub fn open(mut reader: R) -> Result<Self> {
        let file_size = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;

        if file_size < MINIMAL_OLEFILE_SIZE as u64 {
            return Err(Error::NotCompoundFile);
        }

        let mut header_bytes = [0u8; HEADER_SIZE];
        reader.read_exact(&mut header_bytes)?;
        let header: RawHeader = read_struct(&header_bytes, 0)?;

        if &header.signature != MAGIC {
            return Err(Error::NotCompoundFile);
        }
        if header.byte_order.get() != BYTE_ORDER_LE {
            return Err(Error::CorruptedFile("Invalid byte order".to_string()));
        }

        let sector_shift = header.sector_shift.get();
        let expected_shift = match header.major_version.get() {
            3 => SECTOR_SHIFT_V3,
            4 => SECTOR_SHIFT_V4,
            v => return Err(Error::CorruptedFile(format!("Unsupported major version {v}"))),
        };
        if sector_shift != expected_shift {
            return Err(Error::CorruptedFile("Sector size mismatch".to_string()));
        }
        let mini_sector_shift = header.mini_sector_shift.get();
        if mini_sector_shift >= sector_shift {
            return Err(Error::CorruptedFile("Mini sector size too large".to_string()));
        }

        let mut ole = OleFile {
            reader,
            file_size,
            sector_size: 1usize << sector_shift,
            mini_sector_size: 1usize << mini_sector_shift,
            mini_stream_cutoff: header.mini_stream_cutoff.get(),
            fat: Vec::new(),
            minifat: Vec::new(),
            root: RawEntryLinks::empty(),
            entries: Vec::new(),
            ministream: None,
        };

        ole.load_fat(&header)?;
        ole.load_directory(header.first_dir_sector.get())?;
        if header.num_minifat_sectors.get() > 0 {
            ole.load_minifat(header.first_minifat_sector.get())?;
        }

        Ok(ole)
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Number of sectors the file can hold after the header.
    fn sector_count(&self) -> u64 {
        (self.file_size / self.sector_size as u64).saturating_sub(1)
    }

    /// Load the File Allocation Table.
    ///
    /// The first 109 FAT sector locations live in the header; the rest are
    /// chained through DIFAT sectors, each ending with the next DIFAT location.
    fn load_fat(&mut self, header: &RawHeader) -> Result<()> {
        let mut fat_sectors: Vec<u32> = header
            .difat
            .iter()
            .map(|s| s.get())
            .take_while(|&s| s <= MAXREGSECT)
            .collect();

        let mut difat_sector = header.first_difat_sector.get();
        let entries_per_sector = self.sector_size / 4 - 1;
        let mut seen = FixedBitSet::with_capacity(self.sector_count() as usize);
        for _ in 0..header.num_difat_sectors.get() {
            if difat_sector > MAXREGSECT {
                break;
            }
            self.mark_visited(&mut seen, difat_sector, "DIFAT")?;
            let sector_data = self.read_sector(difat_sector)?;
            let words: Vec<u32> = sector_data
                .chunks_exact(4)
                .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect();
            fat_sectors.extend(
                words[..entries_per_sector]
                    .iter()
                    .copied()
                    .take_while(|&s| s <= MAXREGSECT),
            );
            difat_sector = words[entries_per_sector];
        }

        if fat_sectors.len() as u64 > self.sector_count() {
            return Err(Error::CorruptedFile("More FAT sectors than the file holds".to_string()));
        }

        self.fat.reserve(fat_sectors.len() * (self.sector_size / 4));
        for sector_id in fat_sectors {
            let sector_data = self.read_sector(sector_id)?;
            self.fat.extend(
                sector_data
                    .chunks_exact(4)
                    .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]])),
            );
        }

        Ok(())
    }

    /// Load the MiniFAT, stored as a regular FAT chain.
    fn load_minifat(&mut self, first_minifat_sector: u32) -> Result<()> {
        let minifat_data = self.read_stream_from_fat(first_minifat_sector)?;
        self.minifat = minifat_data
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok(())
    }

    /// Parse every directory slot, then walk the tree from the root.
    fn load_directory(&mut self, first_dir_sector: u32) -> Result<()> {
        let dir_data = self.read_stream_from_fat(first_dir_sector)?;
        let slots: Vec<RawEntryLinks> = dir_data
            .chunks_exact(DIRENTRY_SIZE)
            .map(RawEntryLinks::parse)
            .collect::<Result<_>>()?;

        let Some(root) = slots.first() else {
            return Err(Error::CorruptedFile("Empty directory".to_string()));
        };
        if root.kind != EntryKind::Root {
            return Err(Error::CorruptedFile("First entry is not the root".to_string()));
        }
        self.root = root.clone();

        // Iterative depth-first walk; every slot may be visited once
        let mut visited = FixedBitSet::with_capacity(slots.len());
        visited.insert(0);
        let mut stack: Vec<(u32, Vec<String>)> = vec![(self.root.child, Vec::new())];
        while let Some((sid, parent)) = stack.pop() {
            if sid == NOSTREAM {
                continue;
            }
            let index = sid as usize;
            let Some(slot) = slots.get(index) else {
                return Err(Error::CorruptedFile(format!("Directory entry {sid} out of range")));
            };
            if visited.put(index) {
                return Err(Error::CorruptedFile(format!("Directory entry {sid} referenced twice")));
            }

            let mut path = parent.clone();
            path.push(slot.name.clone());

            stack.push((slot.right, parent.clone()));
            if slot.kind == EntryKind::Storage {
                stack.push((slot.child, path.clone()));
            }
            stack.push((slot.left, parent));

            self.entries.push(DirectoryEntry {
                sid,
                name: slot.name.clone(),
                path,
                kind: slot.kind,
                start_sector: slot.start_sector,
                size: slot.size,
            });
        }

        trace!(entries = self.entries.len(), "Loaded compound file directory");
        Ok(())
    }

    /// Record a sector as visited, failing on a repeat.
    fn mark_visited(&self, seen: &mut FixedBitSet, sector: u32, table: &str) -> Result<()> {
        let index = sector as usize;
        if index >= seen.len() {
            return Err(Error::CorruptedFile(format!("{table} sector {sector} out of range")));
        }
        if seen.put(index) {
            return Err(Error::CorruptedFile(format!("{table} chain loops at {sector}")));
        }
        Ok(())
    }

    /// Read a single sector from the file.
    fn read_sector(&mut self, sector_id: u32) -> Result<Vec<u8>> {
        // Sector N starts right after the header: (N + 1) * sector_size
        let position = (sector_id as u64 + 1) * self.sector_size as u64;
        if position + self.sector_size as u64 > self.file_size {
            return Err(Error::CorruptedFile(format!("Sector {sector_id} past end of file")));
        }
        self.reader.seek(SeekFrom::Start(position))?;

        let mut buffer = vec![0u8; self.sector_size];
        self.reader.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    /// Read a stream by following its FAT chain.
    fn read_stream_from_fat(&mut self, start_sector: u32) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        let mut seen = FixedBitSet::with_capacity(self.fat.len());
        let mut sector = start_sector;

        while sector != ENDOFCHAIN {
            if sector as usize >= self.fat.len() {
                return Err(Error::CorruptedFile("Invalid sector index in FAT".to_string()));
            }
            self.mark_visited(&mut seen, sector, "FAT")?;
            data.extend_from_slice(&self.read_sector(sector)?);
            sector = self.fat[sector as usize];
        }

        Ok(data)
    }

    /// Read a stream by following its MiniFAT chain inside the mini stream.
    fn read_stream_from_minifat(&mut self, start_sector: u32, size: u64) -> Result<Vec<u8>> {
        let ministream = match self.ministream.take() {
            Some(loaded) => loaded,
            None => {
                let mut loaded = self.read_stream_from_fat(self.root.start_sector)?;
                loaded.truncate(self.root.size.min(loaded.len() as u64) as usize);
                loaded
            },
        };

        let result = self.collect_mini_sectors(&ministream, start_sector, size);
        self.ministream = Some(ministream);
        result
    }

    fn collect_mini_sectors(&self, ministream: &[u8], start_sector: u32, size: u64) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        let mut seen = FixedBitSet::with_capacity(self.minifat.len());
        let mut sector = start_sector;

        while sector != ENDOFCHAIN && (data.len() as u64) < size {
            let index = sector as usize;
            if index >= self.minifat.len() {
                return Err(Error::CorruptedFile("Invalid sector index in MiniFAT".to_string()));
            }
            if seen.put(index) {
                return Err(Error::CorruptedFile(format!("MiniFAT chain loops at {sector}")));
            }

            let position = index * self.mini_sector_size;
            let Some(chunk) = ministream.get(position..position + self.mini_sector_size) else {
                return Err(Error::CorruptedFile("Mini sector out of bounds".to_string()));
            };
            data.extend_from_slice(chunk);
            sector = self.minifat[index];
        }

        data.truncate(size as usize);
        Ok(data)
    }

    /// Every storage and stream reachable from the root, depth first.
    pub fn entries(&self) -> &[DirectoryEntry] {
        &self.entries
    }

    /// Names of every reachable storage and stream.
    pub fn entry_names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name.clone()).collect()
    }

    /// Paths of every stream.
    pub fn list_streams(&self) -> Vec<Vec<String>> {
        self.entries
            .iter()
            .filter(|e| e.kind == EntryKind::Stream)
            .map(|e| e.path.clone())
            .collect()
    }

    /// Root storage name.
    pub fn root_name(&self) -> &str {
        &self.root.name
    }

    /// Find an entry by path. Names compare case-insensitively.
    fn find_entry(&self, path: &[&str]) -> Option<&DirectoryEntry> {
        self.entries.iter().find(|e| {
            e.path.len() == path.len()
                && e.path
                    .iter()
                    .zip(path)
                    .all(|(have, want)| have.to_lowercase() == want.to_lowercase())
        })
    }

    /// Check if an entry exists at the given path.
    pub fn exists(&self, path: &[&str]) -> bool {
        self.find_entry(path).is_some()
    }

    /// Read a stream by path.
    ///
    /// # Errors
    ///
    /// [`Error::StreamNotFound`] when nothing exists at the path or the entry
    /// is a storage.
    pub fn open_stream(&mut self, path: &[&str]) -> Result<Vec<u8>> {
        let entry = self
            .find_entry(path)
            .filter(|e| e.kind == EntryKind::Stream)
            .ok_or(Error::StreamNotFound)?;
        let (start_sector, size) = (entry.start_sector, entry.size);

        if size < self.mini_stream_cutoff as u64 {
            self.read_stream_from_minifat(start_sector, size)
        } else {
            let mut data = self.read_stream_from_fat(start_sector)?;
            data.truncate(size.min(data.len() as u64) as usize);
            Ok(data)
        }
    }
}

impl RawEntryLinks {
    fn empty() -> Self {
        RawEntryLinks {
            name: String::new(),
            kind: EntryKind::Empty,
            left: NOSTREAM,
            right: NOSTREAM,
            child: NOSTREAM,
            start_sector: ENDOFCHAIN,
            size: 0,
        }
    }

    fn parse(data: &[u8]) -> Result<Self> {
        let raw = RawDirectoryEntry::read_from_bytes(data)
            .map_err(|_| Error::CorruptedFile("Failed to parse directory entry".to_string()))?;

        // name_len counts the terminating NUL
        let name_len = (raw.name_len.get() as usize).saturating_sub(2).min(64);
        let units: Vec<u16> = raw.name[..name_len]
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        let name = String::from_utf16_lossy(&units).trim_end_matches('\0').to_string();

        Ok(RawEntryLinks {
            name,
            kind: EntryKind::from(raw.entry_type),
            left: raw.sid_left.get(),
            right: raw.sid_right.get(),
            child: raw.sid_child.get(),
            start_sector: raw.start_sector.get(),
            size: raw.stream_size.get(),
        })
    }
}

/// Check the compound file signature and minimum size.
pub fn is_compound_file(data: &[u8]) -> bool {
    data.len() >= MINIMAL_OLEFILE_SIZE && data.starts_with(MAGIC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ole::fixture::{self, CompoundBuilder};
    use std::io::Cursor;

    fn sample() -> Vec<u8> {
        CompoundBuilder::new()
            .stream("WordDocument", b"word body".to_vec())
            .storage("ObjectPool")
            .stream("\u{1}CompObj", vec![0x01, 0xFE])
            .build()
    }

    #[test]
    fn test_open_lists_entries() {
        let ole = OleFile::open(Cursor::new(sample())).expect("fixture opens");
        let names = ole.entry_names();
        assert_eq!(names.len(), 3);
        assert!(names.iter().any(|n| n == "WordDocument"));
        assert!(names.iter().any(|n| n == "ObjectPool"));
        assert!(names.iter().any(|n| n == "\u{1}CompObj"));
        assert_eq!(ole.root_name(), "Root Entry");
        assert_eq!(ole.list_streams().len(), 2);
    }

    #[test]
    fn test_open_stream_round_trip() {
        let mut ole = OleFile::open(Cursor::new(sample())).expect("fixture opens");
        let body = ole.open_stream(&["worddocument"]).expect("stream reads");
        assert_eq!(&body[..9], b"word body");
        assert!(ole.exists(&["ObjectPool"]));
        assert!(matches!(ole.open_stream(&["ObjectPool"]), Err(Error::StreamNotFound)));
        assert!(matches!(ole.open_stream(&["Missing"]), Err(Error::StreamNotFound)));
    }

    #[test]
    fn test_rejects_non_compound_data() {
        let mut data = sample();
        data[0] = 0;
        assert!(matches!(OleFile::open(Cursor::new(data)), Err(Error::NotCompoundFile)));
        assert!(matches!(OleFile::open(Cursor::new(vec![0u8; 100])), Err(Error::NotCompoundFile)));
    }

    #[test]
    fn test_fat_cycle_is_corruption() {
        let mut data = sample();
        // Directory sector 1 points back to itself
        data[512 + 4..512 + 8].copy_from_slice(&1u32.to_le_bytes());
        assert!(matches!(OleFile::open(Cursor::new(data)), Err(Error::CorruptedFile(_))));
    }

    #[test]
    fn test_directory_cycle_is_corruption() {
        let mut data = sample();
        // Right sibling of entry 3 loops back to entry 1
        let entry3 = 2 * 512 + 3 * DIRENTRY_SIZE;
        data[entry3 + 0x48..entry3 + 0x4C].copy_from_slice(&1u32.to_le_bytes());
        assert!(matches!(OleFile::open(Cursor::new(data)), Err(Error::CorruptedFile(_))));
    }

    fn pattern(len: usize, seed: u8) -> Vec<u8> {
        (0..len).map(|i| (i as u8).wrapping_mul(7).wrapping_add(seed)).collect()
    }

    #[test]
    fn test_small_stream_in_storage() {
        let vba = pattern(100, 3);
        let data = CompoundBuilder::new()
            .storage("Macros")
            .stream_in("Macros", "VBA", vba.clone())
            .stream("Tiny", b"abc".to_vec())
            .build();
        let mut ole = OleFile::open(Cursor::new(data)).expect("fixture opens");

        let streams = ole.list_streams();
        assert!(streams.contains(&vec!["Macros".to_string(), "VBA".to_string()]));
        assert!(!ole.exists(&["VBA"]));
        assert_eq!(ole.open_stream(&["macros", "vba"]).expect("mini stream reads"), vba);
        assert_eq!(ole.open_stream(&["Tiny"]).expect("mini stream reads"), b"abc");
        // Second read comes from the cached mini stream
        assert_eq!(ole.open_stream(&["Macros", "VBA"]).expect("mini stream reads"), vba);
    }

    #[test]
    fn test_large_and_small_streams_together() {
        let big = pattern(9000, 11);
        let small = pattern(700, 5);
        let data = CompoundBuilder::new()
            .stream("Small", small.clone())
            .stream("Big", big.clone())
            .stream("Empty", Vec::new())
            .build();
        let mut ole = OleFile::open(Cursor::new(data)).expect("fixture opens");

        let big_entry = ole.entries().iter().find(|e| e.name == "Big").expect("entry listed");
        assert_eq!(big_entry.size, 9000);
        assert_eq!(ole.open_stream(&["Big"]).expect("regular stream reads"), big);
        assert_eq!(ole.open_stream(&["Small"]).expect("mini stream reads"), small);
        assert!(ole.open_stream(&["Empty"]).expect("empty stream reads").is_empty());
    }

    #[test]
    fn test_minifat_cycle_is_corruption() {
        let mut data = CompoundBuilder::new().stream("Small", pattern(200, 1)).build();
        // Mini sector 1 points back to mini sector 0 before the stream is complete
        let offset = fixture::minifat_entry_offset(&data, 1);
        data[offset..offset + 4].copy_from_slice(&0u32.to_le_bytes());

        let mut ole = OleFile::open(Cursor::new(data)).expect("header and directory still parse");
        assert!(matches!(ole.open_stream(&["Small"]), Err(Error::CorruptedFile(_))));
    }

    #[test]
    fn test_minifat_index_out_of_range_is_corruption() {
        let mut data = CompoundBuilder::new().stream("Small", pattern(200, 1)).build();
        let offset = fixture::minifat_entry_offset(&data, 0);
        data[offset..offset + 4].copy_from_slice(&1000u32.to_le_bytes());

        let mut ole = OleFile::open(Cursor::new(data)).expect("header and directory still parse");
        assert!(matches!(ole.open_stream(&["Small"]), Err(Error::CorruptedFile(_))));
    }

    #[test]
    fn test_is_compound_file() {
        assert!(is_compound_file(&sample()));
        assert!(!is_compound_file(MAGIC));
    }
}

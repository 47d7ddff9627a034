//! Byte and structure decode utilities shared by every scanner.
//!
//! This module provides wildcard pattern matching over byte windows,
//! fixed-width integer decoding in either byte order from a buffer or a
//! reader, fixed-layout record decoding through `zerocopy`, and the small
//! bit helpers that formats use to split version and size fields.
//!
//! Out-of-range reads from a buffer are reported as
//! [`Error::InsufficientData`]. Pattern matching never fails on short input;
//! it only fails when the caller hands it a pattern that cannot fit.

use std::io::Read;

use serde::{Deserialize, Serialize};
use zerocopy::{FromBytes, I16, I32, I64, LE, U16, U32, U64};

use crate::common::error::{Error, Result};

/// Byte order of a multi-byte field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Endian {
    /// Least significant byte first
    #[default]
    Little,
    /// Most significant byte first
    Big,
}

/// Copy `N` bytes at `offset` into a scratch buffer, reversed for big-endian.
#[inline]
fn scratch<const N: usize>(data: &[u8], offset: usize, endian: Endian) -> Result<[u8; N]> {
    let end = offset.checked_add(N).ok_or(Error::InsufficientData {
        expected: usize::MAX,
        available: data.len(),
    })?;
    if end > data.len() {
        return Err(Error::InsufficientData {
            expected: end,
            available: data.len(),
        });
    }
    let mut buf = [0u8; N];
    buf.copy_from_slice(&data[offset..end]);
    if endian == Endian::Big {
        buf.reverse();
    }
    Ok(buf)
}

/// Read exactly `N` bytes from a reader into a scratch buffer, reversed for big-endian.
#[inline]
fn scratch_from<const N: usize, R: Read + ?Sized>(reader: &mut R, endian: Endian) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf)?;
    if endian == Endian::Big {
        buf.reverse();
    }
    Ok(buf)
}

/// Read one byte at the given offset.
#[inline]
pub fn read_u8(data: &[u8], offset: usize) -> Result<u8> {
    data.get(offset).copied().ok_or(Error::InsufficientData {
        expected: offset.saturating_add(1),
        available: data.len(),
    })
}

/// Read an unsigned 16-bit integer at the given offset.
///
/// # Examples
///
/// ```
/// use filesniff::common::binary::{read_u16, Endian};
/// let data = [0x34, 0x12];
/// assert_eq!(read_u16(&data, 0, Endian::Little).unwrap(), 0x1234);
/// assert_eq!(read_u16(&data, 0, Endian::Big).unwrap(), 0x3412);
/// ```
#[inline]
pub fn read_u16(data: &[u8], offset: usize, endian: Endian) -> Result<u16> {
    Ok(U16::<LE>::from_bytes(scratch(data, offset, endian)?).get())
}

/// Read a signed 16-bit integer at the given offset.
#[inline]
pub fn read_i16(data: &[u8], offset: usize, endian: Endian) -> Result<i16> {
    Ok(I16::<LE>::from_bytes(scratch(data, offset, endian)?).get())
}

/// Read an unsigned 32-bit integer at the given offset.
///
/// # Examples
///
/// ```
/// use filesniff::common::binary::{read_u32, Endian};
/// let data = [0x00, 0x00, 0x01, 0x00];
/// assert_eq!(read_u32(&data, 0, Endian::Big).unwrap(), 256);
/// assert_eq!(read_u32(&data, 0, Endian::Little).unwrap(), 65536);
/// ```
#[inline]
pub fn read_u32(data: &[u8], offset: usize, endian: Endian) -> Result<u32> {
    Ok(U32::<LE>::from_bytes(scratch(data, offset, endian)?).get())
}

/// Read a signed 32-bit integer at the given offset.
#[inline]
pub fn read_i32(data: &[u8], offset: usize, endian: Endian) -> Result<i32> {
    Ok(I32::<LE>::from_bytes(scratch(data, offset, endian)?).get())
}

/// Read an unsigned 64-bit integer at the given offset.
#[inline]
pub fn read_u64(data: &[u8], offset: usize, endian: Endian) -> Result<u64> {
    Ok(U64::<LE>::from_bytes(scratch(data, offset, endian)?).get())
}

/// Read a signed 64-bit integer at the given offset.
#[inline]
pub fn read_i64(data: &[u8], offset: usize, endian: Endian) -> Result<i64> {
    Ok(I64::<LE>::from_bytes(scratch(data, offset, endian)?).get())
}

/// Read one byte from a reader.
pub fn read_u8_from<R: Read + ?Sized>(reader: &mut R) -> Result<u8> {
    let buf: [u8; 1] = scratch_from(reader, Endian::Little)?;
    Ok(buf[0])
}

/// Read an unsigned 16-bit integer from a reader.
pub fn read_u16_from<R: Read + ?Sized>(reader: &mut R, endian: Endian) -> Result<u16> {
    Ok(U16::<LE>::from_bytes(scratch_from(reader, endian)?).get())
}

/// Read a signed 16-bit integer from a reader.
pub fn read_i16_from<R: Read + ?Sized>(reader: &mut R, endian: Endian) -> Result<i16> {
    Ok(I16::<LE>::from_bytes(scratch_from(reader, endian)?).get())
}

/// Read an unsigned 32-bit integer from a reader.
pub fn read_u32_from<R: Read + ?Sized>(reader: &mut R, endian: Endian) -> Result<u32> {
    Ok(U32::<LE>::from_bytes(scratch_from(reader, endian)?).get())
}

/// Read a signed 32-bit integer from a reader.
pub fn read_i32_from<R: Read + ?Sized>(reader: &mut R, endian: Endian) -> Result<i32> {
    Ok(I32::<LE>::from_bytes(scratch_from(reader, endian)?).get())
}

/// Read an unsigned 64-bit integer from a reader.
pub fn read_u64_from<R: Read + ?Sized>(reader: &mut R, endian: Endian) -> Result<u64> {
    Ok(U64::<LE>::from_bytes(scratch_from(reader, endian)?).get())
}

/// Read a signed 64-bit integer from a reader.
pub fn read_i64_from<R: Read + ?Sized>(reader: &mut R, endian: Endian) -> Result<i64> {
    Ok(I64::<LE>::from_bytes(scratch_from(reader, endian)?).get())
}

/// Decode a fixed-layout record at the given offset.
///
/// `T` is a `#[repr(C)]` struct of explicitly sized fields with no padding,
/// typically built from `zerocopy` byte-order wrappers so each field carries
/// its own endianness.
pub fn read_struct<T: FromBytes>(data: &[u8], offset: usize) -> Result<T> {
    let size = std::mem::size_of::<T>();
    let end = offset.saturating_add(size);
    if end > data.len() {
        return Err(Error::InsufficientData {
            expected: end,
            available: data.len(),
        });
    }
    T::read_from_bytes(&data[offset..end]).map_err(|_| Error::InsufficientData {
        expected: size,
        available: data.len() - offset,
    })
}

/// Decode a fixed-layout record from a reader.
///
/// When the reader ends early the result is an error, unless `allow_shorter`
/// is set, in which case a zeroed record is returned.
pub fn read_struct_from<T: FromBytes, R: Read + ?Sized>(reader: &mut R, allow_shorter: bool) -> Result<T> {
    let size = std::mem::size_of::<T>();
    let buf = read_bytes_from(reader, size)?;
    if buf.len() < size {
        if allow_shorter {
            return Ok(T::new_zeroed());
        }
        return Err(Error::InsufficientData {
            expected: size,
            available: buf.len(),
        });
    }
    read_struct(&buf, 0)
}

/// Copy up to `size` bytes starting at `offset`, truncated at the end of the buffer.
pub fn read_bytes(data: &[u8], offset: usize, size: usize) -> Vec<u8> {
    if offset >= data.len() {
        return Vec::new();
    }
    let end = offset.saturating_add(size).min(data.len());
    data[offset..end].to_vec()
}

/// Read up to `size` bytes from a reader. The result is short only at end of input.
pub fn read_bytes_from<R: Read + ?Sized>(reader: &mut R, size: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(size.min(64 * 1024));
    (&mut *reader).take(size as u64).read_to_end(&mut buf)?;
    Ok(buf)
}

/// Reverse a byte slice in place.
#[inline]
pub fn swap(bytes: &mut [u8]) {
    bytes.reverse();
}

/// High byte of a 16-bit value.
#[inline]
pub const fn hi_byte(value: u16) -> u8 {
    (value >> 8) as u8
}

/// Low byte of a 16-bit value.
#[inline]
pub const fn lo_byte(value: u16) -> u8 {
    value as u8
}

/// High word of a 32-bit value.
#[inline]
pub const fn hi_word(value: u32) -> u16 {
    (value >> 16) as u16
}

/// Low word of a 32-bit value.
#[inline]
pub const fn lo_word(value: u32) -> u16 {
    value as u16
}

/// High double word of a 64-bit value.
#[inline]
pub const fn hi_dword(value: u64) -> u32 {
    (value >> 32) as u32
}

/// Low double word of a 64-bit value.
#[inline]
pub const fn lo_dword(value: u64) -> u32 {
    value as u32
}

/// Compose a 64-bit value from its high and low double words.
#[inline]
pub const fn make_u64(hi: u32, lo: u32) -> u64 {
    ((hi as u64) << 32) | lo as u64
}

/// Whether a buffer is absent or has no bytes.
#[inline]
pub fn is_null_or_empty(data: Option<&[u8]>) -> bool {
    data.is_none_or(|d| d.is_empty())
}

/// Match a wildcard byte pattern against `length` bytes of `input` at `offset`.
///
/// `None` elements of the pattern match any byte. Input bytes past the end of
/// the pattern but inside `length` are unconstrained. Input that is too short
/// for `offset + length` is simply not a match.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if the pattern is longer than `length`.
///
/// # Examples
///
/// ```
/// use filesniff::common::binary::match_bytes;
/// let pattern = [Some(0x50), None, Some(0x4B)];
/// assert!(match_bytes(&[0x50, 0x00, 0x4B, 0x03], 0, 3, &pattern).unwrap());
/// assert!(!match_bytes(&[0x50, 0x00, 0x4C, 0x03], 0, 3, &pattern).unwrap());
/// assert!(match_bytes(&[0x50, 0x00, 0x4B], 0, 2, &pattern).is_err());
/// ```
pub fn match_bytes(input: &[u8], offset: usize, length: usize, pattern: &[Option<u8>]) -> Result<bool> {
    if pattern.len() > length {
        return Err(Error::InvalidArgument(format!(
            "pattern of {} bytes does not fit a match length of {}",
            pattern.len(),
            length
        )));
    }
    let Some(window) = offset
        .checked_add(length)
        .and_then(|end| input.get(offset..end))
    else {
        return Ok(false);
    };
    Ok(window
        .iter()
        .zip(pattern)
        .all(|(byte, expected)| expected.is_none_or(|e| e == *byte)))
}

/// [`match_bytes`] over arguments that may be absent.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if either the input or the pattern is
/// absent, or if the pattern is longer than `length`.
pub fn match_bytes_opt(
    input: Option<&[u8]>,
    offset: usize,
    length: usize,
    pattern: Option<&[Option<u8>]>,
) -> Result<bool> {
    let input = input.ok_or_else(|| Error::InvalidArgument("input buffer is absent".to_string()))?;
    let pattern = pattern.ok_or_else(|| Error::InvalidArgument("pattern is absent".to_string()))?;
    match_bytes(input, offset, length, pattern)
}

/// Match a pattern at `offset`, using the pattern's own length.
#[inline]
pub fn match_at(input: &[u8], offset: usize, pattern: &[Option<u8>]) -> bool {
    // Length equals the pattern length so the only failure mode is a mismatch
    match_bytes(input, offset, pattern.len(), pattern).unwrap_or(false)
}

/// Match a pattern at the start of the input.
#[inline]
pub fn match_start(input: &[u8], pattern: &[Option<u8>]) -> bool {
    match_at(input, 0, pattern)
}

//! Property set stream decoding ([MS-OLEPS]).
//!
//! Only the first section of a property set is decoded, which is where the
//! summary information streams keep title, author and application name.

use super::consts::*;
use crate::common::binary::{Endian, read_i16, read_u16, read_u32, read_u64};
use crate::common::error::{Error, Result};
use encoding_rs::Encoding;
use std::collections::HashMap;

/// Decoded value of one property.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    I2(i16),
    I4(i32),
    UI2(u16),
    UI4(u32),
    I8(i64),
    UI8(u64),
    Bool(bool),
    Lpstr(String),
    Lpwstr(String),
    Filetime(u64),
    Clsid([u8; 16]),
    Empty,
}

impl PropertyValue {
    /// String content of an `LPSTR` or `LPWSTR` value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Lpstr(s) | PropertyValue::Lpwstr(s) => Some(s),
            _ => None,
        }
    }
}

/// Properties of the first section of a property set stream, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct PropertySet {
    properties: HashMap<u32, PropertyValue>,
}

impl PropertySet {
    /// Decode a property set stream.
    ///
    /// Properties whose value lies outside the stream or has an unsupported
    /// type are skipped. Only a malformed header is an error.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 48 {
            return Err(Error::InsufficientData {
                expected: 48,
                available: data.len(),
            });
        }
        if read_u16(data, 0, Endian::Little)? != 0xFFFE {
            return Err(Error::CorruptedFile("Property set byte order mark missing".to_string()));
        }

        // Header (28 bytes), then FMTID (16 bytes) and offset of section 0
        let section = read_u32(data, 44, Endian::Little)? as usize;
        let count = (read_u32(data, section.saturating_add(4), Endian::Little)? as usize).min(MAX_PROPERTIES);

        let mut slots = Vec::with_capacity(count);
        for i in 0..count {
            let entry = section + 8 + i * 8;
            let (Ok(id), Ok(relative)) = (
                read_u32(data, entry, Endian::Little),
                read_u32(data, entry + 4, Endian::Little),
            ) else {
                break;
            };
            slots.push((id, section.saturating_add(relative as usize)));
        }

        // The code page governs every LPSTR in the section
        let encoding = slots
            .iter()
            .find(|(id, _)| *id == PID_CODEPAGE)
            .and_then(|&(_, offset)| read_i16(data, offset + 4, Endian::Little).ok())
            .map(|cp| codepage_to_encoding(cp as u16))
            .unwrap_or(encoding_rs::WINDOWS_1252);

        let mut properties = HashMap::with_capacity(slots.len());
        for (id, offset) in slots {
            let Ok(vt) = read_u16(data, offset, Endian::Little) else {
                continue;
            };
            if let Ok(value) = parse_value(data, offset + 4, vt, encoding) {
                properties.insert(id, value);
            }
        }

        Ok(PropertySet { properties })
    }

    pub fn get(&self, id: u32) -> Option<&PropertyValue> {
        self.properties.get(&id)
    }

    /// String value of a property, NUL terminators trimmed.
    pub fn string(&self, id: u32) -> Option<&str> {
        self.get(id)
            .and_then(PropertyValue::as_str)
            .map(|s| s.trim_end_matches('\0'))
    }

    pub fn title(&self) -> Option<&str> {
        self.string(PIDSI_TITLE)
    }

    pub fn app_name(&self) -> Option<&str> {
        self.string(PIDSI_APPNAME)
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

fn parse_value(data: &[u8], offset: usize, vt: u16, encoding: &'static Encoding) -> Result<PropertyValue> {
    let value = match vt {
        VT_I2 => PropertyValue::I2(read_i16(data, offset, Endian::Little)?),
        VT_I4 => PropertyValue::I4(read_u32(data, offset, Endian::Little)? as i32),
        VT_UI2 => PropertyValue::UI2(read_u16(data, offset, Endian::Little)?),
        VT_UI4 => PropertyValue::UI4(read_u32(data, offset, Endian::Little)?),
        VT_I8 => PropertyValue::I8(read_u64(data, offset, Endian::Little)? as i64),
        VT_UI8 => PropertyValue::UI8(read_u64(data, offset, Endian::Little)?),
        VT_BOOL => PropertyValue::Bool(read_u16(data, offset, Endian::Little)? != 0),
        VT_FILETIME => PropertyValue::Filetime(read_u64(data, offset, Endian::Little)?),
        VT_LPSTR => {
            let bytes = counted_bytes(data, offset, 1)?;
            let (text, _, _) = encoding.decode(bytes);
            PropertyValue::Lpstr(text.trim_end_matches('\0').to_string())
        },
        VT_LPWSTR => {
            let bytes = counted_bytes(data, offset, 2)?;
            let (text, _) = encoding_rs::UTF_16LE.decode_without_bom_handling(bytes);
            PropertyValue::Lpwstr(text.trim_end_matches('\0').to_string())
        },
        VT_CLSID => {
            let bytes = data
                .get(offset..offset + 16)
                .ok_or(Error::InsufficientData {
                    expected: offset + 16,
                    available: data.len(),
                })?;
            let mut clsid = [0u8; 16];
            clsid.copy_from_slice(bytes);
            PropertyValue::Clsid(clsid)
        },
        VT_EMPTY | VT_NULL => PropertyValue::Empty,
        other => {
            return Err(Error::CorruptedFile(format!(
                "Unsupported property type {other:#06x}"
            )));
        },
    };
    Ok(value)
}

/// Bytes of a length-prefixed string whose count is in `unit`-byte characters.
fn counted_bytes(data: &[u8], offset: usize, unit: usize) -> Result<&[u8]> {
    let count = read_u32(data, offset, Endian::Little)? as usize;
    let start = offset + 4;
    let end = count
        .checked_mul(unit)
        .and_then(|len| start.checked_add(len))
        .filter(|&end| end <= data.len())
        .ok_or(Error::InsufficientData {
            expected: start.saturating_add(count.saturating_mul(unit)),
            available: data.len(),
        })?;
    Ok(&data[start..end])
}

/// Map a Windows code page identifier to an encoding.
fn codepage_to_encoding(codepage: u16) -> &'static Encoding {
    match codepage {
        874 => encoding_rs::WINDOWS_874,
        932 => encoding_rs::SHIFT_JIS,
        936 => encoding_rs::GBK,
        949 => encoding_rs::EUC_KR,
        950 => encoding_rs::BIG5,
        1200 => encoding_rs::UTF_16LE,
        1201 => encoding_rs::UTF_16BE,
        1250 => encoding_rs::WINDOWS_1250,
        1251 => encoding_rs::WINDOWS_1251,
        1253 => encoding_rs::WINDOWS_1253,
        1254 => encoding_rs::WINDOWS_1254,
        1255 => encoding_rs::WINDOWS_1255,
        1256 => encoding_rs::WINDOWS_1256,
        1257 => encoding_rs::WINDOWS_1257,
        1258 => encoding_rs::WINDOWS_1258,
        10000 => encoding_rs::MACINTOSH,
        20866 => encoding_rs::KOI8_R,
        28591 | 1252 => encoding_rs::WINDOWS_1252,
        65001 => encoding_rs::UTF_8,
        _ => encoding_rs::WINDOWS_1252,
    }
}

/// Build a single-section property set stream from `(id, vt, payload)` triples.
#[cfg(test)]
pub(crate) fn build_property_set(properties: &[(u32, u16, Vec<u8>)]) -> Vec<u8> {
    let mut out = vec![0u8; 48];
    out[0..2].copy_from_slice(&0xFFFEu16.to_le_bytes());
    out[24..28].copy_from_slice(&1u32.to_le_bytes());
    out[44..48].copy_from_slice(&48u32.to_le_bytes());

    let table = 8 + properties.len() * 8;
    let mut values = Vec::new();
    let mut entries = Vec::new();
    for (id, vt, payload) in properties {
        entries.extend_from_slice(&id.to_le_bytes());
        entries.extend_from_slice(&((table + values.len()) as u32).to_le_bytes());
        values.extend_from_slice(&(*vt as u32).to_le_bytes());
        values.extend_from_slice(payload);
        while values.len() % 4 != 0 {
            values.push(0);
        }
    }

    out.extend_from_slice(&((table + values.len()) as u32).to_le_bytes());
    out.extend_from_slice(&(properties.len() as u32).to_le_bytes());
    out.extend_from_slice(&entries);
    out.extend_from_slice(&values);
    out
}

/// Payload of a VT_LPSTR value.
#[cfg(test)]
pub(crate) fn lpstr(text: &[u8]) -> Vec<u8> {
    let mut payload = ((text.len() + 1) as u32).to_le_bytes().to_vec();
    payload.extend_from_slice(text);
    payload.push(0);
    payload
}

//! EBML (Extensible Binary Meta Language) decoding over a [`ByteSource`].
//!
//! EBML is the binary format underlying Matroska/WebM. It uses variable-length
//! integers (VINTs) for both element IDs and sizes.
//!
//! Reads that run past the bytes currently held by the source fail with
//! [`MkvError::InsufficientData`]; invalid encodings fail with a structural
//! error. The two are never conflated.

use crate::error::{MkvError, Result};
use crate::source::ByteSource;
use std::io::Write;

/// Maximum VINT length in bytes.
pub const MAX_VINT_LENGTH: usize = 8;

/// Maximum element ID length representable by this parser.
pub const MAX_ID_LENGTH: usize = 4;

/// Data bits of an all-ones (unknown) size field for each width.
const UNKNOWN_SIZE_MARKERS: [u64; MAX_VINT_LENGTH] = [
    0x7F,
    0x3FFF,
    0x1F_FFFF,
    0x0FFF_FFFF,
    0x07_FFFF_FFFF,
    0x03FF_FFFF_FFFF,
    0x01_FFFF_FFFF_FFFF,
    0x00FF_FFFF_FFFF_FFFF,
];

/// Width limits declared by the EBML header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum element ID width in bytes.
    pub max_id_length: usize,
    /// Maximum element size width in bytes.
    pub max_size_length: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_id_length: MAX_ID_LENGTH,
            max_size_length: MAX_VINT_LENGTH,
        }
    }
}

/// A decoded variable-length integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vint {
    /// Value with the length marker removed.
    pub value: u64,
    /// Encoded width in bytes.
    pub length: usize,
}

impl Vint {
    /// Check if every data bit is set, the "unknown size" pattern.
    pub fn is_all_ones(&self) -> bool {
        UNKNOWN_SIZE_MARKERS
            .get(self.length.wrapping_sub(1))
            .is_some_and(|&marker| marker == self.value)
    }
}

/// An EBML element header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementHeader {
    /// The element ID, marker bits included.
    pub id: u32,
    /// The element size (None for unknown size).
    pub size: Option<u64>,
    /// Total header size in bytes.
    pub header_size: usize,
    /// Absolute offset of the first ID byte.
    pub position: u64,
}

impl ElementHeader {
    /// Absolute offset of the payload.
    pub fn data_start(&self) -> u64 {
        self.position + self.header_size as u64
    }

    /// Absolute offset one past the payload, if the size is known.
    pub fn end(&self) -> Option<u64> {
        self.size.map(|s| self.data_start() + s)
    }

    /// Get the total size of this element (header + content).
    pub fn total_size(&self) -> Option<u64> {
        self.size.map(|s| s + self.header_size as u64)
    }

    /// Write an element header to a writer.
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<usize> {
        let id_len = write_element_id(writer, self.id)?;
        let size_len = match self.size {
            Some(size) => write_vint(writer, size)?,
            None => write_unknown_size(writer, 8)?,
        };
        Ok(id_len + size_len)
    }
}

/// Element decoder bound to a byte source and the header's width limits.
#[derive(Clone, Copy)]
pub struct EbmlReader<'a> {
    source: &'a dyn ByteSource,
    limits: Limits,
}

impl<'a> EbmlReader<'a> {
    /// Create a reader with explicit limits.
    pub fn new(source: &'a dyn ByteSource, limits: Limits) -> Self {
        Self { source, limits }
    }

    /// Underlying source.
    pub fn source(&self) -> &'a dyn ByteSource {
        self.source
    }

    /// Fail with `InsufficientData` unless `[pos, pos + len)` is readable.
    pub fn require(&self, pos: u64, len: u64) -> Result<()> {
        let available = self.source.length()?.available;
        match pos.checked_add(len) {
            Some(end) if end <= available => Ok(()),
            _ => Err(MkvError::InsufficientData {
                offset: pos,
                needed: len,
            }),
        }
    }

    /// Read a variable-length integer (VINT) at `pos`.
    ///
    /// EBML VINTs use a leading bit pattern to indicate the length:
    /// - 1xxxxxxx: 1 byte (7 bits of data)
    /// - 01xxxxxx xxxxxxxx: 2 bytes (14 bits)
    /// - 001xxxxx xxxxxxxx xxxxxxxx: 3 bytes (21 bits)
    /// - etc.
    pub fn read_vint(&self, pos: u64) -> Result<Vint> {
        let mut bytes = [0u8; MAX_VINT_LENGTH];
        self.source.read(pos, &mut bytes[..1])?;

        if bytes[0] == 0 {
            return Err(MkvError::InvalidVint { offset: pos });
        }

        let length = bytes[0].leading_zeros() as usize + 1;
        if length > 1 {
            self.source.read(pos + 1, &mut bytes[1..length])?;
        }

        let mut value = (bytes[0] as u64) & (0xFF >> length);
        for &byte in &bytes[1..length] {
            value = (value << 8) | byte as u64;
        }

        Ok(Vint { value, length })
    }

    /// Read an element ID at `pos`. IDs keep their marker bits.
    pub fn read_element_id(&self, pos: u64) -> Result<(u32, usize)> {
        let mut bytes = [0u8; MAX_ID_LENGTH];
        self.source.read(pos, &mut bytes[..1])?;

        if bytes[0] == 0 {
            return Err(MkvError::InvalidVint { offset: pos });
        }

        let length = bytes[0].leading_zeros() as usize + 1;
        if length > MAX_ID_LENGTH || length > self.limits.max_id_length {
            return Err(MkvError::InvalidElementId { offset: pos });
        }
        if length > 1 {
            self.source.read(pos + 1, &mut bytes[1..length])?;
        }

        let id = bytes[..length]
            .iter()
            .fold(0u32, |acc, &b| (acc << 8) | b as u32);
        Ok((id, length))
    }

    /// Read an element size at `pos`. Returns `None` for unknown size.
    pub fn read_element_size(&self, pos: u64) -> Result<(Option<u64>, usize)> {
        let vint = self.read_vint(pos)?;
        if vint.length > self.limits.max_size_length {
            return Err(MkvError::InvalidElementSize {
                offset: pos,
                message: format!(
                    "{}-byte size exceeds declared maximum of {}",
                    vint.length, self.limits.max_size_length
                ),
            });
        }

        if vint.is_all_ones() {
            Ok((None, vint.length))
        } else {
            Ok((Some(vint.value), vint.length))
        }
    }

    /// Read an element header at `pos`.
    pub fn read_header(&self, pos: u64) -> Result<ElementHeader> {
        let (id, id_len) = self.read_element_id(pos)?;
        let (size, size_len) = self.read_element_size(pos + id_len as u64)?;

        Ok(ElementHeader {
            id,
            size,
            header_size: id_len + size_len,
            position: pos,
        })
    }

    /// Visit each child of a known-size master element in order.
    ///
    /// A child that overruns its parent is malformed.
    pub fn for_each_child<F>(&self, parent: &ElementHeader, mut f: F) -> Result<()>
    where
        F: FnMut(&ElementHeader) -> Result<()>,
    {
        let end = parent.end().ok_or_else(|| MkvError::InvalidElementSize {
            offset: parent.position,
            message: format!("master element 0x{:X} must have a known size", parent.id),
        })?;

        let mut pos = parent.data_start();
        while pos < end {
            let child = self.read_header(pos)?;
            let child_end = child.end().filter(|&e| e <= end).ok_or_else(|| {
                MkvError::InvalidElementSize {
                    offset: pos,
                    message: format!("child of 0x{:X} overruns its parent", parent.id),
                }
            })?;
            f(&child)?;
            pos = child_end;
        }
        Ok(())
    }

    /// Read a known-size payload, checking it fits in `max` bytes.
    pub fn read_payload(&self, header: &ElementHeader, max: u64) -> Result<Vec<u8>> {
        let size = header.size.ok_or_else(|| MkvError::InvalidElementSize {
            offset: header.position,
            message: format!("element 0x{:X} must have a known size", header.id),
        })?;
        if size > max {
            return Err(MkvError::InvalidElementSize {
                offset: header.position,
                message: format!("element 0x{:X} size {} exceeds {}", header.id, size, max),
            });
        }
        self.require(header.data_start(), size)?;
        self.source.read_vec(header.data_start(), size as usize)
    }

    /// Read an unsigned integer element.
    pub fn read_uint(&self, header: &ElementHeader) -> Result<u64> {
        Ok(read_unsigned_int(&self.read_payload(header, 8)?))
    }

    /// Read a signed integer element.
    pub fn read_sint(&self, header: &ElementHeader) -> Result<i64> {
        Ok(read_signed_int(&self.read_payload(header, 8)?))
    }

    /// Read a float element.
    pub fn read_float(&self, header: &ElementHeader) -> Result<f64> {
        let data = self.read_payload(header, 8)?;
        if !matches!(data.len(), 0 | 4 | 8) {
            return Err(MkvError::InvalidElementSize {
                offset: header.position,
                message: format!("float of {} bytes", data.len()),
            });
        }
        Ok(read_float(&data))
    }

    /// Read a string element.
    pub fn read_string(&self, header: &ElementHeader) -> Result<String> {
        read_string(&self.read_payload(header, u32::MAX as u64)?)
    }

    /// Read a binary element.
    pub fn read_binary(&self, header: &ElementHeader) -> Result<Vec<u8>> {
        self.read_payload(header, u32::MAX as u64)
    }
}

/// Write a variable-length integer.
pub fn write_vint<W: Write>(writer: &mut W, value: u64) -> Result<usize> {
    let (bytes, length) = encode_vint(value)?;
    writer.write_all(&bytes[..length])?;
    Ok(length)
}

/// Encode a value as a VINT.
///
/// Returns the encoded bytes and the length.
pub fn encode_vint(value: u64) -> Result<([u8; 8], usize)> {
    if value >= UNKNOWN_SIZE_MARKERS[MAX_VINT_LENGTH - 1] {
        return Err(MkvError::VintOverflow);
    }

    let length = vint_length(value);
    let mut bytes = [0u8; 8];
    let mut v = value;
    for i in (0..length).rev() {
        bytes[i] = (v & 0xFF) as u8;
        v >>= 8;
    }
    bytes[0] |= 0x80 >> (length - 1);

    Ok((bytes, length))
}

/// Calculate the minimum number of bytes needed to encode a value as a VINT.
///
/// The all-ones pattern of each width is reserved for unknown sizes.
pub fn vint_length(value: u64) -> usize {
    UNKNOWN_SIZE_MARKERS
        .iter()
        .position(|&marker| value < marker)
        .map_or(MAX_VINT_LENGTH, |i| i + 1)
}

/// Write an element ID.
pub fn write_element_id<W: Write>(writer: &mut W, id: u32) -> Result<usize> {
    let bytes = id.to_be_bytes();
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(3);
    writer.write_all(&bytes[start..])?;
    Ok(4 - start)
}

/// Write an unknown size field of the given width.
pub fn write_unknown_size<W: Write>(writer: &mut W, length: usize) -> Result<usize> {
    let marker = UNKNOWN_SIZE_MARKERS
        .get(length.wrapping_sub(1))
        .ok_or(MkvError::VintOverflow)?;
    let value = marker | (1u64 << (7 * length));
    writer.write_all(&value.to_be_bytes()[8 - length..])?;
    Ok(length)
}

/// Write an unsigned integer in minimal bytes.
pub fn write_unsigned_int<W: Write>(writer: &mut W, value: u64) -> Result<usize> {
    let bytes = value.to_be_bytes();
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(7);
    writer.write_all(&bytes[start..])?;
    Ok(8 - start)
}

/// Write a float (always 8 bytes for precision).
pub fn write_float<W: Write>(writer: &mut W, value: f64) -> Result<usize> {
    writer.write_all(&value.to_bits().to_be_bytes())?;
    Ok(8)
}

/// Read a signed integer from EBML data.
pub fn read_signed_int(data: &[u8]) -> i64 {
    let Some(&first) = data.first() else {
        return 0;
    };
    let init = if first & 0x80 != 0 { -1i64 } else { 0i64 };
    data.iter().fold(init, |acc, &b| (acc << 8) | b as i64)
}

/// Read an unsigned integer from EBML data.
pub fn read_unsigned_int(data: &[u8]) -> u64 {
    data.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

/// Read a float from EBML data (4 or 8 bytes).
pub fn read_float(data: &[u8]) -> f64 {
    match *data {
        [a, b, c, d] => f32::from_be_bytes([a, b, c, d]) as f64,
        [a, b, c, d, e, f, g, h] => f64::from_be_bytes([a, b, c, d, e, f, g, h]),
        [] => 0.0,
        _ => f64::NAN,
    }
}

/// Read a UTF-8 string from EBML data.
pub fn read_string(data: &[u8]) -> Result<String> {
    // Find null terminator if present
    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    String::from_utf8(data[..end].to_vec())
        .map_err(|e| MkvError::Other(format!("Invalid UTF-8 string: {}", e)))
}

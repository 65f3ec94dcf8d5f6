//! EBML header parsing and validation.

use crate::config::ParserConfig;
use crate::ebml::{EbmlReader, Limits};
use crate::elements;
use crate::error::{MkvError, Result};
use crate::progress::{ready, Progress, Transient};
use crate::source::ByteSource;

/// EBML magic bytes (the EBML element ID).
pub const EBML_MAGIC: [u8; 4] = [0x1A, 0x45, 0xDF, 0xA3];

/// Check whether data starts with the EBML magic bytes.
pub fn is_mkv_signature(data: &[u8]) -> bool {
    data.starts_with(&EBML_MAGIC)
}

/// EBML document header information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EbmlHeader {
    /// EBML version.
    pub version: u64,
    /// EBML read version.
    pub read_version: u64,
    /// Maximum ID length.
    pub max_id_length: u64,
    /// Maximum size length.
    pub max_size_length: u64,
    /// Document type (e.g., "matroska" or "webm").
    pub doc_type: String,
    /// Document type version.
    pub doc_type_version: u64,
    /// Document type read version.
    pub doc_type_read_version: u64,
}

impl Default for EbmlHeader {
    fn default() -> Self {
        Self {
            version: 1,
            read_version: 1,
            max_id_length: 4,
            max_size_length: 8,
            doc_type: "matroska".to_string(),
            doc_type_version: 1,
            doc_type_read_version: 1,
        }
    }
}

impl EbmlHeader {
    /// Check if this is a WebM document.
    pub fn is_webm(&self) -> bool {
        self.doc_type.eq_ignore_ascii_case("webm")
    }

    /// Check if this is a Matroska document.
    pub fn is_matroska(&self) -> bool {
        self.doc_type.eq_ignore_ascii_case("matroska")
    }

    /// Width limits for every element that follows the header.
    pub fn limits(&self) -> Limits {
        Limits {
            max_id_length: self.max_id_length as usize,
            max_size_length: self.max_size_length as usize,
        }
    }

    /// Reject headers this parser cannot read.
    pub fn validate(&self, config: &ParserConfig) -> Result<()> {
        let reject = |msg: String| -> Result<()> { Err(MkvError::InvalidEbmlHeader(msg)) };

        if self.version > 1 {
            return reject(format!("unsupported EBML version {}", self.version));
        }
        if self.max_id_length > 8 {
            return reject(format!("max ID length {}", self.max_id_length));
        }
        if self.max_size_length > 8 {
            return reject(format!("max size length {}", self.max_size_length));
        }
        if !self.is_webm() && !self.is_matroska() {
            return reject(format!("unsupported doc type {:?}", self.doc_type));
        }
        if self.doc_type_version < 1 || self.doc_type_version > config.max_doc_type_version {
            return reject(format!("doc type version {}", self.doc_type_version));
        }
        if self.doc_type_read_version > config.max_doc_type_read_version {
            return reject(format!("doc type read version {}", self.doc_type_read_version));
        }
        Ok(())
    }

    /// Parse and validate the EBML header at the start of `source`.
    ///
    /// Leading junk up to `config.header_scan_limit` bytes is skipped. On
    /// success returns the header and the offset just past it, where the
    /// Segment is expected.
    pub fn parse(source: &dyn ByteSource, config: &ParserConfig) -> Result<Progress<(Self, u64)>> {
        let start = ready!(find_magic(source, config.header_scan_limit)?);
        let reader = EbmlReader::new(source, Limits::default());

        let element = ready!(reader.read_header(start).transient()?);
        let end = element.end().ok_or_else(|| {
            MkvError::InvalidEbmlHeader("EBML header must have a known size".into())
        })?;
        ready!(reader.require(element.data_start(), end - element.data_start()).transient()?);

        let mut header = EbmlHeader::default();
        let mut pos = element.data_start();
        while pos < end {
            let child = reader.read_header(pos)?;
            let child_end = child.end().filter(|&e| e <= end).ok_or_else(|| {
                MkvError::InvalidElementSize {
                    offset: pos,
                    message: "EBML header child overruns its parent".into(),
                }
            })?;

            match child.id {
                elements::EBML_VERSION => header.version = reader.read_uint(&child)?,
                elements::EBML_READ_VERSION => header.read_version = reader.read_uint(&child)?,
                elements::EBML_MAX_ID_LENGTH => header.max_id_length = reader.read_uint(&child)?,
                elements::EBML_MAX_SIZE_LENGTH => {
                    header.max_size_length = reader.read_uint(&child)?
                }
                elements::DOC_TYPE => header.doc_type = reader.read_string(&child)?,
                elements::DOC_TYPE_VERSION => header.doc_type_version = reader.read_uint(&child)?,
                elements::DOC_TYPE_READ_VERSION => {
                    header.doc_type_read_version = reader.read_uint(&child)?
                }
                _ => {}
            }
            pos = child_end;
        }

        header.validate(config)?;
        tracing::debug!(
            doc_type = %header.doc_type,
            doc_type_version = header.doc_type_version,
            offset = start,
            "EBML header parsed"
        );
        Ok(Progress::Ready((header, end)))
    }
}

/// Locate the EBML magic within the first `limit` bytes.
fn find_magic(source: &dyn ByteSource, limit: u64) -> Result<Progress<u64>> {
    let length = source.length()?;
    let window = length.available.min(limit.saturating_add(EBML_MAGIC.len() as u64 - 1));
    let data = source.read_vec(0, window as usize)?;

    if let Some(pos) = data
        .windows(EBML_MAGIC.len())
        .position(is_mkv_signature)
        .filter(|&pos| (pos as u64) < limit)
    {
        return Ok(Progress::Ready(pos as u64));
    }

    let scanned_everything = length.is_complete()
        || window >= limit.saturating_add(EBML_MAGIC.len() as u64 - 1);
    if scanned_everything {
        Err(MkvError::InvalidEbmlHeader(format!(
            "EBML magic not found in the first {} bytes",
            limit
        )))
    } else {
        Ok(Progress::NeedMoreData)
    }
}

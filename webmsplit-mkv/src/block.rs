//! Blocks and block entries.
//!
//! A [`Block`] records where one coded frame lives in the source and how it
//! is timed. Payload bytes are not copied at parse time; they are re-read
//! from the source when a sample is populated.
//!
//! Blocks are owned by their [`Cluster`](crate::Cluster) inside the
//! [`Segment`](crate::Segment). Everything else refers to them through a
//! [`BlockEntry`], a copyable index into that arena.

use crate::ebml::{EbmlReader, ElementHeader};
use crate::elements;
use crate::error::{MkvError, Result};

/// Lacing mode of a block payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lacing {
    /// One frame per block.
    #[default]
    None,
    /// Xiph lacing.
    Xiph,
    /// Fixed-size lacing.
    Fixed,
    /// EBML lacing.
    Ebml,
}

impl Lacing {
    fn from_flags(flags: u8) -> Self {
        match (flags & elements::BLOCK_FLAG_LACING) >> 1 {
            0 => Lacing::None,
            1 => Lacing::Xiph,
            2 => Lacing::Fixed,
            _ => Lacing::Ebml,
        }
    }
}

/// One coded frame (or laced group of frames).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Track this block belongs to.
    pub track_number: u64,
    /// Absolute timecode in segment ticks (cluster timecode plus relative offset).
    pub timecode: i64,
    /// Absolute time in nanoseconds. May be negative for malformed offsets.
    pub time_ns: i64,
    /// Absolute offset of the frame payload.
    pub data_offset: u64,
    /// Payload size in bytes.
    pub data_size: u64,
    /// Sync point.
    pub keyframe: bool,
    /// References a later frame, so display order differs from coding order.
    pub bframe: bool,
    /// Decoded but not shown.
    pub invisible: bool,
    /// Can be dropped without affecting other frames.
    pub discardable: bool,
    /// Payload lacing.
    pub lacing: Lacing,
    /// BlockDuration, in segment ticks, when present.
    pub duration: Option<u64>,
}

impl Block {
    /// Parse the header of a SimpleBlock or Block element.
    ///
    /// SimpleBlocks carry their key frame flag; for a Block inside a
    /// BlockGroup the caller derives it from the group's references.
    pub(crate) fn parse(
        reader: &EbmlReader<'_>,
        header: &ElementHeader,
        cluster_timecode: u64,
        timecode_scale: u64,
    ) -> Result<Self> {
        let size = header.size.ok_or_else(|| MkvError::InvalidBlock {
            offset: header.position,
            message: "block with unknown size".into(),
        })?;

        let start = header.data_start();
        let track = reader.read_vint(start)?;
        let prefix = track.length as u64 + 3;
        if size < prefix {
            return Err(MkvError::InvalidBlock {
                offset: start,
                message: format!("{} bytes cannot hold a block header", size),
            });
        }

        let mut fixed = [0u8; 3];
        reader.source().read(start + track.length as u64, &mut fixed)?;
        let relative = i16::from_be_bytes([fixed[0], fixed[1]]);
        let flags = fixed[2];

        let timecode = (cluster_timecode as i64).saturating_add(relative as i64);
        let simple = header.id == elements::SIMPLE_BLOCK;

        Ok(Self {
            track_number: track.value,
            timecode,
            time_ns: timecode.saturating_mul(timecode_scale as i64),
            data_offset: start + prefix,
            data_size: size - prefix,
            keyframe: simple && flags & elements::BLOCK_FLAG_KEYFRAME != 0,
            bframe: false,
            invisible: flags & elements::BLOCK_FLAG_INVISIBLE != 0,
            discardable: simple && flags & elements::BLOCK_FLAG_DISCARDABLE != 0,
            lacing: Lacing::from_flags(flags),
            duration: None,
        })
    }

    /// Parse a BlockGroup: its Block plus ReferenceBlock and BlockDuration.
    ///
    /// The block is a key frame when it references nothing, and a B-frame
    /// when any reference points forward in time.
    pub(crate) fn parse_group(
        reader: &EbmlReader<'_>,
        group: &ElementHeader,
        cluster_timecode: u64,
        timecode_scale: u64,
    ) -> Result<Self> {
        let end = group.end().ok_or_else(|| MkvError::InvalidBlock {
            offset: group.position,
            message: "block group with unknown size".into(),
        })?;

        let mut block = None;
        let mut duration = None;
        let mut has_reference = false;
        let mut has_forward_reference = false;

        let mut pos = group.data_start();
        while pos < end {
            let child = reader.read_header(pos)?;
            let child_end = child.end().filter(|&e| e <= end).ok_or_else(|| {
                MkvError::InvalidElementSize {
                    offset: pos,
                    message: "block group child overruns its parent".into(),
                }
            })?;

            match child.id {
                elements::BLOCK => {
                    block = Some(Self::parse(reader, &child, cluster_timecode, timecode_scale)?)
                }
                elements::REFERENCE_BLOCK => {
                    has_reference = true;
                    if reader.read_sint(&child)? > 0 {
                        has_forward_reference = true;
                    }
                }
                elements::BLOCK_DURATION => duration = Some(reader.read_uint(&child)?),
                _ => {}
            }
            pos = child_end;
        }

        let mut block = block.ok_or_else(|| MkvError::InvalidBlock {
            offset: group.position,
            message: "block group without a block".into(),
        })?;
        block.keyframe = !has_reference;
        block.bframe = has_forward_reference;
        block.duration = duration;
        Ok(block)
    }
}

/// Position of a block in the segment's cluster arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockIndex {
    /// Index of the owning cluster.
    pub cluster: usize,
    /// Index of the block within its cluster.
    pub block: usize,
}

/// A navigable handle: a concrete block, or the end of a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockEntry {
    /// A parsed block.
    Block(BlockIndex),
    /// No more blocks for this track.
    EndOfStream,
}

impl BlockEntry {
    /// Entry for the block at `block` within cluster `cluster`.
    pub fn new(cluster: usize, block: usize) -> Self {
        BlockEntry::Block(BlockIndex { cluster, block })
    }

    /// Check if this is the end-of-stream entry.
    pub fn is_eos(&self) -> bool {
        matches!(self, BlockEntry::EndOfStream)
    }

    /// Arena index, unless end of stream.
    pub fn index(&self) -> Option<BlockIndex> {
        match self {
            BlockEntry::Block(index) => Some(*index),
            BlockEntry::EndOfStream => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ebml::{write_element_id, write_vint, Limits};
    use crate::source::{BufferSource, ByteSource};

    fn element(id: u32, body: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        write_element_id(&mut out, id).unwrap();
        write_vint(&mut out, body.len() as u64).unwrap();
        out.extend_from_slice(body);
        out
    }

    fn block_body(track: u8, relative: i16, flags: u8, payload: &[u8]) -> Vec<u8> {
        let mut body = vec![0x80 | track];
        body.extend_from_slice(&relative.to_be_bytes());
        body.push(flags);
        body.extend_from_slice(payload);
        body
    }

    #[test]
    fn test_parse_simple_block() {
        let bytes = element(elements::SIMPLE_BLOCK, &block_body(1, 33, 0x80, b"frame"));
        let source = BufferSource::from_vec(bytes);
        let reader = EbmlReader::new(&source, Limits::default());
        let header = reader.read_header(0).unwrap();

        let block = Block::parse(&reader, &header, 1000, 1_000_000).unwrap();
        assert_eq!(block.track_number, 1);
        assert_eq!(block.timecode, 1033);
        assert_eq!(block.time_ns, 1_033_000_000);
        assert!(block.keyframe);
        assert!(!block.bframe);
        assert_eq!(block.lacing, Lacing::None);
        assert_eq!(block.data_size, 5);
        assert_eq!(source.read_vec(block.data_offset, 5).unwrap(), b"frame".to_vec());
    }

    #[test]
    fn test_negative_relative_timecode() {
        let bytes = element(elements::SIMPLE_BLOCK, &block_body(2, -10, 0x00, b"x"));
        let source = BufferSource::from_vec(bytes);
        let reader = EbmlReader::new(&source, Limits::default());
        let header = reader.read_header(0).unwrap();

        let block = Block::parse(&reader, &header, 5, 1_000_000).unwrap();
        assert_eq!(block.timecode, -5);
        assert!(block.time_ns < 0);
        assert!(!block.keyframe);
    }

    #[test]
    fn test_truncated_block_header() {
        let bytes = element(elements::SIMPLE_BLOCK, &[0x81, 0x00]);
        let source = BufferSource::from_vec(bytes);
        let reader = EbmlReader::new(&source, Limits::default());
        let header = reader.read_header(0).unwrap();
        assert!(matches!(
            Block::parse(&reader, &header, 0, 1_000_000),
            Err(MkvError::InvalidBlock { .. })
        ));
    }

    #[test]
    fn test_block_group_references() {
        let mut body = element(elements::BLOCK, &block_body(1, 0, 0, b"b"));
        body.extend(element(elements::REFERENCE_BLOCK, &[0xF0]));
        body.extend(element(elements::REFERENCE_BLOCK, &[0x10]));
        body.extend(element(elements::BLOCK_DURATION, &[33]));
        let source = BufferSource::from_vec(element(elements::BLOCK_GROUP, &body));
        let reader = EbmlReader::new(&source, Limits::default());
        let header = reader.read_header(0).unwrap();

        let block = Block::parse_group(&reader, &header, 0, 1_000_000).unwrap();
        assert!(!block.keyframe);
        assert!(block.bframe);
        assert_eq!(block.duration, Some(33));
    }

    #[test]
    fn test_block_group_without_references_is_key() {
        let body = element(elements::BLOCK, &block_body(1, 0, 0, b"i"));
        let source = BufferSource::from_vec(element(elements::BLOCK_GROUP, &body));
        let reader = EbmlReader::new(&source, Limits::default());
        let header = reader.read_header(0).unwrap();

        let block = Block::parse_group(&reader, &header, 0, 1_000_000).unwrap();
        assert!(block.keyframe);
        assert!(!block.bframe);
    }

    #[test]
    fn test_lacing_flags() {
        assert_eq!(Lacing::from_flags(0x02), Lacing::Xiph);
        assert_eq!(Lacing::from_flags(0x04), Lacing::Fixed);
        assert_eq!(Lacing::from_flags(0x06), Lacing::Ebml);
    }

    #[test]
    fn test_block_entry() {
        let entry = BlockEntry::new(2, 5);
        assert!(!entry.is_eos());
        assert_eq!(entry.index(), Some(BlockIndex { cluster: 2, block: 5 }));
        assert!(BlockEntry::EndOfStream.is_eos());
        assert_eq!(BlockEntry::EndOfStream.index(), None);
    }
}

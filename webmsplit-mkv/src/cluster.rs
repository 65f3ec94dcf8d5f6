//! Clusters: groups of blocks sharing one base timecode.

use crate::block::Block;
use crate::ebml::{EbmlReader, ElementHeader};
use crate::elements;
use crate::error::{MkvError, Result};
use crate::progress::{ready, Progress, Transient};

/// Parse context supplied by the owning segment.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ClusterContext {
    /// Absolute offset of the segment payload.
    pub segment_start: u64,
    /// Absolute end of the segment, when known.
    pub segment_stop: Option<u64>,
    /// Nanoseconds per tick.
    pub timecode_scale: u64,
}

/// A fully parsed cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    index: usize,
    position: u64,
    element_size: u64,
    timecode: u64,
    time_ns: i64,
    blocks: Vec<Block>,
}

impl Cluster {
    /// Parse the cluster whose header is `header`.
    ///
    /// Returns the cluster and the absolute offset just past it. Nothing is
    /// returned until every byte of the cluster is available.
    pub(crate) fn parse(
        reader: &EbmlReader<'_>,
        header: &ElementHeader,
        ctx: ClusterContext,
    ) -> Result<Progress<(Self, u64)>> {
        let end = match header.end() {
            Some(end) => {
                if ctx.segment_stop.is_some_and(|stop| end > stop) {
                    return Err(MkvError::InvalidElementSize {
                        offset: header.position,
                        message: "cluster extends past the end of its segment".into(),
                    });
                }
                ready!(reader
                    .require(header.data_start(), end - header.data_start())
                    .transient()?);
                end
            }
            None => ready!(find_unknown_size_end(reader, header, ctx.segment_stop)?),
        };

        let mut timecode = None;
        let mut blocks = Vec::new();
        let mut pos = header.data_start();
        while pos < end {
            let child = reader.read_header(pos)?;
            let child_end = child.end().filter(|&e| e <= end).ok_or_else(|| {
                MkvError::InvalidElementSize {
                    offset: pos,
                    message: "cluster child overruns its parent".into(),
                }
            })?;

            match child.id {
                elements::TIMESTAMP => timecode = Some(reader.read_uint(&child)?),
                elements::SIMPLE_BLOCK | elements::BLOCK_GROUP => {
                    let base = timecode.ok_or(MkvError::ClusterMissingTimestamp {
                        offset: header.position,
                    })?;
                    let block = if child.id == elements::SIMPLE_BLOCK {
                        Block::parse(reader, &child, base, ctx.timecode_scale)?
                    } else {
                        Block::parse_group(reader, &child, base, ctx.timecode_scale)?
                    };
                    blocks.push(block);
                }
                _ => {}
            }
            pos = child_end;
        }

        let timecode = timecode.ok_or(MkvError::ClusterMissingTimestamp {
            offset: header.position,
        })?;

        let cluster = Self {
            index: 0,
            position: header.position - ctx.segment_start,
            element_size: end - header.position,
            timecode,
            time_ns: (timecode as i64).saturating_mul(ctx.timecode_scale as i64),
            blocks,
        };
        Ok(Progress::Ready((cluster, end)))
    }

    pub(crate) fn set_index(&mut self, index: usize) {
        self.index = index;
    }

    /// Position in the segment's cluster sequence.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Offset of the cluster element relative to the segment payload, the
    /// unit cue points use.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Size of the whole cluster element, header included.
    pub fn element_size(&self) -> u64 {
        self.element_size
    }

    /// Base timecode in segment ticks.
    pub fn timecode(&self) -> u64 {
        self.timecode
    }

    /// Base time in nanoseconds.
    pub fn time_ns(&self) -> i64 {
        self.time_ns
    }

    /// Time of the first block, or the base time of an empty cluster.
    pub fn first_time_ns(&self) -> i64 {
        self.blocks.first().map_or(self.time_ns, |b| b.time_ns)
    }

    /// Time of the last block, or the base time of an empty cluster.
    pub fn last_time_ns(&self) -> i64 {
        self.blocks.last().map_or(self.time_ns, |b| b.time_ns)
    }

    /// Blocks in stream order.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Block at `index`.
    pub fn block(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index)
    }

    /// Number of blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Check if the cluster holds no blocks.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Index of the first block at or after `from` matching `pred`.
    pub fn find_block<P>(&self, from: usize, mut pred: P) -> Option<usize>
    where
        P: FnMut(&Block) -> bool,
    {
        self.blocks
            .iter()
            .enumerate()
            .skip(from)
            .find(|(_, b)| pred(b))
            .map(|(i, _)| i)
    }
}

/// An unknown-size cluster ends at the next level-1 element or the end of
/// the segment.
fn find_unknown_size_end(
    reader: &EbmlReader<'_>,
    header: &ElementHeader,
    segment_stop: Option<u64>,
) -> Result<Progress<u64>> {
    let mut pos = header.data_start();
    loop {
        if let Some(stop) = segment_stop {
            if pos >= stop {
                return Ok(Progress::Ready(stop));
            }
        }

        let child = ready!(reader.read_header(pos).transient()?);
        if elements::is_level1(child.id) {
            return Ok(Progress::Ready(pos));
        }

        let size = child.size.ok_or_else(|| MkvError::InvalidElementSize {
            offset: pos,
            message: format!(
                "{} inside an unknown-size cluster must have a known size",
                elements::element_name(child.id)
            ),
        })?;
        ready!(reader.require(child.data_start(), size).transient()?);
        pos = child.data_start() + size;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ebml::{write_element_id, write_unknown_size, write_unsigned_int, write_vint, Limits};
    use crate::source::BufferSource;

    fn element(id: u32, body: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        write_element_id(&mut out, id).unwrap();
        write_vint(&mut out, body.len() as u64).unwrap();
        out.extend_from_slice(body);
        out
    }

    fn simple_block(track: u8, relative: i16, key: bool) -> Vec<u8> {
        let mut body = vec![0x80 | track];
        body.extend_from_slice(&relative.to_be_bytes());
        body.push(if key { 0x80 } else { 0 });
        body.extend_from_slice(b"data");
        element(elements::SIMPLE_BLOCK, &body)
    }

    fn cluster_body(timecode: u64) -> Vec<u8> {
        let mut tc = Vec::new();
        write_unsigned_int(&mut tc, timecode).unwrap();
        let mut body = element(elements::TIMESTAMP, &tc);
        body.extend(simple_block(1, 0, true));
        body.extend(simple_block(2, 5, true));
        body.extend(simple_block(1, 40, false));
        body
    }

    fn ctx(stop: Option<u64>) -> ClusterContext {
        ClusterContext {
            segment_start: 0,
            segment_stop: stop,
            timecode_scale: 1_000_000,
        }
    }

    #[test]
    fn test_parse_known_size_cluster() {
        let bytes = element(elements::CLUSTER, &cluster_body(1000));
        let len = bytes.len() as u64;
        let source = BufferSource::from_vec(bytes);
        let reader = EbmlReader::new(&source, Limits::default());
        let header = reader.read_header(0).unwrap();

        let (cluster, end) = Cluster::parse(&reader, &header, ctx(Some(len)))
            .unwrap()
            .ready()
            .unwrap();
        assert_eq!(end, len);
        assert_eq!(cluster.timecode(), 1000);
        assert_eq!(cluster.time_ns(), 1_000_000_000);
        assert_eq!(cluster.len(), 3);
        assert_eq!(cluster.first_time_ns(), 1_000_000_000);
        assert_eq!(cluster.last_time_ns(), 1_040_000_000);
        assert_eq!(cluster.find_block(1, |b| b.track_number == 1), Some(2));
        assert_eq!(cluster.find_block(0, |b| b.keyframe && b.track_number == 2), Some(1));
    }

    #[test]
    fn test_partial_cluster_needs_more_data() {
        let bytes = element(elements::CLUSTER, &cluster_body(0));
        let source = BufferSource::new();
        source.append(&bytes[..bytes.len() - 2]);
        let reader = EbmlReader::new(&source, Limits::default());
        let header = reader.read_header(0).unwrap();

        assert!(Cluster::parse(&reader, &header, ctx(None))
            .unwrap()
            .is_need_more_data());

        source.append(&bytes[bytes.len() - 2..]);
        assert!(Cluster::parse(&reader, &header, ctx(None)).unwrap().is_ready());
    }

    #[test]
    fn test_unknown_size_cluster_ends_at_next_cluster() {
        let mut bytes = Vec::new();
        write_element_id(&mut bytes, elements::CLUSTER).unwrap();
        write_unknown_size(&mut bytes, 8).unwrap();
        bytes.extend(cluster_body(0));
        let first_len = bytes.len() as u64;

        let source = BufferSource::new();
        source.append(&bytes);
        let reader = EbmlReader::new(&source, Limits::default());
        let header = reader.read_header(0).unwrap();

        // The end is unknown until the next level-1 element shows up
        assert!(Cluster::parse(&reader, &header, ctx(None))
            .unwrap()
            .is_need_more_data());

        source.append(&element(elements::CLUSTER, &cluster_body(100)));
        let (cluster, end) = Cluster::parse(&reader, &header, ctx(None))
            .unwrap()
            .ready()
            .unwrap();
        assert_eq!(end, first_len);
        assert_eq!(cluster.len(), 3);
    }

    #[test]
    fn test_unknown_size_cluster_ends_at_segment_stop() {
        let mut bytes = Vec::new();
        write_element_id(&mut bytes, elements::CLUSTER).unwrap();
        write_unknown_size(&mut bytes, 8).unwrap();
        bytes.extend(cluster_body(0));
        let len = bytes.len() as u64;

        let source = BufferSource::from_vec(bytes);
        let reader = EbmlReader::new(&source, Limits::default());
        let header = reader.read_header(0).unwrap();
        let (_, end) = Cluster::parse(&reader, &header, ctx(Some(len)))
            .unwrap()
            .ready()
            .unwrap();
        assert_eq!(end, len);
    }

    #[test]
    fn test_missing_timestamp() {
        let bytes = element(elements::CLUSTER, &simple_block(1, 0, true));
        let source = BufferSource::from_vec(bytes);
        let reader = EbmlReader::new(&source, Limits::default());
        let header = reader.read_header(0).unwrap();
        assert!(matches!(
            Cluster::parse(&reader, &header, ctx(None)),
            Err(MkvError::ClusterMissingTimestamp { offset: 0 })
        ));
    }

    #[test]
    fn test_cluster_past_segment_end() {
        let bytes = element(elements::CLUSTER, &cluster_body(0));
        let source = BufferSource::from_vec(bytes);
        let reader = EbmlReader::new(&source, Limits::default());
        let header = reader.read_header(0).unwrap();
        assert!(matches!(
            Cluster::parse(&reader, &header, ctx(Some(4))),
            Err(MkvError::InvalidElementSize { .. })
        ));
    }
}

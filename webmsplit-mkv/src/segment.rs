//! The Segment: metadata plus an incrementally discovered cluster sequence.
//!
//! A segment is opened as soon as its header bytes exist. Clusters are then
//! parsed one at a time with [`Segment::parse_cluster`] and appended with
//! [`Segment::add_cluster`]. Parsing is split in two so a caller holding a
//! shared lock can tell "nothing new yet" apart from "new cluster" without
//! mutating anything on the first step.
//!
//! ```text
//! Segment
//! ├── SeekHead   (Cues location)
//! ├── Info       (timecode scale, duration)
//! ├── Tracks     (video/audio track entries)
//! ├── Cluster 0  ── SimpleBlock / BlockGroup ...
//! ├── Cluster 1
//! ├── ...
//! └── Cues       (optional, may follow the clusters)
//! ```
//!
//! Clusters are only ever appended. Positions handed out as [`BlockEntry`]
//! and [`ClusterRef`] values stay valid for the life of the segment.

use std::sync::Arc;

use crate::block::{Block, BlockEntry, BlockIndex};
use crate::cluster::{Cluster, ClusterContext};
use crate::config::ParserConfig;
use crate::cues::Cues;
use crate::ebml::{read_unsigned_int, EbmlReader, ElementHeader, Limits};
use crate::elements;
use crate::error::{MkvError, Result};
use crate::header::EbmlHeader;
use crate::info::SegmentInfo;
use crate::progress::{ready, Progress, Transient};
use crate::source::ByteSource;
use crate::track::{Track, Tracks};

/// A cluster in the segment's sequence, or the end-of-stream sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClusterRef {
    /// Index into [`Segment::clusters`].
    Cluster(usize),
    /// Past the last cluster.
    EndOfStream,
}

impl ClusterRef {
    /// Check if this is the end-of-stream sentinel.
    pub fn is_eos(&self) -> bool {
        matches!(self, ClusterRef::EndOfStream)
    }

    /// Cluster index, unless end of stream.
    pub fn index(&self) -> Option<usize> {
        match self {
            ClusterRef::Cluster(index) => Some(*index),
            ClusterRef::EndOfStream => None,
        }
    }
}

/// Result of one [`Segment::parse_cluster`] step, consumed by
/// [`Segment::add_cluster`].
#[derive(Debug)]
#[must_use]
pub struct ParsedCluster {
    cluster: Option<Cluster>,
    next_pos: u64,
    cues: Option<Cues>,
}

impl ParsedCluster {
    /// The parsed cluster, or `None` when the end of the segment was reached.
    pub fn cluster(&self) -> Option<&Cluster> {
        self.cluster.as_ref()
    }

    /// Absolute offset where the next parse step will start.
    pub fn next_pos(&self) -> u64 {
        self.next_pos
    }
}

/// An open Matroska segment.
pub struct Segment {
    source: Arc<dyn ByteSource>,
    config: ParserConfig,
    header: EbmlHeader,
    limits: Limits,
    /// Absolute offset of the segment payload.
    start: u64,
    size: Option<u64>,
    /// Absolute offset of the first unparsed byte.
    pos: u64,
    info: SegmentInfo,
    tracks: Tracks,
    cues: Option<Cues>,
    cues_position: Option<u64>,
    clusters: Vec<Cluster>,
    headers_done: bool,
    eos: bool,
}

impl std::fmt::Debug for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Segment")
            .field("start", &self.start)
            .field("size", &self.size)
            .field("pos", &self.pos)
            .field("tracks", &self.tracks.len())
            .field("clusters", &self.clusters.len())
            .field("eos", &self.eos)
            .finish()
    }
}

impl Segment {
    /// Validate the EBML header and locate the Segment element.
    pub fn open(source: Arc<dyn ByteSource>, config: ParserConfig) -> Result<Progress<Self>> {
        let (header, mut pos) = ready!(EbmlHeader::parse(source.as_ref(), &config)?);
        let limits = header.limits();
        let reader = EbmlReader::new(source.as_ref(), limits);

        let element = loop {
            let length = source.length()?;
            if length.is_complete() && pos >= length.available {
                return Err(MkvError::MissingElement("Segment".into()));
            }

            let element = ready!(reader.read_header(pos).transient()?);
            if element.id == elements::SEGMENT {
                break element;
            }
            pos = element.end().ok_or_else(|| MkvError::InvalidElementSize {
                offset: pos,
                message: "unknown-size element before the Segment".into(),
            })?;
        };

        tracing::debug!(
            position = element.position,
            size = ?element.size,
            doc_type = %header.doc_type,
            "Segment found"
        );

        Ok(Progress::Ready(Self {
            source,
            config,
            header,
            limits,
            start: element.data_start(),
            size: element.size,
            pos: element.data_start(),
            info: SegmentInfo::default(),
            tracks: Tracks::default(),
            cues: None,
            cues_position: None,
            clusters: Vec::new(),
            headers_done: false,
            eos: false,
        }))
    }

    // =========================================================================
    // Metadata
    // =========================================================================

    /// Parse the level-1 elements that precede the first cluster.
    ///
    /// Every element is consumed whole. On `NeedMoreData` the elements
    /// already consumed stay consumed and the call can simply be repeated.
    pub fn parse_headers(&mut self) -> Result<Progress<()>> {
        if self.headers_done {
            return Ok(Progress::Ready(()));
        }

        let source = Arc::clone(&self.source);
        let reader = EbmlReader::new(source.as_ref(), self.limits);

        loop {
            if self.stop().is_some_and(|stop| self.pos >= stop) {
                break;
            }

            let element = ready!(reader.read_header(self.pos).transient()?);
            if element.id == elements::CLUSTER {
                break;
            }

            let (size, end) = match (element.size, element.end()) {
                (Some(size), Some(end)) => (size, end),
                _ => {
                    return Err(MkvError::InvalidElementSize {
                        offset: element.position,
                        message: format!(
                            "{} must have a known size",
                            elements::element_name(element.id)
                        ),
                    })
                }
            };

            match element.id {
                elements::INFO | elements::TRACKS | elements::CUES | elements::SEEK_HEAD => {
                    ready!(reader.require(element.data_start(), size).transient()?);
                    self.parse_metadata(&reader, &element)?;
                }
                id => tracing::trace!(
                    element = elements::element_name(id),
                    position = element.position,
                    "Skipping element"
                ),
            }
            self.pos = end;
        }

        self.headers_done = true;
        tracing::debug!(
            tracks = self.tracks.len(),
            timecode_scale = self.info.timecode_scale,
            duration_ns = ?self.info.duration_ns(),
            cues = self.cues.is_some(),
            "Segment headers parsed"
        );
        Ok(Progress::Ready(()))
    }

    fn parse_metadata(&mut self, reader: &EbmlReader<'_>, element: &ElementHeader) -> Result<()> {
        match element.id {
            elements::INFO => self.info = SegmentInfo::parse(reader, element)?,
            elements::TRACKS => self.tracks = Tracks::parse(reader, element)?,
            elements::CUES => {
                self.cues = Some(Cues::parse(reader, element, self.info.timecode_scale)?)
            }
            elements::SEEK_HEAD => {
                if let Some(position) = self.parse_seek_head(reader, element)? {
                    self.cues_position = Some(position);
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Absolute position of the Cues element, if the SeekHead lists one.
    fn parse_seek_head(
        &self,
        reader: &EbmlReader<'_>,
        element: &ElementHeader,
    ) -> Result<Option<u64>> {
        let mut cues_position = None;
        reader.for_each_child(element, |seek| {
            if seek.id != elements::SEEK {
                return Ok(());
            }

            let mut id = None;
            let mut position = None;
            reader.for_each_child(seek, |field| {
                match field.id {
                    elements::SEEK_ID => {
                        id = Some(read_unsigned_int(&reader.read_payload(field, 4)?) as u32)
                    }
                    elements::SEEK_POSITION => position = Some(reader.read_uint(field)?),
                    _ => {}
                }
                Ok(())
            })?;

            if let (Some(elements::CUES), Some(position)) = (id, position) {
                cues_position = Some(self.start + position);
            }
            Ok(())
        })?;
        Ok(cues_position)
    }

    /// Parse the Cues element the SeekHead points at.
    ///
    /// Returns `true` once cues are available, `false` if the segment has
    /// none that can be located.
    pub fn load_cues(&mut self) -> Result<Progress<bool>> {
        if self.cues.is_some() {
            return Ok(Progress::Ready(true));
        }
        let Some(position) = self.cues_position else {
            return Ok(Progress::Ready(false));
        };

        let source = Arc::clone(&self.source);
        let reader = EbmlReader::new(source.as_ref(), self.limits);
        let element = ready!(reader.read_header(position).transient()?);
        if element.id != elements::CUES {
            tracing::debug!(position, "SeekHead entry does not point at Cues");
            self.cues_position = None;
            return Ok(Progress::Ready(false));
        }

        let size = element.size.ok_or_else(|| MkvError::InvalidElementSize {
            offset: position,
            message: "Cues must have a known size".into(),
        })?;
        ready!(reader.require(element.data_start(), size).transient()?);
        let cues = Cues::parse(&reader, &element, self.info.timecode_scale)?;
        tracing::debug!(points = cues.len(), position, "Cues loaded");
        self.cues = Some(cues);
        Ok(Progress::Ready(true))
    }

    // =========================================================================
    // Cluster parsing
    // =========================================================================

    /// Parse the next cluster without mutating the segment.
    ///
    /// Level-1 elements between clusters are skipped; Cues met on the way
    /// are carried along in the result. Returns `NeedMoreData` if the next
    /// cluster is not fully available yet, and a result without a cluster
    /// once the end of the segment is reached.
    pub fn parse_cluster(&self) -> Result<Progress<ParsedCluster>> {
        if !self.headers_done {
            return Err(MkvError::InvalidArgument(
                "segment headers must be parsed before clusters".into(),
            ));
        }
        if self.eos {
            return Ok(Progress::Ready(ParsedCluster {
                cluster: None,
                next_pos: self.pos,
                cues: None,
            }));
        }

        let reader = self.reader();
        let stop = self.stop();
        let mut pos = self.pos;
        let mut cues = None;

        loop {
            if stop.is_some_and(|stop| pos >= stop) {
                return Ok(Progress::Ready(ParsedCluster {
                    cluster: None,
                    next_pos: pos,
                    cues,
                }));
            }

            let element = ready!(reader.read_header(pos).transient()?);
            if element.id == elements::CLUSTER {
                let ctx = ClusterContext {
                    segment_start: self.start,
                    segment_stop: stop,
                    timecode_scale: self.info.timecode_scale,
                };
                let (cluster, end) = ready!(Cluster::parse(&reader, &element, ctx)?);

                if let Some(last) = self.clusters.last() {
                    if cluster.timecode() < last.timecode() {
                        return Err(MkvError::InvalidTimestamp {
                            offset: element.position,
                        });
                    }
                }

                return Ok(Progress::Ready(ParsedCluster {
                    cluster: Some(cluster),
                    next_pos: end,
                    cues,
                }));
            }

            let (size, end) = match (element.size, element.end()) {
                (Some(size), Some(end)) => (size, end),
                _ => {
                    return Err(MkvError::InvalidElementSize {
                        offset: element.position,
                        message: format!(
                            "unknown-size {} between clusters",
                            elements::element_name(element.id)
                        ),
                    })
                }
            };

            if element.id == elements::CUES && self.cues.is_none() && cues.is_none() {
                ready!(reader.require(element.data_start(), size).transient()?);
                cues = Some(Cues::parse(&reader, &element, self.info.timecode_scale)?);
            }
            pos = end;
        }
    }

    /// Append the result of [`parse_cluster`](Self::parse_cluster).
    ///
    /// Returns `true` when no parsing work remains; the segment is then
    /// marked complete and further parse steps yield no clusters.
    pub fn add_cluster(&mut self, parsed: ParsedCluster) -> bool {
        let ParsedCluster {
            cluster,
            next_pos,
            cues,
        } = parsed;

        if let Some(cues) = cues {
            if self.cues.is_none() {
                tracing::debug!(points = cues.len(), "Cues found after clusters");
                self.cues = Some(cues);
            }
        }

        let reached_end = cluster.is_none();
        if let Some(mut cluster) = cluster {
            let index = self.clusters.len();
            cluster.set_index(index);
            tracing::debug!(
                cluster = index,
                position = cluster.position(),
                time_ns = cluster.time_ns(),
                blocks = cluster.len(),
                "Cluster added"
            );
            self.clusters.push(cluster);
        }
        self.pos = self.pos.max(next_pos);

        if (reached_end || self.unparsed() <= 0) && !self.eos {
            self.eos = true;
            tracing::debug!(clusters = self.clusters.len(), "Segment fully parsed");
        }
        self.eos
    }

    /// Parse headers and every cluster currently available.
    pub fn load_all(&mut self) -> Result<Progress<()>> {
        ready!(self.parse_headers()?);
        while !self.eos {
            let parsed = ready!(self.parse_cluster()?);
            self.add_cluster(parsed);
        }
        Ok(Progress::Ready(()))
    }

    /// Bytes of the segment not yet consumed by cluster parsing.
    ///
    /// `i64::MAX` while the end of the segment is unknown; zero or less once
    /// nothing remains to be parsed.
    pub fn unparsed(&self) -> i64 {
        if self.eos {
            return 0;
        }
        match self.stop() {
            Some(stop) => (stop as i64).saturating_sub(self.pos as i64),
            None => i64::MAX,
        }
    }

    /// Check if every cluster has been parsed.
    pub fn is_fully_parsed(&self) -> bool {
        self.unparsed() <= 0
    }

    /// Absolute end of the segment: the declared size, capped by the source
    /// length once that is final.
    fn stop(&self) -> Option<u64> {
        // A failing length query is treated like an unknown length
        let total = self.source.length().ok().and_then(|len| len.total);
        let declared = self.size.map(|size| self.start.saturating_add(size));
        match (declared, total) {
            (Some(declared), Some(total)) => Some(declared.min(total)),
            (declared, total) => declared.or(total),
        }
    }

    fn reader(&self) -> EbmlReader<'_> {
        EbmlReader::new(self.source.as_ref(), self.limits)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The byte source.
    pub fn source(&self) -> &Arc<dyn ByteSource> {
        &self.source
    }

    /// Parser configuration.
    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// The validated EBML header.
    pub fn ebml_header(&self) -> &EbmlHeader {
        &self.header
    }

    /// Segment information.
    pub fn info(&self) -> &SegmentInfo {
        &self.info
    }

    /// Video and audio tracks.
    pub fn tracks(&self) -> &Tracks {
        &self.tracks
    }

    /// Cue index, once found.
    pub fn cues(&self) -> Option<&Cues> {
        self.cues.as_ref()
    }

    /// Check if [`parse_headers`](Self::parse_headers) has completed.
    pub fn headers_parsed(&self) -> bool {
        self.headers_done
    }

    /// Absolute offset of the segment payload.
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Parsed clusters, in file order.
    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    /// Cluster at `index`.
    pub fn cluster(&self, index: usize) -> Option<&Cluster> {
        self.clusters.get(index)
    }

    /// Block behind a block index.
    pub fn block(&self, index: BlockIndex) -> Option<&Block> {
        self.clusters.get(index.cluster)?.block(index.block)
    }

    /// Block behind an entry, unless end of stream.
    pub fn entry_block(&self, entry: BlockEntry) -> Option<&Block> {
        entry.index().and_then(|index| self.block(index))
    }

    // =========================================================================
    // Time navigation
    // =========================================================================

    /// Duration used for navigation bounds, in nanoseconds.
    ///
    /// The declared duration when present; otherwise the time of the latest
    /// block once everything is parsed; otherwise unbounded.
    pub fn effective_duration_ns(&self) -> i64 {
        if let Some(duration) = self.info.duration_ns() {
            return duration;
        }
        if self.is_fully_parsed() {
            return self
                .clusters
                .iter()
                .map(Cluster::last_time_ns)
                .max()
                .unwrap_or(0)
                .max(0);
        }
        i64::MAX
    }

    /// Cluster containing `time_ns`: the last cluster whose base time is at
    /// or before it, or the first cluster for earlier times.
    ///
    /// End of stream when no cluster is parsed or `time_ns` is at or past the
    /// duration.
    pub fn find_cluster(&self, time_ns: i64) -> ClusterRef {
        if self.clusters.is_empty() || time_ns >= self.effective_duration_ns() {
            return ClusterRef::EndOfStream;
        }
        let after = self.clusters.partition_point(|c| c.time_ns() <= time_ns);
        ClusterRef::Cluster(after.saturating_sub(1))
    }

    /// Resolve `time_ns` to a cluster and the first entry of `track` at or
    /// after it that the track accepts as a starting point.
    ///
    /// The returned cluster is the one holding the entry. Scanning continues
    /// into later clusters when the located one has no suitable block.
    pub fn find_entry(&self, time_ns: i64, track: &Track) -> Progress<(ClusterRef, BlockEntry)> {
        self.find_entry_where(time_ns, track, |block| track.vet_entry(block))
    }

    /// Like [`find_entry`](Self::find_entry) but accepting any block of the
    /// track, as stop positions need.
    pub(crate) fn find_any_entry(
        &self,
        time_ns: i64,
        track: &Track,
    ) -> Progress<(ClusterRef, BlockEntry)> {
        self.find_entry_where(time_ns, track, |_| true)
    }

    fn find_entry_where<P>(
        &self,
        time_ns: i64,
        track: &Track,
        mut accept: P,
    ) -> Progress<(ClusterRef, BlockEntry)>
    where
        P: FnMut(&Block) -> bool,
    {
        let ClusterRef::Cluster(cluster) = self.find_cluster(time_ns) else {
            if self.clusters.is_empty() && !self.is_fully_parsed() {
                return Progress::NeedMoreData;
            }
            return Progress::Ready((ClusterRef::EndOfStream, BlockEntry::EndOfStream));
        };

        let from = BlockIndex { cluster, block: 0 };
        match self.scan_track(track.number, from, |b| b.time_ns >= time_ns && accept(b)) {
            Progress::Ready(BlockEntry::Block(index)) => {
                tracing::trace!(
                    track = track.number,
                    time_ns,
                    cluster = index.cluster,
                    block = index.block,
                    "Entry resolved"
                );
                Progress::Ready((ClusterRef::Cluster(index.cluster), BlockEntry::Block(index)))
            }
            Progress::Ready(BlockEntry::EndOfStream) => {
                Progress::Ready((ClusterRef::EndOfStream, BlockEntry::EndOfStream))
            }
            Progress::NeedMoreData => Progress::NeedMoreData,
        }
    }

    /// First entry of `track` from the start of cluster `index` onwards that
    /// the track accepts as a starting point.
    pub fn cluster_entry(&self, index: usize, track: &Track) -> Progress<BlockEntry> {
        let from = BlockIndex {
            cluster: index,
            block: 0,
        };
        self.scan_track(track.number, from, |b| track.vet_entry(b))
    }

    /// Scan forward from `from` for a block of `track` matching `pred`.
    ///
    /// Running out of parsed clusters is `NeedMoreData` unless the segment is
    /// fully parsed. While parsing is still under way a single scan visits at
    /// most `max_cluster_scan` clusters and then also reports `NeedMoreData`;
    /// once the segment is fully parsed the scan runs to the last cluster.
    pub(crate) fn scan_track<P>(
        &self,
        track: u64,
        from: BlockIndex,
        mut pred: P,
    ) -> Progress<BlockEntry>
    where
        P: FnMut(&Block) -> bool,
    {
        let mut cluster = from.cluster;
        let mut start = from.block;
        let mut visited = 0;

        loop {
            let Some(c) = self.clusters.get(cluster) else {
                if self.is_fully_parsed() {
                    return Progress::Ready(BlockEntry::EndOfStream);
                }
                return Progress::NeedMoreData;
            };
            if visited >= self.config.max_cluster_scan && !self.is_fully_parsed() {
                tracing::trace!(track, from = from.cluster, "Cluster scan limit reached");
                return Progress::NeedMoreData;
            }

            if let Some(block) = c.find_block(start, |b| b.track_number == track && pred(b)) {
                return Progress::Ready(BlockEntry::new(cluster, block));
            }
            cluster += 1;
            start = 0;
            visited += 1;
        }
    }
}

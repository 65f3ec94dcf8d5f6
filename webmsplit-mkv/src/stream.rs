//! Per-track playback cursors.
//!
//! A [`Stream`] walks one track's blocks between a current position and a
//! stop position, delivering each block to a [`SampleSink`]. It holds no
//! reference to the [`Segment`]; every call borrows it, so one segment can
//! back any number of streams under a single lock.
//!
//! Positions handed to and returned from a stream are reference ticks
//! (100 ns units). Internally everything is kept in nanoseconds.

use webmsplit_core::error::Status;
use webmsplit_core::sample::{SampleFlags, SampleSink};
use webmsplit_core::timestamp::{nanos_to_reference, reference_to_nanos, Timestamp};

use crate::block::BlockEntry;
use crate::error::{MkvError, Result};
use crate::progress::{ready, Progress, Transient};
use crate::segment::{ClusterRef, Segment};
use crate::track::Track;

/// How a seek position is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeekMode {
    /// Time from the start of the segment.
    Absolute,
    /// Offset from the position being changed.
    Relative,
    /// Offset from the current position. Only meaningful for stop positions.
    Incremental,
}

/// Result of [`Stream::populate_sample`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopulateStatus {
    /// The sink holds a new sample.
    Filled,
    /// The stop position was reached. The sink is untouched.
    EndOfStream,
    /// The block at the cursor was unusable and has been stepped over.
    Skipped,
}

impl From<PopulateStatus> for Status {
    /// A skipped block is not a failure; callers just populate again.
    fn from(status: PopulateStatus) -> Self {
        match status {
            PopulateStatus::Filled | PopulateStatus::Skipped => Status::Ok,
            PopulateStatus::EndOfStream => Status::EndOfStream,
        }
    }
}

/// Result of [`Stream::preload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreloadStatus {
    /// A cluster was added and more may follow.
    MoreToParse,
    /// The segment is fully parsed.
    Done,
}

/// Where the next sample comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cursor {
    /// Start at the track's first block once one is parsed.
    Uninitialized,
    /// A seek target whose clusters are not parsed yet.
    Pending(i64),
    /// A resolved entry.
    Entry(BlockEntry),
}

/// Where delivery ends.
///
/// A stop is a fixed point in the track, not relative to the cursor. It
/// stays in force across seeks, so seeking to or past it ends delivery at
/// once until a new stop is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopPosition {
    /// Play to the end of the track.
    End,
    /// Stop before delivering this entry.
    Entry(BlockEntry),
    /// A stop time whose clusters are not parsed yet, in nanoseconds.
    Pending(i64),
    /// Stop before delivering anything. Set when a stop collapses onto a
    /// cursor that has no entry yet.
    Immediate,
}

/// Playback cursor over one video or audio track.
#[derive(Debug, Clone)]
pub struct Stream {
    track: Track,
    curr: Cursor,
    stop: StopPosition,
    base: Option<ClusterRef>,
    discontinuity: bool,
}

impl Stream {
    /// Create a stream positioned at the start of `track`.
    pub fn new(track: Track) -> Self {
        Self {
            track,
            curr: Cursor::Uninitialized,
            stop: StopPosition::End,
            base: None,
            discontinuity: true,
        }
    }

    /// Create a stream if `track` uses a supported codec.
    pub fn create(track: &Track) -> Option<Self> {
        if track.is_supported() {
            Some(Self::new(track.clone()))
        } else {
            tracing::debug!(
                track = track.number,
                codec = %track.codec_id,
                "No stream for unsupported codec"
            );
            None
        }
    }

    /// The underlying track.
    pub fn track(&self) -> &Track {
        &self.track
    }

    /// Stable identifier, e.g. `Video001`.
    pub fn id(&self) -> String {
        format!("{}{:03}", self.track.kind.name(), self.track.number)
    }

    /// Display name: codec name, then track name, then `Track N`.
    pub fn name(&self) -> String {
        [&self.track.codec_name, &self.track.name]
            .into_iter()
            .flatten()
            .find(|s| !s.is_empty())
            .cloned()
            .unwrap_or_else(|| format!("Track {}", self.track.number))
    }

    /// Current stop position.
    pub fn stop_position(&self) -> StopPosition {
        self.stop
    }

    /// Base cluster chosen by the last positioning call.
    pub fn base(&self) -> Option<ClusterRef> {
        self.base
    }

    // =========================================================================
    // Time queries (reference ticks)
    // =========================================================================

    /// Segment duration.
    pub fn duration(&self, segment: &Segment) -> i64 {
        nanos_to_reference(segment.effective_duration_ns())
    }

    /// How far playback can currently reach.
    ///
    /// The full duration once parsing is complete, else the start of the
    /// last parsed cluster.
    pub fn available(&self, segment: &Segment) -> i64 {
        if segment.is_fully_parsed() {
            return self.duration(segment);
        }
        segment
            .clusters()
            .last()
            .map_or(0, |c| nanos_to_reference(c.time_ns()))
    }

    /// Time of the next sample to be delivered.
    pub fn curr_time(&self, segment: &Segment) -> i64 {
        nanos_to_reference(self.curr_time_ns(segment))
    }

    /// Time at which delivery stops.
    pub fn stop_time(&self, segment: &Segment) -> i64 {
        nanos_to_reference(self.stop_time_ns(segment))
    }

    fn curr_time_ns(&self, segment: &Segment) -> i64 {
        match self.curr {
            Cursor::Uninitialized => 0,
            Cursor::Pending(time_ns) => time_ns,
            Cursor::Entry(entry) => self.entry_time_ns(segment, entry),
        }
    }

    fn stop_time_ns(&self, segment: &Segment) -> i64 {
        match self.stop {
            StopPosition::End => segment.effective_duration_ns(),
            StopPosition::Entry(entry) => self.entry_time_ns(segment, entry),
            StopPosition::Pending(time_ns) => time_ns,
            StopPosition::Immediate => self.curr_time_ns(segment),
        }
    }

    fn entry_time_ns(&self, segment: &Segment, entry: BlockEntry) -> i64 {
        segment
            .entry_block(entry)
            .map_or_else(|| segment.effective_duration_ns(), |b| b.time_ns)
    }

    // =========================================================================
    // Positioning
    // =========================================================================

    /// Translate a current-position request into nanoseconds.
    ///
    /// `Incremental` is rejected: it only applies to stop positions.
    pub fn get_seek_time(&self, segment: &Segment, position: i64, mode: SeekMode) -> Result<i64> {
        let offset = reference_to_nanos(position);
        match mode {
            SeekMode::Absolute => Ok(offset),
            SeekMode::Relative => Ok(self.curr_time_ns(segment).saturating_add(offset)),
            SeekMode::Incremental => Err(MkvError::InvalidArgument(
                "incremental mode applies to stop positions only".into(),
            )),
        }
    }

    /// Cluster a seek to `time_ns` would start from.
    ///
    /// `None` means the start of the track, or a target not parsed yet.
    pub fn get_seek_base(&self, segment: &Segment, time_ns: i64) -> Option<ClusterRef> {
        if segment.clusters().is_empty() {
            return segment.is_fully_parsed().then_some(ClusterRef::EndOfStream);
        }
        if time_ns <= 0 {
            return None;
        }
        if time_ns >= segment.effective_duration_ns() {
            return Some(ClusterRef::EndOfStream);
        }
        match segment.find_entry(time_ns, &self.track) {
            Progress::Ready((cluster, _)) => Some(cluster),
            Progress::NeedMoreData => Some(segment.find_cluster(time_ns)),
        }
    }

    /// Move the cursor to the first acceptable entry at or after `time_ns`.
    ///
    /// Returns the base cluster chosen, which other streams can align to
    /// with [`set_curr_base`](Self::set_curr_base).
    pub fn set_curr_time(&mut self, segment: &Segment, time_ns: i64) -> Option<ClusterRef> {
        let (curr, base) = if segment.clusters().is_empty() {
            if segment.is_fully_parsed() {
                (
                    Cursor::Entry(BlockEntry::EndOfStream),
                    Some(ClusterRef::EndOfStream),
                )
            } else if time_ns <= 0 {
                (Cursor::Uninitialized, None)
            } else {
                (Cursor::Pending(time_ns), None)
            }
        } else if time_ns <= 0 {
            (Cursor::Uninitialized, None)
        } else if time_ns >= segment.effective_duration_ns() {
            (
                Cursor::Entry(BlockEntry::EndOfStream),
                Some(ClusterRef::EndOfStream),
            )
        } else {
            match segment.find_entry(time_ns, &self.track) {
                Progress::Ready((cluster, entry)) => (Cursor::Entry(entry), Some(cluster)),
                Progress::NeedMoreData => (Cursor::Pending(time_ns), None),
            }
        };

        self.curr = curr;
        self.base = base;
        self.discontinuity = true;
        tracing::debug!(
            stream = %self.id(),
            time_ns,
            cursor = ?self.curr,
            base = ?self.base,
            "Current position set"
        );
        base
    }

    /// Move the cursor to `position` interpreted per `mode`.
    pub fn set_curr_position(
        &mut self,
        segment: &Segment,
        position: i64,
        mode: SeekMode,
    ) -> Result<Option<ClusterRef>> {
        let time_ns = self.get_seek_time(segment, position, mode)?;
        Ok(self.set_curr_time(segment, time_ns))
    }

    /// Align the cursor to a base cluster chosen by another stream.
    ///
    /// `None` restarts from the track's first block.
    pub fn set_curr_base(&mut self, segment: &Segment, base: Option<ClusterRef>) {
        self.curr = match base {
            None => Cursor::Uninitialized,
            Some(ClusterRef::EndOfStream) => Cursor::Entry(BlockEntry::EndOfStream),
            Some(ClusterRef::Cluster(index)) => match segment.cluster_entry(index, &self.track) {
                Progress::Ready(entry) => Cursor::Entry(entry),
                Progress::NeedMoreData => {
                    Cursor::Pending(segment.cluster(index).map_or(0, |c| c.time_ns()))
                }
            },
        };
        self.base = base;
        self.discontinuity = true;
        tracing::debug!(stream = %self.id(), base = ?base, cursor = ?self.curr, "Aligned to base");
    }

    /// Set where delivery ends.
    ///
    /// A stop at or before the current position stops immediately; one at
    /// or past the duration plays to the end. `Incremental` positions are
    /// offsets from the current position, and a non-positive one stops at
    /// the current position.
    pub fn set_stop_position(
        &mut self,
        segment: &Segment,
        position: i64,
        mode: SeekMode,
    ) -> Result<()> {
        if segment.clusters().is_empty() || self.curr == Cursor::Entry(BlockEntry::EndOfStream) {
            self.stop = StopPosition::End;
            return Ok(());
        }

        let curr_ns = self.curr_time_ns(segment);
        let offset = reference_to_nanos(position);
        let stop_ns = match mode {
            SeekMode::Absolute => offset,
            SeekMode::Relative => self.stop_time_ns(segment).saturating_add(offset),
            SeekMode::Incremental if position <= 0 => {
                self.stop = self.stop_here();
                return Ok(());
            }
            SeekMode::Incremental => curr_ns.saturating_add(offset),
        };

        self.stop = if stop_ns <= curr_ns {
            self.stop_here()
        } else if stop_ns >= segment.effective_duration_ns() {
            StopPosition::End
        } else {
            match segment.find_any_entry(stop_ns, &self.track) {
                Progress::Ready((_, BlockEntry::EndOfStream)) => StopPosition::End,
                Progress::Ready((_, entry)) => StopPosition::Entry(entry),
                Progress::NeedMoreData => StopPosition::Pending(stop_ns),
            }
        };
        tracing::debug!(stream = %self.id(), stop_ns, stop = ?self.stop, "Stop position set");
        Ok(())
    }

    fn stop_here(&self) -> StopPosition {
        match self.curr {
            Cursor::Entry(entry) => StopPosition::Entry(entry),
            Cursor::Uninitialized | Cursor::Pending(_) => StopPosition::Immediate,
        }
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Parse and add one more cluster.
    pub fn preload(&self, segment: &mut Segment) -> Result<Progress<PreloadStatus>> {
        let parsed = ready!(segment.parse_cluster()?);
        if segment.add_cluster(parsed) {
            Ok(Progress::Ready(PreloadStatus::Done))
        } else {
            Ok(Progress::Ready(PreloadStatus::MoreToParse))
        }
    }

    /// Parse ahead so that a seek to `time_ns` can resolve.
    ///
    /// Uses the cue index to find the cluster holding this track's first cue
    /// at or after the target, and preloads until that cluster is parsed.
    /// Does nothing without cues or once everything is parsed.
    pub fn preload_seek(&self, segment: &mut Segment, time_ns: i64) -> Result<Progress<()>> {
        if !segment.config().use_cues || segment.is_fully_parsed() {
            return Ok(Progress::Ready(()));
        }
        if segment.cues().is_none() {
            // Cues at the tail of a file still being written are not an error
            let found = segment.load_cues()?.ready().unwrap_or(false);
            if !found {
                return Ok(Progress::Ready(()));
            }
        }

        ready!(self.preload(segment)?);
        let Some(last_ns) = segment.clusters().last().map(|c| c.time_ns()) else {
            return Ok(Progress::Ready(()));
        };
        if time_ns <= last_ns {
            return Ok(Progress::Ready(()));
        }

        let target = segment
            .cues()
            .and_then(|cues| cues.find_next(time_ns, self.track.number))
            .map(|(_, position)| position.cluster_position);
        let Some(target) = target else {
            return Ok(Progress::Ready(()));
        };
        tracing::debug!(stream = %self.id(), time_ns, target, "Preloading to cue");

        loop {
            let reached = segment
                .clusters()
                .last()
                .is_some_and(|c| c.position() >= target);
            if reached || segment.is_fully_parsed() {
                return Ok(Progress::Ready(()));
            }
            if ready!(self.preload(segment)?) == PreloadStatus::Done {
                return Ok(Progress::Ready(()));
            }
        }
    }

    // =========================================================================
    // Sample delivery
    // =========================================================================

    /// Deliver the block at the cursor into `sink` and advance.
    ///
    /// At the stop position this returns [`PopulateStatus::EndOfStream`]
    /// without touching the sink. A sink too small for the payload fails the
    /// call and leaves the cursor where it was.
    pub fn populate_sample(
        &mut self,
        segment: &Segment,
        sink: &mut dyn SampleSink,
    ) -> Result<Progress<PopulateStatus>> {
        let curr = match self.curr {
            Cursor::Uninitialized => {
                let entry = ready!(self.track.first(segment));
                self.curr = Cursor::Entry(entry);
                self.base = (!segment.clusters().is_empty()).then_some(ClusterRef::Cluster(0));
                entry
            }
            Cursor::Pending(time_ns) => {
                let (base, entry) = ready!(segment.find_entry(time_ns, &self.track));
                self.curr = Cursor::Entry(entry);
                self.base = Some(base);
                entry
            }
            Cursor::Entry(entry) => entry,
        };

        let BlockEntry::Block(index) = curr else {
            return Ok(Progress::Ready(PopulateStatus::EndOfStream));
        };
        let block = segment
            .block(index)
            .ok_or_else(|| MkvError::Other(format!("stale block entry {:?}", index)))?;

        let stopped = match self.stop {
            StopPosition::End => false,
            StopPosition::Immediate => true,
            StopPosition::Entry(BlockEntry::EndOfStream) => false,
            StopPosition::Entry(BlockEntry::Block(stop)) => index >= stop,
            StopPosition::Pending(stop_ns) => block.time_ns >= stop_ns,
        };
        if stopped {
            tracing::trace!(stream = %self.id(), "Stop position reached");
            return Ok(Progress::Ready(PopulateStatus::EndOfStream));
        }

        let next = ready!(self.track.next_block(segment, index));
        let next_time = ready!(self.track.next_time(segment, next));

        let base_ns = self
            .base
            .and_then(|b| b.index())
            .and_then(|i| segment.cluster(i))
            .map_or(0, |c| c.first_time_ns());

        // Audio may start before the video key frame that chose the base
        let before_base = self.track.is_audio() && block.time_ns < base_ns;
        if block.time_ns < 0 || before_base {
            tracing::trace!(
                stream = %self.id(),
                time_ns = block.time_ns,
                base_ns,
                "Skipping block before base"
            );
            self.curr = Cursor::Entry(next);
            return Ok(Progress::Ready(PopulateStatus::Skipped));
        }

        let size = usize::try_from(block.data_size).map_err(|_| MkvError::InvalidBlock {
            offset: block.data_offset,
            message: "payload too large".into(),
        })?;
        let available = sink.capacity();
        if size > available {
            return Err(MkvError::BufferTooSmall {
                needed: size,
                available,
            });
        }
        ready!(segment
            .source()
            .read(block.data_offset, sink.payload_mut(size))
            .transient()?);

        let (start, stop) = if block.bframe {
            (None, None)
        } else {
            let relative = |time_ns: i64| {
                Timestamp::from_reference(nanos_to_reference(time_ns.saturating_sub(base_ns)))
            };
            let stop = segment.entry_block(next_time).map(|b| relative(b.time_ns));
            (Some(relative(block.time_ns)), stop)
        };

        let mut flags = SampleFlags::empty();
        flags.set(SampleFlags::KEYFRAME, block.keyframe);
        flags.set(SampleFlags::DISCONTINUITY, self.discontinuity);
        flags.set(SampleFlags::DISCARDABLE, block.discardable);
        sink.set_times(start, stop);
        sink.set_flags(flags);

        self.curr = Cursor::Entry(next);
        self.discontinuity = false;
        Ok(Progress::Ready(PopulateStatus::Filled))
    }
}

/// Build a stream for every track accepted by `predicate`, using
/// `constructor`. Tracks the constructor declines are left out.
///
/// ```ignore
/// let video = create_streams(&segment, Track::is_video, Stream::create);
/// ```
pub fn create_streams<S, P, C>(segment: &Segment, mut predicate: P, mut constructor: C) -> Vec<S>
where
    P: FnMut(&Track) -> bool,
    C: FnMut(&Track) -> Option<S>,
{
    segment
        .tracks()
        .iter()
        .filter(|track| predicate(track))
        .filter_map(|track| constructor(track))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParserConfig;
    use crate::fixtures::*;
    use crate::source::BufferSource;
    use std::sync::Arc;
    use webmsplit_core::sample::MediaSample;

    fn loaded(bytes: Vec<u8>) -> Segment {
        let mut segment = Segment::open(Arc::new(BufferSource::from_vec(bytes)), ParserConfig::default())
            .unwrap()
            .ready()
            .unwrap();
        assert!(segment.parse_headers().unwrap().is_ready());
        assert!(segment.load_all().unwrap().is_ready());
        segment
    }

    fn streams(segment: &Segment) -> (Stream, Stream) {
        let mut video = create_streams(segment, Track::is_video, Stream::create);
        let mut audio = create_streams(segment, Track::is_audio, Stream::create);
        (video.remove(0), audio.remove(0))
    }

    fn populate(stream: &mut Stream, segment: &Segment, sample: &mut MediaSample) -> PopulateStatus {
        stream.populate_sample(segment, sample).unwrap().ready().unwrap()
    }

    #[test]
    fn test_identity() {
        let segment = loaded(file(&[0], Some(1000.0)));
        let (video, audio) = streams(&segment);
        assert_eq!(video.id(), "Video001");
        assert_eq!(audio.id(), "Audio002");
        assert_eq!(video.name(), "Track 1");
    }

    #[test]
    fn test_populate_walks_track() {
        let segment = loaded(file(&[0, 1000], Some(2000.0)));
        let (mut video, _) = streams(&segment);
        let mut sample = MediaSample::with_capacity(64);

        assert_eq!(populate(&mut video, &segment, &mut sample), PopulateStatus::Filled);
        assert!(sample.is_keyframe());
        assert!(sample.is_discontinuity());
        assert_eq!(sample.data(), &[1u8; 8]);
        assert_eq!(sample.start().unwrap().as_reference(), 0);
        assert_eq!(sample.stop().unwrap().as_reference(), 5_000_000);

        assert_eq!(populate(&mut video, &segment, &mut sample), PopulateStatus::Filled);
        assert!(!sample.is_keyframe());
        assert!(!sample.is_discontinuity());
        assert_eq!(sample.stop().unwrap().as_reference(), 10_000_000);

        populate(&mut video, &segment, &mut sample);
        populate(&mut video, &segment, &mut sample);
        assert!(sample.stop().is_none());
        assert_eq!(populate(&mut video, &segment, &mut sample), PopulateStatus::EndOfStream);
        assert_eq!(video.curr_time(&segment), video.duration(&segment));
    }

    #[test]
    fn test_seek_time_modes() {
        let segment = loaded(file(&[0, 1000], Some(2000.0)));
        let (mut video, _) = streams(&segment);

        assert_eq!(
            video.get_seek_time(&segment, 5_000_000, SeekMode::Absolute).unwrap(),
            500_000_000
        );
        video.set_curr_time(&segment, 1_000_000_000);
        assert_eq!(
            video.get_seek_time(&segment, 1_000_000, SeekMode::Relative).unwrap(),
            1_100_000_000
        );
        assert!(matches!(
            video.get_seek_time(&segment, 0, SeekMode::Incremental),
            Err(MkvError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_seek_lands_on_keyframe() {
        let segment = loaded(file(&[0, 1000, 2000], Some(3000.0)));
        let (mut video, mut audio) = streams(&segment);

        let base = video
            .set_curr_position(&segment, 2_000_000, SeekMode::Absolute)
            .unwrap();
        assert_eq!(base, Some(ClusterRef::Cluster(1)));
        assert_eq!(video.curr_time(&segment), 10_000_000);
        assert_eq!(video.get_seek_base(&segment, 200_000_000), base);

        audio.set_curr_base(&segment, base);
        assert_eq!(audio.curr_time(&segment), 10_000_000);

        let mut sample = MediaSample::with_capacity(64);
        populate(&mut video, &segment, &mut sample);
        assert_eq!(sample.start().unwrap().as_reference(), 0);
        assert!(sample.is_discontinuity());
    }

    #[test]
    fn test_seek_bounds() {
        let segment = loaded(file(&[0, 1000], Some(2000.0)));
        let (mut video, _) = streams(&segment);

        assert_eq!(video.set_curr_time(&segment, 0), None);
        assert_eq!(video.curr_time(&segment), 0);
        assert_eq!(
            video.set_curr_time(&segment, 5_000_000_000),
            Some(ClusterRef::EndOfStream)
        );
        let mut sample = MediaSample::with_capacity(64);
        assert_eq!(populate(&mut video, &segment, &mut sample), PopulateStatus::EndOfStream);
        assert!(sample.is_empty());
    }

    #[test]
    fn test_stop_positions() {
        let segment = loaded(file(&[0, 1000, 2000], Some(3000.0)));
        let (mut video, _) = streams(&segment);

        video
            .set_stop_position(&segment, 15_000_000, SeekMode::Incremental)
            .unwrap();
        assert_eq!(video.stop_position(), StopPosition::Entry(BlockEntry::new(1, 2)));
        assert_eq!(video.stop_time(&segment), 15_000_000);

        video.set_stop_position(&segment, 0, SeekMode::Incremental).unwrap();
        assert_eq!(video.stop_position(), StopPosition::Immediate);

        video
            .set_stop_position(&segment, 40_000_000, SeekMode::Absolute)
            .unwrap();
        assert_eq!(video.stop_position(), StopPosition::End);

        video
            .set_stop_position(&segment, -5_000_000, SeekMode::Relative)
            .unwrap();
        assert_eq!(video.stop_position(), StopPosition::Entry(BlockEntry::new(2, 2)));
    }

    #[test]
    fn test_immediate_stop_survives_seek() {
        let segment = loaded(file(&[0, 1000, 2000], Some(3000.0)));
        let (mut video, _) = streams(&segment);
        let mut sample = MediaSample::with_capacity(64);

        video.set_stop_position(&segment, 0, SeekMode::Incremental).unwrap();
        assert_eq!(video.stop_position(), StopPosition::Immediate);
        video.set_curr_time(&segment, 1_000_000_000);
        assert_eq!(populate(&mut video, &segment, &mut sample), PopulateStatus::EndOfStream);

        video
            .set_stop_position(&segment, 30_000_000, SeekMode::Absolute)
            .unwrap();
        assert_eq!(populate(&mut video, &segment, &mut sample), PopulateStatus::Filled);
        assert_eq!(sample.start().unwrap().as_reference(), 0);
    }

    #[test]
    fn test_blocks_before_base_are_skipped() {
        let early = cluster_with(
            0,
            &[simple_block(1, -100, true), simple_block(2, -100, true), simple_block(1, 0, true)],
        );
        let late = cluster_with(
            1000,
            &[simple_block(1, 0, true), simple_block(2, -800, true), simple_block(2, 0, true)],
        );
        let segment = loaded(file_with(&[early, late], Some(2000.0)));
        let (mut video, mut audio) = streams(&segment);
        let mut sample = MediaSample::with_capacity(64);

        // Negative times are dropped for every track
        assert_eq!(populate(&mut video, &segment, &mut sample), PopulateStatus::Skipped);
        assert!(sample.is_empty());
        assert_eq!(populate(&mut video, &segment, &mut sample), PopulateStatus::Filled);
        assert!(sample.is_discontinuity());

        // Audio older than the base cluster's first block is dropped
        let base = video.set_curr_time(&segment, 1_000_000_000);
        assert_eq!(base, Some(ClusterRef::Cluster(1)));
        audio.set_curr_base(&segment, base);
        assert_eq!(populate(&mut audio, &segment, &mut sample), PopulateStatus::Skipped);
        assert_eq!(populate(&mut audio, &segment, &mut sample), PopulateStatus::Filled);
        assert_eq!(sample.start().unwrap().as_reference(), 0);
    }

    #[test]
    fn test_buffer_too_small_keeps_cursor() {
        let segment = loaded(file(&[0], Some(1000.0)));
        let (mut video, _) = streams(&segment);

        let mut small = MediaSample::with_capacity(4);
        assert!(matches!(
            video.populate_sample(&segment, &mut small),
            Err(MkvError::BufferTooSmall { needed: 8, available: 4 })
        ));

        small.grow(8);
        assert_eq!(populate(&mut video, &segment, &mut small), PopulateStatus::Filled);
        assert!(small.is_keyframe());
    }

    #[test]
    fn test_available_while_parsing() {
        let bytes = file(&[0, 1000, 2000], Some(3000.0));
        let source = Arc::new(BufferSource::new());
        source.append(&bytes);
        let mut segment = Segment::open(source, ParserConfig::default())
            .unwrap()
            .ready()
            .unwrap();
        assert!(segment.parse_headers().unwrap().is_ready());
        let (video, _) = streams(&segment);

        assert_eq!(video.available(&segment), 0);
        assert_eq!(
            video.preload(&mut segment).unwrap().ready(),
            Some(PreloadStatus::MoreToParse)
        );
        assert_eq!(
            video.preload(&mut segment).unwrap().ready(),
            Some(PreloadStatus::MoreToParse)
        );
        assert_eq!(video.available(&segment), 10_000_000);
        assert_eq!(
            video.preload(&mut segment).unwrap().ready(),
            Some(PreloadStatus::Done)
        );
        assert_eq!(video.available(&segment), 30_000_000);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(Status::from(PopulateStatus::Filled), Status::Ok);
        assert_eq!(Status::from(PopulateStatus::Skipped), Status::Ok);
        assert_eq!(Status::from(PopulateStatus::EndOfStream), Status::EndOfStream);
    }
}

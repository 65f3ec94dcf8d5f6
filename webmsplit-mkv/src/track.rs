//! Tracks and per-track block navigation.
//!
//! Navigation never fails: it either resolves a [`BlockEntry`] or reports
//! [`Progress::NeedMoreData`] when the answer lies in clusters that have not
//! been parsed yet.

use crate::block::{Block, BlockEntry, BlockIndex};
use crate::ebml::{EbmlReader, ElementHeader};
use crate::elements;
use crate::error::{MkvError, Result};
use crate::progress::Progress;
use crate::segment::Segment;

/// Unwrap a [`Progress`] inside a function that itself returns one.
macro_rules! ready_or_wait {
    ($e:expr) => {
        match $e {
            Progress::Ready(value) => value,
            Progress::NeedMoreData => return Progress::NeedMoreData,
        }
    };
}

/// Video track parameters.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VideoSettings {
    /// Pixel width.
    pub width: u64,
    /// Pixel height.
    pub height: u64,
    /// Frame rate, when declared.
    pub frame_rate: Option<f64>,
}

/// Audio track parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSettings {
    /// Sampling frequency in Hz.
    pub sampling_frequency: f64,
    /// Number of channels.
    pub channels: u64,
    /// Bits per sample, when declared.
    pub bit_depth: Option<u64>,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            sampling_frequency: 8000.0,
            channels: 1,
            bit_depth: None,
        }
    }
}

/// Kind-specific track data.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackKind {
    /// A video track.
    Video(VideoSettings),
    /// An audio track.
    Audio(AudioSettings),
}

impl TrackKind {
    /// "Video" or "Audio".
    pub fn name(&self) -> &'static str {
        match self {
            TrackKind::Video(_) => "Video",
            TrackKind::Audio(_) => "Audio",
        }
    }
}

/// Format information a downstream consumer needs to configure a decoder.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaDescription {
    /// Codec identifier.
    pub codec_id: String,
    /// Codec initialization data.
    pub codec_private: Vec<u8>,
    /// Nanoseconds per frame, when declared.
    pub default_duration: Option<u64>,
    /// Video or audio parameters.
    pub kind: TrackKind,
}

/// One video or audio track of a segment.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    /// Track number referenced by blocks.
    pub number: u64,
    /// Track UID.
    pub uid: u64,
    /// Track name.
    pub name: Option<String>,
    /// Codec identifier.
    pub codec_id: String,
    /// Codec private data.
    pub codec_private: Vec<u8>,
    /// Human-readable codec name.
    pub codec_name: Option<String>,
    /// Language (ISO 639-2).
    pub language: Option<String>,
    /// Default frame duration in nanoseconds.
    pub default_duration: Option<u64>,
    /// Video or audio parameters.
    pub kind: TrackKind,
}

impl Track {
    /// Parse a TrackEntry. Returns `None` for tracks that are neither video
    /// nor audio.
    pub(crate) fn parse(reader: &EbmlReader<'_>, entry: &ElementHeader) -> Result<Option<Self>> {
        let mut number = None;
        let mut uid = 0;
        let mut track_type = None;
        let mut name = None;
        let mut codec_id = String::new();
        let mut codec_private = Vec::new();
        let mut codec_name = None;
        let mut language = None;
        let mut default_duration = None;
        let mut video = None;
        let mut audio = None;

        reader.for_each_child(entry, |child| {
            match child.id {
                elements::TRACK_NUMBER => number = Some(reader.read_uint(child)?),
                elements::TRACK_UID => uid = reader.read_uint(child)?,
                elements::TRACK_TYPE => track_type = Some(reader.read_uint(child)?),
                elements::NAME => name = Some(reader.read_string(child)?),
                elements::CODEC_ID => codec_id = reader.read_string(child)?,
                elements::CODEC_PRIVATE => codec_private = reader.read_binary(child)?,
                elements::CODEC_NAME => codec_name = Some(reader.read_string(child)?),
                elements::LANGUAGE => language = Some(reader.read_string(child)?),
                elements::DEFAULT_DURATION => default_duration = Some(reader.read_uint(child)?),
                elements::VIDEO => video = Some(parse_video(reader, child)?),
                elements::AUDIO => audio = Some(parse_audio(reader, child)?),
                _ => {}
            }
            Ok(())
        })?;

        let kind = match track_type {
            Some(elements::TRACK_TYPE_VIDEO) => TrackKind::Video(video.unwrap_or_default()),
            Some(elements::TRACK_TYPE_AUDIO) => TrackKind::Audio(audio.unwrap_or_default()),
            other => {
                tracing::debug!(track_type = ?other, offset = entry.position, "Skipping track");
                return Ok(None);
            }
        };

        let number = number
            .filter(|&n| n > 0)
            .ok_or_else(|| MkvError::MissingElement("TrackNumber".into()))?;

        Ok(Some(Self {
            number,
            uid,
            name,
            codec_id,
            codec_private,
            codec_name,
            language,
            default_duration,
            kind,
        }))
    }

    /// Check if this is a video track.
    pub fn is_video(&self) -> bool {
        matches!(self.kind, TrackKind::Video(_))
    }

    /// Check if this is an audio track.
    pub fn is_audio(&self) -> bool {
        matches!(self.kind, TrackKind::Audio(_))
    }

    /// Check if a stream can be built for this track's codec.
    pub fn is_supported(&self) -> bool {
        match self.kind {
            TrackKind::Video(_) => elements::is_supported_video_codec(&self.codec_id),
            TrackKind::Audio(_) => elements::is_supported_audio_codec(&self.codec_id),
        }
    }

    /// Whether `block` is an acceptable place to start playback.
    ///
    /// Video decoding can only begin at a key frame; any audio block will do.
    pub fn vet_entry(&self, block: &Block) -> bool {
        match self.kind {
            TrackKind::Video(_) => block.keyframe,
            TrackKind::Audio(_) => true,
        }
    }

    /// Codec and format parameters.
    pub fn media_description(&self) -> MediaDescription {
        MediaDescription {
            codec_id: self.codec_id.clone(),
            codec_private: self.codec_private.clone(),
            default_duration: self.default_duration,
            kind: self.kind.clone(),
        }
    }

    /// First block of this track in the parsed clusters.
    pub fn first(&self, segment: &Segment) -> Progress<BlockEntry> {
        segment.scan_track(self.number, BlockIndex { cluster: 0, block: 0 }, |_| true)
    }

    /// Next block of this track after `current`, in parse order.
    pub fn next_block(&self, segment: &Segment, current: BlockIndex) -> Progress<BlockEntry> {
        let from = BlockIndex {
            cluster: current.cluster,
            block: current.block + 1,
        };
        segment.scan_track(self.number, from, |_| true)
    }

    /// Entry whose time bounds the display interval of the block before
    /// `next`.
    ///
    /// For video, B-frames are stepped over since their timecodes are not
    /// monotonic. Audio uses `next` as is.
    pub fn next_time(&self, segment: &Segment, next: BlockEntry) -> Progress<BlockEntry> {
        if self.is_audio() {
            return Progress::Ready(next);
        }

        let mut next = next;
        loop {
            let Some(index) = next.index() else {
                return Progress::Ready(next);
            };
            match segment.block(index) {
                Some(block) if block.bframe => {
                    tracing::trace!(
                        track = self.number,
                        time_ns = block.time_ns,
                        "Stepping over B-frame"
                    );
                    next = ready_or_wait!(self.next_block(segment, index));
                }
                _ => return Progress::Ready(next),
            }
        }
    }
}

fn parse_video(reader: &EbmlReader<'_>, element: &ElementHeader) -> Result<VideoSettings> {
    let mut video = VideoSettings::default();
    reader.for_each_child(element, |child| {
        match child.id {
            elements::PIXEL_WIDTH => video.width = reader.read_uint(child)?,
            elements::PIXEL_HEIGHT => video.height = reader.read_uint(child)?,
            elements::FRAME_RATE => video.frame_rate = Some(reader.read_float(child)?),
            _ => {}
        }
        Ok(())
    })?;
    Ok(video)
}

fn parse_audio(reader: &EbmlReader<'_>, element: &ElementHeader) -> Result<AudioSettings> {
    let mut audio = AudioSettings::default();
    reader.for_each_child(element, |child| {
        match child.id {
            elements::SAMPLING_FREQUENCY => {
                let rate = reader.read_float(child)?;
                if rate > 0.0 {
                    audio.sampling_frequency = rate;
                }
            }
            elements::CHANNELS => audio.channels = reader.read_uint(child)?.max(1),
            elements::BIT_DEPTH => audio.bit_depth = Some(reader.read_uint(child)?),
            _ => {}
        }
        Ok(())
    })?;
    Ok(audio)
}

/// The segment's video and audio tracks, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tracks {
    tracks: Vec<Track>,
}

impl Tracks {
    /// Parse a complete Tracks element.
    pub(crate) fn parse(reader: &EbmlReader<'_>, element: &ElementHeader) -> Result<Self> {
        let mut tracks = Vec::new();
        reader.for_each_child(element, |child| {
            if child.id == elements::TRACK_ENTRY {
                if let Some(track) = Track::parse(reader, child)? {
                    tracks.push(track);
                }
            }
            Ok(())
        })?;
        Ok(Self { tracks })
    }

    /// Track with the given number.
    pub fn get(&self, number: u64) -> Option<&Track> {
        self.tracks.iter().find(|t| t.number == number)
    }

    /// All tracks.
    pub fn iter(&self) -> std::slice::Iter<'_, Track> {
        self.tracks.iter()
    }

    /// Number of tracks.
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    /// Check if there are no tracks.
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

impl<'a> IntoIterator for &'a Tracks {
    type Item = &'a Track;
    type IntoIter = std::slice::Iter<'a, Track>;

    fn into_iter(self) -> Self::IntoIter {
        self.tracks.iter()
    }
}

//! Synthetic WebM byte streams for integration tests.

#![allow(dead_code)]

use webmsplit_mkv::ebml::{write_element_id, write_float, write_unsigned_int, write_vint};
use webmsplit_mkv::elements;
use webmsplit_mkv::EBML_MAGIC;

pub const VIDEO: u8 = 1;
pub const AUDIO: u8 = 2;

pub fn element(id: u32, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    write_element_id(&mut out, id).unwrap();
    write_vint(&mut out, body.len() as u64).unwrap();
    out.extend_from_slice(body);
    out
}

pub fn uint(id: u32, value: u64) -> Vec<u8> {
    let mut body = Vec::new();
    write_unsigned_int(&mut body, value).unwrap();
    element(id, &body)
}

/// A block inside a cluster under construction.
#[derive(Debug, Clone)]
pub struct TestBlock {
    pub track: u8,
    pub relative: i16,
    pub key: bool,
    /// Relative ReferenceBlock values; `Some` writes a BlockGroup.
    pub references: Option<Vec<i8>>,
    pub payload: Vec<u8>,
}

impl TestBlock {
    pub fn key(track: u8, relative: i16) -> Self {
        Self {
            track,
            relative,
            key: true,
            references: None,
            payload: vec![track; 16],
        }
    }

    pub fn delta(track: u8, relative: i16) -> Self {
        Self {
            key: false,
            ..Self::key(track, relative)
        }
    }

    pub fn grouped(track: u8, relative: i16, references: &[i8]) -> Self {
        Self {
            key: false,
            references: Some(references.to_vec()),
            ..Self::key(track, relative)
        }
    }

    pub fn payload(mut self, payload: &[u8]) -> Self {
        self.payload = payload.to_vec();
        self
    }

    fn encode(&self) -> Vec<u8> {
        let mut body = vec![0x80 | self.track];
        body.extend_from_slice(&self.relative.to_be_bytes());
        match &self.references {
            None => {
                body.push(if self.key { 0x80 } else { 0 });
                body.extend_from_slice(&self.payload);
                element(elements::SIMPLE_BLOCK, &body)
            }
            Some(references) => {
                body.push(0);
                body.extend_from_slice(&self.payload);
                let mut group = element(elements::BLOCK, &body);
                for &reference in references {
                    group.extend(element(elements::REFERENCE_BLOCK, &[reference as u8]));
                }
                element(elements::BLOCK_GROUP, &group)
            }
        }
    }
}

/// Builds an EBML header plus one Segment with a 1 ms timecode scale.
#[derive(Debug, Clone)]
pub struct WebmBuilder {
    ebml_version: u64,
    doc_type: String,
    duration_ms: Option<f64>,
    video_codec: Option<String>,
    audio_codec: Option<String>,
    clusters: Vec<(u64, Vec<TestBlock>)>,
    cues: Vec<(u64, u8, usize)>,
    seek_head: bool,
    unknown_size: bool,
}

impl Default for WebmBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl WebmBuilder {
    pub fn new() -> Self {
        Self {
            ebml_version: 1,
            doc_type: "webm".into(),
            duration_ms: None,
            video_codec: Some("V_VP8".into()),
            audio_codec: Some("A_VORBIS".into()),
            clusters: Vec::new(),
            cues: Vec::new(),
            seek_head: false,
            unknown_size: false,
        }
    }

    pub fn ebml_version(mut self, version: u64) -> Self {
        self.ebml_version = version;
        self
    }

    pub fn duration_ms(mut self, duration: f64) -> Self {
        self.duration_ms = Some(duration);
        self
    }

    pub fn video_codec(mut self, codec: Option<&str>) -> Self {
        self.video_codec = codec.map(str::to_string);
        self
    }

    pub fn audio_codec(mut self, codec: Option<&str>) -> Self {
        self.audio_codec = codec.map(str::to_string);
        self
    }

    /// Write a SeekHead pointing at the Cues.
    pub fn seek_head(mut self) -> Self {
        self.seek_head = true;
        self
    }

    pub fn unknown_size(mut self) -> Self {
        self.unknown_size = true;
        self
    }

    pub fn cluster(mut self, timecode: u64, blocks: Vec<TestBlock>) -> Self {
        self.clusters.push((timecode, blocks));
        self
    }

    /// Video key frame and audio at the cluster time plus a video delta
    /// frame 500 ms later.
    pub fn simple_cluster(self, timecode: u64) -> Self {
        self.cluster(
            timecode,
            vec![
                TestBlock::key(VIDEO, 0),
                TestBlock::key(AUDIO, 0),
                TestBlock::delta(VIDEO, 500),
            ],
        )
    }

    /// Add a cue point for `track` at `time_ms` pointing at cluster `index`.
    /// Cues are written after the clusters.
    pub fn cue(mut self, time_ms: u64, track: u8, index: usize) -> Self {
        self.cues.push((time_ms, track, index));
        self
    }

    pub fn ebml_header(&self) -> Vec<u8> {
        let mut body = uint(elements::EBML_VERSION, self.ebml_version);
        body.extend(element(elements::DOC_TYPE, self.doc_type.as_bytes()));
        body.extend(uint(elements::DOC_TYPE_VERSION, 2));
        body.extend(uint(elements::DOC_TYPE_READ_VERSION, 2));
        let mut out = EBML_MAGIC.to_vec();
        write_vint(&mut out, body.len() as u64).unwrap();
        out.extend(body);
        out
    }

    fn info(&self) -> Vec<u8> {
        let mut body = uint(elements::TIMECODE_SCALE, 1_000_000);
        if let Some(duration) = self.duration_ms {
            let mut float = Vec::new();
            write_float(&mut float, duration).unwrap();
            body.extend(element(elements::DURATION, &float));
        }
        element(elements::INFO, &body)
    }

    fn tracks(&self) -> Vec<u8> {
        let mut body = Vec::new();
        if let Some(codec) = &self.video_codec {
            let mut entry = uint(elements::TRACK_NUMBER, VIDEO as u64);
            entry.extend(uint(elements::TRACK_TYPE, elements::TRACK_TYPE_VIDEO));
            entry.extend(element(elements::CODEC_ID, codec.as_bytes()));
            let mut video = uint(elements::PIXEL_WIDTH, 320);
            video.extend(uint(elements::PIXEL_HEIGHT, 240));
            entry.extend(element(elements::VIDEO, &video));
            body.extend(element(elements::TRACK_ENTRY, &entry));
        }
        if let Some(codec) = &self.audio_codec {
            let mut entry = uint(elements::TRACK_NUMBER, AUDIO as u64);
            entry.extend(uint(elements::TRACK_TYPE, elements::TRACK_TYPE_AUDIO));
            entry.extend(element(elements::CODEC_ID, codec.as_bytes()));
            entry.extend(element(elements::AUDIO, &uint(elements::CHANNELS, 2)));
            body.extend(element(elements::TRACK_ENTRY, &entry));
        }
        element(elements::TRACKS, &body)
    }

    fn encode_cluster(timecode: u64, blocks: &[TestBlock]) -> Vec<u8> {
        let mut body = uint(elements::TIMESTAMP, timecode);
        for block in blocks {
            body.extend(block.encode());
        }
        element(elements::CLUSTER, &body)
    }

    /// Segment payload offsets of every cluster, given the metadata size.
    fn cluster_offsets(&self, metadata_len: usize) -> Vec<u64> {
        let mut offsets = Vec::new();
        let mut pos = metadata_len as u64;
        for (timecode, blocks) in &self.clusters {
            offsets.push(pos);
            pos += Self::encode_cluster(*timecode, blocks).len() as u64;
        }
        offsets
    }

    fn cues(&self, offsets: &[u64]) -> Vec<u8> {
        let mut body = Vec::new();
        for &(time, track, index) in &self.cues {
            let mut positions = uint(elements::CUE_TRACK, track as u64);
            positions.extend(uint(elements::CUE_CLUSTER_POSITION, offsets[index]));
            let mut point = uint(elements::CUE_TIME, time);
            point.extend(element(elements::CUE_TRACK_POSITIONS, &positions));
            body.extend(element(elements::CUE_POINT, &point));
        }
        element(elements::CUES, &body)
    }

    /// SeekHead with a fixed-width position so its size never varies.
    fn seek_head_bytes(cues_position: u64) -> Vec<u8> {
        let mut seek = element(elements::SEEK_ID, &elements::CUES.to_be_bytes());
        seek.extend(element(elements::SEEK_POSITION, &cues_position.to_be_bytes()));
        element(elements::SEEK_HEAD, &element(elements::SEEK, &seek))
    }

    pub fn build(&self) -> Vec<u8> {
        let mut metadata = self.info();
        metadata.extend(self.tracks());
        let head_len = if self.seek_head {
            Self::seek_head_bytes(0).len()
        } else {
            0
        };

        let offsets = self.cluster_offsets(head_len + metadata.len());
        let mut clusters = Vec::new();
        for (timecode, blocks) in &self.clusters {
            clusters.extend(Self::encode_cluster(*timecode, blocks));
        }

        let mut body = Vec::new();
        if self.seek_head {
            let cues_position = (head_len + metadata.len() + clusters.len()) as u64;
            body.extend(Self::seek_head_bytes(cues_position));
        }
        body.extend(metadata);
        body.extend(clusters);
        if !self.cues.is_empty() {
            body.extend(self.cues(&offsets));
        }

        let mut out = self.ebml_header();
        if self.unknown_size {
            write_element_id(&mut out, elements::SEGMENT).unwrap();
            out.extend_from_slice(&[0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
            out.extend(body);
        } else {
            out.extend(element(elements::SEGMENT, &body));
        }
        out
    }
}

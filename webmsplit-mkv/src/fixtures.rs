//! Byte-level WebM builders shared by unit tests.

use crate::ebml::{write_element_id, write_float, write_unsigned_int, write_vint};
use crate::elements;
use crate::header::EBML_MAGIC;

pub fn element(id: u32, body: Vec<u8>) -> Vec<u8> {
    let mut out = Vec::new();
    write_element_id(&mut out, id).unwrap();
    write_vint(&mut out, body.len() as u64).unwrap();
    out.extend(body);
    out
}

pub fn uint(id: u32, value: u64) -> Vec<u8> {
    let mut body = Vec::new();
    write_unsigned_int(&mut body, value).unwrap();
    element(id, body)
}

pub fn ebml_header() -> Vec<u8> {
    let mut body = element(elements::DOC_TYPE, b"webm".to_vec());
    body.extend(uint(elements::DOC_TYPE_VERSION, 2));
    body.extend(uint(elements::DOC_TYPE_READ_VERSION, 2));
    let mut out = EBML_MAGIC.to_vec();
    write_vint(&mut out, body.len() as u64).unwrap();
    out.extend(body);
    out
}

/// Info with a 1 ms timecode scale.
pub fn info(duration_ms: Option<f64>) -> Vec<u8> {
    let mut body = uint(elements::TIMECODE_SCALE, 1_000_000);
    if let Some(duration) = duration_ms {
        let mut float = Vec::new();
        write_float(&mut float, duration).unwrap();
        body.extend(element(elements::DURATION, float));
    }
    element(elements::INFO, body)
}

/// Track 1 is VP8 video, track 2 is Vorbis audio.
pub fn tracks() -> Vec<u8> {
    let mut video = uint(elements::TRACK_NUMBER, 1);
    video.extend(uint(elements::TRACK_TYPE, elements::TRACK_TYPE_VIDEO));
    video.extend(element(elements::CODEC_ID, b"V_VP8".to_vec()));
    let mut audio = uint(elements::TRACK_NUMBER, 2);
    audio.extend(uint(elements::TRACK_TYPE, elements::TRACK_TYPE_AUDIO));
    audio.extend(element(elements::CODEC_ID, b"A_VORBIS".to_vec()));
    let mut body = element(elements::TRACK_ENTRY, video);
    body.extend(element(elements::TRACK_ENTRY, audio));
    element(elements::TRACKS, body)
}

fn block_body(track: u8, relative: i16, flags: u8) -> Vec<u8> {
    let mut body = vec![0x80 | track];
    body.extend_from_slice(&relative.to_be_bytes());
    body.push(flags);
    body.extend_from_slice(&[track; 8]);
    body
}

/// SimpleBlock with an 8-byte payload filled with the track number.
pub fn simple_block(track: u8, relative: i16, key: bool) -> Vec<u8> {
    element(
        elements::SIMPLE_BLOCK,
        block_body(track, relative, if key { 0x80 } else { 0 }),
    )
}

/// BlockGroup whose references are relative timecodes.
pub fn block_group(track: u8, relative: i16, references: &[i8]) -> Vec<u8> {
    let mut body = element(elements::BLOCK, block_body(track, relative, 0));
    for &reference in references {
        body.extend(element(elements::REFERENCE_BLOCK, vec![reference as u8]));
    }
    element(elements::BLOCK_GROUP, body)
}

pub fn cluster_with(timecode: u64, blocks: &[Vec<u8>]) -> Vec<u8> {
    let mut body = uint(elements::TIMESTAMP, timecode);
    for block in blocks {
        body.extend_from_slice(block);
    }
    element(elements::CLUSTER, body)
}

/// Video key frame and audio at the cluster time, video delta frame 500 ms in.
pub fn cluster(timecode: u64) -> Vec<u8> {
    cluster_with(
        timecode,
        &[
            simple_block(1, 0, true),
            simple_block(2, 0, true),
            simple_block(1, 500, false),
        ],
    )
}

pub fn file_with(clusters: &[Vec<u8>], duration_ms: Option<f64>) -> Vec<u8> {
    let mut body = info(duration_ms);
    body.extend(tracks());
    for cluster in clusters {
        body.extend_from_slice(cluster);
    }
    let mut out = ebml_header();
    out.extend(element(elements::SEGMENT, body));
    out
}

pub fn file(timecodes: &[u64], duration_ms: Option<f64>) -> Vec<u8> {
    let clusters: Vec<Vec<u8>> = timecodes.iter().map(|&tc| cluster(tc)).collect();
    file_with(&clusters, duration_ms)
}

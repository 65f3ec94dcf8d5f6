#![no_main]

//! Fuzz target for WebM EBML decoding and incremental segment parsing.
//!
//! Feeds arbitrary bytes to the element decoders and drives a segment and
//! its streams over a source that grows in fuzzer-chosen steps.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use std::sync::Arc;
use webmsplit_core::MediaSample;
use webmsplit_mkv::ebml::{encode_vint, EbmlReader, Limits};
use webmsplit_mkv::{
    create_streams, BufferSource, ElementHeader, ParserConfig, Progress, SeekMode, Segment,
    Stream, Track,
};

#[derive(Arbitrary, Debug)]
struct EbmlInput {
    data: Vec<u8>,
    operation: EbmlOperation,
}

#[derive(Arbitrary, Debug)]
enum EbmlOperation {
    /// Decode a variable-length integer (VINT)
    ReadVint,
    /// Decode an element header (ID + size)
    ReadElementHeader,
    /// Encode then decode a VINT
    VintRoundtrip { value: u64 },
    /// Write then read an element header
    ElementHeaderRoundtrip { id: u32, size: u64 },
    /// Parse a segment delivered in chunks, then play and seek its streams
    ParseIncremental { chunk: u16, seek: i64 },
}

fuzz_target!(|input: EbmlInput| {
    // Limit input size to prevent excessive memory allocation
    if input.data.len() > 64 * 1024 {
        return;
    }

    match input.operation {
        EbmlOperation::ReadVint => {
            let source = BufferSource::from_vec(input.data);
            // Should not panic on any input
            let _ = EbmlReader::new(&source, Limits::default()).read_vint(0);
        }

        EbmlOperation::ReadElementHeader => {
            let source = BufferSource::from_vec(input.data);
            let _ = EbmlReader::new(&source, Limits::default()).read_header(0);
        }

        EbmlOperation::VintRoundtrip { value } => {
            let value = value & 0x00FF_FFFF_FFFF_FFFF;

            if let Ok((encoded, len)) = encode_vint(value) {
                let source = BufferSource::from_vec(encoded[..len].to_vec());
                if let Ok(vint) = EbmlReader::new(&source, Limits::default()).read_vint(0) {
                    assert_eq!(value, vint.value, "VINT round-trip mismatch");
                }
            }
        }

        EbmlOperation::ElementHeaderRoundtrip { id, size } => {
            let id = (id & 0x0FFF_FFFF) | 0x1000_0000;
            let size = size & 0x00FF_FFFF_FFFF;

            let header = ElementHeader {
                id,
                size: Some(size),
                header_size: 0,
                position: 0,
            };

            let mut buffer = Vec::new();
            if header.write(&mut buffer).is_ok() {
                let source = BufferSource::from_vec(buffer);
                if let Ok(parsed) = EbmlReader::new(&source, Limits::default()).read_header(0) {
                    assert_eq!(header.id, parsed.id, "Element ID mismatch");
                    assert_eq!(header.size, parsed.size, "Element size mismatch");
                }
            }
        }

        EbmlOperation::ParseIncremental { chunk, seek } => {
            parse_incremental(&input.data, usize::from(chunk).max(1), seek);
        }
    }
});

fn parse_incremental(data: &[u8], chunk: usize, seek: i64) {
    let source = Arc::new(BufferSource::new());
    let mut chunks = data.chunks(chunk);
    let config = ParserConfig::default();

    let mut segment = loop {
        match Segment::open(source.clone(), config.clone()) {
            Ok(Progress::Ready(segment)) => break segment,
            Ok(Progress::NeedMoreData) => match chunks.next() {
                Some(bytes) => source.append(bytes),
                None => return,
            },
            Err(_) => return,
        }
    };

    loop {
        match segment.load_all() {
            Ok(Progress::Ready(())) => break,
            Ok(Progress::NeedMoreData) => match chunks.next() {
                Some(bytes) => source.append(bytes),
                None => {
                    source.finish();
                    if segment.load_all().is_err() {
                        return;
                    }
                    break;
                }
            },
            Err(_) => return,
        }
    }

    let mut streams = create_streams(&segment, Track::is_video, Stream::create);
    streams.extend(create_streams(&segment, Track::is_audio, Stream::create));
    let mut sample = MediaSample::with_capacity(64 * 1024);
    for stream in &mut streams {
        let _ = stream.set_curr_position(&segment, seek, SeekMode::Absolute);
        let _ = stream.set_stop_position(&segment, seek.wrapping_abs(), SeekMode::Incremental);
        for _ in 0..64 {
            match stream.populate_sample(&segment, &mut sample) {
                Ok(Progress::Ready(webmsplit_mkv::PopulateStatus::EndOfStream)) | Err(_) => break,
                Ok(_) => {}
            }
        }
    }
}

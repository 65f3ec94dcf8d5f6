//! # webmsplit-mkv
//!
//! Incremental Matroska/WebM parsing for files that are still arriving.
//!
//! The parser reads from a [`ByteSource`] that may grow over time. Every
//! operation that can run out of bytes returns [`Progress::NeedMoreData`]
//! instead of blocking, and leaves its state untouched so it can simply be
//! retried once more data is available.
//!
//! ## Features
//!
//! - EBML header validation with a bounded scan for the magic bytes
//! - Segment metadata: Info, Tracks, Cues and SeekHead
//! - Cluster-at-a-time parsing, split into a side-effect free parse step and
//!   an append step
//! - Per-track [`Stream`] cursors with time seeking, stop positions and
//!   B-frame aware sample timing
//! - A [`Splitter`] that runs parse-ahead on a background thread
//!
//! ## Example: Reading samples
//!
//! ```no_run
//! use std::sync::Arc;
//! use webmsplit_core::MediaSample;
//! use webmsplit_mkv::{FileSource, ParserConfig, PopulateStatus, Splitter};
//!
//! let source = Arc::new(FileSource::open("video.webm").unwrap());
//! let splitter = Splitter::open(source, ParserConfig::default())
//!     .unwrap()
//!     .ready()
//!     .expect("complete file");
//! splitter.spawn_parse_ahead().unwrap();
//!
//! let mut sample = MediaSample::with_capacity(1 << 20);
//! loop {
//!     match splitter.populate(0, &mut sample).unwrap().ready() {
//!         Some(PopulateStatus::EndOfStream) => break,
//!         Some(_) => println!("{} bytes at {:?}", sample.len(), sample.start()),
//!         None => {
//!             splitter.wait_for_cluster(std::time::Duration::from_millis(100));
//!         }
//!     }
//! }
//! ```
//!
//! ## Ownership
//!
//! ```text
//! Segment ──owns──> Cluster ──owns──> Block
//!    ^
//!    └── borrowed by Track / Stream calls, which hold BlockEntry and
//!        ClusterRef indices into the segment's arena
//! ```
//!
//! Clusters are only appended, so indices stay valid for the life of the
//! segment.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod block;
pub mod cluster;
pub mod config;
pub mod cues;
pub mod ebml;
pub mod elements;
pub mod error;
pub mod header;
pub mod info;
pub mod progress;
pub mod segment;
pub mod source;
pub mod splitter;
pub mod stream;
pub mod track;

#[cfg(test)]
mod fixtures;

// Re-export main types
pub use block::{Block, BlockEntry, BlockIndex, Lacing};
pub use cluster::Cluster;
pub use config::ParserConfig;
pub use cues::{CuePoint, CueTrackPosition, Cues};
pub use ebml::{EbmlReader, ElementHeader, Limits};
pub use error::{MkvError, Result};
pub use header::{is_mkv_signature, EbmlHeader, EBML_MAGIC};
pub use info::SegmentInfo;
pub use progress::Progress;
pub use segment::{ClusterRef, ParsedCluster, Segment};
pub use source::{BufferSource, ByteSource, FileSource, SourceLength};
pub use splitter::Splitter;
pub use stream::{
    create_streams, PopulateStatus, PreloadStatus, SeekMode, StopPosition, Stream,
};
pub use track::{
    AudioSettings, MediaDescription, Track, TrackKind, Tracks, VideoSettings,
};

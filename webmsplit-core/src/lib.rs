//! # webmsplit core
//!
//! Core types shared by the webmsplit container parser.
//!
//! This crate provides the vocabulary used across the parser and its hosts:
//! - Error hierarchy and caller-facing status codes
//! - Time bases for container nanoseconds and 100 ns host reference ticks
//! - The sample sink contract and a heap-backed sample buffer

pub mod error;
pub mod sample;
pub mod timestamp;

pub use error::{Error, ErrorKind, Result, Status};
pub use sample::{MediaSample, SampleFlags, SampleSink};
pub use timestamp::{TimeBase, Timestamp};

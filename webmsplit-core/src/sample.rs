//! Sample sinks: where the parser delivers one block's payload and timing.

use crate::timestamp::Timestamp;
use bitflags::bitflags;

bitflags! {
    /// Flags attached to a delivered sample.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SampleFlags: u32 {
        /// The sample is a sync point (key frame).
        const KEYFRAME = 0x0001;
        /// The sample follows a seek or a gap.
        const DISCONTINUITY = 0x0002;
        /// The sample may be dropped without affecting later samples.
        const DISCARDABLE = 0x0004;
    }
}

/// Consumer of populated samples.
///
/// The parser checks [`capacity`](SampleSink::capacity) before writing and
/// fails the call instead of truncating a payload.
pub trait SampleSink {
    /// Largest payload this sink accepts, in bytes.
    fn capacity(&self) -> usize;

    /// Return a writable buffer of exactly `len` bytes. `len` never exceeds
    /// [`capacity`](SampleSink::capacity).
    fn payload_mut(&mut self, len: usize) -> &mut [u8];

    /// Set the presentation interval. `None` marks an unknown bound.
    fn set_times(&mut self, start: Option<Timestamp>, stop: Option<Timestamp>);

    /// Set the sample flags.
    fn set_flags(&mut self, flags: SampleFlags);
}

/// A heap-backed sample buffer with a fixed capacity.
#[derive(Debug, Clone, Default)]
pub struct MediaSample {
    data: Vec<u8>,
    capacity: usize,
    start: Option<Timestamp>,
    stop: Option<Timestamp>,
    flags: SampleFlags,
}

impl MediaSample {
    /// Create an empty sample accepting payloads up to `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            capacity,
            ..Default::default()
        }
    }

    /// Raise the capacity, keeping the current contents.
    pub fn grow(&mut self, capacity: usize) {
        if capacity > self.capacity {
            self.data.reserve(capacity - self.data.len());
            self.capacity = capacity;
        }
    }

    /// Payload bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Payload length.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if no payload has been written.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Start time, if known.
    pub fn start(&self) -> Option<Timestamp> {
        self.start
    }

    /// Stop time, if known.
    pub fn stop(&self) -> Option<Timestamp> {
        self.stop
    }

    /// Sample flags.
    pub fn flags(&self) -> SampleFlags {
        self.flags
    }

    /// Check if this is a key frame.
    pub fn is_keyframe(&self) -> bool {
        self.flags.contains(SampleFlags::KEYFRAME)
    }

    /// Check if this sample follows a discontinuity.
    pub fn is_discontinuity(&self) -> bool {
        self.flags.contains(SampleFlags::DISCONTINUITY)
    }
}

impl SampleSink for MediaSample {
    fn capacity(&self) -> usize {
        self.capacity
    }

    fn payload_mut(&mut self, len: usize) -> &mut [u8] {
        self.data.clear();
        self.data.resize(len, 0);
        &mut self.data
    }

    fn set_times(&mut self, start: Option<Timestamp>, stop: Option<Timestamp>) {
        self.start = start;
        self.stop = stop;
    }

    fn set_flags(&mut self, flags: SampleFlags) {
        self.flags = flags;
    }
}

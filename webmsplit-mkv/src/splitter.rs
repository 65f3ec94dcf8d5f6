//! Splitter: one segment, its streams and a parse-ahead worker.
//!
//! The segment and every stream live behind a single [`Mutex`]. The worker
//! thread takes the lock to parse one cluster at a time and signals the
//! [`Condvar`] whenever a cluster is added. Foreground callers take the same
//! lock to populate samples and reposition streams, so they always observe a
//! cluster sequence that only grows.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use webmsplit_core::sample::SampleSink;

use crate::config::ParserConfig;
use crate::error::{MkvError, Result};
use crate::progress::{ready, Progress};
use crate::segment::Segment;
use crate::source::ByteSource;
use crate::stream::{create_streams, PopulateStatus, SeekMode, Stream};
use crate::track::Track;

struct State {
    segment: Segment,
    streams: Vec<Stream>,
    /// Set when parse-ahead stopped on malformed data.
    failure: Option<String>,
}

struct Shared {
    state: Mutex<State>,
    cluster_added: Condvar,
    cancelled: AtomicBool,
}

/// Owns a segment and drives its streams.
pub struct Splitter {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Splitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Splitter")
            .field("cancelled", &self.shared.cancelled.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Splitter {
    /// Open `source` and build streams for its supported tracks, video first.
    ///
    /// Returns `NeedMoreData` until the header and metadata are complete.
    pub fn open(source: Arc<dyn ByteSource>, config: ParserConfig) -> Result<Progress<Self>> {
        let mut segment = ready!(Segment::open(source, config)?);
        ready!(segment.parse_headers()?);

        let mut streams = create_streams(&segment, Track::is_video, Stream::create);
        let video = streams.len();
        streams.extend(create_streams(&segment, Track::is_audio, Stream::create));
        if streams.is_empty() {
            return Err(MkvError::NoPlayableTracks);
        }
        tracing::info!(
            video,
            audio = streams.len() - video,
            "Splitter opened"
        );

        Ok(Progress::Ready(Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    segment,
                    streams,
                    failure: None,
                }),
                cluster_added: Condvar::new(),
                cancelled: AtomicBool::new(false),
            }),
        }))
    }

    /// Number of streams.
    pub fn stream_count(&self) -> usize {
        self.shared.state.lock().streams.len()
    }

    /// Identifiers of all streams, in order.
    pub fn stream_ids(&self) -> Vec<String> {
        self.shared.state.lock().streams.iter().map(Stream::id).collect()
    }

    /// Segment duration in reference ticks.
    pub fn duration(&self) -> i64 {
        let state = self.shared.state.lock();
        state
            .streams
            .first()
            .map_or(0, |stream| stream.duration(&state.segment))
    }

    /// Number of clusters parsed so far.
    pub fn cluster_count(&self) -> usize {
        self.shared.state.lock().segment.clusters().len()
    }

    /// Check if every cluster has been parsed.
    pub fn is_fully_parsed(&self) -> bool {
        self.shared.state.lock().segment.is_fully_parsed()
    }

    /// Deliver the next sample of stream `index` into `sink`.
    ///
    /// Samples from clusters parsed before a parse-ahead failure are still
    /// delivered. Once the stream needs a cluster past the failure, this
    /// returns [`MkvError::ParsingStopped`] instead of `NeedMoreData`.
    pub fn populate(
        &self,
        index: usize,
        sink: &mut dyn SampleSink,
    ) -> Result<Progress<PopulateStatus>> {
        let mut guard = self.shared.state.lock();
        let State {
            segment,
            streams,
            failure,
        } = &mut *guard;
        let stream = streams
            .get_mut(index)
            .ok_or_else(|| MkvError::InvalidArgument(format!("no stream {}", index)))?;
        match stream.populate_sample(segment, sink)? {
            Progress::NeedMoreData => match failure {
                Some(message) => Err(MkvError::ParsingStopped(message.clone())),
                None => Ok(Progress::NeedMoreData),
            },
            ready => Ok(ready),
        }
    }

    /// The error that stopped parse-ahead, if any.
    pub fn failure(&self) -> Option<String> {
        self.shared.state.lock().failure.clone()
    }

    /// Reposition every stream.
    ///
    /// The first stream picks the base cluster, preloading ahead with the
    /// cue index when it can. The others start from that same cluster so
    /// playback stays aligned.
    pub fn seek(&self, position: i64, mode: SeekMode) -> Result<()> {
        let mut guard = self.shared.state.lock();
        let State { segment, streams, .. } = &mut *guard;
        let Some((leader, followers)) = streams.split_first_mut() else {
            return Ok(());
        };

        let time_ns = leader.get_seek_time(segment, position, mode)?;
        let before = segment.clusters().len();
        // Still parsing is fine here; the cursor waits on the target
        let _ = leader.preload_seek(segment, time_ns)?;
        if segment.clusters().len() > before {
            self.shared.cluster_added.notify_all();
        }

        let base = leader.set_curr_time(segment, time_ns);
        for stream in followers {
            match base {
                Some(_) => stream.set_curr_base(segment, base),
                None => {
                    stream.set_curr_time(segment, time_ns);
                }
            }
        }
        tracing::debug!(time_ns, base = ?base, "Splitter seek");
        Ok(())
    }

    /// Set the stop position of every stream.
    pub fn set_stop(&self, position: i64, mode: SeekMode) -> Result<()> {
        let mut guard = self.shared.state.lock();
        let State { segment, streams, .. } = &mut *guard;
        for stream in streams.iter_mut() {
            stream.set_stop_position(segment, position, mode)?;
        }
        Ok(())
    }

    /// Block until a new cluster is added or `timeout` passes. Also returns
    /// early once parsing completes, fails or is cancelled. Returns whether
    /// clusters were added.
    pub fn wait_for_cluster(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.shared.state.lock();
        let seen = state.segment.clusters().len();

        while state.segment.clusters().len() == seen
            && !state.segment.is_fully_parsed()
            && state.failure.is_none()
            && !self.shared.cancelled.load(Ordering::Acquire)
        {
            match deadline {
                Some(deadline) => {
                    if self
                        .shared
                        .cluster_added
                        .wait_until(&mut state, deadline)
                        .timed_out()
                    {
                        break;
                    }
                }
                None => self.shared.cluster_added.wait(&mut state),
            }
        }
        state.segment.clusters().len() > seen
    }

    /// Ask the parse-ahead worker to stop and wake any waiters.
    pub fn cancel(&self) {
        self.shared.cancelled.store(true, Ordering::Release);
        self.shared.cluster_added.notify_all();
    }

    /// Check if [`cancel`](Self::cancel) was called.
    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::Acquire)
    }

    /// Start a thread that parses clusters until the segment is complete.
    ///
    /// The worker backs off for the configured poll interval while the
    /// source is still filling. It ends early on malformed data, returning
    /// the error through the join handle, or when cancelled.
    pub fn spawn_parse_ahead(&self) -> Result<JoinHandle<Result<()>>> {
        let shared = Arc::clone(&self.shared);
        thread::Builder::new()
            .name("webmsplit-parse".into())
            .spawn(move || shared.parse_ahead())
            .map_err(MkvError::Io)
    }
}

impl Shared {
    fn parse_ahead(&self) -> Result<()> {
        let poll = self.state.lock().segment.config().poll_interval_duration();
        tracing::info!(poll_ms = poll.as_millis() as u64, "Parse-ahead started");

        let result = loop {
            if self.cancelled.load(Ordering::Acquire) {
                break Ok(());
            }

            let mut state = self.state.lock();
            match state.segment.parse_cluster() {
                Ok(Progress::Ready(parsed)) => {
                    let done = state.segment.add_cluster(parsed);
                    self.cluster_added.notify_all();
                    if done {
                        break Ok(());
                    }
                }
                Ok(Progress::NeedMoreData) => {
                    let _ = self.cluster_added.wait_for(&mut state, poll);
                }
                Err(err) => {
                    tracing::warn!(error = %err, "Parse-ahead stopped on malformed data");
                    state.failure = Some(err.to_string());
                    self.cluster_added.notify_all();
                    break Err(err);
                }
            }
        };

        tracing::info!(
            clusters = self.state.lock().segment.clusters().len(),
            cancelled = self.cancelled.load(Ordering::Acquire),
            "Parse-ahead finished"
        );
        result
    }
}

//! Segment information (the Info element).

use crate::ebml::{EbmlReader, ElementHeader};
use crate::elements;
use crate::error::{MkvError, Result};

/// Default timecode scale: one tick per millisecond.
pub const DEFAULT_TIMECODE_SCALE: u64 = 1_000_000;

/// Segment-wide timing and muxer information.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentInfo {
    /// Nanoseconds per timecode tick.
    pub timecode_scale: u64,
    /// Duration in ticks, as declared (may be fractional).
    pub duration: Option<f64>,
    /// Title.
    pub title: Option<String>,
    /// Muxing application.
    pub muxing_app: Option<String>,
    /// Writing application.
    pub writing_app: Option<String>,
}

impl Default for SegmentInfo {
    fn default() -> Self {
        Self {
            timecode_scale: DEFAULT_TIMECODE_SCALE,
            duration: None,
            title: None,
            muxing_app: None,
            writing_app: None,
        }
    }
}

impl SegmentInfo {
    /// Parse a complete Info element.
    pub(crate) fn parse(reader: &EbmlReader<'_>, element: &ElementHeader) -> Result<Self> {
        let end = element
            .end()
            .ok_or_else(|| MkvError::MissingElement("Info size".into()))?;

        let mut info = SegmentInfo::default();
        let mut pos = element.data_start();
        while pos < end {
            let child = reader.read_header(pos)?;
            let child_end = child.end().filter(|&e| e <= end).ok_or_else(|| {
                MkvError::InvalidElementSize {
                    offset: pos,
                    message: "Info child overruns its parent".into(),
                }
            })?;

            match child.id {
                elements::TIMECODE_SCALE => {
                    let scale = reader.read_uint(&child)?;
                    if scale == 0 {
                        return Err(MkvError::InvalidElementSize {
                            offset: pos,
                            message: "timecode scale of zero".into(),
                        });
                    }
                    info.timecode_scale = scale;
                }
                elements::DURATION => info.duration = Some(reader.read_float(&child)?),
                elements::TITLE => info.title = Some(reader.read_string(&child)?),
                elements::MUXING_APP => info.muxing_app = Some(reader.read_string(&child)?),
                elements::WRITING_APP => info.writing_app = Some(reader.read_string(&child)?),
                _ => {}
            }
            pos = child_end;
        }

        Ok(info)
    }

    /// Declared duration in nanoseconds, if present and positive.
    pub fn duration_ns(&self) -> Option<i64> {
        self.duration
            .filter(|d| d.is_finite() && *d > 0.0)
            .map(|d| (d * self.timecode_scale as f64) as i64)
    }
}

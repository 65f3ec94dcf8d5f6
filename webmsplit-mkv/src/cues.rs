//! Cue index: time to cluster position hints for seeking.

use crate::ebml::{EbmlReader, ElementHeader};
use crate::elements;
use crate::error::{MkvError, Result};

/// Where a track's key frame can be found for one cue point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CueTrackPosition {
    /// Track number.
    pub track: u64,
    /// Cluster offset relative to the segment payload.
    pub cluster_position: u64,
    /// Block offset relative to the cluster payload.
    pub relative_position: Option<u64>,
    /// One-based block number within the cluster.
    pub block_number: Option<u64>,
}

/// One index entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CuePoint {
    /// Time in segment ticks.
    pub time: u64,
    /// Time in nanoseconds.
    pub time_ns: i64,
    /// Positions per track.
    pub positions: Vec<CueTrackPosition>,
}

impl CuePoint {
    /// Position entry for `track`, if this cue covers it.
    pub fn position_for(&self, track: u64) -> Option<&CueTrackPosition> {
        self.positions.iter().find(|p| p.track == track)
    }
}

/// The segment's cue table, ordered by time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cues {
    points: Vec<CuePoint>,
}

impl Cues {
    /// Parse a complete Cues element.
    pub(crate) fn parse(
        reader: &EbmlReader<'_>,
        element: &ElementHeader,
        timecode_scale: u64,
    ) -> Result<Self> {
        let mut points = Vec::new();
        reader.for_each_child(element, |child| {
            if child.id == elements::CUE_POINT {
                points.push(parse_cue_point(reader, child, timecode_scale)?);
            }
            Ok(())
        })?;

        points.sort_by_key(|p: &CuePoint| p.time);
        Ok(Self { points })
    }

    /// All cue points, ordered by time.
    pub fn points(&self) -> &[CuePoint] {
        &self.points
    }

    /// Number of cue points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Earliest cue point at or after `after_ns` that covers `track`.
    pub fn find_next(&self, after_ns: i64, track: u64) -> Option<(&CuePoint, &CueTrackPosition)> {
        let start = self.points.partition_point(|p| p.time_ns < after_ns);
        self.points[start..]
            .iter()
            .find_map(|p| p.position_for(track).map(|pos| (p, pos)))
    }
}

fn parse_cue_point(
    reader: &EbmlReader<'_>,
    element: &ElementHeader,
    timecode_scale: u64,
) -> Result<CuePoint> {
    let mut time = None;
    let mut positions = Vec::new();

    reader.for_each_child(element, |child| {
        match child.id {
            elements::CUE_TIME => time = Some(reader.read_uint(child)?),
            elements::CUE_TRACK_POSITIONS => {
                let mut track = None;
                let mut cluster_position = None;
                let mut relative_position = None;
                let mut block_number = None;
                reader.for_each_child(child, |field| {
                    match field.id {
                        elements::CUE_TRACK => track = Some(reader.read_uint(field)?),
                        elements::CUE_CLUSTER_POSITION => {
                            cluster_position = Some(reader.read_uint(field)?)
                        }
                        elements::CUE_RELATIVE_POSITION => {
                            relative_position = Some(reader.read_uint(field)?)
                        }
                        elements::CUE_BLOCK_NUMBER => block_number = Some(reader.read_uint(field)?),
                        _ => {}
                    }
                    Ok(())
                })?;

                match (track, cluster_position) {
                    (Some(track), Some(cluster_position)) => positions.push(CueTrackPosition {
                        track,
                        cluster_position,
                        relative_position,
                        block_number,
                    }),
                    _ => tracing::debug!(offset = child.position, "Skipping incomplete cue position"),
                }
            }
            _ => {}
        }
        Ok(())
    })?;

    let time = time.ok_or_else(|| MkvError::MissingElement("CueTime".into()))?;
    Ok(CuePoint {
        time,
        time_ns: (time as i64).saturating_mul(timecode_scale as i64),
        positions,
    })
}

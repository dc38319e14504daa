//! # Segment Graph
//!
//! A segment is a directed stretch of road: an ordered list of points plus
//! the segments reachable from either physical end.
//!
//! ```text
//!            next_from_end_a                 next_from_end_b
//!   ◄── Left/Right/Straight ── A ●━━━━━━━━━● B ── Left/Right/Straight ──►
//!                               0 1 2 ... n-1
//! ```
//!
//! Riding from point 0 towards point n-1 is [`SegmentDirection::AtoB`].

use std::collections::HashSet;
use std::fmt;

use crate::error::{SegmentError, SegmentResult};
use crate::track_point::TrackPoint;

/// Turn the rider takes at the end of a segment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TurnDirection {
    /// No turn (last segment of a route, or not known yet).
    #[default]
    None,
    /// Turn left.
    Left,
    /// Continue straight on.
    GoStraight,
    /// Turn right.
    Right,
}

impl fmt::Display for TurnDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "None",
            Self::Left => "Left",
            Self::GoStraight => "GoStraight",
            Self::Right => "Right",
        };
        f.write_str(name)
    }
}

/// Direction of travel along a segment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SegmentDirection {
    /// Not enough samples on this segment yet.
    #[default]
    Unknown,
    /// Riding from the first point towards the last.
    AtoB,
    /// Riding from the last point towards the first.
    BtoA,
}

impl SegmentDirection {
    /// Derives the direction from two point indices on the same segment.
    ///
    /// An unchanged index keeps `previous`.
    #[must_use]
    pub fn from_indices(previous_index: usize, current_index: usize, previous: Self) -> Self {
        match current_index.cmp(&previous_index) {
            std::cmp::Ordering::Greater => Self::AtoB,
            std::cmp::Ordering::Less => Self::BtoA,
            std::cmp::Ordering::Equal => previous,
        }
    }
}

/// One edge of the segment graph.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Turn {
    /// Turn needed to get onto the target segment.
    pub direction: TurnDirection,
    /// Target segment id.
    pub segment_id: String,
}

impl Turn {
    /// Creates a new turn.
    pub fn new(direction: TurnDirection, segment_id: impl Into<String>) -> Self {
        Self {
            direction,
            segment_id: segment_id.into(),
        }
    }
}

/// A named stretch of road.
#[derive(Clone, Debug, PartialEq)]
pub struct Segment {
    id: String,
    points: Vec<TrackPoint>,
    /// Segments reachable from the first point.
    pub next_from_end_a: Vec<Turn>,
    /// Segments reachable from the last point.
    pub next_from_end_b: Vec<Turn>,
}

impl Segment {
    /// Creates a segment. Points are tagged with their index.
    pub fn new(id: impl Into<String>, points: Vec<TrackPoint>) -> Self {
        let points = points
            .into_iter()
            .enumerate()
            .map(|(index, point)| point.with_index(index))
            .collect();

        Self {
            id: id.into(),
            points,
            next_from_end_a: Vec::new(),
            next_from_end_b: Vec::new(),
        }
    }

    /// Adds an edge from end A.
    #[must_use]
    pub fn with_next_from_a(mut self, direction: TurnDirection, segment_id: &str) -> Self {
        self.next_from_end_a.push(Turn::new(direction, segment_id));
        self
    }

    /// Adds an edge from end B.
    #[must_use]
    pub fn with_next_from_b(mut self, direction: TurnDirection, segment_id: &str) -> Self {
        self.next_from_end_b.push(Turn::new(direction, segment_id));
        self
    }

    /// Segment identifier.
    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Points of this segment, in A to B order.
    #[inline]
    #[must_use]
    pub fn points(&self) -> &[TrackPoint] {
        &self.points
    }

    /// Returns the closest point that is close to `position`.
    #[must_use]
    pub fn closest_point_to(&self, position: &TrackPoint) -> Option<&TrackPoint> {
        closest_close_point(&self.points, position).map(|(point, _)| point)
    }

    /// Returns true when `segment_id` can be reached from either end.
    #[must_use]
    pub fn is_adjacent_to(&self, segment_id: &str) -> bool {
        self.next_from_end_a
            .iter()
            .chain(&self.next_from_end_b)
            .any(|turn| turn.segment_id == segment_id)
    }
}

/// Finds the segment with a point closest to `position`.
///
/// Only points within proximity tolerance are considered.
#[must_use]
pub fn find_segment<'a>(
    segments: &'a [Segment],
    position: &TrackPoint,
) -> Option<(&'a Segment, &'a TrackPoint)> {
    segments
        .iter()
        .filter_map(|segment| {
            closest_close_point(&segment.points, position)
                .map(|(point, distance)| (segment, point, distance))
        })
        .min_by(|a, b| a.2.total_cmp(&b.2))
        .map(|(segment, point, _)| (segment, point))
}

/// Checks that ids are unique, segments have points, and every adjacency
/// entry references an existing segment.
///
/// # Errors
///
/// Returns the first violation found.
pub fn validate_segments(segments: &[Segment]) -> SegmentResult<()> {
    let mut ids = HashSet::with_capacity(segments.len());

    for segment in segments {
        if segment.points.is_empty() {
            return Err(SegmentError::EmptySegment(segment.id.clone()));
        }
        if !ids.insert(segment.id.as_str()) {
            return Err(SegmentError::DuplicateSegment(segment.id.clone()));
        }
    }

    for segment in segments {
        let dangling = segment
            .next_from_end_a
            .iter()
            .chain(&segment.next_from_end_b)
            .find(|turn| !ids.contains(turn.segment_id.as_str()));

        if let Some(turn) = dangling {
            return Err(SegmentError::UnknownAdjacentSegment {
                segment_id: segment.id.clone(),
                target_id: turn.segment_id.clone(),
            });
        }
    }

    Ok(())
}

fn closest_close_point<'a>(
    points: &'a [TrackPoint],
    position: &TrackPoint,
) -> Option<(&'a TrackPoint, f64)> {
    points
        .iter()
        .filter(|point| point.is_close_to(position))
        .map(|point| (point, point.distance_to(position)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
}

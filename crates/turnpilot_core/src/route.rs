//! # Planned Routes
//!
//! A planned route is an ordered list of segments together with the turn
//! required to get from each one to the next.
//!
//! ## Progression
//!
//! ```text
//!   not started ──entered(start)──► started, cursor 0
//!   started     ──entered(next)───► cursor + 1
//!   anything else                 ► RouteError (cursor unchanged)
//! ```
//!
//! The cursor never skips and never guesses. Callers decide what an
//! unexpected segment means (usually: the rider went off route).
//!
//! ## Loops
//!
//! A route made only of lead-in and loop entries (at least two of the
//! latter) is a loop. Once completed, it can be rewound to the first loop
//! entry with [`PlannedRoute::enter_next_loop`].

use std::fmt;

use crate::error::{RouteError, RouteResult};
use crate::segment::{SegmentDirection, TurnDirection};

/// Sport the route was planned for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SportType {
    /// Not specified.
    #[default]
    Unknown,
    /// Bike.
    Cycling,
    /// Run.
    Running,
}

/// Game world the route lives in.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct World {
    /// World identifier, e.g. `watopia`.
    pub id: String,
    /// Display name.
    pub name: String,
}

/// Role of an entry in the route sequence.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SegmentSequenceType {
    /// A normal, ridden-once entry.
    #[default]
    Regular,
    /// Entry leading up to a loop.
    LeadIn,
    /// Entry that is part of a loop.
    Loop,
}

/// One entry of a planned route.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SegmentSequence {
    /// Segment ridden for this entry.
    pub segment_id: String,
    /// Turn that leads onto the next entry.
    pub turn_to_next_segment: TurnDirection,
    /// Segment of the next entry, `None` for the last one.
    pub next_segment_id: Option<String>,
    /// Direction the segment is ridden in.
    pub direction: SegmentDirection,
    /// Role of the entry.
    pub kind: SegmentSequenceType,
}

impl SegmentSequence {
    /// Creates a regular entry with no onward turn.
    pub fn new(segment_id: impl Into<String>) -> Self {
        Self {
            segment_id: segment_id.into(),
            ..Self::default()
        }
    }
}

/// Outcome of a successful route progression.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteMoveResult {
    /// The rider entered the starting segment.
    StartedRoute,
    /// The rider entered the next segment of the route.
    EnteredNextSegment,
    /// The route is done.
    CompletedRoute,
}

/// A pre-planned sequence of segments and the progress made along it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlannedRoute {
    /// Name given by the planner.
    pub name: String,
    /// Name of the in-game route this plan starts from.
    pub zwift_route_name: String,
    /// World the route lives in.
    pub world: Option<World>,
    /// Sport the route was planned for.
    pub sport: SportType,
    /// The ordered entries.
    pub route_segment_sequence: Vec<SegmentSequence>,
    segment_sequence_index: usize,
    has_started: bool,
    has_completed: bool,
    loop_count: u32,
}

impl PlannedRoute {
    /// Creates a route that has not been started.
    pub fn new(name: impl Into<String>, route_segment_sequence: Vec<SegmentSequence>) -> Self {
        Self {
            name: name.into(),
            route_segment_sequence,
            ..Self::default()
        }
    }

    /// Whether the rider entered the starting segment.
    #[inline]
    #[must_use]
    pub const fn has_started(&self) -> bool {
        self.has_started
    }

    /// Whether the route was completed.
    #[inline]
    #[must_use]
    pub const fn has_completed(&self) -> bool {
        self.has_completed
    }

    /// Position of the progression cursor.
    #[inline]
    #[must_use]
    pub const fn segment_sequence_index(&self) -> usize {
        self.segment_sequence_index
    }

    /// Number of times the loop was restarted.
    #[inline]
    #[must_use]
    pub const fn loop_count(&self) -> u32 {
        self.loop_count
    }

    /// First segment of the route.
    #[must_use]
    pub fn starting_segment_id(&self) -> Option<&str> {
        self.route_segment_sequence
            .first()
            .map(|entry| entry.segment_id.as_str())
    }

    /// Segment the rider is on, once the route started.
    #[must_use]
    pub fn current_segment_id(&self) -> Option<&str> {
        self.current_entry().map(|entry| entry.segment_id.as_str())
    }

    /// Segment the route expects next, once the route started.
    #[must_use]
    pub fn next_segment_id(&self) -> Option<&str> {
        self.current_entry()
            .and_then(|entry| entry.next_segment_id.as_deref())
    }

    /// Turn needed to reach the next segment, `None` before the start.
    #[must_use]
    pub fn turn_to_next_segment(&self) -> TurnDirection {
        self.current_entry()
            .map_or(TurnDirection::None, |entry| entry.turn_to_next_segment)
    }

    /// Whether the cursor sits on the last entry.
    #[must_use]
    pub fn is_on_last_segment(&self) -> bool {
        self.has_started && self.segment_sequence_index + 1 == self.route_segment_sequence.len()
    }

    /// Whether the route is a loop, possibly with a lead-in.
    #[must_use]
    pub fn is_loop(&self) -> bool {
        let count = |kind: SegmentSequenceType| {
            self.route_segment_sequence
                .iter()
                .filter(|entry| entry.kind == kind)
                .count()
        };

        count(SegmentSequenceType::Loop) > 1 && count(SegmentSequenceType::Regular) == 0
    }

    /// Moves the cursor for a segment the rider just entered.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::AlreadyCompleted`] once the route is done and
    /// [`RouteError::UnexpectedSegment`] for anything but the predicted
    /// segment. The cursor is unchanged on error.
    pub fn entered_segment(&mut self, segment_id: &str) -> RouteResult<RouteMoveResult> {
        if self.has_completed {
            return Err(RouteError::AlreadyCompleted);
        }

        if !self.has_started {
            let start = self.starting_segment_id().ok_or(RouteError::EmptyRoute)?;
            if start != segment_id {
                return Err(unexpected(start, segment_id));
            }

            self.has_started = true;
            self.segment_sequence_index = 0;
            return Ok(RouteMoveResult::StartedRoute);
        }

        match self.next_segment_id().map(str::to_string) {
            Some(next) if next == segment_id => {
                self.segment_sequence_index += 1;
                Ok(RouteMoveResult::EnteredNextSegment)
            }
            Some(next) => Err(unexpected(&next, segment_id)),
            None => Err(unexpected("the end of the route", segment_id)),
        }
    }

    /// Marks the route completed.
    pub fn complete(&mut self) -> RouteMoveResult {
        self.has_completed = true;
        RouteMoveResult::CompletedRoute
    }

    /// Forgets all progress.
    pub fn reset(&mut self) {
        self.segment_sequence_index = 0;
        self.has_started = false;
        self.has_completed = false;
        self.loop_count = 0;
    }

    /// Rewinds the cursor to the first loop entry for another lap.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::NotALoop`] when the route is not a loop.
    pub fn enter_next_loop(&mut self) -> RouteResult<()> {
        let loop_start = self
            .route_segment_sequence
            .iter()
            .position(|entry| entry.kind == SegmentSequenceType::Loop)
            .filter(|_| self.is_loop())
            .ok_or_else(|| RouteError::NotALoop(self.name.clone()))?;

        self.segment_sequence_index = loop_start;
        self.has_started = true;
        self.has_completed = false;
        self.loop_count += 1;
        Ok(())
    }

    fn current_entry(&self) -> Option<&SegmentSequence> {
        if !self.has_started {
            return None;
        }
        self.route_segment_sequence.get(self.segment_sequence_index)
    }
}

impl fmt::Display for PlannedRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} segments, at {})",
            self.name,
            self.route_segment_sequence.len(),
            self.segment_sequence_index
        )
    }
}

fn unexpected(expected: &str, actual: &str) -> RouteError {
    RouteError::UnexpectedSegment {
        expected: expected.to_string(),
        actual: actual.to_string(),
    }
}

// ============================================================================
// BUILDER
// ============================================================================

/// Fluent construction of a route sequence.
///
/// ```rust
/// use turnpilot_core::{SegmentSequenceBuilder, TurnDirection};
///
/// let route = SegmentSequenceBuilder::starting_at("seg-1")
///     .turning_left_to("seg-2")
///     .build("Short");
///
/// assert_eq!(route.route_segment_sequence[0].turn_to_next_segment, TurnDirection::Left);
/// ```
#[derive(Clone, Debug)]
pub struct SegmentSequenceBuilder {
    sequence: Vec<SegmentSequence>,
    world: Option<World>,
    sport: SportType,
}

impl SegmentSequenceBuilder {
    /// Starts a route at `segment_id`.
    pub fn starting_at(segment_id: impl Into<String>) -> Self {
        Self {
            sequence: vec![SegmentSequence::new(segment_id)],
            world: None,
            sport: SportType::Unknown,
        }
    }

    /// Adds an entry reached by turning left.
    #[must_use]
    pub fn turning_left_to(self, segment_id: impl Into<String>) -> Self {
        self.then(TurnDirection::Left, segment_id)
    }

    /// Adds an entry reached by going straight.
    #[must_use]
    pub fn going_straight_to(self, segment_id: impl Into<String>) -> Self {
        self.then(TurnDirection::GoStraight, segment_id)
    }

    /// Adds an entry reached by turning right.
    #[must_use]
    pub fn turning_right_to(self, segment_id: impl Into<String>) -> Self {
        self.then(TurnDirection::Right, segment_id)
    }

    /// Sets the direction of the most recently added entry.
    #[must_use]
    pub fn riding(mut self, direction: SegmentDirection) -> Self {
        if let Some(last) = self.sequence.last_mut() {
            last.direction = direction;
        }
        self
    }

    /// Marks entries from the first `segment_id` onwards as the loop and
    /// everything before it as lead-in.
    #[must_use]
    pub fn loop_from(mut self, segment_id: &str) -> Self {
        if let Some(start) = self
            .sequence
            .iter()
            .position(|entry| entry.segment_id == segment_id)
        {
            for (index, entry) in self.sequence.iter_mut().enumerate() {
                entry.kind = if index < start {
                    SegmentSequenceType::LeadIn
                } else {
                    SegmentSequenceType::Loop
                };
            }
        }
        self
    }

    /// Sets the world metadata.
    #[must_use]
    pub fn in_world(mut self, world: World) -> Self {
        self.world = Some(world);
        self
    }

    /// Sets the sport metadata.
    #[must_use]
    pub fn for_sport(mut self, sport: SportType) -> Self {
        self.sport = sport;
        self
    }

    /// Builds the route.
    pub fn build(self, name: impl Into<String>) -> PlannedRoute {
        let mut route = PlannedRoute::new(name, self.sequence);
        route.world = self.world;
        route.sport = self.sport;
        route
    }

    fn then(mut self, turn: TurnDirection, segment_id: impl Into<String>) -> Self {
        let segment_id = segment_id.into();
        if let Some(last) = self.sequence.last_mut() {
            last.turn_to_next_segment = turn;
            last.next_segment_id = Some(segment_id.clone());
        }
        self.sequence.push(SegmentSequence::new(segment_id));
        self
    }
}

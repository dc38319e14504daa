//! # Turn Availability
//!
//! The game announces the commands the rider may pick one at a time,
//! separated by a `somethingempty` marker:
//!
//! ```text
//! somethingempty, turnleft, turnright, somethingempty, turnleft, ...
//! ```
//!
//! [`TurnAvailabilityTracker`] folds that stream into the set of options for
//! the junction ahead and reports it whenever it grows to two or more.

use tracing::debug;

use crate::segment::TurnDirection;

/// Commands the game announces as available.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TurnCommandKind {
    /// Turn left at the next junction.
    TurnLeft,
    /// Turn right at the next junction.
    TurnRight,
    /// Go straight at the next junction.
    GoStraight,
    /// Separator between announcements.
    SomethingEmpty,
}

impl TurnCommandKind {
    /// Parses a game command type, ignoring case and surrounding whitespace.
    #[must_use]
    pub fn parse(command_type: &str) -> Option<Self> {
        match command_type.trim().to_lowercase().as_str() {
            "turnleft" => Some(Self::TurnLeft),
            "turnright" => Some(Self::TurnRight),
            "gostraight" => Some(Self::GoStraight),
            "somethingempty" => Some(Self::SomethingEmpty),
            _ => None,
        }
    }

    /// The turn this command selects, if it is a turn.
    #[must_use]
    pub const fn direction(self) -> Option<TurnDirection> {
        match self {
            Self::TurnLeft => Some(TurnDirection::Left),
            Self::TurnRight => Some(TurnDirection::Right),
            Self::GoStraight => Some(TurnDirection::GoStraight),
            Self::SomethingEmpty => None,
        }
    }
}

/// Accumulates announced turn options per segment.
#[derive(Clone, Debug, Default)]
pub struct TurnAvailabilityTracker {
    available: Vec<TurnDirection>,
    dispatched_on_segment: Option<String>,
}

impl TurnAvailabilityTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Options gathered so far.
    #[must_use]
    pub fn available(&self) -> &[TurnDirection] {
        &self.available
    }

    /// Feeds one announced command.
    ///
    /// Returns the option set when it should be published: the full set once
    /// it grows to two or more, or an empty set when the options were
    /// cleared after the rider moved on to another segment.
    pub fn observe(
        &mut self,
        command_type: &str,
        current_segment_id: Option<&str>,
    ) -> Option<Vec<TurnDirection>> {
        match TurnCommandKind::parse(command_type)? {
            TurnCommandKind::SomethingEmpty => {
                let moved_on = self.dispatched_on_segment.as_deref() != current_segment_id;
                if self.available.is_empty() || !moved_on {
                    return None;
                }

                debug!("Clearing turn options, segment changed to {:?}", current_segment_id);
                self.available.clear();
                Some(Vec::new())
            }
            kind => {
                let direction = kind.direction()?;
                if self.available.contains(&direction) {
                    return None;
                }

                self.available.push(direction);
                self.available.sort_unstable();
                if self.available.len() < 2 {
                    return None;
                }

                self.dispatched_on_segment = current_segment_id.map(str::to_string);
                Some(self.available.clone())
            }
        }
    }
}

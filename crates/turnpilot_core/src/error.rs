//! # Navigation Error Types
//!
//! All errors that can be raised while validating the segment graph,
//! progressing along a route, or transitioning between game states.

use thiserror::Error;

use crate::state::GameStateKind;

/// Errors raised by route progression.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    /// The route already completed; no further segments can be entered.
    #[error("Route has already completed, can't enter new segment")]
    AlreadyCompleted,

    /// The entered segment is not the one the route predicts next.
    #[error("Was expecting {expected} but got {actual} and that's not a valid route progression")]
    UnexpectedSegment {
        /// The segment the route expected (starting segment or next segment).
        expected: String,
        /// The segment that was actually entered.
        actual: String,
    },

    /// The route has no segments at all.
    #[error("route has no segments")]
    EmptyRoute,

    /// A loop operation was requested on a route that is not a loop.
    #[error("route {0} is not a loop")]
    NotALoop(String),
}

/// Result type for route operations.
pub type RouteResult<T> = Result<T, RouteError>;

/// Errors raised by game state transitions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// `enter_game` was called while the rider is already in a game.
    #[error("already in game (state {state:?}), can't enter game again")]
    AlreadyInGame {
        /// The state the transition was attempted from.
        state: GameStateKind,
    },

    /// The state is terminal with respect to navigation.
    #[error("state {state:?} is terminal, log out first")]
    Terminal {
        /// The terminal state.
        state: GameStateKind,
    },

    /// A loop restart was requested but the state or route does not allow it.
    #[error("can't restart loop from state {state:?}")]
    NotALoop {
        /// The state the restart was attempted from.
        state: GameStateKind,
    },

    /// Route progression failed during a transition.
    #[error(transparent)]
    Route(#[from] RouteError),
}

/// Result type for state transitions.
pub type TransitionResult<T> = Result<T, TransitionError>;

/// Errors raised when validating a segment graph.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SegmentError {
    /// An adjacency entry points at a segment that does not exist.
    #[error("segment {segment_id} references unknown segment {target_id}")]
    UnknownAdjacentSegment {
        /// The segment holding the dangling reference.
        segment_id: String,
        /// The missing target.
        target_id: String,
    },

    /// Two segments share the same identifier.
    #[error("duplicate segment id {0}")]
    DuplicateSegment(String),

    /// A segment was built without points.
    #[error("segment {0} has no points")]
    EmptySegment(String),
}

/// Result type for segment validation.
pub type SegmentResult<T> = Result<T, SegmentError>;

//! # TurnPilot Core - The Navigation Brain
//!
//! Everything needed to decide, from a stream of rider positions and
//! game-reported turn options, whether the rider is on their planned route
//! and which turn the game should take next.
//!
//! ## Architecture
//!
//! ```text
//!  position ──► find_segment ──► GameState::update_position ──► new GameState
//!                                        │
//!                                        ▼
//!                             PlannedRoute::entered_segment
//!
//!  "turnleft" ──► TurnAvailabilityTracker ──► match_turn ──► TurnDecision
//! ```
//!
//! ## Guarantees
//!
//! - Game states are values: every transition returns a new state
//! - A route never skips or guesses; unexpected segments are errors
//! - No I/O, no threads, no clocks
//!
//! ## Example
//!
//! ```rust
//! use turnpilot_core::{GameState, SegmentSequenceBuilder};
//!
//! let route = SegmentSequenceBuilder::starting_at("seg-1")
//!     .going_straight_to("seg-2")
//!     .turning_right_to("seg-3")
//!     .build("Commute");
//!
//! let state = GameState::NotLoggedIn.enter_game(42, 1001).unwrap();
//! assert!(state.is_in_game());
//! assert_eq!(route.starting_segment_id(), Some("seg-1"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod navigation;
pub mod route;
pub mod segment;
pub mod state;
pub mod track_point;
pub mod turns;

pub use error::{
    RouteError, RouteResult, SegmentError, SegmentResult, TransitionError, TransitionResult,
};
pub use navigation::{match_turn, TurnDecision};
pub use route::{
    PlannedRoute, RouteMoveResult, SegmentSequence, SegmentSequenceBuilder, SegmentSequenceType,
    SportType, World,
};
pub use segment::{
    find_segment, validate_segments, Segment, SegmentDirection, Turn, TurnDirection,
};
pub use state::{Activity, GameState, GameStateKind, SegmentFix};
pub use track_point::TrackPoint;
pub use turns::{TurnAvailabilityTracker, TurnCommandKind};

/// Rider identifier as reported by the game.
pub type RiderId = u32;

/// Activity identifier as reported by the game.
pub type ActivityId = u64;

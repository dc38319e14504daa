//! # Navigation Matcher
//!
//! Decides which command to send when the game offers a choice of turns.
//! Never guesses: if the planned turn is not on offer, nothing is sent and
//! the next announcement gets another chance.

use crate::route::PlannedRoute;
use crate::segment::TurnDirection;

/// What to do about a set of available turns.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnDecision {
    /// Send this turn.
    Execute(TurnDirection),
    /// The planned turn is not among the options.
    Mismatch {
        /// Turn the route needs.
        expected: TurnDirection,
        /// Turns the game offered.
        available: Vec<TurnDirection>,
    },
    /// The route is not being followed.
    NotNavigating,
}

/// Matches the game's options against the route's next turn.
#[must_use]
pub fn match_turn(route: &PlannedRoute, available: &[TurnDirection]) -> TurnDecision {
    if !route.has_started() && !route.has_completed() {
        return TurnDecision::NotNavigating;
    }

    let expected = route.turn_to_next_segment();
    if expected != TurnDirection::None && available.contains(&expected) {
        TurnDecision::Execute(expected)
    } else {
        TurnDecision::Mismatch {
            expected,
            available: available.to_vec(),
        }
    }
}

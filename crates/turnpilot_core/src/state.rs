//! # Game State Machine
//!
//! The rider's lifecycle, from launching the app to finishing a route.
//!
//! ## States
//!
//! ```text
//! NotLoggedIn ─► LoggedIn ─► WaitingForConnection ─► ConnectedToZwift
//!                                                         │ enter_game
//!                                                         ▼
//!     ┌───────────────────── InGame ──► Positioned ◄──► OnSegment
//!     │                                                   │  ▲
//!     │                                      start/next   ▼  │ off route
//!     │                   LostRouteLock ◄─────────────► OnRoute ◄─► UpcomingTurn
//!     │                                                   │
//!     │                               adjacent to last    ▼
//!     └──────────────── leave_game ◄────────────── CompletedRoute
//!
//!   InvalidCredentials, Error: side branches, cleared by logged_out()
//! ```
//!
//! ## Values, not objects
//!
//! Every operation borrows the current state and returns the next one. The
//! dispatcher that owns the current state swaps it wholesale; nothing ever
//! holds a mutable handle into a state.

use tracing::debug;

use crate::error::{TransitionError, TransitionResult};
use crate::route::PlannedRoute;
use crate::segment::{find_segment, Segment, SegmentDirection, TurnDirection};
use crate::track_point::TrackPoint;
use crate::turns::TurnCommandKind;
use crate::{ActivityId, RiderId};

/// Who is riding, and in which activity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Activity {
    /// Rider identifier, echoed on every outgoing command.
    pub rider_id: RiderId,
    /// Activity identifier.
    pub activity_id: ActivityId,
}

impl Activity {
    /// Creates a new activity reference.
    #[must_use]
    pub const fn new(rider_id: RiderId, activity_id: ActivityId) -> Self {
        Self {
            rider_id,
            activity_id,
        }
    }
}

/// Where on a segment the rider was last seen.
#[derive(Clone, Debug, PartialEq)]
pub struct SegmentFix {
    /// Last reported position.
    pub position: TrackPoint,
    /// Segment containing the position.
    pub segment_id: String,
    /// Direction of travel along the segment.
    pub direction: SegmentDirection,
    /// Index of the segment point closest to the position.
    pub point_index: usize,
}

impl SegmentFix {
    /// Fixes `position` onto `segment` at the closest point.
    ///
    /// Direction is derived from `previous` when it lies on the same segment.
    fn on(
        segment: &Segment,
        point: &TrackPoint,
        position: TrackPoint,
        previous: Option<&SegmentFix>,
    ) -> Self {
        let point_index = point.index().unwrap_or_default();

        let direction = match previous {
            Some(previous) if previous.segment_id == segment.id() => {
                SegmentDirection::from_indices(previous.point_index, point_index, previous.direction)
            }
            _ => SegmentDirection::Unknown,
        };

        Self {
            position,
            segment_id: segment.id().to_string(),
            direction,
            point_index,
        }
    }
}

/// Fieldless mirror of [`GameState`], used for logging and errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GameStateKind {
    /// See [`GameState::NotLoggedIn`].
    NotLoggedIn,
    /// See [`GameState::LoggedIn`].
    LoggedIn,
    /// See [`GameState::WaitingForConnection`].
    WaitingForConnection,
    /// See [`GameState::ConnectedToZwift`].
    ConnectedToZwift,
    /// See [`GameState::InGame`].
    InGame,
    /// See [`GameState::Positioned`].
    Positioned,
    /// See [`GameState::OnSegment`].
    OnSegment,
    /// See [`GameState::OnRoute`].
    OnRoute,
    /// See [`GameState::UpcomingTurn`].
    UpcomingTurn,
    /// See [`GameState::CompletedRoute`].
    CompletedRoute,
    /// See [`GameState::LostRouteLock`].
    LostRouteLock,
    /// See [`GameState::InvalidCredentials`].
    InvalidCredentials,
    /// See [`GameState::Error`].
    Error,
}

/// The rider's current situation.
#[derive(Clone, Debug, PartialEq)]
pub enum GameState {
    /// No credentials yet.
    NotLoggedIn,
    /// Credentials accepted, not listening for the game yet.
    LoggedIn,
    /// Listening for the game to connect.
    WaitingForConnection,
    /// The game is connected, the rider is not in an activity.
    ConnectedToZwift,
    /// The rider started an activity; no position yet.
    InGame(Activity),
    /// Position known but not on any known segment.
    Positioned {
        /// The activity.
        activity: Activity,
        /// Last reported position.
        position: TrackPoint,
    },
    /// On a known segment, not following the route.
    OnSegment {
        /// The activity.
        activity: Activity,
        /// Position on the segment.
        fix: SegmentFix,
    },
    /// Following the planned route.
    OnRoute {
        /// The activity.
        activity: Activity,
        /// Position on the route's current segment.
        fix: SegmentFix,
        /// The route, cursor on the current segment.
        route: PlannedRoute,
        /// Turn options reported so far for this segment (fewer than two).
        available_turns: Vec<TurnDirection>,
    },
    /// Following the route, with a choice of turns coming up.
    UpcomingTurn {
        /// The activity.
        activity: Activity,
        /// Position on the route's current segment.
        fix: SegmentFix,
        /// The route, cursor on the current segment.
        route: PlannedRoute,
        /// Turn options reported by the game, sorted.
        directions: Vec<TurnDirection>,
    },
    /// The route is done.
    CompletedRoute {
        /// The activity.
        activity: Activity,
        /// Last reported position.
        position: TrackPoint,
        /// The completed route.
        route: PlannedRoute,
    },
    /// Was following the route but the position matches no segment.
    LostRouteLock {
        /// The activity.
        activity: Activity,
        /// Last reported position.
        position: TrackPoint,
        /// The route, cursor where the lock was lost.
        route: PlannedRoute,
    },
    /// Credentials were rejected.
    InvalidCredentials {
        /// Why they were rejected.
        reason: String,
    },
    /// Something went wrong that needs outside intervention.
    Error {
        /// What went wrong.
        message: String,
    },
}

/// How a located segment relates to the route.
enum Progress {
    Start,
    Advance,
    Stay,
    Complete,
    OffRoute,
}

impl GameState {
    // ========================================================================
    // CORE TRANSITIONS
    // ========================================================================

    /// The rider started an activity.
    ///
    /// # Errors
    ///
    /// [`TransitionError::AlreadyInGame`] from any in-game state other than
    /// `InGame` itself, [`TransitionError::Terminal`] from the side branches.
    pub fn enter_game(&self, rider_id: RiderId, activity_id: ActivityId) -> TransitionResult<Self> {
        let activity = Activity::new(rider_id, activity_id);

        match self {
            Self::InGame(current) if *current == activity => Ok(self.clone()),
            Self::InGame(_) => Ok(Self::InGame(activity)),
            Self::InvalidCredentials { .. } | Self::Error { .. } => {
                Err(TransitionError::Terminal { state: self.kind() })
            }
            state if state.is_in_game() => Err(TransitionError::AlreadyInGame { state: self.kind() }),
            _ => Ok(Self::InGame(activity)),
        }
    }

    /// The rider left the activity. Ignored while `InvalidCredentials` or
    /// `Error`.
    #[must_use]
    pub fn leave_game(&self) -> Self {
        self.unless_terminal(Self::ConnectedToZwift)
    }

    /// The game reported a new rider position.
    ///
    /// `route` is used until a route-carrying state exists; from then on the
    /// state's own copy is authoritative.
    ///
    /// # Errors
    ///
    /// Propagates route progression errors. Positions that do not match the
    /// route's prediction are not errors: they degrade to `OnSegment`.
    pub fn update_position(
        &self,
        position: TrackPoint,
        segments: &[Segment],
        route: &PlannedRoute,
    ) -> TransitionResult<Self> {
        match self {
            Self::InGame(activity) | Self::Positioned { activity, .. } => {
                Self::locate(*activity, position, segments, route, None)
            }
            Self::OnSegment { activity, fix } => {
                Self::locate(*activity, position, segments, route, Some(fix))
            }
            Self::OnRoute {
                activity,
                fix,
                route,
                available_turns,
            } => Self::follow(*activity, position, segments, route, Some(fix), |fix, route| {
                Self::OnRoute {
                    activity: *activity,
                    fix,
                    route,
                    available_turns: available_turns.clone(),
                }
            }),
            Self::UpcomingTurn {
                activity,
                fix,
                route,
                directions,
            } => Self::follow(*activity, position, segments, route, Some(fix), |fix, route| {
                Self::UpcomingTurn {
                    activity: *activity,
                    fix,
                    route,
                    directions: directions.clone(),
                }
            }),
            Self::LostRouteLock {
                activity, route, ..
            } => Self::follow(*activity, position, segments, route, None, |fix, route| {
                Self::OnRoute {
                    activity: *activity,
                    fix,
                    route,
                    available_turns: Vec::new(),
                }
            }),
            Self::CompletedRoute {
                activity, route, ..
            } => Ok(Self::CompletedRoute {
                activity: *activity,
                position,
                route: route.clone(),
            }),
            _ => Ok(self.clone()),
        }
    }

    /// The game reported a command the rider can pick.
    ///
    /// Turn options accumulate while on route. A second distinct option
    /// means a junction is coming: `OnRoute` becomes `UpcomingTurn`.
    #[must_use]
    pub fn turn_command_available(&self, command_type: &str) -> Self {
        let Some(direction) = TurnCommandKind::parse(command_type).and_then(TurnCommandKind::direction)
        else {
            return self.clone();
        };

        match self {
            Self::OnRoute {
                activity,
                fix,
                route,
                available_turns,
            } => {
                let turns = with_direction(available_turns, direction);
                if turns.len() >= 2 {
                    debug!("Upcoming turn with options {:?}", turns);
                    Self::UpcomingTurn {
                        activity: *activity,
                        fix: fix.clone(),
                        route: route.clone(),
                        directions: turns,
                    }
                } else {
                    Self::OnRoute {
                        activity: *activity,
                        fix: fix.clone(),
                        route: route.clone(),
                        available_turns: turns,
                    }
                }
            }
            Self::UpcomingTurn {
                activity,
                fix,
                route,
                directions,
            } => Self::UpcomingTurn {
                activity: *activity,
                fix: fix.clone(),
                route: route.clone(),
                directions: with_direction(directions, direction),
            },
            _ => self.clone(),
        }
    }

    // ========================================================================
    // LIFECYCLE
    // ========================================================================

    /// Credentials were accepted.
    #[must_use]
    pub fn logged_in(&self) -> Self {
        self.unless_terminal(Self::LoggedIn)
    }

    /// The rider logged out. Also clears the side branches.
    #[must_use]
    pub fn logged_out(&self) -> Self {
        Self::NotLoggedIn
    }

    /// The connection is listening for the game.
    #[must_use]
    pub fn waiting_for_connection(&self) -> Self {
        self.unless_terminal(Self::WaitingForConnection)
    }

    /// The game connected.
    #[must_use]
    pub fn connected(&self) -> Self {
        self.unless_terminal(Self::ConnectedToZwift)
    }

    /// Credentials were rejected.
    #[must_use]
    pub fn invalid_credentials(&self, reason: impl Into<String>) -> Self {
        Self::InvalidCredentials {
            reason: reason.into(),
        }
    }

    /// Something went wrong.
    #[must_use]
    pub fn error(&self, message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Starts another lap of a completed loop route.
    ///
    /// # Errors
    ///
    /// [`TransitionError::NotALoop`] unless the state is `CompletedRoute`
    /// with a loop route.
    pub fn restart_loop(&self, segments: &[Segment]) -> TransitionResult<Self> {
        let Self::CompletedRoute {
            activity,
            position,
            route,
        } = self
        else {
            return Err(TransitionError::NotALoop { state: self.kind() });
        };

        if !route.is_loop() {
            return Err(TransitionError::NotALoop { state: self.kind() });
        }

        let mut route = route.clone();
        route.enter_next_loop()?;

        let segment_id = route.current_segment_id().unwrap_or_default().to_string();
        let point_index = segments
            .iter()
            .find(|segment| segment.id() == segment_id)
            .and_then(|segment| segment.closest_point_to(position))
            .and_then(TrackPoint::index)
            .unwrap_or_default();

        Ok(Self::OnRoute {
            activity: *activity,
            fix: SegmentFix {
                position: *position,
                segment_id,
                direction: SegmentDirection::Unknown,
                point_index,
            },
            route,
            available_turns: Vec::new(),
        })
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    /// Whether the rider is inside an activity.
    #[must_use]
    pub fn is_in_game(&self) -> bool {
        matches!(
            self,
            Self::InGame(_)
                | Self::Positioned { .. }
                | Self::OnSegment { .. }
                | Self::OnRoute { .. }
                | Self::UpcomingTurn { .. }
                | Self::CompletedRoute { .. }
                | Self::LostRouteLock { .. }
        )
    }

    /// Whether navigation is halted until the rider logs out.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::InvalidCredentials { .. } | Self::Error { .. })
    }

    /// The activity, for in-game states.
    #[must_use]
    pub fn activity(&self) -> Option<Activity> {
        match self {
            Self::InGame(activity)
            | Self::Positioned { activity, .. }
            | Self::OnSegment { activity, .. }
            | Self::OnRoute { activity, .. }
            | Self::UpcomingTurn { activity, .. }
            | Self::CompletedRoute { activity, .. }
            | Self::LostRouteLock { activity, .. } => Some(*activity),
            _ => None,
        }
    }

    /// Rider id for outgoing commands, 0 outside a game.
    #[must_use]
    pub fn rider_id(&self) -> RiderId {
        self.activity().map_or(0, |activity| activity.rider_id)
    }

    /// The route carried by route-following states.
    #[must_use]
    pub fn route(&self) -> Option<&PlannedRoute> {
        match self {
            Self::OnRoute { route, .. }
            | Self::UpcomingTurn { route, .. }
            | Self::CompletedRoute { route, .. }
            | Self::LostRouteLock { route, .. } => Some(route),
            _ => None,
        }
    }

    /// Segment the rider is on, if known.
    #[must_use]
    pub fn current_segment_id(&self) -> Option<&str> {
        match self {
            Self::OnSegment { fix, .. }
            | Self::OnRoute { fix, .. }
            | Self::UpcomingTurn { fix, .. } => Some(&fix.segment_id),
            _ => None,
        }
    }

    /// Last reported position, if any.
    #[must_use]
    pub fn position(&self) -> Option<TrackPoint> {
        match self {
            Self::Positioned { position, .. }
            | Self::CompletedRoute { position, .. }
            | Self::LostRouteLock { position, .. } => Some(*position),
            Self::OnSegment { fix, .. }
            | Self::OnRoute { fix, .. }
            | Self::UpcomingTurn { fix, .. } => Some(fix.position),
            _ => None,
        }
    }

    /// Fieldless variant, for logs and errors.
    #[must_use]
    pub fn kind(&self) -> GameStateKind {
        match self {
            Self::NotLoggedIn => GameStateKind::NotLoggedIn,
            Self::LoggedIn => GameStateKind::LoggedIn,
            Self::WaitingForConnection => GameStateKind::WaitingForConnection,
            Self::ConnectedToZwift => GameStateKind::ConnectedToZwift,
            Self::InGame(_) => GameStateKind::InGame,
            Self::Positioned { .. } => GameStateKind::Positioned,
            Self::OnSegment { .. } => GameStateKind::OnSegment,
            Self::OnRoute { .. } => GameStateKind::OnRoute,
            Self::UpcomingTurn { .. } => GameStateKind::UpcomingTurn,
            Self::CompletedRoute { .. } => GameStateKind::CompletedRoute,
            Self::LostRouteLock { .. } => GameStateKind::LostRouteLock,
            Self::InvalidCredentials { .. } => GameStateKind::InvalidCredentials,
            Self::Error { .. } => GameStateKind::Error,
        }
    }

    // ========================================================================
    // INTERNALS
    // ========================================================================

    fn unless_terminal(&self, next: Self) -> Self {
        if self.is_terminal() {
            self.clone()
        } else {
            next
        }
    }

    /// Positions while not locked onto the route.
    fn locate(
        activity: Activity,
        position: TrackPoint,
        segments: &[Segment],
        route: &PlannedRoute,
        previous: Option<&SegmentFix>,
    ) -> TransitionResult<Self> {
        let Some((segment, point)) = find_segment(segments, &position) else {
            return Ok(Self::Positioned { activity, position });
        };
        let fix = SegmentFix::on(segment, point, position, previous);
        let id = segment.id();

        let progress = if route.has_completed() {
            Progress::OffRoute
        } else if !route.has_started() {
            if route.starting_segment_id() == Some(id) {
                Progress::Start
            } else {
                Progress::OffRoute
            }
        } else if route.next_segment_id() == Some(id) {
            Progress::Advance
        } else if route.current_segment_id() == Some(id) && !route.is_on_last_segment() {
            Progress::Stay
        } else {
            Progress::OffRoute
        };

        let mut route = route.clone();
        match progress {
            Progress::Start | Progress::Advance => {
                route.entered_segment(id)?;
            }
            Progress::Stay => {}
            Progress::Complete | Progress::OffRoute => {
                return Ok(Self::OnSegment { activity, fix });
            }
        }

        Ok(Self::OnRoute {
            activity,
            fix,
            route,
            available_turns: Vec::new(),
        })
    }

    /// Positions while locked onto (or just lost from) the route.
    ///
    /// `stay` builds the state for a position on the current segment.
    fn follow(
        activity: Activity,
        position: TrackPoint,
        segments: &[Segment],
        route: &PlannedRoute,
        previous: Option<&SegmentFix>,
        stay: impl FnOnce(SegmentFix, PlannedRoute) -> Self,
    ) -> TransitionResult<Self> {
        let Some((segment, point)) = find_segment(segments, &position) else {
            return Ok(Self::LostRouteLock {
                activity,
                position,
                route: route.clone(),
            });
        };
        let fix = SegmentFix::on(segment, point, position, previous);
        let id = segment.id();

        let progress = if route.current_segment_id() == Some(id) {
            Progress::Stay
        } else if route.next_segment_id() == Some(id) {
            Progress::Advance
        } else if route.is_on_last_segment() && last_segment_is_adjacent(segments, route, id) {
            Progress::Complete
        } else {
            Progress::OffRoute
        };

        let mut route = route.clone();
        match progress {
            Progress::Stay => Ok(stay(fix, route)),
            Progress::Start | Progress::Advance => {
                route.entered_segment(id)?;
                Ok(Self::OnRoute {
                    activity,
                    fix,
                    route,
                    available_turns: Vec::new(),
                })
            }
            Progress::Complete => {
                route.complete();
                Ok(Self::CompletedRoute {
                    activity,
                    position,
                    route,
                })
            }
            Progress::OffRoute => Ok(Self::OnSegment { activity, fix }),
        }
    }
}

fn last_segment_is_adjacent(segments: &[Segment], route: &PlannedRoute, segment_id: &str) -> bool {
    route
        .current_segment_id()
        .and_then(|current| segments.iter().find(|segment| segment.id() == current))
        .is_some_and(|current| current.is_adjacent_to(segment_id))
}

fn with_direction(directions: &[TurnDirection], direction: TurnDirection) -> Vec<TurnDirection> {
    let mut directions = directions.to_vec();
    if !directions.contains(&direction) {
        directions.push(direction);
        directions.sort_unstable();
    }
    directions
}

//! # Game State Dispatcher
//!
//! The only place a [`GameState`] transition happens.
//!
//! ## Flow
//!
//! ```text
//!  router / engine / signals ──► DispatchEvent ──► channel (FIFO)
//!                                                     │
//!                                      dispatcher thread: GameStateMachine::apply
//!                                                     │
//!                                                     ▼
//!                              Notification ──► every subscriber
//!                     (StateChanged, TurnCommandsAvailable, LastSequenceNumber)
//! ```
//!
//! Events are applied one at a time, in the order they were sent. A
//! transition that fails is logged and the previous state stays current.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};
use turnpilot_core::{
    ActivityId, GameState, PlannedRoute, RiderId, Segment, TrackPoint, TurnAvailabilityTracker,
    TurnDirection,
};
use turnpilot_networking::CancellationToken;

use crate::error::{EngineError, EngineResult};

/// Something that may change the game state.
#[derive(Clone, Debug, PartialEq)]
pub enum DispatchEvent {
    /// Credentials were accepted.
    LoggedIn,
    /// Credentials were cleared.
    LoggedOut,
    /// Listening for the game.
    WaitingForConnection,
    /// The game connected.
    Connected,
    /// The rider started an activity.
    EnterGame {
        /// Rider identifier.
        rider_id: RiderId,
        /// Activity identifier.
        activity_id: ActivityId,
    },
    /// The rider ended the activity.
    LeaveGame,
    /// The rider moved.
    PositionChanged(TrackPoint),
    /// The game announced a command the rider can pick.
    TurnCommandAvailable {
        /// Command type as sent by the game.
        kind: String,
        /// Sequence number of the announcing message.
        sequence: u64,
    },
    /// A route plan was loaded.
    RouteSelected {
        /// Route to ride.
        route: PlannedRoute,
        /// Segments the route runs over.
        segments: Vec<Segment>,
    },
    /// Ride another lap of the completed loop route.
    RestartLoop,
    /// Game messages could not be decrypted.
    IncorrectConnectionSecret,
    /// Something went wrong that needs the user's attention.
    Error(String),
    /// Credentials were rejected.
    InvalidCredentials(String),
}

/// Published after an event was applied.
#[derive(Clone, Debug, PartialEq)]
pub enum Notification {
    /// The state has a new value.
    StateChanged(GameState),
    /// The rider can pick between these turns now.
    TurnCommandsAvailable {
        /// Available turns, empty when cleared.
        directions: Vec<TurnDirection>,
        /// Route as of the announcement.
        route: PlannedRoute,
        /// Sequence number to echo on a command.
        sequence: u64,
        /// Rider to steer.
        rider_id: RiderId,
    },
    /// The game's latest sequence number.
    LastSequenceNumber(u64),
}

// ============================================================================
// STATE MACHINE
// ============================================================================

/// Owns the current state and everything transitions depend on.
#[derive(Debug, Clone)]
pub struct GameStateMachine {
    state: GameState,
    route: PlannedRoute,
    segments: Vec<Segment>,
    last_sequence: u64,
    tracker: TurnAvailabilityTracker,
}

impl Default for GameStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl GameStateMachine {
    /// Starts logged out without a route.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: GameState::NotLoggedIn,
            route: PlannedRoute::default(),
            segments: Vec::new(),
            last_sequence: 0,
            tracker: TurnAvailabilityTracker::new(),
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Route as known to the machine.
    #[must_use]
    pub fn route(&self) -> &PlannedRoute {
        &self.route
    }

    /// Latest sequence number seen.
    #[must_use]
    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    /// Applies one event.
    pub fn apply(&mut self, event: DispatchEvent) -> Vec<Notification> {
        let mut notifications = Vec::new();

        let next = match event {
            DispatchEvent::LoggedIn => Some(self.state.logged_in()),
            DispatchEvent::LoggedOut => Some(self.state.logged_out()),
            DispatchEvent::WaitingForConnection => Some(self.state.waiting_for_connection()),
            DispatchEvent::Connected => Some(self.state.connected()),
            DispatchEvent::EnterGame {
                rider_id,
                activity_id,
            } => match self.state.enter_game(rider_id, activity_id) {
                Ok(next) => {
                    if !self.state.is_in_game() {
                        self.route.reset();
                        self.tracker = TurnAvailabilityTracker::new();
                    }
                    Some(next)
                }
                Err(e) => {
                    warn!("Ignoring enter game for rider {}: {}", rider_id, e);
                    None
                }
            },
            DispatchEvent::LeaveGame => Some(self.state.leave_game()),
            DispatchEvent::PositionChanged(position) => {
                match self
                    .state
                    .update_position(position, &self.segments, &self.route)
                {
                    Ok(next) => Some(next),
                    Err(e) => {
                        warn!("Position update rejected: {}", e);
                        None
                    }
                }
            }
            DispatchEvent::TurnCommandAvailable { kind, sequence } => {
                self.last_sequence = sequence;
                notifications.push(Notification::LastSequenceNumber(sequence));

                let next = self.state.turn_command_available(&kind);
                if let Some(directions) = self.tracker.observe(&kind, next.current_segment_id()) {
                    notifications.push(Notification::TurnCommandsAvailable {
                        directions,
                        route: next.route().unwrap_or(&self.route).clone(),
                        sequence,
                        rider_id: next.rider_id(),
                    });
                }
                Some(next)
            }
            DispatchEvent::RouteSelected { route, segments } => {
                info!(
                    "Route '{}' selected ({} segments)",
                    route.name,
                    segments.len()
                );
                self.route = route;
                self.segments = segments;
                self.tracker = TurnAvailabilityTracker::new();
                None
            }
            DispatchEvent::RestartLoop => match self.state.restart_loop(&self.segments) {
                Ok(next) => Some(next),
                Err(e) => {
                    warn!("Can't restart the loop: {}", e);
                    None
                }
            },
            DispatchEvent::IncorrectConnectionSecret => Some(
                self.state
                    .error("Game messages could not be decrypted, check the connection secret"),
            ),
            DispatchEvent::Error(message) => Some(self.state.error(message)),
            DispatchEvent::InvalidCredentials(reason) => {
                Some(self.state.invalid_credentials(reason))
            }
        };

        if let Some(next) = next {
            if let Some(route) = next.route() {
                self.route = route.clone();
            }
            if next != self.state {
                self.state = next;
                notifications.insert(0, Notification::StateChanged(self.state.clone()));
            }
        }

        notifications
    }
}

// ============================================================================
// DISPATCHER THREAD
// ============================================================================

type Subscribers = Arc<Mutex<Vec<Sender<Notification>>>>;

/// Runs a [`GameStateMachine`] on its own thread.
pub struct Dispatcher {
    events: Sender<DispatchEvent>,
    inbox: Receiver<DispatchEvent>,
    subscribers: Subscribers,
    state: Arc<Mutex<GameState>>,
    machine: Mutex<Option<GameStateMachine>>,
    poll_interval: Duration,
    cancel: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Dispatcher {
    /// Wraps `machine`. Events queue up until [`Dispatcher::start`].
    #[must_use]
    pub fn new(machine: GameStateMachine, poll_interval: Duration) -> Self {
        let (events, inbox) = unbounded();

        Self {
            events,
            inbox,
            subscribers: Arc::new(Mutex::new(Vec::new())),
            state: Arc::new(Mutex::new(machine.state().clone())),
            machine: Mutex::new(Some(machine)),
            poll_interval,
            cancel: CancellationToken::new(),
            worker: Mutex::new(None),
        }
    }

    /// Returns a receiver for every notification published from now on.
    #[must_use]
    pub fn subscribe(&self) -> Receiver<Notification> {
        let (sender, receiver) = unbounded();
        self.subscribers.lock().push(sender);
        receiver
    }

    /// Handle for sending events from other threads.
    #[must_use]
    pub fn sender(&self) -> Sender<DispatchEvent> {
        self.events.clone()
    }

    /// Queues an event.
    ///
    /// # Errors
    ///
    /// [`EngineError::DispatcherStopped`] after shutdown.
    pub fn dispatch(&self, event: DispatchEvent) -> EngineResult<()> {
        if self.cancel.is_cancelled() {
            return Err(EngineError::DispatcherStopped);
        }
        self.events
            .send(event)
            .map_err(|_| EngineError::DispatcherStopped)
    }

    /// Snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> GameState {
        self.state.lock().clone()
    }

    /// Starts applying events. Calling it again does nothing.
    ///
    /// # Errors
    ///
    /// [`EngineError::DispatcherStopped`] after shutdown,
    /// [`EngineError::Spawn`] if the thread could not be created.
    pub fn start(&self) -> EngineResult<()> {
        let mut worker = self.worker.lock();
        if self.cancel.is_cancelled() {
            return Err(EngineError::DispatcherStopped);
        }
        let Some(machine) = self.machine.lock().take() else {
            return Ok(());
        };

        let run = DispatchLoop {
            machine,
            inbox: self.inbox.clone(),
            subscribers: Arc::clone(&self.subscribers),
            state: Arc::clone(&self.state),
            poll_interval: self.poll_interval,
            cancel: self.cancel.clone(),
        };

        let handle = thread::Builder::new()
            .name("turnpilot-dispatcher".to_string())
            .spawn(move || run.run())
            .map_err(|source| EngineError::Spawn {
                task: "dispatcher".to_string(),
                source,
            })?;
        *worker = Some(handle);
        Ok(())
    }

    /// Stops the thread. Events still queued are dropped.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if worker.join().is_err() {
                error!("Dispatcher thread panicked");
            }
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct DispatchLoop {
    machine: GameStateMachine,
    inbox: Receiver<DispatchEvent>,
    subscribers: Subscribers,
    state: Arc<Mutex<GameState>>,
    poll_interval: Duration,
    cancel: CancellationToken,
}

impl DispatchLoop {
    fn run(mut self) {
        debug!("Dispatcher started");

        while !self.cancel.is_cancelled() {
            let event = match self.inbox.recv_timeout(self.poll_interval) {
                Ok(event) => event,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };

            let notifications = self.machine.apply(event);
            *self.state.lock() = self.machine.state().clone();

            let mut subscribers = self.subscribers.lock();
            for notification in notifications {
                subscribers.retain(|subscriber| subscriber.send(notification.clone()).is_ok());
            }
        }

        debug!("Dispatcher stopped");
    }
}

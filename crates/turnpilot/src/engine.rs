//! # Engine
//!
//! Starts and stops background work as the game state moves.
//!
//! ## Reactions
//!
//! | New state                    | Engine does                                   |
//! |------------------------------|-----------------------------------------------|
//! | `LoggedIn`                   | start `listener` + `signals`                  |
//! | `NotLoggedIn`                | stop `listener` + `signals`                   |
//! | any in-game, from outside    | start `navigation`                            |
//! | out of game, from in-game    | stop `navigation`                             |
//! | `CompletedRoute`             | end the activity, or restart the loop         |
//! | `InvalidCredentials`         | stop everything                               |
//!
//! Only transitions that change the kind of state are logged; position
//! updates on the same segment are not interesting.
//!
//! Notifications are handled in dispatch order. Turn options go to the
//! navigation task through a channel the engine owns, so a task started
//! for an activity sees every option announced in it.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};
use turnpilot_core::{GameState, GameStateKind, PlannedRoute, RiderId, Segment};
use turnpilot_networking::{
    CancellationToken, CommandSender, CommandSink, ConnectionConfig, ConnectionCrypto,
    ConnectionError, ConnectionResult, ConnectionSignal, GameConnection, GameMessageCodec,
    IncomingMessageDecoder, OutgoingCommand,
};

use crate::config::{AppConfig, NavigationConfig};
use crate::dispatcher::{DispatchEvent, Dispatcher, GameStateMachine, Notification};
use crate::error::EngineResult;
use crate::navigator::run_navigation;
use crate::router::MessageRouter;
use crate::tasks::{TaskName, TaskTable};

// ============================================================================
// GAME LINK
// ============================================================================

/// Command sink for whichever connection is current.
#[derive(Default)]
pub struct GameLink {
    sender: Mutex<Option<CommandSender>>,
}

impl GameLink {
    /// Creates a detached link.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes commands through `sender` from now on.
    pub fn attach(&self, sender: CommandSender) {
        *self.sender.lock() = Some(sender);
    }

    /// Drops the current sender.
    pub fn detach(&self) {
        self.sender.lock().take();
    }

    /// Whether a connection is attached.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.sender.lock().is_some()
    }
}

impl CommandSink for GameLink {
    fn send_command(&self, command: OutgoingCommand) -> ConnectionResult<()> {
        match self.sender.lock().as_ref() {
            Some(sender) => sender.send_command(command),
            None => Err(ConnectionError::NotConnected),
        }
    }
}

// ============================================================================
// SIGNALS
// ============================================================================

/// Dispatch event for a connection signal, if it has one.
#[must_use]
pub fn signal_event(signal: &ConnectionSignal) -> Option<DispatchEvent> {
    match signal {
        ConnectionSignal::WaitingForConnection => Some(DispatchEvent::WaitingForConnection),
        ConnectionSignal::Connected { .. } => Some(DispatchEvent::Connected),
        ConnectionSignal::IncorrectConnectionSecret => {
            Some(DispatchEvent::IncorrectConnectionSecret)
        }
        ConnectionSignal::AcceptTimeoutExpired
        | ConnectionSignal::DataTimeoutExpired
        | ConnectionSignal::ConnectionLost => None,
    }
}

fn forward_signals(
    signals: &Receiver<ConnectionSignal>,
    events: &Sender<DispatchEvent>,
    cancel: &CancellationToken,
    poll_interval: Duration,
) {
    while !cancel.is_cancelled() {
        match signals.recv_timeout(poll_interval) {
            Ok(signal) => {
                let Some(event) = signal_event(&signal) else {
                    continue;
                };
                if events.send(event).is_err() {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

// ============================================================================
// COMPLETION
// ============================================================================

/// What to do once the route is completed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompletionAction {
    /// Ask the game to end and save the activity.
    EndActivity,
    /// Ride the loop again.
    RestartLoop,
    /// Keep riding, off route.
    Nothing,
}

/// Ending the activity wins over looping.
#[must_use]
pub fn completion_action(navigation: &NavigationConfig, route: &PlannedRoute) -> CompletionAction {
    if navigation.end_activity_at_end_of_route {
        CompletionAction::EndActivity
    } else if route.is_loop() && navigation.loop_route_at_end_of_route {
        CompletionAction::RestartLoop
    } else {
        CompletionAction::Nothing
    }
}

// ============================================================================
// ENGINE
// ============================================================================

/// Wires the connection, dispatcher and tasks together.
pub struct Engine {
    config: AppConfig,
    crypto: Arc<dyn ConnectionCrypto>,
    codec: Arc<dyn GameMessageCodec>,
    dispatcher: Dispatcher,
    notifications: Receiver<Notification>,
    link: Arc<GameLink>,
    commands: Arc<dyn CommandSink>,
    connection: Option<Arc<GameConnection>>,
    navigation: Option<Sender<Notification>>,
    tasks: TaskTable,
    previous: Option<GameState>,
    last_sequence: u64,
    stop: CancellationToken,
}

impl Engine {
    /// Starts the dispatcher with `route` selected.
    ///
    /// Nothing listens for the game until the state becomes `LoggedIn`.
    ///
    /// # Errors
    ///
    /// [`EngineError::Spawn`](crate::EngineError::Spawn) if the dispatcher
    /// thread could not be started.
    pub fn new(
        config: AppConfig,
        route: PlannedRoute,
        segments: Vec<Segment>,
        crypto: Arc<dyn ConnectionCrypto>,
        codec: Arc<dyn GameMessageCodec>,
    ) -> EngineResult<Self> {
        let dispatcher = Dispatcher::new(
            GameStateMachine::new(),
            config.connection.receive_poll_interval(),
        );
        let notifications = dispatcher.subscribe();
        dispatcher.dispatch(DispatchEvent::RouteSelected { route, segments })?;
        dispatcher.start()?;

        let link = Arc::new(GameLink::new());

        Ok(Self {
            config,
            crypto,
            codec,
            dispatcher,
            notifications,
            commands: link.clone(),
            link,
            connection: None,
            navigation: None,
            tasks: TaskTable::new(),
            previous: None,
            last_sequence: 0,
            stop: CancellationToken::new(),
        })
    }

    /// Sends commands through `commands` instead of the game connection.
    #[must_use]
    pub fn with_command_sink(mut self, commands: Arc<dyn CommandSink>) -> Self {
        self.commands = commands;
        self
    }

    /// The dispatcher driving this engine.
    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Token that ends [`Engine::run`] when raised.
    #[must_use]
    pub fn stop_handle(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// Tasks currently running.
    #[must_use]
    pub fn running_tasks(&self) -> Vec<TaskName> {
        self.tasks.running()
    }

    /// Address the game can connect to, while listening.
    #[must_use]
    pub fn listening_on(&self) -> Option<SocketAddr> {
        self.connection.as_ref().and_then(|c| c.local_addr())
    }

    /// Handles notifications until the stop handle is raised, then shuts
    /// everything down.
    pub fn run(&mut self) {
        let poll = self.poll_interval();
        info!("Engine running");

        while !self.stop.is_cancelled() {
            self.process_next(poll);
        }

        self.shutdown();
    }

    /// Handles at most one notification, waiting up to `timeout`.
    ///
    /// Returns whether one was handled.
    pub fn process_next(&mut self, timeout: Duration) -> bool {
        match self.notifications.recv_timeout(timeout) {
            Ok(notification) => {
                self.handle(notification);
                true
            }
            Err(RecvTimeoutError::Timeout) => false,
            Err(RecvTimeoutError::Disconnected) => {
                warn!("Dispatcher went away, stopping");
                self.stop.cancel();
                false
            }
        }
    }

    /// Reacts to one notification.
    pub fn handle(&mut self, notification: Notification) {
        match notification {
            Notification::StateChanged(state) => self.on_state_changed(state),
            Notification::LastSequenceNumber(sequence) => self.last_sequence = sequence,
            options @ Notification::TurnCommandsAvailable { .. } => {
                if let Some(navigation) = &self.navigation {
                    if navigation.send(options).is_err() {
                        warn!("Navigation task is gone, dropping turn options");
                    }
                }
            }
        }
    }

    /// Stops every task, the connection and the dispatcher.
    pub fn shutdown(&mut self) {
        self.stop.cancel();
        self.navigation = None;
        self.tasks.stop_all();
        self.release_connection();
        self.dispatcher.shutdown();
        info!("Engine stopped");
    }

    fn poll_interval(&self) -> Duration {
        self.config.connection.receive_poll_interval()
    }

    fn report(&self, event: DispatchEvent) {
        if let Err(e) = self.dispatcher.dispatch(event) {
            warn!("Can't dispatch: {}", e);
        }
    }

    fn on_state_changed(&mut self, state: GameState) {
        let previous_kind = self.previous.as_ref().map(GameState::kind);
        let was_in_game = self.previous.as_ref().is_some_and(GameState::is_in_game);
        let kind = state.kind();

        if let Some(previous_kind) = previous_kind.filter(|previous| *previous != kind) {
            info!("Transitioned from {:?} to {:?}", previous_kind, kind);
        }

        match &state {
            GameState::LoggedIn => {
                info!("User logged in");
                self.start_listener();
            }
            GameState::NotLoggedIn => {
                self.stop_listener();
            }
            GameState::WaitingForConnection => {
                if previous_kind != Some(kind) {
                    info!("Waiting for connection from the game");
                }
            }
            GameState::ConnectedToZwift if was_in_game => {
                info!("User left activity");
            }
            GameState::ConnectedToZwift => {
                if previous_kind != Some(kind) {
                    info!("Connected to the game");
                }
            }
            GameState::InvalidCredentials { reason } => {
                error!("Credentials rejected: {}", reason);
                self.navigation = None;
                self.tasks.stop_all();
                self.release_connection();
            }
            GameState::Error { message } => {
                error!("{}", message);
            }
            _ => {}
        }

        if state.is_in_game() && !was_in_game {
            info!("User entered the game");
            self.start_navigation();
        } else if !state.is_in_game() && was_in_game {
            self.navigation = None;
            self.tasks.stop(TaskName::Navigation);
        }

        if let GameState::CompletedRoute { route, .. } = &state {
            if previous_kind != Some(GameStateKind::CompletedRoute) {
                self.on_completed_route(route, state.rider_id());
            }
        }

        self.previous = Some(state);
    }

    fn on_completed_route(&self, route: &PlannedRoute, rider_id: RiderId) {
        match completion_action(&self.config.navigation, route) {
            CompletionAction::EndActivity => {
                let activity_name = format!("TurnPilot: {}", route.name);
                info!("Route completed, ending activity '{}'", activity_name);
                if let Err(e) = self
                    .commands
                    .end_activity(self.last_sequence, &activity_name, rider_id)
                {
                    error!("Failed to end the activity: {}", e);
                }
            }
            CompletionAction::RestartLoop => {
                info!("Loop completed, starting lap {}", route.loop_count() + 2);
                self.report(DispatchEvent::RestartLoop);
            }
            CompletionAction::Nothing => info!("Route '{}' completed", route.name),
        }
    }

    fn start_listener(&mut self) {
        if self.tasks.is_running(TaskName::Listener) {
            return;
        }
        self.release_connection();

        let (connection, signals) = match self.open_connection() {
            Ok(opened) => opened,
            Err(e) => {
                error!("Can't listen for the game: {}", e);
                self.report(DispatchEvent::Error(e.to_string()));
                return;
            }
        };
        let config: &ConnectionConfig = &self.config.connection;

        let router = Arc::new(MessageRouter::new(
            Arc::clone(&self.codec),
            self.dispatcher.sender(),
        ));
        let decoder = IncomingMessageDecoder::new(
            connection.clone(),
            Arc::clone(&self.crypto),
            router,
            connection.signals().clone(),
            config,
        );

        let listening = Arc::clone(&connection);
        let started = self.tasks.start(TaskName::Listener, move |token| {
            let stats = decoder.run(&token);
            debug!("Decoded {} frames from {} bytes", stats.frames, stats.bytes);
            listening.shutdown();
        });
        if let Err(e) = started {
            error!("{}", e);
            connection.shutdown();
            return;
        }

        let events = self.dispatcher.sender();
        let poll = self.poll_interval();
        if let Err(e) = self.tasks.start(TaskName::Signals, move |token| {
            forward_signals(&signals, &events, &token, poll);
        }) {
            error!("{}", e);
        }

        self.link
            .attach(CommandSender::new(connection.clone(), Arc::clone(&self.codec)));
        self.connection = Some(connection);
    }

    /// Binds a fresh connection, subscribed to its signals before any are
    /// published.
    fn open_connection(
        &self,
    ) -> EngineResult<(Arc<GameConnection>, Receiver<ConnectionSignal>)> {
        let connection = Arc::new(GameConnection::new(
            self.config.connection.clone(),
            Arc::clone(&self.crypto),
        ));
        let signals = connection.signals().subscribe();
        connection.start()?;
        Ok((connection, signals))
    }

    fn stop_listener(&mut self) {
        self.tasks.stop(TaskName::Signals);
        self.tasks.stop(TaskName::Listener);
        self.release_connection();
    }

    fn release_connection(&mut self) {
        self.link.detach();
        if let Some(connection) = self.connection.take() {
            connection.shutdown();
        }
    }

    fn start_navigation(&mut self) {
        if self.tasks.is_running(TaskName::Navigation) {
            return;
        }

        let (options, notifications) = unbounded();
        let commands = Arc::clone(&self.commands);
        let poll = self.poll_interval();

        match self.tasks.start(TaskName::Navigation, move |token| {
            run_navigation(&notifications, commands.as_ref(), &token, poll);
        }) {
            Ok(_) => self.navigation = Some(options),
            Err(e) => error!("{}", e),
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if !self.stop.is_cancelled() {
            self.shutdown();
        }
    }
}

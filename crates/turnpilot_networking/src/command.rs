//! # Outgoing Commands
//!
//! The three things we ever tell the game: take this turn, end the
//! activity, and the pairing hello. Every command echoes the last sequence
//! number the game sent and carries our own command counter.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, info};
use turnpilot_core::{RiderId, TurnDirection};

use crate::codec::GameMessageCodec;
use crate::connection::GameConnection;
use crate::error::ConnectionResult;

/// Command type as the game knows it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CommandType {
    /// Not a command the game understands.
    Unknown,
    /// Turn left at the next junction.
    TurnLeft,
    /// Go straight at the next junction.
    GoStraight,
    /// Turn right at the next junction.
    TurnRight,
    /// Stop and save the activity.
    EndActivity,
    /// First message after the game connects.
    PairingHello,
}

impl From<TurnDirection> for CommandType {
    fn from(direction: TurnDirection) -> Self {
        match direction {
            TurnDirection::Left => Self::TurnLeft,
            TurnDirection::GoStraight => Self::GoStraight,
            TurnDirection::Right => Self::TurnRight,
            TurnDirection::None => Self::Unknown,
        }
    }
}

/// A command for the game.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutgoingCommand {
    /// Take a turn at the next junction.
    Turn {
        /// Turn to take.
        direction: TurnDirection,
        /// Last sequence number seen from the game.
        sequence: u64,
        /// Rider the command is for.
        rider_id: RiderId,
    },
    /// End and save the activity.
    EndActivity {
        /// Last sequence number seen from the game.
        sequence: u64,
        /// Name the activity is saved under.
        activity_name: String,
        /// Rider the command is for.
        rider_id: RiderId,
    },
    /// Pairing hello.
    InitialPairing {
        /// Rider the command is for.
        rider_id: RiderId,
        /// Last sequence number seen from the game.
        sequence: u64,
    },
}

impl OutgoingCommand {
    /// The game's command type.
    #[must_use]
    pub fn command_type(&self) -> CommandType {
        match self {
            Self::Turn { direction, .. } => CommandType::from(*direction),
            Self::EndActivity { .. } => CommandType::EndActivity,
            Self::InitialPairing { .. } => CommandType::PairingHello,
        }
    }

    /// Rider the command is for.
    #[must_use]
    pub fn rider_id(&self) -> RiderId {
        match self {
            Self::Turn { rider_id, .. }
            | Self::EndActivity { rider_id, .. }
            | Self::InitialPairing { rider_id, .. } => *rider_id,
        }
    }
}

/// Anything commands can be sent through.
pub trait CommandSink: Send + Sync {
    /// Sends a command.
    ///
    /// # Errors
    ///
    /// Whatever stops the command from reaching the game.
    fn send_command(&self, command: OutgoingCommand) -> ConnectionResult<()>;

    /// Tells the game to take a turn.
    ///
    /// # Errors
    ///
    /// See [`CommandSink::send_command`].
    fn send_turn_command(
        &self,
        direction: TurnDirection,
        sequence: u64,
        rider_id: RiderId,
    ) -> ConnectionResult<()> {
        self.send_command(OutgoingCommand::Turn {
            direction,
            sequence,
            rider_id,
        })
    }

    /// Tells the game to end the activity.
    ///
    /// # Errors
    ///
    /// See [`CommandSink::send_command`].
    fn end_activity(
        &self,
        sequence: u64,
        activity_name: &str,
        rider_id: RiderId,
    ) -> ConnectionResult<()> {
        self.send_command(OutgoingCommand::EndActivity {
            sequence,
            activity_name: activity_name.to_string(),
            rider_id,
        })
    }

    /// Sends the pairing hello.
    ///
    /// # Errors
    ///
    /// See [`CommandSink::send_command`].
    fn send_initial_pairing_message(&self, rider_id: RiderId, sequence: u64) -> ConnectionResult<()> {
        self.send_command(OutgoingCommand::InitialPairing { rider_id, sequence })
    }
}

/// Encodes commands and writes them to the game connection.
pub struct CommandSender {
    connection: Arc<GameConnection>,
    codec: Arc<dyn GameMessageCodec>,
    command_counter: AtomicU64,
}

impl CommandSender {
    /// Creates a sender over an existing connection.
    pub fn new(connection: Arc<GameConnection>, codec: Arc<dyn GameMessageCodec>) -> Self {
        Self {
            connection,
            codec,
            command_counter: AtomicU64::new(0),
        }
    }

    /// Number of commands handed to the connection so far.
    #[must_use]
    pub fn command_counter(&self) -> u64 {
        self.command_counter.load(Ordering::Relaxed)
    }
}

impl CommandSink for CommandSender {
    fn send_command(&self, command: OutgoingCommand) -> ConnectionResult<()> {
        let counter = self.command_counter.fetch_add(1, Ordering::Relaxed) + 1;
        let payload = self.codec.encode(&command, counter)?;
        debug!("Encoded command #{} into {} bytes", counter, payload.len());

        self.connection.send(&payload)?;
        info!("Sent {:?} command #{}", command.command_type(), counter);
        Ok(())
    }
}

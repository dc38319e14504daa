//! # Message Codec
//!
//! The game's message schema is not ours to define. A codec turns a
//! decrypted payload into the handful of events navigation cares about and
//! encodes our commands into the game's format. Anything else in the
//! payload is none of our business and is skipped.

use tracing::trace;
use turnpilot_core::{ActivityId, RiderId, TrackPoint};

use crate::command::OutgoingCommand;
use crate::error::{CodecError, CodecResult};

/// An event extracted from a game message.
#[derive(Clone, Debug, PartialEq)]
pub enum GameMessage {
    /// The rider moved.
    RiderPosition {
        /// New position.
        position: TrackPoint,
    },
    /// The game offers a command (turn option or separator).
    CommandAvailable {
        /// Command type as sent by the game, e.g. `turnleft`.
        command_type: String,
        /// Protocol sequence number of the message.
        sequence: u64,
    },
    /// The rider started an activity.
    ActivityDetails {
        /// Rider identifier.
        rider_id: RiderId,
        /// Activity identifier.
        activity_id: ActivityId,
    },
    /// The rider ended the activity.
    ActivityEnded,
}

/// Translates between game payloads and [`GameMessage`]s / commands.
pub trait GameMessageCodec: Send + Sync {
    /// Extracts the events contained in a decrypted payload.
    ///
    /// # Errors
    ///
    /// [`CodecError::Malformed`] if the payload can't be parsed.
    fn decode(&self, payload: &[u8]) -> CodecResult<Vec<GameMessage>>;

    /// Serializes a command. `command_counter` numbers our commands.
    ///
    /// # Errors
    ///
    /// [`CodecError::Unsupported`] if the codec can't express the command.
    fn encode(&self, command: &OutgoingCommand, command_counter: u64) -> CodecResult<Vec<u8>>;
}

/// Codec that understands nothing: keeps the link alive and observable
/// without interpreting it.
#[derive(Clone, Copy, Debug, Default)]
pub struct PassiveCodec;

impl GameMessageCodec for PassiveCodec {
    fn decode(&self, payload: &[u8]) -> CodecResult<Vec<GameMessage>> {
        trace!("Ignoring {} byte message", payload.len());
        Ok(Vec::new())
    }

    fn encode(&self, command: &OutgoingCommand, _command_counter: u64) -> CodecResult<Vec<u8>> {
        Err(CodecError::Unsupported(format!("{:?}", command.command_type())))
    }
}

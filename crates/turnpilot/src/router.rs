//! Turns decrypted game payloads into dispatch events.

use std::sync::Arc;

use crossbeam_channel::Sender;
use tracing::{trace, warn};
use turnpilot_networking::{GameMessage, GameMessageCodec, MessageEmitter};

use crate::dispatcher::DispatchEvent;

/// Decodes payloads and forwards the messages navigation cares about.
pub struct MessageRouter {
    codec: Arc<dyn GameMessageCodec>,
    events: Sender<DispatchEvent>,
}

impl MessageRouter {
    /// Creates a router that sends to `events`.
    pub fn new(codec: Arc<dyn GameMessageCodec>, events: Sender<DispatchEvent>) -> Self {
        Self { codec, events }
    }
}

/// Dispatch event for a decoded message.
#[must_use]
pub fn event_for(message: GameMessage) -> DispatchEvent {
    match message {
        GameMessage::RiderPosition { position } => DispatchEvent::PositionChanged(position),
        GameMessage::CommandAvailable {
            command_type,
            sequence,
        } => DispatchEvent::TurnCommandAvailable {
            kind: command_type,
            sequence,
        },
        GameMessage::ActivityDetails {
            rider_id,
            activity_id,
        } => DispatchEvent::EnterGame {
            rider_id,
            activity_id,
        },
        GameMessage::ActivityEnded => DispatchEvent::LeaveGame,
    }
}

impl MessageEmitter for MessageRouter {
    fn emit_message_from_bytes(&self, payload: &[u8]) {
        let messages = match self.codec.decode(payload) {
            Ok(messages) => messages,
            Err(e) => {
                warn!("Dropping undecodable {} byte message: {}", payload.len(), e);
                return;
            }
        };

        for message in messages {
            trace!("Game message {:?}", message);
            if self.events.send(event_for(message)).is_err() {
                warn!("Dispatcher is gone, dropping game messages");
                return;
            }
        }
    }
}

//! # Navigation Task
//!
//! Listens for turn options and sends the one the route needs.
//!
//! ```text
//!  TurnCommandsAvailable ──► match_turn ──► Execute   ──► CommandSink
//!                                      ├──► Mismatch  ──► logged, nothing sent
//!                                      └──► NotNavigating
//! ```

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use tracing::{debug, error, info};
use turnpilot_core::{match_turn, TurnDecision, TurnDirection};
use turnpilot_networking::{CancellationToken, CommandSink};

use crate::dispatcher::Notification;

/// Acts on one notification. Returns the turn that was sent, if any.
pub fn navigate(notification: &Notification, commands: &dyn CommandSink) -> Option<TurnDirection> {
    let Notification::TurnCommandsAvailable {
        directions,
        route,
        sequence,
        rider_id,
    } = notification
    else {
        return None;
    };

    if directions.is_empty() {
        return None;
    }

    match match_turn(route, directions) {
        TurnDecision::Execute(direction) => {
            info!("Executing turn {}", direction);
            match commands.send_turn_command(direction, *sequence, *rider_id) {
                Ok(()) => Some(direction),
                Err(e) => {
                    error!("Failed to send turn {}: {}", direction, e);
                    None
                }
            }
        }
        TurnDecision::Mismatch {
            expected,
            available,
        } => {
            error!(
                "Expected turn command {} to be present but instead got: {:?}",
                expected, available
            );
            None
        }
        TurnDecision::NotNavigating => {
            debug!("Route not started, ignoring turn options {:?}", directions);
            None
        }
    }
}

/// Task body: handles notifications until `cancel` is raised.
pub fn run_navigation(
    notifications: &Receiver<Notification>,
    commands: &dyn CommandSink,
    cancel: &CancellationToken,
    poll_interval: Duration,
) {
    while !cancel.is_cancelled() {
        match notifications.recv_timeout(poll_interval) {
            Ok(notification) => {
                navigate(&notification, commands);
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

//! # Connection Signals
//!
//! Lifecycle events of the game link, fanned out to any number of
//! subscribers. Publishing never blocks and never fails; subscribers that
//! went away are dropped on the next publish.

use std::net::SocketAddr;
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::debug;

/// Something happened on the game link.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionSignal {
    /// Listening, no game connected.
    WaitingForConnection,
    /// The game connected.
    Connected {
        /// Address of the game.
        peer: SocketAddr,
    },
    /// No game connected within the accept timeout. Still listening.
    AcceptTimeoutExpired,
    /// The game sent nothing within the data timeout.
    DataTimeoutExpired,
    /// The game went away. Back to listening.
    ConnectionLost,
    /// A message could not be decrypted with the shared secret.
    IncorrectConnectionSecret,
}

/// Fan-out of [`ConnectionSignal`]s.
#[derive(Clone, Debug, Default)]
pub struct SignalBus {
    subscribers: Arc<Mutex<Vec<Sender<ConnectionSignal>>>>,
}

impl SignalBus {
    /// Creates a bus without subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a receiver that gets every signal published from now on.
    #[must_use]
    pub fn subscribe(&self) -> Receiver<ConnectionSignal> {
        let (sender, receiver) = unbounded();
        self.subscribers.lock().push(sender);
        receiver
    }

    /// Publishes a signal to every live subscriber.
    pub fn publish(&self, signal: ConnectionSignal) {
        debug!("Connection signal {:?}", signal);
        self.subscribers
            .lock()
            .retain(|subscriber| subscriber.send(signal.clone()).is_ok());
    }

    /// Number of live subscribers as of the last publish.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_subscriber_receives_signal() {
        let bus = SignalBus::new();
        let first = bus.subscribe();
        let second = bus.subscribe();

        bus.publish(ConnectionSignal::ConnectionLost);

        assert_eq!(first.try_recv(), Ok(ConnectionSignal::ConnectionLost));
        assert_eq!(second.try_recv(), Ok(ConnectionSignal::ConnectionLost));
    }

    #[test]
    fn test_dropped_subscribers_are_pruned() {
        let bus = SignalBus::new();
        let kept = bus.subscribe();
        drop(bus.subscribe());

        bus.publish(ConnectionSignal::WaitingForConnection);

        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(kept.try_recv(), Ok(ConnectionSignal::WaitingForConnection));
    }

    #[test]
    fn test_publish_without_subscribers() {
        SignalBus::new().publish(ConnectionSignal::DataTimeoutExpired);
    }
}

//! # Incoming Message Decoder
//!
//! Pulls chunks from a [`MessageReceiver`], cuts them into frames,
//! decrypts each frame and hands the plaintext to a [`MessageEmitter`] in
//! arrival order.
//!
//! ```text
//! receiver ─► FrameDecoder ─► decrypt ─┬─► emitter
//!                                      └─(fails)─► IncorrectConnectionSecret
//! ```
//!
//! A frame that fails to decrypt is dropped; the frames after it still go
//! through. When chunks start coming from a new peer session, whatever
//! partial frame the old peer left behind is thrown away. A watchdog thread runs alongside the loop and logs when the
//! game has been quiet for too long.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, select, tick};
use parking_lot::Mutex;
use tracing::{debug, error, info, trace, warn};

use crate::cancel::CancellationToken;
use crate::config::ConnectionConfig;
use crate::connection::{Chunk, MessageReceiver};
use crate::crypto::ConnectionCrypto;
use crate::frame::{DecoderStats, FrameDecoder};
use crate::signals::{ConnectionSignal, SignalBus};

/// Consumer of decrypted message payloads.
pub trait MessageEmitter: Send + Sync {
    /// Handles one decrypted payload.
    fn emit_message_from_bytes(&self, payload: &[u8]);
}

/// What the watchdog thinks of the link.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Liveness {
    NeverReceived,
    Stale(Duration),
    Alive,
}

fn liveness(last_data: Option<Instant>, now: Instant, stale_after: Duration) -> Liveness {
    match last_data {
        None => Liveness::NeverReceived,
        Some(at) => {
            let quiet = now.saturating_duration_since(at);
            if quiet > stale_after {
                Liveness::Stale(quiet)
            } else {
                Liveness::Alive
            }
        }
    }
}

/// Decode loop between the connection and the message router.
pub struct IncomingMessageDecoder {
    receiver: Arc<dyn MessageReceiver>,
    crypto: Arc<dyn ConnectionCrypto>,
    emitter: Arc<dyn MessageEmitter>,
    signals: SignalBus,
    watchdog_interval: Duration,
    stale_after: Duration,
    last_data: Arc<Mutex<Option<Instant>>>,
}

impl IncomingMessageDecoder {
    /// Wires a decoder. Signals go to `signals`, which normally is the
    /// connection's own bus.
    pub fn new(
        receiver: Arc<dyn MessageReceiver>,
        crypto: Arc<dyn ConnectionCrypto>,
        emitter: Arc<dyn MessageEmitter>,
        signals: SignalBus,
        config: &ConnectionConfig,
    ) -> Self {
        Self {
            receiver,
            crypto,
            emitter,
            signals,
            watchdog_interval: config.watchdog_interval(),
            stale_after: config.stale_after(),
            last_data: Arc::new(Mutex::new(None)),
        }
    }

    /// Time the last chunk arrived.
    #[must_use]
    pub fn last_data_at(&self) -> Option<Instant> {
        *self.last_data.lock()
    }

    /// Runs until `cancel` is raised or the receiver closes.
    ///
    /// `cancel` is checked whenever the receiver returns, so a receiver
    /// with a bounded wait bounds the shutdown latency.
    pub fn run(&self, cancel: &CancellationToken) -> DecoderStats {
        let (stop, stopped) = bounded::<()>(0);
        let watchdog = self.spawn_watchdog(stopped);

        let mut frames = FrameDecoder::new();
        let mut session = None;
        info!("Decoding messages from the game");

        while !cancel.is_cancelled() {
            let Some(Chunk {
                session: chunk_session,
                bytes,
            }) = self.receiver.receive_next_message_bytes()
            else {
                if self.receiver.is_closed() {
                    break;
                }
                continue;
            };

            if session != Some(chunk_session) {
                let dropped = frames.reset();
                if dropped > 0 {
                    warn!(
                        "Dropping {} bytes of an unfinished frame from the previous game connection",
                        dropped
                    );
                }
                session = Some(chunk_session);
            }

            *self.last_data.lock() = Some(Instant::now());
            trace!("Received {} bytes", bytes.len());
            frames.push(&bytes);

            for frame in frames.frames() {
                self.decode_frame(&frame);
            }
        }

        drop(stop);
        if let Some(watchdog) = watchdog {
            if watchdog.join().is_err() {
                error!("Watchdog thread panicked");
            }
        }

        let stats = frames.stats();
        info!(
            "Decoder stopped after {} frames ({} discarded)",
            stats.frames, stats.discarded
        );
        stats
    }

    fn decode_frame(&self, frame: &[u8]) {
        match self.crypto.decrypt(frame) {
            Ok(plaintext) => self.emitter.emit_message_from_bytes(&plaintext),
            Err(e) => {
                error!("Unable to decrypt message, check the connection secret: {}", e);
                self.signals
                    .publish(ConnectionSignal::IncorrectConnectionSecret);
            }
        }
    }

    fn spawn_watchdog(
        &self,
        stopped: crossbeam_channel::Receiver<()>,
    ) -> Option<thread::JoinHandle<()>> {
        let last_data = Arc::clone(&self.last_data);
        let ticks = tick(self.watchdog_interval);
        let stale_after = self.stale_after;

        let spawned = thread::Builder::new()
            .name("turnpilot-watchdog".to_string())
            .spawn(move || loop {
                select! {
                    recv(ticks) -> _ => {
                        let last = *last_data.lock();
                        match liveness(last, Instant::now(), stale_after) {
                            Liveness::NeverReceived => debug!("No data received from the game yet"),
                            Liveness::Stale(quiet) => warn!("No data from the game for {:?}", quiet),
                            Liveness::Alive => {}
                        }
                    }
                    recv(stopped) -> _ => break,
                }
            });

        match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Running without a watchdog: {}", e);
                None
            }
        }
    }
}

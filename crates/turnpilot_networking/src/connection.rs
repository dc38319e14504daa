//! # Game Connection
//!
//! One listening socket, one game at a time.
//!
//! ## Lifecycle
//!
//! ```text
//!          start()
//!             │
//!             ▼
//!   ┌──► WaitingForConnection ──(accept_timeout)──► AcceptTimeoutExpired ─┐
//!   │         │ accept                                    ▲               │
//!   │         ▼                                           └───────────────┘
//!   │     Connected ──(data_timeout)──► DataTimeoutExpired (keep reading)
//!   │         │
//!   │         │ 0-byte read / socket error
//!   │         ▼
//!   └──── ConnectionLost
//! ```
//!
//! `shutdown()` raises the cancellation token and shuts the peer socket
//! down, which wakes a read blocked in the kernel. The accept side polls a
//! non-blocking listener, so it notices the token within one poll.
//!
//! ## Receive Bursts
//!
//! A read that fills the buffer means more is probably waiting. Those bytes
//! are drained without blocking and queued together with the first read as
//! a single chunk.

use std::io::{self, ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::cancel::CancellationToken;
use crate::config::ConnectionConfig;
use crate::crypto::ConnectionCrypto;
use crate::error::{ConnectionError, ConnectionResult};
use crate::frame::encode_outbound_frame;
use crate::signals::{ConnectionSignal, SignalBus};

/// How often a waiting accept re-checks the listener.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Bytes from one read, tagged with the peer session they came from.
///
/// Sessions count accepted peers from 1. A new session number means the
/// previous peer is gone and its stream will never continue.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    /// Peer session the bytes belong to.
    pub session: u64,
    /// The bytes.
    pub bytes: Vec<u8>,
}

/// Source of raw byte chunks for the decode loop.
///
/// One call waits at most one poll interval. `None` means nothing arrived
/// in that interval, which is not the end of the stream: callers poll
/// again until [`MessageReceiver::is_closed`] says no more chunks will
/// come. This keeps the caller free to check its own cancellation between
/// polls.
pub trait MessageReceiver: Send + Sync {
    /// Waits up to one poll interval for the next chunk.
    fn receive_next_message_bytes(&self) -> Option<Chunk>;

    /// Whether no more chunks will ever arrive.
    fn is_closed(&self) -> bool {
        false
    }
}

/// Counters for a [`GameConnection`].
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Peers accepted.
    pub connections_accepted: AtomicU64,
    /// Bytes read from peers.
    pub bytes_received: AtomicU64,
    /// Chunks queued for the decoder.
    pub chunks_received: AtomicU64,
    /// Bytes written to peers, prefixes included.
    pub bytes_sent: AtomicU64,
}

/// State shared between the connection handle and its reader thread.
#[derive(Debug, Default)]
struct Shared {
    cancel: CancellationToken,
    /// Write half of the current peer; also used to force it closed.
    peer: Mutex<Option<TcpStream>>,
    stats: ConnectionStats,
}

impl Shared {
    fn close_peer(&self) {
        if let Some(peer) = self.peer.lock().take() {
            // The peer may already be gone; all that matters is that it is closed now.
            let _ = peer.shutdown(Shutdown::Both);
        }
    }
}

/// Single-peer TCP link to the game.
pub struct GameConnection {
    config: ConnectionConfig,
    crypto: Arc<dyn ConnectionCrypto>,
    signals: SignalBus,
    shared: Arc<Shared>,
    /// Reader thread; `Some` means running.
    worker: Mutex<Option<JoinHandle<()>>>,
    local_addr: Mutex<Option<SocketAddr>>,
    chunk_sender: Sender<Chunk>,
    chunks: Receiver<Chunk>,
}

impl GameConnection {
    /// Creates a connection. Nothing is bound until [`GameConnection::start`].
    pub fn new(config: ConnectionConfig, crypto: Arc<dyn ConnectionCrypto>) -> Self {
        let (chunk_sender, chunks) = unbounded();

        Self {
            config,
            crypto,
            signals: SignalBus::new(),
            shared: Arc::new(Shared::default()),
            worker: Mutex::new(None),
            local_addr: Mutex::new(None),
            chunk_sender,
            chunks,
        }
    }

    /// Lifecycle signals of this connection.
    #[must_use]
    pub fn signals(&self) -> &SignalBus {
        &self.signals
    }

    /// Counters.
    #[must_use]
    pub fn stats(&self) -> &ConnectionStats {
        &self.shared.stats
    }

    /// Address actually bound, once started.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }

    /// Whether a game is connected right now.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.shared.peer.lock().is_some()
    }

    /// Whether the reader thread is alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .is_some_and(|worker| !worker.is_finished())
    }

    /// Binds the listener and starts the accept/read thread.
    ///
    /// Calling it again while running does nothing.
    ///
    /// # Errors
    ///
    /// [`ConnectionError::ShutDown`] after [`GameConnection::shutdown`],
    /// [`ConnectionError::Bind`] if the port is taken.
    pub fn start(&self) -> ConnectionResult<()> {
        let mut worker = self.worker.lock();

        if self.shared.cancel.is_cancelled() {
            return Err(ConnectionError::ShutDown);
        }
        if worker.is_some() {
            debug!("Connection already running");
            return Ok(());
        }

        let address = self.config.socket_address();
        let listener = TcpListener::bind(address).map_err(|source| ConnectionError::Bind {
            address: address.to_string(),
            source,
        })?;
        listener.set_nonblocking(true)?;
        let bound = listener.local_addr()?;
        *self.local_addr.lock() = Some(bound);

        let reader = ReaderLoop {
            listener,
            config: self.config.clone(),
            shared: Arc::clone(&self.shared),
            chunks: self.chunk_sender.clone(),
            signals: self.signals.clone(),
        };

        let handle = thread::Builder::new()
            .name("turnpilot-connection".to_string())
            .spawn(move || reader.run())?;
        *worker = Some(handle);

        info!("Listening for the game on {}", bound);
        Ok(())
    }

    /// Stops the thread, closes the peer and releases the listener.
    ///
    /// Irreversible. Safe to call more than once.
    pub fn shutdown(&self) {
        self.shared.cancel.cancel();
        self.shared.close_peer();

        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if worker.join().is_err() {
                error!("Connection thread panicked");
            }
            info!("Connection shut down");
        }
    }

    /// Encrypts, frames and writes a payload to the game.
    ///
    /// # Errors
    ///
    /// [`ConnectionError::NotConnected`] without a peer, or the crypto,
    /// framing or socket error that stopped the write.
    pub fn send(&self, payload: &[u8]) -> ConnectionResult<()> {
        let encrypted = self.crypto.encrypt(payload)?;
        let frame = encode_outbound_frame(&encrypted)?;

        let peer = self.shared.peer.lock();
        let Some(stream) = peer.as_ref() else {
            error!("Can't send {} bytes, no game connected", payload.len());
            return Err(ConnectionError::NotConnected);
        };

        let mut writer: &TcpStream = stream;
        let mut offset = 0;
        while offset < frame.len() {
            match writer.write(&frame[offset..]) {
                Ok(0) => return Err(io::Error::from(ErrorKind::WriteZero).into()),
                Ok(written) => {
                    offset += written;
                    if offset < frame.len() {
                        debug!("Partial write, {} of {} bytes sent", offset, frame.len());
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }

        self.shared
            .stats
            .bytes_sent
            .fetch_add(frame.len() as u64, Ordering::Relaxed);
        Ok(())
    }
}

impl MessageReceiver for GameConnection {
    fn receive_next_message_bytes(&self) -> Option<Chunk> {
        if self.shared.cancel.is_cancelled() {
            return None;
        }

        match self.chunks.recv_timeout(self.config.receive_poll_interval()) {
            Ok(chunk) => Some(chunk),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    fn is_closed(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }
}

impl Drop for GameConnection {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ============================================================================
// READER THREAD
// ============================================================================

/// Why a peer session ended.
enum SessionEnd {
    Lost,
    Cancelled,
}

struct ReaderLoop {
    listener: TcpListener,
    config: ConnectionConfig,
    shared: Arc<Shared>,
    chunks: Sender<Chunk>,
    signals: SignalBus,
}

impl ReaderLoop {
    fn run(self) {
        let mut session = 0;

        while !self.shared.cancel.is_cancelled() {
            self.signals.publish(ConnectionSignal::WaitingForConnection);

            let Some(stream) = self.accept() else {
                break;
            };

            session += 1;
            let end = self.serve(stream, session);
            self.shared.close_peer();

            match end {
                SessionEnd::Lost => {
                    info!("Game disconnected");
                    self.signals.publish(ConnectionSignal::ConnectionLost);
                }
                SessionEnd::Cancelled => break,
            }
        }

        debug!("Connection loop stopped");
    }

    /// Waits for a peer. `None` when cancelled.
    fn accept(&self) -> Option<TcpStream> {
        let timeout = self.config.accept_timeout();
        let mut waiting_since = Instant::now();

        loop {
            if self.shared.cancel.is_cancelled() {
                return None;
            }

            match self.listener.accept() {
                Ok((stream, peer)) => match self.prepare(&stream) {
                    Ok(()) => {
                        info!("Game connected from {}", peer);
                        self.shared
                            .stats
                            .connections_accepted
                            .fetch_add(1, Ordering::Relaxed);
                        self.signals.publish(ConnectionSignal::Connected { peer });
                        return Some(stream);
                    }
                    Err(e) => warn!("Dropping connection from {}: {}", peer, e),
                },
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    if waiting_since.elapsed() >= timeout {
                        debug!("No game connected within {:?}", timeout);
                        self.signals.publish(ConnectionSignal::AcceptTimeoutExpired);
                        waiting_since = Instant::now();
                    }
                    thread::sleep(ACCEPT_POLL_INTERVAL.min(timeout));
                }
                Err(e) => {
                    warn!("Accept failed: {}", e);
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
            }
        }
    }

    /// Configures an accepted socket and publishes its write half.
    fn prepare(&self, stream: &TcpStream) -> io::Result<()> {
        stream.set_nonblocking(false)?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(self.config.data_timeout()))?;
        stream.set_write_timeout(Some(self.config.data_timeout()))?;

        *self.shared.peer.lock() = Some(stream.try_clone()?);
        Ok(())
    }

    /// Reads from the peer until it goes away or we are cancelled.
    fn serve(&self, mut stream: TcpStream, session: u64) -> SessionEnd {
        let mut buffer = vec![0u8; self.config.receive_buffer_size.max(1)];

        loop {
            if self.shared.cancel.is_cancelled() {
                return SessionEnd::Cancelled;
            }

            match stream.read(&mut buffer) {
                Ok(0) => {
                    return self.lost_unless_cancelled();
                }
                Ok(read) => {
                    let mut burst = buffer[..read].to_vec();
                    let drained = if is_full_read(read, buffer.len()) {
                        drain_pending(&mut stream, &mut buffer, &mut burst)
                    } else {
                        Ok(true)
                    };

                    self.queue(session, burst);

                    match drained {
                        Ok(true) => {}
                        Ok(false) => return self.lost_unless_cancelled(),
                        Err(e) => {
                            warn!("Read from game failed: {}", e);
                            return self.lost_unless_cancelled();
                        }
                    }
                }
                Err(e) if is_timeout(&e) => {
                    debug!("No data from the game within {:?}", self.config.data_timeout());
                    self.signals.publish(ConnectionSignal::DataTimeoutExpired);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    warn!("Read from game failed: {}", e);
                    return self.lost_unless_cancelled();
                }
            }
        }
    }

    fn queue(&self, session: u64, bytes: Vec<u8>) {
        self.shared
            .stats
            .bytes_received
            .fetch_add(bytes.len() as u64, Ordering::Relaxed);
        self.shared
            .stats
            .chunks_received
            .fetch_add(1, Ordering::Relaxed);

        // The receiver lives as long as the connection handle.
        let _ = self.chunks.send(Chunk { session, bytes });
    }

    fn lost_unless_cancelled(&self) -> SessionEnd {
        if self.shared.cancel.is_cancelled() {
            SessionEnd::Cancelled
        } else {
            SessionEnd::Lost
        }
    }
}

/// A read this large suggests the kernel has more buffered.
fn is_full_read(read: usize, capacity: usize) -> bool {
    read >= capacity.saturating_sub(1)
}

fn is_timeout(error: &io::Error) -> bool {
    matches!(error.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

/// Reads whatever is already buffered without blocking.
///
/// Returns `Ok(false)` if the peer closed the stream while draining.
fn drain_pending(
    stream: &mut TcpStream,
    buffer: &mut [u8],
    burst: &mut Vec<u8>,
) -> io::Result<bool> {
    stream.set_nonblocking(true)?;

    let result = loop {
        match stream.read(buffer) {
            Ok(0) => break Ok(false),
            Ok(read) => {
                burst.extend_from_slice(&buffer[..read]);
                if !is_full_read(read, buffer.len()) {
                    break Ok(true);
                }
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => break Ok(true),
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => break Err(e),
        }
    };

    stream.set_nonblocking(false)?;
    result
}

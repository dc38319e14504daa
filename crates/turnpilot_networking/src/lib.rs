//! # TurnPilot Networking - The Companion Link
//!
//! Everything between the game's TCP socket and the navigation core.
//!
//! ## Architecture
//!
//! ```text
//!             ┌──────────────────────────────────────────────────────┐
//!  game ────► │ GameConnection        accept/read thread             │
//!  (TCP)      │   chunks ──► crossbeam channel ──┐                   │
//!             └──────────────────────────────────┼───────────────────┘
//!                                                ▼
//!             ┌──────────────────────────────────────────────────────┐
//!             │ IncomingMessageDecoder   FrameDecoder ─► decrypt     │
//!             │   watchdog (5 s tick)          │                     │
//!             └────────────────────────────────┼─────────────────────┘
//!                                              ▼
//!                                      MessageEmitter (codec + dispatch)
//!
//!  CommandSender ─► codec ─► encrypt ─► [u32 BE len][payload] ─► game
//! ```
//!
//! ## Wire Format
//!
//! - Inbound (game → us): `[u16 BE length][encrypted payload]`
//! - Outbound (us → game): `[u32 BE length][encrypted payload]`
//!
//! The asymmetry is a property of the protocol.
//!
//! ## Failure Model
//!
//! Socket trouble never escapes this crate as an error. Timeouts and lost
//! peers become [`ConnectionSignal`]s and the connection goes back to
//! accepting.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

pub mod cancel;
pub mod codec;
pub mod command;
pub mod config;
pub mod connection;
pub mod crypto;
pub mod decoder;
pub mod error;
pub mod frame;
pub mod signals;

pub use cancel::CancellationToken;
pub use codec::{GameMessage, GameMessageCodec, PassiveCodec};
pub use command::{CommandSender, CommandSink, CommandType, OutgoingCommand};
pub use config::ConnectionConfig;
pub use connection::{Chunk, ConnectionStats, GameConnection, MessageReceiver};
pub use crypto::{ConnectionCrypto, Plaintext};
pub use decoder::{IncomingMessageDecoder, MessageEmitter};
pub use error::{
    CodecError, CodecResult, ConfigError, ConnectionError, ConnectionResult, CryptoError,
    CryptoResult, FrameError, FrameResult,
};
pub use frame::{encode_inbound_frame, encode_outbound_frame, DecoderStats, FrameDecoder};
pub use signals::{ConnectionSignal, SignalBus};

/// Default port the game connects to.
pub const DEFAULT_PORT: u16 = 21588;

/// Width of the inbound length prefix.
pub const INBOUND_PREFIX_LEN: usize = 2;

/// Width of the outbound length prefix.
pub const OUTBOUND_PREFIX_LEN: usize = 4;

//! # Networking Error Types
//!
//! All errors that can occur on the game link.

use std::io;

use thiserror::Error;

/// Errors from the external crypto capability.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// The payload could not be decrypted with the shared secret.
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// The payload could not be encrypted.
    #[error("encryption failed: {0}")]
    Encryption(String),
}

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors from frame encoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Payload does not fit the length prefix.
    #[error("payload of {len} bytes exceeds the {max} byte frame limit")]
    PayloadTooLarge {
        /// Size of the rejected payload.
        len: usize,
        /// Largest size the prefix can express.
        max: usize,
    },
}

/// Result type for frame operations.
pub type FrameResult<T> = Result<T, FrameError>;

/// Errors from the message codec.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The payload is not a message the codec understands.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// The codec cannot produce this command.
    #[error("codec can't encode {0}")]
    Unsupported(String),
}

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors from the connection layer.
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// No peer is connected, nothing can be sent.
    #[error("no game connected, can't send")]
    NotConnected,

    /// The connection was shut down and can't be restarted.
    #[error("connection was shut down")]
    ShutDown,

    /// The listening socket could not be bound.
    #[error("failed to bind {address}: {source}")]
    Bind {
        /// Address we tried to bind.
        address: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// Writing to the peer failed.
    #[error("failed to write to game: {0}")]
    Io(#[from] io::Error),

    /// The payload could not be framed.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// The payload could not be encrypted.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// The command could not be encoded.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Result type for connection operations.
pub type ConnectionResult<T> = Result<T, ConnectionError>;

/// Errors from connection configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Port 0 would bind to a random port the game can't know.
    #[error("invalid port number {0}")]
    InvalidPort(u16),

    /// A value must be greater than zero.
    #[error("{field} must be greater than zero")]
    Zero {
        /// Offending field.
        field: &'static str,
    },
}

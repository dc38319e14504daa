//! # Connection Configuration
//!
//! Everything the game link needs at construction time. Loaded once at
//! startup from the `[connection]` table of the application config; every
//! field has a default so an empty table is valid.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::DEFAULT_PORT;

/// Configuration for [`GameConnection`](crate::GameConnection) and the
/// decode loop.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// TCP port the game connects to.
    pub port: u16,
    /// Address to listen on. The game runs on the same machine.
    pub bind_address: IpAddr,
    /// How long one accept wait lasts before an accept timeout is signalled.
    pub accept_timeout_ms: u64,
    /// How long one read may block before a data timeout is signalled.
    pub data_timeout_ms: u64,
    /// Size of the socket read buffer.
    pub receive_buffer_size: usize,
    /// Upper bound on how long a consumer waits between shutdown checks.
    pub receive_poll_interval_ms: u64,
    /// Interval of the liveness watchdog.
    pub watchdog_interval_ms: u64,
    /// Silence after which the watchdog complains.
    pub stale_after_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            accept_timeout_ms: 5_000,
            data_timeout_ms: 5_000,
            receive_buffer_size: 512,
            receive_poll_interval_ms: 250,
            watchdog_interval_ms: 5_000,
            stale_after_ms: 10_000,
        }
    }
}

impl ConnectionConfig {
    /// Address the listener binds to.
    #[must_use]
    pub fn socket_address(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    /// Accept timeout as a duration.
    #[must_use]
    pub fn accept_timeout(&self) -> Duration {
        Duration::from_millis(self.accept_timeout_ms)
    }

    /// Data timeout as a duration.
    #[must_use]
    pub fn data_timeout(&self) -> Duration {
        Duration::from_millis(self.data_timeout_ms)
    }

    /// Receive poll interval as a duration.
    #[must_use]
    pub fn receive_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receive_poll_interval_ms)
    }

    /// Watchdog interval as a duration.
    #[must_use]
    pub fn watchdog_interval(&self) -> Duration {
        Duration::from_millis(self.watchdog_interval_ms)
    }

    /// Staleness threshold as a duration.
    #[must_use]
    pub fn stale_after(&self) -> Duration {
        Duration::from_millis(self.stale_after_ms)
    }

    /// Rejects values that can't work.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidPort`] for port 0, [`ConfigError::Zero`] for a
    /// zero buffer size or duration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        let zero = [
            ("receive_buffer_size", self.receive_buffer_size == 0),
            ("accept_timeout_ms", self.accept_timeout_ms == 0),
            ("data_timeout_ms", self.data_timeout_ms == 0),
            ("receive_poll_interval_ms", self.receive_poll_interval_ms == 0),
            ("watchdog_interval_ms", self.watchdog_interval_ms == 0),
            ("stale_after_ms", self.stale_after_ms == 0),
        ];

        match zero.iter().find(|(_, is_zero)| *is_zero) {
            Some((field, _)) => Err(ConfigError::Zero { field: *field }),
            None => Ok(()),
        }
    }
}

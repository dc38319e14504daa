//! # Application Configuration
//!
//! One TOML file, read once at startup:
//!
//! ```toml
//! [connection]
//! port = 21588
//! accept_timeout_ms = 5000
//!
//! [navigation]
//! end_activity_at_end_of_route = false
//! loop_route_at_end_of_route = true
//! ```
//!
//! Missing tables and keys fall back to their defaults.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use turnpilot_networking::ConnectionConfig;

use crate::error::{EngineError, EngineResult};

/// What to do when the rider reaches the end of the route.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    /// End and save the activity when the route completes.
    pub end_activity_at_end_of_route: bool,
    /// Start another lap when a loop route completes. Ignored if the
    /// activity is ended instead.
    pub loop_route_at_end_of_route: bool,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            end_activity_at_end_of_route: false,
            loop_route_at_end_of_route: true,
        }
    }
}

/// Complete runner configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Game link settings.
    pub connection: ConnectionConfig,
    /// End-of-route behaviour.
    pub navigation: NavigationConfig,
}

impl AppConfig {
    /// Reads and validates a config file.
    ///
    /// # Errors
    ///
    /// [`EngineError::ConfigRead`], [`EngineError::ConfigParse`] or
    /// [`EngineError::Config`].
    pub fn load(path: &Path) -> EngineResult<Self> {
        let text = fs::read_to_string(path).map_err(|source| EngineError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = toml::from_str(&text).map_err(|source| EngineError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Checks every section.
    ///
    /// # Errors
    ///
    /// [`EngineError::Config`] for the first bad value.
    pub fn validate(&self) -> EngineResult<()> {
        self.connection.validate()?;
        Ok(())
    }
}

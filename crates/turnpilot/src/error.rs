//! Error types for the runner.

use std::io;
use std::path::PathBuf;

use thiserror::Error;
use turnpilot_core::SegmentError;
use turnpilot_networking::{ConfigError, ConnectionError};

/// Errors loading a route plan.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The plan file could not be read.
    #[error("failed to read route plan {}: {source}", path.display())]
    Read {
        /// File that was read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// The plan file is not valid TOML or has the wrong shape.
    #[error("failed to parse route plan {}: {source}", path.display())]
    Parse {
        /// File that was parsed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: toml::de::Error,
    },

    /// The plan has no route entries.
    #[error("route plan {} has no segments to ride", path.display())]
    EmptyRoute {
        /// File that was parsed.
        path: PathBuf,
    },

    /// The route rides a segment the plan does not define.
    #[error("route rides segment {segment_id} which is not in the segment list")]
    UnknownRouteSegment {
        /// Missing segment.
        segment_id: String,
    },

    /// The segment graph is inconsistent.
    #[error(transparent)]
    Segments(#[from] SegmentError),
}

/// Result type for route store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors starting or running the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The config file could not be read.
    #[error("failed to read config {}: {source}", path.display())]
    ConfigRead {
        /// File that was read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// The config file is not valid TOML or has the wrong shape.
    #[error("failed to parse config {}: {source}", path.display())]
    ConfigParse {
        /// File that was parsed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: toml::de::Error,
    },

    /// A config value is out of range.
    #[error("invalid config: {0}")]
    Config(#[from] ConfigError),

    /// The route plan could not be loaded.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The game connection failed.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// A worker thread could not be started.
    #[error("failed to start {task} task: {source}")]
    Spawn {
        /// Task that failed to start.
        task: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// The dispatcher is not accepting events anymore.
    #[error("dispatcher has stopped")]
    DispatcherStopped,
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

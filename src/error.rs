//! Error types for the runner core
//!
//! Nothing here is allowed to halt the frame tick: pool exhaustion skips a spawn,
//! a suspended audio context drops tones, and a missing music file falls back to
//! the procedural sequencer.

use std::path::PathBuf;

use crate::sim::pool::EntityKind;

/// Error type for runner operations
#[derive(thiserror::Error, Debug)]
pub enum RunnerError {
    /// Acquire on an empty pool
    #[error("{kind} pool exhausted")]
    PoolExhausted { kind: EntityKind },

    /// Synthesis backend refused to resume
    #[error("audio context suspended")]
    AudioContextSuspended,

    /// Synthesis backend could not be (re)created
    #[error("audio backend unavailable: {0}")]
    AudioBackend(String),

    /// Model or audio file could not be loaded
    #[error("failed to load asset {}: {source}", path.display())]
    AssetLoadFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed tuning/settings/sheet JSON
    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),

    /// IO error from filesystem
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for runner operations
pub type Result<T> = std::result::Result<T, RunnerError>;

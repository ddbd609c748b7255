//! Error types
//!
//! Configuration and restore problems are recovered locally and reported to the
//! host as structured results. Only [`EngineError::UnsupportedShape`] ends a
//! session.

use thiserror::Error;

#[cfg(feature = "std")]
use std::{string::String, vec::Vec};

#[cfg(not(feature = "std"))]
extern crate alloc;
#[cfg(not(feature = "std"))]
use alloc::{string::String, vec::Vec};

/// Invalid or missing configuration options, aggregated into one report
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}", .problems.join("; "))]
pub struct ConfigError {
    /// Individual problems in the order they were detected
    pub problems: Vec<String>,
}

impl ConfigError {
    /// Build an error from a list of problems
    pub fn new(problems: Vec<String>) -> Self {
        Self { problems }
    }

    /// Number of problems reported
    pub fn len(&self) -> usize {
        self.problems.len()
    }

    /// Check if no problem was recorded
    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Snapshot blob could not be restored
///
/// The engine state is left untouched whenever this is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RestoreError {
    /// Blob is not a valid snapshot document
    #[error("malformed snapshot: {0}")]
    Malformed(String),

    /// Snapshot schema version is not understood
    #[error("unsupported snapshot version: expected {expected}, found {found}")]
    UnsupportedVersion { expected: u32, found: u32 },

    /// Snapshot was produced by a different engine
    #[error("snapshot kind mismatch: expected {expected}, found {found}")]
    KindMismatch { expected: String, found: String },

    /// A group state failed validation
    #[error("invalid state for group {group:?}: {reason}")]
    InvalidGroup { group: String, reason: String },
}

/// Registry contents could not be encoded
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("failed to encode snapshot: {0}")]
    Encode(String),
}

/// Operational errors raised while exchanging data with the host
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Input or output shape the engine does not support; fatal for the session
    #[error("unsupported shape: {0}")]
    UnsupportedShape(String),

    /// A point arrived before a successful initialization
    #[error("engine is not initialized")]
    NotInitialized,

    /// The session already failed and accepts no further requests
    #[error("session failed: {0}")]
    SessionFailed(String),
}

impl EngineError {
    /// Whether the error ends the session
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EngineError::UnsupportedShape(_) | EngineError::SessionFailed(_)
        )
    }
}

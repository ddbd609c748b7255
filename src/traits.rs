//! Core traits shared by every engine
//!
//! Per-group state records implement [`GroupState`] so the snapshot codec can
//! tag and validate them. Engines implement [`Handler`], the typed boundary
//! the host drives one request at a time.

use crate::config::{OptionInfo, OptionSetting};
use crate::error::{ConfigError, EngineError, RestoreError, SnapshotError};
use crate::point::{BeginBatch, EndBatch, Output, Point};
use core::fmt::Debug;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

#[cfg(feature = "std")]
use std::{collections::BTreeMap, string::String, vec::Vec};

#[cfg(not(feature = "std"))]
extern crate alloc;
#[cfg(not(feature = "std"))]
use alloc::{collections::BTreeMap, string::String, vec::Vec};

/// Shape of the data flowing on an edge
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeType {
    /// Unbounded sequence of individual points
    Stream,
    /// Points delimited by begin/end batch markers
    Batch,
}

/// Capabilities an engine declares to the host
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineInfo {
    /// Accepted input shape
    pub wants: EdgeType,
    /// Produced output shape
    pub provides: EdgeType,
    /// Named options and their accepted value types
    pub options: BTreeMap<String, OptionInfo>,
}

/// Per-group state record owned by one engine
pub trait GroupState: Clone + Debug + Serialize + DeserializeOwned {
    /// Engine kind recorded in snapshots
    const KIND: &'static str;

    /// Structural checks applied to restored state stored under `group`
    fn validate(&self, group: &str) -> Result<(), String>;

    /// Number of samples currently held in the window
    fn window_len(&self) -> usize;
}

/// A streaming engine as seen by the host
///
/// Batch input is refused by default; engines that accept batches override
/// [`begin_batch`](Handler::begin_batch) and [`end_batch`](Handler::end_batch).
pub trait Handler {
    /// Declared input/output shapes and options
    fn info(&self) -> EngineInfo;

    /// Validate `options` and reset the engine for a new configuration
    ///
    /// Every group is dropped, including any installed by an earlier
    /// [`restore`](Handler::restore), so a warm restart restores after init.
    /// On failure the engine stays unconfigured.
    fn init(&mut self, options: &[OptionSetting]) -> Result<(), ConfigError>;

    /// Whether a configuration has been accepted
    fn is_initialized(&self) -> bool;

    /// Serialize the state of every group
    fn snapshot(&self) -> Result<Vec<u8>, SnapshotError>;

    /// Replace the state of every group from a blob produced by `snapshot`
    ///
    /// Either every group is restored or nothing changes.
    fn restore(&mut self, blob: &[u8]) -> Result<(), RestoreError>;

    /// Process one point, pushing any resulting events to `out`
    fn point(&mut self, point: Point, out: &mut Vec<Output>) -> Result<(), EngineError>;

    fn begin_batch(&mut self, _begin: &BeginBatch) -> Result<(), EngineError> {
        Err(EngineError::UnsupportedShape(String::from(
            "batch input is not supported",
        )))
    }

    fn end_batch(&mut self, _end: &EndBatch) -> Result<(), EngineError> {
        Err(EngineError::UnsupportedShape(String::from(
            "batch input is not supported",
        )))
    }
}

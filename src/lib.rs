//! # Groupflow
//!
//! Per-group streaming transforms for time-series hosts.
//!
//! A host feeds points one at a time; each point carries a group key, a
//! timestamp and numeric fields. Engines keep independent state per group and
//! answer with derived points or re-batched data. Every engine can snapshot
//! its full state and restore it later for a warm restart.
//!
//! ## Engines
//!
//! - **Exponential moving average** ([`ema`]): decayed average over a bounded
//!   window with exact eviction of the oldest sample
//! - **Rolling z-score** ([`zscore`]): standardized score of each value
//!   against the window mean and standard deviation
//! - **Window batcher** ([`batch`]): releases buffered points as delimited
//!   batches on a size threshold or a shared period deadline
//!
//! ## Quick Start
//!
//! ```rust
//! use groupflow::prelude::*;
//!
//! let mut engine = EmaEngine::with_config(EmaConfig::new("usage", 10, 0.2));
//! let mut out = Vec::new();
//!
//! for (t, usage) in [0.5, 0.7, 0.6].into_iter().enumerate() {
//!     let point = Point::new("cpu", "host=a", t as i64).with_double("usage", usage);
//!     engine.point(point, &mut out).unwrap();
//! }
//! assert_eq!(out.len(), 3);
//!
//! // Warm restart
//! let blob = engine.snapshot().unwrap();
//! let mut restored = EmaEngine::with_config(EmaConfig::new("usage", 10, 0.2));
//! restored.restore(&blob).unwrap();
//! ```
//!
//! ## Hosting
//!
//! [`agent::Agent`] wraps any [`Handler`](traits::Handler) and answers the
//! host's requests (info, init, snapshot, restore, points). The transport that
//! carries those requests is left to the embedding process.
//!
//! ## Feature Flags
//!
//! Engine families:
//! - `ema` (default): exponential moving average
//! - `zscore` (default): rolling z-score
//! - `batch` (default): window batcher
//! - `full`: enable all engine families
//!
//! Platform features:
//! - `std` (default): Standard library support; without it the crate builds
//!   on `alloc`

#![cfg_attr(not(feature = "std"), no_std)]
#![cfg_attr(docsrs, feature(doc_cfg))]

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod agent;
pub mod config;
pub mod error;
pub mod point;
pub mod registry;
pub mod snapshot;
pub mod traits;

#[cfg(feature = "zscore")]
mod math;

#[cfg(feature = "ema")]
#[cfg_attr(docsrs, doc(cfg(feature = "ema")))]
pub mod ema;

#[cfg(feature = "zscore")]
#[cfg_attr(docsrs, doc(cfg(feature = "zscore")))]
pub mod zscore;

#[cfg(feature = "batch")]
#[cfg_attr(docsrs, doc(cfg(feature = "batch")))]
pub mod batch;

pub mod prelude {
    pub use crate::agent::{Agent, Request, Response};
    pub use crate::config::{OptionSetting, OptionValue};
    pub use crate::error::{ConfigError, EngineError, RestoreError, SnapshotError};
    pub use crate::point::{BeginBatch, EndBatch, Output, Point};
    pub use crate::traits::*;

    #[cfg(feature = "ema")]
    pub use crate::ema::{EmaConfig, EmaEngine};

    #[cfg(feature = "zscore")]
    pub use crate::zscore::{ZScoreConfig, ZScoreEngine};

    #[cfg(feature = "batch")]
    pub use crate::batch::{BatchConfig, WindowBatcher};
}

#[cfg(feature = "ema")]
pub use ema::EmaEngine;

#[cfg(feature = "zscore")]
pub use zscore::ZScoreEngine;

#[cfg(feature = "batch")]
pub use batch::WindowBatcher;

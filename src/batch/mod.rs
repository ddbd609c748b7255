//! Count and time windowed batching per group
//!
//! Points are buffered per group and released as a delimited batch
//! (`BeginBatch`, points, `EndBatch`) when the group reaches its size
//! threshold, or for every group at once when the shared period deadline
//! passes.
//!
//! # Example
//!
//! ```
//! use groupflow::batch::{BatchConfig, WindowBatcher};
//! use groupflow::point::{Output, Point};
//! use groupflow::traits::Handler;
//!
//! let mut batcher = WindowBatcher::with_config(BatchConfig::new(2, 0));
//! let mut out = Vec::new();
//!
//! batcher.point(Point::new("m", "host=a", 1), &mut out).unwrap();
//! assert!(out.is_empty());
//!
//! batcher.point(Point::new("m", "host=a", 2), &mut out).unwrap();
//! assert_eq!(out.len(), 4);
//! assert!(matches!(out[0], Output::BeginBatch(ref b) if b.size == 2));
//! assert!(matches!(out[3], Output::EndBatch(ref e) if e.tmax == 2));
//! ```

mod analysis;
mod batcher;

pub use analysis::{BatchAnalysis, Identity};
pub use batcher::{BatchClock, BatchConfig, BatchState, WindowBatcher};

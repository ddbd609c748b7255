//! Rolling z-score per group
//!
//! Each group tracks the running mean and mean of squares over its last `size`
//! values and reports how many standard deviations the newest value lies from
//! the mean. A window with zero variance yields a score of `0`.
//!
//! # Example
//!
//! ```
//! use groupflow::zscore::ZScoreState;
//!
//! let mut state = ZScoreState::new(4);
//!
//! for value in [2.0, 4.0, 4.0] {
//!     state.update(value);
//! }
//! let z = state.update(6.0).unwrap();
//!
//! assert!((state.mean() - 4.0).abs() < 1e-12);
//! assert!((z - 2.0 / 2.0_f64.sqrt()).abs() < 1e-12);
//! ```

mod sigma;

pub use sigma::{ZScoreConfig, ZScoreEngine, ZScoreState};

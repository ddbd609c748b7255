//! Exponential moving average per group
//!
//! Each group keeps an exponentially decayed average of a numeric field over a
//! bounded window of decayed contributions. When the window is full the oldest
//! contribution is subtracted exactly, so the average only ever reflects the
//! last `size` samples.
//!
//! # Example
//!
//! ```
//! use groupflow::ema::EmaState;
//!
//! let mut state = EmaState::new(3, 0.5);
//!
//! for value in [1.0, 2.0, 3.0, 4.0] {
//!     state.update(value);
//! }
//!
//! assert_eq!(state.avg(), 3.0);
//! assert_eq!(state.window().len(), 3);
//! ```

mod exp_avg;

pub use exp_avg::{EmaConfig, EmaEngine, EmaState};

//! Per-group transforms applied when a batch is released

use crate::point::Point;

#[cfg(feature = "std")]
use std::vec::Vec;

#[cfg(not(feature = "std"))]
extern crate alloc;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

/// Transform applied to a group's buffered points when its batch is flushed
///
/// `field` is the configured target field, if any. The returned points are
/// emitted between the batch markers in order.
pub trait BatchAnalysis {
    fn analyze(&mut self, field: Option<&str>, window: Vec<Point>) -> Vec<Point>;
}

/// Passes buffered points through unchanged
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Identity;

impl BatchAnalysis for Identity {
    fn analyze(&mut self, _field: Option<&str>, window: Vec<Point>) -> Vec<Point> {
        window
    }
}

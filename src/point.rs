//! Data points and batch markers exchanged with the host
//!
//! A [`Point`] is what the host feeds into an engine. Engines answer with
//! [`Output`] events: transformed points, or for batching engines a
//! [`BeginBatch`] / points / [`EndBatch`] sequence.

use serde::{Deserialize, Serialize};

#[cfg(feature = "std")]
use std::{collections::BTreeMap, string::String};

#[cfg(not(feature = "std"))]
extern crate alloc;
#[cfg(not(feature = "std"))]
use alloc::{collections::BTreeMap, string::String};

/// A single time-series data point
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Measurement name
    pub name: String,
    /// Group key the host derived from the tag set
    pub group: String,
    /// Timestamp in nanoseconds
    pub time: i64,
    /// Tag set
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    /// Floating point fields
    #[serde(default)]
    pub fields_double: BTreeMap<String, f64>,
    /// Integer fields
    #[serde(default)]
    pub fields_int: BTreeMap<String, i64>,
    /// String fields
    #[serde(default)]
    pub fields_string: BTreeMap<String, String>,
}

impl Point {
    /// Create a point with no tags or fields
    pub fn new(name: impl Into<String>, group: impl Into<String>, time: i64) -> Self {
        Self {
            name: name.into(),
            group: group.into(),
            time,
            ..Self::default()
        }
    }

    /// Builder-style helper adding a tag
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Builder-style helper adding a floating point field
    pub fn with_double(mut self, field: impl Into<String>, value: f64) -> Self {
        self.fields_double.insert(field.into(), value);
        self
    }

    /// Builder-style helper adding an integer field
    pub fn with_int(mut self, field: impl Into<String>, value: i64) -> Self {
        self.fields_int.insert(field.into(), value);
        self
    }

    /// Numeric value of a field
    ///
    /// Floating point fields take precedence; integer fields are converted.
    pub fn numeric(&self, field: &str) -> Option<f64> {
        self.fields_double
            .get(field)
            .copied()
            .or_else(|| self.fields_int.get(field).map(|&v| v as f64))
    }

    /// Remove every field, keeping name, group, time and tags
    pub fn clear_fields(&mut self) {
        self.fields_double.clear();
        self.fields_int.clear();
        self.fields_string.clear();
    }
}

/// Finite value of `field`, or `None` when the point must be skipped
#[cfg(any(feature = "ema", feature = "zscore"))]
pub(crate) fn read_value(point: &Point, field: &str) -> Option<f64> {
    match point.numeric(field) {
        Some(value) if value.is_finite() => Some(value),
        Some(value) => {
            log::warn!(
                "skipping point for group {:?}: field {} is not finite ({})",
                point.group,
                field,
                value
            );
            None
        }
        None => {
            log::warn!(
                "skipping point for group {:?}: missing field {}",
                point.group,
                field
            );
            None
        }
    }
}

/// Opens a batch for a group
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BeginBatch {
    pub name: String,
    pub group: String,
    pub tags: BTreeMap<String, String>,
    /// Number of points buffered for the batch
    pub size: usize,
}

/// Closes a batch for a group
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EndBatch {
    pub name: String,
    pub group: String,
    pub tags: BTreeMap<String, String>,
    /// Largest timestamp in the batch
    pub tmax: i64,
}

/// Event produced by an engine for the host
#[derive(Clone, Debug, PartialEq)]
pub enum Output {
    Point(Point),
    BeginBatch(BeginBatch),
    EndBatch(EndBatch),
}

impl Output {
    /// The point carried by this event, if any
    pub fn as_point(&self) -> Option<&Point> {
        match self {
            Output::Point(p) => Some(p),
            _ => None,
        }
    }
}

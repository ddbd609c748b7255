//! Windowed mean and standard deviation with z-score output

use crate::config::{OptionInfo, OptionReader, OptionSetting, ValueType};
use crate::error::{ConfigError, EngineError, RestoreError, SnapshotError};
use crate::math;
use crate::point::{read_value, Output, Point};
use crate::registry::GroupRegistry;
use crate::snapshot::SnapshotCodec;
use crate::traits::{EdgeType, EngineInfo, GroupState, Handler};
use serde::{Deserialize, Serialize};

#[cfg(feature = "std")]
use std::{
    collections::{BTreeMap, VecDeque},
    format,
    string::String,
    vec::Vec,
};

#[cfg(not(feature = "std"))]
extern crate alloc;
#[cfg(not(feature = "std"))]
use alloc::{
    collections::{BTreeMap, VecDeque},
    format,
    string::String,
    vec::Vec,
};

/// Window size used when the host does not supply one
pub const DEFAULT_WINDOW: usize = 100;

/// Running first and second moments over a bounded window
///
/// `window` and `square_window` are kept in lockstep. While the window fills,
/// the means are blended over `len + 1` samples; once full, the oldest sample's
/// share is swapped for the newest one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ZScoreState {
    size: usize,
    window: VecDeque<f64>,
    square_window: VecDeque<f64>,
    /// Mean of the window
    avg: f64,
    /// Mean of the squared window
    avg_square: f64,
}

impl ZScoreState {
    /// Create an empty state holding at most `size` values
    pub fn new(size: usize) -> Self {
        Self {
            size,
            window: VecDeque::with_capacity(size),
            square_window: VecDeque::with_capacity(size),
            avg: 0.0,
            avg_square: 0.0,
        }
    }

    /// Fold `value` into the window and return its z-score
    ///
    /// Returns `None` and leaves the state untouched when the value or its
    /// square would push the running moments out of finite range.
    pub fn update(&mut self, value: f64) -> Option<f64> {
        let square = value * value;
        let length = self.window.len();
        let n = length as f64;

        let evict = match (self.window.front(), self.square_window.front()) {
            (Some(&oldest), Some(&oldest_square)) if length >= self.size => {
                Some((oldest, oldest_square))
            }
            _ => None,
        };
        let (avg, avg_square) = match evict {
            Some((oldest, oldest_square)) => (
                self.avg + (value / n - oldest / n),
                self.avg_square + (square / n - oldest_square / n),
            ),
            None => (
                (value + n * self.avg) / (n + 1.0),
                (square + n * self.avg_square) / (n + 1.0),
            ),
        };
        if !(square.is_finite() && avg.is_finite() && avg_square.is_finite()) {
            return None;
        }

        if evict.is_some() {
            self.window.pop_front();
            self.square_window.pop_front();
        }
        self.avg = avg;
        self.avg_square = avg_square;
        self.window.push_back(value);
        self.square_window.push_back(square);

        let sigma = self.sigma();
        if sigma == 0.0 {
            Some(0.0)
        } else {
            Some((value - self.avg) / sigma)
        }
    }

    /// Mean of the window
    pub fn mean(&self) -> f64 {
        self.avg
    }

    /// Mean of the squared window
    pub fn mean_square(&self) -> f64 {
        self.avg_square
    }

    /// Population variance, clamped at zero against rounding
    pub fn variance(&self) -> f64 {
        (self.avg_square - self.avg * self.avg).max(0.0)
    }

    /// Population standard deviation
    pub fn sigma(&self) -> f64 {
        math::sqrt(self.variance())
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Values in the window, oldest first
    pub fn window(&self) -> &VecDeque<f64> {
        &self.window
    }

    /// Check if the window holds `size` values
    pub fn is_full(&self) -> bool {
        self.window.len() >= self.size
    }
}

impl GroupState for ZScoreState {
    const KIND: &'static str = "zscore";

    // Running means are trusted as-is; only the shape of the state is checked.
    fn validate(&self, _group: &str) -> Result<(), String> {
        if self.size == 0 {
            return Err(String::from("size must be at least 1"));
        }
        if self.window.len() != self.square_window.len() {
            return Err(format!(
                "window holds {} values but square window holds {}",
                self.window.len(),
                self.square_window.len()
            ));
        }
        if self.window.len() > self.size {
            return Err(format!(
                "window holds {} values but size is {}",
                self.window.len(),
                self.size
            ));
        }
        let finite = self.avg.is_finite()
            && self.avg_square.is_finite()
            && self
                .window
                .iter()
                .chain(self.square_window.iter())
                .all(|v| v.is_finite());
        if !finite {
            return Err(String::from("non-finite value in state"));
        }
        Ok(())
    }

    fn window_len(&self) -> usize {
        self.window.len()
    }
}

/// Configuration of a [`ZScoreEngine`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ZScoreConfig {
    /// Field read from each point
    pub field: String,
    /// Window capacity
    pub size: usize,
    /// Name of the output field
    pub output: String,
    /// Hold back output until a group's window is full
    pub fill_window: bool,
}

impl ZScoreConfig {
    /// Config with the default window, output name and no fill policy
    pub fn new(field: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            output: default_output(&field),
            field,
            size: DEFAULT_WINDOW,
            fill_window: false,
        }
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }

    pub fn with_fill_window(mut self, fill_window: bool) -> Self {
        self.fill_window = fill_window;
        self
    }

    /// Options accepted from the host
    pub fn declared_options() -> BTreeMap<String, OptionInfo> {
        let mut options = BTreeMap::new();
        options.insert(String::from("field"), OptionInfo::new(ValueType::String));
        options.insert(String::from("window"), OptionInfo::new(ValueType::Int));
        options.insert(String::from("as"), OptionInfo::new(ValueType::String));
        options.insert(String::from("fillWindow"), OptionInfo::new(ValueType::Bool));
        options
    }

    /// Build a config from host options, reporting every problem at once
    ///
    /// A missing or empty `as` falls back to `sigma_<field>`.
    pub fn from_options(settings: &[OptionSetting]) -> Result<Self, ConfigError> {
        let mut reader = OptionReader::new(settings, &Self::declared_options());

        let field = reader.string("field").unwrap_or_default();
        if field.is_empty() {
            reader.problem("must supply field");
        }

        let size = match reader.int("window") {
            None => DEFAULT_WINDOW,
            Some(n) if n <= 0 => {
                reader.problem(format!("window must be positive, got {}", n));
                0
            }
            Some(n) => n as usize,
        };

        let output = reader
            .string("as")
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| default_output(&field));
        let fill_window = reader.flag("fillWindow");

        reader.finish(Self {
            field,
            size,
            output,
            fill_window,
        })
    }
}

fn default_output(field: &str) -> String {
    format!("sigma_{}", field)
}

/// Rolling z-score engine
///
/// Emits a copy of each input point with the z-score added under the output
/// field. With `fill_window` set, points are folded into state but not emitted
/// until their group's window is full.
#[derive(Clone, Debug, Default)]
pub struct ZScoreEngine {
    config: Option<ZScoreConfig>,
    registry: GroupRegistry<ZScoreState>,
}

impl ZScoreEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ZScoreConfig) -> Self {
        Self {
            config: Some(config),
            registry: GroupRegistry::new(),
        }
    }

    pub fn config(&self) -> Option<&ZScoreConfig> {
        self.config.as_ref()
    }

    pub fn registry(&self) -> &GroupRegistry<ZScoreState> {
        &self.registry
    }
}

impl Handler for ZScoreEngine {
    fn info(&self) -> EngineInfo {
        EngineInfo {
            wants: EdgeType::Stream,
            provides: EdgeType::Stream,
            options: ZScoreConfig::declared_options(),
        }
    }

    fn init(&mut self, options: &[OptionSetting]) -> Result<(), ConfigError> {
        self.registry.clear();
        match ZScoreConfig::from_options(options) {
            Ok(config) => {
                log::info!(
                    "zscore configured: field={} window={} as={} fill_window={}",
                    config.field,
                    config.size,
                    config.output,
                    config.fill_window
                );
                self.config = Some(config);
                Ok(())
            }
            Err(e) => {
                log::warn!("zscore configuration rejected: {}", e);
                self.config = None;
                Err(e)
            }
        }
    }

    fn is_initialized(&self) -> bool {
        self.config.is_some()
    }

    fn snapshot(&self) -> Result<Vec<u8>, SnapshotError> {
        SnapshotCodec::export(&self.registry, &())
    }

    fn restore(&mut self, blob: &[u8]) -> Result<(), RestoreError> {
        let snapshot = SnapshotCodec::import::<ZScoreState, ()>(blob)?;
        log::info!("zscore restored {} groups", snapshot.groups.len());
        self.registry.replace(snapshot.groups);
        Ok(())
    }

    fn point(&mut self, point: Point, out: &mut Vec<Output>) -> Result<(), EngineError> {
        let config = self.config.as_ref().ok_or(EngineError::NotInitialized)?;
        let Some(value) = read_value(&point, &config.field) else {
            return Ok(());
        };

        let size = config.size;
        let state = self
            .registry
            .get_or_create(&point.group, || ZScoreState::new(size));
        let Some(z) = state.update(value) else {
            log::warn!(
                "skipping point for group {:?}: {} = {} overflows the window moments",
                point.group,
                config.field,
                value
            );
            return Ok(());
        };

        if config.fill_window && !state.is_full() {
            return Ok(());
        }

        let mut result = point;
        result.fields_double.insert(config.output.clone(), z);
        out.push(Output::Point(result));
        Ok(())
    }
}

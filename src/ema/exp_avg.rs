//! Windowed exponential moving average
//!
//! The window holds every retained sample's contribution to the average,
//! already decayed to the current step. At capacity, the oldest contribution
//! is removed from the average before the new sample is folded in.

use crate::config::{OptionInfo, OptionReader, OptionSetting, ValueType};
use crate::error::{ConfigError, EngineError, RestoreError, SnapshotError};
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

/// Output field name used when `as` is not supplied
pub const DEFAULT_OUTPUT: &str = "exp_avg";

/// Exponential moving average state for one group
///
/// # Example
///
/// ```
/// use groupflow::ema::EmaState;
///
/// let mut state = EmaState::new(2, 0.5);
/// assert_eq!(state.update(4.0), Some(2.0));
/// assert_eq!(state.update(4.0), Some(3.0));
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmaState {
    /// Window capacity
    size: usize,
    /// Weight of the newest sample
    alpha: f64,
    /// Decayed contributions, oldest first
    window: VecDeque<f64>,
    /// Current average
    avg: f64,
}

impl EmaState {
    /// Create an empty state
    ///
    /// `size` must be at least 1 and `alpha` positive; engines guarantee this
    /// through [`EmaConfig`].
    pub fn new(size: usize, alpha: f64) -> Self {
        Self {
            size,
            alpha,
            window: VecDeque::with_capacity(size),
            avg: 0.0,
        }
    }

    /// Fold `value` into the average and return the new average
    ///
    /// Returns `None` and leaves the state untouched when the update would
    /// leave the average or any contribution out of finite range.
    pub fn update(&mut self, value: f64) -> Option<f64> {
        let beta = 1.0 - self.alpha;

        let evict = match self.window.front() {
            Some(&oldest) if self.window.len() >= self.size => Some(oldest),
            _ => None,
        };
        let avg = match evict {
            Some(oldest) => self.alpha * value + (self.avg - oldest) * beta,
            None => value * self.alpha + self.avg * beta,
        };
        let contribution = value * self.alpha;
        let finite = avg.is_finite()
            && contribution.is_finite()
            && self
                .window
                .iter()
                .skip(usize::from(evict.is_some()))
                .all(|c| (c * beta).is_finite());
        if !finite {
            return None;
        }

        if evict.is_some() {
            self.window.pop_front();
        }
        self.avg = avg;
        for c in self.window.iter_mut() {
            *c *= beta;
        }
        self.window.push_back(contribution);

        Some(self.avg)
    }

    /// Current average
    pub fn avg(&self) -> f64 {
        self.avg
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Decayed contributions, oldest first
    pub fn window(&self) -> &VecDeque<f64> {
        &self.window
    }

    /// Check if the window is at capacity
    pub fn is_full(&self) -> bool {
        self.window.len() >= self.size
    }
}

impl GroupState for EmaState {
    const KIND: &'static str = "ema";

    fn validate(&self, _group: &str) -> Result<(), String> {
        if self.size == 0 {
            return Err(String::from("size must be at least 1"));
        }
        if !(self.alpha.is_finite() && self.alpha > 0.0) {
            return Err(format!("alpha must be positive, got {}", self.alpha));
        }
        if self.window.len() > self.size {
            return Err(format!(
                "window holds {} values but size is {}",
                self.window.len(),
                self.size
            ));
        }
        if !self.avg.is_finite() || self.window.iter().any(|v| !v.is_finite()) {
            return Err(String::from("non-finite value in state"));
        }
        Ok(())
    }

    fn window_len(&self) -> usize {
        self.window.len()
    }
}

/// Configuration of an [`EmaEngine`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmaConfig {
    /// Field read from each point
    pub field: String,
    /// Window capacity
    pub size: usize,
    /// Decay factor
    pub alpha: f64,
    /// Name of the output field
    pub output: String,
}

impl EmaConfig {
    /// Config with the default output name
    pub fn new(field: impl Into<String>, size: usize, alpha: f64) -> Self {
        Self {
            field: field.into(),
            size,
            alpha,
            output: String::from(DEFAULT_OUTPUT),
        }
    }

    /// Builder-style helper setting the output field name
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }

    /// Options accepted from the host
    pub fn declared_options() -> BTreeMap<String, OptionInfo> {
        let mut options = BTreeMap::new();
        options.insert(String::from("field"), OptionInfo::new(ValueType::String));
        options.insert(String::from("size"), OptionInfo::new(ValueType::Int));
        options.insert(String::from("as"), OptionInfo::new(ValueType::String));
        options.insert(String::from("alpha"), OptionInfo::new(ValueType::Double));
        options
    }

    /// Build a config from host options, reporting every problem at once
    pub fn from_options(settings: &[OptionSetting]) -> Result<Self, ConfigError> {
        let mut reader = OptionReader::new(settings, &Self::declared_options());

        let field = reader.string("field").unwrap_or_default();
        if field.is_empty() {
            reader.problem("must supply field");
        }

        let size = match reader.int("size") {
            None | Some(0) => {
                reader.problem("must supply window size");
                0
            }
            Some(n) if n < 0 => {
                reader.problem(format!("size must be positive, got {}", n));
                0
            }
            Some(n) => n as usize,
        };

        let output = match reader.string("as") {
            Some(name) if name.is_empty() => {
                reader.problem("invalid as name");
                name
            }
            Some(name) => name,
            None => String::from(DEFAULT_OUTPUT),
        };

        let alpha = reader.double("alpha").unwrap_or(0.0);
        if alpha == 0.0 {
            reader.problem("must supply smoothing factor alpha");
        } else if !(alpha.is_finite() && alpha > 0.0) {
            reader.problem(format!("alpha must be positive, got {}", alpha));
        } else if alpha > 1.0 {
            log::warn!("alpha {} is greater than 1, history will oscillate", alpha);
        }

        reader.finish(Self {
            field,
            size,
            alpha,
            output,
        })
    }
}

/// Exponential moving average engine
///
/// Emits one point per input point: a copy of the input with every field
/// removed and the average written to the output field.
///
/// # Example
///
/// ```
/// use groupflow::ema::{EmaConfig, EmaEngine};
/// use groupflow::point::Point;
/// use groupflow::traits::Handler;
///
/// let mut engine = EmaEngine::with_config(EmaConfig::new("value", 3, 0.5));
///
/// let mut out = Vec::new();
/// engine
///     .point(Point::new("m", "host=a", 1).with_double("value", 1.0), &mut out)
///     .unwrap();
///
/// let point = out[0].as_point().unwrap();
/// assert_eq!(point.fields_double["exp_avg"], 0.5);
/// ```
#[derive(Clone, Debug, Default)]
pub struct EmaEngine {
    config: Option<EmaConfig>,
    registry: GroupRegistry<EmaState>,
}

impl EmaEngine {
    /// Create an unconfigured engine
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine from an already validated config
    pub fn with_config(config: EmaConfig) -> Self {
        Self {
            config: Some(config),
            registry: GroupRegistry::new(),
        }
    }

    pub fn config(&self) -> Option<&EmaConfig> {
        self.config.as_ref()
    }

    pub fn registry(&self) -> &GroupRegistry<EmaState> {
        &self.registry
    }
}

impl Handler for EmaEngine {
    fn info(&self) -> EngineInfo {
        EngineInfo {
            wants: EdgeType::Stream,
            provides: EdgeType::Stream,
            options: EmaConfig::declared_options(),
        }
    }

    fn init(&mut self, options: &[OptionSetting]) -> Result<(), ConfigError> {
        self.registry.clear();
        match EmaConfig::from_options(options) {
            Ok(config) => {
                log::info!(
                    "ema configured: field={} size={} alpha={} as={}",
                    config.field,
                    config.size,
                    config.alpha,
                    config.output
                );
                self.config = Some(config);
                Ok(())
            }
            Err(e) => {
                log::warn!("ema configuration rejected: {}", e);
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
        let snapshot = SnapshotCodec::import::<EmaState, ()>(blob)?;
        log::info!("ema restored {} groups", snapshot.groups.len());
        self.registry.replace(snapshot.groups);
        Ok(())
    }

    fn point(&mut self, point: Point, out: &mut Vec<Output>) -> Result<(), EngineError> {
        let config = self.config.as_ref().ok_or(EngineError::NotInitialized)?;
        let Some(value) = read_value(&point, &config.field) else {
            return Ok(());
        };

        let (size, alpha) = (config.size, config.alpha);
        let state = self
            .registry
            .get_or_create(&point.group, || EmaState::new(size, alpha));
        let Some(avg) = state.update(value) else {
            log::warn!(
                "skipping point for group {:?}: {} = {} overflows the average",
                point.group,
                config.field,
                value
            );
            return Ok(());
        };

        let mut result = point;
        result.clear_fields();
        result.fields_double.insert(config.output.clone(), avg);
        out.push(Output::Point(result));
        Ok(())
    }
}

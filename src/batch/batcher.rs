//! Size and period triggered batch release

use super::analysis::{BatchAnalysis, Identity};
use crate::config::{OptionInfo, OptionReader, OptionSetting, ValueType};
use crate::error::{ConfigError, EngineError, RestoreError, SnapshotError};
use crate::point::{BeginBatch, EndBatch, Output, Point};
use crate::registry::GroupRegistry;
use crate::snapshot::SnapshotCodec;
use crate::traits::{EdgeType, EngineInfo, GroupState, Handler};
use serde::{Deserialize, Serialize};

#[cfg(feature = "std")]
use std::{collections::BTreeMap, format, string::String, vec::Vec};

#[cfg(not(feature = "std"))]
extern crate alloc;
#[cfg(not(feature = "std"))]
use alloc::{collections::BTreeMap, format, string::String, vec::Vec};

/// Points buffered for one group since its last flush
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchState {
    /// Flush threshold, 0 disables size based flushing
    size: usize,
    window: Vec<Point>,
}

impl BatchState {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            window: Vec::new(),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Buffered points in arrival order
    pub fn window(&self) -> &[Point] {
        &self.window
    }

    /// Check if the size threshold has been reached
    pub fn is_full(&self) -> bool {
        self.size > 0 && self.window.len() >= self.size
    }
}

impl GroupState for BatchState {
    const KIND: &'static str = "batch";

    fn validate(&self, group: &str) -> Result<(), String> {
        if self.size > 0 && self.window.len() >= self.size {
            return Err(format!(
                "window holds {} points but batches are released at {}",
                self.window.len(),
                self.size
            ));
        }
        if let Some(stray) = self.window.iter().find(|p| p.group != group) {
            return Err(format!("buffered point belongs to group {:?}", stray.group));
        }
        Ok(())
    }

    fn window_len(&self) -> usize {
        self.window.len()
    }
}

/// Engine-wide timing state carried in snapshots
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchClock {
    /// Time at or after which every group is flushed; unset until the first point
    pub deadline: Option<i64>,
}

/// Configuration of a [`WindowBatcher`]
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Field handed to the analysis step
    pub field: Option<String>,
    /// Per-group flush threshold, 0 disables it
    pub size: usize,
    /// Flush period in nanoseconds, 0 disables it
    pub period: i64,
    /// Measurement name for emitted batches; input names are kept when unset
    pub output: Option<String>,
}

impl BatchConfig {
    pub fn new(size: usize, period: i64) -> Self {
        Self {
            size,
            period,
            ..Self::default()
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    /// Options accepted from the host
    pub fn declared_options() -> BTreeMap<String, OptionInfo> {
        let mut options = BTreeMap::new();
        options.insert(String::from("field"), OptionInfo::new(ValueType::String));
        options.insert(String::from("size"), OptionInfo::new(ValueType::Int));
        options.insert(String::from("as"), OptionInfo::new(ValueType::String));
        options.insert(String::from("period"), OptionInfo::new(ValueType::Duration));
        options
    }

    /// Build a config from host options, reporting every problem at once
    pub fn from_options(settings: &[OptionSetting]) -> Result<Self, ConfigError> {
        let mut reader = OptionReader::new(settings, &Self::declared_options());

        let field = reader.string("field");
        if field.as_deref() == Some("") {
            reader.problem("invalid field name");
        }

        let size = match reader.int("size").unwrap_or(0) {
            n if n < 0 => {
                reader.problem(format!("size must not be negative, got {}", n));
                0
            }
            n => n as usize,
        };

        let period = reader.duration("period").unwrap_or(0);
        if period < 0 {
            reader.problem(format!("period must not be negative, got {}", period));
        }

        if size == 0 && period == 0 {
            reader.problem("must supply a batch size or period to release the batch");
        }

        let output = reader.string("as");
        if output.as_deref() == Some("") {
            reader.problem("invalid as name");
        }

        reader.finish(Self {
            field,
            size,
            period,
            output,
        })
    }
}

/// Re-batches a point stream per group
///
/// For every point, in order:
/// 1. The first point arms the period deadline at `time + period`. Later, a
///    point at or past the deadline flushes every non-empty group and moves
///    the deadline forward by one period.
/// 2. The point is appended to its group's window.
/// 3. A group that reached `size` points is flushed on its own, so no batch
///    ever holds more than `size` points.
///
/// A flush emits a [`BeginBatch`], the points returned by the analysis step,
/// and an [`EndBatch`] carrying the largest timestamp, then empties the window.
#[derive(Clone, Debug, Default)]
pub struct WindowBatcher<A = Identity> {
    config: Option<BatchConfig>,
    registry: GroupRegistry<BatchState>,
    clock: BatchClock,
    analysis: A,
}

impl WindowBatcher<Identity> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: BatchConfig) -> Self {
        Self::with_analysis(config, Identity)
    }
}

impl<A: BatchAnalysis> WindowBatcher<A> {
    /// Batcher applying `analysis` to every released batch
    pub fn with_analysis(config: BatchConfig, analysis: A) -> Self {
        Self {
            config: Some(config),
            registry: GroupRegistry::new(),
            clock: BatchClock::default(),
            analysis,
        }
    }

    pub fn config(&self) -> Option<&BatchConfig> {
        self.config.as_ref()
    }

    pub fn registry(&self) -> &GroupRegistry<BatchState> {
        &self.registry
    }

    /// Current period deadline, if armed
    pub fn deadline(&self) -> Option<i64> {
        self.clock.deadline
    }

    pub fn analysis(&self) -> &A {
        &self.analysis
    }
}

fn flush_group<A: BatchAnalysis>(
    analysis: &mut A,
    config: &BatchConfig,
    state: &mut BatchState,
    out: &mut Vec<Output>,
) {
    let Some(last) = state.window.last() else {
        return;
    };

    let name = config.output.clone().unwrap_or_else(|| last.name.clone());
    let group = last.group.clone();
    let tags = last.tags.clone();
    let tmax = state.window.iter().fold(last.time, |max, p| max.max(p.time));

    out.push(Output::BeginBatch(BeginBatch {
        name: name.clone(),
        group: group.clone(),
        tags: tags.clone(),
        size: state.window.len(),
    }));

    let window = core::mem::take(&mut state.window);
    for mut point in analysis.analyze(config.field.as_deref(), window) {
        if config.output.is_some() {
            point.name.clone_from(&name);
        }
        out.push(Output::Point(point));
    }

    out.push(Output::EndBatch(EndBatch {
        name,
        group,
        tags,
        tmax,
    }));
}

impl<A: BatchAnalysis> Handler for WindowBatcher<A> {
    fn info(&self) -> EngineInfo {
        EngineInfo {
            wants: EdgeType::Stream,
            provides: EdgeType::Batch,
            options: BatchConfig::declared_options(),
        }
    }

    fn init(&mut self, options: &[OptionSetting]) -> Result<(), ConfigError> {
        self.registry.clear();
        self.clock = BatchClock::default();
        match BatchConfig::from_options(options) {
            Ok(config) => {
                log::info!(
                    "batcher configured: size={} period={}ns",
                    config.size,
                    config.period
                );
                self.config = Some(config);
                Ok(())
            }
            Err(e) => {
                log::warn!("batcher configuration rejected: {}", e);
                self.config = None;
                Err(e)
            }
        }
    }

    fn is_initialized(&self) -> bool {
        self.config.is_some()
    }

    fn snapshot(&self) -> Result<Vec<u8>, SnapshotError> {
        SnapshotCodec::export(&self.registry, &self.clock)
    }

    fn restore(&mut self, blob: &[u8]) -> Result<(), RestoreError> {
        let snapshot = SnapshotCodec::import::<BatchState, BatchClock>(blob)?;
        log::info!(
            "batcher restored {} groups, deadline {:?}",
            snapshot.groups.len(),
            snapshot.meta.deadline
        );
        self.registry.replace(snapshot.groups);
        self.clock = match &self.config {
            Some(config) if config.period <= 0 => {
                if snapshot.meta.deadline.is_some() {
                    log::debug!("dropping restored deadline, no period is configured");
                }
                BatchClock::default()
            }
            _ => snapshot.meta,
        };
        Ok(())
    }

    fn point(&mut self, point: Point, out: &mut Vec<Output>) -> Result<(), EngineError> {
        let config = self.config.as_ref().ok_or(EngineError::NotInitialized)?;

        match self.clock.deadline {
            _ if config.period <= 0 => {}
            None => {
                self.clock.deadline = Some(point.time.saturating_add(config.period));
            }
            Some(deadline) if point.time >= deadline => {
                log::debug!(
                    "period deadline {} passed at {}, flushing {} groups",
                    deadline,
                    point.time,
                    self.registry.len()
                );
                for (_, state) in self.registry.iter_mut() {
                    flush_group(&mut self.analysis, config, state, out);
                }
                self.clock.deadline = Some(deadline.saturating_add(config.period));
            }
            _ => {}
        }

        let size = config.size;
        let state = self
            .registry
            .get_or_create(&point.group, || BatchState::new(size));
        state.window.push(point);

        if state.is_full() {
            flush_group(&mut self.analysis, config, state, out);
        }
        Ok(())
    }
}

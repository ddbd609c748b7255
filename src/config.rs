//! Host supplied configuration options
//!
//! The host sends named, typed option values once at initialization. Engines
//! declare the options they accept as [`OptionInfo`] and read them through an
//! [`OptionReader`], which collects every problem instead of stopping at the
//! first so the host receives one combined message.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

#[cfg(feature = "std")]
use std::{collections::BTreeMap, string::String, vec::Vec};

#[cfg(not(feature = "std"))]
extern crate alloc;
#[cfg(not(feature = "std"))]
use alloc::{collections::BTreeMap, format, string::String, vec, vec::Vec};

/// Type of an option value
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueType {
    Bool,
    Int,
    Double,
    String,
    /// Nanoseconds
    Duration,
}

impl core::fmt::Display for ValueType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            ValueType::Bool => "bool",
            ValueType::Int => "int",
            ValueType::Double => "double",
            ValueType::String => "string",
            ValueType::Duration => "duration",
        };
        f.write_str(name)
    }
}

/// A single typed option value
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    /// Nanoseconds
    Duration(i64),
}

impl OptionValue {
    /// Type tag of the value
    pub fn value_type(&self) -> ValueType {
        match self {
            OptionValue::Bool(_) => ValueType::Bool,
            OptionValue::Int(_) => ValueType::Int,
            OptionValue::Double(_) => ValueType::Double,
            OptionValue::String(_) => ValueType::String,
            OptionValue::Duration(_) => ValueType::Duration,
        }
    }
}

/// A named option with its values, as sent by the host
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptionSetting {
    pub name: String,
    pub values: Vec<OptionValue>,
}

impl OptionSetting {
    /// Option with a single value
    pub fn new(name: impl Into<String>, value: OptionValue) -> Self {
        Self {
            name: name.into(),
            values: vec![value],
        }
    }

    /// Option given without any value (a flag)
    pub fn flag(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: Vec::new(),
        }
    }

    pub fn string(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, OptionValue::String(value.into()))
    }

    pub fn int(name: impl Into<String>, value: i64) -> Self {
        Self::new(name, OptionValue::Int(value))
    }

    pub fn double(name: impl Into<String>, value: f64) -> Self {
        Self::new(name, OptionValue::Double(value))
    }

    pub fn bool(name: impl Into<String>, value: bool) -> Self {
        Self::new(name, OptionValue::Bool(value))
    }

    pub fn duration(name: impl Into<String>, nanos: i64) -> Self {
        Self::new(name, OptionValue::Duration(nanos))
    }
}

/// Accepted value types for a declared option
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionInfo {
    pub value_types: Vec<ValueType>,
}

impl OptionInfo {
    pub fn new(value_type: ValueType) -> Self {
        Self {
            value_types: vec![value_type],
        }
    }
}

/// Reads options against a declaration, accumulating problems
///
/// Unknown option names and values of the wrong type are recorded when the
/// reader is created. Later occurrences of an option override earlier ones.
#[derive(Debug)]
pub struct OptionReader<'a> {
    settings: &'a [OptionSetting],
    problems: Vec<String>,
}

impl<'a> OptionReader<'a> {
    /// Check `settings` against the `declared` options
    pub fn new(settings: &'a [OptionSetting], declared: &BTreeMap<String, OptionInfo>) -> Self {
        let mut problems = Vec::new();
        for setting in settings {
            match declared.get(&setting.name) {
                None => problems.push(format!("unknown option {}", setting.name)),
                Some(info) => {
                    for value in &setting.values {
                        let found = value.value_type();
                        if !info.value_types.contains(&found) {
                            problems.push(format!(
                                "option {} expects {}, found {}",
                                setting.name,
                                join_types(&info.value_types),
                                found
                            ));
                        }
                    }
                }
            }
        }
        Self { settings, problems }
    }

    /// Whether the option was supplied at all
    pub fn contains(&self, name: &str) -> bool {
        self.settings.iter().any(|s| s.name == name)
    }

    fn first(&mut self, name: &str) -> Option<&'a OptionValue> {
        let setting = self.settings.iter().rev().find(|s| s.name == name)?;
        match setting.values.first() {
            Some(value) => Some(value),
            None => {
                self.problems.push(format!("option {} requires a value", name));
                None
            }
        }
    }

    pub fn string(&mut self, name: &str) -> Option<String> {
        match self.first(name)? {
            OptionValue::String(s) => Some(s.clone()),
            _ => None,
        }
    }

    pub fn int(&mut self, name: &str) -> Option<i64> {
        match self.first(name)? {
            OptionValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn double(&mut self, name: &str) -> Option<f64> {
        match self.first(name)? {
            OptionValue::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn duration(&mut self, name: &str) -> Option<i64> {
        match self.first(name)? {
            OptionValue::Duration(v) => Some(*v),
            _ => None,
        }
    }

    /// Boolean option; a bare flag with no value counts as `true`
    pub fn flag(&mut self, name: &str) -> bool {
        let Some(setting) = self.settings.iter().rev().find(|s| s.name == name) else {
            return false;
        };
        match setting.values.first() {
            None => true,
            Some(OptionValue::Bool(b)) => *b,
            Some(_) => false,
        }
    }

    /// Record a validation problem
    pub fn problem(&mut self, message: impl Into<String>) {
        self.problems.push(message.into());
    }

    /// Produce `value` if no problem was recorded
    pub fn finish<T>(self, value: T) -> Result<T, ConfigError> {
        if self.problems.is_empty() {
            Ok(value)
        } else {
            Err(ConfigError::new(self.problems))
        }
    }
}

fn join_types(types: &[ValueType]) -> String {
    let mut out = String::new();
    for (i, t) in types.iter().enumerate() {
        if i > 0 {
            out.push_str(" or ");
        }
        out.push_str(&format!("{}", t));
    }
    out
}

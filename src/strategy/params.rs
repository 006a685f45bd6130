//! Hyperparameter values, grids and pipeline-step namespacing

use crate::error::{ExplorerError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single hyperparameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ParamValue {
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParamValue::Float(v) => Some(*v),
            ParamValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Non-negative integers, including integral floats
    pub fn as_usize(&self) -> Option<usize> {
        match self {
            ParamValue::Int(v) if *v >= 0 => Some(*v as usize),
            ParamValue::Float(v) if *v >= 0.0 && v.fract() == 0.0 => Some(*v as usize),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(v) => write!(f, "{}", v),
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Str(v) => f.write_str(v),
        }
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<usize> for ParamValue {
    fn from(v: usize) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

/// Hyperparameters of one regressor, keyed by bare parameter name
pub type HyperParams = BTreeMap<String, ParamValue>;

/// Read a float parameter, or `default` when absent
pub(crate) fn float_param(params: &HyperParams, name: &str, default: f64) -> Result<f64> {
    match params.get(name) {
        None => Ok(default),
        Some(value) => value.as_float().ok_or_else(|| wrong_type(name, value, "a number")),
    }
}

/// Read a non-negative integer parameter, or `default` when absent
pub(crate) fn usize_param(params: &HyperParams, name: &str, default: usize) -> Result<usize> {
    match params.get(name) {
        None => Ok(default),
        Some(value) => value
            .as_usize()
            .ok_or_else(|| wrong_type(name, value, "a non-negative integer")),
    }
}

/// Read a string parameter, or `default` when absent
pub(crate) fn str_param<'a>(params: &'a HyperParams, name: &str, default: &'a str) -> Result<&'a str> {
    match params.get(name) {
        None => Ok(default),
        Some(value) => value.as_str().ok_or_else(|| wrong_type(name, value, "a string")),
    }
}

fn wrong_type(name: &str, value: &ParamValue, expected: &str) -> ExplorerError {
    ExplorerError::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
        reason: format!("expected {}", expected),
    }
}

/// Step of the scaling + model pipeline a parameter belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStep {
    Scaler,
    Model,
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineStep::Scaler => f.write_str("scaler"),
            PipelineStep::Model => f.write_str("model"),
        }
    }
}

/// Namespaced parameter key: the pipeline step plus the bare name
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ParamKey {
    pub step: PipelineStep,
    pub name: String,
}

impl ParamKey {
    pub fn new(step: PipelineStep, name: impl Into<String>) -> Self {
        Self {
            step,
            name: name.into(),
        }
    }

    pub fn model(name: impl Into<String>) -> Self {
        Self::new(PipelineStep::Model, name)
    }
}

impl fmt::Display for ParamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.step, self.name)
    }
}

/// One point of a pipeline grid
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineParams(BTreeMap<ParamKey, ParamValue>);

impl PipelineParams {
    /// Namespace bare model parameters under the model step
    pub fn from_model(params: &HyperParams) -> Self {
        Self(
            params
                .iter()
                .map(|(name, value)| (ParamKey::model(name.clone()), value.clone()))
                .collect(),
        )
    }

    /// Parameters of one step with the namespace stripped
    pub fn for_step(&self, step: PipelineStep) -> HyperParams {
        self.0
            .iter()
            .filter(|(key, _)| key.step == step)
            .map(|(key, value)| (key.name.clone(), value.clone()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for PipelineParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (key, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", key, value)?;
        }
        f.write_str("}")
    }
}

/// Exhaustive grid of candidate values per namespaced parameter
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamGrid {
    entries: BTreeMap<ParamKey, Vec<ParamValue>>,
}

impl ParamGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: ParamKey, values: Vec<ParamValue>) {
        self.entries.insert(key, values);
    }

    /// Add candidate values for a model-step parameter
    pub fn with_model_param(mut self, name: impl Into<String>, values: Vec<ParamValue>) -> Self {
        self.insert(ParamKey::model(name), values);
        self
    }

    pub fn keys(&self) -> impl Iterator<Item = &ParamKey> {
        self.entries.keys()
    }

    pub fn values(&self, key: &ParamKey) -> Option<&[ParamValue]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    /// Number of candidates the grid expands to
    pub fn n_candidates(&self) -> usize {
        self.entries.values().map(Vec::len).product()
    }

    /// Cartesian product in key order, the last key varying fastest.
    /// An empty grid yields a single empty candidate.
    pub fn candidates(&self) -> Vec<PipelineParams> {
        let mut out = vec![PipelineParams::default()];
        for (key, values) in &self.entries {
            out = out
                .into_iter()
                .flat_map(|partial| {
                    values.iter().map(move |value| {
                        let mut next = partial.clone();
                        next.0.insert(key.clone(), value.clone());
                        next
                    })
                })
                .collect();
        }
        out
    }
}

/// `2^lo, 2^(lo+1), ..., 2^hi`
pub(crate) fn powers_of_two(lo: i32, hi: i32) -> Vec<ParamValue> {
    (lo..=hi).map(|e| ParamValue::Float(2f64.powi(e))).collect()
}

/// Integers `lo..=hi`
pub(crate) fn int_range(lo: i64, hi: i64) -> Vec<ParamValue> {
    (lo..=hi).map(ParamValue::Int).collect()
}

/// `k / denom` for `k` in `lo..=hi`
pub(crate) fn fractions(lo: u32, hi: u32, denom: u32) -> Vec<ParamValue> {
    (lo..=hi)
        .map(|k| ParamValue::Float(k as f64 / denom as f64))
        .collect()
}

pub(crate) fn floats(values: &[f64]) -> Vec<ParamValue> {
    values.iter().map(|&v| ParamValue::Float(v)).collect()
}

pub(crate) fn ints(values: &[i64]) -> Vec<ParamValue> {
    values.iter().map(|&v| ParamValue::Int(v)).collect()
}

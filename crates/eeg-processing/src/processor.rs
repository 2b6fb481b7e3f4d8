//! Cleaning step trait, step parameters and timing

use eeg_core::{EngineResult, Signal};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

/// A stage of the cleaning pipeline
pub trait CleaningStep: Send + Sync {
    /// Produce a new signal from `input`; the input is never modified
    fn process(&self, input: &Signal) -> EngineResult<StepOutput>;

    /// Which stage this is
    fn step(&self) -> PipelineStep;

    /// Configured parameters, recorded before the step runs
    fn parameters(&self) -> StepParameters;

    fn name(&self) -> &'static str {
        self.step().name()
    }
}

/// Pipeline stages in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PipelineStep {
    /// Band-pass and notch filtering
    Filter,
    /// Component decomposition and rejection
    Separation,
}

impl PipelineStep {
    pub fn name(&self) -> &'static str {
        match self {
            PipelineStep::Filter => "filter",
            PipelineStep::Separation => "separation",
        }
    }
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Non-fatal conditions raised while cleaning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PipelineWarning {
    /// Decomposition failed; the filtered signal was kept
    SeparationFallback { reason: String },
    /// Every component exceeded the rejection threshold; separation was skipped
    AllComponentsRejected { components: usize },
    /// Nothing to separate on a single channel
    SingleChannel,
}

impl fmt::Display for PipelineWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineWarning::SeparationFallback { reason } => {
                write!(f, "separation failed, kept filtered signal: {}", reason)
            }
            PipelineWarning::AllComponentsRejected { components } => {
                write!(f, "all {} components rejected, separation skipped", components)
            }
            PipelineWarning::SingleChannel => write!(f, "single channel, separation skipped"),
        }
    }
}

/// What a step hands back to the pipeline
#[derive(Debug, Clone)]
pub struct StepOutput {
    pub signal: Signal,
    /// Parameters only known after running (component counts, rejected indices)
    pub parameters: StepParameters,
    pub warnings: Vec<PipelineWarning>,
}

impl StepOutput {
    pub fn new(signal: Signal) -> Self {
        Self {
            signal,
            parameters: StepParameters::new(),
            warnings: Vec::new(),
        }
    }
}

/// Parameter value types recorded with each step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterValue {
    Float(f64),
    Integer(i64),
    Boolean(bool),
    String(String),
    FloatArray(Vec<f64>),
    IntegerArray(Vec<i64>),
    /// Optional parameter that was disabled
    Unset,
}

impl ParameterValue {
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParameterValue::Float(v) => Some(*v),
            ParameterValue::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParameterValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParameterValue::Boolean(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Float(v) => write!(f, "{}", v),
            ParameterValue::Integer(v) => write!(f, "{}", v),
            ParameterValue::Boolean(v) => write!(f, "{}", v),
            ParameterValue::String(v) => f.write_str(v),
            ParameterValue::FloatArray(v) => write!(f, "{:?}", v),
            ParameterValue::IntegerArray(v) => write!(f, "{:?}", v),
            ParameterValue::Unset => f.write_str("off"),
        }
    }
}

impl From<f64> for ParameterValue {
    fn from(value: f64) -> Self {
        ParameterValue::Float(value)
    }
}

impl From<usize> for ParameterValue {
    fn from(value: usize) -> Self {
        ParameterValue::Integer(value as i64)
    }
}

impl From<u64> for ParameterValue {
    fn from(value: u64) -> Self {
        ParameterValue::Integer(value as i64)
    }
}

impl From<bool> for ParameterValue {
    fn from(value: bool) -> Self {
        ParameterValue::Boolean(value)
    }
}

impl From<String> for ParameterValue {
    fn from(value: String) -> Self {
        ParameterValue::String(value)
    }
}

impl From<&str> for ParameterValue {
    fn from(value: &str) -> Self {
        ParameterValue::String(value.to_string())
    }
}

impl From<Vec<f64>> for ParameterValue {
    fn from(value: Vec<f64>) -> Self {
        ParameterValue::FloatArray(value)
    }
}

impl From<Vec<usize>> for ParameterValue {
    fn from(value: Vec<usize>) -> Self {
        ParameterValue::IntegerArray(value.into_iter().map(|v| v as i64).collect())
    }
}

impl<T: Into<ParameterValue>> From<Option<T>> for ParameterValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(ParameterValue::Unset, Into::into)
    }
}

/// Ordered list of named parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepParameters {
    entries: Vec<(String, ParameterValue)>,
}

impl StepParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter, replacing any earlier value under the same key
    pub fn set_parameter(&mut self, key: &str, value: ParameterValue) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key.to_string(), value)),
        }
    }

    pub fn get_parameter(&self, key: &str) -> Option<&ParameterValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_float(&self, key: &str, default: f64) -> f64 {
        self.get_parameter(key).and_then(ParameterValue::as_float).unwrap_or(default)
    }

    pub fn get_int(&self, key: &str, default: i64) -> i64 {
        self.get_parameter(key).and_then(ParameterValue::as_int).unwrap_or(default)
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get_parameter(key).and_then(ParameterValue::as_bool).unwrap_or(default)
    }

    pub fn extend(&mut self, other: StepParameters) {
        for (key, value) in other.entries {
            self.set_parameter(&key, value);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParameterValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Macro for easy parameter setting
#[macro_export]
macro_rules! set_params {
    ($params:expr, $($key:expr => $value:expr),+ $(,)?) => {
        $(
            $params.set_parameter($key, $value.into());
        )+
    };
}

/// Wall-clock duration and parameters of one executed step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepTiming {
    pub step: PipelineStep,
    pub elapsed: Duration,
    pub parameters: StepParameters,
}

impl StepTiming {
    pub fn elapsed_us(&self) -> u64 {
        self.elapsed.as_micros() as u64
    }

    /// Start timing a step
    pub fn start(step: PipelineStep, parameters: StepParameters) -> StepTimer {
        StepTimer {
            start_time: Instant::now(),
            step,
            parameters,
        }
    }
}

/// Helper for timing pipeline steps
pub struct StepTimer {
    start_time: Instant,
    step: PipelineStep,
    parameters: StepParameters,
}

impl StepTimer {
    pub fn record(&mut self, parameters: StepParameters) {
        self.parameters.extend(parameters);
    }

    pub fn finish(self) -> StepTiming {
        StepTiming {
            step: self.step,
            elapsed: self.start_time.elapsed(),
            parameters: self.parameters,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_parameters() {
        let mut params = StepParameters::new();
        set_params!(params,
            "low_cutoff" => 1.0,
            "order" => 5usize,
            "fallback" => false,
            "notch" => None::<f64>,
        );
        params.set_parameter("order", 4usize.into());

        assert_eq!(params.len(), 4);
        assert_eq!(params.get_float("low_cutoff", 0.0), 1.0);
        assert_eq!(params.get_int("order", 0), 4);
        assert!(!params.get_bool("fallback", true));
        assert_eq!(params.get_parameter("notch"), Some(&ParameterValue::Unset));

        let keys: Vec<&str> = params.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["low_cutoff", "order", "fallback", "notch"]);
    }

    #[test]
    fn test_step_timer() {
        let mut timer = StepTiming::start(PipelineStep::Filter, StepParameters::new());
        std::thread::sleep(Duration::from_millis(1));
        let mut extra = StepParameters::new();
        extra.set_parameter("components", 2usize.into());
        timer.record(extra);
        let timing = timer.finish();

        assert_eq!(timing.step, PipelineStep::Filter);
        assert!(timing.elapsed_us() >= 1000);
        assert_eq!(timing.parameters.get_int("components", 0), 2);
    }

    #[test]
    fn test_parameter_value_conversions() {
        assert_eq!(ParameterValue::Integer(42).as_float(), Some(42.0));
        assert_eq!(ParameterValue::Float(3.5).as_int(), None);
        assert_eq!(ParameterValue::from(vec![0usize, 2]), ParameterValue::IntegerArray(vec![0, 2]));
        assert_eq!(ParameterValue::from(Some(50.0)).to_string(), "50");
        assert_eq!(ParameterValue::Unset.to_string(), "off");
    }

    #[test]
    fn test_warning_display() {
        let warning = PipelineWarning::AllComponentsRejected { components: 3 };
        assert!(warning.to_string().contains("all 3 components"));
        assert_eq!(PipelineStep::Separation.to_string(), "separation");
    }
}

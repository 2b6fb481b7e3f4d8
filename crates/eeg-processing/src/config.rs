//! Engine configuration and presets

use crate::detector::DetectorConfig;
use crate::evaluator::EvaluatorConfig;
use crate::filters::FilterSpec;
use crate::separator::SeparatorConfig;
use eeg_core::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Everything one [`CleaningEngine`](crate::engine::CleaningEngine) needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Configuration name
    pub name: String,
    /// Filter used when a run does not supply its own
    pub filter: FilterSpec,
    pub separator: SeparatorConfig,
    pub detector: DetectorConfig,
    pub evaluator: EvaluatorConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::eeg_default()
    }
}

impl EngineConfig {
    /// 1-40 Hz order 5 band-pass, 50 Hz notch, 3x median rejection
    pub fn eeg_default() -> Self {
        Self {
            name: "EEG default".to_string(),
            filter: FilterSpec::default(),
            separator: SeparatorConfig::default(),
            detector: DetectorConfig::default(),
            evaluator: EvaluatorConfig::default(),
        }
    }

    /// Gentler roll-off and fewer rejected components
    pub fn conservative() -> Self {
        Self {
            name: "Conservative".to_string(),
            filter: FilterSpec::default().with_order(4),
            separator: SeparatorConfig {
                rejection_ratio: 4.0,
                ..SeparatorConfig::default()
            },
            ..Self::eeg_default()
        }
    }

    /// Checks that do not depend on the recording's sampling rate
    pub fn validate(&self) -> EngineResult<()> {
        let f = &self.filter;
        if f.order == 0 {
            return Err(config_error("filter order must be at least 1"));
        }
        if !(f.low_cutoff.is_finite() && f.high_cutoff.is_finite()) || f.low_cutoff <= 0.0 {
            return Err(config_error(format!(
                "filter cutoffs must be finite and positive, got {} and {}",
                f.low_cutoff, f.high_cutoff
            )));
        }
        if f.low_cutoff >= f.high_cutoff {
            return Err(config_error(format!(
                "low cutoff {} Hz must be below high cutoff {} Hz",
                f.low_cutoff, f.high_cutoff
            )));
        }
        if let Some(freq) = f.notch_freq {
            if !(freq.is_finite() && freq > 0.0) {
                return Err(config_error(format!("notch frequency must be positive, got {}", freq)));
            }
        }
        if !(f.notch_q.is_finite() && f.notch_q > 0.0) {
            return Err(config_error(format!("notch Q must be positive, got {}", f.notch_q)));
        }

        self.separator.validate()?;
        self.detector
            .validate()
            .map_err(|e| config_error(format!("detector: {}", e)))?;
        self.evaluator.validate()?;
        Ok(())
    }

    pub fn to_json(&self) -> EngineResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| config_error(format!("failed to serialize configuration: {}", e)))
    }

    /// Parse and validate
    pub fn from_json(json: &str) -> EngineResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| config_error(format!("failed to parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> EngineResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

fn config_error(reason: impl Into<String>) -> EngineError {
    EngineError::Config { reason: reason.into() }
}

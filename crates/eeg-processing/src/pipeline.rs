//! Cleaning pipeline: filter bank followed by component separation

use crate::filters::{FilterSpec, FilterStage};
use crate::processor::{CleaningStep, PipelineStep, PipelineWarning, StepParameters, StepTiming};
use crate::separator::{ArtefactSeparator, SeparatorConfig};
use eeg_core::{EngineResult, Signal};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, info_span, warn};

/// Ordered step timings of one run plus any warnings raised on the way
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepTimings {
    pub steps: Vec<StepTiming>,
    pub warnings: Vec<PipelineWarning>,
}

impl StepTimings {
    pub fn total(&self) -> Duration {
        self.steps.iter().map(|s| s.elapsed).sum()
    }

    pub fn get(&self, step: PipelineStep) -> Option<&StepTiming> {
        self.steps.iter().find(|s| s.step == step)
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// True when separation failed and the filtered signal was kept
    pub fn separation_fell_back(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| matches!(w, PipelineWarning::SeparationFallback { .. }))
    }
}

/// Runs the filter bank, then the separator, on a raw recording
#[derive(Debug, Clone, Default)]
pub struct CleaningPipeline {
    separator: ArtefactSeparator,
}

impl CleaningPipeline {
    pub fn new(separator: SeparatorConfig) -> EngineResult<Self> {
        Ok(Self {
            separator: ArtefactSeparator::new(separator)?,
        })
    }

    pub fn separator_config(&self) -> &SeparatorConfig {
        self.separator.config()
    }

    /// Clean `raw`; nothing is kept on failure
    pub fn run(&self, raw: &Signal, spec: &FilterSpec) -> EngineResult<(Signal, StepTimings)> {
        let span = info_span!(
            "cleaning_pipeline",
            signal = %raw.id(),
            channels = raw.channel_count(),
            samples = raw.samples_per_channel()
        );
        let _guard = span.enter();

        let filter = FilterStage::new(*spec);
        let steps: [&dyn CleaningStep; 2] = [&filter, &self.separator];

        let mut current = raw.clone();
        let mut timings = StepTimings::default();

        for step in steps {
            let mut timer = StepTiming::start(step.step(), step.parameters());

            match step.process(&current) {
                Ok(output) => {
                    timer.record(output.parameters);
                    timings.warnings.extend(output.warnings);
                    current = output.signal;
                }
                Err(err) if err.is_recoverable() => {
                    warn!(step = step.name(), error = %err, "step failed, keeping previous output");
                    let mut fallback = StepParameters::new();
                    fallback.set_parameter("fallback", true.into());
                    timer.record(fallback);
                    timings.warnings.push(PipelineWarning::SeparationFallback {
                        reason: err.to_string(),
                    });
                }
                Err(err) => return Err(err),
            }

            let timing = timer.finish();
            info!(step = step.name(), elapsed_us = timing.elapsed_us(), "step complete");
            timings.steps.push(timing);
        }

        Ok((current, timings))
    }
}

//! EEG-Processing: cleaning pipeline and evaluation for EEG recordings
//!
//! Zero-phase band-pass and notch filtering, component-based artefact removal,
//! artefact event detection, time-range revert, and multi-metric scoring of the
//! result. [`CleaningEngine`] ties these together for one recording.

pub mod processor;
pub mod filters;
pub mod spectrum;
pub mod separator;
pub mod detector;
pub mod segments;
pub mod pipeline;
pub mod evaluator;
pub mod report;
pub mod analysis;
pub mod config;
pub mod engine;

pub use processor::{
    CleaningStep, ParameterValue, PipelineStep, PipelineWarning, StepOutput, StepParameters, StepTiming,
};
pub use filters::{BiquadSection, ButterworthFilter, FilterBank, FilterSpec, NotchFilter, SosCascade};
pub use spectrum::{periodogram, welch_psd, PowerSpectrum, WelchEstimator};
pub use separator::{ArtefactSeparator, Component, SeparationOutcome, SeparatorConfig};
pub use detector::{count_by_kind, ArtefactDetector, ArtefactEvent, ArtefactKind, ArtefactSummary, DetectorConfig};
pub use segments::{Segment, SegmentRevertManager, SegmentState};
pub use pipeline::{CleaningPipeline, StepTimings};
pub use evaluator::{
    DataInfo, EvaluationResult, EvaluatorConfig, FilterScoreWeights, HealthStatus, HealthThresholds, PerformanceRating,
    PipelineEvaluator, ScoreWeights,
};
pub use report::{generate_evaluation_report, EvaluationReport};
pub use analysis::{AnalysisReport, BandPower, EegAnalyzer, EegBand, Indicator, IndicatorKind};
pub use config::EngineConfig;
pub use engine::{CleaningEngine, PipelineResult};

pub use eeg_core::{load, EngineError, EngineResult, Signal};

//! Single-recording cleaning session
//!
//! [`CleaningEngine`] is the entry point for interactive callers. It runs the
//! pipeline, keeps the most recent successful result as the active session, and
//! routes revert, re-apply, evaluation and export through it. Callers only ever
//! see the session through shared references.

use crate::analysis::{AnalysisReport, EegAnalyzer};
use crate::config::EngineConfig;
use crate::detector::{ArtefactDetector, ArtefactEvent, DetectorConfig};
use crate::evaluator::{EvaluationResult, PipelineEvaluator};
use crate::filters::FilterSpec;
use crate::pipeline::{CleaningPipeline, StepTimings};
use crate::report::generate_evaluation_report;
use crate::segments::{Segment, SegmentRevertManager, SegmentState};
use eeg_core::{write_csv, write_npy, EngineError, EngineResult, Signal, SignalInput};
use ndarray::Array2;
use std::path::Path;
use tracing::info;
use uuid::Uuid;

/// Outcome of one successful pipeline run plus its revert state
#[derive(Debug, Clone)]
pub struct PipelineResult {
    run_id: Uuid,
    spec: FilterSpec,
    segments: SegmentRevertManager,
    timings: StepTimings,
}

impl PipelineResult {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn spec(&self) -> &FilterSpec {
        &self.spec
    }

    pub fn raw(&self) -> &Signal {
        self.segments.raw()
    }

    /// Pipeline output before any revert
    pub fn cleaned(&self) -> &Signal {
        self.segments.cleaned()
    }

    /// Cleaned data with reverted ranges swapped back to raw
    pub fn current_signal(&self) -> EngineResult<Signal> {
        self.segments.current()
    }

    pub fn current_data(&self) -> &Array2<f64> {
        self.segments.current_data()
    }

    pub fn timings(&self) -> &StepTimings {
        &self.timings
    }

    pub fn segments(&self) -> &[Segment] {
        self.segments.segments()
    }

    pub fn state_at(&self, t: f64) -> Option<SegmentState> {
        self.segments.state_at(t)
    }

    pub fn sample_at(&self, channel: usize, t: f64) -> EngineResult<f64> {
        self.segments.sample_at(channel, t)
    }
}

pub struct CleaningEngine {
    config: EngineConfig,
    pipeline: CleaningPipeline,
    evaluator: PipelineEvaluator,
    analyzer: EegAnalyzer,
    session: Option<PipelineResult>,
}

impl CleaningEngine {
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        let pipeline = CleaningPipeline::new(config.separator)?;
        let evaluator = PipelineEvaluator::new(config.evaluator.clone())?;
        Ok(Self {
            analyzer: EegAnalyzer::new(evaluator.clone()),
            config,
            pipeline,
            evaluator,
            session: None,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Validate raw samples into a [`Signal`]
    pub fn load(&self, raw_samples: impl Into<SignalInput>, sampling_rate: f64) -> EngineResult<Signal> {
        eeg_core::load(raw_samples, sampling_rate)
    }

    /// Clean `signal` and make the result the active session.
    ///
    /// A failed run leaves the previous session untouched.
    pub fn run_pipeline(&mut self, signal: Signal, spec: FilterSpec) -> EngineResult<&PipelineResult> {
        let (cleaned, timings) = self.pipeline.run(&signal, &spec)?;
        let segments = SegmentRevertManager::new(signal, cleaned)?;
        let run_id = Uuid::new_v4();

        info!(
            %run_id,
            total_us = timings.total().as_micros() as u64,
            warnings = timings.warnings.len(),
            "pipeline run complete"
        );

        Ok(&*self.session.insert(PipelineResult {
            run_id,
            spec,
            segments,
            timings,
        }))
    }

    /// Run with the configured filter
    pub fn run_default(&mut self, signal: Signal) -> EngineResult<&PipelineResult> {
        let spec = self.config.filter;
        self.run_pipeline(signal, spec)
    }

    pub fn session(&self) -> Option<&PipelineResult> {
        self.session.as_ref()
    }

    fn active(&self) -> EngineResult<&PipelineResult> {
        self.session.as_ref().ok_or(EngineError::NoActiveSession)
    }

    fn active_mut(&mut self) -> EngineResult<&mut PipelineResult> {
        self.session.as_mut().ok_or(EngineError::NoActiveSession)
    }

    /// Show raw data in `[start, end)` seconds
    pub fn revert(&mut self, start: f64, end: f64) -> EngineResult<()> {
        let session = self.active_mut()?;
        session.segments.revert(start, end)?;
        info!(run_id = %session.run_id, start, end, "range reverted");
        Ok(())
    }

    /// Show cleaned data in `[start, end)` seconds
    pub fn reapply(&mut self, start: f64, end: f64) -> EngineResult<()> {
        let session = self.active_mut()?;
        session.segments.reapply(start, end)?;
        info!(run_id = %session.run_id, start, end, "range re-applied");
        Ok(())
    }

    pub fn current(&self) -> EngineResult<Signal> {
        self.active()?.current_signal()
    }

    pub fn sample_at(&self, channel: usize, t: f64) -> EngineResult<f64> {
        self.active()?.sample_at(channel, t)
    }

    /// Score the active session's current view against its raw input
    pub fn evaluate(&self) -> EngineResult<EvaluationResult> {
        self.evaluate_result(self.active()?)
    }

    pub fn evaluate_result(&self, result: &PipelineResult) -> EngineResult<EvaluationResult> {
        let current = result.current_signal()?;
        let evaluation = self.evaluator.evaluate(result.raw(), &current, result.timings())?;
        info!(run_id = %result.run_id, overall = evaluation.overall_score, "evaluation complete");
        Ok(evaluation)
    }

    pub fn evaluate_report(&self, result: &EvaluationResult) -> String {
        generate_evaluation_report(result)
    }

    /// Events in any signal under an explicit threshold configuration
    pub fn detect_events(&self, signal: &Signal, config: DetectorConfig) -> EngineResult<Vec<ArtefactEvent>> {
        ArtefactDetector::new(config)?.detect(signal)
    }

    /// Events in the active session's current view using the configured thresholds
    pub fn detect_current_events(&self) -> EngineResult<Vec<ArtefactEvent>> {
        let current = self.current()?;
        self.detect_events(&current, self.config.detector.clone())
    }

    pub fn analyze(&self) -> EngineResult<AnalysisReport> {
        let session = self.active()?;
        self.analyzer.analyze(session.raw(), &session.current_signal()?)
    }

    pub fn export_npy(&self, path: impl AsRef<Path>) -> EngineResult<()> {
        write_npy(&self.current()?, path)
    }

    pub fn export_csv(&self, path: impl AsRef<Path>) -> EngineResult<()> {
        write_csv(&self.current()?, path)
    }
}

impl Default for CleaningEngine {
    fn default() -> Self {
        Self {
            config: EngineConfig::default(),
            pipeline: CleaningPipeline::default(),
            evaluator: PipelineEvaluator::default(),
            analyzer: EegAnalyzer::default(),
            session: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::{ParameterValue, PipelineStep};
    use crate::spectrum::periodogram;
    use eeg_core::{read_csv, read_npy};
    use eeg_simulation::{EegSimConfig, EegSimulator};

    fn scenario() -> Signal {
        EegSimulator::new(EegSimConfig::blink_scenario())
            .and_then(|mut sim| sim.generate())
            .unwrap()
    }

    fn line_power(signal: &Signal, channel: usize) -> f64 {
        let data = signal.channel(channel).unwrap().to_vec();
        periodogram(&data, signal.sampling_rate()).unwrap().band_power(48.0, 52.0)
    }

    fn cleaned_engine() -> CleaningEngine {
        let mut engine = CleaningEngine::default();
        engine.run_default(scenario()).unwrap();
        engine
    }

    #[test]
    fn test_line_noise_attenuated() {
        let engine = cleaned_engine();
        let raw = engine.session().unwrap().raw().clone();
        let current = engine.current().unwrap();
        for ch in 0..2 {
            assert!(
                line_power(&current, ch) * 10.0 <= line_power(&raw, ch),
                "channel {} line power not attenuated",
                ch
            );
        }
    }

    #[test]
    fn test_blinks_do_not_increase() {
        let engine = cleaned_engine();
        let raw = engine.session().unwrap().raw().clone();

        let raw_events = engine.detect_events(&raw, DetectorConfig::default()).unwrap();
        let current_events = engine.detect_current_events().unwrap();
        assert!(!raw_events.is_empty());
        assert!(current_events.len() <= raw_events.len());
    }

    #[test]
    fn test_cleaning_scores_above_unfiltered() {
        let engine = cleaned_engine();
        let raw = engine.session().unwrap().raw().clone();

        let cleaned = engine.evaluate().unwrap();
        let unfiltered = PipelineEvaluator::default()
            .evaluate(&raw, &raw, &StepTimings::default())
            .unwrap();
        assert!(cleaned.overall_score > unfiltered.overall_score);

        let report = engine.evaluate_report(&cleaned);
        assert!(report.contains(&format!("{:.1}/100", cleaned.overall_score)));
    }

    #[test]
    fn test_reverted_range_shows_raw() {
        let mut engine = cleaned_engine();
        engine.revert(2.0, 4.0).unwrap();

        let session = engine.session().unwrap();
        for ch in 0..2 {
            let raw = session.raw().value_at(ch, 3.0).unwrap();
            assert_eq!(engine.sample_at(ch, 3.0).unwrap(), raw);
            let cleaned = session.cleaned().value_at(ch, 5.0).unwrap();
            assert_eq!(engine.sample_at(ch, 5.0).unwrap(), cleaned);
        }
        assert_eq!(session.state_at(3.0), Some(SegmentState::Reverted));
    }

    #[test]
    fn test_revert_then_reapply_is_identical() {
        let mut engine = cleaned_engine();
        let before = engine.session().unwrap().current_data().clone();

        engine.revert(2.0, 4.0).unwrap();
        assert_ne!(engine.session().unwrap().current_data(), &before);
        engine.reapply(2.0, 4.0).unwrap();

        let after = engine.session().unwrap().current_data();
        assert!(after.iter().zip(before.iter()).all(|(a, b)| a.to_bits() == b.to_bits()));
        assert_eq!(engine.session().unwrap().segments().len(), 1);
    }

    #[test]
    fn test_superset_revert_matches_direct() {
        let mut nested = cleaned_engine();
        nested.revert(2.0, 4.0).unwrap();
        nested.revert(1.0, 5.0).unwrap();

        let mut direct = cleaned_engine();
        direct.revert(1.0, 5.0).unwrap();

        let (a, b) = (nested.session().unwrap(), direct.session().unwrap());
        assert_eq!(a.segments(), b.segments());
        assert_eq!(a.current_data(), b.current_data());
    }

    #[test]
    fn test_no_session_errors() {
        let mut engine = CleaningEngine::default();
        assert!(matches!(engine.revert(0.0, 1.0), Err(EngineError::NoActiveSession)));
        assert!(matches!(engine.reapply(0.0, 1.0), Err(EngineError::NoActiveSession)));
        assert!(matches!(engine.evaluate(), Err(EngineError::NoActiveSession)));
        assert!(matches!(engine.current(), Err(EngineError::NoActiveSession)));
    }

    #[test]
    fn test_failed_run_keeps_session() {
        let mut engine = cleaned_engine();
        let run_id = engine.session().unwrap().run_id();

        let bad = FilterSpec::bandpass(30.0, 10.0, 4);
        assert!(matches!(
            engine.run_pipeline(scenario(), bad),
            Err(EngineError::InvalidFilterSpec { .. })
        ));
        assert_eq!(engine.session().unwrap().run_id(), run_id);

        let next = engine.run_pipeline(scenario(), FilterSpec::default()).unwrap().run_id();
        assert_ne!(next, run_id);
    }

    #[test]
    fn test_analysis_of_session() {
        let engine = cleaned_engine();
        let report = engine.analyze().unwrap();
        let dominant = report.dominant_band.unwrap();
        assert!(report.summary_text().contains(dominant.name()));
        assert!(report.band_percent(crate::analysis::EegBand::Alpha) > 0.0);
        assert!(report.snr_improvement_db.is_finite());
    }

    #[test]
    fn test_export_round_trip() {
        let mut engine = cleaned_engine();
        engine.revert(1.0, 2.0).unwrap();
        let current = engine.current().unwrap();
        let dir = tempfile::tempdir().unwrap();

        let npy = dir.path().join("cleaned.npy");
        engine.export_npy(&npy).unwrap();
        assert!(read_npy(&npy, 256.0).unwrap().same_samples(&current));

        let csv = dir.path().join("cleaned.csv");
        engine.export_csv(&csv).unwrap();
        let restored = read_csv(&csv, 256.0).unwrap();
        assert_eq!(restored.data().dim(), current.data().dim());
    }

    /// Three in-band rhythms and a sparse pulse train mixed onto four channels
    fn pulse_mixture() -> Signal {
        let mixing = [
            [1.0, 0.3, 0.2, 1.0],
            [0.4, 1.0, 0.3, 0.6],
            [0.2, 0.5, 1.0, 0.3],
            [0.6, 0.2, 0.4, 0.1],
        ];
        let sources: Vec<Vec<f64>> = vec![
            (0..2560).map(|i| 10.0 * (2.0 * std::f64::consts::PI * 10.0 * i as f64 / 256.0).sin()).collect(),
            (0..2560).map(|i| 8.0 * (2.0 * std::f64::consts::PI * 6.0 * i as f64 / 256.0).sin()).collect(),
            (0..2560).map(|i| 6.0 * (2.0 * std::f64::consts::PI * 17.0 * i as f64 / 256.0).sin()).collect(),
            (0..2560)
                .map(|i| if [400, 1300, 2100].iter().any(|&s| (s..s + 20).contains(&i)) { 80.0 } else { 0.0 })
                .collect(),
        ];
        let channels: Vec<Vec<f64>> = mixing
            .iter()
            .map(|row| (0..2560).map(|i| row.iter().zip(&sources).map(|(w, s)| w * s[i]).sum()).collect())
            .collect();
        eeg_core::load(channels, 256.0).unwrap()
    }

    #[test]
    fn test_multichannel_run_rejects_pulse_component() {
        let mut engine = CleaningEngine::default();
        let raw = pulse_mixture();
        let result = engine.run_default(raw.clone()).unwrap();

        let separation = result.timings().get(PipelineStep::Separation).unwrap();
        assert_eq!(separation.parameters.get_int("components", 0), 4);
        match separation.parameters.get_parameter("rejected") {
            Some(ParameterValue::IntegerArray(rejected)) => assert!(!rejected.is_empty() && rejected.len() < 4),
            other => panic!("expected rejected indices, got {:?}", other),
        }
        assert!(!separation.parameters.get_bool("fallback", true));
        assert!(result.timings().warnings.is_empty());

        let window = |data: &Array2<f64>| (1290..1330).fold(0.0_f64, |m, i| m.max(data[[0, i]].abs()));
        assert!(window(result.current_data()) < 0.5 * window(raw.data()));
    }

    #[test]
    fn test_minimal_length_recordings() {
        let mut engine = CleaningEngine::default();
        let detector = engine.config().detector.clone();

        let two = engine.load(vec![0.0, 1.0], 256.0).unwrap();
        assert!(engine.detect_events(&two, detector.clone()).unwrap().is_empty());
        let three = engine.load(vec![0.0, 100.0, -100.0], 256.0).unwrap();
        assert!(engine.detect_events(&three, detector).is_ok());

        assert!(matches!(
            engine.run_default(three),
            Err(EngineError::InsufficientSamples { actual: 3, max_order: 0, .. })
        ));
        assert!(engine.session().is_none());
    }

    #[test]
    fn test_load_validates() {
        let engine = CleaningEngine::default();
        assert!(engine.load(vec![1.0, f64::NAN], 256.0).is_err());
        assert_eq!(engine.load(vec![vec![0.0; 10]; 3], 256.0).unwrap().channel_count(), 3);
    }
}

//! Frequency-band analysis of a cleaned recording

use crate::detector::{ArtefactDetector, DetectorConfig};
use crate::evaluator::PipelineEvaluator;
use crate::pipeline::StepTimings;
use crate::spectrum::{PowerSpectrum, WelchEstimator};
use eeg_core::stats::std_dev;
use eeg_core::{malformed_input, EngineResult, Signal};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Classical EEG frequency bands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EegBand {
    Delta,
    Theta,
    Alpha,
    Beta,
    Gamma,
}

impl EegBand {
    pub const ALL: [EegBand; 5] = [EegBand::Delta, EegBand::Theta, EegBand::Alpha, EegBand::Beta, EegBand::Gamma];

    /// Inclusive frequency range in Hz
    pub fn range(&self) -> (f64, f64) {
        match self {
            EegBand::Delta => (0.5, 4.0),
            EegBand::Theta => (4.0, 8.0),
            EegBand::Alpha => (8.0, 13.0),
            EegBand::Beta => (13.0, 30.0),
            EegBand::Gamma => (30.0, 45.0),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            EegBand::Delta => "delta",
            EegBand::Theta => "theta",
            EegBand::Alpha => "alpha",
            EegBand::Beta => "beta",
            EegBand::Gamma => "gamma",
        }
    }
}

impl fmt::Display for EegBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandPower {
    pub band: EegBand,
    /// Share of the summed band powers
    pub percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndicatorKind {
    Normal,
    Attention,
    Cognitive,
    Anomaly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Indicator {
    pub kind: IndicatorKind,
    pub description: String,
}

impl Indicator {
    fn new(kind: IndicatorKind, description: &str) -> Self {
        Self {
            kind,
            description: description.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub snr_improvement_db: f64,
    pub noise_reduction: f64,
    pub band_powers: Vec<BandPower>,
    pub dominant_band: Option<EegBand>,
    pub patterns: Vec<String>,
    pub indicators: Vec<Indicator>,
    /// Events still over 3 standard deviations in the cleaned signal
    pub residual_artefacts: usize,
}

impl AnalysisReport {
    pub fn band_percent(&self, band: EegBand) -> f64 {
        self.band_powers
            .iter()
            .find(|b| b.band == band)
            .map_or(0.0, |b| b.percent)
    }

    /// A few sentences summarising the analysis
    pub fn summary_text(&self) -> String {
        let mut parts = vec![format!(
            "Cleaning improved SNR by {:.1} dB and removed {:.1}% of the noise.",
            self.snr_improvement_db, self.noise_reduction
        )];

        if let Some(band) = self.dominant_band {
            parts.push(format!(
                "The {} band dominates with {:.1}% of band power.",
                band,
                self.band_percent(band)
            ));
            let state = match band {
                EegBand::Alpha => Some("Typical of relaxed wakefulness."),
                EegBand::Beta => Some("Consistent with active, focused processing."),
                EegBand::Theta => Some("Often seen with drowsiness or meditation."),
                EegBand::Delta => Some("Slow-wave activity like this is unusual when awake."),
                EegBand::Gamma => None,
            };
            parts.extend(state.map(str::to_string));
        }

        parts.extend(self.indicators.iter().take(2).map(|i| format!("{}.", i.description)));

        if self.residual_artefacts == 0 {
            parts.push("No residual artefacts found.".to_string());
        } else {
            parts.push(format!(
                "{} residual artefact event(s) may need manual review.",
                self.residual_artefacts
            ));
        }
        parts.join(" ")
    }
}

#[derive(Debug, Clone, Default)]
pub struct EegAnalyzer {
    evaluator: PipelineEvaluator,
}

impl EegAnalyzer {
    pub fn new(evaluator: PipelineEvaluator) -> Self {
        Self { evaluator }
    }

    pub fn analyze(&self, raw: &Signal, cleaned: &Signal) -> EngineResult<AnalysisReport> {
        let quality = self.evaluator.evaluate(raw, cleaned, &StepTimings::default())?.quality;

        let psd = pooled_psd(cleaned)?;
        let absolute: Vec<(EegBand, f64)> = EegBand::ALL
            .iter()
            .map(|&band| {
                let (low, high) = band.range();
                (band, psd.band_power(low, high))
            })
            .collect();
        let total: f64 = absolute.iter().map(|(_, p)| p).sum();
        let band_powers: Vec<BandPower> = absolute
            .iter()
            .map(|&(band, power)| BandPower {
                band,
                percent: if total > 0.0 { power / total * 100.0 } else { 0.0 },
            })
            .collect();

        let dominant_band = if total > 0.0 {
            band_powers
                .iter()
                .fold(None::<&BandPower>, |best, b| match best {
                    Some(best) if best.percent >= b.percent => Some(best),
                    _ => Some(b),
                })
                .map(|b| b.band)
        } else {
            None
        };

        let percent = |band: EegBand| band_powers.iter().find(|b| b.band == band).map_or(0.0, |b| b.percent);
        let patterns = patterns(&percent);
        let indicators = indicators(&percent, dominant_band);

        let thresholds: Vec<f64> = cleaned
            .channels()
            .map(|ch| (3.0 * std_dev(&ch.to_vec())).max(f64::MIN_POSITIVE))
            .collect();
        let detector = ArtefactDetector::new(DetectorConfig::amplitude_only(1.0))?;
        let residual_artefacts = detector.detect_with_thresholds(cleaned, &thresholds)?.len();

        debug!(dominant = ?dominant_band, residual_artefacts, "band analysis complete");

        Ok(AnalysisReport {
            snr_improvement_db: quality.snr_improvement_db,
            noise_reduction: quality.noise_reduction.clamp(0.0, 100.0),
            band_powers,
            dominant_band,
            patterns,
            indicators,
            residual_artefacts,
        })
    }
}

fn pooled_psd(signal: &Signal) -> EngineResult<PowerSpectrum> {
    let welch = WelchEstimator::new(256);
    let mut pooled: Option<PowerSpectrum> = None;
    for channel in signal.channels() {
        let psd = welch.estimate(&channel.to_vec(), signal.sampling_rate())?;
        if let Some(acc) = pooled.as_mut() {
            acc.density.iter_mut().zip(&psd.density).for_each(|(a, p)| *a += p);
        } else {
            pooled = Some(psd);
        }
    }
    pooled.ok_or_else(|| malformed_input!("signal has no channels"))
}

fn patterns(percent: &dyn Fn(EegBand) -> f64) -> Vec<String> {
    let rules = [
        (EegBand::Alpha, 40.0, "strong_alpha_rhythm"),
        (EegBand::Theta, 30.0, "elevated_theta"),
        (EegBand::Beta, 35.0, "high_beta_activity"),
        (EegBand::Delta, 40.0, "elevated_delta"),
    ];
    rules
        .iter()
        .filter(|(band, limit, _)| percent(*band) > *limit)
        .map(|(_, _, name)| name.to_string())
        .collect()
}

fn indicators(percent: &dyn Fn(EegBand) -> f64, dominant: Option<EegBand>) -> Vec<Indicator> {
    let mut found = Vec::new();
    let alpha = percent(EegBand::Alpha);

    if dominant == Some(EegBand::Alpha) && alpha > 35.0 {
        found.push(Indicator::new(IndicatorKind::Normal, "Resting state with a strong alpha rhythm"));
    }
    if dominant == Some(EegBand::Theta) {
        found.push(Indicator::new(
            IndicatorKind::Attention,
            "Theta dominance can reflect drowsiness or deep concentration",
        ));
    }
    if dominant == Some(EegBand::Beta) && percent(EegBand::Beta) > 40.0 {
        found.push(Indicator::new(IndicatorKind::Cognitive, "Strong beta activity points to active thinking"));
    }
    if percent(EegBand::Delta) > 45.0 {
        found.push(Indicator::new(
            IndicatorKind::Anomaly,
            "Delta power this high while awake may warrant a closer look",
        ));
    }
    if alpha < 15.0 {
        found.push(Indicator::new(IndicatorKind::Attention, "Low alpha power can accompany alertness or anxiety"));
    }
    if percent(EegBand::Gamma) > 15.0 {
        found.push(Indicator::new(IndicatorKind::Cognitive, "Marked gamma activity during complex processing"));
    }
    found
}

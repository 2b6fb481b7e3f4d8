//! Quantitative comparison of a raw recording with its cleaned version

use crate::detector::{ArtefactDetector, ArtefactEvent, DetectorConfig};
use crate::filters::FilterSpec;
use crate::pipeline::StepTimings;
use crate::processor::PipelineStep;
use crate::spectrum::{periodogram, PowerSpectrum, WelchEstimator};
use eeg_core::stats::{pearson, pearson_p_value, rmse, std_dev, ChannelStats, Moments};
use eeg_core::{malformed_input, EngineError, EngineResult, Signal};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

const EPSILON: f64 = 1e-12;

/// Weights of the group scores in the overall score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub quality: f64,
    pub filter: f64,
    pub frequency: f64,
    pub artefact: f64,
    pub statistical: f64,
    pub health: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            quality: 0.30,
            filter: 0.25,
            frequency: 0.15,
            artefact: 0.15,
            statistical: 0.10,
            health: 0.05,
        }
    }
}

impl ScoreWeights {
    pub fn sum(&self) -> f64 {
        self.quality + self.filter + self.frequency + self.artefact + self.statistical + self.health
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterScoreWeights {
    pub out_of_band: f64,
    pub in_band: f64,
    pub notch: f64,
}

impl Default for FilterScoreWeights {
    fn default() -> Self {
        Self {
            out_of_band: 1.0 / 3.0,
            in_band: 1.0 / 3.0,
            notch: 1.0 / 3.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthThresholds {
    /// Fraction of samples sitting at a channel's extreme values
    pub clipping_fraction: f64,
    /// In-band power retained below this fraction is over-filtering
    pub min_in_band_retained: f64,
    /// Line-band share of total power above this fraction is under-filtering
    pub max_line_fraction: f64,
    pub issue_penalty: f64,
    pub warning_penalty: f64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            clipping_fraction: 0.01,
            min_in_band_retained: 0.5,
            max_line_fraction: 0.05,
            issue_penalty: 20.0,
            warning_penalty: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatorConfig {
    pub weights: ScoreWeights,
    pub filter_weights: FilterScoreWeights,
    pub health: HealthThresholds,
    /// Artefact threshold as a multiple of the raw channel's standard deviation
    pub artefact_k: f64,
    /// Samples per second that count as 100 % efficiency
    pub reference_rate: f64,
    /// Half-width of the line band around the notch frequency (Hz)
    pub notch_halfwidth: f64,
    /// Line frequency assumed when the run had the notch disabled
    pub line_frequency: f64,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            weights: ScoreWeights::default(),
            filter_weights: FilterScoreWeights::default(),
            health: HealthThresholds::default(),
            artefact_k: 3.0,
            reference_rate: 100_000.0,
            notch_halfwidth: 2.0,
            line_frequency: 50.0,
        }
    }
}

impl EvaluatorConfig {
    pub fn validate(&self) -> EngineResult<()> {
        let w = &self.weights;
        let weights = [w.quality, w.filter, w.frequency, w.artefact, w.statistical, w.health];
        if weights.iter().any(|v| !v.is_finite() || *v < 0.0) || w.sum() <= 0.0 {
            return Err(EngineError::Config {
                reason: "score weights must be non-negative with a positive sum".to_string(),
            });
        }
        let f = &self.filter_weights;
        if [f.out_of_band, f.in_band, f.notch].iter().any(|v| !v.is_finite() || *v < 0.0)
            || f.out_of_band + f.in_band + f.notch <= 0.0
        {
            return Err(EngineError::Config {
                reason: "filter score weights must be non-negative with a positive sum".to_string(),
            });
        }
        if !(self.artefact_k > 0.0 && self.reference_rate > 0.0 && self.notch_halfwidth > 0.0) {
            return Err(EngineError::Config {
                reason: "artefact k, reference rate and notch half-width must be positive".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PerformanceRating {
    Excellent,
    Good,
    Moderate,
    Poor,
}

impl PerformanceRating {
    /// Bands a 0-100 score at 80, 60 and 40
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            PerformanceRating::Excellent
        } else if score >= 60.0 {
            PerformanceRating::Good
        } else if score >= 40.0 {
            PerformanceRating::Moderate
        } else {
            PerformanceRating::Poor
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PerformanceRating::Excellent => "excellent",
            PerformanceRating::Good => "good",
            PerformanceRating::Moderate => "moderate",
            PerformanceRating::Poor => "poor",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Descriptive statistics of both signals, pooled over channels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataInfo {
    pub duration_seconds: f64,
    pub total_samples: usize,
    pub raw: ChannelStats,
    pub current: ChannelStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_time_ms: f64,
    /// `None` when the run took no measurable time
    pub samples_per_second: Option<f64>,
    pub efficiency: f64,
    pub rating: PerformanceRating,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalQualityMetrics {
    pub snr_raw: f64,
    pub snr_current: f64,
    pub snr_improvement_db: f64,
    pub noise_reduction: f64,
    pub correlation: f64,
    pub correlation_p_value: f64,
    pub preservation: f64,
    pub rmse: f64,
    pub dynamic_range_preservation: f64,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterEffectiveness {
    pub out_of_band_reduction: f64,
    pub in_band_preservation: f64,
    pub notch_reduction: f64,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyMetrics {
    pub dominant_raw: f64,
    pub dominant_current: f64,
    pub shift: f64,
    pub power_retained: f64,
    pub spectral_correlation: f64,
    pub stability: f64,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticalMetrics {
    pub variance_ratio: f64,
    pub mean_preservation: f64,
    pub skewness_preservation: f64,
    pub kurtosis_preservation: f64,
    pub integrity_score: f64,
    /// Jarque-Bera p-values of each signal
    pub normality_raw: f64,
    pub normality_current: f64,
    /// Jarque-Bera statistic of `raw - current`
    pub residual_jarque_bera: f64,
    pub residual_gaussian: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtefactMetrics {
    pub raw_count: usize,
    pub current_count: usize,
    pub count_reduction: f64,
    pub peak_reduction: f64,
    pub power_reduction: f64,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthMetrics {
    pub issues: Vec<String>,
    pub warnings: Vec<String>,
    pub score: f64,
    pub status: HealthStatus,
}

/// Every metric group plus the weighted overall score (0-100)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Milliseconds since the Unix epoch
    pub generated_at_ms: u64,
    pub channels: usize,
    pub samples_per_channel: usize,
    pub sampling_rate: f64,
    pub data_info: DataInfo,
    /// Elapsed milliseconds per executed stage, in run order
    pub steps: Vec<(PipelineStep, f64)>,
    pub performance: PerformanceMetrics,
    pub quality: SignalQualityMetrics,
    pub filter: FilterEffectiveness,
    pub frequency: FrequencyMetrics,
    pub statistics: StatisticalMetrics,
    pub artefacts: ArtefactMetrics,
    pub health: HealthMetrics,
    pub overall_score: f64,
    /// Rating of the signal quality score
    pub quality_rating: String,
}

impl EvaluationResult {
    pub fn to_json(&self) -> EngineResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| EngineError::Format {
            reason: format!("failed to serialize evaluation: {}", e),
        })
    }
}

/// Band layout the scores are computed against
#[derive(Debug, Clone, Copy)]
struct Bands {
    low: f64,
    high: f64,
    line: f64,
    halfwidth: f64,
}

impl Bands {
    fn in_line(&self, f: f64) -> bool {
        (f - self.line).abs() <= self.halfwidth
    }

    fn in_band(&self, f: f64) -> bool {
        f >= self.low && f <= self.high && !self.in_line(f)
    }

    fn in_pass(&self, f: f64) -> bool {
        f >= self.low && f <= self.high
    }
}

/// Bin powers summed over channels
#[derive(Debug, Clone, Copy, Default)]
struct BandPowers {
    total: f64,
    in_band: f64,
    noise: f64,
    pass: f64,
    out_of_band: f64,
    line: f64,
}

impl BandPowers {
    fn accumulate(&mut self, psd: &PowerSpectrum, bands: &Bands) {
        for (&f, &p) in psd.frequencies.iter().zip(&psd.density) {
            let power = p * psd.resolution;
            self.total += power;
            if bands.in_band(f) {
                self.in_band += power;
            } else {
                self.noise += power;
            }
            if bands.in_pass(f) {
                self.pass += power;
            } else {
                self.out_of_band += power;
            }
            if bands.in_line(f) {
                self.line += power;
            }
        }
    }
}

/// Relative reduction in percent, 0 when there was nothing to reduce
fn reduction(before: f64, after: f64) -> f64 {
    if before <= EPSILON {
        return 0.0;
    }
    (before - after) / before * 100.0
}

fn preservation(raw: f64, current: f64) -> f64 {
    (1.0 - (current - raw).abs() / (raw.abs() + 1.0)).clamp(0.0, 1.0)
}

#[derive(Debug, Clone, Default)]
pub struct PipelineEvaluator {
    config: EvaluatorConfig,
}

impl PipelineEvaluator {
    pub fn new(config: EvaluatorConfig) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Score `current` against `raw`; neither signal is modified
    pub fn evaluate(&self, raw: &Signal, current: &Signal, timings: &StepTimings) -> EngineResult<EvaluationResult> {
        if raw.data().dim() != current.data().dim() || raw.sampling_rate() != current.sampling_rate() {
            return Err(malformed_input!(
                "cannot compare {:?} at {} Hz with {:?} at {} Hz",
                raw.data().dim(),
                raw.sampling_rate(),
                current.data().dim(),
                current.sampling_rate()
            ));
        }

        let bands = self.bands(timings);
        let fs = raw.sampling_rate();

        let mut raw_powers = BandPowers::default();
        let mut cur_powers = BandPowers::default();
        for (r, c) in raw.channels().zip(current.channels()) {
            raw_powers.accumulate(&periodogram(&r.to_vec(), fs)?, &bands);
            cur_powers.accumulate(&periodogram(&c.to_vec(), fs)?, &bands);
        }

        let raw_flat = raw.flattened();
        let cur_flat = current.flattened();

        let data_info = DataInfo {
            duration_seconds: raw.duration(),
            total_samples: raw.len(),
            raw: ChannelStats::calculate(&raw_flat),
            current: ChannelStats::calculate(&cur_flat),
        };
        let steps = timings
            .steps
            .iter()
            .map(|t| (t.step, t.elapsed.as_secs_f64() * 1000.0))
            .collect();

        let performance = self.performance(raw, timings);
        let quality = self.quality(&raw_flat, &cur_flat, &raw_powers, &cur_powers);
        let filter = self.filter_effectiveness(&raw_powers, &cur_powers);
        let frequency = self.frequency(raw, current)?;
        let statistics = self.statistics(&raw_flat, &cur_flat);
        let artefacts = self.artefacts(raw, current)?;
        let health = self.health(raw, current, &cur_powers, &filter, timings);

        let w = &self.config.weights;
        let overall_score = (w.quality * quality.score
            + w.filter * filter.score
            + w.frequency * frequency.score
            + w.artefact * artefacts.score
            + w.statistical * statistics.integrity_score
            + w.health * health.score)
            / w.sum();

        debug!(
            overall = overall_score,
            quality = quality.score,
            filter = filter.score,
            frequency = frequency.score,
            artefact = artefacts.score,
            "evaluation complete"
        );

        let generated_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_millis() as u64);
        let quality_rating = PerformanceRating::from_score(quality.score).as_str().to_string();

        Ok(EvaluationResult {
            generated_at_ms,
            channels: raw.channel_count(),
            samples_per_channel: raw.samples_per_channel(),
            sampling_rate: fs,
            data_info,
            steps,
            performance,
            quality,
            filter,
            frequency,
            statistics,
            artefacts,
            health,
            overall_score,
            quality_rating,
        })
    }

    /// Pass band and line frequency come from the filter step's recorded parameters
    fn bands(&self, timings: &StepTimings) -> Bands {
        let defaults = FilterSpec::default();
        let params = timings.get(PipelineStep::Filter).map(|t| &t.parameters);
        let low = params.map_or(defaults.low_cutoff, |p| p.get_float("low_cutoff", defaults.low_cutoff));
        let high = params.map_or(defaults.high_cutoff, |p| p.get_float("high_cutoff", defaults.high_cutoff));
        let line = params
            .and_then(|p| p.get_parameter("notch_freq"))
            .and_then(|v| v.as_float())
            .unwrap_or(self.config.line_frequency);

        Bands {
            low,
            high,
            line,
            halfwidth: self.config.notch_halfwidth,
        }
    }

    fn performance(&self, raw: &Signal, timings: &StepTimings) -> PerformanceMetrics {
        let seconds = timings.total().as_secs_f64();
        let (samples_per_second, efficiency) = if seconds > 0.0 {
            let sps = raw.len() as f64 / seconds;
            (Some(sps), (sps / self.config.reference_rate * 100.0).min(100.0))
        } else {
            (None, 100.0)
        };

        PerformanceMetrics {
            total_time_ms: seconds * 1000.0,
            samples_per_second,
            efficiency,
            rating: PerformanceRating::from_score(efficiency),
        }
    }

    fn quality(&self, raw: &[f64], current: &[f64], raw_p: &BandPowers, cur_p: &BandPowers) -> SignalQualityMetrics {
        let snr_raw = raw_p.in_band / (raw_p.noise + EPSILON);
        let snr_current = cur_p.in_band / (cur_p.noise + EPSILON);
        let snr_improvement_db = (10.0 * ((snr_current + EPSILON) / (snr_raw + EPSILON)).log10()).clamp(-50.0, 50.0);
        let noise_reduction = reduction(raw_p.noise, cur_p.noise);
        let correlation = pearson(raw, current);
        let preservation = correlation.abs() * 100.0;

        let ptp = |data: &[f64]| {
            let (min, max) = data
                .iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
            max - min
        };
        let (ptp_raw, ptp_cur) = (ptp(raw), ptp(current));
        let dynamic_range_preservation = if ptp_raw.max(ptp_cur) > 0.0 {
            ptp_raw.min(ptp_cur) / ptp_raw.max(ptp_cur) * 100.0
        } else {
            100.0
        };

        let score = snr_improvement_db.clamp(0.0, 50.0) / 50.0 * 40.0
            + noise_reduction.clamp(0.0, 100.0) / 100.0 * 30.0
            + preservation / 100.0 * 30.0;

        SignalQualityMetrics {
            snr_raw,
            snr_current,
            snr_improvement_db,
            noise_reduction,
            correlation,
            correlation_p_value: pearson_p_value(correlation, raw.len()),
            preservation,
            rmse: rmse(raw, current),
            dynamic_range_preservation,
            score,
        }
    }

    fn filter_effectiveness(&self, raw_p: &BandPowers, cur_p: &BandPowers) -> FilterEffectiveness {
        let out_of_band_reduction = reduction(raw_p.out_of_band, cur_p.out_of_band).clamp(0.0, 100.0);
        let in_band_preservation = if raw_p.pass > EPSILON {
            (cur_p.pass / raw_p.pass * 100.0).min(100.0)
        } else {
            100.0
        };
        let notch_reduction = reduction(raw_p.line, cur_p.line).clamp(0.0, 100.0);

        let w = &self.config.filter_weights;
        let score = (w.out_of_band * out_of_band_reduction + w.in_band * in_band_preservation + w.notch * notch_reduction)
            / (w.out_of_band + w.in_band + w.notch);

        FilterEffectiveness {
            out_of_band_reduction,
            in_band_preservation,
            notch_reduction,
            score,
        }
    }

    fn frequency(&self, raw: &Signal, current: &Signal) -> EngineResult<FrequencyMetrics> {
        let samples = raw.samples_per_channel();
        let welch = WelchEstimator::new((samples / 4).min(256).max(8));
        let fs = raw.sampling_rate();

        let summed = |signal: &Signal| -> EngineResult<PowerSpectrum> {
            let mut total: Option<PowerSpectrum> = None;
            for channel in signal.channels() {
                let psd = welch.estimate(&channel.to_vec(), fs)?;
                if let Some(acc) = total.as_mut() {
                    acc.density.iter_mut().zip(&psd.density).for_each(|(a, p)| *a += p);
                } else {
                    total = Some(psd);
                }
            }
            total.ok_or_else(|| malformed_input!("signal has no channels"))
        };
        let raw_psd = summed(raw)?;
        let cur_psd = summed(current)?;

        // First maximum wins ties
        let dominant = |psd: &PowerSpectrum| {
            let mut best = 0;
            for (i, &p) in psd.density.iter().enumerate() {
                if p > psd.density[best] {
                    best = i;
                }
            }
            psd.frequencies.get(best).copied().unwrap_or(0.0)
        };
        let dominant_raw = dominant(&raw_psd);
        let dominant_current = dominant(&cur_psd);
        let shift = (dominant_current - dominant_raw).abs();

        let raw_total = raw_psd.total_power();
        let power_retained = if raw_total > EPSILON {
            cur_psd.total_power() / raw_total * 100.0
        } else {
            100.0
        };
        let spectral_correlation = pearson(&raw_psd.density, &cur_psd.density);
        let stability = 100.0 - (shift * 10.0).min(100.0);
        let score = 0.5 * stability + 0.5 * spectral_correlation.clamp(0.0, 1.0) * 100.0;

        Ok(FrequencyMetrics {
            dominant_raw,
            dominant_current,
            shift,
            power_retained,
            spectral_correlation,
            stability,
            score,
        })
    }

    fn statistics(&self, raw: &[f64], current: &[f64]) -> StatisticalMetrics {
        let raw_m = Moments::calculate(raw);
        let cur_m = Moments::calculate(current);

        let variance_ratio = if raw_m.variance > EPSILON {
            cur_m.variance / raw_m.variance
        } else {
            1.0
        };
        let mean_preservation = (1.0 - (cur_m.mean - raw_m.mean).abs() / (raw_m.std_dev + EPSILON)).clamp(0.0, 1.0);
        let skewness_preservation = preservation(raw_m.skewness, cur_m.skewness);
        let kurtosis_preservation = preservation(raw_m.kurtosis, cur_m.kurtosis);
        let integrity_score = (mean_preservation + skewness_preservation + kurtosis_preservation) / 3.0 * 100.0;

        let residual: Vec<f64> = raw.iter().zip(current).map(|(r, c)| r - c).collect();
        let residual_jarque_bera = Moments::calculate(&residual).jarque_bera(residual.len());

        StatisticalMetrics {
            variance_ratio,
            mean_preservation,
            skewness_preservation,
            kurtosis_preservation,
            integrity_score,
            normality_raw: raw_m.normality_p_value(raw.len()),
            normality_current: cur_m.normality_p_value(current.len()),
            residual_jarque_bera,
            // chi-squared, 2 dof, 95th percentile
            residual_gaussian: residual_jarque_bera <= 5.991,
        }
    }

    fn artefacts(&self, raw: &Signal, current: &Signal) -> EngineResult<ArtefactMetrics> {
        let thresholds: Vec<f64> = raw
            .channels()
            .map(|ch| (self.config.artefact_k * std_dev(&ch.to_vec())).max(EPSILON))
            .collect();
        let detector = ArtefactDetector::new(DetectorConfig::amplitude_only(1.0))?;
        let raw_events = detector.detect_with_thresholds(raw, &thresholds)?;
        let cur_events = detector.detect_with_thresholds(current, &thresholds)?;

        let peak = |events: &[ArtefactEvent]| events.iter().fold(0.0_f64, |m, e| m.max(e.peak_amplitude));
        let power_above = |signal: &Signal| -> f64 {
            signal
                .channels()
                .zip(&thresholds)
                .map(|(ch, &thr)| ch.iter().filter(|v| v.abs() > thr).map(|v| v * v).sum::<f64>())
                .sum()
        };

        let raw_count = raw_events.len();
        let current_count = cur_events.len();
        let count_reduction = if raw_count > 0 {
            (raw_count as f64 - current_count as f64) / raw_count as f64 * 100.0
        } else {
            0.0
        };
        let peak_reduction = reduction(peak(&raw_events), peak(&cur_events));
        let power_reduction = reduction(power_above(raw), power_above(current));

        let score = if raw_count == 0 {
            100.0
        } else {
            (count_reduction.clamp(0.0, 100.0) + peak_reduction.clamp(0.0, 100.0) + power_reduction.clamp(0.0, 100.0))
                / 3.0
        };

        Ok(ArtefactMetrics {
            raw_count,
            current_count,
            count_reduction,
            peak_reduction,
            power_reduction,
            score,
        })
    }

    fn health(
        &self,
        raw: &Signal,
        current: &Signal,
        cur_p: &BandPowers,
        filter: &FilterEffectiveness,
        timings: &StepTimings,
    ) -> HealthMetrics {
        let limits = &self.config.health;
        let mut issues = Vec::new();
        let mut warnings = Vec::new();

        // Non-finite samples never get this far: `Signal::new` rejects them
        for (index, (r, c)) in raw.channels().zip(current.channels()).enumerate() {
            let (r, c) = (std_dev(&r.to_vec()), std_dev(&c.to_vec()));
            if r > EPSILON && c <= EPSILON {
                issues.push(format!("channel {} flattened", index));
            }
        }

        let clipped = current.channels().any(|ch| {
            let (min, max) = ch
                .iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
            let at_rail = ch.iter().filter(|&&v| v == min || v == max).count();
            at_rail as f64 / ch.len() as f64 > limits.clipping_fraction
        });
        if clipped {
            warnings.push("clipping".to_string());
        }
        if filter.in_band_preservation < limits.min_in_band_retained * 100.0 {
            warnings.push("over-filtering".to_string());
        }
        if cur_p.total > EPSILON && cur_p.line / cur_p.total > limits.max_line_fraction {
            warnings.push("under-filtering".to_string());
        }
        warnings.extend(timings.warnings.iter().map(|w| w.to_string()));

        let score = (100.0
            - limits.issue_penalty * issues.len() as f64
            - limits.warning_penalty * warnings.len() as f64)
            .max(0.0);
        let status = if score >= 80.0 {
            HealthStatus::Healthy
        } else if score >= 50.0 {
            HealthStatus::Degraded
        } else {
            HealthStatus::Unhealthy
        };

        HealthMetrics {
            issues,
            warnings,
            score,
            status,
        }
    }
}

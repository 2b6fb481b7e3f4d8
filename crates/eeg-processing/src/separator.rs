//! Component separation with FastICA and peak-based rejection
//!
//! Channels are unmixed with linfa's FastICA (log-cosh contrast), each source is
//! scaled to unit variance, and every component whose peak stands out from the
//! median peak is zeroed before mixing back. Blinks concentrate into a few
//! high-peak components, so they disappear while the background rhythms survive.

use crate::processor::{CleaningStep, PipelineStep, PipelineWarning, StepOutput, StepParameters};
use crate::set_params;
use eeg_core::stats::{median, std_dev, Moments};
use eeg_core::{malformed_input, EngineError, EngineResult, Signal};
use linfa::prelude::*;
use linfa_ica::fast_ica::{FastIca, GFunc};
use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Separator parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeparatorConfig {
    /// Components with `peak > rejection_ratio * median(peaks)` are removed
    pub rejection_ratio: f64,
    pub max_iterations: usize,
    pub tolerance: f64,
    /// Log-cosh contrast steepness
    pub alpha: f64,
    /// Seed for the initial unmixing matrix
    pub seed: u64,
}

impl Default for SeparatorConfig {
    fn default() -> Self {
        Self {
            rejection_ratio: 3.0,
            max_iterations: 200,
            tolerance: 1e-4,
            alpha: 1.0,
            seed: 42,
        }
    }
}

impl SeparatorConfig {
    pub fn validate(&self) -> EngineResult<()> {
        if !(self.rejection_ratio.is_finite() && self.rejection_ratio > 0.0) {
            return Err(EngineError::Config {
                reason: format!("rejection ratio must be positive, got {}", self.rejection_ratio),
            });
        }
        if self.max_iterations == 0 {
            return Err(EngineError::Config {
                reason: "separation needs at least one iteration".to_string(),
            });
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(EngineError::Config {
                reason: format!("separation tolerance must be positive, got {}", self.tolerance),
            });
        }
        if !(self.alpha >= 1.0 && self.alpha <= 2.0) {
            return Err(EngineError::Config {
                reason: format!("contrast alpha must lie in [1, 2], got {}", self.alpha),
            });
        }
        Ok(())
    }
}

/// One independent component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub index: usize,
    /// Unit-variance source, one value per input sample
    pub source: Vec<f64>,
    /// Largest absolute value of `source`
    pub peak: f64,
    /// Excess kurtosis of the source; blinks are strongly positive
    pub kurtosis: f64,
    pub rejected: bool,
    /// Column of the mixing matrix: how strongly the component projects onto each channel
    pub mixing_weights: Vec<f64>,
}

/// Result of one separation pass
#[derive(Debug, Clone)]
pub struct SeparationOutcome {
    pub cleaned: Signal,
    pub components: Vec<Component>,
    /// Every component was over the threshold, `cleaned` is the unmodified input
    pub all_rejected: bool,
}

impl SeparationOutcome {
    pub fn rejected_indices(&self) -> Vec<usize> {
        self.components.iter().filter(|c| c.rejected).map(|c| c.index).collect()
    }

    pub fn warning(&self) -> Option<PipelineWarning> {
        if self.all_rejected {
            Some(PipelineWarning::AllComponentsRejected {
                components: self.components.len(),
            })
        } else if self.cleaned.channel_count() == 1 {
            Some(PipelineWarning::SingleChannel)
        } else {
            None
        }
    }
}

/// Fitted decomposition, `data = mixing . sources + means`
struct Decomposition {
    /// channels x components
    mixing: Array2<f64>,
    /// components x samples, unit variance rows
    sources: Array2<f64>,
    means: Array1<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct ArtefactSeparator {
    config: SeparatorConfig,
}

impl ArtefactSeparator {
    pub fn new(config: SeparatorConfig) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SeparatorConfig {
        &self.config
    }

    /// Decompose, drop outlying components, reconstruct
    pub fn separate_and_clean(&self, signal: &Signal, channel_count: usize) -> EngineResult<SeparationOutcome> {
        if channel_count != signal.channel_count() {
            return Err(malformed_input!(
                "separation requested for {} components but signal has {} channels",
                channel_count,
                signal.channel_count()
            ));
        }

        if channel_count == 1 {
            debug!("single channel, nothing to separate");
            return Ok(SeparationOutcome {
                cleaned: signal.clone(),
                components: Vec::new(),
                all_rejected: false,
            });
        }

        let decomposition = self.decompose(signal)?;

        let peaks: Vec<f64> = decomposition
            .sources
            .rows()
            .into_iter()
            .map(|row| row.iter().fold(0.0_f64, |m, v| m.max(v.abs())))
            .collect();
        let threshold = self.config.rejection_ratio * median(&peaks);

        let components: Vec<Component> = peaks
            .iter()
            .enumerate()
            .map(|(index, &peak)| {
                let source = decomposition.sources.row(index).to_vec();
                Component {
                    index,
                    kurtosis: Moments::calculate(&source).kurtosis,
                    source,
                    peak,
                    rejected: peak > threshold,
                    mixing_weights: decomposition.mixing.column(index).to_vec(),
                }
            })
            .collect();

        let rejected = components.iter().filter(|c| c.rejected).count();
        debug!(components = channel_count, rejected, threshold, "separation complete");

        if rejected == channel_count {
            warn!(components = channel_count, "all components rejected, returning input");
            return Ok(SeparationOutcome {
                cleaned: signal.clone(),
                components,
                all_rejected: true,
            });
        }

        let cleaned = if rejected == 0 {
            signal.clone()
        } else {
            self.reconstruct(signal, &decomposition, &components)?
        };

        Ok(SeparationOutcome {
            cleaned,
            components,
            all_rejected: false,
        })
    }

    fn reconstruct(&self, signal: &Signal, decomposition: &Decomposition, components: &[Component]) -> EngineResult<Signal> {
        let mut kept = decomposition.sources.clone();
        for component in components.iter().filter(|c| c.rejected) {
            kept.row_mut(component.index).fill(0.0);
        }
        let data = decomposition.mixing.dot(&kept) + &decomposition.means.view().insert_axis(Axis(1));
        if data.iter().any(|v| !v.is_finite()) {
            return Err(EngineError::NumericalInstability { stage: "separation" });
        }
        signal.derive(data)
    }

    fn decompose(&self, signal: &Signal) -> EngineResult<Decomposition> {
        let (n, t) = signal.data().dim();
        if t <= n {
            return Err(EngineError::DecompositionFailure {
                reason: format!("need more samples than channels, got {} for {} channels", t, n),
            });
        }

        let means = signal.data().mean_axis(Axis(1)).ok_or_else(|| EngineError::DecompositionFailure {
            reason: "empty signal".to_string(),
        })?;
        // samples x channels, the layout linfa expects
        let centred = (signal.data() - &means.view().insert_axis(Axis(1))).reversed_axes();
        check_rank(&centred)?;

        let dataset = DatasetBase::from(centred.clone());
        let ica = FastIca::<f64>::params()
            .ncomponents(n)
            .gfunc(GFunc::Logcosh(self.config.alpha))
            .max_iter(self.config.max_iterations)
            .tol(self.config.tolerance)
            .random_state(self.config.seed as usize)
            .fit(&dataset)
            .map_err(|e| EngineError::DecompositionFailure {
                reason: format!("FastICA failed: {}", e),
            })?;

        // samples x components, rescaled to unit variance
        let mut sources: Array2<f64> = ica.predict(&centred);
        for mut column in sources.columns_mut() {
            let scale = std_dev(&column.to_vec());
            if !(scale.is_finite() && scale > 0.0) {
                return Err(EngineError::DecompositionFailure {
                    reason: "FastICA produced a degenerate source".to_string(),
                });
            }
            column.mapv_inplace(|v| v / scale);
        }

        let mixing = least_squares_mixing(&centred, &sources)?;
        Ok(Decomposition {
            mixing,
            sources: sources.reversed_axes(),
            means,
        })
    }
}

/// Whitening needs a full-rank channel covariance
fn check_rank(centred: &Array2<f64>) -> EngineResult<()> {
    let t = centred.nrows() as f64;
    let covariance = centred.t().dot(centred) / t;
    let n = covariance.nrows();
    let eigen = SymmetricEigen::new(DMatrix::from_fn(n, n, |i, j| covariance[[i, j]]));
    let largest = eigen.eigenvalues.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let smallest = eigen.eigenvalues.iter().cloned().fold(f64::INFINITY, f64::min);
    if !largest.is_finite() || largest <= 0.0 || smallest <= 1e-12 * largest {
        return Err(EngineError::DecompositionFailure {
            reason: format!(
                "channel covariance is rank deficient (eigenvalues {:.3e} to {:.3e})",
                smallest, largest
            ),
        });
    }
    Ok(())
}

/// `A = Xᵀ S (SᵀS)⁻¹`, channels x components
fn least_squares_mixing(centred: &Array2<f64>, sources: &Array2<f64>) -> EngineResult<Array2<f64>> {
    let sts = sources.t().dot(sources);
    let k = sts.nrows();
    let inverse = DMatrix::from_fn(k, k, |i, j| sts[[i, j]])
        .try_inverse()
        .ok_or_else(|| EngineError::DecompositionFailure {
            reason: "sources are linearly dependent".to_string(),
        })?;
    let inverse = Array2::from_shape_fn((k, k), |(i, j)| inverse[(i, j)]);
    let mixing = centred.t().dot(sources).dot(&inverse);
    if mixing.iter().any(|v| !v.is_finite()) {
        return Err(EngineError::DecompositionFailure {
            reason: "non-finite mixing matrix".to_string(),
        });
    }
    Ok(mixing)
}

impl CleaningStep for ArtefactSeparator {
    fn process(&self, input: &Signal) -> EngineResult<StepOutput> {
        let outcome = self.separate_and_clean(input, input.channel_count())?;

        let mut output = StepOutput::new(outcome.cleaned.clone());
        set_params!(output.parameters,
            "components" => outcome.components.len(),
            "rejected" => outcome.rejected_indices(),
            "fallback" => outcome.all_rejected,
        );
        output.warnings.extend(outcome.warning());
        Ok(output)
    }

    fn step(&self) -> PipelineStep {
        PipelineStep::Separation
    }

    fn parameters(&self) -> StepParameters {
        let mut params = StepParameters::new();
        set_params!(params,
            "rejection_ratio" => self.config.rejection_ratio,
            "max_iterations" => self.config.max_iterations,
            "tolerance" => self.config.tolerance,
            "seed" => self.config.seed,
        );
        params
    }
}

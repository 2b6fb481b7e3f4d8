//! Zero-phase band-pass and notch filtering for EEG channels

use crate::processor::{CleaningStep, PipelineStep, StepOutput, StepParameters};
use crate::set_params;
use eeg_core::{invalid_spec, EngineError, EngineResult, Signal};
use ndarray::{Array2, Axis};
use num_complex::Complex;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::debug;

/// Band-pass and notch parameters for one cleaning run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    /// Low cutoff for bandpass (Hz)
    pub low_cutoff: f64,
    /// High cutoff for bandpass (Hz)
    pub high_cutoff: f64,
    /// Butterworth order of each edge of the band
    pub order: usize,
    /// Notch frequency (Hz) - typically 50 or 60; `None` disables the notch
    pub notch_freq: Option<f64>,
    /// Notch quality factor
    pub notch_q: f64,
}

impl Default for FilterSpec {
    fn default() -> Self {
        Self {
            low_cutoff: 1.0,
            high_cutoff: 40.0,
            order: 5,
            notch_freq: Some(50.0),
            notch_q: 30.0,
        }
    }
}

impl FilterSpec {
    /// Band-pass only
    pub fn bandpass(low_cutoff: f64, high_cutoff: f64, order: usize) -> Self {
        Self {
            low_cutoff,
            high_cutoff,
            order,
            notch_freq: None,
            notch_q: 30.0,
        }
    }

    pub fn with_notch(mut self, freq: f64, q: f64) -> Self {
        self.notch_freq = Some(freq);
        self.notch_q = q;
        self
    }

    pub fn with_order(mut self, order: usize) -> Self {
        self.order = order;
        self
    }

    /// Check cutoffs and notch against the Nyquist frequency of `sampling_rate`
    pub fn validate(&self, sampling_rate: f64) -> EngineResult<()> {
        Signal::validate_sampling_rate(sampling_rate)?;
        let nyquist = sampling_rate / 2.0;

        if self.order == 0 {
            return Err(invalid_spec!("filter order must be at least 1"));
        }
        if !self.low_cutoff.is_finite() || !self.high_cutoff.is_finite() {
            return Err(invalid_spec!("cutoffs must be finite"));
        }
        if self.low_cutoff <= 0.0 {
            return Err(invalid_spec!("low cutoff {} Hz must be positive", self.low_cutoff));
        }
        if self.low_cutoff >= self.high_cutoff {
            return Err(invalid_spec!(
                "low cutoff {} Hz must be below high cutoff {} Hz",
                self.low_cutoff,
                self.high_cutoff
            ));
        }
        if self.high_cutoff >= nyquist {
            return Err(invalid_spec!(
                "high cutoff {} Hz must be below Nyquist {} Hz",
                self.high_cutoff,
                nyquist
            ));
        }
        if let Some(freq) = self.notch_freq {
            if !freq.is_finite() || freq <= 0.0 || freq >= nyquist {
                return Err(invalid_spec!("notch frequency {} Hz must lie in (0, {}) Hz", freq, nyquist));
            }
            if !self.notch_q.is_finite() || self.notch_q <= 0.0 {
                return Err(invalid_spec!("notch quality factor {} must be positive", self.notch_q));
            }
        }
        Ok(())
    }

    /// Second-order sections in the band-pass cascade for `order`
    fn bandpass_sections(order: usize) -> usize {
        2 * order.div_ceil(2)
    }
}

/// Single biquad section (2nd order), normalised so `a0 = 1`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadSection {
    // y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2] - a1*y[n-1] - a2*y[n-2]
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl BiquadSection {
    /// Gain at DC, the steady-state response to a constant input
    pub fn dc_gain(&self) -> f64 {
        let den = 1.0 + self.a1 + self.a2;
        if den.abs() < f64::EPSILON {
            return 0.0;
        }
        (self.b0 + self.b1 + self.b2) / den
    }

    /// Transposed direct form II state for a constant input `level`
    fn steady_state(&self, level: f64) -> (f64, f64) {
        let y = self.dc_gain() * level;
        let z2 = self.b2 * level - self.a2 * y;
        let z1 = (self.b1 + self.b2) * level - (self.a1 + self.a2) * y;
        (z1, z2)
    }

    fn response(&self, z_inv: Complex<f64>) -> Complex<f64> {
        let z_inv2 = z_inv * z_inv;
        let num = Complex::new(self.b0, 0.0) + z_inv * self.b1 + z_inv2 * self.b2;
        let den = Complex::new(1.0, 0.0) + z_inv * self.a1 + z_inv2 * self.a2;
        num / den
    }
}

/// Cascade of second-order sections applied forward and backward
#[derive(Debug, Clone, PartialEq)]
pub struct SosCascade {
    sections: Vec<BiquadSection>,
}

impl SosCascade {
    pub fn new(sections: Vec<BiquadSection>) -> Self {
        Self { sections }
    }

    pub fn sections(&self) -> &[BiquadSection] {
        &self.sections
    }

    /// Samples of odd-reflection padding added at each end
    pub fn padlen(&self) -> usize {
        3 * (2 * self.sections.len() + 1)
    }

    /// Magnitude of a single forward pass at `freq`
    pub fn magnitude_at(&self, freq: f64, sampling_rate: f64) -> f64 {
        let omega = 2.0 * PI * freq / sampling_rate;
        let z_inv = Complex::from_polar(1.0, -omega);
        self.sections
            .iter()
            .fold(Complex::new(1.0, 0.0), |acc, s| acc * s.response(z_inv))
            .norm()
    }

    /// One causal pass, starting from the steady state of `x[0]`
    fn filter_in_place(&self, data: &mut [f64]) {
        let Some(&first) = data.first() else {
            return;
        };
        let mut level = first;

        for section in &self.sections {
            let (mut z1, mut z2) = section.steady_state(level);
            for x in data.iter_mut() {
                let input = *x;
                let y = section.b0 * input + z1;
                z1 = section.b1 * input - section.a1 * y + z2;
                z2 = section.b2 * input - section.a2 * y;
                *x = y;
            }
            level *= section.dc_gain();
        }
    }

    /// Zero-phase filtering; fails when `data` is not longer than the padding
    pub fn filtfilt(&self, data: &[f64]) -> EngineResult<Vec<f64>> {
        let n = data.len();
        let pad = self.padlen();
        if n <= pad {
            return Err(EngineError::InsufficientSamples {
                required: pad,
                actual: n,
                max_order: 0,
            });
        }

        let first = data[0];
        let last = data[n - 1];
        let mut ext = Vec::with_capacity(n + 2 * pad);
        ext.extend((1..=pad).rev().map(|i| 2.0 * first - data[i]));
        ext.extend_from_slice(data);
        ext.extend((1..=pad).map(|i| 2.0 * last - data[n - 1 - i]));

        self.filter_in_place(&mut ext);
        ext.reverse();
        self.filter_in_place(&mut ext);
        ext.reverse();

        Ok(ext[pad..pad + n].to_vec())
    }
}

/// Butterworth designs via the prewarped bilinear transform
pub struct ButterworthFilter;

impl ButterworthFilter {
    fn check_cutoff(cutoff: f64, sampling_rate: f64) -> EngineResult<f64> {
        if !(cutoff > 0.0 && cutoff < sampling_rate / 2.0) {
            return Err(invalid_spec!(
                "cutoff {} Hz must lie in (0, {}) Hz",
                cutoff,
                sampling_rate / 2.0
            ));
        }
        Ok((PI * cutoff / sampling_rate).tan())
    }

    /// Damping of each conjugate pole pair of the analog prototype
    fn pole_pair_damping(order: usize) -> impl Iterator<Item = f64> {
        (0..order / 2).map(move |i| 2.0 * (PI * (2 * i + 1) as f64 / (2 * order) as f64).sin())
    }

    pub fn lowpass(order: usize, cutoff: f64, sampling_rate: f64) -> EngineResult<SosCascade> {
        let k = Self::check_cutoff(cutoff, sampling_rate)?;
        let k2 = k * k;

        let mut sections: Vec<BiquadSection> = Self::pole_pair_damping(order)
            .map(|a| {
                let d = 1.0 + a * k + k2;
                let b0 = k2 / d;
                BiquadSection {
                    b0,
                    b1: 2.0 * b0,
                    b2: b0,
                    a1: 2.0 * (k2 - 1.0) / d,
                    a2: (1.0 - a * k + k2) / d,
                }
            })
            .collect();

        if order % 2 == 1 {
            let d = 1.0 + k;
            sections.push(BiquadSection {
                b0: k / d,
                b1: k / d,
                b2: 0.0,
                a1: (k - 1.0) / d,
                a2: 0.0,
            });
        }
        Ok(SosCascade::new(sections))
    }

    pub fn highpass(order: usize, cutoff: f64, sampling_rate: f64) -> EngineResult<SosCascade> {
        let k = Self::check_cutoff(cutoff, sampling_rate)?;
        let k2 = k * k;

        let mut sections: Vec<BiquadSection> = Self::pole_pair_damping(order)
            .map(|a| {
                let d = 1.0 + a * k + k2;
                BiquadSection {
                    b0: 1.0 / d,
                    b1: -2.0 / d,
                    b2: 1.0 / d,
                    a1: 2.0 * (k2 - 1.0) / d,
                    a2: (1.0 - a * k + k2) / d,
                }
            })
            .collect();

        if order % 2 == 1 {
            let d = 1.0 + k;
            sections.push(BiquadSection {
                b0: 1.0 / d,
                b1: -1.0 / d,
                b2: 0.0,
                a1: (k - 1.0) / d,
                a2: 0.0,
            });
        }
        Ok(SosCascade::new(sections))
    }

    /// High-pass at `low` followed by low-pass at `high`
    pub fn bandpass(order: usize, low: f64, high: f64, sampling_rate: f64) -> EngineResult<SosCascade> {
        let mut sections = Self::highpass(order, low, sampling_rate)?.sections;
        sections.extend(Self::lowpass(order, high, sampling_rate)?.sections);
        Ok(SosCascade::new(sections))
    }
}

/// Second-order IIR notch for powerline interference
pub struct NotchFilter;

impl NotchFilter {
    pub fn design(notch_freq: f64, q_factor: f64, sampling_rate: f64) -> EngineResult<SosCascade> {
        let nyquist = sampling_rate / 2.0;
        if !(notch_freq > 0.0 && notch_freq < nyquist) || !(q_factor > 0.0) {
            return Err(invalid_spec!("notch {} Hz / Q {} invalid at {} Hz", notch_freq, q_factor, sampling_rate));
        }

        let w0 = PI * notch_freq / nyquist;
        let bandwidth = PI * (notch_freq / nyquist) / q_factor;
        let gain = 1.0 / (1.0 + (bandwidth / 2.0).tan());
        let cos_w0 = w0.cos();

        Ok(SosCascade::new(vec![BiquadSection {
            b0: gain,
            b1: -2.0 * gain * cos_w0,
            b2: gain,
            a1: -2.0 * gain * cos_w0,
            a2: 2.0 * gain - 1.0,
        }]))
    }
}

/// Band-pass then notch, both zero-phase, designed for one sampling rate
#[derive(Debug, Clone)]
pub struct FilterBank {
    spec: FilterSpec,
    sampling_rate: f64,
    bandpass: SosCascade,
    notch: Option<SosCascade>,
}

impl FilterBank {
    /// Validate `spec` and design both filters
    pub fn design(spec: FilterSpec, sampling_rate: f64) -> EngineResult<Self> {
        spec.validate(sampling_rate)?;

        let bandpass = ButterworthFilter::bandpass(spec.order, spec.low_cutoff, spec.high_cutoff, sampling_rate)?;
        let notch = match spec.notch_freq {
            Some(freq) => Some(NotchFilter::design(freq, spec.notch_q, sampling_rate)?),
            None => None,
        };

        debug!(
            low = spec.low_cutoff,
            high = spec.high_cutoff,
            order = spec.order,
            sections = bandpass.sections().len(),
            notch = ?spec.notch_freq,
            "designed filter bank"
        );

        Ok(FilterBank {
            spec,
            sampling_rate,
            bandpass,
            notch,
        })
    }

    /// Design for the signal's rate and filter every channel
    pub fn apply(signal: &Signal, spec: &FilterSpec) -> EngineResult<Signal> {
        FilterBank::design(*spec, signal.sampling_rate())?.process(signal)
    }

    /// Highest order whose padding fits `samples`, 0 if none
    pub fn max_supported_order(samples: usize) -> usize {
        let mut order = 0;
        while 3 * (2 * FilterSpec::bandpass_sections(order + 1) + 1) < samples {
            order += 1;
        }
        order
    }

    pub fn spec(&self) -> &FilterSpec {
        &self.spec
    }

    pub fn bandpass(&self) -> &SosCascade {
        &self.bandpass
    }

    pub fn notch(&self) -> Option<&SosCascade> {
        self.notch.as_ref()
    }

    /// Samples needed beyond which filtering is possible
    pub fn required_samples(&self) -> usize {
        self.bandpass.padlen()
    }

    pub fn process(&self, signal: &Signal) -> EngineResult<Signal> {
        if signal.sampling_rate() != self.sampling_rate {
            return Err(invalid_spec!(
                "filter bank designed for {} Hz, signal is {} Hz",
                self.sampling_rate,
                signal.sampling_rate()
            ));
        }

        let samples = signal.samples_per_channel();
        if samples <= self.required_samples() {
            return Err(EngineError::InsufficientSamples {
                required: self.required_samples(),
                actual: samples,
                max_order: Self::max_supported_order(samples),
            });
        }

        let mut output = Array2::<f64>::zeros(signal.data().dim());
        for (input_row, mut output_row) in signal.channels().zip(output.axis_iter_mut(Axis(0))) {
            let mut filtered = self.bandpass.filtfilt(&input_row.to_vec())?;
            if let Some(notch) = &self.notch {
                filtered = notch.filtfilt(&filtered)?;
            }
            if filtered.iter().any(|v| !v.is_finite()) {
                return Err(EngineError::NumericalInstability { stage: "filter bank" });
            }
            for (dst, src) in output_row.iter_mut().zip(filtered) {
                *dst = src;
            }
        }

        signal.derive(output)
    }
}

/// Pipeline stage wrapping a spec; the bank is designed for each input's rate
#[derive(Debug, Clone, Copy)]
pub struct FilterStage {
    spec: FilterSpec,
}

impl FilterStage {
    pub fn new(spec: FilterSpec) -> Self {
        Self { spec }
    }
}

impl CleaningStep for FilterStage {
    fn process(&self, input: &Signal) -> EngineResult<StepOutput> {
        let bank = FilterBank::design(self.spec, input.sampling_rate())?;
        let mut output = StepOutput::new(bank.process(input)?);
        set_params!(output.parameters, "sections" => bank.bandpass().sections().len());
        Ok(output)
    }

    fn step(&self) -> PipelineStep {
        PipelineStep::Filter
    }

    fn parameters(&self) -> StepParameters {
        let mut params = StepParameters::new();
        set_params!(params,
            "low_cutoff" => self.spec.low_cutoff,
            "high_cutoff" => self.spec.high_cutoff,
            "order" => self.spec.order,
            "notch_freq" => self.spec.notch_freq,
            "notch_q" => self.spec.notch_q,
        );
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eeg_core::load;

    const FS: f64 = 256.0;

    fn sine(freq: f64, amplitude: f64, samples: usize) -> Vec<f64> {
        (0..samples)
            .map(|i| amplitude * (2.0 * PI * freq * i as f64 / FS).sin())
            .collect()
    }

    fn rms(data: &[f64]) -> f64 {
        (data.iter().map(|x| x * x).sum::<f64>() / data.len() as f64).sqrt()
    }

    #[test]
    fn test_butterworth_lowpass_response() {
        let lp = ButterworthFilter::lowpass(4, 40.0, FS).unwrap();
        assert_eq!(lp.sections().len(), 2);

        assert!((lp.magnitude_at(0.0, FS) - 1.0).abs() < 1e-9);
        assert!((lp.magnitude_at(40.0, FS) - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-6);
        assert!(lp.magnitude_at(100.0, FS) < 0.01);
    }

    #[test]
    fn test_butterworth_highpass_odd_order() {
        let hp = ButterworthFilter::highpass(5, 1.0, FS).unwrap();
        assert_eq!(hp.sections().len(), 3);

        assert!(hp.magnitude_at(0.0, FS) < 1e-9);
        assert!((hp.magnitude_at(1.0, FS) - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-6);
        assert!((hp.magnitude_at(20.0, FS) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_notch_filter() {
        let notch = NotchFilter::design(50.0, 30.0, FS).unwrap();
        assert!(notch.magnitude_at(50.0, FS) < 1e-9);
        assert!((notch.magnitude_at(10.0, FS) - 1.0).abs() < 0.01);
        assert!((notch.sections()[0].dc_gain() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_apply_preserves_shape_and_finiteness() {
        let channels = vec![
            sine(10.0, 20.0, 2560),
            (0..2560).map(|i| ((i * 7919) % 211) as f64 - 105.0).collect(),
            vec![3.0; 2560],
        ];
        let signal = load(channels, FS).unwrap();

        for spec in [
            FilterSpec::default(),
            FilterSpec::bandpass(0.5, 45.0, 2),
            FilterSpec::bandpass(8.0, 13.0, 3).with_notch(60.0, 10.0),
        ] {
            let output = FilterBank::apply(&signal, &spec).unwrap();
            assert_eq!(output.data().dim(), signal.data().dim());
            assert!(output.data().iter().all(|v| v.is_finite()));
        }
    }

    #[test]
    fn test_line_frequency_is_attenuated() {
        let signal = load(sine(50.0, 10.0, 2560), FS).unwrap();
        let output = FilterBank::apply(&signal, &FilterSpec::default()).unwrap();

        let before = rms(&signal.flattened());
        let after = rms(&output.flattened());
        // Power ratio of at least 10x
        assert!(before * before >= 10.0 * after * after);
    }

    #[test]
    fn test_passband_is_preserved_without_phase_shift() {
        let input = sine(10.0, 20.0, 2560);
        let signal = load(input.clone(), FS).unwrap();
        let output = FilterBank::apply(&signal, &FilterSpec::default()).unwrap();
        let filtered = output.flattened();

        let mid = 768..1792;
        let ratio = rms(&filtered[mid.clone()]) / rms(&input[mid.clone()]);
        assert!((ratio - 1.0).abs() < 0.02, "passband ratio {}", ratio);

        // Zero-phase: peaks stay where they were
        let max_err = mid.map(|i| (filtered[i] - input[i]).abs()).fold(0.0, f64::max);
        assert!(max_err < 1.0, "max deviation {}", max_err);
    }

    #[test]
    fn test_invalid_specs_rejected() {
        let signal = load(sine(10.0, 1.0, 512), FS).unwrap();
        let cases = [
            FilterSpec::bandpass(40.0, 1.0, 4),
            FilterSpec::bandpass(10.0, 10.0, 4),
            FilterSpec::bandpass(0.0, 40.0, 4),
            FilterSpec::bandpass(-1.0, 40.0, 4),
            FilterSpec::bandpass(1.0, 128.0, 4),
            FilterSpec::bandpass(1.0, 40.0, 0),
            FilterSpec::bandpass(1.0, 40.0, 4).with_notch(130.0, 30.0),
            FilterSpec::bandpass(1.0, 40.0, 4).with_notch(50.0, 0.0),
        ];
        for spec in cases {
            assert!(
                matches!(FilterBank::apply(&signal, &spec), Err(EngineError::InvalidFilterSpec { .. })),
                "{:?} should be rejected",
                spec
            );
        }
    }

    #[test]
    fn test_insufficient_samples_reports_usable_order() {
        let signal = load(sine(10.0, 1.0, 30), FS).unwrap();

        match FilterBank::apply(&signal, &FilterSpec::default()) {
            Err(EngineError::InsufficientSamples { required, actual, max_order }) => {
                assert_eq!(required, 39);
                assert_eq!(actual, 30);
                assert_eq!(max_order, 4);
            }
            other => panic!("expected InsufficientSamples, got {:?}", other),
        }

        let reduced = FilterSpec::default().with_order(4);
        assert!(FilterBank::apply(&signal, &reduced).is_ok());
        assert_eq!(FilterBank::max_supported_order(15), 0);
    }

    #[test]
    fn test_constant_input_without_dc_is_removed() {
        let signal = load(vec![5.0; 1024], FS).unwrap();
        let output = FilterBank::apply(&signal, &FilterSpec::default()).unwrap();
        assert!(output.flattened().iter().all(|v| v.abs() < 1e-6));
    }
}

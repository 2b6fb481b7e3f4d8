//! Power spectral density estimation

use eeg_core::{malformed_input, EngineResult};
use realfft::RealFftPlanner;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// One-sided power spectral density
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerSpectrum {
    pub frequencies: Vec<f64>,
    /// Power per Hz at each frequency bin
    pub density: Vec<f64>,
    pub resolution: f64,
}

impl PowerSpectrum {
    /// Trapezoidal integral of the density over `[low, high]` Hz, bounds inclusive
    pub fn band_power(&self, low: f64, high: f64) -> f64 {
        let points: Vec<(f64, f64)> = self
            .frequencies
            .iter()
            .zip(&self.density)
            .filter(|(f, _)| **f >= low && **f <= high)
            .map(|(f, p)| (*f, *p))
            .collect();
        trapezoid(&points)
    }

    pub fn total_power(&self) -> f64 {
        let points: Vec<(f64, f64)> = self.frequencies.iter().copied().zip(self.density.iter().copied()).collect();
        trapezoid(&points)
    }

    /// Frequency of the largest density bin
    pub fn peak_frequency(&self) -> f64 {
        self.density
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(i, _)| self.frequencies[i])
            .unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.density.len()
    }

    pub fn is_empty(&self) -> bool {
        self.density.is_empty()
    }
}

fn trapezoid(points: &[(f64, f64)]) -> f64 {
    points
        .windows(2)
        .map(|w| 0.5 * (w[0].1 + w[1].1) * (w[1].0 - w[0].0))
        .sum()
}

/// Symmetric Hann window
pub fn hann_window(len: usize) -> Vec<f64> {
    if len <= 1 {
        return vec![1.0; len];
    }
    (0..len)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f64 / (len - 1) as f64).cos()))
        .collect()
}

/// Welch estimator: Hann-windowed segments with 50% overlap, mean removed per segment
#[derive(Debug, Clone, Copy)]
pub struct WelchEstimator {
    segment_len: usize,
}

impl Default for WelchEstimator {
    fn default() -> Self {
        Self { segment_len: 256 }
    }
}

impl WelchEstimator {
    pub fn new(segment_len: usize) -> Self {
        Self { segment_len: segment_len.max(2) }
    }

    /// Segment length for `seconds` of data at `sampling_rate`
    pub fn with_segment_seconds(seconds: f64, sampling_rate: f64) -> Self {
        Self::new((seconds * sampling_rate).round() as usize)
    }

    pub fn segment_len(&self) -> usize {
        self.segment_len
    }

    pub fn estimate(&self, data: &[f64], sampling_rate: f64) -> EngineResult<PowerSpectrum> {
        if data.len() < 2 {
            return Err(malformed_input!("need at least 2 samples for a spectrum, got {}", data.len()));
        }
        if !(sampling_rate.is_finite() && sampling_rate > 0.0) {
            return Err(malformed_input!("sampling rate must be positive, got {}", sampling_rate));
        }

        // Shorter recordings fall back to a single segment
        let nperseg = self.segment_len.min(data.len());
        let step = (nperseg / 2).max(1);
        let window = hann_window(nperseg);
        let window_power: f64 = window.iter().map(|w| w * w).sum();
        let scale = 1.0 / (sampling_rate * window_power);

        let mut planner = RealFftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(nperseg);
        let mut input = fft.make_input_vec();
        let mut output = fft.make_output_vec();
        let bins = output.len();

        let mut density = vec![0.0; bins];
        let mut segments = 0usize;
        let mut start = 0;
        while start + nperseg <= data.len() {
            let segment = &data[start..start + nperseg];
            let mean = segment.iter().sum::<f64>() / nperseg as f64;
            for ((dst, &x), &w) in input.iter_mut().zip(segment).zip(&window) {
                *dst = (x - mean) * w;
            }

            fft.process(&mut input, &mut output)
                .map_err(|e| malformed_input!("FFT failed: {}", e))?;

            for (acc, c) in density.iter_mut().zip(&output) {
                *acc += c.norm_sqr() * scale;
            }
            segments += 1;
            start += step;
        }

        let nyquist_bin = if nperseg % 2 == 0 { Some(bins - 1) } else { None };
        for (i, value) in density.iter_mut().enumerate() {
            *value /= segments as f64;
            // One-sided: double everything except DC and Nyquist
            if i != 0 && Some(i) != nyquist_bin {
                *value *= 2.0;
            }
        }

        let resolution = sampling_rate / nperseg as f64;
        let frequencies = (0..bins).map(|i| i as f64 * resolution).collect();

        Ok(PowerSpectrum {
            frequencies,
            density,
            resolution,
        })
    }
}

/// Single-segment rectangular-window PSD of the whole record
pub fn periodogram(data: &[f64], sampling_rate: f64) -> EngineResult<PowerSpectrum> {
    if data.len() < 2 {
        return Err(malformed_input!("need at least 2 samples for a spectrum, got {}", data.len()));
    }
    if !(sampling_rate.is_finite() && sampling_rate > 0.0) {
        return Err(malformed_input!("sampling rate must be positive, got {}", sampling_rate));
    }

    let n = data.len();
    let mut planner = RealFftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(n);
    let mut input = data.to_vec();
    let mut output = fft.make_output_vec();
    fft.process(&mut input, &mut output)
        .map_err(|e| malformed_input!("FFT failed: {}", e))?;

    let scale = 1.0 / (sampling_rate * n as f64);
    let bins = output.len();
    let nyquist_bin = if n % 2 == 0 { Some(bins - 1) } else { None };
    let density = output
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let p = c.norm_sqr() * scale;
            if i != 0 && Some(i) != nyquist_bin { 2.0 * p } else { p }
        })
        .collect();

    let resolution = sampling_rate / n as f64;
    Ok(PowerSpectrum {
        frequencies: (0..bins).map(|i| i as f64 * resolution).collect(),
        density,
        resolution,
    })
}

/// Welch PSD with 1 s segments, the default used for scoring and analysis
pub fn welch_psd(data: &[f64], sampling_rate: f64) -> EngineResult<PowerSpectrum> {
    WelchEstimator::with_segment_seconds(1.0, sampling_rate).estimate(data, sampling_rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FS: f64 = 256.0;

    fn sine(freq: f64, amplitude: f64, samples: usize) -> Vec<f64> {
        (0..samples)
            .map(|i| amplitude * (2.0 * PI * freq * i as f64 / FS).sin())
            .collect()
    }

    #[test]
    fn test_peak_frequency() {
        let psd = welch_psd(&sine(10.0, 20.0, 2560), FS).unwrap();
        assert_eq!(psd.resolution, 1.0);
        assert_eq!(psd.len(), 129);
        assert!((psd.peak_frequency() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_parseval_on_sine() {
        // Sine power is A^2 / 2
        let psd = welch_psd(&sine(12.0, 10.0, 2560), FS).unwrap();
        let total = psd.total_power();
        assert!((total - 50.0).abs() / 50.0 < 0.05, "total power {}", total);

        let in_band = psd.band_power(10.0, 14.0);
        assert!(in_band / total > 0.95);
    }

    #[test]
    fn test_band_power_outside_is_small() {
        let psd = welch_psd(&sine(10.0, 20.0, 2560), FS).unwrap();
        assert!(psd.band_power(45.0, 128.0) < 1e-4 * psd.total_power());
    }

    #[test]
    fn test_short_input_uses_single_segment() {
        let psd = welch_psd(&sine(32.0, 1.0, 64), FS).unwrap();
        assert_eq!(psd.resolution, 4.0);
        assert!((psd.peak_frequency() - 32.0).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_degenerate_input() {
        assert!(welch_psd(&[1.0], FS).is_err());
        assert!(welch_psd(&[1.0, 2.0], 0.0).is_err());
    }

    #[test]
    fn test_periodogram_keeps_dc_and_tone() {
        let data: Vec<f64> = sine(20.0, 4.0, 512).iter().map(|v| v + 3.0).collect();
        let psd = periodogram(&data, FS).unwrap();

        assert_eq!(psd.resolution, 0.5);
        // DC bin carries mean^2 * n / fs
        assert!((psd.density[0] - 9.0 * 512.0 / FS).abs() < 1e-6);
        assert_eq!(psd.peak_frequency(), 0.0);
        assert!((psd.band_power(19.0, 21.0) - 8.0).abs() < 0.5);
    }

    #[test]
    fn test_hann_window_endpoints() {
        let w = hann_window(5);
        assert_eq!(w[0], 0.0);
        assert!((w[2] - 1.0).abs() < 1e-12);
        assert_eq!(w[4], 0.0);
    }
}

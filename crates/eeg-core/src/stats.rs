//! Descriptive statistics shared by the detector, separator and evaluator

use serde::{Deserialize, Serialize};

/// Basic statistics for a signal channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelStats {
    pub mean: f64,
    pub rms: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub peak_to_peak: f64,
    /// Largest absolute sample value
    pub peak_abs: f64,
}

impl ChannelStats {
    pub fn calculate(data: &[f64]) -> Self {
        if data.is_empty() {
            return Self {
                mean: 0.0,
                rms: 0.0,
                std_dev: 0.0,
                min: 0.0,
                max: 0.0,
                peak_to_peak: 0.0,
                peak_abs: 0.0,
            };
        }

        let n = data.len() as f64;
        let mean = data.iter().sum::<f64>() / n;
        let rms = (data.iter().map(|x| x * x).sum::<f64>() / n).sqrt();
        let std_dev = variance(data).sqrt();

        let min = data.iter().fold(f64::INFINITY, |a, &b| a.min(b));
        let max = data.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));

        Self {
            mean,
            rms,
            std_dev,
            min,
            max,
            peak_to_peak: max - min,
            peak_abs: min.abs().max(max.abs()),
        }
    }
}

/// Central moments up to fourth order
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Moments {
    pub mean: f64,
    pub variance: f64,
    pub std_dev: f64,
    pub skewness: f64,
    /// Excess kurtosis (0 for a Gaussian)
    pub kurtosis: f64,
}

impl Moments {
    pub fn calculate(data: &[f64]) -> Self {
        if data.len() < 2 {
            return Self {
                mean: data.first().copied().unwrap_or(0.0),
                variance: 0.0,
                std_dev: 0.0,
                skewness: 0.0,
                kurtosis: 0.0,
            };
        }

        let n = data.len() as f64;
        let mean = data.iter().sum::<f64>() / n;

        let mut m2 = 0.0;
        let mut m3 = 0.0;
        let mut m4 = 0.0;
        for &x in data {
            let diff = x - mean;
            let diff2 = diff * diff;
            m2 += diff2;
            m3 += diff2 * diff;
            m4 += diff2 * diff2;
        }
        m2 /= n;
        m3 /= n;
        m4 /= n;

        let std_dev = m2.sqrt();
        let (skewness, kurtosis) = if std_dev > 0.0 {
            (m3 / std_dev.powi(3), m4 / (m2 * m2) - 3.0)
        } else {
            (0.0, 0.0)
        };

        Self {
            mean,
            variance: m2,
            std_dev,
            skewness,
            kurtosis,
        }
    }

    /// Jarque–Bera statistic, asymptotically chi-squared with 2 degrees of freedom
    pub fn jarque_bera(&self, n: usize) -> f64 {
        n as f64 / 6.0 * (self.skewness.powi(2) + self.kurtosis.powi(2) / 4.0)
    }

    /// Jarque–Bera p-value; small values reject normality
    pub fn normality_p_value(&self, n: usize) -> f64 {
        if n < 3 {
            return 1.0;
        }
        // chi-squared survival with 2 dof is exp(-x/2)
        (-self.jarque_bera(n) / 2.0).exp()
    }
}

pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Population variance
pub fn variance(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let m = mean(data);
    data.iter().map(|x| (x - m).powi(2)).sum::<f64>() / data.len() as f64
}

pub fn std_dev(data: &[f64]) -> f64 {
    variance(data).sqrt()
}

/// Median; the mean of the two middle values for even lengths
pub fn median(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let mut sorted = data.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Pearson correlation; 1.0 when both inputs are constant and equal, 0.0 when only one is
pub fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n == 0 {
        return 0.0;
    }
    let (a, b) = (&a[..n], &b[..n]);
    let (ma, mb) = (mean(a), mean(b));

    let mut cov = 0.0;
    let mut va = 0.0;
    let mut vb = 0.0;
    for (&x, &y) in a.iter().zip(b) {
        let dx = x - ma;
        let dy = y - mb;
        cov += dx * dy;
        va += dx * dx;
        vb += dy * dy;
    }

    if va == 0.0 && vb == 0.0 {
        return if a == b { 1.0 } else { 0.0 };
    }
    if va == 0.0 || vb == 0.0 {
        return 0.0;
    }
    (cov / (va.sqrt() * vb.sqrt())).clamp(-1.0, 1.0)
}

/// Two-sided p-value of a Pearson `r` over `n` pairs
///
/// The t statistic `r·sqrt((n-2)/(1-r²))` is referred to the normal distribution,
/// which is accurate at recording lengths.
pub fn pearson_p_value(r: f64, n: usize) -> f64 {
    if n < 3 || !r.is_finite() {
        return 1.0;
    }
    let denom = 1.0 - r * r;
    if denom <= 0.0 {
        return 0.0;
    }
    let t = r.abs() * ((n - 2) as f64 / denom).sqrt();
    libm::erfc(t / std::f64::consts::SQRT_2).clamp(0.0, 1.0)
}

pub fn rmse(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n == 0 {
        return 0.0;
    }
    let sum: f64 = a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum();
    (sum / n as f64).sqrt()
}

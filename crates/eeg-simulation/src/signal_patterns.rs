//! Pre-defined EEG background patterns

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Background rhythm generators, values in µV
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SignalPattern {
    /// Pure oscillation
    Sinusoidal {
        frequency: f64,
        amplitude: f64,
        phase: f64,
    },
    /// Oscillation whose envelope waxes and wanes (alpha spindles)
    Spindle {
        frequency: f64,
        amplitude: f64,
        envelope_frequency: f64,
        depth: f64,
    },
    /// Linear frequency sweep over `duration` seconds
    Chirp {
        start_frequency: f64,
        end_frequency: f64,
        amplitude: f64,
        duration: f64,
    },
}

impl SignalPattern {
    /// Pattern value at time `t` seconds
    pub fn value_at_time(&self, t: f64) -> f64 {
        match *self {
            SignalPattern::Sinusoidal { frequency, amplitude, phase } => {
                amplitude * (2.0 * PI * frequency * t + phase).sin()
            }

            SignalPattern::Spindle { frequency, amplitude, envelope_frequency, depth } => {
                let envelope = 1.0 - depth * 0.5 * (1.0 + (2.0 * PI * envelope_frequency * t).cos());
                amplitude * envelope * (2.0 * PI * frequency * t).sin()
            }

            SignalPattern::Chirp { start_frequency, end_frequency, amplitude, duration } => {
                let rate = if duration > 0.0 { (end_frequency - start_frequency) / duration } else { 0.0 };
                let phase = 2.0 * PI * (start_frequency * t + 0.5 * rate * t * t);
                amplitude * phase.sin()
            }
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            SignalPattern::Sinusoidal { .. } => "Steady rhythm",
            SignalPattern::Spindle { .. } => "Waxing and waning rhythm",
            SignalPattern::Chirp { .. } => "Frequency sweep",
        }
    }

    /// Common background presets
    pub fn presets() -> Vec<(&'static str, SignalPattern)> {
        vec![
            ("Delta Sleep", SignalPattern::Sinusoidal { frequency: 2.0, amplitude: 60.0, phase: 0.0 }),
            ("Theta Drowsy", SignalPattern::Sinusoidal { frequency: 6.0, amplitude: 30.0, phase: 0.0 }),
            ("Alpha Rest", SignalPattern::Spindle {
                frequency: 10.0, amplitude: 30.0, envelope_frequency: 0.5, depth: 0.6
            }),
            ("Beta Focus", SignalPattern::Sinusoidal { frequency: 20.0, amplitude: 10.0, phase: 0.0 }),
            ("Gamma Burst", SignalPattern::Sinusoidal { frequency: 38.0, amplitude: 5.0, phase: 0.0 }),
            ("Sweep", SignalPattern::Chirp {
                start_frequency: 1.0, end_frequency: 45.0, amplitude: 20.0, duration: 10.0
            }),
        ]
    }
}

//! EEG-Simulation: synthetic EEG recordings with known artefacts
//!
//! Deterministic test signals for the cleaning pipeline: background rhythms,
//! mains interference, sensor noise and injected blink artefacts.

pub mod signal_patterns;
pub mod eeg_simulator;

pub use eeg_simulator::*;
pub use signal_patterns::*;

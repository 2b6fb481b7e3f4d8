//! Threshold-based artefact event detection

use eeg_core::{malformed_input, EngineResult, Signal};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArtefactKind {
    /// Large slow deflection over the amplitude threshold
    Blink,
    /// Sustained high-frequency activity over the variance threshold
    Muscle,
}

impl fmt::Display for ArtefactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtefactKind::Blink => f.write_str("blink"),
            ArtefactKind::Muscle => f.write_str("muscle"),
        }
    }
}

/// A detected artefact on one channel, `[start_time, end_time)` in seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtefactEvent {
    pub channel: usize,
    pub start_time: f64,
    pub end_time: f64,
    pub kind: ArtefactKind,
    /// Largest |x| inside the event
    pub peak_amplitude: f64,
}

impl ArtefactEvent {
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtefactSummary {
    pub blinks: usize,
    pub muscle: usize,
}

impl ArtefactSummary {
    pub fn total(&self) -> usize {
        self.blinks + self.muscle
    }
}

pub fn count_by_kind(events: &[ArtefactEvent]) -> ArtefactSummary {
    events.iter().fold(ArtefactSummary::default(), |mut acc, event| {
        match event.kind {
            ArtefactKind::Blink => acc.blinks += 1,
            ArtefactKind::Muscle => acc.muscle += 1,
        }
        acc
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// µV
    pub amplitude_threshold: f64,
    /// Seconds covered by the running variance
    pub variance_window: f64,
    /// µV² on the first difference; `None` disables muscle detection
    pub variance_threshold: Option<f64>,
    /// Candidate runs closer than this (seconds) merge into one event
    pub merge_gap: f64,
    /// Only scan `[start, end)` seconds
    pub time_bounds: Option<(f64, f64)>,
    /// Only scan these channels
    pub channels: Option<Vec<usize>>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            amplitude_threshold: 120.0,
            variance_window: 0.1,
            variance_threshold: Some(400.0),
            merge_gap: 0.5,
            time_bounds: None,
            channels: None,
        }
    }
}

impl DetectorConfig {
    /// Amplitude-only detection at `threshold` µV
    pub fn amplitude_only(threshold: f64) -> Self {
        Self {
            amplitude_threshold: threshold,
            variance_threshold: None,
            ..Self::default()
        }
    }

    pub fn with_time_bounds(mut self, start: f64, end: f64) -> Self {
        self.time_bounds = Some((start, end));
        self
    }

    pub fn with_channels(mut self, channels: Vec<usize>) -> Self {
        self.channels = Some(channels);
        self
    }

    pub fn validate(&self) -> EngineResult<()> {
        if !(self.amplitude_threshold.is_finite() && self.amplitude_threshold > 0.0) {
            return Err(malformed_input!("amplitude threshold must be positive, got {}", self.amplitude_threshold));
        }
        if !(self.variance_window.is_finite() && self.variance_window > 0.0) {
            return Err(malformed_input!("variance window must be positive, got {}", self.variance_window));
        }
        if let Some(threshold) = self.variance_threshold {
            if !(threshold.is_finite() && threshold > 0.0) {
                return Err(malformed_input!("variance threshold must be positive, got {}", threshold));
            }
        }
        if !(self.merge_gap.is_finite() && self.merge_gap >= 0.0) {
            return Err(malformed_input!("merge gap must be non-negative, got {}", self.merge_gap));
        }
        if let Some((start, end)) = self.time_bounds {
            if !(start.is_finite() && end.is_finite() && start < end) {
                return Err(malformed_input!("time bounds [{}, {}) are empty or not finite", start, end));
            }
        }
        Ok(())
    }
}

/// In-progress event while scanning one channel
struct OpenEvent {
    start: usize,
    last: usize,
    amplitude: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ArtefactDetector {
    config: DetectorConfig,
}

impl ArtefactDetector {
    pub fn new(config: DetectorConfig) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Scan with the configured amplitude threshold on every channel
    pub fn detect(&self, signal: &Signal) -> EngineResult<Vec<ArtefactEvent>> {
        let thresholds = vec![self.config.amplitude_threshold; signal.channel_count()];
        self.detect_with_thresholds(signal, &thresholds)
    }

    /// Scan with one amplitude threshold per channel
    pub fn detect_with_thresholds(&self, signal: &Signal, thresholds: &[f64]) -> EngineResult<Vec<ArtefactEvent>> {
        if thresholds.len() != signal.channel_count() {
            return Err(malformed_input!(
                "{} thresholds for {} channels",
                thresholds.len(),
                signal.channel_count()
            ));
        }

        let fs = signal.sampling_rate();
        let samples = signal.samples_per_channel();
        let (from, to) = match self.config.time_bounds {
            Some((start, end)) => (first_index_at(start, fs, samples), first_index_at(end, fs, samples)),
            None => (0, samples),
        };

        if let Some(filter) = &self.config.channels {
            if let Some(&bad) = filter.iter().find(|&&ch| ch >= signal.channel_count()) {
                return Err(malformed_input!(
                    "channel {} out of range (signal has {} channels)",
                    bad,
                    signal.channel_count()
                ));
            }
        }

        let mut events = Vec::new();
        for (channel, data) in signal.channels().enumerate() {
            if let Some(filter) = &self.config.channels {
                if !filter.contains(&channel) {
                    continue;
                }
            }
            let data = data.to_vec();
            self.scan_channel(&data, channel, fs, thresholds[channel], from, to, &mut events);
        }

        events.sort_by(|a, b| a.start_time.total_cmp(&b.start_time).then(a.channel.cmp(&b.channel)));
        Ok(events)
    }

    #[allow(clippy::too_many_arguments)]
    fn scan_channel(
        &self,
        data: &[f64],
        channel: usize,
        fs: f64,
        amplitude_threshold: f64,
        from: usize,
        to: usize,
        events: &mut Vec<ArtefactEvent>,
    ) {
        let muscle = self.muscle_candidates(data, fs);
        let max_gap = self.config.merge_gap * fs;
        let mut open: Option<OpenEvent> = None;

        for i in from..to {
            let amplitude = data[i].abs() > amplitude_threshold;
            if !amplitude && !muscle[i] {
                continue;
            }

            let extends = open
                .as_ref()
                .is_some_and(|event| is_continuation(i - event.last - 1, max_gap));
            if extends {
                if let Some(event) = open.as_mut() {
                    event.last = i;
                    event.amplitude |= amplitude;
                }
            } else {
                if let Some(event) = open.take() {
                    events.push(close_event(event, data, channel, fs));
                }
                open = Some(OpenEvent { start: i, last: i, amplitude });
            }
        }

        if let Some(event) = open {
            events.push(close_event(event, data, channel, fs));
        }
    }

    /// Samples whose trailing window of first differences exceeds the variance threshold
    fn muscle_candidates(&self, data: &[f64], fs: f64) -> Vec<bool> {
        let mut flags = vec![false; data.len()];
        let Some(threshold) = self.config.variance_threshold else {
            return flags;
        };
        if data.len() < 3 {
            return flags;
        }

        // Short recordings shrink the window to all available differences
        let window = ((self.config.variance_window * fs).round() as usize)
            .min(data.len() - 1)
            .max(2);
        let diffs: Vec<f64> = data.windows(2).map(|w| w[1] - w[0]).collect();
        let mut sum = 0.0;
        let mut sum_sq = 0.0;
        for (k, &d) in diffs.iter().enumerate() {
            sum += d;
            sum_sq += d * d;
            if k >= window {
                let old = diffs[k - window];
                sum -= old;
                sum_sq -= old * old;
            }
            if k + 1 >= window {
                let n = window as f64;
                let mean = sum / n;
                let variance = (sum_sq / n - mean * mean).max(0.0);
                if variance > threshold {
                    flags[k + 1] = true;
                }
            }
        }
        flags
    }
}

/// Adjacent candidates always join; otherwise the gap must be shorter than `max_gap` samples
fn is_continuation(gap: usize, max_gap: f64) -> bool {
    gap == 0 || (gap as f64) < max_gap
}

fn close_event(event: OpenEvent, data: &[f64], channel: usize, fs: f64) -> ArtefactEvent {
    let end = event.last + 1;
    let peak_amplitude = data[event.start..end].iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    ArtefactEvent {
        channel,
        start_time: event.start as f64 / fs,
        end_time: end as f64 / fs,
        kind: if event.amplitude { ArtefactKind::Blink } else { ArtefactKind::Muscle },
        peak_amplitude,
    }
}

/// First sample index whose time is at or after `t`, clamped to `samples`
fn first_index_at(t: f64, fs: f64, samples: usize) -> usize {
    if t <= 0.0 {
        return 0;
    }
    let index = (t * fs - 1e-9).ceil();
    (index as usize).min(samples)
}

//! Time-range revert and re-apply of cleaning results
//!
//! The recording is partitioned into contiguous segments, each either showing the
//! cleaned data (`Applied`) or the raw data (`Reverted`). Boundaries are sample
//! indices, so a time `t` maps to the first sample at or after `t`.

use eeg_core::{malformed_input, EngineError, EngineResult, Signal};
use ndarray::{s, Array2};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SegmentState {
    Applied,
    Reverted,
}

/// Samples `[start_sample, end_sample)` sharing one state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start_sample: usize,
    pub end_sample: usize,
    pub start_time: f64,
    pub end_time: f64,
    pub state: SegmentState,
}

impl Segment {
    fn new(start_sample: usize, end_sample: usize, state: SegmentState, fs: f64) -> Self {
        Self {
            start_sample,
            end_sample,
            start_time: start_sample as f64 / fs,
            end_time: end_sample as f64 / fs,
            state,
        }
    }

    pub fn len(&self) -> usize {
        self.end_sample - self.start_sample
    }

    pub fn is_empty(&self) -> bool {
        self.end_sample == self.start_sample
    }

    pub fn contains_sample(&self, index: usize) -> bool {
        index >= self.start_sample && index < self.end_sample
    }
}

/// Owns the raw and cleaned buffers and composes the current view from them
#[derive(Debug, Clone)]
pub struct SegmentRevertManager {
    raw: Signal,
    cleaned: Signal,
    current: Array2<f64>,
    segments: Vec<Segment>,
}

impl SegmentRevertManager {
    /// Start with the whole recording applied
    pub fn new(raw: Signal, cleaned: Signal) -> EngineResult<Self> {
        if raw.data().dim() != cleaned.data().dim() {
            return Err(malformed_input!(
                "raw {:?} and cleaned {:?} shapes differ",
                raw.data().dim(),
                cleaned.data().dim()
            ));
        }
        if raw.sampling_rate() != cleaned.sampling_rate() {
            return Err(malformed_input!(
                "raw ({} Hz) and cleaned ({} Hz) sampling rates differ",
                raw.sampling_rate(),
                cleaned.sampling_rate()
            ));
        }

        let samples = raw.samples_per_channel();
        let segments = vec![Segment::new(0, samples, SegmentState::Applied, raw.sampling_rate())];
        let current = cleaned.data().clone();

        Ok(Self {
            raw,
            cleaned,
            current,
            segments,
        })
    }

    /// Show raw data in `[start_time, end_time)`
    pub fn revert(&mut self, start_time: f64, end_time: f64) -> EngineResult<()> {
        self.mark(start_time, end_time, SegmentState::Reverted)
    }

    /// Show cleaned data in `[start_time, end_time)`
    pub fn reapply(&mut self, start_time: f64, end_time: f64) -> EngineResult<()> {
        self.mark(start_time, end_time, SegmentState::Applied)
    }

    fn mark(&mut self, start_time: f64, end_time: f64, state: SegmentState) -> EngineResult<()> {
        let (from, to) = self.sample_range(start_time, end_time)?;
        if from == to {
            debug!(start = start_time, end = end_time, "range holds no sample, nothing to mark");
            return Ok(());
        }

        let fs = self.raw.sampling_rate();
        let mut next: Vec<Segment> = Vec::with_capacity(self.segments.len() + 2);
        for seg in &self.segments {
            if seg.start_sample < from {
                push_merged(&mut next, Segment::new(seg.start_sample, seg.end_sample.min(from), seg.state, fs));
            }
            let overlap_start = seg.start_sample.max(from);
            let overlap_end = seg.end_sample.min(to);
            if overlap_start < overlap_end {
                push_merged(&mut next, Segment::new(overlap_start, overlap_end, state, fs));
            }
            if seg.end_sample > to {
                push_merged(&mut next, Segment::new(seg.start_sample.max(to), seg.end_sample, seg.state, fs));
            }
        }
        self.segments = next;

        let source = match state {
            SegmentState::Applied => &self.cleaned,
            SegmentState::Reverted => &self.raw,
        };
        self.current
            .slice_mut(s![.., from..to])
            .assign(&source.data().slice(s![.., from..to]));

        debug!(
            ?state,
            start = start_time,
            end = end_time,
            from,
            to,
            segments = self.segments.len(),
            "segment state updated"
        );
        Ok(())
    }

    /// Clamp to `[0, duration)` and convert to sample boundaries
    ///
    /// The range must be non-empty and overlap the recording. It may still fall
    /// between two samples, in which case `from == to`.
    fn sample_range(&self, start_time: f64, end_time: f64) -> EngineResult<(usize, usize)> {
        let duration = self.raw.duration();
        let out_of_range = || EngineError::OutOfRangeSegment {
            start: start_time,
            end: end_time,
            duration,
        };

        if !start_time.is_finite() || !end_time.is_finite() {
            return Err(out_of_range());
        }
        if start_time >= end_time || start_time >= duration || end_time <= 0.0 {
            return Err(out_of_range());
        }

        let samples = self.raw.samples_per_channel();
        let from = boundary_index(start_time.max(0.0), self.raw.sampling_rate(), samples);
        let to = boundary_index(end_time.min(duration), self.raw.sampling_rate(), samples);
        Ok((from, to.max(from)))
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn state_at(&self, t: f64) -> Option<SegmentState> {
        let index = self.raw.sample_index_at(t)?;
        self.segments.iter().find(|s| s.contains_sample(index)).map(|s| s.state)
    }

    /// Current value of `channel` at time `t`
    pub fn sample_at(&self, channel: usize, t: f64) -> EngineResult<f64> {
        if channel >= self.raw.channel_count() {
            return Err(malformed_input!(
                "channel {} out of range (signal has {} channels)",
                channel,
                self.raw.channel_count()
            ));
        }
        let index = self.raw.sample_index_at(t).ok_or(EngineError::OutOfRangeSegment {
            start: t,
            end: t,
            duration: self.raw.duration(),
        })?;
        Ok(self.current[[channel, index]])
    }

    pub fn current_data(&self) -> &Array2<f64> {
        &self.current
    }

    /// Composed view as a new signal
    pub fn current(&self) -> EngineResult<Signal> {
        self.cleaned.derive(self.current.clone())
    }

    pub fn raw(&self) -> &Signal {
        &self.raw
    }

    pub fn cleaned(&self) -> &Signal {
        &self.cleaned
    }

    /// Seconds currently showing raw data
    pub fn reverted_duration(&self) -> f64 {
        let samples: usize = self
            .segments
            .iter()
            .filter(|s| s.state == SegmentState::Reverted)
            .map(Segment::len)
            .sum();
        samples as f64 / self.raw.sampling_rate()
    }
}

/// Append, merging into the previous segment when the states match
fn push_merged(segments: &mut Vec<Segment>, segment: Segment) {
    if segment.is_empty() {
        return;
    }
    match segments.last_mut() {
        Some(last) if last.state == segment.state && last.end_sample == segment.start_sample => {
            last.end_sample = segment.end_sample;
            last.end_time = segment.end_time;
        }
        _ => segments.push(segment),
    }
}

/// First sample whose time is at or after `t`
fn boundary_index(t: f64, fs: f64, samples: usize) -> usize {
    let index = (t * fs - 1e-9).ceil().max(0.0) as usize;
    index.min(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use eeg_core::load;

    const FS: f64 = 256.0;

    fn manager() -> SegmentRevertManager {
        let raw: Vec<Vec<f64>> = (0..2)
            .map(|ch| (0..2560).map(|i| (i + ch * 10_000) as f64).collect())
            .collect();
        let cleaned: Vec<Vec<f64>> = raw.iter().map(|c| c.iter().map(|v| -v).collect()).collect();
        SegmentRevertManager::new(load(raw, FS).unwrap(), load(cleaned, FS).unwrap()).unwrap()
    }

    fn states(m: &SegmentRevertManager) -> Vec<(usize, usize, SegmentState)> {
        m.segments().iter().map(|s| (s.start_sample, s.end_sample, s.state)).collect()
    }

    #[test]
    fn test_starts_fully_applied() {
        let m = manager();
        assert_eq!(states(&m), vec![(0, 2560, SegmentState::Applied)]);
        assert!(m.current().unwrap().same_samples(m.cleaned()));
        assert_eq!(m.reverted_duration(), 0.0);
    }

    #[test]
    fn test_revert_range_shows_raw() {
        let mut m = manager();
        m.revert(1.0, 2.0).unwrap();

        assert_eq!(
            states(&m),
            vec![
                (0, 256, SegmentState::Applied),
                (256, 512, SegmentState::Reverted),
                (512, 2560, SegmentState::Applied),
            ]
        );
        for ch in 0..2 {
            for i in 0..2560 {
                let expected = if (256..512).contains(&i) {
                    m.raw().data()[[ch, i]]
                } else {
                    m.cleaned().data()[[ch, i]]
                };
                assert_eq!(m.current_data()[[ch, i]], expected);
            }
        }
        assert_eq!(m.state_at(1.5), Some(SegmentState::Reverted));
        assert_eq!(m.state_at(2.0), Some(SegmentState::Applied));
        assert_eq!(m.sample_at(1, 1.0).unwrap(), 10_256.0);
        assert_eq!(m.reverted_duration(), 1.0);
    }

    #[test]
    fn test_reapply_is_inverse_and_idempotent() {
        let mut m = manager();
        m.revert(1.0, 2.0).unwrap();
        let once = states(&m);
        m.revert(1.0, 2.0).unwrap();
        assert_eq!(states(&m), once);

        m.reapply(1.0, 2.0).unwrap();
        assert_eq!(states(&m), vec![(0, 2560, SegmentState::Applied)]);
        assert!(m.current().unwrap().same_samples(m.cleaned()));
    }

    #[test]
    fn test_overlapping_ranges_merge() {
        let mut m = manager();
        m.revert(1.0, 3.0).unwrap();
        m.revert(2.0, 4.0).unwrap();
        assert_eq!(
            states(&m),
            vec![
                (0, 256, SegmentState::Applied),
                (256, 1024, SegmentState::Reverted),
                (1024, 2560, SegmentState::Applied),
            ]
        );

        m.reapply(2.5, 3.0).unwrap();
        assert_eq!(states(&m).len(), 5);
        m.reapply(0.0, 10.0).unwrap();
        assert_eq!(states(&m), vec![(0, 2560, SegmentState::Applied)]);
    }

    #[test]
    fn test_ranges_are_clamped() {
        let mut m = manager();
        m.revert(-5.0, 0.5).unwrap();
        m.revert(9.5, 20.0).unwrap();
        assert_eq!(
            states(&m),
            vec![
                (0, 128, SegmentState::Reverted),
                (128, 2432, SegmentState::Applied),
                (2432, 2560, SegmentState::Reverted),
            ]
        );
        assert!(m.current_data()[[0, 2559]] > 0.0);
    }

    #[test]
    fn test_out_of_range_rejected() {
        let mut m = manager();
        for (start, end) in [(12.0, 15.0), (3.0, 3.0), (4.0, 2.0), (f64::NAN, 1.0), (-3.0, -1.0)] {
            assert!(
                matches!(m.revert(start, end), Err(EngineError::OutOfRangeSegment { .. })),
                "[{}, {}) should be rejected",
                start,
                end
            );
        }
        assert_eq!(states(&m), vec![(0, 2560, SegmentState::Applied)]);
        assert!(m.sample_at(0, 10.0).is_err());
        assert!(m.sample_at(2, 1.0).is_err());
    }

    #[test]
    fn test_range_between_samples_is_noop() {
        let mut m = manager();
        let before = m.current_data().clone();

        // both ends round up to sample 1 at 256 Hz
        m.revert(0.001, 0.002).unwrap();
        assert_eq!(states(&m), vec![(0, 2560, SegmentState::Applied)]);
        assert_eq!(m.current_data(), &before);

        m.revert(1.0, 2.0).unwrap();
        m.reapply(1.501, 1.502).unwrap();
        assert_eq!(
            states(&m),
            vec![
                (0, 256, SegmentState::Applied),
                (256, 512, SegmentState::Reverted),
                (512, 2560, SegmentState::Applied),
            ]
        );
    }

    #[test]
    fn test_mismatched_buffers_rejected() {
        let raw = load(vec![0.0; 100], FS).unwrap();
        let cleaned = load(vec![0.0; 99], FS).unwrap();
        assert!(SegmentRevertManager::new(raw, cleaned).is_err());
    }
}

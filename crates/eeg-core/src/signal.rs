//! Signal: immutable container for multi-channel EEG data

use crate::error::{EngineError, EngineResult};
use crate::malformed_input;
use crate::stats::ChannelStats;
use ndarray::{Array2, ArrayD, ArrayView1, Axis};
use std::sync::Arc;
use uuid::Uuid;

/// Multi-channel EEG recording, shaped `channels × samples`
///
/// Sample data sits behind an `Arc`, so cloning a `Signal` never copies
/// samples and a captured raw buffer cannot change underneath its readers.
/// Every processing stage builds a new `Signal` through [`Signal::derive`].
#[derive(Debug, Clone)]
pub struct Signal {
    id: Uuid,
    data: Arc<Array2<f64>>,
    sampling_rate: f64,
}

/// Raw sample layouts accepted by [`load`]
#[derive(Debug, Clone)]
pub enum SignalInput {
    /// One channel of samples
    Samples(Vec<f64>),
    /// One row per channel
    Channels(Vec<Vec<f64>>),
    /// Channel-major matrix
    Matrix(Array2<f64>),
    /// Arbitrary-rank array; only rank 1 and 2 are accepted
    Dynamic(ArrayD<f64>),
}

impl From<Vec<f64>> for SignalInput {
    fn from(samples: Vec<f64>) -> Self {
        SignalInput::Samples(samples)
    }
}

impl From<Vec<Vec<f64>>> for SignalInput {
    fn from(channels: Vec<Vec<f64>>) -> Self {
        SignalInput::Channels(channels)
    }
}

impl From<Array2<f64>> for SignalInput {
    fn from(matrix: Array2<f64>) -> Self {
        SignalInput::Matrix(matrix)
    }
}

impl From<ArrayD<f64>> for SignalInput {
    fn from(array: ArrayD<f64>) -> Self {
        SignalInput::Dynamic(array)
    }
}

/// Validate raw samples and wrap them in a [`Signal`]
pub fn load(raw_samples: impl Into<SignalInput>, sampling_rate: f64) -> EngineResult<Signal> {
    let data = match raw_samples.into() {
        SignalInput::Samples(samples) => {
            let len = samples.len();
            Array2::from_shape_vec((1, len), samples)
                .map_err(|e| malformed_input!("cannot shape samples: {}", e))?
        }
        SignalInput::Channels(rows) => {
            let channel_count = rows.len();
            let samples = rows.first().map(|r| r.len()).unwrap_or(0);
            if let Some((idx, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != samples) {
                return Err(malformed_input!(
                    "channel {} has {} samples, expected {}",
                    idx,
                    row.len(),
                    samples
                ));
            }
            let flat: Vec<f64> = rows.into_iter().flatten().collect();
            Array2::from_shape_vec((channel_count, samples), flat)
                .map_err(|e| malformed_input!("cannot shape channels: {}", e))?
        }
        SignalInput::Matrix(matrix) => matrix,
        SignalInput::Dynamic(array) => match array.ndim() {
            1 => {
                let len = array.len();
                array
                    .into_shape_with_order((1, len))
                    .map_err(|e| malformed_input!("cannot shape samples: {}", e))?
            }
            2 => array
                .into_dimensionality::<ndarray::Ix2>()
                .map_err(|e| malformed_input!("cannot shape matrix: {}", e))?,
            rank => return Err(malformed_input!("rank {} input, expected 1 or 2", rank)),
        },
    };

    Signal::new(data, sampling_rate)
}

impl Signal {
    /// Create a signal from a channel-major matrix
    pub fn new(data: Array2<f64>, sampling_rate: f64) -> EngineResult<Self> {
        Self::validate_sampling_rate(sampling_rate)?;

        let (channels, samples) = data.dim();
        if channels == 0 || samples == 0 {
            return Err(malformed_input!(
                "empty signal ({} channels, {} samples)",
                channels,
                samples
            ));
        }

        if let Some(((ch, idx), value)) = data.indexed_iter().find(|(_, v)| !v.is_finite()) {
            return Err(malformed_input!(
                "non-finite value {} at channel {}, sample {}",
                value,
                ch,
                idx
            ));
        }

        Ok(Signal {
            id: Uuid::new_v4(),
            data: Arc::new(data),
            sampling_rate,
        })
    }

    /// Build a signal from one vector per channel
    pub fn from_channels(channels: Vec<Vec<f64>>, sampling_rate: f64) -> EngineResult<Self> {
        load(channels, sampling_rate)
    }

    /// New signal with the same sampling rate and replaced samples
    pub fn derive(&self, data: Array2<f64>) -> EngineResult<Self> {
        if data.nrows() != self.channel_count() {
            return Err(malformed_input!(
                "derived signal has {} channels, source has {}",
                data.nrows(),
                self.channel_count()
            ));
        }
        Signal::new(data, self.sampling_rate)
    }

    pub fn validate_sampling_rate(rate: f64) -> EngineResult<()> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(EngineError::MalformedInput {
                reason: format!("sampling rate must be positive, got {}", rate),
            });
        }
        Ok(())
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Channel-major sample matrix
    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn channel(&self, index: usize) -> EngineResult<ArrayView1<'_, f64>> {
        if index >= self.channel_count() {
            return Err(malformed_input!(
                "channel index {} out of bounds (0-{})",
                index,
                self.channel_count() - 1
            ));
        }
        Ok(self.data.index_axis(Axis(0), index))
    }

    pub fn channels(&self) -> impl Iterator<Item = ArrayView1<'_, f64>> {
        self.data.axis_iter(Axis(0))
    }

    /// Total number of samples across all channels
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn channel_count(&self) -> usize {
        self.data.nrows()
    }

    pub fn samples_per_channel(&self) -> usize {
        self.data.ncols()
    }

    pub fn sampling_rate(&self) -> f64 {
        self.sampling_rate
    }

    pub fn nyquist(&self) -> f64 {
        self.sampling_rate / 2.0
    }

    /// Recording duration in seconds
    pub fn duration(&self) -> f64 {
        self.samples_per_channel() as f64 / self.sampling_rate
    }

    /// Time of a sample index in seconds
    pub fn time_of(&self, sample: usize) -> f64 {
        sample as f64 / self.sampling_rate
    }

    /// Index of the sample covering time `t`, if inside the recording
    pub fn sample_index_at(&self, t: f64) -> Option<usize> {
        if !t.is_finite() || t < 0.0 {
            return None;
        }
        let idx = (t * self.sampling_rate + 1e-9).floor() as usize;
        (idx < self.samples_per_channel()).then_some(idx)
    }

    /// Sample value of `channel` at time `t`
    pub fn value_at(&self, channel: usize, t: f64) -> EngineResult<f64> {
        let idx = self.sample_index_at(t).ok_or_else(|| EngineError::OutOfRangeSegment {
            start: t,
            end: t,
            duration: self.duration(),
        })?;
        Ok(self.channel(channel)?[idx])
    }

    pub fn time_vector(&self) -> Vec<f64> {
        (0..self.samples_per_channel()).map(|i| self.time_of(i)).collect()
    }

    /// All samples, channel after channel
    pub fn flattened(&self) -> Vec<f64> {
        self.data.iter().copied().collect()
    }

    pub fn channel_stats(&self, channel_index: usize) -> EngineResult<ChannelStats> {
        let data = self.channel(channel_index)?;
        Ok(ChannelStats::calculate(&data.to_vec()))
    }

    /// Copy of the samples in `[start_time, end_time)`
    pub fn slice_time(&self, start_time: f64, end_time: f64) -> EngineResult<Signal> {
        if start_time < 0.0 || end_time > self.duration() || start_time >= end_time {
            return Err(EngineError::OutOfRangeSegment {
                start: start_time,
                end: end_time,
                duration: self.duration(),
            });
        }

        let start_sample = (start_time * self.sampling_rate).ceil() as usize;
        let end_sample = ((end_time * self.sampling_rate).ceil() as usize).min(self.samples_per_channel());
        if start_sample >= end_sample {
            return Err(EngineError::OutOfRangeSegment {
                start: start_time,
                end: end_time,
                duration: self.duration(),
            });
        }

        let sliced = self.data.slice(ndarray::s![.., start_sample..end_sample]).to_owned();
        Signal::new(sliced, self.sampling_rate)
    }

    /// True when both signals hold bit-identical samples at the same rate
    pub fn same_samples(&self, other: &Signal) -> bool {
        self.sampling_rate == other.sampling_rate
            && self.data.dim() == other.data.dim()
            && self
                .data
                .iter()
                .zip(other.data.iter())
                .all(|(a, b)| a.to_bits() == b.to_bits())
    }
}

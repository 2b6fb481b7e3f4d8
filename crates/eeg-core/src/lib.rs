//! EEG-Core: Foundation types for EEG cleaning and evaluation
//!
//! Signal container, channel statistics, error types and the flat-array /
//! delimited-text persistence formats shared by the processing crates.

pub mod signal;
pub mod stats;
pub mod error;
pub mod persist;

pub use signal::*;
pub use stats::{ChannelStats, Moments};
pub use error::{EngineError, EngineResult};
pub use persist::{read_csv, read_npy, write_csv, write_npy};

//! Constant-Q spectral analysis of audio.
//!
//! Samples are framed with a fixed hop, each frame is transformed with a
//! radix-2 FFT and projected through a sparse spectral kernel into
//! logarithmically spaced frequency bins (a fixed number per octave). The
//! result is a time series of per-bin magnitudes that can be looked up by
//! position in seconds.

pub mod audio;
pub mod config;
pub mod cqt;
pub mod encode;
pub mod error;
pub mod pitch;

pub use audio::analysis::{AnalysisSettings, Analyzer};
pub use cqt::{ConstantQSeries, KernelParams, Notification, SparseKernel, ThreadedBackend};
pub use error::{CqtError, Result};

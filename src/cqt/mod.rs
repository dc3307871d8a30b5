//! Constant-Q transform engine.

pub mod accumulator;
pub mod backend;
pub mod complex;
pub mod fft;
pub mod kernel;
pub mod series;
pub mod transform;

pub use accumulator::{CellWrite, SeriesAccumulator};
pub use backend::{
    collect_incremental, Backend, BackendJob, BackendMessage, Notification, ThreadedBackend,
};
pub use complex::Complex;
pub use fft::fft;
pub use kernel::{build_kernel, hamming, KernelEntry, KernelParams, SparseKernel};
pub use series::{assemble_series, frame_count, ConstantQSeries};
pub use transform::{apply_kernel, bin_sums, FrameBuffer};

use super::complex::Complex;
use super::fft::fft;
use super::kernel::SparseKernel;
use crate::error::{CqtError, Result};

/// Complex constant-Q accumulators for one frame.
///
/// Runs the FFT over `frame[..kernel.fft_size()]` in place, so the caller's
/// samples are destroyed. Copy the frame first if it is needed again.
pub fn bin_sums(frame: &mut [Complex], kernel: &SparseKernel) -> Result<Vec<Complex>> {
    if frame.len() < kernel.fft_size() {
        return Err(CqtError::BufferTooShort {
            len: frame.len(),
            required: kernel.fft_size(),
        });
    }
    let spectrum = fft(frame, kernel.fft_size())?;

    Ok(kernel
        .rows()
        .iter()
        .map(|row| {
            row.iter().fold(Complex::ZERO, |total, entry| {
                total + spectrum[entry.fft_index] * entry.multiplier
            })
        })
        .collect())
}

/// Per-bin magnitudes for one frame. Destroys `frame` like [`bin_sums`].
pub fn apply_kernel(frame: &mut [Complex], kernel: &SparseKernel) -> Result<Vec<f64>> {
    Ok(bin_sums(frame, kernel)?
        .into_iter()
        .map(Complex::magnitude)
        .collect())
}

/// Scratch buffer owned by exactly one analysis loop or worker.
///
/// Each call to [`FrameBuffer::analyze`] consumes the loaded samples, so a
/// frame must be reloaded before it is analyzed again.
pub struct FrameBuffer {
    data: Vec<Complex>,
}

impl FrameBuffer {
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![Complex::ZERO; size],
        }
    }

    pub fn for_kernel(kernel: &SparseKernel) -> Self {
        Self::new(kernel.fft_size())
    }

    /// Copies `samples` into the real parts and zeroes everything else.
    pub fn load(&mut self, samples: &[f64]) {
        for (slot, &s) in self.data.iter_mut().zip(samples.iter()) {
            *slot = Complex::from_real(s);
        }
        for slot in self.data.iter_mut().skip(samples.len()) {
            *slot = Complex::ZERO;
        }
    }

    pub fn analyze(&mut self, kernel: &SparseKernel) -> Result<Vec<f64>> {
        apply_kernel(&mut self.data, kernel)
    }
}

//! Sparse constant-Q kernel construction.
//!
//! Follows Brown & Puckette's efficient constant-Q algorithm: each bin's
//! temporal kernel (a Hamming-windowed complex exponential at the bin's
//! center frequency) is moved to the frequency domain once, and only the
//! coefficients above a magnitude threshold are kept. Applying the kernel
//! to a frame then costs one FFT plus one multiply per kept coefficient.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;

use super::complex::Complex;
use super::fft::fft;
use crate::error::{CqtError, Result};

/// One sparse coefficient contributing to a constant-Q bin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KernelEntry {
    pub fft_index: usize,
    pub multiplier: Complex,
}

impl fmt::Display for KernelEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{ index: {}, multiplier: {} }}", self.fft_index, self.multiplier)
    }
}

/// Inputs that fully determine a kernel.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct KernelParams {
    pub sample_rate: f64,
    pub min_frequency: f64,
    pub max_frequency: f64,
    pub bins_per_octave: u32,
    pub threshold: f64,
}

impl KernelParams {
    pub fn validate(&self) -> Result<()> {
        let positive = |name: &str, value: f64| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(CqtError::InvalidParameter(format!(
                    "{} must be positive and finite, got {}",
                    name, value
                )))
            }
        };
        positive("sample rate", self.sample_rate)?;
        positive("minimum frequency", self.min_frequency)?;
        positive("maximum frequency", self.max_frequency)?;

        if self.max_frequency <= self.min_frequency {
            return Err(CqtError::InvalidParameter(format!(
                "maximum frequency {} must exceed minimum frequency {}",
                self.max_frequency, self.min_frequency
            )));
        }
        if self.bins_per_octave == 0 {
            return Err(CqtError::InvalidParameter(
                "bins per octave must be at least 1".into(),
            ));
        }
        if !(self.threshold.is_finite() && self.threshold >= 0.0) {
            return Err(CqtError::InvalidParameter(format!(
                "threshold must be non-negative, got {}",
                self.threshold
            )));
        }
        Ok(())
    }

    /// Quality factor: ratio of center frequency to bandwidth, constant
    /// across bins.
    pub fn q(&self) -> f64 {
        1.0 / (2f64.powf(1.0 / self.bins_per_octave as f64) - 1.0)
    }

    pub fn bin_count(&self) -> usize {
        (self.bins_per_octave as f64 * (self.max_frequency / self.min_frequency).log2()).ceil()
            as usize
    }

    /// Smallest power of two that holds the window of the lowest bin.
    pub fn fft_size(&self) -> usize {
        let longest = (self.q() * self.sample_rate / self.min_frequency).ceil() as usize;
        longest.max(1).next_power_of_two()
    }

    pub fn bin_frequency(&self, bin: usize) -> f64 {
        self.min_frequency * 2f64.powf(bin as f64 / self.bins_per_octave as f64)
    }

    /// Center frequencies of every bin, lowest first.
    pub fn bin_frequencies(&self) -> Vec<f64> {
        (0..self.bin_count()).map(|k| self.bin_frequency(k)).collect()
    }
}

/// Per-bin sparse coefficients applied to an FFT of size `fft_size`.
///
/// Row `k` analyzes `params.bin_frequency(k)`; entries within a row are in
/// ascending FFT index order.
#[derive(Clone, Debug, PartialEq)]
pub struct SparseKernel {
    rows: Vec<Vec<KernelEntry>>,
    fft_size: usize,
    bin_count: usize,
    params: KernelParams,
}

impl SparseKernel {
    pub fn rows(&self) -> &[Vec<KernelEntry>] {
        &self.rows
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn bin_count(&self) -> usize {
        self.bin_count
    }

    pub fn params(&self) -> &KernelParams {
        &self.params
    }

    /// Total number of kept coefficients across all bins.
    pub fn entry_count(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }

    pub fn bin_frequency(&self, bin: usize) -> f64 {
        self.params.bin_frequency(bin)
    }
}

impl fmt::Display for SparseKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "SparseKernel {{ size: {}, bins: {} }}", self.fft_size, self.bin_count)?;
        for (bin, row) in self.rows.iter().enumerate() {
            write!(f, "  [{:3}] {:8.2} Hz:", bin, self.bin_frequency(bin))?;
            for entry in row {
                write!(f, " {}", entry)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Hamming window of `len` samples.
///
/// A single-sample window is `[1.0]`; zero or negative lengths fail.
pub fn hamming(len: i64) -> Result<Vec<f64>> {
    if len <= 0 {
        return Err(CqtError::InvalidWindowLength(len));
    }
    if len == 1 {
        return Ok(vec![1.0]);
    }
    let last = (len - 1) as f64;
    Ok((0..len)
        .map(|n| 0.54 - 0.46 * (2.0 * PI * n as f64 / last).cos())
        .collect())
}

/// Builds the sparse kernel for `params`.
pub fn build_kernel(params: &KernelParams) -> Result<SparseKernel> {
    params.validate()?;

    let q = params.q();
    let bin_count = params.bin_count();
    let fft_size = params.fft_size();
    let fs = params.sample_rate;
    let bins = params.bins_per_octave as f64;

    let mut scratch = vec![Complex::ZERO; fft_size];
    let mut rows: Vec<Vec<KernelEntry>> = vec![Vec::new(); bin_count];

    // Highest bin first: its window is the shortest.
    for k in (1..=bin_count).rev() {
        let len = ((q * fs) / (params.min_frequency * 2f64.powf((k - 1) as f64 / bins))).ceil()
            as i64;
        let window = hamming(len)?;
        let len = window.len();

        for (j, (slot, w)) in scratch.iter_mut().zip(window.iter()).enumerate() {
            let phase = 2.0 * PI * q * j as f64 / len as f64;
            *slot = Complex::from_real(w / len as f64) * Complex::exp_i(phase);
        }
        for slot in scratch.iter_mut().skip(len) {
            *slot = Complex::ZERO;
        }

        let spectrum = fft(&mut scratch, fft_size)?;
        rows[k - 1] = spectrum
            .iter()
            .enumerate()
            .filter(|(_, coef)| coef.magnitude() > params.threshold)
            .map(|(fft_index, coef)| KernelEntry {
                fft_index,
                multiplier: coef.conjugate() / fft_size as f64,
            })
            .collect();
    }

    let kernel = SparseKernel {
        rows,
        fft_size,
        bin_count,
        params: *params,
    };
    log::debug!(
        "Sparse kernel: fft_size={}, bins={}, Q={:.3}, entries={} ({:.2}% dense)",
        fft_size,
        bin_count,
        q,
        kernel.entry_count(),
        100.0 * kernel.entry_count() as f64 / (fft_size * bin_count.max(1)) as f64
    );
    Ok(kernel)
}

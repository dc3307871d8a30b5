//! Iterative radix-2 Cooley-Tukey FFT.

use std::f64::consts::PI;

use super::complex::Complex;
use crate::error::{CqtError, Result};

/// Transforms the first `n` values of `buffer` in place into their discrete
/// Fourier transform and returns that same prefix.
///
/// Pre-state: `buffer[..n]` holds the time-domain sequence.
/// Post-state: `buffer[..n]` holds the spectrum; values past `n` are untouched.
///
/// `n` must be a power of two and `buffer` must hold at least `n` values.
pub fn fft(buffer: &mut [Complex], n: usize) -> Result<&mut [Complex]> {
    if !n.is_power_of_two() {
        return Err(CqtError::InvalidSize(n));
    }
    if buffer.len() < n {
        return Err(CqtError::BufferTooShort {
            len: buffer.len(),
            required: n,
        });
    }

    let data = &mut buffer[..n];
    if n < 2 {
        return Ok(data);
    }

    bit_reverse_permute(data);

    let mut len = 2;
    while len <= n {
        let half = len / 2;
        for k in 0..half {
            let w = Complex::exp_i(-2.0 * PI * k as f64 / len as f64);
            for start in (0..n).step_by(len) {
                let even = data[start + k];
                let tau = w * data[start + k + half];
                data[start + k + half] = even - tau;
                data[start + k] = even + tau;
            }
        }
        len *= 2;
    }

    Ok(data)
}

/// Reorders `data` so each element lands at the bit-reversed position of its
/// index. `data.len()` must be a power of two of at least 2.
fn bit_reverse_permute(data: &mut [Complex]) {
    let bits = data.len().trailing_zeros();
    let shift = usize::BITS - bits;
    for i in 0..data.len() {
        let j = i.reverse_bits() >> shift;
        if j > i {
            data.swap(i, j);
        }
    }
}

use serde::Serialize;

use super::kernel::SparseKernel;
use super::transform::FrameBuffer;
use crate::error::{CqtError, Result};

/// Per-frame constant-Q magnitudes over the whole source, addressable by
/// elapsed time.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ConstantQSeries {
    frames: Vec<Vec<f64>>,
    frame_duration: f64,
}

impl ConstantQSeries {
    /// Every frame must have the same number of bins and `frame_duration`
    /// must be positive.
    pub fn new(frames: Vec<Vec<f64>>, frame_duration: f64) -> Result<Self> {
        if !(frame_duration.is_finite() && frame_duration > 0.0) {
            return Err(CqtError::InvalidParameter(format!(
                "frame duration must be positive, got {}",
                frame_duration
            )));
        }
        if let Some(first) = frames.first() {
            let bins = first.len();
            if let Some(pos) = frames.iter().position(|f| f.len() != bins) {
                return Err(CqtError::InvalidParameter(format!(
                    "frame {} has {} bins, expected {}",
                    pos,
                    frames[pos].len(),
                    bins
                )));
            }
        }
        Ok(Self {
            frames,
            frame_duration,
        })
    }

    pub fn frames(&self) -> &[Vec<f64>] {
        &self.frames
    }

    pub fn frame_duration(&self) -> f64 {
        self.frame_duration
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn bin_count(&self) -> usize {
        self.frames.first().map_or(0, Vec::len)
    }

    pub fn duration(&self) -> f64 {
        self.frames.len() as f64 * self.frame_duration
    }

    /// Frame index for `seconds`, clamped into the series. Negative and NaN
    /// positions resolve to the first frame.
    pub fn index_at(&self, seconds: f64) -> Option<usize> {
        if self.frames.is_empty() {
            return None;
        }
        let raw = (seconds / self.frame_duration).floor();
        let index = if raw.is_nan() || raw <= 0.0 {
            0
        } else {
            (raw as usize).min(self.frames.len() - 1)
        };
        Some(index)
    }

    pub fn frame_at(&self, seconds: f64) -> Option<&[f64]> {
        self.index_at(seconds).map(|i| self.frames[i].as_slice())
    }

    /// Repeats the last frame until the series covers `total_seconds`.
    /// Returns the number of frames added. An empty series stays empty.
    pub fn pad_to_duration(&mut self, total_seconds: f64) -> usize {
        let Some(last) = self.frames.last().cloned() else {
            return 0;
        };
        let expected = expected_frames(total_seconds, self.frame_duration);
        let missing = expected.saturating_sub(self.frames.len());
        self.frames.extend(std::iter::repeat(last).take(missing));
        missing
    }
}

/// `ceil(total / frame)` where a ratio within 1e-9 of an integer counts as
/// that integer, so `1.0 / 0.1` gives 10 rather than 11.
fn expected_frames(total_seconds: f64, frame_duration: f64) -> usize {
    if !(total_seconds.is_finite() && total_seconds > 0.0) {
        return 0;
    }
    let ratio = total_seconds / frame_duration;
    let nearest = ratio.round();
    if (ratio - nearest).abs() < 1e-9 {
        nearest as usize
    } else {
        ratio.ceil() as usize
    }
}

/// Number of full windows of `window` samples, spaced `hop` apart, that fit
/// in `len` samples. A trailing partial window is not counted.
pub fn frame_count(len: usize, window: usize, hop: usize) -> usize {
    if hop == 0 || len < window {
        0
    } else {
        (len - window) / hop + 1
    }
}

/// Slides the kernel across `samples` every `hop_size` samples and pads the
/// result to the duration of the buffer.
pub fn assemble_series(
    samples: &[f64],
    sample_rate: f64,
    kernel: &SparseKernel,
    hop_size: usize,
) -> Result<ConstantQSeries> {
    if hop_size == 0 {
        return Err(CqtError::InvalidParameter("hop size must be at least 1".into()));
    }
    if !(sample_rate.is_finite() && sample_rate > 0.0) {
        return Err(CqtError::InvalidParameter(format!(
            "sample rate must be positive, got {}",
            sample_rate
        )));
    }

    let window = kernel.fft_size();
    let total = frame_count(samples.len(), window, hop_size);
    let mut buffer = FrameBuffer::for_kernel(kernel);
    let mut frames = Vec::with_capacity(total);

    for start in (0..total).map(|i| i * hop_size) {
        buffer.load(&samples[start..start + window]);
        frames.push(buffer.analyze(kernel)?);
    }

    let mut series = ConstantQSeries::new(frames, hop_size as f64 / sample_rate)?;
    let padded = series.pad_to_duration(samples.len() as f64 / sample_rate);
    log::debug!(
        "Assembled {} frames ({} computed, {} padded), hop={} samples",
        series.len(),
        total,
        padded,
        hop_size
    );
    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cqt::kernel::{build_kernel, KernelParams};

    fn numbered(count: usize, bins: usize) -> Vec<Vec<f64>> {
        (0..count).map(|i| vec![i as f64; bins]).collect()
    }

    #[test]
    fn time_lookup_clamps() {
        let series = ConstantQSeries::new(numbered(10, 3), 0.1).unwrap();
        assert_eq!(series.frame_at(0.0).unwrap()[0], 0.0);
        assert_eq!(series.frame_at(0.05).unwrap()[0], 0.0);
        assert_eq!(series.frame_at(0.99).unwrap()[0], 9.0);
        assert_eq!(series.frame_at(-5.0).unwrap()[0], 0.0);
        assert_eq!(series.frame_at(1000.0).unwrap()[0], 9.0);
        assert_eq!(series.index_at(f64::NAN), Some(0));
    }

    #[test]
    fn empty_series_has_no_frames() {
        let mut series = ConstantQSeries::new(Vec::new(), 0.1).unwrap();
        assert!(series.frame_at(0.5).is_none());
        assert_eq!(series.pad_to_duration(1.0), 0);
        assert!(series.is_empty());
    }

    #[test]
    fn padding_repeats_last_frame() {
        let mut series = ConstantQSeries::new(numbered(9, 4), 0.1).unwrap();
        assert_eq!(series.pad_to_duration(1.0), 1);
        assert_eq!(series.len(), 10);
        assert_eq!(series.frames()[9], series.frames()[8]);

        // already long enough
        assert_eq!(series.pad_to_duration(0.5), 0);
        assert_eq!(series.len(), 10);
    }

    #[test]
    fn padding_rounds_partial_frames_up() {
        let mut series = ConstantQSeries::new(numbered(2, 1), 0.25).unwrap();
        series.pad_to_duration(1.1);
        assert_eq!(series.len(), 5);
    }

    #[test]
    fn rejects_ragged_frames() {
        let frames = vec![vec![1.0, 2.0], vec![1.0]];
        assert!(ConstantQSeries::new(frames, 0.1).is_err());
        assert!(ConstantQSeries::new(numbered(2, 2), 0.0).is_err());
    }

    #[test]
    fn counts_full_windows_only() {
        assert_eq!(frame_count(1000, 128, 100), 9);
        assert_eq!(frame_count(128, 128, 100), 1);
        assert_eq!(frame_count(127, 128, 100), 0);
        assert_eq!(frame_count(1000, 128, 0), 0);
    }

    #[test]
    fn assembled_series_is_padded_to_buffer_duration() {
        // Q ≈ 11.04 at 8 bins/octave: 11.04 * 1000 / 100 -> 128-point FFT,
        // so a one second buffer with a 100 sample hop yields 9 full windows.
        let kernel = build_kernel(&KernelParams {
            sample_rate: 1000.0,
            min_frequency: 100.0,
            max_frequency: 400.0,
            bins_per_octave: 8,
            threshold: 0.0054,
        })
        .unwrap();
        assert_eq!(kernel.fft_size(), 128);

        let samples: Vec<f64> = (0..1000)
            .map(|i| (2.0 * std::f64::consts::PI * 200.0 * i as f64 / 1000.0).sin())
            .collect();
        let series = assemble_series(&samples, 1000.0, &kernel, 100).unwrap();

        assert!((series.frame_duration() - 0.1).abs() < 1e-12);
        assert_eq!(series.len(), 10);
        assert_eq!(series.frames()[9], series.frames()[8]);
        assert_eq!(series.bin_count(), kernel.bin_count());
    }

    #[test]
    fn short_buffer_gives_empty_series() {
        let kernel = build_kernel(&KernelParams {
            sample_rate: 1000.0,
            min_frequency: 100.0,
            max_frequency: 400.0,
            bins_per_octave: 8,
            threshold: 0.0054,
        })
        .unwrap();
        let series = assemble_series(&[0.0; 64], 1000.0, &kernel, 100).unwrap();
        assert!(series.is_empty());
        assert!(assemble_series(&[0.0; 64], 1000.0, &kernel, 0).is_err());
    }
}

//! Incremental analysis: a producer computes frames elsewhere and streams
//! them back as messages, the consumer assembles the series.

use rayon::prelude::*;
use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;
use std::thread;

use super::accumulator::SeriesAccumulator;
use super::kernel::{build_kernel, KernelParams};
use super::series::{frame_count, ConstantQSeries};
use super::transform::FrameBuffer;
use crate::error::{CqtError, Result};

/// Progress notifications for one analysis request. Exactly one `Complete`
/// or `Error` ends each request.
#[derive(Clone, Debug)]
pub enum Notification {
    Loading {
        stage: String,
        /// Fraction in `[0, 1]` when the stage is measurable.
        completion: Option<f64>,
    },
    Complete(Arc<ConstantQSeries>),
    Error(String),
}

impl Notification {
    pub fn loading(stage: &str, completion: Option<f64>) -> Self {
        Notification::Loading {
            stage: stage.to_string(),
            completion,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Notification::Loading { .. })
    }
}

/// Sends a notification if someone is listening. A dropped receiver only
/// means nobody wants progress any more.
pub fn notify(progress: Option<&Sender<Notification>>, notification: Notification) {
    if let Some(tx) = progress {
        let _ = tx.send(notification);
    }
}

pub const STAGE_KERNEL: &str = "Calculating sparse kernel";
pub const STAGE_FRAMES: &str = "Parsing constant-Q data";

/// Messages from a backend to the consumer.
#[derive(Clone, Debug, PartialEq)]
pub enum BackendMessage {
    KernelStarted,
    /// Sent once, before any frame data.
    KernelReady { total_frames: usize, bin_count: usize },
    Cell { frame: usize, bin: usize, value: f64 },
    /// Whole frames, row-major, starting at `first_frame`.
    Block {
        first_frame: usize,
        bin_count: usize,
        values: Vec<f64>,
    },
    Failed(String),
}

/// Everything a backend needs to compute one series.
#[derive(Clone, Debug)]
pub struct BackendJob {
    pub samples: Arc<[f64]>,
    pub params: KernelParams,
    pub hop_size: usize,
}

/// A producer of frame data. `start` returns as soon as the work is under
/// way; results arrive on `tx`.
pub trait Backend: Send + Sync {
    fn name(&self) -> &str;

    fn start(&self, job: BackendJob, tx: Sender<BackendMessage>) -> Result<()>;
}

/// Computes frames on a background thread, fanning contiguous chunks of
/// frames out over the rayon pool.
pub struct ThreadedBackend {
    workers: usize,
}

impl ThreadedBackend {
    /// `workers == 0` uses the size of the rayon pool.
    pub fn new(workers: usize) -> Self {
        let workers = if workers == 0 {
            rayon::current_num_threads()
        } else {
            workers
        };
        Self { workers }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }
}

impl Default for ThreadedBackend {
    fn default() -> Self {
        Self::new(0)
    }
}

/// Splits `total` frames into at most `workers` contiguous `(start, end)`
/// ranges of near-equal size. Empty ranges are dropped.
pub fn chunk_ranges(total: usize, workers: usize) -> Vec<(usize, usize)> {
    let workers = workers.max(1);
    let mut ranges = Vec::with_capacity(workers);
    let mut start = 0;
    for w in 0..workers {
        let end = ((w + 1) * total).div_ceil(workers);
        if end > start {
            ranges.push((start, end));
        }
        start = end;
    }
    ranges
}

impl Backend for ThreadedBackend {
    fn name(&self) -> &str {
        "threaded"
    }

    fn start(&self, job: BackendJob, tx: Sender<BackendMessage>) -> Result<()> {
        let workers = self.workers;
        thread::Builder::new()
            .name("pitchgram-backend".into())
            .spawn(move || run_threaded(job, workers, tx))
            .map_err(|e| CqtError::BackendFailure(format!("failed to spawn backend: {}", e)))?;
        Ok(())
    }
}

fn run_threaded(job: BackendJob, workers: usize, tx: Sender<BackendMessage>) {
    let _ = tx.send(BackendMessage::KernelStarted);
    let kernel = match build_kernel(&job.params) {
        Ok(kernel) => Arc::new(kernel),
        Err(e) => {
            let _ = tx.send(BackendMessage::Failed(e.to_string()));
            return;
        }
    };

    let window = kernel.fft_size();
    let bin_count = kernel.bin_count();
    let total_frames = frame_count(job.samples.len(), window, job.hop_size);
    let _ = tx.send(BackendMessage::KernelReady {
        total_frames,
        bin_count,
    });

    let ranges = chunk_ranges(total_frames, workers);
    log::debug!(
        "Backend: {} frames across {} chunks (fft_size={}, hop={})",
        total_frames,
        ranges.len(),
        window,
        job.hop_size
    );

    ranges.into_par_iter().for_each_with(tx, |tx, (start, end)| {
        let mut buffer = FrameBuffer::for_kernel(&kernel);
        let mut values = Vec::with_capacity((end - start) * bin_count);
        for frame in start..end {
            let offset = frame * job.hop_size;
            buffer.load(&job.samples[offset..offset + window]);
            match buffer.analyze(&kernel) {
                Ok(magnitudes) => values.extend(magnitudes),
                Err(e) => {
                    let _ = tx.send(BackendMessage::Failed(e.to_string()));
                    return;
                }
            }
        }
        let _ = tx.send(BackendMessage::Block {
            first_frame: start,
            bin_count,
            values,
        });
    });
}

/// Consumes backend messages until every announced frame has arrived, then
/// returns the series padded to `total_seconds`.
pub fn collect_incremental(
    rx: &Receiver<BackendMessage>,
    frame_duration: f64,
    total_seconds: f64,
    progress: Option<&Sender<Notification>>,
) -> Result<ConstantQSeries> {
    let mut acc: Option<SeriesAccumulator> = None;

    loop {
        if let Some(ref a) = acc {
            if a.is_complete() {
                break;
            }
        }

        let message = rx.recv().map_err(|_| {
            CqtError::BackendFailure("backend disconnected before completion".into())
        })?;

        match message {
            BackendMessage::KernelStarted => {
                notify(progress, Notification::loading(STAGE_KERNEL, None));
            }
            BackendMessage::KernelReady {
                total_frames,
                bin_count,
            } => {
                if acc.is_some() {
                    return Err(CqtError::BackendFailure(
                        "frame total announced twice".into(),
                    ));
                }
                log::debug!("Backend announced {} frames of {} bins", total_frames, bin_count);
                acc = Some(SeriesAccumulator::new(total_frames, bin_count)?);
                notify(progress, Notification::loading(STAGE_FRAMES, Some(0.0)));
            }
            BackendMessage::Cell { frame, bin, value } => {
                let a = announced(&mut acc)?;
                let before = a.complete_frames();
                a.record(frame, bin, value);
                if a.complete_frames() != before {
                    notify(progress, Notification::loading(STAGE_FRAMES, Some(a.completion())));
                }
            }
            BackendMessage::Block {
                first_frame,
                bin_count,
                values,
            } => {
                let a = announced(&mut acc)?;
                if bin_count != a.bin_count() {
                    return Err(CqtError::BackendFailure(format!(
                        "block has {} bins, expected {}",
                        bin_count,
                        a.bin_count()
                    )));
                }
                let before = a.complete_frames();
                a.record_block(first_frame, &values);
                if a.complete_frames() != before {
                    notify(progress, Notification::loading(STAGE_FRAMES, Some(a.completion())));
                }
            }
            BackendMessage::Failed(message) => return Err(CqtError::BackendFailure(message)),
        }
    }

    let acc = acc.ok_or_else(|| CqtError::BackendFailure("no frame total announced".into()))?;
    if acc.ignored() > 0 {
        log::warn!("Ignored {} out-of-range cells from backend", acc.ignored());
    }
    let mut series = ConstantQSeries::new(acc.into_frames()?, frame_duration)?;
    series.pad_to_duration(total_seconds);
    Ok(series)
}

fn announced(acc: &mut Option<SeriesAccumulator>) -> Result<&mut SeriesAccumulator> {
    acc.as_mut()
        .ok_or_else(|| CqtError::BackendFailure("frame data arrived before frame total".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cqt::kernel::build_kernel;
    use crate::cqt::series::assemble_series;
    use std::sync::mpsc::channel;

    fn params() -> KernelParams {
        KernelParams {
            sample_rate: 1000.0,
            min_frequency: 100.0,
            max_frequency: 400.0,
            bins_per_octave: 8,
            threshold: 0.0054,
        }
    }

    fn samples() -> Arc<[f64]> {
        (0..1000)
            .map(|i| {
                let t = i as f64 / 1000.0;
                (2.0 * std::f64::consts::PI * 150.0 * t).sin() * (1.0 + t)
            })
            .collect()
    }

    #[test]
    fn chunks_cover_all_frames() {
        assert_eq!(chunk_ranges(10, 3), vec![(0, 4), (4, 7), (7, 10)]);
        assert_eq!(chunk_ranges(2, 4), vec![(0, 1), (1, 2)]);
        assert!(chunk_ranges(0, 4).is_empty());
        assert_eq!(chunk_ranges(5, 0), vec![(0, 5)]);
    }

    #[test]
    fn threaded_matches_batch() {
        let samples = samples();
        let kernel = build_kernel(&params()).unwrap();
        let expected = assemble_series(&samples, 1000.0, &kernel, 100).unwrap();

        let (tx, rx) = channel();
        let backend = ThreadedBackend::new(3);
        backend
            .start(
                BackendJob {
                    samples: samples.clone(),
                    params: params(),
                    hop_size: 100,
                },
                tx,
            )
            .unwrap();
        let series = collect_incremental(&rx, 0.1, 1.0, None).unwrap();
        assert_eq!(series, expected);
    }

    #[test]
    fn tolerates_shuffled_and_duplicate_cells() {
        let (tx, rx) = channel();
        tx.send(BackendMessage::KernelStarted).unwrap();
        tx.send(BackendMessage::KernelReady {
            total_frames: 2,
            bin_count: 2,
        })
        .unwrap();
        let cells = [
            (1, 1, 0.5),
            (0, 1, 7.0),
            (9, 0, 1.0),
            (0, 1, 2.0),
            (1, 0, 3.0),
            (0, 0, 1.0),
        ];
        for (frame, bin, value) in cells {
            tx.send(BackendMessage::Cell { frame, bin, value }).unwrap();
        }

        let (ptx, prx) = channel();
        let series = collect_incremental(&rx, 0.25, 1.0, Some(&ptx)).unwrap();
        assert_eq!(series.len(), 4);
        assert_eq!(series.frames()[0], vec![1.0, 2.0]);
        assert_eq!(series.frames()[1], vec![3.0, 0.5]);
        assert_eq!(series.frames()[3], vec![3.0, 0.5]);

        drop(ptx);
        let updates: Vec<Notification> = prx.iter().collect();
        assert!(updates.iter().all(|n| !n.is_terminal()));
        // kernel start, frame total, then one update per completed frame
        assert_eq!(updates.len(), 4);
        assert!(matches!(
            updates.last(),
            Some(Notification::Loading { completion: Some(c), .. }) if *c == 1.0
        ));
    }

    #[test]
    fn waits_for_announced_total() {
        let (tx, rx) = channel();
        tx.send(BackendMessage::KernelReady {
            total_frames: 2,
            bin_count: 1,
        })
        .unwrap();
        tx.send(BackendMessage::Cell { frame: 0, bin: 0, value: 1.0 }).unwrap();
        drop(tx);
        assert!(matches!(
            collect_incremental(&rx, 0.1, 0.2, None),
            Err(CqtError::BackendFailure(_))
        ));
    }

    #[test]
    fn oversized_total_is_a_backend_failure() {
        let (tx, rx) = channel();
        tx.send(BackendMessage::KernelReady {
            total_frames: usize::MAX / 2,
            bin_count: 4,
        })
        .unwrap();
        assert!(matches!(
            collect_incremental(&rx, 0.1, 1.0, None),
            Err(CqtError::BackendFailure(_))
        ));
    }

    #[test]
    fn overflowing_block_is_ignored() {
        let (tx, rx) = channel();
        tx.send(BackendMessage::KernelReady {
            total_frames: 1,
            bin_count: 1,
        })
        .unwrap();
        tx.send(BackendMessage::Block {
            first_frame: usize::MAX,
            bin_count: 1,
            values: vec![1.0, 2.0],
        })
        .unwrap();
        tx.send(BackendMessage::Cell { frame: 0, bin: 0, value: 3.0 }).unwrap();

        let series = collect_incremental(&rx, 0.5, 1.0, None).unwrap();
        assert_eq!(series.frames(), &[vec![3.0], vec![3.0]]);
    }

    #[test]
    fn failure_message_is_a_backend_failure() {
        let (tx, rx) = channel();
        tx.send(BackendMessage::KernelStarted).unwrap();
        tx.send(BackendMessage::Failed("out of memory".into())).unwrap();
        assert_eq!(
            collect_incremental(&rx, 0.1, 1.0, None).unwrap_err(),
            CqtError::BackendFailure("out of memory".into())
        );
    }

    #[test]
    fn data_before_total_is_rejected() {
        let (tx, rx) = channel();
        tx.send(BackendMessage::Cell { frame: 0, bin: 0, value: 1.0 }).unwrap();
        assert!(matches!(
            collect_incremental(&rx, 0.1, 1.0, None),
            Err(CqtError::BackendFailure(_))
        ));
    }

    #[test]
    fn invalid_params_fail_through_the_channel() {
        let mut bad = params();
        bad.bins_per_octave = 0;
        let (tx, rx) = channel();
        ThreadedBackend::new(2)
            .start(
                BackendJob {
                    samples: samples(),
                    params: bad,
                    hop_size: 100,
                },
                tx,
            )
            .unwrap();
        assert!(matches!(
            collect_incremental(&rx, 0.1, 1.0, None),
            Err(CqtError::BackendFailure(_))
        ));
    }
}

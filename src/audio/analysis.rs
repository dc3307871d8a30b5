use std::sync::mpsc::{channel, Sender};
use std::sync::Arc;

use super::decode::AudioData;
use crate::cqt::backend::{notify, STAGE_FRAMES, STAGE_KERNEL};
use crate::cqt::{
    assemble_series, build_kernel, collect_incremental, Backend, BackendJob, ConstantQSeries,
    KernelParams, Notification,
};
use crate::error::{CqtError, Result};
use crate::pitch;

pub const DEFAULT_BINS_PER_OCTAVE: u32 = 24;
pub const DEFAULT_THRESHOLD: f64 = 0.0054;
pub const DEFAULT_FPS: u32 = 16;
pub const MAX_FPS: u32 = 32;

/// User-facing analysis parameters; the sample rate comes from the source.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnalysisSettings {
    pub min_frequency: f64,
    pub max_frequency: f64,
    pub bins_per_octave: u32,
    pub threshold: f64,
    pub fps: u32,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            min_frequency: pitch::default_min().frequency,
            max_frequency: pitch::default_max().frequency,
            bins_per_octave: DEFAULT_BINS_PER_OCTAVE,
            threshold: DEFAULT_THRESHOLD,
            fps: DEFAULT_FPS,
        }
    }
}

impl AnalysisSettings {
    /// Samples between frame starts: `floor(sample_rate / fps)`, at least 1.
    pub fn hop_size(&self, sample_rate: u32) -> usize {
        ((sample_rate / self.fps.max(1)) as usize).max(1)
    }

    pub fn frame_duration(&self, sample_rate: u32) -> f64 {
        self.hop_size(sample_rate) as f64 / sample_rate as f64
    }

    pub fn kernel_params(&self, sample_rate: u32) -> KernelParams {
        KernelParams {
            sample_rate: sample_rate as f64,
            min_frequency: self.min_frequency,
            max_frequency: self.max_frequency,
            bins_per_octave: self.bins_per_octave,
            threshold: self.threshold,
        }
    }
}

/// Runs one analysis, optionally through an incremental backend with the
/// batch path as fallback.
pub struct Analyzer {
    settings: AnalysisSettings,
    backend: Option<Box<dyn Backend>>,
}

impl Analyzer {
    pub fn new(settings: AnalysisSettings) -> Self {
        Self {
            settings,
            backend: None,
        }
    }

    pub fn with_backend(mut self, backend: Box<dyn Backend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn settings(&self) -> &AnalysisSettings {
        &self.settings
    }

    /// Computes the series for `audio`. When `progress` is given it receives
    /// any number of `Loading` updates followed by exactly one `Complete` or
    /// `Error`.
    pub fn analyze(
        &self,
        audio: &AudioData,
        progress: Option<&Sender<Notification>>,
    ) -> Result<Arc<ConstantQSeries>> {
        match self.run(audio, progress) {
            Ok(series) => {
                let series = Arc::new(series);
                notify(progress, Notification::Complete(Arc::clone(&series)));
                Ok(series)
            }
            Err(e) => {
                notify(progress, Notification::Error(e.to_string()));
                Err(e)
            }
        }
    }

    fn run(
        &self,
        audio: &AudioData,
        progress: Option<&Sender<Notification>>,
    ) -> Result<ConstantQSeries> {
        if audio.sample_rate == 0 {
            return Err(CqtError::InvalidParameter("sample rate must be positive".into()));
        }

        if let Some(backend) = &self.backend {
            match self.run_incremental(backend.as_ref(), audio, progress) {
                Ok(series) => return Ok(series),
                Err(CqtError::BackendFailure(reason)) => {
                    log::warn!(
                        "{} backend failed ({}), recomputing synchronously",
                        backend.name(),
                        reason
                    );
                }
                Err(e) => return Err(e),
            }
        }

        self.run_batch(audio, progress)
    }

    fn run_incremental(
        &self,
        backend: &dyn Backend,
        audio: &AudioData,
        progress: Option<&Sender<Notification>>,
    ) -> Result<ConstantQSeries> {
        let sr = audio.sample_rate;
        log::info!("Running constant-Q analysis on {} backend", backend.name());

        let (tx, rx) = channel();
        backend.start(
            BackendJob {
                samples: Arc::from(audio.samples.as_slice()),
                params: self.settings.kernel_params(sr),
                hop_size: self.settings.hop_size(sr),
            },
            tx,
        )?;

        collect_incremental(&rx, self.settings.frame_duration(sr), audio.duration(), progress)
    }

    fn run_batch(
        &self,
        audio: &AudioData,
        progress: Option<&Sender<Notification>>,
    ) -> Result<ConstantQSeries> {
        let sr = audio.sample_rate;
        let hop = self.settings.hop_size(sr);

        log::info!("Pass 1: Building sparse kernel...");
        notify(progress, Notification::loading(STAGE_KERNEL, None));
        let kernel = build_kernel(&self.settings.kernel_params(sr))?;

        log::info!(
            "Pass 2: Per-frame constant-Q (fft_size={}, bins={}, hop={})...",
            kernel.fft_size(),
            kernel.bin_count(),
            hop
        );
        notify(progress, Notification::loading(STAGE_FRAMES, None));
        assemble_series(&audio.samples, sr as f64, &kernel, hop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cqt::{BackendMessage, ThreadedBackend};
    use std::f64::consts::PI;
    use std::sync::mpsc::Receiver;

    struct FailingBackend;

    impl Backend for FailingBackend {
        fn name(&self) -> &str {
            "failing"
        }

        fn start(&self, _job: BackendJob, tx: Sender<BackendMessage>) -> Result<()> {
            tx.send(BackendMessage::KernelStarted).unwrap();
            tx.send(BackendMessage::Failed("worker crashed".into())).unwrap();
            Ok(())
        }
    }

    fn small_settings() -> AnalysisSettings {
        AnalysisSettings {
            min_frequency: 100.0,
            max_frequency: 400.0,
            bins_per_octave: 8,
            threshold: DEFAULT_THRESHOLD,
            fps: 10,
        }
    }

    fn tone(freq: f64, sample_rate: u32, seconds: f64) -> AudioData {
        let len = (sample_rate as f64 * seconds) as usize;
        AudioData {
            samples: (0..len)
                .map(|i| (2.0 * PI * freq * i as f64 / sample_rate as f64).sin())
                .collect(),
            sample_rate,
        }
    }

    fn terminal_count(rx: Receiver<Notification>) -> (usize, Vec<Notification>) {
        let all: Vec<Notification> = rx.iter().collect();
        (all.iter().filter(|n| n.is_terminal()).count(), all)
    }

    #[test]
    fn hop_and_frame_duration() {
        let settings = AnalysisSettings::default();
        assert_eq!(settings.hop_size(44100), 2756);
        assert!((settings.frame_duration(44100) - 2756.0 / 44100.0).abs() < 1e-15);

        let params = settings.kernel_params(44100);
        assert_eq!(params.min_frequency, 65.41);
        assert_eq!(params.max_frequency, 1046.5);
        assert_eq!(params.bin_count(), 96);
        assert_eq!(params.fft_size(), 32768);
    }

    #[test]
    fn backend_failure_falls_back_to_batch() {
        let audio = tone(200.0, 1000, 1.0);
        let batch = Analyzer::new(small_settings()).analyze(&audio, None).unwrap();

        let (tx, rx) = channel();
        let analyzer = Analyzer::new(small_settings()).with_backend(Box::new(FailingBackend));
        let series = analyzer.analyze(&audio, Some(&tx)).unwrap();
        drop(tx);

        assert_eq!(*series, *batch);
        let (terminals, all) = terminal_count(rx);
        assert_eq!(terminals, 1);
        assert!(matches!(all.last(), Some(Notification::Complete(_))));
    }

    #[test]
    fn threaded_backend_matches_batch() {
        let audio = tone(150.0, 1000, 1.3);
        let batch = Analyzer::new(small_settings()).analyze(&audio, None).unwrap();
        let threaded = Analyzer::new(small_settings())
            .with_backend(Box::new(ThreadedBackend::new(4)))
            .analyze(&audio, None)
            .unwrap();
        assert_eq!(*threaded, *batch);
        assert_eq!(threaded.len(), 13);
    }

    #[test]
    fn invalid_settings_end_with_single_error() {
        let mut settings = small_settings();
        settings.max_frequency = 10.0;
        let audio = tone(200.0, 1000, 1.0);

        let (tx, rx) = channel();
        let result = Analyzer::new(settings)
            .with_backend(Box::new(ThreadedBackend::new(2)))
            .analyze(&audio, Some(&tx));
        drop(tx);

        assert!(matches!(result, Err(CqtError::InvalidParameter(_))));
        let (terminals, all) = terminal_count(rx);
        assert_eq!(terminals, 1);
        assert!(matches!(all.last(), Some(Notification::Error(_))));
    }

    #[test]
    fn a440_peaks_at_nearest_bin() {
        let settings = AnalysisSettings::default();
        let audio = tone(440.0, 44100, 1.5);
        let series = Analyzer::new(settings)
            .with_backend(Box::new(ThreadedBackend::default()))
            .analyze(&audio, None)
            .unwrap();

        let params = settings.kernel_params(44100);
        let expected_bin = (0..params.bin_count())
            .min_by(|&a, &b| {
                (params.bin_frequency(a) - 440.0)
                    .abs()
                    .total_cmp(&(params.bin_frequency(b) - 440.0).abs())
            })
            .unwrap();
        assert_eq!(pitch::nearest(params.bin_frequency(expected_bin)).to_string(), "A4");

        assert!(!series.is_empty());
        assert!((series.duration() - 1.5).abs() < series.frame_duration());
        for frame in series.frames() {
            let peak = frame
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(b.1))
                .map(|(i, _)| i)
                .unwrap();
            assert_eq!(peak, expected_bin);
        }
    }
}

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::mpsc::{channel, Receiver};
use std::thread;

use cli::Cli;
use pitchgram::audio::decode::decode_audio;
use pitchgram::config::{self, AnalysisConfig};
use pitchgram::cqt::{ConstantQSeries, KernelParams, Notification, ThreadedBackend};
use pitchgram::encode::json::{write_series, SeriesDocument};
use pitchgram::pitch;
use pitchgram::Analyzer;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut cli = Cli::parse();
    let mut threaded = !cli.sync;

    if let Some(path) = config::find_config(cli.config.as_deref()) {
        if let Some(cfg) = config::load_config(&path) {
            log::info!("Loaded config from {}", path.display());
            // Config values apply only when the CLI is at its default
            if cli.min_note.is_none() { cli.min_note = cfg.analysis.min_note; }
            if cli.max_note.is_none() { cli.max_note = cfg.analysis.max_note; }
            if cli.min_freq.is_none() { cli.min_freq = cfg.analysis.min_frequency; }
            if cli.max_freq.is_none() { cli.max_freq = cfg.analysis.max_frequency; }
            if cli.bins == 24 { cli.bins = cfg.analysis.bins_per_octave; }
            if cli.threshold == 0.0054 { cli.threshold = cfg.analysis.threshold; }
            if cli.fps == 16 { cli.fps = cfg.analysis.fps; }
            if cli.workers == 0 { cli.workers = cfg.backend.workers; }
            if !cli.pretty { cli.pretty = cfg.output.pretty; }
            threaded = threaded && cfg.backend.threaded;
        } else {
            log::warn!("Failed to load config from {}", path.display());
        }
    }

    if cli.list_pitches {
        println!("{:<6} {:>10}", "Pitch", "Hz");
        for p in pitch::table() {
            println!("{:<6} {:>10.2}", p.to_string(), p.frequency);
        }
        return Ok(());
    }

    let input = cli.input.as_ref().context("Input audio file is required")?;
    if !input.exists() {
        anyhow::bail!("Input file not found: {}", input.display());
    }

    let settings = AnalysisConfig {
        min_note: cli.min_note.clone(),
        max_note: cli.max_note.clone(),
        min_frequency: cli.min_freq,
        max_frequency: cli.max_freq,
        bins_per_octave: cli.bins,
        threshold: cli.threshold,
        fps: cli.fps,
    }
    .to_settings();

    log::info!("pitchgram - constant-Q pitch analysis");
    log::info!("Input: {}", input.display());
    log::info!("Output: {}", cli.output.display());
    log::info!(
        "Range: {:.2}-{:.2}Hz, {} bins/octave @ {}fps",
        settings.min_frequency,
        settings.max_frequency,
        settings.bins_per_octave,
        settings.fps
    );

    // 1. Decode audio
    log::info!("Decoding audio...");
    let audio = decode_audio(input)?;

    // 2. Analyze
    let mut analyzer = Analyzer::new(settings);
    if threaded {
        let backend = ThreadedBackend::new(cli.workers);
        log::info!("Threaded backend: {} workers", backend.workers());
        analyzer = analyzer.with_backend(Box::new(backend));
    }

    let (tx, rx) = channel();
    let series = thread::scope(|s| {
        let audio = &audio;
        let analyzer = &analyzer;
        let worker = s.spawn(move || analyzer.analyze(audio, Some(&tx)));
        show_progress(&rx)?;
        worker
            .join()
            .map_err(|_| anyhow::anyhow!("Analysis thread panicked"))?
            .map_err(anyhow::Error::from)
    })?;

    // 3. Write
    let params = analyzer.settings().kernel_params(audio.sample_rate);
    let doc = SeriesDocument::new(input, audio.sample_rate, audio.duration(), &params, &series);
    write_series(&cli.output, &doc, cli.pretty)?;

    if cli.summary {
        print_summary(&series, &params, audio.duration());
    }

    log::info!("Done! {} frames of {} bins", series.len(), series.bin_count());
    Ok(())
}

/// Drives a progress bar from analysis notifications until the request ends.
fn show_progress(rx: &Receiver<Notification>) -> Result<()> {
    let pb = ProgressBar::new(1000);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {percent:>3}% {msg}")?
            .progress_chars("=>-"),
    );

    for notification in rx.iter() {
        match notification {
            Notification::Loading { stage, completion } => {
                pb.set_message(stage);
                if let Some(c) = completion {
                    pb.set_position((c.clamp(0.0, 1.0) * 1000.0) as u64);
                }
            }
            Notification::Complete(_) => {
                pb.finish_with_message("Analysis complete");
                break;
            }
            Notification::Error(e) => {
                pb.abandon_with_message(format!("Analysis failed: {}", e));
                break;
            }
        }
    }
    Ok(())
}

/// Prints the strongest bin's nearest pitch once per second.
fn print_summary(series: &ConstantQSeries, params: &KernelParams, duration: f64) {
    println!("{:>7}  {:<5} {:>10}", "Time", "Pitch", "Hz");
    let seconds = duration.ceil() as usize;
    for second in 0..seconds {
        let Some(frame) = series.frame_at(second as f64) else {
            break;
        };
        let peak = frame
            .iter()
            .enumerate()
            .filter(|(_, m)| **m > 0.0)
            .max_by(|a, b| a.1.total_cmp(b.1));
        match peak {
            Some((bin, _)) => {
                let frequency = params.bin_frequency(bin);
                let p = pitch::nearest(frequency);
                println!("{:>6}s  {:<5} {:>10.2}", second, p.to_string(), frequency);
            }
            None => println!("{:>6}s  {:<5} {:>10}", second, "-", "-"),
        }
    }
}

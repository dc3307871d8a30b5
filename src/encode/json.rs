use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::cqt::{ConstantQSeries, KernelParams};

/// Serialized form of one analysis.
#[derive(Debug, Serialize)]
pub struct SeriesDocument<'a> {
    pub source: String,
    pub sample_rate: u32,
    pub duration_seconds: f64,
    pub bins_per_octave: u32,
    pub min_frequency: f64,
    pub max_frequency: f64,
    pub fft_size: usize,
    pub bin_frequencies: Vec<f64>,
    pub frame_duration_seconds: f64,
    pub frames: &'a [Vec<f64>],
}

impl<'a> SeriesDocument<'a> {
    pub fn new(
        source: &Path,
        sample_rate: u32,
        duration_seconds: f64,
        params: &KernelParams,
        series: &'a ConstantQSeries,
    ) -> Self {
        Self {
            source: source.display().to_string(),
            sample_rate,
            duration_seconds,
            bins_per_octave: params.bins_per_octave,
            min_frequency: params.min_frequency,
            max_frequency: params.max_frequency,
            fft_size: params.fft_size(),
            bin_frequencies: params.bin_frequencies(),
            frame_duration_seconds: series.frame_duration(),
            frames: series.frames(),
        }
    }
}

pub fn write_document<W: Write>(writer: W, doc: &SeriesDocument, pretty: bool) -> Result<()> {
    if pretty {
        serde_json::to_writer_pretty(writer, doc)?;
    } else {
        serde_json::to_writer(writer, doc)?;
    }
    Ok(())
}

pub fn write_series(path: &Path, doc: &SeriesDocument, pretty: bool) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    write_document(&mut writer, doc, pretty)
        .with_context(|| format!("Failed to write series to {}", path.display()))?;
    writer.flush().context("Failed to flush output")?;
    log::info!("Wrote {} frames to {}", doc.frames.len(), path.display());
    Ok(())
}

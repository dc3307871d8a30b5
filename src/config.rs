use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::audio::analysis::{
    AnalysisSettings, DEFAULT_BINS_PER_OCTAVE, DEFAULT_FPS, DEFAULT_THRESHOLD, MAX_FPS,
};
use crate::pitch::Pitch;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize)]
pub struct AnalysisConfig {
    /// Note name such as "C2"; wins over `min_frequency`.
    #[serde(default)]
    pub min_note: Option<String>,
    #[serde(default)]
    pub max_note: Option<String>,
    #[serde(default)]
    pub min_frequency: Option<f64>,
    #[serde(default)]
    pub max_frequency: Option<f64>,
    #[serde(default = "default_bins_per_octave")]
    pub bins_per_octave: u32,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default = "default_fps")]
    pub fps: u32,
}

#[derive(Debug, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_threaded")]
    pub threaded: bool,
    /// 0 uses the rayon pool size.
    #[serde(default)]
    pub workers: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub pretty: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_note: None,
            max_note: None,
            min_frequency: None,
            max_frequency: None,
            bins_per_octave: default_bins_per_octave(),
            threshold: default_threshold(),
            fps: default_fps(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            threaded: default_threaded(),
            workers: 0,
        }
    }
}

fn default_bins_per_octave() -> u32 { DEFAULT_BINS_PER_OCTAVE }
fn default_threshold() -> f64 { DEFAULT_THRESHOLD }
fn default_fps() -> u32 { DEFAULT_FPS }
fn default_threaded() -> bool { true }

impl AnalysisConfig {
    /// Resolves note names and frequencies into analysis settings. Unknown
    /// note names are reported and the frequency fallback is used.
    pub fn to_settings(&self) -> AnalysisSettings {
        let defaults = AnalysisSettings::default();
        AnalysisSettings {
            min_frequency: resolve_bound(self.min_note.as_deref(), self.min_frequency)
                .unwrap_or(defaults.min_frequency),
            max_frequency: resolve_bound(self.max_note.as_deref(), self.max_frequency)
                .unwrap_or(defaults.max_frequency),
            bins_per_octave: self.bins_per_octave,
            threshold: self.threshold,
            fps: self.fps.clamp(1, MAX_FPS),
        }
    }
}

/// Frequency for a bound given as a note name and/or a raw frequency. The
/// note name takes precedence.
pub fn resolve_bound(note: Option<&str>, frequency: Option<f64>) -> Option<f64> {
    if let Some(name) = note {
        match name.parse::<Pitch>() {
            Ok(p) => return Some(p.frequency),
            Err(e) => log::warn!("{}", e),
        }
    }
    frequency
}

pub fn parse_config(content: &str) -> Option<Config> {
    match toml::from_str(content) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            log::warn!("Invalid config: {}", e);
            None
        }
    }
}

pub fn load_config(path: &Path) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    parse_config(&content)
}

/// Explicit path, then `pitchgram.toml` in the working directory, then the
/// user config locations.
pub fn find_config(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from("pitchgram.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("pitchgram").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("pitchgram").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pitchgram", about = "Constant-Q pitch analysis of audio files")]
pub struct Cli {
    /// Input audio file (WAV, MP3, FLAC, AAC)
    pub input: Option<PathBuf>,

    /// Output JSON file
    #[arg(short, long, default_value = "constantq.json")]
    pub output: PathBuf,

    /// Config file (defaults to pitchgram.toml or the user config dir)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Lowest analyzed pitch, e.g. C2
    #[arg(long)]
    pub min_note: Option<String>,

    /// Highest analyzed pitch, e.g. C6
    #[arg(long)]
    pub max_note: Option<String>,

    /// Lowest analyzed frequency in Hz (ignored when --min-note is set)
    #[arg(long)]
    pub min_freq: Option<f64>,

    /// Highest analyzed frequency in Hz (ignored when --max-note is set)
    #[arg(long)]
    pub max_freq: Option<f64>,

    /// Bins per octave
    #[arg(long, default_value_t = 24)]
    pub bins: u32,

    /// Sparse kernel magnitude threshold
    #[arg(long, default_value_t = 0.0054)]
    pub threshold: f64,

    /// Analysis frames per second (1-32)
    #[arg(long, default_value_t = 16)]
    pub fps: u32,

    /// Worker threads for the threaded backend (0 = all cores)
    #[arg(long, default_value_t = 0)]
    pub workers: usize,

    /// Compute on the calling thread only
    #[arg(long)]
    pub sync: bool,

    /// Pretty-print the JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Print the dominant pitch for each second of audio
    #[arg(long)]
    pub summary: bool,

    /// List the pitch reference table and exit
    #[arg(long)]
    pub list_pitches: bool,
}

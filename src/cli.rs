//! Command-line interface for dubsh
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Resumable, segment-oriented audio dubbing pipeline
#[derive(Parser, Debug)]
#[command(
    name = "dubsh",
    version,
    about = "Resumable, segment-oriented audio dubbing pipeline"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress output (quiet mode)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: boundary and retry details, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Parse a duration string into milliseconds.
///
/// Bare numbers are milliseconds; anything else uses `humantime`
/// (`500ms`, `1s`, `4m`, `1m30s`).
pub fn parse_duration_ms(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if let Ok(ms) = s.parse::<u64>() {
        return Ok(ms);
    }
    humantime::parse_duration(s)
        .map(|d| d.as_millis().min(u64::MAX as u128) as u64)
        .map_err(|e| e.to_string())
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Split a WAV recording into numbered segments at silences
    SplitAudio {
        /// Input WAV file
        input: PathBuf,

        /// Directory receiving 001.wav, 002.wav, ...
        #[arg(long, short = 'o', value_name = "DIR")]
        out_dir: PathBuf,

        /// Minimum segment length (e.g. 4m, 240000)
        #[arg(long, value_name = "DURATION", value_parser = parse_duration_ms)]
        min: Option<u64>,

        /// Maximum segment length (e.g. 6m, 360000)
        #[arg(long, value_name = "DURATION", value_parser = parse_duration_ms)]
        max: Option<u64>,

        /// Keep long silences instead of trimming them first
        #[arg(long)]
        no_trim: bool,
    },

    /// Split a labeled transcript into turn-preserving text segments
    SplitText {
        /// Input transcript
        input: PathBuf,

        /// Directory receiving 001.txt, 002.txt, ...
        #[arg(long, short = 'o', value_name = "DIR")]
        out_dir: PathBuf,

        /// Maximum characters per segment
        #[arg(long, value_name = "N")]
        max_chars: Option<usize>,
    },

    /// Merge each speaker block into one line ahead of synthesis
    Clean {
        /// Input dialogue
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(long, short = 'o', value_name = "PATH")]
        output: Option<PathBuf>,
    },

    /// Repair speaker labels and restore breaks between speakers
    Normalize {
        /// Input text
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(long, short = 'o', value_name = "PATH")]
        output: Option<PathBuf>,
    },

    /// Concatenate numbered WAV results in order
    MergeAudio {
        /// Directory holding the results
        dir: PathBuf,

        /// Output WAV file
        #[arg(long, short = 'o', value_name = "PATH")]
        output: PathBuf,

        /// Silence between consecutive segments (e.g. 1s, 500ms)
        #[arg(long, value_name = "DURATION", value_parser = parse_duration_ms)]
        pause: Option<u64>,
    },

    /// Concatenate numbered text results in order
    MergeText {
        /// Directory holding the results
        dir: PathBuf,

        /// Output file
        #[arg(long, short = 'o', value_name = "PATH")]
        output: PathBuf,

        /// Precede each chunk with a `=== CHUNK name ===` line
        #[arg(long)]
        markers: bool,
    },

    /// Show persisted results and failures in a result directory
    Status {
        /// Directory holding the results
        dir: PathBuf,

        /// Result file extension
        #[arg(long, default_value = "txt")]
        ext: String,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Inspect configuration
    Config {
        /// Action to perform
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the configuration file path
    Path,
}

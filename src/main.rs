use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use dubsh::cli::{Cli, Commands, ConfigAction};
use dubsh::config::Config;
use dubsh::pipeline::{
    Artifact, ArtifactSink, ArtifactSource, FileSink, FileSource, Merger, Payload, Segment,
    SegmentStore,
};
use dubsh::stages::{prepare_audio, prepare_transcript};
use dubsh::text::{TagNormalizer, clean_dialogue};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);
    log::debug!("dubsh {}", dubsh::version_string());

    match cli.command {
        Commands::SplitAudio {
            input,
            out_dir,
            min,
            max,
            no_trim,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(min) = min {
                config.audio.min_segment_ms = min;
            }
            if let Some(max) = max {
                config.audio.max_segment_ms = max;
            }
            if no_trim {
                config.audio.trim_silence = false;
            }
            config.validate()?;

            let segments = prepare_audio(&config, &FileSource::new(&input))
                .with_context(|| format!("Failed to split {}", input.display()))?;
            let store = SegmentStore::open(&out_dir, "wav")?;
            let (written, kept) = persist_segments(&store, &segments)?;
            report_split(cli.quiet, written, kept, &out_dir);
        }
        Commands::SplitText {
            input,
            out_dir,
            max_chars,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(max_chars) = max_chars {
                config.text.max_chars = max_chars;
            }
            config.validate()?;

            let segments = prepare_transcript(&config, &FileSource::new(&input))
                .with_context(|| format!("Failed to split {}", input.display()))?;
            let store = SegmentStore::open(&out_dir, "txt")?;
            let (written, kept) = persist_segments(&store, &segments)?;
            report_split(cli.quiet, written, kept, &out_dir);
        }
        Commands::Clean { input, output } => {
            let config = load_config(cli.config.as_deref())?;
            let text = FileSource::new(&input).read_text()?;
            let cleaned = clean_dialogue(&text, &config.label_grammar()?);
            emit_text(&cleaned, output.as_deref())?;
        }
        Commands::Normalize { input, output } => {
            let config = load_config(cli.config.as_deref())?;
            let text = FileSource::new(&input).read_text()?;
            let normalized = TagNormalizer::new(config.label_grammar()?).normalize(&text);
            emit_text(&normalized, output.as_deref())?;
        }
        Commands::MergeAudio { dir, output, pause } => {
            let config = load_config(cli.config.as_deref())?;
            let merger = Merger::new(
                pause.unwrap_or(config.merge.pause_ms),
                config.merge.separator.clone(),
            );
            let store = SegmentStore::open(&dir, "wav")?;
            let merged = merger.merge_audio(&store)?;
            let duration_ms = merged.duration_ms();
            FileSink::new(&output).write(&Artifact::Audio(merged))?;
            if !cli.quiet {
                eprintln!(
                    "{} {} ({:.1} s)",
                    "Merged audio saved to".green(),
                    output.display(),
                    duration_ms as f64 / 1000.0
                );
            }
        }
        Commands::MergeText {
            dir,
            output,
            markers,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let merger = config
                .merger()
                .with_chunk_markers(markers || config.merge.chunk_markers)
                .with_normalizer(TagNormalizer::new(config.label_grammar()?));
            let store = SegmentStore::open(&dir, "txt")?;
            let merged = merger.merge_text(&store)?;
            FileSink::new(&output).write(&Artifact::Text(merged))?;
            if !cli.quiet {
                eprintln!("{} {}", "Merged text saved to".green(), output.display());
            }
        }
        Commands::Status { dir, ext, json } => {
            let status = SegmentStore::open(&dir, &ext)?.status()?;
            if json {
                println!("{}", status.to_json()?);
            } else {
                println!("{}", status.dir.display().bold());
                println!("  {} {}", "Completed:".green(), status.persisted.len());
                for id in &status.persisted {
                    println!("    {}.{}", id, status.extension);
                }
                if status.failed.is_empty() {
                    println!("  {} 0", "Failed:".dimmed());
                } else {
                    println!("  {} {}", "Failed:".red(), status.failed.len());
                    for id in &status.failed {
                        println!("    {}", id);
                    }
                }
            }
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let config = load_config(cli.config.as_deref())?;
                print!("{}", config.to_toml()?);
            }
            ConfigAction::Path => {
                let path = cli.config.unwrap_or_else(Config::default_path);
                println!("{}", path.display());
            }
        },
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "dubsh",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}

/// Route library logs to stderr; `RUST_LOG` takes precedence over the flags.
fn init_logging(quiet: bool, verbose: u8) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(format!("dubsh={}", level)),
    )
    .format_timestamp(None)
    .format_target(false)
    .init();
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config)
/// 2. Default config path (~/.config/dubsh/config.toml)
/// 3. Built-in defaults with environment variable overrides
fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = if let Some(path) = custom_path {
        Config::load(path).with_context(|| format!("Failed to load {}", path.display()))?
    } else {
        let default_path = Config::default_path();
        Config::load_or_default(&default_path)
            .with_context(|| format!("Failed to load {}", default_path.display()))?
    };

    Ok(config.with_env_overrides())
}

/// Writes each segment's payload into the store, keeping files that already exist.
fn persist_segments(store: &SegmentStore, segments: &[Segment]) -> Result<(usize, usize)> {
    let mut written = 0;
    let mut kept = 0;
    for segment in segments {
        let id = segment.id();
        if store.exists(&id) {
            kept += 1;
            continue;
        }
        let artifact = match &segment.payload {
            Payload::Audio(clip) => Artifact::Audio(clip.clone()),
            Payload::Text(text) => Artifact::Text(text.clone()),
        };
        store.persist(&id, &artifact)?;
        written += 1;
    }
    Ok((written, kept))
}

fn report_split(quiet: bool, written: usize, kept: usize, out_dir: &Path) {
    if quiet {
        return;
    }
    eprintln!(
        "{} {} segment(s) to {}",
        "Wrote".green(),
        written,
        out_dir.display()
    );
    if kept > 0 {
        eprintln!("{}", format!("Kept {} existing segment(s)", kept).dimmed());
    }
}

fn emit_text(text: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            FileSink::new(PathBuf::from(path)).write(&Artifact::Text(text.to_string()))?;
        }
        None => println!("{}", text),
    }
    Ok(())
}

mod analysis;
mod color;
mod config;
mod data;
mod error;
mod pipeline;
mod render;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use config::{Mode, OutputLocation, RunConfig};
use error::AnalysisError;
use render::PngRenderer;

/// Batch analyzer and plotter for oscilloscope, VNA and OSA exports.
#[derive(Parser, Debug)]
#[command(name = "measplot", version, about)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process a directory with a mode's preset settings
    Run {
        #[arg(value_enum)]
        mode: Mode,

        /// Directory holding the exports
        #[arg(short, long)]
        input: PathBuf,

        /// Write every image here instead of the mode's default location
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Subfolder of the input directory to process (repeatable)
        #[arg(long = "subfolder")]
        subfolders: Vec<String>,

        /// Number of leading lines to skip in every file
        #[arg(long)]
        skip_rows: Option<usize>,

        /// Image width in pixels
        #[arg(long)]
        width: Option<u32>,

        /// Image height in pixels
        #[arg(long)]
        height: Option<u32>,
    },

    /// Process with a complete configuration loaded from JSON
    Config {
        file: PathBuf,
    },

    /// Print a mode's preset configuration as JSON
    Preset {
        #[arg(value_enum)]
        mode: Mode,

        /// Input directory written into the preset
        #[arg(short, long, default_value = ".")]
        input: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<AnalysisError>() {
                Some(kind) if kind.is_fatal() => log::error!("Aborting: {kind}"),
                _ => log::error!("{e:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .init();
}

fn run(command: Command) -> Result<()> {
    let config = match command {
        Command::Preset { mode, input } => {
            let preset = RunConfig::preset(mode, input);
            let json = serde_json::to_string_pretty(&preset).context("serializing preset")?;
            println!("{json}");
            return Ok(());
        }
        Command::Config { file } => RunConfig::from_json_file(&file)?,
        Command::Run {
            mode,
            input,
            output,
            subfolders,
            skip_rows,
            width,
            height,
        } => {
            let mut config = RunConfig::preset(mode, input);
            if let Some(path) = output {
                config.output.location = OutputLocation::Explicit { path };
            }
            if !subfolders.is_empty() {
                config.subfolders = subfolders;
            }
            if let Some(n) = skip_rows {
                config.format.skip_rows = n;
            }
            if let Some(w) = width {
                config.size.0 = w;
            }
            if let Some(h) = height {
                config.size.1 = h;
            }
            config
        }
    };

    log::debug!("Running {:?} on {}", config.mode, config.input_dir.display());
    let report = pipeline::run_batch(&config, &mut PngRenderer)?;

    if !report.skipped.is_empty() {
        log::warn!(
            "{} of {} file(s) skipped",
            report.skipped.len(),
            report.processed()
        );
    }
    let folders = report
        .output_dirs
        .iter()
        .map(|d| d.display().to_string())
        .collect::<Vec<_>>()
        .join(", ");
    println!(
        "Done: {} image(s) written to {folders}",
        report.written.len()
    );
    Ok(())
}

//! Cortex Log Writer - pipe stdin into rotating log files and compact them.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use cortex_logwriter::{
    ActivePath, AsyncLogger, Compactor, Compressor, GZ_SUFFIX, LogWriterConfig, MAX_ATTEMPTS,
    ROTATE_SIZE, read_gzip_to_string,
};

/// Cortex asynchronous log writer
#[derive(Parser)]
#[command(name = "cortex-logwriter")]
#[command(about = "Write rotating log files and gzip the closed ones")]
#[command(version)]
struct Args {
    /// Log level for the tool's own diagnostics
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Enable JSON logging
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Read lines from stdin and write each one as a log entry
    Pipe {
        /// Directory receiving the log files
        dir: PathBuf,

        /// Rotation threshold in bytes
        #[arg(long, default_value_t = ROTATE_SIZE)]
        rotate_size: u64,
    },

    /// Gzip every .log file in a directory
    ///
    /// This runs outside any logger, so it cannot tell which file a live
    /// logger is writing to. Point it only at directories no running logger
    /// owns, or that logger's active file gets compressed and deleted.
    Compact {
        /// Directory holding the log files
        dir: PathBuf,

        /// Compression attempts per file
        #[arg(long, default_value_t = MAX_ATTEMPTS)]
        max_attempts: usize,
    },

    /// Print a .log or .log.gz file
    Cat {
        /// File to print
        file: PathBuf,
    },
}

fn setup_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber
            .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        subscriber
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .init();
    }
}

fn pipe(dir: PathBuf, rotate_size: u64) -> anyhow::Result<()> {
    let config = LogWriterConfig::new(dir).with_rotate_size(rotate_size);
    let logger = AsyncLogger::with_config(config).context("failed to start logger")?;

    let mut dropped = 0usize;
    for line in io::stdin().lock().lines() {
        let line = line.context("failed to read stdin")?;
        if !logger.enqueue(line) {
            dropped += 1;
        }
    }
    logger.close();

    info!(prefix = logger.file_prefix(), dropped, "Input finished");
    if dropped > 0 {
        bail!("{dropped} entries were dropped");
    }
    Ok(())
}

fn compact(dir: &Path, max_attempts: usize) -> anyhow::Result<()> {
    let compactor = Compactor::new(Compressor::new(max_attempts), ActivePath::new());
    let report = compactor
        .compact(dir)
        .with_context(|| format!("failed to compact {}", dir.display()))?;

    println!(
        "compressed {} file(s), {} failure(s), {} orphaned temp file(s) removed",
        report.compressed.len(),
        report.failures.len(),
        report.orphans_removed
    );
    for failure in &report.failures {
        println!("  {}: {}", failure.path.display(), failure.error);
    }

    if !report.is_clean() {
        bail!("{} file(s) could not be compressed", report.failures.len());
    }
    Ok(())
}

fn cat(file: &Path) -> anyhow::Result<()> {
    let contents = if file.to_string_lossy().ends_with(GZ_SUFFIX) {
        read_gzip_to_string(file)?
    } else {
        std::fs::read_to_string(file)
            .with_context(|| format!("failed to read {}", file.display()))?
    };
    io::stdout().lock().write_all(contents.as_bytes())?;
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    setup_logging(&args.log_level, args.json_logs);

    let result = match args.command {
        Command::Pipe { dir, rotate_size } => pipe(dir, rotate_size),
        Command::Compact { dir, max_attempts } => compact(&dir, max_attempts),
        Command::Cat { file } => cat(&file),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// SpeakScore - scoring engine for recorded speaking sessions
///
/// Replays recorded analyzer fixtures for a batch of answer recordings,
/// aggregates them through the weight taxonomy, and writes the final
/// session report. Markdown/JSON output.
///
/// Examples:
///   speakscore --items ./session-items
///   speakscore --items ./session-items --weights custom_weights.toml
///   speakscore --items ./session-items --format json --output result.json
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Directory of per-item fixture files (one JSON file per recorded answer)
    ///
    /// Files are processed in name order; the item index is their position
    /// in that order.
    #[arg(short, long, value_name = "DIR")]
    pub items: PathBuf,

    /// Session id to score under
    #[arg(short, long, default_value = "local", value_name = "ID")]
    pub session: String,

    /// Weight taxonomy file (TOML)
    ///
    /// If not specified, the built-in default taxonomy is used.
    #[arg(short, long, value_name = "FILE")]
    pub weights: Option<PathBuf>,

    /// Output file path for the report
    #[arg(short, long, default_value = "session_report.md", value_name = "FILE")]
    pub output: PathBuf,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Per-analyzer timeout in seconds
    #[arg(long, default_value = "120", value_name = "SECS", env = "SPEAKSCORE_TIMEOUT")]
    pub timeout: u64,

    /// Pipeline version stamped into results
    #[arg(long, default_value = env!("CARGO_PKG_VERSION"), value_name = "VERSION")]
    pub pipeline_version: String,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.timeout == 0 {
            return Err("Timeout must be at least 1 second".to_string());
        }

        if self.session.trim().is_empty() {
            return Err("Session id must not be empty".to_string());
        }

        if !self.items.exists() {
            return Err(format!(
                "Items directory does not exist: {}",
                self.items.display()
            ));
        }
        if !self.items.is_dir() {
            return Err(format!(
                "Items path is not a directory: {}",
                self.items.display()
            ));
        }

        if let Some(ref weights) = self.weights {
            if !weights.exists() {
                return Err(format!("Weights file does not exist: {}", weights.display()));
            }
        }

        Ok(())
    }

    /// Determine the log level based on verbosity flags.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

//! Command-line interface definition.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// rulescan: rule-based content scanner with YARA-like signatures
#[derive(Parser, Debug)]
#[command(name = "rulescan")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json)
    #[arg(long, default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Use this configuration file instead of the default location
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine processing
    Json,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan files or directories
    Scan {
        /// Files or directories to scan
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Load additional rules from file (repeatable)
        #[arg(short, long)]
        rules: Vec<PathBuf>,

        /// Use the heuristic fallback engine
        #[arg(long)]
        fallback: bool,

        /// Start without the built-in rules
        #[arg(long)]
        no_default_rules: bool,
    },

    /// Validate and inspect rule files
    Rules {
        #[command(subcommand)]
        action: RulesAction,
    },

    /// Configure settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Show application information
    Info,
}

/// Rules subcommands.
#[derive(Subcommand, Debug)]
pub enum RulesAction {
    /// Check a rule file without loading it
    Validate {
        /// Rule file to check
        file: PathBuf,
    },

    /// List active rules
    List {
        /// Load additional rules from file before listing (repeatable)
        #[arg(short, long)]
        rules: Vec<PathBuf>,
    },
}

/// Configuration subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Reset configuration to defaults
    Reset {
        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Print configuration file location
    Path,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

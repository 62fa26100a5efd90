//! CLI interface for FitPlan
//!
//! Defines the commands and global flags of the `fitplan` binary using
//! clap's derive API.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// FitPlan plan generator
///
/// Turns a client profile into a calorie/macro segment, a meal plan and a
/// training plan using the Gemini API.
#[derive(Parser, Debug)]
#[command(name = "fitplan")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate segment, meal plan and training plan for a client
    Generate {
        /// Client profile (.json or .toml)
        #[arg(long, short, value_name = "FILE")]
        profile: PathBuf,

        /// Output directory (defaults to core.output_dir)
        #[arg(long, short, value_name = "DIR")]
        out: Option<PathBuf>,
    },

    /// Compute the formula-based segment only (no network)
    Estimate {
        /// Client profile (.json or .toml)
        #[arg(long, short, value_name = "FILE")]
        profile: PathBuf,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Manage the Gemini API key in the OS keychain
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },
}

/// Configuration management actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration (file + environment overrides)
    Show,

    /// Print the configuration file path
    Path,
}

/// API key actions
#[derive(Subcommand, Debug)]
pub enum KeyAction {
    /// Read the key from stdin and store it in the keychain
    Set,

    /// Remove the key from the keychain
    Delete,
}

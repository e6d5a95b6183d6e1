//! CLI parse: clap types for memogen. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Memogen CLI - inspect memoized artifacts
#[derive(Parser)]
#[command(name = "memogen")]
#[command(about = "Inspect artifacts stored by the memoizing data generator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List stored records
    List {
        /// Only records of this dataname
        #[arg(long)]
        dataname: Option<String>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Print a stored artifact as JSON
    Show {
        dataname: String,
        /// Identity parameters as a JSON object
        idpars: String,
    },
    /// Print the path of a file belonging to a record
    Path {
        dataname: String,
        /// Identity parameters as a JSON object
        idpars: String,
        /// File extension
        #[arg(long, default_value = ".log")]
        extension: String,
    },
    /// Report whether a record exists
    Exists {
        dataname: String,
        /// Identity parameters as a JSON object
        idpars: String,
    },
    /// Print the effective configuration as TOML
    Config,
}

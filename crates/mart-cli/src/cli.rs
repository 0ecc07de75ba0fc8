//! CLI argument definitions for the retail ETL driver.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "mart-etl",
    version,
    about = "Retail ETL - clean and load customer, product and sales feeds",
    long_about = "Deduplicate, fill, standardize and key raw retail CSV feeds, then load them\n\
                  into FK-checked tables and report what was changed."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Clean and load the raw feeds in a data folder.
    Run(RunArgs),

    /// Print the effective configuration as TOML.
    Config(ConfigArgs),
}

#[derive(Parser)]
pub struct RunArgs {
    /// Folder containing the customers, products and sales CSV files.
    #[arg(value_name = "DATA_DIR")]
    pub data_dir: PathBuf,

    /// TOML file overriding the built-in cleaning rules.
    #[arg(long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Output directory for tables and the quality report (default: <DATA_DIR>/output).
    #[arg(long = "output-dir", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Also write the quality report as JSON to this path.
    #[arg(long = "report-json", value_name = "PATH")]
    pub report_json: Option<PathBuf>,

    /// Clean and load in memory without writing any file.
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// Allow customer names and contact details in logs.
    #[arg(long = "log-data")]
    pub log_data: bool,
}

#[derive(Parser)]
pub struct ConfigArgs {
    /// TOML file to merge over the defaults before printing.
    #[arg(long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}

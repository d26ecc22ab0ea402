use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(author, version, about = "Reconcile feature tables across CSV and Excel sources", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Inspect the loaded sources: entities, feature counts, cell coverage
    Probe(ProbeArgs),
    /// Build the row-by-row comparison for one entity
    Reconcile(ReconcileArgs),
    /// Summarize agreement KPIs for every entity
    Stats(StatsArgs),
    /// Export one entity's final values to CSV or a workbook
    Export(ExportArgs),
    /// Export final values for all entities side by side
    ExportAll(ExportAllArgs),
    /// Manage stored final values
    #[command(subcommand)]
    Final(FinalCommands),
}

/// The 3–4 comparison sources plus the flags every ingesting command shares.
#[derive(Debug, Args)]
pub struct SourceArgs {
    /// Source files in slot order; the first is the reference (3 required, a 4th optional)
    #[arg(short = 'i', long = "input", required = true, action = clap::ArgAction::Append)]
    pub inputs: Vec<PathBuf>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of delimited inputs (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Compare values case-folded instead of verbatim
    #[arg(long = "ignore-case")]
    pub ignore_case: bool,
    /// Keep header entity names verbatim instead of trimming whitespace
    #[arg(long = "keep-header-whitespace")]
    pub keep_header_whitespace: bool,
    /// Final-value store file
    #[arg(long, default_value = "final-data.json")]
    pub store: PathBuf,
}

#[derive(Debug, Args)]
pub struct ProbeArgs {
    #[command(flatten)]
    pub sources: SourceArgs,
}

#[derive(Debug, Args)]
pub struct ReconcileArgs {
    #[command(flatten)]
    pub sources: SourceArgs,
    /// Entity to reconcile (defaults to the first in the reference source)
    #[arg(short, long)]
    pub entity: Option<String>,
    /// Only display rows whose feature name contains this substring
    #[arg(long = "feature")]
    pub feature: Option<String>,
    /// Emit the full report as JSON instead of a table
    #[arg(long)]
    pub json: bool,
    /// Colorize classification output
    #[arg(long, value_enum, default_value = "auto")]
    pub color: ColorMode,
}

#[derive(Debug, Args)]
pub struct StatsArgs {
    #[command(flatten)]
    pub sources: SourceArgs,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    #[command(flatten)]
    pub sources: SourceArgs,
    /// Entity to export (defaults to the first in the reference source)
    #[arg(short, long)]
    pub entity: Option<String>,
    /// Output file (stdout CSV if omitted; a .xlsx extension writes a workbook)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ExportAllArgs {
    #[command(flatten)]
    pub sources: SourceArgs,
    /// Output file (stdout CSV if omitted; a .xlsx extension writes a workbook)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum FinalCommands {
    /// Set a final value, or a per-column value with --source
    Set(FinalSetArgs),
    /// Clear one stored value
    Clear(FinalClearArgs),
    /// List stored values with their edit timestamps
    List(FinalListArgs),
    /// Delete every stored value
    Reset(FinalResetArgs),
}

#[derive(Debug, Args)]
pub struct FinalSetArgs {
    /// Final-value store file
    #[arg(long, default_value = "final-data.json")]
    pub store: PathBuf,
    /// Entity the value belongs to
    #[arg(short, long)]
    pub entity: String,
    /// Feature the value belongs to
    #[arg(short, long)]
    pub feature: String,
    /// Replace one source column's cell instead of the final value (0-based index, 0 = reference)
    #[arg(long)]
    pub source: Option<usize>,
    /// The value to store
    pub value: String,
}

#[derive(Debug, Args)]
pub struct FinalClearArgs {
    /// Final-value store file
    #[arg(long, default_value = "final-data.json")]
    pub store: PathBuf,
    /// Entity the value belongs to
    #[arg(short, long)]
    pub entity: String,
    /// Feature the value belongs to
    #[arg(short, long)]
    pub feature: String,
    /// Clear a per-column value instead of the final value (0-based index, 0 = reference)
    #[arg(long)]
    pub source: Option<usize>,
}

#[derive(Debug, Args)]
pub struct FinalListArgs {
    /// Final-value store file
    #[arg(long, default_value = "final-data.json")]
    pub store: PathBuf,
}

#[derive(Debug, Args)]
pub struct FinalResetArgs {
    /// Final-value store file
    #[arg(long, default_value = "final-data.json")]
    pub store: PathBuf,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

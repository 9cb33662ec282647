use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::inference::MAX_SAMPLE_ROWS;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Flatten JSON to CSV and load CSV directories into a database",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Convert every JSON document under a directory into a sibling CSV file
    Flatten(FlattenArgs),
    /// Print the DDL a load would run, without connecting to a database
    Plan(PlanArgs),
    /// Create tables for every CSV file in a directory and import their rows
    Load(LoadArgs),
}

#[derive(Debug, Args)]
pub struct FlattenArgs {
    /// Directory to search for .json files
    #[arg(short = 'i', long = "input", default_value = "data")]
    pub input: PathBuf,
    /// Separator placed between nested object keys
    #[arg(long, default_value = "_")]
    pub separator: String,
    /// Delimiter used to join arrays of scalar values
    #[arg(long = "list-delimiter", default_value = "|")]
    pub list_delimiter: String,
    /// Only look at files directly inside the input directory
    #[arg(long = "no-recursive")]
    pub no_recursive: bool,
}

#[derive(Debug, Clone, Args)]
pub struct SourceArgs {
    /// Directory containing the CSV files to read (defaults to ./data)
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,
    /// Rows sampled per column when inferring types (1-100)
    #[arg(long = "sample-rows", value_parser = parse_sample_rows)]
    pub sample_rows: Option<usize>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input files (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct PlanArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// Write the DDL script to this file instead of stdout
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
#[value(rename_all = "kebab-case")]
pub enum BackendKind {
    Postgres,
    Sqlite,
}

#[derive(Debug, Args)]
pub struct LoadArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// YAML file providing source and connection settings
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
    /// Database backend (defaults to postgres)
    #[arg(long, value_enum)]
    pub backend: Option<BackendKind>,
    /// PostgreSQL host
    #[arg(long)]
    pub host: Option<String>,
    /// PostgreSQL port
    #[arg(long)]
    pub port: Option<u16>,
    /// PostgreSQL user
    #[arg(long)]
    pub user: Option<String>,
    /// PostgreSQL password (falls back to PGPASSWORD)
    #[arg(long)]
    pub password: Option<String>,
    /// PostgreSQL database name
    #[arg(long)]
    pub dbname: Option<String>,
    /// SQLite database file (use :memory: for a throwaway database)
    #[arg(long = "sqlite-path")]
    pub sqlite_path: Option<PathBuf>,
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

pub fn parse_sample_rows(value: &str) -> Result<usize, String> {
    let rows: usize = value
        .trim()
        .parse()
        .map_err(|_| format!("'{value}' is not a row count"))?;
    if rows == 0 || rows > MAX_SAMPLE_ROWS {
        return Err(format!("Sample rows must be between 1 and {MAX_SAMPLE_ROWS}"));
    }
    Ok(rows)
}

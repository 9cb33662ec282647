pub mod cli;
pub mod config;
pub mod ddl;
pub mod flatten;
pub mod identifier;
pub mod inference;
pub mod io_utils;
pub mod loader;
pub mod relationships;
pub mod store;

use std::{env, fs, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, info, warn};

use crate::cli::{Cli, Commands};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("csv_ingest", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Flatten(args) => flatten::execute(&args),
        Commands::Plan(args) => handle_plan(&args),
        Commands::Load(args) => handle_load(&args),
    }
}

fn handle_plan(args: &cli::PlanArgs) -> Result<()> {
    let source = config::SourceConfig::from_args(&args.source);
    let plan = loader::plan(&source)
        .with_context(|| format!("Planning tables from {:?}", source.data_dir))?;
    let script = plan.ddl_script();
    match &args.output {
        Some(path) => {
            fs::write(path, &script).with_context(|| format!("Writing DDL to {path:?}"))?;
            info!(
                "DDL for {} table(s) and {} foreign key guess(es) written to {:?}",
                plan.tables.len(),
                plan.foreign_keys.len(),
                path
            );
        }
        None => print!("{script}"),
    }
    Ok(())
}

fn handle_load(args: &cli::LoadArgs) -> Result<()> {
    let config = config::LoaderConfig::from_args(args).context("Resolving loader configuration")?;
    info!(
        "Loading .{} files from {:?} (sampling {} row(s) per file)",
        config.source.extension, config.source.data_dir, config.source.sample_rows
    );
    let summary = loader::run(&config)?;
    info!(
        "Created {} table(s), linked {} foreign key(s) ({} rejected), inserted {} row(s) ({} failed)",
        summary.tables_created,
        summary.foreign_keys.applied.len(),
        summary.foreign_keys.rejected.len(),
        summary.rows_inserted(),
        summary.rows_failed()
    );
    if !summary.skipped_files.is_empty() || !summary.failed_files.is_empty() {
        warn!(
            "{} file(s) skipped during planning, {} file(s) abandoned during import",
            summary.skipped_files.len(),
            summary.failed_files.len()
        );
    }
    Ok(())
}

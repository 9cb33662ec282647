//! CSV directory import.
//!
//! A load runs in fixed phases:
//!
//! 1. **Plan** - list the input directory, sample each file, and build one
//!    [`TableSchema`] per file. Files that cannot be read or that yield
//!    duplicate column names are skipped.
//! 2. **Create** - every CREATE TABLE / CREATE INDEX statement runs in a
//!    single transaction.
//! 3. **Link** - naming-convention foreign keys are attempted once all tables
//!    exist; rejected guesses are logged and skipped.
//! 4. **Import** - each file's rows are inserted inside that file's own
//!    transaction. A failing row rolls the open transaction back, a fresh one
//!    is opened, and the remaining rows are still attempted.
//!
//! Failures are contained at the narrowest level (statement, row, file);
//! only discovery, connection, and schema creation failures end the run.

use std::{
    collections::HashSet,
    fmt::Write as _,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use encoding_rs::Encoding;
use log::{debug, error, info, warn};

use crate::{
    config::{LoaderConfig, SourceConfig},
    ddl::{SchemaError, TableSchema},
    inference,
    io_utils,
    relationships::{self, FkReport, ForeignKeyGuess, error_chain},
    store::{self, DestColumn, SqlStore},
};

#[derive(Debug, Clone)]
pub struct PlannedTable {
    pub path: PathBuf,
    pub delimiter: u8,
    pub schema: TableSchema,
}

#[derive(Debug, Clone, Default)]
pub struct LoadPlan {
    pub tables: Vec<PlannedTable>,
    pub skipped: Vec<PathBuf>,
    pub foreign_keys: Vec<ForeignKeyGuess>,
}

impl LoadPlan {
    pub fn schemas(&self) -> Vec<TableSchema> {
        self.tables.iter().map(|t| t.schema.clone()).collect()
    }

    pub fn schema_statements(&self) -> Vec<String> {
        self.tables.iter().flat_map(|t| t.schema.ddl()).collect()
    }

    /// The statements a load would run, as one SQL script.
    pub fn ddl_script(&self) -> String {
        let mut script = String::new();
        for table in &self.tables {
            let _ = writeln!(script, "-- {}", table.path.display());
            for statement in table.schema.ddl() {
                let _ = writeln!(script, "{statement}");
            }
            script.push('\n');
        }
        if !self.foreign_keys.is_empty() {
            let _ = writeln!(script, "-- naming-convention foreign keys");
            for guess in &self.foreign_keys {
                let _ = writeln!(script, "{}", guess.to_sql());
            }
        }
        script
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileReport {
    pub path: PathBuf,
    pub table: String,
    /// Rows committed.
    pub inserted: usize,
    /// Rows whose insert statement failed.
    pub failed: usize,
    /// Rows that were inserted but then lost to a rollback.
    pub discarded: usize,
}

#[derive(Debug, Default)]
pub struct LoadSummary {
    pub tables_created: usize,
    pub skipped_files: Vec<PathBuf>,
    pub foreign_keys: FkReport,
    pub files: Vec<FileReport>,
    pub failed_files: Vec<(PathBuf, String)>,
}

impl LoadSummary {
    pub fn rows_inserted(&self) -> usize {
        self.files.iter().map(|f| f.inserted).sum()
    }

    pub fn rows_failed(&self) -> usize {
        self.files.iter().map(|f| f.failed).sum()
    }
}

pub fn discover_sources(source: &SourceConfig) -> Result<Vec<PathBuf>> {
    let files = io_utils::discover_files(&source.data_dir, &source.extension, false)?;
    if files.is_empty() {
        bail!(
            "No .{} files found in {:?}",
            source.extension,
            source.data_dir
        );
    }
    Ok(files)
}

pub fn plan(source: &SourceConfig) -> Result<LoadPlan> {
    let encoding = io_utils::resolve_encoding(source.input_encoding.as_deref())?;
    let files = discover_sources(source)?;
    info!(
        "Planning {} file(s) from {:?}",
        files.len(),
        source.data_dir
    );

    let mut result = LoadPlan::default();
    let mut names = HashSet::new();
    for path in files {
        let delimiter = io_utils::resolve_input_delimiter(&path, source.delimiter);
        match plan_table(&path, source.sample_rows, delimiter, encoding) {
            Ok(schema) if !names.insert(schema.name().to_string()) => {
                error!(
                    "Skipping {:?}: table '{}' is already produced by another file",
                    path,
                    schema.name()
                );
                result.skipped.push(path);
            }
            Ok(schema) => {
                debug!("Planned table '{}' from {:?}", schema.name(), path);
                result.tables.push(PlannedTable {
                    path,
                    delimiter,
                    schema,
                });
            }
            Err(err) => {
                error!("Skipping {path:?}: {err:#}");
                result.skipped.push(path);
            }
        }
    }
    result.foreign_keys = relationships::guess_foreign_keys(&result.schemas());
    Ok(result)
}

fn plan_table(
    path: &Path,
    sample_rows: usize,
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<TableSchema> {
    let sample = inference::sample_table(path, sample_rows, delimiter, encoding)?;
    TableSchema::from_sample(&sample).map_err(|err| {
        let colliding = match &err {
            SchemaError::DuplicateColumn { column, .. } => sample.raw_headers_for(column),
            _ => Vec::new(),
        };
        let err = anyhow::Error::new(err);
        if colliding.is_empty() {
            err
        } else {
            err.context(format!("Headers {colliding:?} sanitize to the same name"))
        }
    })
}

pub fn run(config: &LoaderConfig) -> Result<LoadSummary> {
    let plan = plan(&config.source)?;
    if plan.tables.is_empty() {
        bail!(
            "None of the {} input file(s) produced a table",
            plan.skipped.len()
        );
    }
    let mut store = store::connect(&config.connection).context("Connecting to database")?;
    info!("Connected to {}", store.describe());
    run_with_store(store.as_mut(), &plan, &config.source)
}

pub fn run_with_store(
    store: &mut dyn SqlStore,
    plan: &LoadPlan,
    source: &SourceConfig,
) -> Result<LoadSummary> {
    let encoding = io_utils::resolve_encoding(source.input_encoding.as_deref())?;
    let mut summary = LoadSummary {
        skipped_files: plan.skipped.clone(),
        ..LoadSummary::default()
    };

    store
        .run_transaction(&plan.schema_statements())
        .context("Creating tables")?;
    summary.tables_created = plan.tables.len();
    for table in &plan.tables {
        info!(
            "Created table '{}' ({} column(s)) from {:?}",
            table.schema.name(),
            table.schema.columns().len(),
            table.path
        );
    }

    summary.foreign_keys = relationships::apply_foreign_keys(store, &plan.foreign_keys);

    for table in &plan.tables {
        match import_file(store, table, encoding) {
            Ok(report) => {
                info!(
                    "Loaded {:?} into '{}': {} row(s) inserted, {} failed, {} rolled back",
                    report.path, report.table, report.inserted, report.failed, report.discarded
                );
                summary.files.push(report);
            }
            Err(err) => {
                error!("Import of {:?} abandoned: {err:#}", table.path);
                summary.failed_files.push((table.path.clone(), format!("{err:#}")));
            }
        }
    }
    Ok(summary)
}

/// Destination columns that also exist in the source, with the source
/// position bound to each.
fn shared_columns(schema: &TableSchema, dest: Vec<DestColumn>) -> (Vec<DestColumn>, Vec<usize>) {
    dest.into_iter()
        .filter_map(|column| {
            schema
                .columns()
                .iter()
                .position(|c| c.name == column.name)
                .map(|idx| (column, idx))
        })
        .unzip()
}

fn import_file(
    store: &mut dyn SqlStore,
    table: &PlannedTable,
    encoding: &'static Encoding,
) -> Result<FileReport> {
    let name = table.schema.name();
    let dest = store.table_columns(name)?;
    let (columns, positions) = shared_columns(&table.schema, dest);
    if columns.is_empty() {
        bail!("Table '{name}' shares no columns with {:?}", table.path);
    }

    let mut reader = io_utils::open_csv_reader_from_path(&table.path, table.delimiter, true)?;
    let mut report = FileReport {
        path: table.path.clone(),
        table: name.to_string(),
        ..FileReport::default()
    };

    store.begin()?;
    let mut pending = 0usize;
    let mut record = csv::ByteRecord::new();
    let mut line = 1usize;
    loop {
        line += 1;
        let values = match read_row(&mut reader, &mut record, encoding, &positions) {
            Ok(Some(values)) => values,
            Ok(None) => break,
            Err(err) => {
                abandon(store, name);
                return Err(err.context(format!("Reading row {line} in {:?}", table.path)));
            }
        };
        let bound: Vec<Option<&str>> = values.iter().map(|v| v.as_deref()).collect();
        match store.insert_row(name, &columns, &bound) {
            Ok(()) => pending += 1,
            Err(err) => {
                warn!(
                    "Row {line} of {:?} rejected: {}",
                    table.path,
                    error_chain(&err)
                );
                report.failed += 1;
                report.discarded += pending;
                pending = 0;
                store
                    .rollback()
                    .and_then(|()| store.begin())
                    .with_context(|| format!("Restarting transaction for {:?}", table.path))?;
            }
        }
    }

    if let Err(err) = store.commit() {
        abandon(store, name);
        return Err(anyhow::Error::new(err)
            .context(format!("Committing rows for {:?}", table.path)));
    }
    report.inserted = pending;
    Ok(report)
}

/// Reads the next record and projects it onto `positions`. Empty and missing
/// fields become `None`.
fn read_row<R: std::io::Read>(
    reader: &mut csv::Reader<R>,
    record: &mut csv::ByteRecord,
    encoding: &'static Encoding,
    positions: &[usize],
) -> Result<Option<Vec<Option<String>>>> {
    if !reader.read_byte_record(record)? {
        return Ok(None);
    }
    let decoded = io_utils::decode_record(record, encoding)?;
    Ok(Some(
        positions
            .iter()
            .map(|&idx| decoded.get(idx).filter(|v| !v.is_empty()).cloned())
            .collect(),
    ))
}

fn abandon(store: &mut dyn SqlStore, table: &str) {
    if let Err(err) = store.rollback() {
        warn!("Rollback for '{table}' failed: {}", error_chain(&err));
    }
}

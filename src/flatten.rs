//! JSON document flattening.
//!
//! Each JSON file becomes a CSV file next to it. A top-level array is a list
//! of records, anything else is a single record. Nested objects collapse into
//! `parent_child` keys, arrays of scalars join into one `a|b|c` field, and
//! arrays of objects stay as embedded JSON text.
//!
//! Scalars keep their JSON spelling: booleans are written `true`/`false` and
//! `null` becomes an empty field, including inside joined lists.

use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use log::info;
use serde_json::{Map, Value};

use crate::{cli::FlattenArgs, io_utils};

pub const JSON_EXTENSION: &str = "json";
pub const SCALAR_RECORD_KEY: &str = "value";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlattenOptions {
    pub separator: String,
    pub list_delimiter: String,
}

impl Default for FlattenOptions {
    fn default() -> Self {
        Self {
            separator: "_".to_string(),
            list_delimiter: "|".to_string(),
        }
    }
}

pub type FlatRecord = BTreeMap<String, String>;

pub fn execute(args: &FlattenArgs) -> Result<()> {
    let options = FlattenOptions {
        separator: args.separator.clone(),
        list_delimiter: args.list_delimiter.clone(),
    };
    let converted = flatten_directory(&args.input, !args.no_recursive, &options)?;
    info!("Converted {} JSON file(s)", converted.len());
    Ok(())
}

pub fn flatten_directory(
    dir: &Path,
    recursive: bool,
    options: &FlattenOptions,
) -> Result<Vec<PathBuf>> {
    let inputs = io_utils::discover_files(dir, JSON_EXTENSION, recursive)?;
    if inputs.is_empty() {
        bail!("No JSON files found under {dir:?}");
    }
    let mut outputs = Vec::with_capacity(inputs.len());
    for input in &inputs {
        let output = json_file_to_csv(input, options)?;
        info!("{} -> {}", display_relative(input, dir), display_name(&output));
        outputs.push(output);
    }
    Ok(outputs)
}

pub fn json_file_to_csv(path: &Path, options: &FlattenOptions) -> Result<PathBuf> {
    let raw = fs::read_to_string(path).with_context(|| format!("Reading JSON file {path:?}"))?;
    let document: Value =
        serde_json::from_str(&raw).with_context(|| format!("Parsing JSON file {path:?}"))?;
    let records = flatten_document(&document, options);

    let headers: BTreeSet<&str> = records
        .iter()
        .flat_map(|record| record.keys().map(String::as_str))
        .collect();

    let output = path.with_extension("csv");
    let mut writer = io_utils::open_csv_writer(&output, io_utils::DEFAULT_CSV_DELIMITER)?;
    writer
        .write_record(headers.iter())
        .with_context(|| format!("Writing headers to {output:?}"))?;
    for (idx, record) in records.iter().enumerate() {
        let row = headers
            .iter()
            .map(|key| record.get(*key).map(String::as_str).unwrap_or(""));
        writer
            .write_record(row)
            .with_context(|| format!("Writing record {} to {output:?}", idx + 1))?;
    }
    writer
        .flush()
        .with_context(|| format!("Flushing {output:?}"))?;
    Ok(output)
}

pub fn flatten_document(document: &Value, options: &FlattenOptions) -> Vec<FlatRecord> {
    match document {
        Value::Array(records) => records
            .iter()
            .map(|record| flatten_record(record, options))
            .collect(),
        other => vec![flatten_record(other, options)],
    }
}

pub fn flatten_record(record: &Value, options: &FlattenOptions) -> FlatRecord {
    let mut flat = FlatRecord::new();
    match record {
        Value::Object(map) => flatten_object(map, "", options, &mut flat),
        Value::Array(items) => {
            flat.insert(SCALAR_RECORD_KEY.to_string(), join_scalars(items, options));
        }
        scalar => {
            flat.insert(SCALAR_RECORD_KEY.to_string(), render_scalar(scalar));
        }
    }
    flat
}

fn flatten_object(
    map: &Map<String, Value>,
    parent: &str,
    options: &FlattenOptions,
    flat: &mut FlatRecord,
) {
    for (key, value) in map {
        let path = if parent.is_empty() {
            key.clone()
        } else {
            format!("{parent}{}{key}", options.separator)
        };
        match value {
            Value::Object(child) => flatten_object(child, &path, options, flat),
            Value::Array(items) if matches!(items.first(), Some(Value::Object(_))) => {
                flat.insert(path, value.to_string());
            }
            Value::Array(items) => {
                flat.insert(path, join_scalars(items, options));
            }
            scalar => {
                flat.insert(path, render_scalar(scalar));
            }
        }
    }
}

fn join_scalars(items: &[Value], options: &FlattenOptions) -> String {
    items
        .iter()
        .map(render_scalar)
        .collect::<Vec<_>>()
        .join(&options.list_delimiter)
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn display_relative(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

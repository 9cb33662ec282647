//! I/O utilities for CSV reading, writing, encoding, and file discovery.
//!
//! - **Delimiter resolution**: extension-based auto-detection (`.csv` → comma,
//!   `.tsv` → tab) with manual override support.
//! - **Encoding**: input decoding via `encoding_rs`, defaulting to UTF-8.
//! - **Readers** are flexible: rows shorter or longer than the header are
//!   accepted and left for the caller to pad or truncate.
//! - **Discovery**: directory listings filtered by extension, in the order the
//!   filesystem returns them.

use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Read, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use encoding_rs::{Encoding, UTF_8};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8, has_headers: bool) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(has_headers)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}

pub fn open_csv_reader_from_path(
    path: &Path,
    delimiter: u8,
    has_headers: bool,
) -> Result<csv::Reader<BufReader<File>>> {
    let reader =
        BufReader::new(File::open(path).with_context(|| format!("Opening input file {path:?}"))?);
    Ok(open_csv_reader(reader, delimiter, has_headers))
}

pub fn open_csv_writer(path: &Path, delimiter: u8) -> Result<csv::Writer<Box<dyn Write>>> {
    let file: Box<dyn Write> = Box::new(BufWriter::new(
        File::create(path).with_context(|| format!("Creating output file {path:?}"))?,
    ));
    let mut builder = csv::WriterBuilder::new();
    builder.delimiter(delimiter).double_quote(true);
    Ok(builder.from_writer(file))
}

/// Decodes one field. BOM sniffing is left to [`reader_headers`], so a field
/// that happens to start with BOM bytes is decoded as `encoding` or rejected.
pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, had_errors) = encoding.decode_without_bom_handling(bytes);
    if had_errors {
        Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

pub fn decode_record(record: &csv::ByteRecord, encoding: &'static Encoding) -> Result<Vec<String>> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding))
        .collect()
}

pub fn reader_headers<R>(
    reader: &mut csv::Reader<R>,
    encoding: &'static Encoding,
) -> Result<Vec<String>>
where
    R: Read,
{
    let headers = reader.byte_headers()?.clone();
    let mut decoded = Vec::with_capacity(headers.len());
    for (idx, field) in headers.iter().enumerate() {
        if idx == 0 {
            let (text, had_errors) = encoding.decode_with_bom_removal(field);
            if had_errors {
                return Err(anyhow!(
                    "Failed to decode text with encoding {}",
                    encoding.name()
                ));
            }
            decoded.push(text.into_owned());
        } else {
            decoded.push(decode_bytes(field, encoding)?);
        }
    }
    Ok(decoded)
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
}

/// Lists regular files under `dir` whose extension matches `extension`
/// case-insensitively. Results keep the directory listing order; with
/// `recursive` each subdirectory's entries follow at the point it was listed.
pub fn discover_files(dir: &Path, extension: &str, recursive: bool) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    collect_files(dir, extension, recursive, &mut found)?;
    Ok(found)
}

fn collect_files(
    dir: &Path,
    extension: &str,
    recursive: bool,
    found: &mut Vec<PathBuf>,
) -> Result<()> {
    let entries = fs::read_dir(dir).with_context(|| format!("Listing directory {dir:?}"))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("Reading entry in {dir:?}"))?;
        let path = entry.path();
        let file_type = entry
            .file_type()
            .with_context(|| format!("Inspecting {path:?}"))?;
        if file_type.is_dir() {
            if recursive {
                collect_files(&path, extension, recursive, found)?;
            }
        } else if has_extension(&path, extension) {
            found.push(path);
        }
    }
    Ok(())
}

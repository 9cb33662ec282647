//! Column type inference from a bounded sample of raw CSV values.
//!
//! [`infer_column_type`] applies four rules in a fixed order and the first
//! one that holds for every sampled value wins:
//!
//! 1. `INTEGER` - every value is exactly empty or made of ASCII digits only.
//! 2. `NUMERIC` - every non-blank value parses as a float.
//! 3. `DATE` - every non-blank value has the shape `YYYY-MM-DD`,
//!    `MM/DD/YYYY` or `DD-MM-YYYY` (no calendar check).
//! 4. `TEXT` - everything else.
//!
//! The checks are vacuously true over an empty sample, so a column with no
//! sampled rows (or only empty strings) is `INTEGER`.
//!
//! [`sample_table`] reads the header row plus at most [`MAX_SAMPLE_ROWS`]
//! data rows of a file and produces the inputs the schema synthesizer needs.

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::OnceLock,
};

use anyhow::{Context, Result};
use encoding_rs::Encoding;
use log::debug;
use regex::Regex;

use crate::{identifier, io_utils};

pub const MAX_SAMPLE_ROWS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InferredType {
    Integer,
    Numeric,
    Date,
    Text,
}

impl InferredType {
    pub fn sql_name(&self) -> &'static str {
        match self {
            InferredType::Integer => "INTEGER",
            InferredType::Numeric => "NUMERIC",
            InferredType::Date => "DATE",
            InferredType::Text => "TEXT",
        }
    }
}

impl fmt::Display for InferredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql_name())
    }
}

fn date_patterns() -> &'static [Regex; 3] {
    static PATTERNS: OnceLock<[Regex; 3]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid ISO date pattern"),
            Regex::new(r"^\d{2}/\d{2}/\d{4}$").expect("valid US date pattern"),
            Regex::new(r"^\d{2}-\d{2}-\d{4}$").expect("valid day-first date pattern"),
        ]
    })
}

fn is_integer_token(value: &str) -> bool {
    value.is_empty() || value.bytes().all(|b| b.is_ascii_digit())
}

fn is_numeric_token(trimmed: &str) -> bool {
    trimmed.parse::<f64>().is_ok()
}

fn is_date_token(trimmed: &str) -> bool {
    date_patterns().iter().any(|re| re.is_match(trimmed))
}

/// Classifies one column. Rule order matters: `"12"` satisfies every rule
/// up to `NUMERIC`, and `INTEGER` is checked first.
pub fn infer_column_type<S: AsRef<str>>(values: &[S]) -> InferredType {
    if values.iter().all(|v| is_integer_token(v.as_ref())) {
        return InferredType::Integer;
    }

    let mut non_blank = values
        .iter()
        .map(|v| v.as_ref().trim())
        .filter(|v| !v.is_empty());
    if non_blank.clone().all(is_numeric_token) {
        return InferredType::Numeric;
    }
    if non_blank.all(is_date_token) {
        return InferredType::Date;
    }
    InferredType::Text
}

/// Headers plus the leading rows of a delimited file.
#[derive(Debug, Clone)]
pub struct TableSample {
    pub path: PathBuf,
    pub table: String,
    pub raw_headers: Vec<String>,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TableSample {
    /// Values of column `idx` across the sampled rows. Short rows yield an
    /// empty string for their missing trailing fields.
    pub fn column_values(&self, idx: usize) -> Vec<&str> {
        self.rows
            .iter()
            .map(|row| row.get(idx).map(String::as_str).unwrap_or(""))
            .collect()
    }

    /// Raw headers whose sanitized form is `column`.
    pub fn raw_headers_for(&self, column: &str) -> Vec<&str> {
        self.raw_headers
            .iter()
            .zip(&self.columns)
            .filter(|(_, sanitized)| *sanitized == column)
            .map(|(raw, _)| raw.as_str())
            .collect()
    }

    pub fn inferred_types(&self) -> Vec<InferredType> {
        (0..self.columns.len())
            .map(|idx| infer_column_type(&self.column_values(idx)))
            .collect()
    }
}

pub fn table_name_for(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    identifier::sanitize_identifier(&stem)
}

pub fn sample_table(
    path: &Path,
    sample_rows: usize,
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<TableSample> {
    let limit = sample_rows.clamp(1, MAX_SAMPLE_ROWS);
    let mut reader = io_utils::open_csv_reader_from_path(path, delimiter, true)?;
    let raw_headers = io_utils::reader_headers(&mut reader, encoding)
        .with_context(|| format!("Reading headers from {path:?}"))?;
    let columns = identifier::sanitize_headers(&raw_headers);

    let mut rows = Vec::new();
    let mut record = csv::ByteRecord::new();
    while rows.len() < limit
        && reader
            .read_byte_record(&mut record)
            .with_context(|| format!("Reading row {} in {path:?}", rows.len() + 2))?
    {
        rows.push(io_utils::decode_record(&record, encoding)?);
    }
    debug!(
        "Sampled {} row(s) across {} column(s) from {:?}",
        rows.len(),
        columns.len(),
        path
    );

    Ok(TableSample {
        path: path.to_path_buf(),
        table: table_name_for(path),
        raw_headers,
        columns,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::UTF_8;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn digits_only_is_integer() {
        assert_eq!(infer_column_type(&["1", "2", "3"]), InferredType::Integer);
        assert_eq!(infer_column_type(&["1", "", "3"]), InferredType::Integer);
    }

    #[test]
    fn decimals_and_signs_are_numeric() {
        assert_eq!(infer_column_type(&["1.5", "2", "3.7"]), InferredType::Numeric);
        assert_eq!(infer_column_type(&["-4", "+2", "1e3"]), InferredType::Numeric);
        assert_eq!(infer_column_type(&[" 12 ", "", "7"]), InferredType::Numeric);
    }

    #[test]
    fn date_shapes_are_dates() {
        assert_eq!(
            infer_column_type(&["2023-01-01", "2023-02-15"]),
            InferredType::Date
        );
        assert_eq!(
            infer_column_type(&["01/31/2024", "31-01-2024", "", "2024-12-01"]),
            InferredType::Date
        );
    }

    #[test]
    fn date_check_is_purely_syntactic() {
        assert_eq!(infer_column_type(&["13-45-9999"]), InferredType::Date);
    }

    #[test]
    fn mixed_values_fall_back_to_text() {
        assert_eq!(infer_column_type(&["abc", "2023-01-01"]), InferredType::Text);
        assert_eq!(
            infer_column_type(&["2023-01-01T10:00:00"]),
            InferredType::Text
        );
        assert_eq!(infer_column_type(&["1,000"]), InferredType::Text);
    }

    #[test]
    fn empty_sample_is_integer() {
        let empty: [&str; 0] = [];
        assert_eq!(infer_column_type(&empty), InferredType::Integer);
        assert_eq!(infer_column_type(&["", ""]), InferredType::Integer);
    }

    #[test]
    fn whitespace_only_values_skip_integer_rule() {
        assert_eq!(infer_column_type(&[" ", "  "]), InferredType::Numeric);
    }

    #[test]
    fn sample_table_stops_at_limit_and_pads_short_rows() {
        let mut file = NamedTempFile::with_suffix(".csv").expect("temp file");
        writeln!(file, "ID,Amount,Note").unwrap();
        writeln!(file, "1,2.5").unwrap();
        for i in 2..=150 {
            writeln!(file, "{i},1,x").unwrap();
        }

        let sample = sample_table(file.path(), 500, b',', UTF_8).expect("sample");
        assert_eq!(sample.rows.len(), MAX_SAMPLE_ROWS);
        assert_eq!(sample.columns, vec!["id", "amount", "note"]);
        assert_eq!(sample.column_values(2)[0], "");
        assert_eq!(
            sample.inferred_types(),
            vec![InferredType::Integer, InferredType::Numeric, InferredType::Text]
        );
    }

    #[test]
    fn raw_headers_are_traced_back_from_sanitized_names() {
        let mut file = NamedTempFile::with_suffix(".csv").expect("temp file");
        writeln!(file, "Unit Price,unit-price,Qty").unwrap();
        writeln!(file, "1,2,3").unwrap();

        let sample = sample_table(file.path(), 10, b',', UTF_8).expect("sample");
        assert_eq!(sample.raw_headers_for("unit_price"), vec!["Unit Price", "unit-price"]);
        assert_eq!(sample.raw_headers_for("qty"), vec!["Qty"]);
        assert!(sample.raw_headers_for("missing").is_empty());
    }

    #[test]
    fn table_name_is_sanitized_stem() {
        assert_eq!(table_name_for(Path::new("/data/Order Lines.csv")), "order_lines");
        assert_eq!(table_name_for(Path::new("2024.csv")), "col_2024");
    }
}

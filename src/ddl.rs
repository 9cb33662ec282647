//! Table schemas and the DDL generated from them.
//!
//! A [`TableSchema`] is built once per source file and only read afterwards.
//! Its primary key is an explicit column position; schemas derived from a
//! file always use the first column, whether or not its values are unique.
//! All statements use `IF NOT EXISTS` so a plan can be replayed.

use std::collections::HashSet;

use thiserror::Error;

use crate::{
    identifier::quote_identifier,
    inference::{InferredType, TableSample},
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Table '{table}' has no columns")]
    NoColumns { table: String },
    #[error("Table '{table}' has more than one column named '{column}' after sanitization")]
    DuplicateColumn { table: String, column: String },
    #[error("Primary key position {position} is out of range for table '{table}'")]
    PrimaryKeyOutOfRange { table: String, position: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: InferredType,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, data_type: InferredType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    name: String,
    columns: Vec<ColumnDef>,
    primary_key: usize,
}

impl TableSchema {
    pub fn new(
        name: impl Into<String>,
        columns: Vec<ColumnDef>,
        primary_key: usize,
    ) -> Result<Self, SchemaError> {
        let name = name.into();
        if columns.is_empty() {
            return Err(SchemaError::NoColumns { table: name });
        }
        if primary_key >= columns.len() {
            return Err(SchemaError::PrimaryKeyOutOfRange {
                table: name,
                position: primary_key,
            });
        }
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(SchemaError::DuplicateColumn {
                    table: name,
                    column: column.name.clone(),
                });
            }
        }
        Ok(Self {
            name,
            columns,
            primary_key,
        })
    }

    /// First column becomes the primary key.
    pub fn from_columns(
        name: impl Into<String>,
        columns: Vec<ColumnDef>,
    ) -> Result<Self, SchemaError> {
        Self::new(name, columns, 0)
    }

    pub fn from_sample(sample: &TableSample) -> Result<Self, SchemaError> {
        let columns = sample
            .columns
            .iter()
            .zip(sample.inferred_types())
            .map(|(name, ty)| ColumnDef::new(name.clone(), ty))
            .collect();
        Self::from_columns(sample.table.clone(), columns)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn primary_key(&self) -> &ColumnDef {
        &self.columns[self.primary_key]
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn create_table_sql(&self) -> String {
        let definitions = self
            .columns
            .iter()
            .enumerate()
            .map(|(idx, column)| {
                let name = quote_identifier(&column.name);
                if idx == self.primary_key {
                    format!("{name} {} PRIMARY KEY", column.data_type.sql_name())
                } else {
                    format!("{name} {}", column.data_type.sql_name())
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({definitions});",
            quote_identifier(&self.name)
        )
    }

    pub fn index_name(&self, column: &str) -> String {
        format!("idx_{}_{}", self.name, column)
    }

    pub fn create_index_sql(&self) -> Vec<String> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(idx, _)| *idx != self.primary_key)
            .map(|(_, column)| {
                format!(
                    "CREATE INDEX IF NOT EXISTS {} ON {} ({});",
                    quote_identifier(&self.index_name(&column.name)),
                    quote_identifier(&self.name),
                    quote_identifier(&column.name)
                )
            })
            .collect()
    }

    /// CREATE TABLE followed by its indexes.
    pub fn ddl(&self) -> Vec<String> {
        let mut statements = vec![self.create_table_sql()];
        statements.extend(self.create_index_sql());
        statements
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people() -> TableSchema {
        TableSchema::from_columns(
            "people",
            vec![
                ColumnDef::new("id", InferredType::Integer),
                ColumnDef::new("name", InferredType::Text),
            ],
        )
        .expect("schema")
    }

    #[test]
    fn first_column_is_primary_key_with_one_index_per_other_column() {
        let schema = people();
        assert_eq!(schema.primary_key().name, "id");
        assert_eq!(
            schema.create_table_sql(),
            r#"CREATE TABLE IF NOT EXISTS "people" ("id" INTEGER PRIMARY KEY, "name" TEXT);"#
        );
        assert_eq!(
            schema.create_index_sql(),
            vec![r#"CREATE INDEX IF NOT EXISTS "idx_people_name" ON "people" ("name");"#]
        );
    }

    #[test]
    fn primary_key_ignores_column_type() {
        let schema = TableSchema::from_columns(
            "events",
            vec![
                ColumnDef::new("label", InferredType::Text),
                ColumnDef::new("happened_on", InferredType::Date),
                ColumnDef::new("amount", InferredType::Numeric),
            ],
        )
        .expect("schema");
        let ddl = schema.ddl();
        assert_eq!(ddl.len(), 3);
        assert!(ddl[0].contains(r#""label" TEXT PRIMARY KEY"#));
        assert!(ddl[1].contains("idx_events_happened_on"));
        assert!(ddl[2].contains("idx_events_amount"));
    }

    #[test]
    fn explicit_primary_key_position_is_honoured() {
        let schema = TableSchema::new(
            "lines",
            vec![
                ColumnDef::new("note", InferredType::Text),
                ColumnDef::new("line_id", InferredType::Integer),
            ],
            1,
        )
        .expect("schema");
        assert!(schema.create_table_sql().contains(r#""line_id" INTEGER PRIMARY KEY"#));
        assert_eq!(
            schema.create_index_sql(),
            vec![r#"CREATE INDEX IF NOT EXISTS "idx_lines_note" ON "lines" ("note");"#]
        );
    }

    #[test]
    fn reserved_words_are_quoted_everywhere() {
        let schema = TableSchema::from_columns(
            "order",
            vec![
                ColumnDef::new("group", InferredType::Text),
                ColumnDef::new("from", InferredType::Date),
            ],
        )
        .expect("schema");
        assert_eq!(
            schema.ddl(),
            vec![
                r#"CREATE TABLE IF NOT EXISTS "order" ("group" TEXT PRIMARY KEY, "from" DATE);"#,
                r#"CREATE INDEX IF NOT EXISTS "idx_order_from" ON "order" ("from");"#,
            ]
        );
    }

    #[test]
    fn single_column_table_has_no_indexes() {
        let schema =
            TableSchema::from_columns("tags", vec![ColumnDef::new("tag", InferredType::Text)])
                .expect("schema");
        assert!(schema.create_index_sql().is_empty());
    }

    #[test]
    fn duplicate_sanitized_columns_are_rejected() {
        let err = TableSchema::from_columns(
            "prices",
            vec![
                ColumnDef::new("unit_price", InferredType::Numeric),
                ColumnDef::new("unit_price", InferredType::Text),
            ],
        )
        .unwrap_err();
        assert_eq!(
            err,
            SchemaError::DuplicateColumn {
                table: "prices".to_string(),
                column: "unit_price".to_string(),
            }
        );
    }

    #[test]
    fn empty_and_out_of_range_schemas_are_rejected() {
        assert!(matches!(
            TableSchema::from_columns("empty", Vec::new()),
            Err(SchemaError::NoColumns { .. })
        ));
        assert!(matches!(
            TableSchema::new("t", vec![ColumnDef::new("a", InferredType::Text)], 3),
            Err(SchemaError::PrimaryKeyOutOfRange { position: 3, .. })
        ));
    }
}

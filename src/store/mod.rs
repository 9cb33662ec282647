//! Relational store abstraction used by the loader.
//!
//! The loader only needs a handful of operations: run a DDL statement,
//! manage an explicit transaction, list a table's columns, and insert one
//! row of text values. [`SqlStore`] captures exactly that so the same driver
//! runs against PostgreSQL in production and SQLite in tests.

pub mod pg;
pub mod sqlite;

use std::error::Error as StdError;

use log::warn;
use thiserror::Error;

use crate::{config::ConnectionConfig, identifier::quote_identifier};

pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Could not connect to {target}")]
    Connect {
        target: String,
        #[source]
        source: BoxError,
    },
    #[error("Statement failed: {sql}")]
    Statement {
        sql: String,
        #[source]
        source: BoxError,
    },
    #[error("Transaction {action} failed")]
    Transaction {
        action: &'static str,
        #[source]
        source: BoxError,
    },
    #[error("Could not read columns of table '{table}'")]
    Introspect {
        table: String,
        #[source]
        source: BoxError,
    },
}

impl StoreError {
    pub fn statement(sql: impl Into<String>, source: impl Into<BoxError>) -> Self {
        StoreError::Statement {
            sql: sql.into(),
            source: source.into(),
        }
    }

    pub fn transaction(action: &'static str, source: impl Into<BoxError>) -> Self {
        StoreError::Transaction {
            action,
            source: source.into(),
        }
    }
}

/// A destination column as reported by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestColumn {
    pub name: String,
    pub data_type: String,
}

pub trait SqlStore {
    /// Human-readable target, used in log lines.
    fn describe(&self) -> String;

    fn execute(&mut self, sql: &str) -> Result<(), StoreError>;

    fn begin(&mut self) -> Result<(), StoreError>;

    fn commit(&mut self) -> Result<(), StoreError>;

    fn rollback(&mut self) -> Result<(), StoreError>;

    /// Columns of `table` in declaration order; empty when the table is missing.
    fn table_columns(&mut self, table: &str) -> Result<Vec<DestColumn>, StoreError>;

    /// Inserts one row. `values[i]` binds to `columns[i]`, `None` as NULL.
    fn insert_row(
        &mut self,
        table: &str,
        columns: &[DestColumn],
        values: &[Option<&str>],
    ) -> Result<(), StoreError>;

    /// Runs `statements` in one transaction, rolling back on the first failure.
    fn run_transaction(&mut self, statements: &[String]) -> Result<(), StoreError> {
        self.begin()?;
        let mut outcome = Ok(());
        for sql in statements {
            outcome = self.execute(sql);
            if outcome.is_err() {
                break;
            }
        }
        let outcome = outcome.and_then(|()| self.commit());
        if outcome.is_err()
            && let Err(err) = self.rollback()
        {
            warn!("Rollback on {} failed: {err}", self.describe());
        }
        outcome
    }
}

pub fn connect(config: &ConnectionConfig) -> Result<Box<dyn SqlStore>, StoreError> {
    match config {
        ConnectionConfig::Postgres(settings) => Ok(Box::new(pg::PostgresStore::connect(settings)?)),
        ConnectionConfig::Sqlite(settings) => Ok(Box::new(sqlite::SqliteStore::open(&settings.path)?)),
    }
}

pub(crate) fn column_list(columns: &[DestColumn]) -> String {
    columns
        .iter()
        .map(|c| quote_identifier(&c.name))
        .collect::<Vec<_>>()
        .join(", ")
}

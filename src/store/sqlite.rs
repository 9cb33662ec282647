use std::path::{Path, PathBuf};

use rusqlite::{Connection, params_from_iter};

use super::{DestColumn, SqlStore, StoreError, column_list};
use crate::identifier::quote_identifier;

pub const MEMORY_PATH: &str = ":memory:";

pub struct SqliteStore {
    conn: Connection,
    path: PathBuf,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = if path == Path::new(MEMORY_PATH) {
            Connection::open_in_memory()
        } else {
            Connection::open(path)
        }
        .map_err(|err| StoreError::Connect {
            target: format!("sqlite:{}", path.display()),
            source: err.into(),
        })?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl SqlStore for SqliteStore {
    fn describe(&self) -> String {
        format!("sqlite:{}", self.path.display())
    }

    fn execute(&mut self, sql: &str) -> Result<(), StoreError> {
        self.conn
            .execute_batch(sql)
            .map_err(|err| StoreError::statement(sql, err))
    }

    fn begin(&mut self) -> Result<(), StoreError> {
        self.conn
            .execute_batch("BEGIN")
            .map_err(|err| StoreError::transaction("begin", err))
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.conn
            .execute_batch("COMMIT")
            .map_err(|err| StoreError::transaction("commit", err))
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        self.conn
            .execute_batch("ROLLBACK")
            .map_err(|err| StoreError::transaction("rollback", err))
    }

    fn table_columns(&mut self, table: &str) -> Result<Vec<DestColumn>, StoreError> {
        let introspect = |err: rusqlite::Error| StoreError::Introspect {
            table: table.to_string(),
            source: err.into(),
        };
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({})", quote_identifier(table)))
            .map_err(introspect)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(DestColumn {
                    name: row.get(1)?,
                    data_type: row.get(2)?,
                })
            })
            .map_err(introspect)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(introspect)
    }

    fn insert_row(
        &mut self,
        table: &str,
        columns: &[DestColumn],
        values: &[Option<&str>],
    ) -> Result<(), StoreError> {
        let placeholders = (1..=columns.len())
            .map(|n| format!("?{n}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({placeholders})",
            quote_identifier(table),
            column_list(columns)
        );
        self.conn
            .prepare_cached(&sql)
            .and_then(|mut stmt| stmt.execute(params_from_iter(values.iter())))
            .map(|_| ())
            .map_err(|err| StoreError::statement(sql.clone(), err))
    }
}

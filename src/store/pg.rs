use log::debug;
use postgres::{Client, NoTls, types::ToSql};

use super::{DestColumn, SqlStore, StoreError, column_list};
use crate::{config::PostgresConfig, identifier::quote_identifier};

/// `format_type` yields a castable type name where `information_schema`
/// reports `ARRAY` or `USER-DEFINED`.
const COLUMNS_QUERY: &str = "SELECT a.attname::text, format_type(a.atttypid, a.atttypmod) \
     FROM pg_attribute a \
     JOIN pg_class c ON c.oid = a.attrelid \
     JOIN pg_namespace n ON n.oid = c.relnamespace \
     WHERE n.nspname = current_schema() AND c.relname = $1 \
       AND a.attnum > 0 AND NOT a.attisdropped \
     ORDER BY a.attnum";

pub struct PostgresStore {
    client: Client,
    target: String,
}

impl PostgresStore {
    pub fn connect(config: &PostgresConfig) -> Result<Self, StoreError> {
        let target = config.describe();
        let mut pg = postgres::Config::new();
        pg.host(&config.host)
            .port(config.port)
            .user(&config.user)
            .dbname(&config.dbname);
        if let Some(password) = config.password.as_deref() {
            pg.password(password);
        }
        let client = pg.connect(NoTls).map_err(|err| StoreError::Connect {
            target: target.clone(),
            source: err.into(),
        })?;
        debug!("Connected to {target}");
        Ok(Self { client, target })
    }
}

/// `CAST($n::TEXT AS <type>)` so every value can be bound as text and still
/// land in typed columns.
fn insert_sql(table: &str, columns: &[DestColumn]) -> String {
    let placeholders = columns
        .iter()
        .enumerate()
        .map(|(idx, column)| format!("CAST(${}::TEXT AS {})", idx + 1, column.data_type))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({placeholders})",
        quote_identifier(table),
        column_list(columns)
    )
}

impl SqlStore for PostgresStore {
    fn describe(&self) -> String {
        self.target.clone()
    }

    fn execute(&mut self, sql: &str) -> Result<(), StoreError> {
        self.client
            .batch_execute(sql)
            .map_err(|err| StoreError::statement(sql, err))
    }

    fn begin(&mut self) -> Result<(), StoreError> {
        self.client
            .batch_execute("BEGIN")
            .map_err(|err| StoreError::transaction("begin", err))
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.client
            .batch_execute("COMMIT")
            .map_err(|err| StoreError::transaction("commit", err))
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        self.client
            .batch_execute("ROLLBACK")
            .map_err(|err| StoreError::transaction("rollback", err))
    }

    fn table_columns(&mut self, table: &str) -> Result<Vec<DestColumn>, StoreError> {
        let rows = self
            .client
            .query(COLUMNS_QUERY, &[&table])
            .map_err(|err| StoreError::Introspect {
                table: table.to_string(),
                source: err.into(),
            })?;
        Ok(rows
            .iter()
            .map(|row| DestColumn {
                name: row.get(0),
                data_type: row.get(1),
            })
            .collect())
    }

    fn insert_row(
        &mut self,
        table: &str,
        columns: &[DestColumn],
        values: &[Option<&str>],
    ) -> Result<(), StoreError> {
        let sql = insert_sql(table, columns);
        let params: Vec<&(dyn ToSql + Sync)> =
            values.iter().map(|v| v as &(dyn ToSql + Sync)).collect();
        self.client
            .execute(sql.as_str(), &params)
            .map(|_| ())
            .map_err(|err| StoreError::statement(sql, err))
    }
}

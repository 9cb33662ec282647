//! Loader configuration.
//!
//! Settings are resolved in three layers, last one wins: built-in defaults,
//! an optional YAML file (`--config`), then command-line flags. The result is
//! a plain [`LoaderConfig`] value handed to [`crate::loader::run`].
//!
//! ```yaml
//! data_dir: ./data
//! sample_rows: 50
//! delimiter: ";"
//! connection:
//!   backend: postgres
//!   host: db.internal
//!   user: loader
//!   dbname: warehouse
//! ```

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;

use crate::{
    cli::{self, BackendKind, LoadArgs, SourceArgs},
    inference::MAX_SAMPLE_ROWS,
    store::sqlite::MEMORY_PATH,
};

pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_EXTENSION: &str = "csv";
pub const PASSWORD_ENV: &str = "PGPASSWORD";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    pub dbname: String,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: None,
            dbname: "postgres".to_string(),
        }
    }
}

impl PostgresConfig {
    /// Connection target without the password.
    pub fn describe(&self) -> String {
        format!(
            "postgres://{}@{}:{}/{}",
            self.user, self.host, self.port, self.dbname
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SqliteConfig {
    pub path: PathBuf,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(MEMORY_PATH),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum ConnectionConfig {
    Postgres(PostgresConfig),
    Sqlite(SqliteConfig),
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        ConnectionConfig::Postgres(PostgresConfig::default())
    }
}

impl ConnectionConfig {
    fn kind(&self) -> BackendKind {
        match self {
            ConnectionConfig::Postgres(_) => BackendKind::Postgres,
            ConnectionConfig::Sqlite(_) => BackendKind::Sqlite,
        }
    }

    fn for_kind(kind: BackendKind) -> Self {
        match kind {
            BackendKind::Postgres => ConnectionConfig::Postgres(PostgresConfig::default()),
            BackendKind::Sqlite => ConnectionConfig::Sqlite(SqliteConfig::default()),
        }
    }
}

/// Where the CSV files come from and how they are read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    pub data_dir: PathBuf,
    pub extension: String,
    pub sample_rows: usize,
    pub delimiter: Option<u8>,
    pub input_encoding: Option<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            extension: DEFAULT_EXTENSION.to_string(),
            sample_rows: MAX_SAMPLE_ROWS,
            delimiter: None,
            input_encoding: None,
        }
    }
}

impl SourceConfig {
    pub fn from_args(args: &SourceArgs) -> Self {
        let mut source = Self::default();
        source.apply_args(args);
        source
    }

    fn apply_args(&mut self, args: &SourceArgs) {
        if let Some(dir) = &args.input {
            self.data_dir = dir.clone();
        }
        if let Some(rows) = args.sample_rows {
            self.sample_rows = rows;
        }
        if args.delimiter.is_some() {
            self.delimiter = args.delimiter;
        }
        if args.input_encoding.is_some() {
            self.input_encoding = args.input_encoding.clone();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LoaderConfig {
    pub source: SourceConfig,
    pub connection: ConnectionConfig,
}

/// On-disk shape of `--config`; every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    data_dir: Option<PathBuf>,
    extension: Option<String>,
    sample_rows: Option<usize>,
    delimiter: Option<String>,
    input_encoding: Option<String>,
    connection: Option<ConnectionConfig>,
}

impl FileConfig {
    fn load(path: &Path) -> Result<Self> {
        let raw =
            fs::read_to_string(path).with_context(|| format!("Opening config file {path:?}"))?;
        serde_yaml::from_str(&raw).with_context(|| format!("Parsing config file {path:?}"))
    }

    fn into_config(self) -> Result<LoaderConfig> {
        let mut config = LoaderConfig::default();
        if let Some(dir) = self.data_dir {
            config.source.data_dir = dir;
        }
        if let Some(ext) = self.extension {
            config.source.extension = ext.trim_start_matches('.').to_string();
        }
        if let Some(rows) = self.sample_rows {
            config.source.sample_rows = cli::parse_sample_rows(&rows.to_string())
                .map_err(|err| anyhow!("Invalid sample_rows in config: {err}"))?;
        }
        if let Some(delimiter) = self.delimiter {
            config.source.delimiter = Some(
                cli::parse_delimiter(&delimiter)
                    .map_err(|err| anyhow!("Invalid delimiter in config: {err}"))?,
            );
        }
        config.source.input_encoding = self.input_encoding;
        if let Some(connection) = self.connection {
            config.connection = connection;
        }
        Ok(config)
    }
}

impl LoaderConfig {
    pub fn from_args(args: &LoadArgs) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => FileConfig::load(path)?.into_config()?,
            None => LoaderConfig::default(),
        };
        config.source.apply_args(&args.source);
        config.apply_connection_args(args);
        config.fill_password_from_env(env::var(PASSWORD_ENV).ok());
        Ok(config)
    }

    fn apply_connection_args(&mut self, args: &LoadArgs) {
        if let Some(kind) = args.backend
            && kind != self.connection.kind()
        {
            self.connection = ConnectionConfig::for_kind(kind);
        }
        match &mut self.connection {
            ConnectionConfig::Postgres(pg) => {
                if let Some(host) = &args.host {
                    pg.host = host.clone();
                }
                if let Some(port) = args.port {
                    pg.port = port;
                }
                if let Some(user) = &args.user {
                    pg.user = user.clone();
                }
                if args.password.is_some() {
                    pg.password = args.password.clone();
                }
                if let Some(dbname) = &args.dbname {
                    pg.dbname = dbname.clone();
                }
            }
            ConnectionConfig::Sqlite(lite) => {
                if let Some(path) = &args.sqlite_path {
                    lite.path = path.clone();
                }
            }
        }
    }

    fn fill_password_from_env(&mut self, password: Option<String>) {
        if let ConnectionConfig::Postgres(pg) = &mut self.connection
            && pg.password.is_none()
        {
            pg.password = password.filter(|p| !p.is_empty());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;
    use tempfile::NamedTempFile;

    use crate::cli::{Cli, Commands};

    fn load_args(argv: &[&str]) -> LoadArgs {
        let mut full = vec!["csv-ingest", "load"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).expect("parse").command {
            Commands::Load(args) => args,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn defaults_target_local_postgres() {
        let mut config = LoaderConfig::default();
        config.apply_connection_args(&load_args(&[]));
        assert_eq!(config.source.data_dir, PathBuf::from("data"));
        assert_eq!(config.source.sample_rows, MAX_SAMPLE_ROWS);
        match config.connection {
            ConnectionConfig::Postgres(pg) => {
                assert_eq!(pg.describe(), "postgres://postgres@localhost:5432/postgres");
            }
            other => panic!("unexpected connection {other:?}"),
        }
    }

    #[test]
    fn yaml_file_is_overridden_by_flags() {
        let mut file = NamedTempFile::with_suffix(".yml").expect("temp file");
        writeln!(
            file,
            "data_dir: incoming\nsample_rows: 20\ndelimiter: pipe\nconnection:\n  backend: postgres\n  host: db.internal\n  user: loader\n  password: secret"
        )
        .unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let config =
            LoaderConfig::from_args(&load_args(&["--config", &path, "--user", "admin"]))
                .expect("config");
        assert_eq!(config.source.data_dir, PathBuf::from("incoming"));
        assert_eq!(config.source.sample_rows, 20);
        assert_eq!(config.source.delimiter, Some(b'|'));
        match config.connection {
            ConnectionConfig::Postgres(pg) => {
                assert_eq!(pg.host, "db.internal");
                assert_eq!(pg.user, "admin");
                assert_eq!(pg.port, 5432);
                assert_eq!(pg.password.as_deref(), Some("secret"));
            }
            other => panic!("unexpected connection {other:?}"),
        }
    }

    #[test]
    fn backend_flag_switches_connection_kind() {
        let mut config = LoaderConfig::default();
        config.apply_connection_args(&load_args(&[
            "--backend",
            "sqlite",
            "--sqlite-path",
            "warehouse.db",
        ]));
        assert_eq!(
            config.connection,
            ConnectionConfig::Sqlite(SqliteConfig {
                path: PathBuf::from("warehouse.db"),
            })
        );
    }

    #[test]
    fn env_password_only_fills_missing_value() {
        let mut config = LoaderConfig::default();
        config.fill_password_from_env(Some("from-env".to_string()));
        let mut explicit = LoaderConfig::default();
        explicit.apply_connection_args(&load_args(&["--password", "flag"]));
        explicit.fill_password_from_env(Some("from-env".to_string()));

        let password = |c: &LoaderConfig| match &c.connection {
            ConnectionConfig::Postgres(pg) => pg.password.clone(),
            ConnectionConfig::Sqlite(_) => None,
        };
        assert_eq!(password(&config).as_deref(), Some("from-env"));
        assert_eq!(password(&explicit).as_deref(), Some("flag"));
    }

    #[test]
    fn unknown_config_keys_are_rejected() {
        let mut file = NamedTempFile::with_suffix(".yml").expect("temp file");
        writeln!(file, "data_directory: oops").unwrap();
        let err = FileConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("Parsing config file"));
    }

    #[test]
    fn out_of_range_sample_rows_in_file_are_rejected() {
        let config = FileConfig {
            sample_rows: Some(500),
            ..FileConfig::default()
        };
        let err = config.into_config().unwrap_err();
        assert!(err.to_string().contains("sample_rows"));
    }
}

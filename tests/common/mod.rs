#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::Connection;
use tempfile::{TempDir, tempdir};

/// Scratch directory that cleans up on drop. Holds a `data/` folder for
/// inputs next to whatever outputs a test produces.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        let workspace = Self {
            temp_dir: tempdir().expect("temp dir"),
        };
        fs::create_dir_all(workspace.data_dir()).expect("create data dir");
        workspace
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn data_dir(&self) -> PathBuf {
        self.temp_dir.path().join("data")
    }

    /// Writes `contents` to `data/<name>`, creating parent folders.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.data_dir().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        fs::write(&path, contents).expect("write fixture");
        path
    }

    pub fn sqlite_path(&self) -> PathBuf {
        self.temp_dir.path().join("warehouse.db")
    }
}

pub fn count_rows(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM \"{table}\""), [], |row| row.get(0))
        .expect("count rows")
}

pub fn column_values(conn: &Connection, table: &str, column: &str) -> Vec<Option<String>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT CAST(\"{column}\" AS TEXT) FROM \"{table}\" ORDER BY rowid"
        ))
        .expect("prepare select");
    let values = stmt
        .query_map([], |row| row.get(0))
        .expect("query")
        .map(|value| value.expect("row"))
        .collect();
    values
}

pub fn orders_and_customers(workspace: &TestWorkspace) {
    workspace.write(
        "orders.csv",
        "ID,Customer ID,Placed On,Total\n1,10,2024-01-05,19.99\n2,11,2024-02-11,5\n",
    );
    workspace.write("customers.csv", "id,name\n10,Ann\n11,Bao\n");
}

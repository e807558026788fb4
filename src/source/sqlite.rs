//! SQLite source backend

use std::path::PathBuf;
use std::time::Duration;

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};

use crate::config::{BackendKind, ConnectionDescriptor};
use crate::error::MigrationError;

use super::{build_count, build_select, DataSource, QuoteStyle, RawRow, Value};

pub struct SqliteSource {
    conn: Connection,
    path: PathBuf,
}

impl SqliteSource {
    pub fn open(
        descriptor: &ConnectionDescriptor,
        timeout: Duration,
    ) -> Result<Self, MigrationError> {
        let path = descriptor
            .sqlite_path
            .clone()
            .ok_or_else(|| MigrationError::ConnectionError {
                backend: "sqlite".to_string(),
                message: "connection descriptor has no database path".to_string(),
            })?;
        if !path.exists() {
            return Err(MigrationError::ConnectionError {
                backend: "sqlite".to_string(),
                message: format!("database file not found: {}", path.display()),
            });
        }
        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| MigrationError::ConnectionError {
            backend: "sqlite".to_string(),
            message: e.to_string(),
        })?;
        conn.busy_timeout(timeout)
            .map_err(|e| MigrationError::ConnectionError {
                backend: "sqlite".to_string(),
                message: e.to_string(),
            })?;
        Ok(SqliteSource { conn, path })
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl DataSource for SqliteSource {
    fn backend(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    fn query_table(
        &mut self,
        table: &str,
        user_where: Option<&str>,
    ) -> Result<Vec<RawRow>, MigrationError> {
        let sql = build_select(QuoteStyle::DoubleQuote, table, user_where)?;
        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| MigrationError::QueryError {
                table: table.to_string(),
                message: e.to_string(),
            })?;
        let column_names: Vec<String> =
            stmt.column_names().iter().map(|s| s.to_string()).collect();

        let mut out = Vec::new();
        let mut rows = stmt.query([]).map_err(|e| MigrationError::QueryError {
            table: table.to_string(),
            message: e.to_string(),
        })?;
        while let Some(row) = rows.next().map_err(|e| MigrationError::QueryError {
            table: table.to_string(),
            message: e.to_string(),
        })? {
            let mut raw = RawRow::new(table);
            for (index, name) in column_names.iter().enumerate() {
                let value = match row.get_ref(index).map_err(|e| MigrationError::QueryError {
                    table: table.to_string(),
                    message: e.to_string(),
                })? {
                    ValueRef::Null => Value::Null,
                    ValueRef::Integer(i) => Value::Int(i),
                    ValueRef::Real(r) => Value::Real(r),
                    ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
                    ValueRef::Blob(b) => Value::Blob(b.to_vec()),
                };
                raw.columns.insert(name.clone(), value);
            }
            out.push(raw);
        }
        Ok(out)
    }

    fn count_rows(
        &mut self,
        table: &str,
        user_where: Option<&str>,
    ) -> Result<u64, MigrationError> {
        let sql = build_count(QuoteStyle::DoubleQuote, table, user_where)?;
        let count: i64 = self
            .conn
            .query_row(&sql, [], |row| row.get(0))
            .map_err(|e| MigrationError::QueryError {
                table: table.to_string(),
                message: e.to_string(),
            })?;
        Ok(count.max(0) as u64)
    }

    fn close(self: Box<Self>) -> Result<(), MigrationError> {
        self.conn
            .close()
            .map_err(|(_, e)| MigrationError::ConnectionError {
                backend: "sqlite".to_string(),
                message: e.to_string(),
            })
    }
}

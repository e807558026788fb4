//! ODBC source backend covering MS-Access and SQL Server
//!
//! Values arrive through ODBC text buffers, so every non-null cell surfaces
//! as `Value::Text`; the field resolver's canonical string conversion makes
//! that lossless for mapping purposes.

use std::sync::OnceLock;
use std::time::Duration;

use odbc_api::buffers::TextRowSet;
use odbc_api::{ConnectionOptions, Cursor, Environment, ResultSetMetadata};

use crate::config::{BackendKind, ConnectionDescriptor};
use crate::error::MigrationError;

use super::{build_count, build_select, redact_connection_string, DataSource, QuoteStyle, RawRow, Value};

/// Rows fetched per ODBC round-trip
const FETCH_BATCH: usize = 512;
/// Upper bound on a single text cell, in bytes
const MAX_CELL_BYTES: usize = 65536;

fn environment() -> Result<&'static Environment, MigrationError> {
    static ENV: OnceLock<Environment> = OnceLock::new();
    if ENV.get().is_none() {
        let env = Environment::new().map_err(|e| MigrationError::ConnectionError {
            backend: "odbc".to_string(),
            message: format!("cannot create ODBC environment: {}", e),
        })?;
        let _ = ENV.set(env);
    }
    Ok(ENV.get().expect("ODBC environment initialized above"))
}

pub struct OdbcSource {
    conn: odbc_api::Connection<'static>,
    kind: BackendKind,
}

impl OdbcSource {
    pub fn open(
        descriptor: &ConnectionDescriptor,
        timeout: Duration,
    ) -> Result<Self, MigrationError> {
        let env = environment()?;
        let options = ConnectionOptions {
            login_timeout_sec: Some(timeout.as_secs().min(u32::MAX as u64) as u32),
            ..ConnectionOptions::default()
        };
        let conn = env
            .connect_with_connection_string(&descriptor.raw_connection_string, options)
            .map_err(|e| MigrationError::ConnectionError {
                backend: descriptor.kind.as_str().to_string(),
                message: format!(
                    "{} ({})",
                    e,
                    redact_connection_string(&descriptor.raw_connection_string)
                ),
            })?;
        Ok(OdbcSource {
            conn,
            kind: descriptor.kind,
        })
    }

    fn query_error(&self, table: &str, err: impl std::fmt::Display) -> MigrationError {
        MigrationError::QueryError {
            table: table.to_string(),
            message: err.to_string(),
        }
    }
}

impl DataSource for OdbcSource {
    fn backend(&self) -> BackendKind {
        self.kind
    }

    fn query_table(
        &mut self,
        table: &str,
        user_where: Option<&str>,
    ) -> Result<Vec<RawRow>, MigrationError> {
        let sql = build_select(QuoteStyle::Bracket, table, user_where)?;
        let cursor = self
            .conn
            .execute(&sql, ())
            .map_err(|e| self.query_error(table, e))?
            .ok_or_else(|| self.query_error(table, "statement produced no result set"))?;

        let mut cursor = cursor;
        let column_names: Vec<String> = cursor
            .column_names()
            .map_err(|e| self.query_error(table, e))?
            .collect::<Result<_, _>>()
            .map_err(|e| self.query_error(table, e))?;

        let mut buffers = TextRowSet::for_cursor(FETCH_BATCH, &mut cursor, Some(MAX_CELL_BYTES))
            .map_err(|e| self.query_error(table, e))?;
        let mut row_set_cursor = cursor
            .bind_buffer(&mut buffers)
            .map_err(|e| self.query_error(table, e))?;

        let mut out = Vec::new();
        while let Some(batch) = row_set_cursor
            .fetch()
            .map_err(|e| self.query_error(table, e))?
        {
            for row_index in 0..batch.num_rows() {
                let mut raw = RawRow::new(table);
                for (col_index, name) in column_names.iter().enumerate() {
                    let value = match batch.at(col_index, row_index) {
                        Some(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
                        None => Value::Null,
                    };
                    raw.columns.insert(name.clone(), value);
                }
                out.push(raw);
            }
        }
        Ok(out)
    }

    fn count_rows(
        &mut self,
        table: &str,
        user_where: Option<&str>,
    ) -> Result<u64, MigrationError> {
        let sql = build_count(QuoteStyle::Bracket, table, user_where)?;
        let cursor = self
            .conn
            .execute(&sql, ())
            .map_err(|e| self.query_error(table, e))?
            .ok_or_else(|| self.query_error(table, "count produced no result set"))?;

        let mut cursor = cursor;
        let mut buffers = TextRowSet::for_cursor(1, &mut cursor, Some(64))
            .map_err(|e| self.query_error(table, e))?;
        let mut row_set_cursor = cursor
            .bind_buffer(&mut buffers)
            .map_err(|e| self.query_error(table, e))?;

        let batch = row_set_cursor
            .fetch()
            .map_err(|e| self.query_error(table, e))?
            .ok_or_else(|| self.query_error(table, "count returned no rows"))?;
        let text = batch
            .at(0, 0)
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .unwrap_or_default();
        text.trim()
            .parse::<u64>()
            .map_err(|e| self.query_error(table, e))
    }

    fn close(self: Box<Self>) -> Result<(), MigrationError> {
        // Dropping the connection disconnects
        Ok(())
    }
}

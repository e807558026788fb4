//! PostgreSQL source backend

use std::time::Duration;

use postgres::types::Type;
use postgres::{Client, NoTls};

use crate::config::dblib::extract_clause;
use crate::config::{BackendKind, ConnectionDescriptor};
use crate::error::MigrationError;

use super::{build_count, build_select, DataSource, QuoteStyle, RawRow, Value};

pub struct PostgresSource {
    client: Client,
}

impl PostgresSource {
    pub fn open(
        descriptor: &ConnectionDescriptor,
        timeout: Duration,
    ) -> Result<Self, MigrationError> {
        let raw = &descriptor.raw_connection_string;
        // Translate Altium key=value clauses into libpq parameters
        let mut params = String::new();
        for (clause_key, pg_key) in [
            ("Server", "host"),
            ("Host", "host"),
            ("Port", "port"),
            ("Database", "dbname"),
            ("Uid", "user"),
            ("User", "user"),
            ("Pwd", "password"),
            ("Password", "password"),
        ] {
            if let Some(value) = extract_clause(raw, clause_key) {
                if !params.contains(&format!("{}=", pg_key)) {
                    params.push_str(&format!("{}={} ", pg_key, value));
                }
            }
        }
        params.push_str(&format!("connect_timeout={}", timeout.as_secs().max(1)));

        let client =
            Client::connect(&params, NoTls).map_err(|e| MigrationError::ConnectionError {
                backend: "postgres".to_string(),
                message: e.to_string(),
            })?;
        Ok(PostgresSource { client })
    }
}

fn cell_value(row: &postgres::Row, index: usize) -> Value {
    let column_type = row.columns()[index].type_();
    if *column_type == Type::INT2 {
        row.get::<_, Option<i16>>(index)
            .map(|v| Value::Int(v as i64))
            .unwrap_or(Value::Null)
    } else if *column_type == Type::INT4 {
        row.get::<_, Option<i32>>(index)
            .map(|v| Value::Int(v as i64))
            .unwrap_or(Value::Null)
    } else if *column_type == Type::INT8 {
        row.get::<_, Option<i64>>(index)
            .map(Value::Int)
            .unwrap_or(Value::Null)
    } else if *column_type == Type::FLOAT4 {
        row.get::<_, Option<f32>>(index)
            .map(|v| Value::Real(v as f64))
            .unwrap_or(Value::Null)
    } else if *column_type == Type::FLOAT8 {
        row.get::<_, Option<f64>>(index)
            .map(Value::Real)
            .unwrap_or(Value::Null)
    } else if *column_type == Type::BOOL {
        row.get::<_, Option<bool>>(index)
            .map(|v| Value::Int(v as i64))
            .unwrap_or(Value::Null)
    } else if *column_type == Type::BYTEA {
        row.get::<_, Option<Vec<u8>>>(index)
            .map(Value::Blob)
            .unwrap_or(Value::Null)
    } else if *column_type == Type::TEXT
        || *column_type == Type::VARCHAR
        || *column_type == Type::BPCHAR
        || *column_type == Type::NAME
    {
        row.get::<_, Option<String>>(index)
            .map(Value::Text)
            .unwrap_or(Value::Null)
    } else {
        row.try_get::<_, Option<String>>(index)
            .ok()
            .flatten()
            .map(Value::Text)
            .unwrap_or(Value::Null)
    }
}

impl DataSource for PostgresSource {
    fn backend(&self) -> BackendKind {
        BackendKind::Postgres
    }

    fn query_table(
        &mut self,
        table: &str,
        user_where: Option<&str>,
    ) -> Result<Vec<RawRow>, MigrationError> {
        let sql = build_select(QuoteStyle::DoubleQuote, table, user_where)?;
        let rows = self
            .client
            .query(&sql, &[])
            .map_err(|e| MigrationError::QueryError {
                table: table.to_string(),
                message: e.to_string(),
            })?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut raw = RawRow::new(table);
            for (index, column) in row.columns().iter().enumerate() {
                raw.columns
                    .insert(column.name().to_string(), cell_value(row, index));
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
        let row = self
            .client
            .query_one(&sql, &[])
            .map_err(|e| MigrationError::QueryError {
                table: table.to_string(),
                message: e.to_string(),
            })?;
        let count: i64 = row.get(0);
        Ok(count.max(0) as u64)
    }

    fn close(self: Box<Self>) -> Result<(), MigrationError> {
        Ok(())
    }
}

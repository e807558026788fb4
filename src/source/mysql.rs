//! MySQL source backend

use std::time::Duration;

use mysql::prelude::Queryable;
use mysql::{Conn, OptsBuilder};

use crate::config::dblib::extract_clause;
use crate::config::{BackendKind, ConnectionDescriptor};
use crate::error::MigrationError;

use super::{build_count, build_select, DataSource, QuoteStyle, RawRow, Value};

pub struct MySqlSource {
    conn: Conn,
}

impl MySqlSource {
    pub fn open(
        descriptor: &ConnectionDescriptor,
        timeout: Duration,
    ) -> Result<Self, MigrationError> {
        let raw = &descriptor.raw_connection_string;
        let connection_error = |message: String| MigrationError::ConnectionError {
            backend: "mysql".to_string(),
            message,
        };

        // Altium writes key=value clauses, not URLs
        let builder = OptsBuilder::new()
            .ip_or_hostname(
                extract_clause(raw, "Server")
                    .or_else(|| extract_clause(raw, "Host"))
                    .map(str::to_string),
            )
            .db_name(
                extract_clause(raw, "Database").map(str::to_string),
            )
            .user(
                extract_clause(raw, "Uid")
                    .or_else(|| extract_clause(raw, "User"))
                    .map(str::to_string),
            )
            .pass(
                extract_clause(raw, "Pwd")
                    .or_else(|| extract_clause(raw, "Password"))
                    .map(str::to_string),
            )
            .tcp_port(
                extract_clause(raw, "Port")
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(3306),
            )
            .tcp_connect_timeout(Some(timeout));

        let conn = Conn::new(builder).map_err(|e| connection_error(e.to_string()))?;
        Ok(MySqlSource { conn })
    }
}

impl DataSource for MySqlSource {
    fn backend(&self) -> BackendKind {
        BackendKind::MySql
    }

    fn query_table(
        &mut self,
        table: &str,
        user_where: Option<&str>,
    ) -> Result<Vec<RawRow>, MigrationError> {
        let sql = build_select(QuoteStyle::Backtick, table, user_where)?;
        let result = self
            .conn
            .query_iter(sql)
            .map_err(|e| MigrationError::QueryError {
                table: table.to_string(),
                message: e.to_string(),
            })?;

        let column_names: Vec<String> = result
            .columns()
            .as_ref()
            .iter()
            .map(|c| c.name_str().into_owned())
            .collect();

        let mut out = Vec::new();
        for row in result {
            let row = row.map_err(|e| MigrationError::QueryError {
                table: table.to_string(),
                message: e.to_string(),
            })?;
            let mut raw = RawRow::new(table);
            for (index, name) in column_names.iter().enumerate() {
                let value = match row.as_ref(index) {
                    Some(mysql::Value::NULL) | None => Value::Null,
                    Some(mysql::Value::Int(i)) => Value::Int(*i),
                    Some(mysql::Value::UInt(u)) => Value::Int(*u as i64),
                    Some(mysql::Value::Float(f)) => Value::Real(*f as f64),
                    Some(mysql::Value::Double(d)) => Value::Real(*d),
                    Some(mysql::Value::Bytes(bytes)) => {
                        match std::str::from_utf8(bytes) {
                            Ok(text) => Value::Text(text.to_string()),
                            Err(_) => Value::Blob(bytes.clone()),
                        }
                    }
                    Some(other) => Value::Text(format!("{:?}", other)),
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
        let sql = build_count(QuoteStyle::Backtick, table, user_where)?;
        let count: Option<u64> =
            self.conn
                .query_first(sql)
                .map_err(|e| MigrationError::QueryError {
                    table: table.to_string(),
                    message: e.to_string(),
                })?;
        Ok(count.unwrap_or(0))
    }

    fn close(self: Box<Self>) -> Result<(), MigrationError> {
        Ok(())
    }
}

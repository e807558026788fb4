//! Data source abstraction over the relational backends a DbLib can point at
//!
//! SQLite is always compiled in; MS-Access and SQL Server (via ODBC), MySQL
//! and PostgreSQL are behind cargo features. A backend that was compiled out
//! surfaces as `DriverMissing`.

pub mod extractor;
pub mod sqlite;

#[cfg(feature = "mysql")]
pub mod mysql;
#[cfg(feature = "odbc")]
pub mod odbc;
#[cfg(feature = "postgres")]
pub mod postgres;

use std::time::Duration;

use indexmap::IndexMap;

use crate::config::{BackendKind, ConnectionDescriptor};
use crate::error::MigrationError;
use crate::util::{clean_text, eq_ci};

/// A single cell value as returned by a backend
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Canonical string conversion: trim, strip NULs, cap length.
    /// Blobs are decoded lossily; nulls become the empty string.
    pub fn to_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Int(i) => i.to_string(),
            Value::Real(r) => {
                if r.fract() == 0.0 && r.is_finite() {
                    format!("{:.0}", r)
                } else {
                    r.to_string()
                }
            }
            Value::Text(s) => clean_text(s),
            Value::Blob(b) => clean_text(&String::from_utf8_lossy(b)),
        }
    }
}

/// One row as extracted from a source table; column order is the backend's
/// declared order.
#[derive(Debug, Clone)]
pub struct RawRow {
    pub table: String,
    pub columns: IndexMap<String, Value>,
}

impl RawRow {
    pub fn new(table: impl Into<String>) -> Self {
        RawRow {
            table: table.into(),
            columns: IndexMap::new(),
        }
    }

    /// Case-insensitive column lookup
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(name, _)| eq_ci(name, column))
            .map(|(_, value)| value)
    }

    /// Cleaned text of a column, `None` when absent or empty after trim
    pub fn text(&self, column: &str) -> Option<String> {
        let text = self.get(column)?.to_text();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

/// Capability surface of a relational backend
pub trait DataSource {
    fn backend(&self) -> BackendKind;

    /// Fetch all rows of a table in the backend's declared column order.
    /// `user_where` is passed verbatim into the WHERE clause.
    fn query_table(
        &mut self,
        table: &str,
        user_where: Option<&str>,
    ) -> Result<Vec<RawRow>, MigrationError>;

    /// Row count for progress reporting
    fn count_rows(&mut self, table: &str, user_where: Option<&str>)
        -> Result<u64, MigrationError>;

    fn close(self: Box<Self>) -> Result<(), MigrationError>;
}

/// Identifier quoting per backend family
#[derive(Debug, Clone, Copy)]
pub enum QuoteStyle {
    /// `"name"` — SQLite, PostgreSQL
    DoubleQuote,
    /// `[name]` — Access, SQL Server
    Bracket,
    /// `` `name` `` — MySQL
    Backtick,
}

impl QuoteStyle {
    pub fn quote(&self, ident: &str) -> String {
        match self {
            QuoteStyle::DoubleQuote => format!("\"{}\"", ident.replace('"', "\"\"")),
            QuoteStyle::Bracket => format!("[{}]", ident.replace(']', "]]")),
            QuoteStyle::Backtick => format!("`{}`", ident.replace('`', "``")),
        }
    }
}

/// Build the extraction query. The WHERE clause is trusted input but
/// multi-statement text is refused outright.
pub fn build_select(
    quote: QuoteStyle,
    table: &str,
    user_where: Option<&str>,
) -> Result<String, MigrationError> {
    let mut sql = format!("SELECT * FROM {}", quote.quote(table));
    if let Some(clause) = user_where {
        let clause = clause.trim();
        if clause.contains(';') {
            return Err(MigrationError::QueryError {
                table: table.to_string(),
                message: "multi-statement WHERE clause refused".to_string(),
            });
        }
        if !clause.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(clause);
        }
    }
    Ok(sql)
}

/// Like `build_select` but counting
pub fn build_count(
    quote: QuoteStyle,
    table: &str,
    user_where: Option<&str>,
) -> Result<String, MigrationError> {
    let select = build_select(quote, table, user_where)?;
    Ok(select.replacen("SELECT *", "SELECT COUNT(*)", 1))
}

/// Open a connection for the descriptor, dispatching on the inferred kind
pub fn connect(
    descriptor: &ConnectionDescriptor,
    timeout: Duration,
) -> Result<Box<dyn DataSource>, MigrationError> {
    match descriptor.kind {
        BackendKind::Sqlite => Ok(Box::new(sqlite::SqliteSource::open(descriptor, timeout)?)),

        #[cfg(feature = "odbc")]
        BackendKind::Access | BackendKind::SqlServer => {
            Ok(Box::new(odbc::OdbcSource::open(descriptor, timeout)?))
        }

        #[cfg(feature = "mysql")]
        BackendKind::MySql => Ok(Box::new(mysql::MySqlSource::open(descriptor, timeout)?)),

        #[cfg(feature = "postgres")]
        BackendKind::Postgres => Ok(Box::new(postgres::PostgresSource::open(
            descriptor, timeout,
        )?)),

        kind => Err(MigrationError::DriverMissing {
            backend: kind.as_str().to_string(),
            hint: redact_connection_string(&descriptor.raw_connection_string),
        }),
    }
}

/// Connection strings can embed credentials; strip password clauses before
/// they reach logs or error messages.
pub fn redact_connection_string(raw: &str) -> String {
    raw.split(';')
        .map(|clause| {
            let key = clause.split('=').next().unwrap_or("").trim();
            if eq_ci(key, "password") || eq_ci(key, "pwd") {
                format!("{}=***", key)
            } else {
                clause.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(";")
}

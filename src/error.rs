//! Error types and recovery policy for dblib-migrate

use std::path::PathBuf;
use thiserror::Error;

/// Severity attached to every error kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

/// What the orchestrator does with an error of a given kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Abort the whole run; emit a failure report
    AbortRun,
    /// Abort the current phase; surface in the report
    AbortPhase,
    /// Recover per strategy, log and count
    Recover,
    /// Informational only
    Note,
}

/// Errors that can occur during a migration
#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Invalid source configuration: {message}")]
    ConfigError { message: String },

    #[error("Failed to read DbLib file: {path}")]
    DblibReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot open data source ({backend}): {message}")]
    ConnectionError { backend: String, message: String },

    #[error("Query failed for table {table}: {message}")]
    QueryError { table: String, message: String },

    #[error("No driver support for {backend} (connection string: {hint})")]
    DriverMissing { backend: String, hint: String },

    #[error("Mapping failed for row in {table}: {message}")]
    MappingError { table: String, message: String },

    #[error("Row data failed validation: {message}")]
    ValidationError { message: String },

    #[error("Cannot access {path}: {message}")]
    FileAccessError { path: PathBuf, message: String },

    #[error("Out of memory: {message}")]
    MemoryError { message: String },

    #[error("Migration cancelled")]
    Cancelled,

    #[error("Target store error: {message}")]
    StoreError {
        message: String,
        #[source]
        source: rusqlite::Error,
    },
}

impl MigrationError {
    /// Stable kind name used in reports and logs
    pub fn kind(&self) -> &'static str {
        match self {
            MigrationError::ConfigError { .. } | MigrationError::DblibReadError { .. } => {
                "ConfigError"
            }
            MigrationError::ConnectionError { .. } => "ConnectionError",
            MigrationError::QueryError { .. } => "QueryError",
            MigrationError::DriverMissing { .. } => "DriverMissing",
            MigrationError::MappingError { .. } => "MappingError",
            MigrationError::ValidationError { .. } => "ValidationError",
            MigrationError::FileAccessError { .. } => "FileAccessError",
            MigrationError::MemoryError { .. } => "MemoryError",
            MigrationError::Cancelled => "Cancelled",
            MigrationError::StoreError { .. } => "FileAccessError",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            MigrationError::ConfigError { .. } | MigrationError::DblibReadError { .. } => {
                Severity::High
            }
            MigrationError::ConnectionError { .. } => Severity::Critical,
            MigrationError::QueryError { .. } => Severity::Medium,
            MigrationError::DriverMissing { .. } => Severity::Critical,
            MigrationError::MappingError { .. } => Severity::Medium,
            MigrationError::ValidationError { .. } => Severity::Medium,
            MigrationError::FileAccessError { .. } | MigrationError::StoreError { .. } => {
                Severity::High
            }
            MigrationError::MemoryError { .. } => Severity::Critical,
            MigrationError::Cancelled => Severity::Low,
        }
    }

    /// Propagation policy: critical aborts the run, high aborts the phase,
    /// medium is recovered and counted, low is informational.
    pub fn disposition(&self) -> Disposition {
        match self.severity() {
            Severity::Critical => Disposition::AbortRun,
            Severity::High => Disposition::AbortPhase,
            Severity::Medium => Disposition::Recover,
            Severity::Low => Disposition::Note,
        }
    }

    /// Advisory appended to the report for kinds that carry one
    pub fn advisory(&self) -> Option<&'static str> {
        match self {
            MigrationError::MemoryError { .. } => {
                Some("reduce batch_size or disable caching to lower memory pressure")
            }
            MigrationError::DriverMissing { .. } => {
                Some("rebuild with the matching backend feature enabled (odbc, mysql, postgres)")
            }
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for MigrationError {
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(code, ref msg) = err {
            if code.code == rusqlite::ErrorCode::OutOfMemory {
                return MigrationError::MemoryError {
                    message: msg.clone().unwrap_or_else(|| "sqlite NOMEM".to_string()),
                };
            }
        }
        MigrationError::StoreError {
            message: err.to_string(),
            source: err,
        }
    }
}

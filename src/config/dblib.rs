//! Parser for Altium .DbLib files
//!
//! A DbLib is an INI-style file pairing table definitions with a connection
//! string to an external database of parts. Section and key names are
//! case-insensitive; comments start with `;` or `#`.

use std::path::{Path, PathBuf};

use anyhow::Result;
use encoding_rs::WINDOWS_1252;
use indexmap::IndexMap;

use crate::error::MigrationError;
use crate::util::{contains_ci, eq_ci, starts_with_ci};

/// Database backend inferred from the connection string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Sqlite,
    Access,
    SqlServer,
    MySql,
    Postgres,
    Unknown,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Sqlite => "sqlite",
            BackendKind::Access => "access",
            BackendKind::SqlServer => "sqlserver",
            BackendKind::MySql => "mysql",
            BackendKind::Postgres => "postgres",
            BackendKind::Unknown => "unknown",
        }
    }
}

/// Connection target parsed out of the `DatabaseLinks` section
#[derive(Debug, Clone)]
pub struct ConnectionDescriptor {
    pub kind: BackendKind,
    pub raw_connection_string: String,
    /// Extracted from the `Database=` clause when `kind` is Sqlite
    pub sqlite_path: Option<PathBuf>,
}

/// One `Table*` section of the DbLib
#[derive(Debug, Clone)]
pub struct TableSpec {
    pub enabled: bool,
    pub key_field: String,
    pub symbol_field: String,
    pub footprint_field: String,
    pub description_field: String,
    pub user_where: Option<String>,
    /// Declared custom field names, in declaration order
    pub declared_custom_fields: Vec<String>,
}

impl Default for TableSpec {
    fn default() -> Self {
        TableSpec {
            enabled: false,
            key_field: "Part Number".to_string(),
            symbol_field: "Symbol".to_string(),
            footprint_field: "Footprint".to_string(),
            description_field: "Description".to_string(),
            user_where: None,
            declared_custom_fields: Vec::new(),
        }
    }
}

/// Parsed DbLib: connection descriptor plus table definitions in file order
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub connection: ConnectionDescriptor,
    pub tables: IndexMap<String, TableSpec>,
}

impl SourceConfig {
    /// Enabled tables in file order
    pub fn enabled_tables(&self) -> impl Iterator<Item = (&String, &TableSpec)> {
        self.tables.iter().filter(|(_, spec)| spec.enabled)
    }
}

/// Read a file as a string, trying UTF-8 first, then Windows-1252 as fallback
/// (Altium writes DbLib files in the platform-default encoding).
fn read_with_encoding_fallback(path: &Path) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    match String::from_utf8(bytes.clone()) {
        Ok(s) => Ok(s),
        Err(_) => {
            let (decoded, _, had_errors) = WINDOWS_1252.decode(&bytes);
            if had_errors {
                Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "File contains invalid characters",
                ))
            } else {
                Ok(decoded.into_owned())
            }
        }
    }
}

/// Parse a .DbLib file into a `SourceConfig`
pub fn parse_dblib(path: &Path) -> Result<SourceConfig> {
    let content =
        read_with_encoding_fallback(path).map_err(|e| MigrationError::DblibReadError {
            path: path.to_path_buf(),
            source: e,
        })?;
    let content = content.strip_prefix('\u{FEFF}').unwrap_or(&content);

    let sections = parse_ini_sections(content);

    let links = sections
        .iter()
        .find(|(name, _)| eq_ci(name, "DatabaseLinks"))
        .ok_or_else(|| MigrationError::ConfigError {
            message: format!("{}: no DatabaseLinks section", path.display()),
        })?;

    let raw_connection_string = get_ci(&links.1, "ConnectionString")
        .map(str::to_string)
        .unwrap_or_default();
    if raw_connection_string.trim().is_empty() {
        return Err(MigrationError::ConfigError {
            message: format!("{}: empty connection string", path.display()),
        }
        .into());
    }

    let kind = infer_backend_kind(&raw_connection_string);
    let sqlite_path = if kind == BackendKind::Sqlite {
        let db = extract_clause(&raw_connection_string, "Database").ok_or_else(|| {
            MigrationError::ConfigError {
                message: format!(
                    "{}: SQLite connection string has no Database= clause",
                    path.display()
                ),
            }
        })?;
        Some(PathBuf::from(db))
    } else {
        None
    };

    let mut tables = IndexMap::new();
    for (name, keys) in &sections {
        if !starts_with_ci(name, "Table") {
            continue;
        }
        let Some(table_name) = get_ci(keys, "TableName").filter(|t| !t.trim().is_empty()) else {
            continue;
        };
        let spec = parse_table_section(keys);
        tables.insert(table_name.trim().to_string(), spec);
    }

    let config = SourceConfig {
        connection: ConnectionDescriptor {
            kind,
            raw_connection_string,
            sqlite_path,
        },
        tables,
    };

    if config.enabled_tables().next().is_none() {
        return Err(MigrationError::ConfigError {
            message: format!("{}: no enabled tables", path.display()),
        }
        .into());
    }
    for (table, spec) in config.enabled_tables() {
        for (label, field) in [
            ("Key", &spec.key_field),
            ("Symbols", &spec.symbol_field),
            ("Footprints", &spec.footprint_field),
            ("Description", &spec.description_field),
        ] {
            if field.trim().is_empty() {
                return Err(MigrationError::ConfigError {
                    message: format!("table {}: empty {} field name", table, label),
                }
                .into());
            }
        }
    }

    Ok(config)
}

/// Ordered kind inference over the connection string; first match wins
pub fn infer_backend_kind(connection_string: &str) -> BackendKind {
    const RULES: &[(&[&str], BackendKind)] = &[
        (
            &["microsoft.ace.oledb", ".mdb", ".accdb"],
            BackendKind::Access,
        ),
        (&["sql server", "sqlserver"], BackendKind::SqlServer),
        (&["sqlite"], BackendKind::Sqlite),
        (&["mysql"], BackendKind::MySql),
        (&["postgresql", "postgres"], BackendKind::Postgres),
    ];
    for (needles, kind) in RULES {
        if needles.iter().any(|n| contains_ci(connection_string, n)) {
            return *kind;
        }
    }
    BackendKind::Unknown
}

/// Extract the value of a semicolon-delimited `Key=Value` clause, key
/// matched case-insensitively.
pub fn extract_clause<'a>(connection_string: &'a str, key: &str) -> Option<&'a str> {
    for clause in connection_string.split(';') {
        let Some((clause_key, value)) = clause.split_once('=') else {
            continue;
        };
        if eq_ci(clause_key.trim(), key) {
            let value = value.trim();
            if !value.is_empty() {
                return Some(value);
            }
        }
    }
    None
}

fn parse_table_section(keys: &[(String, String)]) -> TableSpec {
    let mut spec = TableSpec {
        enabled: get_ci(keys, "Enabled").map(is_truthy).unwrap_or(false),
        ..TableSpec::default()
    };
    if let Some(v) = get_ci(keys, "Key") {
        spec.key_field = v.to_string();
    }
    if let Some(v) = get_ci(keys, "Symbols") {
        spec.symbol_field = v.to_string();
    }
    if let Some(v) = get_ci(keys, "Footprints") {
        spec.footprint_field = v.to_string();
    }
    if let Some(v) = get_ci(keys, "Description") {
        spec.description_field = v.to_string();
    }
    let user_where = get_ci(keys, "UserWhere").or_else(|| get_ci(keys, "UserWhereText"));
    if let Some(w) = user_where {
        let w = w.trim();
        if !w.is_empty() {
            spec.user_where = Some(w.to_string());
        }
    }
    // Any Field<N>Name key declares a custom field, kept in declaration order
    for (key, value) in keys {
        if starts_with_ci(key, "Field")
            && key.len() > 9
            && key.is_char_boundary(key.len() - 4)
            && eq_ci(&key[key.len() - 4..], "Name")
        {
            let value = value.trim();
            if !value.is_empty() && !spec.declared_custom_fields.iter().any(|f| eq_ci(f, value)) {
                spec.declared_custom_fields.push(value.to_string());
            }
        }
    }
    spec
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

/// Case-insensitive key lookup in a section's key list
fn get_ci<'a>(keys: &'a [(String, String)], wanted: &str) -> Option<&'a str> {
    keys.iter()
        .find(|(key, _)| eq_ci(key, wanted))
        .map(|(_, value)| value.as_str())
}

/// Split INI content into `(section_name, [(key, value)])` pairs, preserving
/// file order. Keys before any section header are ignored.
fn parse_ini_sections(content: &str) -> Vec<(String, Vec<(String, String)>)> {
    let mut sections: Vec<(String, Vec<(String, String)>)> = Vec::new();
    for raw_line in content.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }
        if line.starts_with('[') && line.ends_with(']') {
            let name = line[1..line.len() - 1].trim().to_string();
            sections.push((name, Vec::new()));
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        if let Some((_, keys)) = sections.last_mut() {
            keys.push((key.trim().to_string(), value.trim().to_string()));
        }
    }
    sections
}

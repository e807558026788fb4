//! Target relational store construction
//!
//! The store is created fresh on every run: schema DROP+CREATE, categories in
//! taxonomy order, one insertion transaction per source table, then indexes,
//! derived views and post-optimization.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::Connection;

use crate::classify::{Category, TAXONOMY};
use crate::error::MigrationError;
use crate::mapping::MappedComponent;

const SCHEMA: &str = "\
DROP VIEW IF EXISTS resistors;
DROP VIEW IF EXISTS capacitors;
DROP VIEW IF EXISTS inductors;
DROP VIEW IF EXISTS integrated_circuits;
DROP VIEW IF EXISTS diodes;
DROP VIEW IF EXISTS transistors;
DROP TABLE IF EXISTS components;
DROP TABLE IF EXISTS categories;
CREATE TABLE categories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    description TEXT,
    parent_id INTEGER REFERENCES categories(id)
);
CREATE TABLE components (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    symbol TEXT NOT NULL,
    footprint TEXT NOT NULL,
    reference TEXT NOT NULL,
    value TEXT,
    description TEXT,
    keywords TEXT,
    manufacturer TEXT,
    mpn TEXT,
    datasheet TEXT,
    supplier TEXT,
    spn TEXT,
    package TEXT,
    voltage TEXT,
    current TEXT,
    power TEXT,
    tolerance TEXT,
    temperature TEXT,
    category_id INTEGER REFERENCES categories(id),
    confidence REAL NOT NULL,
    source_symbol TEXT,
    source_footprint TEXT,
    exclude_from_board BOOL DEFAULT 0,
    exclude_from_bom BOOL DEFAULT 0,
    created_at TEXT,
    updated_at TEXT
);
";

const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_components_symbol ON components(symbol)",
    "CREATE INDEX IF NOT EXISTS idx_components_footprint ON components(footprint)",
    "CREATE INDEX IF NOT EXISTS idx_components_mpn ON components(mpn)",
    "CREATE INDEX IF NOT EXISTS idx_components_manufacturer ON components(manufacturer)",
    "CREATE INDEX IF NOT EXISTS idx_components_category ON components(category_id)",
    "CREATE INDEX IF NOT EXISTS idx_components_reference ON components(reference)",
    "CREATE INDEX IF NOT EXISTS idx_components_manufacturer_mpn ON components(manufacturer, mpn)",
    "CREATE INDEX IF NOT EXISTS idx_components_category_confidence ON components(category_id, confidence)",
];

/// Derived view predicates, case-insensitive over description, symbol and
/// keywords
const VIEWS: &[(&str, &str)] = &[
    (
        "resistors",
        "description LIKE '%resistor%' OR symbol LIKE '%:R%' OR keywords LIKE '%resistor%'",
    ),
    (
        "capacitors",
        "description LIKE '%capacitor%' OR symbol LIKE '%:C%' OR keywords LIKE '%capacitor%'",
    ),
    (
        "inductors",
        "description LIKE '%inductor%' OR symbol LIKE '%:L%' OR keywords LIKE '%inductor%'",
    ),
    (
        "integrated_circuits",
        "description LIKE '%ic%' OR description LIKE '%microcontroller%' OR description LIKE '%processor%' OR symbol LIKE '%:U%'",
    ),
    (
        "diodes",
        "description LIKE '%diode%' OR symbol LIKE '%:D%' OR keywords LIKE '%diode%'",
    ),
    (
        "transistors",
        "description LIKE '%transistor%' OR description LIKE '%mosfet%' OR description LIKE '%fet%' OR symbol LIKE '%:Q%'",
    ),
];

/// Single-writer handle over the target store
pub struct TargetStoreBuilder {
    conn: Connection,
    path: PathBuf,
    category_ids: HashMap<Category, i64>,
    run_timestamp: String,
    in_transaction: bool,
    inserted: u64,
}

impl TargetStoreBuilder {
    /// Open (or create) the store and lay down a fresh schema
    pub fn create(path: &Path) -> Result<Self, MigrationError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| MigrationError::FileAccessError {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
            }
        }
        let conn = Connection::open(path).map_err(|e| MigrationError::FileAccessError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        // journal_mode returns the resulting mode as a row
        let _mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        conn.pragma_update(None, "cache_size", -8000)?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.execute_batch(SCHEMA)?;

        Ok(TargetStoreBuilder {
            conn,
            path: path.to_path_buf(),
            category_ids: HashMap::new(),
            run_timestamp: Utc::now().to_rfc3339(),
            in_transaction: false,
            inserted: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert the taxonomy in declared order; parents precede children so the
    /// parent id is always known by the time a child is inserted.
    pub fn populate_categories(&mut self) -> Result<(), MigrationError> {
        let mut stmt = self.conn.prepare(
            "INSERT INTO categories (name, description, parent_id) VALUES (?1, ?2, ?3)",
        )?;
        for def in TAXONOMY {
            let parent_id = def.parent.map(|p| self.category_ids[&p]);
            stmt.execute(rusqlite::params![def.name, def.description, parent_id])?;
            self.category_ids
                .insert(def.category, self.conn.last_insert_rowid());
        }
        Ok(())
    }

    /// Open the per-source-table insertion transaction
    pub fn begin_table(&mut self) -> Result<(), MigrationError> {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        self.in_transaction = true;
        Ok(())
    }

    /// Commit on the table boundary
    pub fn commit_table(&mut self) -> Result<(), MigrationError> {
        self.conn.execute_batch("COMMIT")?;
        self.in_transaction = false;
        Ok(())
    }

    /// Roll back the in-flight table, e.g. on cancellation
    pub fn rollback_table(&mut self) {
        if self.in_transaction {
            let _ = self.conn.execute_batch("ROLLBACK");
            self.in_transaction = false;
        }
    }

    /// Insert a batch of components in the order given
    pub fn insert_batch(&mut self, components: &[MappedComponent]) -> Result<(), MigrationError> {
        let mut stmt = self.conn.prepare_cached(
            "INSERT INTO components (
                symbol, footprint, reference, value, description, keywords,
                manufacturer, mpn, datasheet, supplier, spn, package,
                voltage, current, power, tolerance, temperature,
                category_id, confidence, source_symbol, source_footprint,
                exclude_from_board, exclude_from_bom, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25
            )",
        )?;
        for component in components {
            let field = |name: &str| component.fields.get(name).cloned();
            stmt.execute(rusqlite::params![
                component.target_symbol,
                component.target_footprint,
                field("Reference").unwrap_or_else(|| "U".to_string()),
                field("Value"),
                field("Description"),
                field("Keywords"),
                field("Manufacturer"),
                field("MPN"),
                field("Datasheet"),
                field("Supplier"),
                field("SPN"),
                field("Package"),
                field("Voltage"),
                field("Current"),
                field("Power"),
                field("Tolerance"),
                field("Temperature"),
                self.category_ids[&component.category],
                component.confidence,
                component.source_symbol,
                component.source_footprint,
                false,
                false,
                self.run_timestamp,
                self.run_timestamp,
            ])?;
        }
        self.inserted += components.len() as u64;
        Ok(())
    }

    pub fn create_indexes(&mut self) -> Result<(), MigrationError> {
        for sql in INDEXES {
            self.conn.execute(sql, [])?;
        }
        Ok(())
    }

    pub fn create_views(&mut self) -> Result<(), MigrationError> {
        for (name, predicate) in VIEWS {
            self.conn.execute(
                &format!(
                    "CREATE VIEW {} AS SELECT * FROM components WHERE {}",
                    name, predicate
                ),
                [],
            )?;
        }
        Ok(())
    }

    /// ANALYZE plus an optional VACUUM compaction
    pub fn optimize(&mut self, vacuum: bool) -> Result<(), MigrationError> {
        self.conn.execute_batch("ANALYZE")?;
        if vacuum {
            self.conn.execute_batch("VACUUM")?;
        }
        Ok(())
    }

    pub fn inserted_count(&self) -> u64 {
        self.inserted
    }

    pub fn close(mut self) -> Result<(), MigrationError> {
        self.rollback_table();
        self.conn
            .close()
            .map_err(|(_, e)| MigrationError::StoreError {
                message: e.to_string(),
                source: e,
            })
    }
}

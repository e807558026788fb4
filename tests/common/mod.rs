//! Common test utilities for dblib-migrate tests

use std::path::{Path, PathBuf};

use rusqlite::Connection;
use tempfile::TempDir;

use dblib_migrate::config::MigrationSettings;
use dblib_migrate::orchestrator::{MigrationOutcome, Orchestrator};
use dblib_migrate::MigrationError;

/// The column set the generated parts tables carry
pub const FIXTURE_COLUMNS: &[&str] = &[
    "Part Number",
    "Symbol",
    "Footprint",
    "Description",
    "Value",
    "Manufacturer",
    "Voltage",
];

/// A handful of §-style seed rows: resistor, capacitor, mystery transistor
pub fn seed_rows() -> Vec<Vec<Option<&'static str>>> {
    vec![
        vec![
            Some("R-10K-0603"),
            Some("Resistor"),
            Some("0603"),
            Some("10k Ohm Resistor"),
            Some("10k"),
            Some("Generic"),
            None,
        ],
        vec![
            Some("C-1UF-0805"),
            Some("Capacitor"),
            Some("0805"),
            Some("1uF Ceramic Capacitor"),
            Some("1uF"),
            None,
            Some("25V"),
        ],
        vec![
            Some("Q-MYSTERY"),
            Some("MysteryPart"),
            Some("SOT-23"),
            Some("PNP transistor"),
            None,
            None,
            None,
        ],
    ]
}

/// Test context owning a temp directory with a generated source database,
/// a DbLib file pointing at it, and an output directory.
pub struct TestContext {
    /// Kept to prevent temp directory cleanup until TestContext is dropped
    _temp_dir: TempDir,
    pub dir: PathBuf,
    pub source_db: PathBuf,
    pub dblib: PathBuf,
}

impl TestContext {
    /// Build a context with one `Components` table holding the given rows
    pub fn with_rows(rows: &[Vec<Option<&str>>]) -> Self {
        Self::with_tables(&[("Components", rows)])
    }

    /// Build a context with several tables; every table uses the fixture
    /// column set.
    pub fn with_tables(tables: &[(&str, &[Vec<Option<&str>>])]) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let dir = temp_dir.path().to_path_buf();
        let source_db = dir.join("parts.db");

        let conn = Connection::open(&source_db).expect("Failed to create source db");
        for (table, rows) in tables {
            let columns = FIXTURE_COLUMNS
                .iter()
                .map(|c| format!("\"{}\" TEXT", c))
                .collect::<Vec<_>>()
                .join(", ");
            conn.execute(&format!("CREATE TABLE \"{}\" ({})", table, columns), [])
                .expect("Failed to create table");
            let placeholders = (1..=FIXTURE_COLUMNS.len())
                .map(|i| format!("?{}", i))
                .collect::<Vec<_>>()
                .join(", ");
            let mut stmt = conn
                .prepare(&format!(
                    "INSERT INTO \"{}\" VALUES ({})",
                    table, placeholders
                ))
                .expect("Failed to prepare insert");
            for row in *rows {
                stmt.execute(rusqlite::params_from_iter(row.iter()))
                    .expect("Failed to insert fixture row");
            }
        }
        drop(conn);

        let dblib = dir.join("library.DbLib");
        let table_names: Vec<&str> = tables.iter().map(|(name, _)| *name).collect();
        std::fs::write(&dblib, dblib_content(&source_db, &table_names))
            .expect("Failed to write DbLib");

        TestContext {
            _temp_dir: temp_dir,
            dir,
            source_db,
            dblib,
        }
    }

    /// Point the DbLib at extra tables (e.g. ones missing from the source db)
    pub fn rewrite_dblib(&self, table_names: &[&str]) {
        std::fs::write(&self.dblib, dblib_content(&self.source_db, table_names))
            .expect("Failed to rewrite DbLib");
    }

    /// Settings writing into `<dir>/out`, caching off for deterministic runs
    pub fn settings(&self) -> MigrationSettings {
        let mut settings = MigrationSettings::default();
        settings.output_directory = self.dir.join("out");
        settings.enable_caching = false;
        settings.max_worker_threads = 2;
        settings
    }

    /// Run the migration with the given settings
    pub fn run_with(&self, settings: MigrationSettings) -> Result<MigrationOutcome, MigrationError> {
        Orchestrator::new(settings).run(&self.dblib)
    }

    /// Run with the default test settings, panicking on failure
    pub fn run(&self) -> MigrationOutcome {
        self.run_with(self.settings())
            .expect("Migration should succeed")
    }
}

fn dblib_content(source_db: &Path, table_names: &[&str]) -> String {
    let mut content = format!(
        "[DatabaseLinks]\r\nConnectionString=Driver=SQLite3;Database={};\r\n",
        source_db.display()
    );
    for (index, table) in table_names.iter().enumerate() {
        content.push_str(&format!(
            "\r\n[Table{}]\r\nTableName={}\r\nEnabled=True\r\nKey=Part Number\r\nSymbols=Symbol\r\nFootprints=Footprint\r\nDescription=Description\r\n",
            index + 1,
            table
        ));
    }
    content
}

/// One row of the produced components table, as the assertions need it
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentRow {
    pub symbol: String,
    pub footprint: String,
    pub reference: String,
    pub description: Option<String>,
    pub confidence: f64,
    pub category: String,
}

/// Open the produced store read-only
pub fn open_store(path: &Path) -> Connection {
    Connection::open_with_flags(path, rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY)
        .expect("Failed to open produced store")
}

/// All component rows joined with their category names, in insertion order
pub fn component_rows(conn: &Connection) -> Vec<ComponentRow> {
    let mut stmt = conn
        .prepare(
            "SELECT c.symbol, c.footprint, c.reference, c.description, c.confidence, k.name
             FROM components c JOIN categories k ON k.id = c.category_id
             ORDER BY c.id",
        )
        .expect("Failed to query components");
    let rows = stmt
        .query_map([], |row| {
            Ok(ComponentRow {
                symbol: row.get(0)?,
                footprint: row.get(1)?,
                reference: row.get(2)?,
                description: row.get(3)?,
                confidence: row.get(4)?,
                category: row.get(5)?,
            })
        })
        .expect("Failed to map components");
    rows.map(|r| r.expect("Failed to read component row")).collect()
}

/// All non-timestamp component column values, for determinism comparisons
pub fn component_snapshot(conn: &Connection) -> Vec<Vec<String>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, symbol, footprint, reference, value, description, keywords,
                    manufacturer, mpn, datasheet, supplier, spn, package, voltage,
                    current, power, tolerance, temperature, category_id, confidence,
                    source_symbol, source_footprint, exclude_from_board, exclude_from_bom
             FROM components ORDER BY id",
        )
        .expect("Failed to query snapshot");
    let column_count = stmt.column_count();
    let rows = stmt
        .query_map([], |row| {
            let mut values = Vec::with_capacity(column_count);
            for index in 0..column_count {
                let value: rusqlite::types::Value = row.get(index)?;
                values.push(format!("{:?}", value));
            }
            Ok(values)
        })
        .expect("Failed to map snapshot");
    rows.map(|r| r.expect("Failed to read snapshot row")).collect()
}

//! KiCad database library descriptor (.kicad_dbl) emission

use std::path::Path;

use serde::Serialize;

use crate::error::MigrationError;

#[derive(Serialize)]
struct Meta {
    version: f64,
}

#[derive(Serialize)]
struct Source {
    #[serde(rename = "type")]
    kind: String,
    dsn: String,
    username: String,
    password: String,
    connection_string: String,
    timeout_seconds: u32,
}

#[derive(Serialize)]
struct FieldDef {
    column: String,
    name: String,
    visible_on_add: bool,
    visible_in_chooser: bool,
    show_name: bool,
}

#[derive(Serialize)]
struct Library {
    name: String,
    table: String,
    key: String,
    symbols: String,
    footprints: String,
    fields: Vec<FieldDef>,
}

#[derive(Serialize)]
struct KicadDbl {
    meta: Meta,
    name: String,
    description: String,
    source: Source,
    libraries: Vec<Library>,
}

fn field(column: &str, name: &str, visible_on_add: bool, visible_in_chooser: bool) -> FieldDef {
    FieldDef {
        column: column.to_string(),
        name: name.to_string(),
        visible_on_add,
        visible_in_chooser,
        show_name: false,
    }
}

/// Fields every library exposes
fn standard_fields() -> Vec<FieldDef> {
    vec![
        field("value", "Value", true, true),
        field("description", "Description", false, true),
        field("manufacturer", "Manufacturer", false, true),
        field("mpn", "MPN", false, true),
        field("datasheet", "Datasheet", false, false),
        field("package", "Package", false, true),
    ]
}

/// Family libraries extend the standard set with family-specific columns
fn family_fields(table: &str) -> Vec<FieldDef> {
    let mut fields = standard_fields();
    match table {
        "resistors" => {
            fields.push(field("tolerance", "Tolerance", false, true));
            fields.push(field("power", "Power", false, true));
        }
        "capacitors" | "diodes" => {
            fields.push(field("voltage", "Voltage", false, true));
        }
        "inductors" => {
            fields.push(field("current", "Current", false, true));
        }
        "transistors" | "integrated_circuits" => {
            fields.push(field("temperature", "Temperature", false, false));
        }
        _ => {}
    }
    fields
}

const FAMILY_LIBRARIES: &[(&str, &str)] = &[
    ("Resistors", "resistors"),
    ("Capacitors", "capacitors"),
    ("Inductors", "inductors"),
    ("Integrated Circuits", "integrated_circuits"),
    ("Diodes", "diodes"),
    ("Transistors", "transistors"),
];

fn library(name: &str, table: &str) -> Library {
    Library {
        name: name.to_string(),
        table: table.to_string(),
        key: "id".to_string(),
        symbols: "symbol".to_string(),
        footprints: "footprint".to_string(),
        fields: family_fields(table),
    }
}

/// Write the descriptor pointing at the produced store
pub fn write_dbl(dbl_path: &Path, store_path: &Path, name: &str) -> Result<(), MigrationError> {
    let store_display = std::path::absolute(store_path)
        .unwrap_or_else(|_| store_path.to_path_buf())
        .display()
        .to_string();

    let mut libraries = vec![library("All Components", "components")];
    libraries.extend(
        FAMILY_LIBRARIES
            .iter()
            .map(|(name, table)| library(name, table)),
    );

    let descriptor = KicadDbl {
        meta: Meta { version: 1.0 },
        name: name.to_string(),
        description: format!("Migrated component library ({})", name),
        source: Source {
            kind: "odbc".to_string(),
            dsn: String::new(),
            username: String::new(),
            password: String::new(),
            connection_string: format!("Driver={{SQLite3 ODBC Driver}};Database={};", store_display),
            timeout_seconds: 2,
        },
        libraries,
    };

    let json =
        serde_json::to_string_pretty(&descriptor).map_err(|e| MigrationError::FileAccessError {
            path: dbl_path.to_path_buf(),
            message: format!("descriptor serialization failed: {}", e),
        })?;
    std::fs::write(dbl_path, json).map_err(|e| MigrationError::FileAccessError {
        path: dbl_path.to_path_buf(),
        message: e.to_string(),
    })
}

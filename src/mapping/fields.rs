//! Field resolution: source column names to normalized target field names

use indexmap::IndexMap;

use crate::config::{MigrationSettings, TableSpec};
use crate::source::RawRow;
use crate::util::{contains_ci, eq_ci};

/// Built-in source → target field name map, keyed case-insensitively
const FIELD_MAP: &[(&str, &str)] = &[
    ("part number", "MPN"),
    ("manufacturer part number", "MPN"),
    ("mfr part number", "MPN"),
    ("mpn", "MPN"),
    ("manufacturer", "Manufacturer"),
    ("mfr", "Manufacturer"),
    ("mfg", "Manufacturer"),
    ("description", "Description"),
    ("value", "Value"),
    ("comment", "Value"),
    ("datasheet", "Datasheet"),
    ("datasheet url", "Datasheet"),
    ("helpurl", "Datasheet"),
    ("componentlink1url", "Link1_URL"),
    ("componentlink1description", "Link1_Description"),
    ("componentlink2url", "Link2_URL"),
    ("componentlink2description", "Link2_Description"),
    ("supplier", "Supplier"),
    ("supplier 1", "Supplier"),
    ("supplier name", "Supplier"),
    ("supplier part number", "SPN"),
    ("supplier part number 1", "SPN"),
    ("spn", "SPN"),
    ("package", "Package"),
    ("case", "Package"),
    ("case/package", "Package"),
    ("voltage", "Voltage"),
    ("voltage rating", "Voltage"),
    ("rated voltage", "Voltage"),
    ("current", "Current"),
    ("current rating", "Current"),
    ("power", "Power"),
    ("power rating", "Power"),
    ("wattage", "Power"),
    ("tolerance", "Tolerance"),
    ("temperature", "Temperature"),
    ("temperature range", "Temperature"),
    ("operating temperature", "Temperature"),
    ("keywords", "Keywords"),
    ("reference", "Reference"),
    ("designator", "Reference"),
    ("refdes", "Reference"),
    ("notes", "Notes"),
];

fn builtin_target(source_name: &str) -> Option<&'static str> {
    FIELD_MAP
        .iter()
        .find(|(key, _)| eq_ci(key, source_name))
        .map(|(_, target)| *target)
}

/// Map a row's columns to the normalized field set.
///
/// The symbol and footprint columns are consumed by their resolvers and are
/// excluded here; excluded fields are dropped; custom mappings override the
/// built-in map; unrecognized columns pass through under their own names.
/// Empty-after-trim values are dropped. When two source columns map to the
/// same target, the first one in column order wins.
pub fn resolve(row: &RawRow, spec: &TableSpec, settings: &MigrationSettings) -> IndexMap<String, String> {
    let mut fields: IndexMap<String, String> = IndexMap::new();

    for (column, value) in &row.columns {
        let name = column.trim();
        if name.is_empty()
            || eq_ci(name, &spec.symbol_field)
            || eq_ci(name, &spec.footprint_field)
        {
            continue;
        }
        if settings.excluded_fields.iter().any(|f| eq_ci(f, name)) {
            continue;
        }
        let text = value.to_text();
        if text.is_empty() {
            continue;
        }
        let target = settings
            .custom_field_mappings
            .iter()
            .find(|(key, _)| eq_ci(key, name))
            .map(|(_, target)| target.clone())
            .or_else(|| builtin_target(name).map(str::to_string))
            .unwrap_or_else(|| name.to_string());
        fields.entry(target).or_insert(text);
    }

    // Derive the manufacturer + part number composite
    if let (Some(manufacturer), Some(mpn)) = (fields.get("Manufacturer"), fields.get("MPN")) {
        let composite = format!("{} {}", manufacturer, mpn);
        fields.entry("Manufacturer_MPN".to_string()).or_insert(composite);
    }

    // Infer a reference designator when the source carries none
    if !fields.contains_key("Reference") {
        let description = fields.get("Description").map(String::as_str).unwrap_or("");
        fields.insert(
            "Reference".to_string(),
            infer_reference(description).to_string(),
        );
    }

    fields
}

/// Reference inference from description keywords
pub fn infer_reference(description: &str) -> &'static str {
    if contains_ci(description, "resistor") {
        "R"
    } else if contains_ci(description, "capacitor") {
        "C"
    } else if contains_ci(description, "inductor") {
        "L"
    } else {
        "U"
    }
}

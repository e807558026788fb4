//! Unit tests for migration settings loading and validation

use std::io::Write;

use pretty_assertions::assert_eq;
use tempfile::NamedTempFile;

use dblib_migrate::config::{ConfidenceWeights, MigrationSettings};

fn create_settings_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::with_suffix(".json").unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_defaults() {
    let settings = MigrationSettings::default();
    assert_eq!(settings.database_name, "components.db");
    assert_eq!(settings.dblib_name, "components.kicad_dbl");
    assert_eq!(settings.batch_size, 1000);
    assert!(settings.enable_parallel_processing);
    assert!(settings.enable_caching);
    assert!(settings.create_views);
    assert!(settings.create_indexes);
    assert!(settings.vacuum_database);
    assert_eq!(settings.confidence_threshold, 0.7);
    assert_eq!(settings.confidence_weights, ConfidenceWeights::default());
    assert!(settings.validate().is_ok());
}

#[test]
fn test_load_partial_file_fills_defaults() {
    let file = create_settings_file(
        r#"{
            "output_directory": "/tmp/out",
            "batch_size": 250,
            "fuzzy_threshold": 0.75,
            "excluded_fields": ["Obsolete"],
            "custom_field_mappings": {"Order Code": "MPN"}
        }"#,
    );
    let settings = MigrationSettings::load(file.path()).unwrap();
    assert_eq!(settings.batch_size, 250);
    assert_eq!(settings.database_name, "components.db");
    assert_eq!(settings.fuzzy_threshold, Some(0.75));
    assert_eq!(settings.excluded_fields, vec!["Obsolete"]);
    assert_eq!(settings.custom_field_mappings["Order Code"], "MPN");
}

#[test]
fn test_fuzzy_threshold_override_applies_to_both_stages() {
    let mut settings = MigrationSettings::default();
    assert_eq!(settings.symbol_fuzzy_threshold(), 0.8);
    assert_eq!(settings.footprint_fuzzy_threshold(), 0.7);

    settings.fuzzy_threshold = Some(0.9);
    assert_eq!(settings.symbol_fuzzy_threshold(), 0.9);
    assert_eq!(settings.footprint_fuzzy_threshold(), 0.9);
}

#[test]
fn test_zero_batch_size_is_rejected() {
    let mut settings = MigrationSettings::default();
    settings.batch_size = 0;
    assert!(settings.validate().is_err());
}

#[test]
fn test_weights_must_sum_to_at_most_one() {
    let mut settings = MigrationSettings::default();
    settings.confidence_weights = ConfidenceWeights {
        symbol: 0.6,
        footprint: 0.5,
        fields: 0.2,
    };
    assert!(settings.validate().is_err());

    settings.confidence_weights = ConfidenceWeights {
        symbol: 0.5,
        footprint: 0.3,
        fields: 0.2,
    };
    assert!(settings.validate().is_ok());
}

#[test]
fn test_negative_weight_is_rejected() {
    let mut settings = MigrationSettings::default();
    settings.confidence_weights = ConfidenceWeights {
        symbol: -0.1,
        footprint: 0.4,
        fields: 0.2,
    };
    assert!(settings.validate().is_err());
}

#[test]
fn test_out_of_range_thresholds_are_rejected() {
    let mut settings = MigrationSettings::default();
    settings.fuzzy_threshold = Some(1.5);
    assert!(settings.validate().is_err());

    let mut settings = MigrationSettings::default();
    settings.confidence_threshold = -0.1;
    assert!(settings.validate().is_err());
}

#[test]
fn test_invalid_json_is_a_config_error() {
    let file = create_settings_file("{ not json");
    let result = MigrationSettings::load(file.path());
    assert!(result.is_err());
}

#[test]
fn test_paths_derive_from_output_directory() {
    let mut settings = MigrationSettings::default();
    settings.output_directory = "/srv/libs".into();
    settings.database_name = "parts.db".to_string();
    assert_eq!(settings.store_path().to_str(), Some("/srv/libs/parts.db"));
    assert_eq!(
        settings.report_path().to_str(),
        Some("/srv/libs/migration_report.json")
    );
}

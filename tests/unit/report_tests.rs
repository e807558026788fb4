//! Unit tests for report aggregation

use pretty_assertions::assert_eq;

use dblib_migrate::config::MigrationSettings;
use dblib_migrate::mapping::{CacheStats, MappedComponent, Strategy};
use dblib_migrate::target::{ReportBuilder, RunStatus};
use dblib_migrate::MigrationError;

fn component(confidence: f64) -> MappedComponent {
    let mut component = MappedComponent::empty("Parts");
    component.target_symbol = "Device:R".to_string();
    component.target_footprint = "Resistor_SMD:R_0603_1608Metric".to_string();
    component.confidence = confidence;
    component.symbol_strategy = Strategy::Exact;
    component.footprint_strategy = Strategy::Pattern;
    component
}

#[test]
fn test_confidence_banding() {
    let mut builder = ReportBuilder::new();
    builder.begin_table("Parts");
    builder.record_component(&component(0.95));
    builder.record_component(&component(0.81));
    builder.record_component(&component(0.8));
    builder.record_component(&component(0.5));
    builder.record_component(&component(0.49));

    let settings = MigrationSettings::default();
    let report = builder.finish(RunStatus::Success, CacheStats::default(), &settings);

    assert_eq!(report.totals.total_components, 5);
    assert_eq!(report.totals.high_confidence, 2);
    assert_eq!(report.totals.medium_confidence, 2);
    assert_eq!(report.totals.low_confidence, 1);

    let table = &report.tables[0];
    assert_eq!(table.component_count, 5);
    assert_eq!(table.high_confidence, 2);
    assert_eq!(table.medium_confidence, 2);
    assert_eq!(table.low_confidence, 1);
}

#[test]
fn test_fallback_lists_are_deduplicated_and_sorted() {
    let mut builder = ReportBuilder::new();
    builder.begin_table("Parts");

    for source in ["Zeta", "Alpha", "Zeta"] {
        let mut c = component(0.3);
        c.source_symbol = source.to_string();
        c.symbol_strategy = Strategy::Fallback;
        builder.record_component(&c);
    }
    let mut c = component(0.2);
    c.source_footprint = "ODDFOOT".to_string();
    c.footprint_strategy = Strategy::Fallback;
    builder.record_component(&c);

    let settings = MigrationSettings::default();
    let report = builder.finish(RunStatus::Success, CacheStats::default(), &settings);
    let table = &report.tables[0];
    assert_eq!(table.fallback_symbols, vec!["Alpha", "Zeta"]);
    assert_eq!(table.fallback_footprints, vec!["ODDFOOT"]);
}

#[test]
fn test_table_error_creates_zero_count_entry() {
    let mut builder = ReportBuilder::new();
    builder.record_table_error(
        "BadTable",
        &MigrationError::QueryError {
            table: "BadTable".to_string(),
            message: "no such table".to_string(),
        },
    );

    let settings = MigrationSettings::default();
    let report = builder.finish(RunStatus::Partial, CacheStats::default(), &settings);
    let table = &report.tables[0];
    assert_eq!(table.table, "BadTable");
    assert_eq!(table.component_count, 0);
    assert!(table.error.as_ref().unwrap().contains("no such table"));
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].kind, "QueryError");
    assert_eq!(report.errors[0].severity, "medium");
}

#[test]
fn test_recommendations_follow_thresholds() {
    let mut builder = ReportBuilder::new();
    builder.begin_table("Parts");
    builder.record_component(&component(0.95));

    let settings = MigrationSettings::default();
    let report = builder.finish(RunStatus::Success, CacheStats::default(), &settings);
    assert!(report.recommendations.is_empty());

    let mut builder = ReportBuilder::new();
    builder.begin_table("Parts");
    let mut c = component(0.2);
    c.source_footprint = "ODDFOOT".to_string();
    c.footprint_strategy = Strategy::Fallback;
    builder.record_component(&c);

    let report = builder.finish(RunStatus::Success, CacheStats::default(), &settings);
    assert!(report
        .recommendations
        .iter()
        .any(|r| r.contains("low-confidence")));
    assert!(report
        .recommendations
        .iter()
        .any(|r| r.contains("fallback")));
}

#[test]
fn test_report_round_trips_through_json() {
    let mut builder = ReportBuilder::new();
    builder.begin_table("Parts");
    builder.record_component(&component(0.9));

    let settings = MigrationSettings::default();
    let report = builder.finish(
        RunStatus::Success,
        CacheStats { hits: 3, misses: 1 },
        &settings,
    );

    let json = serde_json::to_string(&report).unwrap();
    let parsed: dblib_migrate::target::MigrationReport = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.totals.total_components, 1);
    assert_eq!(parsed.cache.hits, 3);
    assert_eq!(parsed.status, RunStatus::Success);
}

#[test]
fn test_summary_mentions_band_counts() {
    let mut builder = ReportBuilder::new();
    builder.begin_table("Parts");
    builder.record_component(&component(0.9));
    builder.record_component(&component(0.3));

    let settings = MigrationSettings::default();
    let report = builder.finish(RunStatus::Success, CacheStats::default(), &settings);
    let summary = report.summary();
    assert!(summary.contains("2 components"));
    assert!(summary.contains("1 high"));
    assert!(summary.contains("1 low"));
}

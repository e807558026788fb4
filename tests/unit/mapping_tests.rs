//! Unit tests for the symbol and footprint resolvers

use pretty_assertions::assert_eq;

use dblib_migrate::config::{MigrationSettings, TableSpec};
use dblib_migrate::mapping::{
    footprints, symbols, Family, MappingEngine, RowContext, Strategy,
};
use dblib_migrate::source::{RawRow, Value};

fn row(pairs: &[(&str, &str)]) -> RawRow {
    let mut row = RawRow::new("Parts");
    for (name, value) in pairs {
        row.columns
            .insert(name.to_string(), Value::Text(value.to_string()));
    }
    row
}

fn ctx(pairs: &[(&str, &str)]) -> RowContext {
    RowContext::new(&row(pairs), &TableSpec::default())
}

// ============================================================================
// Symbol resolver
// ============================================================================

#[test]
fn test_exact_symbol_lookup_is_case_insensitive() {
    let settings = MigrationSettings::default();
    let resolution = symbols::resolve(&ctx(&[("Symbol", "LED")]), &settings);
    assert_eq!(resolution.target, "Device:LED");
    assert_eq!(resolution.strategy, Strategy::Exact);
    assert_eq!(resolution.confidence, 1.0);

    let resolution = symbols::resolve(&ctx(&[("Symbol", "resistor")]), &settings);
    assert_eq!(resolution.target, "Device:R");
    assert_eq!(resolution.strategy, Strategy::Exact);
}

#[test]
fn test_fuzzy_symbol_accepts_close_identifier() {
    let settings = MigrationSettings::default();
    // Dehyphenated variant matches the catalog's bare name exactly
    let resolution = symbols::resolve(&ctx(&[("Symbol", "LM-358")]), &settings);
    assert_eq!(resolution.target, "Amplifier_Operational:LM358");
    assert_eq!(resolution.strategy, Strategy::Fuzzy);
    assert!(resolution.confidence >= 0.8);
}

#[test]
fn test_semantic_confidence_scales_with_matched_fraction() {
    let settings = MigrationSettings::default();
    let resolution = symbols::resolve(
        &ctx(&[("Symbol", "X1"), ("Description", "16 MHz crystal oscillator")]),
        &settings,
    );
    assert_eq!(resolution.target, "Device:Crystal");
    assert_eq!(resolution.strategy, Strategy::Semantic);
    // Two of the three rule keywords matched
    assert!(resolution.confidence > 0.5 && resolution.confidence < 0.8);
}

#[test]
fn test_semantic_prefers_higher_scoring_rule() {
    let settings = MigrationSettings::default();
    // "pnp" (base 0.8) must beat the broader "transistor" rule (base 0.7)
    let resolution = symbols::resolve(
        &ctx(&[("Symbol", "MysteryPart"), ("Description", "PNP transistor")]),
        &settings,
    );
    assert_eq!(resolution.target, "Device:Q_PNP_BCE");
    assert_eq!(resolution.strategy, Strategy::Semantic);
}

#[test]
fn test_pattern_stage_uses_package_hint() {
    let settings = MigrationSettings::default();
    let resolution = symbols::resolve(
        &ctx(&[("Symbol", "XQ99"), ("Package", "SOT-23")]),
        &settings,
    );
    assert_eq!(resolution.target, "Device:Q_NMOS_GSD");
    assert_eq!(resolution.strategy, Strategy::Pattern);
}

#[test]
fn test_pattern_stage_uses_pin_count() {
    let settings = MigrationSettings::default();
    let resolution = symbols::resolve(
        &ctx(&[("Symbol", "XQ99"), ("Description", "8-pin device")]),
        &settings,
    );
    assert_eq!(resolution.target, "Amplifier_Operational:LM358");
    assert_eq!(resolution.strategy, Strategy::Pattern);

    let resolution = symbols::resolve(
        &ctx(&[("Symbol", "XQ99"), ("Description", "100 pin device")]),
        &settings,
    );
    assert_eq!(resolution.target, "MCU_ST_STM32F4:STM32F407VGTx");
}

#[test]
fn test_symbol_fallback_is_generic_resistor() {
    let settings = MigrationSettings::default();
    let resolution = symbols::resolve(&ctx(&[("Symbol", "ZZZ")]), &settings);
    assert_eq!(resolution.strategy, Strategy::Fallback);
    assert_eq!(resolution.confidence, 0.3);
    assert_eq!(resolution.target, "Device:R");
}

#[test]
fn test_family_keyword_fires_semantic_before_fallback() {
    let settings = MigrationSettings::default();
    // A single family keyword is enough for the semantic stage, so the
    // fallback never sees rows that mention a known family.
    let resolution = symbols::resolve(
        &ctx(&[("Symbol", "ZZZ"), ("Description", "unknown capacitor thing")]),
        &settings,
    );
    assert_eq!(resolution.target, "Device:C");
    assert_eq!(resolution.strategy, Strategy::Semantic);
    assert!(resolution.confidence < 0.5);
}

// ============================================================================
// Footprint resolver
// ============================================================================

#[test]
fn test_chip_size_crossed_with_family() {
    let settings = MigrationSettings::default();
    let resolution = footprints::resolve(
        &ctx(&[("Footprint", "0603")]),
        Family::Resistor,
        &settings,
    );
    assert_eq!(resolution.target, "Resistor_SMD:R_0603_1608Metric");
    assert_eq!(resolution.strategy, Strategy::Pattern);
    assert_eq!(resolution.confidence, 0.9);

    let resolution = footprints::resolve(
        &ctx(&[("Footprint", "0805")]),
        Family::Capacitor,
        &settings,
    );
    assert_eq!(resolution.target, "Capacitor_SMD:C_0805_2012Metric");
    assert_eq!(resolution.confidence, 0.9);
}

#[test]
fn test_chip_size_without_family_scores_lower() {
    let settings = MigrationSettings::default();
    let resolution = footprints::resolve(
        &ctx(&[("Footprint", "1206")]),
        Family::Unknown,
        &settings,
    );
    assert_eq!(resolution.target, "Resistor_SMD:R_1206_3216Metric");
    assert_eq!(resolution.confidence, 0.7);
}

#[test]
fn test_named_package_token_is_normalized() {
    let settings = MigrationSettings::default();
    // Token in the description, hyphen missing
    let resolution = footprints::resolve(
        &ctx(&[("Description", "transistor in SOT23 package")]),
        Family::Transistor,
        &settings,
    );
    assert_eq!(resolution.target, "Package_TO_SOT_SMD:SOT-23");
    assert_eq!(resolution.strategy, Strategy::Pattern);
    assert_eq!(resolution.confidence, 0.7);
}

#[test]
fn test_family_specific_named_package_scores_high_on_match() {
    let settings = MigrationSettings::default();
    let resolution = footprints::resolve(
        &ctx(&[("Footprint", "SOD-123")]),
        Family::Diode,
        &settings,
    );
    assert_eq!(resolution.target, "Diode_SMD:D_SOD-123");
    assert_eq!(resolution.confidence, 0.9);

    let resolution = footprints::resolve(
        &ctx(&[("Footprint", "SOD-123")]),
        Family::Resistor,
        &settings,
    );
    assert_eq!(resolution.confidence, 0.7);
}

#[test]
fn test_footprint_token_priority_prefers_source_footprint() {
    let settings = MigrationSettings::default();
    // Footprint column says 0402, description mentions 0805; 0402 wins
    let resolution = footprints::resolve(
        &ctx(&[("Footprint", "0402"), ("Description", "0805 resistor")]),
        Family::Resistor,
        &settings,
    );
    assert_eq!(resolution.target, "Resistor_SMD:R_0402_1005Metric");
}

#[test]
fn test_fuzzy_footprint_against_catalog() {
    let settings = MigrationSettings::default();
    // "D-SMA" carries no package token; the deunderscored variant is close
    // to the catalog's bare name
    let resolution = footprints::resolve(
        &ctx(&[("Footprint", "D-SMA")]),
        Family::Unknown,
        &settings,
    );
    assert_eq!(resolution.target, "Diode_SMD:D_SMA");
    assert_eq!(resolution.strategy, Strategy::Fuzzy);
    assert!(resolution.confidence >= 0.7);
}

#[test]
fn test_type_inference_from_family() {
    let settings = MigrationSettings::default();
    let resolution = footprints::resolve(
        &ctx(&[("Footprint", "WEIRD&TOKEN")]),
        Family::Inductor,
        &settings,
    );
    assert_eq!(resolution.target, "Inductor_SMD:L_0603_1608Metric");
    assert_eq!(resolution.strategy, Strategy::Semantic);
    assert_eq!(resolution.confidence, 0.6);
}

#[test]
fn test_footprint_fallback_when_nothing_matches() {
    let settings = MigrationSettings::default();
    let resolution = footprints::resolve(
        &ctx(&[("Footprint", "XYZZY")]),
        Family::Unknown,
        &settings,
    );
    assert_eq!(resolution.target, "Package_TO_SOT_SMD:SOT-23");
    assert_eq!(resolution.strategy, Strategy::Fallback);
    assert!(resolution.confidence <= 0.2);
}

// ============================================================================
// Engine-level behavior
// ============================================================================

#[test]
fn test_confidence_weights_are_configurable() {
    let mut settings = MigrationSettings::default();
    settings.confidence_weights.symbol = 1.0;
    settings.confidence_weights.footprint = 0.0;
    settings.confidence_weights.fields = 0.0;

    let engine = MappingEngine::new(&settings);
    let component = engine
        .map_row(
            &row(&[("Symbol", "Resistor"), ("Footprint", "nonsense")]),
            &TableSpec::default(),
        )
        .unwrap();
    // Only the exact symbol contributes
    assert_eq!(component.confidence, 1.0);
}

#[test]
fn test_mapped_component_records_rationales() {
    let settings = MigrationSettings::default();
    let engine = MappingEngine::new(&settings);
    let component = engine
        .map_row(
            &row(&[
                ("Symbol", "Resistor"),
                ("Footprint", "0603"),
                ("Description", "10k Ohm Resistor"),
            ]),
            &TableSpec::default(),
        )
        .unwrap();
    assert!(!component.symbol_rationale.is_empty());
    assert!(!component.footprint_rationale.is_empty());
    assert_eq!(component.source_symbol, "Resistor");
    assert_eq!(component.source_footprint, "0603");
}

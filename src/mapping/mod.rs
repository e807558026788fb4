//! The component mapping engine
//!
//! Translates one raw source row into a target component record: resolved
//! symbol, resolved footprint, normalized field set and an aggregate
//! confidence in `[0, 1]`. Strategies run in a fixed order with per-stage
//! acceptance bars; results are cached by row content hash.

pub mod cache;
pub mod fields;
pub mod footprints;
pub mod ml;
pub mod similarity;
pub mod symbols;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::classify::{self, Category};
use crate::config::{MigrationSettings, TableSpec};
use crate::error::MigrationError;
use crate::source::RawRow;

pub use cache::{CacheStats, MappingCache, RULESET_VERSION};
pub use ml::MlScorer;

/// Named mapping approach, recorded per resolved symbol and footprint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strategy {
    Exact,
    Fuzzy,
    Semantic,
    Pattern,
    Ml,
    Fallback,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Exact => "exact",
            Strategy::Fuzzy => "fuzzy",
            Strategy::Semantic => "semantic",
            Strategy::Pattern => "pattern",
            Strategy::Ml => "ml",
            Strategy::Fallback => "fallback",
        }
    }
}

/// Broad component family shared between the resolvers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Resistor,
    Capacitor,
    Inductor,
    Led,
    Diode,
    Transistor,
    Ic,
    Crystal,
    Unknown,
}

impl Family {
    pub fn as_str(&self) -> &'static str {
        match self {
            Family::Resistor => "resistor",
            Family::Capacitor => "capacitor",
            Family::Inductor => "inductor",
            Family::Led => "led",
            Family::Diode => "diode",
            Family::Transistor => "transistor",
            Family::Ic => "ic",
            Family::Crystal => "crystal",
            Family::Unknown => "unknown",
        }
    }
}

/// Result of one resolver stage
#[derive(Debug, Clone)]
pub struct Resolution {
    pub target: String,
    pub confidence: f64,
    pub strategy: Strategy,
    pub rationale: String,
}

/// Pre-extracted row texts the resolvers work from
pub struct RowContext {
    pub source_symbol: String,
    pub source_footprint: String,
    pub description: String,
    pub comment: String,
    pub package_field: String,
    /// Lowercased description + value + comment
    pub haystack: String,
    /// Lowercased union of the package-bearing texts
    pub package_text: String,
}

impl RowContext {
    pub fn new(row: &RawRow, spec: &TableSpec) -> Self {
        let text = |column: &str| row.text(column).unwrap_or_default();
        let source_symbol = text(&spec.symbol_field);
        let source_footprint = text(&spec.footprint_field);
        let description = text(&spec.description_field);
        let value = text("Value");
        let comment = text("Comment");
        let package_field = row
            .text("Package")
            .or_else(|| row.text("Case"))
            .unwrap_or_default();

        let haystack = format!("{} {} {}", description, value, comment).to_lowercase();
        let package_text = format!(
            "{} {} {} {}",
            source_footprint, package_field, description, comment
        )
        .to_lowercase();

        RowContext {
            source_symbol,
            source_footprint,
            description,
            comment,
            package_field,
            haystack,
            package_text,
        }
    }
}

/// Keyword match anchored at a word start: the character before the match
/// must be non-alphanumeric. Keywords that begin with a separator (":r")
/// match anywhere.
pub(crate) fn keyword_in(haystack: &str, keyword: &str) -> bool {
    let h = haystack.as_bytes();
    let k = keyword.as_bytes();
    if k.is_empty() || k.len() > h.len() {
        return false;
    }
    let anchored = k[0].is_ascii_alphanumeric();
    for start in 0..=(h.len() - k.len()) {
        if !h[start..start + k.len()].eq_ignore_ascii_case(k) {
            continue;
        }
        if !anchored || start == 0 || !h[start - 1].is_ascii_alphanumeric() {
            return true;
        }
    }
    false
}

/// One translated component, ready for classification and insertion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappedComponent {
    pub source_table: String,
    pub source_symbol: String,
    pub source_footprint: String,
    pub target_symbol: String,
    pub target_footprint: String,
    /// Normalized field set; empty values never appear
    pub fields: IndexMap<String, String>,
    pub confidence: f64,
    pub symbol_strategy: Strategy,
    pub footprint_strategy: Strategy,
    pub symbol_rationale: String,
    pub footprint_rationale: String,
    pub category: Category,
    pub recovery_used: bool,
}

impl MappedComponent {
    /// Blank component used as the base for recovery substitutes and tests
    pub fn empty(table: &str) -> Self {
        MappedComponent {
            source_table: table.to_string(),
            source_symbol: String::new(),
            source_footprint: String::new(),
            target_symbol: String::new(),
            target_footprint: String::new(),
            fields: IndexMap::new(),
            confidence: 0.0,
            symbol_strategy: Strategy::Fallback,
            footprint_strategy: Strategy::Fallback,
            symbol_rationale: String::new(),
            footprint_rationale: String::new(),
            category: Category::Uncategorized,
            recovery_used: false,
        }
    }
}

/// Detect the family from a resolved symbol identifier
pub fn family_of_symbol(symbol: &str) -> Family {
    let (library, name) = symbol.split_once(':').unwrap_or(("", symbol));
    if library.starts_with("Amplifier")
        || library.starts_with("MCU")
        || library.starts_with("Regulator")
        || library.starts_with("Memory")
        || library.starts_with("Interface")
        || library.starts_with("Sensor")
    {
        return Family::Ic;
    }
    if name == "R" || name.starts_with("R_") {
        Family::Resistor
    } else if name == "C" || name.starts_with("C_") {
        Family::Capacitor
    } else if name.starts_with("LED") {
        Family::Led
    } else if name == "L" || name.starts_with("L_") {
        Family::Inductor
    } else if name == "D" || name.starts_with("D_") {
        Family::Diode
    } else if name.starts_with("Q_") {
        Family::Transistor
    } else if name.starts_with("Crystal") {
        Family::Crystal
    } else {
        Family::Unknown
    }
}

/// Invariants every usable mapping satisfies; cached entries are re-checked
/// against them on every hit.
fn component_is_sane(component: &MappedComponent) -> bool {
    component.confidence.is_finite()
        && (0.0..=1.0).contains(&component.confidence)
        && !component.target_symbol.is_empty()
        && !component.target_footprint.is_empty()
}

/// Family scan over free text, used when the symbol gives no signal
pub fn family_of_text(text: &str) -> Family {
    const SCAN: &[(&str, Family)] = &[
        ("resistor", Family::Resistor),
        ("capacitor", Family::Capacitor),
        ("inductor", Family::Inductor),
        ("led", Family::Led),
        ("diode", Family::Diode),
        ("transistor", Family::Transistor),
        ("mosfet", Family::Transistor),
        ("crystal", Family::Crystal),
        ("oscillator", Family::Crystal),
        ("microcontroller", Family::Ic),
        ("amplifier", Family::Ic),
        ("regulator", Family::Ic),
    ];
    for (keyword, family) in SCAN {
        if keyword_in(text, keyword) {
            return *family;
        }
    }
    Family::Unknown
}

/// Per-row translator. Holds only shared immutable state and is therefore
/// freely shared across mapping workers.
pub struct MappingEngine<'a> {
    settings: &'a MigrationSettings,
    cache: Option<&'a MappingCache>,
    ml: Option<&'a dyn MlScorer>,
}

impl<'a> MappingEngine<'a> {
    pub fn new(settings: &'a MigrationSettings) -> Self {
        MappingEngine {
            settings,
            cache: None,
            ml: None,
        }
    }

    pub fn with_cache(mut self, cache: &'a MappingCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_ml(mut self, ml: &'a dyn MlScorer) -> Self {
        self.ml = Some(ml);
        self
    }

    /// Map one row to a component. The cache is consulted first; on a valid
    /// hit the cached component is returned unchanged. Cache entries live in
    /// a user-writable directory, so a hit that violates the mapping
    /// invariants raises a `MappingError` for the caller's recovery policy.
    pub fn map_row(
        &self,
        row: &RawRow,
        spec: &TableSpec,
    ) -> Result<MappedComponent, MigrationError> {
        let cache_key = self.cache.map(|_| MappingCache::key_for(row));
        if let (Some(cache), Some(key)) = (self.cache, cache_key.as_deref()) {
            if let Some(hit) = cache.get(key) {
                if !component_is_sane(&hit) {
                    let digest = &key[..key.len().min(12)];
                    return Err(MigrationError::MappingError {
                        table: row.table.clone(),
                        message: format!("corrupt cache entry {}", digest),
                    });
                }
                return Ok(hit);
            }
        }

        let ctx = RowContext::new(row, spec);

        let mut symbol = symbols::resolve(&ctx, self.settings);
        symbol = self.apply_ml(&ctx, symbol);
        if self.settings.validate_symbols
            && symbol.strategy != Strategy::Fallback
            && !symbols::catalog_contains(&symbol.target)
        {
            let generic = symbols::generic_for_text(&ctx.haystack);
            symbol.rationale = format!("{} (not in catalog, demoted to {})", symbol.rationale, generic);
            symbol.target = generic.to_string();
            symbol.confidence *= 0.8;
        }

        let mut family = family_of_symbol(&symbol.target);
        if family == Family::Unknown {
            family = family_of_text(&ctx.haystack);
        }

        let mut footprint = footprints::resolve(&ctx, family, self.settings);
        if self.settings.validate_footprints
            && footprint.strategy != Strategy::Fallback
            && !footprints::catalog_contains(&footprint.target)
        {
            footprint.rationale = format!("{} (not in catalog)", footprint.rationale);
            footprint.target = footprints::FALLBACK_FOOTPRINT.to_string();
            footprint.confidence *= 0.8;
        }

        let mapped_fields = fields::resolve(row, spec, self.settings);
        let field_ratio = if row.columns.is_empty() {
            0.0
        } else {
            (mapped_fields.len() as f64 / row.columns.len() as f64).min(1.0)
        };

        let weights = &self.settings.confidence_weights;
        let confidence = (weights.symbol * symbol.confidence
            + weights.footprint * footprint.confidence
            + weights.fields * field_ratio)
            .clamp(0.0, 1.0);

        let mut component = MappedComponent {
            source_table: row.table.clone(),
            source_symbol: ctx.source_symbol.clone(),
            source_footprint: ctx.source_footprint.clone(),
            target_symbol: symbol.target,
            target_footprint: footprint.target,
            fields: mapped_fields,
            confidence,
            symbol_strategy: symbol.strategy,
            footprint_strategy: footprint.strategy,
            symbol_rationale: symbol.rationale,
            footprint_rationale: footprint.rationale,
            category: Category::Uncategorized,
            recovery_used: false,
        };
        component.category = classify::classify(&component);

        if let (Some(cache), Some(key)) = (self.cache, cache_key) {
            cache.insert(key, &component);
        }
        Ok(component)
    }

    /// Recovery substitute used when mapping a row fails outright
    pub fn fallback_component(&self, row: &RawRow, spec: &TableSpec) -> MappedComponent {
        let ctx = RowContext::new(row, spec);
        let generic = symbols::generic_for_text(&ctx.haystack);
        let mut component = MappedComponent::empty(&row.table);
        component.source_symbol = ctx.source_symbol.clone();
        component.source_footprint = ctx.source_footprint.clone();
        component.target_symbol = generic.to_string();
        component.target_footprint = footprints::FALLBACK_FOOTPRINT.to_string();
        component.fields = fields::resolve(row, spec, self.settings);
        component.confidence = 0.1;
        component.symbol_rationale = "recovered after mapping failure".to_string();
        component.footprint_rationale = "recovered after mapping failure".to_string();
        component.recovery_used = true;
        component.category = classify::classify(&component);
        component
    }

    /// ML stage: consulted only when the prior stages stayed below the
    /// confidence threshold, accepted only above it.
    fn apply_ml(&self, ctx: &RowContext, current: Resolution) -> Resolution {
        let threshold = self.settings.confidence_threshold;
        let Some(scorer) = self.ml else {
            return current;
        };
        if current.confidence >= threshold {
            return current;
        }
        let Some((label, probability)) = scorer.score_symbol(&ctx.haystack) else {
            return current;
        };
        if probability > threshold && probability > current.confidence {
            Resolution {
                target: label.clone(),
                confidence: probability,
                strategy: Strategy::Ml,
                rationale: format!("ml score {:.2} for {}", probability, label),
            }
        } else {
            current
        }
    }
}

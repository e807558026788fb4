//! Symbol resolution: ordered strategies from exact lookup down to the
//! generic fallback

use std::sync::LazyLock;

use regex::Regex;

use crate::config::MigrationSettings;
use crate::util::contains_ci;

use super::similarity::best_ratio;
use super::{keyword_in, Resolution, RowContext, Strategy};

/// Built-in direct lookups, keyed by the trimmed lowercase source symbol
const EXACT_SYMBOLS: &[(&str, &str)] = &[
    ("resistor", "Device:R"),
    ("res", "Device:R"),
    ("potentiometer", "Device:R_Potentiometer"),
    ("capacitor", "Device:C"),
    ("cap", "Device:C"),
    ("polarized capacitor", "Device:C_Polarized"),
    ("inductor", "Device:L"),
    ("led", "Device:LED"),
    ("diode", "Device:D"),
    ("zener", "Device:D_Zener"),
    ("schottky", "Device:D_Schottky"),
    ("npn", "Device:Q_NPN_BCE"),
    ("pnp", "Device:Q_PNP_BCE"),
    ("nmos", "Device:Q_NMOS_GSD"),
    ("pmos", "Device:Q_PMOS_GSD"),
    ("crystal", "Device:Crystal"),
    ("fuse", "Device:Fuse"),
    ("battery", "Device:Battery"),
    ("transformer", "Device:Transformer_1P_1S"),
    ("opamp", "Amplifier_Operational:LM358"),
    ("op-amp", "Amplifier_Operational:LM358"),
];

/// Known symbol identifiers; drives fuzzy matching and catalog validation
pub const SYMBOL_CATALOG: &[&str] = &[
    "Amplifier_Operational:LM324",
    "Amplifier_Operational:LM358",
    "Connector_Generic:Conn_01x02",
    "Connector_Generic:Conn_02x05_Odd_Even",
    "Device:Battery",
    "Device:C",
    "Device:C_Polarized",
    "Device:Crystal",
    "Device:D",
    "Device:D_Schottky",
    "Device:D_Zener",
    "Device:Fuse",
    "Device:L",
    "Device:LED",
    "Device:Q_NMOS_GSD",
    "Device:Q_NPN_BCE",
    "Device:Q_PMOS_BCE",
    "Device:Q_PMOS_GSD",
    "Device:Q_PNP_BCE",
    "Device:R",
    "Device:R_Potentiometer",
    "Device:Transformer_1P_1S",
    "MCU_Microchip_ATmega:ATmega328P-PU",
    "MCU_ST_STM32F1:STM32F103C8Tx",
    "MCU_ST_STM32F4:STM32F407VGTx",
    "Regulator_Linear:AMS1117-3.3",
    "Regulator_Linear:LM7805_TO220",
    "Sensor_Temperature:LM35-D",
    "Switch:SW_Push",
];

struct SemanticRule {
    keywords: &'static [&'static str],
    target: &'static str,
    base_confidence: f64,
}

/// Keyword rules over description + value + comment; any keyword fires the
/// rule, confidence scales with the matched fraction
const SEMANTIC_RULES: &[SemanticRule] = &[
    SemanticRule {
        keywords: &["pnp"],
        target: "Device:Q_PNP_BCE",
        base_confidence: 0.8,
    },
    SemanticRule {
        keywords: &["npn"],
        target: "Device:Q_NPN_BCE",
        base_confidence: 0.8,
    },
    SemanticRule {
        keywords: &["nmos", "n-channel"],
        target: "Device:Q_NMOS_GSD",
        base_confidence: 0.8,
    },
    SemanticRule {
        keywords: &["pmos", "p-channel"],
        target: "Device:Q_PMOS_GSD",
        base_confidence: 0.8,
    },
    SemanticRule {
        keywords: &["zener"],
        target: "Device:D_Zener",
        base_confidence: 0.85,
    },
    SemanticRule {
        keywords: &["schottky"],
        target: "Device:D_Schottky",
        base_confidence: 0.85,
    },
    SemanticRule {
        keywords: &["led", "light emitting"],
        target: "Device:LED",
        base_confidence: 0.85,
    },
    SemanticRule {
        keywords: &["mosfet"],
        target: "Device:Q_NMOS_GSD",
        base_confidence: 0.7,
    },
    SemanticRule {
        keywords: &["transistor"],
        target: "Device:Q_NPN_BCE",
        base_confidence: 0.7,
    },
    SemanticRule {
        keywords: &["diode", "rectifier"],
        target: "Device:D",
        base_confidence: 0.8,
    },
    SemanticRule {
        keywords: &["resistor", "ohm"],
        target: "Device:R",
        base_confidence: 0.8,
    },
    SemanticRule {
        keywords: &["capacitor", "farad"],
        target: "Device:C",
        base_confidence: 0.8,
    },
    SemanticRule {
        keywords: &["inductor", "choke"],
        target: "Device:L",
        base_confidence: 0.8,
    },
    SemanticRule {
        keywords: &["crystal", "oscillator", "resonator"],
        target: "Device:Crystal",
        base_confidence: 0.8,
    },
    SemanticRule {
        keywords: &["opamp", "op-amp", "operational amplifier"],
        target: "Amplifier_Operational:LM358",
        base_confidence: 0.75,
    },
    SemanticRule {
        keywords: &["regulator", "ldo"],
        target: "Regulator_Linear:AMS1117-3.3",
        base_confidence: 0.7,
    },
    SemanticRule {
        keywords: &["microcontroller", "mcu"],
        target: "MCU_Microchip_ATmega:ATmega328P-PU",
        base_confidence: 0.7,
    },
    SemanticRule {
        keywords: &["connector", "header"],
        target: "Connector_Generic:Conn_01x02",
        base_confidence: 0.7,
    },
    SemanticRule {
        keywords: &["fuse"],
        target: "Device:Fuse",
        base_confidence: 0.85,
    },
    SemanticRule {
        keywords: &["switch", "button"],
        target: "Switch:SW_Push",
        base_confidence: 0.7,
    },
];

/// Package-string hints tried before the pin-count heuristics
const PACKAGE_SYMBOL_HINTS: &[(&str, &str, f64)] = &[
    ("sot-23", "Device:Q_NMOS_GSD", 0.7),
    ("sot23", "Device:Q_NMOS_GSD", 0.7),
    ("sot-223", "Regulator_Linear:AMS1117-3.3", 0.6),
    ("to-92", "Device:Q_NPN_BCE", 0.65),
    ("to-220", "Device:Q_NMOS_GSD", 0.6),
    ("sod-123", "Device:D", 0.7),
    ("sod-323", "Device:D", 0.7),
];

static PIN_COUNT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d{1,4})\s*-?\s*pins?\b").unwrap());
static PACKAGE_PIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:TSSOP|SSOP|LQFP|TQFP|QFN|BGA|SOIC|DIP)-?(\d{1,4})\b").unwrap()
});

/// Resolve the target symbol. Strategies are tried in order; the first one
/// that yields above its acceptance bar wins.
pub fn resolve(ctx: &RowContext, settings: &MigrationSettings) -> Resolution {
    let source = ctx.source_symbol.trim();

    // 1. Exact
    if !source.is_empty() {
        let key = source.to_lowercase();
        if let Some((_, target)) = EXACT_SYMBOLS.iter().find(|(k, _)| *k == key) {
            return Resolution {
                target: (*target).to_string(),
                confidence: 1.0,
                strategy: Strategy::Exact,
                rationale: format!("exact match for '{}'", source),
            };
        }
    }

    // 2. Fuzzy against the catalog
    if !source.is_empty() {
        let threshold = settings.symbol_fuzzy_threshold();
        let mut best: Option<(f64, &str)> = None;
        for candidate in SYMBOL_CATALOG {
            let ratio = best_ratio(source, candidate);
            let better = match best {
                None => ratio >= threshold,
                Some((top_ratio, top_target)) => {
                    ratio >= threshold
                        && (ratio > top_ratio || (ratio == top_ratio && *candidate < top_target))
                }
            };
            if better {
                best = Some((ratio, *candidate));
            }
        }
        if let Some((ratio, target)) = best {
            return Resolution {
                target: target.to_string(),
                confidence: ratio,
                strategy: Strategy::Fuzzy,
                rationale: format!("similarity {:.2} to {}", ratio, target),
            };
        }
    }

    // 3. Semantic keyword rules over description + value + comment
    let mut best: Option<(f64, &SemanticRule, usize)> = None;
    for rule in SEMANTIC_RULES {
        let matched = rule
            .keywords
            .iter()
            .filter(|kw| keyword_in(&ctx.haystack, kw))
            .count();
        if matched == 0 {
            continue;
        }
        let confidence = rule.base_confidence * matched as f64 / rule.keywords.len() as f64;
        let better = match best {
            None => true,
            Some((best_confidence, best_rule, _)) => {
                confidence > best_confidence
                    || (confidence == best_confidence && rule.target < best_rule.target)
            }
        };
        if better {
            best = Some((confidence, rule, matched));
        }
    }
    if let Some((confidence, rule, matched)) = best {
        return Resolution {
            target: rule.target.to_string(),
            confidence,
            strategy: Strategy::Semantic,
            rationale: format!(
                "{}/{} keywords of '{}' rule",
                matched,
                rule.keywords.len(),
                rule.keywords[0]
            ),
        };
    }

    // 4a. Package-string heuristics
    for (hint, target, confidence) in PACKAGE_SYMBOL_HINTS {
        if contains_ci(&ctx.package_text, hint) {
            return Resolution {
                target: (*target).to_string(),
                confidence: *confidence,
                strategy: Strategy::Pattern,
                rationale: format!("package hint '{}'", hint),
            };
        }
    }

    // 4b. Pin-count heuristics
    if let Some(pins) = extract_pin_count(ctx) {
        let (target, confidence) = match pins {
            0..=3 => ("Device:Q_NMOS_GSD", 0.55),
            4..=8 => ("Amplifier_Operational:LM358", 0.55),
            9..=20 => ("MCU_Microchip_ATmega:ATmega328P-PU", 0.5),
            _ => ("MCU_ST_STM32F4:STM32F407VGTx", 0.5),
        };
        return Resolution {
            target: target.to_string(),
            confidence,
            strategy: Strategy::Pattern,
            rationale: format!("{} pins", pins),
        };
    }

    // 6. Fallback: family generic by crude keyword scan, else a resistor
    fallback(ctx)
}

/// Last-resort generic symbol at fixed 0.3 confidence
pub fn fallback(ctx: &RowContext) -> Resolution {
    let target = generic_for_text(&ctx.haystack);
    Resolution {
        target: target.to_string(),
        confidence: 0.3,
        strategy: Strategy::Fallback,
        rationale: "no strategy matched".to_string(),
    }
}

/// Crude family scan used by the fallback stage and by error recovery
pub fn generic_for_text(text: &str) -> &'static str {
    const SCAN: &[(&str, &str)] = &[
        ("capacitor", "Device:C"),
        ("inductor", "Device:L"),
        ("led", "Device:LED"),
        ("diode", "Device:D"),
        ("transistor", "Device:Q_NPN_BCE"),
        ("mosfet", "Device:Q_NMOS_GSD"),
        ("crystal", "Device:Crystal"),
        ("connector", "Connector_Generic:Conn_01x02"),
    ];
    for (keyword, target) in SCAN {
        if keyword_in(text, keyword) {
            return target;
        }
    }
    "Device:R"
}

fn extract_pin_count(ctx: &RowContext) -> Option<u32> {
    for text in [&ctx.haystack, &ctx.package_text] {
        if let Some(caps) = PIN_COUNT_RE.captures(text) {
            if let Ok(pins) = caps[1].parse() {
                return Some(pins);
            }
        }
    }
    for text in [&ctx.package_text, &ctx.haystack] {
        if let Some(caps) = PACKAGE_PIN_RE.captures(text) {
            if let Ok(pins) = caps[1].parse() {
                return Some(pins);
            }
        }
    }
    None
}

/// Catalog membership check used by symbol validation
pub fn catalog_contains(target: &str) -> bool {
    SYMBOL_CATALOG.contains(&target)
        || EXACT_SYMBOLS.iter().any(|(_, t)| *t == target)
}

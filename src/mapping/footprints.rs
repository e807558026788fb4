//! Footprint resolution: package-token mapping, fuzzy catalog match, family
//! defaults, fixed fallback

use std::sync::LazyLock;

use regex::Regex;

use crate::config::MigrationSettings;

use super::similarity::best_ratio;
use super::{Family, Resolution, RowContext, Strategy};

/// Fixed last-resort footprint
pub const FALLBACK_FOOTPRINT: &str = "Package_TO_SOT_SMD:SOT-23";

/// Single compiled alternation; alternative order is stable so the
/// first-match-wins contract is deterministic.
static PACKAGE_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)\b(?:
            (0201|0402|0603|0805|1206|1210|1812|2010|2512)
          | (SOD-?\d+|SOT-?\d+|TO-?\d+)
          | ((?:TSSOP|SSOP|LQFP|TQFP|QFN|BGA)-?\d*)
        )\b",
    )
    .unwrap()
});

/// Canonical package token extracted from the row, if any
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageToken {
    /// Imperial chip size, e.g. "0603"
    ChipSize(&'static str),
    /// Named package normalized to `NAME-<digits>`, e.g. "SOT-23"
    Named(String),
}

const CHIP_SIZES: &[(&str, &str)] = &[
    ("0201", "0603"),
    ("0402", "1005"),
    ("0603", "1608"),
    ("0805", "2012"),
    ("1206", "3216"),
    ("1210", "3225"),
    ("1812", "4532"),
    ("2010", "5025"),
    ("2512", "6332"),
];

/// Named packages with their target footprints; a family-specific entry
/// resolves at 0.9 when the detected family agrees, everything else at 0.7
const NAMED_PACKAGES: &[(&str, &str, Option<Family>)] = &[
    ("SOT-23", "Package_TO_SOT_SMD:SOT-23", None),
    ("SOT-89", "Package_TO_SOT_SMD:SOT-89-3", None),
    ("SOT-223", "Package_TO_SOT_SMD:SOT-223", None),
    ("SOT-363", "Package_TO_SOT_SMD:SOT-363_SC-70-6", None),
    ("SOD-123", "Diode_SMD:D_SOD-123", Some(Family::Diode)),
    ("SOD-323", "Diode_SMD:D_SOD-323", Some(Family::Diode)),
    ("SOD-523", "Diode_SMD:D_SOD-523", Some(Family::Diode)),
    ("TO-92", "Package_TO_SOT_THT:TO-92_Inline", None),
    ("TO-220", "Package_TO_SOT_THT:TO-220-3_Vertical", None),
    ("TO-247", "Package_TO_SOT_THT:TO-247-3_Vertical", None),
    ("TO-252", "Package_TO_SOT_SMD:TO-252-2", None),
    ("TO-263", "Package_TO_SOT_SMD:TO-263-2", None),
    ("TSSOP-14", "Package_SO:TSSOP-14_4.4x5mm_P0.65mm", Some(Family::Ic)),
    ("TSSOP-16", "Package_SO:TSSOP-16_4.4x5mm_P0.65mm", Some(Family::Ic)),
    ("TSSOP-20", "Package_SO:TSSOP-20_4.4x6.5mm_P0.65mm", Some(Family::Ic)),
    ("SSOP-16", "Package_SO:SSOP-16_5.3x6.2mm_P0.65mm", Some(Family::Ic)),
    ("SSOP-20", "Package_SO:SSOP-20_5.3x7.2mm_P0.65mm", Some(Family::Ic)),
    ("LQFP-48", "Package_QFP:LQFP-48_7x7mm_P0.5mm", Some(Family::Ic)),
    ("LQFP-64", "Package_QFP:LQFP-64_10x10mm_P0.5mm", Some(Family::Ic)),
    ("TQFP-32", "Package_QFP:TQFP-32_7x7mm_P0.8mm", Some(Family::Ic)),
    ("TQFP-44", "Package_QFP:TQFP-44_10x10mm_P0.8mm", Some(Family::Ic)),
    (
        "QFN-16",
        "Package_DFN_QFN:QFN-16-1EP_3x3mm_P0.5mm_EP1.7x1.7mm",
        Some(Family::Ic),
    ),
    (
        "QFN-32",
        "Package_DFN_QFN:QFN-32-1EP_5x5mm_P0.5mm_EP3.1x3.1mm",
        Some(Family::Ic),
    ),
    (
        "BGA-64",
        "Package_BGA:BGA-64_9.0x9.0mm_Layout10x10_P0.8mm",
        Some(Family::Ic),
    ),
];

/// Known footprints; drives fuzzy matching and catalog validation
pub const FOOTPRINT_CATALOG: &[&str] = &[
    "Capacitor_SMD:C_0402_1005Metric",
    "Capacitor_SMD:C_0603_1608Metric",
    "Capacitor_SMD:C_0805_2012Metric",
    "Capacitor_SMD:C_1206_3216Metric",
    "Capacitor_THT:CP_Radial_D5.0mm_P2.50mm",
    "Crystal:Crystal_SMD_3225-4Pin_3.2x2.5mm",
    "Diode_SMD:D_SOD-123",
    "Diode_SMD:D_SOD-323",
    "Diode_SMD:D_SMA",
    "Inductor_SMD:L_0603_1608Metric",
    "Inductor_SMD:L_0805_2012Metric",
    "LED_SMD:LED_0603_1608Metric",
    "LED_SMD:LED_0805_2012Metric",
    "Package_BGA:BGA-64_9.0x9.0mm_Layout10x10_P0.8mm",
    "Package_DFN_QFN:QFN-16-1EP_3x3mm_P0.5mm_EP1.7x1.7mm",
    "Package_DFN_QFN:QFN-32-1EP_5x5mm_P0.5mm_EP3.1x3.1mm",
    "Package_DIP:DIP-8_W7.62mm",
    "Package_QFP:LQFP-48_7x7mm_P0.5mm",
    "Package_QFP:LQFP-64_10x10mm_P0.5mm",
    "Package_QFP:TQFP-32_7x7mm_P0.8mm",
    "Package_QFP:TQFP-44_10x10mm_P0.8mm",
    "Package_SO:SOIC-8_3.9x4.9mm_P1.27mm",
    "Package_SO:SOIC-14_3.9x8.7mm_P1.27mm",
    "Package_SO:SSOP-16_5.3x6.2mm_P0.65mm",
    "Package_SO:SSOP-20_5.3x7.2mm_P0.65mm",
    "Package_SO:TSSOP-14_4.4x5mm_P0.65mm",
    "Package_SO:TSSOP-16_4.4x5mm_P0.65mm",
    "Package_SO:TSSOP-20_4.4x6.5mm_P0.65mm",
    "Package_TO_SOT_SMD:SOT-23",
    "Package_TO_SOT_SMD:SOT-89-3",
    "Package_TO_SOT_SMD:SOT-223",
    "Package_TO_SOT_SMD:SOT-363_SC-70-6",
    "Package_TO_SOT_SMD:TO-252-2",
    "Package_TO_SOT_SMD:TO-263-2",
    "Package_TO_SOT_THT:TO-92_Inline",
    "Package_TO_SOT_THT:TO-220-3_Vertical",
    "Package_TO_SOT_THT:TO-247-3_Vertical",
    "Resistor_SMD:R_0201_0603Metric",
    "Resistor_SMD:R_0402_1005Metric",
    "Resistor_SMD:R_0603_1608Metric",
    "Resistor_SMD:R_0805_2012Metric",
    "Resistor_SMD:R_1206_3216Metric",
    "Resistor_SMD:R_2512_6332Metric",
];

/// Extract the first package token from the candidate texts, scanned in
/// priority order: source footprint, package field, description, comment.
pub fn extract_package_token(ctx: &RowContext) -> Option<PackageToken> {
    for text in [
        &ctx.source_footprint,
        &ctx.package_field,
        &ctx.description,
        &ctx.comment,
    ] {
        if let Some(caps) = PACKAGE_TOKEN_RE.captures(text) {
            if let Some(size) = caps.get(1) {
                let canonical = CHIP_SIZES
                    .iter()
                    .find(|(s, _)| *s == size.as_str())
                    .map(|(s, _)| *s);
                if let Some(canonical) = canonical {
                    return Some(PackageToken::ChipSize(canonical));
                }
            }
            let named = caps.get(2).or_else(|| caps.get(3));
            if let Some(named) = named {
                return Some(PackageToken::Named(normalize_named(named.as_str())));
            }
        }
    }
    None
}

/// Uppercase and insert the hyphen between name and digits: `sot23` → `SOT-23`
fn normalize_named(token: &str) -> String {
    let upper = token.to_ascii_uppercase();
    if upper.contains('-') {
        return upper;
    }
    match upper.find(|c: char| c.is_ascii_digit()) {
        Some(split) if split > 0 && split < upper.len() => {
            format!("{}-{}", &upper[..split], &upper[split..])
        }
        _ => upper,
    }
}

fn chip_footprint(family: Family, size: &str, metric: &str) -> Option<String> {
    let (library, prefix) = match family {
        Family::Resistor => ("Resistor_SMD", "R"),
        Family::Capacitor => ("Capacitor_SMD", "C"),
        Family::Inductor => ("Inductor_SMD", "L"),
        Family::Led => ("LED_SMD", "LED"),
        Family::Diode => ("Diode_SMD", "D"),
        _ => return None,
    };
    Some(format!("{}:{}_{}_{}Metric", library, prefix, size, metric))
}

/// Family defaults applied when only the component family is known
fn family_default(family: Family) -> Option<&'static str> {
    match family {
        Family::Resistor => Some("Resistor_SMD:R_0603_1608Metric"),
        Family::Capacitor => Some("Capacitor_SMD:C_0603_1608Metric"),
        Family::Inductor => Some("Inductor_SMD:L_0603_1608Metric"),
        Family::Led => Some("LED_SMD:LED_0603_1608Metric"),
        Family::Diode => Some("Diode_SMD:D_SOD-123"),
        Family::Transistor => Some("Package_TO_SOT_SMD:SOT-23"),
        Family::Ic => Some("Package_SO:SOIC-8_3.9x4.9mm_P1.27mm"),
        Family::Crystal => Some("Crystal:Crystal_SMD_3225-4Pin_3.2x2.5mm"),
        Family::Unknown => None,
    }
}

/// Resolve the target footprint for a row with an already-detected family
pub fn resolve(ctx: &RowContext, family: Family, settings: &MigrationSettings) -> Resolution {
    // 1. Package mapping: canonical token crossed with the component family
    if let Some(token) = extract_package_token(ctx) {
        match token {
            PackageToken::ChipSize(size) => {
                let metric = CHIP_SIZES
                    .iter()
                    .find(|(s, _)| *s == size)
                    .map(|(_, m)| *m)
                    .unwrap_or("1608");
                if let Some(target) = chip_footprint(family, size, metric) {
                    return Resolution {
                        target,
                        confidence: 0.9,
                        strategy: Strategy::Pattern,
                        rationale: format!("{} chip size, family match", size),
                    };
                }
                // Size matched but the family is unknown: generic chip footprint
                return Resolution {
                    target: format!("Resistor_SMD:R_{}_{}Metric", size, metric),
                    confidence: 0.7,
                    strategy: Strategy::Pattern,
                    rationale: format!("{} chip size only", size),
                };
            }
            PackageToken::Named(name) => {
                if let Some((_, target, entry_family)) = NAMED_PACKAGES
                    .iter()
                    .find(|(token_name, _, _)| *token_name == name.as_str())
                {
                    let family_match = entry_family.map(|f| f == family).unwrap_or(false);
                    return Resolution {
                        target: (*target).to_string(),
                        confidence: if family_match { 0.9 } else { 0.7 },
                        strategy: Strategy::Pattern,
                        rationale: if family_match {
                            format!("package {}, family match", name)
                        } else {
                            format!("package {}", name)
                        },
                    };
                }
            }
        }
    }

    // 2. Fuzzy against the footprint catalog
    let source = ctx.source_footprint.trim();
    if !source.is_empty() {
        let threshold = settings.footprint_fuzzy_threshold();
        let mut best: Option<(f64, &str)> = None;
        for candidate in FOOTPRINT_CATALOG {
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

    // 3. Type inference from the component family
    if let Some(target) = family_default(family) {
        return Resolution {
            target: target.to_string(),
            confidence: 0.6,
            strategy: Strategy::Semantic,
            rationale: format!("{} family default", family.as_str()),
        };
    }

    // 4. Fallback
    Resolution {
        target: FALLBACK_FOOTPRINT.to_string(),
        confidence: 0.2,
        strategy: Strategy::Fallback,
        rationale: "no package match".to_string(),
    }
}

/// Catalog membership check used by footprint validation
pub fn catalog_contains(target: &str) -> bool {
    FOOTPRINT_CATALOG.contains(&target)
        || NAMED_PACKAGES.iter().any(|(_, t, _)| *t == target)
        || CHIP_SIZES.iter().any(|(size, metric)| {
            [
                Family::Resistor,
                Family::Capacitor,
                Family::Inductor,
                Family::Led,
                Family::Diode,
            ]
            .iter()
            .any(|family| {
                chip_footprint(*family, size, metric).as_deref() == Some(target)
            })
        })
}

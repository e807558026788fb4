//! Migration report aggregation and emission

use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::MigrationSettings;
use crate::error::MigrationError;
use crate::mapping::{CacheStats, MappedComponent, Strategy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Success,
    Partial,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Totals {
    pub total_components: u64,
    pub high_confidence: u64,
    pub medium_confidence: u64,
    pub low_confidence: u64,
}

impl Totals {
    fn record(&mut self, confidence: f64) {
        self.total_components += 1;
        if confidence > 0.8 {
            self.high_confidence += 1;
        } else if confidence >= 0.5 {
            self.medium_confidence += 1;
        } else {
            self.low_confidence += 1;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableReport {
    pub table: String,
    pub component_count: u64,
    pub high_confidence: u64,
    pub medium_confidence: u64,
    pub low_confidence: u64,
    /// Source symbols that resolved via the fallback strategy
    pub fallback_symbols: Vec<String>,
    /// Source footprints that resolved via the fallback strategy
    pub fallback_footprints: Vec<String>,
    pub recovered_rows: u64,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorNote {
    pub kind: String,
    pub severity: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationReport {
    pub generated_at: String,
    pub status: RunStatus,
    pub totals: Totals,
    pub tables: Vec<TableReport>,
    pub cache: CacheStats,
    pub errors: Vec<ErrorNote>,
    pub recommendations: Vec<String>,
    /// Effective settings snapshot for reproducibility
    pub settings: MigrationSettings,
}

/// Accumulates per-table and global statistics during the run
pub struct ReportBuilder {
    totals: Totals,
    tables: Vec<TableReport>,
    errors: Vec<ErrorNote>,
}

impl ReportBuilder {
    pub fn new() -> Self {
        ReportBuilder {
            totals: Totals::default(),
            tables: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Open the stats entry for a source table; tables appear in the report
    /// in processing order.
    pub fn begin_table(&mut self, table: &str) {
        self.tables.push(TableReport {
            table: table.to_string(),
            component_count: 0,
            high_confidence: 0,
            medium_confidence: 0,
            low_confidence: 0,
            fallback_symbols: Vec::new(),
            fallback_footprints: Vec::new(),
            recovered_rows: 0,
            error: None,
        });
    }

    pub fn record_component(&mut self, component: &MappedComponent) {
        self.totals.record(component.confidence);
        let Some(entry) = self.tables.last_mut() else {
            return;
        };
        entry.component_count += 1;
        if component.confidence > 0.8 {
            entry.high_confidence += 1;
        } else if component.confidence >= 0.5 {
            entry.medium_confidence += 1;
        } else {
            entry.low_confidence += 1;
        }
        if component.symbol_strategy == Strategy::Fallback
            && !component.source_symbol.is_empty()
            && !entry.fallback_symbols.contains(&component.source_symbol)
        {
            entry.fallback_symbols.push(component.source_symbol.clone());
        }
        if component.footprint_strategy == Strategy::Fallback
            && !component.source_footprint.is_empty()
            && !entry
                .fallback_footprints
                .contains(&component.source_footprint)
        {
            entry
                .fallback_footprints
                .push(component.source_footprint.clone());
        }
        if component.recovery_used {
            entry.recovered_rows += 1;
        }
    }

    /// Record a per-table failure; the table keeps a zero-count entry
    pub fn record_table_error(&mut self, table: &str, error: &MigrationError) {
        let message = error.to_string();
        match self.tables.iter_mut().find(|t| t.table == table) {
            Some(entry) => entry.error = Some(message),
            None => {
                self.begin_table(table);
                self.tables
                    .last_mut()
                    .expect("entry just pushed")
                    .error = Some(message);
            }
        }
        self.record_error(error);
    }

    pub fn record_error(&mut self, error: &MigrationError) {
        let mut message = error.to_string();
        if let Some(advisory) = error.advisory() {
            message = format!("{} ({})", message, advisory);
        }
        self.errors.push(ErrorNote {
            kind: error.kind().to_string(),
            severity: error.severity().as_str().to_string(),
            message,
        });
    }

    pub fn total_components(&self) -> u64 {
        self.totals.total_components
    }

    /// Finalize the report; fallback lists are sorted so the output is a
    /// deterministic function of the inputs.
    pub fn finish(
        mut self,
        status: RunStatus,
        cache: CacheStats,
        settings: &MigrationSettings,
    ) -> MigrationReport {
        for table in &mut self.tables {
            table.fallback_symbols.sort();
            table.fallback_footprints.sort();
        }
        let recommendations = self.recommendations(settings);
        MigrationReport {
            generated_at: Utc::now().to_rfc3339(),
            status,
            totals: self.totals,
            tables: self.tables,
            cache,
            errors: self.errors,
            recommendations,
            settings: settings.clone(),
        }
    }

    fn recommendations(&self, settings: &MigrationSettings) -> Vec<String> {
        let mut out = Vec::new();
        if self.totals.low_confidence > 0 {
            out.push(format!(
                "review {} low-confidence mappings (confidence < 0.5)",
                self.totals.low_confidence
            ));
        }
        let fallback_footprints: usize =
            self.tables.iter().map(|t| t.fallback_footprints.len()).sum();
        if fallback_footprints > 0 {
            out.push(format!(
                "{} footprints resolved via fallback; extend the package mappings",
                fallback_footprints
            ));
        }
        let fallback_symbols: usize = self.tables.iter().map(|t| t.fallback_symbols.len()).sum();
        if fallback_symbols > 0 {
            out.push(format!(
                "{} symbols resolved via fallback; extend the symbol tables",
                fallback_symbols
            ));
        }
        let recovered: u64 = self.tables.iter().map(|t| t.recovered_rows).sum();
        if recovered > 0 {
            out.push(format!(
                "{} rows needed error recovery; inspect the source data",
                recovered
            ));
        }
        if !settings.enable_caching && self.totals.total_components > 10_000 {
            out.push("enable caching to speed up repeated migrations".to_string());
        }
        out
    }
}

impl Default for ReportBuilder {
    fn default() -> Self {
        ReportBuilder::new()
    }
}

impl MigrationReport {
    pub fn write(&self, path: &Path) -> Result<(), MigrationError> {
        let json =
            serde_json::to_string_pretty(self).map_err(|e| MigrationError::FileAccessError {
                path: path.to_path_buf(),
                message: format!("report serialization failed: {}", e),
            })?;
        std::fs::write(path, json).map_err(|e| MigrationError::FileAccessError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// One-paragraph console summary in the confidence bands of the report
    pub fn summary(&self) -> String {
        format!(
            "{} components migrated ({} high, {} medium, {} low confidence), {} table(s), {} error(s)",
            self.totals.total_components,
            self.totals.high_confidence,
            self.totals.medium_confidence,
            self.totals.low_confidence,
            self.tables.len(),
            self.errors.len(),
        )
    }
}

//! Batch extraction of raw rows from a data source

use crate::config::TableSpec;
use crate::error::MigrationError;

use super::{DataSource, RawRow};

/// One extractor batch; `index` is monotonically increasing per table and
/// drives re-sequencing after parallel mapping.
#[derive(Debug)]
pub struct Batch {
    pub index: usize,
    pub rows: Vec<RawRow>,
}

/// Drives the data source table-by-table, chunking rows into indexed batches
pub struct Extractor {
    batch_size: usize,
}

impl Extractor {
    pub fn new(batch_size: usize) -> Self {
        Extractor {
            batch_size: batch_size.max(1),
        }
    }

    /// Extract all valid rows of a table in source order, batched.
    /// Rows where both the symbol and description fields are empty after
    /// trim are skipped.
    pub fn extract(
        &self,
        source: &mut dyn DataSource,
        table: &str,
        spec: &TableSpec,
    ) -> Result<Vec<Batch>, MigrationError> {
        let rows = source.query_table(table, spec.user_where.as_deref())?;

        let mut batches = Vec::new();
        let mut current = Vec::with_capacity(self.batch_size);
        for row in rows {
            if !row_is_valid(&row, spec) {
                continue;
            }
            current.push(row);
            if current.len() == self.batch_size {
                batches.push(Batch {
                    index: batches.len(),
                    rows: std::mem::replace(&mut current, Vec::with_capacity(self.batch_size)),
                });
            }
        }
        if !current.is_empty() {
            batches.push(Batch {
                index: batches.len(),
                rows: current,
            });
        }
        Ok(batches)
    }
}

/// Validity filter: at least one of the symbol and description fields is
/// non-empty after trim.
pub fn row_is_valid(row: &RawRow, spec: &TableSpec) -> bool {
    row.text(&spec.symbol_field).is_some() || row.text(&spec.description_field).is_some()
}

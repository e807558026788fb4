//! Pipeline orchestration
//!
//! Drives the linear phase sequence: parse config → open source → per-table
//! extract/map/insert → views → optimize → write descriptor → emit report.
//! Tables are processed sequentially; mapping within a table fans out across
//! a thread pool and is re-sequenced by batch index before insertion. A
//! report is emitted even for failed and cancelled runs.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::config::{self, MigrationSettings, TableSpec};
use crate::error::{Disposition, MigrationError};
use crate::mapping::{MappedComponent, MappingCache, MappingEngine, MlScorer};
use crate::source::extractor::{Batch, Extractor};
use crate::source::{self, DataSource};
use crate::target::{dbl_writer, MigrationReport, ReportBuilder, RunStatus, TargetStoreBuilder};

/// Minimum batches in a window to benefit from parallel mapping.
/// A single batch is mapped inline to avoid pool overhead.
const PARALLEL_THRESHOLD: usize = 2;

/// Cooperative cancellation flag, checked at batch boundaries
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        CancelToken(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Periodic pipeline progress
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub table: String,
    pub completed: u64,
    pub total: u64,
    pub elapsed: Duration,
    pub eta: Option<Duration>,
}

pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent);
}

/// Emits at most one event per second, plus the final one
struct ProgressThrottle {
    last_emit: Option<Instant>,
}

impl ProgressThrottle {
    fn new() -> Self {
        ProgressThrottle { last_emit: None }
    }

    fn should_emit(&mut self, finished: bool) -> bool {
        let now = Instant::now();
        let due = match self.last_emit {
            None => true,
            Some(last) => now.duration_since(last) >= Duration::from_secs(1),
        };
        if due || finished {
            self.last_emit = Some(now);
            true
        } else {
            false
        }
    }
}

/// Everything a finished (or failed) run hands back
pub struct MigrationOutcome {
    pub store_path: PathBuf,
    pub dbl_path: PathBuf,
    pub report_path: PathBuf,
    pub report: MigrationReport,
}

pub struct Orchestrator {
    settings: MigrationSettings,
    cancel: CancelToken,
    observer: Option<Box<dyn ProgressObserver>>,
    ml: Option<Box<dyn MlScorer>>,
}

impl Orchestrator {
    pub fn new(settings: MigrationSettings) -> Self {
        Orchestrator {
            settings,
            cancel: CancelToken::new(),
            observer: None,
            ml: None,
        }
    }

    pub fn with_observer(mut self, observer: Box<dyn ProgressObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn with_ml(mut self, ml: Box<dyn MlScorer>) -> Self {
        self.ml = Some(ml);
        self
    }

    /// Token for cancelling the run from another thread
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run the full migration for a DbLib file
    pub fn run(&self, dblib_path: &Path) -> Result<MigrationOutcome, MigrationError> {
        self.settings.validate()?;

        let cache = if self.settings.enable_caching {
            let dir = self
                .settings
                .cache_directory
                .clone()
                .unwrap_or_else(|| self.settings.output_directory.join(".mapping_cache"));
            Some(MappingCache::new(Some(dir)))
        } else {
            None
        };

        let mut report = ReportBuilder::new();
        let result = self.run_pipeline(dblib_path, cache.as_ref(), &mut report);
        let cache_stats = cache.as_ref().map(|c| c.stats()).unwrap_or_default();

        match result {
            Ok((status, store_path)) => {
                let finished = report.finish(status, cache_stats, &self.settings);
                let report_path = self.emit_report(&finished)?;
                info!(summary = %finished.summary(), "migration finished");
                Ok(MigrationOutcome {
                    store_path,
                    dbl_path: self.settings.dbl_path(),
                    report_path,
                    report: finished,
                })
            }
            Err(error) => {
                report.record_error(&error);
                let status = match error {
                    MigrationError::Cancelled => RunStatus::Cancelled,
                    _ => RunStatus::Failed,
                };
                if status == RunStatus::Cancelled && !self.settings.keep_partial_output {
                    self.remove_partial_outputs();
                }
                let finished = report.finish(status, cache_stats, &self.settings);
                if let Err(report_error) = self.emit_report(&finished) {
                    warn!(error = %report_error, "failure report could not be written");
                }
                Err(error)
            }
        }
    }

    /// The linear phase sequence; returns the final status and store path
    fn run_pipeline(
        &self,
        dblib_path: &Path,
        cache: Option<&MappingCache>,
        report: &mut ReportBuilder,
    ) -> Result<(RunStatus, PathBuf), MigrationError> {
        let started = Instant::now();
        let mut status = RunStatus::Success;

        info!(path = %dblib_path.display(), "parsing source configuration");
        let source_config = config::parse_dblib(dblib_path).map_err(flatten_anyhow)?;

        info!(
            backend = source_config.connection.kind.as_str(),
            tables = source_config.tables.len(),
            "opening data source"
        );
        let mut data_source = source::connect(
            &source_config.connection,
            Duration::from_secs(self.settings.connect_timeout_secs),
        )?;

        let mut builder = self.create_store(report)?;
        let store_path = builder.path().to_path_buf();
        builder.populate_categories()?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.settings.max_worker_threads)
            .build()
            .map_err(|e| MigrationError::ConfigError {
                message: format!("worker pool: {}", e),
            })?;

        let mut engine = MappingEngine::new(&self.settings);
        if let Some(cache) = cache {
            engine = engine.with_cache(cache);
        }
        if let Some(ml) = self.ml.as_deref() {
            engine = engine.with_ml(ml);
        }

        let extractor = Extractor::new(self.settings.batch_size);
        for (table, spec) in source_config.enabled_tables() {
            match self.migrate_table(
                table,
                spec,
                data_source.as_mut(),
                &extractor,
                &engine,
                &pool,
                &mut builder,
                report,
                started,
            ) {
                Ok(()) => {}
                Err(error @ MigrationError::Cancelled) => {
                    builder.rollback_table();
                    return Err(error);
                }
                Err(error) => match error.disposition() {
                    Disposition::Recover | Disposition::Note => {
                        warn!(table = %table, error = %error, "table skipped");
                        builder.rollback_table();
                        report.record_table_error(table, &error);
                        status = RunStatus::Partial;
                    }
                    Disposition::AbortPhase | Disposition::AbortRun => {
                        builder.rollback_table();
                        return Err(error);
                    }
                },
            }
        }

        if let Err(e) = data_source.close() {
            warn!(error = %e, "source close failed");
        }

        if self.settings.create_indexes {
            self.phase(&mut status, report, "create indexes", builder.create_indexes())?;
        }
        if self.settings.create_views {
            self.phase(&mut status, report, "create views", builder.create_views())?;
        }
        self.phase(
            &mut status,
            report,
            "optimize",
            builder.optimize(self.settings.vacuum_database),
        )?;
        builder.close()?;

        self.phase(
            &mut status,
            report,
            "write descriptor",
            dbl_writer::write_dbl(
                &self.settings.dbl_path(),
                &store_path,
                library_name(&self.settings.dblib_name),
            ),
        )?;

        Ok((status, store_path))
    }

    /// Extract, map and insert one source table inside one transaction
    #[allow(clippy::too_many_arguments)]
    fn migrate_table(
        &self,
        table: &str,
        spec: &TableSpec,
        data_source: &mut dyn DataSource,
        extractor: &Extractor,
        engine: &MappingEngine<'_>,
        pool: &rayon::ThreadPool,
        builder: &mut TargetStoreBuilder,
        report: &mut ReportBuilder,
        started: Instant,
    ) -> Result<(), MigrationError> {
        debug!(table = %table, "extracting");
        let total = data_source
            .count_rows(table, spec.user_where.as_deref())
            .unwrap_or(0);
        let batches = extractor.extract(data_source, table, spec)?;
        report.begin_table(table);

        let window_size = (self.settings.max_worker_threads * 2).max(1);
        let parallel = self.settings.enable_parallel_processing;
        let mut throttle = ProgressThrottle::new();
        let mut completed: u64 = 0;

        builder.begin_table()?;
        for window in batches.chunks(window_size) {
            if self.cancel.is_cancelled() {
                builder.rollback_table();
                return Err(MigrationError::Cancelled);
            }

            // Order-preserving collect keeps insertion order equal to
            // extraction order even when batches finish out of order.
            let mapped: Vec<Vec<MappedComponent>> = if parallel && window.len() >= PARALLEL_THRESHOLD
            {
                pool.install(|| {
                    window
                        .par_iter()
                        .map(|batch| self.map_batch(engine, batch, spec))
                        .collect()
                })
            } else {
                window
                    .iter()
                    .map(|batch| self.map_batch(engine, batch, spec))
                    .collect()
            };

            for components in &mapped {
                if self.cancel.is_cancelled() {
                    builder.rollback_table();
                    return Err(MigrationError::Cancelled);
                }
                for component in components {
                    report.record_component(component);
                }
                builder.insert_batch(components)?;
                completed += components.len() as u64;

                let finished = completed >= total && total > 0;
                if throttle.should_emit(finished) {
                    self.emit_progress(table, completed, total.max(completed), started);
                }
            }
        }
        builder.commit_table()?;
        debug!(table = %table, rows = completed, "table committed");
        Ok(())
    }

    /// Map one batch; a row that fails to map is replaced by the recovery
    /// substitute instead of failing the batch.
    fn map_batch(
        &self,
        engine: &MappingEngine<'_>,
        batch: &Batch,
        spec: &TableSpec,
    ) -> Vec<MappedComponent> {
        batch
            .rows
            .iter()
            .map(|row| match engine.map_row(row, spec) {
                Ok(component) => component,
                Err(error) => {
                    warn!(table = %row.table, error = %error, "row recovered with fallback mapping");
                    engine.fallback_component(row, spec)
                }
            })
            .collect()
    }

    /// Create the store at the configured path, falling back to the working
    /// directory when the output directory is not writable.
    fn create_store(&self, report: &mut ReportBuilder) -> Result<TargetStoreBuilder, MigrationError> {
        match TargetStoreBuilder::create(&self.settings.store_path()) {
            Ok(builder) => Ok(builder),
            Err(error @ MigrationError::FileAccessError { .. }) => {
                warn!(error = %error, "falling back to the working directory");
                report.record_error(&error);
                TargetStoreBuilder::create(Path::new(&self.settings.database_name))
            }
            Err(error) => Err(error),
        }
    }

    /// Apply the error policy to a post-insertion phase: aborting the phase
    /// surfaces in the report and downgrades the run to partial.
    fn phase(
        &self,
        status: &mut RunStatus,
        report: &mut ReportBuilder,
        name: &str,
        result: Result<(), MigrationError>,
    ) -> Result<(), MigrationError> {
        match result {
            Ok(()) => Ok(()),
            Err(error) => match error.disposition() {
                Disposition::AbortRun => Err(error),
                _ => {
                    warn!(phase = name, error = %error, "phase failed");
                    report.record_error(&error);
                    *status = RunStatus::Partial;
                    Ok(())
                }
            },
        }
    }

    fn emit_progress(&self, table: &str, completed: u64, total: u64, started: Instant) {
        let Some(observer) = &self.observer else {
            return;
        };
        let elapsed = started.elapsed();
        let eta = if completed > 0 && total > completed {
            Some(elapsed.mul_f64((total - completed) as f64 / completed as f64))
        } else {
            None
        };
        observer.on_progress(&ProgressEvent {
            table: table.to_string(),
            completed,
            total,
            elapsed,
            eta,
        });
    }

    /// Write the report, trying the working directory when the output
    /// directory fails
    fn emit_report(&self, report: &MigrationReport) -> Result<PathBuf, MigrationError> {
        let primary = self.settings.report_path();
        match report.write(&primary) {
            Ok(()) => Ok(primary),
            Err(error) => {
                warn!(error = %error, "report fallback to the working directory");
                let fallback = PathBuf::from("migration_report.json");
                report.write(&fallback)?;
                Ok(fallback)
            }
        }
    }

    /// Remove target files after a cancelled run, including WAL sidecars
    fn remove_partial_outputs(&self) {
        let store = self.settings.store_path();
        for path in [
            store.clone(),
            PathBuf::from(format!("{}-wal", store.display())),
            PathBuf::from(format!("{}-shm", store.display())),
            self.settings.dbl_path(),
        ] {
            if path.exists() {
                if let Err(e) = std::fs::remove_file(&path) {
                    warn!(path = %path.display(), error = %e, "partial output not removed");
                }
            }
        }
    }
}

/// Library display name derived from the descriptor file name
fn library_name(dblib_name: &str) -> &str {
    dblib_name.strip_suffix(".kicad_dbl").unwrap_or(dblib_name)
}

/// `parse_dblib` surfaces anyhow at the crate boundary; pull the typed error
/// back out for policy decisions.
fn flatten_anyhow(error: anyhow::Error) -> MigrationError {
    match error.downcast::<MigrationError>() {
        Ok(typed) => typed,
        Err(other) => MigrationError::ConfigError {
            message: other.to_string(),
        },
    }
}

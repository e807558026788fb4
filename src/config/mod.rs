//! Migration settings and source DbLib configuration

pub mod dblib;
pub mod settings;

pub use dblib::{parse_dblib, BackendKind, ConnectionDescriptor, SourceConfig, TableSpec};
pub use settings::{ConfidenceWeights, MigrationSettings};

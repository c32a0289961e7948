// src/lib.rs
// Public library surface for the service binary, the CLI and integration tests.

pub mod aggregate;
pub mod api;
pub mod classifier;
pub mod config;
pub mod corpus;
pub mod ingest;
pub mod metrics;
pub mod record;
pub mod temporal;

// ---- Re-exports for stable public API ----
pub use crate::aggregate::{RegionScope, RegionalAggregator};
pub use crate::api::router;
pub use crate::classifier::{ClassifierHandle, HeadlineClassifier};
pub use crate::corpus::{CorpusProcessor, Dataset, DatasetRow};
pub use crate::record::{OutbreakRecord, Region, Severity};
pub use crate::temporal::PartialDate;

//! `naval-gallery-recon`: catalog reconciliation for the naval gallery.
//!
//! Pure engine crate: receives harvester payloads and the current catalog,
//! returns the merged catalog plus a per-record report. No CLI or file IO.

pub mod catalog;
pub mod collate;
pub mod config;
pub mod engine;
pub mod error;
pub mod keys;
pub mod merge;
pub mod model;
pub mod normalize;
pub mod report;
pub mod resolve;
pub mod routing;
pub mod store;

pub use catalog::{load_catalog, Catalog, CatalogFormat, LoadedCatalog};
pub use config::ReconConfig;
pub use engine::{run, IngestBatch, ReconInput, ReconResult};
pub use error::{ReconError, RecordError};
pub use keys::{KeyTable, NoKeys, StableKey, StableKeySource};
pub use model::{FieldValue, ImageRecord, RawPayload, RecordId, SourceFields, SourceType};
pub use report::MergeReport;
pub use routing::Routing;
pub use store::CatalogStore;

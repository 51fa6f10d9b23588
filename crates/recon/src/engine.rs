use log::{debug, info, warn};
use serde::Serialize;

use crate::catalog::{parse_entries, Catalog, LoadedCatalog};
use crate::config::ReconConfig;
use crate::error::{ReconError, RecordError};
use crate::keys::StableKeySource;
use crate::merge::Staged;
use crate::model::{ImageRecord, RawPayload, SourceType};
use crate::normalize::normalize;
use crate::report::{MergeReport, MergeSummary, RecordOrigin, Supersession};
use crate::resolve::{IdentityIndex, Resolver};
use crate::store::CatalogStore;

/// Batch label used for provisional entries found in the loaded catalog.
pub const LEGACY_BATCH: &str = "catalog";

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Raw payloads of one source type, in harvester order.
#[derive(Debug, Clone)]
pub struct IngestBatch {
    pub label: String,
    pub source: SourceType,
    pub payloads: Vec<RawPayload>,
}

impl IngestBatch {
    /// Parse a manifest (JSON array, or the `const images = [...]` module form).
    pub fn parse(label: &str, source: SourceType, text: &str) -> Result<Self, ReconError> {
        let entries = parse_entries(text).map_err(|message| ReconError::CatalogParse {
            path: label.to_string(),
            message,
        })?;
        Ok(Self {
            label: label.to_string(),
            source,
            payloads: entries.iter().map(|e| RawPayload::from_json_object(source, e)).collect(),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReconInput {
    pub catalog: LoadedCatalog,
    pub batches: Vec<IngestBatch>,
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ReconMeta {
    pub config_name: String,
    pub engine_version: String,
    pub run_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconResult {
    pub meta: ReconMeta,
    pub summary: MergeSummary,
    pub report: MergeReport,
    /// Invariant violations found in the merged catalog. Empty on a healthy run.
    pub audit: Vec<String>,
    #[serde(skip)]
    pub catalog: Catalog,
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// Normalize, resolve and merge every batch into the loaded catalog.
///
/// Provisional entries left in the catalog file by an older run are queued
/// ahead of the batches, so a key that has since become available replaces
/// them with a canonical record.
pub fn run(
    config: &ReconConfig,
    input: ReconInput,
    keys: &dyn StableKeySource,
) -> Result<ReconResult, ReconError> {
    let routing = config.routing();
    let resolver = Resolver::new(keys, &routing);
    let LoadedCatalog { catalog, provisional } = input.catalog;

    info!(
        "{}: {} catalog records, {} provisional, {} batches",
        config.name,
        catalog.len(),
        provisional.len(),
        input.batches.len()
    );

    let index = catalog.identity_index();
    let mut report = MergeReport::default();
    let mut staged = Vec::new();

    // Legacy provisional entries. A failure is only reported once the merge
    // shows no canonical record for the same image.
    let mut legacy: Vec<LegacyEntry> = Vec::new();
    for (i, record) in provisional.into_iter().enumerate() {
        let origin = RecordOrigin::new(LEGACY_BATCH, i);
        let provisional_id = record.id.as_str().to_string();
        match resolver.resolve(record.clone(), &index) {
            Ok(resolved) => {
                debug!("{origin}: {}", resolved.id);
                staged.push(Staged::new(origin.clone(), resolved.clone()));
                legacy.push(LegacyEntry { origin, provisional_id, record: resolved, error: None });
            }
            Err(error) => {
                legacy.push(LegacyEntry { origin, provisional_id, record, error: Some(error) });
            }
        }
    }

    // New batches
    for batch in &input.batches {
        debug!("batch {}: {} {} payloads", batch.label, batch.payloads.len(), batch.source);
        for (i, payload) in batch.payloads.iter().enumerate() {
            let origin = RecordOrigin::new(&batch.label, i);
            let record = match normalize(payload, &routing) {
                Ok(record) => record,
                Err(error) => {
                    debug!("{origin}: {error}");
                    report.reject_payload(origin, payload, error);
                    continue;
                }
            };
            if let Some(resolved) = resolve_one(&resolver, &index, origin.clone(), record, &mut report) {
                staged.push(Staged::new(origin, resolved));
            }
        }
    }

    let store = CatalogStore::new(catalog);
    report.extend(store.merge(staged));
    let catalog = Catalog::clone(&store.snapshot());

    let mut legacy_report = MergeReport::default();
    for entry in legacy {
        let LegacyEntry { origin, provisional_id, record, error } = entry;
        match (catalog.find_by_image(&record.title, &record.url), error) {
            (Some(kept), _) => legacy_report.superseded.push(Supersession {
                provisional_id,
                canonical_id: kept.id.as_str().to_string(),
                title: record.title,
                url: record.url,
            }),
            (None, Some(error)) => {
                debug!("{origin}: {error}");
                legacy_report.record_issue(origin, &record, error);
            }
            // Dropped by the merge, which already reported why
            (None, None) => {}
        }
    }
    legacy_report.extend(report);
    let report = legacy_report;

    let audit = catalog.audit(&routing);
    for violation in &audit {
        warn!("catalog invariant: {violation}");
    }

    let summary = report.summary();
    info!(
        "{}: {} inserted, {} updated, {} unchanged, {} superseded, {} rejected, {} collisions",
        config.name,
        summary.inserted,
        summary.updated,
        summary.unchanged,
        summary.superseded,
        summary.rejected,
        summary.collisions
    );

    Ok(ReconResult {
        meta: ReconMeta {
            config_name: config.name.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
        },
        summary,
        report,
        audit,
        catalog,
    })
}

/// A provisional entry from the loaded catalog, resolved or not.
struct LegacyEntry {
    origin: RecordOrigin,
    provisional_id: String,
    record: ImageRecord,
    error: Option<RecordError>,
}

fn resolve_one(
    resolver: &Resolver<'_>,
    index: &IdentityIndex,
    origin: RecordOrigin,
    record: ImageRecord,
    report: &mut MergeReport,
) -> Option<ImageRecord> {
    match resolver.resolve(record.clone(), index) {
        Ok(resolved) => {
            debug!("{origin}: {}", resolved.id);
            Some(resolved)
        }
        Err(error) => {
            debug!("{origin}: {error}");
            report.record_issue(origin, &record, error);
            None
        }
    }
}

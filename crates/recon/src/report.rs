use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::RecordError;
use crate::model::{ImageRecord, RawPayload};

// ---------------------------------------------------------------------------
// Per-record entries
// ---------------------------------------------------------------------------

/// Where a record came from: a batch label (usually its file name) and the
/// zero-based position inside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordOrigin {
    pub batch: String,
    pub index: usize,
}

impl RecordOrigin {
    pub fn new(batch: &str, index: usize) -> Self {
        Self { batch: batch.to_string(), index }
    }
}

impl std::fmt::Display for RecordOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.batch, self.index)
    }
}

/// A record that was rejected or collapsed, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordIssue {
    pub origin: RecordOrigin,
    pub id: String,
    pub title: String,
    pub url: String,
    #[serde(flatten)]
    pub error: RecordError,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldUpdate {
    pub id: String,
    pub fields: Vec<String>,
}

/// A provisional catalog entry replaced by its canonical record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Supersession {
    pub provisional_id: String,
    pub canonical_id: String,
    pub title: String,
    pub url: String,
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Everything a merge pass did. No record leaves the pipeline without an
/// entry here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub inserted: Vec<String>,
    pub updated: Vec<FieldUpdate>,
    pub unchanged: Vec<String>,
    pub superseded: Vec<Supersession>,
    pub issues: Vec<RecordIssue>,
}

impl MergeReport {
    pub fn record_issue(&mut self, origin: RecordOrigin, record: &ImageRecord, error: RecordError) {
        self.issues.push(RecordIssue {
            origin,
            id: record.id.as_str().to_string(),
            title: record.title.clone(),
            url: record.url.clone(),
            error,
        });
    }

    /// A payload that never became a record. Missing fields report as empty.
    pub fn reject_payload(&mut self, origin: RecordOrigin, payload: &RawPayload, error: RecordError) {
        let field = |key: &str| payload.get(key).unwrap_or_default().to_string();
        self.issues.push(RecordIssue {
            origin,
            id: field("id"),
            title: field("title"),
            url: field("url"),
            error,
        });
    }

    /// Issues that kept a record out of the catalog entirely.
    pub fn rejections(&self) -> impl Iterator<Item = &RecordIssue> {
        self.issues.iter().filter(|i| i.error.is_rejection())
    }

    pub fn collisions(&self) -> impl Iterator<Item = &RecordIssue> {
        self.issues.iter().filter(|i| !i.error.is_rejection())
    }

    pub fn has_rejections(&self) -> bool {
        self.rejections().next().is_some()
    }

    /// Append another report's entries after this one's.
    pub fn extend(&mut self, other: MergeReport) {
        self.inserted.extend(other.inserted);
        self.updated.extend(other.updated);
        self.unchanged.extend(other.unchanged);
        self.superseded.extend(other.superseded);
        self.issues.extend(other.issues);
    }

    pub fn summary(&self) -> MergeSummary {
        let mut issue_counts: BTreeMap<String, usize> = BTreeMap::new();
        for issue in &self.issues {
            *issue_counts.entry(issue.error.kind().to_string()).or_insert(0) += 1;
        }
        MergeSummary {
            inserted: self.inserted.len(),
            updated: self.updated.len(),
            unchanged: self.unchanged.len(),
            superseded: self.superseded.len(),
            rejected: self.rejections().count(),
            collisions: self.collisions().count(),
            issue_counts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeSummary {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub superseded: usize,
    pub rejected: usize,
    pub collisions: usize,
    pub issue_counts: BTreeMap<String, usize>,
}

use std::fmt;

use serde::Serialize;

use crate::model::SourceType;

/// Run-level failure. Stops the reconciliation before anything is merged.
#[derive(Debug)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (bad path, duplicate subdir, etc.).
    ConfigValidation(String),
    /// A catalog or batch file is not a sequence of flat records.
    CatalogParse { path: String, message: String },
    /// The catalog at rest breaks an invariant (duplicate canonical id, ...).
    CatalogInvariant(Vec<String>),
    /// Stable-key table could not be read.
    KeyTable(String),
    /// The merged catalog could not be serialized.
    Render(String),
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::CatalogParse { path, message } => {
                write!(f, "cannot parse catalog '{path}': {message}")
            }
            Self::CatalogInvariant(violations) => {
                write!(f, "catalog invariant violated: {}", violations.join("; "))
            }
            Self::KeyTable(msg) => write!(f, "key table error: {msg}"),
            Self::Render(msg) => write!(f, "cannot render catalog: {msg}"),
        }
    }
}

impl std::error::Error for ReconError {}

/// Per-record failure. Collected into the merge report, never aborts a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordError {
    /// A field required for every source type is missing or blank.
    SchemaError { field: String },
    /// Provisional id with no stable key to derive a canonical one from.
    UnresolvedIdentity { source_type: SourceType },
    /// Canonical id already held by a different logical image.
    IdentityConflict {
        existing_title: String,
        existing_url: String,
    },
    /// Same image seen twice; collapsed into `kept`.
    DuplicateCollision { kept: String },
}

impl RecordError {
    /// Stable short name used for summary buckets and log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SchemaError { .. } => "schema_error",
            Self::UnresolvedIdentity { .. } => "unresolved_identity",
            Self::IdentityConflict { .. } => "identity_conflict",
            Self::DuplicateCollision { .. } => "duplicate_collision",
        }
    }

    /// Collisions are recovered by collapsing; everything else is a rejection.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, Self::DuplicateCollision { .. })
    }
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SchemaError { field } => write!(f, "required field '{field}' is missing or empty"),
            Self::UnresolvedIdentity { source_type } => {
                write!(f, "no stable {source_type} key available for provisional id")
            }
            Self::IdentityConflict { existing_title, existing_url } => write!(
                f,
                "id already belongs to a different image ('{existing_title}' at {existing_url})"
            ),
            Self::DuplicateCollision { kept } => write!(f, "duplicate of '{kept}', collapsed"),
        }
    }
}

impl std::error::Error for RecordError {}

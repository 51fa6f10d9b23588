//! The catalog: canonical records keyed by id, kept in insertion order.

use std::collections::HashMap;
use std::path::Path;

use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};

use crate::error::{ReconError, RecordError};
use crate::model::{ImageRecord, RawPayload};
use crate::normalize::normalize;
use crate::resolve::IdentityIndex;
use crate::routing::Routing;

/// Prefix of the JS module form consumed by the gallery frontend.
pub const JS_PREFIX: &str = "const images = ";

/// On-disk catalog representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogFormat {
    /// Plain JSON array.
    Json,
    /// `const images = [...];`
    JsModule,
}

impl CatalogFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("js") => Self::JsModule,
            _ => Self::Json,
        }
    }
}

/// Canonical records only. Provisional entries never make it in.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    records: Vec<ImageRecord>,
    by_id: HashMap<String, usize>,
    by_image: HashMap<(String, String), usize>,
}

impl PartialEq for Catalog {
    fn eq(&self, other: &Self) -> bool {
        self.records == other.records
    }
}

impl Eq for Catalog {}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from canonical records, rejecting provisional or repeated ids.
    pub fn from_records(records: impl IntoIterator<Item = ImageRecord>) -> Result<Self, ReconError> {
        let mut catalog = Self::new();
        let mut violations = Vec::new();
        for record in records {
            match record.id.canonical() {
                None => violations.push(format!("provisional id '{}' in catalog", record.id)),
                Some(id) if catalog.contains(id) => violations.push(format!("duplicate id '{id}'")),
                Some(_) => catalog.push(record),
            }
        }
        if violations.is_empty() {
            Ok(catalog)
        } else {
            Err(ReconError::CatalogInvariant(violations))
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&ImageRecord> {
        self.by_id.get(id).map(|&i| &self.records[i])
    }

    /// The record holding this exact title + URL pair, whatever its id.
    pub fn find_by_image(&self, title: &str, url: &str) -> Option<&ImageRecord> {
        self.by_image
            .get(&(title.to_string(), url.to_string()))
            .map(|&i| &self.records[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &ImageRecord> {
        self.records.iter()
    }

    pub fn records(&self) -> &[ImageRecord] {
        &self.records
    }

    pub fn identity_index(&self) -> IdentityIndex {
        let mut index = IdentityIndex::new();
        for r in &self.records {
            index.insert(r.source_type(), r.id.as_str(), &r.title, &r.url);
        }
        index
    }

    /// Append a canonical record whose id is not present yet.
    pub(crate) fn push(&mut self, record: ImageRecord) {
        let slot = self.records.len();
        self.by_id.insert(record.id.as_str().to_string(), slot);
        self.by_image
            .entry((record.title.clone(), record.url.clone()))
            .or_insert(slot);
        self.records.push(record);
    }

    /// Swap the record stored under `id`, keeping its position.
    pub(crate) fn replace(&mut self, id: &str, record: ImageRecord) {
        let Some(&slot) = self.by_id.get(id) else {
            return;
        };
        let old = &self.records[slot];
        let old_key = (old.title.clone(), old.url.clone());
        if self.by_image.get(&old_key) == Some(&slot) {
            self.by_image.remove(&old_key);
        }
        self.by_image
            .entry((record.title.clone(), record.url.clone()))
            .or_insert(slot);
        self.records[slot] = record;
    }

    /// Invariant violations of a catalog at rest: paths that are not derived
    /// from the id, and one image filed under more than one id.
    pub fn audit(&self, routing: &Routing) -> Vec<String> {
        let mut violations = Vec::new();
        let mut seen: HashMap<(&str, &str), &str> = HashMap::new();
        for r in &self.records {
            let expected = routing.local_path(r.source_type(), r.id.as_str());
            if r.local_path != expected {
                violations.push(format!(
                    "{}: local_path '{}' should be '{expected}'",
                    r.id, r.local_path
                ));
            }
            if let Some(first) = seen.insert((r.title.as_str(), r.url.as_str()), r.id.as_str()) {
                violations.push(format!("{}: same title and url as '{first}'", r.id));
            }
        }
        violations
    }

    pub fn render(&self, format: CatalogFormat) -> Result<String, ReconError> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ReconError::Render(e.to_string()))?;
        Ok(match format {
            CatalogFormat::Json => format!("{json}\n"),
            CatalogFormat::JsModule => format!("{JS_PREFIX}{json};"),
        })
    }
}

impl Serialize for Catalog {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.records.len()))?;
        for r in &self.records {
            seq.serialize_element(r)?;
        }
        seq.end()
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// A catalog file split into its canonical part and the provisional entries
/// an older harvester run left behind.
#[derive(Debug, Clone, Default)]
pub struct LoadedCatalog {
    pub catalog: Catalog,
    pub provisional: Vec<ImageRecord>,
}

/// Parse the flat objects of a JSON array or `const images = [...];` module.
pub fn parse_entries(text: &str) -> Result<Vec<serde_json::Map<String, serde_json::Value>>, String> {
    let trimmed = text.trim();
    let body = match trimmed.strip_prefix(JS_PREFIX) {
        Some(rest) => rest.trim_end().trim_end_matches(';'),
        None => trimmed,
    };
    if body.is_empty() {
        return Ok(Vec::new());
    }
    let values: Vec<serde_json::Value> = serde_json::from_str(body).map_err(|e| e.to_string())?;
    values
        .into_iter()
        .enumerate()
        .map(|(i, v)| match v {
            serde_json::Value::Object(map) => Ok(map),
            other => Err(format!("entry {i} is not an object: {other}")),
        })
        .collect()
}

/// Load a catalog file. Entries are normalized with their inferred source
/// type; provisional ones are split off, canonical duplicates are fatal.
pub fn load_catalog(text: &str, path: &str, routing: &Routing) -> Result<LoadedCatalog, ReconError> {
    let parse_err = |message: String| ReconError::CatalogParse { path: path.to_string(), message };
    let entries = parse_entries(text).map_err(parse_err)?;

    let mut canonical = Vec::new();
    let mut provisional = Vec::new();
    for (i, entry) in entries.iter().enumerate() {
        let source = routing
            .infer_source(&RawPayload::fields_from_json(entry))
            .ok_or_else(|| parse_err(format!("entry {i}: cannot determine source type")))?;
        let payload = RawPayload::from_json_object(source, entry);
        let record = normalize(&payload, routing)
            .map_err(|e: RecordError| parse_err(format!("entry {i}: {e}")))?;
        if record.id.is_provisional() {
            provisional.push(record);
        } else {
            canonical.push(record);
        }
    }

    Ok(LoadedCatalog { catalog: Catalog::from_records(canonical)?, provisional })
}

//! Stable external keys and the collaborator seam that supplies them.
//!
//! Looking a record up in an archive's API is not this crate's job. The
//! resolver only consumes whatever a `StableKeySource` hands back and formats
//! the canonical id from it.

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::ReconError;
use crate::model::{FieldValue, ImageRecord, SourceFields, SourceType};

/// A source-specific stable key. Formats to exactly one canonical id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StableKey {
    /// Library of Congress catalog record number.
    LocRecord(String),
    /// Wikimedia Commons page id.
    WikiPage(String),
    /// Internet Archive item plus scan leaf.
    ArchiveLeaf { item_id: String, leaf: String },
}

impl StableKey {
    /// Parse a key as written in a key table. ONI keys are `<item_id>:<leaf>`.
    pub fn parse(source: SourceType, raw: &str) -> Option<Self> {
        let raw = raw.trim();
        match source {
            SourceType::Loc => is_number(raw).then(|| Self::LocRecord(raw.to_string())),
            SourceType::Wiki => is_number(raw).then(|| Self::WikiPage(raw.to_string())),
            SourceType::Oni => {
                let (item_id, leaf) = raw.rsplit_once(':')?;
                Self::archive_leaf(item_id, leaf)
            }
        }
    }

    pub fn archive_leaf(item_id: &str, leaf: &str) -> Option<Self> {
        let item_id = item_id.trim();
        let leaf = leaf.trim();
        if is_item_id(item_id) && is_number(leaf) {
            Some(Self::ArchiveLeaf { item_id: item_id.to_string(), leaf: leaf.to_string() })
        } else {
            None
        }
    }

    pub fn source_type(&self) -> SourceType {
        match self {
            Self::LocRecord(_) => SourceType::Loc,
            Self::WikiPage(_) => SourceType::Wiki,
            Self::ArchiveLeaf { .. } => SourceType::Oni,
        }
    }

    /// `loc_<n>`, `wiki_<n>` or `<item_id>_<leaf>`.
    pub fn canonical_id(&self) -> String {
        match self {
            Self::LocRecord(n) => format!("loc_{n}"),
            Self::WikiPage(n) => format!("wiki_{n}"),
            Self::ArchiveLeaf { item_id, leaf } => format!("{item_id}_{leaf}"),
        }
    }
}

fn is_number(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn is_item_id(s: &str) -> bool {
    !s.is_empty()
        && s.bytes().all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
        && !s.starts_with('.')
}

/// Supplies stable keys for provisional records.
pub trait StableKeySource {
    fn stable_key(&self, record: &ImageRecord) -> Option<StableKey>;
}

/// A source that knows nothing. Provisional records stay unresolved unless
/// their own payload carries a key.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoKeys;

impl StableKeySource for NoKeys {
    fn stable_key(&self, _record: &ImageRecord) -> Option<StableKey> {
        None
    }
}

/// Key carried by the payload itself. Only ONI scans have one: the archive
/// item id and leaf number the harvester scraped from the scan data.
pub fn payload_key(record: &ImageRecord) -> Option<StableKey> {
    match &record.fields {
        SourceFields::Oni {
            item_id: FieldValue::Known(item_id),
            leaf: FieldValue::Known(leaf),
            ..
        } => StableKey::archive_leaf(item_id, leaf),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Key table
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct KeyRow {
    source: String,
    key: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    title: String,
}

/// Pre-fetched stable keys, matched by URL first and then by exact title.
///
/// A title shared by more than one key in the table is ambiguous and never
/// matches; those records need a URL entry.
#[derive(Debug, Default, Clone)]
pub struct KeyTable {
    by_url: HashMap<(SourceType, String), StableKey>,
    by_title: HashMap<(SourceType, String), Option<StableKey>>,
}

impl KeyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_url.len() + self.by_title.values().filter(|k| k.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn insert(&mut self, key: StableKey, url: Option<&str>, title: Option<&str>) {
        let source = key.source_type();
        if let Some(url) = url.map(str::trim).filter(|u| !u.is_empty()) {
            self.by_url.insert((source, url.to_string()), key.clone());
        }
        if let Some(title) = title.filter(|t| !t.trim().is_empty()) {
            self.by_title
                .entry((source, title.to_string()))
                .and_modify(|existing| {
                    if existing.as_ref() != Some(&key) {
                        *existing = None;
                    }
                })
                .or_insert(Some(key));
        }
    }

    /// Load a `source,key,url,title` CSV. `url` or `title` may be blank but
    /// not both.
    pub fn from_csv(data: &str) -> Result<Self, ReconError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::Headers)
            .from_reader(data.as_bytes());

        let mut table = Self::new();
        for (i, row) in reader.deserialize::<KeyRow>().enumerate() {
            let line = i + 2;
            let row = row.map_err(|e| ReconError::KeyTable(format!("line {line}: {e}")))?;
            let source: SourceType = row
                .source
                .parse()
                .map_err(|e| ReconError::KeyTable(format!("line {line}: {e}")))?;
            let key = StableKey::parse(source, &row.key).ok_or_else(|| {
                ReconError::KeyTable(format!("line {line}: invalid {source} key '{}'", row.key))
            })?;
            if row.url.trim().is_empty() && row.title.trim().is_empty() {
                return Err(ReconError::KeyTable(format!(
                    "line {line}: key '{}' has neither url nor title",
                    row.key
                )));
            }
            table.insert(key, Some(&row.url), Some(&row.title));
        }
        Ok(table)
    }
}

impl StableKeySource for KeyTable {
    fn stable_key(&self, record: &ImageRecord) -> Option<StableKey> {
        let source = record.source_type();
        self.by_url
            .get(&(source, record.url.clone()))
            .cloned()
            .or_else(|| self.by_title.get(&(source, record.title.clone())).cloned().flatten())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RecordId;

    fn loc_record(title: &str, url: &str) -> ImageRecord {
        ImageRecord {
            id: RecordId::Provisional(SourceType::Loc),
            title: title.into(),
            url: url.into(),
            local_path: "img/loc/loc_unknown.jpg".into(),
            source: "Library of Congress".into(),
            fields: SourceFields::Loc { kind: FieldValue::Known("profile".into()) },
            extra: Default::default(),
        }
    }

    #[test]
    fn canonical_id_formats() {
        assert_eq!(StableKey::LocRecord("2023708114".into()).canonical_id(), "loc_2023708114");
        assert_eq!(StableKey::WikiPage("47040388".into()).canonical_id(), "wiki_47040388");
        assert_eq!(
            StableKey::parse(SourceType::Oni, "FM30-301956:25").unwrap().canonical_id(),
            "FM30-301956_25"
        );
    }

    #[test]
    fn rejects_malformed_keys() {
        assert_eq!(StableKey::parse(SourceType::Loc, "unknown"), None);
        assert_eq!(StableKey::parse(SourceType::Loc, ""), None);
        assert_eq!(StableKey::parse(SourceType::Oni, "ERIC_ED250052"), None);
        assert_eq!(StableKey::parse(SourceType::Oni, "../etc:10"), None);
    }

    #[test]
    fn url_match_beats_title_match() {
        let csv = "\
source,key,url,title
loc,2022646364,https://tile.loc.gov/a.jpg,Welder making boilers for a ship
loc,2022646369,,Welder making boilers for a ship
";
        let table = KeyTable::from_csv(csv).unwrap();
        let by_url = loc_record("Welder making boilers for a ship", "https://tile.loc.gov/a.jpg");
        assert_eq!(table.stable_key(&by_url), Some(StableKey::LocRecord("2022646364".into())));

        // Title is claimed by two keys, so a URL miss cannot fall back to it.
        let by_title = loc_record("Welder making boilers for a ship", "https://tile.loc.gov/b.jpg");
        assert_eq!(table.stable_key(&by_title), None);
    }

    #[test]
    fn unique_title_matches() {
        let csv = "source,key,url,title\nloc,2023708114,,The pie rat ship\n";
        let table = KeyTable::from_csv(csv).unwrap();
        let r = loc_record("The pie rat ship", "https://elsewhere");
        assert_eq!(table.stable_key(&r).unwrap().canonical_id(), "loc_2023708114");
    }

    #[test]
    fn bad_row_names_its_line() {
        let csv = "source,key,url,title\nloc,abc,https://x,\n";
        let err = KeyTable::from_csv(csv).unwrap_err();
        assert!(err.to_string().contains("line 2"), "{err}");
    }

    #[test]
    fn payload_key_only_for_complete_oni() {
        let mut r = loc_record("ONI Plate (Leaf 10)", "https://archive.org/download/X/page/n10.jpg");
        assert_eq!(payload_key(&r), None);
        r.fields = SourceFields::Oni {
            item_id: FieldValue::Known("ERIC_ED250052".into()),
            leaf: FieldValue::Known("10".into()),
            navy: FieldValue::Unknown,
            kind: FieldValue::Unknown,
        };
        assert_eq!(payload_key(&r).unwrap().canonical_id(), "ERIC_ED250052_10");
    }
}

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Source type
// ---------------------------------------------------------------------------

/// Technical source type. Drives subdirectory routing and id conventions;
/// distinct from the human-readable `source` label on each record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// Library of Congress.
    Loc,
    /// Wikimedia Commons.
    Wiki,
    /// Internet Archive ONI plate scans.
    Oni,
}

impl SourceType {
    pub const ALL: [SourceType; 3] = [Self::Loc, Self::Wiki, Self::Oni];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Loc => "loc",
            Self::Wiki => "wiki",
            Self::Oni => "oni",
        }
    }

    /// The placeholder id harvesters emit before a stable key is known.
    pub fn sentinel(&self) -> &'static str {
        match self {
            Self::Loc => "loc_unknown",
            Self::Wiki => "wiki_unknown",
            Self::Oni => "oni_unknown",
        }
    }

    pub fn default_subdir(&self) -> &'static str {
        self.as_str()
    }

    /// ONI records carry their archive item id as the label instead.
    pub fn default_label(&self) -> Option<&'static str> {
        match self {
            Self::Loc => Some("Library of Congress"),
            Self::Wiki => Some("Wikimedia Commons"),
            Self::Oni => None,
        }
    }

    /// Catalog keys this source's records model. Anything else on an entry is
    /// carried through untouched.
    pub fn record_keys(&self) -> &'static [&'static str] {
        match self {
            Self::Loc => &["id", "title", "url", "local_path", "source", "type"],
            Self::Wiki => &["id", "title", "url", "desc", "date", "source", "local_path"],
            Self::Oni => &["id", "item_id", "leaf", "url", "title", "source", "navy", "type", "local_path"],
        }
    }

    /// Whether `id` is any source type's provisional sentinel.
    pub fn is_sentinel(id: &str) -> bool {
        Self::ALL.iter().any(|s| s.sentinel() == id)
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "loc" => Ok(Self::Loc),
            "wiki" => Ok(Self::Wiki),
            "oni" => Ok(Self::Oni),
            other => Err(format!("unknown source type '{other}' (expected loc, wiki or oni)")),
        }
    }
}

// ---------------------------------------------------------------------------
// Optional field values
// ---------------------------------------------------------------------------

pub const UNKNOWN: &str = "Unknown";

/// A source-specific optional field. `Unknown` stands for an absent value and
/// serializes as `"Unknown"`; an empty string stays empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum FieldValue {
    Known(String),
    Empty,
    #[default]
    Unknown,
}

impl FieldValue {
    /// An absent value and the literal marker both map to `Unknown`.
    /// Anything else is kept verbatim, embedded markup included.
    pub fn from_raw(value: Option<&str>) -> Self {
        match value {
            None | Some(UNKNOWN) => Self::Unknown,
            Some("") => Self::Empty,
            Some(v) => Self::Known(v.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Known(v) => v,
            Self::Empty => "",
            Self::Unknown => UNKNOWN,
        }
    }

    pub fn known(&self) -> Option<&str> {
        match self {
            Self::Known(v) => Some(v),
            Self::Empty | Self::Unknown => None,
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Per-source optional fields, tagged by source type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceFields {
    Loc {
        kind: FieldValue,
    },
    Wiki {
        desc: FieldValue,
        date: FieldValue,
    },
    Oni {
        item_id: FieldValue,
        leaf: FieldValue,
        navy: FieldValue,
        kind: FieldValue,
    },
}

impl SourceFields {
    pub fn source_type(&self) -> SourceType {
        match self {
            Self::Loc { .. } => SourceType::Loc,
            Self::Wiki { .. } => SourceType::Wiki,
            Self::Oni { .. } => SourceType::Oni,
        }
    }

    /// Field names and values in external key order.
    pub fn entries(&self) -> Vec<(&'static str, &FieldValue)> {
        match self {
            Self::Loc { kind } => vec![("type", kind)],
            Self::Wiki { desc, date } => vec![("desc", desc), ("date", date)],
            Self::Oni { item_id, leaf, navy, kind } => vec![
                ("item_id", item_id),
                ("leaf", leaf),
                ("navy", navy),
                ("type", kind),
            ],
        }
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Two-state id lifecycle. A record starts `Provisional` when its harvester
/// could not determine a stable key, and becomes `Canonical` exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordId {
    Provisional(SourceType),
    Canonical(String),
}

impl RecordId {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Provisional(source) => source.sentinel(),
            Self::Canonical(id) => id,
        }
    }

    pub fn canonical(&self) -> Option<&str> {
        match self {
            Self::Canonical(id) => Some(id),
            Self::Provisional(_) => None,
        }
    }

    pub fn is_provisional(&self) -> bool {
        matches!(self, Self::Provisional(_))
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One raw harvester payload: a flat string map plus its declared source type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPayload {
    pub source: SourceType,
    pub fields: BTreeMap<String, String>,
    /// Keys outside `source.record_keys()`, with their original JSON values.
    pub extra: Map<String, Value>,
}

impl RawPayload {
    pub fn new(source: SourceType) -> Self {
        Self { source, fields: BTreeMap::new(), extra: Map::new() }
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.fields.insert(key.to_string(), value.to_string());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Build from a JSON object. Scalars are stringified, nulls are dropped.
    /// Unmodelled keys also keep their raw value, in entry order.
    pub fn from_json_object(source: SourceType, object: &Map<String, Value>) -> Self {
        let known = source.record_keys();
        let extra = object
            .iter()
            .filter(|(k, _)| !known.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Self { source, fields: Self::fields_from_json(object), extra }
    }

    pub fn fields_from_json(object: &Map<String, Value>) -> BTreeMap<String, String> {
        object
            .iter()
            .filter_map(|(k, v)| {
                let value = match v {
                    Value::Null => return None,
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                Some((k.clone(), value))
            })
            .collect()
    }
}

/// Pixel dimensions carried in a `#h=<int>&w=<int>` URL fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SizeHint {
    pub height: u32,
    pub width: u32,
}

/// The canonical catalog unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    pub id: RecordId,
    pub title: String,
    pub url: String,
    pub local_path: String,
    pub source: String,
    pub fields: SourceFields,
    /// Catalog keys the model does not know, written back after the known ones.
    pub extra: Map<String, Value>,
}

impl ImageRecord {
    pub fn source_type(&self) -> SourceType {
        self.fields.source_type()
    }

    /// Same underlying image: same source type and a shared title or URL.
    pub fn same_image(&self, title: &str, url: &str, source: SourceType) -> bool {
        self.source_type() == source && (self.title == title || self.url == url)
    }

    /// Names of the fields that differ from `newer`, ignoring `id` and
    /// `local_path`. A source type change is reported as all of its fields.
    /// Extra keys count only when `newer` carries them.
    pub fn changed_fields(&self, newer: &ImageRecord) -> Vec<String> {
        let mut changed = self.changed_known_fields(newer)
            .into_iter()
            .map(String::from)
            .collect::<Vec<_>>();
        for (key, value) in &newer.extra {
            if self.extra.get(key) != Some(value) {
                changed.push(key.clone());
            }
        }
        changed
    }

    fn changed_known_fields(&self, newer: &ImageRecord) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if self.title != newer.title {
            changed.push("title");
        }
        if self.url != newer.url {
            changed.push("url");
        }
        if self.source != newer.source {
            changed.push("source");
        }
        if self.source_type() != newer.source_type() {
            changed.extend(newer.fields.entries().into_iter().map(|(name, _)| name));
            return changed;
        }
        for ((name, old), (_, new)) in self.fields.entries().into_iter().zip(newer.fields.entries()) {
            if old != new {
                changed.push(name);
            }
        }
        changed
    }

    /// Take every field from `newer` except `id` and `local_path`. Extra keys
    /// `newer` lacks are kept from `self`.
    pub fn updated_from(&self, newer: &ImageRecord) -> ImageRecord {
        let mut extra = self.extra.clone();
        for (key, value) in &newer.extra {
            extra.insert(key.clone(), value.clone());
        }
        ImageRecord {
            id: self.id.clone(),
            local_path: self.local_path.clone(),
            title: newer.title.clone(),
            url: newer.url.clone(),
            source: newer.source.clone(),
            fields: newer.fields.clone(),
            extra,
        }
    }

    /// Parse the display-size fragment, if any. The stored URL is untouched.
    pub fn size_hint(&self) -> Option<SizeHint> {
        let (_, fragment) = self.url.split_once('#')?;
        let mut height = None;
        let mut width = None;
        for part in fragment.split('&') {
            match part.split_once('=') {
                Some(("h", v)) => height = v.parse().ok(),
                Some(("w", v)) => width = v.parse().ok(),
                _ => {}
            }
        }
        Some(SizeHint { height: height?, width: width? })
    }
}

impl Serialize for ImageRecord {
    /// Key order per source type matches the published catalog files, so an
    /// untouched record serializes to the same bytes it was read from.
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("id", self.id.as_str())?;
        match &self.fields {
            SourceFields::Loc { kind } => {
                map.serialize_entry("title", &self.title)?;
                map.serialize_entry("url", &self.url)?;
                map.serialize_entry("local_path", &self.local_path)?;
                map.serialize_entry("source", &self.source)?;
                map.serialize_entry("type", kind)?;
            }
            SourceFields::Wiki { desc, date } => {
                map.serialize_entry("title", &self.title)?;
                map.serialize_entry("url", &self.url)?;
                map.serialize_entry("desc", desc)?;
                map.serialize_entry("date", date)?;
                map.serialize_entry("source", &self.source)?;
                map.serialize_entry("local_path", &self.local_path)?;
            }
            SourceFields::Oni { item_id, leaf, navy, kind } => {
                map.serialize_entry("item_id", item_id)?;
                map.serialize_entry("leaf", leaf)?;
                map.serialize_entry("url", &self.url)?;
                map.serialize_entry("title", &self.title)?;
                map.serialize_entry("source", &self.source)?;
                map.serialize_entry("navy", navy)?;
                map.serialize_entry("type", kind)?;
                map.serialize_entry("local_path", &self.local_path)?;
            }
        }
        for (key, value) in &self.extra {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

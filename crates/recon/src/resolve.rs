use std::collections::{BTreeMap, HashMap};

use log::debug;

use crate::error::RecordError;
use crate::keys::{payload_key, StableKeySource};
use crate::model::{ImageRecord, RecordId, SourceType};
use crate::routing::Routing;

/// Title and URL of a canonical record, enough to tell logical images apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub title: String,
    pub url: String,
}

/// Canonical ids currently in the catalog, keyed by source type.
#[derive(Debug, Clone, Default)]
pub struct IdentityIndex {
    by_source: BTreeMap<SourceType, HashMap<String, Identity>>,
}

impl IdentityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source: SourceType, id: &str, title: &str, url: &str) {
        self.by_source.entry(source).or_default().insert(
            id.to_string(),
            Identity { title: title.to_string(), url: url.to_string() },
        );
    }

    /// Ids are unique across the whole catalog, not just within a source.
    pub fn lookup(&self, id: &str) -> Option<(SourceType, &Identity)> {
        self.by_source
            .iter()
            .find_map(|(source, ids)| ids.get(id).map(|identity| (*source, identity)))
    }
}

/// Confirms or assigns canonical ids.
pub struct Resolver<'a> {
    keys: &'a dyn StableKeySource,
    routing: &'a Routing,
}

impl<'a> Resolver<'a> {
    pub fn new(keys: &'a dyn StableKeySource, routing: &'a Routing) -> Self {
        Self { keys, routing }
    }

    /// Resolve one record against the catalog's current identities.
    ///
    /// The returned record is always canonical and its `local_path` is
    /// recomputed from the final id.
    pub fn resolve(&self, record: ImageRecord, index: &IdentityIndex) -> Result<ImageRecord, RecordError> {
        let source = record.source_type();

        let id = match &record.id {
            RecordId::Canonical(id) => id.clone(),
            RecordId::Provisional(_) => {
                let key = self
                    .keys
                    .stable_key(&record)
                    .filter(|k| k.source_type() == source)
                    .or_else(|| payload_key(&record))
                    .ok_or(RecordError::UnresolvedIdentity { source_type: source })?;
                let id = key.canonical_id();
                debug!("resolved provisional {source} record '{}' to {id}", record.title);
                id
            }
        };

        if let Some((held_by, existing)) = index.lookup(&id) {
            let same = held_by == source
                && (existing.title == record.title || existing.url == record.url);
            if !same {
                debug!("id {id} already held by '{}'", existing.title);
                return Err(RecordError::IdentityConflict {
                    existing_title: existing.title.clone(),
                    existing_url: existing.url.clone(),
                });
            }
        }

        let local_path = self.routing.local_path(source, &id);
        Ok(ImageRecord { id: RecordId::Canonical(id), local_path, ..record })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{KeyTable, NoKeys, StableKey};
    use crate::model::{FieldValue, SourceFields};

    fn record(source: SourceType, id: RecordId, title: &str, url: &str) -> ImageRecord {
        let fields = match source {
            SourceType::Loc => SourceFields::Loc { kind: FieldValue::Known("profile".into()) },
            SourceType::Wiki => SourceFields::Wiki { desc: FieldValue::Unknown, date: FieldValue::Unknown },
            SourceType::Oni => SourceFields::Oni {
                item_id: FieldValue::Known("FM30-301956".into()),
                leaf: FieldValue::Known("10".into()),
                navy: FieldValue::Unknown,
                kind: FieldValue::Known("profile".into()),
            },
        };
        ImageRecord {
            local_path: format!("img/{source}/{}.jpg", id.as_str()),
            id,
            title: title.into(),
            url: url.into(),
            source: "label".into(),
            fields,
            extra: Default::default(),
        }
    }

    #[test]
    fn provisional_without_key_is_unresolved() {
        let routing = Routing::default();
        let resolver = Resolver::new(&NoKeys, &routing);
        let r = record(SourceType::Loc, RecordId::Provisional(SourceType::Loc), "t", "u");
        let err = resolver.resolve(r, &IdentityIndex::new()).unwrap_err();
        assert_eq!(err, RecordError::UnresolvedIdentity { source_type: SourceType::Loc });
    }

    #[test]
    fn provisional_with_key_gets_canonical_id_and_path() {
        let routing = Routing::default();
        let mut table = KeyTable::new();
        table.insert(StableKey::LocRecord("2023708114".into()), Some("u"), None);
        let resolver = Resolver::new(&table, &routing);

        let r = record(SourceType::Loc, RecordId::Provisional(SourceType::Loc), "t", "u");
        let resolved = resolver.resolve(r, &IdentityIndex::new()).unwrap();
        assert_eq!(resolved.id, RecordId::Canonical("loc_2023708114".into()));
        assert_eq!(resolved.local_path, "img/loc/loc_2023708114.jpg");
    }

    #[test]
    fn oni_derives_key_from_payload() {
        let routing = Routing::default();
        let resolver = Resolver::new(&NoKeys, &routing);
        let r = record(SourceType::Oni, RecordId::Provisional(SourceType::Oni), "ONI Plate (Leaf 10)", "u");
        let resolved = resolver.resolve(r, &IdentityIndex::new()).unwrap();
        assert_eq!(resolved.id.as_str(), "FM30-301956_10");
        assert_eq!(resolved.local_path, "img/oni/FM30-301956_10.jpg");
    }

    #[test]
    fn canonical_collision_with_other_image_conflicts() {
        let routing = Routing::default();
        let resolver = Resolver::new(&NoKeys, &routing);
        let mut index = IdentityIndex::new();
        index.insert(SourceType::Wiki, "wiki_1", "Existing", "https://a");

        let r = record(SourceType::Wiki, RecordId::Canonical("wiki_1".into()), "Other", "https://b");
        let err = resolver.resolve(r, &index).unwrap_err();
        assert!(matches!(err, RecordError::IdentityConflict { ref existing_title, .. } if existing_title == "Existing"));
    }

    #[test]
    fn canonical_collision_across_sources_conflicts() {
        let routing = Routing::default();
        let resolver = Resolver::new(&NoKeys, &routing);
        let mut index = IdentityIndex::new();
        index.insert(SourceType::Loc, "x_1", "Same", "https://a");

        let r = record(SourceType::Oni, RecordId::Canonical("x_1".into()), "Same", "https://a");
        assert!(resolver.resolve(r, &index).is_err());
    }

    #[test]
    fn same_image_keeps_its_id() {
        let routing = Routing::default();
        let resolver = Resolver::new(&NoKeys, &routing);
        let mut index = IdentityIndex::new();
        index.insert(SourceType::Wiki, "wiki_1", "Title", "https://a");

        let r = record(SourceType::Wiki, RecordId::Canonical("wiki_1".into()), "Retitled", "https://a");
        let resolved = resolver.resolve(r, &index).unwrap();
        assert_eq!(resolved.id.as_str(), "wiki_1");
        assert_eq!(resolved.title, "Retitled");
    }

    #[test]
    fn wrong_source_key_is_ignored() {
        let routing = Routing::default();
        let mut table = KeyTable::new();
        table.insert(StableKey::WikiPage("5".into()), Some("u"), None);
        let resolver = Resolver::new(&table, &routing);
        let r = record(SourceType::Loc, RecordId::Provisional(SourceType::Loc), "t", "u");
        assert!(resolver.resolve(r, &IdentityIndex::new()).is_err());
    }
}

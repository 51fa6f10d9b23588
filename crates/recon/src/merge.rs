use std::collections::HashMap;

use log::debug;

use crate::catalog::Catalog;
use crate::error::RecordError;
use crate::model::ImageRecord;
use crate::report::{FieldUpdate, MergeReport, RecordOrigin};

/// A resolved record waiting to be merged, with its provenance for reporting.
#[derive(Debug, Clone)]
pub struct Staged {
    pub origin: RecordOrigin,
    pub record: ImageRecord,
}

impl Staged {
    pub fn new(origin: RecordOrigin, record: ImageRecord) -> Self {
        Self { origin, record }
    }
}

/// Merge an ordered batch into a copy of `catalog`.
pub fn merge(catalog: &Catalog, batch: Vec<Staged>) -> (Catalog, MergeReport) {
    let mut next = catalog.clone();
    let mut report = MergeReport::default();
    merge_into(&mut next, batch, &mut report);
    (next, report)
}

/// Merge an ordered batch in place.
///
/// Within the batch, a later record replaces any earlier one with the same
/// id or the same title + URL, and the earlier one is reported as a
/// collision. Against the catalog, ids and local paths never change once
/// stored; every other field takes the incoming value.
pub fn merge_into(catalog: &mut Catalog, batch: Vec<Staged>, report: &mut MergeReport) {
    for Staged { origin, record } in collapse(batch, report) {
        let id = record.id.as_str().to_string();

        let filed_elsewhere = catalog
            .find_by_image(&record.title, &record.url)
            .filter(|existing| existing.id.as_str() != id)
            .map(|existing| {
                if existing.source_type() == record.source_type() {
                    Ok(existing.id.as_str().to_string())
                } else {
                    Err(conflict(existing))
                }
            });
        match filed_elsewhere {
            Some(Ok(kept)) => {
                debug!("{id} is already filed as {kept}, folding into it");
                report.record_issue(origin, &record, RecordError::DuplicateCollision { kept: kept.clone() });
                apply_update(catalog, &kept, &record, report);
                continue;
            }
            Some(Err(error)) => {
                report.record_issue(origin, &record, error);
                continue;
            }
            None => {}
        }

        let stored = catalog.get(&id).map(|existing| {
            if existing.same_image(&record.title, &record.url, record.source_type()) {
                Ok(())
            } else {
                Err(conflict(existing))
            }
        });
        match stored {
            None => {
                debug!("insert {id}");
                catalog.push(record);
                report.inserted.push(id);
            }
            Some(Err(error)) => report.record_issue(origin, &record, error),
            Some(Ok(())) => apply_update(catalog, &id, &record, report),
        }
    }
}

fn conflict(existing: &ImageRecord) -> RecordError {
    RecordError::IdentityConflict {
        existing_title: existing.title.clone(),
        existing_url: existing.url.clone(),
    }
}

fn apply_update(catalog: &mut Catalog, id: &str, incoming: &ImageRecord, report: &mut MergeReport) {
    let Some(existing) = catalog.get(id) else {
        return;
    };
    let changed = existing.changed_fields(incoming);
    if changed.is_empty() {
        report.unchanged.push(id.to_string());
        return;
    }
    debug!("update {id}: {}", changed.join(", "));
    let updated = existing.updated_from(incoming);
    catalog.replace(id, updated);
    report.updated.push(FieldUpdate {
        id: id.to_string(),
        fields: changed,
    });
}

/// Collapse in-batch duplicates. Survivors keep the position of the record
/// that won, so the catalog's insertion order follows processing order.
fn collapse(batch: Vec<Staged>, report: &mut MergeReport) -> Vec<Staged> {
    let mut slots: Vec<Option<Staged>> = Vec::with_capacity(batch.len());
    let mut by_image: HashMap<(String, String), usize> = HashMap::new();
    let mut by_id: HashMap<String, usize> = HashMap::new();

    for staged in batch {
        let record = &staged.record;
        if record.id.is_provisional() {
            let error = RecordError::UnresolvedIdentity { source_type: record.source_type() };
            report.record_issue(staged.origin, &staged.record, error);
            continue;
        }

        let id = record.id.as_str().to_string();
        let image = (record.title.clone(), record.url.clone());

        let mut earlier: Vec<usize> = [by_image.get(&image), by_id.get(&id)]
            .into_iter()
            .flatten()
            .copied()
            .collect();
        earlier.sort_unstable();
        earlier.dedup();

        for slot in earlier {
            if let Some(prev) = slots[slot].take() {
                let prev_image = (prev.record.title.clone(), prev.record.url.clone());
                if by_image.get(&prev_image) == Some(&slot) {
                    by_image.remove(&prev_image);
                }
                if by_id.get(prev.record.id.as_str()) == Some(&slot) {
                    by_id.remove(prev.record.id.as_str());
                }
                debug!("{} at {} superseded by {id} at {}", prev.record.id, prev.origin, staged.origin);
                report.record_issue(
                    prev.origin,
                    &prev.record,
                    RecordError::DuplicateCollision { kept: id.clone() },
                );
            }
        }

        let slot = slots.len();
        by_image.insert(image, slot);
        by_id.insert(id, slot);
        slots.push(Some(staged));
    }

    slots.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldValue, RecordId, SourceFields, SourceType};

    fn loc(id: &str, title: &str, url: &str) -> ImageRecord {
        ImageRecord {
            id: RecordId::Canonical(id.into()),
            title: title.into(),
            url: url.into(),
            local_path: format!("img/loc/{id}.jpg"),
            source: "Library of Congress".into(),
            fields: SourceFields::Loc { kind: FieldValue::Known("profile".into()) },
            extra: Default::default(),
        }
    }

    fn staged(records: Vec<ImageRecord>) -> Vec<Staged> {
        records
            .into_iter()
            .enumerate()
            .map(|(i, r)| Staged::new(RecordOrigin::new("batch", i), r))
            .collect()
    }

    #[test]
    fn inserts_new_records_in_order() {
        let (catalog, report) = merge(
            &Catalog::new(),
            staged(vec![loc("loc_2", "b", "u2"), loc("loc_1", "a", "u1")]),
        );
        let ids: Vec<_> = catalog.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["loc_2", "loc_1"]);
        assert_eq!(report.inserted, vec!["loc_2", "loc_1"]);
        assert!(report.issues.is_empty());
    }

    #[test]
    fn merge_is_idempotent() {
        let batch = vec![loc("loc_1", "a", "u1"), loc("loc_2", "b", "u2"), loc("loc_3", "a", "u1")];
        let (once, _) = merge(&Catalog::new(), staged(batch.clone()));
        let (twice, second) = merge(&once, staged(batch));
        assert_eq!(once, twice);
        assert!(second.inserted.is_empty());
        assert!(second.updated.is_empty());
    }

    #[test]
    fn same_image_different_ids_collapse_to_one() {
        let (catalog, report) = merge(
            &Catalog::new(),
            staged(vec![loc("loc_1", "Welder", "u1"), loc("loc_9", "Welder", "u1")]),
        );
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.records()[0].id.as_str(), "loc_9");
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].id, "loc_1");
        assert_eq!(report.issues[0].error, RecordError::DuplicateCollision { kept: "loc_9".into() });
    }

    #[test]
    fn same_derived_id_later_wins() {
        let (catalog, report) = merge(
            &Catalog::new(),
            staged(vec![loc("loc_5", "first", "u1"), loc("loc_5", "second", "u2")]),
        );
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get("loc_5").unwrap().title, "second");
        assert_eq!(report.collisions().count(), 1);
        assert_eq!(report.issues[0].title, "first");
    }

    #[test]
    fn unchanged_reingest_is_noop() {
        let base = Catalog::from_records(vec![loc("loc_1", "a", "u1")]).unwrap();
        let (after, report) = merge(&base, staged(vec![loc("loc_1", "a", "u1")]));
        assert_eq!(after, base);
        assert_eq!(report.unchanged, vec!["loc_1"]);
        assert!(report.updated.is_empty());
    }

    #[test]
    fn newer_fields_win_but_id_and_path_stay() {
        let base = Catalog::from_records(vec![loc("loc_1", "Old", "u1")]).unwrap();
        let mut incoming = loc("loc_1", "New", "u1");
        incoming.local_path = "img/elsewhere.jpg".into();
        incoming.fields = SourceFields::Loc { kind: FieldValue::Known("plan".into()) };

        let (after, report) = merge(&base, staged(vec![incoming]));
        let r = after.get("loc_1").unwrap();
        assert_eq!(r.title, "New");
        assert_eq!(r.local_path, "img/loc/loc_1.jpg");
        assert_eq!(report.updated, vec![FieldUpdate { id: "loc_1".into(), fields: vec!["title".into(), "type".into()] }]);
    }

    #[test]
    fn curated_keys_outlive_harvester_updates() {
        let mut curated = loc("loc_1", "Old", "u1");
        curated.extra.insert("ship_type".into(), "battleship".into());
        let base = Catalog::from_records(vec![curated]).unwrap();

        let (after, report) = merge(&base, staged(vec![loc("loc_1", "New", "u1")]));
        let r = after.get("loc_1").unwrap();
        assert_eq!(r.title, "New");
        assert_eq!(r.extra["ship_type"], "battleship");
        assert_eq!(report.updated[0].fields, vec!["title"]);
    }

    #[test]
    fn conflicting_id_is_not_overwritten() {
        let base = Catalog::from_records(vec![loc("loc_1", "Ship", "u1")]).unwrap();
        let (after, report) = merge(&base, staged(vec![loc("loc_1", "Other", "u2")]));
        assert_eq!(after, base);
        assert!(matches!(report.issues[0].error, RecordError::IdentityConflict { .. }));
        assert!(report.has_rejections());
    }

    #[test]
    fn image_filed_under_other_id_folds_into_it() {
        let base = Catalog::from_records(vec![loc("loc_1", "Ship", "u1")]).unwrap();
        let (after, report) = merge(&base, staged(vec![loc("loc_2", "Ship", "u1")]));
        assert_eq!(after.len(), 1);
        assert!(after.get("loc_2").is_none());
        assert_eq!(report.issues[0].error, RecordError::DuplicateCollision { kept: "loc_1".into() });
        assert_eq!(report.unchanged, vec!["loc_1"]);
    }

    #[test]
    fn provisional_record_never_lands() {
        let mut r = loc("ignored", "t", "u");
        r.id = RecordId::Provisional(SourceType::Loc);
        let (after, report) = merge(&Catalog::new(), staged(vec![r]));
        assert!(after.is_empty());
        assert_eq!(
            report.issues[0].error,
            RecordError::UnresolvedIdentity { source_type: SourceType::Loc }
        );
    }
}

//! Raw harvester payload → uniform `ImageRecord`.

use crate::error::RecordError;
use crate::model::{FieldValue, ImageRecord, RawPayload, RecordId, SourceFields, SourceType};
use crate::routing::Routing;

/// Fields every source type must supply.
const REQUIRED: [&str; 2] = ["title", "url"];

/// Map one raw payload into an `ImageRecord`. Pure.
///
/// A missing or sentinel `id` becomes `RecordId::Provisional`; absent
/// optional fields become `FieldValue::Unknown`. A missing `local_path` is
/// filled from the routing rule so that provisional records share the
/// placeholder path their harvester would have written.
pub fn normalize(payload: &RawPayload, routing: &Routing) -> Result<ImageRecord, RecordError> {
    for field in REQUIRED {
        if payload.get(field).map_or(true, |v| v.trim().is_empty()) {
            return Err(RecordError::SchemaError { field: field.to_string() });
        }
    }
    let title = payload.get("title").unwrap_or_default().to_string();
    let url = payload.get("url").unwrap_or_default().trim().to_string();

    let source = payload.source;
    let id = match payload.get("id").map(str::trim) {
        None | Some("") => RecordId::Provisional(source),
        Some(id) if SourceType::is_sentinel(id) => RecordId::Provisional(source),
        Some(id) => RecordId::Canonical(id.to_string()),
    };

    let opt = |key: &str| FieldValue::from_raw(payload.get(key));
    let fields = match source {
        SourceType::Loc => SourceFields::Loc { kind: opt("type") },
        SourceType::Wiki => SourceFields::Wiki { desc: opt("desc"), date: opt("date") },
        SourceType::Oni => SourceFields::Oni {
            item_id: opt("item_id"),
            leaf: opt("leaf"),
            navy: opt("navy"),
            kind: opt("type"),
        },
    };

    let label = match payload.get("source").filter(|s| !s.trim().is_empty()) {
        Some(label) => label.to_string(),
        None => match (routing.label(source), &fields) {
            (Some(label), _) => label.to_string(),
            (None, SourceFields::Oni { item_id: FieldValue::Known(item), .. }) => item.clone(),
            (None, _) => source.as_str().to_string(),
        },
    };

    let local_path = match payload.get("local_path").filter(|p| !p.trim().is_empty()) {
        Some(path) => path.to_string(),
        None => routing.local_path(source, id.as_str()),
    };

    Ok(ImageRecord { id, title, url, local_path, source: label, fields, extra: payload.extra.clone() })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn routing() -> Routing {
        Routing::default()
    }

    #[test]
    fn loc_placeholder_is_provisional() {
        let p = RawPayload::new(SourceType::Loc)
            .with("id", "loc_unknown")
            .with("title", "The pie rat ship")
            .with("url", "https://tile.loc.gov/a.jpg#h=640&w=567")
            .with("local_path", "img/loc/loc_unknown.jpg")
            .with("source", "Library of Congress")
            .with("type", "profile");
        let r = normalize(&p, &routing()).unwrap();
        assert_eq!(r.id, RecordId::Provisional(SourceType::Loc));
        assert_eq!(r.local_path, "img/loc/loc_unknown.jpg");
        assert_eq!(r.fields, SourceFields::Loc { kind: FieldValue::Known("profile".into()) });
        assert_eq!(r.url, "https://tile.loc.gov/a.jpg#h=640&w=567");
    }

    #[test]
    fn missing_id_is_provisional_with_placeholder_path() {
        let p = RawPayload::new(SourceType::Wiki).with("title", "t").with("url", "u");
        let r = normalize(&p, &routing()).unwrap();
        assert!(r.id.is_provisional());
        assert_eq!(r.local_path, "img/wiki/wiki_unknown.jpg");
        assert_eq!(r.source, "Wikimedia Commons");
        assert_eq!(r.fields, SourceFields::Wiki { desc: FieldValue::Unknown, date: FieldValue::Unknown });
    }

    #[test]
    fn blank_title_is_schema_error() {
        let p = RawPayload::new(SourceType::Loc).with("title", "  ").with("url", "u");
        assert_eq!(
            normalize(&p, &routing()).unwrap_err(),
            RecordError::SchemaError { field: "title".into() }
        );
    }

    #[test]
    fn missing_url_is_schema_error() {
        let p = RawPayload::new(SourceType::Oni).with("title", "ONI Plate (Leaf 10)");
        assert_eq!(
            normalize(&p, &routing()).unwrap_err(),
            RecordError::SchemaError { field: "url".into() }
        );
    }

    #[test]
    fn oni_label_defaults_to_item_id() {
        let p = RawPayload::new(SourceType::Oni)
            .with("id", "ERIC_ED250052_10")
            .with("item_id", "ERIC_ED250052")
            .with("leaf", "10")
            .with("title", "ONI Plate (Leaf 10)")
            .with("url", "https://archive.org/download/ERIC_ED250052/page/n10.jpg");
        let r = normalize(&p, &routing()).unwrap();
        assert_eq!(r.source, "ERIC_ED250052");
        assert_eq!(r.id, RecordId::Canonical("ERIC_ED250052_10".into()));
        match r.fields {
            SourceFields::Oni { navy, kind, .. } => {
                assert_eq!(navy, FieldValue::Unknown);
                assert_eq!(kind, FieldValue::Unknown);
            }
            other => panic!("unexpected fields {other:?}"),
        }
    }

    #[test]
    fn unmodelled_keys_carry_through() {
        let entry = serde_json::json!({
            "id": "wiki_1",
            "title": "t",
            "url": "u",
            "date": "",
            "ship_type": "battleship",
            "era": null
        });
        let p = RawPayload::from_json_object(SourceType::Wiki, entry.as_object().unwrap());
        let r = normalize(&p, &routing()).unwrap();
        assert_eq!(r.extra.keys().collect::<Vec<_>>(), vec!["ship_type", "era"]);
        assert_eq!(r.extra["era"], serde_json::Value::Null);
        assert_eq!(r.fields, SourceFields::Wiki { desc: FieldValue::Unknown, date: FieldValue::Empty });
    }

    #[test]
    fn wiki_date_markup_survives() {
        let date = "1827<div style=\"display: none;\">date QS:P571,+1827-00-00T00:00:00Z/9</div>";
        let p = RawPayload::new(SourceType::Wiki)
            .with("id", "wiki_80554798")
            .with("title", "t")
            .with("url", "u")
            .with("date", date);
        let r = normalize(&p, &routing()).unwrap();
        match r.fields {
            SourceFields::Wiki { date: d, .. } => assert_eq!(d.as_str(), date),
            other => panic!("unexpected fields {other:?}"),
        }
    }
}

//! Concatenate per-harvester manifests into one master batch.
//!
//! Directory listing and file reads belong to the caller; this module only
//! decides which manifests take part and in what order.

use serde::Serialize;
use serde_json::Value;

/// File name suffix every harvester manifest carries.
pub const MANIFEST_SUFFIX: &str = "_manifest.json";

/// The collated output. Never read back as an input.
pub const MASTER_MANIFEST: &str = "master_manifest.json";

/// Whether `file_name` is a harvester manifest that should be collated.
pub fn is_manifest(file_name: &str) -> bool {
    file_name.ends_with(MANIFEST_SUFFIX) && file_name != MASTER_MANIFEST
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedManifest {
    pub file: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Collated {
    pub entries: Vec<Value>,
    /// Manifests that contributed entries, with their entry counts.
    pub included: Vec<(String, usize)>,
    pub skipped: Vec<SkippedManifest>,
}

/// Collate `(file_name, contents)` pairs in file name order.
///
/// A manifest that does not parse, or whose top level is not an array, is
/// skipped and reported; the rest still collate.
pub fn collate(mut manifests: Vec<(String, String)>) -> Collated {
    manifests.sort_by(|a, b| a.0.cmp(&b.0));

    let mut out = Collated::default();
    for (file, text) in manifests {
        if !is_manifest(&file) {
            continue;
        }
        match serde_json::from_str::<Value>(&text) {
            Ok(Value::Array(items)) => {
                log::info!("collating {file}: {} entries", items.len());
                out.included.push((file, items.len()));
                out.entries.extend(items);
            }
            Ok(_) => {
                log::warn!("{file} is not a list, skipping");
                out.skipped.push(SkippedManifest { file, reason: "top level is not an array".into() });
            }
            Err(e) => {
                log::warn!("failed to read {file}: {e}");
                out.skipped.push(SkippedManifest { file, reason: e.to_string() });
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(name: &str, text: &str) -> (String, String) {
        (name.to_string(), text.to_string())
    }

    #[test]
    fn concatenates_in_name_order() {
        let out = collate(vec![
            m("wiki_manifest.json", r#"[{"id": "wiki_1"}]"#),
            m("loc_manifest.json", r#"[{"id": "loc_unknown"}, {"id": "loc_unknown"}]"#),
        ]);
        assert_eq!(out.entries.len(), 3);
        assert_eq!(out.entries[0]["id"], "loc_unknown");
        assert_eq!(out.entries[2]["id"], "wiki_1");
        assert_eq!(out.included, vec![("loc_manifest.json".into(), 2), ("wiki_manifest.json".into(), 1)]);
    }

    #[test]
    fn master_and_unrelated_files_ignored() {
        let out = collate(vec![
            m("master_manifest.json", r#"[{"id": "stale"}]"#),
            m("notes.json", r#"[{"id": "x"}]"#),
            m("oni_manifest.json", "[]"),
        ]);
        assert!(out.entries.is_empty());
        assert_eq!(out.included.len(), 1);
        assert!(out.skipped.is_empty());
    }

    #[test]
    fn non_list_and_broken_manifests_are_skipped() {
        let out = collate(vec![
            m("a_manifest.json", r#"{"id": "x"}"#),
            m("b_manifest.json", "[{"),
            m("c_manifest.json", r#"[{"id": "ok"}]"#),
        ]);
        assert_eq!(out.entries.len(), 1);
        assert_eq!(out.skipped.len(), 2);
        assert_eq!(out.skipped[0].file, "a_manifest.json");
    }
}

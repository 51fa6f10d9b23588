use std::collections::BTreeMap;

use crate::model::SourceType;

/// Maps source types to storage subdirectories and provenance labels.
///
/// `local_path` is always `<image_root>/<subdir>/<id>.jpg`; nothing else in
/// the crate builds paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Routing {
    image_root: String,
    subdirs: BTreeMap<SourceType, String>,
    labels: BTreeMap<SourceType, String>,
}

impl Default for Routing {
    fn default() -> Self {
        Self::new("img")
    }
}

impl Routing {
    pub fn new(image_root: &str) -> Self {
        let subdirs = SourceType::ALL
            .iter()
            .map(|s| (*s, s.default_subdir().to_string()))
            .collect();
        let labels = SourceType::ALL
            .iter()
            .filter_map(|s| s.default_label().map(|l| (*s, l.to_string())))
            .collect();
        Self {
            image_root: image_root.trim_end_matches('/').to_string(),
            subdirs,
            labels,
        }
    }

    pub fn with_subdir(mut self, source: SourceType, subdir: &str) -> Self {
        self.subdirs.insert(source, subdir.trim_matches('/').to_string());
        self
    }

    pub fn with_label(mut self, source: SourceType, label: &str) -> Self {
        self.labels.insert(source, label.to_string());
        self
    }

    /// Directory the download collaborator must create for `source`.
    pub fn directory(&self, source: SourceType) -> String {
        let subdir = self
            .subdirs
            .get(&source)
            .map(String::as_str)
            .unwrap_or_else(|| source.default_subdir());
        if self.image_root.is_empty() {
            subdir.to_string()
        } else {
            format!("{}/{subdir}", self.image_root)
        }
    }

    pub fn local_path(&self, source: SourceType, id: &str) -> String {
        format!("{}/{id}.jpg", self.directory(source))
    }

    pub fn label(&self, source: SourceType) -> Option<&str> {
        self.labels.get(&source).map(String::as_str)
    }

    /// Infer the source type of an untagged catalog entry: storage directory
    /// first, then provenance label, then ONI-only fields.
    pub fn infer_source(&self, fields: &BTreeMap<String, String>) -> Option<SourceType> {
        if let Some(path) = fields.get("local_path") {
            for source in SourceType::ALL {
                let prefix = format!("{}/", self.directory(source));
                if path.starts_with(&prefix) {
                    return Some(source);
                }
            }
        }
        if let Some(label) = fields.get("source") {
            for source in SourceType::ALL {
                if self.label(source) == Some(label.as_str()) {
                    return Some(source);
                }
            }
        }
        if fields.contains_key("item_id") && fields.contains_key("leaf") {
            return Some(SourceType::Oni);
        }
        None
    }
}

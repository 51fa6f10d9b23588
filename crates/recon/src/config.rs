use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use serde::Deserialize;

use crate::error::ReconError;
use crate::model::SourceType;
use crate::routing::Routing;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// One reconciliation run, read from a `*.recon.toml` file.
///
/// Relative file paths resolve against the config file's directory.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReconConfig {
    pub name: String,
    /// Catalog to merge into (`.json`, or `.js` for the frontend module form).
    pub catalog: String,
    /// Where to write the merged catalog. Defaults to `catalog`.
    #[serde(default)]
    pub output: Option<String>,
    /// Start from an empty catalog when `catalog` does not exist yet.
    #[serde(default)]
    pub create_if_missing: bool,
    #[serde(default = "default_image_root")]
    pub image_root: String,
    /// `source,key,url,title` CSV of pre-fetched stable keys.
    #[serde(default)]
    pub keys: Option<String>,
    #[serde(default)]
    pub batches: Vec<BatchConfig>,
    #[serde(default)]
    pub sources: BTreeMap<SourceType, SourceConfig>,
}

fn default_image_root() -> String {
    "img".into()
}

// ---------------------------------------------------------------------------
// Batches + sources
// ---------------------------------------------------------------------------

/// A harvester manifest: a JSON array of flat records of one source type.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchConfig {
    pub source: SourceType,
    pub file: String,
}

/// Per-source overrides of the routing defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    #[serde(default)]
    pub subdir: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.name.trim().is_empty() {
            return Err(ReconError::ConfigValidation("name must not be empty".into()));
        }
        if self.catalog.trim().is_empty() {
            return Err(ReconError::ConfigValidation("catalog path must not be empty".into()));
        }

        if !is_relative_inside(&self.image_root) && !self.image_root.is_empty() {
            return Err(ReconError::ConfigValidation(format!(
                "image_root '{}' must be a relative path without '..'",
                self.image_root
            )));
        }

        // Subdirs must be single, distinct path segments
        let mut seen: BTreeMap<String, SourceType> = BTreeMap::new();
        for source in SourceType::ALL {
            let subdir = self.subdir(source);
            if subdir.is_empty() || subdir.contains('/') || subdir == "." || subdir == ".." {
                return Err(ReconError::ConfigValidation(format!(
                    "sources.{source}: subdir '{subdir}' must be a single directory name"
                )));
            }
            if let Some(other) = seen.insert(subdir.clone(), source) {
                return Err(ReconError::ConfigValidation(format!(
                    "sources.{source} and sources.{other} share subdir '{subdir}'"
                )));
            }
        }

        for (i, batch) in self.batches.iter().enumerate() {
            if batch.file.trim().is_empty() {
                return Err(ReconError::ConfigValidation(format!("batches[{i}]: file must not be empty")));
            }
        }

        Ok(())
    }

    fn subdir(&self, source: SourceType) -> String {
        self.sources
            .get(&source)
            .and_then(|s| s.subdir.as_deref())
            .unwrap_or_else(|| source.default_subdir())
            .trim_matches('/')
            .to_string()
    }

    pub fn routing(&self) -> Routing {
        let mut routing = Routing::new(&self.image_root);
        for source in SourceType::ALL {
            routing = routing.with_subdir(source, &self.subdir(source));
            if let Some(label) = self.sources.get(&source).and_then(|s| s.label.as_deref()) {
                routing = routing.with_label(source, label);
            }
        }
        routing
    }

    pub fn catalog_path(&self, base: &Path) -> PathBuf {
        base.join(&self.catalog)
    }

    pub fn output_path(&self, base: &Path) -> PathBuf {
        base.join(self.output.as_deref().unwrap_or(&self.catalog))
    }

    pub fn keys_path(&self, base: &Path) -> Option<PathBuf> {
        self.keys.as_ref().map(|k| base.join(k))
    }
}

fn is_relative_inside(path: &str) -> bool {
    Path::new(path)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
name = "Naval gallery nightly"
catalog = "data/images.js"
keys = "data/loc_keys.csv"

[[batches]]
source = "loc"
file = "data/loc_manifest.json"

[[batches]]
source = "oni"
file = "data/oni_manifest.json"
"#;

    #[test]
    fn parse_valid() {
        let config = ReconConfig::from_toml(VALID).unwrap();
        assert_eq!(config.name, "Naval gallery nightly");
        assert_eq!(config.image_root, "img");
        assert_eq!(config.batches.len(), 2);
        assert_eq!(config.batches[1].source, SourceType::Oni);
        assert!(!config.create_if_missing);
        assert_eq!(
            config.output_path(Path::new("/srv/gallery")),
            PathBuf::from("/srv/gallery/data/images.js")
        );
    }

    #[test]
    fn source_overrides_flow_into_routing() {
        let input = format!(
            r#"{VALID}
[sources.oni]
subdir = "ia"
label = "Internet Archive"
"#
        );
        let config = ReconConfig::from_toml(&input).unwrap();
        let routing = config.routing();
        assert_eq!(routing.local_path(SourceType::Oni, "X_1"), "img/ia/X_1.jpg");
        assert_eq!(routing.label(SourceType::Oni), Some("Internet Archive"));
        assert_eq!(routing.label(SourceType::Loc), Some("Library of Congress"));
    }

    #[test]
    fn reject_unknown_source() {
        let input = r#"
name = "Bad"
catalog = "c.json"

[[batches]]
source = "flickr"
file = "f.json"
"#;
        assert!(ReconConfig::from_toml(input).is_err());
    }

    #[test]
    fn reject_shared_subdir() {
        let input = r#"
name = "Bad"
catalog = "c.json"

[sources.wiki]
subdir = "loc"
"#;
        let err = ReconConfig::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("share subdir 'loc'"), "{err}");
    }

    #[test]
    fn reject_escaping_image_root() {
        let input = r#"
name = "Bad"
catalog = "c.json"
image_root = "../outside"
"#;
        let err = ReconConfig::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("image_root"));
    }

    #[test]
    fn reject_typo_field() {
        let input = r#"
name = "Bad"
catalogue = "c.json"
"#;
        assert!(matches!(ReconConfig::from_toml(input), Err(ReconError::ConfigParse(_))));
    }
}

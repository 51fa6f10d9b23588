use std::path::{Path, PathBuf};

use naval_gallery_recon::{ReconConfig, Routing};

use crate::CliError;

pub(crate) fn read_file(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|e| CliError::io(format!("cannot read {}: {e}", path.display())))
}

/// Write via a sibling `.tmp` file and rename, so a crash never leaves a
/// half-written catalog behind.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<(), CliError> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, contents)
        .map_err(|e| CliError::io(format!("cannot write {}: {e}", tmp.display())))?;
    std::fs::rename(&tmp, path)
        .map_err(|e| CliError::io(format!("failed to rename tmp to {}: {e}", path.display())))
}

/// Parse a config file; relative paths inside it resolve against its directory.
pub(crate) fn load_config(path: &Path) -> Result<(ReconConfig, PathBuf), CliError> {
    let text = read_file(path)?;
    let config = ReconConfig::from_toml(&text).map_err(CliError::recon)?;
    let base = path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
    Ok((config, base))
}

/// Routing from `--config` when given, otherwise the defaults under `image_root`.
pub(crate) fn routing_for(config: Option<&Path>, image_root: &str) -> Result<Routing, CliError> {
    match config {
        Some(path) => Ok(load_config(path)?.0.routing()),
        None => Ok(Routing::new(image_root)),
    }
}

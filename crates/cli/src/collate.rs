//! `ngallery collate`: merge harvester manifests into one master batch.

use std::path::PathBuf;

use naval_gallery_recon::collate::{collate, is_manifest, MASTER_MANIFEST};

use crate::exit_codes::EXIT_USAGE;
use crate::util::{read_file, write_atomic};
use crate::CliError;

pub fn cmd_collate(dir: PathBuf, output: Option<PathBuf>) -> Result<(), CliError> {
    if !dir.is_dir() {
        return Err(CliError::new(EXIT_USAGE, format!("{} is not a directory", dir.display())));
    }

    let entries = std::fs::read_dir(&dir)
        .map_err(|e| CliError::io(format!("cannot list {}: {e}", dir.display())))?;
    let mut manifests = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| CliError::io(format!("cannot list {}: {e}", dir.display())))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_manifest(&name) {
            manifests.push((name, read_file(&entry.path())?));
        }
    }

    let collated = collate(manifests);
    for (file, count) in &collated.included {
        eprintln!("  + {file}: {count} item(s)");
    }
    for skipped in &collated.skipped {
        eprintln!("  ! {}: {}", skipped.file, skipped.reason);
    }

    let out_path = output.unwrap_or_else(|| dir.join(MASTER_MANIFEST));
    let json = serde_json::to_string_pretty(&collated.entries)
        .map_err(|e| CliError::io(format!("JSON serialization error: {e}")))?;
    write_atomic(&out_path, &format!("{json}\n"))?;
    eprintln!("wrote {} ({} item(s))", out_path.display(), collated.entries.len());
    Ok(())
}

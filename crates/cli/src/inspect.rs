//! Read-only catalog commands: `check` and `downloads`.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use naval_gallery_recon::model::SizeHint;
use naval_gallery_recon::{load_catalog, LoadedCatalog, Routing};
use serde::Serialize;

use crate::exit_codes::EXIT_RECON_INVARIANT;
use crate::util::{read_file, routing_for};
use crate::CliError;

fn load(catalog: &Path, routing: &Routing) -> Result<LoadedCatalog, CliError> {
    let text = read_file(catalog)?;
    load_catalog(&text, &catalog.display().to_string(), routing).map_err(CliError::recon)
}

// ============================================================================
// check
// ============================================================================

#[derive(Serialize)]
struct CheckReport {
    catalog: String,
    records: usize,
    provisional: Vec<String>,
    violations: Vec<String>,
}

pub fn cmd_check(
    catalog: PathBuf,
    config: Option<PathBuf>,
    image_root: String,
    json: bool,
) -> Result<(), CliError> {
    let routing = routing_for(config.as_deref(), &image_root)?;
    let loaded = load(&catalog, &routing)?;

    let report = CheckReport {
        catalog: catalog.display().to_string(),
        records: loaded.catalog.len(),
        provisional: loaded
            .provisional
            .iter()
            .map(|r| format!("{} '{}' ({})", r.id, r.title, r.url))
            .collect(),
        violations: loaded.catalog.audit(&routing),
    };

    if json {
        let out = serde_json::to_string_pretty(&report)
            .map_err(|e| CliError::io(format!("JSON serialization error: {e}")))?;
        println!("{out}");
    } else {
        eprintln!("{}: {} canonical record(s)", report.catalog, report.records);
        for p in &report.provisional {
            eprintln!("  provisional: {p}");
        }
        for v in &report.violations {
            eprintln!("  violation: {v}");
        }
    }

    let problems = report.provisional.len() + report.violations.len();
    if problems > 0 {
        return Err(CliError::new(EXIT_RECON_INVARIANT, format!("{problems} problem(s) found"))
            .with_hint("provisional entries are replaced by `ngallery reconcile` once keys are available"));
    }
    Ok(())
}

// ============================================================================
// downloads
// ============================================================================

#[derive(Serialize)]
struct DownloadEntry<'a> {
    local_path: &'a str,
    url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<SizeHint>,
}

#[derive(Serialize)]
struct DownloadPlan<'a> {
    directories: BTreeSet<String>,
    files: Vec<DownloadEntry<'a>>,
}

pub fn cmd_downloads(
    catalog: PathBuf,
    config: Option<PathBuf>,
    image_root: String,
    json: bool,
) -> Result<(), CliError> {
    let routing = routing_for(config.as_deref(), &image_root)?;
    let loaded = load(&catalog, &routing)?;
    if !loaded.provisional.is_empty() {
        log::warn!("skipping {} provisional record(s) without a stable path", loaded.provisional.len());
    }

    let plan = DownloadPlan {
        directories: loaded.catalog.iter().map(|r| routing.directory(r.source_type())).collect(),
        files: loaded
            .catalog
            .iter()
            .map(|r| DownloadEntry { local_path: &r.local_path, url: &r.url, size: r.size_hint() })
            .collect(),
    };

    if json {
        let out = serde_json::to_string_pretty(&plan)
            .map_err(|e| CliError::io(format!("JSON serialization error: {e}")))?;
        println!("{out}");
    } else {
        for f in &plan.files {
            println!("{}\t{}", f.local_path, f.url);
        }
        eprintln!("{} file(s) across {} directory(ies)", plan.files.len(), plan.directories.len());
    }
    Ok(())
}

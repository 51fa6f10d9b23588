//! `ngallery reconcile` and `ngallery validate`.

use std::path::PathBuf;

use log::info;
use naval_gallery_recon::engine::{IngestBatch, ReconInput, ReconResult};
use naval_gallery_recon::{load_catalog, CatalogFormat, KeyTable, LoadedCatalog, NoKeys, StableKeySource};

use crate::exit_codes::{EXIT_REJECTED, EXIT_RECON_IO};
use crate::util::{load_config, read_file, write_atomic};
use crate::CliError;

pub fn cmd_reconcile(
    config_path: PathBuf,
    json_output: bool,
    report_file: Option<PathBuf>,
    dry_run: bool,
) -> Result<(), CliError> {
    let (config, base) = load_config(&config_path)?;
    let routing = config.routing();

    // Current catalog
    let catalog_path = config.catalog_path(&base);
    let catalog = if catalog_path.exists() {
        let text = read_file(&catalog_path)?;
        load_catalog(&text, &catalog_path.display().to_string(), &routing).map_err(CliError::recon)?
    } else if config.create_if_missing {
        info!("{} does not exist, starting from an empty catalog", catalog_path.display());
        LoadedCatalog::default()
    } else {
        return Err(CliError::new(EXIT_RECON_IO, format!("catalog {} not found", catalog_path.display()))
            .with_hint("set `create_if_missing = true` to start a new catalog"));
    };

    // Batches
    let mut batches = Vec::with_capacity(config.batches.len());
    for batch in &config.batches {
        let path = base.join(&batch.file);
        let text = read_file(&path)?;
        batches.push(IngestBatch::parse(&batch.file, batch.source, &text).map_err(CliError::recon)?);
    }

    // Stable keys
    let table = match config.keys_path(&base) {
        Some(path) => Some(KeyTable::from_csv(&read_file(&path)?).map_err(CliError::recon)?),
        None => None,
    };
    let keys: &dyn StableKeySource = match &table {
        Some(table) => table,
        None => &NoKeys,
    };

    let result = naval_gallery_recon::run(&config, ReconInput { catalog, batches }, keys)
        .map_err(CliError::recon)?;

    // Output
    let output_path = config.output_path(&base);
    if dry_run {
        eprintln!("dry run: {} not written", output_path.display());
    } else {
        let rendered = result
            .catalog
            .render(CatalogFormat::from_path(&output_path))
            .map_err(CliError::recon)?;
        write_atomic(&output_path, &rendered)?;
        eprintln!("wrote {} ({} records)", output_path.display(), result.catalog.len());
    }

    let json_str = serde_json::to_string_pretty(&result)
        .map_err(|e| CliError::io(format!("JSON serialization error: {e}")))?;

    if let Some(ref path) = report_file {
        write_atomic(path, &json_str)?;
        eprintln!("wrote {}", path.display());
    }

    if json_output {
        println!("{json_str}");
    } else {
        print_summary(&result);
    }

    if result.report.has_rejections() {
        return Err(CliError::new(
            EXIT_REJECTED,
            format!("{} record(s) rejected", result.summary.rejected),
        ));
    }
    Ok(())
}

/// Human summary to stderr.
fn print_summary(result: &ReconResult) {
    let s = &result.summary;
    eprintln!(
        "{}: {} inserted, {} updated, {} unchanged, {} superseded",
        result.meta.config_name, s.inserted, s.updated, s.unchanged, s.superseded,
    );
    for issue in &result.report.issues {
        let label = if issue.error.is_rejection() { "rejected" } else { "collapsed" };
        eprintln!("  {label} {} '{}': {}", issue.origin, issue.title, issue.error);
    }
    for violation in &result.audit {
        eprintln!("  warning: {violation}");
    }
}

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let (config, _) = load_config(&config_path)?;
    let keys = if config.keys.is_some() { "with" } else { "without" };
    eprintln!(
        "valid: '{}' merging {} batch(es) into {} {keys} a key table",
        config.name,
        config.batches.len(),
        config.catalog,
    );
    Ok(())
}

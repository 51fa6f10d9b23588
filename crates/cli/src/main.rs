// Naval gallery CLI - catalog reconciliation for the image gallery

mod collate;
mod exit_codes;
mod inspect;
mod reconcile;
mod util;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use exit_codes::{recon_exit_code, EXIT_RECON_IO, EXIT_SUCCESS};
use naval_gallery_recon::ReconError;

#[derive(Parser)]
#[command(name = "ngallery")]
#[command(about = "Reconcile harvested ship imagery into the gallery catalog")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge the configured harvester batches into the catalog
    #[command(after_help = "\
Examples:
  ngallery reconcile nightly.recon.toml
  ngallery reconcile nightly.recon.toml --json
  ngallery reconcile nightly.recon.toml --dry-run --report report.json

Exit codes:
  0  every record landed, collapsed or was unchanged
  1  catalog written, but some records were rejected
  3  invalid config      4  IO error
  5  malformed input     6  catalog invariant violated
  7  catalog could not be rendered")]
    Reconcile {
        /// Path to the .recon.toml config file
        config: PathBuf,

        /// Output the run report as JSON on stdout instead of a human summary
        #[arg(long)]
        json: bool,

        /// Write the run report to a file
        #[arg(long)]
        report: Option<PathBuf>,

        /// Reconcile and report without writing the catalog
        #[arg(long)]
        dry_run: bool,
    },

    /// Validate a recon config without running it
    #[command(after_help = "\
Examples:
  ngallery validate nightly.recon.toml")]
    Validate {
        /// Path to the .recon.toml config file
        config: PathBuf,
    },

    /// Audit a catalog file: provisional ids, duplicate ids, misrouted paths
    #[command(after_help = "\
Examples:
  ngallery check data/images.js
  ngallery check data/images.json --config nightly.recon.toml --json")]
    Check {
        /// Catalog file (.json or .js)
        catalog: PathBuf,

        /// Take image root and source subdirs from this config
        #[arg(long)]
        config: Option<PathBuf>,

        /// Image root when no config is given
        #[arg(long, default_value = "img")]
        image_root: String,

        /// Output findings as JSON
        #[arg(long)]
        json: bool,
    },

    /// Concatenate *_manifest.json files into master_manifest.json
    #[command(after_help = "\
Examples:
  ngallery collate data/
  ngallery collate data/ --output /tmp/master.json")]
    Collate {
        /// Directory holding the harvester manifests
        dir: PathBuf,

        /// Output file (default: <dir>/master_manifest.json)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// List the files the image downloader must fetch
    #[command(after_help = "\
Examples:
  ngallery downloads data/images.js
  ngallery downloads data/images.js --json > downloads.json")]
    Downloads {
        /// Catalog file (.json or .js)
        catalog: PathBuf,

        /// Take image root and source subdirs from this config
        #[arg(long)]
        config: Option<PathBuf>,

        /// Image root when no config is given
        #[arg(long, default_value = "img")]
        image_root: String,

        /// Output as JSON instead of tab-separated lines
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Reconcile { config, json, report, dry_run } => {
            reconcile::cmd_reconcile(config, json, report, dry_run)
        }
        Commands::Validate { config } => reconcile::cmd_validate(config),
        Commands::Check { catalog, config, image_root, json } => {
            inspect::cmd_check(catalog, config, image_root, json)
        }
        Commands::Collate { dir, output } => collate::cmd_collate(dir, output),
        Commands::Downloads { catalog, config, image_root, json } => {
            inspect::cmd_downloads(catalog, config, image_root, json)
        }
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::new(EXIT_RECON_IO, msg)
    }

    /// Engine error with its registry code and, where one helps, a hint.
    pub fn recon(err: ReconError) -> Self {
        let hint = match &err {
            ReconError::ConfigParse(_) => Some("run `ngallery validate <config>` for details".to_string()),
            ReconError::CatalogInvariant(_) => {
                Some("run `ngallery check <catalog>` to list every violation".to_string())
            }
            ReconError::KeyTable(_) => Some("key tables need the header `source,key,url,title`".to_string()),
            _ => None,
        };
        Self { code: recon_exit_code(&err), message: err.to_string(), hint }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

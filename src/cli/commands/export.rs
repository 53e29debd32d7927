//! Export command implementation

use std::collections::BTreeSet;
use std::path::PathBuf;

use tracing::{info, warn};

use crate::cli::error::CliError;
use crate::cli::output::format_dedup;
use crate::config::SdkConfig;
use crate::export::{ExportError, ManifestExporter, create_archive, remove_if_duplicate};

/// Options of the export command
#[derive(Debug, Clone, Default)]
pub struct ExportArgs {
    /// Output name (directory and archive base); defaults to a dated name
    pub output: Option<String>,
    pub collections: Vec<String>,
    pub no_compress: bool,
    pub no_dedup: bool,
    pub keep_temp: bool,
}

pub fn handle_export(args: ExportArgs, config: &SdkConfig) -> Result<(), CliError> {
    let name = args
        .output
        .clone()
        .unwrap_or_else(|| config.archive.dated_name());
    let output_dir = PathBuf::from(&name);

    let repo = super::connect(&config.repository)?;
    let filter: Option<BTreeSet<String>> =
        (!args.collections.is_empty()).then(|| args.collections.iter().cloned().collect());
    let manifest = ManifestExporter::new(&repo, Some(config.repository.api_url.clone()))
        .export(filter.as_ref())?;

    std::fs::create_dir_all(&output_dir).map_err(ExportError::from)?;
    let manifest_path = output_dir.join("manifest.json");
    manifest.save(&manifest_path)?;
    println!("Manifest written to: {}", manifest_path.display());
    println!(
        "Exported {} collections, {} folders, {} items, {} annotations",
        manifest.collections.len(),
        manifest.folders.len(),
        manifest.items.len(),
        manifest.annotations.len()
    );

    if args.no_compress {
        return Ok(());
    }

    let archive = create_archive(&output_dir, &name)?;
    println!("Archive created: {}", archive.display());

    if config.archive.dedup && !args.no_dedup {
        let outcome = remove_if_duplicate(&archive, &config.archive.glob_pattern())?;
        println!("{}", format_dedup(&outcome));
    }

    if !args.keep_temp {
        match std::fs::remove_dir_all(&output_dir) {
            Ok(()) => info!("Removed temporary directory: {}", output_dir.display()),
            Err(e) => warn!("Could not remove {}: {}", output_dir.display(), e),
        }
    }
    Ok(())
}

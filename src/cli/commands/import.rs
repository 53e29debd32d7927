//! Import command implementation

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::cli::error::CliError;
use crate::cli::output::{format_import_outcome, format_manifest_header, format_verification};
use crate::config::{ErrorPolicy, SdkConfig};
use crate::export::extract_archive;
use crate::import::{ManifestImporter, preview_import, verify_import};
use crate::models::{IdMap, Manifest};

/// Options of the import command
#[derive(Debug, Clone)]
pub struct ImportArgs {
    /// `.tar.gz` archive or a `manifest.json`
    pub input: PathBuf,
    pub dry_run: bool,
    /// Parent of the fresh directory archives are unpacked into (default:
    /// the system temp directory)
    pub extract_dir: Option<PathBuf>,
    pub keep_extracted: bool,
    pub skip_errors: bool,
    /// Where to write the id mapping (default: timestamped file name)
    pub mapping_file: Option<PathBuf>,
}

fn is_manifest_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "json")
}

pub fn handle_import(args: ImportArgs, config: &SdkConfig) -> Result<(), CliError> {
    if !args.input.exists() {
        return Err(CliError::FileNotFound(args.input));
    }

    let extracted = if is_manifest_file(&args.input) {
        None
    } else {
        let dest = args.extract_dir.clone().unwrap_or_else(std::env::temp_dir);
        Some(extract_archive(&args.input, &dest)?)
    };
    let manifest_path = extracted
        .as_ref()
        .map_or_else(|| args.input.clone(), |e| e.manifest_path().to_path_buf());
    info!("Loading manifest: {}", manifest_path.display());

    let result = run_import(&args, &manifest_path, config);

    if let Some(extracted) = extracted {
        if args.keep_extracted {
            let root = extracted.keep();
            println!("Extracted files kept in: {}", root.display());
        } else {
            let root = extracted.root().to_path_buf();
            match extracted.remove() {
                Ok(()) => info!("Removed: {}", root.display()),
                Err(e) => warn!("Could not remove {}: {}", root.display(), e),
            }
        }
    }
    result
}

fn run_import(args: &ImportArgs, manifest_path: &Path, config: &SdkConfig) -> Result<(), CliError> {
    let manifest = super::load_manifest(manifest_path)?;
    print!("{}", format_manifest_header(&manifest));
    println!();

    if args.dry_run {
        let outcome = preview_import(&manifest);
        print!("{}", format_import_outcome(&outcome, true));
        return Ok(());
    }

    let mut import_config = config.import.clone();
    if args.skip_errors {
        import_config = import_config.with_error_policy(ErrorPolicy::SkipEntity);
    }

    let mut repo = super::connect(&config.repository)?;
    let mapping_file = args
        .mapping_file
        .clone()
        .unwrap_or_else(|| PathBuf::from(IdMap::default_file_name()));

    match ManifestImporter::new(&mut repo, import_config).import(&manifest) {
        Ok(outcome) => {
            print!("{}", format_import_outcome(&outcome, false));
            report_mapping(&manifest, &outcome.id_map, &mapping_file)
        }
        Err(e) => {
            // Entities created before the failure still need an audit record
            let partial = e.partial_outcome();
            print!("{}", format_import_outcome(partial, false));
            if let Err(save_error) = report_mapping(&manifest, &partial.id_map, &mapping_file) {
                warn!("Could not save partial id mapping: {}", save_error);
            }
            Err(e.into())
        }
    }
}

fn report_mapping(manifest: &Manifest, id_map: &IdMap, mapping_file: &Path) -> Result<(), CliError> {
    println!();
    print!("{}", format_verification(&verify_import(manifest, id_map)));

    id_map.save(mapping_file)?;
    println!("\nID mappings saved to: {}", mapping_file.display());
    Ok(())
}

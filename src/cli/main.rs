use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use annotation_manifest_sdk::cli::CliError;
use annotation_manifest_sdk::cli::commands::export::{ExportArgs, handle_export};
use annotation_manifest_sdk::cli::commands::import::{ImportArgs, handle_import};
use annotation_manifest_sdk::cli::commands::{
    compare::handle_compare, dedup::handle_dedup, render::handle_render, report::handle_report,
    repository_config, subset::handle_subset, validate::handle_validate,
};
use annotation_manifest_sdk::config::SdkConfig;

/// annotation-cli - render annotation overlays and reconcile annotation exports
#[derive(Parser)]
#[command(name = "annotation-cli")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Connection options shared by commands that talk to a server
#[derive(clap::Args)]
struct ConnectionArgs {
    /// Girder API URL
    #[arg(short = 'u', long)]
    url: Option<String>,

    /// Girder API key
    #[arg(short = 'k', long)]
    api_key: Option<String>,

    /// Girder session token
    #[arg(short = 't', long)]
    token: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a manifest for referential-integrity problems
    Validate {
        manifest: PathBuf,
    },

    /// Compare the entity ids of two manifests
    Compare {
        first: PathBuf,
        second: PathBuf,
    },

    /// Extract a subset of a manifest
    Subset {
        manifest: PathBuf,

        /// Output manifest file
        #[arg(short, long)]
        output: PathBuf,

        /// Collection ids to keep
        #[arg(short, long, num_args = 1..)]
        collections: Vec<String>,

        /// Item ids to keep
        #[arg(short, long, num_args = 1..)]
        items: Vec<String>,

        /// Annotator names to keep
        #[arg(short, long, num_args = 1..)]
        users: Vec<String>,
    },

    /// Write a Markdown report about a manifest
    Report {
        manifest: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Render an annotation layer onto an image as JPEG
    Render {
        image: PathBuf,
        annotations: PathBuf,
        output: PathBuf,

        /// JPEG quality (1-100)
        #[arg(short, long)]
        quality: Option<u8>,

        /// Annotation layer to draw
        #[arg(long)]
        layer: Option<usize>,
    },

    /// Import an export archive or manifest into a server
    Import {
        /// `.tar.gz` archive or `manifest.json`
        input: PathBuf,

        #[command(flatten)]
        connection: ConnectionArgs,

        /// Show what would be imported without changing anything
        #[arg(long)]
        dry_run: bool,

        /// Directory to unpack archives under (a fresh subdirectory is
        /// created and removed afterwards)
        #[arg(long)]
        extract_dir: Option<PathBuf>,

        /// Keep the extracted files
        #[arg(long)]
        keep_extracted: bool,

        /// Count repository failures and continue instead of aborting
        #[arg(long)]
        skip_errors: bool,

        /// Where to save the id mapping
        #[arg(long)]
        mapping_file: Option<PathBuf>,
    },

    /// Export annotations from a server into a manifest archive
    Export {
        #[command(flatten)]
        connection: ConnectionArgs,

        /// Output name (default: dated backup name)
        #[arg(short, long)]
        output: Option<String>,

        /// Collection ids to export (default: all)
        #[arg(short, long, num_args = 1..)]
        collections: Vec<String>,

        /// Skip creating the compressed archive
        #[arg(long)]
        no_compress: bool,

        /// Skip duplicate detection and removal
        #[arg(long)]
        no_dedup: bool,

        /// Keep the export directory after archiving
        #[arg(long)]
        keep_temp: bool,
    },

    /// Remove an archive that is identical to the previous backup
    Dedup {
        archive: PathBuf,

        /// File-name glob of the backup series
        #[arg(long)]
        pattern: Option<String>,
    },
}

fn load_config(path: Option<&Path>) -> Result<SdkConfig> {
    match path {
        Some(path) => SdkConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Ok(SdkConfig::default()),
    }
}

fn run(command: Commands, mut config: SdkConfig) -> Result<(), CliError> {
    match command {
        Commands::Validate { manifest } => handle_validate(&manifest),
        Commands::Compare { first, second } => handle_compare(&first, &second),
        Commands::Subset {
            manifest,
            output,
            collections,
            items,
            users,
        } => handle_subset(&manifest, &output, collections, items, users),
        Commands::Report { manifest, output } => handle_report(&manifest, output.as_deref()),
        Commands::Render {
            image,
            annotations,
            output,
            quality,
            layer,
        } => {
            let mut render = config.render;
            if let Some(quality) = quality {
                render = render.with_quality(quality);
            }
            if let Some(layer) = layer {
                render = render.with_layer_index(layer);
            }
            handle_render(&image, &annotations, &output, render)
        }
        Commands::Import {
            input,
            connection,
            dry_run,
            extract_dir,
            keep_extracted,
            skip_errors,
            mapping_file,
        } => {
            config.repository = repository_config(
                &config.repository,
                connection.url,
                connection.api_key,
                connection.token,
            );
            let args = ImportArgs {
                input,
                dry_run,
                extract_dir,
                keep_extracted,
                skip_errors,
                mapping_file,
            };
            handle_import(args, &config)
        }
        Commands::Export {
            connection,
            output,
            collections,
            no_compress,
            no_dedup,
            keep_temp,
        } => {
            config.repository = repository_config(
                &config.repository,
                connection.url,
                connection.api_key,
                connection.token,
            );
            let args = ExportArgs {
                output,
                collections,
                no_compress,
                no_dedup,
                keep_temp,
            };
            handle_export(args, &config)
        }
        Commands::Dedup { archive, pattern } => {
            let pattern = pattern.unwrap_or_else(|| config.archive.glob_pattern());
            handle_dedup(&archive, &pattern)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .without_time()
        .init();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::from(2);
        }
    };

    match run(cli.command, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::ValidationFailed(_)) => ExitCode::from(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

//! CLI command implementations

pub mod compare;
pub mod dedup;
pub mod export;
pub mod import;
pub mod render;
pub mod report;
pub mod subset;
pub mod validate;

use std::path::Path;

use crate::cli::error::CliError;
use crate::config::RepositoryConfig;
use crate::models::Manifest;
use crate::repository::GirderRepository;

/// Load a manifest file, reporting a missing file as a usage error
pub(crate) fn load_manifest(path: &Path) -> Result<Manifest, CliError> {
    if !path.exists() {
        return Err(CliError::FileNotFound(path.to_path_buf()));
    }
    Ok(Manifest::load(path)?)
}

/// Connect to the configured Girder server
pub(crate) fn connect(config: &RepositoryConfig) -> Result<GirderRepository, CliError> {
    if config.api_key.is_none() && config.token.is_none() {
        return Err(CliError::InvalidArgument(
            "Either --api-key or --token must be provided".to_string(),
        ));
    }
    Ok(GirderRepository::from_config(config)?)
}

/// Apply command-line connection overrides on top of the file configuration
pub fn repository_config(
    base: &RepositoryConfig,
    url: Option<String>,
    api_key: Option<String>,
    token: Option<String>,
) -> RepositoryConfig {
    let mut config = base.clone();
    if let Some(url) = url {
        config = config.with_api_url(url);
    }
    if let Some(key) = api_key {
        config = config.with_api_key(key);
    }
    if let Some(token) = token {
        config = config.with_token(token);
    }
    config
}

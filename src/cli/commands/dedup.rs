//! Dedup command implementation

use std::path::Path;

use crate::cli::error::CliError;
use crate::cli::output::format_dedup;
use crate::export::remove_if_duplicate;

pub fn handle_dedup(archive: &Path, pattern: &str) -> Result<(), CliError> {
    if !archive.exists() {
        return Err(CliError::FileNotFound(archive.to_path_buf()));
    }
    let outcome = remove_if_duplicate(archive, pattern)?;
    println!("{}", format_dedup(&outcome));
    Ok(())
}

//! Validate command implementation

use std::path::Path;

use crate::cli::error::CliError;
use crate::cli::output::format_manifest_header;
use crate::validation::{ValidationSummary, validate};

/// Handle the validate command. Fails with `ValidationFailed` when issues
/// were found so the process exits non-zero.
pub fn handle_validate(input: &Path) -> Result<(), CliError> {
    let manifest = super::load_manifest(input)?;

    println!("=== Validating Export ===");
    print!("{}", format_manifest_header(&manifest));

    let summary = ValidationSummary::new(validate(&manifest));
    println!();
    print!("{}", summary);

    if summary.is_valid() {
        Ok(())
    } else {
        Err(CliError::ValidationFailed(summary.issues.len()))
    }
}

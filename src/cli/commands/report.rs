//! Report command implementation

use std::path::Path;

use crate::analysis::ManifestReport;
use crate::cli::error::CliError;

pub fn handle_report(input: &Path, output: Option<&Path>) -> Result<(), CliError> {
    let manifest = super::load_manifest(input)?;
    let markdown = ManifestReport::from_manifest(&manifest).to_markdown();

    match output {
        Some(path) => {
            std::fs::write(path, &markdown)?;
            println!("Report saved to: {}", path.display());
        }
        None => println!("{}", markdown),
    }
    Ok(())
}

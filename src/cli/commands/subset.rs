//! Subset command implementation

use std::path::Path;

use tracing::info;

use crate::analysis::{SubsetCounts, SubsetFilter, extract_subset};
use crate::cli::error::CliError;
use crate::cli::output::format_subset_counts;

pub fn handle_subset(
    input: &Path,
    output: &Path,
    collections: Vec<String>,
    items: Vec<String>,
    users: Vec<String>,
) -> Result<(), CliError> {
    let manifest = super::load_manifest(input)?;

    let filter = SubsetFilter::new()
        .with_collections(collections)
        .with_items(items)
        .with_annotators(users);
    let subset = extract_subset(&manifest, &filter);
    subset.save(output)?;
    info!("Subset written to {}", output.display());

    print!(
        "{}",
        format_subset_counts(&SubsetCounts::new(&manifest, &subset))
    );
    println!("Saved to: {}", output.display());
    Ok(())
}

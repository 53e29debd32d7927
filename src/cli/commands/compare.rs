//! Compare command implementation

use std::path::Path;

use crate::analysis::compare;
use crate::cli::error::CliError;
use crate::cli::output::format_diff;

pub fn handle_compare(first: &Path, second: &Path) -> Result<(), CliError> {
    let a = super::load_manifest(first)?;
    let b = super::load_manifest(second)?;

    println!("First:  {}", first.display());
    println!("Second: {}", second.display());
    print!("{}", format_diff(&compare(&a, &b)));
    Ok(())
}

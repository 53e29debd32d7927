//! Output formatting for CLI

use crate::analysis::{KeyDiff, ManifestDiff, SubsetCounts};
use crate::export::DedupOutcome;
use crate::import::{ImportOutcome, ImportVerification};
use crate::models::{EntityKind, Manifest};

/// Header lines describing a loaded manifest
pub fn format_manifest_header(manifest: &Manifest) -> String {
    let mut output = String::new();
    output.push_str(&format!(
        "Export date: {}\n",
        manifest.export_date.as_deref().unwrap_or("Unknown")
    ));
    output.push_str(&format!(
        "Source URL: {}\n",
        manifest.source_url.as_deref().unwrap_or("Unknown")
    ));
    output.push_str(&format!(
        "Collections: {}, Folders: {}, Items: {}, Annotations: {}\n",
        manifest.collections.len(),
        manifest.folders.len(),
        manifest.items.len(),
        manifest.annotations.len()
    ));
    output
}

fn format_key_diff(output: &mut String, label: &str, diff: &KeyDiff) {
    output.push_str(&format!("\n{}:\n", label));
    output.push_str(&format!("  Only in first: {}\n", diff.only_in_a.len()));
    output.push_str(&format!("  Only in second: {}\n", diff.only_in_b.len()));
    output.push_str(&format!("  In both: {}\n", diff.in_both.len()));
}

/// Comparison summary
pub fn format_diff(diff: &ManifestDiff) -> String {
    let mut output = String::from("=== Comparing Exports ===\n");
    format_key_diff(&mut output, "Collections", &diff.collections);
    format_key_diff(&mut output, "Folders", &diff.folders);
    format_key_diff(&mut output, "Items", &diff.items);
    format_key_diff(&mut output, "Annotations", &diff.annotations);
    if diff.is_identical() {
        output.push_str("\n✅ Exports contain the same entities\n");
    }
    output
}

/// "kept/total" lines for a subset
pub fn format_subset_counts(counts: &SubsetCounts) -> String {
    let line = |label: &str, (kept, total): (usize, usize)| format!("  {}: {}/{}\n", label, kept, total);
    let mut output = String::from("Subset created:\n");
    output.push_str(&line("Collections", counts.collections));
    output.push_str(&line("Folders", counts.folders));
    output.push_str(&line("Items", counts.items));
    output.push_str(&line("Annotations", counts.annotations));
    output
}

/// Statistics of an import run (or dry run)
pub fn format_import_outcome(outcome: &ImportOutcome, dry_run: bool) -> String {
    let mut output = String::new();
    if dry_run {
        output.push_str("=== DRY RUN - No changes will be made ===\n\nWould import:\n");
    } else {
        output.push_str("=== Import Statistics ===\n");
    }

    for kind in EntityKind::ALL {
        let stats = outcome.stats.get(kind);
        let mut label = kind.plural().to_string();
        label[..1].make_ascii_uppercase();
        output.push_str(&format!(
            "  {}: {} created, {} existing, {} unresolved, {} failed\n",
            label, stats.created, stats.existing, stats.unresolved, stats.failed
        ));
    }

    if outcome.cancelled {
        let done: Vec<&str> = outcome
            .completed_phases
            .iter()
            .map(|k| k.plural())
            .collect();
        output.push_str(&format!(
            "\n⚠️  Import cancelled after: {}\n",
            if done.is_empty() {
                "nothing".to_string()
            } else {
                done.join(", ")
            }
        ));
    }
    output
}

pub fn format_verification(verification: &ImportVerification) -> String {
    let mut output = String::from("=== Verifying Import ===\n");
    output.push_str(&verification.to_string());
    if verification.is_complete() {
        output.push_str("✅ Every entity is mapped\n");
    }
    output
}

pub fn format_dedup(outcome: &DedupOutcome) -> String {
    match outcome {
        DedupOutcome::NoPrevious => "No previous backup found for comparison.".to_string(),
        DedupOutcome::NotNewest { newest } => {
            format!("⚠️  Not the newest archive (newest is {})", newest.display())
        }
        DedupOutcome::Distinct => "✓ Backups are different. Keeping new backup.".to_string(),
        DedupOutcome::Removed { kept } => format!(
            "✓ Backups are identical. Removed redundant backup, keeping {}",
            kept.display()
        ),
    }
}

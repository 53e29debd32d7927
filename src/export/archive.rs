//! Backup archives
//!
//! Packs an export directory into `<name>.tar.gz`, unpacks archives for
//! import, and removes a new backup when it is byte-identical to the one
//! before it.

use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use sha2::{Digest, Sha256};
use tar::Archive;
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

const MANIFEST_FILE_NAME: &str = "manifest.json";

/// Errors packing or unpacking archives
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] glob::PatternError),

    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("No manifest.json found in {0}")]
    ManifestNotFound(PathBuf),
}

/// Result of [`remove_if_duplicate`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DedupOutcome {
    /// Fewer than two archives match the pattern
    NoPrevious,
    /// The archive is not the newest match, nothing was compared
    NotNewest { newest: PathBuf },
    /// The archive differs from the previous one and was kept
    Distinct,
    /// The archive was identical to `kept` and has been deleted
    Removed { kept: PathBuf },
}

/// Pack `dir` into `<archive_base>.tar.gz`, stored under the directory's
/// own name.
pub fn create_archive(
    dir: impl AsRef<Path>,
    archive_base: impl AsRef<Path>,
) -> Result<PathBuf, ArchiveError> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(ArchiveError::NotADirectory(dir.to_path_buf()));
    }
    let mut archive_path = archive_base.as_ref().as_os_str().to_owned();
    archive_path.push(".tar.gz");
    let archive_path = PathBuf::from(archive_path);

    let arcname = dir
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("export"));

    let file = File::create(&archive_path)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.append_dir_all(&arcname, dir)?;
    builder.into_inner()?.finish()?;

    let size = fs::metadata(&archive_path)?.len();
    info!(
        "Archive created: {} ({:.2} MB)",
        archive_path.display(),
        size as f64 / 1024.0 / 1024.0
    );
    Ok(archive_path)
}

/// An archive unpacked into its own fresh directory.
///
/// The directory is deleted when this value is dropped unless [`keep`] is
/// called.
///
/// [`keep`]: ExtractedArchive::keep
#[derive(Debug)]
pub struct ExtractedArchive {
    dir: TempDir,
    manifest_path: PathBuf,
}

impl ExtractedArchive {
    /// Directory holding the unpacked files
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// The manifest found inside the archive
    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    /// Leave the unpacked files on disk and return their directory
    pub fn keep(self) -> PathBuf {
        self.dir.keep()
    }

    /// Delete the unpacked files now, reporting failures
    pub fn remove(self) -> Result<(), ArchiveError> {
        Ok(self.dir.close()?)
    }
}

/// Unpack a `.tar.gz` archive into a new uniquely named directory under
/// `dest` and locate its manifest.
///
/// Only the new directory is searched, so files already present in `dest`
/// are never picked up or touched.
pub fn extract_archive(
    archive_path: impl AsRef<Path>,
    dest: impl AsRef<Path>,
) -> Result<ExtractedArchive, ArchiveError> {
    let archive_path = archive_path.as_ref();
    let dest = dest.as_ref();

    fs::create_dir_all(dest)?;
    let dir = tempfile::Builder::new()
        .prefix("extract-")
        .tempdir_in(dest)?;
    info!(
        "Extracting archive {} into {}",
        archive_path.display(),
        dir.path().display()
    );

    let file = File::open(archive_path)?;
    let mut archive = Archive::new(GzDecoder::new(BufReader::new(file)));
    archive.unpack(dir.path())?;

    let manifest_path = WalkDir::new(dir.path())
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Error accessing path: {}", e);
                None
            }
        })
        .find(|entry| {
            entry.file_type().is_file() && entry.file_name() == OsStr::new(MANIFEST_FILE_NAME)
        })
        .map(|entry| entry.into_path())
        .ok_or_else(|| ArchiveError::ManifestNotFound(archive_path.to_path_buf()))?;

    Ok(ExtractedArchive { dir, manifest_path })
}

/// SHA-256 hex digest of a file's contents
pub fn content_hash(path: impl AsRef<Path>) -> Result<String, ArchiveError> {
    let content = fs::read(path)?;
    Ok(format!("{:x}", Sha256::digest(&content)))
}

/// Whether two files have identical contents
pub fn is_duplicate(a: impl AsRef<Path>, b: impl AsRef<Path>) -> Result<bool, ArchiveError> {
    Ok(content_hash(a)? == content_hash(b)?)
}

/// Delete `new_archive` if it is identical to the previous backup.
///
/// `pattern` is a file-name glob resolved in the archive's directory. Matches
/// are sorted by name; `new_archive` must be the last of them and is compared
/// with the one before.
pub fn remove_if_duplicate(
    new_archive: impl AsRef<Path>,
    pattern: &str,
) -> Result<DedupOutcome, ArchiveError> {
    let new_archive = new_archive.as_ref();
    let dir = match new_archive.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let full_pattern = dir.join(pattern);

    let mut backups: Vec<PathBuf> = glob::glob(&full_pattern.to_string_lossy())?
        .filter_map(Result::ok)
        .collect();
    backups.sort();

    let [.., previous, newest] = backups.as_slice() else {
        info!("No previous backup found for comparison");
        return Ok(DedupOutcome::NoPrevious);
    };

    if !same_file(newest, new_archive) {
        warn!(
            "Expected {} to be the newest archive, found {}",
            new_archive.display(),
            newest.display()
        );
        return Ok(DedupOutcome::NotNewest {
            newest: newest.clone(),
        });
    }

    let new_hash = content_hash(newest)?;
    let previous_hash = content_hash(previous)?;
    debug!("New backup SHA-256:  {}", new_hash);
    debug!("Prev backup SHA-256: {}", previous_hash);

    if new_hash == previous_hash {
        fs::remove_file(newest)?;
        info!(
            "Backups are identical. Removed {}, keeping {}",
            newest.display(),
            previous.display()
        );
        Ok(DedupOutcome::Removed {
            kept: previous.clone(),
        })
    } else {
        info!("Backups are different. Keeping {}", newest.display());
        Ok(DedupOutcome::Distinct)
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn export_dir(root: &Path, content: &str) -> PathBuf {
        let dir = root.join("export");
        fs::create_dir_all(dir.join("nested")).unwrap();
        fs::write(dir.join(MANIFEST_FILE_NAME), content).unwrap();
        fs::write(dir.join("nested").join("note.txt"), "x").unwrap();
        dir
    }

    #[test]
    fn test_create_and_extract() {
        let temp = TempDir::new().unwrap();
        let dir = export_dir(temp.path(), "{}");

        let archive = create_archive(&dir, temp.path().join("Backup_2024_01_01")).unwrap();
        assert_eq!(archive.file_name().unwrap(), "Backup_2024_01_01.tar.gz");

        let out = temp.path().join("out");
        let extracted = extract_archive(&archive, &out).unwrap();
        let root = extracted.root().to_path_buf();
        assert!(root.starts_with(&out));
        assert_eq!(
            extracted.manifest_path(),
            root.join("export").join(MANIFEST_FILE_NAME)
        );
        assert_eq!(fs::read_to_string(extracted.manifest_path()).unwrap(), "{}");

        extracted.remove().unwrap();
        assert!(!root.exists());
        assert!(out.exists());
    }

    #[test]
    fn test_extract_ignores_existing_files_in_destination() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("out");
        let stale = out.join("A_backup");
        fs::create_dir_all(&stale).unwrap();
        fs::write(stale.join(MANIFEST_FILE_NAME), "STALE").unwrap();

        let source = temp.path().join("src");
        fs::create_dir_all(&source).unwrap();
        let dir = source.join("B_backup");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(MANIFEST_FILE_NAME), "NEW").unwrap();
        let archive = create_archive(&dir, temp.path().join("B_backup")).unwrap();

        let extracted = extract_archive(&archive, &out).unwrap();
        assert_eq!(fs::read_to_string(extracted.manifest_path()).unwrap(), "NEW");

        extracted.remove().unwrap();
        assert_eq!(
            fs::read_to_string(stale.join(MANIFEST_FILE_NAME)).unwrap(),
            "STALE"
        );
    }

    #[test]
    fn test_keep_extracted_files() {
        let temp = TempDir::new().unwrap();
        let dir = export_dir(temp.path(), "{}");
        let archive = create_archive(&dir, temp.path().join("a")).unwrap();

        let extracted = extract_archive(&archive, temp.path().join("out")).unwrap();
        let manifest = extracted.manifest_path().to_path_buf();
        let root = extracted.keep();
        assert!(manifest.starts_with(&root));
        assert!(manifest.exists());
    }

    #[test]
    fn test_extract_without_manifest() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("empty");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("other.json"), "{}").unwrap();
        let archive = create_archive(&dir, temp.path().join("a")).unwrap();

        let out = temp.path().join("out");
        assert!(matches!(
            extract_archive(&archive, &out),
            Err(ArchiveError::ManifestNotFound(_))
        ));
        // Nothing is left behind
        assert_eq!(fs::read_dir(&out).unwrap().count(), 0);
    }

    #[test]
    fn test_create_archive_requires_directory() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            create_archive(temp.path().join("missing"), temp.path().join("a")),
            Err(ArchiveError::NotADirectory(_))
        ));
    }

    #[test]
    fn test_dedup_outcomes() {
        let temp = TempDir::new().unwrap();
        let first = temp.path().join("Backup_2024_01_01.tar.gz");
        let second = temp.path().join("Backup_2024_01_02.tar.gz");
        let third = temp.path().join("Backup_2024_01_03.tar.gz");

        fs::write(&first, b"same").unwrap();
        assert_eq!(
            remove_if_duplicate(&first, "Backup_*.tar.gz").unwrap(),
            DedupOutcome::NoPrevious
        );

        fs::write(&second, b"same").unwrap();
        assert!(is_duplicate(&first, &second).unwrap());
        assert!(matches!(
            remove_if_duplicate(&first, "Backup_*.tar.gz").unwrap(),
            DedupOutcome::NotNewest { .. }
        ));
        assert!(matches!(
            remove_if_duplicate(&second, "Backup_*.tar.gz").unwrap(),
            DedupOutcome::Removed { .. }
        ));
        assert!(!second.exists());
        assert!(first.exists());

        fs::write(&third, b"different").unwrap();
        assert_eq!(
            remove_if_duplicate(&third, "Backup_*.tar.gz").unwrap(),
            DedupOutcome::Distinct
        );
        assert!(third.exists());
    }

    #[test]
    fn test_content_hash() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("f");
        fs::write(&path, b"abc").unwrap();
        assert_eq!(
            content_hash(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}

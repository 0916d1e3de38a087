//! Safety checks to prevent one file from overwriting another.
//!
//! Renames and moves never replace an existing file. The checks here run before
//! every rename/move and before a run starts.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;

use crate::error::FileError;

/// Validates that `target` can receive formatted files from `source`.
///
/// Checks:
/// - Target must exist and be a directory
/// - Target cannot be the source directory (files would be "moved" onto themselves)
pub fn validate_target_dir(source: &Path, target: &Path) -> Result<()> {
    if !target.exists() {
        bail!(
            "Safety check failed: target directory '{}' does not exist",
            target.display()
        );
    }
    if !target.is_dir() {
        bail!(
            "Safety check failed: target '{}' is not a directory",
            target.display()
        );
    }

    let source_abs = fs::canonicalize(source)
        .with_context(|| format!("Failed to resolve source directory {}", source.display()))?;
    let target_abs = fs::canonicalize(target)
        .with_context(|| format!("Failed to resolve target directory {}", target.display()))?;
    if source_abs == target_abs {
        bail!(
            "Safety check failed: target '{}' cannot be the same as source '{}'",
            target.display(),
            source.display()
        );
    }

    Ok(())
}

/// Checks that `dest` is free to receive `source`.
///
/// A destination that resolves to the source itself (e.g. a case-only rename on
/// a case-insensitive filesystem) counts as vacant.
pub fn ensure_vacant(dest: &Path, source: &Path) -> Result<(), FileError> {
    if dest == source || !dest.exists() {
        return Ok(());
    }
    match (fs::canonicalize(dest), fs::canonicalize(source)) {
        (Ok(d), Ok(s)) if d == s => Ok(()),
        _ => Err(FileError::AlreadyExists(dest.to_path_buf())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_target_dir() {
        let source = tempfile::tempdir().unwrap();
        let target = tempfile::tempdir().unwrap();
        assert!(validate_target_dir(source.path(), target.path()).is_ok());
    }

    #[test]
    fn test_missing_target_dir() {
        let source = tempfile::tempdir().unwrap();
        let result = validate_target_dir(source.path(), &source.path().join("nope"));
        assert!(result.unwrap_err().to_string().contains("does not exist"));
    }

    #[test]
    fn test_target_is_a_file() {
        let source = tempfile::tempdir().unwrap();
        let file = source.path().join("a.mp3");
        fs::write(&file, b"x").unwrap();
        let result = validate_target_dir(source.path(), &file);
        assert!(result.unwrap_err().to_string().contains("not a directory"));
    }

    #[test]
    fn test_target_equals_source() {
        let source = tempfile::tempdir().unwrap();
        let same = source.path().join(".");
        let result = validate_target_dir(source.path(), &same);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("cannot be the same as source"));
    }

    #[test]
    fn test_ensure_vacant() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.mp3");
        let b = dir.path().join("b.mp3");
        fs::write(&a, b"a").unwrap();

        assert!(ensure_vacant(&b, &a).is_ok());
        assert!(ensure_vacant(&a, &a).is_ok());

        fs::write(&b, b"b").unwrap();
        let err = ensure_vacant(&b, &a).unwrap_err();
        assert!(matches!(err, FileError::AlreadyExists(p) if p == b));
    }
}

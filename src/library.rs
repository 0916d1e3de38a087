//! Batch formatting of a music directory.
//!
//! A run has two phases:
//!
//! 1. **Plan** (parallel, no I/O): normalize each filename and derive its tags.
//! 2. **Apply** (sequential): write tags, rename in place, optionally move into
//!    the target directory.
//!
//! Applying sequentially means two files that canonicalize to the same name are
//! detected before either touches the disk; the second one is reported as
//! `AlreadyExists`. A file is only written to after its plan succeeded.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::Ruleset;
use crate::discovery::ArtistDiscoveryCollector;
use crate::error::{ApplyStep, FileError, FormatError, FormatErrorReason};
use crate::metadata::MetadataSynthesizer;
use crate::models::{BatchReport, FailedFile, FilePlan, FormattedFile};
use crate::normalize::FilenameNormalizer;
use crate::progress::PhaseProgress;
use crate::safety::ensure_vacant;
use crate::tags::TagWriter;

/// Leftovers from download sites: cover images and `.url` shortcuts.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif", "url", "webp"];

// ============================================================================
// SCANNING
// ============================================================================

/// Regular files directly inside `dir` with one of `extensions`
/// (case-insensitive), sorted by name.
fn scan_by_extension(dir: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        bail!("Source directory {} does not exist or is not a directory", dir.display());
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(false) {
        let entry = entry.with_context(|| format!("Failed to read directory {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
            .unwrap_or(false);
        if matches {
            files.push(path.to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}

/// Audio files directly inside `dir`. Subdirectories are not visited.
pub fn scan_mp3_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    scan_by_extension(dir, &[extension.trim_start_matches('.')])
}

/// Delete cover images and shortcuts left next to the audio files.
/// Returns the deleted (or, in dry-run mode, the matching) paths.
pub fn clean_images(dir: &Path, dry_run: bool) -> Result<Vec<PathBuf>> {
    let files = scan_by_extension(dir, IMAGE_EXTENSIONS)?;
    if !dry_run {
        for path in &files {
            fs::remove_file(path).with_context(|| format!("Failed to delete {}", path.display()))?;
            debug!(file = %path.display(), "deleted");
        }
    }
    info!(count = files.len(), dry_run, "cleaned images");
    Ok(files)
}

// ============================================================================
// CURATOR
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Move formatted files here. `None` renames them in place.
    pub target_dir: Option<PathBuf>,
    /// Plan and report without touching any file.
    pub dry_run: bool,
}

/// Formats files: normalizes names, writes tags, renames and moves.
pub struct Curator {
    normalizer: FilenameNormalizer,
    synthesizer: MetadataSynthesizer,
    tag_writer: Arc<dyn TagWriter>,
}

impl Curator {
    pub fn new(rules: Arc<Ruleset>, tag_writer: Arc<dyn TagWriter>) -> Self {
        Self {
            normalizer: FilenameNormalizer::new(Arc::clone(&rules)),
            synthesizer: MetadataSynthesizer::new(rules),
            tag_writer,
        }
    }

    pub fn rules(&self) -> &Ruleset {
        self.normalizer.rules()
    }

    /// Work out the canonical name and tags for one file without touching it.
    pub fn plan_file(&self, path: &Path) -> Result<FilePlan, FileError> {
        let name = match path.file_name() {
            Some(name) => name,
            None => {
                return Err(
                    FormatError::new(path.display().to_string(), FormatErrorReason::NoFileName).into(),
                )
            }
        };
        let name = name.to_str().ok_or_else(|| {
            FormatError::new(name.to_string_lossy(), FormatErrorReason::NotUtf8)
        })?;

        let discovered = ArtistDiscoveryCollector::new();
        let canonical = self.normalizer.normalize(name, &discovered)?;
        let metadata = self.synthesizer.synthesize(canonical.as_str())?;
        Ok(FilePlan {
            source: path.to_path_buf(),
            canonical,
            metadata,
            unresolved_artists: discovered.drain(),
        })
    }

    /// Format every file in `paths`. Failures are collected per file; the run
    /// itself never aborts.
    pub fn run(&self, paths: &[PathBuf], options: &RunOptions) -> BatchReport {
        let total = paths.len() as u64;

        // Phase 1: plan in parallel. collect() keeps input order.
        let progress = PhaseProgress::start("Planning", total);
        let plans: Vec<(&PathBuf, Result<FilePlan, FileError>)> = paths
            .par_iter()
            .map(|path| {
                let plan = self.plan_file(path);
                progress.tick();
                (path, plan)
            })
            .collect();
        progress.finish();

        // Phase 2: apply one by one.
        let progress = PhaseProgress::start("Applying", total);
        let discovery = ArtistDiscoveryCollector::new();
        let mut claimed = FxHashSet::default();
        let mut report = BatchReport::default();
        for (source, plan) in plans {
            let outcome = plan.and_then(|plan| {
                discovery.record_all(&plan.unresolved_artists);
                self.apply(&plan, options, &mut claimed)
            });
            match outcome {
                Ok(formatted) => {
                    info!(
                        from = %formatted.source.display(),
                        to = %formatted.destination.display(),
                        dry_run = options.dry_run,
                        "formatted"
                    );
                    report.formatted.push(formatted);
                }
                Err(error) => {
                    warn!(file = %source.display(), error = %error, "failed");
                    report.failed.push(FailedFile {
                        source: source.clone(),
                        error,
                    });
                }
            }
            progress.tick();
        }
        progress.finish();

        report.discovered_artists = discovery.drain();
        info!(
            formatted = report.formatted.len(),
            failed = report.failed.len(),
            discovered = report.discovered_artists.len(),
            "run complete"
        );
        report
    }

    fn apply(
        &self,
        plan: &FilePlan,
        options: &RunOptions,
        claimed: &mut FxHashSet<PathBuf>,
    ) -> Result<FormattedFile, FileError> {
        let source = &plan.source;
        let dir = source.parent().unwrap_or_else(|| Path::new("."));
        let renamed_path = dir.join(plan.canonical.as_str());
        let destination = match &options.target_dir {
            Some(target) => target.join(plan.canonical.as_str()),
            None => renamed_path.clone(),
        };

        ensure_vacant(&renamed_path, source)?;
        ensure_vacant(&destination, source)?;
        if !claimed.insert(destination.clone()) {
            return Err(FileError::AlreadyExists(destination));
        }

        let formatted = FormattedFile {
            source: source.clone(),
            renamed: renamed_path != *source,
            moved: options.target_dir.is_some(),
            destination,
        };
        if options.dry_run {
            return Ok(formatted);
        }

        // Tags go first so a tag failure leaves the file untouched. A failed
        // rename or move after that is reported with where the file ended up.
        self.tag_writer
            .write_tags(source, &plan.metadata.artist_field, &plan.metadata.title)
            .map_err(FileError::Tags)?;
        if formatted.renamed {
            fs::rename(source, &renamed_path).map_err(|e| FileError::Incomplete {
                step: ApplyStep::Rename,
                path: source.clone(),
                source: e,
            })?;
        }
        if formatted.moved {
            move_file(&renamed_path, &formatted.destination).map_err(|e| FileError::Incomplete {
                step: ApplyStep::Move,
                path: renamed_path.clone(),
                source: e,
            })?;
        }
        Ok(formatted)
    }
}

/// Rename, falling back to copy + remove across filesystems.
fn move_file(src: &Path, dst: &Path) -> std::io::Result<()> {
    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(e) => {
            debug!(from = %src.display(), to = %dst.display(), error = %e, "rename failed, copying");
            fs::copy(src, dst)?;
            fs::remove_file(src)
        }
    }
}

// ============================================================================
// REPORTING
// ============================================================================

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Numbered lists of formatted and failed files, then the totals.
pub fn print_report(report: &BatchReport) {
    if !report.formatted.is_empty() {
        println!("Formatted files:");
        for (i, file) in report.formatted.iter().enumerate() {
            println!(
                "{:>4}. {} -> {}",
                i + 1,
                display_name(&file.source),
                file.destination.display()
            );
        }
    }
    if !report.failed.is_empty() {
        println!("Failed files:");
        for (i, file) in report.failed.iter().enumerate() {
            println!("{:>4}. {}: {}", i + 1, display_name(&file.source), file.error);
        }
    }
    println!(
        "Formatted: {}, failed: {}",
        report.formatted.len(),
        report.failed.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingWriter {
        calls: Mutex<Vec<(String, String, String)>>,
    }

    impl TagWriter for RecordingWriter {
        fn write_tags(&self, path: &Path, artists: &str, title: &str) -> Result<()> {
            self.calls.lock().unwrap().push((
                display_name(path),
                artists.to_string(),
                title.to_string(),
            ));
            Ok(())
        }
    }

    struct FailingWriter;

    impl TagWriter for FailingWriter {
        fn write_tags(&self, _path: &Path, _artists: &str, _title: &str) -> Result<()> {
            bail!("disk on fire")
        }
    }

    fn curator(writer: Arc<dyn TagWriter>) -> Curator {
        Curator::new(Arc::new(Config::default().compile().unwrap()), writer)
    }

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, name.as_bytes()).unwrap();
        path
    }

    fn names_in(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_scan_is_flat_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "b.mp3");
        touch(dir.path(), "A.MP3");
        touch(dir.path(), "cover.jpg");
        fs::create_dir(dir.path().join("sub")).unwrap();
        touch(&dir.path().join("sub"), "c.mp3");

        let files = scan_mp3_files(dir.path(), "mp3").unwrap();
        let names: Vec<_> = files.iter().map(|p| display_name(p)).collect();
        assert_eq!(names, vec!["A.MP3", "b.mp3"]);
    }

    #[test]
    fn test_scan_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(scan_mp3_files(&dir.path().join("missing"), "mp3").is_err());
    }

    #[test]
    fn test_run_renames_in_place_and_writes_tags() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "Artist Name - Track Name.mp3");
        touch(dir.path(), "HXVRMXN.mp3");
        touch(dir.path(), "new guy x swerve - Song (MP3Ball.ru).MP3");

        let writer = Arc::new(RecordingWriter::default());
        let curator = curator(writer.clone());
        let files = scan_mp3_files(dir.path(), "mp3").unwrap();
        let report = curator.run(&files, &RunOptions::default());

        assert_eq!(report.formatted.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert!(report.has_failures());
        assert!(matches!(report.failed[0].error, FileError::Format(_)));
        assert_eq!(report.discovered_artists, vec!["Artist_Name", "new_guy"]);

        assert_eq!(
            names_in(dir.path()),
            vec![
                "Artist_Name_-_Track_Name.mp3",
                "HXVRMXN.mp3",
                "new_guy, $werve_-_Song.mp3",
            ]
        );
        let calls = writer.calls.lock().unwrap();
        assert_eq!(
            *calls,
            vec![
                (
                    "Artist Name - Track Name.mp3".to_string(),
                    "Artist Name".to_string(),
                    "Track Name".to_string()
                ),
                (
                    "new guy x swerve - Song (MP3Ball.ru).MP3".to_string(),
                    "new guy; $werve".to_string(),
                    "Song".to_string()
                ),
            ]
        );
    }

    #[test]
    fn test_run_moves_into_target() {
        let source = tempfile::tempdir().unwrap();
        let target = tempfile::tempdir().unwrap();
        touch(source.path(), "Kino - Gruppa krovi.mp3");
        touch(source.path(), "Kino_-_Kukushka.mp3");

        let curator = curator(Arc::new(RecordingWriter::default()));
        let files = scan_mp3_files(source.path(), "mp3").unwrap();
        let options = RunOptions {
            target_dir: Some(target.path().to_path_buf()),
            dry_run: false,
        };
        let report = curator.run(&files, &options);

        assert!(!report.has_failures());
        assert!(report.formatted.iter().all(|f| f.moved));
        assert!(!report.formatted[1].renamed);
        assert!(names_in(source.path()).is_empty());
        assert_eq!(
            names_in(target.path()),
            vec!["Kino_-_Gruppa_krovi.mp3", "Kino_-_Kukushka.mp3"]
        );
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "Artist Name - Track Name.mp3");

        let writer = Arc::new(RecordingWriter::default());
        let curator = curator(writer.clone());
        let files = scan_mp3_files(dir.path(), "mp3").unwrap();
        let options = RunOptions {
            target_dir: None,
            dry_run: true,
        };
        let report = curator.run(&files, &options);

        assert_eq!(report.formatted.len(), 1);
        assert!(report.formatted[0].renamed);
        assert_eq!(names_in(dir.path()), vec!["Artist Name - Track Name.mp3"]);
        assert!(writer.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_same_canonical_name_in_batch() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "A - B (MP3Ball.ru).mp3");
        touch(dir.path(), "A - B.mp3");

        let curator = curator(Arc::new(RecordingWriter::default()));
        let files = scan_mp3_files(dir.path(), "mp3").unwrap();
        let report = curator.run(&files, &RunOptions::default());

        assert_eq!(report.formatted.len(), 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(display_name(&report.failed[0].source), "A - B.mp3");
        assert!(matches!(report.failed[0].error, FileError::AlreadyExists(_)));
        assert_eq!(names_in(dir.path()), vec!["A - B.mp3", "A_-_B.mp3"]);
    }

    #[test]
    fn test_existing_destination_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "A - B.mp3");
        let existing = touch(dir.path(), "A_-_B.mp3");

        let curator = curator(Arc::new(RecordingWriter::default()));
        let files = scan_mp3_files(dir.path(), "mp3").unwrap();
        let report = curator.run(&files, &RunOptions::default());

        assert_eq!(report.failed.len(), 1);
        assert_eq!(display_name(&report.failed[0].source), "A - B.mp3");
        assert_eq!(report.formatted.len(), 1);
        assert!(!report.formatted[0].renamed);
        assert_eq!(fs::read(&existing).unwrap(), b"A_-_B.mp3");
    }

    #[test]
    fn test_tag_failure_leaves_file_alone() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "Artist Name - Track Name.mp3");

        let curator = curator(Arc::new(FailingWriter));
        let files = scan_mp3_files(dir.path(), "mp3").unwrap();
        let report = curator.run(&files, &RunOptions::default());

        assert!(matches!(report.failed[0].error, FileError::Tags(_)));
        assert_eq!(names_in(dir.path()), vec!["Artist Name - Track Name.mp3"]);
    }

    #[test]
    fn test_failed_move_reports_where_file_is() {
        let source = tempfile::tempdir().unwrap();
        let target = source.path().join("missing");
        touch(source.path(), "Artist Name - Track Name.mp3");

        let writer = Arc::new(RecordingWriter::default());
        let curator = curator(writer.clone());
        let files = scan_mp3_files(source.path(), "mp3").unwrap();
        let options = RunOptions {
            target_dir: Some(target),
            dry_run: false,
        };
        let report = curator.run(&files, &options);

        assert_eq!(report.failed.len(), 1);
        match &report.failed[0].error {
            FileError::Incomplete { step, path, .. } => {
                assert_eq!(*step, ApplyStep::Move);
                assert_eq!(display_name(path), "Artist_Name_-_Track_Name.mp3");
                assert!(path.exists());
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(writer.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_path_without_file_name() {
        let curator = curator(Arc::new(RecordingWriter::default()));
        match curator.plan_file(Path::new("music/..")) {
            Err(FileError::Format(e)) => assert_eq!(e.reason, FormatErrorReason::NoFileName),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_plan_file_is_pure() {
        let dir = tempfile::tempdir().unwrap();
        let path = touch(dir.path(), "boneles_s x SVARDSTAL - No Mercy.mp3");

        let curator = curator(Arc::new(RecordingWriter::default()));
        let plan = curator.plan_file(&path).unwrap();
        assert_eq!(plan.canonical.as_str(), "boneles_s, SVARDSTAL_-_No_Mercy.mp3");
        assert_eq!(plan.metadata.artist_field, "boneles_s; SVARDSTAL");
        assert_eq!(plan.unresolved_artists, vec!["boneles_s", "SVARDSTAL"]);
        assert!(path.exists());
    }

    #[test]
    fn test_clean_images() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "cover.JPG");
        touch(dir.path(), "folder.png");
        touch(dir.path(), "site.url");
        touch(dir.path(), "A_-_B.mp3");

        let matched = clean_images(dir.path(), true).unwrap();
        assert_eq!(matched.len(), 3);
        assert_eq!(names_in(dir.path()).len(), 4);

        let removed = clean_images(dir.path(), false).unwrap();
        assert_eq!(removed.len(), 3);
        assert_eq!(names_in(dir.path()), vec!["A_-_B.mp3"]);
    }
}

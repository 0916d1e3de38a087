//! Error types for the curation pipeline.
//!
//! `FormatError` is the only failure the pure core produces. `FileError` wraps it
//! together with the filesystem and tag failures of the batch runner, so every
//! failure stays scoped to one file.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Why a filename could not be brought into the canonical grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatErrorReason {
    #[error("filename is empty")]
    Empty,

    #[error("filename is not valid UTF-8")]
    NotUtf8,

    #[error("path has no file name")]
    NoFileName,

    #[error("missing artist/title separator \"{0}\"")]
    MissingSeparator(String),

    #[error("invalid filename format")]
    GrammarMismatch,

    #[error("corrected artist names break the filename format")]
    CorrectionBrokeGrammar,
}

/// A filename that failed normalization or metadata synthesis.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}: \"{input}\"")]
pub struct FormatError {
    /// The filename exactly as it was handed to the pipeline.
    pub input: String,
    pub reason: FormatErrorReason,
}

impl FormatError {
    pub fn new(input: impl Into<String>, reason: FormatErrorReason) -> Self {
        Self {
            input: input.into(),
            reason,
        }
    }
}

/// Per-file failure recorded by the batch runner.
#[derive(Debug, Error)]
pub enum FileError {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("file already exists: \"{}\"", .0.display())]
    AlreadyExists(PathBuf),

    #[error("failed to write tags: {0:#}")]
    Tags(anyhow::Error),

    /// The new tags are already in the file, but it could not be renamed or
    /// moved. `path` is where the file is now.
    #[error("tags were written but the {step} failed, file left at \"{}\": {source}", .path.display())]
    Incomplete {
        step: ApplyStep,
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Filesystem step after tag writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyStep {
    Rename,
    Move,
}

impl fmt::Display for ApplyStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ApplyStep::Rename => "rename",
            ApplyStep::Move => "move",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_error_message_names_input() {
        let err = FormatError::new(
            "HXVRMXN.mp3",
            FormatErrorReason::MissingSeparator("_-_".to_string()),
        );
        assert_eq!(
            err.to_string(),
            "missing artist/title separator \"_-_\": \"HXVRMXN.mp3\""
        );
    }

    #[test]
    fn test_incomplete_names_step_and_location() {
        let err = FileError::Incomplete {
            step: ApplyStep::Move,
            path: PathBuf::from("/music/A_-_B.mp3"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such directory"),
        };
        assert_eq!(
            err.to_string(),
            "tags were written but the move failed, file left at \"/music/A_-_B.mp3\": no such directory"
        );
    }

    #[test]
    fn test_file_error_wraps_format_error_transparently() {
        let err: FileError = FormatError::new("x.mp3", FormatErrorReason::GrammarMismatch).into();
        assert_eq!(err.to_string(), "invalid filename format: \"x.mp3\"");
    }
}

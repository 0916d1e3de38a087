//! Core data models for the curation pipeline.
//!
//! This module contains the value types passed between the normalizer, the
//! metadata synthesizer and the batch runner.

use std::fmt;
use std::path::PathBuf;

use crate::error::{FileError, FormatError, FormatErrorReason};
use crate::grammar::FilenameGrammar;

// ============================================================================
// Filenames
// ============================================================================

/// A filename that satisfies the canonical grammar.
///
/// Only the normalizer and `CanonicalFilename::parse` construct one, so holding
/// a value is proof the grammar check passed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalFilename(String);

impl CanonicalFilename {
    /// Wrap a string the caller has just validated.
    pub(crate) fn from_validated(name: String) -> Self {
        Self(name)
    }

    /// Accept `name` only if it is already canonical.
    pub fn parse(name: &str, grammar: &FilenameGrammar) -> Result<Self, FormatError> {
        if name.is_empty() {
            return Err(FormatError::new(name, FormatErrorReason::Empty));
        }
        if grammar.is_valid(name) {
            Ok(Self(name.to_string()))
        } else {
            Err(FormatError::new(name, FormatErrorReason::GrammarMismatch))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CanonicalFilename {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CanonicalFilename {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Metadata
// ============================================================================

/// Artist list and title derived from a canonical filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackMetadata {
    /// Artists in filename order, metadata form, case-insensitively unique.
    pub artists: Vec<String>,
    /// `artists` joined with the configured metadata delimiter.
    pub artist_field: String,
    pub title: String,
}

// ============================================================================
// Batch Models
// ============================================================================

/// Everything needed to apply one file's changes. Built without touching disk.
#[derive(Debug, Clone)]
pub struct FilePlan {
    pub source: PathBuf,
    pub canonical: CanonicalFilename,
    pub metadata: TrackMetadata,
    /// Artist tokens the correction map did not know.
    pub unresolved_artists: Vec<String>,
}

/// A file whose tags were written and whose name is now canonical.
#[derive(Debug, Clone)]
pub struct FormattedFile {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub renamed: bool,
    pub moved: bool,
}

#[derive(Debug)]
pub struct FailedFile {
    pub source: PathBuf,
    pub error: FileError,
}

/// Outcome of one run over a directory.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub formatted: Vec<FormattedFile>,
    pub failed: Vec<FailedFile>,
    /// Artist spellings not found in the correction map, first-seen order.
    pub discovered_artists: Vec<String>,
}

impl BatchReport {
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_only_canonical_names() {
        let grammar = FilenameGrammar::default();
        let name = CanonicalFilename::parse("Oneheart, reidenshi_-_snowfall.mp3", &grammar).unwrap();
        assert_eq!(name.as_str(), "Oneheart, reidenshi_-_snowfall.mp3");
        assert_eq!(name.to_string(), name.clone().into_string());

        let err = CanonicalFilename::parse("Oneheart - snowfall.mp3", &grammar).unwrap_err();
        assert_eq!(err.reason, FormatErrorReason::GrammarMismatch);
        let err = CanonicalFilename::parse("", &grammar).unwrap_err();
        assert_eq!(err.reason, FormatErrorReason::Empty);
    }
}

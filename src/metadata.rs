//! Artist and title tags derived from a canonical filename.

use std::sync::Arc;

use rustc_hash::FxHashSet;

use crate::config::Ruleset;
use crate::error::{FormatError, FormatErrorReason};
use crate::grammar::ARTIST_DELIMITER;
use crate::models::TrackMetadata;

/// Turns `ARTISTS_-_TITLE.mp3` into tag values.
#[derive(Debug, Clone)]
pub struct MetadataSynthesizer {
    rules: Arc<Ruleset>,
}

impl MetadataSynthesizer {
    pub fn new(rules: Arc<Ruleset>) -> Self {
        Self { rules }
    }

    /// Derive the artist list and the title.
    ///
    /// Underscores become spaces, except inside artists listed as underscore
    /// exceptions. Artists that differ only by case are reported once, with the
    /// casing of their first appearance.
    pub fn synthesize(&self, canonical: &str) -> Result<TrackMetadata, FormatError> {
        let grammar = &self.rules.grammar;
        // Re-checked so a name that bypassed the normalizer cannot produce tags.
        if canonical.is_empty() {
            return Err(FormatError::new(canonical, FormatErrorReason::Empty));
        }
        if !grammar.is_valid(canonical) {
            return Err(FormatError::new(canonical, FormatErrorReason::GrammarMismatch));
        }
        let (artist_segment, title_segment) = grammar
            .split(canonical)
            .ok_or_else(|| FormatError::new(canonical, FormatErrorReason::GrammarMismatch))?;

        let mut seen = FxHashSet::default();
        let mut artists = Vec::new();
        for token in artist_segment.split(ARTIST_DELIMITER) {
            let artist = self.artist_display(token);
            if seen.insert(artist.to_lowercase()) {
                artists.push(artist);
            }
        }

        Ok(TrackMetadata {
            artist_field: artists.join(&self.rules.metadata_delimiter),
            artists,
            title: title_segment.replace('_', " "),
        })
    }

    fn artist_display(&self, token: &str) -> String {
        if self.rules.underscore_exceptions.contains(token) {
            token.to_string()
        } else {
            token.replace('_', " ")
        }
    }
}

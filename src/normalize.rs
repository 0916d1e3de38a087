//! Filename normalization pipeline.
//!
//! A raw filename goes through six stages, always in this order:
//!
//! 1. character substitution
//! 2. ad removal
//! 3. whitespace/comma normalization
//! 4. artist separator unification
//! 5. grammar gate
//! 6. artist correction
//!
//! CRITICAL: the order matters. Ads are removed before spaces become underscores
//! (ad texts contain spaces), and separators are unified before the grammar gate
//! ("Artist Name - Track Name.mp3" is only valid after stages 3 and 4).

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::{NoExpand, Regex};
use rustc_hash::FxHashMap;
use tracing::debug;
use unicode_normalization::UnicodeNormalization;

use crate::config::{AdMatcher, Ruleset};
use crate::discovery::ArtistDiscoveryCollector;
use crate::error::{FormatError, FormatErrorReason};
use crate::grammar::{ARTIST_DELIMITER, SEPARATOR};
use crate::models::CanonicalFilename;

// ============================================================================
// REGEX PATTERNS
// ============================================================================

/// A comma with any underscores/whitespace around it: "lxst_cxntury__,Цой" → "lxst_cxntury, Цой"
pub static COMMA_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s_]*,[\s_]*").unwrap());

// ============================================================================
// STAGES
// ============================================================================

/// Stage 1: compose to NFC, then replace every mapped character.
pub fn substitute_characters(input: &str, substitutions: &FxHashMap<char, String>) -> String {
    let mut result = String::with_capacity(input.len());
    for c in input.nfc() {
        match substitutions.get(&c) {
            Some(replacement) => result.push_str(replacement),
            None => result.push(c),
        }
    }
    result
}

/// Stage 2: remove ads, trim, and drop the "_--_ " residue an ad leaves before
/// the extension. The extension itself comes out lowercase.
///
/// Removal repeats until no pattern matches, so text that only becomes an ad
/// after another ad was cut out ("(EE(EEMUSIC.ru)MUSIC.ru)") is removed too.
pub fn remove_ads(input: &str, ads: &[AdMatcher], residue: &Regex, extension: &str) -> String {
    let mut result = input.to_string();
    loop {
        let before = result.len();
        for ad in ads {
            if ad.is_match(&result) {
                result = ad.remove_all(&result);
            }
        }
        // Patterns never match the empty string, so no shrink means no match.
        if result.len() == before {
            break;
        }
    }
    residue
        .replace(result.trim(), NoExpand(extension))
        .into_owned()
}

/// Stage 3: spaces become underscores and every comma becomes ", ".
pub fn normalize_whitespace(input: &str) -> String {
    let underscored = input.replace(' ', "_");
    COMMA_RUN
        .replace_all(&underscored, ARTIST_DELIMITER)
        .into_owned()
}

/// Stage 4: replace alternate artist separators (`_x_`, `_feat._`, ...) with ", "
/// in the artist segment. Returns None if the artist/title separator is missing.
///
/// A separator next to extra underscores leaves "_, " behind, and one at either
/// end of the list leaves an empty entry. Both are cleaned up here, otherwise a
/// second pass through stage 3 would change the name again.
pub fn unify_separators(input: &str, separators: &[String]) -> Option<String> {
    let (artists, rest) = input.split_once(SEPARATOR)?;
    let mut artists = artists.to_string();
    for separator in separators {
        if artists.contains(separator.as_str()) {
            artists = artists.replace(separator.as_str(), ARTIST_DELIMITER);
        }
    }
    let collapsed = COMMA_RUN.replace_all(&artists, ARTIST_DELIMITER);
    let artists = collapsed
        .split(ARTIST_DELIMITER)
        .filter(|token| !token.is_empty())
        .collect::<Vec<_>>()
        .join(ARTIST_DELIMITER);
    Some(format!("{artists}{SEPARATOR}{rest}"))
}

/// Stage 6: replace known alternate spellings with their canonical form.
/// Returns the corrected artist segment and the tokens the map did not know.
pub fn correct_artists(artists: &str, rules: &Ruleset) -> (String, Vec<String>) {
    let mut unresolved = Vec::new();
    let corrected: Vec<&str> = artists
        .split(ARTIST_DELIMITER)
        .map(|token| match rules.correct_artist(token) {
            Some(canonical) => canonical,
            None => {
                unresolved.push(token.to_string());
                token
            }
        })
        .collect();
    (corrected.join(ARTIST_DELIMITER), unresolved)
}

// ============================================================================
// NORMALIZER
// ============================================================================

/// Turns raw downloaded filenames into canonical ones.
#[derive(Debug, Clone)]
pub struct FilenameNormalizer {
    rules: Arc<Ruleset>,
}

impl FilenameNormalizer {
    pub fn new(rules: Arc<Ruleset>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &Ruleset {
        &self.rules
    }

    /// Run every stage on `raw`.
    ///
    /// Artist tokens missing from the correction map are recorded in
    /// `discovered`, but only when the whole pipeline succeeds.
    pub fn normalize(
        &self,
        raw: &str,
        discovered: &ArtistDiscoveryCollector,
    ) -> Result<CanonicalFilename, FormatError> {
        let fail = |reason: FormatErrorReason| FormatError::new(raw, reason);
        if raw.is_empty() {
            return Err(fail(FormatErrorReason::Empty));
        }
        let rules = &*self.rules;
        let grammar = &rules.grammar;

        let substituted = substitute_characters(raw, &rules.substitutions);
        let stripped = remove_ads(
            &substituted,
            &rules.ad_patterns,
            &rules.ad_residue,
            grammar.extension(),
        );
        let spaced = normalize_whitespace(&stripped);
        debug!(raw, stripped = %stripped, spaced = %spaced, "normalized whitespace");

        let unified = unify_separators(&spaced, &rules.separators)
            .ok_or_else(|| fail(FormatErrorReason::MissingSeparator(SEPARATOR.to_string())))?;

        if !grammar.is_valid(&unified) {
            debug!(raw, unified = %unified, "grammar gate rejected");
            return Err(fail(FormatErrorReason::GrammarMismatch));
        }
        let (artists, title) = grammar
            .split(&unified)
            .ok_or_else(|| fail(FormatErrorReason::GrammarMismatch))?;

        let (corrected, unresolved) = correct_artists(artists, rules);
        let result = grammar.join(&corrected, title);
        if !grammar.is_valid(&result) {
            return Err(fail(FormatErrorReason::CorrectionBrokeGrammar));
        }

        discovered.record_all(&unresolved);
        Ok(CanonicalFilename::from_validated(result))
    }
}

// ============================================================================
// TESTS
// ============================================================================

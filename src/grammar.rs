//! The canonical filename grammar.
//!
//! A canonical filename is `ARTISTS _-_ TITLE .EXT`:
//!
//! | part      | shape                     |
//! |-----------|---------------------------|
//! | `ARTISTS` | `A (", " A)*`, `A = W* (L or Nd) W*` |
//! | `TITLE`   | `T+ (" " T+)*`, `T = W ,` |
//! | `EXT`     | configured, case-sensitive |
//!
//! where a word character `W` is any letter of any script (`\p{L}`, plus
//! combining marks `\p{M}` for decomposed accents), any decimal digit (`\p{Nd}`)
//! or one of `( ) - _ . ! ' $`. Every artist needs at least one letter or digit,
//! so a leftover run of underscores is never taken for an artist.
//!
//! The artist/title split is always the FIRST occurrence of the separator. The
//! normalizer and the metadata synthesizer split the same way, so all three agree
//! on which part is the artist list.

use once_cell::sync::Lazy;
use regex::Regex;

/// Fixed token between the artist segment and the title segment.
pub const SEPARATOR: &str = "_-_";

/// Delimiter between artists inside the artist segment.
pub const ARTIST_DELIMITER: &str = ", ";

/// Default file extension, without the dot.
pub const DEFAULT_EXTENSION: &str = "mp3";

/// Artist segment: one or more artists joined by ", ", each with a letter or digit.
static ARTISTS: Lazy<Regex> = Lazy::new(|| {
    let artist = r"[\p{L}\p{M}\p{Nd}()\-_.!$']*[\p{L}\p{Nd}][\p{L}\p{M}\p{Nd}()\-_.!$']*";
    Regex::new(&format!("^{artist}(?:, {artist})*$")).unwrap()
});

/// Title segment: word characters and commas, single inner spaces only.
static TITLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\p{L}\p{M}\p{Nd}()\-_.!$',]+(?: [\p{L}\p{M}\p{Nd}()\-_.!$',]+)*$").unwrap()
});

/// Compiled filename grammar for one extension.
#[derive(Debug, Clone)]
pub struct FilenameGrammar {
    /// Extension including the leading dot, e.g. `.mp3`.
    extension: String,
}

impl FilenameGrammar {
    pub fn new(extension: &str) -> Self {
        Self {
            extension: format!(".{}", extension.trim_start_matches('.')),
        }
    }

    /// True if `filename` is canonical. Total over any input.
    pub fn is_valid(&self, filename: &str) -> bool {
        match self.split(filename) {
            Some((artists, title)) => ARTISTS.is_match(artists) && TITLE.is_match(title),
            None => false,
        }
    }

    pub fn separator(&self) -> &'static str {
        SEPARATOR
    }

    /// Extension with its leading dot.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn strip_extension<'a>(&self, filename: &'a str) -> Option<&'a str> {
        filename.strip_suffix(self.extension.as_str())
    }

    /// Split a filename into (artist segment, title segment) at the first separator.
    /// Returns None if the extension or the separator is missing.
    pub fn split<'a>(&self, filename: &'a str) -> Option<(&'a str, &'a str)> {
        self.strip_extension(filename)?.split_once(SEPARATOR)
    }

    /// Join an artist segment and a title segment back into a filename.
    pub fn join(&self, artists: &str, title: &str) -> String {
        format!("{artists}{SEPARATOR}{title}{}", self.extension)
    }
}

impl Default for FilenameGrammar {
    fn default() -> Self {
        Self::new(DEFAULT_EXTENSION)
    }
}

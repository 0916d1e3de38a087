//! Configuration file and the compiled rule set.
//!
//! `Config` is the JSON document a user edits. `Config::compile` validates it and
//! produces a `Ruleset`: the immutable lookup tables every pipeline component
//! reads from. A `Ruleset` is built once per run and shared behind an `Arc`;
//! configuration changes (e.g. accepted artist spellings) are written to the file
//! and only take effect on the next run.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use regex::{Regex, RegexBuilder};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::grammar::{FilenameGrammar, DEFAULT_EXTENSION};

// ============================================================================
// CONFIG FILE
// ============================================================================

/// On-disk configuration. Every field falls back to the built-in default when
/// absent from the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Single character → replacement (an empty replacement deletes the character).
    pub character_substitutions: BTreeMap<String, String>,
    /// Promotional text to strip from filenames.
    pub ad_patterns: Vec<AdPattern>,
    /// Lowercase alternate spelling → canonical spelling.
    pub artist_corrections: BTreeMap<String, String>,
    /// Words that separate artists (`x`, `feat.`, ...), unified to ", ".
    pub artist_separators: Vec<String>,
    /// Artists whose underscores are kept in metadata.
    pub underscore_exceptions: Vec<String>,
    /// Delimiter between artists in the artist tag.
    pub metadata_delimiter: String,
    /// Audio file extension, without the dot.
    pub extension: String,
}

/// One ad pattern. Matching is always case-insensitive; whether the text is a
/// literal substring or a regular expression is chosen per entry.
///
/// In JSON a bare string is a literal; `{"regex": "..."}` is a regex and
/// `{"literal": "..."}` is an explicit literal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "AdPatternRepr", into = "AdPatternRepr")]
pub enum AdPattern {
    Literal(String),
    Regex(String),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum AdPatternRepr {
    Bare(String),
    Tagged(TaggedAdPattern),
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum TaggedAdPattern {
    Literal(String),
    Regex(String),
}

impl From<AdPatternRepr> for AdPattern {
    fn from(repr: AdPatternRepr) -> Self {
        match repr {
            AdPatternRepr::Bare(s) | AdPatternRepr::Tagged(TaggedAdPattern::Literal(s)) => {
                AdPattern::Literal(s)
            }
            AdPatternRepr::Tagged(TaggedAdPattern::Regex(s)) => AdPattern::Regex(s),
        }
    }
}

impl From<AdPattern> for AdPatternRepr {
    fn from(pattern: AdPattern) -> Self {
        match pattern {
            AdPattern::Literal(s) => AdPatternRepr::Bare(s),
            AdPattern::Regex(s) => AdPatternRepr::Tagged(TaggedAdPattern::Regex(s)),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let character_substitutions = [
            ("\u{2019}", "'"),
            ("\u{2018}", "'"),
            ("\u{00B4}", "'"),
            ("`", "'"),
            ("\u{2013}", "-"),
            ("\u{2014}", "-"),
            ("\u{2212}", "-"),
            ("\u{00A0}", " "),
            ("\u{00AB}", ""),
            ("\u{00BB}", ""),
            ("\"", ""),
            ("\u{2605}", ""),
            ("\u{2606}", ""),
        ];

        let ad_patterns = [
            "(ru.soundmax.me)",
            "(AxeMusic.ru)",
            "(musmore.com)",
            "(remix-x.ru)",
            "(MP3Ball.ru)",
            "(Byfet.com)",
            "(EEMUSIC.ru)",
            "(Music Video)",
            "(Official Music Video)",
            "(Official Video)",
            "[Official Music Video]",
            "[Official Video]",
            "[Music Video]",
        ];

        let artist_corrections = [
            ("lxst_cxntury", "LXST_CXNTURY"),
            ("vali_beats", "VALI$BEATS"),
            ("valisbeats", "VALI$BEATS"),
            ("my_lane", "my!lane"),
            ("antxres", "AntXres"),
            ("ya_h", "Ya$h"),
            ("am_n", "Amøn"),
            ("amon", "Amøn"),
            ("voj", "VØJ"),
            ("v_j", "VØJ"),
            ("vj", "VØJ"),
            ("scxr_soul", "SCXR_SOUL"),
            ("swerve", "$werve"),
            ("werve", "$werve"),
            ("oldflop", "OLDFLOP"),
            ("igres", "iGRES"),
            ("finivoid", "FINIVOID"),
            ("oskalizator.", "oskalizator"),
            ("vvpskvd.", "vvpskvd"),
            ("westliberty's", "WESTLIBERTY'S"),
            ("westlibertys", "WESTLIBERTY'S"),
            ("westliberty_s", "WESTLIBERTY'S"),
        ];

        Self {
            character_substitutions: owned_pairs(&character_substitutions),
            ad_patterns: ad_patterns
                .iter()
                .map(|s| AdPattern::Literal(s.to_string()))
                .collect(),
            artist_corrections: owned_pairs(&artist_corrections),
            artist_separators: ["x", "X", "&", "feat.", "ft.", "feat", "and"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            underscore_exceptions: vec!["boneles_s".to_string(), "rex_incc".to_string()],
            metadata_delimiter: "; ".to_string(),
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }
}

fn owned_pairs(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Default location of the configuration file.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mp3-curator")
        .join("config.json")
}

impl Config {
    /// Parse a configuration document. Exposed for testing.
    pub fn parse(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("Failed to parse config")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Load the file at `path`, or the built-in defaults if it does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            info!(path = %path.display(), "no config file, using built-in defaults");
            Ok(Self::default())
        }
    }

    /// Write the configuration as pretty JSON, replacing the file atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        let tmp = path.with_extension("json.tmp");
        {
            let mut f = fs::File::create(&tmp)
                .with_context(|| format!("Create {}", tmp.display()))?;
            f.write_all(json.as_bytes())?;
            f.write_all(b"\n")?;
            f.flush()?;
        }
        fs::rename(&tmp, path)
            .with_context(|| format!("Rename {} -> {}", tmp.display(), path.display()))?;
        Ok(())
    }

    /// Validate the configuration and build the immutable rule set.
    pub fn compile(&self) -> Result<Ruleset> {
        let mut substitutions = FxHashMap::default();
        for (from, to) in &self.character_substitutions {
            let mut chars = from.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => {
                    substitutions.insert(c, to.clone());
                }
                _ => bail!("Character substitution key {from:?} must be exactly one character"),
            }
        }

        let ad_patterns = self
            .ad_patterns
            .iter()
            .map(AdMatcher::new)
            .collect::<Result<Vec<_>>>()?;

        let mut corrections = FxHashMap::default();
        for (alternate, canonical) in &self.artist_corrections {
            if canonical.is_empty() {
                bail!("Artist correction for {alternate:?} has an empty value");
            }
            corrections.insert(alternate.to_lowercase(), canonical.clone());
        }

        let mut separators = Vec::with_capacity(self.artist_separators.len());
        for word in &self.artist_separators {
            let word = word.trim().replace(' ', "_");
            let word = word.trim_matches('_');
            if word.is_empty() {
                bail!("Artist separators must not be empty");
            }
            separators.push(format!("_{word}_"));
        }

        if self.metadata_delimiter.is_empty() {
            bail!("Metadata delimiter must not be empty");
        }

        let extension = self.extension.trim_start_matches('.');
        if extension.is_empty() {
            bail!("Extension must not be empty");
        }
        let ad_residue = Regex::new(&format!(r"(?i)[ _-]*\.{}$", regex::escape(extension)))
            .context("Failed to build extension pattern")?;

        Ok(Ruleset {
            substitutions,
            ad_patterns,
            corrections,
            separators,
            underscore_exceptions: self.underscore_exceptions.iter().cloned().collect(),
            metadata_delimiter: self.metadata_delimiter.clone(),
            grammar: FilenameGrammar::new(extension),
            ad_residue,
        })
    }
}

// ============================================================================
// COMPILED RULES
// ============================================================================

/// A compiled, case-insensitive ad matcher.
#[derive(Debug, Clone)]
pub struct AdMatcher {
    pattern: AdPattern,
    regex: Regex,
}

impl AdMatcher {
    pub fn new(pattern: &AdPattern) -> Result<Self> {
        let source = match pattern {
            AdPattern::Literal(text) => {
                if text.is_empty() {
                    bail!("Literal ad patterns must not be empty");
                }
                regex::escape(text)
            }
            AdPattern::Regex(expr) => expr.clone(),
        };
        let regex = RegexBuilder::new(&source)
            .case_insensitive(true)
            .build()
            .with_context(|| format!("Invalid ad pattern {pattern:?}"))?;
        if regex.is_match("") {
            bail!("Ad pattern {pattern:?} matches the empty string");
        }
        Ok(Self {
            pattern: pattern.clone(),
            regex,
        })
    }

    pub fn pattern(&self) -> &AdPattern {
        &self.pattern
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    /// Remove every occurrence of this pattern from `text`.
    pub fn remove_all(&self, text: &str) -> String {
        self.regex.replace_all(text, "").into_owned()
    }
}

/// Immutable lookup tables for one run.
#[derive(Debug, Clone)]
pub struct Ruleset {
    pub substitutions: FxHashMap<char, String>,
    pub ad_patterns: Vec<AdMatcher>,
    /// Keys are lowercase.
    pub corrections: FxHashMap<String, String>,
    /// Separator words already wrapped in underscores, e.g. `_feat._`.
    pub separators: Vec<String>,
    pub underscore_exceptions: FxHashSet<String>,
    pub metadata_delimiter: String,
    pub grammar: FilenameGrammar,
    /// Space/underscore/hyphen run left before the extension by a removed ad,
    /// together with the extension itself in any case.
    pub ad_residue: Regex,
}

impl Ruleset {
    /// Case-insensitive correction lookup.
    pub fn correct_artist(&self, token: &str) -> Option<&str> {
        self.corrections.get(&token.to_lowercase()).map(String::as_str)
    }

    /// Distinct canonical spellings known to the correction map.
    pub fn known_spellings(&self) -> Vec<&str> {
        let mut known: Vec<&str> = self.corrections.values().map(String::as_str).collect();
        known.sort_unstable();
        known.dedup();
        known
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_compiles() {
        let rules = Config::default().compile().unwrap();
        assert_eq!(rules.separators[0], "_x_");
        assert!(rules.separators.contains(&"_feat._".to_string()));
        assert_eq!(rules.grammar.extension(), ".mp3");
        assert_eq!(rules.substitutions.get(&'\u{2013}').map(String::as_str), Some("-"));
    }

    #[test]
    fn test_default_corrections_are_fixed_points() {
        // A corrected spelling must not itself be corrected again, otherwise a
        // second normalization pass would change the name.
        let rules = Config::default().compile().unwrap();
        for canonical in rules.known_spellings() {
            if let Some(again) = rules.correct_artist(canonical) {
                assert_eq!(again, canonical);
            }
        }
    }

    #[test]
    fn test_correction_lookup_ignores_case() {
        let rules = Config::default().compile().unwrap();
        assert_eq!(rules.correct_artist("SwErVe"), Some("$werve"));
        assert_eq!(rules.correct_artist("Lxst_Cxntury"), Some("LXST_CXNTURY"));
        assert_eq!(rules.correct_artist("unknown"), None);
    }

    #[test]
    fn test_partial_config_falls_back_to_defaults() {
        let config = Config::parse(r#"{"metadata_delimiter": " / "}"#).unwrap();
        assert_eq!(config.metadata_delimiter, " / ");
        assert_eq!(config.extension, "mp3");
        assert!(!config.ad_patterns.is_empty());
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(Config::parse(r#"{"blacklist": []}"#).is_err());
    }

    #[test]
    fn test_ad_pattern_forms() {
        let config = Config::parse(
            r#"{"ad_patterns": ["(Byfet.com)", {"literal": "[HQ]"}, {"regex": "\\(\\w+\\.ru\\)"}]}"#,
        )
        .unwrap();
        assert_eq!(
            config.ad_patterns,
            vec![
                AdPattern::Literal("(Byfet.com)".to_string()),
                AdPattern::Literal("[HQ]".to_string()),
                AdPattern::Regex(r"\(\w+\.ru\)".to_string()),
            ]
        );
    }

    #[test]
    fn test_literal_ad_does_not_treat_dot_as_wildcard() {
        let literal = AdMatcher::new(&AdPattern::Literal("(EEMUSIC.ru)".to_string())).unwrap();
        assert!(literal.is_match("song (eemusic.RU)"));
        assert!(!literal.is_match("song (EEMUSICxru)"));

        let regex = AdMatcher::new(&AdPattern::Regex(r"\(EEMUSIC.ru\)".to_string())).unwrap();
        assert!(regex.is_match("song (EEMUSICxru)"));
    }

    #[test]
    fn test_invalid_entries_rejected() {
        let mut config = Config::default();
        config
            .character_substitutions
            .insert("ab".to_string(), "c".to_string());
        assert!(config.compile().is_err());

        let mut config = Config::default();
        config.ad_patterns.push(AdPattern::Regex("a*".to_string()));
        assert!(config.compile().is_err());

        let mut config = Config::default();
        config.ad_patterns.push(AdPattern::Regex("(unclosed".to_string()));
        assert!(config.compile().is_err());

        let mut config = Config::default();
        config.artist_separators.push("__".to_string());
        assert!(config.compile().is_err());

        let mut config = Config::default();
        config.metadata_delimiter.clear();
        assert!(config.compile().is_err());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::default();
        config
            .artist_corrections
            .insert("kino".to_string(), "КИНО".to_string());
        config.ad_patterns.push(AdPattern::Regex(r"\(\d+kbps\)".to_string()));
        config.save(&path).unwrap();

        assert_eq!(Config::load(&path).unwrap(), config);
        assert_eq!(Config::load_or_default(&dir.path().join("missing.json")).unwrap(), Config::default());
    }
}

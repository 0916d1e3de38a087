//! Review of newly discovered artist spellings.
//!
//! After a run the user sees every artist the correction map did not know and
//! can add them, so later files with the same artist in a different case get
//! the same spelling. Reply syntax: `y` accepts all, `y 1 3 10` accepts all but
//! entries 1, 3 and 10, `n` accepts none. Entries are numbered from 0.

use std::collections::BTreeSet;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::Path;

use anyhow::{Context, Result};
use rustc_hash::FxHashSet;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{Config, Ruleset};

/// Minimum normalized Levenshtein similarity for a spelling suggestion.
const SUGGESTION_THRESHOLD: f64 = 0.8;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplyError {
    #[error("empty reply")]
    Empty,
    #[error("expected \"y\" or \"n\", got {0:?}")]
    UnknownAnswer(String),
    #[error("{0:?} is not an entry number")]
    InvalidIndex(String),
    #[error("entry {index} does not exist (last entry is {last})")]
    IndexOutOfRange { index: usize, last: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewReply {
    /// Accept every entry except the listed ones.
    Accept { excluded: BTreeSet<usize> },
    Reject,
}

impl ReviewReply {
    /// Parse a reply to a list of `count` entries.
    pub fn parse(input: &str, count: usize) -> Result<Self, ReplyError> {
        let mut tokens = input.split_whitespace();
        let answer = tokens.next().ok_or(ReplyError::Empty)?;
        if answer.eq_ignore_ascii_case("n") || answer.eq_ignore_ascii_case("no") {
            return Ok(Self::Reject);
        }
        if !(answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes")) {
            return Err(ReplyError::UnknownAnswer(answer.to_string()));
        }

        let mut excluded = BTreeSet::new();
        for token in tokens {
            let index: usize = token
                .parse()
                .map_err(|_| ReplyError::InvalidIndex(token.to_string()))?;
            if index >= count {
                return Err(ReplyError::IndexOutOfRange {
                    index,
                    last: count.saturating_sub(1),
                });
            }
            excluded.insert(index);
        }
        Ok(Self::Accept { excluded })
    }

    /// The entries of `tokens` this reply accepts, in order.
    pub fn select<'a>(&self, tokens: &'a [String]) -> Vec<&'a str> {
        match self {
            Self::Reject => Vec::new(),
            Self::Accept { excluded } => tokens
                .iter()
                .enumerate()
                .filter(|(i, _)| !excluded.contains(i))
                .map(|(_, t)| t.as_str())
                .collect(),
        }
    }
}

/// Add accepted spellings to the correction map as `lowercase → spelling`.
///
/// Existing entries are never replaced, and when two accepted spellings differ
/// only by case the first one wins. Returns the number of entries added.
pub fn merge_accepted<S: AsRef<str>>(config: &mut Config, accepted: &[S]) -> usize {
    let mut known: FxHashSet<String> = config
        .artist_corrections
        .keys()
        .map(|k| k.to_lowercase())
        .collect();
    let mut added = 0;
    for spelling in accepted {
        let spelling = spelling.as_ref();
        let key = spelling.to_lowercase();
        if known.insert(key.clone()) {
            config.artist_corrections.insert(key, spelling.to_string());
            added += 1;
        }
    }
    added
}

/// Closest known canonical spelling, if one is similar enough to be a likely typo.
pub fn suggest_spelling<'a>(token: &str, rules: &'a Ruleset) -> Option<&'a str> {
    let token = token.to_lowercase();
    rules
        .known_spellings()
        .into_iter()
        .map(|known| (known, strsim::normalized_levenshtein(&token, &known.to_lowercase())))
        .filter(|(_, score)| *score >= SUGGESTION_THRESHOLD && *score < 1.0)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(known, _)| known)
}

/// Show the list, read one reply, merge and save. Returns the number of
/// spellings added.
pub fn review_with<R: BufRead, W: Write>(
    discovered: &[String],
    rules: &Ruleset,
    config: &mut Config,
    config_path: &Path,
    mut input: R,
    mut output: W,
) -> Result<usize> {
    if discovered.is_empty() {
        return Ok(0);
    }

    writeln!(output, "\nNew artists:")?;
    for (i, token) in discovered.iter().enumerate() {
        match suggest_spelling(token, rules) {
            Some(known) => writeln!(output, "{:>4}. {}  (similar to {})", i, token, known)?,
            None => writeln!(output, "{:>4}. {}", i, token)?,
        }
    }
    write!(
        output,
        "\nAdd all these to {}?\nExclude entries by listing their numbers.\n\nExample: \"y 1 3 10\" or \"y\" or \"n\": ",
        config_path.display()
    )?;
    output.flush()?;

    let mut reply = String::new();
    input.read_line(&mut reply).context("Failed to read reply")?;

    let reply = match ReviewReply::parse(&reply, discovered.len()) {
        Ok(reply) => reply,
        Err(e) => {
            warn!(error = %e, "incorrect reply, nothing added");
            return Ok(0);
        }
    };
    let accepted = reply.select(discovered);
    let added = merge_accepted(config, &accepted);
    if added > 0 {
        config.save(config_path)?;
        info!(added, path = %config_path.display(), "saved artist corrections");
    }
    Ok(added)
}

/// `review_with` on stdin/stderr. Skipped when stdin is not a terminal.
pub fn review_interactively(
    discovered: &[String],
    rules: &Ruleset,
    config: &mut Config,
    config_path: &Path,
) -> Result<usize> {
    if discovered.is_empty() {
        return Ok(0);
    }
    if !io::stdin().is_terminal() {
        info!(
            count = discovered.len(),
            "stdin is not a terminal, skipping artist review"
        );
        return Ok(0);
    }
    review_with(
        discovered,
        rules,
        config,
        config_path,
        io::stdin().lock(),
        io::stderr(),
    )
}

//! Slug generation
//!
//! A slug is the URL identifier of a store, derived from its display name:
//! `"Café Deluxe!"` becomes `cafe-deluxe`. Collisions are disambiguated with a
//! numeric suffix (`cafe-deluxe-2`); the storage layer owns the final
//! uniqueness guarantee.

use regex::{Regex, RegexBuilder};
use std::sync::OnceLock;
use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};
use crate::Result;

/// Separator placed between words and before numeric suffixes
pub const SEPARATOR: char = '-';

static NON_ALPHANUMERIC_RUN: OnceLock<Regex> = OnceLock::new();

fn non_alphanumeric_run() -> &'static Regex {
    NON_ALPHANUMERIC_RUN
        .get_or_init(|| Regex::new(r"[^\p{L}\p{N}]+").expect("separator pattern is valid"))
}

/// Derive a candidate slug from a display name.
///
/// Lowercases, strips diacritics, collapses every run of whitespace or
/// punctuation into a single separator and trims separators from both ends.
/// Returns an empty string when the name has no letters or digits.
pub fn derive_slug(name: &str) -> String {
    let folded: String = name
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect();

    non_alphanumeric_run()
        .replace_all(&folded, SEPARATOR.to_string().as_str())
        .trim_matches(SEPARATOR)
        .to_string()
}

/// `candidate-n`
pub fn with_suffix(candidate: &str, n: usize) -> String {
    format!("{candidate}{SEPARATOR}{n}")
}

/// Matches a candidate slug exactly or followed by a numeric suffix,
/// case-insensitively (`cafe`, `Cafe-2`, `cafe-10`, but not `cafe-bar`).
#[derive(Debug, Clone)]
pub struct SlugPattern {
    regex: Regex,
}

impl SlugPattern {
    pub fn new(candidate: &str) -> Result<Self> {
        let regex = RegexBuilder::new(&format!(
            "^{}(?:{}[0-9]+)?$",
            regex::escape(candidate),
            SEPARATOR
        ))
        .case_insensitive(true)
        .build()?;
        Ok(Self { regex })
    }

    pub fn is_match(&self, slug: &str) -> bool {
        self.regex.is_match(slug)
    }
}

/// Count-based disambiguation: `candidate` when nothing matches, otherwise
/// `candidate-(matches + 1)`.
///
/// This alone is not collision-free: with `x` and `x-3` taken it proposes
/// `x-3` again. Callers must pair it with the storage constraint and
/// [`SuffixSequence`] retries.
pub fn count_based(candidate: &str, matches: usize) -> String {
    if matches == 0 {
        candidate.to_string()
    } else {
        with_suffix(candidate, matches + 1)
    }
}

/// The sequence of slugs tried for one candidate: the count-based proposal
/// first, then increasing suffixes after each constraint violation.
#[derive(Debug, Clone)]
pub struct SuffixSequence {
    candidate: String,
    next: Option<usize>,
}

impl SuffixSequence {
    pub fn new(candidate: impl Into<String>, matches: usize) -> Self {
        Self {
            candidate: candidate.into(),
            next: if matches == 0 { None } else { Some(matches + 1) },
        }
    }
}

impl Iterator for SuffixSequence {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let slug = match self.next {
            None => self.candidate.clone(),
            Some(n) => with_suffix(&self.candidate, n),
        };
        // The bare candidate is followed by `-2`, as if one match existed
        self.next = Some(self.next.map_or(2, |n| n + 1));
        Some(slug)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_slug() {
        assert_eq!(derive_slug("Cafe Deluxe"), "cafe-deluxe");
        assert_eq!(derive_slug("  Café   Délúxe!! "), "cafe-deluxe");
        assert_eq!(derive_slug("Joe's Bar & Grill"), "joe-s-bar-grill");
        assert_eq!(derive_slug("--Tacos--"), "tacos");
        assert_eq!(derive_slug("24/7 Diner"), "24-7-diner");
    }

    #[test]
    fn test_derive_slug_is_deterministic() {
        assert_eq!(derive_slug("Über Pizza"), derive_slug("Über Pizza"));
        assert_eq!(derive_slug("Über Pizza"), "uber-pizza");
    }

    #[test]
    fn test_derive_slug_without_alphanumerics() {
        assert_eq!(derive_slug("!!! ???"), "");
        assert_eq!(derive_slug(""), "");
    }

    #[test]
    fn test_slug_pattern() {
        let pattern = SlugPattern::new("cafe").unwrap();
        assert!(pattern.is_match("cafe"));
        assert!(pattern.is_match("CAFE-2"));
        assert!(pattern.is_match("cafe-10"));
        assert!(!pattern.is_match("cafe-bar"));
        assert!(!pattern.is_match("cafe-"));
        assert!(!pattern.is_match("my-cafe"));
    }

    #[test]
    fn test_count_based() {
        assert_eq!(count_based("cafe-deluxe", 0), "cafe-deluxe");
        assert_eq!(count_based("cafe-deluxe", 1), "cafe-deluxe-2");
        assert_eq!(count_based("x", 2), "x-3");
    }

    #[test]
    fn test_suffix_sequence() {
        let tried: Vec<_> = SuffixSequence::new("x", 2).take(3).collect();
        assert_eq!(tried, vec!["x-3", "x-4", "x-5"]);

        let tried: Vec<_> = SuffixSequence::new("x", 0).take(3).collect();
        assert_eq!(tried, vec!["x", "x-2", "x-3"]);
    }
}

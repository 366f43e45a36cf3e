//! Small helpers shared by the lexer, aggregators and validators.
use std::{
  collections::HashMap,
  sync::{Arc, LazyLock, RwLock},
};

use regex::Regex;

/// Process-wide cache of compiled patterns, keyed by pattern source.
static REGEX_CACHE: LazyLock<RwLock<HashMap<String, Arc<Regex>>>> =
  LazyLock::new(|| RwLock::new(HashMap::new()));

/// Slugify a string for use as an anchor ID.
/// Converts to lowercase, replaces non-alphanumeric characters with dashes,
/// and trims leading/trailing dashes.
#[must_use]
pub fn slugify(text: &str) -> String {
  text
    .to_lowercase()
    .replace(|c: char| !c.is_alphanumeric() && c != '-' && c != '_', "-")
    .trim_matches('-')
    .to_string()
}

/// Returns a regex that never matches anything.
///
/// Used as the stand-in for rules a dialect does not support, and as the
/// fallback when a built-in pattern fails to compile.
#[must_use]
pub fn never_matching_regex() -> Regex {
  #[allow(
    clippy::expect_used,
    reason = "This pattern is guaranteed to be valid"
  )]
  Regex::new(r"[^\s\S]").expect("regex pattern [^\\s\\S] should always compile")
}

/// Compile `pattern`, reusing a previously compiled instance when the same
/// source was seen before.
///
/// # Errors
///
/// Returns the compilation error if `pattern` is not a valid regex.
pub fn cached_regex(pattern: &str) -> Result<Arc<Regex>, regex::Error> {
  if let Ok(cache) = REGEX_CACHE.read()
    && let Some(regex) = cache.get(pattern)
  {
    return Ok(Arc::clone(regex));
  }

  let compiled = Arc::new(Regex::new(pattern)?);
  match REGEX_CACHE.write() {
    Ok(mut cache) => {
      Ok(Arc::clone(
        cache
          .entry(pattern.to_owned())
          .or_insert_with(|| Arc::clone(&compiled)),
      ))
    },
    // A poisoned cache only costs us sharing.
    Err(_) => Ok(compiled),
  }
}

/// Count the leading ASCII spaces of `line`.
#[must_use]
pub fn leading_spaces(line: &str) -> usize {
  line.bytes().take_while(|b| *b == b' ').count()
}

/// Whether `line` holds nothing but whitespace.
#[must_use]
pub fn is_blank(line: &str) -> bool {
  line.chars().all(char::is_whitespace)
}

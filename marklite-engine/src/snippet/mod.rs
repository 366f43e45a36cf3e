//! Region markers in source files included as code snippets.
//!
//! A source file marks includable regions with comment tags such as
//! `// <setup>` ... `// </setup>`. [`resolve_tags`] pairs those markers and
//! computes the lines between them; [`extract`] applies a
//! [`SnippetQuery`] to a file and returns the selected lines.
mod language;
mod query;

use std::{
  collections::{BTreeMap, BTreeSet},
  sync::Arc,
};

use log::debug;
use regex::Regex;

pub use self::{
  language::{Language, LanguageRegistry},
  query::{LineRange, LineSelector, SnippetQuery},
};
use crate::{error::SnippetError, utils::cached_regex};

/// A pair of patterns recognizing start and end markers. Both must have a
/// capture group called `name`.
#[derive(Debug, Clone)]
pub struct TagPattern {
  start: Arc<Regex>,
  end:   Arc<Regex>,
}

impl TagPattern {
  /// # Errors
  ///
  /// Returns [`SnippetError::Pattern`] if a pattern does not compile, or
  /// [`SnippetError::MissingNameGroup`] if it has no `name` group.
  pub fn new(start: &str, end: &str) -> Result<Self, SnippetError> {
    Ok(Self {
      start: named(start)?,
      end:   named(end)?,
    })
  }

  #[must_use]
  pub fn start(&self) -> &Regex {
    &self.start
  }

  #[must_use]
  pub fn end(&self) -> &Regex {
    &self.end
  }
}

fn named(pattern: &str) -> Result<Arc<Regex>, SnippetError> {
  let regex = cached_regex(pattern)?;
  if regex.capture_names().flatten().any(|name| name == "name") {
    Ok(regex)
  } else {
    Err(SnippetError::MissingNameGroup(pattern.to_owned()))
  }
}

/// What became of one tag name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagResolution {
  /// The name as first written in the file.
  pub name:        String,
  /// First line of the region, 1-based.
  pub start_line:  Option<usize>,
  /// Last line of the region, 1-based and inclusive.
  pub end_line:    Option<usize>,
  /// Every marker line of the file, for every tag.
  pub excludes:    Arc<BTreeSet<usize>>,
  pub success:     bool,
  pub error:       Option<String>,
  pub start_count: usize,
  pub end_count:   usize,
}

impl TagResolution {
  /// The resolved lines, without any marker line.
  #[must_use]
  pub fn lines(&self) -> Vec<usize> {
    match (self.success, self.start_line, self.end_line) {
      (true, Some(start), Some(end)) => {
        (start..=end).filter(|l| !self.excludes.contains(l)).collect()
      },
      _ => Vec::new(),
    }
  }
}

#[derive(Default)]
struct Markers {
  name:   String,
  starts: Vec<usize>,
  ends:   Vec<usize>,
}

/// Pair start and end markers in `lines`, keyed by lower-cased tag name.
///
/// A start marker is closed by an end marker of the same name. An end marker
/// without a name closes the innermost start that is still open. Each tag
/// succeeds only with exactly one start and one end; its region runs from
/// the line after the last start to the line before the first end.
#[must_use]
pub fn resolve_tags<S: AsRef<str>>(
  lines: &[S],
  patterns: &[TagPattern],
) -> BTreeMap<String, TagResolution> {
  let mut markers: BTreeMap<String, Markers> = BTreeMap::new();
  let mut excludes = BTreeSet::new();
  let mut open: Vec<String> = Vec::new();

  for (index, line) in lines.iter().enumerate() {
    let line = line.as_ref();
    let number = index + 1;

    for pattern in patterns {
      if let Some(name) = capture_name(&pattern.start, line) {
        let key = name.to_lowercase();
        open.push(key.clone());
        record(&mut markers, key, name).starts.push(number);
        excludes.insert(number);
        break;
      }
      if let Some(name) = capture_name(&pattern.end, line) {
        let key = if name.is_empty() {
          match open.pop() {
            Some(key) => key,
            None => {
              debug!("Unnamed end marker on line {number} closes nothing");
              excludes.insert(number);
              break;
            },
          }
        } else {
          let key = name.to_lowercase();
          if let Some(at) = open.iter().rposition(|k| *k == key) {
            open.remove(at);
          }
          key
        };
        record(&mut markers, key, name).ends.push(number);
        excludes.insert(number);
        break;
      }
    }
  }

  let excludes = Arc::new(excludes);
  markers
    .into_iter()
    .map(|(key, found)| {
      let resolution = resolve(found, &excludes);
      (key, resolution)
    })
    .collect()
}

fn capture_name<'l>(regex: &Regex, line: &'l str) -> Option<&'l str> {
  regex
    .captures(line)
    .map(|caps| caps.name("name").map_or("", |m| m.as_str().trim()))
}

fn record<'m>(
  markers: &'m mut BTreeMap<String, Markers>,
  key: String,
  name: &str,
) -> &'m mut Markers {
  let entry = markers.entry(key).or_default();
  if entry.name.is_empty() {
    name.clone_into(&mut entry.name);
  }
  entry
}

fn resolve(found: Markers, excludes: &Arc<BTreeSet<usize>>) -> TagResolution {
  let start_count = found.starts.len();
  let end_count = found.ends.len();
  let start_line = found.starts.last().map(|l| l + 1);
  let end_line = found.ends.first().map(|l| l.saturating_sub(1));

  let mut resolution = TagResolution {
    name: found.name,
    start_line,
    end_line,
    excludes: Arc::clone(excludes),
    success: false,
    error: None,
    start_count,
    end_count,
  };

  if start_count != 1 || end_count != 1 {
    resolution.error = Some(format!(
      "Tag {} is not paired: {start_count} start lines, {end_count} end lines",
      resolution.name
    ));
    if start_count == 0 || end_count == 0 {
      resolution.start_line = None;
      resolution.end_line = None;
    }
    return resolution;
  }

  match (start_line, end_line) {
    (Some(start), Some(end)) if start > end => {
      resolution.error = Some(format!(
        "Tag {}: start line {start} must precede end line {end}",
        resolution.name
      ));
    },
    _ => resolution.success = true,
  }
  resolution
}

/// Lines picked out of a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snippet {
  pub lines:     Vec<String>,
  /// 1-based line numbers of `lines` in the file.
  pub numbers:   Vec<usize>,
  pub highlight: Option<String>,
}

impl Snippet {
  #[must_use]
  pub fn text(&self) -> String {
    self.lines.join("\n")
  }
}

/// Apply `query` to the lines of a file. Marker lines of `language` never
/// end up in the snippet.
///
/// # Errors
///
/// Fails when a tag is requested without a language, the tag is missing or
/// unpaired, or a line range falls outside the file.
pub fn extract<S: AsRef<str>>(
  lines: &[S],
  query: &SnippetQuery,
  language: Option<&Language>,
) -> Result<Snippet, SnippetError> {
  let total = lines.len();
  let tags = language.map(|language| resolve_tags(lines, language.patterns()));
  let excludes = tags
    .as_ref()
    .and_then(|tags| tags.values().next())
    .map(|r| Arc::clone(&r.excludes))
    .unwrap_or_default();

  let numbers: Vec<usize> = match &query.selector {
    LineSelector::All => (1..=total).collect(),
    LineSelector::Tag(tag) => {
      let tags = tags.ok_or_else(|| SnippetError::NoLanguage(tag.clone()))?;
      let resolution = tags
        .get(&tag.to_lowercase())
        .ok_or_else(|| SnippetError::UnknownTag(tag.clone()))?;
      if !resolution.success {
        return Err(SnippetError::Unpaired(
          resolution.error.clone().unwrap_or_default(),
        ));
      }
      resolution.lines()
    },
    LineSelector::Ranges(ranges) => {
      let mut numbers = Vec::new();
      for range in ranges {
        let end = range.end.unwrap_or(total);
        if range.start == 0 || range.start > end || end > total {
          return Err(SnippetError::Range {
            start: range.start,
            end,
            total,
          });
        }
        numbers.extend(range.start..=end);
      }
      numbers
    },
  };

  let numbers: Vec<usize> =
    numbers.into_iter().filter(|n| !excludes.contains(n)).collect();
  let selected: Vec<&str> = numbers
    .iter()
    .filter_map(|n| lines.get(n - 1).map(AsRef::as_ref))
    .collect();

  Ok(Snippet {
    lines: dedent(&selected, query.dedent),
    numbers,
    highlight: query.highlight.clone(),
  })
}

/// Number of leading whitespace characters in `line`.
fn indent(line: &str) -> usize {
  line.chars().take_while(|c| c.is_whitespace()).count()
}

/// Strip `columns` leading whitespace characters from every line, or the
/// indentation common to all non-blank lines when `columns` is `None`.
fn dedent(lines: &[&str], columns: Option<usize>) -> Vec<String> {
  let width = columns.unwrap_or_else(|| {
    lines
      .iter()
      .filter(|line| !line.trim().is_empty())
      .map(|line| indent(line))
      .min()
      .unwrap_or(0)
  });

  lines
    .iter()
    .map(|line| {
      let cut = indent(line).min(width);
      line.chars().skip(cut).collect()
    })
    .collect()
}

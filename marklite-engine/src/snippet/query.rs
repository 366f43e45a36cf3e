use std::{str::FromStr, sync::LazyLock};

use log::{debug, error};
use regex::Regex;

use crate::{error::SnippetError, utils::never_matching_regex};

static LINE_ANCHOR: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"^L(\d+)(?:-L(\d+))?$").unwrap_or_else(|e| {
    error!("Failed to compile LINE_ANCHOR regex: {e}");
    never_matching_regex()
  })
});

/// An inclusive, 1-based line range. `end: None` runs to the end of file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRange {
  pub start: usize,
  pub end:   Option<usize>,
}

/// Which lines of the file a snippet takes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineSelector {
  All,
  Ranges(Vec<LineRange>),
  Tag(String),
}

/// The part of a snippet reference after the path: `#L3-L7`, `#tag` or a
/// `?name=...&start=...&end=...&range=...&highlight=...&dedent=...` query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnippetQuery {
  pub selector:  LineSelector,
  pub highlight: Option<String>,
  pub dedent:    Option<usize>,
}

impl Default for SnippetQuery {
  fn default() -> Self {
    Self {
      selector:  LineSelector::All,
      highlight: None,
      dedent:    None,
    }
  }
}

impl SnippetQuery {
  /// Parse an optional suffix; no suffix selects the whole file.
  ///
  /// # Errors
  ///
  /// See [`SnippetQuery::from_str`].
  pub fn parse_optional(query: Option<&str>) -> Result<Self, SnippetError> {
    query.map_or_else(|| Ok(Self::default()), str::parse)
  }
}

fn invalid(query: &str, reason: impl Into<String>) -> SnippetError {
  SnippetError::Query {
    query:  query.to_owned(),
    reason: reason.into(),
  }
}

fn number(query: &str, value: &str) -> Result<usize, SnippetError> {
  match value.trim().parse::<usize>() {
    Ok(0) | Err(_) => Err(invalid(query, format!("'{value}' is not a line number"))),
    Ok(n) => Ok(n),
  }
}

/// `3`, `3-7` or `3-`.
fn range(query: &str, text: &str) -> Result<LineRange, SnippetError> {
  match text.split_once('-') {
    None => {
      let line = number(query, text)?;
      Ok(LineRange {
        start: line,
        end:   Some(line),
      })
    },
    Some((start, end)) => {
      let range = LineRange {
        start: number(query, start)?,
        end:   if end.trim().is_empty() {
          None
        } else {
          Some(number(query, end)?)
        },
      };
      ordered(query, range)
    },
  }
}

fn ordered(query: &str, range: LineRange) -> Result<LineRange, SnippetError> {
  match range.end {
    Some(end) if end < range.start => {
      Err(invalid(query, format!("range {}-{end} ends before it starts", range.start)))
    },
    _ => Ok(range),
  }
}

impl FromStr for SnippetQuery {
  type Err = SnippetError;

  fn from_str(query: &str) -> Result<Self, Self::Err> {
    if let Some(fragment) = query.strip_prefix('#') {
      if let Some(caps) = LINE_ANCHOR.captures(fragment) {
        let start = number(query, &caps[1])?;
        let end = match caps.get(2) {
          Some(m) => number(query, m.as_str())?,
          None => start,
        };
        return Ok(Self {
          selector: LineSelector::Ranges(vec![ordered(query, LineRange {
            start,
            end: Some(end),
          })?]),
          ..Self::default()
        });
      }
      if fragment.trim().is_empty() {
        return Err(invalid(query, "empty fragment"));
      }
      return Ok(Self {
        selector: LineSelector::Tag(fragment.trim().to_owned()),
        ..Self::default()
      });
    }

    let Some(params) = query.strip_prefix('?') else {
      return Err(invalid(query, "expected '#' or '?'"));
    };

    let mut result = Self::default();
    let mut start = None;
    let mut end = None;
    for pair in params.split('&').filter(|p| !p.is_empty()) {
      let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
      match key.to_ascii_lowercase().as_str() {
        "name" | "tag" => result.selector = LineSelector::Tag(value.to_owned()),
        "start" => start = Some(number(query, value)?),
        "end" => end = Some(number(query, value)?),
        "range" => {
          let ranges = value
            .split(',')
            .filter(|r| !r.trim().is_empty())
            .map(|r| range(query, r))
            .collect::<Result<Vec<_>, _>>()?;
          if ranges.is_empty() {
            return Err(invalid(query, "empty range"));
          }
          result.selector = LineSelector::Ranges(ranges);
        },
        "highlight" => result.highlight = Some(value.to_owned()),
        "dedent" => {
          result.dedent = Some(value.trim().parse().map_err(|_| {
            invalid(query, format!("'{value}' is not a column count"))
          })?);
        },
        other => debug!("Ignoring snippet query parameter '{other}'"),
      }
    }

    if start.is_some() || end.is_some() {
      if !matches!(result.selector, LineSelector::All) {
        return Err(invalid(query, "start/end cannot be combined with name or range"));
      }
      result.selector = LineSelector::Ranges(vec![ordered(query, LineRange {
        start: start.unwrap_or(1),
        end,
      })?]);
    }

    if let LineSelector::Tag(tag) = &result.selector
      && tag.trim().is_empty()
    {
      return Err(invalid(query, "empty tag name"));
    }

    Ok(result)
  }
}

#[cfg(test)]
mod tests {
  #![allow(clippy::unwrap_used, reason = "Fine in tests")]
  use super::*;

  fn parse(query: &str) -> SnippetQuery {
    query.parse().unwrap()
  }

  fn lines(start: usize, end: Option<usize>) -> LineSelector {
    LineSelector::Ranges(vec![LineRange { start, end }])
  }

  #[test]
  fn test_fragments() {
    assert_eq!(parse("#L3-L7").selector, lines(3, Some(7)));
    assert_eq!(parse("#L3").selector, lines(3, Some(3)));
    assert_eq!(parse("#snippet1").selector, LineSelector::Tag("snippet1".to_owned()));
  }

  #[test]
  fn test_parameters() {
    let query = parse("?name=Setup&highlight=2-3&dedent=4");
    assert_eq!(query.selector, LineSelector::Tag("Setup".to_owned()));
    assert_eq!(query.highlight.as_deref(), Some("2-3"));
    assert_eq!(query.dedent, Some(4));

    assert_eq!(parse("?start=5").selector, lines(5, None));
    assert_eq!(parse("?start=2&end=4").selector, lines(2, Some(4)));
    assert_eq!(parse("?end=4").selector, lines(1, Some(4)));
    assert_eq!(
      parse("?range=1-3,5-,9").selector,
      LineSelector::Ranges(vec![
        LineRange {
          start: 1,
          end:   Some(3),
        },
        LineRange {
          start: 5,
          end:   None,
        },
        LineRange {
          start: 9,
          end:   Some(9),
        },
      ])
    );
    assert_eq!(parse("?unknown=1").selector, LineSelector::All);
  }

  #[test]
  fn test_invalid() {
    for query in [
      "",
      "L3",
      "#",
      "#L0",
      "#L7-L3",
      "?start=x",
      "?start=7&end=3",
      "?name=",
      "?range=",
      "?range=7-3",
      "?range=1-2,9-4",
      "?dedent=-1",
      "?name=a&start=2",
    ] {
      assert!(
        matches!(query.parse::<SnippetQuery>(), Err(SnippetError::Query { .. })),
        "{query:?}"
      );
    }
  }

  #[test]
  fn test_optional() {
    assert_eq!(SnippetQuery::parse_optional(None).unwrap(), SnippetQuery::default());
  }
}

//! Mapping byte offsets in (possibly rewritten) text back to original lines.
//!
//! The lexer works on frames of text that are not always verbatim slices of
//! the document: blockquote markers and list indentation are stripped before
//! the inner blocks are lexed. A [`LineMap`] remembers, for every line of a
//! frame, where that line starts in the original document, so positions can
//! be reported against what the author actually wrote.
use std::ops::Range;

use serde::Serialize;

/// A 1-based line and column in the original document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Position {
  pub line:   usize,
  pub column: usize,
}

/// Where a token came from: its first line and column, plus the raw text it
/// consumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceInfo {
  pub line:     usize,
  pub column:   usize,
  pub markdown: String,
}

impl SourceInfo {
  #[must_use]
  pub fn new(position: Position, markdown: impl Into<String>) -> Self {
    Self {
      line:     position.line,
      column:   position.column,
      markdown: markdown.into(),
    }
  }

  #[must_use]
  pub const fn position(&self) -> Position {
    Position {
      line:   self.line,
      column: self.column,
    }
  }

  /// Number of lines the raw text spans, counting a trailing partial line.
  #[must_use]
  pub fn line_count(&self) -> usize {
    self.markdown.trim_end_matches('\n').lines().count().max(1)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LineStart {
  offset: usize,
  line:   usize,
  column: usize,
}

/// Offsets of line starts in a frame, with their original positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineMap {
  starts: Vec<LineStart>,
}

impl LineMap {
  /// Map for a document that starts at line 1, column 1.
  #[must_use]
  pub fn new(text: &str) -> Self {
    let mut starts = vec![LineStart {
      offset: 0,
      line:   1,
      column: 1,
    }];
    for (offset, byte) in text.bytes().enumerate() {
      if byte == b'\n' {
        starts.push(LineStart {
          offset: offset + 1,
          line:   starts.len() + 1,
          column: 1,
        });
      }
    }
    Self { starts }
  }

  /// Original position of byte `offset` in `text`, the frame this map was
  /// built for.
  #[must_use]
  pub fn locate(&self, text: &str, offset: usize) -> Position {
    let index = self
      .starts
      .partition_point(|s| s.offset <= offset)
      .saturating_sub(1);
    let Some(start) = self.starts.get(index) else {
      return Position { line: 1, column: 1 };
    };
    let column = text
      .get(start.offset..offset)
      .map_or(0, |s| s.chars().count());
    Position {
      line:   start.line,
      column: start.column + column,
    }
  }

  /// Map for the sub-frame `text[range]`.
  #[must_use]
  pub fn slice(&self, text: &str, range: Range<usize>) -> Self {
    let first = self.locate(text, range.start);
    let lo = self.starts.partition_point(|s| s.offset <= range.start);
    let hi = self.starts.partition_point(|s| s.offset <= range.end);

    let mut starts = vec![LineStart {
      offset: 0,
      line:   first.line,
      column: first.column,
    }];
    starts.extend(self.starts.get(lo..hi).unwrap_or(&[]).iter().map(|s| {
      LineStart {
        offset: s.offset - range.start,
        ..*s
      }
    }));
    Self { starts }
  }

  /// Build a new frame from `text[range]` with a prefix removed from every
  /// line. `strip` receives the line index and the line without its newline,
  /// and returns how many bytes to drop from its start.
  pub fn strip_lines<F>(
    &self,
    text: &str,
    range: Range<usize>,
    mut strip: F,
  ) -> (String, Self)
  where
    F: FnMut(usize, &str) -> usize,
  {
    let source = text.get(range.clone()).unwrap_or_default();
    let mut out = String::with_capacity(source.len());
    let mut starts = Vec::new();
    let mut offset = range.start;

    for (index, line) in source.split_inclusive('\n').enumerate() {
      let body = line.strip_suffix('\n').unwrap_or(line);
      let mut cut = strip(index, body).min(body.len());
      while !line.is_char_boundary(cut) {
        cut -= 1;
      }
      let position = self.locate(text, offset + cut);
      starts.push(LineStart {
        offset: out.len(),
        line:   position.line,
        column: position.column,
      });
      out.push_str(line.get(cut..).unwrap_or_default());
      offset += line.len();
    }

    if starts.is_empty() {
      let position = self.locate(text, range.start);
      starts.push(LineStart {
        offset: 0,
        line:   position.line,
        column: position.column,
      });
    }

    (out, Self { starts })
  }
}

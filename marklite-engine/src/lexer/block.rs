use std::{ops::Range, sync::LazyLock};

use log::error;
use regex::{Captures, Regex};

use super::{Draft, DraftKind, Inline, LinkDef, Links, normalize_label};
use crate::{
  error::LexError,
  rules::{Rule, RuleSet},
  source::{LineMap, SourceInfo},
  token::{Align, CodeSnippetToken, TokenKind},
  types::LexerOptions,
  utils::{is_blank, leading_spaces, never_matching_regex},
};

/// Tag names that never open an html block.
const INLINE_TAGS: &[&str] = &[
  "a", "em", "strong", "small", "s", "cite", "q", "dfn", "abbr", "data",
  "time", "code", "var", "samp", "kbd", "sub", "sup", "i", "b", "u", "mark",
  "ruby", "rt", "rp", "bdi", "bdo", "span", "br", "wbr", "ins", "del", "img",
];

static OPEN_TAG: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r#"^ *<\w+(?:"[^"]*"|'[^']*'|[^'">])*?>"#).unwrap_or_else(|e| {
    error!("Failed to compile OPEN_TAG regex: {e}");
    never_matching_regex()
  })
});

static BULLET: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"^(?:[*+-]|\d+\.) ").unwrap_or_else(|e| {
    error!("Failed to compile BULLET regex: {e}");
    never_matching_regex()
  })
});

static BULLET_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"^ *(?:[*+-]|\d+\.) +").unwrap_or_else(|e| {
    error!("Failed to compile BULLET_PREFIX regex: {e}");
    never_matching_regex()
  })
});

/// Where a block frame sits in the document.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Frame {
  /// Paragraphs and definitions are allowed.
  top:  bool,
  /// Inside a blockquote.
  bq:    bool,
  /// The body of a blockquote itself, not a block nested in it.
  quote: bool,
  /// The document itself, not a nested frame.
  root:  bool,
}

impl Frame {
  pub(crate) const ROOT: Self = Self {
    top:   true,
    bq:    false,
    quote: false,
    root:  true,
  };
}

struct Step {
  len:  usize,
  kind: DraftKind,
}

impl Step {
  const fn ready(len: usize, kind: TokenKind) -> Self {
    Self {
      len,
      kind: DraftKind::Ready(kind),
    }
  }
}

pub(crate) struct BlockLexer<'a> {
  rules:   &'a RuleSet,
  options: LexerOptions,
  links:   &'a mut Links,
}

impl<'a> BlockLexer<'a> {
  pub(crate) const fn new(
    rules: &'a RuleSet,
    options: LexerOptions,
    links: &'a mut Links,
  ) -> Self {
    Self {
      rules,
      options,
      links,
    }
  }

  pub(crate) fn lex(
    &mut self,
    text: &str,
    map: &LineMap,
    frame: Frame,
  ) -> Result<Vec<Draft>, LexError> {
    let mut drafts = Vec::new();
    let mut pos = 0;

    while pos < text.len() {
      let mut matched = None;
      for rule in Rule::BLOCK_ORDER {
        if !self.rules.is_enabled(rule) {
          continue;
        }
        if let Some(step) = self.try_rule(rule, text, pos, map, frame)?
          && step.len > 0
        {
          matched = Some((rule, step));
          break;
        }
      }

      let Some((rule, step)) = matched else {
        let position = map.locate(text, pos);
        return Err(LexError::NoProgress {
          line:    position.line,
          column:  position.column,
          snippet: text[pos..].chars().take(40).collect(),
        });
      };

      let end = (pos + step.len).min(text.len());
      drafts.push(Draft {
        rule,
        source: SourceInfo::new(map.locate(text, pos), &text[pos..end]),
        kind: step.kind,
      });
      pos = end;
    }

    Ok(drafts)
  }

  fn try_rule(
    &mut self,
    rule: Rule,
    text: &str,
    pos: usize,
    map: &LineMap,
    frame: Frame,
  ) -> Result<Option<Step>, LexError> {
    let rest = &text[pos..];
    let rules = self.rules;
    let re = rules.get(rule);

    let step = match rule {
      Rule::YamlHeader => {
        if !frame.root || pos != 0 {
          return Ok(None);
        }
        re.captures(rest).map(|caps| {
          Step::ready(caps[0].len(), TokenKind::YamlHeader {
            content: group(&caps, 1).to_owned(),
          })
        })
      },
      Rule::Newline => re.find(rest).map(|m| Step::ready(m.end(), TokenKind::Newline)),
      Rule::Code => {
        re.find(rest).map(|m| {
          let code: String = m
            .as_str()
            .split_inclusive('\n')
            .map(|line| line.strip_prefix("    ").unwrap_or(line))
            .collect();
          let code = if self.options.pedantic {
            code
          } else {
            code.trim_end_matches('\n').to_owned()
          };
          Step::ready(m.end(), TokenKind::Code {
            lang:   None,
            text:   code,
            fenced: false,
          })
        })
      },
      Rule::Fences => re.captures(rest).and_then(|caps| fences(rest, &caps)),
      Rule::Heading => {
        re.captures(rest).map(|caps| {
          Step {
            len:  caps[0].len(),
            kind: DraftKind::Heading {
              depth:   heading_depth(group(&caps, 1)),
              content: inline_at(text, map, pos, &caps, 2),
            },
          }
        })
      },
      Rule::LHeading => {
        re.captures(rest).map(|caps| {
          Step {
            len:  caps[0].len(),
            kind: DraftKind::Heading {
              depth:   if group(&caps, 2) == "=" { 1 } else { 2 },
              content: inline_at(text, map, pos, &caps, 1),
            },
          }
        })
      },
      Rule::NpTable | Rule::Table => {
        re.captures(rest).map(|caps| table(text, map, pos, &caps))
      },
      Rule::Hr => re.find(rest).map(|m| Step::ready(m.end(), TokenKind::Hr)),
      Rule::Note => {
        if !frame.quote || pos != 0 {
          return Ok(None);
        }
        re.captures(rest).map(|caps| {
          Step::ready(caps[0].len(), TokenKind::Note {
            kind: group(&caps, 1).to_uppercase(),
          })
        })
      },
      Rule::Blockquote => self.blockquote(text, pos, map, frame)?,
      Rule::List => self.list(text, pos, map, frame)?,
      Rule::Html => {
        if !re.is_match(rest) {
          return Ok(None);
        }
        html(rest).map(|(len, pre)| {
          let content = rest[..len].trim_end();
          Step {
            len,
            kind: DraftKind::Html {
              pre,
              content: Inline {
                text: content.to_owned(),
                map:  map.slice(text, pos..pos + content.len()),
              },
            },
          }
        })
      },
      Rule::Def => {
        if !frame.top || frame.bq {
          return Ok(None);
        }
        re.captures(rest).map(|caps| self.definition(&caps))
      },
      Rule::IncludeBlock => {
        re.captures(rest).map(|caps| {
          Step::ready(caps[0].len(), TokenKind::Include {
            title:   group(&caps, 1).to_owned(),
            path:    group(&caps, 2).to_owned(),
            tooltip: caps.get(3).map(|m| m.as_str().to_owned()),
          })
        })
      },
      Rule::CodeSnippet => {
        re.captures(rest).map(|caps| {
          let target = group(&caps, 3);
          let (path, query) = match target.find(['#', '?']) {
            Some(at) => (&target[..at], Some(target[at..].to_owned())),
            None => (target, None),
          };
          Step::ready(
            caps[0].len(),
            TokenKind::CodeSnippet(CodeSnippetToken {
              lang: caps.get(1).map(|m| m.as_str().to_lowercase()),
              name: group(&caps, 2).to_owned(),
              path: path.to_owned(),
              query,
              title: caps.get(4).map(|m| m.as_str().to_owned()),
            }),
          )
        })
      },
      Rule::Paragraph => {
        if !frame.top {
          return Ok(None);
        }
        self.paragraph(text, pos, map)
      },
      Rule::BlockText => {
        re.find(rest).map(|m| {
          Step {
            len:  m.end(),
            kind: DraftKind::Text(Inline {
              text: m.as_str().to_owned(),
              map:  map.slice(text, pos..pos + m.end()),
            }),
          }
        })
      },
      _ => None,
    };

    Ok(step)
  }

  fn definition(&mut self, caps: &Captures<'_>) -> Step {
    let label = group(caps, 1).to_owned();
    let href = group(caps, 2).to_owned();
    let title = caps.get(3).map(|m| m.as_str().to_owned());
    self
      .links
      .entry(normalize_label(&label))
      .or_insert_with(|| LinkDef {
        href:  href.clone(),
        title: title.clone(),
      });
    Step::ready(caps[0].len(), TokenKind::Def { label, href, title })
  }

  /// A run of `>` lines, each followed by its lazy continuation lines.
  fn blockquote(
    &mut self,
    text: &str,
    pos: usize,
    map: &LineMap,
    frame: Frame,
  ) -> Result<Option<Step>, LexError> {
    let rest = &text[pos..];
    let rules = self.rules;
    let start = rules.get(Rule::Blockquote);
    let def = rules.get(Rule::Def);

    let mut end = 0;
    while start.is_match(&rest[end..]) {
      end += line_len(&rest[end..]);
      while end < rest.len() {
        let next = &rest[end..];
        if is_blank(first_line(next)) || def.is_match(next) {
          break;
        }
        end += line_len(next);
      }
      end += newline_run(&rest[end..]);
    }
    if end == 0 {
      return Ok(None);
    }

    let (inner, inner_map) = map.strip_lines(text, pos..pos + end, |_, line| {
      let spaces = leading_spaces(line);
      if line[spaces..].starts_with('>') {
        spaces + 1 + usize::from(line[spaces + 1..].starts_with(' '))
      } else {
        0
      }
    });
    let children = self.lex(&inner, &inner_map, Frame {
      bq: true,
      quote: true,
      root: false,
      ..frame
    })?;

    Ok(Some(Step {
      len:  end,
      kind: DraftKind::Blockquote(children),
    }))
  }

  fn list(
    &mut self,
    text: &str,
    pos: usize,
    map: &LineMap,
    frame: Frame,
  ) -> Result<Option<Step>, LexError> {
    let rest = &text[pos..];
    let Some(caps) = self.rules.get(Rule::List).captures(rest) else {
      return Ok(None);
    };
    let indent = caps.get(1).map_or("", |m| m.as_str());
    let bullet = group(&caps, 2);
    let ordered = bullet.len() > 1;
    let start = if ordered {
      bullet.trim_end_matches('.').parse().ok()
    } else {
      None
    };

    let len = self.list_end(rest, indent, caps[0].len());
    let raw = &rest[..len];

    let mut bounds = vec![0];
    let mut offset = line_len(raw);
    while offset < raw.len() {
      let line = &raw[offset..];
      if line
        .strip_prefix(indent)
        .is_some_and(|after| BULLET.is_match(after))
      {
        bounds.push(offset);
      }
      offset += line_len(line);
    }
    bounds.push(raw.len());

    let mut items = Vec::with_capacity(bounds.len() - 1);
    let mut next_loose = false;
    let last = bounds.len() - 2;
    for (index, window) in bounds.windows(2).enumerate() {
      // The newline right before the next bullet belongs to no item.
      let item_end = if index == last { window[1] } else { window[1] - 1 };
      let range = pos + window[0]..pos + item_end;
      let item_raw = &text[range.clone()];

      let bullet_len = BULLET_PREFIX.find(item_raw).map_or(0, |m| m.end());
      let dedent = item_raw[bullet_len..]
        .contains("\n ")
        .then_some(if self.options.pedantic { 4 } else { bullet_len });
      let (body, body_map) =
        map.strip_lines(text, range.clone(), |line_index, line| {
          if line_index == 0 {
            bullet_len
          } else {
            dedent.map_or(0, |max| leading_spaces(line).min(max))
          }
        });

      let mut loose = next_loose || has_inner_blank_line(&body);
      if index != last {
        next_loose = body.ends_with('\n');
        loose = loose || next_loose;
      }

      let children = self.lex(&body, &body_map, Frame {
        top: false,
        quote: false,
        root: false,
        ..frame
      })?;
      items.push(Draft {
        rule:   Rule::List,
        source: SourceInfo::new(map.locate(text, range.start), item_raw),
        kind:   DraftKind::ListItem { loose, children },
      });
    }

    Ok(Some(Step {
      len,
      kind: DraftKind::List {
        ordered,
        start,
        items,
      },
    }))
  }

  /// Length of the list starting at `rest`: up to a horizontal rule, a
  /// definition, two blank lines, one blank line followed by something that
  /// neither continues the item nor starts a sibling, or the end of input.
  fn list_end(&self, rest: &str, indent: &str, content_start: usize) -> usize {
    let hr = self.rules.get(Rule::Hr);
    let def = self.rules.get(Rule::Def);

    for (at, _) in rest.match_indices('\n') {
      if at <= content_start {
        continue;
      }
      let run = newline_run(&rest[at..]);
      let after = at + run;
      let next = &rest[after..];

      if next.trim().is_empty() {
        return rest.len();
      }
      let unindented = next.strip_prefix(indent).unwrap_or(next);
      if hr.is_match(unindented) || def.is_match(next) {
        return after;
      }
      if run >= 3 {
        return after;
      }
      if run == 2
        && !next.starts_with(' ')
        && !next
          .strip_prefix(indent)
          .is_some_and(|after| BULLET.is_match(after))
      {
        return after;
      }
    }
    rest.len()
  }

  fn paragraph(
    &self,
    text: &str,
    pos: usize,
    map: &LineMap,
  ) -> Option<Step> {
    let rest = &text[pos..];
    let line = self.rules.get(Rule::Paragraph);

    let mut end = 0;
    while let Some(m) = line.find(&rest[end..]) {
      end += m.end();
      let next = &rest[end..];
      if next.is_empty() || self.interrupts_paragraph(next) {
        break;
      }
    }
    if end == 0 {
      return None;
    }

    let content_len = rest[..end].strip_suffix('\n').map_or(end, str::len);
    let len = end + newline_run(&rest[end..]);
    Some(Step {
      len,
      kind: DraftKind::Paragraph(Inline {
        text: rest[..content_len].to_owned(),
        map:  map.slice(text, pos..pos + content_len),
      }),
    })
  }

  fn interrupts_paragraph(&self, next: &str) -> bool {
    let interrupts = [
      Rule::Hr,
      Rule::Heading,
      Rule::LHeading,
      Rule::Blockquote,
      Rule::Def,
    ];
    if interrupts
      .iter()
      .any(|rule| self.rules.get(*rule).is_match(next))
    {
      return true;
    }
    if block_tag_name(next, false).is_some() {
      return true;
    }
    self.options.gfm
      && (self.rules.get(Rule::Fences).is_match(next)
        || self.rules.get(Rule::List).is_match(next))
  }
}

fn fences(rest: &str, caps: &Captures<'_>) -> Option<Step> {
  let fence = group(caps, 1);
  let marker = fence.bytes().next()?;
  let open_len = caps[0].len();
  let body = &rest[open_len..];

  let mut start = 0;
  loop {
    let line_end = body[start..].find('\n').map_or(body.len(), |i| start + i);
    if closes_fence(&body[start..line_end], marker, fence.len()) {
      let len = open_len + line_end + newline_run(&body[line_end..]);
      return Some(Step::ready(len, TokenKind::Code {
        lang:   caps.get(2).map(|m| m.as_str().to_owned()),
        text:   body[..start].trim_end().to_owned(),
        fenced: true,
      }));
    }
    if line_end == body.len() {
      return None;
    }
    start = line_end + 1;
  }
}

/// A line of at most three spaces, at least `min` fence markers and nothing
/// but spaces after them.
fn closes_fence(line: &str, marker: u8, min: usize) -> bool {
  let indent = leading_spaces(line);
  let run = line.bytes().skip(indent).take_while(|b| *b == marker).count();
  indent <= 3
    && run >= min
    && line.bytes().skip(indent + run).all(|b| b == b' ')
}

#[allow(
  clippy::cast_possible_truncation,
  reason = "Heading markers are at most six characters"
)]
const fn heading_depth(marks: &str) -> u8 {
  marks.len() as u8
}

/// Capture group `group` as inline content, positioned in the document.
fn inline_at(
  text: &str,
  map: &LineMap,
  pos: usize,
  caps: &Captures<'_>,
  group: usize,
) -> Inline {
  caps.get(group).map_or_else(
    || {
      Inline {
        text: String::new(),
        map:  map.slice(text, pos..pos),
      }
    },
    |m| {
      Inline {
        text: m.as_str().to_owned(),
        map:  map.slice(text, pos + m.start()..pos + m.end()),
      }
    },
  )
}

fn table(text: &str, map: &LineMap, pos: usize, caps: &Captures<'_>) -> Step {
  let rest = &text[pos..];
  let header_len = first_line(rest).len();
  let align_start = header_len + 1;
  let align_line = first_line(&rest[align_start..]);

  let header = split_cells(first_line(rest))
    .into_iter()
    .map(|r| cell(text, map, pos + r.start..pos + r.end))
    .collect();
  let align = split_cells(align_line)
    .into_iter()
    .map(|r| parse_align(&align_line[r]))
    .collect();

  let mut rows = Vec::new();
  if let Some(body) = caps.get(3) {
    let mut offset = body.start();
    for line in body.as_str().split_inclusive('\n') {
      let content = line.strip_suffix('\n').unwrap_or(line);
      if !content.trim().is_empty() {
        let base = pos + offset;
        rows.push(
          split_cells(content)
            .into_iter()
            .map(|r| cell(text, map, base + r.start..base + r.end))
            .collect(),
        );
      }
      offset += line.len();
    }
  }

  Step {
    len:  caps[0].len(),
    kind: DraftKind::Table {
      align,
      header,
      rows,
    },
  }
}

fn cell(text: &str, map: &LineMap, range: Range<usize>) -> Inline {
  Inline {
    text: text[range.clone()].to_owned(),
    map:  map.slice(text, range),
  }
}

/// Cell ranges of a table row, with outer pipes and padding removed.
fn split_cells(line: &str) -> Vec<Range<usize>> {
  let mut start = leading_spaces(line);
  if line[start..].starts_with('|') {
    start += 1;
  }
  let mut end = line.trim_end().len().max(start);
  if end > start && line[..end].ends_with('|') {
    end -= 1;
  }

  let mut cells = Vec::new();
  let mut cell_start = start;
  for (at, ch) in line[start..end].char_indices() {
    if ch == '|' {
      cells.push(trim_range(line, cell_start..start + at));
      cell_start = start + at + 1;
    }
  }
  cells.push(trim_range(line, cell_start..end));
  cells
}

fn trim_range(line: &str, range: Range<usize>) -> Range<usize> {
  let slice = &line[range.clone()];
  let start = range.start + (slice.len() - slice.trim_start().len());
  let end = (range.start + slice.trim_end().len()).max(start);
  start..end
}

fn parse_align(cell: &str) -> Option<Align> {
  match (cell.starts_with(':'), cell.ends_with(':')) {
    (true, true) => Some(Align::Center),
    (false, true) => Some(Align::Right),
    (true, false) => Some(Align::Left),
    (false, false) => None,
  }
}

/// Length and `pre` flag of an html block at the start of `rest`.
fn html(rest: &str) -> Option<(usize, bool)> {
  let spaces = leading_spaces(rest);
  let tail = &rest[spaces..];

  if tail.starts_with("<!--") {
    let mut from = 4;
    while let Some(found) = tail[from..].find("-->") {
      let close = from + found + 3;
      if let Some(len) = html_block_end(&tail[close..], false) {
        return Some((spaces + close + len, false));
      }
      from = close;
    }
    return None;
  }

  let name = block_tag_name(rest, true)?;
  let pre = matches!(name, "pre" | "script" | "style");
  let name_end = spaces + 1 + name.len();

  let closer = format!("</{name}>");
  let body_start = name_end + rest[name_end..].chars().next()?.len_utf8();
  let mut from = body_start;
  while let Some(found) = rest[from..].find(&closer) {
    let close = from + found + closer.len();
    if let Some(len) = html_block_end(&rest[close..], true) {
      return Some((close + len, pre));
    }
    from = close;
  }

  let open = OPEN_TAG.find(rest)?;
  html_block_end(&rest[open.end()..], true).map(|len| (open.end() + len, pre))
}

/// What may follow an html block: trailing spaces, then a blank line (or
/// just a newline for comments), or nothing but whitespace until the end.
fn html_block_end(after: &str, needs_blank_line: bool) -> Option<usize> {
  let spaces = leading_spaces(after);
  let tail = &after[spaces..];
  if tail.trim().is_empty() {
    return Some(after.len());
  }
  let run = newline_run(tail);
  if (needs_blank_line && run >= 2) || (!needs_blank_line && run >= 1) {
    let consumed = if needs_blank_line { run } else { 1 };
    return Some(spaces + consumed);
  }
  None
}

/// The tag name opening a block-level html element at the start of `rest`.
fn block_tag_name(rest: &str, allow_indent: bool) -> Option<&str> {
  let spaces = if allow_indent { leading_spaces(rest) } else { 0 };
  let tail = rest[spaces..].strip_prefix('<')?;
  let len = tail
    .char_indices()
    .find(|(_, c)| !(c.is_alphanumeric() || *c == '_'))
    .map_or(tail.len(), |(at, _)| at);
  if len == 0 {
    return None;
  }
  let name = &tail[..len];
  if INLINE_TAGS.contains(&name) {
    return None;
  }
  let after = &tail[len..];
  if after.starts_with(":/") {
    return None;
  }
  let before_at = after
    .find(|c: char| c.is_alphanumeric() || c == '_' || c.is_whitespace() || c == '@')
    .map_or(after, |at| &after[..at]);
  if after[before_at.len()..].starts_with('@') {
    return None;
  }
  Some(name)
}

/// Capture group `index`, or an empty string when it did not participate.
pub(super) fn group<'t>(caps: &Captures<'t>, index: usize) -> &'t str {
  caps.get(index).map_or("", |m| m.as_str())
}

fn first_line(text: &str) -> &str {
  text.split('\n').next().unwrap_or_default()
}

/// Length of the first line including its newline.
fn line_len(text: &str) -> usize {
  text.find('\n').map_or(text.len(), |at| at + 1)
}

fn newline_run(text: &str) -> usize {
  text.bytes().take_while(|b| *b == b'\n').count()
}

/// A blank line followed by more content.
fn has_inner_blank_line(text: &str) -> bool {
  text
    .match_indices("\n\n")
    .any(|(at, _)| !text[at + 2..].trim().is_empty())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_split_cells() {
    let line = "| a | b c |  d|";
    let cells: Vec<_> = split_cells(line).into_iter().map(|r| &line[r]).collect();
    assert_eq!(cells, ["a", "b c", "d"]);

    let line = "a | b";
    let cells: Vec<_> = split_cells(line).into_iter().map(|r| &line[r]).collect();
    assert_eq!(cells, ["a", "b"]);
  }

  #[test]
  fn test_block_tag_name() {
    assert_eq!(block_tag_name("<div>", false), Some("div"));
    assert_eq!(block_tag_name("  <section id=x>", true), Some("section"));
    assert_eq!(block_tag_name("<span>", false), None);
    assert_eq!(block_tag_name("<http://x>", false), None);
    assert_eq!(block_tag_name("<me@example.com>", false), None);
  }

  #[test]
  fn test_html_comment_block() {
    assert_eq!(html("<!-- note -->\nnext"), Some((14, false)));
    assert_eq!(html("<!-- open"), None);
  }

  #[test]
  fn test_html_pre_block() {
    let (len, pre) = html("<pre>\ncode\n</pre>\n\nafter").unwrap_or_default();
    assert!(pre);
    assert_eq!(len, "<pre>\ncode\n</pre>\n\n".len());
  }

  #[test]
  fn test_fence_closer_must_own_its_line() {
    assert!(closes_fence("```", b'`', 3));
    assert!(closes_fence("   ````  ", b'`', 3));
    assert!(!closes_fence("    ```", b'`', 3));
    assert!(!closes_fence("``", b'`', 3));
    assert!(!closes_fence("let s = x```", b'`', 3));
    assert!(!closes_fence("``` rust", b'`', 3));
    assert!(!closes_fence("~~~", b'`', 3));
  }

  #[test]
  fn test_inner_blank_line() {
    assert!(has_inner_blank_line("a\n\nb"));
    assert!(!has_inner_blank_line("a\n\n"));
  }
}

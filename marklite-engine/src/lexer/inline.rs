use std::sync::Arc;

use super::{Inline, Links, ParseContext, block::group, normalize_label};
use crate::{
  error::LexError,
  rules::Rule,
  source::{LineMap, SourceInfo},
  token::{LinkKind, LinkToken, Token, TokenKind, TokenRef},
};

struct Step {
  len:  usize,
  kind: TokenKind,
}

pub(crate) struct InlineLexer<'a> {
  context: &'a Arc<ParseContext>,
  links:   &'a Links,
}

impl<'a> InlineLexer<'a> {
  pub(crate) const fn new(
    context: &'a Arc<ParseContext>,
    links: &'a Links,
  ) -> Self {
    Self { context, links }
  }

  pub(crate) const fn context(&self) -> &Arc<ParseContext> {
    self.context
  }

  pub(crate) fn lex(&self, inline: &Inline) -> Result<Vec<TokenRef>, LexError> {
    self.lex_text(&inline.text, &inline.map, false)
  }

  /// The whole of `inline` as a single text token, for content that is not
  /// parsed any further.
  pub(crate) fn verbatim(&self, inline: &Inline) -> TokenRef {
    self.token(
      Rule::InlineText,
      &inline.text,
      &inline.map,
      0..inline.text.len(),
      TokenKind::InlineText {
        text: inline.text.clone(),
      },
    )
  }

  fn lex_text(
    &self,
    text: &str,
    map: &LineMap,
    mut in_link: bool,
  ) -> Result<Vec<TokenRef>, LexError> {
    let rules = &self.context.rules;
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < text.len() {
      let mut matched = None;
      for rule in Rule::INLINE_ORDER {
        if !rules.is_enabled(rule) {
          continue;
        }
        if let Some(step) = self.try_rule(rule, text, pos, map, &mut in_link)?
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
      tokens.push(self.token(rule, text, map, pos..end, step.kind));
      pos = end;
    }

    Ok(tokens)
  }

  fn token(
    &self,
    rule: Rule,
    text: &str,
    map: &LineMap,
    range: std::ops::Range<usize>,
    kind: TokenKind,
  ) -> TokenRef {
    Token::new(
      rule,
      Arc::clone(self.context),
      SourceInfo::new(map.locate(text, range.start), &text[range]),
      kind,
    )
  }

  /// Lex `text[start..end]` as the content of an enclosing inline token.
  fn lex_span(
    &self,
    text: &str,
    map: &LineMap,
    start: usize,
    end: usize,
    in_link: bool,
  ) -> Result<Vec<TokenRef>, LexError> {
    self.lex_text(&text[start..end], &map.slice(text, start..end), in_link)
  }

  fn try_rule(
    &self,
    rule: Rule,
    text: &str,
    pos: usize,
    map: &LineMap,
    in_link: &mut bool,
  ) -> Result<Option<Step>, LexError> {
    let rest = &text[pos..];
    let options = self.context.options;
    let re = self.context.rules.get(rule);

    let step = match rule {
      Rule::Escape => {
        re.captures(rest).map(|caps| {
          Step {
            len:  caps[0].len(),
            kind: TokenKind::Escape {
              text: group(&caps, 1).to_owned(),
            },
          }
        })
      },
      Rule::Xref => {
        re.captures(rest).and_then(|caps| {
          let shorthand = caps.get(1).is_none();
          let glued = text[..pos]
            .chars()
            .next_back()
            .is_some_and(|c| c.is_alphanumeric() || c == '_');
          (!(shorthand && glued)).then(|| {
            Step {
              len:  caps[0].len(),
              kind: TokenKind::Xref {
                uid: caps
                  .get(1)
                  .or_else(|| caps.get(2))
                  .map_or_else(String::new, |m| m.as_str().to_owned()),
              },
            }
          })
        })
      },
      Rule::IncludeInline => {
        re.captures(rest).map(|caps| {
          Step {
            len:  caps[0].len(),
            kind: TokenKind::InlineInclude {
              title:   group(&caps, 1).to_owned(),
              path:    group(&caps, 2).to_owned(),
              tooltip: caps.get(3).map(|m| m.as_str().to_owned()),
            },
          }
        })
      },
      Rule::Autolink => {
        match re.captures(rest) {
          Some(caps) => {
            let target = group(&caps, 1);
            let (href, label) = if group(&caps, 2) == "@" {
              let address = target.strip_prefix("mailto:").unwrap_or(target);
              (format!("mailto:{address}"), address)
            } else {
              (target.to_owned(), target)
            };
            let label_start =
              pos + caps.get(1).map_or(0, |m| m.start()) + (target.len() - label.len());
            let child = self.token(
              Rule::InlineText,
              text,
              map,
              label_start..label_start + label.len(),
              TokenKind::InlineText {
                text: label.to_owned(),
              },
            );
            Some(Step {
              len:  caps[0].len(),
              kind: TokenKind::Link(LinkToken {
                href,
                title: None,
                link: LinkKind::Auto,
                content: vec![child],
              }),
            })
          },
          None => None,
        }
      },
      Rule::Url => {
        if *in_link {
          return Ok(None);
        }
        re.find(rest).map(|m| {
          let child = self.token(
            Rule::InlineText,
            text,
            map,
            pos..pos + m.end(),
            TokenKind::InlineText {
              text: m.as_str().to_owned(),
            },
          );
          Step {
            len:  m.end(),
            kind: TokenKind::Link(LinkToken {
              href:    m.as_str().to_owned(),
              title:   None,
              link:    LinkKind::Url,
              content: vec![child],
            }),
          }
        })
      },
      Rule::Tag => {
        re.find(rest).map(|m| {
          let raw = m.as_str();
          let lower = raw.to_ascii_lowercase();
          if !*in_link && lower.starts_with("<a ") {
            *in_link = true;
          } else if *in_link && lower.starts_with("</a>") {
            *in_link = false;
          }
          Step {
            len:  m.end(),
            kind: TokenKind::Tag {
              raw: raw.to_owned(),
            },
          }
        })
      },
      Rule::Link => {
        match re.captures(rest) {
          Some(caps) => {
            let title = caps.get(3).map(|m| m.as_str().to_owned());
            let href = group(&caps, 2).trim().to_owned();
            let kind = if rest.starts_with('!') {
              TokenKind::Image {
                href,
                title,
                alt: group(&caps, 1).to_owned(),
              }
            } else {
              let label = caps.get(1).map_or(1..1, |m| m.range());
              TokenKind::Link(LinkToken {
                href,
                title,
                link: LinkKind::Inline,
                content: self.lex_span(
                  text,
                  map,
                  pos + label.start,
                  pos + label.end,
                  true,
                )?,
              })
            };
            Some(Step {
              len: caps[0].len(),
              kind,
            })
          },
          None => None,
        }
      },
      Rule::RefLink | Rule::NoLink => {
        match re.captures(rest) {
          Some(caps) => Some(self.reference(text, pos, map, &caps)?),
          None => None,
        }
      },
      Rule::Strong => {
        if !re.is_match(rest) {
          return Ok(None);
        }
        match strong_close(rest, options.pedantic) {
          Some(close) => {
            Some(Step {
              len:  close + 2,
              kind: TokenKind::Strong {
                content: self.lex_span(text, map, pos + 2, pos + close, *in_link)?,
              },
            })
          },
          None => None,
        }
      },
      Rule::Em => {
        if !re.is_match(rest) {
          return Ok(None);
        }
        match em_close(rest, options.pedantic) {
          Some(close) => {
            Some(Step {
              len:  close + 1,
              kind: TokenKind::Em {
                content: self.lex_span(text, map, pos + 1, pos + close, *in_link)?,
              },
            })
          },
          None => None,
        }
      },
      Rule::CodeSpan => {
        re.find(rest).and_then(|m| {
          code_span(rest, m.end()).map(|(len, code)| {
            Step {
              len,
              kind: TokenKind::CodeSpan { text: code },
            }
          })
        })
      },
      Rule::Br => {
        re.find(rest).and_then(|m| {
          (!rest[m.end()..].trim().is_empty()).then_some(Step {
            len:  m.end(),
            kind: TokenKind::Br,
          })
        })
      },
      Rule::Del => {
        if !re.is_match(rest) {
          return Ok(None);
        }
        match del_close(rest) {
          Some(close) => {
            Some(Step {
              len:  close + 2,
              kind: TokenKind::Del {
                content: self.lex_span(text, map, pos + 2, pos + close, *in_link)?,
              },
            })
          },
          None => None,
        }
      },
      Rule::InlineText => {
        let first = rest.chars().next().map_or(0, char::len_utf8);
        let end = re.find_at(rest, first).map_or(rest.len(), |m| m.start());
        Some(Step {
          len:  end,
          kind: TokenKind::InlineText {
            text: rest[..end].to_owned(),
          },
        })
      },
      _ => None,
    };

    Ok(step)
  }

  /// `[text][label]` or `[label]`. An unknown label gives back only the
  /// opening bracket as text, so the rest is lexed again.
  fn reference(
    &self,
    text: &str,
    pos: usize,
    map: &LineMap,
    caps: &regex::Captures<'_>,
  ) -> Result<Step, LexError> {
    let rest = &text[pos..];
    let label = match caps.get(2) {
      Some(m) if !m.as_str().trim().is_empty() => m.as_str(),
      _ => group(caps, 1),
    };

    let Some(def) = self
      .links
      .get(&normalize_label(label))
      .filter(|def| !def.href.is_empty())
    else {
      let first = rest.chars().next().map_or(1, char::len_utf8);
      return Ok(Step {
        len:  first,
        kind: TokenKind::InlineText {
          text: rest[..first].to_owned(),
        },
      });
    };

    let kind = if rest.starts_with('!') {
      TokenKind::Image {
        href:  def.href.clone(),
        title: def.title.clone(),
        alt:   group(caps, 1).to_owned(),
      }
    } else {
      let inner = caps.get(1).map_or(1..1, |m| m.range());
      TokenKind::Link(LinkToken {
        href:    def.href.clone(),
        title:   def.title.clone(),
        link:    LinkKind::Reference,
        content: self.lex_span(text, map, pos + inner.start, pos + inner.end, true)?,
      })
    };
    Ok(Step {
      len: caps[0].len(),
      kind,
    })
  }
}

fn preceded_by_space(rest: &str, at: usize) -> bool {
  rest[..at].chars().next_back().is_some_and(char::is_whitespace)
}

/// Offset of the `**`/`__` closing a strong run that opens `rest`.
fn strong_close(rest: &str, pedantic: bool) -> Option<usize> {
  let bytes = rest.as_bytes();
  let marker = *bytes.first()?;
  (3..bytes.len().saturating_sub(1)).find(|&at| {
    bytes[at] == marker
      && bytes[at + 1] == marker
      && bytes.get(at + 2) != Some(&marker)
      && !(pedantic && preceded_by_space(rest, at))
  })
}

/// Offset of the delimiter closing an emphasis run that opens `rest`.
fn em_close(rest: &str, pedantic: bool) -> Option<usize> {
  let bytes = rest.as_bytes();
  let marker = *bytes.first()?;

  if pedantic {
    return (2..bytes.len()).find(|&at| {
      bytes[at] == marker
        && bytes.get(at + 1) != Some(&marker)
        && !preceded_by_space(rest, at)
    });
  }

  let mut at = 1;
  while at < bytes.len() {
    if marker == b'_' {
      if bytes[at] == b'_' {
        let boundary = rest[at + 1..]
          .chars()
          .next()
          .is_none_or(|c| !(c.is_alphanumeric() || c == '_'));
        if at >= 2 && boundary {
          return Some(at);
        }
        if bytes.get(at + 1) == Some(&b'_') {
          at += 2;
          continue;
        }
        return None;
      }
      at += 1;
    } else {
      if at >= 2 && bytes[at] == b'*' && bytes.get(at + 1) != Some(&b'*') {
        return Some(at);
      }
      at += if bytes[at..].starts_with(b"**") { 2 } else { 1 };
    }
  }
  None
}

/// Offset of the `~~` closing a strike-through run that opens `rest`.
fn del_close(rest: &str) -> Option<usize> {
  let bytes = rest.as_bytes();
  (3..bytes.len().saturating_sub(1)).find(|&at| {
    bytes[at] == b'~' && bytes[at + 1] == b'~' && !preceded_by_space(rest, at)
  })
}

/// A code span opened by the backtick run `rest[..open]` and closed by a run
/// of the same length. Returns the consumed length and the trimmed code.
fn code_span(rest: &str, open: usize) -> Option<(usize, String)> {
  let bytes = rest.as_bytes();
  let mut at = open;
  while at < bytes.len() {
    if bytes[at] != b'`' {
      at += 1;
      continue;
    }
    let run = bytes[at..].iter().take_while(|b| **b == b'`').count();
    if run == open {
      let code = &rest[open..at];
      if code.trim().is_empty() {
        return None;
      }
      return Some((at + run, code.trim().to_owned()));
    }
    at += run;
  }
  None
}

#[cfg(test)]
mod tests {
  #![allow(clippy::unwrap_used, clippy::panic, reason = "Fine in tests")]
  use super::*;
  use crate::{
    Lexer,
    LexerOptions,
    token::{collect, plain_text},
  };

  fn inline(source: &str, options: LexerOptions) -> Vec<TokenRef> {
    let doc = Lexer::new(options).tokenize(source, None).unwrap();
    match &doc.tokens[0].kind {
      TokenKind::Paragraph { content } => content.clone(),
      other => panic!("unexpected block {}", other.name()),
    }
  }

  fn names(tokens: &[TokenRef]) -> Vec<&'static str> {
    tokens.iter().map(|t| t.kind.name()).collect()
  }

  #[test]
  fn test_emphasis_closers() {
    assert_eq!(strong_close("**a**", false), Some(3));
    assert_eq!(strong_close("**a***", false), Some(4));
    assert_eq!(strong_close("**a", false), None);
    assert_eq!(em_close("*a*", false), Some(2));
    assert_eq!(em_close("*a **b** c*", false), Some(10));
    assert_eq!(em_close("_snake_case", false), None);
    assert_eq!(em_close("_a__b_ c", false), Some(5));
    assert_eq!(em_close("* a *", true), None);
    assert_eq!(em_close("*a b*", true), Some(4));
    assert_eq!(em_close("*é*", false), Some(3));
    assert_eq!(em_close("*日本語 **x** ü*", false), Some(19));
    assert_eq!(em_close("_ü_", false), Some(3));
    assert_eq!(strong_close("**ß**", false), Some(4));
  }

  #[test]
  fn test_emphasis_with_non_ascii_content() {
    let tokens = inline("Say *日本語* now\n", LexerOptions::default());
    assert_eq!(names(&tokens), ["inline_text", "em", "inline_text"]);
    assert_eq!(plain_text(&tokens), "Say 日本語 now");

    let tokens = inline("**é** and _ñ_ 🎉\n", LexerOptions::default());
    assert_eq!(tokens[0].kind.name(), "strong");
    assert_eq!(plain_text(&tokens), "é and ñ 🎉");
  }

  #[test]
  fn test_code_span() {
    assert_eq!(code_span("`a` b", 1), Some((3, "a".to_owned())));
    assert_eq!(code_span("`` a`b ``", 2), Some((9, "a`b".to_owned())));
    assert_eq!(code_span("``a`", 2), None);
  }

  #[test]
  fn test_inline_kinds() {
    let tokens = inline(
      "Text with *em*, **strong**, `code`, ~~del~~ and [a link](/x \"T\").\n",
      LexerOptions::default(),
    );
    let kinds = names(&tokens);
    for expected in ["em", "strong", "code_span", "del", "link"] {
      assert!(kinds.contains(&expected), "missing {expected} in {kinds:?}");
    }
  }

  #[test]
  fn test_link_content_positions() {
    let tokens = inline("go [**here**](/x)\n", LexerOptions::default());
    let TokenKind::Link(link) = &tokens[1].kind else {
      panic!("expected link");
    };
    assert_eq!(link.href, "/x");
    assert_eq!(link.content[0].kind.name(), "strong");
    assert_eq!(link.content[0].source.column, 5);
  }

  #[test]
  fn test_image() {
    let tokens = inline("![alt text](/img.png)\n", LexerOptions::default());
    let TokenKind::Image { href, alt, .. } = &tokens[0].kind else {
      panic!("expected image");
    };
    assert_eq!(href, "/img.png");
    assert_eq!(alt, "alt text");
  }

  #[test]
  fn test_autolink_and_url() {
    let tokens = inline(
      "Mail <mailto:me@example.com> or see https://example.com/a.\n",
      LexerOptions::default(),
    );
    let links = collect(&tokens, |t| matches!(t.kind, TokenKind::Link(_)));
    assert_eq!(links.len(), 2);
    let TokenKind::Link(mail) = &links[0].kind else {
      panic!("expected link");
    };
    assert_eq!(mail.href, "mailto:me@example.com");
    assert_eq!(plain_text(&mail.content), "me@example.com");
    let TokenKind::Link(url) = &links[1].kind else {
      panic!("expected link");
    };
    assert_eq!(url.href, "https://example.com/a");
  }

  #[test]
  fn test_no_bare_urls_inside_anchor_tags() {
    let tokens = inline(
      "<a href=\"x\">https://example.com</a>\n",
      LexerOptions::default(),
    );
    assert!(collect(&tokens, |t| matches!(t.kind, TokenKind::Link(_))).is_empty());
  }

  #[test]
  fn test_escape_and_breaks() {
    let tokens = inline("a \\* b  \nnext\n", LexerOptions::default());
    assert_eq!(names(&tokens), ["inline_text", "escape", "inline_text", "br", "inline_text"]);

    let breaks = LexerOptions {
      breaks: true,
      ..LexerOptions::default()
    };
    let tokens = inline("one\ntwo\n", breaks);
    assert_eq!(names(&tokens), ["inline_text", "br", "inline_text"]);
  }

  #[test]
  fn test_xref_forms() {
    let tokens = inline(
      "See @System.String and <xref:System.Int32>, not me@example.com.\n",
      LexerOptions::dfm(),
    );
    let uids: Vec<_> = tokens
      .iter()
      .filter_map(|t| match &t.kind {
        TokenKind::Xref { uid } => Some(uid.as_str()),
        _ => None,
      })
      .collect();
    assert_eq!(uids, ["System.String", "System.Int32"]);
  }

  fn xrefs(source: &str) -> Vec<String> {
    inline(source, LexerOptions::dfm())
      .iter()
      .filter_map(|t| match &t.kind {
        TokenKind::Xref { uid } => Some(uid.clone()),
        _ => None,
      })
      .collect()
  }

  #[test]
  fn test_xref_uid_characters() {
    assert_eq!(
      xrefs("Use @System.Collections.Generic.List`1 here.\n"),
      ["System.Collections.Generic.List`1"]
    );
    assert_eq!(xrefs("See @System.String.\n"), ["System.String"]);
    assert_eq!(xrefs("(@_private.Field, x)\n"), ["_private.Field"]);
    assert_eq!(xrefs("@Ns:Type#Member!\n"), ["Ns:Type#Member"]);
    assert_eq!(xrefs("@a/b?x\n"), ["a"]);
    assert_eq!(xrefs("@foo\"bar\"\n"), ["foo"]);
    assert!(xrefs("@1abc and @-x\n").is_empty());
  }

  #[test]
  fn test_inline_include() {
    let tokens = inline(
      "Shared: [!include[Note](../includes/note.md)] done\n",
      LexerOptions::dfm(),
    );
    assert!(tokens.iter().any(|t| matches!(
      &t.kind,
      TokenKind::InlineInclude { path, .. } if path == "../includes/note.md"
    )));
  }

  #[test]
  fn test_text_progress_on_stray_delimiters() {
    let tokens = inline("a * b _ c [ d ` e\n", LexerOptions::default());
    assert_eq!(plain_text(&tokens), "a * b _ c [ d ` e");
  }
}

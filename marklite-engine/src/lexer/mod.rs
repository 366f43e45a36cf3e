//! Two-phase regex lexer.
//!
//! The block phase walks the normalized document with the block rules in
//! priority order, recursing into blockquotes and list items, and records
//! link definitions as it meets them. Block content that needs inline lexing
//! is kept aside as text plus a [`LineMap`], so the inline phase can run once
//! every definition in the document is known.
//!
//! # Examples
//!
//! ```
//! use marklite_engine::{Lexer, LexerOptions, TokenKind};
//!
//! let lexer = Lexer::new(LexerOptions::default());
//! let doc = lexer.tokenize("# Title\n\nSome *text*.\n", None).unwrap();
//!
//! assert!(matches!(doc.tokens[0].kind, TokenKind::Heading(_)));
//! assert_eq!(doc.tokens[1].source.line, 3);
//! ```
mod block;
mod inline;

use std::{collections::HashMap, sync::Arc};

use log::trace;
use serde::Serialize;

use self::{block::BlockLexer, inline::InlineLexer};
use crate::{
  error::LexError,
  rules::{Rule, RuleSet},
  source::{LineMap, SourceInfo},
  token::{HeadingToken, TableCell, TableToken, Token, TokenKind, TokenRef},
  types::LexerOptions,
};

/// A link reference definition, `[label]: href "title"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkDef {
  pub href:  String,
  pub title: Option<String>,
}

/// Link definitions keyed by normalized label.
pub type Links = HashMap<String, LinkDef>;

/// Normalize a reference label: collapse whitespace runs and lowercase.
#[must_use]
pub fn normalize_label(label: &str) -> String {
  label.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// What every token of one document shares.
#[derive(Debug)]
pub struct ParseContext {
  pub options: LexerOptions,
  pub rules:   Arc<RuleSet>,
  pub file:    Option<String>,
}

/// The result of lexing one document.
#[derive(Debug, Clone)]
pub struct LexedDocument {
  pub tokens:  Vec<TokenRef>,
  pub links:   Links,
  pub context: Arc<ParseContext>,
  /// The normalized text the tokens' raw spans were taken from.
  pub text:    String,
}

/// Lexer bound to one rule table.
#[derive(Debug, Clone)]
pub struct Lexer {
  options: LexerOptions,
  rules:   Arc<RuleSet>,
}

impl Lexer {
  /// Lexer using the built-in rule table for `options`.
  #[must_use]
  pub fn new(options: LexerOptions) -> Self {
    let options = options.normalized();
    Self {
      rules: RuleSet::for_options(&options),
      options,
    }
  }

  /// Lexer using a custom rule table, for derived dialects.
  #[must_use]
  pub fn with_rules(options: LexerOptions, rules: Arc<RuleSet>) -> Self {
    Self {
      options: options.normalized(),
      rules,
    }
  }

  #[must_use]
  pub const fn options(&self) -> &LexerOptions {
    &self.options
  }

  #[must_use]
  pub const fn rules(&self) -> &Arc<RuleSet> {
    &self.rules
  }

  /// Tokenize `source`.
  ///
  /// # Errors
  ///
  /// Returns [`LexError::NoProgress`] if the rule table cannot consume some
  /// part of the input. The built-in tables always can.
  pub fn tokenize(
    &self,
    source: &str,
    file: Option<&str>,
  ) -> Result<LexedDocument, LexError> {
    let text = normalize(source);
    let context = Arc::new(ParseContext {
      options: self.options,
      rules:   Arc::clone(&self.rules),
      file:    file.map(str::to_owned),
    });

    let map = LineMap::new(&text);
    let mut links = Links::new();
    let drafts = BlockLexer::new(&self.rules, self.options, &mut links).lex(
      &text,
      &map,
      block::Frame::ROOT,
    )?;
    trace!("Block phase produced {} top-level tokens", drafts.len());

    let inline = InlineLexer::new(&context, &links);
    let tokens = finish_all(drafts, &inline)?;

    Ok(LexedDocument {
      tokens,
      links,
      context,
      text,
    })
  }
}

/// Normalize line endings, tabs and whitespace-only lines.
///
/// `\r\n` and `\r` become `\n`, tabs become four spaces, non-breaking spaces
/// become plain spaces, U+2424 becomes a newline, and lines holding only
/// spaces are emptied.
#[must_use]
pub fn normalize(source: &str) -> String {
  let unified = source
    .replace("\r\n", "\n")
    .replace('\r', "\n")
    .replace('\t', "    ")
    .replace('\u{a0}', " ")
    .replace('\u{2424}', "\n");

  let mut out = String::with_capacity(unified.len());
  for line in unified.split_inclusive('\n') {
    let body = line.strip_suffix('\n').unwrap_or(line);
    if !body.is_empty() && body.bytes().all(|b| b == b' ') {
      out.push_str(&line[body.len()..]);
    } else {
      out.push_str(line);
    }
  }
  out
}

/// Text awaiting the inline phase, with the map back to the document.
#[derive(Debug, Clone)]
pub(crate) struct Inline {
  pub(crate) text: String,
  pub(crate) map:  LineMap,
}

/// A block token whose inline content has not been lexed yet.
#[derive(Debug)]
pub(crate) struct Draft {
  pub(crate) rule:   Rule,
  pub(crate) source: SourceInfo,
  pub(crate) kind:   DraftKind,
}

#[derive(Debug)]
pub(crate) enum DraftKind {
  Ready(TokenKind),
  Heading {
    depth:   u8,
    content: Inline,
  },
  Paragraph(Inline),
  Text(Inline),
  Html {
    pre:     bool,
    content: Inline,
  },
  Blockquote(Vec<Draft>),
  List {
    ordered: bool,
    start:   Option<u64>,
    items:   Vec<Draft>,
  },
  ListItem {
    loose:    bool,
    children: Vec<Draft>,
  },
  Table {
    align:  Vec<Option<crate::token::Align>>,
    header: Vec<Inline>,
    rows:   Vec<Vec<Inline>>,
  },
}

fn finish_all(
  drafts: Vec<Draft>,
  inline: &InlineLexer<'_>,
) -> Result<Vec<TokenRef>, LexError> {
  drafts.into_iter().map(|d| d.finish(inline)).collect()
}

fn finish_cells(
  cells: &[Inline],
  inline: &InlineLexer<'_>,
) -> Result<Vec<TableCell>, LexError> {
  cells
    .iter()
    .map(|cell| {
      Ok(TableCell {
        content: inline.lex(cell)?,
      })
    })
    .collect()
}

impl Draft {
  fn finish(self, inline: &InlineLexer<'_>) -> Result<TokenRef, LexError> {
    let kind = match self.kind {
      DraftKind::Ready(kind) => kind,
      DraftKind::Heading { depth, content } => {
        TokenKind::Heading(HeadingToken {
          depth,
          id: None,
          content: inline.lex(&content)?,
        })
      },
      DraftKind::Paragraph(content) => {
        TokenKind::Paragraph {
          content: inline.lex(&content)?,
        }
      },
      DraftKind::Text(content) => {
        TokenKind::Text {
          content: inline.lex(&content)?,
        }
      },
      DraftKind::Html { pre: true, content } => {
        TokenKind::Html {
          pre:     true,
          content: vec![inline.verbatim(&content)],
        }
      },
      DraftKind::Html { pre, content } => {
        TokenKind::Html {
          pre,
          content: inline.lex(&content)?,
        }
      },
      DraftKind::Blockquote(children) => {
        TokenKind::Blockquote {
          children: finish_all(children, inline)?,
        }
      },
      DraftKind::List {
        ordered,
        start,
        items,
      } => {
        TokenKind::List {
          ordered,
          start,
          items: finish_all(items, inline)?,
        }
      },
      DraftKind::ListItem { loose, children } => {
        TokenKind::ListItem {
          loose,
          children: finish_all(children, inline)?,
        }
      },
      DraftKind::Table {
        align,
        header,
        rows,
      } => {
        TokenKind::Table(TableToken {
          align,
          header: finish_cells(&header, inline)?,
          rows: rows
            .iter()
            .map(|row| finish_cells(row, inline))
            .collect::<Result<_, _>>()?,
        })
      },
    };
    Ok(Token::new(
      self.rule,
      Arc::clone(inline.context()),
      self.source,
      kind,
    ))
  }
}

#[cfg(test)]
mod tests {
  #![allow(clippy::unwrap_used, clippy::panic, reason = "Fine in tests")]
  use super::*;
  use crate::token::{LinkKind, collect, plain_text};

  fn lex(source: &str) -> LexedDocument {
    Lexer::new(LexerOptions::default())
      .tokenize(source, None)
      .unwrap()
  }

  fn kinds(tokens: &[TokenRef]) -> Vec<&'static str> {
    tokens.iter().map(|t| t.kind.name()).collect()
  }

  #[test]
  fn test_normalize() {
    assert_eq!(normalize("a\r\nb\rc"), "a\nb\nc");
    assert_eq!(normalize("\tx"), "    x");
    assert_eq!(normalize("a\u{a0}b\u{2424}c"), "a b\nc");
    assert_eq!(normalize("a\n   \nb"), "a\n\nb");
  }

  #[test]
  fn test_normalize_label() {
    assert_eq!(normalize_label("  Foo \n Bar "), "foo bar");
  }

  #[test]
  fn test_heading_and_paragraph() {
    let doc = lex("# Hello World\n\nThis is **bold** text.\n");
    assert_eq!(kinds(&doc.tokens), ["heading", "paragraph"]);
    let heading = doc.tokens[0].as_heading().unwrap();
    assert_eq!(heading.depth, 1);
    assert_eq!(plain_text(&heading.content), "Hello World");

    let TokenKind::Paragraph { content } = &doc.tokens[1].kind else {
      panic!("expected paragraph");
    };
    assert_eq!(kinds(content), ["inline_text", "strong", "inline_text"]);
  }

  #[test]
  fn test_setext_heading() {
    let doc = lex("Title\n=====\n\nSub\n---\n");
    let depths: Vec<_> = doc
      .tokens
      .iter()
      .filter_map(|t| t.as_heading().map(|h| h.depth))
      .collect();
    assert_eq!(depths, [1, 2]);
  }

  #[test]
  fn test_fenced_code() {
    let doc = lex("```rust\nfn main() {}\n```\n\nafter\n");
    let TokenKind::Code { lang, text, fenced } = &doc.tokens[0].kind else {
      panic!("expected code");
    };
    assert_eq!(lang.as_deref(), Some("rust"));
    assert_eq!(text, "fn main() {}");
    assert!(fenced);
    assert_eq!(doc.tokens[1].source.line, 5);
  }

  #[test]
  fn test_note_only_opens_a_blockquote() {
    let lexer = Lexer::new(LexerOptions::dfm());
    let notes = |source: &str| {
      let doc = lexer.tokenize(source, None).unwrap();
      collect(&doc.tokens, |t| matches!(t.kind, TokenKind::Note { .. })).len()
    };
    assert_eq!(notes("> [!tip]\n> Use it.\n"), 1);
    assert_eq!(notes("> Intro.\n>\n> [!TIP]\n> Use it.\n"), 0);
    assert_eq!(notes("> - [!NOTE]\n>   item\n"), 0);
    assert_eq!(notes("[!NOTE]\n"), 0);
  }

  #[test]
  fn test_fence_markers_inside_code_line() {
    let doc = lex("```\nlet s = x```\nmore\n  ````\n\nafter\n");
    let TokenKind::Code { text, fenced, .. } = &doc.tokens[0].kind else {
      panic!("expected code");
    };
    assert_eq!(text, "let s = x```\nmore");
    assert!(fenced);
    assert_eq!(doc.tokens[1].kind.name(), "paragraph");
    assert_eq!(doc.tokens[1].source.line, 6);
  }

  #[test]
  fn test_unterminated_fence_is_paragraph() {
    let doc = lex("```\nno closer here\n");
    assert_eq!(doc.tokens[0].kind.name(), "paragraph");
  }

  #[test]
  fn test_indented_code() {
    let doc = lex("    let x = 1;\n    let y = 2;\n\ntext\n");
    let TokenKind::Code { text, fenced, .. } = &doc.tokens[0].kind else {
      panic!("expected code");
    };
    assert_eq!(text, "let x = 1;\nlet y = 2;");
    assert!(!fenced);
  }

  #[test]
  fn test_blockquote_positions() {
    let doc = lex("intro\n\n> quoted *text*\n> second\n");
    let TokenKind::Blockquote { children } = &doc.tokens[1].kind else {
      panic!("expected blockquote");
    };
    assert_eq!(doc.tokens[1].source.line, 3);
    let em = collect(children, |t| matches!(t.kind, TokenKind::Em { .. }));
    assert_eq!(em.len(), 1);
    assert_eq!(em[0].source.line, 3);
    assert_eq!(em[0].source.column, 10);
  }

  #[test]
  fn test_lazy_blockquote_continuation() {
    let doc = lex("> first\nlazy line\n\nafter\n");
    assert_eq!(kinds(&doc.tokens), ["blockquote", "paragraph"]);
    assert_eq!(doc.tokens[0].source.markdown, "> first\nlazy line\n\n");
  }

  #[test]
  fn test_tight_and_loose_lists() {
    let doc = lex("- one\n- two\n\nPara\n\n1. a\n\n2. b\n");
    let lists = collect(&doc.tokens, |t| matches!(t.kind, TokenKind::List { .. }));
    assert_eq!(lists.len(), 2);

    let TokenKind::List { ordered, items, .. } = &lists[0].kind else {
      panic!("expected list");
    };
    assert!(!ordered);
    assert_eq!(items.len(), 2);
    assert!(
      items
        .iter()
        .all(|i| matches!(i.kind, TokenKind::ListItem { loose: false, .. }))
    );

    let TokenKind::List {
      ordered,
      start,
      items,
    } = &lists[1].kind
    else {
      panic!("expected list");
    };
    assert!(ordered);
    assert_eq!(*start, Some(1));
    assert!(matches!(items[0].kind, TokenKind::ListItem { loose: true, .. }));
  }

  #[test]
  fn test_nested_list_positions() {
    let doc = lex("- outer\n  - inner *em*\n");
    let em = collect(&doc.tokens, |t| matches!(t.kind, TokenKind::Em { .. }));
    assert_eq!(em.len(), 1);
    assert_eq!((em[0].source.line, em[0].source.column), (2, 11));
  }

  #[test]
  fn test_reference_links_resolve_after_definition() {
    let doc = lex("See [the docs][Docs].\n\n[docs]: https://example.com \"Docs\"\n");
    assert_eq!(doc.links["docs"].href, "https://example.com");
    let links = collect(&doc.tokens, |t| matches!(t.kind, TokenKind::Link(_)));
    let TokenKind::Link(link) = &links[0].kind else {
      panic!("expected link");
    };
    assert_eq!(link.href, "https://example.com");
    assert_eq!(link.title.as_deref(), Some("Docs"));
    assert_eq!(link.link, LinkKind::Reference);
  }

  #[test]
  fn test_first_definition_wins() {
    let doc = lex("[a]: /first\n[A]: /second\n");
    assert_eq!(doc.links["a"].href, "/first");
  }

  #[test]
  fn test_undefined_reference_is_text() {
    let doc = lex("[missing] here\n");
    let links = collect(&doc.tokens, |t| matches!(t.kind, TokenKind::Link(_)));
    assert!(links.is_empty());
    assert_eq!(plain_text(&doc.tokens), "[missing] here");
  }

  #[test]
  fn test_table() {
    let doc = lex("| a | b |\n|:--|--:|\n| 1 | 2 |\n| 3 | 4 |\n");
    let TokenKind::Table(table) = &doc.tokens[0].kind else {
      panic!("expected table");
    };
    assert_eq!(table.header.len(), 2);
    assert_eq!(table.rows.len(), 2);
    assert_eq!(table.align, [
      Some(crate::token::Align::Left),
      Some(crate::token::Align::Right)
    ]);
    assert_eq!(plain_text(&table.rows[1][0].content), "3");
    assert_eq!(table.rows[1][1].content[0].source.line, 4);
  }

  #[test]
  fn test_html_block() {
    let doc = lex("<div class=\"x\">\ncontent\n</div>\n\nafter\n");
    let TokenKind::Html { pre, content } = &doc.tokens[0].kind else {
      panic!("expected html");
    };
    assert!(!pre);
    assert!(content.iter().any(|t| matches!(t.kind, TokenKind::Tag { .. })));
    assert_eq!(doc.tokens[1].kind.name(), "paragraph");
  }

  #[test]
  fn test_inline_anchor_is_not_html_block() {
    let doc = lex("<a href=\"x\">link</a> text\n");
    assert_eq!(doc.tokens[0].kind.name(), "paragraph");
  }

  #[test]
  fn test_paragraph_interrupted_by_heading() {
    let doc = lex("line one\n# Heading\n");
    assert_eq!(kinds(&doc.tokens), ["paragraph", "heading"]);
  }

  #[test]
  fn test_raw_spans_cover_input() {
    let source = "# T\n\npara\n\n- a\n- b\n\n> q\n\n---\n\n```\nx\n```\n";
    let doc = lex(source);
    let total: usize = doc.tokens.iter().map(|t| t.source.markdown.len()).sum();
    assert_eq!(total, doc.text.len());
  }

  #[test]
  fn test_base_dialect_has_no_fences_or_tables() {
    let lexer = Lexer::new(LexerOptions::markdown());
    let doc = lexer.tokenize("```\ncode\n```\n", None).unwrap();
    assert!(doc.tokens.iter().all(|t| !matches!(
      t.kind,
      TokenKind::Code { fenced: true, .. }
    )));
    let doc = lexer.tokenize("| a |\n|---|\n| 1 |\n", None).unwrap();
    assert!(doc.tokens.iter().all(|t| t.kind.name() != "table"));
  }

  #[test]
  fn test_context_is_shared() {
    let doc = Lexer::new(LexerOptions::dfm())
      .tokenize("a\n\nb\n", Some("docs/a.md"))
      .unwrap();
    assert!(Arc::ptr_eq(&doc.tokens[0].context, &doc.context));
    assert_eq!(doc.context.file.as_deref(), Some("docs/a.md"));
  }
}

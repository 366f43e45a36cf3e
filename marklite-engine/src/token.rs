//! The immutable token tree produced by the lexer.
//!
//! Tokens are shared through [`TokenRef`] (`Arc<Token>`). Passes that change
//! a token build a new one and rebuild only its ancestors; every untouched
//! subtree stays the very same allocation, which callers can check with
//! [`Arc::ptr_eq`].
use std::sync::Arc;

use serde::Serialize;

use crate::{
  lexer::ParseContext,
  rules::Rule,
  source::SourceInfo,
  utils::slugify,
};

pub type TokenRef = Arc<Token>;

/// One node of the token tree.
#[derive(Debug, Clone, Serialize)]
pub struct Token {
  /// The production that created this token.
  pub rule:    Rule,
  /// Options and rule table the document was lexed with.
  #[serde(skip)]
  pub context: Arc<ParseContext>,
  pub source:  SourceInfo,
  #[serde(flatten)]
  pub kind:    TokenKind,
}

/// Column alignment of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
  Left,
  Center,
  Right,
}

#[derive(Debug, Clone, Serialize)]
pub struct HeadingToken {
  pub depth:   u8,
  /// Explicit anchor id, if one was attached.
  pub id:      Option<String>,
  pub content: Vec<TokenRef>,
}

impl HeadingToken {
  /// The explicit id, or a slug of the heading text.
  #[must_use]
  pub fn anchor(&self) -> String {
    self
      .id
      .clone()
      .unwrap_or_else(|| slugify(&plain_text(&self.content)))
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct TableCell {
  pub content: Vec<TokenRef>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableToken {
  pub align:  Vec<Option<Align>>,
  pub header: Vec<TableCell>,
  pub rows:   Vec<Vec<TableCell>>,
}

/// How a link was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
  Inline,
  Reference,
  Auto,
  Url,
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkToken {
  pub href:    String,
  pub title:   Option<String>,
  pub link:    LinkKind,
  pub content: Vec<TokenRef>,
}

/// `[!code-lang[name](path "title")]`.
#[derive(Debug, Clone, Serialize)]
pub struct CodeSnippetToken {
  pub lang:  Option<String>,
  pub name:  String,
  pub path:  String,
  /// Everything after `#` or `?` in the path, if present.
  pub query: Option<String>,
  pub title: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TabItem {
  pub id:        String,
  pub condition: Option<String>,
  pub selected:  bool,
  pub title:     Vec<TokenRef>,
  pub content:   Vec<TokenRef>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TabGroupToken {
  pub id:     String,
  pub active: usize,
  pub items:  Vec<TabItem>,
}

/// Everything a token can be.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TokenKind {
  Newline,
  Code {
    lang:   Option<String>,
    text:   String,
    fenced: bool,
  },
  Heading(HeadingToken),
  Hr,
  Blockquote {
    children: Vec<TokenRef>,
  },
  /// `[!NOTE]`-style marker opening a blockquote.
  Note {
    kind: String,
  },
  List {
    ordered: bool,
    start:   Option<u64>,
    items:   Vec<TokenRef>,
  },
  ListItem {
    loose:    bool,
    children: Vec<TokenRef>,
  },
  Html {
    pre:     bool,
    content: Vec<TokenRef>,
  },
  Def {
    label: String,
    href:  String,
    title: Option<String>,
  },
  Table(TableToken),
  Paragraph {
    content: Vec<TokenRef>,
  },
  Text {
    content: Vec<TokenRef>,
  },
  YamlHeader {
    content: String,
  },
  Include {
    title:   String,
    path:    String,
    tooltip: Option<String>,
  },
  CodeSnippet(CodeSnippetToken),
  TabGroup(TabGroupToken),

  InlineText {
    text: String,
  },
  Escape {
    text: String,
  },
  Link(LinkToken),
  Image {
    href:  String,
    title: Option<String>,
    alt:   String,
  },
  Tag {
    raw: String,
  },
  Strong {
    content: Vec<TokenRef>,
  },
  Em {
    content: Vec<TokenRef>,
  },
  CodeSpan {
    text: String,
  },
  Br,
  Del {
    content: Vec<TokenRef>,
  },
  Xref {
    uid: String,
  },
  InlineInclude {
    title:   String,
    path:    String,
    tooltip: Option<String>,
  },
}

impl TokenKind {
  /// Child lists in a fixed order. Leaf kinds have none.
  #[must_use]
  pub fn child_lists(&self) -> Vec<&[TokenRef]> {
    match self {
      Self::Heading(heading) => vec![heading.content.as_slice()],
      Self::Blockquote { children } | Self::ListItem { children, .. } => {
        vec![children.as_slice()]
      },
      Self::List { items, .. } => vec![items.as_slice()],
      Self::Html { content, .. }
      | Self::Paragraph { content }
      | Self::Text { content }
      | Self::Strong { content }
      | Self::Em { content }
      | Self::Del { content } => vec![content.as_slice()],
      Self::Link(link) => vec![link.content.as_slice()],
      Self::Table(table) => {
        table
          .header
          .iter()
          .chain(table.rows.iter().flatten())
          .map(|cell| cell.content.as_slice())
          .collect()
      },
      Self::TabGroup(group) => {
        group
          .items
          .iter()
          .flat_map(|item| [item.title.as_slice(), item.content.as_slice()])
          .collect()
      },
      _ => Vec::new(),
    }
  }

  fn child_lists_mut(&mut self) -> Vec<&mut Vec<TokenRef>> {
    match self {
      Self::Heading(heading) => vec![&mut heading.content],
      Self::Blockquote { children } | Self::ListItem { children, .. } => {
        vec![children]
      },
      Self::List { items, .. } => vec![items],
      Self::Html { content, .. }
      | Self::Paragraph { content }
      | Self::Text { content }
      | Self::Strong { content }
      | Self::Em { content }
      | Self::Del { content } => vec![content],
      Self::Link(link) => vec![&mut link.content],
      Self::Table(table) => {
        table
          .header
          .iter_mut()
          .chain(table.rows.iter_mut().flatten())
          .map(|cell| &mut cell.content)
          .collect()
      },
      Self::TabGroup(group) => {
        group
          .items
          .iter_mut()
          .flat_map(|item| [&mut item.title, &mut item.content])
          .collect()
      },
      _ => Vec::new(),
    }
  }

  /// Short lowercase name of the kind, as used in serialized output.
  #[must_use]
  pub const fn name(&self) -> &'static str {
    match self {
      Self::Newline => "newline",
      Self::Code { .. } => "code",
      Self::Heading(_) => "heading",
      Self::Hr => "hr",
      Self::Blockquote { .. } => "blockquote",
      Self::Note { .. } => "note",
      Self::List { .. } => "list",
      Self::ListItem { .. } => "list_item",
      Self::Html { .. } => "html",
      Self::Def { .. } => "def",
      Self::Table(_) => "table",
      Self::Paragraph { .. } => "paragraph",
      Self::Text { .. } => "text",
      Self::YamlHeader { .. } => "yaml_header",
      Self::Include { .. } => "include",
      Self::CodeSnippet(_) => "code_snippet",
      Self::TabGroup(_) => "tab_group",
      Self::InlineText { .. } => "inline_text",
      Self::Escape { .. } => "escape",
      Self::Link(_) => "link",
      Self::Image { .. } => "image",
      Self::Tag { .. } => "tag",
      Self::Strong { .. } => "strong",
      Self::Em { .. } => "em",
      Self::CodeSpan { .. } => "code_span",
      Self::Br => "br",
      Self::Del { .. } => "del",
      Self::Xref { .. } => "xref",
      Self::InlineInclude { .. } => "inline_include",
    }
  }
}

impl Token {
  #[must_use]
  pub fn new(
    rule: Rule,
    context: Arc<ParseContext>,
    source: SourceInfo,
    kind: TokenKind,
  ) -> TokenRef {
    Arc::new(Self {
      rule,
      context,
      source,
      kind,
    })
  }

  #[must_use]
  pub fn child_lists(&self) -> Vec<&[TokenRef]> {
    self.kind.child_lists()
  }

  /// A copy of this token with its child lists replaced, in the order
  /// [`TokenKind::child_lists`] reports them. Extra lists are ignored.
  #[must_use]
  pub fn with_child_lists(&self, lists: Vec<Vec<TokenRef>>) -> Self {
    let mut token = self.clone();
    for (slot, list) in token.kind.child_lists_mut().into_iter().zip(lists) {
      *slot = list;
    }
    token
  }

  /// Run `f` over each child list. If any call returns a replacement list, a
  /// new token is built around the new and untouched lists; otherwise `None`.
  ///
  /// # Errors
  ///
  /// Propagates the first error returned by `f`.
  pub fn map_child_lists<E, F>(
    self: &Arc<Self>,
    mut f: F,
  ) -> Result<Option<TokenRef>, E>
  where
    F: FnMut(&[TokenRef]) -> Result<Option<Vec<TokenRef>>, E>,
  {
    let lists = self.child_lists();
    if lists.is_empty() {
      return Ok(None);
    }

    let mut changed = false;
    let mut rebuilt = Vec::with_capacity(lists.len());
    for list in lists {
      if let Some(replacement) = f(list)? {
        changed = true;
        rebuilt.push(replacement);
      } else {
        rebuilt.push(list.to_vec());
      }
    }

    Ok(changed.then(|| Arc::new(self.with_child_lists(rebuilt))))
  }

  #[must_use]
  pub const fn as_heading(&self) -> Option<&HeadingToken> {
    match &self.kind {
      TokenKind::Heading(heading) => Some(heading),
      _ => None,
    }
  }

  #[must_use]
  pub const fn is_block(&self) -> bool {
    !self.is_inline()
  }

  #[must_use]
  pub const fn is_inline(&self) -> bool {
    matches!(
      self.kind,
      TokenKind::InlineText { .. }
        | TokenKind::Escape { .. }
        | TokenKind::Link(_)
        | TokenKind::Image { .. }
        | TokenKind::Tag { .. }
        | TokenKind::Strong { .. }
        | TokenKind::Em { .. }
        | TokenKind::CodeSpan { .. }
        | TokenKind::Br
        | TokenKind::Del { .. }
        | TokenKind::Xref { .. }
        | TokenKind::InlineInclude { .. }
    )
  }
}

/// Concatenated text of a token list, without markup.
#[must_use]
pub fn plain_text(tokens: &[TokenRef]) -> String {
  let mut out = String::new();
  for token in tokens {
    push_text(token, &mut out);
  }
  out
}

fn push_text(token: &Token, out: &mut String) {
  match &token.kind {
    TokenKind::InlineText { text }
    | TokenKind::Escape { text }
    | TokenKind::CodeSpan { text }
    | TokenKind::Code { text, .. } => out.push_str(text),
    TokenKind::Image { alt, .. } => out.push_str(alt),
    TokenKind::Xref { uid } => out.push_str(uid),
    TokenKind::Br => out.push('\n'),
    _ => {
      for list in token.child_lists() {
        for child in list {
          push_text(child, out);
        }
      }
    },
  }
}

/// Callbacks for a depth-first walk over a token tree.
pub trait TokenVisitor {
  type Error;

  /// Called before the children of `token`. `parents` runs from the root to
  /// the direct parent.
  ///
  /// # Errors
  ///
  /// Any error stops the walk.
  fn enter(
    &mut self,
    token: &TokenRef,
    parents: &[TokenRef],
  ) -> Result<(), Self::Error>;

  /// Called after the children of `token`.
  ///
  /// # Errors
  ///
  /// Any error stops the walk.
  fn leave(
    &mut self,
    _token: &TokenRef,
    _parents: &[TokenRef],
  ) -> Result<(), Self::Error> {
    Ok(())
  }
}

/// Walk `tokens` depth-first in document order.
///
/// # Errors
///
/// Returns the first error raised by `visitor`.
pub fn walk<V: TokenVisitor>(
  tokens: &[TokenRef],
  visitor: &mut V,
) -> Result<(), V::Error> {
  let mut parents = Vec::new();
  walk_list(tokens, visitor, &mut parents)
}

fn walk_list<V: TokenVisitor>(
  tokens: &[TokenRef],
  visitor: &mut V,
  parents: &mut Vec<TokenRef>,
) -> Result<(), V::Error> {
  for token in tokens {
    visitor.enter(token, parents)?;
    parents.push(Arc::clone(token));
    for list in token.child_lists() {
      walk_list(list, visitor, parents)?;
    }
    parents.pop();
    visitor.leave(token, parents)?;
  }
  Ok(())
}

/// Every token in the tree, parents before children, matching `predicate`.
#[must_use]
pub fn collect<P>(tokens: &[TokenRef], mut predicate: P) -> Vec<TokenRef>
where
  P: FnMut(&Token) -> bool,
{
  struct Collector<'p, P> {
    predicate: &'p mut P,
    found:     Vec<TokenRef>,
  }

  impl<P: FnMut(&Token) -> bool> TokenVisitor for Collector<'_, P> {
    type Error = std::convert::Infallible;

    fn enter(
      &mut self,
      token: &TokenRef,
      _parents: &[TokenRef],
    ) -> Result<(), Self::Error> {
      if (self.predicate)(token) {
        self.found.push(Arc::clone(token));
      }
      Ok(())
    }
  }

  let mut collector = Collector {
    predicate: &mut predicate,
    found:     Vec::new(),
  };
  let Ok(()) = walk(tokens, &mut collector);
  collector.found
}

use std::sync::{Arc, LazyLock};

use log::error;
use regex::Regex;

use super::{AggregateContext, Aggregator};
use crate::{
  rules::Rule,
  token::{HeadingToken, Token, TokenKind},
  utils::never_matching_regex,
};

static ANCHOR_OPEN: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r#"(?i)^<a +(?:name|id)="([\w \-.]+)" *>$"#).unwrap_or_else(|e| {
    error!("Failed to compile ANCHOR_OPEN regex: {e}");
    never_matching_regex()
  })
});

static ANCHOR_CLOSE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"(?i)^</a *>$").unwrap_or_else(|e| {
    error!("Failed to compile ANCHOR_CLOSE regex: {e}");
    never_matching_regex()
  })
});

/// Moves a leading `<a name="id"></a>` pair out of a heading's content and
/// into its id.
pub struct HeadingIdAggregator;

impl HeadingIdAggregator {
  fn anchor_id(heading: &HeadingToken) -> Option<String> {
    let [open, close, ..] = heading.content.as_slice() else {
      return None;
    };
    let (TokenKind::Tag { raw: open }, TokenKind::Tag { raw: close }) =
      (&open.kind, &close.kind)
    else {
      return None;
    };
    if !ANCHOR_CLOSE.is_match(close) {
      return None;
    }
    ANCHOR_OPEN
      .captures(open)
      .and_then(|caps| caps.get(1))
      .map(|m| m.as_str().to_owned())
  }
}

impl Aggregator for HeadingIdAggregator {
  fn name(&self) -> &'static str {
    "heading-id"
  }

  fn aggregate(&self, context: &mut AggregateContext<'_>) -> bool {
    let current = context.current();
    let Some(heading) = current.as_heading() else {
      return false;
    };
    let Some(id) = Self::anchor_id(heading) else {
      return false;
    };

    let fused = Token::new(
      Rule::HeadingId,
      Arc::clone(&current.context),
      current.source.clone(),
      TokenKind::Heading(HeadingToken {
        depth:   heading.depth,
        id:      Some(id),
        content: heading.content[2..].to_vec(),
      }),
    );
    context.aggregate_to(fused, 1);
    true
  }
}

#[cfg(test)]
mod tests {
  #![allow(clippy::unwrap_used, reason = "Fine in tests")]
  use super::*;
  use crate::{
    Lexer,
    LexerOptions,
    aggregate::aggregate,
    token::{TokenRef, plain_text},
  };

  fn lex(source: &str) -> Vec<TokenRef> {
    Lexer::new(LexerOptions::dfm())
      .tokenize(source, None)
      .unwrap()
      .tokens
  }

  #[test]
  fn test_fuses_leading_anchor() {
    let tokens = lex("## <a name=\"custom-id\"></a>My Title\n");
    let out = aggregate(&tokens, &HeadingIdAggregator).unwrap();
    let heading = out[0].as_heading().unwrap();
    assert_eq!(out[0].rule, Rule::HeadingId);
    assert_eq!(heading.depth, 2);
    assert_eq!(heading.id.as_deref(), Some("custom-id"));
    assert_eq!(plain_text(&heading.content), "My Title");
    assert_eq!(heading.anchor(), "custom-id");

    let original = tokens[0].as_heading().unwrap();
    assert!(Arc::ptr_eq(&heading.content[0], &original.content[2]));
  }

  #[test]
  fn test_id_attribute_and_case() {
    let tokens = lex("# <A ID=\"Intro.v2\"></A> Intro\n");
    let out = aggregate(&tokens, &HeadingIdAggregator).unwrap();
    assert_eq!(
      out[0].as_heading().unwrap().id.as_deref(),
      Some("Intro.v2")
    );
  }

  #[test]
  fn test_declines() {
    for source in [
      "## My Title\n",
      "## <a name=\"x\">My Title</a>\n",
      "## <a name=\"bad/id\"></a>Title\n",
      "## <a href=\"x\"></a>Title\n",
      "## Title <a name=\"x\"></a>\n",
    ] {
      let tokens = lex(source);
      assert!(
        aggregate(&tokens, &HeadingIdAggregator).is_none(),
        "fused {source:?}"
      );
    }
  }

  #[test]
  fn test_anchor_only_heading() {
    let tokens = lex("### <a id=\"only\"></a>\n");
    let out = aggregate(&tokens, &HeadingIdAggregator).unwrap();
    let heading = out[0].as_heading().unwrap();
    assert!(heading.content.is_empty());
    assert_eq!(heading.anchor(), "only");
  }
}

#![allow(clippy::unwrap_used, clippy::panic, reason = "Fine in tests")]
use std::sync::Arc;

use marklite_engine::{
  LexerOptions,
  Pipeline,
  Rule,
  RuleLayer,
  RuleSet,
  TokenKind,
  TokenRef,
  rules,
  token::plain_text,
};

fn process(source: &str) -> Vec<TokenRef> {
  Pipeline::new(LexerOptions::dfm())
    .process(source, Some("page.md"))
    .unwrap()
    .tokens
}

#[test]
fn test_heading_id_fusion() {
  let tokens = process("## <a name=\"custom-id\"></a>My Title\n\nBody.\n");
  let heading = tokens[0].as_heading().unwrap();
  assert_eq!(heading.id.as_deref(), Some("custom-id"));
  assert_eq!(plain_text(&heading.content), "My Title");
  assert!(matches!(tokens[1].kind, TokenKind::Paragraph { .. }));
}

#[test]
fn test_tab_group() {
  let tokens = process(
    "### [Tab A](#tab/a)\n\nContent A\n\n### [Tab B](#tab/b)\n\nContent \
     B\n",
  );
  assert_eq!(tokens.len(), 1);
  let TokenKind::TabGroup(group) = &tokens[0].kind else {
    panic!("expected a tab group, got {}", tokens[0].kind.name());
  };
  assert_eq!(tokens[0].rule, Rule::TabGroup);
  assert!(!group.id.is_empty());
  let ids: Vec<_> = group.items.iter().map(|i| i.id.as_str()).collect();
  assert_eq!(ids, ["a", "b"]);
  assert!(group.items[0].selected);
  assert!(!group.items[1].selected);
  assert_eq!(plain_text(&group.items[0].title), "Tab A");
  assert_eq!(plain_text(&group.items[0].content), "Content A");
  assert_eq!(plain_text(&group.items[1].content), "Content B");
}

#[test]
fn test_tab_group_ids_are_unique() {
  let source = "# [A](#tab/a)\n\na\n\n---\n\n# [B](#tab/b)\n\nb\n";
  let tokens = process(source);
  let ids: Vec<_> = tokens
    .iter()
    .filter_map(|t| match &t.kind {
      TokenKind::TabGroup(group) => Some(group.id.clone()),
      _ => None,
    })
    .collect();
  assert_eq!(ids.len(), 2);
  assert_ne!(ids[0], ids[1]);
}

#[test]
fn test_dfm_blocks() {
  let source = "---\ntitle: Guide\n---\n\n> [!warning]\n> Careful.\n\n\
                [!include[Intro](includes/intro.md)]\n\n\
                [!code-csharp[Main](src/Program.cs#L3-L7 \"Program\")]\n\nSee \
                @System.String.\n";
  let tokens = process(source);

  let TokenKind::YamlHeader { content } = &tokens[0].kind else {
    panic!("expected yaml header");
  };
  assert_eq!(content, "title: Guide");

  let TokenKind::Blockquote { children } = &tokens[1].kind else {
    panic!("expected blockquote");
  };
  assert!(matches!(&children[0].kind, TokenKind::Note { kind } if kind == "WARNING"));

  let TokenKind::Include { title, path, .. } = &tokens[2].kind else {
    panic!("expected include");
  };
  assert_eq!((title.as_str(), path.as_str()), ("Intro", "includes/intro.md"));

  let TokenKind::CodeSnippet(snippet) = &tokens[3].kind else {
    panic!("expected code snippet");
  };
  assert_eq!(snippet.lang.as_deref(), Some("csharp"));
  assert_eq!(snippet.path, "src/Program.cs");
  assert_eq!(snippet.query.as_deref(), Some("#L3-L7"));
  assert_eq!(snippet.title.as_deref(), Some("Program"));
  assert_eq!(tokens[3].source.line, 10);

  let TokenKind::Paragraph { content } = &tokens[4].kind else {
    panic!("expected paragraph");
  };
  assert!(
    content
      .iter()
      .any(|t| matches!(&t.kind, TokenKind::Xref { uid } if uid == "System.String"))
  );
}

#[test]
fn test_rule_override_precedence() {
  let base = RuleSet::for_options(&LexerOptions::markdown());
  let derived = base
    .extend(&RuleLayer::new("custom").with(Rule::Heading, r"^ *(#{1,6})! *([^\n]+?) *(?:\n+|$)"))
    .unwrap();

  assert_eq!(derived.origin(Rule::Heading), Some("custom"));
  assert_eq!(derived.origin(Rule::Paragraph), base.origin(Rule::Paragraph));
  assert!(Arc::ptr_eq(
    derived.shared(Rule::Paragraph).unwrap(),
    base.shared(Rule::Paragraph).unwrap()
  ));
  assert_eq!(
    derived.get(Rule::Paragraph).as_str(),
    rules::block::PARAGRAPH
  );
}

#[test]
fn test_custom_dialect_through_pipeline() {
  let pipeline = Pipeline::builder()
    .options(LexerOptions::markdown())
    .layer(RuleLayer::new("bang-headings").with(
      Rule::Heading,
      r"^ *(#{1,6})! *([^\n]+?) *(?:\n+|$)",
    ))
    .build()
    .unwrap();

  let document = pipeline.process("#! Custom\n\n# Plain\n", None).unwrap();
  assert_eq!(document.tokens[0].as_heading().unwrap().depth, 1);
  assert!(document.tokens[1].as_heading().is_none());
}

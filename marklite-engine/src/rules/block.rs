//! Block-level patterns.
//!
//! Each pattern is anchored at the current input position. Where a production
//! needs more than a regex can say without look-around or back-references
//! (fence closers, list boundaries, lazy blockquote continuation, paragraph
//! interruption, html block closers), the pattern describes the opening shape
//! and the block lexer finishes the match in code.
use super::{Rule, RuleLayer};

pub const NEWLINE: &str = r"^(?: *\n)+|^ +$";
pub const CODE: &str = r"^(?: {4}[^\n]+\n*)+";
pub const FENCES: &str = r"^ *(`{3,}|~{3,})[ .]*(\S+)? *\n";
pub const HEADING: &str = r"^ *(#{1,6}) *([^\n]+?) *#* *(?:\n+|$)";
pub const GFM_HEADING: &str = r"^ *(#{1,6}) +([^\n]+?) *#* *(?:\n+|$)";
pub const NPTABLE: &str =
  r"^ *(\S.*\|.*)\n *([-:]+ *\|[-| :]*)\n((?:.*\|.*(?:\n|$))*)\n*";
pub const LHEADING: &str = r"^([^\n]+)\n *(=|-){2,} *(?:\n+|$)";
pub const HR: &str = r"^(?: *[-*_]){3,} *(?:\n+|$)";
pub const NOTE: &str = r"^ *\[!([A-Za-z]+)\] *(?:\n+|$)";
pub const BLOCKQUOTE: &str = r"^ *>[^\n]+";
pub const LIST: &str = r"^( *)([*+-]|\d+\.) ";
pub const HTML: &str = r"^ *<(?:!--|(\w+))";
pub const DEF: &str =
  r#"^ *\[([^\]]+)\]: *<?([^\s>]+)>?(?: +["(]([^\n]+)[")])? *(?:\n+|$)"#;
pub const TABLE: &str =
  r"^ *\|(.+)\n *\|( *[-:]+[-| :]*)\n((?: *\|.*(?:\n|$))*)\n*";
pub const PARAGRAPH: &str = r"^[^\n]+\n?";
pub const TEXT: &str = r"^[^\n]+";

pub const YAML_HEADER: &str = r"^---[ \t]*\n([\s\S]*?)\n---[ \t]*(?:\n+|$)";
pub const INCLUDE: &str = r#"(?i)^\[!include\[([^\]]*)\]\(\s*<?([^)\s>]*)>?(?:\s+"([^"]*)")?\s*\)\] *(?:\n+|$)"#;
pub const CODE_SNIPPET: &str = r#"(?i)^\[!code(?:-([\w+#.]+))?\[([^\]]*)\]\(\s*<?([^)\s>]*)>?(?:\s+"([^"]*)")?\s*\)\] *(?:\n+|$)"#;

/// The classic Markdown block grammar.
#[must_use]
pub fn base() -> RuleLayer {
  RuleLayer::new("base")
    .with(Rule::Newline, NEWLINE)
    .with(Rule::Code, CODE)
    .with(Rule::Heading, HEADING)
    .with(Rule::LHeading, LHEADING)
    .with(Rule::Hr, HR)
    .with(Rule::Blockquote, BLOCKQUOTE)
    .with(Rule::List, LIST)
    .with(Rule::Html, HTML)
    .with(Rule::Def, DEF)
    .with(Rule::Paragraph, PARAGRAPH)
    .with(Rule::BlockText, TEXT)
}

/// GitHub flavor: fenced code and headings that require a space.
#[must_use]
pub fn gfm() -> RuleLayer {
  RuleLayer::new("gfm")
    .with(Rule::Fences, FENCES)
    .with(Rule::Heading, GFM_HEADING)
}

/// Pipe tables, with and without the outer pipes.
#[must_use]
pub fn tables() -> RuleLayer {
  RuleLayer::new("tables")
    .with(Rule::NpTable, NPTABLE)
    .with(Rule::Table, TABLE)
}

/// DocFX extensions: front matter, notes, includes and code snippets.
#[must_use]
pub fn dfm() -> RuleLayer {
  RuleLayer::new("dfm")
    .with(Rule::YamlHeader, YAML_HEADER)
    .with(Rule::Note, NOTE)
    .with(Rule::IncludeBlock, INCLUDE)
    .with(Rule::CodeSnippet, CODE_SNIPPET)
}

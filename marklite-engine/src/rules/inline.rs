//! Inline-level patterns.
//!
//! Emphasis, strong, strike-through and code spans only describe their
//! opening delimiter here; the inline lexer searches for the matching closer.
//! The text patterns are unanchored: they locate the next position where some
//! other inline rule could start.
use super::{Rule, RuleLayer};

pub const ESCAPE: &str = r"^\\([\\`*{}\[\]()#+\-.!_>])";
pub const GFM_ESCAPE: &str = r"^\\([\\`*{}\[\]()#+\-.!_>~|])";
pub const AUTOLINK: &str = r"^<([^ >]+(@|:/)[^ >]+)>";
pub const URL: &str = r#"^(https?://[^\s<]+[^<.,:;"')\]\s])"#;
pub const TAG: &str =
  r#"^(?:<!--[\s\S]*?-->|</?\w+(?:"[^"]*"|'[^']*'|[^'">])*?>)"#;
pub const LINK: &str = r#"^!?\[((?:\[[^\]]*\]|[^\[\]])*)\]\(\s*<?([\s\S]*?)>?(?:\s+['"]([\s\S]*?)['"])?\s*\)"#;
pub const REFLINK: &str =
  r"^!?\[((?:\[[^\]]*\]|[^\[\]])*)\]\s*\[([^\]]*)\]";
pub const NOLINK: &str = r"^!?\[((?:\[[^\]]*\]|[^\[\]])*)\]";
pub const STRONG: &str = r"^(?:__|\*\*)";
pub const PEDANTIC_STRONG: &str = r"^(?:__|\*\*)\S";
pub const EM: &str = r"^[_*]";
pub const PEDANTIC_EM: &str = r"^[_*]\S";
pub const CODE_SPAN: &str = r"^`+";
pub const BR: &str = r"^ {2,}\n";
pub const BREAKS_BR: &str = r"^ *\n";
pub const DEL: &str = r"^~~\S";

pub const TEXT: &str = r"[\\<!\[_*`]| {2,}\n";
pub const GFM_TEXT: &str = r"[\\<!\[_*`~]|https?://| {2,}\n";
pub const BREAKS_TEXT: &str = r"[\\<!\[_*`~]|https?://| *\n";
pub const DFM_TEXT: &str = r"[\\<!\[_*`~@]|https?://| {2,}\n";
pub const DFM_BREAKS_TEXT: &str = r"[\\<!\[_*`~@]|https?://| *\n";

pub const XREF: &str =
  r"^(?:<xref:([^>\s]+)>|@([A-Za-z_](?:[\w.\-`#*(),<>{}\[\]@:]*\w)?))";
pub const INCLUDE: &str = r#"(?i)^\[!include\[([^\]]*)\]\(\s*<?([^)\s>]*)>?(?:\s+"([^"]*)")?\s*\)\]"#;

#[must_use]
pub fn base() -> RuleLayer {
  RuleLayer::new("base")
    .with(Rule::Escape, ESCAPE)
    .with(Rule::Autolink, AUTOLINK)
    .with(Rule::Tag, TAG)
    .with(Rule::Link, LINK)
    .with(Rule::RefLink, REFLINK)
    .with(Rule::NoLink, NOLINK)
    .with(Rule::Strong, STRONG)
    .with(Rule::Em, EM)
    .with(Rule::CodeSpan, CODE_SPAN)
    .with(Rule::Br, BR)
    .with(Rule::InlineText, TEXT)
}

#[must_use]
pub fn gfm() -> RuleLayer {
  RuleLayer::new("gfm")
    .with(Rule::Escape, GFM_ESCAPE)
    .with(Rule::Url, URL)
    .with(Rule::Del, DEL)
    .with(Rule::InlineText, GFM_TEXT)
}

/// Every newline becomes a hard break.
#[must_use]
pub fn breaks() -> RuleLayer {
  RuleLayer::new("breaks")
    .with(Rule::Br, BREAKS_BR)
    .with(Rule::InlineText, BREAKS_TEXT)
}

/// Emphasis must hug its content.
#[must_use]
pub fn pedantic() -> RuleLayer {
  RuleLayer::new("pedantic")
    .with(Rule::Strong, PEDANTIC_STRONG)
    .with(Rule::Em, PEDANTIC_EM)
}

#[must_use]
pub fn dfm(breaks: bool) -> RuleLayer {
  RuleLayer::new("dfm")
    .with(Rule::Xref, XREF)
    .with(Rule::IncludeInline, INCLUDE)
    .with(Rule::InlineText, if breaks { DFM_BREAKS_TEXT } else { DFM_TEXT })
}

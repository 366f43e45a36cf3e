//! Named grammar productions and the layered tables that map them to regexes.
//!
//! A [`RuleSet`] is built by applying [`RuleLayer`]s in order: the base
//! dialect first, then GFM, tables, breaks, pedantic and DFM on top as the
//! [`LexerOptions`] ask for them. A later layer replaces the pattern of any
//! rule it names, and can remove a rule entirely. Looking up a rule that the
//! resulting table does not carry yields a regex that never matches, so the
//! lexer never has to special-case missing productions.
//!
//! Rule sets are immutable once built and memoized per option bundle, so every
//! document lexed with the same options shares one table.
//!
//! # Examples
//!
//! ```
//! use marklite_engine::{LexerOptions, Rule, RuleLayer, RuleSet};
//!
//! let base = RuleSet::for_options(&LexerOptions::default());
//! let custom = base
//!   .extend(&RuleLayer::new("strict").with(Rule::Heading, r"^(#{1,6}) +(\S[^\n]*?) *(?:\n+|$)"))
//!   .unwrap();
//!
//! assert!(custom.get(Rule::Heading).is_match("# Title"));
//! assert!(!custom.get(Rule::Heading).is_match("#Title"));
//! ```
pub mod block;
pub mod inline;

use std::{
  collections::HashMap,
  fmt,
  sync::{Arc, LazyLock, RwLock},
};

use log::{debug, error};
use regex::Regex;
use serde::Serialize;

use crate::{
  error::RuleError,
  types::LexerOptions,
  utils::{cached_regex, never_matching_regex},
};

/// Shared stand-in for every rule a table does not carry.
static NEVER: LazyLock<Regex> = LazyLock::new(never_matching_regex);

/// Memoized rule tables, one per option bundle.
static RULE_SETS: LazyLock<RwLock<HashMap<LexerOptions, Arc<RuleSet>>>> =
  LazyLock::new(|| RwLock::new(HashMap::new()));

/// A named grammar production.
///
/// Block and inline rules are tried in the order of [`Rule::BLOCK_ORDER`] and
/// [`Rule::INLINE_ORDER`]; the first rule that matches wins. The last two
/// variants never come out of the lexer, they tag tokens synthesized by the
/// aggregation passes.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
  YamlHeader,
  Newline,
  Code,
  Fences,
  Heading,
  NpTable,
  LHeading,
  Hr,
  Note,
  Blockquote,
  List,
  Html,
  Def,
  Table,
  IncludeBlock,
  CodeSnippet,
  Paragraph,
  BlockText,

  Escape,
  Xref,
  IncludeInline,
  Autolink,
  Url,
  Tag,
  Link,
  RefLink,
  NoLink,
  Strong,
  Em,
  CodeSpan,
  Br,
  Del,
  InlineText,

  HeadingId,
  TabGroup,
}

impl Rule {
  /// Block productions in priority order.
  pub const BLOCK_ORDER: [Self; 18] = [
    Self::YamlHeader,
    Self::Newline,
    Self::Code,
    Self::Fences,
    Self::Heading,
    Self::NpTable,
    Self::LHeading,
    Self::Hr,
    Self::Note,
    Self::Blockquote,
    Self::List,
    Self::Html,
    Self::Def,
    Self::Table,
    Self::IncludeBlock,
    Self::CodeSnippet,
    Self::Paragraph,
    Self::BlockText,
  ];

  /// Inline productions in priority order.
  pub const INLINE_ORDER: [Self; 15] = [
    Self::Escape,
    Self::Xref,
    Self::IncludeInline,
    Self::Autolink,
    Self::Url,
    Self::Tag,
    Self::Link,
    Self::RefLink,
    Self::NoLink,
    Self::Strong,
    Self::Em,
    Self::CodeSpan,
    Self::Br,
    Self::Del,
    Self::InlineText,
  ];

  #[must_use]
  pub const fn name(self) -> &'static str {
    match self {
      Self::YamlHeader => "yaml_header",
      Self::Newline => "newline",
      Self::Code => "code",
      Self::Fences => "fences",
      Self::Heading => "heading",
      Self::NpTable => "nptable",
      Self::LHeading => "lheading",
      Self::Hr => "hr",
      Self::Note => "note",
      Self::Blockquote => "blockquote",
      Self::List => "list",
      Self::Html => "html",
      Self::Def => "def",
      Self::Table => "table",
      Self::IncludeBlock => "include_block",
      Self::CodeSnippet => "code_snippet",
      Self::Paragraph => "paragraph",
      Self::BlockText => "block_text",
      Self::Escape => "escape",
      Self::Xref => "xref",
      Self::IncludeInline => "include_inline",
      Self::Autolink => "autolink",
      Self::Url => "url",
      Self::Tag => "tag",
      Self::Link => "link",
      Self::RefLink => "reflink",
      Self::NoLink => "nolink",
      Self::Strong => "strong",
      Self::Em => "em",
      Self::CodeSpan => "code_span",
      Self::Br => "br",
      Self::Del => "del",
      Self::InlineText => "inline_text",
      Self::HeadingId => "heading_id",
      Self::TabGroup => "tab_group",
    }
  }

  #[must_use]
  pub fn is_block(self) -> bool {
    Self::BLOCK_ORDER.contains(&self)
      || matches!(self, Self::HeadingId | Self::TabGroup)
  }

  #[must_use]
  pub fn is_inline(self) -> bool {
    Self::INLINE_ORDER.contains(&self)
  }
}

impl fmt::Display for Rule {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

/// An ordered set of pattern overrides applied on top of earlier layers.
#[derive(Debug, Clone, Default)]
pub struct RuleLayer {
  name:      String,
  overrides: Vec<(Rule, Option<String>)>,
}

impl RuleLayer {
  #[must_use]
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name:      name.into(),
      overrides: Vec::new(),
    }
  }

  /// Replace the pattern for `rule`.
  #[must_use]
  pub fn with(mut self, rule: Rule, pattern: impl Into<String>) -> Self {
    self.overrides.push((rule, Some(pattern.into())));
    self
  }

  /// Remove `rule` from the table; lookups fall back to the never-match
  /// sentinel.
  #[must_use]
  pub fn without(mut self, rule: Rule) -> Self {
    self.overrides.push((rule, None));
    self
  }

  #[must_use]
  pub fn name(&self) -> &str {
    &self.name
  }

  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.overrides.is_empty()
  }
}

/// Resolved pattern sources: rule to (layer name, pattern).
type Resolved = HashMap<Rule, (String, String)>;

/// An immutable rule-to-regex table.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
  layers:   Vec<String>,
  sources:  Resolved,
  patterns: HashMap<Rule, Arc<Regex>>,
}

impl RuleSet {
  /// Build a table from `layers`, applied in order.
  ///
  /// # Errors
  ///
  /// Returns [`RuleError::InvalidPattern`] for the first override that does
  /// not compile.
  pub fn from_layers(layers: &[RuleLayer]) -> Result<Self, RuleError> {
    let sources = resolve(Resolved::new(), layers);
    let mut patterns = HashMap::with_capacity(sources.len());
    for (rule, (layer, pattern)) in &sources {
      let regex =
        cached_regex(pattern).map_err(|source| RuleError::InvalidPattern {
          rule: *rule,
          layer: layer.clone(),
          source,
        })?;
      patterns.insert(*rule, regex);
    }
    Ok(Self {
      layers: layers.iter().map(|l| l.name.clone()).collect(),
      sources,
      patterns,
    })
  }

  /// Derive a new table with `layer` applied on top of this one. Rules the
  /// layer does not mention keep the exact compiled regex of `self`.
  ///
  /// # Errors
  ///
  /// Returns [`RuleError::InvalidPattern`] if an override does not compile.
  pub fn extend(&self, layer: &RuleLayer) -> Result<Self, RuleError> {
    let mut derived = self.clone();
    for (rule, pattern) in &layer.overrides {
      match pattern {
        Some(pattern) => {
          let regex = cached_regex(pattern).map_err(|source| {
            RuleError::InvalidPattern {
              rule: *rule,
              layer: layer.name.clone(),
              source,
            }
          })?;
          derived
            .sources
            .insert(*rule, (layer.name.clone(), pattern.clone()));
          derived.patterns.insert(*rule, regex);
        },
        None => {
          derived.sources.remove(rule);
          derived.patterns.remove(rule);
        },
      }
    }
    derived.layers.push(layer.name.clone());
    Ok(derived)
  }

  /// The shared built-in table for `options`.
  #[must_use]
  pub fn for_options(options: &LexerOptions) -> Arc<Self> {
    let options = options.normalized();
    if let Ok(cache) = RULE_SETS.read()
      && let Some(set) = cache.get(&options)
    {
      return Arc::clone(set);
    }

    let layers = builtin_layers(&options);
    debug!(
      "Building rule table from layers: {}",
      layers
        .iter()
        .map(RuleLayer::name)
        .collect::<Vec<_>>()
        .join(" > ")
    );
    let set = Arc::new(Self::compile_lossy(&layers));

    match RULE_SETS.write() {
      Ok(mut cache) => Arc::clone(cache.entry(options).or_insert(set)),
      Err(_) => set,
    }
  }

  /// Built-in patterns are known to compile; if one ever does not, the rule
  /// is logged and degraded to the never-match sentinel.
  fn compile_lossy(layers: &[RuleLayer]) -> Self {
    let sources = resolve(Resolved::new(), layers);
    let patterns = sources
      .iter()
      .map(|(rule, (layer, pattern))| {
        let regex = cached_regex(pattern).unwrap_or_else(|e| {
          error!("Built-in pattern for {rule} in layer {layer} is invalid: {e}");
          Arc::new(never_matching_regex())
        });
        (*rule, regex)
      })
      .collect();
    Self {
      layers: layers.iter().map(|l| l.name.clone()).collect(),
      sources,
      patterns,
    }
  }

  /// The regex for `rule`, or the never-match sentinel when absent.
  #[must_use]
  pub fn get(&self, rule: Rule) -> &Regex {
    self.patterns.get(&rule).map_or(&*NEVER, |r| r.as_ref())
  }

  /// The shared compiled regex for `rule`, if the table carries it.
  #[must_use]
  pub fn shared(&self, rule: Rule) -> Option<&Arc<Regex>> {
    self.patterns.get(&rule)
  }

  #[must_use]
  pub fn is_enabled(&self, rule: Rule) -> bool {
    self.patterns.contains_key(&rule)
  }

  /// Name of the layer that supplied the active pattern for `rule`.
  #[must_use]
  pub fn origin(&self, rule: Rule) -> Option<&str> {
    self.sources.get(&rule).map(|(layer, _)| layer.as_str())
  }

  /// Names of the layers this table was built from, in application order.
  #[must_use]
  pub fn layers(&self) -> &[String] {
    &self.layers
  }
}

fn resolve(mut sources: Resolved, layers: &[RuleLayer]) -> Resolved {
  for layer in layers {
    for (rule, pattern) in &layer.overrides {
      match pattern {
        Some(pattern) => {
          sources.insert(*rule, (layer.name.clone(), pattern.clone()));
        },
        None => {
          sources.remove(rule);
        },
      }
    }
  }
  sources
}

/// The built-in layer stack for an option bundle.
#[must_use]
pub fn builtin_layers(options: &LexerOptions) -> Vec<RuleLayer> {
  let options = options.normalized();
  let mut layers = vec![block::base().merge(inline::base())];
  if options.gfm {
    layers.push(block::gfm().merge(inline::gfm()));
  }
  if options.tables {
    layers.push(block::tables());
  }
  if options.breaks {
    layers.push(inline::breaks());
  }
  if options.pedantic {
    layers.push(inline::pedantic());
  }
  if options.dfm {
    layers.push(block::dfm().merge(inline::dfm(options.breaks)));
  }
  layers
}

impl RuleLayer {
  /// Append the overrides of `other` to this layer, keeping this layer's name.
  #[must_use]
  pub fn merge(mut self, other: Self) -> Self {
    self.overrides.extend(other.overrides);
    self
  }
}

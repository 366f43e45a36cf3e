use marklite_engine::{
  LexerOptions,
  snippet::Language,
  validate::TagRule,
};
use marklite_macros::Configurable;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Markdown dialect switches, mirroring [`LexerOptions`].
///
/// An absent `[dialect]` section means the full DocFX dialect.
#[derive(Debug, Clone, Serialize, Deserialize, Configurable)]
#[serde(default)]
#[allow(
  clippy::struct_excessive_bools,
  reason = "Dialect switches are independent flags"
)]
pub struct DialectConfig {
  /// GitHub flavored extensions
  pub gfm: bool,

  /// Pipe tables
  pub tables: bool,

  /// Newlines inside paragraphs become hard breaks
  pub breaks: bool,

  /// Stricter emphasis and list handling
  pub pedantic: bool,

  /// DocFX extensions (YAML header, notes, includes, code snippets, xrefs)
  pub dfm: bool,
}

impl Default for DialectConfig {
  fn default() -> Self {
    Self::from(LexerOptions::dfm())
  }
}

impl From<LexerOptions> for DialectConfig {
  fn from(options: LexerOptions) -> Self {
    Self {
      gfm:      options.gfm,
      tables:   options.tables,
      breaks:   options.breaks,
      pedantic: options.pedantic,
      dfm:      options.dfm,
    }
  }
}

impl From<&DialectConfig> for LexerOptions {
  fn from(dialect: &DialectConfig) -> Self {
    Self {
      gfm:      dialect.gfm,
      tables:   dialect.tables,
      breaks:   dialect.breaks,
      pedantic: dialect.pedantic,
      dfm:      dialect.dfm,
    }
    .normalized()
  }
}

/// Which checks run over every document.
#[derive(Debug, Clone, Serialize, Deserialize, Configurable)]
#[serde(default)]
pub struct ValidationConfig {
  /// Report multiple level-1 headings and skipped heading levels
  pub headings: bool,

  /// Treat warnings as failures when checking
  pub fail_on_warning: bool,

  /// HTML tag rules, written as `[[validation.tags]]` tables
  #[config(skip)]
  pub tags: Vec<TagRule>,
}

impl Default for ValidationConfig {
  fn default() -> Self {
    Self {
      headings:        true,
      fail_on_warning: false,
      tags:            Vec::new(),
    }
  }
}

impl ValidationConfig {
  /// # Errors
  ///
  /// Returns an error if a tag rule lists no tags.
  pub fn validate(&self) -> Result<(), ConfigError> {
    for (index, rule) in self.tags.iter().enumerate() {
      if rule.tags.iter().all(|tag| tag.trim().is_empty()) {
        return Err(ConfigError::Config(format!(
          "validation.tags[{index}] must list at least one tag"
        )));
      }
    }
    Ok(())
  }
}

/// Code snippet extraction settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Configurable)]
#[serde(default)]
pub struct SnippetConfig {
  /// Language used for files whose extension no language claims
  pub fallback_language: Option<String>,

  /// Extra languages, written as `[[snippet.languages]]` tables
  #[config(skip)]
  pub languages: Vec<LanguageConfig>,
}

/// A user-defined snippet language.
///
/// `start` and `end` are regular expressions with a `name` capture group
/// holding the tag name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageConfig {
  pub name:       String,
  pub extensions: Vec<String>,
  pub start:      String,
  pub end:        String,
}

impl LanguageConfig {
  /// # Errors
  ///
  /// Returns an error if either pattern fails to compile or has no `name`
  /// group.
  pub fn to_language(&self) -> Result<Language, ConfigError> {
    Language::new(&*self.name, &self.extensions, &[(
      self.start.as_str(),
      self.end.as_str(),
    )])
    .map_err(|e| {
      ConfigError::Config(format!(
        "Invalid snippet language '{}': {e}",
        self.name
      ))
    })
  }
}

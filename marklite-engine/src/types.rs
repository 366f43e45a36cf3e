//! Option types shared by the lexer and the pipeline.
//!
//! # Examples
//!
//! ```
//! use marklite_engine::LexerOptions;
//!
//! let options = LexerOptions {
//!   breaks: true,
//!   ..Default::default()
//! };
//! assert!(options.normalized().gfm);
//! ```

use serde::{Deserialize, Serialize};

/// Dialect switches for the lexer.
///
/// Each switch adds a rule layer on top of the base grammar. Some switches
/// only make sense on top of others; [`LexerOptions::normalized`] turns
/// those dependencies on.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(default)]
#[allow(
  clippy::struct_excessive_bools,
  reason = "Dialect switches are independent flags"
)]
pub struct LexerOptions {
  /// GitHub flavored extensions: fences, strike-through, bare URLs.
  pub gfm: bool,

  /// Pipe tables. Implies `gfm`.
  pub tables: bool,

  /// Treat every newline inside a paragraph as a hard break. Implies `gfm`.
  pub breaks: bool,

  /// Stricter emphasis and list indentation handling.
  pub pedantic: bool,

  /// DocFX extensions: YAML header, notes, includes, code snippets, xrefs.
  /// Implies `gfm` and `tables`.
  pub dfm: bool,
}

impl Default for LexerOptions {
  fn default() -> Self {
    Self {
      gfm:      true,
      tables:   true,
      breaks:   false,
      pedantic: false,
      dfm:      false,
    }
  }
}

impl LexerOptions {
  /// Plain Markdown with no extensions.
  #[must_use]
  pub const fn markdown() -> Self {
    Self {
      gfm:      false,
      tables:   false,
      breaks:   false,
      pedantic: false,
      dfm:      false,
    }
  }

  /// The full DocFX dialect.
  #[must_use]
  pub const fn dfm() -> Self {
    Self {
      gfm:      true,
      tables:   true,
      breaks:   false,
      pedantic: false,
      dfm:      true,
    }
  }

  /// Resolve switch dependencies.
  #[must_use]
  pub const fn normalized(mut self) -> Self {
    if self.dfm {
      self.tables = true;
    }
    if self.tables || self.breaks {
      self.gfm = true;
    }
    self
  }
}

/// Builder for [`LexerOptions`].
#[derive(Debug, Clone, Default)]
pub struct LexerOptionsBuilder {
  options: LexerOptions,
}

impl LexerOptionsBuilder {
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  #[must_use]
  pub const fn gfm(mut self, enabled: bool) -> Self {
    self.options.gfm = enabled;
    self
  }

  #[must_use]
  pub const fn tables(mut self, enabled: bool) -> Self {
    self.options.tables = enabled;
    self
  }

  #[must_use]
  pub const fn breaks(mut self, enabled: bool) -> Self {
    self.options.breaks = enabled;
    self
  }

  #[must_use]
  pub const fn pedantic(mut self, enabled: bool) -> Self {
    self.options.pedantic = enabled;
    self
  }

  #[must_use]
  pub const fn dfm(mut self, enabled: bool) -> Self {
    self.options.dfm = enabled;
    self
  }

  #[must_use]
  pub const fn build(self) -> LexerOptions {
    self.options.normalized()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_normalized_dependencies() {
    let options = LexerOptionsBuilder::new()
      .gfm(false)
      .tables(false)
      .dfm(true)
      .build();
    assert!(options.gfm);
    assert!(options.tables);

    let plain = LexerOptions::markdown().normalized();
    assert_eq!(plain, LexerOptions::markdown());
  }
}

use std::{collections::HashMap, path::Path, sync::Arc};

use log::{debug, warn};

use super::TagPattern;
use crate::error::SnippetError;

const C_FAMILY: (&str, &str) = (
  r"^\s*/{2}\s*<\s*(?P<name>[\w.\-]+)\s*>\s*$",
  r"^\s*/{2}\s*<\s*/\s*(?P<name>[\w.\-]+)\s*>\s*$",
);
const REGION: (&str, &str) = (
  r"^\s*#\s*region\b\s*(?P<name>.*?)\s*$",
  r"^\s*#\s*endregion\b\s*(?P<name>.*?)\s*$",
);
const SQL: (&str, &str) = (
  r"^\s*-{2}\s*<\s*(?P<name>[\w.\-]+)\s*>\s*$",
  r"^\s*-{2}\s*<\s*/\s*(?P<name>[\w.\-]+)\s*>\s*$",
);
const BASIC: (&str, &str) = (
  r"^\s*'\s*<\s*(?P<name>[\w.\-]+)\s*>\s*$",
  r"^\s*'\s*<\s*/\s*(?P<name>[\w.\-]+)\s*>\s*$",
);
const MARKUP: (&str, &str) = (
  r"^\s*<!--\s*<\s*(?P<name>[\w.\-]+)\s*>\s*-->\s*$",
  r"^\s*<!--\s*<\s*/\s*(?P<name>[\w.\-]+)\s*>\s*-->\s*$",
);
const SCRIPT: (&str, &str) = (
  r"^\s*#\s*<\s*(?P<name>[\w.\-]+)\s*>\s*$",
  r"^\s*#\s*<\s*/\s*(?P<name>[\w.\-]+)\s*>\s*$",
);
const BATCH: (&str, &str) = (
  r"(?i)^\s*rem\s+<\s*(?P<name>[\w.\-]+)\s*>\s*$",
  r"(?i)^\s*rem\s+<\s*/\s*(?P<name>[\w.\-]+)\s*>\s*$",
);

const BUILTIN: &[(&str, &[&str], &[(&str, &str)])] = &[
  ("csharp", &["cs", "csharp", "c#"], &[C_FAMILY, REGION]),
  ("c", &[
    "c", "h", "cpp", "cc", "cxx", "hpp", "c++", "cuda", "m", "objc",
  ], &[C_FAMILY]),
  ("java", &["java", "kt", "kotlin", "scala", "groovy", "swift"], &[C_FAMILY]),
  ("javascript", &[
    "js", "javascript", "jsx", "ts", "typescript", "tsx", "mjs", "json",
  ], &[C_FAMILY]),
  ("fsharp", &["fs", "fsharp", "fsi", "fsx"], &[C_FAMILY]),
  ("go", &["go", "golang"], &[C_FAMILY]),
  ("rust", &["rs", "rust"], &[C_FAMILY]),
  ("php", &["php"], &[C_FAMILY]),
  ("sql", &["sql", "tsql"], &[SQL]),
  ("vb", &["vb", "vbnet", "vbs", "vbscript"], &[BASIC]),
  ("xml", &[
    "xml", "xaml", "html", "htm", "cshtml", "vbhtml", "csproj", "config",
  ], &[MARKUP]),
  ("script", &[
    "py", "python", "ps1", "powershell", "sh", "bash", "rb", "ruby", "pl",
    "perl", "r", "yml", "yaml", "cmake",
  ], &[SCRIPT]),
  ("batch", &["bat", "cmd", "batchfile"], &[BATCH]),
];

/// A source language and the markers its snippet tags are written with.
#[derive(Debug, Clone)]
pub struct Language {
  name:       String,
  extensions: Vec<String>,
  patterns:   Vec<TagPattern>,
}

impl Language {
  /// # Errors
  ///
  /// Returns the first pattern that fails to compile or lacks a `name`
  /// group.
  pub fn new<I, S>(
    name: impl Into<String>,
    extensions: I,
    patterns: &[(&str, &str)],
  ) -> Result<Self, SnippetError>
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    Ok(Self {
      name:       name.into(),
      extensions: extensions
        .into_iter()
        .map(|ext| normalize_extension(ext.as_ref()))
        .collect(),
      patterns:   patterns
        .iter()
        .map(|(start, end)| TagPattern::new(start, end))
        .collect::<Result<_, _>>()?,
    })
  }

  #[must_use]
  pub fn name(&self) -> &str {
    &self.name
  }

  #[must_use]
  pub fn extensions(&self) -> &[String] {
    &self.extensions
  }

  #[must_use]
  pub fn patterns(&self) -> &[TagPattern] {
    &self.patterns
  }
}

fn normalize_extension(ext: &str) -> String {
  ext.trim().trim_start_matches('.').to_lowercase()
}

/// Languages by file extension or fence name.
#[derive(Debug, Clone, Default)]
pub struct LanguageRegistry {
  languages:    Vec<Arc<Language>>,
  by_extension: HashMap<String, usize>,
}

impl LanguageRegistry {
  /// The languages known without any configuration.
  #[must_use]
  pub fn builtin() -> Self {
    let mut registry = Self::default();
    for (name, extensions, patterns) in BUILTIN {
      match Language::new(*name, extensions.iter(), patterns) {
        Ok(language) => registry.register(language),
        Err(e) => warn!("Skipping built-in snippet language '{name}': {e}"),
      }
    }
    registry
  }

  /// Add a language. Its extensions take over from languages registered
  /// earlier.
  pub fn register(&mut self, language: Language) {
    let index = self.languages.len();
    for ext in language.extensions() {
      if let Some(previous) = self.by_extension.insert(ext.clone(), index) {
        debug!(
          "Extension '{ext}' moves from '{}' to '{}'",
          self.languages[previous].name(),
          language.name()
        );
      }
    }
    self.languages.push(Arc::new(language));
  }

  /// Look a language up by extension or alias, with or without the dot.
  #[must_use]
  pub fn for_extension(&self, ext: &str) -> Option<&Language> {
    self
      .by_extension
      .get(&normalize_extension(ext))
      .and_then(|index| self.languages.get(*index))
      .map(AsRef::as_ref)
  }

  #[must_use]
  pub fn for_path(&self, path: &Path) -> Option<&Language> {
    path
      .extension()
      .and_then(|ext| ext.to_str())
      .and_then(|ext| self.for_extension(ext))
  }

  pub fn languages(&self) -> impl Iterator<Item = &Language> {
    self.languages.iter().map(AsRef::as_ref)
  }
}

#[cfg(test)]
mod tests {
  #![allow(clippy::unwrap_used, reason = "Fine in tests")]
  use super::*;
  use crate::snippet::resolve_tags;

  #[test]
  fn test_lookup() {
    let registry = LanguageRegistry::builtin();
    assert_eq!(registry.for_extension(".CS").unwrap().name(), "csharp");
    assert_eq!(registry.for_extension("c#").unwrap().name(), "csharp");
    assert_eq!(
      registry.for_path(Path::new("src/app.py")).unwrap().name(),
      "script"
    );
    assert!(registry.for_extension("unknown").is_none());
    assert_eq!(registry.languages().count(), BUILTIN.len());
  }

  #[test]
  fn test_every_builtin_marker_style() {
    let registry = LanguageRegistry::builtin();
    for (ext, open, close) in [
      ("cs", "// <t>", "// </t>"),
      ("cs", "#region t", "#endregion"),
      ("sql", "-- <t>", "-- </t>"),
      ("vb", "' <t>", "' </t>"),
      ("xml", "<!-- <t> -->", "<!-- </t> -->"),
      ("sh", "# <t>", "# </t>"),
      ("bat", "REM <t>", "rem </t>"),
    ] {
      let language = registry.for_extension(ext).unwrap();
      let tags = resolve_tags(&[open, "body", close], language.patterns());
      assert_eq!(tags["t"].lines(), [2], "{ext}: {open}");
    }
  }

  #[test]
  fn test_register_overrides_extension() {
    let mut registry = LanguageRegistry::builtin();
    registry.register(
      Language::new("custom", ["py"], &[(
        r"^\s*;;\s*start\s+(?P<name>\w+)$",
        r"^\s*;;\s*end\s+(?P<name>\w+)$",
      )])
      .unwrap(),
    );
    let language = registry.for_extension("py").unwrap();
    assert_eq!(language.name(), "custom");
    let tags = resolve_tags(&[";; start a", "x", ";; end a"], language.patterns());
    assert!(tags["a"].success);
  }

  #[test]
  fn test_invalid_pattern() {
    assert!(Language::new("bad", ["x"], &[("(", "(?P<name>x)")]).is_err());
  }
}

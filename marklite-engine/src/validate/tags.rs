use std::{collections::HashSet, sync::LazyLock};

use log::error;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::Validator;
use crate::{
  diagnostics::Severity,
  error::RewriteError,
  rewrite::RewriteContext,
  token::{Token, TokenKind, TokenRef},
  utils::never_matching_regex,
};

static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"<(/?)([A-Za-z][A-Za-z0-9\-]*)").unwrap_or_else(|e| {
    error!("Failed to compile HTML_TAG regex: {e}");
    never_matching_regex()
  })
});

const fn default_severity() -> Severity {
  Severity::Warning
}

fn default_message() -> String {
  "Html tag {0} is not allowed".to_owned()
}

/// Which HTML tags to report and how.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRule {
  /// Tag names, matched case-insensitively.
  pub tags:         Vec<String>,
  /// Report only opening tags.
  #[serde(default)]
  pub opening_only: bool,
  #[serde(default = "default_severity")]
  pub severity:     Severity,
  /// `{0}` is replaced by the tag name.
  #[serde(default = "default_message")]
  pub message:      String,
}

impl TagRule {
  #[must_use]
  pub fn new<I, S>(tags: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      tags:         tags.into_iter().map(Into::into).collect(),
      opening_only: false,
      severity:     default_severity(),
      message:      default_message(),
    }
  }

  #[must_use]
  pub const fn opening_only(mut self, opening_only: bool) -> Self {
    self.opening_only = opening_only;
    self
  }

  #[must_use]
  pub const fn severity(mut self, severity: Severity) -> Self {
    self.severity = severity;
    self
  }

  #[must_use]
  pub fn message(mut self, message: impl Into<String>) -> Self {
    self.message = message.into();
    self
  }
}

struct CompiledRule {
  tags: HashSet<String>,
  rule: TagRule,
}

/// Reports HTML tags listed in its [`TagRule`]s, whether written inline or
/// inside an html block.
pub struct TagValidator {
  rules: Vec<CompiledRule>,
}

impl TagValidator {
  #[must_use]
  pub fn new(rules: Vec<TagRule>) -> Self {
    Self {
      rules: rules
        .into_iter()
        .map(|rule| {
          CompiledRule {
            tags: rule.tags.iter().map(|t| t.to_ascii_lowercase()).collect(),
            rule,
          }
        })
        .collect(),
    }
  }

  fn check(&self, raw: &str, token: &Token, context: &mut RewriteContext) {
    for caps in HTML_TAG.captures_iter(raw) {
      let closing = caps.get(1).is_some_and(|m| !m.is_empty());
      let Some(name) = caps.get(2).map(|m| m.as_str()) else {
        continue;
      };
      let lower = name.to_ascii_lowercase();
      for compiled in &self.rules {
        if closing && compiled.rule.opening_only {
          continue;
        }
        if compiled.tags.contains(&lower) {
          context.report(
            compiled.rule.severity,
            compiled.rule.message.replace("{0}", name),
            token,
          );
        }
      }
    }
  }
}

impl Validator for TagValidator {
  fn name(&self) -> &'static str {
    "html-tags"
  }

  fn validate_token(
    &self,
    token: &TokenRef,
    context: &mut RewriteContext,
  ) -> Result<(), RewriteError> {
    match &token.kind {
      TokenKind::Tag { raw } => self.check(raw, token, context),
      // Inline content of other html blocks is visited on its own.
      TokenKind::Html { pre: true, .. } => {
        self.check(&token.source.markdown, token, context);
      },
      _ => {},
    }
    Ok(())
  }

  fn is_null(&self) -> bool {
    self.rules.iter().all(|r| r.tags.is_empty())
  }
}

#[cfg(test)]
mod tests {
  #![allow(clippy::unwrap_used, reason = "Fine in tests")]
  use std::sync::Arc;

  use super::*;
  use crate::{
    Lexer,
    LexerOptions,
    rewrite::{self, RewriteEngine},
  };

  fn diagnostics(source: &str, rules: Vec<TagRule>) -> Vec<(Severity, String, usize)> {
    let tokens = Lexer::new(LexerOptions::default())
      .tokenize(source, Some("page.md"))
      .unwrap()
      .tokens;
    let engine =
      RewriteEngine::new(rewrite::null(), Arc::new(TagValidator::new(rules)));
    let mut context = RewriteContext::new(Some("page.md"));
    engine.run(tokens, &mut context).unwrap();
    context
      .into_diagnostics()
      .into_iter()
      .map(|d| (d.severity, d.message, d.line.unwrap_or_default()))
      .collect()
  }

  #[test]
  fn test_inline_tags() {
    let found = diagnostics(
      "intro\n\nSome <Script>x</script> here\n",
      vec![TagRule::new(["script"])],
    );
    assert_eq!(found, [
      (Severity::Warning, "Html tag Script is not allowed".to_owned(), 3),
      (Severity::Warning, "Html tag script is not allowed".to_owned(), 3),
    ]);
  }

  #[test]
  fn test_opening_only_and_template() {
    let found = diagnostics(
      "Some <em>x</em>\n",
      vec![
        TagRule::new(["em"])
          .opening_only(true)
          .severity(Severity::Error)
          .message("Avoid <{0}>"),
      ],
    );
    assert_eq!(found, [(Severity::Error, "Avoid <em>".to_owned(), 1)]);
  }

  #[test]
  fn test_pre_block() {
    let found = diagnostics(
      "<pre>\n<iframe src=\"x\"></iframe>\n</pre>\n",
      vec![TagRule::new(["iframe"]).opening_only(true)],
    );
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].2, 1);
  }

  #[test]
  fn test_empty_rules_are_null() {
    assert!(TagValidator::new(Vec::new()).is_null());
    assert!(TagValidator::new(vec![TagRule::new(Vec::<String>::new())]).is_null());
  }
}

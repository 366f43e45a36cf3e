use super::Validator;
use crate::{
  diagnostics::Severity,
  error::RewriteError,
  rewrite::RewriteContext,
  token::{TokenKind, TokenRef, collect, plain_text},
};

/// Document outline checks: a single level-1 heading and no skipped levels.
#[derive(Debug, Clone, Copy)]
pub struct HeadingValidator {
  pub severity: Severity,
}

impl Default for HeadingValidator {
  fn default() -> Self {
    Self {
      severity: Severity::Warning,
    }
  }
}

impl Validator for HeadingValidator {
  fn name(&self) -> &'static str {
    "headings"
  }

  fn validate_document(
    &self,
    tokens: &[TokenRef],
    context: &mut RewriteContext,
  ) -> Result<(), RewriteError> {
    let headings = collect(tokens, |t| matches!(t.kind, TokenKind::Heading(_)));

    let mut seen_title = false;
    let mut previous: Option<u8> = None;
    for token in &headings {
      let Some(heading) = token.as_heading() else {
        continue;
      };

      if heading.depth == 1 {
        if seen_title {
          context.report(
            self.severity,
            format!(
              "Multiple level-1 headings: \"{}\"",
              plain_text(&heading.content)
            ),
            token,
          );
        }
        seen_title = true;
      }

      if let Some(previous) = previous
        && heading.depth > previous + 1
      {
        context.report(
          self.severity,
          format!(
            "Heading level skips from h{previous} to h{}",
            heading.depth
          ),
          token,
        );
      }
      previous = Some(heading.depth);
    }
    Ok(())
  }
}

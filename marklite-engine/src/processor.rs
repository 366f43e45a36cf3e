//! The per-document pipeline: lex, aggregate, rewrite, validate.
//!
//! A [`Pipeline`] owns nothing mutable. It can be cloned freely and shared
//! between worker threads; every call to [`Pipeline::process`] gets its own
//! [`RewriteContext`].
use std::{fmt, panic::AssertUnwindSafe, sync::Arc};

use log::{debug, error};
use rayon::prelude::*;
use serde::Serialize;

use crate::{
  aggregate::{self, Aggregator},
  diagnostics::{self, Diagnostic, Severity},
  error::{EngineResult, RuleError},
  lexer::{Lexer, Links},
  rewrite::{self, Loop, RewriteContext, RewriteEngine, Rewriter, Sequence},
  rules::{RuleLayer, RuleSet},
  token::TokenRef,
  types::LexerOptions,
  validate::{self, Validator},
};

/// Everything a pipeline run produces for one document.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedDocument {
  pub file:        Option<String>,
  pub tokens:      Vec<TokenRef>,
  pub diagnostics: Vec<Diagnostic>,
  pub links:       Links,
}

impl ProcessedDocument {
  /// A document that could not be processed, carrying one error diagnostic.
  #[must_use]
  pub fn failed(file: Option<&str>, message: impl Into<String>) -> Self {
    Self {
      file:        file.map(str::to_owned),
      tokens:      Vec::new(),
      diagnostics: vec![Diagnostic {
        file: file.map(str::to_owned),
        ..Diagnostic::new(Severity::Error, message)
      }],
      links:       Links::new(),
    }
  }

  #[must_use]
  pub fn has_errors(&self) -> bool {
    self.has_severity(Severity::Error)
  }

  /// Whether any diagnostic is at least `threshold`.
  #[must_use]
  pub fn has_severity(&self, threshold: Severity) -> bool {
    diagnostics::has_severity(&self.diagnostics, threshold)
  }
}

/// A configured lexer, aggregator list and rewrite engine.
#[derive(Clone)]
pub struct Pipeline {
  lexer:       Lexer,
  aggregators: Vec<Arc<dyn Aggregator>>,
  engine:      RewriteEngine,
}

impl fmt::Debug for Pipeline {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Pipeline")
      .field("options", self.lexer.options())
      .field("layers", &self.lexer.rules().layers())
      .field(
        "aggregators",
        &self.aggregators.iter().map(|a| a.name()).collect::<Vec<_>>(),
      )
      .field("engine", &self.engine)
      .finish()
  }
}

impl Default for Pipeline {
  fn default() -> Self {
    Self::new(LexerOptions::default())
  }
}

impl Pipeline {
  /// Built-in rules and aggregators for `options`, with no rewriter and no
  /// validator.
  #[must_use]
  pub fn new(options: LexerOptions) -> Self {
    Self {
      lexer:       Lexer::new(options),
      aggregators: aggregate::builtin(),
      engine:      RewriteEngine::default(),
    }
  }

  #[must_use]
  pub fn builder() -> PipelineBuilder {
    PipelineBuilder::new()
  }

  #[must_use]
  pub const fn lexer(&self) -> &Lexer {
    &self.lexer
  }

  #[must_use]
  pub const fn engine(&self) -> &RewriteEngine {
    &self.engine
  }

  /// Run the whole pipeline over one document.
  ///
  /// # Errors
  ///
  /// Returns an error if lexing fails or a rewriter or validator fails.
  /// Findings of validators are diagnostics, not errors.
  pub fn process(
    &self,
    source: &str,
    file: Option<&str>,
  ) -> EngineResult<ProcessedDocument> {
    let name = file.unwrap_or("<input>");
    debug!("Processing {name} ({} bytes)", source.len());

    let lexed = self.lexer.tokenize(source, file)?;
    let tokens = aggregate::aggregate_all(lexed.tokens, &self.aggregators);

    let mut context = RewriteContext::new(file);
    let tokens = self.engine.run(tokens, &mut context)?;
    let diagnostics = context.into_diagnostics();

    debug!(
      "Processed {name}: {} top-level tokens, {} diagnostics",
      tokens.len(),
      diagnostics.len()
    );

    Ok(ProcessedDocument {
      file: file.map(str::to_owned),
      tokens,
      diagnostics,
      links: lexed.links,
    })
  }

  /// Like [`Pipeline::process`], but never fails: errors and panics become
  /// a single error diagnostic on an empty document.
  #[must_use]
  pub fn process_with_recovery(
    &self,
    source: &str,
    file: Option<&str>,
  ) -> ProcessedDocument {
    let name = file.unwrap_or("<input>");
    match std::panic::catch_unwind(AssertUnwindSafe(|| {
      self.process(source, file)
    })) {
      Ok(Ok(document)) => document,
      Ok(Err(e)) => {
        error!("Failed to process {name}: {e}");
        ProcessedDocument::failed(file, e.to_string())
      },
      Err(panic_err) => {
        let reason = panic_err
          .downcast_ref::<String>()
          .map(String::as_str)
          .or_else(|| panic_err.downcast_ref::<&str>().copied())
          .unwrap_or("unknown cause");
        error!("Panic during markdown processing of {name}: {reason}");
        ProcessedDocument::failed(
          file,
          format!("Internal error while processing document: {reason}"),
        )
      },
    }
  }

  /// Process `(file, source)` pairs in parallel on the current rayon pool.
  /// Results keep the input order.
  pub fn process_batch<F, S>(&self, documents: &[(F, S)]) -> Vec<ProcessedDocument>
  where
    F: AsRef<str> + Sync,
    S: AsRef<str> + Sync,
  {
    documents
      .par_iter()
      .map(|(file, source)| {
        self.process_with_recovery(source.as_ref(), Some(file.as_ref()))
      })
      .collect()
  }
}

/// Builder for [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
  options:     LexerOptions,
  layers:      Vec<RuleLayer>,
  aggregators: Option<Vec<Arc<dyn Aggregator>>>,
  rewriters:   Vec<Arc<dyn Rewriter>>,
  max_passes:  usize,
  validators:  Vec<Arc<dyn Validator>>,
}

impl PipelineBuilder {
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  #[must_use]
  pub const fn options(mut self, options: LexerOptions) -> Self {
    self.options = options;
    self
  }

  /// Apply `layer` on top of the built-in rule table. Layers apply in the
  /// order they are added.
  #[must_use]
  pub fn layer(mut self, layer: RuleLayer) -> Self {
    self.layers.push(layer);
    self
  }

  /// Replace the built-in aggregators.
  #[must_use]
  pub fn aggregators(mut self, aggregators: Vec<Arc<dyn Aggregator>>) -> Self {
    self.aggregators = Some(aggregators);
    self
  }

  /// Add a rewriter. Several rewriters run in sequence on each token.
  #[must_use]
  pub fn rewriter(mut self, rewriter: Arc<dyn Rewriter>) -> Self {
    self.rewriters.push(rewriter);
    self
  }

  /// Repeat rewrite passes until nothing changes, at most `max` times.
  #[must_use]
  pub const fn max_passes(mut self, max: usize) -> Self {
    self.max_passes = max;
    self
  }

  #[must_use]
  pub fn validator(mut self, validator: Arc<dyn Validator>) -> Self {
    self.validators.push(validator);
    self
  }

  /// # Errors
  ///
  /// Returns [`RuleError::InvalidPattern`] if a custom layer carries a
  /// pattern that does not compile.
  pub fn build(self) -> Result<Pipeline, RuleError> {
    let options = self.options.normalized();
    let lexer = if self.layers.is_empty() {
      Lexer::new(options)
    } else {
      let rules = self
        .layers
        .iter()
        .try_fold(RuleSet::for_options(&options), |rules, layer| {
          rules.extend(layer).map(Arc::new)
        })?;
      debug!("Custom rule table: {}", rules.layers().join(" > "));
      Lexer::with_rules(options, rules)
    };

    let mut rewriters = self.rewriters;
    let rewriter = match rewriters.len() {
      0 => rewrite::null(),
      1 => rewriters.remove(0),
      _ => Arc::new(Sequence::new(rewriters)),
    };
    let rewriter: Arc<dyn Rewriter> =
      if self.max_passes > 1 && !rewriter.is_null() {
        Arc::new(Loop::new(rewriter, self.max_passes))
      } else {
        rewriter
      };

    Ok(Pipeline {
      lexer,
      aggregators: self.aggregators.unwrap_or_else(aggregate::builtin),
      engine: RewriteEngine::new(rewriter, validate::combine(self.validators)),
    })
  }
}

#[cfg(test)]
mod tests {
  #![allow(clippy::unwrap_used, clippy::panic, reason = "Fine in tests")]
  use super::*;
  use crate::{
    error::{EngineError, RewriteError},
    rules::Rule,
    token::{Token, TokenKind},
    validate::HeadingValidator,
  };

  #[test]
  fn test_default_pipeline_aggregates() {
    let document = Pipeline::default()
      .process("## <a name=\"intro\"></a>Intro\n\ntext\n", Some("a.md"))
      .unwrap();
    let heading = document.tokens[0].as_heading().unwrap();
    assert_eq!(heading.id.as_deref(), Some("intro"));
    assert_eq!(document.tokens[0].rule, Rule::HeadingId);
    assert!(document.diagnostics.is_empty());
    assert_eq!(document.file.as_deref(), Some("a.md"));
  }

  #[test]
  fn test_links_are_returned() {
    let document = Pipeline::default()
      .process("[Home][home]\n\n[home]: /index.html \"Start\"\n", None)
      .unwrap();
    assert_eq!(document.links["home"].href, "/index.html");
    assert_eq!(document.links["home"].title.as_deref(), Some("Start"));
  }

  #[test]
  fn test_rewriters_and_validators() {
    let upper = rewrite::from_fn("upper", |token, _| {
      Ok(match &token.kind {
        TokenKind::InlineText { text } if text != &text.to_uppercase() => {
          Some(Arc::new(Token {
            kind: TokenKind::InlineText {
              text: text.to_uppercase(),
            },
            ..Token::clone(token)
          }))
        },
        _ => None,
      })
    });
    let pipeline = Pipeline::builder()
      .rewriter(Arc::new(upper))
      .max_passes(3)
      .validator(Arc::new(HeadingValidator::default()))
      .build()
      .unwrap();

    let document = pipeline.process("# a\n\n### b\n", None).unwrap();
    let heading = document.tokens[0].as_heading().unwrap();
    assert_eq!(crate::token::plain_text(&heading.content), "A");
    assert_eq!(document.diagnostics.len(), 1);
    assert_eq!(document.diagnostics[0].severity, Severity::Warning);
    assert!(!document.has_errors());
    assert!(document.has_severity(Severity::Warning));
  }

  #[test]
  fn test_custom_layer() {
    let pipeline = Pipeline::builder()
      .layer(RuleLayer::new("no-hr").without(Rule::Hr))
      .build()
      .unwrap();
    assert_eq!(pipeline.lexer().rules().origin(Rule::Hr), None);

    let document = pipeline.process("***\n", None).unwrap();
    assert!(
      document
        .tokens
        .iter()
        .all(|t| !matches!(t.kind, TokenKind::Hr))
    );
  }

  #[test]
  fn test_invalid_layer() {
    let result = Pipeline::builder()
      .layer(RuleLayer::new("broken").with(Rule::Hr, "("))
      .build();
    assert!(matches!(result, Err(RuleError::InvalidPattern { .. })));
  }

  #[test]
  fn test_rewriter_error() {
    let failing = rewrite::from_fn("failing", |_, _| {
      Err(RewriteError::Rewriter {
        name:    "failing".to_owned(),
        message: "nope".to_owned(),
      })
    });
    let pipeline = Pipeline::builder()
      .rewriter(Arc::new(failing))
      .build()
      .unwrap();

    assert!(matches!(
      pipeline.process("text\n", None),
      Err(EngineError::Rewrite(RewriteError::Rewriter { .. }))
    ));

    let recovered = pipeline.process_with_recovery("text\n", Some("x.md"));
    assert!(recovered.tokens.is_empty());
    assert!(recovered.has_errors());
    assert_eq!(recovered.diagnostics[0].file.as_deref(), Some("x.md"));
    assert!(recovered.diagnostics[0].message.contains("nope"));
  }

  #[test]
  fn test_panic_recovery() {
    let exploding = rewrite::from_fn("exploding", |_, _| panic!("boom"));
    let pipeline = Pipeline::builder()
      .rewriter(Arc::new(exploding))
      .build()
      .unwrap();

    let recovered = pipeline.process_with_recovery("text\n", Some("x.md"));
    assert!(recovered.has_errors());
    assert!(recovered.diagnostics[0].message.contains("boom"));
  }

  #[test]
  fn test_batch_keeps_order() {
    let documents: Vec<(String, String)> = (0..16)
      .map(|i| (format!("{i}.md"), format!("# Doc {i}\n")))
      .collect();
    let results = Pipeline::default().process_batch(&documents);
    assert_eq!(results.len(), 16);
    for (i, result) in results.iter().enumerate() {
      assert_eq!(result.file.as_deref(), Some(format!("{i}.md").as_str()));
      let heading = result.tokens[0].as_heading().unwrap();
      assert_eq!(crate::token::plain_text(&heading.content), format!("Doc {i}"));
    }
  }
}

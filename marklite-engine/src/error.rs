//! Error types for lexing, rewriting, snippet extraction and the pipeline.

use crate::rules::Rule;

/// Errors raised while building a rule table.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
  #[error("Pattern for rule '{rule}' in layer '{layer}' failed to compile: {source}")]
  InvalidPattern {
    rule:   Rule,
    layer:  String,
    #[source]
    source: regex::Error,
  },
}

/// Errors raised while tokenizing a document.
#[derive(Debug, thiserror::Error)]
pub enum LexError {
  /// No rule could consume input at the given position.
  #[error("No rule made progress at line {line}, column {column}: {snippet:?}")]
  NoProgress {
    line:    usize,
    column:  usize,
    snippet: String,
  },
}

/// Errors raised by rewriters and validators.
#[derive(Debug, thiserror::Error)]
pub enum RewriteError {
  #[error("Rewriter '{name}' failed: {message}")]
  Rewriter { name: String, message: String },
  #[error("Validation failed at line {line}: {message}")]
  Validation { line: usize, message: String },
  #[error("Rewrite context used in state {0:?}")]
  InvalidState(crate::rewrite::EngineState),
}

/// Errors raised while resolving or extracting code snippets.
#[derive(Debug, thiserror::Error)]
pub enum SnippetError {
  #[error("Tag pattern is missing the 'name' capture group: {0}")]
  MissingNameGroup(String),
  #[error("Invalid tag pattern: {0}")]
  Pattern(#[from] regex::Error),
  #[error("Unknown tag '{0}'")]
  UnknownTag(String),
  #[error("{0}")]
  Unpaired(String),
  #[error("Tag '{0}' requires a language with tag markers")]
  NoLanguage(String),
  #[error("Invalid snippet query '{query}': {reason}")]
  Query { query: String, reason: String },
  #[error("Line range {start}-{end} is outside the {total} lines of the file")]
  Range {
    start: usize,
    end:   usize,
    total: usize,
  },
}

/// Top-level error for [`crate::Pipeline::process`].
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
  #[error(transparent)]
  Lex(#[from] LexError),
  #[error(transparent)]
  Rewrite(#[from] RewriteError),
  #[error(transparent)]
  Rule(#[from] RuleError),
}

/// Result type for pipeline operations.
pub type EngineResult<T> = Result<T, EngineError>;

//! # marklite-engine
//!
//! A Markdown lexer driven by layered regex rule tables, with the DocFX
//! flavored extensions (DFM) on top of GitHub flavored Markdown. It produces
//! an immutable token tree that downstream passes reshape without copying
//! untouched subtrees.
//!
//! ## Quick Start
//!
//! ```rust
//! use marklite_engine::{LexerOptions, Pipeline, TokenKind};
//!
//! let pipeline = Pipeline::new(LexerOptions::dfm());
//! let document = pipeline
//!   .process("## <a name=\"setup\"></a>Setup\n\nRun `make`.\n", Some("setup.md"))
//!   .unwrap();
//!
//! let heading = document.tokens[0].as_heading().unwrap();
//! assert_eq!(heading.anchor(), "setup");
//! assert!(matches!(document.tokens[1].kind, TokenKind::Paragraph { .. }));
//! ```
//!
//! ## Stages
//!
//! - [`rules`]: rule tables built from ordered layers of pattern overrides
//! - [`lexer`]: block phase then inline phase, tracking line and column
//! - [`aggregate`]: sibling fusion passes (heading ids, tab groups)
//! - [`rewrite`]: token rewriters and the engine that drives them
//! - [`validate`]: read-only checks that report [`Diagnostic`]s
//! - [`snippet`]: tag resolution and line selection for included code files
//!
//! [`Pipeline`] strings the stages together for one document, and can run
//! many documents in parallel.
//!
//! ## Validation
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use marklite_engine::{Pipeline, Severity, validate::HeadingValidator};
//!
//! let pipeline = Pipeline::builder()
//!   .validator(Arc::new(HeadingValidator::default()))
//!   .build()
//!   .unwrap();
//! let document = pipeline.process("# One\n\n# Two\n", None).unwrap();
//!
//! assert_eq!(document.diagnostics[0].severity, Severity::Warning);
//! assert_eq!(document.diagnostics[0].line, Some(3));
//! ```
pub mod aggregate;
pub mod diagnostics;
pub mod error;
pub mod lexer;
pub mod processor;
pub mod rewrite;
pub mod rules;
pub mod snippet;
pub mod source;
pub mod token;
pub mod types;
pub mod utils;
pub mod validate;

pub use crate::{
  diagnostics::{Diagnostic, Severity},
  error::{
    EngineError,
    EngineResult,
    LexError,
    RewriteError,
    RuleError,
    SnippetError,
  },
  lexer::{LexedDocument, Lexer, LinkDef, Links},
  processor::{Pipeline, PipelineBuilder, ProcessedDocument},
  rewrite::{RewriteContext, RewriteEngine, Rewriter},
  rules::{Rule, RuleLayer, RuleSet},
  source::{Position, SourceInfo},
  token::{Token, TokenKind, TokenRef},
  types::{LexerOptions, LexerOptionsBuilder},
  validate::Validator,
};

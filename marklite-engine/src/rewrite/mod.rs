//! Tree rewriting over immutable tokens.
//!
//! A [`Rewriter`] sees every token once per pass, parents before children.
//! Returning `None` leaves the token alone; returning a new token replaces it
//! and rebuilds its ancestors. Lists where nothing changed are handed back as
//! the original allocations.
//!
//! Everything a rewriter or validator may need from the running engine is
//! reachable through the [`RewriteContext`] passed to every call.
use std::{fmt, sync::Arc};

use log::{debug, warn};

use crate::{
  diagnostics::{Diagnostic, Severity},
  error::RewriteError,
  token::{Token, TokenRef},
  validate::{self, Validator},
};

/// Lifecycle of a [`RewriteContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
  NotStarted,
  Running,
  Complete,
}

impl fmt::Display for EngineState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::NotStarted => "not started",
      Self::Running => "running",
      Self::Complete => "complete",
    })
  }
}

/// Per-document state threaded through every rewriter and validator call.
pub struct RewriteContext {
  file:        Option<String>,
  state:       EngineState,
  parents:     Vec<TokenRef>,
  diagnostics: Vec<Diagnostic>,
  engine:      Option<RewriteEngine>,
}

impl RewriteContext {
  #[must_use]
  pub fn new(file: Option<&str>) -> Self {
    Self {
      file:        file.map(str::to_owned),
      state:       EngineState::NotStarted,
      parents:     Vec::new(),
      diagnostics: Vec::new(),
      engine:      None,
    }
  }

  #[must_use]
  pub fn file(&self) -> Option<&str> {
    self.file.as_deref()
  }

  #[must_use]
  pub const fn state(&self) -> EngineState {
    self.state
  }

  /// Ancestors of the token being visited, outermost first.
  #[must_use]
  pub fn parents(&self) -> &[TokenRef] {
    &self.parents
  }

  #[must_use]
  pub fn parent(&self) -> Option<&TokenRef> {
    self.parents.last()
  }

  #[must_use]
  pub fn diagnostics(&self) -> &[Diagnostic] {
    &self.diagnostics
  }

  #[must_use]
  pub fn into_diagnostics(self) -> Vec<Diagnostic> {
    self.diagnostics
  }

  /// Record a diagnostic at the first line of `token`.
  pub fn report(
    &mut self,
    severity: Severity,
    message: impl Into<String>,
    token: &Token,
  ) {
    let diagnostic = Diagnostic::new(severity, message)
      .at(self.file.as_deref(), token.source.line);
    self.diagnostics.push(diagnostic);
  }

  /// Record a diagnostic as is, filling in the file when it has none.
  pub fn push(&mut self, mut diagnostic: Diagnostic) {
    if diagnostic.file.is_none() {
      diagnostic.file.clone_from(&self.file);
    }
    self.diagnostics.push(diagnostic);
  }

  /// Run the engine's rewriter over `tokens` from inside a running pass.
  ///
  /// # Errors
  ///
  /// Returns [`RewriteError::InvalidState`] outside of
  /// [`RewriteEngine::run`], or whatever the rewriter raises.
  pub fn rewrite_subtree(
    &mut self,
    tokens: &[TokenRef],
  ) -> Result<Vec<TokenRef>, RewriteError> {
    let Some(engine) = self.engine.clone().filter(|_| self.state == EngineState::Running)
    else {
      return Err(RewriteError::InvalidState(self.state));
    };
    Ok(
      engine
        .rewriter
        .rewrite_document(tokens, self)?
        .unwrap_or_else(|| tokens.to_vec()),
    )
  }
}

/// A token-level transformation.
pub trait Rewriter: Send + Sync {
  /// Name used in logs and errors.
  fn name(&self) -> &str {
    "rewriter"
  }

  /// Replace `token`, or return `None` to keep it.
  ///
  /// # Errors
  ///
  /// Any error aborts the whole pass.
  fn rewrite(
    &self,
    token: &TokenRef,
    context: &mut RewriteContext,
  ) -> Result<Option<TokenRef>, RewriteError>;

  /// One full pre-order pass over `tokens`. `None` means nothing changed.
  ///
  /// # Errors
  ///
  /// Propagates the first error raised by [`Rewriter::rewrite`].
  fn rewrite_document(
    &self,
    tokens: &[TokenRef],
    context: &mut RewriteContext,
  ) -> Result<Option<Vec<TokenRef>>, RewriteError> {
    rewrite_list(self, tokens, context)
  }

  /// Whether this rewriter never changes anything.
  fn is_null(&self) -> bool {
    false
  }
}

fn rewrite_list<R: Rewriter + ?Sized>(
  rewriter: &R,
  tokens: &[TokenRef],
  context: &mut RewriteContext,
) -> Result<Option<Vec<TokenRef>>, RewriteError> {
  let mut out = Vec::with_capacity(tokens.len());
  let mut changed = false;

  for token in tokens {
    let current = match rewriter.rewrite(token, context)? {
      Some(replacement) if !Arc::ptr_eq(&replacement, token) => {
        changed = true;
        replacement
      },
      _ => Arc::clone(token),
    };

    context.parents.push(Arc::clone(&current));
    let rebuilt =
      current.map_child_lists(|list| rewrite_list(rewriter, list, context));
    context.parents.pop();

    match rebuilt? {
      Some(rebuilt) => {
        changed = true;
        out.push(rebuilt);
      },
      None => out.push(current),
    }
  }

  Ok(changed.then_some(out))
}

/// A rewriter backed by a closure.
pub struct FnRewriter<F> {
  name: String,
  f:    F,
}

impl<F> Rewriter for FnRewriter<F>
where
  F: Fn(&TokenRef, &mut RewriteContext) -> Result<Option<TokenRef>, RewriteError>
    + Send
    + Sync,
{
  fn name(&self) -> &str {
    &self.name
  }

  fn rewrite(
    &self,
    token: &TokenRef,
    context: &mut RewriteContext,
  ) -> Result<Option<TokenRef>, RewriteError> {
    (self.f)(token, context)
  }
}

/// Wrap a closure as a [`Rewriter`].
pub fn from_fn<F>(name: impl Into<String>, f: F) -> FnRewriter<F>
where
  F: Fn(&TokenRef, &mut RewriteContext) -> Result<Option<TokenRef>, RewriteError>
    + Send
    + Sync,
{
  FnRewriter {
    name: name.into(),
    f,
  }
}

struct NullRewriter;

impl Rewriter for NullRewriter {
  fn name(&self) -> &'static str {
    "null"
  }

  fn rewrite(
    &self,
    _token: &TokenRef,
    _context: &mut RewriteContext,
  ) -> Result<Option<TokenRef>, RewriteError> {
    Ok(None)
  }

  fn rewrite_document(
    &self,
    _tokens: &[TokenRef],
    _context: &mut RewriteContext,
  ) -> Result<Option<Vec<TokenRef>>, RewriteError> {
    Ok(None)
  }

  fn is_null(&self) -> bool {
    true
  }
}

/// A rewriter that changes nothing and skips the traversal entirely.
#[must_use]
pub fn null() -> Arc<dyn Rewriter> {
  Arc::new(NullRewriter)
}

/// Tries each rewriter in order; the first replacement wins.
pub struct Composite {
  rewriters: Vec<Arc<dyn Rewriter>>,
}

impl Composite {
  #[must_use]
  pub fn new(rewriters: Vec<Arc<dyn Rewriter>>) -> Self {
    Self { rewriters }
  }
}

impl Rewriter for Composite {
  fn name(&self) -> &'static str {
    "composite"
  }

  fn rewrite(
    &self,
    token: &TokenRef,
    context: &mut RewriteContext,
  ) -> Result<Option<TokenRef>, RewriteError> {
    for rewriter in &self.rewriters {
      if let Some(replacement) = rewriter.rewrite(token, context)? {
        return Ok(Some(replacement));
      }
    }
    Ok(None)
  }

  fn is_null(&self) -> bool {
    self.rewriters.iter().all(|r| r.is_null())
  }
}

/// Feeds each rewriter the output of the previous one.
pub struct Sequence {
  rewriters: Vec<Arc<dyn Rewriter>>,
}

impl Sequence {
  #[must_use]
  pub fn new(rewriters: Vec<Arc<dyn Rewriter>>) -> Self {
    Self { rewriters }
  }
}

impl Rewriter for Sequence {
  fn name(&self) -> &'static str {
    "sequence"
  }

  fn rewrite(
    &self,
    token: &TokenRef,
    context: &mut RewriteContext,
  ) -> Result<Option<TokenRef>, RewriteError> {
    let mut current: Option<TokenRef> = None;
    for rewriter in &self.rewriters {
      let input = current.as_ref().unwrap_or(token);
      if let Some(next) = rewriter.rewrite(input, context)? {
        current = Some(next);
      }
    }
    Ok(current)
  }

  fn is_null(&self) -> bool {
    self.rewriters.iter().all(|r| r.is_null())
  }
}

/// Repeats full passes of `inner` until one changes nothing, at most `max`
/// times.
pub struct Loop {
  inner: Arc<dyn Rewriter>,
  max:   usize,
}

impl Loop {
  #[must_use]
  pub fn new(inner: Arc<dyn Rewriter>, max: usize) -> Self {
    Self {
      inner,
      max: max.max(1),
    }
  }
}

impl Rewriter for Loop {
  fn name(&self) -> &'static str {
    "loop"
  }

  fn rewrite(
    &self,
    token: &TokenRef,
    context: &mut RewriteContext,
  ) -> Result<Option<TokenRef>, RewriteError> {
    self.inner.rewrite(token, context)
  }

  fn rewrite_document(
    &self,
    tokens: &[TokenRef],
    context: &mut RewriteContext,
  ) -> Result<Option<Vec<TokenRef>>, RewriteError> {
    let mut current: Option<Vec<TokenRef>> = None;
    for pass in 1..=self.max {
      let input = current.as_deref().unwrap_or(tokens);
      match self.inner.rewrite_document(input, context)? {
        Some(next) => current = Some(next),
        None => {
          debug!("Rewriter '{}' settled after {pass} pass(es)", self.inner.name());
          return Ok(current);
        },
      }
    }
    warn!(
      "Rewriter '{}' was still changing the document after {} passes",
      self.inner.name(),
      self.max
    );
    Ok(current)
  }

  fn is_null(&self) -> bool {
    self.inner.is_null()
  }
}

/// Applies a rewriter and then a validator to a document.
#[derive(Clone)]
pub struct RewriteEngine {
  rewriter:  Arc<dyn Rewriter>,
  validator: Arc<dyn Validator>,
}

impl Default for RewriteEngine {
  fn default() -> Self {
    Self::new(null(), validate::null())
  }
}

impl fmt::Debug for RewriteEngine {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RewriteEngine")
      .field("rewriter", &self.rewriter.name())
      .field("validator", &self.validator.name())
      .finish()
  }
}

impl RewriteEngine {
  #[must_use]
  pub fn new(rewriter: Arc<dyn Rewriter>, validator: Arc<dyn Validator>) -> Self {
    Self {
      rewriter,
      validator,
    }
  }

  #[must_use]
  pub fn rewriter(&self) -> &Arc<dyn Rewriter> {
    &self.rewriter
  }

  #[must_use]
  pub fn validator(&self) -> &Arc<dyn Validator> {
    &self.validator
  }

  /// Rewrite `tokens`, then validate the result. A context can only be run
  /// once.
  ///
  /// # Errors
  ///
  /// Returns [`RewriteError::InvalidState`] for a context that was already
  /// used, or the first error raised by the rewriter or the validator.
  pub fn run(
    &self,
    tokens: Vec<TokenRef>,
    context: &mut RewriteContext,
  ) -> Result<Vec<TokenRef>, RewriteError> {
    if context.state != EngineState::NotStarted {
      return Err(RewriteError::InvalidState(context.state));
    }
    context.state = EngineState::Running;
    context.engine = Some(self.clone());

    let result = self.run_passes(tokens, context);

    context.state = EngineState::Complete;
    context.engine = None;
    context.parents.clear();
    result
  }

  fn run_passes(
    &self,
    tokens: Vec<TokenRef>,
    context: &mut RewriteContext,
  ) -> Result<Vec<TokenRef>, RewriteError> {
    let tokens = if self.rewriter.is_null() {
      tokens
    } else {
      self
        .rewriter
        .rewrite_document(&tokens, context)?
        .unwrap_or(tokens)
    };

    if !self.validator.is_null() {
      validate_list(self.validator.as_ref(), &tokens, context)?;
      self.validator.validate_document(&tokens, context)?;
    }
    Ok(tokens)
  }
}

fn validate_list(
  validator: &dyn Validator,
  tokens: &[TokenRef],
  context: &mut RewriteContext,
) -> Result<(), RewriteError> {
  for token in tokens {
    validator.validate_token(token, context)?;
    context.parents.push(Arc::clone(token));
    let children = token
      .child_lists()
      .into_iter()
      .try_for_each(|list| validate_list(validator, list, context));
    context.parents.pop();
    children?;
  }
  Ok(())
}

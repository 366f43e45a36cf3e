//! Read-only checks over the final token tree.
//!
//! Validators only observe; findings go into the [`RewriteContext`] as
//! diagnostics. Several validators are merged with [`combine`], which drops
//! no-op entries and returns the shared [`null`] validator when nothing is
//! left.
mod headings;
mod tags;

use std::sync::{Arc, LazyLock};

pub use self::{
  headings::HeadingValidator,
  tags::{TagRule, TagValidator},
};
use crate::{error::RewriteError, rewrite::RewriteContext, token::TokenRef};

/// A check run over every token, then over the whole document.
pub trait Validator: Send + Sync {
  fn name(&self) -> &str;

  /// Called for every token, parents before children.
  ///
  /// # Errors
  ///
  /// Any error aborts validation of the document.
  fn validate_token(
    &self,
    _token: &TokenRef,
    _context: &mut RewriteContext,
  ) -> Result<(), RewriteError> {
    Ok(())
  }

  /// Called once with the top-level tokens after the per-token walk.
  ///
  /// # Errors
  ///
  /// Any error aborts validation of the document.
  fn validate_document(
    &self,
    _tokens: &[TokenRef],
    _context: &mut RewriteContext,
  ) -> Result<(), RewriteError> {
    Ok(())
  }

  fn is_null(&self) -> bool {
    false
  }
}

struct NullValidator;

impl Validator for NullValidator {
  fn name(&self) -> &'static str {
    "null"
  }

  fn is_null(&self) -> bool {
    true
  }
}

static NULL: LazyLock<Arc<dyn Validator>> =
  LazyLock::new(|| Arc::new(NullValidator));

/// The validator that does nothing. Always the same instance.
#[must_use]
pub fn null() -> Arc<dyn Validator> {
  Arc::clone(&NULL)
}

/// Runs its validators in registration order.
pub struct CompositeValidator {
  validators: Vec<Arc<dyn Validator>>,
}

impl CompositeValidator {
  #[must_use]
  pub fn validators(&self) -> &[Arc<dyn Validator>] {
    &self.validators
  }
}

impl Validator for CompositeValidator {
  fn name(&self) -> &'static str {
    "composite"
  }

  fn validate_token(
    &self,
    token: &TokenRef,
    context: &mut RewriteContext,
  ) -> Result<(), RewriteError> {
    self
      .validators
      .iter()
      .try_for_each(|v| v.validate_token(token, context))
  }

  fn validate_document(
    &self,
    tokens: &[TokenRef],
    context: &mut RewriteContext,
  ) -> Result<(), RewriteError> {
    self
      .validators
      .iter()
      .try_for_each(|v| v.validate_document(tokens, context))
  }
}

/// Merge validators, skipping no-op ones.
#[must_use]
pub fn combine<I>(validators: I) -> Arc<dyn Validator>
where
  I: IntoIterator<Item = Arc<dyn Validator>>,
{
  let validators: Vec<_> = validators.into_iter().filter(|v| !v.is_null()).collect();
  if validators.is_empty() {
    return null();
  }
  Arc::new(CompositeValidator { validators })
}

/// A per-token validator backed by a closure.
pub struct FnValidator<F> {
  name: String,
  f:    F,
}

impl<F> Validator for FnValidator<F>
where
  F: Fn(&TokenRef, &mut RewriteContext) -> Result<(), RewriteError> + Send + Sync,
{
  fn name(&self) -> &str {
    &self.name
  }

  fn validate_token(
    &self,
    token: &TokenRef,
    context: &mut RewriteContext,
  ) -> Result<(), RewriteError> {
    (self.f)(token, context)
  }
}

/// Wrap a closure as a per-token [`Validator`].
pub fn from_fn<F>(name: impl Into<String>, f: F) -> FnValidator<F>
where
  F: Fn(&TokenRef, &mut RewriteContext) -> Result<(), RewriteError> + Send + Sync,
{
  FnValidator {
    name: name.into(),
    f,
  }
}

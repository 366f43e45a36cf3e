//! Passes that fuse runs of sibling tokens into one composite token.
//!
//! Each [`Aggregator`] is run as its own full, left-to-right pass over the
//! tree. At every sibling position it may decline, or consume the current
//! token plus any number of following siblings and put exactly one token in
//! their place. Lists and tokens the pass leaves alone are returned as the
//! same allocations, so a pass that finds nothing hands back the original
//! tree.
mod heading_id;
mod tab_group;

use std::sync::Arc;

use log::trace;

pub use self::{heading_id::HeadingIdAggregator, tab_group::TabGroupAggregator};
use crate::token::TokenRef;

/// One fusion rule.
pub trait Aggregator: Send + Sync {
  /// Name used in logs.
  fn name(&self) -> &'static str;

  /// Inspect `context.current()` and, on a match, call
  /// [`AggregateContext::aggregate_to`]. Returns whether a replacement was
  /// made.
  fn aggregate(&self, context: &mut AggregateContext<'_>) -> bool;
}

/// A view of one sibling list positioned at the trigger candidate.
pub struct AggregateContext<'a> {
  current:     &'a TokenRef,
  following:   &'a [TokenRef],
  replacement: Option<(TokenRef, usize)>,
}

impl<'a> AggregateContext<'a> {
  /// Position a context at `siblings[index]`, if it exists.
  #[must_use]
  pub fn new(siblings: &'a [TokenRef], index: usize) -> Option<Self> {
    let (current, following) = siblings.get(index..)?.split_first()?;
    Some(Self {
      current,
      following,
      replacement: None,
    })
  }

  /// The trigger candidate.
  #[must_use]
  pub const fn current(&self) -> &'a TokenRef {
    self.current
  }

  /// The sibling `offset` positions after the current one (`1` is the next).
  #[must_use]
  pub fn look_ahead(&self, offset: usize) -> Option<&'a TokenRef> {
    offset.checked_sub(1).and_then(|i| self.following.get(i))
  }

  /// How many siblings follow the current one.
  #[must_use]
  pub const fn remaining(&self) -> usize {
    self.following.len()
  }

  /// Replace `count` siblings, starting with the current one, by `token`.
  /// `count` is clamped to what is left in the list and is at least one.
  pub fn aggregate_to(&mut self, token: TokenRef, count: usize) {
    let count = count.clamp(1, self.remaining() + 1);
    self.replacement = Some((token, count));
  }

  fn take(self) -> Option<(TokenRef, usize)> {
    self.replacement
  }
}

/// The aggregators every document goes through, in pass order.
#[must_use]
pub fn builtin() -> Vec<Arc<dyn Aggregator>> {
  vec![Arc::new(HeadingIdAggregator), Arc::new(TabGroupAggregator)]
}

/// Run one aggregator over the whole tree. Returns `None` when nothing
/// changed.
#[must_use]
pub fn aggregate(
  tokens: &[TokenRef],
  aggregator: &dyn Aggregator,
) -> Option<Vec<TokenRef>> {
  let mut out: Vec<TokenRef> = Vec::with_capacity(tokens.len());
  let mut changed = false;
  let mut index = 0;

  while let Some(mut context) = AggregateContext::new(tokens, index) {
    let current = context.current();
    let fused = if aggregator.aggregate(&mut context) {
      context.take()
    } else {
      None
    };

    let (token, consumed) = match fused {
      Some((token, consumed)) => {
        trace!(
          "{} fused {} token(s) at line {}",
          aggregator.name(),
          consumed,
          current.source.line
        );
        changed = true;
        (token, consumed)
      },
      None => (Arc::clone(current), 1),
    };

    match descend(&token, aggregator) {
      Some(rebuilt) => {
        changed = true;
        out.push(rebuilt);
      },
      None => out.push(token),
    }
    index += consumed;
  }

  changed.then_some(out)
}

fn descend(token: &TokenRef, aggregator: &dyn Aggregator) -> Option<TokenRef> {
  let Ok(rebuilt) = token.map_child_lists(|list| {
    Ok::<_, std::convert::Infallible>(aggregate(list, aggregator))
  });
  rebuilt
}

/// Run every aggregator in order, each as a full pass over the output of
/// the previous one.
#[must_use]
pub fn aggregate_all(
  tokens: Vec<TokenRef>,
  aggregators: &[Arc<dyn Aggregator>],
) -> Vec<TokenRef> {
  aggregators.iter().fold(tokens, |tokens, aggregator| {
    aggregate(&tokens, aggregator.as_ref()).unwrap_or(tokens)
  })
}

use std::sync::{Arc, LazyLock};

use log::error;
use regex::Regex;
use uuid::Uuid;

use super::{AggregateContext, Aggregator};
use crate::{
  rules::Rule,
  source::SourceInfo,
  token::{LinkToken, TabGroupToken, TabItem, Token, TokenKind, TokenRef},
  utils::never_matching_regex,
};

static TAB_HREF: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(
    r"^#tab/([a-zA-Z0-9\-]+(?:\+[a-zA-Z0-9\-]+)*)(?:/([a-zA-Z0-9\-]+)?)?$",
  )
  .unwrap_or_else(|e| {
    error!("Failed to compile TAB_HREF regex: {e}");
    never_matching_regex()
  })
});

/// Turns a run of `# [Title](#tab/id)` headings and the blocks under them
/// into a single tab group.
///
/// The run ends at a `---` rule, which is consumed, or before a heading that
/// is not a tab and is not deeper than the first tab heading.
pub struct TabGroupAggregator;

struct TabHeading<'a> {
  depth:     u8,
  id:        String,
  condition: Option<String>,
  title:     &'a [TokenRef],
}

fn tab_heading(token: &Token) -> Option<TabHeading<'_>> {
  let heading = token.as_heading()?;
  let [link] = heading.content.as_slice() else {
    return None;
  };
  let TokenKind::Link(LinkToken { href, content, .. }) = &link.kind else {
    return None;
  };
  let caps = TAB_HREF.captures(href)?;
  Some(TabHeading {
    depth: heading.depth,
    id: caps.get(1)?.as_str().to_owned(),
    condition: caps.get(2).map(|m| m.as_str().to_owned()),
    title: content,
  })
}

fn open_item(tab: &TabHeading<'_>) -> TabItem {
  TabItem {
    id:        tab.id.clone(),
    condition: tab.condition.clone(),
    selected:  false,
    title:     tab.title.to_vec(),
    content:   Vec::new(),
  }
}

impl Aggregator for TabGroupAggregator {
  fn name(&self) -> &'static str {
    "tab-group"
  }

  fn aggregate(&self, context: &mut AggregateContext<'_>) -> bool {
    let trigger = context.current();
    let Some(first) = tab_heading(trigger) else {
      return false;
    };

    let mut items = Vec::new();
    let mut item = open_item(&first);
    let mut markdown = trigger.source.markdown.clone();
    let mut consumed = 1;

    while let Some(next) = context.look_ahead(consumed) {
      if matches!(next.kind, TokenKind::Hr) {
        markdown.push_str(&next.source.markdown);
        consumed += 1;
        break;
      }
      if let Some(heading) = next.as_heading() {
        match tab_heading(next) {
          Some(tab) if tab.depth == first.depth => {
            items.push(std::mem::replace(&mut item, open_item(&tab)));
          },
          _ if heading.depth <= first.depth => break,
          _ => item.content.push(Arc::clone(next)),
        }
      } else {
        item.content.push(Arc::clone(next));
      }
      markdown.push_str(&next.source.markdown);
      consumed += 1;
    }
    items.push(item);

    if let Some(active) = items.first_mut() {
      active.selected = true;
    }

    let group = Token::new(
      Rule::TabGroup,
      Arc::clone(&trigger.context),
      SourceInfo::new(trigger.source.position(), markdown),
      TokenKind::TabGroup(TabGroupToken {
        id: Uuid::new_v4().to_string(),
        active: 0,
        items,
      }),
    );
    context.aggregate_to(group, consumed);
    true
  }
}

//! Human readable purpose strings for generated ledger entries.
//!
//! Generation and matching both go through [`derive`], so an entry written by
//! one run compares equal to the purpose computed by the next.

use crate::Decimal;
use crate::model::FeedEntry;
use regex::Regex;
use std::sync::LazyLock;

pub const PURPOSE_PREFIX: &str = "Mercury: ";
pub const MAX_PURPOSE_CHARS: usize = 128;

static DOLLAR_AMOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$(\d+(?:\.\d+)?)").expect("valid dollar amount pattern"));

/// Amount written into a note as `$12.34`, which overrides the feed amount.
pub fn dollar_override(note: Option<&str>) -> Option<Decimal> {
    let captures = DOLLAR_AMOUNT.captures(note?)?;
    captures[1].parse().ok()
}

pub fn derive(feed: &FeedEntry, substring: &str) -> String {
    let note = feed.note.as_deref().unwrap_or_default();
    let note = note.replacen(substring, "", 1);
    let note = DOLLAR_AMOUNT.replace(&note, "");
    let note = note.trim();

    let body = if !note.is_empty() {
        note.to_owned()
    } else if let Some(memo) = &feed.external_memo {
        memo.clone()
    } else {
        fallback(feed)
    };

    format!("{PURPOSE_PREFIX}{body}")
        .chars()
        .take(MAX_PURPOSE_CHARS)
        .collect()
}

fn fallback(feed: &FeedEntry) -> String {
    let label = feed.kind.map_or("Payment", |kind| kind.label());
    let direction = match feed.amount {
        Some(amount) if amount > Decimal::ZERO => "from",
        _ => "to",
    };
    let counterparty = feed
        .counterparty_nickname
        .as_deref()
        .or(feed.counterparty_name.as_deref())
        .unwrap_or_default();

    format!("{label} {direction} {counterparty}")
}

use super::SyncConfig;
use crate::Decimal;
use crate::generate::expected_amount;
use crate::model::{FeedEntry, FeedStatus, LedgerEntry};
use crate::purpose;

/// Stored amounts are decimal strings, so allow for rounding on the way through.
pub const AMOUNT_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Whether `ledger` still reflects `feed`; anything else gets regenerated.
pub fn ledger_matches_feed(ledger: &LedgerEntry, feed: &FeedEntry, config: &SyncConfig) -> bool {
    // split can be anything
    // category and timezone can be anything

    let amount_matches = match (ledger.line_amount(), expected_amount(feed)) {
        (Some(stored), Some(expected)) => stored
            .checked_sub(expected)
            .is_some_and(|difference| difference.abs() < AMOUNT_TOLERANCE),
        _ => false,
    };
    if !amount_matches {
        return false;
    }

    feed.kind.and_then(|kind| kind.entry_type()) == Some(ledger.entry_type)
        && ledger.purpose.as_deref()
            == Some(purpose::derive(feed, &config.mercury_substring).as_str())
        && feed.status.is_some_and(FeedStatus::is_syncable)
        && ledger.payer() == Some(config.settleup_payer.as_str())
}

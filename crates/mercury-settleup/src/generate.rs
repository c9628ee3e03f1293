//! Canonical ledger entries for feed transactions.

use crate::Decimal;
use crate::model::{FeedEntry, FeedStatus, LedgerEntry, LineItem, MemberWeight};
use crate::purpose;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

pub const ID_PREFIX: &str = "mercury";
pub const BASE_CURRENCY: &str = "USD";

/// Upper bound of the key range covering every generated id.
pub const WINDOW_END_KEY: &str = "mercury-\u{f8ff}";

/// Ledger key for a feed transaction: `mercury-<createdAtMillis>-<feedId>`.
///
/// Keys sort by creation time, which is what makes the window range query work.
pub fn entry_id(feed: &FeedEntry) -> Option<String> {
    let created_at = feed.created_at?;
    Some(format!(
        "{ID_PREFIX}-{}-{}",
        created_at.timestamp_millis(),
        feed.id
    ))
}

/// Lower bound of the key range for entries created at or after `start`.
pub fn window_start_key(start: DateTime<Utc>) -> String {
    format!("{ID_PREFIX}-{}", start.timestamp_millis())
}

/// Whether `id` has the shape of a key produced by [`entry_id`].
pub fn is_generated_id(id: &str) -> bool {
    let Some(rest) = id
        .strip_prefix(ID_PREFIX)
        .and_then(|rest| rest.strip_prefix('-'))
    else {
        return false;
    };
    let Some((millis, feed_id)) = rest.split_once('-') else {
        return false;
    };
    !millis.is_empty() && millis.bytes().all(|b| b.is_ascii_digit()) && !feed_id.is_empty()
}

/// Line item amount the ledger should carry for `feed`.
///
/// A dollar amount in the note wins over the feed amount; either way the sign
/// is flipped, so money leaving the account becomes a positive expense.
pub fn expected_amount(feed: &FeedEntry) -> Option<Decimal> {
    purpose::dollar_override(feed.note.as_deref())
        .or(feed.amount)
        .map(|amount| -amount)
}

pub fn format_amount(amount: Decimal) -> String {
    amount.normalize().to_string()
}

/// Build the ledger entry for `feed`, or `None` when it should not be mirrored.
pub fn generate(
    feed: &FeedEntry,
    split: &[MemberWeight],
    payer: &str,
    substring: &str,
) -> Option<LedgerEntry> {
    let (Some(kind), Some(amount), Some(created_at)) = (feed.kind, feed.amount, feed.created_at)
    else {
        tracing::debug!(id = %feed.id, "declining transaction with missing fields");
        return None;
    };
    let Some(entry_type) = kind.entry_type() else {
        tracing::debug!(id = %feed.id, ?kind, "declining transaction without a ledger type");
        return None;
    };
    if !feed.status.is_some_and(FeedStatus::is_syncable) {
        tracing::debug!(id = %feed.id, status = ?feed.status, "declining transaction by status");
        return None;
    }
    let line_amount = expected_amount(feed)?;

    Some(LedgerEntry {
        category: None,
        currency_code: BASE_CURRENCY.to_owned(),
        date_time: created_at.timestamp_millis(),
        exchange_rates: Some(BTreeMap::from([(
            BASE_CURRENCY.to_owned(),
            "1".to_owned(),
        )])),
        fixed_exchange_rate: Some(false),
        items: vec![LineItem {
            amount: format_amount(line_amount),
            for_whom: split.to_vec(),
        }],
        purpose: Some(purpose::derive(feed, substring)),
        timezone: None,
        entry_type,
        who_paid: vec![MemberWeight::new(payer, format_amount(-amount))],
        extra: serde_json::Map::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, EntryType};
    use chrono::TimeZone;

    fn outgoing_payment() -> FeedEntry {
        FeedEntry {
            id: "txn-1".into(),
            kind: Some(Category::OutgoingPayment),
            amount: Some("-42.50".parse().unwrap()),
            created_at: Some(Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).unwrap()),
            status: Some(FeedStatus::Sent),
            note: Some(String::new()),
            external_memo: None,
            counterparty_name: Some("Utility Co".into()),
            counterparty_nickname: None,
        }
    }

    fn split() -> Vec<MemberWeight> {
        vec![MemberWeight::new("m1", "1"), MemberWeight::new("m2", "1")]
    }

    #[test]
    fn generates_expense() {
        let entry = generate(&outgoing_payment(), &split(), "p1", "").unwrap();

        assert_eq!(entry.entry_type, EntryType::Expense);
        assert_eq!(entry.items.len(), 1);
        assert_eq!(entry.items[0].amount, "42.5");
        assert_eq!(entry.items[0].for_whom, split());
        assert_eq!(entry.who_paid, vec![MemberWeight::new("p1", "42.5")]);
        assert_eq!(entry.purpose.as_deref(), Some("Mercury: Payment to Utility Co"));

        insta::assert_snapshot!(serde_json::to_string_pretty(&entry).unwrap(), @r#"
        {
          "currencyCode": "USD",
          "dateTime": 1746100800000,
          "exchangeRates": {
            "USD": "1"
          },
          "fixedExchangeRate": false,
          "items": [
            {
              "amount": "42.5",
              "forWhom": [
                {
                  "memberId": "m1",
                  "weight": "1"
                },
                {
                  "memberId": "m2",
                  "weight": "1"
                }
              ]
            }
          ],
          "purpose": "Mercury: Payment to Utility Co",
          "type": "expense",
          "whoPaid": [
            {
              "memberId": "p1",
              "weight": "42.5"
            }
          ]
        }
        "#);
    }

    #[test]
    fn card_payment_label() {
        let mut feed = outgoing_payment();
        feed.kind = Some(Category::DebitCardTransaction);
        let entry = generate(&feed, &split(), "p1", "").unwrap();
        assert_eq!(entry.purpose.as_deref(), Some("Mercury: Card Payment to Utility Co"));
    }

    #[test]
    fn note_amount_overrides_line_amount_only() {
        let mut feed = outgoing_payment();
        feed.note = Some("#house my share $20.00".into());
        let entry = generate(&feed, &split(), "p1", "#house").unwrap();

        assert_eq!(entry.items[0].amount, "-20");
        assert_eq!(entry.who_paid[0].weight, "42.5");
        assert_eq!(entry.purpose.as_deref(), Some("Mercury: my share"));
    }

    #[test]
    fn incoming_money_is_negative_expense() {
        let mut feed = outgoing_payment();
        feed.kind = Some(Category::CheckDeposit);
        feed.amount = Some("100.10".parse().unwrap());
        let entry = generate(&feed, &split(), "p1", "").unwrap();

        assert_eq!(entry.items[0].amount, "-100.1");
        assert_eq!(entry.who_paid[0].weight, "-100.1");
        assert_eq!(entry.purpose.as_deref(), Some("Mercury: Check from Utility Co"));
    }

    #[test]
    fn declines_untyped_categories() {
        for kind in [
            Category::InternalTransfer,
            Category::TreasuryTransfer,
            Category::Unknown,
        ] {
            let mut feed = outgoing_payment();
            feed.kind = Some(kind);
            assert_eq!(generate(&feed, &split(), "p1", ""), None, "{kind:?}");
        }
    }

    #[test]
    fn declines_unsyncable_status() {
        let mut feed = outgoing_payment();
        feed.status = Some(FeedStatus::Other);
        assert_eq!(generate(&feed, &split(), "p1", ""), None);

        feed.status = None;
        assert_eq!(generate(&feed, &split(), "p1", ""), None);

        feed.status = Some(FeedStatus::Pending);
        assert!(generate(&feed, &split(), "p1", "").is_some());
    }

    #[test]
    fn declines_missing_fields() {
        let mut feed = outgoing_payment();
        feed.amount = None;
        assert_eq!(generate(&feed, &split(), "p1", ""), None);

        let mut feed = outgoing_payment();
        feed.created_at = None;
        assert_eq!(generate(&feed, &split(), "p1", ""), None);

        let mut feed = outgoing_payment();
        feed.kind = None;
        assert_eq!(generate(&feed, &split(), "p1", ""), None);
    }

    #[test]
    fn ids_are_deterministic() {
        let feed = outgoing_payment();
        assert_eq!(entry_id(&feed).as_deref(), Some("mercury-1746100800000-txn-1"));
        assert_eq!(entry_id(&feed), entry_id(&feed.clone()));

        let mut undated = feed;
        undated.created_at = None;
        assert_eq!(entry_id(&undated), None);
    }

    #[test]
    fn window_keys_bound_generated_ids() {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let id = entry_id(&outgoing_payment()).unwrap();

        assert_eq!(window_start_key(start), "mercury-1735689600000");
        assert!(window_start_key(start).as_str() <= id.as_str());
        assert!(id.as_str() <= WINDOW_END_KEY);
    }

    #[test]
    fn generated_id_shape() {
        assert!(is_generated_id("mercury-1746100800000-txn-1"));
        assert!(!is_generated_id("mercury-abc-txn"));
        assert!(!is_generated_id("mercury-1746100800000-"));
        assert!(!is_generated_id("mercury-1746100800000"));
        assert!(!is_generated_id("-NxYzManualEntry"));
    }
}

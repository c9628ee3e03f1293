//! Wire types for Mercury transactions and Settle Up group data.

use crate::Decimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Transaction category as reported by Mercury in the `kind` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    ExternalTransfer,
    InternalTransfer,
    OutgoingPayment,
    CreditCardCredit,
    CreditCardTransaction,
    DebitCardTransaction,
    IncomingDomesticWire,
    CheckDeposit,
    IncomingInternationalWire,
    TreasuryTransfer,
    WireFee,
    CardInternationalTransactionFee,
    Other,
    #[serde(other)]
    Unknown,
}

impl Category {
    /// Ledger type to book this category as, `None` for movements that never reach the group.
    pub fn entry_type(self) -> Option<EntryType> {
        match self {
            Category::InternalTransfer | Category::TreasuryTransfer | Category::Unknown => None,
            // todo: detect transfers between group members instead of booking them as expenses
            Category::ExternalTransfer
            | Category::OutgoingPayment
            | Category::CreditCardCredit
            | Category::CreditCardTransaction
            | Category::DebitCardTransaction
            | Category::IncomingDomesticWire
            | Category::CheckDeposit
            | Category::IncomingInternationalWire
            | Category::WireFee
            | Category::CardInternationalTransactionFee
            | Category::Other => Some(EntryType::Expense),
        }
    }

    /// Short human label used when a transaction carries no note or memo.
    pub fn label(self) -> &'static str {
        match self {
            Category::ExternalTransfer | Category::InternalTransfer | Category::TreasuryTransfer => {
                "Transfer"
            }
            Category::OutgoingPayment | Category::Other | Category::Unknown => "Payment",
            Category::CreditCardCredit => "Refund",
            Category::CreditCardTransaction | Category::DebitCardTransaction => "Card Payment",
            Category::IncomingDomesticWire | Category::IncomingInternationalWire => "Wire",
            Category::CheckDeposit => "Check",
            Category::WireFee => "Wire Fee",
            Category::CardInternationalTransactionFee => "Card Fee",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FeedStatus {
    Pending,
    Sent,
    #[serde(other)]
    Other,
}

impl FeedStatus {
    /// Only pending and sent transactions are mirrored into the ledger.
    pub fn is_syncable(self) -> bool {
        matches!(self, FeedStatus::Pending | FeedStatus::Sent)
    }
}

/// One transaction from the Mercury feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedEntry {
    pub id: String,
    pub kind: Option<Category>,
    pub amount: Option<Decimal>,
    pub created_at: Option<DateTime<Utc>>,
    pub status: Option<FeedStatus>,
    pub note: Option<String>,
    pub external_memo: Option<String>,
    pub counterparty_name: Option<String>,
    pub counterparty_nickname: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Expense,
    Transfer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberWeight {
    #[serde(alias = "member_id")]
    pub member_id: String,
    pub weight: String,
}

impl MemberWeight {
    pub fn new(member_id: impl Into<String>, weight: impl Into<String>) -> Self {
        MemberWeight {
            member_id: member_id.into(),
            weight: weight.into(),
        }
    }
}

/// Weighted allocation of an amount across group members.
pub type Split = Vec<MemberWeight>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub amount: String,
    pub for_whom: Split,
}

/// A Settle Up transaction.
///
/// Fields the sync does not know about are kept in `extra` so that rewriting
/// an entry never drops data another client attached to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub currency_code: String,
    pub date_time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exchange_rates: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_exchange_rate: Option<bool>,
    pub items: Vec<LineItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub who_paid: Vec<MemberWeight>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl LedgerEntry {
    /// Amount of the single line item, if it is present and parses.
    pub fn line_amount(&self) -> Option<Decimal> {
        let [item] = self.items.as_slice() else {
            return None;
        };
        item.amount.trim().parse().ok()
    }

    pub fn payer(&self) -> Option<&str> {
        self.who_paid.first().map(|w| w.member_id.as_str())
    }
}

/// A member of a Settle Up group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    #[serde(default)]
    pub active: bool,
    pub default_weight: String,
    #[serde(default)]
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_feed_entry() {
        let entry: FeedEntry = serde_json::from_value(serde_json::json!({
            "id": "txn-1",
            "kind": "debitCardTransaction",
            "amount": -42.5,
            "createdAt": "2025-05-01T12:00:00.000Z",
            "status": "sent",
            "note": null,
            "counterpartyName": "Grocer",
        }))
        .unwrap();

        assert_eq!(entry.kind, Some(Category::DebitCardTransaction));
        assert_eq!(entry.amount, Some("-42.5".parse().unwrap()));
        assert_eq!(entry.status, Some(FeedStatus::Sent));
        assert_eq!(entry.note, None);
        assert_eq!(entry.external_memo, None);
        assert_eq!(
            entry.created_at.map(|t| t.timestamp_millis()),
            Some(1746100800000)
        );
    }

    #[test]
    fn decode_unknown_category_and_status() {
        let entry: FeedEntry = serde_json::from_value(serde_json::json!({
            "id": "txn-2",
            "kind": "cryptoSwap",
            "status": "cancelled",
        }))
        .unwrap();

        assert_eq!(entry.kind, Some(Category::Unknown));
        assert_eq!(entry.status, Some(FeedStatus::Other));
        assert_eq!(Category::Unknown.entry_type(), None);
        assert_eq!(Category::Unknown.label(), "Payment");
    }

    #[test]
    fn category_tables() {
        assert_eq!(Category::InternalTransfer.entry_type(), None);
        assert_eq!(Category::TreasuryTransfer.entry_type(), None);
        assert_eq!(Category::WireFee.entry_type(), Some(EntryType::Expense));
        assert_eq!(Category::CreditCardCredit.label(), "Refund");
        assert_eq!(Category::CheckDeposit.label(), "Check");
        assert_eq!(Category::CardInternationalTransactionFee.label(), "Card Fee");
    }

    #[test]
    fn ledger_entry_keeps_unknown_fields() {
        let raw = serde_json::json!({
            "currencyCode": "USD",
            "dateTime": 1746100800000i64,
            "items": [{ "amount": "42.5", "forWhom": [{ "memberId": "m1", "weight": "1" }] }],
            "purpose": "Mercury: Groceries",
            "type": "expense",
            "whoPaid": [{ "memberId": "p1", "weight": "42.5" }],
            "receiptUrl": "https://example.com/r.jpg",
        });
        let entry: LedgerEntry = serde_json::from_value(raw.clone()).unwrap();

        assert_eq!(entry.line_amount(), Some("42.5".parse().unwrap()));
        assert_eq!(entry.payer(), Some("p1"));
        assert_eq!(
            entry.extra.get("receiptUrl"),
            Some(&serde_json::json!("https://example.com/r.jpg"))
        );
        assert_eq!(serde_json::to_value(&entry).unwrap(), raw);
    }

    #[test]
    fn line_amount_requires_single_parsable_item() {
        let mut entry: LedgerEntry = serde_json::from_value(serde_json::json!({
            "currencyCode": "USD",
            "dateTime": 0,
            "items": [{ "amount": "abc", "forWhom": [] }],
            "type": "expense",
            "whoPaid": [],
        }))
        .unwrap();
        assert_eq!(entry.line_amount(), None);
        assert_eq!(entry.payer(), None);

        entry.items.clear();
        assert_eq!(entry.line_amount(), None);
    }
}

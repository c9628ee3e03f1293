//! Collaborator interfaces for the transaction feed and the group ledger.

use crate::Result;
use crate::model::{FeedEntry, LedgerEntry, Member};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Number of transactions requested per feed page.
pub const FEED_PAGE_SIZE: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// One page request against the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedQuery {
    pub account_id: String,
    /// Only transactions matching this text are returned.
    pub search: String,
    /// Earliest creation time to include.
    pub start: DateTime<Utc>,
    pub limit: usize,
    pub offset: usize,
    pub order: SortOrder,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FeedPage {
    #[serde(default)]
    pub total: usize,
    #[serde(default)]
    pub transactions: Vec<FeedEntry>,
}

#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch_page(&self, query: &FeedQuery) -> Result<FeedPage>;
}

/// A Settle Up style ledger, keyed by group.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Group roster keyed by member id.
    async fn members(&self, group: &str) -> Result<BTreeMap<String, Member>>;

    /// Entries whose key lies in `start_at..=end_at`, compared as strings.
    async fn entries_in_range(
        &self,
        group: &str,
        start_at: &str,
        end_at: &str,
    ) -> Result<BTreeMap<String, LedgerEntry>>;

    /// Write the given entries, leaving every other key in the group untouched.
    async fn merge_entries(&self, group: &str, entries: &BTreeMap<String, LedgerEntry>)
    -> Result<()>;

    async fn delete_entry(&self, group: &str, id: &str) -> Result<()>;
}

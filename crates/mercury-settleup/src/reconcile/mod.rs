//! Reconciling a group's ledger against the Mercury transactions it mirrors.

mod matching;

pub use matching::{AMOUNT_TOLERANCE, ledger_matches_feed};

use crate::deletion::{DeletionCoordinator, DeletionReport};
use crate::error::{SyncError, display_chain};
use crate::generate::{self, WINDOW_END_KEY};
use crate::model::{FeedEntry, LedgerEntry, Member, MemberWeight, Split};
use crate::store::{FEED_PAGE_SIZE, FeedQuery, FeedSource, LedgerStore, SortOrder};
use anyhow::Context as _;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};

pub const DEFAULT_HISTORY_DAYS: u32 = 180;

/// One pairing of a Mercury account with a Settle Up group.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    #[serde(alias = "mercuryAccount")]
    pub mercury_account: String,
    /// Only transactions whose note contains this text are synced.
    #[serde(alias = "mercurySubstring", default)]
    pub mercury_substring: String,
    #[serde(alias = "settleUpGroup")]
    pub settleup_group: String,
    #[serde(alias = "settleUpPayer")]
    pub settleup_payer: String,
    /// Fixed split; the group's default weights are used when unset.
    #[serde(alias = "settleUpSplit", default)]
    pub settleup_split: Option<Split>,
    #[serde(alias = "numDaysHistory", default)]
    pub num_days_history: Option<u32>,
}

impl SyncConfig {
    pub fn history_days(&self) -> u32 {
        self.num_days_history.unwrap_or(DEFAULT_HISTORY_DAYS)
    }

    /// Earliest creation time synced, `None` when the history reaches past the calendar.
    pub fn window_start(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        TimeDelta::try_days(i64::from(self.history_days()))
            .and_then(|history| now.checked_sub_signed(history))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    Apply,
    /// Read everything and plan, but never write or delete.
    DryRun,
}

/// Everything one pass decided for a configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncPlan {
    /// Ledger ids derived from every feed transaction seen this pass.
    pub seen: BTreeSet<String>,
    /// Ledger ids in the window without a counterpart this pass.
    pub unseen: BTreeSet<String>,
    pub created: BTreeMap<String, LedgerEntry>,
    pub updated: BTreeMap<String, LedgerEntry>,
    pub unchanged: usize,
}

impl SyncPlan {
    /// The merge write for this plan: every created and updated entry.
    pub fn batch(&self) -> BTreeMap<String, LedgerEntry> {
        self.created
            .iter()
            .chain(&self.updated)
            .map(|(id, entry)| (id.clone(), entry.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    /// Nothing to write.
    Skipped,
    DryRun,
    Written,
    /// The batch write failed; reads were complete, so deletion is still safe.
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncOutcome {
    pub plan: SyncPlan,
    pub write: WriteStatus,
}

/// Split used for new entries: the configured one, or every active member's default weight.
pub fn resolve_split(config: &SyncConfig, roster: &BTreeMap<String, Member>) -> Split {
    if let Some(split) = &config.settleup_split {
        return split.clone();
    }
    roster
        .iter()
        .filter(|(_, member)| member.active)
        .map(|(id, member)| MemberWeight::new(id.clone(), member.default_weight.clone()))
        .collect()
}

/// Decide creates, updates and deletion candidates for one configuration.
pub fn plan(
    config: &SyncConfig,
    split: &[MemberWeight],
    feed: Vec<FeedEntry>,
    existing: BTreeMap<String, LedgerEntry>,
) -> SyncPlan {
    let feed_by_id: BTreeMap<String, FeedEntry> = feed
        .into_iter()
        .filter_map(|entry| Some((generate::entry_id(&entry)?, entry)))
        .collect();

    let mut plan = SyncPlan {
        seen: feed_by_id.keys().cloned().collect(),
        ..SyncPlan::default()
    };
    let regenerate = |feed: &FeedEntry| {
        generate::generate(
            feed,
            split,
            &config.settleup_payer,
            &config.mercury_substring,
        )
    };

    for (id, ledger) in &existing {
        let Some(feed) = feed_by_id.get(id) else {
            tracing::debug!(%id, "no feed transaction for ledger entry");
            plan.unseen.insert(id.clone());
            continue;
        };
        if ledger_matches_feed(ledger, feed, config) {
            plan.unchanged += 1;
            continue;
        }
        match regenerate(feed) {
            Some(generated) => {
                tracing::debug!(%id, "regenerating ledger entry");
                plan.updated
                    .insert(id.clone(), merge_regenerated(ledger, generated));
            }
            None => {
                tracing::debug!(%id, "ledger entry no longer qualifies");
                plan.unseen.insert(id.clone());
            }
        }
    }

    for (id, feed) in &feed_by_id {
        if existing.contains_key(id) {
            continue;
        }
        if let Some(generated) = regenerate(feed) {
            tracing::debug!(%id, "creating ledger entry");
            plan.created.insert(id.clone(), generated);
        }
    }

    plan
}

/// Overlay a regenerated entry on the stored one.
///
/// The stored split survives so that manual split edits are not undone, and
/// fields generation does not produce are carried over.
fn merge_regenerated(existing: &LedgerEntry, mut generated: LedgerEntry) -> LedgerEntry {
    // todo: remember the split a past entry was generated with, so a changed default can be applied retroactively
    if let (Some(item), Some(stored)) = (generated.items.first_mut(), existing.items.first()) {
        item.for_whom = stored.for_whom.clone();
    }
    generated.category = generated.category.or_else(|| existing.category.clone());
    generated.timezone = generated.timezone.or_else(|| existing.timezone.clone());
    generated.extra = existing.extra.clone();
    generated
}

async fn fetch_feed<F: FeedSource + ?Sized>(
    source: &F,
    mut query: FeedQuery,
) -> anyhow::Result<Vec<FeedEntry>> {
    let mut entries = Vec::new();
    loop {
        let page = source
            .fetch_page(&query)
            .await
            .with_context(|| format!("fetching page at offset {}", query.offset))?;
        let full = page.transactions.len() == query.limit;
        entries.extend(page.transactions);
        if !full {
            return Ok(entries);
        }
        query.offset += query.limit;
    }
}

/// Run one sync pass for `config`.
///
/// Nothing is deleted here: deletion candidates are reported in the outcome
/// and handled by [`DeletionCoordinator`] once every configuration has run.
pub async fn sync_config<F, L>(
    feed: &F,
    ledger: &L,
    config: &SyncConfig,
    now: DateTime<Utc>,
    mode: SyncMode,
) -> Result<SyncOutcome, SyncError>
where
    F: FeedSource + ?Sized,
    L: LedgerStore + ?Sized,
{
    let group = &config.settleup_group;

    let roster = ledger
        .members(group)
        .await
        .map_err(|source| SyncError::Roster {
            group: group.clone(),
            source,
        })?;
    if !roster.contains_key(&config.settleup_payer) {
        return Err(SyncError::PayerNotInGroup {
            payer: config.settleup_payer.clone(),
            group: group.clone(),
        });
    }
    let split = resolve_split(config, &roster);

    let window_start = config
        .window_start(now)
        .ok_or_else(|| SyncError::HistoryOutOfRange {
            days: config.history_days(),
            group: group.clone(),
        })?;
    let query = FeedQuery {
        account_id: config.mercury_account.clone(),
        search: config.mercury_substring.clone(),
        start: window_start,
        limit: FEED_PAGE_SIZE,
        offset: 0,
        order: SortOrder::Desc,
    };
    let transactions = fetch_feed(feed, query)
        .await
        .map_err(|source| SyncError::FeedFetch {
            account: config.mercury_account.clone(),
            search: config.mercury_substring.clone(),
            source,
        })?;
    if transactions.is_empty() {
        tracing::warn!(
            account = %config.mercury_account,
            search = %config.mercury_substring,
            days = config.history_days(),
            "no matching transactions found"
        );
        return Ok(SyncOutcome {
            plan: SyncPlan::default(),
            write: WriteStatus::Skipped,
        });
    }

    let existing = ledger
        .entries_in_range(
            group,
            &generate::window_start_key(window_start),
            WINDOW_END_KEY,
        )
        .await
        .map_err(|source| SyncError::LedgerFetch {
            group: group.clone(),
            source,
        })?;

    let plan = plan(config, &split, transactions, existing);
    tracing::info!(
        %group,
        account = %config.mercury_account,
        created = plan.created.len(),
        updated = plan.updated.len(),
        unchanged = plan.unchanged,
        unseen = plan.unseen.len(),
        "planned sync"
    );

    let batch = plan.batch();
    let write = if batch.is_empty() {
        WriteStatus::Skipped
    } else if mode == SyncMode::DryRun {
        WriteStatus::DryRun
    } else {
        match ledger.merge_entries(group, &batch).await {
            Ok(()) => WriteStatus::Written,
            Err(error) => {
                tracing::error!(%group, "failed to write ledger entries: {error:#}");
                WriteStatus::Failed
            }
        }
    };

    Ok(SyncOutcome { plan, write })
}

/// Result of a whole run over every configuration.
#[derive(Debug)]
pub struct RunReport {
    pub outcomes: Vec<(SyncConfig, Result<SyncOutcome, SyncError>)>,
    pub deletions: DeletionReport,
}

impl RunReport {
    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| outcome.is_err())
            .count()
    }

    /// Configurations whose reads succeeded but whose batch write did not.
    pub fn write_failures(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| {
                outcome
                    .as_ref()
                    .is_ok_and(|outcome| outcome.write == WriteStatus::Failed)
            })
            .count()
    }

    /// Whether every configuration, write and deletion went through.
    pub fn succeeded(&self) -> bool {
        self.failed() == 0 && self.write_failures() == 0 && self.deletions.failed.is_empty()
    }
}

/// Sync every configuration in order, then run the deletion pass.
pub async fn sync_all<F, L>(
    feed: &F,
    ledger: &L,
    configs: &[SyncConfig],
    now: DateTime<Utc>,
    mode: SyncMode,
) -> RunReport
where
    F: FeedSource + ?Sized,
    L: LedgerStore + ?Sized,
{
    let mut coordinator = DeletionCoordinator::default();
    let mut outcomes = Vec::with_capacity(configs.len());

    for config in configs {
        let outcome = sync_config(feed, ledger, config, now, mode).await;
        if let Err(error) = &outcome {
            tracing::error!(
                group = %config.settleup_group,
                account = %config.mercury_account,
                "{}",
                display_chain(error)
            );
        }
        coordinator.record(&config.settleup_group, &outcome);
        outcomes.push((config.clone(), outcome));
    }

    let deletions = coordinator.execute(ledger, mode).await;
    RunReport {
        outcomes,
        deletions,
    }
}

//! Cross-configuration bookkeeping for retiring ledger entries.
//!
//! Several configurations may write into the same group. An entry one of them
//! did not see may well have been seen by another, so deletions wait until
//! every configuration has run and are vetoed for a group if any of its
//! configurations failed.

use crate::error::SyncError;
use crate::generate;
use crate::reconcile::{SyncMode, SyncOutcome};
use crate::store::LedgerStore;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Default)]
struct GroupTally {
    seen: BTreeSet<String>,
    unseen: BTreeSet<String>,
    failed: bool,
}

#[derive(Debug, Default)]
pub struct DeletionCoordinator {
    groups: BTreeMap<String, GroupTally>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupDecision {
    Delete(Vec<String>),
    /// A configuration for the group failed; nothing is deleted this run.
    Vetoed,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeletionReport {
    pub deleted: Vec<(String, String)>,
    /// Ids that would have been deleted in a dry run.
    pub planned: Vec<(String, String)>,
    pub failed: Vec<(String, String)>,
    pub vetoed_groups: Vec<String>,
}

impl DeletionCoordinator {
    pub fn record(&mut self, group: &str, outcome: &Result<SyncOutcome, SyncError>) {
        match outcome {
            Ok(outcome) => self.record_success(
                group,
                outcome.plan.seen.iter().cloned(),
                outcome.plan.unseen.iter().cloned(),
            ),
            Err(_) => self.record_failure(group),
        }
    }

    pub fn record_success(
        &mut self,
        group: &str,
        seen: impl IntoIterator<Item = String>,
        unseen: impl IntoIterator<Item = String>,
    ) {
        let tally = self.groups.entry(group.to_owned()).or_default();
        tally.seen.extend(seen);
        tally.unseen.extend(unseen);
    }

    pub fn record_failure(&mut self, group: &str) {
        self.groups.entry(group.to_owned()).or_default().failed = true;
    }

    /// What to do per group: ids unseen by every configuration, or a veto.
    pub fn decisions(&self) -> BTreeMap<&str, GroupDecision> {
        self.groups
            .iter()
            .map(|(group, tally)| {
                let decision = if tally.failed {
                    GroupDecision::Vetoed
                } else {
                    GroupDecision::Delete(
                        tally
                            .unseen
                            .difference(&tally.seen)
                            .filter(|id| generate::is_generated_id(id))
                            .cloned()
                            .collect(),
                    )
                };
                (group.as_str(), decision)
            })
            .collect()
    }

    /// Delete every eligible entry, one request per id.
    pub async fn execute<L: LedgerStore + ?Sized>(
        &self,
        ledger: &L,
        mode: SyncMode,
    ) -> DeletionReport {
        let mut report = DeletionReport::default();

        for (group, decision) in self.decisions() {
            let ids = match decision {
                GroupDecision::Vetoed => {
                    tracing::warn!(
                        %group,
                        "errors while syncing group, not deleting any transactions"
                    );
                    report.vetoed_groups.push(group.to_owned());
                    continue;
                }
                GroupDecision::Delete(ids) => ids,
            };

            for id in ids {
                let key = (group.to_owned(), id);
                if mode == SyncMode::DryRun {
                    report.planned.push(key);
                    continue;
                }
                match ledger.delete_entry(group, &key.1).await {
                    Ok(()) => {
                        tracing::info!(%group, id = %key.1, "deleted ledger entry");
                        report.deleted.push(key);
                    }
                    Err(error) => {
                        tracing::error!(%group, id = %key.1, "failed to delete ledger entry: {error:#}");
                        report.failed.push(key);
                    }
                }
            }
        }

        report
    }
}

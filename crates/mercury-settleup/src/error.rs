use thiserror::Error;

/// Why a configuration's sync pass failed.
///
/// Every variant vetoes deletions for the configuration's group in this run.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("payer {payer} is not a member of group {group}")]
    PayerNotInGroup { payer: String, group: String },

    #[error("history of {days} days for group {group} reaches past the supported date range")]
    HistoryOutOfRange { days: u32, group: String },

    #[error("failed to fetch members of group {group}")]
    Roster {
        group: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to fetch transactions matching {search:?} from account {account}")]
    FeedFetch {
        account: String,
        search: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to fetch ledger entries for group {group}")]
    LedgerFetch {
        group: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Render an error followed by its sources, `outer: inner: root`.
pub fn display_chain(error: &dyn std::error::Error) -> String {
    let mut rendered = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}

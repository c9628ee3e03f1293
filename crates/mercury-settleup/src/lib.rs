pub mod deletion;
pub mod error;
pub mod generate;
pub mod model;
pub mod purpose;
pub mod reconcile;
pub mod store;

pub type Decimal = rust_decimal::Decimal;

pub use anyhow::Result;
pub use error::SyncError;
pub use reconcile::{RunReport, SyncConfig, SyncMode, SyncOutcome, sync_all, sync_config};

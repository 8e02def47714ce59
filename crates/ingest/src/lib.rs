pub mod client;
pub mod refresh;

pub use client::{GridSource, IngestError, SheetsClient};
pub use refresh::{spawn_periodic, RefreshCoordinator, RefreshOutcome, Snapshot};

//! Snapshot refresh with a monotonic generation counter. A slow fetch that
//! finishes after a newer one can never clobber the newer data.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{info, warn};

use tenderdeck_core::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink};
use tenderdeck_core::domain::tender::Tender;
use tenderdeck_core::normalize::parse_grid;

use crate::client::{GridSource, IngestError};

#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    pub tenders: Vec<Tender>,
    pub generation: u64,
    pub refreshed_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RefreshOutcome {
    Installed { generation: u64, records: usize },
    /// A newer generation landed while this fetch was in flight.
    Stale { generation: u64, current: u64 },
}

pub struct RefreshCoordinator<S> {
    source: S,
    audit: Arc<dyn AuditSink>,
    next_generation: AtomicU64,
    snapshot: RwLock<Arc<Snapshot>>,
}

impl<S: GridSource> RefreshCoordinator<S> {
    pub fn new(source: S, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            source,
            audit,
            next_generation: AtomicU64::new(1),
            snapshot: RwLock::new(Arc::new(Snapshot::default())),
        }
    }

    pub async fn current(&self) -> Arc<Snapshot> {
        self.snapshot.read().await.clone()
    }

    pub async fn refresh(&self, today: chrono::NaiveDate) -> Result<RefreshOutcome, IngestError> {
        // Claim the generation before fetching so overlapping refreshes
        // resolve by start order, not finish order.
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);

        let grid = match self.source.fetch_grid().await {
            Ok(grid) => grid,
            Err(err) => {
                self.audit.emit(AuditEvent::new(
                    None,
                    format!("refresh-{generation}"),
                    "ingest.refresh_failed",
                    AuditCategory::Ingest,
                    "refresh-coordinator",
                    AuditOutcome::Failed,
                ));
                return Err(err);
            }
        };
        let tenders = parse_grid(&grid, today);

        let mut slot = self.snapshot.write().await;
        if slot.generation > generation {
            warn!(generation, current = slot.generation, "discarding stale refresh");
            return Ok(RefreshOutcome::Stale { generation, current: slot.generation });
        }

        let records = tenders.len();
        *slot = Arc::new(Snapshot { tenders, generation, refreshed_at: Some(Utc::now()) });
        drop(slot);

        info!(generation, records, "snapshot installed");
        self.audit.emit(
            AuditEvent::new(
                None,
                format!("refresh-{generation}"),
                "ingest.snapshot_installed",
                AuditCategory::Ingest,
                "refresh-coordinator",
                AuditOutcome::Success,
            )
            .with_metadata("records", records.to_string()),
        );

        Ok(RefreshOutcome::Installed { generation, records })
    }
}

/// Background refresh loop. Errors are logged and the previous snapshot stays
/// in place until the next tick succeeds.
pub fn spawn_periodic<S: GridSource + 'static>(
    coordinator: Arc<RefreshCoordinator<S>>,
    interval_secs: u64,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval_secs.max(30)));
        loop {
            ticker.tick().await;
            let today = Utc::now().date_naive();
            if let Err(err) = coordinator.refresh(today).await {
                warn!(error = %err, "scheduled refresh failed, keeping previous snapshot");
            }
        }
    })
}

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use tracing::warn;

use tenderdeck_core::approvals::ApprovalStore;
use tenderdeck_core::domain::approval::{ApprovalAction, ApprovalLogEntry, ApprovalState};
use tenderdeck_core::domain::tender::TenderId;
use tenderdeck_core::errors::ApplicationError;

use super::{decode, persistence};
use crate::DbPool;

pub struct SqlApprovalStore {
    pool: DbPool,
}

impl SqlApprovalStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// A corrupt stored timestamp degrades to `None` rather than failing the
/// whole load; the flags stay authoritative.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(parsed) => Some(parsed.with_timezone(&Utc)),
        Err(_) => {
            warn!(raw, "discarding corrupt approval timestamp");
            None
        }
    }
}

fn row_to_state(row: &sqlx::sqlite::SqliteRow) -> Result<ApprovalState, ApplicationError> {
    let proposal_head_at: Option<String> =
        row.try_get("proposal_head_at").map_err(|e| decode(e.to_string()))?;
    let svp_at: Option<String> = row.try_get("svp_at").map_err(|e| decode(e.to_string()))?;

    Ok(ApprovalState {
        proposal_head_approved: row
            .try_get::<i64, _>("proposal_head_approved")
            .map_err(|e| decode(e.to_string()))?
            != 0,
        proposal_head_by: row.try_get("proposal_head_by").map_err(|e| decode(e.to_string()))?,
        proposal_head_at: proposal_head_at.as_deref().and_then(parse_timestamp),
        svp_approved: row
            .try_get::<i64, _>("svp_approved")
            .map_err(|e| decode(e.to_string()))?
            != 0,
        svp_by: row.try_get("svp_by").map_err(|e| decode(e.to_string()))?,
        svp_at: svp_at.as_deref().and_then(parse_timestamp),
    })
}

fn row_to_log_entry(row: &sqlx::sqlite::SqliteRow) -> Result<ApprovalLogEntry, ApplicationError> {
    let action_raw: String = row.try_get("action").map_err(|e| decode(e.to_string()))?;
    let action = ApprovalAction::parse(&action_raw)
        .ok_or_else(|| decode(format!("unknown approval action `{action_raw}`")))?;
    let performed_at_raw: String =
        row.try_get("performed_at").map_err(|e| decode(e.to_string()))?;

    Ok(ApprovalLogEntry {
        id: row.try_get("id").map_err(|e| decode(e.to_string()))?,
        opportunity_id: TenderId(
            row.try_get("opportunity_id").map_err(|e| decode(e.to_string()))?,
        ),
        action,
        performed_by: row.try_get("performed_by").map_err(|e| decode(e.to_string()))?,
        performed_by_role: row.try_get("performed_by_role").map_err(|e| decode(e.to_string()))?,
        // The log is append-only evidence; a row we cannot date is a real
        // defect, unlike the reconstructible state timestamps.
        performed_at: parse_timestamp(&performed_at_raw).ok_or_else(|| {
            decode(format!("invalid timestamp in approval log: `{performed_at_raw}`"))
        })?,
        group: row.try_get("group_classification").map_err(|e| decode(e.to_string()))?,
    })
}

#[async_trait]
impl ApprovalStore for SqlApprovalStore {
    async fn load(&self, id: &TenderId) -> Result<Option<ApprovalState>, ApplicationError> {
        let row = sqlx::query(
            "SELECT proposal_head_approved, proposal_head_by, proposal_head_at,
                    svp_approved, svp_by, svp_at
             FROM approval_state WHERE opportunity_id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(persistence)?;

        row.as_ref().map(row_to_state).transpose()
    }

    async fn load_all(&self) -> Result<HashMap<TenderId, ApprovalState>, ApplicationError> {
        let rows = sqlx::query(
            "SELECT opportunity_id, proposal_head_approved, proposal_head_by, proposal_head_at,
                    svp_approved, svp_by, svp_at
             FROM approval_state",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(persistence)?;

        let mut states = HashMap::with_capacity(rows.len());
        for row in &rows {
            let id: String = row.try_get("opportunity_id").map_err(|e| decode(e.to_string()))?;
            states.insert(TenderId(id), row_to_state(row)?);
        }
        Ok(states)
    }

    async fn grant_proposal_head(
        &self,
        id: &TenderId,
        approved_by: &str,
        approved_at: DateTime<Utc>,
    ) -> Result<bool, ApplicationError> {
        // Guarded upsert: the WHERE clause makes the step single-winner even
        // under concurrent grants.
        let result = sqlx::query(
            "INSERT INTO approval_state
                 (opportunity_id, proposal_head_approved, proposal_head_by, proposal_head_at,
                  updated_at)
             VALUES (?, 1, ?, ?, ?)
             ON CONFLICT(opportunity_id) DO UPDATE SET
                 proposal_head_approved = 1,
                 proposal_head_by = excluded.proposal_head_by,
                 proposal_head_at = excluded.proposal_head_at,
                 updated_at = excluded.updated_at
             WHERE approval_state.proposal_head_approved = 0",
        )
        .bind(&id.0)
        .bind(approved_by)
        .bind(approved_at.to_rfc3339())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(persistence)?;

        Ok(result.rows_affected() == 1)
    }

    async fn grant_svp(
        &self,
        id: &TenderId,
        approved_by: &str,
        approved_at: DateTime<Utc>,
    ) -> Result<bool, ApplicationError> {
        let result = sqlx::query(
            "UPDATE approval_state
             SET svp_approved = 1, svp_by = ?, svp_at = ?, updated_at = ?
             WHERE opportunity_id = ? AND proposal_head_approved = 1 AND svp_approved = 0",
        )
        .bind(approved_by)
        .bind(approved_at.to_rfc3339())
        .bind(Utc::now().to_rfc3339())
        .bind(&id.0)
        .execute(&self.pool)
        .await
        .map_err(persistence)?;

        Ok(result.rows_affected() == 1)
    }

    async fn remove(&self, id: &TenderId) -> Result<bool, ApplicationError> {
        let result = sqlx::query("DELETE FROM approval_state WHERE opportunity_id = ?")
            .bind(&id.0)
            .execute(&self.pool)
            .await
            .map_err(persistence)?;

        Ok(result.rows_affected() == 1)
    }

    async fn append_log(&self, entry: ApprovalLogEntry) -> Result<(), ApplicationError> {
        sqlx::query(
            "INSERT INTO approval_log
                 (id, opportunity_id, action, performed_by, performed_by_role, performed_at,
                  group_classification)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&entry.id)
        .bind(&entry.opportunity_id.0)
        .bind(entry.action.as_str())
        .bind(&entry.performed_by)
        .bind(&entry.performed_by_role)
        .bind(entry.performed_at.to_rfc3339())
        .bind(&entry.group)
        .execute(&self.pool)
        .await
        .map_err(persistence)?;

        Ok(())
    }

    async fn log_for(&self, id: &TenderId) -> Result<Vec<ApprovalLogEntry>, ApplicationError> {
        let rows = sqlx::query(
            "SELECT id, opportunity_id, action, performed_by, performed_by_role, performed_at,
                    group_classification
             FROM approval_log
             WHERE opportunity_id = ?
             ORDER BY performed_at ASC",
        )
        .bind(&id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(persistence)?;

        rows.iter().map(row_to_log_entry).collect()
    }

    async fn recent_log(&self, limit: u32) -> Result<Vec<ApprovalLogEntry>, ApplicationError> {
        let rows = sqlx::query(
            "SELECT id, opportunity_id, action, performed_by, performed_by_role, performed_at,
                    group_classification
             FROM approval_log
             ORDER BY performed_at DESC
             LIMIT ?",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(persistence)?;

        rows.iter().map(row_to_log_entry).collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use tenderdeck_core::approvals::ApprovalStore;
    use tenderdeck_core::domain::approval::{ApprovalAction, ApprovalLogEntry, ApprovalStatus};
    use tenderdeck_core::domain::tender::TenderId;

    use crate::{connect_with_settings, migrations};

    use super::SqlApprovalStore;

    async fn store() -> SqlApprovalStore {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");
        SqlApprovalStore::new(pool)
    }

    #[tokio::test]
    async fn grant_proposal_head_is_single_winner() {
        let store = store().await;
        let id = TenderId("tender-4".to_owned());

        assert!(store.grant_proposal_head(&id, "first@example.com", Utc::now()).await.unwrap());
        assert!(!store.grant_proposal_head(&id, "second@example.com", Utc::now()).await.unwrap());

        let state = store.load(&id).await.unwrap().expect("state exists");
        assert_eq!(state.proposal_head_by.as_deref(), Some("first@example.com"));
        assert_eq!(state.status(), ApprovalStatus::ProposalHeadApproved);
    }

    #[tokio::test]
    async fn grant_svp_requires_the_first_step() {
        let store = store().await;
        let id = TenderId("tender-7".to_owned());

        assert!(!store.grant_svp(&id, "svp@example.com", Utc::now()).await.unwrap());

        store.grant_proposal_head(&id, "head@example.com", Utc::now()).await.unwrap();
        assert!(store.grant_svp(&id, "svp@example.com", Utc::now()).await.unwrap());
        assert!(!store.grant_svp(&id, "other-svp@example.com", Utc::now()).await.unwrap());

        let state = store.load(&id).await.unwrap().expect("state exists");
        assert_eq!(state.status(), ApprovalStatus::FullyApproved);
        assert_eq!(state.svp_by.as_deref(), Some("svp@example.com"));
    }

    #[tokio::test]
    async fn remove_reports_whether_state_existed() {
        let store = store().await;
        let id = TenderId("tender-1".to_owned());

        assert!(!store.remove(&id).await.unwrap());

        store.grant_proposal_head(&id, "head@example.com", Utc::now()).await.unwrap();
        assert!(store.remove(&id).await.unwrap());
        assert!(store.load(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn log_round_trips_and_orders_by_time() {
        let store = store().await;
        let id = TenderId("tender-6".to_owned());
        let earlier = Utc::now() - chrono::Duration::minutes(5);

        store
            .append_log(ApprovalLogEntry::new(
                id.clone(),
                ApprovalAction::ProposalHeadApproved,
                "head@example.com",
                "Proposal Head",
                earlier,
                None,
            ))
            .await
            .unwrap();
        store
            .append_log(ApprovalLogEntry::new(
                id.clone(),
                ApprovalAction::SvpApproved,
                "svp@example.com",
                "SVP (GES)",
                Utc::now(),
                Some("GES".to_owned()),
            ))
            .await
            .unwrap();

        let entries = store.log_for(&id).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, ApprovalAction::ProposalHeadApproved);
        assert_eq!(entries[1].group.as_deref(), Some("GES"));

        let recent = store.recent_log(1).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].action, ApprovalAction::SvpApproved);
    }

    #[tokio::test]
    async fn corrupt_timestamp_degrades_to_none_instead_of_erroring() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");
        let store = SqlApprovalStore::new(pool.clone());
        let id = TenderId("tender-3".to_owned());

        store.grant_proposal_head(&id, "head@example.com", Utc::now()).await.unwrap();
        sqlx::query("UPDATE approval_state SET proposal_head_at = 'not-a-date'")
            .execute(&pool)
            .await
            .unwrap();

        let state = store.load(&id).await.unwrap().expect("state exists");
        assert!(state.proposal_head_approved);
        assert_eq!(state.proposal_head_at, None);
        assert_eq!(state.status(), ApprovalStatus::ProposalHeadApproved);

        let states = store.load_all().await.unwrap();
        assert_eq!(states.len(), 1);
    }

    #[tokio::test]
    async fn load_all_returns_every_tracked_opportunity() {
        let store = store().await;
        store
            .grant_proposal_head(&TenderId("tender-1".to_owned()), "a@example.com", Utc::now())
            .await
            .unwrap();
        store
            .grant_proposal_head(&TenderId("tender-2".to_owned()), "b@example.com", Utc::now())
            .await
            .unwrap();

        let states = store.load_all().await.unwrap();
        assert_eq!(states.len(), 2);
        assert!(states.contains_key(&TenderId("tender-2".to_owned())));
    }
}

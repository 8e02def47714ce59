//! In-memory store fakes for tests and the smoke command.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use tenderdeck_core::approvals::ApprovalStore;
use tenderdeck_core::domain::approval::{ApprovalLogEntry, ApprovalState};
use tenderdeck_core::domain::tender::TenderId;
use tenderdeck_core::domain::user::{Role, User};
use tenderdeck_core::errors::ApplicationError;
use tenderdeck_core::identity::UserStore;

#[derive(Clone, Default)]
pub struct InMemoryApprovalStore {
    states: Arc<RwLock<HashMap<TenderId, ApprovalState>>>,
    log: Arc<RwLock<Vec<ApprovalLogEntry>>>,
}

#[async_trait]
impl ApprovalStore for InMemoryApprovalStore {
    async fn load(&self, id: &TenderId) -> Result<Option<ApprovalState>, ApplicationError> {
        Ok(self.states.read().await.get(id).cloned())
    }

    async fn load_all(&self) -> Result<HashMap<TenderId, ApprovalState>, ApplicationError> {
        Ok(self.states.read().await.clone())
    }

    async fn grant_proposal_head(
        &self,
        id: &TenderId,
        approved_by: &str,
        approved_at: DateTime<Utc>,
    ) -> Result<bool, ApplicationError> {
        let mut states = self.states.write().await;
        let state = states.entry(id.clone()).or_default();
        if state.proposal_head_approved {
            return Ok(false);
        }
        state.proposal_head_approved = true;
        state.proposal_head_by = Some(approved_by.to_owned());
        state.proposal_head_at = Some(approved_at);
        Ok(true)
    }

    async fn grant_svp(
        &self,
        id: &TenderId,
        approved_by: &str,
        approved_at: DateTime<Utc>,
    ) -> Result<bool, ApplicationError> {
        let mut states = self.states.write().await;
        let Some(state) = states.get_mut(id) else { return Ok(false) };
        if !state.proposal_head_approved || state.svp_approved {
            return Ok(false);
        }
        state.svp_approved = true;
        state.svp_by = Some(approved_by.to_owned());
        state.svp_at = Some(approved_at);
        Ok(true)
    }

    async fn remove(&self, id: &TenderId) -> Result<bool, ApplicationError> {
        Ok(self.states.write().await.remove(id).is_some())
    }

    async fn append_log(&self, entry: ApprovalLogEntry) -> Result<(), ApplicationError> {
        self.log.write().await.push(entry);
        Ok(())
    }

    async fn log_for(&self, id: &TenderId) -> Result<Vec<ApprovalLogEntry>, ApplicationError> {
        Ok(self
            .log
            .read()
            .await
            .iter()
            .filter(|entry| &entry.opportunity_id == id)
            .cloned()
            .collect())
    }

    async fn recent_log(&self, limit: u32) -> Result<Vec<ApprovalLogEntry>, ApplicationError> {
        let mut entries = self.log.read().await.clone();
        entries.sort_by(|a, b| b.performed_at.cmp(&a.performed_at));
        entries.truncate(limit as usize);
        Ok(entries)
    }
}

#[derive(Clone, Default)]
pub struct InMemoryUserStore {
    users: Arc<RwLock<HashMap<String, User>>>,
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, ApplicationError> {
        Ok(self.users.read().await.get(id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, ApplicationError> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|user| user.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn list(&self) -> Result<Vec<User>, ApplicationError> {
        let mut users: Vec<User> = self.users.read().await.values().cloned().collect();
        users.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(users)
    }

    async fn upsert(&self, user: User) -> Result<(), ApplicationError> {
        self.users.write().await.insert(user.id.clone(), user);
        Ok(())
    }

    async fn set_role(
        &self,
        id: &str,
        role: Role,
        assigned_group: Option<String>,
    ) -> Result<bool, ApplicationError> {
        let mut users = self.users.write().await;
        let Some(user) = users.get_mut(id) else { return Ok(false) };
        user.role = role;
        user.assigned_group = assigned_group;
        Ok(true)
    }
}

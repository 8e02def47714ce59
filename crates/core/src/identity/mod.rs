//! Principal resolution and role administration.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink};
use crate::domain::user::{Role, User};
use crate::errors::ApplicationError;

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, ApplicationError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, ApplicationError>;

    async fn list(&self) -> Result<Vec<User>, ApplicationError>;

    async fn upsert(&self, user: User) -> Result<(), ApplicationError>;

    /// Returns `false` when no account with that id exists.
    async fn set_role(
        &self,
        id: &str,
        role: Role,
        assigned_group: Option<String>,
    ) -> Result<bool, ApplicationError>;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RoleUpdateOutcome {
    Applied { user: User },
    UnknownUser,
    Denied { reason: String },
}

pub struct Directory<S> {
    store: S,
    audit: Arc<dyn AuditSink>,
}

impl<S: UserStore> Directory<S> {
    pub fn new(store: S, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, audit }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Resolves a request principal. Accepts either the account id or the
    /// email address, since callers send whichever they have.
    pub async fn resolve(&self, principal: &str) -> Result<Option<User>, ApplicationError> {
        if let Some(user) = self.store.find_by_id(principal).await? {
            return Ok(Some(user));
        }
        self.store.find_by_email(principal).await
    }

    /// Role roster, for the admin panel. Admins may look, only masters may
    /// touch.
    pub async fn list_users(&self, actor: &User) -> Result<Option<Vec<User>>, ApplicationError> {
        if !actor.role.is_admin() {
            return Ok(None);
        }
        Ok(Some(self.store.list().await?))
    }

    pub async fn update_role(
        &self,
        actor: &User,
        target_id: &str,
        role: Role,
        assigned_group: Option<String>,
        correlation_id: &str,
    ) -> Result<RoleUpdateOutcome, ApplicationError> {
        if !actor.role.is_master() {
            self.audit.emit(
                AuditEvent::new(
                    None,
                    correlation_id,
                    "identity.role_change_denied",
                    AuditCategory::Identity,
                    actor.email.clone(),
                    AuditOutcome::Rejected,
                )
                .with_metadata("target", target_id)
                .with_metadata("requested_role", role.as_str()),
            );
            return Ok(RoleUpdateOutcome::Denied {
                reason: "master role required to change roles".to_owned(),
            });
        }

        // An SVP grant without a group would be unable to approve anything.
        let assigned_group = match role {
            Role::Svp => assigned_group,
            _ => None,
        };

        if !self.store.set_role(target_id, role, assigned_group.clone()).await? {
            return Ok(RoleUpdateOutcome::UnknownUser);
        }

        let Some(user) = self.store.find_by_id(target_id).await? else {
            return Err(ApplicationError::Persistence(format!(
                "account `{target_id}` vanished after role update"
            )));
        };

        self.audit.emit(
            AuditEvent::new(
                None,
                correlation_id,
                "identity.role_changed",
                AuditCategory::Identity,
                actor.email.clone(),
                AuditOutcome::Success,
            )
            .with_metadata("target", target_id)
            .with_metadata("role", role.as_str()),
        );

        Ok(RoleUpdateOutcome::Applied { user })
    }
}

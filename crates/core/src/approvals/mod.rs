//! Two-step approval workflow: a proposal-head sign-off followed by an SVP
//! sign-off, with role- and group-scoped authorization.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink};
use crate::domain::approval::{ApprovalAction, ApprovalLogEntry, ApprovalState, ApprovalStatus};
use crate::domain::tender::{same_group, TenderId};
use crate::domain::user::{Role, User};
use crate::errors::ApplicationError;

/// Storage seam for approval state and its append-only log.
///
/// The grant methods are compare-and-set: each returns `true` only when the
/// store actually performed the transition, so two concurrent approvers can
/// never both win the same step.
#[async_trait]
pub trait ApprovalStore: Send + Sync {
    async fn load(&self, id: &TenderId) -> Result<Option<ApprovalState>, ApplicationError>;

    async fn load_all(&self) -> Result<HashMap<TenderId, ApprovalState>, ApplicationError>;

    /// Pending -> proposal-head-approved, iff the first step has not been won.
    async fn grant_proposal_head(
        &self,
        id: &TenderId,
        approved_by: &str,
        approved_at: DateTime<Utc>,
    ) -> Result<bool, ApplicationError>;

    /// Proposal-head-approved -> fully-approved, iff the first step is done
    /// and the second has not been won.
    async fn grant_svp(
        &self,
        id: &TenderId,
        approved_by: &str,
        approved_at: DateTime<Utc>,
    ) -> Result<bool, ApplicationError>;

    /// Drops the state row entirely, returning whether one existed.
    async fn remove(&self, id: &TenderId) -> Result<bool, ApplicationError>;

    async fn append_log(&self, entry: ApprovalLogEntry) -> Result<(), ApplicationError>;

    async fn log_for(&self, id: &TenderId) -> Result<Vec<ApprovalLogEntry>, ApplicationError>;

    /// Most recent entries across all opportunities, newest first.
    async fn recent_log(&self, limit: u32) -> Result<Vec<ApprovalLogEntry>, ApplicationError>;
}

/// Typed result of an approval attempt. Callers can distinguish "nothing
/// happened" from "the workflow advanced" without re-reading the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ApprovalOutcome {
    Applied { status: ApprovalStatus },
    AlreadyApproved,
    InvalidTransition { status: ApprovalStatus },
    Denied { reason: String },
}

pub struct ApprovalEngine<S> {
    store: S,
    audit: Arc<dyn AuditSink>,
}

impl<S: ApprovalStore> ApprovalEngine<S> {
    pub fn new(store: S, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, audit }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// First workflow step. Idempotent: a step that is already granted
    /// reports `AlreadyApproved` and appends nothing.
    pub async fn approve_as_proposal_head(
        &self,
        actor: &User,
        id: &TenderId,
        correlation_id: &str,
    ) -> Result<ApprovalOutcome, ApplicationError> {
        if !actor.role.is_proposal_head() {
            self.audit_denied(actor, id, correlation_id, "proposal head");
            return Ok(ApprovalOutcome::Denied {
                reason: "proposal head role required for the first approval".to_owned(),
            });
        }

        let state = self.store.load(id).await?.unwrap_or_default();
        if state.proposal_head_approved {
            return Ok(ApprovalOutcome::AlreadyApproved);
        }

        let now = Utc::now();
        if !self.store.grant_proposal_head(id, &actor.email, now).await? {
            // Lost the race to another proposal head.
            return Ok(ApprovalOutcome::AlreadyApproved);
        }
        self.record(actor, id, ApprovalAction::ProposalHeadApproved, now, None, correlation_id)
            .await?;
        Ok(ApprovalOutcome::Applied { status: ApprovalStatus::ProposalHeadApproved })
    }

    /// Second workflow step. The opportunity's own group classification is
    /// the authoritative scope; calling before step one is an out-of-order
    /// transition, not an authorization failure.
    pub async fn approve_as_svp(
        &self,
        actor: &User,
        id: &TenderId,
        opportunity_group: &str,
        correlation_id: &str,
    ) -> Result<ApprovalOutcome, ApplicationError> {
        if let Some(reason) = svp_denial(actor, opportunity_group) {
            self.audit_denied(actor, id, correlation_id, "svp");
            return Ok(ApprovalOutcome::Denied { reason });
        }

        let state = self.store.load(id).await?.unwrap_or_default();
        if !state.proposal_head_approved {
            return Ok(ApprovalOutcome::InvalidTransition { status: ApprovalStatus::Pending });
        }
        if state.svp_approved {
            return Ok(ApprovalOutcome::AlreadyApproved);
        }

        let now = Utc::now();
        if !self.store.grant_svp(id, &actor.email, now).await? {
            // Raced: either another SVP won or a revert landed in between.
            let current = self.store.load(id).await?.unwrap_or_default();
            return Ok(if current.svp_approved {
                ApprovalOutcome::AlreadyApproved
            } else {
                ApprovalOutcome::InvalidTransition { status: current.status() }
            });
        }
        self.record(
            actor,
            id,
            ApprovalAction::SvpApproved,
            now,
            Some(opportunity_group.to_owned()),
            correlation_id,
        )
        .await?;
        Ok(ApprovalOutcome::Applied { status: ApprovalStatus::FullyApproved })
    }

    /// Routes a bare "approve" request to the caller's step. Dedicated roles
    /// always land on their own step, so repeating one is idempotent; a
    /// master advances whichever step is open.
    pub async fn approve(
        &self,
        actor: &User,
        id: &TenderId,
        opportunity_group: &str,
        correlation_id: &str,
    ) -> Result<ApprovalOutcome, ApplicationError> {
        match actor.role {
            Role::ProposalHead => self.approve_as_proposal_head(actor, id, correlation_id).await,
            Role::Svp => {
                self.approve_as_svp(actor, id, opportunity_group, correlation_id).await
            }
            _ => match self.status_of(id).await? {
                ApprovalStatus::Pending => {
                    self.approve_as_proposal_head(actor, id, correlation_id).await
                }
                _ => self.approve_as_svp(actor, id, opportunity_group, correlation_id).await,
            },
        }
    }

    /// Clears all approvals on the opportunity. Master-only.
    pub async fn revert(
        &self,
        actor: &User,
        id: &TenderId,
        correlation_id: &str,
    ) -> Result<ApprovalOutcome, ApplicationError> {
        if !actor.role.is_master() {
            self.audit_denied(actor, id, correlation_id, "master");
            return Ok(ApprovalOutcome::Denied {
                reason: "master role required to revert approvals".to_owned(),
            });
        }

        if !self.store.remove(id).await? {
            // Nothing was approved, so there is nothing to revert.
            return Ok(ApprovalOutcome::InvalidTransition { status: ApprovalStatus::Pending });
        }

        self.record(actor, id, ApprovalAction::Reverted, Utc::now(), None, correlation_id).await?;
        Ok(ApprovalOutcome::Applied { status: ApprovalStatus::Pending })
    }

    pub async fn status_of(&self, id: &TenderId) -> Result<ApprovalStatus, ApplicationError> {
        Ok(self.store.load(id).await?.unwrap_or_default().status())
    }

    async fn record(
        &self,
        actor: &User,
        id: &TenderId,
        action: ApprovalAction,
        performed_at: DateTime<Utc>,
        group: Option<String>,
        correlation_id: &str,
    ) -> Result<(), ApplicationError> {
        let entry = ApprovalLogEntry::new(
            id.clone(),
            action,
            actor.email.clone(),
            actor.audit_role_label(),
            performed_at,
            group,
        );
        self.store.append_log(entry).await?;

        self.audit.emit(
            AuditEvent::new(
                Some(id.clone()),
                correlation_id,
                format!("approval.{}", action.as_str()),
                AuditCategory::Approval,
                actor.email.clone(),
                AuditOutcome::Success,
            )
            .with_metadata("role", actor.audit_role_label()),
        );
        Ok(())
    }

    fn audit_denied(&self, actor: &User, id: &TenderId, correlation_id: &str, required: &str) {
        self.audit.emit(
            AuditEvent::new(
                Some(id.clone()),
                correlation_id,
                "approval.denied",
                AuditCategory::Approval,
                actor.email.clone(),
                AuditOutcome::Rejected,
            )
            .with_metadata("required", required.to_owned())
            .with_metadata("actor_role", actor.role.as_str()),
        );
    }
}

/// SVP approvals are scoped to the approver's assigned group; masters bypass
/// the scope check.
fn svp_denial(actor: &User, opportunity_group: &str) -> Option<String> {
    if !actor.role.is_svp() {
        return Some("svp role required for the final approval".to_owned());
    }
    if actor.role == Role::Master {
        return None;
    }
    match actor.assigned_group.as_deref() {
        Some(group) if same_group(group, opportunity_group) => None,
        Some(group) => Some(format!(
            "svp for {group} cannot approve an opportunity classified under {opportunity_group}"
        )),
        None => Some("svp account has no assigned group".to_owned()),
    }
}

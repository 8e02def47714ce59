use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::tender::TenderId;

/// Current-state cache for one opportunity's two-step approval. The log is
/// the source of truth for "who did what when"; this table is derived.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalState {
    pub proposal_head_approved: bool,
    pub proposal_head_by: Option<String>,
    pub proposal_head_at: Option<DateTime<Utc>>,
    pub svp_approved: bool,
    pub svp_by: Option<String>,
    pub svp_at: Option<DateTime<Utc>>,
}

impl ApprovalState {
    /// Derived status; never stored. An absent entry reads as `Pending`.
    pub fn status(&self) -> ApprovalStatus {
        if self.svp_approved {
            ApprovalStatus::FullyApproved
        } else if self.proposal_head_approved {
            ApprovalStatus::ProposalHeadApproved
        } else {
            ApprovalStatus::Pending
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    #[default]
    Pending,
    ProposalHeadApproved,
    FullyApproved,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::ProposalHeadApproved => "proposal_head_approved",
            Self::FullyApproved => "fully_approved",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalAction {
    ProposalHeadApproved,
    SvpApproved,
    Reverted,
}

impl ApprovalAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProposalHeadApproved => "proposal_head_approved",
            Self::SvpApproved => "svp_approved",
            Self::Reverted => "reverted",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "proposal_head_approved" => Some(Self::ProposalHeadApproved),
            "svp_approved" => Some(Self::SvpApproved),
            "reverted" => Some(Self::Reverted),
            _ => None,
        }
    }
}

/// Append-only audit record; entries are never edited or deleted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalLogEntry {
    pub id: String,
    pub opportunity_id: TenderId,
    pub action: ApprovalAction,
    pub performed_by: String,
    pub performed_by_role: String,
    pub performed_at: DateTime<Utc>,
    /// Set for SVP approvals, taken from the opportunity's own group
    /// classification.
    pub group: Option<String>,
}

impl ApprovalLogEntry {
    pub fn new(
        opportunity_id: TenderId,
        action: ApprovalAction,
        performed_by: impl Into<String>,
        performed_by_role: impl Into<String>,
        performed_at: DateTime<Utc>,
        group: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            opportunity_id,
            action,
            performed_by: performed_by.into(),
            performed_by_role: performed_by_role.into(),
            performed_at,
            group,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ApprovalAction, ApprovalState, ApprovalStatus};

    #[test]
    fn default_state_is_pending() {
        assert_eq!(ApprovalState::default().status(), ApprovalStatus::Pending);
    }

    #[test]
    fn first_flag_alone_is_proposal_head_approved() {
        let state = ApprovalState { proposal_head_approved: true, ..Default::default() };
        assert_eq!(state.status(), ApprovalStatus::ProposalHeadApproved);
    }

    #[test]
    fn both_flags_are_fully_approved() {
        let state = ApprovalState {
            proposal_head_approved: true,
            svp_approved: true,
            ..Default::default()
        };
        assert_eq!(state.status(), ApprovalStatus::FullyApproved);
    }

    #[test]
    fn action_wire_strings_round_trip() {
        for action in [
            ApprovalAction::ProposalHeadApproved,
            ApprovalAction::SvpApproved,
            ApprovalAction::Reverted,
        ] {
            assert_eq!(ApprovalAction::parse(action.as_str()), Some(action));
        }
        assert_eq!(ApprovalAction::parse("granted"), None);
    }
}

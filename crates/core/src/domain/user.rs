use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Closed role set. A prior iteration of the dashboard shipped with only
/// master/admin/basic; the reviewer roles supersede it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Master,
    Admin,
    ProposalHead,
    Svp,
    Basic,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Master => "master",
            Self::Admin => "admin",
            Self::ProposalHead => "proposal_head",
            Self::Svp => "svp",
            Self::Basic => "basic",
        }
    }

    pub fn is_master(&self) -> bool {
        matches!(self, Self::Master)
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin | Self::Master)
    }

    pub fn is_proposal_head(&self) -> bool {
        matches!(self, Self::ProposalHead | Self::Master)
    }

    pub fn is_svp(&self) -> bool {
        matches!(self, Self::Svp | Self::Master)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unknown role `{0}` (expected master|admin|proposal_head|svp|basic)")]
pub struct ParseRoleError(String);

impl std::str::FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "master" => Ok(Self::Master),
            "admin" => Ok(Self::Admin),
            "proposal_head" => Ok(Self::ProposalHead),
            "svp" => Ok(Self::Svp),
            "basic" => Ok(Self::Basic),
            other => Err(ParseRoleError(other.to_string())),
        }
    }
}

/// An authenticated principal with its live role assignment. At most one
/// role and one assigned group per identity; the group is only meaningful
/// for SVPs (an SVP without one can approve nothing).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub assigned_group: Option<String>,
}

impl User {
    /// Role label recorded in the approval log for this principal.
    pub fn audit_role_label(&self) -> String {
        match self.role {
            Role::Master => "Master".to_string(),
            Role::Admin => "Admin".to_string(),
            Role::ProposalHead => "Proposal Head".to_string(),
            Role::Svp => match &self.assigned_group {
                Some(group) => format!("SVP ({group})"),
                None => "SVP".to_string(),
            },
            Role::Basic => "Basic".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Role, User};

    #[test]
    fn master_satisfies_every_predicate() {
        assert!(Role::Master.is_master());
        assert!(Role::Master.is_admin());
        assert!(Role::Master.is_proposal_head());
        assert!(Role::Master.is_svp());
    }

    #[test]
    fn reviewer_roles_are_disjoint() {
        assert!(Role::ProposalHead.is_proposal_head());
        assert!(!Role::ProposalHead.is_svp());
        assert!(Role::Svp.is_svp());
        assert!(!Role::Svp.is_proposal_head());
        assert!(!Role::Basic.is_admin());
    }

    #[test]
    fn roles_parse_from_wire_strings() {
        assert_eq!("proposal_head".parse::<Role>(), Ok(Role::ProposalHead));
        assert_eq!(" SVP ".parse::<Role>(), Ok(Role::Svp));
        assert!("superuser".parse::<Role>().is_err());
    }

    #[test]
    fn svp_audit_label_carries_group() {
        let user = User {
            id: "user-3".to_string(),
            email: "svp@example.com".to_string(),
            display_name: "Ges Svp".to_string(),
            role: Role::Svp,
            assigned_group: Some("GES".to_string()),
        };
        assert_eq!(user.audit_role_label(), "SVP (GES)");
    }
}

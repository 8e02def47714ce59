//! Demo account seeds covering every role in the approval workflow.

use tenderdeck_core::domain::user::{Role, User};
use tenderdeck_core::errors::ApplicationError;
use tenderdeck_core::identity::UserStore;

struct SeedUserContract {
    id: &'static str,
    email: &'static str,
    display_name: &'static str,
    role: Role,
    assigned_group: Option<&'static str>,
}

/// One account per role, plus one SVP per group so group scoping can be
/// exercised end to end.
const SEED_USERS: &[SeedUserContract] = &[
    SeedUserContract {
        id: "user-master",
        email: "master@tenderdeck.local",
        display_name: "Master Account",
        role: Role::Master,
        assigned_group: None,
    },
    SeedUserContract {
        id: "user-admin",
        email: "admin@tenderdeck.local",
        display_name: "Operations Admin",
        role: Role::Admin,
        assigned_group: None,
    },
    SeedUserContract {
        id: "user-proposal-head",
        email: "proposal.head@tenderdeck.local",
        display_name: "Proposal Head",
        role: Role::ProposalHead,
        assigned_group: None,
    },
    SeedUserContract {
        id: "user-svp-ges",
        email: "svp.ges@tenderdeck.local",
        display_name: "SVP Energy Solutions",
        role: Role::Svp,
        assigned_group: Some("GES"),
    },
    SeedUserContract {
        id: "user-svp-gds",
        email: "svp.gds@tenderdeck.local",
        display_name: "SVP Digital Solutions",
        role: Role::Svp,
        assigned_group: Some("GDS"),
    },
    SeedUserContract {
        id: "user-svp-gtn",
        email: "svp.gtn@tenderdeck.local",
        display_name: "SVP Transmission",
        role: Role::Svp,
        assigned_group: Some("GTN"),
    },
    SeedUserContract {
        id: "user-svp-gts",
        email: "svp.gts@tenderdeck.local",
        display_name: "SVP Technical Services",
        role: Role::Svp,
        assigned_group: Some("GTS"),
    },
    SeedUserContract {
        id: "user-basic",
        email: "viewer@tenderdeck.local",
        display_name: "Dashboard Viewer",
        role: Role::Basic,
        assigned_group: None,
    },
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeedResult {
    pub users_seeded: usize,
}

pub async fn seed_demo_users<S: UserStore>(store: &S) -> Result<SeedResult, ApplicationError> {
    for contract in SEED_USERS {
        store
            .upsert(User {
                id: contract.id.to_owned(),
                email: contract.email.to_owned(),
                display_name: contract.display_name.to_owned(),
                role: contract.role,
                assigned_group: contract.assigned_group.map(str::to_owned),
            })
            .await?;
    }
    Ok(SeedResult { users_seeded: SEED_USERS.len() })
}

/// Checks that every seeded account survived the round trip with its role
/// intact.
pub async fn verify_demo_users<S: UserStore>(store: &S) -> Result<bool, ApplicationError> {
    for contract in SEED_USERS {
        let Some(user) = store.find_by_id(contract.id).await? else {
            return Ok(false);
        };
        if user.role != contract.role
            || user.assigned_group.as_deref() != contract.assigned_group
        {
            return Ok(false);
        }
    }
    Ok(true)
}

pub mod approvals;
pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod export;
pub mod filter;
pub mod identity;
pub mod normalize;
pub mod stats;

pub use approvals::{ApprovalEngine, ApprovalOutcome, ApprovalStore};
pub use audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink};
pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use domain::approval::{ApprovalAction, ApprovalLogEntry, ApprovalState, ApprovalStatus};
pub use domain::tender::{Tender, TenderId, GROUP_CLASSIFICATIONS};
pub use domain::user::{Role, User};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use filter::TenderFilter;
pub use identity::{Directory, RoleUpdateOutcome, UserStore};
pub use normalize::parse_grid;
pub use stats::{
    calculate_funnel, calculate_kpi_stats, client_leaderboard, submission_near_tenders,
    ClientTotals, FunnelStage, KpiStats,
};

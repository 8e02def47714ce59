//! In-memory end-to-end pass over the pipeline: normalize a canned grid,
//! aggregate it, and drive one opportunity through both approval steps.

use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDate;
use serde::Serialize;

use tenderdeck_core::approvals::{ApprovalEngine, ApprovalOutcome};
use tenderdeck_core::audit::InMemoryAuditSink;
use tenderdeck_core::domain::approval::ApprovalStatus;
use tenderdeck_core::domain::tender::TenderId;
use tenderdeck_core::domain::user::{Role, User};
use tenderdeck_core::normalize::parse_grid;
use tenderdeck_core::stats::{calculate_funnel, calculate_kpi_stats};
use tenderdeck_db::InMemoryApprovalStore;

use crate::commands::CommandResult;

#[derive(Debug, Serialize)]
struct SmokeCheck {
    name: &'static str,
    passed: bool,
    duration_ms: u128,
    details: String,
}

pub fn run() -> CommandResult {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "smoke",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let checks = runtime.block_on(run_checks());
    let all_passed = checks.iter().all(|check| check.passed);
    let summary = serde_json::to_string(&checks).unwrap_or_else(|error| error.to_string());

    if all_passed {
        CommandResult::success("smoke", summary)
    } else {
        CommandResult::failure("smoke", "smoke_check", summary, 7)
    }
}

async fn run_checks() -> Vec<SmokeCheck> {
    let mut checks = Vec::new();
    let today = NaiveDate::from_ymd_opt(2026, 5, 6).expect("valid date");

    let started = Instant::now();
    let grid = sample_grid();
    let tenders = parse_grid(&grid, today);
    checks.push(SmokeCheck {
        name: "normalize_grid",
        passed: tenders.len() == 2,
        duration_ms: started.elapsed().as_millis(),
        details: format!("parsed {} records from {} rows", tenders.len(), grid.len()),
    });

    let started = Instant::now();
    let kpi = calculate_kpi_stats(&tenders);
    let funnel = calculate_funnel(&tenders);
    checks.push(SmokeCheck {
        name: "aggregate_snapshot",
        passed: kpi.active_tenders == 2 && funnel.len() == 4,
        duration_ms: started.elapsed().as_millis(),
        details: format!("active={} funnel_stages={}", kpi.active_tenders, funnel.len()),
    });

    let started = Instant::now();
    let engine = ApprovalEngine::new(
        InMemoryApprovalStore::default(),
        Arc::new(InMemoryAuditSink::default()),
    );
    let id = TenderId("tender-1".to_owned());
    let head = smoke_user("head@smoke.local", Role::ProposalHead, None);
    let svp = smoke_user("svp@smoke.local", Role::Svp, Some("GES"));

    let first = engine.approve(&head, &id, "GES", "smoke").await;
    let second = engine.approve(&svp, &id, "GES", "smoke").await;
    let passed = matches!(
        first,
        Ok(ApprovalOutcome::Applied { status: ApprovalStatus::ProposalHeadApproved })
    ) && matches!(
        second,
        Ok(ApprovalOutcome::Applied { status: ApprovalStatus::FullyApproved })
    );
    checks.push(SmokeCheck {
        name: "approval_workflow",
        passed,
        duration_ms: started.elapsed().as_millis(),
        details: "two-step approval on in-memory store".to_string(),
    });

    checks
}

fn smoke_user(email: &str, role: Role, group: Option<&str>) -> User {
    User {
        id: email.to_owned(),
        email: email.to_owned(),
        display_name: email.to_owned(),
        role,
        assigned_group: group.map(str::to_owned),
    }
}

fn sample_grid() -> Vec<Vec<String>> {
    vec![
        vec![
            "Ref No".to_owned(),
            "Tender Name".to_owned(),
            "Client".to_owned(),
            "Group".to_owned(),
            "Status".to_owned(),
        ],
        vec![
            "T-1".to_owned(),
            "Substation refit".to_owned(),
            "Power Co".to_owned(),
            "GES".to_owned(),
            "WORKING".to_owned(),
        ],
        vec![
            "T-2".to_owned(),
            "Fiber rollout".to_owned(),
            "Telco".to_owned(),
            "GDS".to_owned(),
            "SUBMITTED".to_owned(),
        ],
    ]
}

#[cfg(test)]
mod tests {
    use super::run;

    #[test]
    fn smoke_passes_end_to_end() {
        let result = run();
        assert_eq!(result.exit_code, 0, "smoke output: {}", result.output);
    }
}

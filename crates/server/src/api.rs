//! Dashboard API: snapshot queries, aggregates, the approval workflow, and
//! role administration. Principals are identified by the `X-Principal-Id`
//! header and resolved against the user directory.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post, put},
    Router,
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use tenderdeck_core::approvals::{ApprovalEngine, ApprovalOutcome, ApprovalStore};
use tenderdeck_core::domain::tender::{Tender, TenderId};
use tenderdeck_core::domain::user::{Role, User};
use tenderdeck_core::errors::{ApplicationError, InterfaceError};
use tenderdeck_core::export::{flat_rows, EXPORT_COLUMNS};
use tenderdeck_core::filter::TenderFilter;
use tenderdeck_core::identity::{Directory, RoleUpdateOutcome};
use tenderdeck_core::stats::{
    calculate_funnel, calculate_kpi_stats, client_leaderboard, submission_near_tenders,
};
use tenderdeck_db::{SqlApprovalStore, SqlUserStore};
use tenderdeck_ingest::{GridSource, RefreshCoordinator};

const CLIENT_LEADERBOARD_CAP: usize = 10;
const SUBMISSION_NEAR_CAP: usize = 8;
const RECENT_LOG_DEFAULT_LIMIT: u32 = 50;

#[derive(Clone)]
pub struct ApiState {
    pub directory: Arc<Directory<SqlUserStore>>,
    pub engine: Arc<ApprovalEngine<SqlApprovalStore>>,
    pub coordinator: Arc<RefreshCoordinator<Box<dyn GridSource>>>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/tenders", get(list_tenders))
        .route("/api/tenders/{id}/approve", post(approve))
        .route("/api/tenders/{id}/revert", post(revert))
        .route("/api/tenders/{id}/log", get(tender_log))
        .route("/api/stats", get(stats))
        .route("/api/refresh", post(refresh))
        .route("/api/export", get(export))
        .route("/api/approvals", get(approval_states))
        .route("/api/approvals/log", get(recent_log))
        .route("/api/users", get(list_users))
        .route("/api/users/{id}/role", put(update_role))
        .with_state(state)
}

type ApiResponse = (StatusCode, Json<Value>);

#[derive(Debug, Default, Deserialize)]
pub struct FilterParams {
    search: Option<String>,
    status: Option<String>,
    group: Option<String>,
    lead: Option<String>,
    client: Option<String>,
    date_from: Option<NaiveDate>,
    date_to: Option<NaiveDate>,
    min_value: Option<Decimal>,
    max_value: Option<Decimal>,
    submission_near: Option<bool>,
}

impl FilterParams {
    fn into_filter(self) -> TenderFilter {
        TenderFilter {
            search: self.search,
            statuses: split_csv(self.status),
            groups: split_csv(self.group),
            leads: split_csv(self.lead),
            clients: split_csv(self.client),
            date_from: self.date_from,
            date_to: self.date_to,
            min_value: self.min_value,
            max_value: self.max_value,
            submission_near_only: self.submission_near.unwrap_or(false),
        }
    }
}

/// Multi-select dimensions arrive as comma-separated query values.
fn split_csv(raw: Option<String>) -> Vec<String> {
    raw.map(|value| {
        value
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::to_owned)
            .collect()
    })
    .unwrap_or_default()
}

#[derive(Debug, Deserialize)]
pub struct RoleUpdateRequest {
    pub role: String,
    pub assigned_group: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LogParams {
    limit: Option<u32>,
}

fn correlation_id() -> String {
    Uuid::new_v4().to_string()
}

fn error_response(err: ApplicationError, correlation_id: &str) -> ApiResponse {
    let interface = err.into_interface(correlation_id);
    let status = match &interface {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::Forbidden { .. } => StatusCode::FORBIDDEN,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(json!({
            "error": interface.user_message(),
            "correlation_id": correlation_id,
        })),
    )
}

fn unauthorized(correlation_id: &str) -> ApiResponse {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "error": "unknown principal; send a valid X-Principal-Id header",
            "correlation_id": correlation_id,
        })),
    )
}

async fn require_principal(
    state: &ApiState,
    headers: &HeaderMap,
    correlation_id: &str,
) -> Result<User, ApiResponse> {
    let principal = headers
        .get("x-principal-id")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| unauthorized(correlation_id))?;

    match state.directory.resolve(principal).await {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err(unauthorized(correlation_id)),
        Err(err) => Err(error_response(err, correlation_id)),
    }
}

fn find_tender(tenders: &[Tender], id: &TenderId) -> Option<Tender> {
    tenders.iter().find(|tender| &tender.id == id).cloned()
}

fn outcome_response(outcome: ApprovalOutcome) -> ApiResponse {
    let status = match &outcome {
        ApprovalOutcome::Applied { .. } | ApprovalOutcome::AlreadyApproved => StatusCode::OK,
        ApprovalOutcome::InvalidTransition { .. } => StatusCode::CONFLICT,
        ApprovalOutcome::Denied { .. } => StatusCode::FORBIDDEN,
    };
    (status, Json(json!(outcome)))
}

pub async fn list_tenders(
    State(state): State<ApiState>,
    Query(params): Query<FilterParams>,
) -> ApiResponse {
    let snapshot = state.coordinator.current().await;
    let filtered = params.into_filter().apply(&snapshot.tenders);

    (
        StatusCode::OK,
        Json(json!({
            "tenders": filtered,
            "generation": snapshot.generation,
            "refreshed_at": snapshot.refreshed_at,
        })),
    )
}

pub async fn stats(
    State(state): State<ApiState>,
    Query(params): Query<FilterParams>,
) -> ApiResponse {
    let snapshot = state.coordinator.current().await;
    let filtered = params.into_filter().apply(&snapshot.tenders);

    let mut clients = client_leaderboard(&filtered);
    clients.truncate(CLIENT_LEADERBOARD_CAP);

    (
        StatusCode::OK,
        Json(json!({
            "kpi": calculate_kpi_stats(&filtered),
            "funnel": calculate_funnel(&filtered),
            "clients": clients,
            "submission_near": submission_near_tenders(&filtered, SUBMISSION_NEAR_CAP),
        })),
    )
}

pub async fn refresh(State(state): State<ApiState>, headers: HeaderMap) -> ApiResponse {
    let correlation_id = correlation_id();
    let user = match require_principal(&state, &headers, &correlation_id).await {
        Ok(user) => user,
        Err(response) => return response,
    };

    match state.coordinator.refresh(Utc::now().date_naive()).await {
        Ok(outcome) => {
            info!(actor = %user.email, ?outcome, "manual refresh requested");
            (StatusCode::OK, Json(json!({ "outcome": format!("{outcome:?}") })))
        }
        Err(err) => error_response(
            ApplicationError::Integration(err.to_string()),
            &correlation_id,
        ),
    }
}

pub async fn export(State(state): State<ApiState>) -> ApiResponse {
    let snapshot = state.coordinator.current().await;
    let rows = flat_rows(&snapshot.tenders);

    (StatusCode::OK, Json(json!({ "columns": EXPORT_COLUMNS, "rows": rows })))
}

pub async fn approval_states(State(state): State<ApiState>) -> ApiResponse {
    let correlation_id = correlation_id();
    match state.engine.store().load_all().await {
        Ok(states) => {
            let by_id: serde_json::Map<String, Value> = states
                .into_iter()
                .map(|(id, state)| {
                    (id.0, json!({ "status": state.status(), "state": state }))
                })
                .collect();
            (StatusCode::OK, Json(Value::Object(by_id)))
        }
        Err(err) => error_response(err, &correlation_id),
    }
}

pub async fn approve(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResponse {
    let correlation_id = correlation_id();
    let user = match require_principal(&state, &headers, &correlation_id).await {
        Ok(user) => user,
        Err(response) => return response,
    };

    let snapshot = state.coordinator.current().await;
    let tender_id = TenderId(id);
    let Some(tender) = find_tender(&snapshot.tenders, &tender_id) else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": "no such opportunity in the current snapshot",
                "correlation_id": correlation_id,
            })),
        );
    };

    match state
        .engine
        .approve(&user, &tender_id, &tender.group_classification, &correlation_id)
        .await
    {
        Ok(outcome) => outcome_response(outcome),
        Err(err) => error_response(err, &correlation_id),
    }
}

pub async fn revert(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResponse {
    let correlation_id = correlation_id();
    let user = match require_principal(&state, &headers, &correlation_id).await {
        Ok(user) => user,
        Err(response) => return response,
    };

    match state.engine.revert(&user, &TenderId(id), &correlation_id).await {
        Ok(outcome) => outcome_response(outcome),
        Err(err) => error_response(err, &correlation_id),
    }
}

pub async fn tender_log(State(state): State<ApiState>, Path(id): Path<String>) -> ApiResponse {
    let correlation_id = correlation_id();
    match state.engine.store().log_for(&TenderId(id)).await {
        Ok(entries) => (StatusCode::OK, Json(json!({ "entries": entries }))),
        Err(err) => error_response(err, &correlation_id),
    }
}

pub async fn recent_log(
    State(state): State<ApiState>,
    Query(params): Query<LogParams>,
) -> ApiResponse {
    let correlation_id = correlation_id();
    let limit = params.limit.unwrap_or(RECENT_LOG_DEFAULT_LIMIT);
    match state.engine.store().recent_log(limit).await {
        Ok(entries) => (StatusCode::OK, Json(json!({ "entries": entries }))),
        Err(err) => error_response(err, &correlation_id),
    }
}

pub async fn list_users(State(state): State<ApiState>, headers: HeaderMap) -> ApiResponse {
    let correlation_id = correlation_id();
    let user = match require_principal(&state, &headers, &correlation_id).await {
        Ok(user) => user,
        Err(response) => return response,
    };

    match state.directory.list_users(&user).await {
        Ok(Some(users)) => (StatusCode::OK, Json(json!({ "users": users }))),
        Ok(None) => (
            StatusCode::FORBIDDEN,
            Json(json!({
                "error": "admin role required to view the roster",
                "correlation_id": correlation_id,
            })),
        ),
        Err(err) => error_response(err, &correlation_id),
    }
}

pub async fn update_role(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<RoleUpdateRequest>,
) -> ApiResponse {
    let correlation_id = correlation_id();
    let user = match require_principal(&state, &headers, &correlation_id).await {
        Ok(user) => user,
        Err(response) => return response,
    };

    let Ok(role) = request.role.parse::<Role>() else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": format!("unknown role `{}`", request.role),
                "correlation_id": correlation_id,
            })),
        );
    };

    match state
        .directory
        .update_role(&user, &id, role, request.assigned_group, &correlation_id)
        .await
    {
        Ok(RoleUpdateOutcome::Applied { user }) => (StatusCode::OK, Json(json!({ "user": user }))),
        Ok(RoleUpdateOutcome::UnknownUser) => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": "no such account",
                "correlation_id": correlation_id,
            })),
        ),
        Ok(RoleUpdateOutcome::Denied { reason }) => (
            StatusCode::FORBIDDEN,
            Json(json!({ "error": reason, "correlation_id": correlation_id })),
        ),
        Err(err) => error_response(err, &correlation_id),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::extract::{Path, Query, State};
    use axum::http::{HeaderMap, HeaderValue, StatusCode};
    use chrono::Utc;

    use tenderdeck_core::approvals::ApprovalEngine;
    use tenderdeck_core::audit::InMemoryAuditSink;
    use tenderdeck_core::identity::Directory;
    use tenderdeck_db::{
        connect_with_settings, migrations, seed_demo_users, SqlApprovalStore, SqlUserStore,
    };
    use tenderdeck_ingest::{GridSource, IngestError, RefreshCoordinator};

    use super::{approve, list_tenders, stats, ApiState, FilterParams};

    struct FixedGrid;

    #[async_trait]
    impl GridSource for FixedGrid {
        async fn fetch_grid(&self) -> Result<Vec<Vec<String>>, IngestError> {
            Ok(vec![
                vec![
                    "Ref No".to_owned(),
                    "Tender Name".to_owned(),
                    "Client".to_owned(),
                    "Group".to_owned(),
                    "Status".to_owned(),
                ],
                vec![
                    "T-1".to_owned(),
                    "Grid automation".to_owned(),
                    "Utility Co".to_owned(),
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
            ])
        }
    }

    async fn state() -> ApiState {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");

        let sink: Arc<InMemoryAuditSink> = Arc::new(InMemoryAuditSink::default());
        let user_store = SqlUserStore::new(pool.clone());
        seed_demo_users(&user_store).await.expect("seed");

        let coordinator: Arc<RefreshCoordinator<Box<dyn GridSource>>> =
            Arc::new(RefreshCoordinator::new(Box::new(FixedGrid), sink.clone()));
        coordinator.refresh(Utc::now().date_naive()).await.expect("refresh");

        ApiState {
            directory: Arc::new(Directory::new(user_store, sink.clone())),
            engine: Arc::new(ApprovalEngine::new(SqlApprovalStore::new(pool), sink)),
            coordinator,
        }
    }

    fn principal(id: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-principal-id", HeaderValue::from_str(id).unwrap());
        headers
    }

    #[tokio::test]
    async fn tender_listing_reflects_the_installed_snapshot() {
        let state = state().await;
        let (status, axum::Json(body)) =
            list_tenders(State(state), Query(FilterParams::default())).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tenders"].as_array().unwrap().len(), 2);
        assert_eq!(body["generation"], 1);
    }

    #[tokio::test]
    async fn stats_respects_group_filter() {
        let state = state().await;
        let params = FilterParams { group: Some("GES".to_owned()), ..Default::default() };
        let (status, axum::Json(body)) = stats(State(state), Query(params)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["kpi"]["active_tenders"], 1);
    }

    #[tokio::test]
    async fn approve_requires_a_known_principal() {
        let state = state().await;

        let (status, _) = approve(
            State(state.clone()),
            Path("tender-1".to_owned()),
            HeaderMap::new(),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = approve(
            State(state),
            Path("tender-1".to_owned()),
            principal("ghost@nowhere.example"),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn approval_workflow_maps_outcomes_to_http_statuses() {
        let state = state().await;

        // Proposal head wins the first step.
        let (status, axum::Json(body)) = approve(
            State(state.clone()),
            Path("tender-1".to_owned()),
            principal("user-proposal-head"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "applied");

        // Wrong-group SVP is forbidden; tender-1 is classified GES.
        let (status, _) = approve(
            State(state.clone()),
            Path("tender-1".to_owned()),
            principal("user-svp-gds"),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, axum::Json(body)) = approve(
            State(state.clone()),
            Path("tender-1".to_owned()),
            principal("user-svp-ges"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "fully_approved");

        // Unknown opportunity id.
        let (status, _) = approve(
            State(state),
            Path("tender-99".to_owned()),
            principal("user-proposal-head"),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}

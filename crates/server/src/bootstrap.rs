use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use tenderdeck_core::approvals::ApprovalEngine;
use tenderdeck_core::audit::{AuditEvent, AuditSink};
use tenderdeck_core::config::{AppConfig, ConfigError, LoadOptions};
use tenderdeck_core::identity::Directory;
use tenderdeck_db::{connect_with_settings, migrations, DbPool, SqlApprovalStore, SqlUserStore};
use tenderdeck_ingest::{GridSource, IngestError, RefreshCoordinator, SheetsClient};

use crate::api::ApiState;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub state: ApiState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("sheets client construction failed: {0}")]
    Sheets(#[source] IngestError),
}

/// Audit sink that forwards events into the structured log stream.
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        info!(
            event_name = %event.event_type,
            correlation_id = %event.correlation_id,
            actor = %event.actor,
            outcome = ?event.outcome,
            tender_id = event.tender_id.as_ref().map(|id| id.0.as_str()).unwrap_or("unknown"),
            "audit event"
        );
    }
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "system.bootstrap.database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    let audit: Arc<dyn AuditSink> = Arc::new(TracingAuditSink);
    let source: Box<dyn GridSource> =
        Box::new(SheetsClient::new(&config.sheets).map_err(BootstrapError::Sheets)?);

    let state = ApiState {
        directory: Arc::new(Directory::new(SqlUserStore::new(db_pool.clone()), audit.clone())),
        engine: Arc::new(ApprovalEngine::new(
            SqlApprovalStore::new(db_pool.clone()),
            audit.clone(),
        )),
        coordinator: Arc::new(RefreshCoordinator::new(source, audit)),
    };

    Ok(Application { config, db_pool, state })
}

#[cfg(test)]
mod tests {
    use tenderdeck_core::config::{ConfigOverrides, LoadOptions};

    use crate::bootstrap::bootstrap;

    #[tokio::test]
    async fn bootstrap_fails_fast_without_a_spreadsheet_id() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        let message = result.err().expect("error").to_string();
        assert!(message.contains("spreadsheet_id"));
    }

    #[tokio::test]
    async fn bootstrap_applies_migrations_on_a_fresh_database() {
        let app = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:?cache=shared".to_string()),
                spreadsheet_id: Some("sheet-test".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await
        .expect("bootstrap should succeed");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('approval_state', 'approval_log', 'user_account')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("baseline tables should exist");
        assert_eq!(table_count, 3);

        app.db_pool.close().await;
    }
}

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use rollcall_core::clock::{ClockError, OperatingTz};
use rollcall_core::config::{AppConfig, ConfigError, LoadOptions};
use rollcall_core::store::ChatDirectory;
use rollcall_db::{
    connect_with_settings, migrations, DbPool, SqlActionLog, SqlAttendanceStore, SqlChatDirectory,
    SqlScheduleStore,
};
use rollcall_telegram::commands::CommandRouter;

use crate::service::BotService;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub chats: Arc<dyn ChatDirectory>,
    pub router: Arc<CommandRouter<BotService>>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Timezone(#[from] ClockError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
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

    let tz = OperatingTz::from_offset_minutes(config.schedule.utc_offset_minutes)?;

    let attendance = Arc::new(SqlAttendanceStore::new(db_pool.clone()));
    let schedule = Arc::new(SqlScheduleStore::new(db_pool.clone()));
    let actions = Arc::new(SqlActionLog::new(db_pool.clone()));
    let chats: Arc<dyn ChatDirectory> = Arc::new(SqlChatDirectory::new(db_pool.clone()));

    let service = BotService::new(
        attendance,
        schedule,
        actions,
        tz,
        config.telegram.connect_base_url.clone(),
    );

    Ok(Application {
        config,
        db_pool,
        chats,
        router: Arc::new(CommandRouter::new(service)),
    })
}

use std::time::{Duration, Instant};

use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use tracing::{error, info};

use crate::{config::AppConfig, errors::ServiceError, migrator::Migrator};

/// Pool sizing and timeouts
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    pub acquire_timeout: Duration,
}

impl From<&AppConfig> for PoolSettings {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            url: cfg.database_url.clone(),
            max_connections: cfg.db_max_connections,
            min_connections: cfg.db_min_connections.min(cfg.db_max_connections),
            connect_timeout: Duration::from_secs(cfg.db_connect_timeout_secs),
            idle_timeout: Duration::from_secs(cfg.db_idle_timeout_secs),
            acquire_timeout: Duration::from_secs(cfg.db_acquire_timeout_secs),
        }
    }
}

pub async fn connect(settings: &PoolSettings) -> Result<DatabaseConnection, ServiceError> {
    let mut options = ConnectOptions::new(settings.url.clone());
    options
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .connect_timeout(settings.connect_timeout)
        .acquire_timeout(settings.acquire_timeout)
        .idle_timeout(settings.idle_timeout)
        .sqlx_logging(false);

    let pool = Database::connect(options).await.map_err(|e| {
        error!(error = %e, "database connection failed");
        ServiceError::DatabaseError(e)
    })?;
    info!(max_connections = settings.max_connections, "database pool ready");
    Ok(pool)
}

pub async fn establish_connection_from_app_config(
    cfg: &AppConfig,
) -> Result<DatabaseConnection, ServiceError> {
    connect(&PoolSettings::from(cfg)).await
}

/// Apply pending migrations. Already-applied ones are skipped.
pub async fn run_migrations(pool: &DatabaseConnection) -> Result<(), ServiceError> {
    let started = Instant::now();
    match Migrator::up(pool, None).await {
        Ok(()) => {
            info!(elapsed = ?started.elapsed(), "migrations applied");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, elapsed = ?started.elapsed(), "migrations failed");
            Err(ServiceError::DatabaseError(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory() -> PoolSettings {
        PoolSettings {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            acquire_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let pool = connect(&memory()).await.expect("connect");
        assert!(run_migrations(&pool).await.is_ok());
        assert!(run_migrations(&pool).await.is_ok());
        assert!(pool.ping().await.is_ok());
    }
}

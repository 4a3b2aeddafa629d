use crate::config::AppConfig;
use crate::errors::ServiceError;
use metrics::{counter, gauge};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

pub type DbPool = DatabaseConnection;

fn connect_options(cfg: &AppConfig) -> ConnectOptions {
    let mut opt = ConnectOptions::new(cfg.database_url.clone());
    opt.max_connections(cfg.db_max_connections)
        .min_connections(cfg.db_min_connections.min(cfg.db_max_connections))
        .connect_timeout(Duration::from_secs(cfg.db_connect_timeout_secs))
        .acquire_timeout(Duration::from_secs(cfg.db_acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(cfg.db_idle_timeout_secs))
        .sqlx_logging(false);
    opt
}

/// Opens the pool described by the `db_*` settings.
pub async fn establish_connection_from_app_config(cfg: &AppConfig) -> Result<DbPool, ServiceError> {
    gauge!("workshop_db.max_connections", cfg.db_max_connections as f64);
    info!(
        max_connections = cfg.db_max_connections,
        "connecting to workshop database"
    );

    Database::connect(connect_options(cfg)).await.map_err(|e| {
        error!(error = %e, "database connection failed");
        ServiceError::DatabaseError(e)
    })
}

/// Applies every pending migration, audit triggers included.
pub async fn run_migrations(pool: &DbPool) -> Result<(), ServiceError> {
    let started = Instant::now();
    crate::migrator::Migrator::up(pool, None)
        .await
        .map_err(|e| {
            error!(error = %e, "migrations failed");
            ServiceError::DatabaseError(e)
        })?;
    info!(elapsed = ?started.elapsed(), "migrations applied");
    Ok(())
}

pub async fn check_connection(pool: &DbPool) -> Result<(), ServiceError> {
    let started = Instant::now();
    match pool.ping().await {
        Ok(()) => {
            let elapsed = started.elapsed();
            debug!(?elapsed, "database ping ok");
            gauge!("workshop_db.ping_ms", elapsed.as_millis() as f64);
            Ok(())
        }
        Err(e) => {
            counter!("workshop_db.ping_failures", 1);
            error!(error = %e, "database ping failed");
            Err(ServiceError::DatabaseError(e))
        }
    }
}

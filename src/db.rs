use crate::config::AppConfig;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Shared handle to the storefront database
pub type DbPool = DatabaseConnection;

/// Pool sizing and timeouts for the storefront database
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    pub acquire_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            acquire_timeout: Duration::from_secs(8),
        }
    }
}

impl DbConfig {
    /// Every connection to `sqlite::memory:` opens its own empty database
    fn is_in_memory_sqlite(&self) -> bool {
        self.url.starts_with("sqlite::memory:") || self.url.contains("mode=memory")
    }
}

impl From<&AppConfig> for DbConfig {
    fn from(app: &AppConfig) -> Self {
        Self {
            url: app.database_url.clone(),
            max_connections: app.db_max_connections,
            min_connections: app.db_min_connections,
            connect_timeout: Duration::from_secs(app.db_connect_timeout_secs),
            idle_timeout: Duration::from_secs(app.db_idle_timeout_secs),
            acquire_timeout: Duration::from_secs(app.db_acquire_timeout_secs),
        }
    }
}

/// Opens the connection pool described by `config`
pub async fn establish_connection_with_config(config: &DbConfig) -> Result<DbPool, DbErr> {
    let (max, min) = if config.is_in_memory_sqlite() && config.max_connections != 1 {
        warn!(
            requested = config.max_connections,
            "In-memory SQLite needs a single connection; clamping pool size"
        );
        (1, 1)
    } else {
        (config.max_connections, config.min_connections.min(config.max_connections))
    };
    debug!(max_connections = max, min_connections = min, "Opening database pool");

    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(max)
        .min_connections(min)
        .connect_timeout(config.connect_timeout)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .sqlx_logging(false);

    let pool = Database::connect(options).await.map_err(|e| {
        error!(error = %e, "Could not open database pool");
        e
    })?;

    info!(backend = ?pool.get_database_backend(), "Database pool ready");
    Ok(pool)
}

/// Opens the pool using the tuning carried by `AppConfig`
pub async fn establish_connection_from_app_config(app: &AppConfig) -> Result<DbPool, DbErr> {
    establish_connection_with_config(&DbConfig::from(app)).await
}

/// Applies every pending schema migration
pub async fn run_migrations(pool: &DbPool) -> Result<(), DbErr> {
    let started = Instant::now();
    let result = crate::migrator::Migrator::up(pool, None).await;

    match &result {
        Ok(()) => info!(elapsed = ?started.elapsed(), "Schema migrations applied"),
        Err(e) => error!(elapsed = ?started.elapsed(), error = %e, "Schema migrations failed"),
    }
    result
}

/// Round-trips a ping to the database
pub async fn check_connection(pool: &DbPool) -> Result<(), DbErr> {
    pool.ping().await
}

//! Database connection pool management
//!
//! Provides unified database pool creation and configuration for the service

mod metrics;

use metrics::update_pool_metrics;
pub use metrics::{
    acquire_with_backpressure, acquire_with_metrics, BackpressureConfig, PoolExhaustedError,
};

use deadpool::managed::TimeoutType;
use deadpool_postgres::tokio_postgres::{Config as PgConfig, NoTls};
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
pub use deadpool_postgres::PoolError;
use std::time::Duration;
use tracing::{debug, error, info};

/// Database connection pool configuration
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Service name for metrics labeling
    pub service_name: String,
    /// PostgreSQL connection URL
    pub database_url: String,
    /// Maximum number of connections
    pub max_connections: u32,
    /// Minimum number of connections
    pub min_connections: u32,
    /// Connection creation timeout (new connection to PostgreSQL)
    pub connect_timeout_secs: u64,
    /// Connection acquisition timeout (get connection from pool)
    pub acquire_timeout_secs: u64,
    /// Connection idle timeout
    pub idle_timeout_secs: u64,
    /// Connection maximum lifetime
    pub max_lifetime_secs: u64,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            service_name: String::from("unknown"),
            database_url: String::new(),
            max_connections: 20,
            min_connections: 5,
            connect_timeout_secs: 5,
            acquire_timeout_secs: 10,
            idle_timeout_secs: 600,
            max_lifetime_secs: 1800,
        }
    }
}

impl DbConfig {
    /// Create a new DbConfig from environment variables
    pub fn from_env(service_name: &str) -> Result<Self, String> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| "DATABASE_URL environment variable not set".to_string())?;

        Ok(Self {
            service_name: service_name.to_string(),
            database_url,
            max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(20),
            min_connections: std::env::var("DB_MIN_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            connect_timeout_secs: std::env::var("DB_CONNECT_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            acquire_timeout_secs: std::env::var("DB_ACQUIRE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            idle_timeout_secs: std::env::var("DB_IDLE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(600),
            max_lifetime_secs: std::env::var("DB_MAX_LIFETIME_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1800),
        })
    }

    /// Log pool configuration details
    pub fn log_config(&self) {
        info!(
            "Database Pool Configuration: \
             max_connections={}, min_connections={}, \
             connect_timeout={}s, acquire_timeout={}s, idle_timeout={}s, max_lifetime={}s",
            self.max_connections,
            self.min_connections,
            self.connect_timeout_secs,
            self.acquire_timeout_secs,
            self.idle_timeout_secs,
            self.max_lifetime_secs
        );
    }
}

pub type PgPool = Pool;

/// Build a deadpool-postgres pool, verify it, and start the metrics updater
pub async fn create_pool(config: DbConfig) -> Result<PgPool, PoolError> {
    debug!(
        "Creating database pool: service={}, max={}, min={}, \
         acquire_timeout={}s, verify_timeout={}s, idle_timeout={}s",
        config.service_name,
        config.max_connections,
        config.min_connections,
        config.acquire_timeout_secs,
        config.connect_timeout_secs,
        config.idle_timeout_secs
    );

    let pg_config: PgConfig = config
        .database_url
        .parse()
        .map_err(|e: tokio_postgres::Error| PoolError::Backend(e))?;

    let mgr_config = ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    };
    let mgr = Manager::from_config(pg_config, NoTls, mgr_config);
    let pool = Pool::builder(mgr)
        .max_size(config.max_connections as usize)
        .build()
        .unwrap();

    // Verify connection with connect timeout
    match tokio::time::timeout(Duration::from_secs(config.connect_timeout_secs), async {
        let client = pool.get().await.map_err(|e| match e {
            deadpool::managed::PoolError::Backend(e) => PoolError::Backend(e),
            deadpool::managed::PoolError::Timeout(t) => PoolError::Timeout(t),
            _ => PoolError::Timeout(TimeoutType::Wait),
        })?;
        client
            .simple_query("SELECT 1")
            .await
            .map_err(PoolError::Backend)?;
        Ok::<(), PoolError>(())
    })
    .await
    {
        Ok(Ok(())) => {
            info!(
                service = %config.service_name,
                "Database pool created and verified successfully"
            );

            update_pool_metrics(&pool, &config.service_name);

            // Background metrics updater
            {
                let pool_clone = pool.clone();
                let service = config.service_name.clone();
                tokio::spawn(async move {
                    let mut interval = tokio::time::interval(Duration::from_secs(30));
                    loop {
                        interval.tick().await;
                        update_pool_metrics(&pool_clone, &service);
                    }
                });
            }

            Ok(pool)
        }
        Ok(Err(e)) => {
            error!(
                service = %config.service_name,
                error = %e,
                "Database connection verification failed"
            );
            Err(e)
        }
        Err(_) => {
            error!(
                service = %config.service_name,
                timeout_secs = config.connect_timeout_secs,
                "Database connection verification timeout"
            );
            Err(PoolError::Timeout(TimeoutType::Wait))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        std::env::remove_var("DB_MAX_CONNECTIONS");
        std::env::remove_var("DB_MIN_CONNECTIONS");
        std::env::remove_var("DB_CONNECT_TIMEOUT_SECS");
        std::env::remove_var("DB_ACQUIRE_TIMEOUT_SECS");

        let config = DbConfig::default();
        assert_eq!(config.max_connections, 20);
        assert_eq!(config.min_connections, 5);
        assert_eq!(config.connect_timeout_secs, 5);
        assert_eq!(config.acquire_timeout_secs, 10);
    }

    #[test]
    #[serial_test::serial]
    fn test_config_from_env_without_override() {
        std::env::remove_var("DB_MAX_CONNECTIONS");
        std::env::remove_var("DB_MIN_CONNECTIONS");
        std::env::remove_var("DB_CONNECT_TIMEOUT_SECS");
        std::env::remove_var("DB_ACQUIRE_TIMEOUT_SECS");
        std::env::remove_var("DB_IDLE_TIMEOUT_SECS");
        std::env::remove_var("DB_MAX_LIFETIME_SECS");

        std::env::set_var("DATABASE_URL", "postgres://localhost/test");
        let config = DbConfig::from_env("test-service").unwrap();

        assert_eq!(config.service_name, "test-service");
        assert_eq!(config.max_connections, 20);
        assert_eq!(config.min_connections, 5);
        assert_eq!(config.connect_timeout_secs, 5);
        assert_eq!(config.acquire_timeout_secs, 10);

        std::env::remove_var("DATABASE_URL");
    }

    #[test]
    #[serial_test::serial]
    fn test_config_env_override() {
        std::env::set_var("DATABASE_URL", "postgres://localhost/test");
        std::env::set_var("DB_MAX_CONNECTIONS", "40");

        let config = DbConfig::from_env("chat-relay-service").unwrap();
        assert_eq!(config.max_connections, 40);

        std::env::remove_var("DB_MAX_CONNECTIONS");
        std::env::remove_var("DATABASE_URL");
    }

    #[test]
    fn test_backpressure_config_default() {
        let config = BackpressureConfig::default();
        assert_eq!(config.threshold, 0.85);
    }

    #[test]
    #[serial_test::serial]
    fn test_backpressure_config_from_env() {
        std::env::remove_var("DB_POOL_BACKPRESSURE_THRESHOLD");
        let config = BackpressureConfig::from_env();
        assert_eq!(config.threshold, 0.85);

        std::env::set_var("DB_POOL_BACKPRESSURE_THRESHOLD", "0.90");
        let config = BackpressureConfig::from_env();
        assert_eq!(config.threshold, 0.90);

        // Out-of-range and unparseable values fall back to the default
        std::env::set_var("DB_POOL_BACKPRESSURE_THRESHOLD", "1.5");
        let config = BackpressureConfig::from_env();
        assert_eq!(config.threshold, 0.85);

        std::env::set_var("DB_POOL_BACKPRESSURE_THRESHOLD", "invalid");
        let config = BackpressureConfig::from_env();
        assert_eq!(config.threshold, 0.85);

        std::env::remove_var("DB_POOL_BACKPRESSURE_THRESHOLD");
    }

    #[test]
    fn test_pool_exhausted_error_display() {
        let error = PoolExhaustedError {
            service: "test-service".to_string(),
            utilization: 0.92,
            threshold: 0.85,
        };

        let msg = error.to_string();
        assert!(msg.contains("test-service"));
        assert!(msg.contains("92.00%"));
        assert!(msg.contains("85.00%"));
    }
}

use dotenvy::dotenv;
use std::env;

#[derive(Debug, Clone)]
pub struct RedisSentinelConfig {
    pub endpoints: Vec<String>,
    pub master_name: String,
    pub poll_interval_ms: u64,
}

/// Kafka producer settings for notification events. Absent when
/// KAFKA_BROKERS is not configured; the service then skips event publishing.
#[derive(Debug, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
    pub notification_topic: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub redis_sentinel: Option<RedisSentinelConfig>,
    pub port: u16,
    pub jwt_secret: String,
    pub kafka: Option<KafkaConfig>,
    /// Grace window before a disconnect becomes an offline broadcast
    pub presence_grace_ms: u64,
    /// Typing indicator self-expiry when no explicit stop arrives
    pub typing_ttl_ms: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, crate::error::AppError> {
        dotenv().ok();
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| crate::error::AppError::Config("DATABASE_URL missing".into()))?;
        let redis_url = env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into());
        let port = env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3000);

        // Redis Sentinel configuration
        let redis_sentinel = if let Ok(endpoints_str) = env::var("REDIS_SENTINEL_ENDPOINTS") {
            let endpoints = endpoints_str
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>();

            if !endpoints.is_empty() {
                let master_name = env::var("REDIS_SENTINEL_MASTER_NAME")
                    .unwrap_or_else(|_| "mymaster".to_string());
                let poll_interval_ms = env::var("REDIS_SENTINEL_POLL_INTERVAL_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5000);

                Some(RedisSentinelConfig {
                    endpoints,
                    master_name,
                    poll_interval_ms,
                })
            } else {
                None
            }
        } else {
            None
        };

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| crate::error::AppError::Config("JWT_SECRET missing".into()))?;
        if jwt_secret.len() < 32 {
            return Err(crate::error::AppError::Config(
                "JWT_SECRET must be at least 32 bytes".into(),
            ));
        }

        // Kafka is optional; without brokers the notification producer is disabled
        let kafka = env::var("KAFKA_BROKERS").ok().map(|brokers| KafkaConfig {
            brokers,
            notification_topic: env::var("KAFKA_NOTIFICATION_TOPIC")
                .unwrap_or_else(|_| "notifications".to_string()),
        });

        let presence_grace_ms = env::var("PRESENCE_GRACE_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5000);

        let typing_ttl_ms = env::var("TYPING_TTL_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3000);

        Ok(Self {
            database_url,
            redis_url,
            redis_sentinel,
            port,
            jwt_secret,
            kafka,
            presence_grace_ms,
            typing_ttl_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_env() {
        env::set_var("DATABASE_URL", "postgres://localhost/test");
        env::set_var("JWT_SECRET", "test-secret-key-min-32-chars-long!!!");
        env::remove_var("REDIS_URL");
        env::remove_var("REDIS_SENTINEL_ENDPOINTS");
        env::remove_var("KAFKA_BROKERS");
        env::remove_var("PORT");
        env::remove_var("PRESENCE_GRACE_MS");
        env::remove_var("TYPING_TTL_MS");
    }

    #[test]
    #[serial_test::serial]
    fn test_from_env_defaults() {
        base_env();

        let cfg = Config::from_env().unwrap();
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.redis_url, "redis://127.0.0.1:6379");
        assert!(cfg.redis_sentinel.is_none());
        assert!(cfg.kafka.is_none());
        assert_eq!(cfg.presence_grace_ms, 5000);
        assert_eq!(cfg.typing_ttl_ms, 3000);
    }

    #[test]
    #[serial_test::serial]
    fn test_short_jwt_secret_rejected() {
        base_env();
        env::set_var("JWT_SECRET", "too-short");

        assert!(Config::from_env().is_err());

        env::set_var("JWT_SECRET", "test-secret-key-min-32-chars-long!!!");
    }

    #[test]
    #[serial_test::serial]
    fn test_sentinel_endpoints_parsed() {
        base_env();
        env::set_var(
            "REDIS_SENTINEL_ENDPOINTS",
            "10.0.0.1:26379, 10.0.0.2:26379,",
        );

        let cfg = Config::from_env().unwrap();
        let sentinel = cfg.redis_sentinel.unwrap();
        assert_eq!(sentinel.endpoints.len(), 2);
        assert_eq!(sentinel.master_name, "mymaster");
        assert_eq!(sentinel.poll_interval_ms, 5000);

        env::remove_var("REDIS_SENTINEL_ENDPOINTS");
    }
}

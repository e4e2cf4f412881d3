//! Shared Redis connection management
//!
//! Wraps a `redis::aio::ConnectionManager` behind an `Arc<Mutex<_>>` so the
//! active connection can be swapped when a Sentinel failover promotes a new
//! master. Without Sentinel the manager reconnects on its own.

use anyhow::{anyhow, Context, Result};
use redis::aio::ConnectionManager;
use redis::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

pub type SharedConnectionManager = Arc<Mutex<ConnectionManager>>;

/// Redis Sentinel configuration for master discovery
#[derive(Debug, Clone)]
pub struct SentinelConfig {
    pub endpoints: Vec<String>,
    pub master_name: String,
    pub poll_interval: Duration,
}

impl SentinelConfig {
    pub fn new(endpoints: Vec<String>, master_name: String, poll_interval: Duration) -> Self {
        Self {
            endpoints,
            master_name,
            poll_interval,
        }
    }
}

/// Connection pool handle shared across the service
#[derive(Clone)]
pub struct RedisPool {
    manager: SharedConnectionManager,
}

impl RedisPool {
    /// Connect to Redis, optionally resolving the master through Sentinel.
    ///
    /// With a Sentinel config a background task polls for master changes and
    /// swaps the shared connection when a failover is observed.
    pub async fn connect(url: &str, sentinel: Option<SentinelConfig>) -> Result<Self> {
        let initial_url = match &sentinel {
            Some(cfg) => resolve_master_url(cfg)
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "sentinel resolution failed, using configured URL");
                    url.to_string()
                }),
            None => url.to_string(),
        };

        let manager = open_manager(&initial_url).await?;
        let manager: SharedConnectionManager = Arc::new(Mutex::new(manager));

        if let Some(cfg) = sentinel {
            let shared = manager.clone();
            let mut current_url = initial_url;
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(cfg.poll_interval);
                loop {
                    interval.tick().await;
                    match resolve_master_url(&cfg).await {
                        Ok(master_url) if master_url != current_url => {
                            tracing::info!(
                                master = %cfg.master_name,
                                url = %master_url,
                                "sentinel reported new master, reconnecting"
                            );
                            match open_manager(&master_url).await {
                                Ok(new_manager) => {
                                    *shared.lock().await = new_manager;
                                    current_url = master_url;
                                }
                                Err(e) => {
                                    tracing::error!(error = %e, "failed to connect to new master");
                                }
                            }
                        }
                        Ok(_) => {}
                        Err(e) => {
                            tracing::warn!(error = %e, "sentinel master poll failed");
                        }
                    }
                }
            });
        }

        Ok(Self { manager })
    }

    pub fn manager(&self) -> SharedConnectionManager {
        self.manager.clone()
    }
}

async fn open_manager(url: &str) -> Result<ConnectionManager> {
    let client = Client::open(url).with_context(|| format!("invalid redis url: {url}"))?;
    ConnectionManager::new(client)
        .await
        .context("redis connection failed")
}

/// Ask each Sentinel endpoint in turn for the current master address.
async fn resolve_master_url(cfg: &SentinelConfig) -> Result<String> {
    for endpoint in &cfg.endpoints {
        let url = if endpoint.starts_with("redis://") {
            endpoint.clone()
        } else {
            format!("redis://{endpoint}")
        };

        let client = match Client::open(url.as_str()) {
            Ok(c) => c,
            Err(e) => {
                tracing::debug!(endpoint = %endpoint, error = %e, "skipping invalid sentinel endpoint");
                continue;
            }
        };

        let mut conn = match client.get_multiplexed_async_connection().await {
            Ok(c) => c,
            Err(e) => {
                tracing::debug!(endpoint = %endpoint, error = %e, "sentinel endpoint unreachable");
                continue;
            }
        };

        let addr: Result<Vec<String>, redis::RedisError> = redis::cmd("SENTINEL")
            .arg("get-master-addr-by-name")
            .arg(&cfg.master_name)
            .query_async(&mut conn)
            .await;

        match addr {
            Ok(parts) if parts.len() == 2 => {
                return Ok(format!("redis://{}:{}", parts[0], parts[1]));
            }
            Ok(_) => {
                tracing::debug!(endpoint = %endpoint, "sentinel returned unexpected reply shape");
            }
            Err(e) => {
                tracing::debug!(endpoint = %endpoint, error = %e, "sentinel query failed");
            }
        }
    }

    Err(anyhow!(
        "no sentinel endpoint could resolve master '{}'",
        cfg.master_name
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_config_new() {
        let cfg = SentinelConfig::new(
            vec!["10.0.0.1:26379".into(), "10.0.0.2:26379".into()],
            "mymaster".into(),
            Duration::from_millis(5000),
        );
        assert_eq!(cfg.endpoints.len(), 2);
        assert_eq!(cfg.master_name, "mymaster");
        assert_eq!(cfg.poll_interval, Duration::from_millis(5000));
    }

    #[tokio::test]
    async fn test_resolve_master_url_no_endpoints() {
        let cfg = SentinelConfig::new(vec![], "mymaster".into(), Duration::from_secs(5));
        let err = resolve_master_url(&cfg).await.unwrap_err();
        assert!(err.to_string().contains("mymaster"));
    }
}

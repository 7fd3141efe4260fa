//! Relay orchestrator - wires config, store, dispatcher and consumer.
//!
//! Talks to Redis when the `real-redis` feature is enabled; otherwise, and
//! for `--dry-run`, everything goes to the in-memory mock store.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use contracts::{RelayBlueprint, StorePool};
use dispatcher::{from_routes, Dispatcher, DispatcherConfig};
use ingestion::{Consumer, NdjsonSource};
use store_client::MockStore;
use tokio::sync::watch;
use tracing::{info, warn};

use super::PipelineStats;
use crate::error::CliError;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Validated relay configuration (CLI overrides applied)
    pub blueprint: RelayBlueprint,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,

    /// Use the in-memory store even when Redis support is compiled in
    pub dry_run: bool,
}

/// Main relay orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run until the source is exhausted or `shutdown` fires
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<PipelineStats> {
        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        if self.config.dry_run {
            return self.run_mock(shutdown).await;
        }

        #[cfg(feature = "real-redis")]
        return self.run_real(shutdown).await;

        #[cfg(not(feature = "real-redis"))]
        return self.run_mock(shutdown).await;
    }

    /// Run against a real Redis server
    #[cfg(feature = "real-redis")]
    async fn run_real(self, shutdown: watch::Receiver<bool>) -> Result<PipelineStats> {
        use store_client::RedisPool;

        let store = &self.config.blueprint.store;
        info!(url = %store.url, "Connecting to Redis...");

        let pool = RedisPool::connect(store)
            .await
            .map_err(|e| CliError::store_connection(&store.url, e.to_string()))?;

        info!("Connected to Redis");
        self.run_with_pool(pool, "redis", shutdown).await
    }

    /// Run against the in-memory store
    async fn run_mock(self, shutdown: watch::Receiver<bool>) -> Result<PipelineStats> {
        info!("Running in MOCK mode (no Redis server required)");
        let store = MockStore::new();

        let mut stats = self.run_with_pool(store.clone(), "mock", shutdown).await?;
        stats.mock_commands = Some(store.commands().len());

        for command in store.commands() {
            info!(command = %command, "mock store received");
        }

        Ok(stats)
    }

    /// Common relay logic shared between real and mock modes
    async fn run_with_pool<P>(
        self,
        pool: P,
        mode: &'static str,
        shutdown: watch::Receiver<bool>,
    ) -> Result<PipelineStats>
    where
        P: StorePool + 'static,
    {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        // Dispatcher + handlers
        let mut dispatcher = Dispatcher::new(pool, DispatcherConfig::from(blueprint))
            .await
            .context("Failed to create dispatcher")?;

        if blueprint.routes.is_empty() {
            warn!("No routes configured - messages will be acked and dropped");
        }
        for handler in from_routes(&blueprint.routes).context("Failed to build routes")? {
            dispatcher.register(handler);
        }

        info!(
            routes = ?dispatcher.handler_names(),
            policy = ?dispatcher.policy(),
            rate_limited = blueprint.rate_limit.is_some(),
            "Dispatcher configured"
        );

        let dispatcher = Arc::new(dispatcher);

        // Consumer + source
        let consumer =
            Consumer::new(blueprint.consumer.clone()).context("Invalid consumer configuration")?;
        let source = NdjsonSource::from_config(&blueprint.source)
            .await
            .context("Failed to open message source")?;

        info!(source = ?blueprint.source.kind, mode, "Relay running");

        let consumed = consumer.run(source, Arc::clone(&dispatcher), shutdown).await;

        // Stop after the consumer has drained so the final flush sees everything.
        info!("Stopping dispatcher...");
        let stopped = dispatcher.stop().await;

        let consumer_stats = consumed.map_err(|e| CliError::relay(e.to_string()))?;
        stopped.map_err(|e| CliError::shutdown(e.to_string()))?;

        let stats = PipelineStats {
            mode,
            duration: start_time.elapsed(),
            routes: dispatcher.handler_names().len(),
            consumer: consumer_stats,
            dispatch: dispatcher.metrics(),
            mock_commands: None,
        };

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            rate = format!("{:.2}", stats.rate()),
            "Relay shutdown complete"
        );

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{
        ConfigVersion, ConsumerConfig, DispatchConfig, RouteConfig, RouteKind, SourceConfig,
        SourceKind, StoreConfig,
    };
    use std::io::Write;

    fn blueprint(input: &std::path::Path, flush_interval_ms: i64) -> RelayBlueprint {
        RelayBlueprint {
            version: ConfigVersion::V1,
            store: StoreConfig::default(),
            consumer: ConsumerConfig {
                concurrency: 2,
                max_attempts: 1,
                requeue_delay_ms: 1,
                queue_capacity: 8,
            },
            source: SourceConfig {
                kind: SourceKind::File,
                path: Some(input.to_path_buf()),
            },
            dispatch: DispatchConfig { flush_interval_ms },
            rate_limit: None,
            routes: vec![RouteConfig {
                name: "history".into(),
                kind: RouteKind::List,
                format: "h:{projectId}".into(),
                size: Some(10),
            }],
        }
    }

    #[tokio::test]
    async fn test_dry_run_relays_file_into_mock_store() {
        let mut input = tempfile::NamedTempFile::new().unwrap();
        writeln!(input, "{{\"projectId\":\"a\"}}").unwrap();
        writeln!(input, "not json").unwrap();
        writeln!(input, "{{\"projectId\":\"b\"}}").unwrap();

        for flush_interval_ms in [0, 50] {
            let pipeline = Pipeline::new(PipelineConfig {
                blueprint: blueprint(input.path(), flush_interval_ms),
                metrics_port: None,
                dry_run: true,
            });
            let (_tx, rx) = watch::channel(false);

            let stats = pipeline.run(rx).await.unwrap();

            assert_eq!(stats.consumer.received, 3);
            assert_eq!(stats.consumer.acked, 3);
            assert_eq!(stats.dispatch.dispatched, 2);
            assert_eq!(stats.dispatch.malformed, 1);
            // LPUSH + LTRIM per relayed message
            assert_eq!(stats.mock_commands, Some(4));
        }
    }
}

//! Consumer - at-least-once delivery loop
//!
//! One reader drains the `MessageSource` into a bounded channel; a fixed
//! number of workers pull from it and call the `DeliveryHandler`. A handler
//! error requeues the delivery until `max_attempts` is reached.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_channel::{bounded, Receiver};
use contracts::{ConsumerConfig, Delivery, DeliveryHandler, MessageSource};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{ConsumerMetrics, ConsumerStats};
use crate::error::{IngestionError, Result};

/// Worker pool in front of a `DeliveryHandler`
#[derive(Debug)]
pub struct Consumer {
    config: ConsumerConfig,
    metrics: Arc<ConsumerMetrics>,
}

impl Consumer {
    /// Create a consumer
    ///
    /// # Errors
    /// Zero concurrency, attempts or queue capacity.
    pub fn new(config: ConsumerConfig) -> Result<Self> {
        if config.concurrency == 0 {
            return Err(IngestionError::invalid_config("concurrency", "must be > 0"));
        }
        if config.max_attempts == 0 {
            return Err(IngestionError::invalid_config("max_attempts", "must be > 0"));
        }
        if config.queue_capacity == 0 {
            return Err(IngestionError::invalid_config("queue_capacity", "must be > 0"));
        }

        Ok(Self {
            config,
            metrics: Arc::new(ConsumerMetrics::new()),
        })
    }

    /// Get metrics reference
    pub fn metrics(&self) -> Arc<ConsumerMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Consume until the source is exhausted or `shutdown` turns true
    ///
    /// Deliveries already queued are still handled after shutdown; the call
    /// returns once every worker has drained.
    #[instrument(
        name = "consumer_run",
        skip_all,
        fields(source = source.name(), concurrency = self.config.concurrency)
    )]
    pub async fn run<S, H>(
        &self,
        mut source: S,
        handler: Arc<H>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<ConsumerStats>
    where
        S: MessageSource,
        H: DeliveryHandler + Sync + 'static,
    {
        let (tx, rx) = bounded::<Delivery>(self.config.queue_capacity);

        let mut workers = JoinSet::new();
        for worker_id in 0..self.config.concurrency {
            workers.spawn(worker(
                worker_id,
                rx.clone(),
                Arc::clone(&handler),
                self.config.clone(),
                Arc::clone(&self.metrics),
            ));
        }
        drop(rx);

        info!(workers = self.config.concurrency, "Consumer started");

        let mut source_error = None;
        let stop = wait_for_shutdown(&mut shutdown);
        tokio::pin!(stop);

        loop {
            tokio::select! {
                biased;
                _ = &mut stop => {
                    info!("shutdown requested, no longer reading");
                    break;
                }
                next = source.next() => match next {
                    Ok(Some(delivery)) => {
                        self.metrics.record_received();
                        if tx.send(delivery).await.is_err() {
                            warn!("all workers gone, stop reading");
                            break;
                        }
                    }
                    Ok(None) => {
                        info!("source exhausted");
                        break;
                    }
                    Err(e) => {
                        error!(error = %e, "source read failed");
                        self.metrics.record_source_error();
                        source_error = Some(IngestionError::Source {
                            source_name: source.name().to_string(),
                            source: e,
                        });
                        break;
                    }
                },
            }
        }

        // Closing the channel lets workers exit once it is empty.
        drop(tx);
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "worker panicked");
                source_error.get_or_insert(IngestionError::Worker(e.to_string()));
            }
        }

        let stats = self.metrics.snapshot();
        info!(
            received = stats.received,
            acked = stats.acked,
            exhausted = stats.exhausted,
            "Consumer stopped"
        );

        match source_error {
            Some(e) => Err(e),
            None => Ok(stats),
        }
    }
}

async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            // Sender dropped without signalling: never shut down from here.
            std::future::pending::<()>().await;
        }
    }
}

async fn worker<H>(
    worker_id: usize,
    rx: Receiver<Delivery>,
    handler: Arc<H>,
    config: ConsumerConfig,
    metrics: Arc<ConsumerMetrics>,
) where
    H: DeliveryHandler + Sync,
{
    let requeue_delay = Duration::from_millis(config.requeue_delay_ms);

    while let Ok(delivery) = rx.recv().await {
        handle_with_retry(
            handler.as_ref(),
            delivery,
            config.max_attempts,
            requeue_delay,
            &metrics,
        )
        .await;
    }

    debug!(worker_id, "worker exiting");
}

async fn handle_with_retry<H>(
    handler: &H,
    mut delivery: Delivery,
    max_attempts: u16,
    requeue_delay: Duration,
    metrics: &ConsumerMetrics,
) where
    H: DeliveryHandler + Sync,
{
    loop {
        let started = Instant::now();
        let result = handler.handle_delivery(&delivery).await;
        metrics.record_latency_ms(started.elapsed().as_secs_f64() * 1000.0);

        match result {
            Ok(()) => {
                metrics.record_acked();
                observability::record_delivery("acked");
                return;
            }
            Err(e) if delivery.attempts >= max_attempts => {
                error!(
                    message_id = %delivery.id,
                    attempts = delivery.attempts,
                    error = %e,
                    "giving up on message"
                );
                metrics.record_exhausted();
                observability::record_delivery("exhausted");
                return;
            }
            Err(e) => {
                warn!(
                    message_id = %delivery.id,
                    attempts = delivery.attempts,
                    error = %e,
                    "requeue"
                );
                metrics.record_requeued();
                observability::record_delivery("requeued");
                delivery.attempts += 1;
                tokio::time::sleep(requeue_delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSource;
    use contracts::ContractError;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;

    /// Fails the first `failures` attempts of every message
    #[derive(Default)]
    struct Flaky {
        failures: u16,
        calls: AtomicU64,
        seen: Mutex<Vec<(String, u16)>>,
    }

    impl DeliveryHandler for Flaky {
        async fn handle_delivery(&self, delivery: &Delivery) -> std::result::Result<(), ContractError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen
                .lock()
                .unwrap()
                .push((delivery.id.to_string(), delivery.attempts));
            if delivery.attempts <= self.failures {
                return Err(ContractError::Other("induced".into()));
            }
            Ok(())
        }
    }

    fn config(concurrency: usize, max_attempts: u16) -> ConsumerConfig {
        ConsumerConfig {
            concurrency,
            max_attempts,
            requeue_delay_ms: 1,
            queue_capacity: 4,
        }
    }

    fn no_shutdown() -> watch::Receiver<bool> {
        watch::channel(false).1
    }

    #[test]
    fn test_invalid_config() {
        assert!(Consumer::new(config(0, 1)).is_err());
        assert!(Consumer::new(config(1, 0)).is_err());
    }

    #[tokio::test]
    async fn test_all_deliveries_acked() {
        let consumer = Consumer::new(config(3, 5)).unwrap();
        let handler = Arc::new(Flaky::default());
        let source = MockSource::from_bodies("mock", (0..10).map(|n| format!("{{\"n\":{n}}}")));

        let stats = consumer.run(source, handler.clone(), no_shutdown()).await.unwrap();

        assert_eq!(stats.received, 10);
        assert_eq!(stats.acked, 10);
        assert_eq!(stats.requeued, 0);
        assert_eq!(stats.in_flight(), 0);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_errors_requeue_then_ack() {
        let consumer = Consumer::new(config(1, 5)).unwrap();
        let handler = Arc::new(Flaky {
            failures: 2,
            ..Default::default()
        });
        let source = MockSource::from_bodies("mock", ["{}"]);

        let stats = consumer.run(source, handler.clone(), no_shutdown()).await.unwrap();

        assert_eq!(stats.acked, 1);
        assert_eq!(stats.requeued, 2);
        let attempts: Vec<u16> = handler.seen.lock().unwrap().iter().map(|(_, a)| *a).collect();
        assert_eq!(attempts, [1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let consumer = Consumer::new(config(2, 3)).unwrap();
        let handler = Arc::new(Flaky {
            failures: u16::MAX,
            ..Default::default()
        });
        let source = MockSource::from_bodies("mock", ["{}", "{}"]);

        let stats = consumer.run(source, handler.clone(), no_shutdown()).await.unwrap();

        assert_eq!(stats.exhausted, 2);
        assert_eq!(stats.acked, 0);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_shutdown_stops_endless_source() {
        let consumer = Consumer::new(config(2, 1)).unwrap();
        let handler = Arc::new(Flaky::default());
        let source = MockSource::from_bodies("mock", ["{}", "{}", "{}"]).endless();
        let (tx, rx) = watch::channel(false);

        let run = consumer.run(source, handler, rx);
        tokio::pin!(run);

        // Let the three deliveries drain, then signal.
        tokio::select! {
            _ = &mut run => panic!("endless source returned early"),
            _ = tokio::time::sleep(Duration::from_millis(50)) => {}
        }
        tx.send(true).unwrap();

        let stats = run.await.unwrap();
        assert_eq!(stats.received, 3);
        assert_eq!(stats.acked, 3);
    }

    #[tokio::test]
    async fn test_source_error_is_returned_after_drain() {
        let consumer = Consumer::new(config(1, 1)).unwrap();
        let handler = Arc::new(Flaky::default());
        let source = MockSource::from_bodies("broken", ["{}"]).fail_at_end();

        let err = consumer.run(source, handler, no_shutdown()).await.unwrap_err();
        assert!(matches!(err, IngestionError::Source { ref source_name, .. } if source_name == "broken"));
        assert_eq!(consumer.metrics().snapshot().acked, 1);
    }
}

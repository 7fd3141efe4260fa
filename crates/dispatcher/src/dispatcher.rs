//! Dispatcher - fans one message out to the ordered handlers

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

use contracts::{
    Command, ContractError, Delivery, DeliveryHandler, Handler, Message, RateLimitConfig,
    RelayBlueprint, StoreConnection, StorePool,
};
use ratelimit::RateLimiter;

use crate::conn::PipelinedConn;
use crate::error::DispatcherError;
use crate::metrics::{DispatchMetrics, MetricsSnapshot};

/// Dispatcher configuration
#[derive(Debug, Clone, Default)]
pub struct DispatcherConfig {
    /// 0 = flush per message, > 0 = batched every N ms, < 0 = invalid
    pub flush_interval_ms: i64,
    /// Optional per-key rate limit
    pub rate_limit: Option<RateLimitConfig>,
}

impl From<&RelayBlueprint> for DispatcherConfig {
    fn from(blueprint: &RelayBlueprint) -> Self {
        Self {
            flush_interval_ms: blueprint.dispatch.flush_interval_ms,
            rate_limit: blueprint.rate_limit.clone(),
        }
    }
}

/// When buffered commands reach the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushPolicy {
    /// Fresh connection per message, flushed before `dispatch` returns
    PerMessage,
    /// One shared connection, flushed by a background timer and on stop
    Batched(Duration),
}

impl FlushPolicy {
    /// Validate a flush interval in milliseconds
    pub fn from_interval_ms(ms: i64) -> Result<Self, DispatcherError> {
        match ms {
            0 => Ok(Self::PerMessage),
            ms if ms > 0 => Ok(Self::Batched(Duration::from_millis(ms as u64))),
            ms => Err(DispatcherError::InvalidFlushInterval(ms)),
        }
    }
}

/// Dispatcher lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DispatcherState {
    Created = 0,
    Running = 1,
    Stopping = 2,
    Stopped = 3,
}

impl DispatcherState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Created,
            1 => Self::Running,
            2 => Self::Stopping,
            _ => Self::Stopped,
        }
    }
}

struct Limiter {
    limiter: RateLimiter,
    key: String,
}

struct Flusher {
    stop_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// Shared connection plus the route writes it carries until the next flush
struct Batch<C> {
    conn: PipelinedConn<C>,
    routed: HashMap<String, u64>,
}

impl<C: StoreConnection> Batch<C> {
    fn new(conn: C) -> Self {
        Self {
            conn: PipelinedConn::new(conn),
            routed: HashMap::new(),
        }
    }

    fn count_routes<'a>(&mut self, routes: impl IntoIterator<Item = &'a str>) {
        for route in routes {
            match self.routed.get_mut(route) {
                Some(n) => *n += 1,
                None => {
                    self.routed.insert(route.to_string(), 1);
                }
            }
        }
    }
}

type SharedBatch<C> = Arc<Mutex<Batch<C>>>;

/// Fans each message out to the registered handlers
///
/// Safe to share across workers (`Arc<Dispatcher<_>>`) once every handler
/// has been registered.
pub struct Dispatcher<P: StorePool> {
    pool: P,
    handlers: Vec<Box<dyn Handler>>,
    policy: FlushPolicy,
    limiter: Option<Limiter>,
    shared: Option<SharedBatch<P::Conn>>,
    flusher: StdMutex<Option<Flusher>>,
    state: AtomicU8,
    metrics: Arc<DispatchMetrics>,
}

impl<P: StorePool> std::fmt::Debug for Dispatcher<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("handlers", &self.handler_names())
            .field("policy", &self.policy)
            .field("state", &self.state())
            .finish()
    }
}

impl<P: StorePool> Dispatcher<P> {
    /// Create a dispatcher
    ///
    /// Fails on a negative flush interval or invalid rate limit. In batched
    /// mode the shared connection is acquired and the flush timer started
    /// before this returns.
    #[instrument(name = "dispatcher_new", skip(pool, config), fields(flush_interval_ms = config.flush_interval_ms))]
    pub async fn new(pool: P, config: DispatcherConfig) -> Result<Self, DispatcherError> {
        let policy = FlushPolicy::from_interval_ms(config.flush_interval_ms)?;

        let limiter = match config.rate_limit {
            Some(rl) => Some(Limiter {
                limiter: RateLimiter::new(rl.rate, rl.size)?,
                key: rl.key,
            }),
            None => None,
        };

        let metrics = Arc::new(DispatchMetrics::new());

        let (shared, flusher) = match policy {
            FlushPolicy::PerMessage => (None, None),
            FlushPolicy::Batched(period) => {
                let conn = pool.get().await.map_err(DispatcherError::Connection)?;
                let shared = Arc::new(Mutex::new(Batch::new(conn)));
                let (stop_tx, stop_rx) = oneshot::channel();
                let task = tokio::spawn(flush_loop(
                    Arc::clone(&shared),
                    period,
                    Arc::clone(&metrics),
                    stop_rx,
                ));
                (Some(shared), Some(Flusher { stop_tx, task }))
            }
        };

        let dispatcher = Self {
            pool,
            handlers: Vec::new(),
            policy,
            limiter,
            shared,
            flusher: StdMutex::new(flusher),
            state: AtomicU8::new(DispatcherState::Created as u8),
            metrics,
        };
        dispatcher.set_state(DispatcherState::Running);

        info!(policy = ?dispatcher.policy, "Dispatcher started");
        Ok(dispatcher)
    }

    /// Append a handler; handlers run in registration order
    pub fn register(&mut self, handler: Box<dyn Handler>) {
        debug!(handler = handler.name(), "handler registered");
        self.handlers.push(handler);
    }

    /// Registered handler names, in order
    pub fn handler_names(&self) -> Vec<&str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    pub fn policy(&self) -> FlushPolicy {
        self.policy
    }

    pub fn state(&self) -> DispatcherState {
        DispatcherState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: DispatcherState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    /// Dispatch counters
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Route one delivery through every handler
    ///
    /// Content problems (malformed JSON, rate-limited key) are absorbed and
    /// reported as success. Handler and store errors are returned so the
    /// delivery is retried.
    pub async fn dispatch(&self, delivery: &Delivery) -> Result<(), DispatcherError> {
        if self.state() != DispatcherState::Running {
            return Err(DispatcherError::Stopped);
        }

        let started = Instant::now();

        let message = match Message::try_from(delivery) {
            Ok(m) => m,
            Err(e) => {
                error!(message_id = %delivery.id, error = %e, "parsing json");
                self.metrics.inc_malformed();
                observability::record_discarded("malformed_payload");
                observability::record_message("discarded");
                return Ok(());
            }
        };

        if self.rate_limited(&message) {
            self.metrics.inc_rate_limited();
            observability::record_discarded("rate_limited");
            observability::record_message("discarded");
            return Ok(());
        }

        let result = match &self.shared {
            None => self.dispatch_fresh(&message).await,
            Some(shared) => self.dispatch_shared(shared, &message).await,
        };

        match &result {
            Ok(()) => {
                self.metrics.inc_dispatched();
                observability::record_message("dispatched");
            }
            Err(e) => {
                error!(message_id = %message.id, error = %e, "dispatch failed");
                observability::record_message("failed");
            }
        }
        observability::record_dispatch_latency(started.elapsed().as_secs_f64());

        result
    }

    fn rate_limited(&self, message: &Message) -> bool {
        let Some(Limiter { limiter, key }) = &self.limiter else {
            return false;
        };
        match template::lookup(&message.json, key).and_then(|v| v.as_str()) {
            Some(value) if !value.is_empty() && limiter.exceeded(value) => {
                debug!(message_id = %message.id, key = value, "rate limit exceeded, discarding");
                true
            }
            _ => false,
        }
    }

    async fn dispatch_fresh(&self, message: &Message) -> Result<(), DispatcherError> {
        let raw = self.pool.get().await.map_err(DispatcherError::Connection)?;
        let mut conn = PipelinedConn::new(raw);

        // On failure the per-call connection is dropped with its buffer.
        self.run_handlers(&mut conn, message)?;

        match conn.flush().await {
            Ok(commands) => {
                self.metrics.record_flush(commands);
                observability::record_flush("per_message", true, commands);
                for handler in &self.handlers {
                    observability::record_routed(handler.name(), 1);
                }
                self.metrics.add_routed(self.handlers.len() as u64);
                Ok(())
            }
            Err(e) => {
                self.metrics.inc_flush_errors();
                observability::record_flush("per_message", false, 0);
                Err(DispatcherError::Flush(e))
            }
        }
    }

    async fn dispatch_shared(
        &self,
        shared: &SharedBatch<P::Conn>,
        message: &Message,
    ) -> Result<(), DispatcherError> {
        let mut batch = shared.lock().await;

        // Stop may have taken the final flush while we waited for the lock.
        if self.state() != DispatcherState::Running {
            return Err(DispatcherError::Stopped);
        }

        let staged = self.stage_handlers(message)?;
        let mark = batch.conn.pending();
        for (handler, commands) in staged {
            for command in commands {
                if let Err(e) = batch.conn.send(command) {
                    // The transport rejected part of this message: drop the rest of it too.
                    batch.conn.discard_since(mark);
                    return Err(self.handler_failed(handler, message, e));
                }
            }
        }
        batch.count_routes(self.handlers.iter().map(|h| h.name()));
        Ok(())
    }

    fn run_handlers(
        &self,
        conn: &mut PipelinedConn<P::Conn>,
        message: &Message,
    ) -> Result<(), DispatcherError> {
        for handler in &self.handlers {
            handler
                .handle(conn, message)
                .map_err(|e| self.handler_failed(handler.name(), message, e))?;
        }
        Ok(())
    }

    /// Run every handler into a per-message buffer; nothing is staged on failure
    fn stage_handlers<'a>(
        &'a self,
        message: &Message,
    ) -> Result<Vec<(&'a str, Vec<Command>)>, DispatcherError> {
        let mut staged = Vec::with_capacity(self.handlers.len());
        for handler in &self.handlers {
            let mut buf: Vec<Command> = Vec::new();
            handler
                .handle(&mut buf, message)
                .map_err(|e| self.handler_failed(handler.name(), message, e))?;
            staged.push((handler.name(), buf));
        }
        Ok(staged)
    }

    fn handler_failed(&self, handler: &str, message: &Message, e: ContractError) -> DispatcherError {
        error!(message_id = %message.id, handler, error = %e, "handler failed");
        self.metrics.inc_handler_errors();
        observability::record_handler_error(handler);
        DispatcherError::handler(handler, e)
    }

    /// Stop the flush timer and flush whatever is still buffered
    ///
    /// Resolves once the final flush has completed. Calling it again is a
    /// no-op.
    #[instrument(name = "dispatcher_stop", skip(self))]
    pub async fn stop(&self) -> Result<(), DispatcherError> {
        if self
            .state
            .compare_exchange(
                DispatcherState::Running as u8,
                DispatcherState::Stopping as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_err()
        {
            debug!(state = ?self.state(), "stop called twice");
            return Ok(());
        }

        let flusher = self
            .flusher
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(Flusher { stop_tx, task }) = flusher {
            let _ = stop_tx.send(());
            if let Err(e) = task.await {
                warn!(error = %e, "flush task ended abnormally");
            }
        }

        let result = match &self.shared {
            Some(shared) => {
                let mut batch = shared.lock().await;
                flush_shared(&mut batch, "final", &self.metrics).await
            }
            None => Ok(()),
        };

        self.set_state(DispatcherState::Stopped);
        info!(metrics = ?self.metrics(), "Dispatcher stopped");
        result
    }
}

impl<P: StorePool> DeliveryHandler for Dispatcher<P> {
    async fn handle_delivery(&self, delivery: &Delivery) -> Result<(), ContractError> {
        self.dispatch(delivery).await.map_err(ContractError::delivery)
    }
}

#[instrument(name = "dispatcher_flush_loop", skip_all, fields(period_ms = period.as_millis() as u64))]
async fn flush_loop<C: StoreConnection>(
    shared: SharedBatch<C>,
    period: Duration,
    metrics: Arc<DispatchMetrics>,
    mut stop_rx: oneshot::Receiver<()>,
) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = &mut stop_rx => break,
            _ = ticker.tick() => {
                let mut batch = shared.lock().await;
                if batch.conn.pending() == 0 {
                    continue;
                }
                // Errors are counted and logged; the messages were already acked.
                let _ = flush_shared(&mut batch, "interval", &metrics).await;
            }
        }
    }

    debug!("flush loop exited");
}

async fn flush_shared<C: StoreConnection>(
    batch: &mut Batch<C>,
    mode: &'static str,
    metrics: &DispatchMetrics,
) -> Result<(), DispatcherError> {
    let result = batch.conn.flush().await;

    let delivered = result.is_ok();
    for (route, count) in batch.routed.iter_mut().filter(|(_, n)| **n > 0) {
        if delivered {
            observability::record_routed(route, *count);
            metrics.add_routed(*count);
        }
        *count = 0;
    }

    match result {
        Ok(commands) => {
            debug!(mode, commands, "flushed");
            metrics.record_flush(commands);
            observability::record_flush(mode, true, commands);
            Ok(())
        }
        Err(e) => {
            error!(mode, error = %e, "flush failed");
            metrics.inc_flush_errors();
            observability::record_flush(mode, false, 0);
            Err(DispatcherError::Flush(e))
        }
    }
}

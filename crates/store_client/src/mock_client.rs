//! Mock store transport
//!
//! In-memory pool and connection for tests and dry runs. Every connection
//! handed out by one `MockStore` shares the same recorder, so a test can
//! inspect what reached the "server" after the dispatcher released it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use contracts::{Command, ContractError, Reply, StoreConnection, StorePool};
use tracing::{instrument, trace};

/// Mock store configuration (failure injection)
#[derive(Debug, Default, Clone)]
pub struct MockConfig {
    /// Every `send` fails
    pub fail_send: bool,
    /// Sends fail once this many commands have been accepted store-wide
    pub fail_send_after: Option<u64>,
    /// Every `flush` fails
    pub fail_flush: bool,
    /// Every `receive` fails
    pub fail_receive: bool,
    /// Every `get` fails
    pub fail_connect: bool,
}

#[derive(Debug, Default)]
struct Recorder {
    config: Mutex<MockConfig>,
    batches: Mutex<Vec<Vec<Command>>>,
    connections: AtomicU64,
    accepted: AtomicU64,
    flushes: AtomicU64,
    receives: AtomicU64,
}

impl Recorder {
    fn config(&self) -> MutexGuard<'_, MockConfig> {
        self.config.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Mock store pool
#[derive(Debug, Clone, Default)]
pub struct MockStore {
    recorder: Arc<Recorder>,
}

impl MockStore {
    /// Create a mock store that accepts everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock store with failure injection
    pub fn with_config(config: MockConfig) -> Self {
        let store = Self::default();
        *store.recorder.config() = config;
        store
    }

    /// Change failure injection at runtime
    pub fn set_config(&self, config: MockConfig) {
        *self.recorder.config() = config;
    }

    /// Number of connections handed out
    pub fn connections(&self) -> u64 {
        self.recorder.connections.load(Ordering::SeqCst)
    }

    /// Number of transport flushes (successful or not)
    pub fn flushes(&self) -> u64 {
        self.recorder.flushes.load(Ordering::SeqCst)
    }

    /// Number of reply reads
    pub fn receives(&self) -> u64 {
        self.recorder.receives.load(Ordering::SeqCst)
    }

    /// Commands delivered by each successful flush, in flush order
    pub fn batches(&self) -> Vec<Vec<Command>> {
        self.recorder
            .batches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Every delivered command, flattened
    pub fn commands(&self) -> Vec<Command> {
        self.batches().into_iter().flatten().collect()
    }

    /// A standalone connection sharing this store's recorder
    pub fn connection(&self) -> MockConnection {
        self.recorder.connections.fetch_add(1, Ordering::SeqCst);
        MockConnection {
            recorder: Arc::clone(&self.recorder),
            outbound: Vec::new(),
            replies: 0,
        }
    }
}

impl StorePool for MockStore {
    type Conn = MockConnection;

    #[instrument(name = "mock_store_get", skip(self))]
    async fn get(&self) -> Result<MockConnection, ContractError> {
        if self.recorder.config().fail_connect {
            return Err(ContractError::store_connection("mock connect failure"));
        }
        Ok(self.connection())
    }
}

/// Mock pipelined connection
///
/// `send` buffers locally; `flush` hands the buffer to the recorder and makes
/// one `OK` reply available per flushed command.
#[derive(Debug)]
pub struct MockConnection {
    recorder: Arc<Recorder>,
    outbound: Vec<Command>,
    replies: usize,
}

impl MockConnection {
    /// Commands buffered but not yet flushed
    pub fn outbound(&self) -> &[Command] {
        &self.outbound
    }
}

impl StoreConnection for MockConnection {
    fn send(&mut self, command: &Command) -> Result<(), ContractError> {
        let config = self.recorder.config().clone();
        let accepted = self.recorder.accepted.load(Ordering::SeqCst);
        if config.fail_send || config.fail_send_after.is_some_and(|n| accepted >= n) {
            return Err(ContractError::store_send(command.name(), "mock send failure"));
        }
        trace!(command = %command, "mock send");
        self.recorder.accepted.fetch_add(1, Ordering::SeqCst);
        self.outbound.push(command.clone());
        Ok(())
    }

    fn discard(&mut self, count: usize) {
        let keep = self.outbound.len().saturating_sub(count);
        trace!(discarded = self.outbound.len() - keep, "mock discard");
        self.outbound.truncate(keep);
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        self.recorder.flushes.fetch_add(1, Ordering::SeqCst);
        let batch = std::mem::take(&mut self.outbound);
        if self.recorder.config().fail_flush {
            return Err(ContractError::store_flush("mock flush failure"));
        }
        self.replies += batch.len();
        self.recorder
            .batches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(batch);
        Ok(())
    }

    async fn receive(&mut self) -> Result<Reply, ContractError> {
        self.recorder.receives.fetch_add(1, Ordering::SeqCst);
        if self.recorder.config().fail_receive {
            return Err(ContractError::store_receive("mock receive failure"));
        }
        if self.replies == 0 {
            return Err(ContractError::store_receive("no reply pending"));
        }
        self.replies -= 1;
        Ok(Reply::Status("OK".to_string()))
    }
}

//! Scripted in-memory transport.
//!
//! Each [`MockTransport`] answers probes and calls from behaviour that tests change while the
//! pool is running, and counts how often it was asked.

use async_trait::async_trait;
use dashmap::DashMap;
use multinode_core::{
    types::{Node, PoolConfig},
    upstream::{Head, NodeCallError, NodeTransport, ProbeError, SyncStatus, TransportFactory},
};
use parking_lot::Mutex;
use serde_json::Value;
use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

/// How a probe answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeBehavior<T> {
    Respond(T),
    Fail,
    /// Never answers; the pool's probe timeout has to cut it off.
    Hang,
    /// Blocks the worker thread without yielding, then fails. No timeout can preempt it.
    Block(Duration),
}

/// How `call` answers.
#[derive(Debug, Clone, PartialEq)]
pub enum CallBehavior {
    Respond(Value),
    RpcError(i32, String),
    HttpError(u16),
    ConnectionFailed,
    Hang,
}

#[derive(Debug)]
pub struct MockTransport {
    name: String,
    head: Mutex<ProbeBehavior<Head>>,
    sync: Mutex<ProbeBehavior<SyncStatus>>,
    call: Mutex<CallBehavior>,
    fail_close: AtomicBool,
    head_probes: AtomicUsize,
    sync_probes: AtomicUsize,
    calls: AtomicUsize,
    closes: AtomicUsize,
}

impl MockTransport {
    /// A healthy, synced node at head 0 that answers calls with `null`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            head: Mutex::new(ProbeBehavior::Respond(Head::new(0))),
            sync: Mutex::new(ProbeBehavior::Respond(SyncStatus::synced())),
            call: Mutex::new(CallBehavior::Respond(Value::Null)),
            fail_close: AtomicBool::new(false),
            head_probes: AtomicUsize::new(0),
            sync_probes: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_head(&self, number: u64) {
        *self.head.lock() = ProbeBehavior::Respond(Head::new(number));
    }

    pub fn set_head_with_difficulty(&self, number: u64, total_difficulty: u128) {
        *self.head.lock() =
            ProbeBehavior::Respond(Head::new(number).with_difficulty(total_difficulty));
    }

    pub fn fail_head(&self) {
        *self.head.lock() = ProbeBehavior::Fail;
    }

    pub fn hang_head(&self) {
        *self.head.lock() = ProbeBehavior::Hang;
    }

    pub fn block_head(&self, duration: Duration) {
        *self.head.lock() = ProbeBehavior::Block(duration);
    }

    pub fn set_syncing(&self, height: u64) {
        *self.sync.lock() = ProbeBehavior::Respond(SyncStatus::syncing(height));
    }

    pub fn set_synced(&self) {
        *self.sync.lock() = ProbeBehavior::Respond(SyncStatus::synced());
    }

    pub fn fail_sync(&self) {
        *self.sync.lock() = ProbeBehavior::Fail;
    }

    pub fn set_call(&self, behavior: CallBehavior) {
        *self.call.lock() = behavior;
    }

    pub fn fail_close(&self) {
        self.fail_close.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn head_probes(&self) -> usize {
        self.head_probes.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn sync_probes(&self) -> usize {
        self.sync_probes.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

async fn answer<T: Copy>(behavior: ProbeBehavior<T>, name: &str) -> Result<T, ProbeError> {
    match behavior {
        ProbeBehavior::Respond(value) => Ok(value),
        ProbeBehavior::Fail => Err(ProbeError::Transport(format!("{name}: scripted failure"))),
        ProbeBehavior::Hang => std::future::pending().await,
        ProbeBehavior::Block(duration) => {
            std::thread::sleep(duration);
            Err(ProbeError::Transport(format!("{name}: blocked for {duration:?}")))
        }
    }
}

#[async_trait]
impl NodeTransport for MockTransport {
    async fn probe_head(&self) -> Result<Head, ProbeError> {
        self.head_probes.fetch_add(1, Ordering::SeqCst);
        let behavior = *self.head.lock();
        answer(behavior, &self.name).await
    }

    async fn probe_sync(&self) -> Result<SyncStatus, ProbeError> {
        self.sync_probes.fetch_add(1, Ordering::SeqCst);
        let behavior = *self.sync.lock();
        answer(behavior, &self.name).await
    }

    async fn call(&self, _method: &str, _params: Option<Value>) -> Result<Value, NodeCallError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let behavior = self.call.lock().clone();
        match behavior {
            CallBehavior::Respond(value) => Ok(value),
            CallBehavior::RpcError(code, message) => Err(NodeCallError::RpcError(code, message)),
            CallBehavior::HttpError(status) => {
                Err(NodeCallError::HttpError(status, "scripted".to_string()))
            }
            CallBehavior::ConnectionFailed => {
                Err(NodeCallError::ConnectionFailed(format!("{}: refused", self.name)))
            }
            CallBehavior::Hang => std::future::pending().await,
        }
    }

    async fn close(&self) -> Result<(), NodeCallError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close.load(Ordering::SeqCst) {
            return Err(NodeCallError::ConnectionFailed("scripted close failure".to_string()));
        }
        Ok(())
    }
}

/// Hands out one [`MockTransport`] per node name.
///
/// Tests can grab a node's transport before or after the pool is built; both see the same
/// instance.
#[derive(Debug, Default)]
pub struct MockTransportFactory {
    transports: DashMap<String, Arc<MockTransport>>,
    refuse: Mutex<Option<String>>,
}

impl MockTransportFactory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the transport for `name`, creating it on first use.
    #[must_use]
    pub fn transport(&self, name: &str) -> Arc<MockTransport> {
        self.transports
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MockTransport::new(name)))
            .clone()
    }

    /// Makes `create` fail for the node called `name`.
    pub fn refuse(&self, name: &str) {
        *self.refuse.lock() = Some(name.to_string());
    }
}

impl TransportFactory for MockTransportFactory {
    fn create(
        &self,
        node: &Node,
        _config: &PoolConfig,
    ) -> Result<Arc<dyn NodeTransport>, NodeCallError> {
        if self.refuse.lock().as_deref() == Some(node.name()) {
            return Err(NodeCallError::ConnectionFailed(format!("{} refused", node.name())));
        }
        let transport: Arc<dyn NodeTransport> = self.transport(node.name());
        Ok(transport)
    }
}

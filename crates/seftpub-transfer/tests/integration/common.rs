//! Shared test helpers: in-memory ports that record every call

#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{TimeZone, Utc};
use seftpub_core::domain::{DeliveryHandle, RemoteName, RetrievedJob, WireRecord};
use seftpub_core::ports::{Headers, IDeliveryPort, IEncrypter, IFileStore, IFileStoreSession};
use seftpub_transfer::{ManualClock, TransferEngine, TransferOptions};
use tokio::sync::Notify;

/// Ordered log of port calls shared by all fakes
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, call: impl Into<String>) {
        self.0.lock().unwrap().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn contains(&self, call: &str) -> bool {
        self.calls().iter().any(|c| c == call)
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

// ============================================================================
// File store
// ============================================================================

/// Pauses a `get` until the test releases it
#[derive(Default)]
pub struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

#[derive(Default)]
pub struct StoreState {
    pub files: Mutex<BTreeMap<String, Vec<u8>>>,
    pub fail_open: AtomicBool,
    pub fail_list: AtomicBool,
    pub healthy: AtomicBool,
    pub fail_get: Mutex<HashSet<String>>,
    pub fail_delete: Mutex<HashSet<String>>,
    pub gate: Mutex<Option<Arc<Gate>>>,
}

pub struct FakeFileStore {
    pub state: Arc<StoreState>,
    log: CallLog,
}

impl FakeFileStore {
    pub fn new(log: CallLog) -> Self {
        let state = StoreState::default();
        state.healthy.store(true, Ordering::SeqCst);
        Self {
            state: Arc::new(state),
            log,
        }
    }

    pub fn put(&self, name: &str, content: &[u8]) {
        self.state
            .files
            .lock()
            .unwrap()
            .insert(name.to_string(), content.to_vec());
    }

    pub fn has(&self, name: &str) -> bool {
        self.state.files.lock().unwrap().contains_key(name)
    }

    pub fn fail_get(&self, name: &str) {
        self.state.fail_get.lock().unwrap().insert(name.to_string());
    }

    pub fn heal_get(&self, name: &str) {
        self.state.fail_get.lock().unwrap().remove(name);
    }

    pub fn fail_delete(&self, name: &str) {
        self.state.fail_delete.lock().unwrap().insert(name.to_string());
    }

    pub fn heal_delete(&self, name: &str) {
        self.state.fail_delete.lock().unwrap().remove(name);
    }

    pub fn set_fail_open(&self, fail: bool) {
        self.state.fail_open.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_list(&self, fail: bool) {
        self.state.fail_list.store(fail, Ordering::SeqCst);
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.state.healthy.store(healthy, Ordering::SeqCst);
    }

    /// Makes every following `get` wait on the returned gate
    pub fn install_gate(&self) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        *self.state.gate.lock().unwrap() = Some(gate.clone());
        gate
    }
}

#[async_trait::async_trait]
impl IFileStore for FakeFileStore {
    async fn open(&self) -> anyhow::Result<Box<dyn IFileStoreSession>> {
        self.log.push("open");
        if self.state.fail_open.load(Ordering::SeqCst) {
            anyhow::bail!("530 Login incorrect");
        }
        Ok(Box::new(FakeSession {
            state: self.state.clone(),
            log: self.log.clone(),
        }))
    }

    async fn check(&self) -> bool {
        self.state.healthy.load(Ordering::SeqCst)
    }
}

struct FakeSession {
    state: Arc<StoreState>,
    log: CallLog,
}

#[async_trait::async_trait]
impl IFileStoreSession for FakeSession {
    async fn list(&mut self) -> anyhow::Result<Vec<String>> {
        self.log.push("list");
        if self.state.fail_list.load(Ordering::SeqCst) {
            anyhow::bail!("451 listing unavailable");
        }
        Ok(self.state.files.lock().unwrap().keys().cloned().collect())
    }

    async fn get(&mut self, filename: &RemoteName) -> anyhow::Result<RetrievedJob> {
        self.log.push(format!("get {filename}"));
        let gate = self.state.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        if self.state.fail_get.lock().unwrap().contains(filename.as_str()) {
            anyhow::bail!("550 {filename}: transfer failed");
        }
        let content = self
            .state
            .files
            .lock()
            .unwrap()
            .get(filename.as_str())
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("550 {filename}: no such file"))?;
        let retrieved_at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        Ok(RetrievedJob::new(retrieved_at, filename.clone(), content))
    }

    async fn delete(&mut self, filename: &RemoteName) -> anyhow::Result<()> {
        self.log.push(format!("delete {filename}"));
        if self.state.fail_delete.lock().unwrap().contains(filename.as_str()) {
            anyhow::bail!("550 {filename}: permission denied");
        }
        self.state.files.lock().unwrap().remove(filename.as_str());
        Ok(())
    }

    async fn close(self: Box<Self>) {
        self.log.push("close");
    }
}

// ============================================================================
// Delivery port
// ============================================================================

pub struct Published {
    pub handle: DeliveryHandle,
    pub payload: Vec<u8>,
    pub headers: Headers,
}

impl Published {
    pub fn record(&self) -> WireRecord {
        serde_json::from_slice(&self.payload).unwrap()
    }
}

pub struct FakeDelivery {
    ready: AtomicBool,
    fail_publish: AtomicBool,
    ack_on_publish: AtomicBool,
    next: AtomicU64,
    confirmed: Mutex<HashSet<DeliveryHandle>>,
    pub published: Mutex<Vec<Published>>,
    log: CallLog,
}

impl FakeDelivery {
    pub fn new(log: CallLog) -> Self {
        Self {
            ready: AtomicBool::new(true),
            fail_publish: AtomicBool::new(false),
            ack_on_publish: AtomicBool::new(false),
            next: AtomicU64::new(1),
            confirmed: Mutex::new(HashSet::new()),
            published: Mutex::new(Vec::new()),
            log,
        }
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub fn set_fail_publish(&self, fail: bool) {
        self.fail_publish.store(fail, Ordering::SeqCst);
    }

    /// Confirms every following publish before `publish` returns
    pub fn set_ack_on_publish(&self, ack: bool) {
        self.ack_on_publish.store(ack, Ordering::SeqCst);
    }

    pub fn confirm(&self, handle: DeliveryHandle) {
        self.confirmed.lock().unwrap().insert(handle);
    }

    pub fn published_count(&self) -> usize {
        self.published.lock().unwrap().len()
    }

    /// Filenames of every publish, in order
    pub fn published_names(&self) -> Vec<String> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .map(|p| p.record().filename)
            .collect()
    }
}

#[async_trait::async_trait]
impl IDeliveryPort for FakeDelivery {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn publish(&self, payload: Vec<u8>, headers: Headers) -> anyhow::Result<DeliveryHandle> {
        self.log.push("publish");
        if self.fail_publish.load(Ordering::SeqCst) {
            anyhow::bail!("channel closed");
        }
        let handle = DeliveryHandle::new(self.next.fetch_add(1, Ordering::SeqCst));
        if self.ack_on_publish.load(Ordering::SeqCst) {
            self.confirm(handle);
        }
        self.published.lock().unwrap().push(Published {
            handle,
            payload,
            headers,
        });
        Ok(handle)
    }

    fn is_confirmed(&self, handle: DeliveryHandle) -> bool {
        self.confirmed.lock().unwrap().contains(&handle)
    }
}

// ============================================================================
// Encrypter
// ============================================================================

/// Passes the record through as plain JSON so tests can inspect it
pub struct FakeEncrypter {
    panic_on: Mutex<Option<String>>,
    log: CallLog,
}

impl FakeEncrypter {
    pub fn new(log: CallLog) -> Self {
        Self {
            panic_on: Mutex::new(None),
            log,
        }
    }

    pub fn panic_on(&self, filename: &str) {
        *self.panic_on.lock().unwrap() = Some(filename.to_string());
    }

    pub fn stop_panicking(&self) {
        *self.panic_on.lock().unwrap() = None;
    }
}

impl IEncrypter for FakeEncrypter {
    fn encrypt(&self, record: &serde_json::Value) -> anyhow::Result<Vec<u8>> {
        let filename = record["filename"].as_str().unwrap_or_default().to_string();
        self.log.push(format!("encrypt {filename}"));
        if self.panic_on.lock().unwrap().as_deref() == Some(filename.as_str()) {
            panic!("encrypter exploded on {filename}");
        }
        Ok(serde_json::to_vec(record)?)
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub log: CallLog,
    pub store: Arc<FakeFileStore>,
    pub delivery: Arc<FakeDelivery>,
    pub encrypter: Arc<FakeEncrypter>,
    pub clock: ManualClock,
    pub engine: Arc<TransferEngine>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_options(TransferOptions::default())
    }

    pub fn with_options(options: TransferOptions) -> Self {
        Self::build(options, |engine| engine)
    }

    pub fn build(
        options: TransferOptions,
        configure: impl FnOnce(TransferEngine) -> TransferEngine,
    ) -> Self {
        let log = CallLog::default();
        let store = Arc::new(FakeFileStore::new(log.clone()));
        let delivery = Arc::new(FakeDelivery::new(log.clone()));
        let encrypter = Arc::new(FakeEncrypter::new(log.clone()));
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap());

        let engine = TransferEngine::new(
            store.clone(),
            delivery.clone(),
            encrypter.clone(),
            options,
        )
        .with_clock(Arc::new(clock.clone()));

        Self {
            log,
            store,
            delivery,
            encrypter,
            clock,
            engine: Arc::new(configure(engine)),
        }
    }

    /// Handle assigned to `filename` in the registry
    pub fn handle_of(&self, filename: &str) -> DeliveryHandle {
        self.engine
            .registry()
            .get(filename)
            .unwrap_or_else(|| panic!("{filename} is not registered"))
            .delivery_handle
    }
}

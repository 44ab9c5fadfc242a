/// In-process stub agents for unit tests
use crate::{
    agent::{AgentFactory, RawRecord, RecordPage, RepoAgent},
    error::{ReaderError, ReaderResult},
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Canned data and call counters for one endpoint
#[derive(Default)]
pub struct StubBackend {
    records: Mutex<HashMap<(String, String), RawRecord>>,
    pages: Mutex<HashMap<(String, Option<String>), RecordPage>>,
    failing: AtomicBool,
    pub get_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
}

impl StubBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        let backend = Self::default();
        backend.failing.store(true, Ordering::SeqCst);
        Arc::new(backend)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn put_record(&self, collection: &str, rkey: &str, record: RawRecord) {
        self.records
            .lock()
            .unwrap()
            .insert((collection.to_string(), rkey.to_string()), record);
    }

    pub fn put_page(&self, collection: &str, cursor: Option<&str>, page: RecordPage) {
        self.pages
            .lock()
            .unwrap()
            .insert((collection.to_string(), cursor.map(str::to_string)), page);
    }

    pub fn calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst) + self.list_calls.load(Ordering::SeqCst)
    }
}

struct StubAgent {
    service: String,
    backend: Option<Arc<StubBackend>>,
}

fn unavailable(service: &str) -> ReaderError {
    ReaderError::Xrpc {
        status: 503,
        error: "Unavailable".to_string(),
        message: service.to_string(),
    }
}

#[async_trait]
impl RepoAgent for StubAgent {
    fn service(&self) -> &str {
        &self.service
    }

    async fn get_record(
        &self,
        _repo: &str,
        collection: &str,
        rkey: &str,
    ) -> ReaderResult<Option<RawRecord>> {
        let backend = self.backend.as_ref().ok_or_else(|| unavailable(&self.service))?;
        backend.get_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;

        if backend.failing.load(Ordering::SeqCst) {
            return Err(unavailable(&self.service));
        }

        Ok(backend
            .records
            .lock()
            .unwrap()
            .get(&(collection.to_string(), rkey.to_string()))
            .cloned())
    }

    async fn list_records(
        &self,
        _repo: &str,
        collection: &str,
        _limit: u32,
        cursor: Option<&str>,
    ) -> ReaderResult<RecordPage> {
        let backend = self.backend.as_ref().ok_or_else(|| unavailable(&self.service))?;
        backend.list_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;

        if backend.failing.load(Ordering::SeqCst) {
            return Err(unavailable(&self.service));
        }

        Ok(backend
            .pages
            .lock()
            .unwrap()
            .get(&(collection.to_string(), cursor.map(str::to_string)))
            .cloned()
            .unwrap_or_default())
    }
}

/// Factory routing each service URL to its stub backend; unknown services always fail
///
/// Service URLs are matched without trailing slashes, as `XrpcAgent` does.
#[derive(Default)]
pub struct StubFactory {
    backends: HashMap<String, Arc<StubBackend>>,
    requested: Mutex<Vec<String>>,
}

impl StubFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, service: &str, backend: Arc<StubBackend>) -> Self {
        self.backends.insert(normalize(service), backend);
        self
    }

    /// Services agents were built for, in order
    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

fn normalize(service: &str) -> String {
    service.trim_end_matches('/').to_string()
}

impl AgentFactory for StubFactory {
    fn agent(&self, service: &str) -> Arc<dyn RepoAgent> {
        let service = normalize(service);
        self.requested.lock().unwrap().push(service.clone());
        Arc::new(StubAgent {
            backend: self.backends.get(&service).cloned(),
            service,
        })
    }
}

pub fn raw(uri: &str, cid: Option<&str>, value: serde_json::Value) -> RawRecord {
    RawRecord {
        uri: uri.to_string(),
        cid: cid.map(str::to_string),
        value: Some(value),
    }
}

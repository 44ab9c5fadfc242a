/// Record Repository - typed, cached access to publications and documents
///
/// Every read goes cache first, then through the fallback executor. Raw
/// backend records are turned into `RecordEnvelope`s here, with blob
/// references materialized into fetchable URLs.

use crate::{
    agent::{AgentFactory, FallbackExecutor, RawRecord, XrpcAgentFactory},
    at_uri::{self, AtUri},
    cache::{keys, CachedValue, RecordCache},
    config::ReaderConfig,
    error::{ReaderError, ReaderResult},
    identity::IdentityResolver,
    record::{
        models::{RawDocument, RawPublication},
        AnyRecord, BlobRef, Collection, Document, Publication, RecordEnvelope,
        DOCUMENT_COLLECTION, PUBLICATION_COLLECTION,
    },
};
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Records requested per `listRecords` page
pub const PAGE_SIZE: u32 = 100;

pub type PublicationRecord = Arc<RecordEnvelope<Publication>>;
pub type DocumentRecord = Arc<RecordEnvelope<Document>>;

/// Read-only façade over one DID's site.standard records
pub struct RecordRepository {
    did: String,
    cache: Arc<RecordCache>,
    executor: FallbackExecutor,
    ttl: Duration,
    /// One gate per cache key with a fetch in progress
    in_flight: InFlightTable,
}

impl RecordRepository {
    /// Create a repository with its own cache and the default HTTP transport
    pub fn new(config: ReaderConfig) -> ReaderResult<Self> {
        let cache = Arc::new(RecordCache::new(config.cache_ttl));
        Self::with_cache(config, cache)
    }

    /// Create a repository sharing an existing cache
    pub fn with_cache(config: ReaderConfig, cache: Arc<RecordCache>) -> ReaderResult<Self> {
        config.validate()?;

        let http_client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ReaderError::Config(format!("Failed to create HTTP client: {}", e)))?;

        let agents = Arc::new(XrpcAgentFactory::new(http_client.clone()));
        Ok(Self::from_parts(&config, cache, http_client, agents))
    }

    /// Assemble a repository from caller-supplied transport pieces
    pub fn from_parts(
        config: &ReaderConfig,
        cache: Arc<RecordCache>,
        http_client: reqwest::Client,
        agents: Arc<dyn AgentFactory>,
    ) -> Self {
        let resolver = IdentityResolver::new(
            cache.clone(),
            http_client,
            config.resolver_url.clone(),
            config.cache_ttl,
        );
        let executor = FallbackExecutor::new(
            resolver,
            agents,
            config.fallback_url.clone(),
            config.pds.clone(),
        );

        Self {
            did: config.did.clone(),
            cache,
            executor,
            ttl: config.cache_ttl,
            in_flight: DashMap::new(),
        }
    }

    pub fn did(&self) -> &str {
        &self.did
    }

    pub fn cache(&self) -> &Arc<RecordCache> {
        &self.cache
    }

    pub fn executor(&self) -> &FallbackExecutor {
        &self.executor
    }

    /// Fetch one publication; `None` when it does not exist
    pub async fn fetch_publication(&self, rkey: &str) -> ReaderResult<Option<PublicationRecord>> {
        let key = keys::publication(&self.did, rkey);
        self.load(
            key,
            |v| match v {
                CachedValue::Publication(p) => Some(p),
                _ => None,
            },
            CachedValue::Publication,
            || async {
                match self.get_raw(PUBLICATION_COLLECTION, rkey).await? {
                    Some(raw) => Ok(Some(Arc::new(self.assemble_publication(raw).await?))),
                    None => Ok(None),
                }
            },
        )
        .await
    }

    /// Fetch every publication in server order
    pub async fn fetch_all_publications(&self) -> ReaderResult<Arc<Vec<RecordEnvelope<Publication>>>> {
        let key = keys::all_publications(&self.did);
        let all = self
            .load(
                key,
                |v| match v {
                    CachedValue::Publications(p) => Some(p),
                    _ => None,
                },
                CachedValue::Publications,
                || async {
                    let mut publications = Vec::new();
                    for raw in self.list_all(PUBLICATION_COLLECTION).await? {
                        let uri = raw.uri.clone();
                        match self.assemble_publication(raw).await {
                            Ok(publication) => publications.push(publication),
                            Err(e) => warn!("Skipping undecodable record {}: {}", uri, e),
                        }
                    }
                    Ok(Some(Arc::new(publications)))
                },
            )
            .await?;

        Ok(all.unwrap_or_default())
    }

    /// Fetch one document; `None` when it does not exist
    pub async fn fetch_document(&self, rkey: &str) -> ReaderResult<Option<DocumentRecord>> {
        let key = keys::document(&self.did, rkey);
        self.load(
            key,
            |v| match v {
                CachedValue::Document(d) => Some(d),
                _ => None,
            },
            CachedValue::Document,
            || async {
                match self.get_raw(DOCUMENT_COLLECTION, rkey).await? {
                    Some(raw) => Ok(Some(Arc::new(self.assemble_document(raw).await?))),
                    None => Ok(None),
                }
            },
        )
        .await
    }

    /// Fetch every document, newest `publishedAt` first
    pub async fn fetch_all_documents(&self) -> ReaderResult<Arc<Vec<RecordEnvelope<Document>>>> {
        let key = keys::all_documents(&self.did);
        let all = self
            .load(
                key,
                |v| match v {
                    CachedValue::Documents(d) => Some(d),
                    _ => None,
                },
                CachedValue::Documents,
                || async {
                    let mut documents = Vec::new();
                    for raw in self.list_all(DOCUMENT_COLLECTION).await? {
                        let uri = raw.uri.clone();
                        match self.assemble_document(raw).await {
                            Ok(document) => documents.push(document),
                            Err(e) => warn!("Skipping undecodable record {}: {}", uri, e),
                        }
                    }

                    // Stable sort; unparseable dates go last
                    documents.sort_by(|a, b| {
                        b.value
                            .published_at_time()
                            .cmp(&a.value.published_at_time())
                    });

                    Ok(Some(Arc::new(documents)))
                },
            )
            .await?;

        Ok(all.unwrap_or_default())
    }

    /// Documents whose `site` is `publication_uri`, filtered from the full listing
    pub async fn fetch_documents_by_publication(
        &self,
        publication_uri: &str,
    ) -> ReaderResult<Vec<RecordEnvelope<Document>>> {
        let all = self.fetch_all_documents().await?;
        Ok(all
            .iter()
            .filter(|doc| doc.value.site == publication_uri)
            .cloned()
            .collect())
    }

    /// Fetch whatever record an AT URI points at
    ///
    /// Invalid URIs, unknown collections and URIs in another DID's
    /// repository all yield `None`.
    pub async fn fetch_by_uri(&self, uri: &str) -> ReaderResult<Option<AnyRecord>> {
        let Some(parsed) = AtUri::parse(uri) else {
            warn!("Invalid AT URI: {}", uri);
            return Ok(None);
        };

        if parsed.did != self.did {
            debug!("AT URI {} is outside repository {}", uri, self.did);
            return Ok(None);
        }

        match Collection::from_nsid(&parsed.collection) {
            Some(Collection::Publication) => Ok(self
                .fetch_publication(&parsed.rkey)
                .await?
                .map(AnyRecord::Publication)),
            Some(Collection::Document) => Ok(self
                .fetch_document(&parsed.rkey)
                .await?
                .map(AnyRecord::Document)),
            None => {
                debug!("Unsupported collection: {}", parsed.collection);
                Ok(None)
            }
        }
    }

    /// Home endpoint for this repository's DID
    pub async fn get_home_endpoint(&self) -> ReaderResult<String> {
        self.executor.home_endpoint(&self.did).await
    }

    /// Clear the whole cache, including entries written by other users of a shared cache
    pub fn clear_cache(&self) {
        info!("Clearing record cache");
        self.cache.clear();
    }

    /// Cache-first load with one in-flight fetch per key
    ///
    /// Concurrent callers for the same key wait on the first fetch and then
    /// read what it cached. `None` results and errors are never cached.
    async fn load<T, F, Fut>(
        &self,
        key: String,
        extract: fn(CachedValue) -> Option<T>,
        wrap: fn(T) -> CachedValue,
        fetch: F,
    ) -> ReaderResult<Option<T>>
    where
        T: Clone,
        F: FnOnce() -> Fut,
        Fut: Future<Output = ReaderResult<Option<T>>>,
    {
        if let Some(hit) = self.cache.get(&key).and_then(extract) {
            debug!("Cache HIT: {}", key);
            return Ok(Some(hit));
        }

        let slot = InFlightSlot::enter(&self.in_flight, &key);
        let _guard = slot.gate.lock().await;

        if let Some(hit) = self.cache.get(&key).and_then(extract) {
            debug!("Cache HIT after wait: {}", key);
            return Ok(Some(hit));
        }

        debug!("Cache MISS: {}", key);
        let fetched = fetch().await;
        if let Ok(Some(value)) = &fetched {
            self.cache
                .set_with_ttl(key.clone(), wrap(value.clone()), self.ttl);
        }
        fetched
    }

    /// Single `getRecord` with fallback; `None` when absent or valueless
    async fn get_raw(&self, collection: &str, rkey: &str) -> ReaderResult<Option<RawRecord>> {
        let did = self.did.as_str();
        let record = self
            .executor
            .with_fallback(did, move |agent| async move {
                agent.get_record(did, collection, rkey).await
            })
            .await?;

        Ok(record.filter(|r| r.value.is_some()))
    }

    /// Page through a whole collection, following cursors until none is returned
    async fn list_all(&self, collection: &str) -> ReaderResult<Vec<RawRecord>> {
        let did = self.did.as_str();
        let mut records = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let current = cursor.as_deref();
            let page = self
                .executor
                .with_fallback(did, move |agent| async move {
                    agent.list_records(did, collection, PAGE_SIZE, current).await
                })
                .await?;

            pages += 1;
            records.extend(page.records);

            match page.cursor.filter(|c| !c.is_empty()) {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        debug!(
            "Listed {} {} records over {} pages",
            records.len(),
            collection,
            pages
        );
        Ok(records)
    }

    async fn assemble_publication(&self, raw: RawRecord) -> ReaderResult<RecordEnvelope<Publication>> {
        let (uri, cid, value) = decode::<RawPublication>(raw)?;
        let icon = match &value.icon {
            Some(blob) => self.blob_url(blob).await,
            None => None,
        };

        Ok(RecordEnvelope {
            uri,
            cid,
            value: value.into_publication(icon),
        })
    }

    async fn assemble_document(&self, raw: RawRecord) -> ReaderResult<RecordEnvelope<Document>> {
        let (uri, cid, value) = decode::<RawDocument>(raw)?;
        let cover_image = match &value.cover_image {
            Some(blob) => self.blob_url(blob).await,
            None => None,
        };

        Ok(RecordEnvelope {
            uri,
            cid,
            value: value.into_document(cover_image),
        })
    }

    /// Blob URL on the home endpoint; any failure leaves the field absent
    async fn blob_url(&self, blob: &BlobRef) -> Option<String> {
        let Some(cid) = blob.content_id() else {
            warn!("Blob reference without content id");
            return None;
        };

        match self.executor.home_endpoint(&self.did).await {
            Ok(endpoint) => Some(at_uri::blob_url(&endpoint, &self.did, cid)),
            Err(e) => {
                warn!("Failed to resolve blob URL: {}", e);
                None
            }
        }
    }
}

type InFlightTable = DashMap<String, Arc<Mutex<()>>>;

/// One caller's hold on a key's in-flight gate
///
/// Dropping the slot, including when the owning future is cancelled,
/// removes the gate once no other caller holds it.
struct InFlightSlot<'a> {
    table: &'a InFlightTable,
    key: &'a str,
    gate: Arc<Mutex<()>>,
}

impl<'a> InFlightSlot<'a> {
    fn enter(table: &'a InFlightTable, key: &'a str) -> Self {
        let gate = table.entry(key.to_string()).or_default().clone();
        Self { table, key, gate }
    }
}

impl Drop for InFlightSlot<'_> {
    fn drop(&mut self) {
        // Release our handle before checking whether anyone else still has one
        drop(std::mem::take(&mut self.gate));
        self.table
            .remove_if(self.key, |_, gate| Arc::strong_count(gate) == 1);
    }
}

/// Split a raw record into uri, cid (empty when absent) and decoded value
fn decode<T: DeserializeOwned>(raw: RawRecord) -> ReaderResult<(String, String, T)> {
    let value = raw
        .value
        .ok_or_else(|| ReaderError::InvalidRecord(format!("{} has no value", raw.uri)))?;
    let decoded = serde_json::from_value(value)
        .map_err(|e| ReaderError::InvalidRecord(format!("{}: {}", raw.uri, e)))?;
    Ok((raw.uri, raw.cid.unwrap_or_default(), decoded))
}

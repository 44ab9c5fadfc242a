/// Identity Resolver - resolves DIDs to home endpoints with caching
use crate::{
    cache::{keys, CachedValue, RecordCache},
    error::{ReaderError, ReaderResult},
    identity::ResolvedIdentity,
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// XRPC method on the resolution service returning `{did, handle, pds}`
const RESOLVE_METHOD: &str = "com.bad-example.identity.resolveMiniDoc";

/// Raw resolver body; fields are optional so incomplete answers can be rejected explicitly
#[derive(Debug, Deserialize)]
struct MiniDoc {
    did: Option<String>,
    pds: Option<String>,
    handle: Option<String>,
}

/// Identity resolver backed by the shared cache
#[derive(Clone)]
pub struct IdentityResolver {
    cache: Arc<RecordCache>,
    http_client: reqwest::Client,
    resolver_url: String,
    ttl: Duration,
}

impl IdentityResolver {
    /// Create a new resolver
    ///
    /// `http_client` is the caller-supplied transport; timeouts and proxies
    /// configured on it apply to every resolution call.
    pub fn new(
        cache: Arc<RecordCache>,
        http_client: reqwest::Client,
        resolver_url: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        Self {
            cache,
            http_client,
            resolver_url: resolver_url.into(),
            ttl,
        }
    }

    /// Resolve a DID, using the cached identity while it is fresh
    pub async fn resolve(&self, did: &str) -> ReaderResult<ResolvedIdentity> {
        let cache_key = keys::identity(did);

        if let Some(CachedValue::Identity(identity)) = self.cache.get(&cache_key) {
            debug!("Identity cache HIT: {}", did);
            return Ok(identity);
        }

        let identity = self.fetch_identity(did).await?;
        info!("Resolved {} to {}", did, identity.home_endpoint);

        self.cache
            .set_with_ttl(cache_key, CachedValue::Identity(identity.clone()), self.ttl);

        Ok(identity)
    }

    /// Drop the cached identity so the next resolve hits the network
    pub fn invalidate(&self, did: &str) {
        self.cache.delete(&keys::identity(did));
    }

    /// Single network call to the resolution service
    async fn fetch_identity(&self, did: &str) -> ReaderResult<ResolvedIdentity> {
        let url = format!(
            "{}/xrpc/{}?identifier={}",
            self.resolver_url.trim_end_matches('/'),
            RESOLVE_METHOD,
            urlencoding::encode(did)
        );

        debug!("Resolving identity: {}", url);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| ReaderError::Resolution(format!("Failed to reach resolver: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReaderError::Resolution(format!(
                "Failed to resolve DID {}: {}",
                did, status
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ReaderError::Resolution(format!("Failed to read resolver body: {}", e)))?;

        let doc: MiniDoc = serde_json::from_str(&body)
            .map_err(|e| ReaderError::Resolution(format!("Invalid resolver response: {}", e)))?;

        match (doc.did, doc.pds) {
            (Some(did), Some(pds)) if !did.is_empty() && !pds.is_empty() => Ok(ResolvedIdentity {
                did,
                home_endpoint: pds,
                handle: doc.handle,
            }),
            _ => Err(ReaderError::Resolution(
                "Invalid response from identity resolver".to_string(),
            )),
        }
    }
}

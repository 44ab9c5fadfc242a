/// Network agents for reading repository records
///
/// An agent speaks to exactly one service endpoint. The fallback executor
/// asks an `AgentFactory` for one agent per endpoint it tries.

pub mod fallback;
pub mod xrpc;

#[cfg(test)]
pub(crate) mod testing;

pub use fallback::FallbackExecutor;
pub use xrpc::{XrpcAgent, XrpcAgentFactory};

use crate::error::ReaderResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A record exactly as returned by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub uri: String,
    #[serde(default)]
    pub cid: Option<String>,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
}

/// One page of a `listRecords` call; `cursor` is absent on the last page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordPage {
    #[serde(default)]
    pub records: Vec<RawRecord>,
    #[serde(default)]
    pub cursor: Option<String>,
}

/// Read access to repositories on a single endpoint
#[async_trait]
pub trait RepoAgent: Send + Sync {
    /// Base URL this agent talks to
    fn service(&self) -> &str;

    /// Fetch one record; `Ok(None)` when the backend reports it does not exist
    async fn get_record(
        &self,
        repo: &str,
        collection: &str,
        rkey: &str,
    ) -> ReaderResult<Option<RawRecord>>;

    /// Fetch one page of a collection
    async fn list_records(
        &self,
        repo: &str,
        collection: &str,
        limit: u32,
        cursor: Option<&str>,
    ) -> ReaderResult<RecordPage>;
}

/// Builds agents for arbitrary endpoints
pub trait AgentFactory: Send + Sync {
    fn agent(&self, service: &str) -> Arc<dyn RepoAgent>;
}

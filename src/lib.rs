/// Standard Reader - resilient read path for site.standard records
///
/// Fetches publications and documents from a DID's repository on the AT
/// Protocol network. The repository's home endpoint is resolved and cached,
/// a public aggregator is used when the home endpoint fails, and all results
/// live in an injected in-memory TTL cache.

pub mod agent;
pub mod at_uri;
pub mod cache;
pub mod config;
pub mod error;
pub mod identity;
pub mod record;
pub mod repository;

pub use agent::{AgentFactory, FallbackExecutor, RawRecord, RecordPage, RepoAgent};
pub use at_uri::AtUri;
pub use cache::{CachedValue, RecordCache, TtlCache};
pub use config::ReaderConfig;
pub use error::{EndpointFailure, EndpointFailures, ReaderError, ReaderResult};
pub use identity::{IdentityResolver, ResolvedIdentity};
pub use record::{AnyRecord, Collection, Document, Publication, RecordEnvelope};
pub use repository::RecordRepository;

/// Create a repository for `config` using the default HTTP transport
pub fn create_client(config: ReaderConfig) -> ReaderResult<RecordRepository> {
    RecordRepository::new(config)
}

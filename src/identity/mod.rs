/// Identity Resolution
///
/// Resolves a DID to its current home endpoint (PDS) through an external
/// resolution service, caching the result in the shared TTL cache.

pub mod resolver;

pub use resolver::IdentityResolver;

use serde::{Deserialize, Serialize};

/// A DID together with the endpoint currently hosting its repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedIdentity {
    pub did: String,
    /// Home endpoint (PDS) base URL
    #[serde(rename = "pds")]
    pub home_endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
}

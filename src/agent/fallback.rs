/// Dual-endpoint fallback execution
///
/// An operation runs against the DID's home endpoint first and, if anything
/// fails (including resolving the home endpoint), once more against the
/// public fallback endpoint. There is no retry within an endpoint.

use crate::{
    agent::{AgentFactory, RepoAgent},
    error::{EndpointFailures, ReaderError, ReaderResult},
    identity::IdentityResolver,
};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// Runs repository operations with home-then-public fallback
#[derive(Clone)]
pub struct FallbackExecutor {
    resolver: IdentityResolver,
    agents: Arc<dyn AgentFactory>,
    fallback_url: String,
    home_override: Option<String>,
}

impl FallbackExecutor {
    pub fn new(
        resolver: IdentityResolver,
        agents: Arc<dyn AgentFactory>,
        fallback_url: impl Into<String>,
        home_override: Option<String>,
    ) -> Self {
        Self {
            resolver,
            agents,
            fallback_url: fallback_url.into(),
            home_override,
        }
    }

    pub fn resolver(&self) -> &IdentityResolver {
        &self.resolver
    }

    pub fn fallback_url(&self) -> &str {
        &self.fallback_url
    }

    /// Home endpoint for `did`: the configured override, else the resolved PDS
    pub async fn home_endpoint(&self, did: &str) -> ReaderResult<String> {
        if let Some(pds) = &self.home_override {
            return Ok(pds.clone());
        }
        Ok(self.resolver.resolve(did).await?.home_endpoint)
    }

    /// Run `operation` against the home endpoint, then the public fallback
    ///
    /// On double failure the error carries both attempts in order; the last
    /// one is the fallback's.
    pub async fn with_fallback<T, F, Fut>(&self, did: &str, operation: F) -> ReaderResult<T>
    where
        F: Fn(Arc<dyn RepoAgent>) -> Fut,
        Fut: Future<Output = ReaderResult<T>>,
    {
        let mut failures = EndpointFailures::new();

        match self.home_endpoint(did).await {
            Ok(home) => match operation(self.agents.agent(&home)).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!("Home endpoint {} failed, trying fallback: {}", home, e);
                    failures.push(home, e);
                }
            },
            Err(e) => {
                warn!("Could not resolve home endpoint for {}: {}", did, e);
                failures.push(format!("home endpoint of {}", did), e);
            }
        }

        debug!("Using public fallback {}", self.fallback_url);
        match operation(self.agents.agent(&self.fallback_url)).await {
            Ok(value) => Ok(value),
            Err(e) => {
                failures.push(self.fallback_url.clone(), e);
                Err(ReaderError::EndpointsExhausted(failures))
            }
        }
    }
}

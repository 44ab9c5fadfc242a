/// Configuration management for the standard.site reader
use crate::error::{ReaderError, ReaderResult};
use std::collections::HashMap;
use std::env;
use std::path::Path;
use std::time::Duration;

/// Default cache TTL (5 minutes)
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_millis(300_000);

/// Identity resolution service queried with `?identifier={did}`
pub const DEFAULT_RESOLVER_URL: &str = "https://slingshot.microcosm.blue";

/// Public aggregator used when the home endpoint fails
pub const DEFAULT_FALLBACK_URL: &str = "https://public.api.bsky.app";

/// Reader configuration
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Repository owner whose records are read
    pub did: String,
    /// Home endpoint override; skips identity resolution when set
    pub pds: Option<String>,
    /// TTL applied to everything this reader caches
    pub cache_ttl: Duration,
    /// Base URL of the identity resolution service
    pub resolver_url: String,
    /// Base URL of the public fallback endpoint
    pub fallback_url: String,
    /// User-Agent header for HTTP requests
    pub user_agent: String,
    /// Per-request timeout for the default HTTP transport
    pub request_timeout: Duration,
}

impl ReaderConfig {
    /// Configuration with defaults for everything except the DID
    pub fn new(did: impl Into<String>) -> Self {
        Self {
            did: did.into(),
            pds: None,
            cache_ttl: DEFAULT_CACHE_TTL,
            resolver_url: DEFAULT_RESOLVER_URL.to_string(),
            fallback_url: DEFAULT_FALLBACK_URL.to_string(),
            user_agent: format!("standard-reader/{}", env!("CARGO_PKG_VERSION")),
            request_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_pds(mut self, pds: impl Into<String>) -> Self {
        self.pds = Some(pds.into());
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_resolver_url(mut self, url: impl Into<String>) -> Self {
        self.resolver_url = url.into();
        self
    }

    pub fn with_fallback_url(mut self, url: impl Into<String>) -> Self {
        self.fallback_url = url.into();
        self
    }

    /// Load configuration from environment variables (and `.env` if present)
    pub fn from_env() -> ReaderResult<Self> {
        Self::from_env_with_did(None)
    }

    /// Like `from_env`, but `did` (when given) takes precedence over `PUBLIC_ATPROTO_DID`
    pub fn from_env_with_did(did: Option<&str>) -> ReaderResult<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(with_did_override(|key| env::var(key).ok(), did))
    }

    /// Load configuration from a dotenv-style file without touching the process environment
    pub fn from_env_file(path: impl AsRef<Path>) -> ReaderResult<Self> {
        let path = path.as_ref();
        let iter = dotenv::from_path_iter(path).map_err(|e| {
            ReaderError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let mut vars = HashMap::new();
        for item in iter {
            let (key, value) =
                item.map_err(|e| ReaderError::Config(format!("Malformed env file: {}", e)))?;
            vars.insert(key, value);
        }

        Self::from_lookup(|key| vars.get(key).cloned())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ReaderResult<Self> {
        let did = lookup("PUBLIC_ATPROTO_DID")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                ReaderError::Config(
                    "Missing required environment variable: PUBLIC_ATPROTO_DID".to_string(),
                )
            })?;

        let mut config = Self::new(did);

        config.pds = lookup("PUBLIC_ATPROTO_PDS").filter(|v| !v.is_empty());

        if let Some(ttl) = lookup("PUBLIC_CACHE_TTL").filter(|v| !v.is_empty()) {
            let millis: u64 = ttl
                .trim()
                .parse()
                .map_err(|_| ReaderError::Config(format!("Invalid PUBLIC_CACHE_TTL: {}", ttl)))?;
            config.cache_ttl = Duration::from_millis(millis);
        }

        if let Some(url) = lookup("STANDARD_READER_RESOLVER_URL").filter(|v| !v.is_empty()) {
            config.resolver_url = url;
        }
        if let Some(url) = lookup("STANDARD_READER_FALLBACK_URL").filter(|v| !v.is_empty()) {
            config.fallback_url = url;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> ReaderResult<()> {
        if !self.did.starts_with("did:") {
            return Err(ReaderError::Config(format!(
                "DID must start with 'did:': {}",
                self.did
            )));
        }

        if let Some(pds) = &self.pds {
            check_http_url("pds", pds)?;
        }
        check_http_url("resolver_url", &self.resolver_url)?;
        check_http_url("fallback_url", &self.fallback_url)?;

        Ok(())
    }
}

fn with_did_override<'a>(
    lookup: impl Fn(&str) -> Option<String> + 'a,
    did: Option<&'a str>,
) -> impl Fn(&str) -> Option<String> + 'a {
    move |key: &str| match did {
        Some(did) if key == "PUBLIC_ATPROTO_DID" => Some(did.to_string()),
        _ => lookup(key),
    }
}

fn check_http_url(field: &str, value: &str) -> ReaderResult<()> {
    if value.starts_with("https://") || value.starts_with("http://") {
        Ok(())
    } else {
        Err(ReaderError::Config(format!(
            "{} must be an http(s) URL: {}",
            field, value
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_defaults() {
        let config = ReaderConfig::new("did:plc:abc");
        assert_eq!(config.cache_ttl, Duration::from_millis(300_000));
        assert_eq!(config.resolver_url, DEFAULT_RESOLVER_URL);
        assert_eq!(config.fallback_url, DEFAULT_FALLBACK_URL);
        assert!(config.pds.is_none());
        assert_ok!(config.validate());
    }

    #[test]
    fn test_rejects_non_did() {
        let config = ReaderConfig::new("alice.bsky.social");
        assert!(matches!(config.validate(), Err(ReaderError::Config(_))));
    }

    #[test]
    fn test_rejects_non_http_pds() {
        let config = ReaderConfig::new("did:plc:abc").with_pds("ftp://pds.example");
        assert!(matches!(config.validate(), Err(ReaderError::Config(_))));
    }

    #[test]
    fn test_lookup_reads_all_fields() {
        let vars: HashMap<&str, &str> = [
            ("PUBLIC_ATPROTO_DID", "did:plc:xyz"),
            ("PUBLIC_ATPROTO_PDS", "https://pds.example"),
            ("PUBLIC_CACHE_TTL", "1500"),
        ]
        .into_iter()
        .collect();

        let config =
            ReaderConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.did, "did:plc:xyz");
        assert_eq!(config.pds.as_deref(), Some("https://pds.example"));
        assert_eq!(config.cache_ttl, Duration::from_millis(1500));
    }

    #[test]
    fn test_lookup_empty_pds_is_unset() {
        let config = ReaderConfig::from_lookup(|k| match k {
            "PUBLIC_ATPROTO_DID" => Some("did:plc:xyz".into()),
            "PUBLIC_ATPROTO_PDS" => Some(String::new()),
            _ => None,
        })
        .unwrap();
        assert!(config.pds.is_none());
    }

    #[test]
    fn test_lookup_missing_did() {
        let result = ReaderConfig::from_lookup(|_| None);
        assert!(matches!(result, Err(ReaderError::Config(msg)) if msg.contains("PUBLIC_ATPROTO_DID")));
    }

    #[test]
    fn test_lookup_bad_ttl() {
        let result = ReaderConfig::from_lookup(|k| match k {
            "PUBLIC_ATPROTO_DID" => Some("did:plc:xyz".into()),
            "PUBLIC_CACHE_TTL" => Some("five minutes".into()),
            _ => None,
        });
        assert_err!(result);
    }

    #[test]
    fn test_did_override_keeps_other_settings() {
        let file_vars = |k: &str| match k {
            "PUBLIC_ATPROTO_PDS" => Some("https://pds.example".to_string()),
            "STANDARD_READER_RESOLVER_URL" => Some("http://127.0.0.1:7000".to_string()),
            _ => None,
        };

        let config =
            ReaderConfig::from_lookup(with_did_override(file_vars, Some("did:plc:flag"))).unwrap();
        assert_eq!(config.did, "did:plc:flag");
        assert_eq!(config.pds.as_deref(), Some("https://pds.example"));
        assert_eq!(config.resolver_url, "http://127.0.0.1:7000");
    }

    #[test]
    fn test_did_override_wins_and_bad_values_still_fail() {
        let vars = |k: &str| match k {
            "PUBLIC_ATPROTO_DID" => Some("did:plc:env".to_string()),
            "PUBLIC_CACHE_TTL" => Some("soon".to_string()),
            _ => None,
        };

        let result = ReaderConfig::from_lookup(with_did_override(vars, Some("did:plc:flag")));
        assert!(matches!(result, Err(ReaderError::Config(msg)) if msg.contains("PUBLIC_CACHE_TTL")));

        let without_ttl = |k: &str| match k {
            "PUBLIC_ATPROTO_DID" => Some("did:plc:env".to_string()),
            _ => None,
        };
        let config =
            ReaderConfig::from_lookup(with_did_override(without_ttl, Some("did:plc:flag"))).unwrap();
        assert_eq!(config.did, "did:plc:flag");

        let config = ReaderConfig::from_lookup(with_did_override(without_ttl, None)).unwrap();
        assert_eq!(config.did, "did:plc:env");
    }

    #[test]
    fn test_from_env_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "PUBLIC_ATPROTO_DID=did:web:blog.example").unwrap();
        writeln!(file, "PUBLIC_CACHE_TTL=60000").unwrap();
        writeln!(file, "STANDARD_READER_FALLBACK_URL=http://127.0.0.1:9000").unwrap();

        let config = ReaderConfig::from_env_file(file.path()).unwrap();
        assert_eq!(config.did, "did:web:blog.example");
        assert_eq!(config.cache_ttl, Duration::from_secs(60));
        assert_eq!(config.fallback_url, "http://127.0.0.1:9000");
        assert_eq!(config.resolver_url, DEFAULT_RESOLVER_URL);
    }
}

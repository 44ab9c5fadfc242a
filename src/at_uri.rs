/// AT URI parsing and building
///
/// Resource URIs have the form `at://{did}/{collection}/{rkey}` with exactly
/// three segments after the scheme. Anything else is rejected outright; there
/// are no partial matches.

use std::fmt;

pub const SCHEME: &str = "at://";
pub const DID_PREFIX: &str = "did:";

/// Components of a valid AT URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtUri {
    pub did: String,
    pub collection: String,
    pub rkey: String,
}

impl AtUri {
    /// Parse an AT URI, returning `None` when it is not well formed
    pub fn parse(uri: &str) -> Option<Self> {
        let rest = uri.strip_prefix(SCHEME)?;

        let mut parts = rest.split('/');
        let did = parts.next()?;
        let collection = parts.next()?;
        let rkey = parts.next()?;
        if parts.next().is_some() {
            return None;
        }

        if !did.starts_with(DID_PREFIX) || collection.is_empty() || rkey.is_empty() {
            return None;
        }

        Some(Self {
            did: did.to_string(),
            collection: collection.to_string(),
            rkey: rkey.to_string(),
        })
    }

    pub fn new(
        did: impl Into<String>,
        collection: impl Into<String>,
        rkey: impl Into<String>,
    ) -> Self {
        Self {
            did: did.into(),
            collection: collection.into(),
            rkey: rkey.into(),
        }
    }

    /// XRPC `getRecord` URL for this record on the given endpoint
    pub fn to_https(&self, endpoint: &str) -> String {
        format!(
            "{}/xrpc/com.atproto.repo.getRecord?repo={}&collection={}&rkey={}",
            endpoint.trim_end_matches('/'),
            urlencoding::encode(&self.did),
            urlencoding::encode(&self.collection),
            urlencoding::encode(&self.rkey)
        )
    }
}

impl fmt::Display for AtUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}/{}/{}", SCHEME, self.did, self.collection, self.rkey)
    }
}

/// Build an AT URI string from its parts
pub fn build(did: &str, collection: &str, rkey: &str) -> String {
    format!("{}{}/{}/{}", SCHEME, did, collection, rkey)
}

/// Record key of an AT URI, if the URI is valid
pub fn extract_rkey(uri: &str) -> Option<String> {
    AtUri::parse(uri).map(|parsed| parsed.rkey)
}

pub fn is_valid(uri: &str) -> bool {
    AtUri::parse(uri).is_some()
}

/// Convert an AT URI to its `getRecord` HTTPS URL on `endpoint`
pub fn to_https_url(uri: &str, endpoint: &str) -> Option<String> {
    AtUri::parse(uri).map(|parsed| parsed.to_https(endpoint))
}

/// Public blob URL for a content id stored in `did`'s repository
pub fn blob_url(endpoint: &str, did: &str, cid: &str) -> String {
    format!(
        "{}/xrpc/com.atproto.sync.getBlob?did={}&cid={}",
        endpoint.trim_end_matches('/'),
        urlencoding::encode(did),
        urlencoding::encode(cid)
    )
}

/// Record envelopes and the collections this reader understands

pub mod document;
pub mod models;

pub use models::{
    BasicTheme, BlobRef, Document, OpaqueValue, Publication, PublicationPreferences, RgbColor,
    StrongRef,
};

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// NSID of publication records
pub const PUBLICATION_COLLECTION: &str = "site.standard.publication";

/// NSID of document records
pub const DOCUMENT_COLLECTION: &str = "site.standard.document";

/// Known record collections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Publication,
    Document,
}

impl Collection {
    pub fn from_nsid(nsid: &str) -> Option<Self> {
        match nsid {
            PUBLICATION_COLLECTION => Some(Self::Publication),
            DOCUMENT_COLLECTION => Some(Self::Document),
            _ => None,
        }
    }

    pub fn nsid(self) -> &'static str {
        match self {
            Self::Publication => PUBLICATION_COLLECTION,
            Self::Document => DOCUMENT_COLLECTION,
        }
    }
}

/// Caller-facing record: URI, content id (empty when the backend omits it) and value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordEnvelope<T> {
    pub uri: String,
    pub cid: String,
    pub value: T,
}

/// A record from any known collection
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "$type", content = "record")]
pub enum AnyRecord {
    #[serde(rename = "site.standard.publication")]
    Publication(Arc<RecordEnvelope<Publication>>),
    #[serde(rename = "site.standard.document")]
    Document(Arc<RecordEnvelope<Document>>),
}

impl AnyRecord {
    pub fn uri(&self) -> &str {
        match self {
            Self::Publication(r) => &r.uri,
            Self::Document(r) => &r.uri,
        }
    }

    pub fn collection(&self) -> Collection {
        match self {
            Self::Publication(_) => Collection::Publication,
            Self::Document(_) => Collection::Document,
        }
    }

    pub fn as_publication(&self) -> Option<&Arc<RecordEnvelope<Publication>>> {
        match self {
            Self::Publication(r) => Some(r),
            Self::Document(_) => None,
        }
    }

    pub fn as_document(&self) -> Option<&Arc<RecordEnvelope<Document>>> {
        match self {
            Self::Document(r) => Some(r),
            Self::Publication(_) => None,
        }
    }
}

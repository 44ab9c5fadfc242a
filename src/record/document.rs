/// Slug and URL helpers for document records
use crate::at_uri::{self, SCHEME};
use crate::record::{Document, RecordEnvelope};

impl RecordEnvelope<Document> {
    /// Document path without its leading slash, else the record key, else empty
    pub fn slug(&self) -> String {
        if let Some(path) = self.value.path.as_deref().filter(|p| !p.is_empty()) {
            return path.trim_start_matches('/').to_string();
        }
        at_uri::extract_rkey(&self.uri).unwrap_or_default()
    }

    /// Canonical URL for linking to this document
    ///
    /// Documents whose site is an AT URI are served from the local
    /// `/documents/{slug}` route; documents on an external site join that
    /// site's URL with their path.
    pub fn canonical_url(&self) -> String {
        if self.value.site.starts_with(SCHEME) {
            return format!("/documents/{}", self.slug());
        }

        if let Some(path) = self.value.path.as_deref().filter(|p| !p.is_empty()) {
            return format!(
                "{}/{}",
                self.value.site.trim_end_matches('/'),
                path.trim_start_matches('/')
            );
        }

        format!(
            "/documents/{}",
            at_uri::extract_rkey(&self.uri).unwrap_or_default()
        )
    }

    /// Whether this document's parent publication has record key `publication_rkey`
    pub fn belongs_to(&self, publication_rkey: &str) -> bool {
        at_uri::extract_rkey(&self.value.site).as_deref() == Some(publication_rkey)
    }
}

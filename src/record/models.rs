/// Record value types for site.standard.* lexicons
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize, Serializer};

/// RGB colour, each channel 0-255
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// Basic publication theme
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicTheme {
    pub background: RgbColor,
    pub foreground: RgbColor,
    pub accent: RgbColor,
    pub accent_foreground: RgbColor,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicationPreferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_in_discover: Option<bool>,
}

/// Strong reference to another record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrongRef {
    pub uri: String,
    pub cid: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CidLink {
    #[serde(rename = "$link")]
    pub link: String,
}

/// Blob reference as stored in a record
///
/// Accepts both `{ref: {$link}}` and the legacy `{cid}` shape.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobRef {
    #[serde(rename = "ref", default)]
    pub reference: Option<CidLink>,
    #[serde(default)]
    pub cid: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

impl BlobRef {
    /// Content identifier of the referenced blob
    pub fn content_id(&self) -> Option<&str> {
        self.reference
            .as_ref()
            .map(|r| r.link.as_str())
            .filter(|s| !s.is_empty())
            .or_else(|| self.cid.as_deref().filter(|s| !s.is_empty()))
    }
}

/// A forward-compatible payload whose shape this crate does not interpret
///
/// Serializes back exactly as received.
#[derive(Debug, Clone, PartialEq)]
pub struct OpaqueValue {
    /// `$type` discriminator, when the payload is an object carrying one
    pub kind: Option<String>,
    pub value: serde_json::Value,
}

impl<'de> Deserialize<'de> for OpaqueValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        let kind = value
            .get("$type")
            .and_then(|t| t.as_str())
            .map(str::to_string);
        Ok(Self { kind, value })
    }
}

impl Serialize for OpaqueValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.value.serialize(serializer)
    }
}

/// Publication value with its icon materialized to a URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Publication {
    pub url: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basic_theme: Option<BasicTheme>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferences: Option<PublicationPreferences>,
}

/// Document value with its cover image materialized to a URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// AT URI of the parent publication, or an HTTPS URL
    pub site: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<OpaqueValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bsky_post_ref: Option<StrongRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    pub published_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Document {
    /// `publishedAt` parsed as RFC 3339, if well formed
    pub fn published_at_time(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.published_at)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// Publication value as it comes off the wire
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawPublication {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "lenient")]
    pub icon: Option<BlobRef>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub basic_theme: Option<BasicTheme>,
    #[serde(default, deserialize_with = "lenient")]
    pub preferences: Option<PublicationPreferences>,
}

impl RawPublication {
    pub fn into_publication(self, icon: Option<String>) -> Publication {
        Publication {
            url: self.url,
            name: self.name,
            icon,
            description: self.description,
            basic_theme: self.basic_theme,
            preferences: self.preferences,
        }
    }
}

/// Document value as it comes off the wire
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawDocument {
    #[serde(default)]
    pub site: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub cover_image: Option<BlobRef>,
    #[serde(default)]
    pub content: Option<OpaqueValue>,
    #[serde(default)]
    pub text_content: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub bsky_post_ref: Option<StrongRef>,
    #[serde(default, deserialize_with = "lenient")]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub published_at: String,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl RawDocument {
    pub fn into_document(self, cover_image: Option<String>) -> Document {
        Document {
            site: self.site,
            title: self.title,
            path: self.path,
            description: self.description,
            cover_image,
            content: self.content,
            text_content: self.text_content,
            bsky_post_ref: self.bsky_post_ref,
            tags: self.tags,
            published_at: self.published_at,
            updated_at: self.updated_at,
        }
    }
}

/// Decode an optional field, treating a malformed value as absent
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

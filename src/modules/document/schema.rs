use serde::{Deserialize, Deserializer, Serialize};

/// Coarse classification telling the provider how to store and deliver an asset.
///
/// JSON, query, form and multipart inputs all go through [`FromStr`], so
/// parsing is case-insensitive everywhere and an empty value means `auto`.
///
/// [`FromStr`]: std::str::FromStr
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    #[default]
    Auto,
    Image,
    Raw,
    Video,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Auto => "auto",
            ResourceType::Image => "image",
            ResourceType::Raw => "raw",
            ResourceType::Video => "video",
        }
    }

    /// Type segment used for delivery URLs and destroy calls, where `auto` is
    /// not accepted and the provider's default type applies.
    pub fn delivery_type(&self) -> &'static str {
        match self {
            ResourceType::Auto => ResourceType::Image.as_str(),
            other => other.as_str(),
        }
    }
}

impl std::str::FromStr for ResourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(ResourceType::Auto),
            "image" => Ok(ResourceType::Image),
            "raw" => Ok(ResourceType::Raw),
            "video" => Ok(ResourceType::Video),
            other => Err(format!(
                "Unknown resource_type '{}', expected one of auto, image, raw, video",
                other
            )),
        }
    }
}

impl<'de> Deserialize<'de> for ResourceType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}

/// A document as it arrives at the service, before any decoding.
#[derive(Debug)]
pub enum RawInput {
    Base64 { content: String, filename: String, allow_data_uri: bool },
    Multipart { bytes: Vec<u8>, declared_filename: Option<String> },
    ServerPath { path: String },
}

/// Canonical form every input shape is reduced to.
#[derive(Debug, Clone)]
pub struct NormalizedDocument {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub extension: Option<String>,
    pub content_type: String,
    pub resource_type_hint: ResourceType,
}

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub document: NormalizedDocument,
    pub folder: Option<String>,
    pub resource_type: ResourceType,
    pub public_id: Option<String>,
    pub overwrite: bool,
}

/// Where and how the provider should place an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierPlan {
    pub folder: String,
    pub public_id: Option<String>,
    pub overwrite: bool,
    pub invalidate: bool,
}

/// Outcome of an upload. Either `success` with `url` and `public_id`, or a
/// failure carrying `error`; the constructors keep the two shapes apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Descriptive fields of a stored asset, as reported by the provider.
#[derive(Debug, Clone, Default)]
pub struct AssetDetails {
    pub format: Option<String>,
    pub resource_type: Option<String>,
    pub bytes: Option<u64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl UploadResult {
    pub fn uploaded(url: String, public_id: String, details: AssetDetails) -> Self {
        Self {
            success: true,
            url: Some(url),
            public_id: Some(public_id),
            format: details.format,
            resource_type: details.resource_type,
            bytes: details.bytes,
            width: details.width,
            height: details.height,
            created_at: details.created_at,
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            url: None,
            public_id: None,
            format: None,
            resource_type: None,
            bytes: None,
            width: None,
            height: None,
            created_at: None,
            error: Some(message.into()),
        }
    }

    /// The handle a caller persists to resolve or delete the asset later.
    pub fn asset_ref(&self) -> Option<StoredAssetRef> {
        let public_id = self.public_id.clone().filter(|_| self.success)?;
        Some(StoredAssetRef {
            public_id,
            resource_type: self.resource_type.clone().unwrap_or_else(|| "image".to_string()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlResult {
    pub url: String,
    pub public_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeleteResult {
    /// Mirrors the provider's status string; only "ok" counts as success.
    pub fn from_status(status: impl Into<String>) -> Self {
        let status = status.into();
        Self { success: status == "ok", result: Some(status), error: None }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self { success: false, result: None, error: Some(message.into()) }
    }

    pub fn is_not_found(&self) -> bool {
        self.result.as_deref() == Some("not found")
    }
}

/// Minimal durable handle of an uploaded asset, owned by the caller's store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredAssetRef {
    pub public_id: String,
    pub resource_type: String,
}

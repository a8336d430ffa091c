use serde::Deserialize;
use std::path::PathBuf;
use validator::Validate;

use crate::{constants, modules::document::schema::ResourceType, ENV};

/// Optional placement fields shared by every upload endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadOptions {
    pub folder: Option<String>,
    pub resource_type: ResourceType,
    pub public_id: Option<String>,
    pub overwrite: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct Base64UploadRequest {
    #[serde(alias = "fileUrl")]
    pub file_base64: Option<String>,
    #[validate(length(max = 255))]
    pub filename: Option<String>,
    #[validate(length(max = 255))]
    pub folder: Option<String>,
    #[serde(default)]
    pub resource_type: ResourceType,
    #[validate(length(max = 255))]
    pub public_id: Option<String>,
    #[serde(default)]
    pub overwrite: bool,
}

impl Base64UploadRequest {
    pub fn options(&self) -> UploadOptions {
        UploadOptions {
            folder: self.folder.clone(),
            resource_type: self.resource_type,
            public_id: self.public_id.clone(),
            overwrite: self.overwrite,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct PathUploadRequest {
    #[validate(length(min = 1, max = 4096))]
    pub file_path: String,
    #[validate(length(max = 255))]
    pub folder: Option<String>,
    #[serde(default)]
    pub resource_type: ResourceType,
    #[validate(length(max = 255))]
    pub public_id: Option<String>,
    #[serde(default)]
    pub overwrite: bool,
}

impl PathUploadRequest {
    pub fn options(&self) -> UploadOptions {
        UploadOptions {
            folder: self.folder.clone(),
            resource_type: self.resource_type,
            public_id: self.public_id.clone(),
            overwrite: self.overwrite,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResourceTypeQuery {
    #[serde(default)]
    pub resource_type: ResourceType,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PublicIdQuery {
    #[validate(length(min = 1, max = 512))]
    pub public_id: String,
    #[serde(default)]
    pub resource_type: ResourceType,
}

/// Document upload configuration
#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub max_file_size: usize,
    pub default_folder: String,
    pub path_upload_root: Option<PathBuf>,
}

impl UploadConfig {
    pub fn from_env() -> Self {
        Self {
            max_file_size: ENV.max_upload_bytes,
            default_folder: ENV.default_folder.clone(),
            path_upload_root: ENV.path_upload_root.clone(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size: 10 * 1024 * 1024, // 10MB
            default_folder: constants::DEFAULT_FOLDER.to_string(),
            path_upload_root: None,
        }
    }
}

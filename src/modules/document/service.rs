use std::sync::Arc;

use crate::api::error;
use crate::modules::document::{
    identifier::{clean_public_id, validate_public_id, IdentifierPolicy},
    model::{Base64UploadRequest, UploadConfig, UploadOptions},
    normalizer::InputNormalizer,
    schema::{DeleteResult, RawInput, ResourceType, UploadRequest, UploadResult, UrlResult},
    storage::StorageGateway,
};

/// Entry point for every document operation. Holds no per-request state, so
/// one instance is shared by all workers.
#[derive(Clone)]
pub struct DocumentService<S>
where
    S: StorageGateway + Send + Sync,
{
    storage: Arc<S>,
    normalizer: InputNormalizer,
    policy: IdentifierPolicy,
    max_file_size: usize,
}

impl<S> DocumentService<S>
where
    S: StorageGateway + Send + Sync,
{
    pub fn new(storage: Arc<S>, config: UploadConfig) -> Self {
        log::info!("DocumentService initialized, default folder '{}'", config.default_folder);
        Self {
            storage,
            normalizer: InputNormalizer::new(&config),
            policy: IdentifierPolicy::new(config.default_folder),
            max_file_size: config.max_file_size,
        }
    }

    /// Upper bound on decoded document size, also used to cap streamed bodies.
    pub fn max_file_size(&self) -> usize {
        self.max_file_size
    }

    pub async fn upload_base64(
        &self,
        request: Base64UploadRequest,
    ) -> Result<UploadResult, error::SystemError> {
        let options = request.options();

        let content = request
            .file_base64
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| error::SystemError::invalid_input("file_base64 is required"))?;
        let filename = request
            .filename
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| error::SystemError::invalid_input("filename is required"))?;

        let input = RawInput::Base64 { content, filename, allow_data_uri: true };
        self.upload(input, options).await
    }

    pub async fn upload_multipart(
        &self,
        bytes: Vec<u8>,
        filename: Option<String>,
        options: UploadOptions,
    ) -> Result<UploadResult, error::SystemError> {
        self.upload(RawInput::Multipart { bytes, declared_filename: filename }, options).await
    }

    pub async fn upload_from_server_path(
        &self,
        path: String,
        options: UploadOptions,
    ) -> Result<UploadResult, error::SystemError> {
        if path.trim().is_empty() {
            return Err(error::SystemError::invalid_input("file_path is required"));
        }
        self.upload(RawInput::ServerPath { path }, options).await
    }

    pub fn get_url(
        &self,
        public_id: &str,
        resource_type: ResourceType,
    ) -> Result<UrlResult, error::SystemError> {
        let public_id = clean_public_id(public_id);
        validate_public_id(public_id)?;
        Ok(self.storage.resolve_url(public_id, resource_type))
    }

    pub async fn delete_asset(
        &self,
        public_id: &str,
        resource_type: ResourceType,
    ) -> Result<DeleteResult, error::SystemError> {
        let public_id = clean_public_id(public_id);
        validate_public_id(public_id)?;
        Ok(self.storage.delete(public_id, resource_type).await)
    }

    /// normalize -> derive identifier -> provider upload
    async fn upload(
        &self,
        input: RawInput,
        options: UploadOptions,
    ) -> Result<UploadResult, error::SystemError> {
        let document = self.normalizer.normalize(input, options.resource_type).await?;

        let request = UploadRequest {
            document,
            folder: options.folder,
            resource_type: options.resource_type,
            public_id: options.public_id,
            overwrite: options.overwrite,
        };
        let plan = self.policy.derive(&request)?;

        Ok(self.storage.upload(&request.document, &plan, request.resource_type).await)
    }
}

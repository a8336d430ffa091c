use std::{collections::BTreeMap, sync::Arc};

use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use reqwest::multipart::{Form, Part};
use serde::{de::DeserializeOwned, Deserialize};
use sha1::Sha1;
use sha2::{Digest, Sha256};

use crate::{
    api::error,
    configs::{CloudinaryConfig, SignatureAlgorithm},
    modules::document::{
        schema::{
            AssetDetails, DeleteResult, IdentifierPlan, NormalizedDocument, ResourceType,
            UploadResult, UrlResult,
        },
        storage::StorageGateway,
    },
};

/// Characters escaped inside a public id when it is placed in a delivery URL.
/// `/` is kept so folder segments stay readable.
const PUBLIC_ID_ESCAPE: &AsciiSet =
    &CONTROLS.add(b' ').add(b'"').add(b'#').add(b'%').add(b'<').add(b'>').add(b'?').add(b'`');

#[derive(Deserialize)]
struct ProviderError {
    message: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ProviderError,
}

#[derive(Deserialize)]
struct UploadResponse {
    public_id: Option<String>,
    secure_url: Option<String>,
    url: Option<String>,
    format: Option<String>,
    resource_type: Option<String>,
    bytes: Option<u64>,
    width: Option<u32>,
    height: Option<u32>,
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    existing: bool,
}

#[derive(Deserialize)]
struct DestroyResponse {
    result: Option<String>,
}

/// Cloudinary upload API client.
#[derive(Clone)]
pub struct CloudinaryStorage {
    client: reqwest::Client,
    config: Arc<CloudinaryConfig>,
}

impl CloudinaryStorage {
    pub fn new(client: reqwest::Client, config: CloudinaryConfig) -> Self {
        log::info!("CloudinaryStorage initialized for cloud '{}'", config.cloud_name);
        Self { client, config: Arc::new(config) }
    }

    fn endpoint(&self, resource_type: &str, action: &str) -> String {
        format!(
            "{}/v1_1/{}/{}/{}",
            self.config.api_base, self.config.cloud_name, resource_type, action
        )
    }

    /// Digest over the `k=v&k=v` joined parameters (sorted by key) followed by
    /// the API secret.
    fn sign(&self, params: &BTreeMap<&'static str, String>) -> String {
        let to_sign =
            params.iter().map(|(k, v)| format!("{}={}", k, v)).collect::<Vec<_>>().join("&");

        match self.config.signature_algorithm {
            SignatureAlgorithm::Sha1 => hex_digest::<Sha1>(&to_sign, &self.config.api_secret),
            SignatureAlgorithm::Sha256 => hex_digest::<Sha256>(&to_sign, &self.config.api_secret),
        }
    }

    fn signed_params(
        &self,
        mut params: BTreeMap<&'static str, String>,
    ) -> Vec<(&'static str, String)> {
        params.insert("timestamp", Utc::now().timestamp().to_string());
        let signature = self.sign(&params);

        let mut signed: Vec<(&'static str, String)> = params.into_iter().collect();
        signed.push(("api_key", self.config.api_key.clone()));
        signed.push(("signature", signature));
        if self.config.signature_algorithm != SignatureAlgorithm::Sha1 {
            signed.push(("signature_algorithm", self.config.signature_algorithm.as_str().to_string()));
        }
        signed
    }

    async fn try_upload(
        &self,
        document: &NormalizedDocument,
        plan: &IdentifierPlan,
        resource_type: ResourceType,
    ) -> Result<UploadResult, error::SystemError> {
        let mut params = BTreeMap::new();
        params.insert("folder", plan.folder.clone());
        params.insert("overwrite", plan.overwrite.to_string());
        params.insert("invalidate", plan.invalidate.to_string());
        params.insert("use_filename", false.to_string());
        if let Some(public_id) = &plan.public_id {
            params.insert("public_id", public_id.clone());
        }

        let file = Part::bytes(document.bytes.clone())
            .file_name(document.filename.clone())
            .mime_str(&document.content_type)?;
        let form = self
            .signed_params(params)
            .into_iter()
            .fold(Form::new(), |form, (key, value)| form.text(key, value))
            .part("file", file);

        let response = self
            .client
            .post(self.endpoint(resource_type.as_str(), "upload"))
            .multipart(form)
            .send()
            .await?;
        let body: UploadResponse = read_json(response).await?;

        if body.existing && !plan.overwrite {
            let public_id = body.public_id.or_else(|| plan.public_id.clone()).unwrap_or_default();
            log::warn!("Upload refused, asset '{}' already exists", public_id);
            return Ok(UploadResult::failed(format!(
                "An asset already exists at public_id '{}' and overwrite is disabled",
                public_id
            )));
        }

        let (Some(url), Some(public_id)) = (body.secure_url.or(body.url), body.public_id) else {
            return Err(error::SystemError::provider("Upload response is missing url or public_id"));
        };

        // raw assets come back without a format
        let format = body.format.or_else(|| document.extension.clone());
        let details = AssetDetails {
            format,
            resource_type: body.resource_type,
            bytes: body.bytes,
            width: body.width,
            height: body.height,
            created_at: body.created_at,
        };

        Ok(UploadResult::uploaded(url, public_id, details))
    }

    async fn try_delete(
        &self,
        public_id: &str,
        resource_type: ResourceType,
    ) -> Result<DeleteResult, error::SystemError> {
        let mut params = BTreeMap::new();
        params.insert("public_id", public_id.to_string());
        params.insert("invalidate", true.to_string());

        let response = self
            .client
            .post(self.endpoint(resource_type.delivery_type(), "destroy"))
            .form(&self.signed_params(params))
            .send()
            .await?;
        let body: DestroyResponse = read_json(response).await?;

        let status = body
            .result
            .ok_or_else(|| error::SystemError::provider("Destroy response is missing result"))?;
        Ok(DeleteResult::from_status(status))
    }
}

#[async_trait::async_trait]
impl StorageGateway for CloudinaryStorage {
    async fn upload(
        &self,
        document: &NormalizedDocument,
        plan: &IdentifierPlan,
        resource_type: ResourceType,
    ) -> UploadResult {
        match self.try_upload(document, plan, resource_type).await {
            Ok(result) => {
                if result.success {
                    log::info!(
                        "Uploaded '{}' ({} bytes) as {}",
                        document.filename,
                        document.bytes.len(),
                        result.public_id.as_deref().unwrap_or_default()
                    );
                }
                result
            }
            Err(err) => {
                log::error!("Upload of '{}' failed: {}", document.filename, err);
                UploadResult::failed(describe(&err))
            }
        }
    }

    fn resolve_url(&self, public_id: &str, resource_type: ResourceType) -> UrlResult {
        let url = format!(
            "{}/{}/{}/upload/{}",
            self.config.delivery_base,
            self.config.cloud_name,
            resource_type.delivery_type(),
            utf8_percent_encode(public_id, PUBLIC_ID_ESCAPE)
        );
        UrlResult { url, public_id: public_id.to_string() }
    }

    async fn delete(&self, public_id: &str, resource_type: ResourceType) -> DeleteResult {
        match self.try_delete(public_id, resource_type).await {
            Ok(result) => {
                if result.success {
                    log::info!("Deleted asset {}", public_id);
                } else {
                    log::warn!(
                        "Delete of {} reported '{}'",
                        public_id,
                        result.result.as_deref().unwrap_or_default()
                    );
                }
                result
            }
            Err(err) => {
                log::error!("Delete of {} failed: {}", public_id, err);
                DeleteResult::failed(describe(&err))
            }
        }
    }
}

/// Decodes a provider response, turning non-2xx answers into provider errors
/// that carry the provider's own message when it sent one.
async fn read_json<T>(response: reqwest::Response) -> Result<T, error::SystemError>
where
    T: DeserializeOwned,
{
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        let message = serde_json::from_str::<ErrorEnvelope>(&text)
            .map(|envelope| envelope.error.message)
            .unwrap_or_else(|_| text.chars().take(200).collect());
        return Err(error::SystemError::provider(format!("{} (HTTP {})", message, status.as_u16())));
    }

    Ok(serde_json::from_str(&text)?)
}

fn hex_digest<D: Digest>(to_sign: &str, secret: &str) -> String {
    let mut hasher = D::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

fn describe(err: &error::SystemError) -> String {
    match err {
        error::SystemError::Provider(msg) => msg.to_string(),
        error::SystemError::JsonError(e) => {
            format!("Unexpected response from storage provider: {}", e)
        }
        error::SystemError::Http(e) if e.is_timeout() => "Storage provider timed out".to_string(),
        error::SystemError::Http(e) if e.is_connect() => {
            "Could not connect to storage provider".to_string()
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn config(api_base: &str) -> CloudinaryConfig {
        CloudinaryConfig {
            cloud_name: "demo".to_string(),
            api_key: "123456789".to_string(),
            api_secret: "s3cr3t".to_string(),
            api_base: api_base.to_string(),
            delivery_base: "https://res.cloudinary.com".to_string(),
            signature_algorithm: SignatureAlgorithm::Sha1,
        }
    }

    fn storage(api_base: &str) -> CloudinaryStorage {
        CloudinaryStorage::new(reqwest::Client::new(), config(api_base))
    }

    fn sha256_storage() -> CloudinaryStorage {
        let config = CloudinaryConfig {
            signature_algorithm: SignatureAlgorithm::Sha256,
            ..config("http://localhost")
        };
        CloudinaryStorage::new(reqwest::Client::new(), config)
    }

    fn sample_params() -> BTreeMap<&'static str, String> {
        let mut params = BTreeMap::new();
        params.insert("timestamp", "1315060510".to_string());
        params.insert("public_id", "sample".to_string());
        params
    }

    fn note() -> NormalizedDocument {
        NormalizedDocument {
            bytes: b"Hello".to_vec(),
            filename: "note.txt".to_string(),
            extension: Some("txt".to_string()),
            content_type: "text/plain".to_string(),
            resource_type_hint: ResourceType::Raw,
        }
    }

    fn plan(public_id: Option<&str>, overwrite: bool) -> IdentifierPlan {
        IdentifierPlan {
            folder: "tuition_master/documents".to_string(),
            public_id: public_id.map(str::to_string),
            overwrite,
            invalidate: true,
        }
    }

    // === Signing ===

    // sha1/sha256 of "public_id=sample&timestamp=1315060510s3cr3t"

    #[test]
    fn test_sign_sha1_sorts_params_and_appends_secret() {
        let signature = storage("http://localhost").sign(&sample_params());
        assert_eq!(signature, "237bc43369e62d25914237f20962640a8b56c142");
    }

    #[test]
    fn test_sign_sha256_sorts_params_and_appends_secret() {
        let signature = sha256_storage().sign(&sample_params());
        assert_eq!(
            signature,
            "c7371d7d1a64ec7005ad9b3b64dc775d5fc6f909c0b2696297192cce97f3c6e0"
        );
    }

    #[test]
    fn test_signed_params_carry_key_and_signature() {
        let signed = storage("http://localhost").signed_params(BTreeMap::new());
        let keys: Vec<&str> = signed.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec!["timestamp", "api_key", "signature"]);
        assert_eq!(signed[1].1, "123456789");
        assert_eq!(signed[2].1.len(), 40);
    }

    #[test]
    fn test_sha256_signed_params_name_the_algorithm() {
        let signed = sha256_storage().signed_params(BTreeMap::new());
        let keys: Vec<&str> = signed.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec!["timestamp", "api_key", "signature", "signature_algorithm"]);
        assert_eq!(signed[2].1.len(), 64);
        assert_eq!(signed[3].1, "sha256");
    }

    // === Upload ===

    #[tokio::test]
    async fn test_upload_success_maps_fields() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1_1/demo/raw/upload")
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex(r#"name="folder"\r\n\r\ntuition_master/documents"#.to_string()),
                Matcher::Regex(r#"name="overwrite"\r\n\r\nfalse"#.to_string()),
                Matcher::Regex(r#"name="use_filename"\r\n\r\nfalse"#.to_string()),
                Matcher::Regex(r#"name="api_key"\r\n\r\n123456789"#.to_string()),
                Matcher::Regex(r#"name="signature""#.to_string()),
                Matcher::Regex(r#"filename="note.txt""#.to_string()),
                Matcher::Regex("Hello".to_string()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"public_id":"tuition_master/documents/abc123.txt","resource_type":"raw",
                    "bytes":5,"created_at":"2024-05-01T10:00:00Z",
                    "url":"http://res.cloudinary.com/demo/raw/upload/v1/tuition_master/documents/abc123.txt",
                    "secure_url":"https://res.cloudinary.com/demo/raw/upload/v1/tuition_master/documents/abc123.txt"}"#,
            )
            .create_async()
            .await;

        let result = storage(&server.url()).upload(&note(), &plan(None, false), ResourceType::Raw).await;

        mock.assert_async().await;
        assert!(result.success);
        assert_eq!(result.public_id.as_deref(), Some("tuition_master/documents/abc123.txt"));
        assert!(result.url.as_deref().unwrap().starts_with("https://"));
        assert_eq!(result.bytes, Some(5));
        assert_eq!(result.resource_type.as_deref(), Some("raw"));
        assert_eq!(result.format.as_deref(), Some("txt"));
        assert!(result.width.is_none());
        assert_eq!(result.created_at.unwrap().to_rfc3339(), "2024-05-01T10:00:00+00:00");
    }

    #[tokio::test]
    async fn test_upload_image_carries_dimensions() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1_1/demo/auto/upload")
            .with_status(200)
            .with_body(
                r#"{"public_id":"docs/scan","format":"png","resource_type":"image","bytes":2048,
                    "width":800,"height":600,"secure_url":"https://res.cloudinary.com/demo/image/upload/docs/scan.png"}"#,
            )
            .create_async()
            .await;

        let result = storage(&server.url()).upload(&note(), &plan(None, false), ResourceType::Auto).await;

        assert!(result.success);
        assert_eq!(result.format.as_deref(), Some("png"));
        assert_eq!((result.width, result.height), (Some(800), Some(600)));
    }

    #[tokio::test]
    async fn test_upload_sends_explicit_public_id() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1_1/demo/raw/upload")
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex(r#"name="public_id"\r\n\r\nreports/q1"#.to_string()),
                Matcher::Regex(r#"name="overwrite"\r\n\r\ntrue"#.to_string()),
            ]))
            .with_status(200)
            .with_body(
                r#"{"public_id":"reports/q1","secure_url":"https://res.cloudinary.com/demo/raw/upload/reports/q1"}"#,
            )
            .create_async()
            .await;

        let result = storage(&server.url())
            .upload(&note(), &plan(Some("reports/q1"), true), ResourceType::Raw)
            .await;

        mock.assert_async().await;
        assert!(result.success);
    }

    #[tokio::test]
    async fn test_upload_existing_without_overwrite_is_refused() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1_1/demo/raw/upload")
            .with_status(200)
            .with_body(
                r#"{"public_id":"reports/q1","existing":true,
                    "secure_url":"https://res.cloudinary.com/demo/raw/upload/reports/q1"}"#,
            )
            .create_async()
            .await;

        let result = storage(&server.url())
            .upload(&note(), &plan(Some("reports/q1"), false), ResourceType::Raw)
            .await;

        assert!(!result.success);
        assert!(result.url.is_none());
        assert!(result.error.unwrap().contains("already exists"));
    }

    #[tokio::test]
    async fn test_upload_provider_error_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1_1/demo/raw/upload")
            .with_status(401)
            .with_body(r#"{"error":{"message":"Invalid Signature 0123abcd."}}"#)
            .create_async()
            .await;

        let result = storage(&server.url()).upload(&note(), &plan(None, false), ResourceType::Raw).await;

        assert!(!result.success);
        let message = result.error.unwrap();
        assert!(message.contains("Invalid Signature"));
        assert!(message.contains("401"));
    }

    #[tokio::test]
    async fn test_upload_non_json_failure_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1_1/demo/raw/upload")
            .with_status(503)
            .with_body("Service Unavailable")
            .create_async()
            .await;

        let result = storage(&server.url()).upload(&note(), &plan(None, false), ResourceType::Raw).await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("Service Unavailable"));
    }

    #[tokio::test]
    async fn test_upload_unreachable_provider_is_reported() {
        let result = storage("http://127.0.0.1:1")
            .upload(&note(), &plan(None, false), ResourceType::Raw)
            .await;

        assert!(!result.success);
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn test_silent_provider_times_out() {
        // accepts connections and never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let silent = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let client =
            crate::configs::build_http_client_with_timeout(std::time::Duration::from_millis(300))
                .unwrap();
        let storage = CloudinaryStorage::new(client, config(&format!("http://{}", addr)));

        let uploaded = storage.upload(&note(), &plan(None, false), ResourceType::Raw).await;
        assert!(!uploaded.success);
        assert_eq!(uploaded.error.as_deref(), Some("Storage provider timed out"));

        let deleted = storage.delete("docs/abc", ResourceType::Raw).await;
        assert!(!deleted.success);
        assert!(deleted.result.is_none());
        assert_eq!(deleted.error.as_deref(), Some("Storage provider timed out"));

        silent.abort();
    }

    #[tokio::test]
    async fn test_undecodable_success_body_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1_1/demo/raw/upload")
            .with_status(200)
            .with_body("<html>maintenance</html>")
            .create_async()
            .await;

        let result = storage(&server.url()).upload(&note(), &plan(None, false), ResourceType::Raw).await;

        assert!(!result.success);
        assert!(result.error.unwrap().starts_with("Unexpected response from storage provider"));
    }

    // === Resolve ===

    #[test]
    fn test_resolve_url_is_deterministic() {
        let storage = storage("http://localhost");
        let url = storage.resolve_url("tuition_master/documents/abc123", ResourceType::Raw);
        assert_eq!(
            url.url,
            "https://res.cloudinary.com/demo/raw/upload/tuition_master/documents/abc123"
        );
        assert_eq!(url, storage.resolve_url("tuition_master/documents/abc123", ResourceType::Raw));
    }

    #[test]
    fn test_resolve_url_auto_and_escaping() {
        let url = storage("http://localhost").resolve_url("docs/my file", ResourceType::Auto);
        assert_eq!(url.url, "https://res.cloudinary.com/demo/image/upload/docs/my%20file");
        assert_eq!(url.public_id, "docs/my file");
    }

    // === Delete ===

    #[tokio::test]
    async fn test_delete_ok() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1_1/demo/raw/destroy")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("public_id".into(), "docs/abc".into()),
                Matcher::UrlEncoded("invalidate".into(), "true".into()),
                Matcher::UrlEncoded("api_key".into(), "123456789".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"result":"ok"}"#)
            .create_async()
            .await;

        let result = storage(&server.url()).delete("docs/abc", ResourceType::Raw).await;

        mock.assert_async().await;
        assert_eq!(result, DeleteResult::from_status("ok"));
    }

    #[tokio::test]
    async fn test_delete_twice_reports_not_found() {
        let mut server = mockito::Server::new_async().await;
        let deleted = server
            .mock("POST", "/v1_1/demo/image/destroy")
            .with_status(200)
            .with_body(r#"{"result":"ok"}"#)
            .create_async()
            .await;

        let storage = storage(&server.url());
        let first = storage.delete("docs/abc", ResourceType::Auto).await;
        assert!(first.success);
        drop(deleted);

        let _gone = server
            .mock("POST", "/v1_1/demo/image/destroy")
            .with_status(200)
            .with_body(r#"{"result":"not found"}"#)
            .create_async()
            .await;

        let second = storage.delete("docs/abc", ResourceType::Auto).await;
        assert!(!second.success);
        assert!(second.is_not_found());
        assert!(second.error.is_none());
    }

    #[tokio::test]
    async fn test_delete_transport_failure_is_reported() {
        let result = storage("http://127.0.0.1:1").delete("docs/abc", ResourceType::Raw).await;
        assert!(!result.success);
        assert!(result.result.is_none());
        assert!(result.error.is_some());
    }
}

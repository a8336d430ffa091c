//! Reduces every accepted input shape to a [`NormalizedDocument`].
//!
//! Base64 payloads may carry a `data:<mime>;base64,` prefix; it is stripped
//! before decoding and its mime type is kept as a fallback for the extension.
//! No content sniffing happens here: with an `auto` hint the provider detects
//! the type itself.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::{Path, PathBuf};

use crate::{
    api::error,
    constants::DEFAULT_MULTIPART_FILENAME,
    modules::document::{
        model::UploadConfig,
        schema::{NormalizedDocument, RawInput, ResourceType},
    },
};

const DATA_URI_SCHEME: &str = "data:";
const BASE64_MARKER: &str = ";base64";
const OCTET_STREAM: &str = "application/octet-stream";

#[derive(Debug, Clone)]
pub struct InputNormalizer {
    max_file_size: usize,
    path_upload_root: Option<PathBuf>,
}

impl InputNormalizer {
    pub fn new(config: &UploadConfig) -> Self {
        Self { max_file_size: config.max_file_size, path_upload_root: config.path_upload_root.clone() }
    }

    pub async fn normalize(
        &self,
        input: RawInput,
        hint: ResourceType,
    ) -> Result<NormalizedDocument, error::SystemError> {
        let (bytes, filename, data_uri_mime) = match input {
            RawInput::Base64 { content, filename, allow_data_uri } => {
                let (payload, mime) =
                    if allow_data_uri { split_data_uri(&content)? } else { (content.as_str(), None) };
                // 4 base64 characters carry 3 bytes; line breaks carry none
                let encoded_len = payload.bytes().filter(|b| !b.is_ascii_whitespace()).count();
                if encoded_len / 4 * 3 > self.max_file_size + 3 {
                    return Err(self.too_large());
                }
                (decode_base64(payload)?, filename, mime)
            }
            RawInput::Multipart { bytes, declared_filename } => {
                let filename = declared_filename
                    .filter(|name| !name.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_MULTIPART_FILENAME.to_string());
                (bytes, filename, None)
            }
            RawInput::ServerPath { path } => {
                let (bytes, filename) = self.read_server_file(&path).await?;
                (bytes, filename, None)
            }
        };

        if bytes.is_empty() {
            return Err(error::SystemError::invalid_input("Document content is empty"));
        }
        if bytes.len() > self.max_file_size {
            return Err(self.too_large());
        }

        let filename = sanitize_filename(&filename)?;
        let extension = extension_of(&filename)
            .or_else(|| data_uri_mime.as_deref().and_then(extension_for_mime));
        let content_type = mime_guess::from_path(&filename)
            .first()
            .map(|mime| mime.essence_str().to_string())
            .or(data_uri_mime)
            .unwrap_or_else(|| OCTET_STREAM.to_string());

        Ok(NormalizedDocument { bytes, filename, extension, content_type, resource_type_hint: hint })
    }

    async fn read_server_file(&self, raw_path: &str) -> Result<(Vec<u8>, String), error::SystemError> {
        let not_found = || error::SystemError::file_not_found(format!("File not found: {}", raw_path));

        let path = tokio::fs::canonicalize(raw_path.trim()).await.map_err(|_| not_found())?;

        if let Some(root) = &self.path_upload_root {
            let root = tokio::fs::canonicalize(root).await?;
            if !path.starts_with(&root) {
                log::warn!("Rejected server path outside upload root: {}", raw_path);
                return Err(not_found());
            }
        }

        let metadata = tokio::fs::metadata(&path).await.map_err(|_| not_found())?;
        if !metadata.is_file() {
            return Err(not_found());
        }
        if metadata.len() > self.max_file_size as u64 {
            return Err(self.too_large());
        }

        let bytes = tokio::fs::read(&path).await.map_err(|_| not_found())?;
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .ok_or_else(|| error::SystemError::invalid_input("File path has no usable file name"))?;

        Ok((bytes, filename))
    }

    fn too_large(&self) -> error::SystemError {
        error::SystemError::invalid_input(format!(
            "File size exceeds maximum allowed size of {} bytes",
            self.max_file_size
        ))
    }
}

/// Splits `data:<mime>;base64,<payload>` into the payload and its mime type.
/// Content without the scheme is returned untouched.
fn split_data_uri(content: &str) -> Result<(&str, Option<String>), error::SystemError> {
    let trimmed = content.trim_start();
    let Some(rest) = trimmed.strip_prefix(DATA_URI_SCHEME) else {
        return Ok((content, None));
    };

    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| error::SystemError::invalid_input("Malformed data URI: missing ','"))?;
    if !header.to_ascii_lowercase().ends_with(BASE64_MARKER) {
        return Err(error::SystemError::invalid_input("Only base64 data URIs are supported"));
    }

    let mime = header.split(';').next().map(str::trim).filter(|m| !m.is_empty());
    Ok((payload, mime.map(|m| m.to_ascii_lowercase())))
}

/// Standard-alphabet decode, tolerant of embedded whitespace and missing padding.
fn decode_base64(payload: &str) -> Result<Vec<u8>, error::SystemError> {
    let mut cleaned: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return Err(error::SystemError::invalid_input("file_base64 is empty"));
    }

    let missing = cleaned.len() % 4;
    if missing > 1 {
        cleaned.push_str(&"=".repeat(4 - missing));
    }

    STANDARD
        .decode(cleaned.as_bytes())
        .map_err(|e| error::SystemError::invalid_input(format!("Invalid base64 encoding: {}", e)))
}

/// Keeps only the last path component so a client-declared name can never
/// address anything but a single file.
fn sanitize_filename(raw: &str) -> Result<String, error::SystemError> {
    let name = raw.rsplit(['/', '\\']).next().unwrap_or_default().trim();

    if name.is_empty() || name == "." || name == ".." {
        return Err(error::SystemError::invalid_input(format!("Invalid filename: '{}'", raw)));
    }
    if name.chars().any(char::is_control) {
        return Err(error::SystemError::invalid_input("Filename contains control characters"));
    }

    Ok(name.to_string())
}

fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(|ext| ext.to_ascii_lowercase())
}

fn extension_for_mime(mime: &str) -> Option<String> {
    mime_guess::get_mime_extensions_str(mime)
        .and_then(|exts| exts.first())
        .map(|ext| ext.to_string())
}

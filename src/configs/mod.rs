use std::time::Duration;

use crate::{api::error, ENV};

pub const DEFAULT_API_BASE: &str = "https://api.cloudinary.com";
pub const DEFAULT_DELIVERY_BASE: &str = "https://res.cloudinary.com";

/// Digest used to sign API requests. Accounts sign with SHA-1 unless they were
/// switched to SHA-256 in the provider console.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    #[default]
    Sha1,
    Sha256,
}

impl SignatureAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureAlgorithm::Sha1 => "sha1",
            SignatureAlgorithm::Sha256 => "sha256",
        }
    }
}

impl std::str::FromStr for SignatureAlgorithm {
    type Err = error::SystemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sha1" => Ok(SignatureAlgorithm::Sha1),
            "sha256" => Ok(SignatureAlgorithm::Sha256),
            other => Err(error::SystemError::config(format!(
                "CLOUDINARY_SIGNATURE_ALGORITHM must be sha1 or sha256, got '{}'",
                other
            ))),
        }
    }
}

/// Storage provider identity and credentials. Built once at startup and
/// handed to the gateway; never mutated afterwards.
#[derive(Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    pub api_base: String,
    pub delivery_base: String,
    pub signature_algorithm: SignatureAlgorithm,
}

impl std::fmt::Debug for CloudinaryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudinaryConfig")
            .field("cloud_name", &self.cloud_name)
            .field("api_key", &self.api_key)
            .field("api_secret", &"***")
            .field("api_base", &self.api_base)
            .field("delivery_base", &self.delivery_base)
            .field("signature_algorithm", &self.signature_algorithm)
            .finish()
    }
}

impl CloudinaryConfig {
    pub fn from_env() -> Result<Self, error::SystemError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`. Any missing or blank credential
    /// is reported together with the others so a misconfigured deployment fails
    /// once with the full list.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, error::SystemError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let cloud_name = read("CLOUDINARY_CLOUD_NAME");
        let api_key = read("CLOUDINARY_API_KEY");
        let api_secret = read("CLOUDINARY_API_SECRET");

        let (Some(cloud_name), Some(api_key), Some(api_secret)) =
            (cloud_name.clone(), api_key.clone(), api_secret.clone())
        else {
            let missing: Vec<&str> = [
                ("CLOUDINARY_CLOUD_NAME", cloud_name.is_none()),
                ("CLOUDINARY_API_KEY", api_key.is_none()),
                ("CLOUDINARY_API_SECRET", api_secret.is_none()),
            ]
            .into_iter()
            .filter_map(|(key, absent)| absent.then_some(key))
            .collect();
            return Err(error::SystemError::config(format!(
                "{} must be set in .env file or environment variable",
                missing.join(", ")
            )));
        };

        let api_base = read("CLOUDINARY_API_BASE")
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string();
        let delivery_base = read("CLOUDINARY_DELIVERY_BASE")
            .unwrap_or_else(|| DEFAULT_DELIVERY_BASE.to_string())
            .trim_end_matches('/')
            .to_string();

        let signature_algorithm = read("CLOUDINARY_SIGNATURE_ALGORITHM")
            .map(|value| value.parse::<SignatureAlgorithm>())
            .transpose()?
            .unwrap_or_default();

        Ok(Self { cloud_name, api_key, api_secret, api_base, delivery_base, signature_algorithm })
    }
}

pub fn build_http_client() -> Result<reqwest::Client, error::SystemError> {
    build_http_client_with_timeout(Duration::from_secs(ENV.storage_timeout_secs))
}

/// Every provider call made through this client gives up after `timeout`.
pub fn build_http_client_with_timeout(
    timeout: Duration,
) -> Result<reqwest::Client, error::SystemError> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .build()?;
    Ok(client)
}

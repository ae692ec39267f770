//! Cloudinary signed uploads over `reqwest` multipart.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::{AssetUploader, UploadedAsset};

const API_BASE: &str = "https://api.cloudinary.com/v1_1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

impl std::fmt::Debug for CloudinaryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudinaryConfig")
            .field("cloud_name", &self.cloud_name)
            .field("api_key", &self.api_key)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, thiserror::Error)]
enum UploadError {
    #[error("read staged file: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Cloudinary returned HTTP {0}")]
    HttpStatus(u16),
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    url: Option<String>,
    secure_url: Option<String>,
}

pub struct CloudinaryUploader {
    config: CloudinaryConfig,
    client: reqwest::Client,
}

impl CloudinaryUploader {
    pub fn new(config: CloudinaryConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!("{}/{}/auto/upload", API_BASE, self.config.cloud_name)
    }

    async fn try_upload(&self, local_path: &Path) -> Result<UploadResponse, UploadError> {
        let bytes = tokio::fs::read(local_path).await?;
        let file_name = local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = sign_params(&timestamp, &self.config.api_secret);

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(bytes).file_name(file_name),
            )
            .text("api_key", self.config.api_key.clone())
            .text("timestamp", timestamp)
            .text("signature", signature)
            .text("signature_algorithm", "sha256");

        let response = self.client.post(self.endpoint()).multipart(form).send().await?;
        if !response.status().is_success() {
            return Err(UploadError::HttpStatus(response.status().as_u16()));
        }
        Ok(response.json::<UploadResponse>().await?)
    }
}

#[async_trait]
impl AssetUploader for CloudinaryUploader {
    async fn upload_asset(&self, local_path: &Path) -> Option<UploadedAsset> {
        let result = self.try_upload(local_path).await;

        // The staged copy is dropped either way.
        if let Err(e) = tokio::fs::remove_file(local_path).await {
            debug!(path = %local_path.display(), error = %e, "staged file already gone");
        }

        match result {
            Ok(UploadResponse { url, secure_url }) => {
                let url = url.or(secure_url)?;
                debug!(path = %local_path.display(), url = %url, "asset uploaded");
                Some(UploadedAsset { url })
            }
            Err(e) => {
                warn!(path = %local_path.display(), error = %e, "asset upload failed");
                None
            }
        }
    }
}

/// Signature over the signed parameters, as Cloudinary expects with `signature_algorithm=sha256`.
fn sign_params(timestamp: &str, api_secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("timestamp={}{}", timestamp, api_secret).as_bytes());
    hex::encode(hasher.finalize())
}

//! Asset hand-off: multipart files are staged on disk, then pushed to the image host.

mod cloudinary;
mod staging;

pub use cloudinary::{CloudinaryConfig, CloudinaryUploader};
pub use staging::{StagedFile, StagedForm};

use async_trait::async_trait;
use std::path::Path;

/// Where an uploaded asset can be fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedAsset {
    pub url: String,
}

/// External image host. Failures are reported as `None`, never as an error;
/// callers decide whether a missing URL matters.
#[async_trait]
pub trait AssetUploader: Send + Sync {
    async fn upload_asset(&self, local_path: &Path) -> Option<UploadedAsset>;
}

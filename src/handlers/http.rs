//! Shared application state and the health check.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{http::StatusCode, Json};
use serde_json::json;

use crate::auth::TokenService;
use crate::db::UserStore;
use crate::upload::AssetUploader;

/// Shared application state for every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn UserStore>,
    pub tokens: TokenService,
    pub uploader: Arc<dyn AssetUploader>,
    pub upload_dir: PathBuf,
}

impl AppState {
    pub fn new(
        store: Arc<dyn UserStore>,
        tokens: TokenService,
        uploader: Arc<dyn AssetUploader>,
        upload_dir: PathBuf,
    ) -> Self {
        Self {
            store,
            tokens,
            uploader,
            upload_dir,
        }
    }

    pub fn store(&self) -> &dyn UserStore {
        self.store.as_ref()
    }
    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }
    pub fn uploader(&self) -> &dyn AssetUploader {
        self.uploader.as_ref()
    }
    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }
}

/// GET /health: liveness check.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({ "status": "ok", "service": "vidauth" })),
    )
}

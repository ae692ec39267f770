//! Disk staging for `multipart/form-data` requests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use axum::extract::Multipart;
use tracing::debug;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone)]
pub struct StagedFile {
    pub path: PathBuf,
    pub original_name: String,
}

/// Text fields plus at most one staged file per accepted file field.
///
/// Staged files are deleted when the form is dropped, so an abandoned request
/// (client disconnect, early error) leaves nothing behind in the upload dir.
#[derive(Debug, Default)]
pub struct StagedForm {
    fields: HashMap<String, String>,
    files: HashMap<String, StagedFile>,
}

impl StagedForm {
    /// Drain `multipart`, writing each file part under `dir`. Only the names in
    /// `file_fields` may carry files, each at most once.
    pub async fn from_multipart(
        mut multipart: Multipart,
        dir: &Path,
        file_fields: &[&str],
    ) -> AppResult<Self> {
        let mut form = StagedForm::default();
        let result = form.drain(&mut multipart, dir, file_fields).await;
        match result {
            Ok(()) => Ok(form),
            Err(e) => {
                form.discard().await;
                Err(e)
            }
        }
    }

    async fn drain(
        &mut self,
        multipart: &mut Multipart,
        dir: &Path,
        file_fields: &[&str],
    ) -> AppResult<()> {
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::Validation(e.to_string()))?
        {
            let name = field.name().unwrap_or_default().to_string();

            let Some(file_name) = field.file_name().map(str::to_string) else {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(e.to_string()))?;
                self.fields.insert(name, value);
                continue;
            };

            if !file_fields.contains(&name.as_str()) || self.files.contains_key(&name) {
                return Err(AppError::Validation(format!("Unexpected field: {}", name)));
            }

            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::Validation(e.to_string()))?;
            // Empty file inputs are sent by browsers when nothing was chosen.
            if data.is_empty() && file_name.is_empty() {
                continue;
            }

            let path = dir.join(format!("{}-{}", Uuid::new_v4(), sanitize_file_name(&file_name)));
            tokio::fs::write(&path, &data)
                .await
                .map_err(|e| AppError::Internal(anyhow::anyhow!("stage upload: {}", e)))?;
            debug!(field = %name, path = %path.display(), bytes = data.len(), "staged upload");
            self.files.insert(
                name,
                StagedFile {
                    path,
                    original_name: file_name,
                },
            );
        }
        Ok(())
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn file(&self, name: &str) -> Option<&StagedFile> {
        self.files.get(name)
    }

    /// Remove whatever staged files are still on disk.
    pub async fn discard(mut self) {
        for (_, file) in self.files.drain() {
            if tokio::fs::remove_file(&file.path).await.is_ok() {
                debug!(path = %file.path.display(), "removed staged upload");
            }
        }
    }
}

impl Drop for StagedForm {
    fn drop(&mut self) {
        for (_, file) in self.files.drain() {
            if std::fs::remove_file(&file.path).is_ok() {
                debug!(path = %file.path.display(), "removed abandoned upload");
            }
        }
    }
}

/// Keep only characters that are safe in a single path component.
fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_directories_and_odd_chars() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("my photo (1).png"), "my_photo__1_.png");
        assert_eq!(sanitize_file_name(""), "upload");
    }

    #[tokio::test]
    async fn discard_removes_staged_files() {
        let path = std::env::temp_dir().join(format!("{}-a.png", Uuid::new_v4()));
        tokio::fs::write(&path, b"png").await.unwrap();

        let mut form = StagedForm::default();
        form.files.insert(
            "avatar".into(),
            StagedFile {
                path: path.clone(),
                original_name: "a.png".into(),
            },
        );
        assert_eq!(form.file("avatar").map(|f| f.original_name.as_str()), Some("a.png"));

        form.discard().await;
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn dropping_form_removes_staged_files() {
        let dir = std::env::temp_dir().join(format!("vidauth-staging-{}", Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let avatar = dir.join("avatar.png");
        let cover = dir.join("cover.png");
        tokio::fs::write(&avatar, b"png").await.unwrap();
        tokio::fs::write(&cover, b"png").await.unwrap();

        let mut form = StagedForm::default();
        for (field, path) in [("avatar", &avatar), ("coverImage", &cover)] {
            form.files.insert(
                field.into(),
                StagedFile {
                    path: path.clone(),
                    original_name: "x.png".into(),
                },
            );
        }
        drop(form);

        assert!(!avatar.exists());
        assert!(!cover.exists());
        tokio::fs::remove_dir(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn abandoned_request_leaves_upload_dir_empty() {
        let dir = std::env::temp_dir().join(format!("vidauth-staging-{}", Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join("avatar.png");
        tokio::fs::write(&path, b"png").await.unwrap();

        let mut form = StagedForm::default();
        form.files.insert(
            "avatar".into(),
            StagedFile {
                path,
                original_name: "avatar.png".into(),
            },
        );
        let pending = async move {
            let _form = form;
            std::future::pending::<()>().await;
        };
        let timed_out = tokio::time::timeout(std::time::Duration::from_millis(10), pending).await;
        assert!(timed_out.is_err());

        assert!(std::fs::read_dir(&dir).unwrap().next().is_none());
        tokio::fs::remove_dir(&dir).await.unwrap();
    }
}

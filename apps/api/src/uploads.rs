//! CV file storage.
//!
//! Uploaded CVs are validated (declared MIME type and size) before anything
//! touches the disk, then written under the upload directory with a random
//! name. Only the original extension survives from the caller's file name.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::with_timeout;
use crate::errors::AppError;

pub const MAX_CV_BYTES: usize = 5 * 1024 * 1024;

pub const PDF: &str = "application/pdf";
pub const MS_WORD: &str = "application/msword";
pub const WORD_XML: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

pub const ALLOWED_CV_TYPES: [&str; 3] = [PDF, MS_WORD, WORD_XML];

const MAX_EXTENSION_LEN: usize = 10;

/// Rejects a CV before any filesystem or database mutation.
pub fn validate_cv(declared_mime: &str, size: usize) -> Result<(), AppError> {
    let mime = declared_mime.trim().to_ascii_lowercase();
    if !ALLOWED_CV_TYPES.contains(&mime.as_str()) {
        return Err(AppError::UnsupportedType(
            "Only PDF/DOC/DOCX allowed.".to_string(),
        ));
    }
    if size > MAX_CV_BYTES {
        return Err(AppError::TooLarge {
            size,
            limit: MAX_CV_BYTES,
        });
    }
    Ok(())
}

/// Extension of the caller's file name, with the leading dot, lowercased.
/// Anything that is not a short alphanumeric suffix is dropped.
fn stored_extension(original_filename: Option<&str>) -> String {
    let ext = original_filename
        .map(Path::new)
        .and_then(|p| p.extension())
        .and_then(|e| e.to_str())
        .filter(|e| {
            !e.is_empty()
                && e.len() <= MAX_EXTENSION_LEN
                && e.chars().all(|c| c.is_ascii_alphanumeric())
        });

    match ext {
        Some(e) => format!(".{}", e.to_ascii_lowercase()),
        None => String::new(),
    }
}

/// True for a plain file name with no directory components.
fn is_bare_filename(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\', '\0'])
        && Path::new(name).file_name().and_then(|n| n.to_str()) == Some(name)
}

/// MIME type served back for a stored CV, keyed on its extension.
pub fn content_type_for(stored_name: &str) -> &'static str {
    match Path::new(stored_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("pdf") => PDF,
        Some("doc") => MS_WORD,
        Some("docx") => WORD_XML,
        _ => "application/octet-stream",
    }
}

#[derive(Debug, Clone)]
pub struct CvStorage {
    upload_dir: PathBuf,
    timeout: Duration,
}

impl CvStorage {
    pub fn new<P: AsRef<Path>>(upload_dir: P, timeout: Duration) -> Self {
        Self {
            upload_dir: upload_dir.as_ref().to_path_buf(),
            timeout,
        }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Validates and persists a CV, returning the generated file name.
    pub async fn store_cv(
        &self,
        bytes: &[u8],
        declared_mime: &str,
        original_filename: Option<&str>,
    ) -> Result<String, AppError> {
        validate_cv(declared_mime, bytes.len())?;

        let stored_name = format!(
            "{}{}",
            Uuid::new_v4().simple(),
            stored_extension(original_filename)
        );
        let path = self.upload_dir.join(&stored_name);

        with_timeout(self.timeout, "store CV", async {
            tokio::fs::create_dir_all(&self.upload_dir).await?;
            let mut file = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await?;
            file.write_all(bytes).await?;
            file.flush().await?;
            Ok::<_, AppError>(())
        })
        .await?;

        info!("Stored CV {stored_name} ({} bytes)", bytes.len());
        Ok(stored_name)
    }

    pub async fn retrieve_cv(&self, stored_name: &str) -> Result<Vec<u8>, AppError> {
        let path = self.resolve(stored_name)?;

        with_timeout(self.timeout, "read CV", async {
            match tokio::fs::read(&path).await {
                Ok(bytes) => Ok(bytes),
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    Err(AppError::NotFound("CV not found".to_string()))
                }
                Err(e) => Err(AppError::Io(e)),
            }
        })
        .await
    }

    /// Best-effort removal used for compensation and withdrawal cleanup.
    /// Failures are logged and swallowed so they never replace the caller's error.
    pub async fn delete_cv(&self, stored_name: &str) {
        let path = match self.resolve(stored_name) {
            Ok(path) => path,
            Err(_) => {
                warn!("Refusing to delete CV with invalid name {stored_name:?}");
                return;
            }
        };

        let result = with_timeout(self.timeout, "delete CV", async {
            tokio::fs::remove_file(&path).await.map_err(AppError::Io)
        })
        .await;

        match result {
            Ok(()) => info!("Deleted CV {stored_name}"),
            Err(AppError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                warn!("CV {stored_name} was already gone")
            }
            Err(e) => warn!("Failed to delete CV {stored_name}: {e}"),
        }
    }

    fn resolve(&self, stored_name: &str) -> Result<PathBuf, AppError> {
        if !is_bare_filename(stored_name) {
            return Err(AppError::NotFound("CV not found".to_string()));
        }
        Ok(self.upload_dir.join(stored_name))
    }
}

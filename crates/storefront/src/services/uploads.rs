//! Listing photo storage.
//!
//! Photos are written to the configured upload directory as
//! `YYYYmmddHHMMSS_<sanitized name>` and served back under `/uploads`.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Extensions accepted for listing photos (lowercase).
const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

/// Errors that can occur when storing an upload.
#[derive(Debug, Error)]
pub enum UploadError {
    /// No file was provided.
    #[error("no file uploaded")]
    Missing,

    /// The file type is not an accepted image type.
    #[error("unsupported file type: {0}")]
    UnsupportedType(String),

    /// Writing to disk failed.
    #[error("failed to store upload: {0}")]
    Io(#[from] std::io::Error),
}

/// Reduce a client-supplied file name to a safe single path component.
///
/// ASCII alphanumerics, `.`, `-` and `_` are kept; any other run of
/// characters becomes one `_`. Leading dots are removed so the result can
/// never be hidden or refer to a parent directory.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    // Browsers on Windows may send a full path
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();

    let mut out = String::with_capacity(base.len());
    let mut last_was_sep = false;
    for c in base.chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
            out.push(c);
            last_was_sep = false;
        } else if !last_was_sep {
            out.push('_');
            last_was_sep = true;
        }
    }

    let trimmed = out.trim_start_matches(['.', '_']).trim_end_matches('_');
    if trimmed.is_empty() {
        "upload".to_string()
    } else {
        trimmed.to_string()
    }
}

/// The stored file name for an upload received at `now`.
#[must_use]
pub fn stored_filename(original: &str, now: DateTime<Utc>) -> String {
    format!("{}_{}", now.format("%Y%m%d%H%M%S"), sanitize_filename(original))
}

/// Check that a (sanitized) file name has an accepted image extension.
///
/// # Errors
///
/// Returns `UploadError::UnsupportedType` otherwise.
pub fn ensure_image(filename: &str) -> Result<(), UploadError> {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    if ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        Ok(())
    } else {
        Err(UploadError::UnsupportedType(if ext.is_empty() {
            "(none)".to_string()
        } else {
            ext
        }))
    }
}

/// Writes listing photos into one directory.
pub struct UploadStore<'a> {
    dir: &'a Path,
}

impl<'a> UploadStore<'a> {
    /// Create a store rooted at `dir`.
    #[must_use]
    pub const fn new(dir: &'a Path) -> Self {
        Self { dir }
    }

    /// Save `bytes` under a timestamped, sanitized name and return that name.
    ///
    /// # Errors
    ///
    /// Returns `UploadError::Missing` for an empty file,
    /// `UploadError::UnsupportedType` for non-image names, and
    /// `UploadError::Io` if the directory or file cannot be written.
    pub async fn save(&self, original_name: &str, bytes: &[u8]) -> Result<String, UploadError> {
        if bytes.is_empty() || original_name.trim().is_empty() {
            return Err(UploadError::Missing);
        }

        let filename = stored_filename(original_name, Utc::now());
        ensure_image(&filename)?;

        tokio::fs::create_dir_all(self.dir).await?;
        let path: PathBuf = self.dir.join(&filename);
        tokio::fs::write(&path, bytes).await?;

        tracing::info!(file = %filename, size = bytes.len(), "Stored listing photo");
        Ok(filename)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("photo.jpg"), "photo.jpg");
        assert_eq!(sanitize_filename("my photo (1).JPG"), "my_photo_1_.JPG");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename(r"C:\Users\me\cat.png"), "cat.png");
        assert_eq!(sanitize_filename(".hidden.png"), "hidden.png");
        assert_eq!(sanitize_filename("фото.png"), "png");
        assert_eq!(sanitize_filename("..."), "upload");
        assert_eq!(sanitize_filename(""), "upload");
    }

    #[test]
    fn test_stored_filename_is_timestamped() {
        let now = Utc
            .with_ymd_and_hms(2026, 3, 4, 5, 6, 7)
            .single()
            .unwrap_or_else(Utc::now);
        assert_eq!(
            stored_filename("Lab Coat.png", now),
            "20260304050607_Lab_Coat.png"
        );
    }

    #[test]
    fn test_ensure_image() {
        assert!(ensure_image("20260304050607_a.PNG").is_ok());
        assert!(ensure_image("20260304050607_a.webp").is_ok());
        assert!(matches!(
            ensure_image("20260304050607_script.html"),
            Err(UploadError::UnsupportedType(ext)) if ext == "html"
        ));
        assert!(ensure_image("20260304050607_upload").is_err());
    }

    #[tokio::test]
    async fn test_save_writes_file() {
        let dir = std::env::temp_dir().join(format!("campus-cart-uploads-{}", uuid::Uuid::new_v4()));
        let store = UploadStore::new(&dir);

        let name = store
            .save("desk lamp.jpg", b"\xFF\xD8\xFF")
            .await
            .unwrap_or_else(|e| panic!("{e}"));
        assert!(name.ends_with("_desk_lamp.jpg"));
        let written = tokio::fs::read(dir.join(&name)).await.unwrap_or_default();
        assert_eq!(written, b"\xFF\xD8\xFF");

        assert!(matches!(
            store.save("empty.jpg", b"").await,
            Err(UploadError::Missing)
        ));

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}

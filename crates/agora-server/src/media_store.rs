//! On-disk attachment storage.
//!
//! Every record owns a directory named by its uuid under the configured base
//! path; attachment files inside are named by ordinal position plus the
//! original extension, so concurrent writes can never collide. JPEG bytes
//! are re-encoded before they touch disk: the round trip through the decoder
//! drops every ancillary segment, including EXIF metadata (GPS position,
//! device identifiers) the uploader almost certainly did not mean to publish.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

use agora_shared::media;
use agora_shared::protocol::{AttachmentMeta, AttachmentUpload};

use crate::error::ServerError;

/// Verify that a resolved path stays within the expected base directory.
/// Prevents path traversal attacks.
fn ensure_within(base: &Path, target: &Path) -> Result<PathBuf, ServerError> {
    // Canonicalize base; target may not exist yet so normalize manually
    let canonical_base = base.canonicalize().unwrap_or_else(|_| base.to_path_buf());
    // Build the full path and strip out any `..` components
    let mut resolved = canonical_base.clone();
    for component in target
        .strip_prefix(&canonical_base)
        .unwrap_or(target)
        .components()
    {
        match component {
            std::path::Component::Normal(c) => resolved.push(c),
            std::path::Component::ParentDir => {
                return Err(ServerError::BadRequest(
                    "Path traversal detected".to_string(),
                ));
            }
            _ => {} // RootDir, CurDir, Prefix — skip
        }
    }
    if !resolved.starts_with(&canonical_base) {
        return Err(ServerError::BadRequest(
            "Path traversal detected".to_string(),
        ));
    }
    Ok(resolved)
}

#[derive(Debug, Clone)]
pub struct MediaStore {
    base_path: PathBuf,
    public_base: String,
}

impl MediaStore {
    pub async fn new(base_path: PathBuf, public_base: String) -> Result<Self, ServerError> {
        fs::create_dir_all(&base_path).await.map_err(|e| {
            ServerError::MediaStorage(format!(
                "Failed to create media directory '{}': {}",
                base_path.display(),
                e
            ))
        })?;

        info!(path = %base_path.display(), "Media store initialized");

        Ok(Self {
            base_path,
            public_base: public_base.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Write a record's attachments and return their stored descriptors.
    ///
    /// The record directory is created before the first write; if a later
    /// file fails, the directory is abandoned as-is. It is keyed by a fresh
    /// uuid nothing references yet, so orphans are an operational cleanup
    /// concern, not a correctness one.
    pub async fn store_attachments(
        &self,
        record_id: Uuid,
        uploads: &[AttachmentUpload],
    ) -> Result<Vec<AttachmentMeta>, ServerError> {
        if uploads.is_empty() {
            return Ok(Vec::new());
        }

        let dir = self.safe_record_dir(record_id)?;
        fs::create_dir_all(&dir).await.map_err(|e| {
            ServerError::MediaStorage(format!(
                "Failed to create directory for record {}: {}",
                record_id, e
            ))
        })?;

        let mut stored = Vec::with_capacity(uploads.len());
        for (ordinal, upload) in uploads.iter().enumerate() {
            let kind = media::classify(&upload.media_type, &upload.data);
            let file_name = format!("{}.{}", ordinal, safe_extension(upload));

            // The metadata strip must happen before the bytes reach disk.
            let bytes = if media::has_jpeg_signature(&upload.data) {
                strip_jpeg_metadata(upload.data.clone()).await?
            } else {
                upload.data.clone()
            };

            let path = dir.join(&file_name);
            fs::write(&path, &bytes).await.map_err(|e| {
                ServerError::MediaStorage(format!("Failed to write {}: {}", file_name, e))
            })?;

            debug!(
                record = %record_id,
                file = %file_name,
                size = bytes.len(),
                kind = %kind,
                "Stored attachment"
            );

            stored.push(AttachmentMeta {
                kind,
                url: self.public_url(record_id, &file_name),
            });
        }

        Ok(stored)
    }

    /// Public URL under which a stored file is served.
    fn public_url(&self, record_id: Uuid, file_name: &str) -> String {
        format!("{}/media/{}/{}", self.public_base, record_id, file_name)
    }

    /// Record directory path, validated against traversal.
    fn safe_record_dir(&self, record_id: Uuid) -> Result<PathBuf, ServerError> {
        let raw = self.base_path.join(record_id.to_string());
        ensure_within(&self.base_path, &raw)
    }
}

/// Extension taken from the uploaded file name when it is plain ASCII,
/// otherwise derived from the declared media type. Client-supplied names
/// never reach the filesystem in any other form.
fn safe_extension(upload: &AttachmentUpload) -> String {
    let ext = Path::new(&upload.file_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");

    if !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        ext.to_ascii_lowercase()
    } else {
        media::extension_for(&upload.media_type).to_string()
    }
}

/// Decode and re-encode JPEG bytes, dropping every non-image segment.
///
/// Runs on the blocking pool; even a 10 MiB decode is long enough to stall
/// the event loop.
async fn strip_jpeg_metadata(data: Vec<u8>) -> Result<Vec<u8>, ServerError> {
    tokio::task::spawn_blocking(move || {
        let img = image::load_from_memory_with_format(&data, image::ImageFormat::Jpeg)
            .map_err(|e| ServerError::MediaStorage(format!("Failed to decode JPEG: {e}")))?;

        // JPEG has no alpha; normalize to RGB8 before encoding.
        let rgb = image::DynamicImage::ImageRgb8(img.to_rgb8());
        let mut out = std::io::Cursor::new(Vec::new());
        rgb.write_to(&mut out, image::ImageFormat::Jpeg)
            .map_err(|e| ServerError::MediaStorage(format!("Failed to re-encode JPEG: {e}")))?;

        Ok(out.into_inner())
    })
    .await
    .map_err(|e| ServerError::Internal(format!("JPEG processing task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_shared::media::MediaCategory;
    use tempfile::TempDir;

    async fn test_store() -> (MediaStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = MediaStore::new(
            dir.path().to_path_buf(),
            "http://localhost:8080".to_string(),
        )
        .await
        .unwrap();
        (store, dir)
    }

    fn upload(file_name: &str, media_type: &str, data: Vec<u8>) -> AttachmentUpload {
        AttachmentUpload {
            file_name: file_name.to_string(),
            media_type: media_type.to_string(),
            data,
        }
    }

    /// A small valid JPEG with a fabricated EXIF (APP1) segment spliced in
    /// right after the SOI marker.
    fn jpeg_with_exif() -> Vec<u8> {
        let img = image::DynamicImage::ImageRgb8(image::ImageBuffer::from_pixel(
            8,
            8,
            image::Rgb([120u8, 80, 40]),
        ));
        let mut cursor = std::io::Cursor::new(Vec::new());
        img.write_to(&mut cursor, image::ImageFormat::Jpeg).unwrap();
        let mut bytes = cursor.into_inner();

        let mut segment = vec![0xFF, 0xE1, 0x00, 0x12];
        segment.extend_from_slice(b"Exif\0\0");
        segment.extend_from_slice(&[0u8; 10]);
        bytes.splice(2..2, segment);
        bytes
    }

    #[tokio::test]
    async fn files_are_named_by_ordinal_and_extension() {
        let (store, dir) = test_store().await;
        let id = Uuid::new_v4();

        let stored = store
            .store_attachments(
                id,
                &[
                    upload("cat.png", "image/png", b"\x89PNG fake".to_vec()),
                    upload("clip.gif", "image/gif", b"GIF89a fake".to_vec()),
                ],
            )
            .await
            .unwrap();

        assert!(dir.path().join(id.to_string()).join("0.png").exists());
        assert!(dir.path().join(id.to_string()).join("1.gif").exists());
        assert_eq!(stored[0].kind, MediaCategory::Image);
        assert_eq!(stored[1].kind, MediaCategory::Gif);
        assert_eq!(
            stored[0].url,
            format!("http://localhost:8080/media/{}/0.png", id)
        );
    }

    #[tokio::test]
    async fn jpeg_signature_triggers_metadata_strip() {
        let (store, dir) = test_store().await;
        let id = Uuid::new_v4();
        let original = jpeg_with_exif();
        assert!(original.windows(4).any(|w| w == b"Exif"));

        store
            .store_attachments(id, &[upload("photo.jpg", "image/jpeg", original.clone())])
            .await
            .unwrap();

        let written = std::fs::read(dir.path().join(id.to_string()).join("0.jpg")).unwrap();
        assert!(media::has_jpeg_signature(&written));
        assert!(!written.windows(4).any(|w| w == b"Exif"));
        assert_ne!(written, original);
    }

    #[tokio::test]
    async fn declared_jpeg_without_signature_is_written_verbatim() {
        let (store, dir) = test_store().await;
        let id = Uuid::new_v4();
        let data = b"GIF89a not actually a jpeg".to_vec();

        store
            .store_attachments(id, &[upload("weird.jpg", "image/jpeg", data.clone())])
            .await
            .unwrap();

        let written = std::fs::read(dir.path().join(id.to_string()).join("0.jpg")).unwrap();
        assert_eq!(written, data);
    }

    #[tokio::test]
    async fn hostile_file_names_fall_back_to_declared_type() {
        let (store, dir) = test_store().await;
        let id = Uuid::new_v4();

        store
            .store_attachments(
                id,
                &[upload("../../../etc/passwd", "image/png", b"x".to_vec())],
            )
            .await
            .unwrap();

        assert!(dir.path().join(id.to_string()).join("0.png").exists());
    }

    #[tokio::test]
    async fn no_directory_for_empty_upload_list() {
        let (store, dir) = test_store().await;
        let id = Uuid::new_v4();

        let stored = store.store_attachments(id, &[]).await.unwrap();
        assert!(stored.is_empty());
        assert!(!dir.path().join(id.to_string()).exists());
    }

    #[test]
    fn ensure_within_rejects_parent_components() {
        let base = PathBuf::from("/srv/media");
        assert!(ensure_within(&base, &base.join("../outside")).is_err());
        assert!(ensure_within(&base, &base.join("abc/0.png")).is_ok());
    }
}

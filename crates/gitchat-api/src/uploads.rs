use std::path::PathBuf;

use anyhow::Result;
use tokio::fs;
use tracing::{info, warn};
use uuid::Uuid;

/// Hard cap on message image uploads, enforced again in the handler on top
/// of the transport-layer body limit.
pub const MAX_IMAGE_BYTES: usize = 2 * 1024 * 1024;

/// On-disk blob store for message images. Each blob is a flat file named by
/// a fresh UUID; the public URL is what gets persisted on the message.
pub struct UploadStore {
    dir: PathBuf,
    public_base: String,
}

impl UploadStore {
    pub async fn new(dir: PathBuf, public_base: String) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Upload directory: {}", dir.display());
        Ok(Self {
            dir,
            public_base: public_base.trim_end_matches('/').to_string(),
        })
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    /// Persist an image blob and return its public URL.
    pub async fn save(&self, data: &[u8], content_type: &str) -> Result<String> {
        let ext = extension_for(content_type);
        let filename = format!("{}.{}", Uuid::new_v4(), ext);
        let path = self.dir.join(&filename);

        fs::write(&path, data).await?;

        Ok(format!("{}/uploads/{}", self.public_base, filename))
    }

    /// Best-effort blob removal for hard-deleted image messages. Failure is
    /// logged and swallowed; the message row removal must not be blocked.
    pub async fn delete_by_url(&self, url: &str) {
        let Some(filename) = url.rsplit('/').next().filter(|f| !f.is_empty()) else {
            warn!("Unparseable upload URL '{}', skipping blob cleanup", url);
            return;
        };
        // Refuse anything that could escape the upload directory.
        if filename.contains("..") {
            warn!("Suspicious upload filename '{}', skipping blob cleanup", filename);
            return;
        }

        let path = self.dir.join(filename);
        match fs::remove_file(&path).await {
            Ok(()) => info!("Deleted upload {}", filename),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Upload {} already gone", filename);
            }
            Err(e) => warn!("Failed to delete upload {}: {}", filename, e),
        }
    }
}

fn extension_for(content_type: &str) -> &str {
    match content_type {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/svg+xml" => "svg",
        _ => "img",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_then_delete_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path().to_path_buf(), "http://localhost:5000".into())
            .await
            .unwrap();

        let url = store.save(b"not really a png", "image/png").await.unwrap();
        assert!(url.starts_with("http://localhost:5000/uploads/"));
        assert!(url.ends_with(".png"));

        let filename = url.rsplit('/').next().unwrap();
        assert!(dir.path().join(filename).exists());

        store.delete_by_url(&url).await;
        assert!(!dir.path().join(filename).exists());

        // Second delete is a logged no-op.
        store.delete_by_url(&url).await;
    }

    #[tokio::test]
    async fn unknown_mime_gets_generic_extension() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path().to_path_buf(), "http://localhost:5000/".into())
            .await
            .unwrap();

        let url = store.save(b"bytes", "image/x-exotic").await.unwrap();
        assert!(url.ends_with(".img"));
    }
}

//! Filesystem object store for the `wiki_attachments` bucket.
//!
//! Objects are addressed by their attachment path
//! (`wiki/<author_id>/<uuid>-<filename>`) and stored under
//! `{base_path}/wiki_attachments/{path}`. Writes are atomic (temp file + rename) and
//! never overwrite an existing object.
//!
//! ## Example
//!
//! ```rust,ignore
//! use hoai_db::FilesystemObjectStore;
//! use hoai_core::ObjectStore;
//!
//! let store = FilesystemObjectStore::new("/var/lib/hoai/storage", "https://files.example.com");
//! store.upload("wiki/u1/0b7f...-plan.pdf", &data, Some("application/pdf")).await?;
//! let url = store.public_url("wiki/u1/0b7f...-plan.pdf");
//! ```

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

use hoai_core::defaults::ATTACHMENT_BUCKET;
use hoai_core::{Error, ObjectStore, Result};

/// Object store backed by a local directory.
#[derive(Debug, Clone)]
pub struct FilesystemObjectStore {
    base_path: PathBuf,
    public_base_url: String,
}

impl FilesystemObjectStore {
    /// Create a store rooted at `base_path`, serving objects from
    /// `public_base_url`.
    pub fn new(base_path: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn bucket_dir(&self) -> PathBuf {
        self.base_path.join(ATTACHMENT_BUCKET)
    }

    fn full_path(&self, path: &str) -> Result<PathBuf> {
        validate_object_path(path)?;
        Ok(self.bucket_dir().join(path))
    }

    /// Validate that the store can write, read, and delete files.
    ///
    /// Performs a full round-trip at startup to catch permission errors and
    /// missing directories early.
    pub async fn validate(&self) -> std::result::Result<(), String> {
        let test_dir = self.bucket_dir().join(".health-check");
        let test_file = test_dir.join("test.bin");

        fs::create_dir_all(&test_dir)
            .await
            .map_err(|e| format!("create_dir_all({:?}): {}", test_dir, e))?;

        let data = b"storage-health-check";
        fs::write(&test_file, data)
            .await
            .map_err(|e| format!("write({:?}): {}", test_file, e))?;

        let read_data = fs::read(&test_file)
            .await
            .map_err(|e| format!("read({:?}): {}", test_file, e))?;
        if read_data != data {
            return Err("read-back mismatch".to_string());
        }

        fs::remove_file(&test_file)
            .await
            .map_err(|e| format!("remove_file({:?}): {}", test_file, e))?;
        let _ = fs::remove_dir(&test_dir).await; // Best-effort cleanup

        info!(
            subsystem = "storage",
            component = "filesystem",
            bucket_dir = %self.bucket_dir().display(),
            "Object store validated"
        );
        Ok(())
    }
}

/// Reject absolute paths, empty segments, and `.`/`..` traversal.
fn validate_object_path(path: &str) -> Result<()> {
    if path.is_empty() || path.starts_with('/') || path.contains('\\') || path.contains("//") {
        return Err(Error::InvalidInput(format!("invalid object path: {:?}", path)));
    }
    let all_normal = Path::new(path)
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    if !all_normal {
        return Err(Error::InvalidInput(format!("invalid object path: {:?}", path)));
    }
    Ok(())
}

fn temp_path_for(full_path: &Path) -> PathBuf {
    let name = full_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    full_path.with_file_name(format!(".{}.tmp", name))
}

#[async_trait]
impl ObjectStore for FilesystemObjectStore {
    #[instrument(skip(self, data), fields(subsystem = "storage", component = "filesystem", op = "upload", storage_path = %path, size = data.len()))]
    async fn upload(&self, path: &str, data: &[u8], content_type: Option<&str>) -> Result<()> {
        let full_path = self.full_path(path)?;
        if fs::try_exists(&full_path).await? {
            return Err(Error::Storage(format!("object already exists: {}", path)));
        }

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                warn!(parent = %parent.display(), error = %e, "object_store: create_dir_all failed");
                e
            })?;
        }

        // Atomic write: temp file + rename
        let temp_path = temp_path_for(&full_path);
        let mut file = fs::File::create(&temp_path).await.map_err(|e| {
            warn!(temp_path = %temp_path.display(), error = %e, "object_store: File::create failed");
            e
        })?;
        file.write_all(data).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &full_path).await.map_err(|e| {
            warn!(from = %temp_path.display(), to = %full_path.display(), error = %e, "object_store: rename failed");
            e
        })?;

        // rw-r--r--, no execute
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&full_path, std::fs::Permissions::from_mode(0o644)).await?;
        }

        debug!(
            content_type = content_type.unwrap_or("application/octet-stream"),
            "Object stored"
        );
        Ok(())
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.full_path(path)?;
        match fs::read(&full_path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("object {}", path)))
            }
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self, paths), fields(subsystem = "storage", component = "filesystem", op = "remove", object_count = paths.len()))]
    async fn remove(&self, paths: &[String]) -> Result<()> {
        // Validate the whole batch before touching anything.
        let full_paths = paths
            .iter()
            .map(|p| self.full_path(p))
            .collect::<Result<Vec<_>>>()?;

        let mut failures = Vec::new();
        for (path, full_path) in paths.iter().zip(full_paths) {
            match fs::remove_file(&full_path).await {
                Ok(()) => debug!(storage_path = %path, "Object removed"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!(storage_path = %path, "Object already absent")
                }
                Err(e) => {
                    warn!(storage_path = %path, error = %e, "object_store: remove failed");
                    failures.push(format!("{}: {}", path, e));
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::Storage(format!(
                "failed to remove {} object(s): {}",
                failures.len(),
                failures.join("; ")
            )))
        }
    }

    fn public_url(&self, path: &str) -> String {
        let encoded: Vec<String> = path
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!(
            "{}/{}/{}",
            self.public_base_url,
            ATTACHMENT_BUCKET,
            encoded.join("/")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_object_path() {
        assert!(validate_object_path("wiki/u1/x-file.pdf").is_ok());
        assert!(validate_object_path("").is_err());
        assert!(validate_object_path("/etc/passwd").is_err());
        assert!(validate_object_path("wiki/../../etc/passwd").is_err());
        assert!(validate_object_path("wiki//x").is_err());
        assert!(validate_object_path("wiki/./x").is_err());
        assert!(validate_object_path("wiki\\x").is_err());
    }

    #[test]
    fn test_public_url_encodes_segments() {
        let store = FilesystemObjectStore::new("/tmp/unused", "https://files.example.com/public/");
        assert_eq!(
            store.public_url("wiki/u1/abc-Plan A.pdf"),
            "https://files.example.com/public/wiki_attachments/wiki/u1/abc-Plan%20A.pdf"
        );
    }

    #[test]
    fn test_temp_path_is_hidden_sibling() {
        let tmp = temp_path_for(Path::new("/data/wiki/u1/abc-plan.pdf"));
        assert_eq!(tmp, PathBuf::from("/data/wiki/u1/.abc-plan.pdf.tmp"));
    }
}

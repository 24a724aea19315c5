//! Files served by the FS, confined to a single serving root

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("reading {name}: {reason}")]
    Io { name: String, reason: String },
}

/// Source of the bytes behind a resource name taken from a request path.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn read_resource(&self, name: &str) -> Result<Vec<u8>, ResourceError>;
}

/// Resources are regular files below `root`.
///
/// Names may contain `/`-separated subdirectories but only normal
/// components: `..`, `.`, absolute paths and symlinks that resolve outside
/// the root are all reported as not found.
#[derive(Debug, Clone)]
pub struct DirResourceStore {
    root: PathBuf,
}

impl DirResourceStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn confine(&self, name: &str) -> Result<PathBuf, ResourceError> {
        let relative = Path::new(name);
        let only_normal = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if name.is_empty() || !only_normal {
            warn!(resource = %name, "rejected resource name outside serving root");
            return Err(ResourceError::NotFound(name.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ResourceStore for DirResourceStore {
    async fn read_resource(&self, name: &str) -> Result<Vec<u8>, ResourceError> {
        let candidate = self.confine(name)?;
        let io_err = |e: std::io::Error| ResourceError::Io {
            name: name.to_string(),
            reason: e.to_string(),
        };

        let root = tokio::fs::canonicalize(&self.root).await.map_err(io_err)?;
        let resolved = match tokio::fs::canonicalize(&candidate).await {
            Ok(path) => path,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ResourceError::NotFound(name.to_string()))
            }
            Err(e) => return Err(io_err(e)),
        };
        if !resolved.starts_with(&root) {
            warn!(resource = %name, "resource resolves outside serving root");
            return Err(ResourceError::NotFound(name.to_string()));
        }

        let meta = tokio::fs::metadata(&resolved).await.map_err(io_err)?;
        if !meta.is_file() {
            return Err(ResourceError::NotFound(name.to_string()));
        }

        tokio::fs::read(&resolved).await.map_err(io_err)
    }
}

/// Name offered to the client in `Content-Disposition`: the final path
/// component of the resource.
pub fn download_name(resource: &str) -> String {
    Path::new(resource)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| resource.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_with_files() -> (TempDir, DirResourceStore) {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("files");
        std::fs::create_dir_all(root.join("reports")).unwrap();
        std::fs::write(root.join("report.pdf"), b"%PDF-1.4 report").unwrap();
        std::fs::write(root.join("reports/q3.txt"), b"q3 numbers").unwrap();
        std::fs::write(tmp.path().join("secret.txt"), b"outside root").unwrap();
        (tmp, DirResourceStore::new(root))
    }

    #[tokio::test]
    async fn test_reads_file_under_root() {
        let (_tmp, store) = store_with_files();
        assert_eq!(
            store.read_resource("report.pdf").await.unwrap(),
            b"%PDF-1.4 report"
        );
        assert_eq!(
            store.read_resource("reports/q3.txt").await.unwrap(),
            b"q3 numbers"
        );
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let (_tmp, store) = store_with_files();
        assert!(matches!(
            store.read_resource("absent.pdf").await,
            Err(ResourceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_traversal_is_not_found() {
        let (_tmp, store) = store_with_files();
        for name in ["../secret.txt", "reports/../../secret.txt", "/etc/passwd", "", "."] {
            assert!(
                matches!(
                    store.read_resource(name).await,
                    Err(ResourceError::NotFound(_))
                ),
                "{name:?} must be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_directory_is_not_found() {
        let (_tmp, store) = store_with_files();
        assert!(matches!(
            store.read_resource("reports").await,
            Err(ResourceError::NotFound(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_escape_is_not_found() {
        let (tmp, store) = store_with_files();
        std::os::unix::fs::symlink(tmp.path().join("secret.txt"), store.root().join("link.txt"))
            .unwrap();

        assert!(matches!(
            store.read_resource("link.txt").await,
            Err(ResourceError::NotFound(_))
        ));
    }

    #[test]
    fn test_download_name() {
        assert_eq!(download_name("report.pdf"), "report.pdf");
        assert_eq!(download_name("reports/q3.txt"), "q3.txt");
    }
}

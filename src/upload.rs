//! Asset upload collaborator boundary.
//! The provider's internals are out of scope; the core only depends on this trait.
//! Failures surface as `AppError::Upload` and abort the enclosing create/update.

use std::path::PathBuf;

use uuid::Uuid;

use crate::error::{AppError, AppResult};

pub trait AssetHost: Send + Sync {
    /// Store raw file bytes under a namespace tag and return a durable public URL.
    fn upload(&self, bytes: &[u8], folder: &str) -> AppResult<String>;
}

/// Filesystem-backed host for local deployments and tests. Serves no files by
/// itself; it only produces stable `/assets/...` URLs.
pub struct LocalAssetHost {
    root: PathBuf,
}

impl LocalAssetHost {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl AssetHost for LocalAssetHost {
    fn upload(&self, bytes: &[u8], folder: &str) -> AppResult<String> {
        let dir = self.root.join(folder);
        std::fs::create_dir_all(&dir)
            .map_err(|e| AppError::upload("upload_failed", e.to_string().as_str()))?;
        let name = format!("{}.bin", Uuid::new_v4());
        std::fs::write(dir.join(&name), bytes)
            .map_err(|e| AppError::upload("upload_failed", e.to_string().as_str()))?;
        Ok(format!("/assets/{}/{}", folder, name))
    }
}

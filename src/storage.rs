//! Object storage for uploaded covers and book files.
//!
//! Disk-backed pass-through: objects live under a configured root and are
//! served back under the `/files/` route.

use crate::error::{AppError, Result};
use std::path::{Component, Path, PathBuf};

/// Public URL for a stored object path.
pub fn public_url(path: &str) -> String {
    format!("/files/{}", path)
}

/// Disk-backed object store.
#[derive(Clone)]
pub struct ObjectStore {
    root: PathBuf,
}

impl ObjectStore {
    /// Create a store rooted at the given directory.
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Validate an object path and resolve it under the root.
    ///
    /// Rejects absolute paths and parent-directory components.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let rel = Path::new(path);

        if path.is_empty()
            || rel.is_absolute()
            || rel
                .components()
                .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(AppError::Invalid(format!("Invalid object path: {}", path)));
        }

        Ok(self.root.join(rel))
    }

    /// Store an object and return its public URL.
    pub fn upload(&self, path: &str, bytes: &[u8]) -> Result<String> {
        let target = self.resolve(path)?;

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&target, bytes)?;

        Ok(public_url(path))
    }

    /// Read an object's bytes.
    pub fn read(&self, path: &str) -> Result<Vec<u8>> {
        let target = self.resolve(path)?;

        match std::fs::read(&target) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(AppError::NotFound(format!("Object not found: {}", path)))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Filesystem path of an object, for streamed serving.
    pub fn object_path(&self, path: &str) -> Result<PathBuf> {
        let target = self.resolve(path)?;
        if !target.is_file() {
            return Err(AppError::NotFound(format!("Object not found: {}", path)));
        }
        Ok(target)
    }

    /// Remove objects. Already-missing objects are not an error.
    pub fn remove(&self, paths: &[String]) -> Result<()> {
        for path in paths {
            let target = self.resolve(path)?;
            match std::fs::remove_file(&target) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

//! # Resource Sources
//!
//! Resolve a named resource to the byte stream of a role document.
//!
//! Fetching is the caller's concern; the engine only needs something it can
//! read. `DirectoryResources` serves documents from a local folder.

use crate::SyncError;
use crate::primitives::MAX_DOCUMENT_BYTES;
use std::fs::File;
use std::io::Read;
use std::path::{Component, Path, PathBuf};

/// Something that can open a role document by name.
pub trait ResourceSource: Send + Sync {
    /// Open the named resource for reading.
    fn open(&self, name: &str) -> Result<Box<dyn Read + Send>, SyncError>;
}

/// Serves resources from files below a root directory.
///
/// Names are relative paths. Absolute names and names containing `..` are
/// rejected so that a name can never escape the root.
#[derive(Debug, Clone)]
pub struct DirectoryResources {
    root: PathBuf,
}

impl DirectoryResources {
    /// Serve resources from `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a resource name to a file path below the root.
    pub fn resolve(&self, name: &str) -> Result<PathBuf, SyncError> {
        let relative = Path::new(name);
        if name.is_empty() {
            return Err(SyncError::Resource("empty resource name".to_string()));
        }
        for component in relative.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => {
                    return Err(SyncError::Resource(format!(
                        "resource name '{}' must be a relative path inside the document root",
                        name
                    )));
                }
            }
        }
        Ok(self.root.join(relative))
    }
}

impl ResourceSource for DirectoryResources {
    fn open(&self, name: &str) -> Result<Box<dyn Read + Send>, SyncError> {
        let path = self.resolve(name)?;
        let metadata = std::fs::metadata(&path)
            .map_err(|e| SyncError::Resource(format!("{}: {}", path.display(), e)))?;
        if !metadata.is_file() {
            return Err(SyncError::Resource(format!(
                "{} is not a regular file",
                path.display()
            )));
        }
        if metadata.len() > MAX_DOCUMENT_BYTES {
            return Err(SyncError::Resource(format!(
                "{} is {} bytes, the limit is {}",
                path.display(),
                metadata.len(),
                MAX_DOCUMENT_BYTES
            )));
        }
        let file = File::open(&path)
            .map_err(|e| SyncError::Io(format!("open {}: {}", path.display(), e)))?;
        tracing::debug!(resource = name, path = %path.display(), "opened resource");
        Ok(Box::new(file))
    }
}

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::GuaError;

/// Image content ready to be attached to a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Turns a pool identifier into deliverable image content.
pub trait ImageStore: Send + Sync {
    fn resolve(&self, id: &str) -> Result<ImageData, GuaError>;
}

/// Reads images from a directory on disk.
#[derive(Debug, Clone)]
pub struct FsImageStore {
    dir: PathBuf,
}

impl FsImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ImageStore for FsImageStore {
    fn resolve(&self, id: &str) -> Result<ImageData, GuaError> {
        let path = self.dir.join(id);
        let bytes = fs::read(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => GuaError::ImageNotFound(id.to_string()),
            _ => GuaError::Io(e),
        })?;
        Ok(ImageData {
            name: id.to_string(),
            mime_type: mime_type_for(&path).to_string(),
            bytes,
        })
    }
}

pub fn mime_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        _ => "image/png",
    }
}

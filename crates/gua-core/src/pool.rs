use std::fs;
use std::path::{Path, PathBuf};

use glob::Pattern;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::GuaError;

/// The hexagram images available for drawing.
#[derive(Debug, Clone, Default)]
pub struct ImagePool {
    dir: PathBuf,
    ids: Vec<String>,
}

impl ImagePool {
    pub fn new(dir: impl Into<PathBuf>, ids: Vec<String>) -> Self {
        Self {
            dir: dir.into(),
            ids,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Uniform draw with replacement. `None` only for an empty pool.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&str> {
        self.ids.choose(rng).map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }
}

/// Scan `dir` for `<prefix>*.<extension>` files.
///
/// Failures are logged and degrade to an empty pool. A count other than
/// `expected` is logged as a warning but the pool is still usable.
pub fn load(dir: &Path, prefix: &str, extension: &str, expected: usize) -> ImagePool {
    match scan(dir, prefix, extension) {
        Ok(ids) => {
            if ids.len() != expected {
                tracing::warn!(
                    dir = %dir.display(),
                    expected,
                    found = ids.len(),
                    "Hexagram image count mismatch: expected {}, found {}",
                    expected,
                    ids.len()
                );
            }
            tracing::info!("Loaded {} hexagram images from {}", ids.len(), dir.display());
            ImagePool::new(dir, ids)
        }
        Err(e) => {
            tracing::error!(dir = %dir.display(), "Failed to load hexagram images: {}", e);
            ImagePool::new(dir, Vec::new())
        }
    }
}

fn scan(dir: &Path, prefix: &str, extension: &str) -> Result<Vec<String>, GuaError> {
    if !dir.exists() {
        return Err(GuaError::MissingDirectory(dir.to_path_buf()));
    }
    let pattern = Pattern::new(&format!(
        "{}*.{}",
        Pattern::escape(prefix),
        Pattern::escape(extension)
    ))
    .map_err(|e| GuaError::Settings(format!("image pattern: {e}")))?;

    let ids = fs::read_dir(dir)?
        .filter_map(|entry| {
            let entry = entry.ok()?;
            let name = entry.file_name().into_string().ok()?;
            pattern.matches(&name).then_some(name)
        })
        .collect();
    Ok(ids)
}

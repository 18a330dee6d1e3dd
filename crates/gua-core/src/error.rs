use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading settings or resolving images.
///
/// Command handling never surfaces these to users; they are logged and
/// mapped to a fixed reply.
#[derive(Debug, Error)]
pub enum GuaError {
    /// The configured image directory does not exist
    #[error("Image directory does not exist: {}", .0.display())]
    MissingDirectory(PathBuf),

    /// A selected image could not be found at render time
    #[error("Image not found: {0}")]
    ImageNotFound(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid settings value
    #[error("Invalid settings: {0}")]
    Settings(String),

    /// Timezone string that is neither `local`, `utc` nor `±HH:MM`
    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),
}

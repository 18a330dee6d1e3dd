use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{GuaError, Timezone};

/// Environment variable overriding the settings file location.
pub const CONFIG_ENV: &str = "GUA_CONFIG";
pub const IMAGE_DIR_ENV: &str = "GUA_IMAGE_DIR";
pub const DAILY_LIMIT_ENV: &str = "GUA_DAILY_LIMIT";
pub const TIMEZONE_ENV: &str = "GUA_TIMEZONE";

/// Number of hexagram images a complete pool holds.
pub const TOTAL_GUA: usize = 64;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GuaSettings {
    /// Directory holding the hexagram images
    #[serde(default = "default_image_dir")]
    pub image_dir: PathBuf,
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
    #[serde(default = "default_file_extension")]
    pub file_extension: String,
    /// Pool size that counts as complete; anything else is logged as a warning
    #[serde(default = "default_expected_total")]
    pub expected_total: usize,
    /// Draws per user per day. `null` disables the quota entirely.
    #[serde(default = "default_daily_limit")]
    pub daily_limit: Option<u32>,
    #[serde(default)]
    pub timezone: Timezone,
    /// Keyword the host routes to the draw command
    #[serde(default = "default_command")]
    pub command: String,
}

fn default_image_dir() -> PathBuf {
    gua_dir().join("64gua")
}

fn default_file_prefix() -> String {
    "64gua_".to_string()
}

fn default_file_extension() -> String {
    "jpg".to_string()
}

fn default_expected_total() -> usize {
    TOTAL_GUA
}

fn default_daily_limit() -> Option<u32> {
    Some(3)
}

fn default_command() -> String {
    "金钱卦".to_string()
}

impl Default for GuaSettings {
    fn default() -> Self {
        Self {
            image_dir: default_image_dir(),
            file_prefix: default_file_prefix(),
            file_extension: default_file_extension(),
            expected_total: default_expected_total(),
            daily_limit: default_daily_limit(),
            timezone: Timezone::default(),
            command: default_command(),
        }
    }
}

impl GuaSettings {
    /// Apply `GUA_IMAGE_DIR`, `GUA_DAILY_LIMIT` and `GUA_TIMEZONE` overrides.
    ///
    /// `lookup` is `std::env::var(..).ok()` in production; tests pass a map.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), GuaError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(IMAGE_DIR_ENV) {
            self.image_dir = PathBuf::from(dir);
        }
        if let Some(limit) = lookup(DAILY_LIMIT_ENV) {
            self.daily_limit = parse_daily_limit(&limit)?;
        }
        if let Some(tz) = lookup(TIMEZONE_ENV) {
            self.timezone = tz.parse()?;
        }
        Ok(())
    }
}

fn parse_daily_limit(raw: &str) -> Result<Option<u32>, GuaError> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("unlimited") || raw.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    raw.parse::<u32>()
        .map(Some)
        .map_err(|e| GuaError::Settings(format!("{DAILY_LIMIT_ENV}={raw}: {e}")))
}

// --- Storage ---

/// Resolve the global data directory (~/.gua/).
pub fn gua_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".gua")
}

/// Settings file location, honouring `GUA_CONFIG`.
pub fn settings_path() -> PathBuf {
    std::env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| gua_dir().join("settings.json"))
}

/// Read settings from the default location and apply environment overrides.
pub fn read_settings() -> Result<GuaSettings, GuaError> {
    let mut settings = read_settings_from(&settings_path())?;
    settings.apply_overrides(|key| std::env::var(key).ok())?;
    Ok(settings)
}

/// Read settings from `path`. A missing file yields the defaults.
pub fn read_settings_from(path: &Path) -> Result<GuaSettings, GuaError> {
    if !path.exists() {
        return Ok(GuaSettings::default());
    }
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

pub fn write_settings(path: &Path, settings: &GuaSettings) -> Result<(), GuaError> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    fs::write(path, json)?;
    Ok(())
}

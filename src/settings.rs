//! Runtime settings: timeouts, page sizes and result caps.
//!
//! Settings are optional JSON on disk. Missing files fall back to defaults so
//! a first run needs nothing but credentials.
use crate::backend::http::Timeouts;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const SETTINGS_SCHEMA_VERSION: u32 = 1;
const SETTINGS_DIR: &str = "app-builder";
const SETTINGS_FILE: &str = "config.json";

/// Search bounds applied by the catalog query service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchSettings {
    pub default_page_size: usize,
    pub application_page_size: usize,
    pub max_application_results: usize,
    pub max_asset_results: usize,
    pub exact_match_page_size: usize,
    pub connection_page_size: usize,
    pub max_connections: usize,
    pub max_connection_iterations: usize,
    pub description_snippet_chars: usize,
    pub min_search_chars: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub schema_version: u32,
    pub connect_timeout_secs: u64,
    /// Bulk saves can take minutes on large tenants.
    pub read_timeout_secs: u64,
    pub field_batch_size: usize,
    pub search: SearchSettings,
}

impl Settings {
    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            connect: Duration::from_secs(self.connect_timeout_secs),
            read: Duration::from_secs(self.read_timeout_secs),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        default_settings()
    }
}

pub fn default_settings() -> Settings {
    Settings {
        schema_version: SETTINGS_SCHEMA_VERSION,
        connect_timeout_secs: 30,
        read_timeout_secs: 3600,
        field_batch_size: 20,
        search: SearchSettings {
            default_page_size: 100,
            application_page_size: 50,
            max_application_results: 20,
            max_asset_results: 50,
            exact_match_page_size: 20,
            connection_page_size: 20,
            max_connections: 20,
            max_connection_iterations: 50,
            description_snippet_chars: 50,
            min_search_chars: 2,
        },
    }
}

/// `$XDG_CONFIG_HOME/app-builder/config.json` or the platform equivalent.
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(SETTINGS_DIR).join(SETTINGS_FILE))
}

pub fn load_settings(path: &Path) -> Result<Settings> {
    let bytes = fs::read(path).with_context(|| format!("read settings {}", path.display()))?;
    let settings: Settings =
        serde_json::from_slice(&bytes).context("parse settings JSON")?;
    validate_settings(&settings)?;
    Ok(settings)
}

/// Explicit path must exist; the default location is optional.
pub fn resolve_settings(explicit: Option<&Path>) -> Result<Settings> {
    if let Some(path) = explicit {
        return load_settings(path);
    }
    match default_settings_path() {
        Some(path) if path.is_file() => load_settings(&path),
        _ => Ok(default_settings()),
    }
}

pub fn validate_settings(settings: &Settings) -> Result<()> {
    if settings.schema_version != SETTINGS_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported settings schema_version {}",
            settings.schema_version
        ));
    }
    if settings.connect_timeout_secs == 0 || settings.read_timeout_secs == 0 {
        return Err(anyhow!("timeouts must be at least one second"));
    }
    let search = &settings.search;
    let sizes = [
        ("field_batch_size", settings.field_batch_size),
        ("search.default_page_size", search.default_page_size),
        ("search.application_page_size", search.application_page_size),
        ("search.max_application_results", search.max_application_results),
        ("search.max_asset_results", search.max_asset_results),
        ("search.exact_match_page_size", search.exact_match_page_size),
        ("search.connection_page_size", search.connection_page_size),
        ("search.max_connections", search.max_connections),
        ("search.max_connection_iterations", search.max_connection_iterations),
    ];
    for (label, value) in sizes {
        if value == 0 {
            return Err(anyhow!("{label} must be greater than zero"));
        }
    }
    Ok(())
}

//! Engine settings loaded from a RON file.
//!
//! Every field is optional in the file; anything missing keeps the engine
//! default.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use boundary_engine::{ArchiveEndpoint, EngineSettings};
use boundary_logging::boundary_info;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsFile {
    pub archive_host: String,
    pub archive_endpoint: String,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub classify_timeout_ms: u64,
    pub worker_pool_size: usize,
    pub lazy_root_margin: f64,
}

impl Default for SettingsFile {
    fn default() -> Self {
        let defaults = EngineSettings::default();
        Self {
            archive_host: defaults.archive.host,
            archive_endpoint: defaults.archive.endpoint,
            connect_timeout_ms: millis(defaults.connect_timeout),
            request_timeout_ms: millis(defaults.request_timeout),
            classify_timeout_ms: millis(defaults.classify_timeout),
            worker_pool_size: defaults.worker_pool_size,
            lazy_root_margin: defaults.lazy_root_margin,
        }
    }
}

impl From<SettingsFile> for EngineSettings {
    fn from(file: SettingsFile) -> Self {
        Self {
            archive: ArchiveEndpoint::new(file.archive_host, file.archive_endpoint),
            connect_timeout: Duration::from_millis(file.connect_timeout_ms),
            request_timeout: Duration::from_millis(file.request_timeout_ms),
            classify_timeout: Duration::from_millis(file.classify_timeout_ms),
            worker_pool_size: file.worker_pool_size.max(1),
            lazy_root_margin: file.lazy_root_margin,
        }
    }
}

pub fn parse_settings(text: &str) -> Result<EngineSettings> {
    let file: SettingsFile = ron::from_str(text).context("invalid settings file")?;
    Ok(file.into())
}

/// Reads settings from `path`, or the defaults when no path is given.
pub fn load_settings(path: Option<&Path>) -> Result<EngineSettings> {
    let Some(path) = path else {
        return Ok(EngineSettings::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read settings from {}", path.display()))?;
    let settings = parse_settings(&text)
        .with_context(|| format!("failed to load settings from {}", path.display()))?;
    boundary_info!("Loaded settings from {:?}", path);
    Ok(settings)
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

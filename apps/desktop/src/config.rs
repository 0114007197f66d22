use std::{fs, path::Path, time::Duration};

use anyhow::Context;
use client_core::normalize_server_url;
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "desktop.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_url: String,
    pub request_timeout_secs: u64,
    pub confirmation_ttl_secs: u64,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:5000".into(),
            request_timeout_secs: 30,
            confirmation_ttl_secs: 3,
            log_filter: "info".into(),
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn confirmation_ttl(&self) -> Duration {
        Duration::from_secs(self.confirmation_ttl_secs)
    }
}

/// Keys accepted in `desktop.toml`; all optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    server_url: Option<String>,
    request_timeout_secs: Option<u64>,
    confirmation_ttl_secs: Option<u64>,
    log_filter: Option<String>,
}

/// Flags that take precedence over file and environment.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub server_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

pub fn load_settings(config_path: &Path, overrides: &Overrides) -> anyhow::Result<Settings> {
    load_settings_with(config_path, overrides, |key| std::env::var(key).ok())
}

pub(crate) fn load_settings_with(
    config_path: &Path,
    overrides: &Overrides,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    if config_path.exists() {
        let raw = fs::read_to_string(config_path)
            .with_context(|| format!("reading {}", config_path.display()))?;
        let file_cfg: FileSettings = toml::from_str(&raw)
            .with_context(|| format!("parsing {}", config_path.display()))?;
        if let Some(v) = file_cfg.server_url {
            settings.server_url = v;
        }
        if let Some(v) = file_cfg.request_timeout_secs {
            settings.request_timeout_secs = v;
        }
        if let Some(v) = file_cfg.confirmation_ttl_secs {
            settings.confirmation_ttl_secs = v;
        }
        if let Some(v) = file_cfg.log_filter {
            settings.log_filter = v;
        }
    }

    if let Some(v) = env("CLASSIFIER_SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = env("APP__SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = env("APP__REQUEST_TIMEOUT_SECS") {
        settings.request_timeout_secs = parse_secs("APP__REQUEST_TIMEOUT_SECS", &v)?;
    }
    if let Some(v) = env("APP__CONFIRMATION_TTL_SECS") {
        settings.confirmation_ttl_secs = parse_secs("APP__CONFIRMATION_TTL_SECS", &v)?;
    }
    if let Some(v) = env("APP__LOG_FILTER") {
        settings.log_filter = v;
    }

    if let Some(v) = &overrides.server_url {
        settings.server_url = v.clone();
    }
    if let Some(v) = overrides.request_timeout_secs {
        settings.request_timeout_secs = v;
    }

    settings.server_url = normalize_server_url(&settings.server_url)
        .context("invalid classifier server url")?;
    if settings.request_timeout_secs == 0 {
        anyhow::bail!("request timeout must be at least one second");
    }

    Ok(settings)
}

fn parse_secs(key: &str, raw: &str) -> anyhow::Result<u64> {
    raw.trim()
        .parse::<u64>()
        .with_context(|| format!("{key} must be a whole number of seconds, got {raw:?}"))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;

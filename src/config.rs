// Runtime configuration
//
// Layering (later wins):
// - built-in defaults
// - optional `oncopredict.toml` in the working directory (or the file named by ONCOPREDICT_CONFIG)
// - environment variables prefixed with ONCOPREDICT_ (e.g. ONCOPREDICT_SERVICE_BASE_URL)

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

pub const CONFIG_PATH_ENV: &str = "ONCOPREDICT_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "oncopredict.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub service_base_url: String,
    pub request_timeout_secs: u64,
    pub autosave_debounce_ms: u64,
    pub settle_delay_ms: u64,
    #[serde(default)]
    pub autosave_path: Option<PathBuf>,
    #[serde(default)]
    pub export_dir: Option<PathBuf>,
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            service_base_url: "http://localhost:8000".to_string(),
            request_timeout_secs: 30,
            autosave_debounce_ms: 1000,
            settle_delay_ms: 500,
            autosave_path: None,
            export_dir: None,
            log_dir: None,
        }
    }
}

impl Settings {
    /// Load settings from defaults, the optional config file and the environment.
    pub fn load() -> Result<Self> {
        let file = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.into());
        Self::load_from(&file)
    }

    pub fn load_from(file: &str) -> Result<Self> {
        let d = Settings::default();
        let built = config::Config::builder()
            .set_default("service_base_url", d.service_base_url)?
            .set_default("request_timeout_secs", d.request_timeout_secs)?
            .set_default("autosave_debounce_ms", d.autosave_debounce_ms)?
            .set_default("settle_delay_ms", d.settle_delay_ms)?
            .add_source(config::File::with_name(file).required(false))
            .add_source(config::Environment::with_prefix("ONCOPREDICT").try_parsing(true))
            .build()
            .context("Failed to read configuration")?;

        let settings: Settings = built
            .try_deserialize()
            .context("Invalid configuration values")?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(self.service_base_url.trim())
            .with_context(|| format!("service_base_url is not a valid URL: {}", self.service_base_url))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            anyhow::bail!("service_base_url must use http or https");
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be at least 1");
        }
        Ok(())
    }

    /// Base URL with a trailing slash so relative joins keep any path prefix.
    pub fn service_base(&self) -> Result<Url> {
        let mut raw = self.service_base_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        Url::parse(&raw).with_context(|| format!("Invalid service URL: {}", raw))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn autosave_debounce(&self) -> Duration {
        Duration::from_millis(self.autosave_debounce_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

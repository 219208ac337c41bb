use std::time::Duration;

use serde::Deserialize;

use kudos_shared::types::pagination::DEFAULT_PAGE_SIZE;

use crate::poller::{PreviewSettings, DEFAULT_DISPLAY_CAP, DEFAULT_POLL_INTERVAL_MS};
use crate::sync::ErrorPolicy;

#[derive(Debug, Deserialize, Clone)]
pub struct InboxConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_previews_path")]
    pub previews_path: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_preview_cap")]
    pub preview_cap: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default)]
    pub bulk_error_policy: ErrorPolicy,
}

fn default_api_base_url() -> String { "http://localhost:8080/api".into() }
fn default_previews_path() -> String { "/messages/conversations".into() }
fn default_poll_interval_ms() -> u64 { DEFAULT_POLL_INTERVAL_MS }
fn default_preview_cap() -> usize { DEFAULT_DISPLAY_CAP }
fn default_page_size() -> usize { DEFAULT_PAGE_SIZE }

impl Default for InboxConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            previews_path: default_previews_path(),
            poll_interval_ms: default_poll_interval_ms(),
            preview_cap: default_preview_cap(),
            page_size: default_page_size(),
            bulk_error_policy: ErrorPolicy::default(),
        }
    }
}

impl InboxConfig {
    /// Reads `KUDOS_INBOX__*` environment variables; anything unset keeps its default.
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("KUDOS_INBOX").separator("__"))
            .build()?;
        Ok(config.try_deserialize().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "invalid inbox configuration, using defaults");
            Self::default()
        }))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn preview_settings(&self) -> PreviewSettings {
        PreviewSettings {
            interval: self.poll_interval(),
            display_cap: self.preview_cap,
        }
    }
}

//! Plugin settings

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{RenderError, RenderResult};
use crate::listener::DEFAULT_SETTLE_DELAY;
use crate::server::ServerConfig;
use crate::urls;

/// Settings for rendering stories
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorybookSettings {
    /// Storybook base URL
    pub storybook_url: String,

    /// Live preview URL; overrides `storybook_url` when set
    pub live_url: Option<String>,

    /// Start a Storybook dev server before rendering
    pub start_storybook: bool,

    /// Settle window after the last render event
    pub settle_delay_ms: u64,

    /// Upper bound on waiting for a render (0 = wait forever)
    pub render_timeout_ms: u64,

    /// Open the interactive debugger after rendering
    pub debug: bool,

    /// Pause after rendering so the story can be inspected
    pub preview: bool,

    /// Dev server launcher
    pub server: ServerConfig,
}

impl Default for StorybookSettings {
    fn default() -> Self {
        Self {
            storybook_url: urls::DEFAULT_STORYBOOK_URL.to_string(),
            live_url: None,
            start_storybook: false,
            settle_delay_ms: DEFAULT_SETTLE_DELAY.as_millis() as u64,
            render_timeout_ms: 30_000,
            debug: false,
            preview: false,
            server: ServerConfig::default(),
        }
    }
}

impl StorybookSettings {
    /// Load settings from a TOML file, falling back to defaults when it does not exist
    pub fn load(path: &Path) -> RenderResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let settings: Self = toml::from_str(&content)?;
            settings.validate()?;
            Ok(settings)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> RenderResult<()> {
        if self.storybook_url.trim().is_empty() && self.live_url.is_none() {
            return Err(RenderError::Config("storybook_url must not be empty".into()));
        }
        if self.settle_delay_ms == 0 {
            return Err(RenderError::Config("settle_delay_ms must be greater than zero".into()));
        }
        Ok(())
    }

    /// The viewer base URL every story URL is built from
    pub fn base_url(&self) -> String {
        urls::resolve_base_url(self.live_url.as_deref(), &self.storybook_url)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn render_timeout(&self) -> Option<Duration> {
        match self.render_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

/// Default settings file location
pub fn default_settings_path() -> PathBuf {
    PathBuf::from("storysync.toml")
}

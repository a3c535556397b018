use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::executor::ExecutorConfig;
use crate::{AppError, Result};

const SETTINGS_FILE: &str = "settings.toml";

#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub api: ApiSettings,
    #[serde(default, rename = "rate-limit")]
    pub rate_limit: RateLimitSettings,
    #[serde(default)]
    pub downloads: DownloadSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiSettings {
    #[serde(default = "default_base_url", rename = "base-url")]
    pub base_url: String,
    #[serde(default = "default_page_limit", rename = "page-limit")]
    pub page_limit: u32,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            page_limit: default_page_limit(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitSettings {
    #[serde(default = "one", rename = "base-delay-secs")]
    pub base_delay_secs: u64,
    #[serde(default = "five", rename = "additional-sleep-secs")]
    pub additional_sleep_secs: u64,
    #[serde(default = "ten", rename = "gentle-additional-sleep-secs")]
    pub gentle_additional_sleep_secs: u64,
    #[serde(default = "one", rename = "retry-pacing-secs")]
    pub retry_pacing_secs: u64,
    #[serde(default = "one", rename = "page-delay-secs")]
    pub page_delay_secs: u64,
    #[serde(default = "one", rename = "thread-delay-secs")]
    pub thread_delay_secs: u64,
    /// Absent means retry rate-limited requests forever.
    #[serde(default, rename = "max-attempts")]
    pub max_attempts: Option<u32>,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            base_delay_secs: 1,
            additional_sleep_secs: 5,
            gentle_additional_sleep_secs: 10,
            retry_pacing_secs: 1,
            page_delay_secs: 1,
            thread_delay_secs: 1,
            max_attempts: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DownloadSettings {
    #[serde(default = "ten_attempts", rename = "max-attempts")]
    pub max_attempts: u32,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self { max_attempts: 10 }
    }
}

fn default_base_url() -> String {
    "https://slack.com/api/".to_string()
}

fn default_page_limit() -> u32 {
    100
}

fn one() -> u64 {
    1
}

fn five() -> u64 {
    5
}

fn ten() -> u64 {
    10
}

fn ten_attempts() -> u32 {
    10
}

impl Settings {
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(SETTINGS_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| AppError::ReadFile {
            path: path.display().to_string(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| AppError::TomlParse(e.to_string()))
    }

    /// Executor settings; `gentle` swaps in the longer rate-limit buffer.
    pub fn executor_config(&self, gentle: bool) -> ExecutorConfig {
        let rl = &self.rate_limit;
        let additional = if gentle {
            rl.gentle_additional_sleep_secs
        } else {
            rl.additional_sleep_secs
        };

        ExecutorConfig {
            base_delay: Duration::from_secs(rl.base_delay_secs),
            additional_sleep: Duration::from_secs(additional),
            retry_pacing: Duration::from_secs(rl.retry_pacing_secs),
            max_attempts: rl.max_attempts,
        }
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_secs(self.rate_limit.page_delay_secs)
    }

    pub fn thread_delay(&self) -> Duration {
        Duration::from_secs(self.rate_limit.thread_delay_secs)
    }
}

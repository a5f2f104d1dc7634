use directories::BaseDirs;
use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::warn;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Clone, Debug, Default, Deserialize)]
pub struct OpenAiFileConfig {
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub timeout_ms: Option<u64>,
    pub stream_max_retries: Option<u32>,
    pub stream_idle_timeout_ms: Option<u64>,
    pub open_timeout_ms: Option<u64>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
    /// Retries after a failed open; the first attempt is not counted.
    pub stream_max_retries: u32,
    pub stream_idle_timeout: Duration,
    pub open_timeout: Option<Duration>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub proxy: Option<String>,
}

impl OpenAiConfig {
    pub fn from_env_and_file() -> anyhow::Result<Self> {
        let file = Self::config_path()
            .filter(|p| p.exists())
            .and_then(|p| Self::read_file(&p))
            .unwrap_or_default();
        Self::resolve(|k| env::var(k).ok(), file)
    }

    /// Merges environment lookups over file settings over defaults.
    pub fn resolve(
        var: impl Fn(&str) -> Option<String>,
        file: OpenAiFileConfig,
    ) -> anyhow::Result<Self> {
        let api_key = var("OPENAI_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("OPENAI_API_KEY not set"))?;
        let base_url = var("OPENAI_BASE_URL")
            .or(file.base_url)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let proxy = var("HTTPS_PROXY").or_else(|| var("HTTP_PROXY"));

        Ok(OpenAiConfig {
            api_key,
            base_url,
            model: file.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            timeout: Duration::from_millis(file.timeout_ms.unwrap_or(30_000)),
            stream_max_retries: file.stream_max_retries.unwrap_or(3),
            stream_idle_timeout: Duration::from_millis(
                file.stream_idle_timeout_ms.unwrap_or(300_000),
            ),
            open_timeout: file.open_timeout_ms.map(Duration::from_millis),
            temperature: file.temperature,
            max_tokens: file.max_tokens,
            proxy,
        })
    }

    fn read_file(path: &Path) -> Option<OpenAiFileConfig> {
        let text = fs::read_to_string(path).ok()?;
        match toml::from_str::<OpenAiFileConfig>(&text) {
            Ok(cfg) => Some(cfg),
            Err(e) => {
                warn!(target: "providers::openai", "ignoring {}: {}", path.display(), e);
                None
            }
        }
    }

    pub fn config_path() -> Option<PathBuf> {
        let base = BaseDirs::new()?;
        let p = if cfg!(target_os = "windows") {
            base.home_dir().join(".aesthetic").join("config.toml")
        } else {
            base.config_dir().join("aesthetic").join("config.toml")
        };
        Some(p)
    }
}

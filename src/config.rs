use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const APP_NAME: &str = "swapover";

#[derive(Debug, Deserialize)]
pub struct Config {
    /// Owner of the repository publishing releases
    #[serde(default)]
    pub owner: Option<String>,

    #[serde(default)]
    pub repo: Option<String>,

    /// Asset name template, e.g. `swapover-{version}-{os}-{arch}{ext}`
    #[serde(default = "default_asset_template")]
    pub asset_template: String,

    #[serde(default)]
    pub staging_dir: Option<PathBuf>,

    /// Environment variable holding the API token
    #[serde(default = "default_token_env")]
    pub token_env: String,

    #[serde(default = "default_true")]
    pub forward_args: bool,

    #[serde(default)]
    pub os: Option<String>,

    #[serde(default)]
    pub arch: Option<String>,

    /// GitHub API root, for GitHub Enterprise
    #[serde(default)]
    pub api_url: Option<String>,
}

fn default_asset_template() -> String {
    format!("{}-{{version}}-{{os}}-{{arch}}{{ext}}", APP_NAME)
}

fn default_token_env() -> String {
    "GITHUB_TOKEN".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            owner: None,
            repo: None,
            asset_template: default_asset_template(),
            staging_dir: None,
            token_env: default_token_env(),
            forward_args: true,
            os: None,
            arch: None,
            api_url: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }

    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join(APP_NAME)
            .join("config.toml")
    }

    /// Staging directory, defaulting to the user cache dir
    pub fn staging_dir(&self) -> PathBuf {
        self.staging_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join(APP_NAME)
        })
    }

    /// Token from the configured environment variable, if set and non-empty
    pub fn token(&self) -> Option<String> {
        std::env::var(&self.token_env)
            .ok()
            .filter(|t| !t.is_empty())
    }
}

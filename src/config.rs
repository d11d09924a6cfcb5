use anyhow::{anyhow, Context, Result};
use directories::ProjectDirs;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::pacer::PacerConfig;

static SETTINGS_FILE_NAME: &str = "settings.json";

pub const ENV_URL: &str = "MEDIAFS_URL";
pub const ENV_CLIENT_ID: &str = "MEDIAFS_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "MEDIAFS_CLIENT_SECRET";

/// Platform directories for settings and logs
pub struct ProjectConfig {
    pub settings: MediaFsConfig,
    pub project_dirs: ProjectDirs,
}

impl ProjectConfig {
    pub fn new() -> Result<Self> {
        let proj_dirs = ProjectDirs::from("com", "shopware-mediafs", "mediafs")
            .ok_or_else(|| anyhow!("Failed to get project directories"))?;
        for dir in [proj_dirs.config_dir(), proj_dirs.data_dir()] {
            if !dir.exists() {
                fs::create_dir_all(dir).context("Failed to create config directory")?;
            }
        }

        let settings = MediaFsConfig::new(&proj_dirs.config_dir().join(SETTINGS_FILE_NAME))?;
        Ok(Self {
            settings,
            project_dirs: proj_dirs,
        })
    }

    pub fn settings_path(&self) -> PathBuf {
        self.project_dirs.config_dir().join(SETTINGS_FILE_NAME)
    }
}

/// Connection and retry settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MediaFsConfig {
    /// Shop base URL, e.g. `https://shop.example`
    #[serde(default)]
    pub shop_url: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default)]
    pub pacer: PacerConfig,
}

fn default_api_version() -> String {
    "v3".to_string()
}

impl Default for MediaFsConfig {
    fn default() -> Self {
        Self {
            shop_url: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            api_version: default_api_version(),
            pacer: PacerConfig::default(),
        }
    }
}

impl MediaFsConfig {
    /// Load settings from `config_file_path`, writing defaults if it can't be read
    pub fn new(config_file_path: &Path) -> Result<Self> {
        match Self::load_from_file(config_file_path) {
            Ok(settings) => Ok(settings),
            Err(e) => {
                warn!("Error loading settings from file - creating default config: {}", e);
                let default = Self::default();
                default.save_to_file(config_file_path)?;
                Ok(default)
            }
        }
    }

    pub fn load_from_file(config_file_path: &Path) -> Result<Self> {
        if !config_file_path.exists() {
            return Err(anyhow!("Config file not found"));
        }
        let data = fs::read_to_string(config_file_path)?;
        let settings: Self = serde_json::from_str(&data)
            .with_context(|| format!("Invalid settings in {}", config_file_path.display()))?;
        Ok(settings)
    }

    pub fn save_to_file(&self, config_file_path: &Path) -> Result<()> {
        if let Some(parent_path) = config_file_path.parent() {
            fs::create_dir_all(parent_path).context("Failed to create config directory")?;
        }

        let data = serde_json::to_string_pretty(self)?;
        fs::write(config_file_path, data)?;
        info!("Saved settings to {}", config_file_path.display());
        Ok(())
    }

    /// Override settings from `MEDIAFS_*` environment variables
    pub fn apply_env(&mut self) {
        if let Ok(url) = env::var(ENV_URL) {
            self.shop_url = url;
        }
        if let Ok(id) = env::var(ENV_CLIENT_ID) {
            self.client_id = id;
        }
        if let Ok(secret) = env::var(ENV_CLIENT_SECRET) {
            self.client_secret = secret;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.shop_url.trim().is_empty() {
            return Err(anyhow!("shop URL is not set (--url or {})", ENV_URL));
        }
        let url = url::Url::parse(&self.shop_url)
            .with_context(|| format!("shop URL {} is not a valid URL", self.shop_url))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(anyhow!("shop URL {} must use http or https", self.shop_url));
        }
        if self.client_id.is_empty() {
            return Err(anyhow!("client id is not set (--client-id or {})", ENV_CLIENT_ID));
        }
        if self.client_secret.is_empty() {
            return Err(anyhow!(
                "client secret is not set (--client-secret or {})",
                ENV_CLIENT_SECRET
            ));
        }
        if self.pacer.min_sleep_ms == 0 {
            return Err(anyhow!("pacer.min_sleep_ms must be at least 1"));
        }
        Ok(())
    }
}

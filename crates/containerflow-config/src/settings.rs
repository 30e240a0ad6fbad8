//! Operator settings
//!
//! Settings live in `settings.yaml`, either in the project's
//! `.containerflow/` directory or in `~/.config/containerflow/`. The project
//! file wins; environment variables override both.

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const SETTINGS_FILE: &str = "settings.yaml";
const FOLDER_ENV: &str = "CONTAINERFLOW_FOLDER_ID";
const ENDPOINT_ENV: &str = "CONTAINERFLOW_ENDPOINT";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Folder used when a container does not declare one
    pub folder_id: Option<String>,

    /// Serverless containers API base URL
    pub endpoint: String,

    /// Operation API base URL
    pub operation_endpoint: String,

    pub timeouts: Timeouts,

    pub poll: PollSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            folder_id: None,
            endpoint: "https://serverless-containers.api.cloud.yandex.net".to_string(),
            operation_endpoint: "https://operation.api.cloud.yandex.net".to_string(),
            timeouts: Timeouts::default(),
            poll: PollSettings::default(),
        }
    }
}

/// Deadline budget for each kind of reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    #[serde(with = "humantime_serde")]
    pub create: Duration,
    #[serde(with = "humantime_serde")]
    pub update: Duration,
    #[serde(with = "humantime_serde")]
    pub delete: Duration,
    #[serde(with = "humantime_serde")]
    pub read: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            create: DEFAULT_TIMEOUT,
            update: DEFAULT_TIMEOUT,
            delete: DEFAULT_TIMEOUT,
            read: DEFAULT_TIMEOUT,
        }
    }
}

/// Operation polling cadence (exponential backoff)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    #[serde(with = "humantime_serde")]
    pub initial_delay: Duration,
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            multiplier: 1.5,
        }
    }
}

impl Settings {
    pub fn from_yaml_str(content: &str, origin: impl Into<PathBuf>) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|source| ConfigError::InvalidSettings {
            path: origin.into(),
            source,
        })
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content, path)
    }

    /// Load settings for a project rooted at `project_root`
    pub fn load(project_root: &Path) -> Result<Self> {
        let project_file = project_root.join(".containerflow").join(SETTINGS_FILE);
        let global_file = dirs::config_dir().map(|d| d.join("containerflow").join(SETTINGS_FILE));

        let mut settings = if project_file.exists() {
            tracing::debug!(path = %project_file.display(), "Loading project settings");
            Self::load_from(&project_file)?
        } else if let Some(global) = global_file.filter(|p| p.exists()) {
            tracing::debug!(path = %global.display(), "Loading global settings");
            Self::load_from(&global)?
        } else {
            Self::default()
        };

        settings.apply_env_overrides();
        Ok(settings)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(folder_id) = std::env::var(FOLDER_ENV)
            && !folder_id.is_empty()
        {
            self.folder_id = Some(folder_id);
        }
        if let Ok(endpoint) = std::env::var(ENDPOINT_ENV)
            && !endpoint.is_empty()
        {
            self.endpoint = endpoint;
        }
    }
}

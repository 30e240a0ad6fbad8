//! Serverless container model
//!
//! `DesiredConfig` is the user-declared shape of one container. The same
//! shape is reused for the observed state so that drift is a structural
//! comparison between two values of this type.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Declared configuration of a serverless container
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredConfig {
    /// Container name (unique within the folder)
    pub name: String,

    /// Folder that owns the container. `None` means "use the default folder"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    /// Memory in megabytes, aligned to the platform granularity (128 MB)
    pub memory: u64,

    /// Number of cores. `None` leaves the platform default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cores: Option<u64>,

    /// Guaranteed core fraction in percent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub core_fraction: Option<u64>,

    /// Request timeout as a duration string, e.g. "30s" or "1m 30s"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_timeout: Option<String>,

    /// Concurrent requests per instance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_id: Option<String>,

    /// Lockbox secrets exposed as environment variables.
    /// `None` means "not declared", `Some(vec![])` means "none at all".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secrets: Option<Vec<SecretMount>>,

    /// Object storage buckets mounted into the container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_mounts: Option<Vec<StorageMount>>,

    pub image: ImageSpec,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connectivity: Option<Connectivity>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_options: Option<LogOptions>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provision_policy: Option<ProvisionPolicy>,
}

impl DesiredConfig {
    /// Create a config with the two mandatory deployment fields set
    pub fn new(name: impl Into<String>, image_url: impl Into<String>, memory: u64) -> Self {
        Self {
            name: name.into(),
            memory,
            image: ImageSpec::new(image_url),
            ..Default::default()
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

/// A secret version mapped to an environment variable
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretMount {
    pub id: String,
    pub version_id: String,
    pub key: String,
    pub environment_variable: String,
}

/// An object storage bucket mounted at a path inside the container
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageMount {
    pub mount_point_path: String,
    pub bucket: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default)]
    pub read_only: bool,
}

/// Container image and its entrypoint overrides
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSpec {
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_dir: Option<String>,

    /// Entrypoint override. `None` keeps the image default, `Some(vec![])`
    /// clears it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,

    /// Arguments override, same semantics as `command`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,

    #[serde(default)]
    pub environment: BTreeMap<String, String>,
}

impl ImageSpec {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }
}

/// VPC network attachment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connectivity {
    pub network_id: String,
}

/// Log routing as declared by the user.
///
/// Exactly one of `log_group_id` / `folder_id` must be set while logging is
/// enabled; the two are resolved into a single destination when the
/// deployment payload is built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogOptions {
    #[serde(default)]
    pub disabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_group_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<String>,

    /// Minimum severity name (TRACE, DEBUG, INFO, WARN, ERROR, FATAL)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_level: Option<String>,
}

/// Scaling policy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionPolicy {
    /// Instances kept warm at all times
    pub min_instances: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_sets_mandatory_fields() {
        let config = DesiredConfig::new("api", "cr.yandex/crp/api:1.0", 512);
        assert_eq!(config.name, "api");
        assert_eq!(config.memory, 512);
        assert_eq!(config.image.url, "cr.yandex/crp/api:1.0");
        assert!(config.image.command.is_none());
        assert!(config.secrets.is_none());
    }

    #[test]
    fn test_json_omits_unset_fields() {
        let config = DesiredConfig::new("api", "cr.yandex/crp/api:1.0", 256);
        let json = serde_json::to_value(&config).unwrap();
        assert!(json.get("cores").is_none());
        assert!(json.get("log_options").is_none());
        assert!(json["image"].get("command").is_none());

        let back: DesiredConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_empty_command_survives_serialization() {
        let mut config = DesiredConfig::new("api", "img", 128);
        config.image.command = Some(Vec::new());

        let json = serde_json::to_string(&config).unwrap();
        let back: DesiredConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.image.command, Some(Vec::new()));
    }
}

//! Change-set analysis
//!
//! Decides which remote calls a pass needs: a field-masked metadata update,
//! a new revision, both, neither, or (when the folder moves) a replacement.

use crate::record::ObservableRecord;
use crate::units::same_duration;
use containerflow_core::DesiredConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Mutable top-level attributes, updated in place under a field mask
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopLevelField {
    Name,
    Description,
    Labels,
}

impl TopLevelField {
    /// Field-mask path
    pub fn as_str(&self) -> &'static str {
        match self {
            TopLevelField::Name => "name",
            TopLevelField::Description => "description",
            TopLevelField::Labels => "labels",
        }
    }
}

impl std::fmt::Display for TopLevelField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields whose change requires deploying a new revision
pub const REVISION_FIELDS: [&str; 12] = [
    "memory",
    "cores",
    "core_fraction",
    "execution_timeout",
    "service_account_id",
    "secrets",
    "image",
    "concurrency",
    "connectivity",
    "storage_mounts",
    "log_options",
    "provision_policy",
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSet {
    pub top_level_fields: BTreeSet<TopLevelField>,
    pub needs_new_revision: bool,
    /// Which of [`REVISION_FIELDS`] differ, in that order
    pub revision_fields: Vec<&'static str>,
    /// The declared folder differs from the observed one
    pub requires_replacement: bool,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.top_level_fields.is_empty() && !self.needs_new_revision && !self.requires_replacement
    }

    /// Update mask for the top-level update call
    pub fn field_mask(&self) -> Vec<String> {
        self.top_level_fields
            .iter()
            .map(|f| f.as_str().to_string())
            .collect()
    }
}

/// Compare the declared configuration against the last observed record
pub fn compute_changes(prior: &ObservableRecord, desired: &DesiredConfig) -> ChangeSet {
    let observed = &prior.config;
    let mut top_level_fields = BTreeSet::new();

    if desired.name != observed.name {
        top_level_fields.insert(TopLevelField::Name);
    }
    if non_empty(&desired.description) != non_empty(&observed.description) {
        top_level_fields.insert(TopLevelField::Description);
    }
    if desired.labels != observed.labels {
        top_level_fields.insert(TopLevelField::Labels);
    }

    let checks = [
        desired.memory != observed.memory,
        declared_differs(&desired.cores, &observed.cores),
        declared_differs(&desired.core_fraction, &observed.core_fraction),
        timeout_differs(&desired.execution_timeout, &observed.execution_timeout),
        desired.service_account_id != observed.service_account_id,
        declared_differs(&desired.secrets, &observed.secrets),
        desired.image != observed.image,
        desired.concurrency != observed.concurrency,
        desired.connectivity != observed.connectivity,
        declared_differs(&desired.storage_mounts, &observed.storage_mounts),
        declared_differs(&desired.log_options, &observed.log_options),
        desired.provision_policy != observed.provision_policy,
    ];

    let revision_fields: Vec<&'static str> = REVISION_FIELDS
        .iter()
        .zip(checks)
        .filter_map(|(field, changed)| changed.then_some(*field))
        .collect();

    let requires_replacement = desired
        .folder_id
        .as_deref()
        .is_some_and(|folder| folder != prior.folder_id);

    ChangeSet {
        top_level_fields,
        needs_new_revision: !revision_fields.is_empty(),
        revision_fields,
        requires_replacement,
    }
}

/// Fields the platform fills in when left unset: an undeclared value never
/// counts as a change.
fn declared_differs<T: PartialEq>(desired: &Option<T>, observed: &Option<T>) -> bool {
    desired.as_ref().is_some_and(|d| Some(d) != observed.as_ref())
}

fn timeout_differs(desired: &Option<String>, observed: &Option<String>) -> bool {
    match (desired, observed) {
        (None, _) => false,
        (Some(_), None) => true,
        (Some(d), Some(o)) => !same_duration(d, o),
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RevisionState;
    use containerflow_core::{Connectivity, LogOptions, SecretMount};

    fn record(config: DesiredConfig) -> ObservableRecord {
        ObservableRecord {
            id: "ctr-1".to_string(),
            folder_id: "b1gfolder".to_string(),
            created_at: None,
            url: "https://ctr-1.containers.yandexcloud.net/".to_string(),
            revision: RevisionState::Active {
                revision_id: "rev-1".to_string(),
            },
            image_digest: None,
            config,
        }
    }

    fn config() -> DesiredConfig {
        let mut config = DesiredConfig::new("api", "cr.yandex/crp/api:1.0", 512)
            .with_label("env", "prod");
        config.cores = Some(1);
        config.core_fraction = Some(100);
        config.execution_timeout = Some("3s".to_string());
        config.concurrency = Some(4);
        config.secrets = Some(vec![SecretMount {
            id: "e6q".to_string(),
            version_id: "v1".to_string(),
            key: "token".to_string(),
            environment_variable: "TOKEN".to_string(),
        }]);
        config
    }

    #[test]
    fn test_no_changes_against_itself() {
        let prior = record(config());
        let changes = compute_changes(&prior, &prior.config);
        assert!(changes.is_empty());
        assert!(changes.field_mask().is_empty());
    }

    #[test]
    fn test_label_change_is_metadata_only() {
        let prior = record(config());
        let desired = config().with_label("team", "core");

        let changes = compute_changes(&prior, &desired);
        assert_eq!(
            changes.top_level_fields,
            BTreeSet::from([TopLevelField::Labels])
        );
        assert!(!changes.needs_new_revision);
        assert_eq!(changes.field_mask(), vec!["labels".to_string()]);
    }

    #[test]
    fn test_memory_change_needs_revision_only() {
        let prior = record(config());
        let mut desired = config();
        desired.memory = 1024;

        let changes = compute_changes(&prior, &desired);
        assert!(changes.top_level_fields.is_empty());
        assert!(changes.needs_new_revision);
        assert_eq!(changes.revision_fields, vec!["memory"]);
    }

    #[test]
    fn test_both_classes_can_change_together() {
        let prior = record(config());
        let mut desired = config();
        desired.name = "api-v2".to_string();
        desired.description = Some("renamed".to_string());
        desired.image.url = "cr.yandex/crp/api:2.0".to_string();

        let changes = compute_changes(&prior, &desired);
        assert_eq!(
            changes.field_mask(),
            vec!["name".to_string(), "description".to_string()]
        );
        assert_eq!(changes.revision_fields, vec!["image"]);
    }

    #[test]
    fn test_list_order_matters() {
        let mut prior_config = config();
        prior_config.image.args = Some(vec!["a".to_string(), "b".to_string()]);
        let prior = record(prior_config);

        let mut desired = prior.config.clone();
        desired.image.args = Some(vec!["b".to_string(), "a".to_string()]);

        assert_eq!(compute_changes(&prior, &desired).revision_fields, vec!["image"]);
    }

    #[test]
    fn test_map_order_does_not_matter() {
        let mut prior_config = config();
        prior_config.image.environment.insert("A".to_string(), "1".to_string());
        prior_config.image.environment.insert("B".to_string(), "2".to_string());
        let prior = record(prior_config);

        let mut desired = config();
        desired.image.environment.insert("B".to_string(), "2".to_string());
        desired.image.environment.insert("A".to_string(), "1".to_string());

        assert!(compute_changes(&prior, &desired).is_empty());
    }

    #[test]
    fn test_undeclared_platform_defaults_are_not_changes() {
        let prior = record(config());
        let mut desired = config();
        desired.cores = None;
        desired.core_fraction = None;
        desired.execution_timeout = None;
        desired.secrets = None;

        assert!(compute_changes(&prior, &desired).is_empty());
    }

    #[test]
    fn test_explicitly_emptied_secrets_is_a_change() {
        let prior = record(config());
        let mut desired = config();
        desired.secrets = Some(Vec::new());

        assert_eq!(
            compute_changes(&prior, &desired).revision_fields,
            vec!["secrets"]
        );
    }

    #[test]
    fn test_equivalent_timeouts_are_equal() {
        let mut prior_config = config();
        prior_config.execution_timeout = Some("1m 30s".to_string());
        let prior = record(prior_config);

        let mut desired = config();
        desired.execution_timeout = Some("90s".to_string());
        assert!(compute_changes(&prior, &desired).is_empty());

        desired.execution_timeout = Some("2m".to_string());
        assert_eq!(
            compute_changes(&prior, &desired).revision_fields,
            vec!["execution_timeout"]
        );
    }

    #[test]
    fn test_removing_connectivity_is_a_change() {
        let mut prior_config = config();
        prior_config.connectivity = Some(Connectivity {
            network_id: "enpnet".to_string(),
        });
        let prior = record(prior_config);

        assert_eq!(
            compute_changes(&prior, &config()).revision_fields,
            vec!["connectivity"]
        );
    }

    #[test]
    fn test_log_options_change() {
        let prior = record(config());
        let mut desired = config();
        desired.log_options = Some(LogOptions {
            log_group_id: Some("e23group".to_string()),
            ..Default::default()
        });

        assert_eq!(
            compute_changes(&prior, &desired).revision_fields,
            vec!["log_options"]
        );
    }

    #[test]
    fn test_empty_description_equals_unset() {
        let prior = record(config());
        let mut desired = config();
        desired.description = Some(String::new());
        assert!(compute_changes(&prior, &desired).is_empty());
    }

    #[test]
    fn test_folder_move_requires_replacement() {
        let prior = record(config());
        let mut desired = config();
        desired.folder_id = Some("b1gother".to_string());
        assert!(compute_changes(&prior, &desired).requires_replacement);

        desired.folder_id = Some("b1gfolder".to_string());
        assert!(!compute_changes(&prior, &desired).requires_replacement);
    }

    #[test]
    fn test_is_referentially_transparent() {
        let prior = record(config());
        let mut desired = config();
        desired.memory = 2048;
        assert_eq!(
            compute_changes(&prior, &desired),
            compute_changes(&prior, &desired)
        );
    }

    #[test]
    fn test_change_set_serializes_for_reporting() {
        let prior = record(config());
        let mut desired = config();
        desired.memory = 1024;
        desired.labels.insert("team".to_string(), "core".to_string());

        let json = serde_json::to_value(compute_changes(&prior, &desired)).unwrap();
        assert_eq!(json["top_level_fields"], serde_json::json!(["labels"]));
        assert_eq!(json["needs_new_revision"], true);
        assert_eq!(json["revision_fields"], serde_json::json!(["memory"]));
        assert_eq!(json["requires_replacement"], false);
    }
}

//! Planned remote calls
//!
//! A plan is what a pass would do, computed without touching the network.

use crate::changes::compute_changes;
use crate::error::ValidationError;
use crate::payload::build_revision_payload;
use crate::record::{RevisionState, TrackedContainer};
use containerflow_core::DesiredConfig;
use serde::{Deserialize, Serialize};

/// Represents a planned remote call for one container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// Key of the container in the document
    pub key: String,

    pub action_type: ActionType,

    /// Remote identity, when one is known
    pub container_id: Option<String>,

    pub description: String,

    /// Field mask of a metadata update
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub field_mask: Vec<String>,

    /// Changed fields behind a revision deployment
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub revision_fields: Vec<String>,
}

impl Action {
    fn new(key: &str, action_type: ActionType, container_id: Option<&str>, description: String) -> Self {
        Self {
            key: key.to_string(),
            action_type,
            container_id: container_id.map(str::to_string),
            description,
            field_mask: Vec::new(),
            revision_fields: Vec::new(),
        }
    }
}

/// Type of action to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Create the container and deploy its first revision
    Create,
    /// Delete and create again in another folder
    Replace,
    /// Field-masked update of name, description or labels
    UpdateMetadata,
    /// Deploy a new revision
    DeployRevision,
    /// Read remote state before deciding
    Read,
    Delete,
    NoOp,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionType::Create => write!(f, "create"),
            ActionType::Replace => write!(f, "replace"),
            ActionType::UpdateMetadata => write!(f, "update"),
            ActionType::DeployRevision => write!(f, "deploy"),
            ActionType::Read => write!(f, "read"),
            ActionType::Delete => write!(f, "delete"),
            ActionType::NoOp => write!(f, "no-op"),
        }
    }
}

/// Plan the calls `apply` would make for one container.
///
/// Fails with the same validation error the pass itself would raise.
pub fn plan_container(
    key: &str,
    tracked: Option<&TrackedContainer>,
    desired: &DesiredConfig,
    default_folder_id: Option<&str>,
) -> Result<Vec<Action>, ValidationError> {
    build_revision_payload(desired)?;

    let Some(id) = tracked.and_then(|t| t.id.as_deref()) else {
        let folder = desired
            .folder_id
            .as_deref()
            .or(default_folder_id)
            .ok_or_else(|| ValidationError::MissingFolder(desired.name.clone()))?;
        return Ok(vec![Action::new(
            key,
            ActionType::Create,
            None,
            format!("create {} in folder {}", desired.name, folder),
        )]);
    };

    let Some(record) = tracked.and_then(|t| t.record.as_ref()) else {
        return Ok(vec![Action::new(
            key,
            ActionType::Read,
            Some(id),
            "not observed yet; changes are decided after reading".to_string(),
        )]);
    };

    let changes = compute_changes(record, desired);
    if changes.requires_replacement {
        return Ok(vec![Action::new(
            key,
            ActionType::Replace,
            Some(id),
            format!(
                "move from folder {} to {}",
                record.folder_id,
                desired.folder_id.as_deref().unwrap_or_default()
            ),
        )]);
    }

    let mut actions = Vec::new();
    if !changes.top_level_fields.is_empty() {
        let mut action = Action::new(
            key,
            ActionType::UpdateMetadata,
            Some(id),
            format!("update {}", changes.field_mask().join(", ")),
        );
        action.field_mask = changes.field_mask();
        actions.push(action);
    }

    let incomplete = record.revision == RevisionState::ProvisioningIncomplete;
    if changes.needs_new_revision || incomplete {
        let description = if changes.needs_new_revision {
            format!("new revision for {}", changes.revision_fields.join(", "))
        } else {
            "no active revision; deploy again".to_string()
        };
        let mut action = Action::new(key, ActionType::DeployRevision, Some(id), description);
        action.revision_fields = changes
            .revision_fields
            .iter()
            .map(|f| f.to_string())
            .collect();
        actions.push(action);
    }

    if actions.is_empty() {
        actions.push(Action::new(
            key,
            ActionType::NoOp,
            Some(id),
            "up to date".to_string(),
        ));
    }
    Ok(actions)
}

/// Plan the removal of a tracked container
pub fn plan_destroy(key: &str, tracked: &TrackedContainer) -> Action {
    match tracked.id.as_deref() {
        Some(id) => Action::new(key, ActionType::Delete, Some(id), format!("delete {}", id)),
        None => Action::new(key, ActionType::NoOp, None, "not created".to_string()),
    }
}

/// Result of applying actions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplyResult {
    pub succeeded: Vec<ActionResult>,
    pub failed: Vec<ActionResult>,
    /// Total execution time in milliseconds
    pub duration_ms: u64,
}

impl ApplyResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn add_success(&mut self, key: impl Into<String>, message: impl Into<String>) {
        self.succeeded.push(ActionResult {
            key: key.into(),
            success: true,
            message: message.into(),
            error: None,
        });
    }

    pub fn add_failure(&mut self, key: impl Into<String>, error: impl Into<String>) {
        self.failed.push(ActionResult {
            key: key.into(),
            success: false,
            message: String::new(),
            error: Some(error.into()),
        });
    }
}

/// Result of reconciling a single container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    pub key: String,
    pub success: bool,
    pub message: String,
    pub error: Option<String>,
}

/// All planned actions of a pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Plan {
    pub actions: Vec<Action>,
    pub has_changes: bool,
}

impl Plan {
    pub fn new(actions: Vec<Action>) -> Self {
        let has_changes = actions
            .iter()
            .any(|a| !matches!(a.action_type, ActionType::NoOp | ActionType::Read));
        Self {
            actions,
            has_changes,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Get actions by type
    pub fn actions_by_type(&self, action_type: ActionType) -> Vec<&Action> {
        self.actions
            .iter()
            .filter(|a| a.action_type == action_type)
            .collect()
    }

    pub fn summary(&self) -> PlanSummary {
        let count = |t| self.actions_by_type(t).len();
        PlanSummary {
            create: count(ActionType::Create),
            replace: count(ActionType::Replace),
            update: count(ActionType::UpdateMetadata),
            deploy: count(ActionType::DeployRevision),
            delete: count(ActionType::Delete),
            no_change: count(ActionType::NoOp),
        }
    }
}

/// Summary of planned actions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSummary {
    pub create: usize,
    pub replace: usize,
    pub update: usize,
    pub deploy: usize,
    pub delete: usize,
    pub no_change: usize,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to create, {} to replace, {} to update, {} to deploy, {} to delete, {} unchanged",
            self.create, self.replace, self.update, self.deploy, self.delete, self.no_change
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{LifecyclePhase, ObservableRecord};

    fn desired() -> DesiredConfig {
        DesiredConfig::new("api", "cr.yandex/crp/api:1.0", 512)
    }

    fn observed(config: DesiredConfig) -> TrackedContainer {
        TrackedContainer {
            id: Some("bba1".to_string()),
            phase: LifecyclePhase::Active,
            record: Some(ObservableRecord {
                id: "bba1".to_string(),
                folder_id: "b1gfolder".to_string(),
                created_at: None,
                url: String::new(),
                revision: RevisionState::Active {
                    revision_id: "rev1".to_string(),
                },
                image_digest: None,
                config,
            }),
            updated_at: None,
        }
    }

    #[test]
    fn test_untracked_plans_create() {
        let actions = plan_container("api", None, &desired(), Some("b1gfolder")).unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].action_type, ActionType::Create);
        assert!(actions[0].description.contains("b1gfolder"));
    }

    #[test]
    fn test_create_without_folder_is_invalid() {
        assert_eq!(
            plan_container("api", None, &desired(), None),
            Err(ValidationError::MissingFolder("api".to_string()))
        );
    }

    #[test]
    fn test_invalid_payload_fails_plan() {
        let mut config = desired();
        config.execution_timeout = Some("soon".to_string());
        let tracked = observed(desired());
        assert!(matches!(
            plan_container("api", Some(&tracked), &config, None),
            Err(ValidationError::InvalidDuration { .. })
        ));
    }

    #[test]
    fn test_unchanged_is_noop() {
        let tracked = observed(desired());
        let plan = Plan::new(plan_container("api", Some(&tracked), &desired(), None).unwrap());
        assert!(!plan.has_changes);
        assert_eq!(plan.summary().no_change, 1);
    }

    #[test]
    fn test_split_into_update_and_deploy() {
        let tracked = observed(desired());
        let mut config = desired().with_label("env", "prod");
        config.memory = 1024;

        let actions = plan_container("api", Some(&tracked), &config, None).unwrap();
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].action_type, ActionType::UpdateMetadata);
        assert_eq!(actions[0].field_mask, vec!["labels".to_string()]);
        assert_eq!(actions[1].action_type, ActionType::DeployRevision);
        assert_eq!(actions[1].revision_fields, vec!["memory".to_string()]);
    }

    #[test]
    fn test_folder_move_is_replace() {
        let tracked = observed(desired());
        let mut config = desired();
        config.folder_id = Some("b1gother".to_string());

        let actions = plan_container("api", Some(&tracked), &config, None).unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].action_type, ActionType::Replace);
    }

    #[test]
    fn test_incomplete_revision_is_redeployed() {
        let mut tracked = observed(desired());
        if let Some(record) = tracked.record.as_mut() {
            record.revision = RevisionState::ProvisioningIncomplete;
        }

        let actions = plan_container("api", Some(&tracked), &desired(), None).unwrap();
        assert_eq!(actions[0].action_type, ActionType::DeployRevision);
        assert!(actions[0].revision_fields.is_empty());
    }

    #[test]
    fn test_unobserved_identity_plans_read() {
        let tracked = TrackedContainer::existing("bba1");
        let plan = Plan::new(plan_container("api", Some(&tracked), &desired(), None).unwrap());
        assert_eq!(plan.actions[0].action_type, ActionType::Read);
        assert!(!plan.has_changes);
    }

    #[test]
    fn test_destroy_plan() {
        assert_eq!(
            plan_destroy("api", &observed(desired())).action_type,
            ActionType::Delete
        );
        assert_eq!(
            plan_destroy("api", &TrackedContainer::new()).action_type,
            ActionType::NoOp
        );
    }

    #[test]
    fn test_summary_display() {
        let plan = Plan::new(vec![
            Action::new("a", ActionType::Create, None, String::new()),
            Action::new("b", ActionType::DeployRevision, Some("x"), String::new()),
        ]);
        assert_eq!(
            plan.summary().to_string(),
            "1 to create, 0 to replace, 0 to update, 1 to deploy, 0 to delete, 0 unchanged"
        );
    }

    #[test]
    fn test_apply_result() {
        let mut result = ApplyResult::new();
        result.add_success("api", "created");
        assert!(result.is_success());
        result.add_failure("worker", "timeout");
        assert!(!result.is_success());
    }
}

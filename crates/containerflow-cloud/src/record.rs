//! Observed state of a managed container

use chrono::{DateTime, Utc};
use containerflow_core::DesiredConfig;
use serde::{Deserialize, Serialize};

/// Remote container merged with its active revision, in the declared shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservableRecord {
    /// Container id assigned by the platform
    pub id: String,

    pub folder_id: String,

    pub created_at: Option<DateTime<Utc>>,

    /// Invocation URL
    pub url: String,

    pub revision: RevisionState,

    /// Digest the platform resolved the image url to
    pub image_digest: Option<String>,

    /// Last observed values of every declared field
    pub config: DesiredConfig,
}

impl ObservableRecord {
    pub fn revision_id(&self) -> Option<&str> {
        match &self.revision {
            RevisionState::Active { revision_id } => Some(revision_id),
            RevisionState::ProvisioningIncomplete => None,
        }
    }
}

/// Whether a deployed revision backs the container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RevisionState {
    Active { revision_id: String },
    /// No ACTIVE revision was found; revision fields hold their previous values
    ProvisioningIncomplete,
}

impl std::fmt::Display for RevisionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RevisionState::Active { revision_id } => write!(f, "active ({})", revision_id),
            RevisionState::ProvisioningIncomplete => write!(f, "provisioning incomplete"),
        }
    }
}

/// Lifecycle phase of a tracked container
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    #[default]
    Absent,
    Creating,
    Active,
    Updating,
    Deleting,
    /// The last in-flight transition failed
    Failed,
}

impl std::fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecyclePhase::Absent => write!(f, "absent"),
            LifecyclePhase::Creating => write!(f, "creating"),
            LifecyclePhase::Active => write!(f, "active"),
            LifecyclePhase::Updating => write!(f, "updating"),
            LifecyclePhase::Deleting => write!(f, "deleting"),
            LifecyclePhase::Failed => write!(f, "failed"),
        }
    }
}

/// What the caller persists between passes for one container.
///
/// The reconciler updates this in place, so an identity assigned early in a
/// failing pass is still available to the next one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedContainer {
    pub id: Option<String>,
    pub phase: LifecyclePhase,
    pub record: Option<ObservableRecord>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl TrackedContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track an existing container by id, with nothing observed yet
    pub fn existing(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            phase: LifecyclePhase::Active,
            ..Default::default()
        }
    }

    pub fn is_absent(&self) -> bool {
        self.id.is_none()
    }

    pub(crate) fn transition(&mut self, phase: LifecyclePhase) {
        tracing::debug!(from = %self.phase, to = %phase, "Lifecycle transition");
        self.phase = phase;
        self.updated_at = Some(Utc::now());
    }

    pub(crate) fn observe(&mut self, record: ObservableRecord) {
        self.id = Some(record.id.clone());
        self.record = Some(record);
        self.updated_at = Some(Utc::now());
    }

    pub(crate) fn forget(&mut self) {
        self.id = None;
        self.record = None;
        self.transition(LifecyclePhase::Absent);
    }
}

//! Reconciler
//!
//! Drives one container towards its declared configuration. Each public
//! operation is a single pass bounded by its own deadline; the caller owns
//! the [`TrackedContainer`] and persists it between passes.

use crate::api::{
    ApiResult, ContainerApi, CreateContainerRequest, DeployRevisionRequest, ListRevisionsRequest,
    Operation, OperationMetadata, Revision, RevisionStatus, UpdateContainerRequest,
};
use crate::changes::compute_changes;
use crate::error::{CloudError, OperationKind, Result, ValidationError};
use crate::operation::OperationWaiter;
use crate::payload::build_revision_payload;
use crate::projector::project;
use crate::record::{LifecyclePhase, ObservableRecord, RevisionState, TrackedContainer};
use containerflow_core::DesiredConfig;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Deadline of each kind of pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassTimeouts {
    pub create: Duration,
    pub update: Duration,
    pub delete: Duration,
    pub read: Duration,
}

impl Default for PassTimeouts {
    fn default() -> Self {
        let five_minutes = Duration::from_secs(5 * 60);
        Self {
            create: five_minutes,
            update: five_minutes,
            delete: five_minutes,
            read: five_minutes,
        }
    }
}

/// Time budget of a single pass
struct Pass {
    started: Instant,
    deadline: Instant,
}

impl Pass {
    fn start(timeout: Duration) -> Self {
        let started = Instant::now();
        Self {
            started,
            deadline: started + timeout,
        }
    }
}

pub struct Reconciler {
    api: Arc<dyn ContainerApi>,
    waiter: Arc<dyn OperationWaiter>,
    timeouts: PassTimeouts,
    default_folder_id: Option<String>,
    cancel: CancellationToken,
}

impl Reconciler {
    pub fn new(api: Arc<dyn ContainerApi>, waiter: Arc<dyn OperationWaiter>) -> Self {
        Self {
            api,
            waiter,
            timeouts: PassTimeouts::default(),
            default_folder_id: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: PassTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Folder used for containers that do not declare one
    pub fn with_default_folder(mut self, folder_id: impl Into<String>) -> Self {
        self.default_folder_id = Some(folder_id.into());
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Folder a container would be created in
    pub fn resolve_folder(&self, desired: &DesiredConfig) -> Result<String> {
        desired
            .folder_id
            .clone()
            .or_else(|| self.default_folder_id.clone())
            .ok_or_else(|| ValidationError::MissingFolder(desired.name.clone()).into())
    }

    /// Create the container, deploy its first revision and read it back.
    ///
    /// The identity is stored in `tracked` as soon as the platform assigns
    /// it, so a pass that fails afterwards still leaves it recorded.
    pub async fn create(
        &self,
        desired: &DesiredConfig,
        tracked: &mut TrackedContainer,
    ) -> Result<ObservableRecord> {
        let folder_id = self.resolve_folder(desired)?;
        let payload = build_revision_payload(desired)?;

        let pass = Pass::start(self.timeouts.create);
        tracked.transition(LifecyclePhase::Creating);
        let result = self
            .create_pass(desired, folder_id, payload, tracked, &pass)
            .await;
        settle(tracked, result)
    }

    async fn create_pass(
        &self,
        desired: &DesiredConfig,
        folder_id: String,
        payload: DeployRevisionRequest,
        tracked: &mut TrackedContainer,
        pass: &Pass,
    ) -> Result<ObservableRecord> {
        info!(name = %desired.name, folder_id = %folder_id, "Creating container");

        let request = CreateContainerRequest {
            folder_id,
            name: desired.name.clone(),
            description: desired.description.clone().unwrap_or_default(),
            labels: desired.labels.clone(),
        };
        let operation = self
            .call(
                OperationKind::Create,
                &desired.name,
                pass,
                self.api.create_container(request),
            )
            .await?;

        let id = match &operation.metadata {
            Some(OperationMetadata::CreateContainer { container_id }) if !container_id.is_empty() => {
                container_id.clone()
            }
            _ => return Err(CloudError::MissingIdentity),
        };
        debug!(container_id = %id, operation_id = %operation.id, "Container id assigned");
        tracked.id = Some(id.clone());

        self.wait(OperationKind::Create, &id, pass, operation).await?;
        self.deploy(&id, payload, pass).await?;

        let record = self.observe(&id, tracked, pass, Some(desired)).await?;
        info!(container_id = %id, revision = %record.revision, "Container created");
        Ok(record)
    }

    /// Read the container and its active revision
    pub async fn read(&self, tracked: &mut TrackedContainer) -> Result<ObservableRecord> {
        let id = tracked
            .id
            .clone()
            .ok_or_else(|| CloudError::NotTracked(label(tracked)))?;
        let pass = Pass::start(self.timeouts.read);
        self.observe(&id, tracked, &pass, None).await
    }

    /// Bring an existing container in line with `desired`.
    ///
    /// Top-level attributes are updated under a field mask, revision fields
    /// by deploying a new revision. When nothing differs no call is issued.
    /// Moving to another folder is not an update; see [`Reconciler::apply`].
    pub async fn update(
        &self,
        desired: &DesiredConfig,
        tracked: &mut TrackedContainer,
    ) -> Result<ObservableRecord> {
        let id = tracked
            .id
            .clone()
            .ok_or_else(|| CloudError::NotTracked(desired.name.clone()))?;
        let payload = build_revision_payload(desired)?;

        let pass = Pass::start(self.timeouts.update);
        let prior = match tracked.record.clone() {
            Some(record) => record,
            None => self.observe(&id, tracked, &pass, None).await?,
        };

        let changes = compute_changes(&prior, desired);
        let incomplete = prior.revision == RevisionState::ProvisioningIncomplete;
        if changes.requires_replacement {
            warn!(container_id = %id, "Folder change ignored by update");
        }
        if changes.top_level_fields.is_empty() && !changes.needs_new_revision && !incomplete {
            debug!(container_id = %id, "No changes");
            if tracked.phase != LifecyclePhase::Active {
                tracked.transition(LifecyclePhase::Active);
            }
            return Ok(prior);
        }

        tracked.transition(LifecyclePhase::Updating);
        let result = async {
            if !changes.top_level_fields.is_empty() {
                let request = UpdateContainerRequest {
                    container_id: id.clone(),
                    update_mask: changes.field_mask(),
                    name: desired.name.clone(),
                    description: desired.description.clone().unwrap_or_default(),
                    labels: desired.labels.clone(),
                };
                info!(container_id = %id, mask = ?request.update_mask, "Updating container");
                let operation = self
                    .call(
                        OperationKind::Update,
                        &id,
                        &pass,
                        self.api.update_container(request),
                    )
                    .await?;
                self.wait(OperationKind::Update, &id, &pass, operation).await?;
            }

            let redeploy = changes.needs_new_revision || incomplete;
            if redeploy {
                info!(
                    container_id = %id,
                    fields = ?changes.revision_fields,
                    "Deploying new revision"
                );
                self.deploy(&id, payload, &pass).await?;
            }

            self.observe(&id, tracked, &pass, redeploy.then_some(desired))
                .await
        }
        .await;
        settle(tracked, result)
    }

    /// Delete the container. A container that is already gone counts as
    /// deleted.
    pub async fn delete(&self, tracked: &mut TrackedContainer) -> Result<()> {
        let Some(id) = tracked.id.clone() else {
            tracked.forget();
            return Ok(());
        };

        let pass = Pass::start(self.timeouts.delete);
        tracked.transition(LifecyclePhase::Deleting);
        info!(container_id = %id, "Deleting container");

        let result = async {
            let operation = match self
                .call(
                    OperationKind::Delete,
                    &id,
                    &pass,
                    self.api.delete_container(&id),
                )
                .await
            {
                Ok(operation) => operation,
                Err(e) if e.is_not_found() => return Ok(()),
                Err(e) => return Err(e),
            };
            match self.wait(OperationKind::Delete, &id, &pass, operation).await {
                Err(e) if !e.is_not_found() => Err(e),
                _ => Ok(()),
            }
        }
        .await;

        match result {
            Ok(()) => {
                info!(container_id = %id, "Container deleted");
                tracked.forget();
                Ok(())
            }
            Err(e) => {
                tracked.transition(LifecyclePhase::Failed);
                Err(e)
            }
        }
    }

    /// Converge in one call: create when untracked or vanished, replace
    /// when the folder moved, update otherwise.
    pub async fn apply(
        &self,
        desired: &DesiredConfig,
        tracked: &mut TrackedContainer,
    ) -> Result<ObservableRecord> {
        build_revision_payload(desired)?;

        if tracked.id.is_some() {
            match self.read(tracked).await {
                Ok(record) => {
                    if compute_changes(&record, desired).requires_replacement {
                        info!(
                            container_id = %record.id,
                            from = %record.folder_id,
                            "Folder changed, replacing container"
                        );
                        self.delete(tracked).await?;
                        return self.create(desired, tracked).await;
                    }
                    return self.update(desired, tracked).await;
                }
                Err(e) if e.is_not_found() => {
                    warn!(name = %desired.name, "Tracked container no longer exists, recreating");
                    tracked.forget();
                }
                Err(e) => return Err(e),
            }
        }

        self.create(desired, tracked).await
    }

    async fn deploy(&self, id: &str, mut payload: DeployRevisionRequest, pass: &Pass) -> Result<()> {
        payload.container_id = id.to_string();
        debug!(
            container_id = %id,
            memory_bytes = payload.resources.memory,
            image = %payload.image_spec.image_url,
            "Deploying revision"
        );
        let operation = self
            .call(
                OperationKind::DeployRevision,
                id,
                pass,
                self.api.deploy_revision(payload),
            )
            .await?;
        self.wait(OperationKind::DeployRevision, id, pass, operation)
            .await?;
        Ok(())
    }

    /// Fetch the container and its newest active revision. `deployed` is
    /// the configuration this pass just deployed, if it deployed one.
    async fn observe(
        &self,
        id: &str,
        tracked: &mut TrackedContainer,
        pass: &Pass,
        deployed: Option<&DesiredConfig>,
    ) -> Result<ObservableRecord> {
        let container = self
            .call(OperationKind::Get, id, pass, self.api.get_container(id))
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    CloudError::NotFound(id.to_string())
                } else {
                    e
                }
            })?;

        let request = ListRevisionsRequest {
            container_id: id.to_string(),
            status: Some(RevisionStatus::Active),
        };
        let revisions = self
            .call(
                OperationKind::ListRevisions,
                id,
                pass,
                self.api.list_revisions(request),
            )
            .await?;

        let mut active: Vec<&Revision> = revisions
            .iter()
            .filter(|r| r.status == RevisionStatus::Active)
            .collect();
        // most recent first; undated revisions sort last
        active.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if active.len() > 1 {
            warn!(
                container_id = %id,
                count = active.len(),
                "More than one active revision reported, using the newest"
            );
        }

        let record = project(
            &container,
            active.first().copied(),
            tracked.record.as_ref(),
            deployed,
        );
        tracked.observe(record.clone());
        Ok(record)
    }

    async fn call<T>(
        &self,
        operation: OperationKind,
        target: &str,
        pass: &Pass,
        request: impl Future<Output = ApiResult<T>>,
    ) -> Result<T> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(CloudError::Cancelled {
                operation,
                target: target.to_string(),
            }),
            response = tokio::time::timeout_at(pass.deadline, request) => match response {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(status)) => Err(CloudError::RemoteCall {
                    operation,
                    target: target.to_string(),
                    status,
                }),
                Err(_) => Err(CloudError::Timeout {
                    operation,
                    target: target.to_string(),
                    elapsed: pass.started.elapsed(),
                }),
            },
        }
    }

    async fn wait(
        &self,
        kind: OperationKind,
        target: &str,
        pass: &Pass,
        operation: Operation,
    ) -> Result<Operation> {
        self.waiter
            .wait(operation, pass.deadline, &self.cancel)
            .await
            .map_err(|e| CloudError::from_wait(kind, target, e))
    }
}

fn settle(tracked: &mut TrackedContainer, result: Result<ObservableRecord>) -> Result<ObservableRecord> {
    match result {
        Ok(record) => {
            tracked.transition(LifecyclePhase::Active);
            Ok(record)
        }
        Err(e) => {
            warn!(error = %e, "Reconciliation pass failed");
            tracked.transition(LifecyclePhase::Failed);
            Err(e)
        }
    }
}

fn label(tracked: &TrackedContainer) -> String {
    tracked
        .record
        .as_ref()
        .map(|r| r.config.name.clone())
        .unwrap_or_else(|| "(untracked)".to_string())
}

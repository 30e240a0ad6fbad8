//! In-memory control plane for tests
//!
//! Implements both [`ContainerApi`] and [`OperationPoller`]. Mutations take
//! effect when their operation is first polled, which is also when the
//! operation reports done. Hooks let tests inject rejections, failed
//! operations and out-of-band changes.

use crate::api::{
    ApiResult, Container, ContainerApi, CreateContainerRequest, DeployRevisionRequest,
    ListRevisionsRequest, Operation, OperationMetadata, OperationPoller, OperationResult, Revision,
    RevisionStatus, Status, UpdateContainerRequest,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

/// Which API method a call went to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    CreateContainer,
    UpdateContainer,
    DeleteContainer,
    GetContainer,
    ListRevisions,
    DeployRevision,
    GetOperation,
}

/// A recorded API call with its request
#[derive(Debug, Clone, PartialEq)]
pub enum ApiCall {
    CreateContainer(CreateContainerRequest),
    UpdateContainer(UpdateContainerRequest),
    DeleteContainer(String),
    GetContainer(String),
    ListRevisions(ListRevisionsRequest),
    DeployRevision(DeployRevisionRequest),
    GetOperation(String),
}

impl ApiCall {
    pub fn kind(&self) -> CallKind {
        match self {
            ApiCall::CreateContainer(_) => CallKind::CreateContainer,
            ApiCall::UpdateContainer(_) => CallKind::UpdateContainer,
            ApiCall::DeleteContainer(_) => CallKind::DeleteContainer,
            ApiCall::GetContainer(_) => CallKind::GetContainer,
            ApiCall::ListRevisions(_) => CallKind::ListRevisions,
            ApiCall::DeployRevision(_) => CallKind::DeployRevision,
            ApiCall::GetOperation(_) => CallKind::GetOperation,
        }
    }

    /// Whether the call changes remote state
    pub fn is_mutating(&self) -> bool {
        matches!(
            self.kind(),
            CallKind::CreateContainer
                | CallKind::UpdateContainer
                | CallKind::DeleteContainer
                | CallKind::DeployRevision
        )
    }
}

enum Effect {
    Create(Container),
    Update(UpdateContainerRequest),
    Delete(String),
    Deploy(Revision),
}

struct Pending {
    operation: Operation,
    kind: CallKind,
    effect: Effect,
}

#[derive(Default)]
struct PlaneState {
    sequence: u64,
    containers: BTreeMap<String, Container>,
    revisions: Vec<Revision>,
    pending: BTreeMap<String, Pending>,
    finished: BTreeMap<String, Operation>,
    calls: Vec<ApiCall>,
    rejections: VecDeque<(CallKind, Status)>,
    failures: VecDeque<(CallKind, Status)>,
    stalled: bool,
    omit_create_metadata: bool,
}

impl PlaneState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.sequence += 1;
        format!("{}{:04}", prefix, self.sequence)
    }

    fn take_rejection(&mut self, kind: CallKind) -> Option<Status> {
        let index = self.rejections.iter().position(|(k, _)| *k == kind)?;
        self.rejections.remove(index).map(|(_, status)| status)
    }

    fn take_failure(&mut self, kind: CallKind) -> Option<Status> {
        let index = self.failures.iter().position(|(k, _)| *k == kind)?;
        self.failures.remove(index).map(|(_, status)| status)
    }

    fn start(&mut self, kind: CallKind, metadata: Option<OperationMetadata>, effect: Effect) -> Operation {
        let operation = Operation {
            id: self.next_id("op"),
            description: format!("{:?}", kind),
            done: false,
            metadata,
            result: None,
        };
        self.pending.insert(
            operation.id.clone(),
            Pending {
                operation: operation.clone(),
                kind,
                effect,
            },
        );
        operation
    }

    fn complete(&mut self, pending: Pending) -> Operation {
        let result = match self.take_failure(pending.kind) {
            Some(status) => OperationResult::Failure(status),
            None => match self.commit(pending.effect) {
                Ok(()) => OperationResult::Success,
                Err(status) => OperationResult::Failure(status),
            },
        };
        let mut operation = pending.operation;
        operation.done = true;
        operation.result = Some(result);
        self.finished.insert(operation.id.clone(), operation.clone());
        operation
    }

    fn commit(&mut self, effect: Effect) -> ApiResult<()> {
        match effect {
            Effect::Create(container) => {
                self.containers.insert(container.id.clone(), container);
            }
            Effect::Update(request) => {
                let container = self
                    .containers
                    .get_mut(&request.container_id)
                    .ok_or_else(|| missing(&request.container_id))?;
                for path in &request.update_mask {
                    match path.as_str() {
                        "name" => container.name = request.name.clone(),
                        "description" => container.description = request.description.clone(),
                        "labels" => container.labels = request.labels.clone(),
                        _ => {}
                    }
                }
            }
            Effect::Delete(id) => {
                self.containers.remove(&id).ok_or_else(|| missing(&id))?;
                self.revisions.retain(|r| r.container_id != id);
            }
            Effect::Deploy(revision) => {
                if !self.containers.contains_key(&revision.container_id) {
                    return Err(missing(&revision.container_id));
                }
                for previous in self
                    .revisions
                    .iter_mut()
                    .filter(|r| r.container_id == revision.container_id)
                {
                    previous.status = RevisionStatus::Obsolete;
                }
                self.revisions.push(revision);
            }
        }
        Ok(())
    }
}

fn missing(id: &str) -> Status {
    Status::not_found(format!("container {} not found", id))
}

#[derive(Default)]
pub struct InMemoryControlPlane {
    state: Mutex<PlaneState>,
}

impl InMemoryControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, PlaneState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<ApiCall> {
        self.state().calls.clone()
    }

    pub fn count(&self, kind: CallKind) -> usize {
        self.state().calls.iter().filter(|c| c.kind() == kind).count()
    }

    pub fn mutating_calls(&self) -> Vec<ApiCall> {
        self.state()
            .calls
            .iter()
            .filter(|c| c.is_mutating())
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// The next call of `kind` is rejected with `status` before any effect
    pub fn reject_next(&self, kind: CallKind, status: Status) {
        self.state().rejections.push_back((kind, status));
    }

    /// The next operation started by a call of `kind` completes with
    /// `status` instead of taking effect
    pub fn fail_operation(&self, kind: CallKind, status: Status) {
        self.state().failures.push_back((kind, status));
    }

    /// While stalled, operations are reported as still running
    pub fn stall_operations(&self, stalled: bool) {
        self.state().stalled = stalled;
    }

    /// Create operations come back without metadata
    pub fn omit_create_metadata(&self, omit: bool) {
        self.state().omit_create_metadata = omit;
    }

    /// Remove a container behind the reconciler's back
    pub fn vanish(&self, container_id: &str) {
        let mut state = self.state();
        state.containers.remove(container_id);
        state.revisions.retain(|r| r.container_id != container_id);
    }

    /// Mark every revision of a container obsolete
    pub fn deactivate_revisions(&self, container_id: &str) {
        for revision in self
            .state()
            .revisions
            .iter_mut()
            .filter(|r| r.container_id == container_id)
        {
            revision.status = RevisionStatus::Obsolete;
        }
    }

    /// Add a revision that lists ahead of the existing ones
    pub fn insert_revision(&self, revision: Revision) {
        self.state().revisions.insert(0, revision);
    }

    pub fn container(&self, container_id: &str) -> Option<Container> {
        self.state().containers.get(container_id).cloned()
    }

    pub fn container_count(&self) -> usize {
        self.state().containers.len()
    }

    pub fn active_revision(&self, container_id: &str) -> Option<Revision> {
        self.state()
            .revisions
            .iter()
            .find(|r| r.container_id == container_id && r.status == RevisionStatus::Active)
            .cloned()
    }

    pub fn revisions(&self, container_id: &str) -> Vec<Revision> {
        self.state()
            .revisions
            .iter()
            .filter(|r| r.container_id == container_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ContainerApi for InMemoryControlPlane {
    async fn create_container(&self, request: CreateContainerRequest) -> ApiResult<Operation> {
        let mut state = self.state();
        state.calls.push(ApiCall::CreateContainer(request.clone()));
        if let Some(status) = state.take_rejection(CallKind::CreateContainer) {
            return Err(status);
        }

        let id = state.next_id("bba");
        let container = Container {
            id: id.clone(),
            folder_id: request.folder_id,
            created_at: Some(Utc::now()),
            name: request.name,
            description: request.description,
            labels: request.labels,
            url: format!("https://{}.containers.yandexcloud.net/", id),
        };
        let metadata = (!state.omit_create_metadata)
            .then(|| OperationMetadata::CreateContainer { container_id: id });
        Ok(state.start(CallKind::CreateContainer, metadata, Effect::Create(container)))
    }

    async fn update_container(&self, request: UpdateContainerRequest) -> ApiResult<Operation> {
        let mut state = self.state();
        state.calls.push(ApiCall::UpdateContainer(request.clone()));
        if let Some(status) = state.take_rejection(CallKind::UpdateContainer) {
            return Err(status);
        }
        if !state.containers.contains_key(&request.container_id) {
            return Err(missing(&request.container_id));
        }

        let metadata = OperationMetadata::UpdateContainer {
            container_id: request.container_id.clone(),
        };
        Ok(state.start(CallKind::UpdateContainer, Some(metadata), Effect::Update(request)))
    }

    async fn delete_container(&self, container_id: &str) -> ApiResult<Operation> {
        let mut state = self.state();
        state.calls.push(ApiCall::DeleteContainer(container_id.to_string()));
        if let Some(status) = state.take_rejection(CallKind::DeleteContainer) {
            return Err(status);
        }
        if !state.containers.contains_key(container_id) {
            return Err(missing(container_id));
        }

        let metadata = OperationMetadata::DeleteContainer {
            container_id: container_id.to_string(),
        };
        Ok(state.start(
            CallKind::DeleteContainer,
            Some(metadata),
            Effect::Delete(container_id.to_string()),
        ))
    }

    async fn get_container(&self, container_id: &str) -> ApiResult<Container> {
        let mut state = self.state();
        state.calls.push(ApiCall::GetContainer(container_id.to_string()));
        if let Some(status) = state.take_rejection(CallKind::GetContainer) {
            return Err(status);
        }
        state
            .containers
            .get(container_id)
            .cloned()
            .ok_or_else(|| missing(container_id))
    }

    async fn list_revisions(&self, request: ListRevisionsRequest) -> ApiResult<Vec<Revision>> {
        let mut state = self.state();
        state.calls.push(ApiCall::ListRevisions(request.clone()));
        if let Some(status) = state.take_rejection(CallKind::ListRevisions) {
            return Err(status);
        }
        Ok(state
            .revisions
            .iter()
            .filter(|r| r.container_id == request.container_id)
            .filter(|r| request.status.is_none_or(|s| r.status == s))
            .cloned()
            .collect())
    }

    async fn deploy_revision(&self, request: DeployRevisionRequest) -> ApiResult<Operation> {
        let mut state = self.state();
        state.calls.push(ApiCall::DeployRevision(request.clone()));
        if let Some(status) = state.take_rejection(CallKind::DeployRevision) {
            return Err(status);
        }
        if !state.containers.contains_key(&request.container_id) {
            return Err(missing(&request.container_id));
        }

        let revision_id = state.next_id("bbarev");
        let mut revision = request.into_revision(revision_id.clone(), Utc::now());
        revision.image.image_digest = Some(format!("sha256:{}", revision_id));
        // empty lists do not survive the platform's wire format
        revision.image.command = revision.image.command.filter(|c| !c.is_empty());
        revision.image.args = revision.image.args.filter(|a| !a.is_empty());
        revision.resources.cores.get_or_insert(1);
        revision.resources.core_fraction.get_or_insert(100);
        revision
            .execution_timeout
            .get_or_insert(std::time::Duration::from_secs(3));

        let metadata = OperationMetadata::DeployContainerRevision {
            container_revision_id: revision_id,
        };
        Ok(state.start(CallKind::DeployRevision, Some(metadata), Effect::Deploy(revision)))
    }
}

#[async_trait]
impl OperationPoller for InMemoryControlPlane {
    async fn get_operation(&self, operation_id: &str) -> ApiResult<Operation> {
        let mut state = self.state();
        state.calls.push(ApiCall::GetOperation(operation_id.to_string()));
        if let Some(status) = state.take_rejection(CallKind::GetOperation) {
            return Err(status);
        }

        if let Some(operation) = state.finished.get(operation_id) {
            return Ok(operation.clone());
        }
        if state.stalled {
            return state
                .pending
                .get(operation_id)
                .map(|p| p.operation.clone())
                .ok_or_else(|| Status::not_found(format!("operation {} not found", operation_id)));
        }
        match state.pending.remove(operation_id) {
            Some(pending) => Ok(state.complete(pending)),
            None => Err(Status::not_found(format!(
                "operation {} not found",
                operation_id
            ))),
        }
    }
}

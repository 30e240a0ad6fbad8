//! Control-plane API seam
//!
//! Typed request/response values for the serverless containers API and the
//! traits a transport implements. The engine only ever talks to the remote
//! side through [`ContainerApi`] and [`OperationPoller`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// Remote status code (gRPC code space)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCode {
    Ok,
    Cancelled,
    Unknown,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    ResourceExhausted,
    FailedPrecondition,
    Aborted,
    OutOfRange,
    Unimplemented,
    Internal,
    Unavailable,
    DataLoss,
    Unauthenticated,
}

impl StatusCode {
    pub fn from_i32(code: i32) -> Self {
        match code {
            0 => StatusCode::Ok,
            1 => StatusCode::Cancelled,
            3 => StatusCode::InvalidArgument,
            4 => StatusCode::DeadlineExceeded,
            5 => StatusCode::NotFound,
            6 => StatusCode::AlreadyExists,
            7 => StatusCode::PermissionDenied,
            8 => StatusCode::ResourceExhausted,
            9 => StatusCode::FailedPrecondition,
            10 => StatusCode::Aborted,
            11 => StatusCode::OutOfRange,
            12 => StatusCode::Unimplemented,
            13 => StatusCode::Internal,
            14 => StatusCode::Unavailable,
            15 => StatusCode::DataLoss,
            16 => StatusCode::Unauthenticated,
            _ => StatusCode::Unknown,
        }
    }

    /// Map an HTTP status onto the closest code
    pub fn from_http(status: u16) -> Self {
        match status {
            400 => StatusCode::InvalidArgument,
            401 => StatusCode::Unauthenticated,
            403 => StatusCode::PermissionDenied,
            404 => StatusCode::NotFound,
            409 => StatusCode::AlreadyExists,
            429 => StatusCode::ResourceExhausted,
            499 => StatusCode::Cancelled,
            500 => StatusCode::Internal,
            501 => StatusCode::Unimplemented,
            503 => StatusCode::Unavailable,
            504 => StatusCode::DeadlineExceeded,
            _ => StatusCode::Unknown,
        }
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StatusCode::Ok => "OK",
            StatusCode::Cancelled => "CANCELLED",
            StatusCode::Unknown => "UNKNOWN",
            StatusCode::InvalidArgument => "INVALID_ARGUMENT",
            StatusCode::DeadlineExceeded => "DEADLINE_EXCEEDED",
            StatusCode::NotFound => "NOT_FOUND",
            StatusCode::AlreadyExists => "ALREADY_EXISTS",
            StatusCode::PermissionDenied => "PERMISSION_DENIED",
            StatusCode::ResourceExhausted => "RESOURCE_EXHAUSTED",
            StatusCode::FailedPrecondition => "FAILED_PRECONDITION",
            StatusCode::Aborted => "ABORTED",
            StatusCode::OutOfRange => "OUT_OF_RANGE",
            StatusCode::Unimplemented => "UNIMPLEMENTED",
            StatusCode::Internal => "INTERNAL",
            StatusCode::Unavailable => "UNAVAILABLE",
            StatusCode::DataLoss => "DATA_LOSS",
            StatusCode::Unauthenticated => "UNAUTHENTICATED",
        };
        f.write_str(name)
    }
}

/// Error reported by the remote side or the transport
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct Status {
    pub code: StatusCode,
    pub message: String,
}

impl Status {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NotFound, message)
    }

    pub fn is_not_found(&self) -> bool {
        self.code == StatusCode::NotFound
    }
}

pub type ApiResult<T> = std::result::Result<T, Status>;

/// Top-level container object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    pub id: String,
    pub folder_id: String,
    pub created_at: Option<DateTime<Utc>>,
    pub name: String,
    pub description: String,
    pub labels: BTreeMap<String, String>,
    /// Invocation URL
    pub url: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RevisionStatus {
    #[default]
    StatusUnspecified,
    Creating,
    Active,
    Obsolete,
}

impl RevisionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RevisionStatus::StatusUnspecified => "STATUS_UNSPECIFIED",
            RevisionStatus::Creating => "CREATING",
            RevisionStatus::Active => "ACTIVE",
            RevisionStatus::Obsolete => "OBSOLETE",
        }
    }
}

/// Immutable deployment snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    pub id: String,
    pub container_id: String,
    pub created_at: Option<DateTime<Utc>>,
    pub status: RevisionStatus,
    pub image: ImageSpec,
    pub resources: Resources,
    pub execution_timeout: Option<Duration>,
    /// 0 means "platform default"
    pub concurrency: u64,
    pub service_account_id: String,
    pub secrets: Vec<Secret>,
    pub connectivity: Option<Connectivity>,
    pub provision_policy: Option<ProvisionPolicy>,
    pub log_options: Option<LogOptions>,
    pub storage_mounts: Vec<StorageMount>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resources {
    /// Memory in bytes
    pub memory: u64,
    pub cores: Option<u64>,
    pub core_fraction: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSpec {
    pub image_url: String,
    /// Resolved by the platform; never sent
    pub image_digest: Option<String>,
    pub working_dir: Option<String>,
    pub command: Option<Vec<String>>,
    pub args: Option<Vec<String>>,
    pub environment: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secret {
    pub id: String,
    pub version_id: String,
    pub key: String,
    pub environment_variable: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageMount {
    pub bucket_id: String,
    pub prefix: String,
    pub read_only: bool,
    pub mount_point_path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connectivity {
    pub network_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionPolicy {
    pub min_instances: u64,
}

/// Remote log routing; the destination is a one-of
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogOptions {
    pub disabled: bool,
    pub destination: Option<LogDestination>,
    pub min_level: LogLevel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogDestination {
    LogGroupId(String),
    FolderId(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogLevel {
    #[default]
    LevelUnspecified,
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::LevelUnspecified => "LEVEL_UNSPECIFIED",
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Fatal => "FATAL",
        }
    }

    /// Look up a level by its remote enum name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "LEVEL_UNSPECIFIED" => Some(LogLevel::LevelUnspecified),
            "TRACE" => Some(LogLevel::Trace),
            "DEBUG" => Some(LogLevel::Debug),
            "INFO" => Some(LogLevel::Info),
            "WARN" => Some(LogLevel::Warn),
            "ERROR" => Some(LogLevel::Error),
            "FATAL" => Some(LogLevel::Fatal),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateContainerRequest {
    pub folder_id: String,
    pub name: String,
    pub description: String,
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateContainerRequest {
    pub container_id: String,
    /// Field mask: only these paths are changed remotely
    pub update_mask: Vec<String>,
    pub name: String,
    pub description: String,
    pub labels: BTreeMap<String, String>,
}

/// Payload of a new revision deployment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployRevisionRequest {
    pub container_id: String,
    pub resources: Resources,
    pub execution_timeout: Option<Duration>,
    pub service_account_id: Option<String>,
    pub image_spec: ImageSpec,
    pub concurrency: Option<u64>,
    pub secrets: Vec<Secret>,
    pub connectivity: Option<Connectivity>,
    pub provision_policy: Option<ProvisionPolicy>,
    pub log_options: Option<LogOptions>,
    pub storage_mounts: Vec<StorageMount>,
}

impl DeployRevisionRequest {
    /// The revision a control plane records for this request
    pub fn into_revision(
        self,
        revision_id: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Revision {
        Revision {
            id: revision_id.into(),
            container_id: self.container_id,
            created_at: Some(created_at),
            status: RevisionStatus::Active,
            image: self.image_spec,
            resources: self.resources,
            execution_timeout: self.execution_timeout,
            concurrency: self.concurrency.unwrap_or(0),
            service_account_id: self.service_account_id.unwrap_or_default(),
            secrets: self.secrets,
            connectivity: self.connectivity,
            provision_policy: self.provision_policy,
            log_options: self.log_options,
            storage_mounts: self.storage_mounts,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListRevisionsRequest {
    pub container_id: String,
    pub status: Option<RevisionStatus>,
}

impl ListRevisionsRequest {
    /// Filter expression understood by the remote list call
    pub fn filter(&self) -> Option<String> {
        self.status.map(|s| format!("status='{}'", s.as_str()))
    }
}

/// Handle of an asynchronous remote task
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub id: String,
    pub description: String,
    pub done: bool,
    /// Typed metadata, readable before the operation completes
    pub metadata: Option<OperationMetadata>,
    /// Set once `done` is true
    pub result: Option<OperationResult>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OperationMetadata {
    CreateContainer { container_id: String },
    UpdateContainer { container_id: String },
    DeleteContainer { container_id: String },
    DeployContainerRevision { container_revision_id: String },
    Unknown { type_url: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationResult {
    Success,
    Failure(Status),
}

/// Typed RPC client for the serverless containers service
#[async_trait]
pub trait ContainerApi: Send + Sync {
    async fn create_container(&self, request: CreateContainerRequest) -> ApiResult<Operation>;

    async fn update_container(&self, request: UpdateContainerRequest) -> ApiResult<Operation>;

    async fn delete_container(&self, container_id: &str) -> ApiResult<Operation>;

    async fn get_container(&self, container_id: &str) -> ApiResult<Container>;

    async fn list_revisions(&self, request: ListRevisionsRequest) -> ApiResult<Vec<Revision>>;

    async fn deploy_revision(&self, request: DeployRevisionRequest) -> ApiResult<Operation>;
}

/// Fetches the current state of an operation by id
#[async_trait]
pub trait OperationPoller: Send + Sync {
    async fn get_operation(&self, operation_id: &str) -> ApiResult<Operation>;
}

//! Reconciliation error types

use crate::api::{Status, StatusCode};
use std::time::Duration;
use thiserror::Error;

/// Remote operation a failure is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Create,
    Update,
    DeployRevision,
    Delete,
    Get,
    ListRevisions,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationKind::Create => write!(f, "create"),
            OperationKind::Update => write!(f, "update"),
            OperationKind::DeployRevision => write!(f, "deploy-revision"),
            OperationKind::Delete => write!(f, "delete"),
            OperationKind::Get => write!(f, "get"),
            OperationKind::ListRevisions => write!(f, "list-revisions"),
        }
    }
}

/// Local validation failures. Raised before any remote call is issued.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid duration {value:?}: {reason}")]
    InvalidDuration { value: String, reason: String },

    #[error("Unknown log level: {0}")]
    UnknownLogLevel(String),

    #[error("log_options: log_group_id and folder_id are mutually exclusive")]
    ConflictingLogDestination,

    #[error("log_options: exactly one of log_group_id or folder_id is required")]
    MissingLogDestination,

    #[error("Memory of {0} MB cannot be represented in bytes")]
    MemoryOverflow(u64),

    #[error("No folder for container {0}: declare folder_id or configure a default folder")]
    MissingFolder(String),
}

/// Outcome of waiting for an asynchronous operation, other than success
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WaitError {
    #[error("Operation target not found: {0}")]
    NotFound(Status),

    #[error("Deadline exceeded after {elapsed:?}")]
    Timeout { elapsed: Duration },

    #[error("Wait cancelled")]
    Cancelled,

    #[error("Operation failed: {0}")]
    Failed(Status),

    #[error("Polling the operation failed: {0}")]
    Poll(Status),
}

/// Cloud reconciliation errors
#[derive(Error, Debug)]
pub enum CloudError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("API error: {operation} request for container {target} was rejected: {status}")]
    RemoteCall {
        operation: OperationKind,
        target: String,
        status: Status,
    },

    #[error("Operation failed: {operation} of container {target}: {status}")]
    OperationFailed {
        operation: OperationKind,
        target: String,
        status: Status,
    },

    #[error("Resource not found: container {0}")]
    NotFound(String),

    #[error("Timeout: {operation} of container {target} exceeded its deadline after {elapsed:?}")]
    Timeout {
        operation: OperationKind,
        target: String,
        elapsed: Duration,
    },

    #[error("Cancelled: {operation} of container {target}")]
    Cancelled {
        operation: OperationKind,
        target: String,
    },

    #[error("Could not get container id from create operation metadata")]
    MissingIdentity,

    #[error("Container {0} has no identity yet")]
    NotTracked(String),

    #[error("State file error: {0}")]
    StateError(String),

    #[error("Lock acquisition failed: {0}")]
    LockError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CloudError {
    /// Attach operation context to a failed wait
    pub fn from_wait(operation: OperationKind, target: impl Into<String>, err: WaitError) -> Self {
        let target = target.into();
        match err {
            WaitError::NotFound(_) => CloudError::NotFound(target),
            WaitError::Timeout { elapsed } => CloudError::Timeout {
                operation,
                target,
                elapsed,
            },
            WaitError::Cancelled => CloudError::Cancelled { operation, target },
            WaitError::Failed(status) => CloudError::OperationFailed {
                operation,
                target,
                status,
            },
            WaitError::Poll(status) => CloudError::RemoteCall {
                operation,
                target,
                status,
            },
        }
    }

    /// True when the remote side reported the container as absent
    pub fn is_not_found(&self) -> bool {
        match self {
            CloudError::NotFound(_) => true,
            CloudError::RemoteCall { status, .. } | CloudError::OperationFailed { status, .. } => {
                status.code == StatusCode::NotFound
            }
            _ => false,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, CloudError::Timeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_error_context() {
        let err = CloudError::from_wait(
            OperationKind::DeployRevision,
            "ctr-1",
            WaitError::Failed(Status::new(StatusCode::InvalidArgument, "bad memory")),
        );
        let message = err.to_string();
        assert!(message.contains("deploy-revision"));
        assert!(message.contains("ctr-1"));
        assert!(message.contains("bad memory"));
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_not_found_detection() {
        let err = CloudError::RemoteCall {
            operation: OperationKind::Get,
            target: "ctr-1".to_string(),
            status: Status::new(StatusCode::NotFound, "gone"),
        };
        assert!(err.is_not_found());
        assert!(CloudError::from_wait(
            OperationKind::Delete,
            "ctr-1",
            WaitError::NotFound(Status::new(StatusCode::NotFound, "gone"))
        )
        .is_not_found());
    }

    #[test]
    fn test_timeout_is_distinct_from_remote_failure() {
        let err = CloudError::from_wait(
            OperationKind::Create,
            "ctr-1",
            WaitError::Timeout {
                elapsed: Duration::from_secs(300),
            },
        );
        assert!(err.is_timeout());
        assert!(!err.is_not_found());
    }
}

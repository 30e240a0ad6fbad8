//! ContainerFlow reconciliation engine
//!
//! Converges a declared serverless container onto a remote control plane.
//! Top-level attributes (name, description, labels) are updated in place
//! under a field mask; everything else lives in immutable revisions, and
//! any change to it deploys a new one.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                 containerflow CLI                 │
//! │          (cflow plan / apply / destroy)           │
//! └─────────────────┬────────────────────────────────┘
//!                   │
//! ┌─────────────────▼────────────────────────────────┐
//! │               containerflow-cloud                 │
//! │  ┌────────────┐  ┌──────────┐  ┌──────────────┐  │
//! │  │ Reconciler │─▶│ ChangeSet│  │ StateManager │  │
//! │  └─────┬──────┘  └──────────┘  └──────────────┘  │
//! │        │ payload / projector / OperationWaiter    │
//! │  ┌─────▼───────────────────────────────────┐     │
//! │  │  trait ContainerApi + OperationPoller    │     │
//! │  └──────────────────────────────────────────┘     │
//! └────────┬──────────────────────────┬──────────────┘
//!          │                          │
//! ┌────────▼─────────┐      ┌─────────▼──────────┐
//! │ yandex REST API  │      │ in-memory plane    │
//! │ (cloud-yandex)   │      │ (test-utils)       │
//! └──────────────────┘      └────────────────────┘
//! ```

pub mod action;
pub mod api;
pub mod changes;
pub mod error;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod operation;
pub mod payload;
pub mod projector;
pub mod reconciler;
pub mod record;
pub mod state;
pub mod units;

// Re-exports
pub use action::{
    Action, ActionResult, ActionType, ApplyResult, Plan, PlanSummary, plan_container, plan_destroy,
};
pub use api::{ContainerApi, Operation, OperationPoller, Status, StatusCode};
pub use changes::{ChangeSet, TopLevelField, compute_changes};
pub use error::{CloudError, OperationKind, Result, ValidationError, WaitError};
pub use operation::{OperationWaiter, PollConfig, PollingWaiter};
pub use payload::build_revision_payload;
pub use projector::project;
pub use reconciler::{PassTimeouts, Reconciler};
pub use record::{LifecyclePhase, ObservableRecord, RevisionState, TrackedContainer};
pub use state::{GlobalState, StateLock, StateManager};

//! Yandex Cloud transport for ContainerFlow
//!
//! Implements [`ContainerApi`](containerflow_cloud::ContainerApi) and
//! [`OperationPoller`](containerflow_cloud::OperationPoller) over the public
//! REST API of Serverless Containers.
//!
//! # Requirements
//!
//! - `YC_TOKEN`: an IAM token, e.g. from `yc iam create-token`
//!
//! # Example
//!
//! ```ignore
//! use containerflow_cloud::{PollingWaiter, Reconciler};
//! use containerflow_cloud_yandex::YandexClient;
//! use std::sync::Arc;
//!
//! let client = Arc::new(YandexClient::from_env()?);
//! let waiter = Arc::new(PollingWaiter::new(client.clone()));
//! let reconciler = Reconciler::new(client, waiter).with_default_folder("b1g...");
//! ```

pub mod client;
pub mod config;
pub mod error;
mod wire;

pub use client::YandexClient;
pub use config::YandexConfig;
pub use error::{Result, YandexError};

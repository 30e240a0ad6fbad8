use anyhow::Context;
use containerflow_cloud::{PassTimeouts, PollConfig, PollingWaiter, Reconciler, StateManager};
use containerflow_cloud_yandex::{YandexClient, YandexConfig};
use containerflow_config::Settings;
use containerflow_core::ContainerDocument;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Everything a command needs about the current project
pub struct Project {
    pub root: PathBuf,
    pub file: PathBuf,
    pub document: ContainerDocument,
    pub settings: Settings,
}

impl Project {
    pub fn load(file: Option<&Path>) -> anyhow::Result<Self> {
        let file = match file {
            Some(path) => path.to_path_buf(),
            None => containerflow_config::find_container_file()?,
        };
        let root = std::env::current_dir()?;
        let document = containerflow_core::load_document(&file)
            .with_context(|| format!("failed to load {}", file.display()))?;
        let settings = Settings::load(&root)?;

        tracing::debug!(file = %file.display(), containers = document.len(), "Project loaded");
        Ok(Self {
            root,
            file,
            document,
            settings,
        })
    }

    pub fn state(&self) -> StateManager {
        StateManager::new(&self.root)
    }

    /// Reconciler talking to Yandex Cloud; Ctrl-C cancels the running pass
    pub fn reconciler(&self) -> anyhow::Result<Reconciler> {
        let config = YandexConfig::from_env()?.with_endpoints(
            self.settings.endpoint.clone(),
            self.settings.operation_endpoint.clone(),
        );
        let client = Arc::new(YandexClient::new(config)?);

        let poll = &self.settings.poll;
        let waiter = PollingWaiter::new(client.clone()).with_config(PollConfig {
            initial_delay: poll.initial_delay,
            max_delay: poll.max_delay,
            multiplier: poll.multiplier,
        });

        let timeouts = &self.settings.timeouts;
        let cancel = CancellationToken::new();
        let mut reconciler = Reconciler::new(client, Arc::new(waiter))
            .with_timeouts(PassTimeouts {
                create: timeouts.create,
                update: timeouts.update,
                delete: timeouts.delete,
                read: timeouts.read,
            })
            .with_cancellation(cancel.clone());
        if let Some(folder_id) = &self.settings.folder_id {
            reconciler = reconciler.with_default_folder(folder_id.clone());
        }

        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, cancelling");
                cancel.cancel();
            }
        });

        Ok(reconciler)
    }
}

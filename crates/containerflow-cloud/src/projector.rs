//! State projector
//!
//! Maps a remote container plus its active revision back into the declared
//! shape, so drift is a structural comparison with `DesiredConfig`.

use crate::api::{self, Container, LogDestination, LogLevel, Revision};
use crate::record::{ObservableRecord, RevisionState};
use crate::units::{bytes_to_megabytes, format_duration};
use containerflow_core::{
    Connectivity, DesiredConfig, ImageSpec, LogOptions, ProvisionPolicy, SecretMount,
    StorageMount,
};

/// Project remote state into an [`ObservableRecord`].
///
/// `deployed` is the configuration a revision was just deployed from, if
/// any; it takes precedence over `prior` wherever the platform's answer is
/// ambiguous. Without an active revision the revision-derived fields keep
/// whatever `prior` held and the record is marked `ProvisioningIncomplete`.
pub fn project(
    container: &Container,
    revision: Option<&Revision>,
    prior: Option<&ObservableRecord>,
    deployed: Option<&DesiredConfig>,
) -> ObservableRecord {
    let mut config = match revision {
        Some(revision) => {
            let last_sent = deployed.or(prior.map(|p| &p.config));
            project_revision(revision, last_sent.map(|c| &c.image))
        }
        None => {
            tracing::warn!(
                container_id = %container.id,
                "Container has no active revision"
            );
            prior.map(|p| p.config.clone()).unwrap_or_default()
        }
    };

    config.name = container.name.clone();
    config.folder_id = Some(container.folder_id.clone());
    config.description = non_empty(&container.description);
    config.labels = container.labels.clone();

    let (revision_state, image_digest) = match revision {
        Some(revision) => (
            RevisionState::Active {
                revision_id: revision.id.clone(),
            },
            revision.image.image_digest.clone(),
        ),
        None => (
            RevisionState::ProvisioningIncomplete,
            prior.and_then(|p| p.image_digest.clone()),
        ),
    };

    ObservableRecord {
        id: container.id.clone(),
        folder_id: container.folder_id.clone(),
        created_at: container.created_at,
        url: container.url.clone(),
        revision: revision_state,
        image_digest,
        config,
    }
}

fn project_revision(revision: &Revision, last_sent: Option<&ImageSpec>) -> DesiredConfig {
    DesiredConfig {
        memory: bytes_to_megabytes(revision.resources.memory),
        cores: revision.resources.cores,
        core_fraction: revision.resources.core_fraction,
        execution_timeout: revision.execution_timeout.map(format_duration),
        concurrency: (revision.concurrency > 0).then_some(revision.concurrency),
        service_account_id: non_empty(&revision.service_account_id),
        secrets: Some(
            revision
                .secrets
                .iter()
                .map(|s| SecretMount {
                    id: s.id.clone(),
                    version_id: s.version_id.clone(),
                    key: s.key.clone(),
                    environment_variable: s.environment_variable.clone(),
                })
                .collect(),
        ),
        storage_mounts: Some(
            revision
                .storage_mounts
                .iter()
                .map(|m| StorageMount {
                    mount_point_path: m.mount_point_path.clone(),
                    bucket: m.bucket_id.clone(),
                    prefix: non_empty(&m.prefix),
                    read_only: m.read_only,
                })
                .collect(),
        ),
        image: ImageSpec {
            url: revision.image.image_url.clone(),
            work_dir: revision.image.working_dir.as_deref().and_then(non_empty),
            command: entrypoint(
                &revision.image.command,
                last_sent.and_then(|i| i.command.as_ref()),
            ),
            args: entrypoint(
                &revision.image.args,
                last_sent.and_then(|i| i.args.as_ref()),
            ),
            environment: revision.image.environment.clone().unwrap_or_default(),
        },
        connectivity: revision
            .connectivity
            .as_ref()
            .filter(|c| !c.network_id.is_empty())
            .map(|c| Connectivity {
                network_id: c.network_id.clone(),
            }),
        log_options: revision.log_options.as_ref().map(project_log_options),
        provision_policy: revision.provision_policy.as_ref().map(|p| ProvisionPolicy {
            min_instances: p.min_instances,
        }),
        ..Default::default()
    }
}

/// An explicitly cleared entrypoint comes back from the platform as unset;
/// keep the cleared form only when that is what was last sent.
fn entrypoint(remote: &Option<Vec<String>>, last_sent: Option<&Vec<String>>) -> Option<Vec<String>> {
    match (remote, last_sent) {
        (None, Some(sent)) if sent.is_empty() => Some(Vec::new()),
        (remote, _) => remote.clone(),
    }
}

fn project_log_options(options: &api::LogOptions) -> LogOptions {
    let (log_group_id, folder_id) = match &options.destination {
        Some(LogDestination::LogGroupId(id)) => (Some(id.clone()), None),
        Some(LogDestination::FolderId(id)) => (None, Some(id.clone())),
        None => (None, None),
    };

    LogOptions {
        disabled: options.disabled,
        log_group_id,
        folder_id,
        min_level: match options.min_level {
            LogLevel::LevelUnspecified => None,
            level => Some(level.as_str().to_string()),
        },
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

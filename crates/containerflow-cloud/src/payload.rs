//! Revision payload builder
//!
//! Turns a declared configuration into the request that deploys a new
//! revision. Pure: no I/O and the same input always yields the same payload.

use crate::api::{
    Connectivity, DeployRevisionRequest, ImageSpec, LogDestination, LogLevel, LogOptions,
    ProvisionPolicy, Resources, Secret, StorageMount,
};
use crate::error::ValidationError;
use crate::units::{megabytes_to_bytes, parse_positive_duration};
use containerflow_core::{self as declared, DesiredConfig};

/// Build the deployment payload for `desired`.
///
/// `container_id` is left empty; the reconciler fills it in once the
/// identity is known.
pub fn build_revision_payload(
    desired: &DesiredConfig,
) -> Result<DeployRevisionRequest, ValidationError> {
    let resources = Resources {
        memory: megabytes_to_bytes(desired.memory)?,
        cores: desired.cores,
        core_fraction: desired.core_fraction,
    };

    let execution_timeout = desired
        .execution_timeout
        .as_deref()
        .map(parse_positive_duration)
        .transpose()?;

    let log_options = desired
        .log_options
        .as_ref()
        .map(build_log_options)
        .transpose()?;

    Ok(DeployRevisionRequest {
        container_id: String::new(),
        resources,
        execution_timeout,
        service_account_id: desired.service_account_id.clone(),
        image_spec: build_image_spec(&desired.image),
        concurrency: desired.concurrency,
        secrets: desired
            .secrets
            .iter()
            .flatten()
            .map(|s| Secret {
                id: s.id.clone(),
                version_id: s.version_id.clone(),
                key: s.key.clone(),
                environment_variable: s.environment_variable.clone(),
            })
            .collect(),
        connectivity: desired.connectivity.as_ref().map(|c| Connectivity {
            network_id: c.network_id.clone(),
        }),
        provision_policy: desired.provision_policy.as_ref().map(|p| ProvisionPolicy {
            min_instances: p.min_instances,
        }),
        log_options,
        storage_mounts: desired
            .storage_mounts
            .iter()
            .flatten()
            .map(|m| StorageMount {
                bucket_id: m.bucket.clone(),
                prefix: m.prefix.clone().unwrap_or_default(),
                read_only: m.read_only,
                mount_point_path: m.mount_point_path.clone(),
            })
            .collect(),
    })
}

fn build_image_spec(image: &declared::ImageSpec) -> ImageSpec {
    ImageSpec {
        image_url: image.url.clone(),
        image_digest: None,
        working_dir: image.work_dir.clone(),
        command: image.command.clone(),
        args: image.args.clone(),
        environment: (!image.environment.is_empty()).then(|| image.environment.clone()),
    }
}

fn build_log_options(options: &declared::LogOptions) -> Result<LogOptions, ValidationError> {
    let destination = match (&options.log_group_id, &options.folder_id) {
        (Some(_), Some(_)) => return Err(ValidationError::ConflictingLogDestination),
        (Some(log_group_id), None) => Some(LogDestination::LogGroupId(log_group_id.clone())),
        (None, Some(folder_id)) => Some(LogDestination::FolderId(folder_id.clone())),
        (None, None) if options.disabled => None,
        (None, None) => return Err(ValidationError::MissingLogDestination),
    };

    let min_level = match options.min_level.as_deref() {
        Some(name) => LogLevel::from_name(name)
            .ok_or_else(|| ValidationError::UnknownLogLevel(name.to_string()))?,
        None => LogLevel::LevelUnspecified,
    };

    Ok(LogOptions {
        disabled: options.disabled,
        destination,
        min_level,
    })
}

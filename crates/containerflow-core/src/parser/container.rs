//! `container` node parsing

use super::values::{
    all_strings, first_bool, first_string, first_unsigned, invalid, required_string, string_map,
};
use crate::error::{FlowError, Result};
use crate::model::{
    Connectivity, DesiredConfig, ImageSpec, LogOptions, ProvisionPolicy, SecretMount,
    StorageMount,
};
use kdl::KdlNode;

/// Parse a `container` node into its key and declared configuration
///
/// ```kdl
/// container "api" {
///     memory 512
///     execution_timeout "30s"
///     image {
///         url "cr.yandex/crp/api:1.0"
///         args "--port" "8080"
///     }
/// }
/// ```
pub fn parse_container(node: &KdlNode) -> Result<(String, DesiredConfig)> {
    let key = first_string(node)
        .ok_or_else(|| FlowError::InvalidConfig("container requires a name".to_string()))?;

    let mut config = DesiredConfig {
        name: key.clone(),
        ..Default::default()
    };
    let mut memory = None;
    let mut image = None;

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "name" => config.name = required_string(&key, child)?,
                "folder_id" | "folder-id" => config.folder_id = first_string(child),
                "description" => config.description = first_string(child),
                "labels" => config.labels = string_map(child),
                "memory" => memory = Some(first_unsigned(&key, child)?),
                "cores" => config.cores = Some(first_unsigned(&key, child)?),
                "core_fraction" | "core-fraction" => {
                    config.core_fraction = Some(first_unsigned(&key, child)?)
                }
                "execution_timeout" | "execution-timeout" => {
                    config.execution_timeout = Some(required_string(&key, child)?)
                }
                "concurrency" => config.concurrency = Some(first_unsigned(&key, child)?),
                "service_account_id" | "service-account-id" => {
                    config.service_account_id = first_string(child)
                }
                "secret" => config
                    .secrets
                    .get_or_insert_with(Vec::new)
                    .push(parse_secret(&key, child)?),
                // an empty `secrets` node declares "no secrets"
                "secrets" => {
                    config.secrets.get_or_insert_with(Vec::new);
                }
                "storage_mount" | "storage-mount" => config
                    .storage_mounts
                    .get_or_insert_with(Vec::new)
                    .push(parse_storage_mount(&key, child)?),
                "storage_mounts" | "storage-mounts" => {
                    config.storage_mounts.get_or_insert_with(Vec::new);
                }
                "image" => image = Some(parse_image(&key, child)?),
                "connectivity" => config.connectivity = Some(parse_connectivity(&key, child)?),
                "log_options" | "log-options" => {
                    config.log_options = Some(parse_log_options(&key, child)?)
                }
                "provision_policy" | "provision-policy" => {
                    config.provision_policy = Some(parse_provision_policy(&key, child)?)
                }
                other => {
                    return Err(invalid(&key, other, "is not a known container field"));
                }
            }
        }
    }

    config.memory = memory.ok_or_else(|| FlowError::MissingMemory(key.clone()))?;
    config.image = image.ok_or_else(|| FlowError::MissingImage(key.clone()))?;

    Ok((key, config))
}

fn parse_image(key: &str, node: &KdlNode) -> Result<ImageSpec> {
    let mut image = ImageSpec::default();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "url" => image.url = required_string(key, child)?,
                "work_dir" | "work-dir" => image.work_dir = first_string(child),
                // `command` with no arguments is an explicit empty override
                "command" => image.command = Some(all_strings(child)),
                "args" => image.args = Some(all_strings(child)),
                "environment" | "env" => image.environment = string_map(child),
                other => return Err(invalid(key, &format!("image.{other}"), "is not known")),
            }
        }
    }

    if image.url.is_empty() {
        return Err(FlowError::MissingImage(key.to_string()));
    }
    Ok(image)
}

fn parse_secret(key: &str, node: &KdlNode) -> Result<SecretMount> {
    let mut secret = SecretMount::default();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "id" => secret.id = required_string(key, child)?,
                "version_id" | "version-id" => secret.version_id = required_string(key, child)?,
                "key" => secret.key = required_string(key, child)?,
                "environment_variable" | "environment-variable" => {
                    secret.environment_variable = required_string(key, child)?
                }
                other => return Err(invalid(key, &format!("secret.{other}"), "is not known")),
            }
        }
    }

    for (field, value) in [
        ("id", &secret.id),
        ("version_id", &secret.version_id),
        ("key", &secret.key),
        ("environment_variable", &secret.environment_variable),
    ] {
        if value.is_empty() {
            return Err(invalid(key, &format!("secret.{field}"), "is required"));
        }
    }
    Ok(secret)
}

fn parse_storage_mount(key: &str, node: &KdlNode) -> Result<StorageMount> {
    let mut mount = StorageMount::default();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "mount_point_path" | "mount-point-path" | "path" => {
                    mount.mount_point_path = required_string(key, child)?
                }
                "bucket" => mount.bucket = required_string(key, child)?,
                "prefix" => mount.prefix = first_string(child),
                "read_only" | "read-only" => mount.read_only = first_bool(child).unwrap_or(true),
                other => {
                    return Err(invalid(key, &format!("storage_mount.{other}"), "is not known"));
                }
            }
        }
    }

    if mount.mount_point_path.is_empty() || mount.bucket.is_empty() {
        return Err(invalid(
            key,
            "storage_mount",
            "requires mount_point_path and bucket",
        ));
    }
    Ok(mount)
}

fn parse_connectivity(key: &str, node: &KdlNode) -> Result<Connectivity> {
    // accepts both `connectivity "enp..."` and a block with `network_id`
    let network_id = first_string(node).or_else(|| {
        node.children()
            .and_then(|c| c.get("network_id").or_else(|| c.get("network-id")))
            .and_then(first_string)
    });

    network_id
        .map(|network_id| Connectivity { network_id })
        .ok_or_else(|| invalid(key, "connectivity", "requires network_id"))
}

fn parse_log_options(key: &str, node: &KdlNode) -> Result<LogOptions> {
    let mut options = LogOptions::default();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "disabled" => options.disabled = first_bool(child).unwrap_or(true),
                "log_group_id" | "log-group-id" => options.log_group_id = first_string(child),
                "folder_id" | "folder-id" => options.folder_id = first_string(child),
                "min_level" | "min-level" => options.min_level = first_string(child),
                other => {
                    return Err(invalid(key, &format!("log_options.{other}"), "is not known"));
                }
            }
        }
    }

    Ok(options)
}

fn parse_provision_policy(key: &str, node: &KdlNode) -> Result<ProvisionPolicy> {
    let min_instances = node
        .children()
        .and_then(|c| c.get("min_instances").or_else(|| c.get("min-instances")))
        .map(|n| first_unsigned(key, n))
        .transpose()?
        .ok_or_else(|| invalid(key, "provision_policy", "requires min_instances"))?;

    Ok(ProvisionPolicy { min_instances })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(kdl: &str) -> Result<(String, DesiredConfig)> {
        let doc: kdl::KdlDocument = kdl.parse().unwrap();
        let node = doc.nodes().first().unwrap();
        parse_container(node)
    }

    #[test]
    fn test_parse_minimal_container() {
        let (key, config) = parse(
            r#"
            container "api" {
                memory 512
                image {
                    url "cr.yandex/crp/api:1.0"
                }
            }
            "#,
        )
        .unwrap();

        assert_eq!(key, "api");
        assert_eq!(config.name, "api");
        assert_eq!(config.memory, 512);
        assert_eq!(config.image.url, "cr.yandex/crp/api:1.0");
        assert_eq!(config.cores, None);
        assert_eq!(config.secrets, None);
        assert_eq!(config.log_options, None);
    }

    #[test]
    fn test_parse_full_container() {
        let (_, config) = parse(
            r#"
            container "api" {
                name "demo-api"
                folder_id "b1gfolder"
                description "public api"
                labels {
                    env "prod"
                    team "core"
                }
                memory 1024
                cores 2
                core_fraction 50
                execution_timeout "30s"
                concurrency 8
                service_account_id "ajesa"
                secret {
                    id "e6qsecret"
                    version_id "e6qversion"
                    key "token"
                    environment_variable "API_TOKEN"
                }
                storage_mount {
                    mount_point_path "/data"
                    bucket "assets"
                    prefix "v1"
                    read_only #false
                }
                image {
                    url "cr.yandex/crp/api:1.0"
                    work_dir "/app"
                    command "/bin/server"
                    args "--port" "8080"
                    environment {
                        RUST_LOG "info"
                    }
                }
                connectivity {
                    network_id "enpnet"
                }
                log_options {
                    log_group_id "e23group"
                    min_level "WARN"
                }
                provision_policy {
                    min_instances 1
                }
            }
            "#,
        )
        .unwrap();

        assert_eq!(config.name, "demo-api");
        assert_eq!(config.folder_id.as_deref(), Some("b1gfolder"));
        assert_eq!(config.labels.get("env").map(String::as_str), Some("prod"));
        assert_eq!(config.cores, Some(2));
        assert_eq!(config.core_fraction, Some(50));
        assert_eq!(config.execution_timeout.as_deref(), Some("30s"));
        assert_eq!(config.concurrency, Some(8));

        let secrets = config.secrets.unwrap();
        assert_eq!(secrets.len(), 1);
        assert_eq!(secrets[0].environment_variable, "API_TOKEN");

        let mounts = config.storage_mounts.unwrap();
        assert_eq!(mounts[0].prefix.as_deref(), Some("v1"));
        assert!(!mounts[0].read_only);

        assert_eq!(config.image.command, Some(vec!["/bin/server".to_string()]));
        assert_eq!(
            config.image.args,
            Some(vec!["--port".to_string(), "8080".to_string()])
        );
        assert_eq!(config.image.environment.len(), 1);
        assert_eq!(config.connectivity.unwrap().network_id, "enpnet");

        let log = config.log_options.unwrap();
        assert_eq!(log.log_group_id.as_deref(), Some("e23group"));
        assert_eq!(log.folder_id, None);
        assert_eq!(log.min_level.as_deref(), Some("WARN"));
        assert_eq!(config.provision_policy.unwrap().min_instances, 1);
    }

    #[test]
    fn test_empty_command_is_explicit_override() {
        let (_, config) = parse(
            r#"
            container "api" {
                memory 128
                image {
                    url "img"
                    command
                }
            }
            "#,
        )
        .unwrap();

        assert_eq!(config.image.command, Some(Vec::new()));
        assert_eq!(config.image.args, None);
    }

    #[test]
    fn test_empty_secrets_node_declares_none() {
        let (_, config) = parse(
            r#"
            container "api" {
                memory 128
                secrets
                image { url "img"; }
            }
            "#,
        )
        .unwrap();

        assert_eq!(config.secrets, Some(Vec::new()));
    }

    #[test]
    fn test_missing_memory() {
        let result = parse(r#"container "api" { image { url "img"; }; }"#);
        assert!(matches!(result, Err(FlowError::MissingMemory(k)) if k == "api"));
    }

    #[test]
    fn test_missing_image() {
        let result = parse(r#"container "api" { memory 128; }"#);
        assert!(matches!(result, Err(FlowError::MissingImage(k)) if k == "api"));
    }

    #[test]
    fn test_negative_memory_is_rejected() {
        let result = parse(r#"container "api" { memory -128; image { url "img"; }; }"#);
        assert!(matches!(result, Err(FlowError::InvalidField { field, .. }) if field == "memory"));
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let result = parse(r#"container "api" { memory 128; gpus 1; image { url "img"; }; }"#);
        assert!(matches!(result, Err(FlowError::InvalidField { field, .. }) if field == "gpus"));
    }

    #[test]
    fn test_incomplete_secret_is_rejected() {
        let result = parse(
            r#"
            container "api" {
                memory 128
                secret {
                    id "e6q"
                    key "token"
                }
                image { url "img"; }
            }
            "#,
        );
        assert!(
            matches!(result, Err(FlowError::InvalidField { field, .. }) if field == "secret.version_id")
        );
    }

    #[test]
    fn test_misspelt_log_option_is_rejected() {
        let result = parse(
            r#"
            container "api" {
                memory 128
                image { url "img"; }
                log_options {
                    log-group "e23group"
                }
            }
            "#,
        );
        assert!(
            matches!(result, Err(FlowError::InvalidField { field, .. }) if field == "log_options.log-group")
        );
    }

    #[test]
    fn test_connectivity_shorthand() {
        let (_, config) = parse(
            r#"
            container "api" {
                memory 128
                connectivity "enpnet"
                image { url "img"; }
            }
            "#,
        )
        .unwrap();

        assert_eq!(config.connectivity.unwrap().network_id, "enpnet");
    }
}

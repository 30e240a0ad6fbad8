//! JSON wire format of the REST API
//!
//! Field names are camelCase, int64 values travel as strings and durations
//! use the `"1.5s"` notation.

use chrono::{DateTime, Utc};
use containerflow_cloud::api::{
    Connectivity, Container, CreateContainerRequest, DeployRevisionRequest, ImageSpec,
    LogDestination, LogLevel, LogOptions, OperationMetadata, OperationResult, ProvisionPolicy,
    Resources, Revision, RevisionStatus, Secret, StorageMount, UpdateContainerRequest,
};
use containerflow_cloud::{Operation, Status, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// int64 as a JSON string; numbers are accepted on input
mod int64 {
    use serde::{Deserialize, Deserializer, Serializer, de};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u64),
    }

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(n),
            Raw::Text(s) => s.parse().map_err(de::Error::custom),
        }
    }

    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            value: &Option<u64>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(v) => super::serialize(v, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<u64>, D::Error> {
            #[derive(Deserialize)]
            struct Wrapped(#[serde(with = "super")] u64);

            Ok(Option::<Wrapped>::deserialize(deserializer)?.map(|Wrapped(v)| v))
        }
    }
}

/// Protobuf JSON duration: seconds with an optional fraction and an `s` suffix
mod duration {
    use serde::{Deserialize, Deserializer, Serializer, de};
    use std::time::Duration;

    pub fn format(value: &Duration) -> String {
        let nanos = value.subsec_nanos();
        if nanos == 0 {
            format!("{}s", value.as_secs())
        } else {
            let fraction = format!("{:09}", nanos);
            format!("{}.{}s", value.as_secs(), fraction.trim_end_matches('0'))
        }
    }

    pub fn parse(text: &str) -> Option<Duration> {
        let body = text.strip_suffix('s')?;
        let (secs, fraction) = match body.split_once('.') {
            Some((secs, fraction)) => (secs, fraction),
            None => (body, ""),
        };
        if fraction.len() > 9 || !fraction.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let secs: u64 = secs.parse().ok()?;
        let nanos = if fraction.is_empty() {
            0
        } else {
            format!("{:0<9}", fraction).parse().ok()?
        };
        Some(Duration::new(secs, nanos))
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(
            value: &Option<Duration>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(d) => serializer.serialize_str(&format(d)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Duration>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                Some(text) => parse(&text)
                    .map(Some)
                    .ok_or_else(|| de::Error::custom(format!("invalid duration {:?}", text))),
                None => Ok(None),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireContainer {
    pub id: String,
    pub folder_id: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub url: String,
}

impl From<WireContainer> for Container {
    fn from(c: WireContainer) -> Self {
        Container {
            id: c.id,
            folder_id: c.folder_id,
            created_at: c.created_at,
            name: c.name,
            description: c.description,
            labels: c.labels,
            url: c.url,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRevisionsResponse {
    #[serde(default)]
    pub revisions: Vec<WireRevision>,
    #[serde(default)]
    pub next_page_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireRevision {
    pub id: String,
    pub container_id: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: String,
    pub image: WireImage,
    pub resources: WireResources,
    #[serde(default, with = "duration::option")]
    pub execution_timeout: Option<Duration>,
    #[serde(default, with = "int64::option")]
    pub concurrency: Option<u64>,
    #[serde(default)]
    pub service_account_id: String,
    #[serde(default)]
    pub secrets: Vec<WireSecret>,
    #[serde(default)]
    pub connectivity: Option<WireConnectivity>,
    #[serde(default)]
    pub provision_policy: Option<WireProvisionPolicy>,
    #[serde(default)]
    pub log_options: Option<WireLogOptions>,
    #[serde(default)]
    pub storage_mounts: Vec<WireStorageMount>,
}

impl From<WireRevision> for Revision {
    fn from(r: WireRevision) -> Self {
        Revision {
            id: r.id,
            container_id: r.container_id,
            created_at: r.created_at,
            status: match r.status.as_str() {
                "CREATING" => RevisionStatus::Creating,
                "ACTIVE" => RevisionStatus::Active,
                "OBSOLETE" => RevisionStatus::Obsolete,
                _ => RevisionStatus::StatusUnspecified,
            },
            image: r.image.into(),
            resources: Resources {
                memory: r.resources.memory,
                cores: r.resources.cores,
                core_fraction: r.resources.core_fraction,
            },
            execution_timeout: r.execution_timeout,
            concurrency: r.concurrency.unwrap_or(0),
            service_account_id: r.service_account_id,
            secrets: r.secrets.into_iter().map(Into::into).collect(),
            connectivity: r.connectivity.map(|c| Connectivity {
                network_id: c.network_id,
            }),
            provision_policy: r.provision_policy.map(|p| ProvisionPolicy {
                min_instances: p.min_instances,
            }),
            log_options: r.log_options.map(Into::into),
            storage_mounts: r.storage_mounts.into_iter().map(Into::into).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Shared revision parts
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireImage {
    pub image_url: String,
    #[serde(default, skip_serializing)]
    pub image_digest: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<WireCommand>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<WireArgs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct WireCommand {
    #[serde(default)]
    pub command: Vec<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct WireArgs {
    #[serde(default)]
    pub args: Vec<String>,
}

impl From<WireImage> for ImageSpec {
    fn from(i: WireImage) -> Self {
        ImageSpec {
            image_url: i.image_url,
            image_digest: i.image_digest,
            working_dir: i.working_dir,
            command: i.command.map(|c| c.command),
            args: i.args.map(|a| a.args),
            environment: i.environment,
        }
    }
}

impl From<ImageSpec> for WireImage {
    fn from(i: ImageSpec) -> Self {
        WireImage {
            image_url: i.image_url,
            image_digest: None,
            command: i.command.map(|command| WireCommand { command }),
            args: i.args.map(|args| WireArgs { args }),
            environment: i.environment,
            working_dir: i.working_dir,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireResources {
    #[serde(with = "int64")]
    pub memory: u64,
    #[serde(default, with = "int64::option", skip_serializing_if = "Option::is_none")]
    pub cores: Option<u64>,
    #[serde(default, with = "int64::option", skip_serializing_if = "Option::is_none")]
    pub core_fraction: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireSecret {
    pub id: String,
    pub version_id: String,
    pub key: String,
    pub environment_variable: String,
}

impl From<WireSecret> for Secret {
    fn from(s: WireSecret) -> Self {
        Secret {
            id: s.id,
            version_id: s.version_id,
            key: s.key,
            environment_variable: s.environment_variable,
        }
    }
}

impl From<Secret> for WireSecret {
    fn from(s: Secret) -> Self {
        WireSecret {
            id: s.id,
            version_id: s.version_id,
            key: s.key,
            environment_variable: s.environment_variable,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireConnectivity {
    #[serde(default)]
    pub network_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireProvisionPolicy {
    #[serde(default, with = "int64")]
    pub min_instances: u64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireLogOptions {
    #[serde(default)]
    pub disabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_group_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_level: Option<String>,
}

impl From<WireLogOptions> for LogOptions {
    fn from(l: WireLogOptions) -> Self {
        let destination = match (l.log_group_id, l.folder_id) {
            (Some(id), _) if !id.is_empty() => Some(LogDestination::LogGroupId(id)),
            (_, Some(id)) if !id.is_empty() => Some(LogDestination::FolderId(id)),
            _ => None,
        };
        LogOptions {
            disabled: l.disabled,
            destination,
            min_level: l
                .min_level
                .as_deref()
                .and_then(LogLevel::from_name)
                .unwrap_or_default(),
        }
    }
}

impl From<LogOptions> for WireLogOptions {
    fn from(l: LogOptions) -> Self {
        let (log_group_id, folder_id) = match l.destination {
            Some(LogDestination::LogGroupId(id)) => (Some(id), None),
            Some(LogDestination::FolderId(id)) => (None, Some(id)),
            None => (None, None),
        };
        WireLogOptions {
            disabled: l.disabled,
            log_group_id,
            folder_id,
            min_level: (l.min_level != LogLevel::LevelUnspecified)
                .then(|| l.min_level.as_str().to_string()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireStorageMount {
    pub bucket_id: String,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub read_only: bool,
    pub mount_point_path: String,
}

impl From<WireStorageMount> for StorageMount {
    fn from(m: WireStorageMount) -> Self {
        StorageMount {
            bucket_id: m.bucket_id,
            prefix: m.prefix,
            read_only: m.read_only,
            mount_point_path: m.mount_point_path,
        }
    }
}

impl From<StorageMount> for WireStorageMount {
    fn from(m: StorageMount) -> Self {
        WireStorageMount {
            bucket_id: m.bucket_id,
            prefix: m.prefix,
            read_only: m.read_only,
            mount_point_path: m.mount_point_path,
        }
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateContainerBody {
    pub folder_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

impl From<CreateContainerRequest> for CreateContainerBody {
    fn from(r: CreateContainerRequest) -> Self {
        CreateContainerBody {
            folder_id: r.folder_id,
            name: r.name,
            description: r.description,
            labels: r.labels,
        }
    }
}

/// Body of the PATCH; `updateMask` is a comma separated field list
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateContainerBody {
    pub update_mask: String,
    pub name: String,
    pub description: String,
    pub labels: BTreeMap<String, String>,
}

impl From<UpdateContainerRequest> for UpdateContainerBody {
    fn from(r: UpdateContainerRequest) -> Self {
        UpdateContainerBody {
            update_mask: r.update_mask.join(","),
            name: r.name,
            description: r.description,
            labels: r.labels,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployRevisionBody {
    pub container_id: String,
    pub resources: WireResources,
    #[serde(
        with = "duration::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub execution_timeout: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_account_id: Option<String>,
    pub image_spec: WireImage,
    #[serde(with = "int64::option", skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub secrets: Vec<WireSecret>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connectivity: Option<WireConnectivity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provision_policy: Option<WireProvisionPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_options: Option<WireLogOptions>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub storage_mounts: Vec<WireStorageMount>,
}

impl From<DeployRevisionRequest> for DeployRevisionBody {
    fn from(r: DeployRevisionRequest) -> Self {
        DeployRevisionBody {
            container_id: r.container_id,
            resources: WireResources {
                memory: r.resources.memory,
                cores: r.resources.cores,
                core_fraction: r.resources.core_fraction,
            },
            execution_timeout: r.execution_timeout,
            service_account_id: r.service_account_id,
            image_spec: r.image_spec.into(),
            concurrency: r.concurrency,
            secrets: r.secrets.into_iter().map(Into::into).collect(),
            connectivity: r.connectivity.map(|c| WireConnectivity {
                network_id: c.network_id,
            }),
            provision_policy: r.provision_policy.map(|p| WireProvisionPolicy {
                min_instances: p.min_instances,
            }),
            log_options: r.log_options.map(Into::into),
            storage_mounts: r.storage_mounts.into_iter().map(Into::into).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Operations and errors
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct WireStatus {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

impl From<WireStatus> for Status {
    fn from(s: WireStatus) -> Self {
        Status::new(StatusCode::from_i32(s.code), s.message)
    }
}

#[derive(Debug, Deserialize)]
pub struct WireOperation {
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<WireStatus>,
}

impl From<WireOperation> for Operation {
    fn from(op: WireOperation) -> Self {
        let result = match (op.done, op.error) {
            (true, Some(error)) => Some(OperationResult::Failure(error.into())),
            (true, None) => Some(OperationResult::Success),
            (false, _) => None,
        };
        Operation {
            id: op.id,
            description: op.description,
            done: op.done,
            metadata: op.metadata.as_ref().map(parse_metadata),
            result,
        }
    }
}

/// Decode typed metadata by the suffix of its `@type` URL
fn parse_metadata(value: &serde_json::Value) -> OperationMetadata {
    let type_url = value
        .get("@type")
        .and_then(|t| t.as_str())
        .unwrap_or_default();
    let field = |name: &str| {
        value
            .get(name)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    };

    match type_url.rsplit('.').next().unwrap_or_default() {
        "CreateContainerMetadata" => OperationMetadata::CreateContainer {
            container_id: field("containerId"),
        },
        "UpdateContainerMetadata" => OperationMetadata::UpdateContainer {
            container_id: field("containerId"),
        },
        "DeleteContainerMetadata" => OperationMetadata::DeleteContainer {
            container_id: field("containerId"),
        },
        "DeployContainerRevisionMetadata" => OperationMetadata::DeployContainerRevision {
            container_revision_id: field("containerRevisionId"),
        },
        _ => OperationMetadata::Unknown {
            type_url: type_url.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_duration_notation() {
        assert_eq!(duration::format(&Duration::from_secs(3)), "3s");
        assert_eq!(duration::format(&Duration::from_millis(1500)), "1.5s");
        assert_eq!(duration::parse("90s"), Some(Duration::from_secs(90)));
        assert_eq!(duration::parse("0.250s"), Some(Duration::from_millis(250)));
        assert_eq!(duration::parse("3"), None);
        assert_eq!(duration::parse("1.x s"), None);
    }

    #[test]
    fn test_revision_decoding() {
        let revision: WireRevision = serde_json::from_value(json!({
            "id": "bbarev1",
            "containerId": "bba1",
            "createdAt": "2024-05-01T10:00:00Z",
            "status": "ACTIVE",
            "image": {
                "imageUrl": "cr.yandex/crp/api:1.0",
                "imageDigest": "sha256:abc",
                "command": { "command": ["/bin/server"] },
                "environment": { "A": "1" }
            },
            "resources": { "memory": "536870912", "cores": "1", "coreFraction": "100" },
            "executionTimeout": "3s",
            "concurrency": "4",
            "serviceAccountId": "ajesa",
            "logOptions": { "folderId": "b1glogs", "minLevel": "WARN" },
            "storageMounts": [
                { "bucketId": "assets", "readOnly": true, "mountPointPath": "/data" }
            ]
        }))
        .unwrap();

        let revision = Revision::from(revision);
        assert_eq!(revision.status, RevisionStatus::Active);
        assert_eq!(revision.resources.memory, 512 * 1024 * 1024);
        assert_eq!(revision.resources.cores, Some(1));
        assert_eq!(revision.execution_timeout, Some(Duration::from_secs(3)));
        assert_eq!(revision.concurrency, 4);
        assert_eq!(revision.image.command, Some(vec!["/bin/server".to_string()]));
        assert_eq!(revision.image.args, None);
        assert_eq!(revision.image.image_digest.as_deref(), Some("sha256:abc"));
        let log = revision.log_options.unwrap();
        assert_eq!(log.destination, Some(LogDestination::FolderId("b1glogs".to_string())));
        assert_eq!(log.min_level, LogLevel::Warn);
        assert_eq!(revision.storage_mounts[0].prefix, "");
    }

    #[test]
    fn test_deploy_body_encoding() {
        let request = DeployRevisionRequest {
            container_id: "bba1".to_string(),
            resources: Resources {
                memory: 1024 * 1024 * 1024,
                cores: None,
                core_fraction: Some(50),
            },
            execution_timeout: Some(Duration::from_secs(30)),
            image_spec: ImageSpec {
                image_url: "img".to_string(),
                command: Some(Vec::new()),
                ..Default::default()
            },
            concurrency: Some(8),
            log_options: Some(LogOptions {
                disabled: false,
                destination: Some(LogDestination::LogGroupId("e23".to_string())),
                min_level: LogLevel::LevelUnspecified,
            }),
            ..Default::default()
        };

        let body = serde_json::to_value(DeployRevisionBody::from(request)).unwrap();
        assert_eq!(body["resources"]["memory"], "1073741824");
        assert_eq!(body["resources"]["coreFraction"], "50");
        assert!(body["resources"].get("cores").is_none());
        assert_eq!(body["executionTimeout"], "30s");
        assert_eq!(body["concurrency"], "8");
        assert_eq!(body["imageSpec"]["command"], json!({ "command": [] }));
        assert!(body["imageSpec"].get("args").is_none());
        assert_eq!(body["logOptions"], json!({ "disabled": false, "logGroupId": "e23" }));
        assert!(body.get("secrets").is_none());
        assert!(body.get("serviceAccountId").is_none());
    }

    #[test]
    fn test_update_mask_is_joined() {
        let body = UpdateContainerBody::from(UpdateContainerRequest {
            container_id: "bba1".to_string(),
            update_mask: vec!["name".to_string(), "labels".to_string()],
            ..Default::default()
        });
        assert_eq!(body.update_mask, "name,labels");
    }

    #[test]
    fn test_operation_metadata() {
        let op: WireOperation = serde_json::from_value(json!({
            "id": "op1",
            "done": false,
            "metadata": {
                "@type": "type.googleapis.com/yandex.cloud.serverless.containers.v1.CreateContainerMetadata",
                "containerId": "bba1"
            }
        }))
        .unwrap();

        let op = Operation::from(op);
        assert_eq!(
            op.metadata,
            Some(OperationMetadata::CreateContainer {
                container_id: "bba1".to_string()
            })
        );
        assert_eq!(op.result, None);
    }

    #[test]
    fn test_failed_operation() {
        let op: WireOperation = serde_json::from_value(json!({
            "id": "op1",
            "done": true,
            "error": { "code": 5, "message": "container not found" }
        }))
        .unwrap();

        match Operation::from(op).result {
            Some(OperationResult::Failure(status)) => assert!(status.is_not_found()),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}

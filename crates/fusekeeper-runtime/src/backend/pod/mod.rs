//! Container-managed execution: the driver runs in a privileged helper pod
//! pinned to this node, with the target's parent directory shared back to
//! the host through bidirectional mount propagation.

pub mod api;

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fusekeeper_common::config::MounterConfig;
use fusekeeper_common::constants::{
    APP_NAME, CONTAINER_IMAGE_ENV, DRIVER_LOG_FILE, FUSE_DEVICE, FUSE_MOUNT_CAPABILITY, HELPER_POD_PREFIX,
    NODE_NAME_ENV,
};
use fusekeeper_common::error::{MountError, Result};
use fusekeeper_common::types::{MountMode, MountRequest, VolumeId};
use fusekeeper_core::readiness::ReadinessWaiter;
use k8s_openapi::api::core::v1::{
    Capabilities, Container, EnvVar, HostPathVolumeSource, Pod, PodSpec, SecurityContext, Volume,
    VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use sha2::{Digest, Sha256};

use self::api::{CreateOutcome, PodApi};
use super::{MountBackend, endpoint_flags};
use crate::plan::mount_tail;

const CONTAINER_NAME: &str = "mounter";
const STAGE_VOLUME: &str = "stage-dir";
const FUSE_VOLUME: &str = "fuse-device";
const VOLUME_ID_ANNOTATION: &str = "fusekeeper.io/volume-id";
const MAX_NAME_LEN: usize = 253;
const DIGEST_BYTES: usize = 4;

/// Name of the helper pod for a volume on a node, as a DNS-1123 subdomain.
///
/// Sanitizing is lossy (`a/b` and `a-b` read the same), so the name ends
/// with a short digest of the raw volume ID.
#[must_use]
pub fn helper_pod_name(volume_id: &VolumeId, node: &str) -> String {
    let raw = format!("{HELPER_POD_PREFIX}-{volume_id}-{node}");
    let mut name: String = raw
        .chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.' {
                c
            } else {
                '-'
            }
        })
        .collect();
    let digest = volume_digest(volume_id);
    name.truncate(MAX_NAME_LEN - digest.len() - 1);
    let stem = name.trim_matches(|c: char| !c.is_ascii_alphanumeric());
    format!("{stem}-{digest}")
}

/// First four bytes of the volume ID's SHA-256, as lowercase hex.
fn volume_digest(volume_id: &VolumeId) -> String {
    let hash = Sha256::digest(volume_id.as_str().as_bytes());
    hash.iter().take(DIGEST_BYTES).fold(String::new(), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}

fn labels() -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    let _ = labels.insert("app.kubernetes.io/name".to_string(), HELPER_POD_PREFIX.to_string());
    let _ = labels.insert("app.kubernetes.io/managed-by".to_string(), APP_NAME.to_string());
    labels
}

/// Launches the driver in a helper pod and waits for the mount.
pub struct PodBackend {
    api: Arc<dyn PodApi>,
    namespace: String,
    node_name: String,
    image: String,
    command: String,
    waiter: ReadinessWaiter,
    timeout: Duration,
}

impl PodBackend {
    /// Creates the backend. Node name and image are checked at mount time.
    #[must_use]
    pub fn new(config: &MounterConfig, api: Arc<dyn PodApi>, waiter: ReadinessWaiter) -> Self {
        Self {
            api,
            namespace: config.helper_namespace.clone(),
            node_name: config.node_name.clone(),
            image: config.helper_image.clone(),
            command: config.driver_source.to_string_lossy().into_owned(),
            waiter,
            timeout: config.pod_ready_timeout,
        }
    }

    fn require<'a>(value: &'a str, var: &str) -> Result<&'a str> {
        if value.is_empty() {
            return Err(MountError::Config {
                message: format!("{var} must be set for helper pod mounts"),
            });
        }
        Ok(value)
    }

    /// Builds the helper pod manifest for a request.
    ///
    /// `args` must end with the mount target.
    #[must_use]
    pub fn helper_pod(&self, name: &str, request: &MountRequest, args: &[String]) -> Pod {
        let stage_dir = request
            .target
            .parent()
            .unwrap_or_else(|| Path::new("/"))
            .to_string_lossy()
            .into_owned();

        let mut container_args = endpoint_flags(&request.endpoint).to_vec();
        container_args.extend(["--log-file".to_string(), DRIVER_LOG_FILE.to_string(), "-f".to_string()]);
        container_args.extend_from_slice(args);

        let env = request
            .credentials
            .env_pairs()
            .into_iter()
            .map(|(name, value)| EnvVar {
                name,
                value: Some(value),
                ..Default::default()
            })
            .collect();

        let mut annotations = BTreeMap::new();
        let _ = annotations.insert(VOLUME_ID_ANNOTATION.to_string(), request.volume_id.to_string());

        Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(self.namespace.clone()),
                labels: Some(labels()),
                annotations: Some(annotations),
                ..Default::default()
            },
            spec: Some(PodSpec {
                node_name: Some(self.node_name.clone()),
                restart_policy: Some("Never".to_string()),
                containers: vec![Container {
                    name: CONTAINER_NAME.to_string(),
                    image: Some(self.image.clone()),
                    command: Some(vec![self.command.clone()]),
                    args: Some(container_args),
                    env: Some(env),
                    volume_mounts: Some(vec![
                        VolumeMount {
                            name: STAGE_VOLUME.to_string(),
                            mount_path: stage_dir.clone(),
                            mount_propagation: Some("Bidirectional".to_string()),
                            ..Default::default()
                        },
                        VolumeMount {
                            name: FUSE_VOLUME.to_string(),
                            mount_path: FUSE_DEVICE.to_string(),
                            ..Default::default()
                        },
                    ]),
                    security_context: Some(SecurityContext {
                        privileged: Some(true),
                        capabilities: Some(Capabilities {
                            add: Some(vec![FUSE_MOUNT_CAPABILITY.to_string()]),
                            ..Default::default()
                        }),
                        ..Default::default()
                    }),
                    ..Default::default()
                }],
                volumes: Some(vec![
                    Volume {
                        name: STAGE_VOLUME.to_string(),
                        host_path: Some(HostPathVolumeSource {
                            path: stage_dir,
                            type_: Some("Directory".to_string()),
                        }),
                        ..Default::default()
                    },
                    Volume {
                        name: FUSE_VOLUME.to_string(),
                        host_path: Some(HostPathVolumeSource {
                            path: FUSE_DEVICE.to_string(),
                            type_: None,
                        }),
                        ..Default::default()
                    },
                ]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Extracts the mount target an existing helper pod was created with.
    ///
    /// # Errors
    ///
    /// Returns [`MountError::MalformedState`] unless the `mounter`
    /// container's arguments end with a remote path and an absolute target.
    pub fn recorded_target(pod: &Pod) -> Result<PathBuf> {
        let name = pod.metadata.name.clone().unwrap_or_default();
        pod.spec
            .as_ref()
            .and_then(|spec| spec.containers.iter().find(|c| c.name == CONTAINER_NAME))
            .and_then(|c| c.args.as_deref())
            .and_then(mount_tail)
            .map(|(_, target)| target.to_path_buf())
            .ok_or_else(|| MountError::MalformedState {
                resource: name,
                message: "mounter container arguments do not end with <remote> <target>".to_string(),
            })
    }

    /// Decides what to do with a pod that already holds our name.
    ///
    /// A pod annotated with a different volume ID is never touched.
    ///
    /// Returns `Ok(true)` if the existing pod serves the request and
    /// `Ok(false)` if it was removed and a new one should be created.
    async fn inspect_existing(&self, name: &str, request: &MountRequest) -> Result<bool> {
        let Some(existing) = self.api.get_pod(&self.namespace, name).await? else {
            return Ok(false);
        };
        if existing.metadata.deletion_timestamp.is_some() {
            return Err(MountError::Launch {
                resource: name.to_string(),
                message: "previous helper pod is still terminating".to_string(),
            });
        }

        let owner = existing
            .metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(VOLUME_ID_ANNOTATION))
            .ok_or_else(|| MountError::MalformedState {
                resource: name.to_string(),
                message: format!("missing {VOLUME_ID_ANNOTATION} annotation"),
            })?;
        if owner != request.volume_id.as_str() {
            return Err(MountError::NameCollision {
                resource: name.to_string(),
                volume_id: request.volume_id.to_string(),
                owner: owner.clone(),
            });
        }

        let phase = existing.status.as_ref().and_then(|s| s.phase.as_deref());
        match phase {
            None | Some("Pending" | "Running") => {
                let recorded = Self::recorded_target(&existing)?;
                if recorded == request.target {
                    tracing::info!(pod = name, phase = ?phase, "helper pod already running");
                    return Ok(true);
                }
                Err(MountError::Conflict {
                    volume_id: request.volume_id.to_string(),
                    requested: request.target.clone(),
                    existing: recorded,
                })
            }
            Some(terminal) => {
                tracing::info!(pod = name, phase = terminal, "removing finished helper pod");
                self.api.delete_pod(&self.namespace, name).await?;
                Ok(false)
            }
        }
    }
}

impl std::fmt::Debug for PodBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PodBackend")
            .field("namespace", &self.namespace)
            .field("node_name", &self.node_name)
            .field("image", &self.image)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl MountBackend for PodBackend {
    fn mode(&self) -> MountMode {
        MountMode::ContainerManaged
    }

    async fn mount(&self, request: &MountRequest, args: &[String]) -> Result<()> {
        let node = Self::require(&self.node_name, NODE_NAME_ENV)?;
        let _ = Self::require(&self.image, CONTAINER_IMAGE_ENV)?;

        let name = helper_pod_name(&request.volume_id, node);
        let pod = self.helper_pod(&name, request, args);

        if self.api.create_pod(&self.namespace, &pod).await? == CreateOutcome::AlreadyExists
            && !self.inspect_existing(&name, request).await?
            && self.api.create_pod(&self.namespace, &pod).await? == CreateOutcome::AlreadyExists
        {
            return Err(MountError::Launch {
                resource: name,
                message: "helper pod name is still taken after removing the old pod".to_string(),
            });
        }
        tracing::info!(pod = %name, node, volume = %request.volume_id, "waiting for helper pod mount");

        self.waiter.wait(&request.target, self.timeout).await
    }
}

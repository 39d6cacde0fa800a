//! Domain primitive types used across the fusekeeper workspace.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, MountError};

/// Identifier of the volume being mounted, as assigned by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VolumeId(String);

impl VolumeId {
    /// Creates a new volume ID from a string value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VolumeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bucket and key prefix addressed by the driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemotePath {
    /// Bucket name.
    pub bucket: String,
    /// Key prefix inside the bucket; may be empty.
    pub prefix: String,
}

impl RemotePath {
    /// Creates a remote path from its bucket and prefix.
    #[must_use]
    pub fn new(bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: prefix.into(),
        }
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.bucket, self.prefix)
    }
}

/// Object storage credentials.
///
/// Only ever handed to the driver through environment entries.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Access key id.
    pub access_key_id: String,
    /// Secret access key.
    pub secret_access_key: String,
}

impl Credentials {
    /// Creates a credential pair.
    #[must_use]
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
        }
    }

    /// Returns the credentials as `(name, value)` environment pairs.
    #[must_use]
    pub fn env_pairs(&self) -> Vec<(String, String)> {
        vec![
            (
                crate::constants::ACCESS_KEY_ENV.to_string(),
                self.access_key_id.clone(),
            ),
            (
                crate::constants::SECRET_KEY_ENV.to_string(),
                self.secret_access_key.clone(),
            ),
        ]
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &"<redacted>")
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// A single request to mount a remote filesystem at a local target.
#[derive(Debug, Clone)]
pub struct MountRequest {
    /// Remote `<bucket>:<prefix>` to mount.
    pub remote: RemotePath,
    /// Local directory the filesystem becomes visible at.
    pub target: PathBuf,
    /// Volume identity, used to derive supervisor names.
    pub volume_id: VolumeId,
    /// Object storage endpoint URL.
    pub endpoint: String,
    /// Storage region; empty means the driver default.
    pub region: String,
    /// Credentials for the endpoint.
    pub credentials: Credentials,
    /// Raw mount option tokens, in order.
    pub options: Vec<String>,
}

/// How the driver process is launched and supervised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MountMode {
    /// Foreground child of the current process.
    Direct,
    /// Transient systemd unit on the host.
    ServiceManaged,
    /// Privileged helper pod on the local node.
    ContainerManaged,
}

impl fmt::Display for MountMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => write!(f, "direct"),
            Self::ServiceManaged => write!(f, "service-managed"),
            Self::ContainerManaged => write!(f, "container-managed"),
        }
    }
}

/// Serializable summary of a mount call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountOutcome {
    /// Whether the target is mounted.
    pub succeeded: bool,
    /// Classification of the failure, if any.
    pub error_kind: Option<ErrorKind>,
    /// Human-readable failure detail, if any.
    pub error_detail: Option<String>,
}

impl MountOutcome {
    /// Outcome of a successful mount.
    #[must_use]
    pub const fn success() -> Self {
        Self {
            succeeded: true,
            error_kind: None,
            error_detail: None,
        }
    }

    /// Outcome of a failed mount.
    #[must_use]
    pub fn failure(err: &MountError) -> Self {
        Self {
            succeeded: false,
            error_kind: Some(err.kind()),
            error_detail: Some(err.to_string()),
        }
    }
}

impl From<&crate::error::Result<()>> for MountOutcome {
    fn from(result: &crate::error::Result<()>) -> Self {
        match result {
            Ok(()) => Self::success(),
            Err(e) => Self::failure(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_path_formats_bucket_and_prefix() {
        assert_eq!(RemotePath::new("mybucket", "data").to_string(), "mybucket:data");
        assert_eq!(RemotePath::new("mybucket", "").to_string(), "mybucket:");
    }

    #[test]
    fn credentials_debug_is_redacted() {
        let creds = Credentials::new("AKIA123", "s3cr3t");
        let dbg = format!("{creds:?}");
        assert!(!dbg.contains("AKIA123"));
        assert!(!dbg.contains("s3cr3t"));
    }

    #[test]
    fn credentials_env_pairs_use_aws_names() {
        let pairs = Credentials::new("id", "secret").env_pairs();
        assert_eq!(
            pairs,
            vec![
                ("AWS_ACCESS_KEY_ID".to_string(), "id".to_string()),
                ("AWS_SECRET_ACCESS_KEY".to_string(), "secret".to_string()),
            ]
        );
    }

    #[test]
    fn outcome_from_error_carries_kind() {
        let result: crate::error::Result<()> = Err(MountError::Config {
            message: "MY_NODE_NAME is not set".into(),
        });
        let outcome = MountOutcome::from(&result);
        assert!(!outcome.succeeded);
        assert_eq!(outcome.error_kind, Some(ErrorKind::Config));
        assert!(outcome.error_detail.unwrap().contains("MY_NODE_NAME"));
    }

    #[test]
    fn mount_mode_display() {
        assert_eq!(MountMode::ContainerManaged.to_string(), "container-managed");
        assert_eq!(MountMode::ServiceManaged.to_string(), "service-managed");
        assert_eq!(MountMode::Direct.to_string(), "direct");
    }
}

//! The slice of the Kubernetes pod API the helper launcher uses.

use async_trait::async_trait;
use fusekeeper_common::error::{MountError, Result};
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, DeleteParams, PostParams};
use kube::{Client, Config};
use tokio::sync::OnceCell;

const SERVICE: &str = "kubernetes";

/// Result of a conditional create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    /// The pod did not exist and has been created.
    Created,
    /// A pod with the same name already exists; nothing was changed.
    AlreadyExists,
}

/// Pod operations keyed by namespace and name.
#[async_trait]
pub trait PodApi: Send + Sync {
    /// Creates `pod` unless one with the same name exists.
    ///
    /// # Errors
    ///
    /// Returns [`MountError::Launch`] if the API server rejects the pod and
    /// [`MountError::Connectivity`] if it cannot be reached.
    async fn create_pod(&self, namespace: &str, pod: &Pod) -> Result<CreateOutcome>;

    /// Fetches a pod, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the API server cannot be queried.
    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>>;

    /// Deletes a pod immediately. A pod that is already gone is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the API server refuses the deletion.
    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<()>;
}

/// [`PodApi`] backed by a `kube` client.
///
/// The client is built on first use from the in-cluster service account
/// and shared by every later call.
#[derive(Default)]
pub struct KubePodApi {
    client: OnceCell<Client>,
}

impl KubePodApi {
    /// Creates an API handle that connects lazily with in-cluster credentials.
    #[must_use]
    pub fn in_cluster() -> Self {
        Self::default()
    }

    /// Creates an API handle around an existing client.
    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self {
            client: OnceCell::new_with(Some(client)),
        }
    }

    async fn pods(&self, namespace: &str) -> Result<Api<Pod>> {
        let client = self
            .client
            .get_or_try_init(|| async {
                let config = Config::incluster().map_err(|e| MountError::Connectivity {
                    service: SERVICE,
                    message: e.to_string(),
                })?;
                tracing::debug!(cluster = %config.cluster_url, "building kubernetes client");
                Client::try_from(config).map_err(|e| MountError::Connectivity {
                    service: SERVICE,
                    message: e.to_string(),
                })
            })
            .await?;
        Ok(Api::namespaced(client.clone(), namespace))
    }
}

impl std::fmt::Debug for KubePodApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubePodApi")
            .field("connected", &self.client.initialized())
            .finish()
    }
}

/// API status code carried by a `kube` error, if any.
fn status_code(err: &kube::Error) -> Option<u16> {
    match err {
        kube::Error::Api(response) => Some(response.code),
        _ => None,
    }
}

fn classify(resource: &str, err: kube::Error) -> MountError {
    match err {
        kube::Error::Api(response) => MountError::Launch {
            resource: resource.to_string(),
            message: format!("{} ({})", response.message, response.code),
        },
        other => MountError::Connectivity {
            service: SERVICE,
            message: other.to_string(),
        },
    }
}

#[async_trait]
impl PodApi for KubePodApi {
    async fn create_pod(&self, namespace: &str, pod: &Pod) -> Result<CreateOutcome> {
        let name = pod.metadata.name.clone().unwrap_or_default();
        match self.pods(namespace).await?.create(&PostParams::default(), pod).await {
            Ok(_) => Ok(CreateOutcome::Created),
            Err(e) if status_code(&e) == Some(409) => Ok(CreateOutcome::AlreadyExists),
            Err(e) => Err(classify(&name, e)),
        }
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>> {
        self.pods(namespace)
            .await?
            .get_opt(name)
            .await
            .map_err(|e| classify(name, e))
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<()> {
        let params = DeleteParams::default().grace_period(0);
        match self.pods(namespace).await?.delete(name, &params).await {
            Ok(_) => Ok(()),
            Err(e) if status_code(&e) == Some(404) => Ok(()),
            Err(e) => Err(classify(name, e)),
        }
    }
}

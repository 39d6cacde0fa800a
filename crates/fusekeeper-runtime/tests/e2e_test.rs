//! End-to-end tests for the mounter.
//!
//! Each test drives [`Mounter::mount`] through one execution path with a
//! real [`ProcMountProbe`] reading a scratch mountinfo file. The fake
//! supervisors "attach" the filesystem by appending the target to that file.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use fusekeeper_common::config::MounterConfig;
use fusekeeper_common::error::{ErrorKind, MountError, Result};
use fusekeeper_common::types::{Credentials, MountRequest, RemotePath, VolumeId};
use fusekeeper_core::filesystem::mountpoint::ProcMountProbe;
use fusekeeper_core::readiness::ReadinessWaiter;
use fusekeeper_runtime::backend::pod::api::{CreateOutcome, PodApi};
use fusekeeper_runtime::backend::systemd::bus::{
    ActiveState, BusConnector, TransientUnit, UnitBus, UnitProperties,
};
use fusekeeper_runtime::engine::Mounter;
use fusekeeper_runtime::plan::mount_tail;
use k8s_openapi::api::core::v1::Pod;

fn attach(mountinfo: &Path, target: &Path) {
    let mut f = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(mountinfo)
        .unwrap();
    writeln!(
        f,
        "120 22 0:60 / {} rw,nosuid,nodev shared:70 - fuse.geesefs mybucket:data rw",
        target.display()
    )
    .unwrap();
}

struct Node {
    dir: tempfile::TempDir,
    config: MounterConfig,
}

impl Node {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let driver = dir.path().join("geesefs");
        std::fs::write(&driver, b"#!/bin/sh\n").unwrap();
        std::fs::create_dir(dir.path().join("plugin")).unwrap();
        std::fs::create_dir(dir.path().join("target")).unwrap();
        let config = MounterConfig {
            driver_source: driver,
            driver_host_copy: dir.path().join("plugin").join("geesefs"),
            plugin_dir: dir.path().join("plugin"),
            node_name: "node-a".into(),
            helper_image: "csi-s3:1.0".into(),
            ..MounterConfig::default()
        };
        Self { dir, config }
    }

    fn mountinfo(&self) -> PathBuf {
        self.dir.path().join("mountinfo")
    }

    fn target(&self) -> PathBuf {
        self.dir.path().join("target")
    }

    fn waiter(&self) -> ReadinessWaiter {
        ReadinessWaiter::new(
            Arc::new(ProcMountProbe::with_mountinfo(self.mountinfo())),
            Duration::from_millis(10),
        )
    }

    fn request(&self, options: &[&str]) -> MountRequest {
        MountRequest {
            remote: RemotePath::new("mybucket", "data"),
            target: self.target(),
            volume_id: VolumeId::new("pvc-0a1b"),
            endpoint: "https://storage.example.net".into(),
            region: "ru-central1".into(),
            credentials: Credentials::new("AKID", "s3cr3t"),
            options: options.iter().map(ToString::to_string).collect(),
        }
    }
}

// ── Fakes ────────────────────────────────────────────────────────────

#[derive(Clone)]
struct HostSystemd {
    mountinfo: PathBuf,
    units: Arc<Mutex<Vec<TransientUnit>>>,
}

#[async_trait]
impl UnitBus for HostSystemd {
    async fn unit_properties(&self, name: &str) -> Result<Option<UnitProperties>> {
        Ok(self
            .units
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.name == name)
            .map(|u| UnitProperties {
                active_state: ActiveState::Active,
                exec_start: vec![u.exec.clone()],
            }))
    }

    async fn start_transient_unit(&self, unit: &TransientUnit) -> Result<()> {
        let (_, target) = mount_tail(&unit.exec.argv).expect("unit argv ends with target");
        attach(&self.mountinfo, target);
        self.units.lock().unwrap().push(unit.clone());
        Ok(())
    }

    async fn stop_unit(&self, _name: &str) -> Result<()> {
        Ok(())
    }

    async fn reset_failed_unit(&self, _name: &str) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl BusConnector for HostSystemd {
    async fn connect(&self) -> Result<Box<dyn UnitBus>> {
        Ok(Box::new(self.clone()))
    }
}

struct Cluster {
    mountinfo: PathBuf,
    pods: Mutex<Vec<Pod>>,
}

#[async_trait]
impl PodApi for Cluster {
    async fn create_pod(&self, _namespace: &str, pod: &Pod) -> Result<CreateOutcome> {
        let mut pods = self.pods.lock().unwrap();
        if pods.iter().any(|p| p.metadata.name == pod.metadata.name) {
            return Ok(CreateOutcome::AlreadyExists);
        }
        let args = pod.spec.as_ref().unwrap().containers[0].args.clone().unwrap();
        let (_, target) = mount_tail(&args).expect("pod args end with target");
        attach(&self.mountinfo, target);
        pods.push(pod.clone());
        Ok(CreateOutcome::Created)
    }

    async fn get_pod(&self, _namespace: &str, name: &str) -> Result<Option<Pod>> {
        Ok(self
            .pods
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.metadata.name.as_deref() == Some(name))
            .cloned())
    }

    async fn delete_pod(&self, _namespace: &str, name: &str) -> Result<()> {
        self.pods
            .lock()
            .unwrap()
            .retain(|p| p.metadata.name.as_deref() != Some(name));
        Ok(())
    }
}

struct Offline;

#[async_trait]
impl PodApi for Offline {
    async fn create_pod(&self, _namespace: &str, _pod: &Pod) -> Result<CreateOutcome> {
        Err(MountError::Connectivity {
            service: "kubernetes",
            message: "connection refused".into(),
        })
    }

    async fn get_pod(&self, _namespace: &str, _name: &str) -> Result<Option<Pod>> {
        Ok(None)
    }

    async fn delete_pod(&self, _namespace: &str, _name: &str) -> Result<()> {
        Ok(())
    }
}

fn host(node: &Node) -> HostSystemd {
    HostSystemd {
        mountinfo: node.mountinfo(),
        units: Arc::default(),
    }
}

fn cluster(node: &Node) -> Arc<Cluster> {
    Arc::new(Cluster {
        mountinfo: node.mountinfo(),
        pods: Mutex::default(),
    })
}

// ── Service-managed path ─────────────────────────────────────────────

#[tokio::test]
async fn systemd_mount_installs_driver_and_starts_unit() {
    let node = Node::new();
    let systemd = host(&node);
    let mounter = Mounter::new(&node.config, Arc::new(systemd.clone()), cluster(&node), node.waiter());

    mounter
        .mount(&node.request(&["--use-systemd", "--memory-limit", "1000"]))
        .await
        .expect("systemd mount");

    assert!(node.config.driver_host_copy.exists());
    let units = systemd.units.lock().unwrap();
    assert_eq!(units.len(), 1);
    assert_eq!(units[0].name, "geesefs-pvc_2d0a1b.service");
    assert_eq!(units[0].exec.path, node.config.host_driver_path().to_string_lossy());
    let argv = &units[0].exec.argv;
    assert!(argv.windows(2).any(|w| w == ["--region", "ru-central1"]));
    assert!(argv.windows(2).any(|w| w == ["--memory-limit", "1000"]));
    assert!(!argv.iter().any(|a| a.contains("use-systemd") || a.contains("s3cr3t")));
}

#[tokio::test]
async fn systemd_mount_is_idempotent_and_detects_conflicts() {
    let node = Node::new();
    let systemd = host(&node);
    let mounter = Mounter::new(&node.config, Arc::new(systemd.clone()), cluster(&node), node.waiter());
    let request = node.request(&["use-systemd"]);

    mounter.mount(&request).await.expect("first mount");
    mounter.mount(&request).await.expect("second mount is a no-op");
    assert_eq!(systemd.units.lock().unwrap().len(), 1);

    let mut elsewhere = request.clone();
    elsewhere.target = node.dir.path().join("other");
    let err = mounter.mount(&elsewhere).await.expect_err("conflict");
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(systemd.units.lock().unwrap().len(), 1);
}

// ── Container-managed path ───────────────────────────────────────────

#[tokio::test]
async fn pod_mount_creates_node_pinned_helper() {
    let node = Node::new();
    let pods = cluster(&node);
    let mounter = Mounter::new(&node.config, Arc::new(host(&node)), pods.clone(), node.waiter());

    mounter
        .mount(&node.request(&["-o", "ro"]))
        .await
        .expect("pod mount");

    let created = pods.pods.lock().unwrap();
    assert_eq!(created.len(), 1);
    let pod = &created[0];
    let name = pod.metadata.name.as_deref().unwrap();
    assert!(name.starts_with("geesefs-mount-pvc-0a1b-node-a-"), "{name}");
    let spec = pod.spec.as_ref().unwrap();
    assert_eq!(spec.node_name.as_deref(), Some("node-a"));
    let args = spec.containers[0].args.as_deref().unwrap();
    let target = node.target().to_string_lossy().into_owned();
    assert!(args.ends_with(&["-o".to_string(), "ro".to_string(), "mybucket:data".to_string(), target]));
}

#[tokio::test]
async fn pod_mount_reuses_running_helper() {
    let node = Node::new();
    let pods = cluster(&node);
    let mounter = Mounter::new(&node.config, Arc::new(host(&node)), pods.clone(), node.waiter());
    let request = node.request(&[]);

    mounter.mount(&request).await.expect("first");
    mounter.mount(&request).await.expect("second");
    assert_eq!(pods.pods.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn volumes_with_lookalike_ids_get_separate_helpers() {
    let node = Node::new();
    let pods = cluster(&node);
    let mounter = Mounter::new(&node.config, Arc::new(host(&node)), pods.clone(), node.waiter());
    let other = node.dir.path().join("other");
    std::fs::create_dir(&other).unwrap();

    let mut first = node.request(&[]);
    first.volume_id = VolumeId::new("bucket/data");
    let mut second = node.request(&[]);
    second.volume_id = VolumeId::new("bucket-data");
    second.target = other;

    mounter.mount(&first).await.expect("first volume");
    mounter.mount(&second).await.expect("second volume");

    let created = pods.pods.lock().unwrap();
    assert_eq!(created.len(), 2);
    assert_ne!(created[0].metadata.name, created[1].metadata.name);
}

#[tokio::test]
async fn unreachable_cluster_is_reported_as_connectivity() {
    let node = Node::new();
    let mounter = Mounter::new(&node.config, Arc::new(host(&node)), Arc::new(Offline), node.waiter());
    let outcome = mounter.mount_outcome(&node.request(&[])).await;
    assert!(!outcome.succeeded);
    assert_eq!(outcome.error_kind, Some(ErrorKind::Connectivity));
}

// ── Direct path ──────────────────────────────────────────────────────

#[tokio::test]
async fn direct_mount_runs_driver_with_credentials() {
    use std::os::unix::fs::PermissionsExt;

    let mut node = Node::new();
    let script = node.dir.path().join("fake-geesefs");
    let mountinfo = node.mountinfo();
    std::fs::write(
        &script,
        format!(
            "#!/bin/sh\n\
             test \"$AWS_ACCESS_KEY_ID\" = AKID || exit 3\n\
             for last; do :; done\n\
             echo \"120 22 0:60 / $last rw - fuse.geesefs mybucket:data rw\" >> {}\n",
            mountinfo.display()
        ),
    )
    .unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
    node.config.driver_command = script.to_string_lossy().into_owned();

    let mounter = Mounter::new(&node.config, Arc::new(host(&node)), cluster(&node), node.waiter());
    mounter
        .mount(&node.request(&["--use-exec"]))
        .await
        .expect("direct mount");
    assert!(std::fs::read_to_string(mountinfo).unwrap().contains("/target "));
}

// ── Readiness ────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn launch_without_attach_times_out() {
    struct Silent;

    #[async_trait]
    impl UnitBus for Silent {
        async fn unit_properties(&self, _name: &str) -> Result<Option<UnitProperties>> {
            Ok(None)
        }
        async fn start_transient_unit(&self, _unit: &TransientUnit) -> Result<()> {
            Ok(())
        }
        async fn stop_unit(&self, _name: &str) -> Result<()> {
            Ok(())
        }
        async fn reset_failed_unit(&self, _name: &str) -> Result<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl BusConnector for Silent {
        async fn connect(&self) -> Result<Box<dyn UnitBus>> {
            Ok(Box::new(Silent))
        }
    }

    let node = Node::new();
    let mounter = Mounter::new(&node.config, Arc::new(Silent), cluster(&node), node.waiter());
    let err = mounter
        .mount(&node.request(&["--use-systemd"]))
        .await
        .expect_err("never attached");
    assert_eq!(err.kind(), ErrorKind::ReadinessTimeout);
    assert!(matches!(
        err,
        MountError::ReadinessTimeout { timeout, .. } if timeout == Duration::from_secs(10)
    ));
}


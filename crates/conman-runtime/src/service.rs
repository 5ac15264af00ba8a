//! Orchestrator-facing container lifecycle service.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use conman_common::config::RuntimeConfig;
use conman_common::error::{ConmanError, Result, ResultExt};
use conman_common::types::{ContainerId, Status};

use crate::api::{ContainerStats, ContainerSummary, CreateContainerRequest, CriState};
use crate::backoff::Backoff;
use crate::getter::{ContainerGetter, RuntimeGetter};
use crate::handle::Handle;
use crate::oci::OciRuntime;
use crate::oci::runc::RuncRuntime;
use crate::oci::spec::{RuntimeSpec, SpecOptions};
use crate::saga::{Compensation, CreateSaga};
use crate::store::{InMemStore, Store};

/// Drives containers through `created -> running`.
pub struct RuntimeService {
    config: RuntimeConfig,
    runtime: Arc<dyn OciRuntime>,
    store: Arc<dyn Store>,
    getter: Arc<dyn ContainerGetter>,
}

impl RuntimeService {
    /// Creates a service backed by the configured runc-style runtime.
    pub fn new(config: RuntimeConfig) -> Self {
        let runtime = Arc::new(RuncRuntime::from_config(&config));
        Self::with_runtime(config, runtime)
    }

    /// Creates a service over an arbitrary OCI runtime with an empty
    /// in-memory registry.
    pub fn with_runtime(config: RuntimeConfig, runtime: Arc<dyn OciRuntime>) -> Self {
        let store: Arc<dyn Store> = Arc::new(InMemStore::new());
        let getter = Arc::new(RuntimeGetter::new(Arc::clone(&store), Arc::clone(&runtime)));
        Self {
            config,
            runtime,
            store,
            getter,
        }
    }

    /// Configuration the service was built with.
    pub const fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Registry of known containers.
    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    /// Registers every container left on disk by a previous process.
    ///
    /// Directories without a recorded status are skipped, as are
    /// directories whose status cannot be read (logged at `warn`).
    ///
    /// # Errors
    ///
    /// Returns `Io` if the containers directory exists but cannot be
    /// listed.
    pub fn recover(&self) -> Result<usize> {
        let dir = self.config.containers_dir();
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(ConmanError::io(dir, e)),
        };

        let mut recovered = 0;
        for entry in entries {
            let entry = entry.map_err(|e| ConmanError::io(&dir, e))?;
            if !entry.file_type().is_ok_and(|t| t.is_dir()) {
                continue;
            }
            let id = ContainerId::new(entry.file_name().to_string_lossy());
            let handle = Handle::open(id, &self.config);
            match handle.status() {
                Ok(Status::Initial) => {
                    tracing::debug!(id = %handle.id(), "skipping container without status");
                }
                Ok(_) => {
                    self.store.put(Arc::new(handle))?;
                    recovered += 1;
                }
                Err(e) => {
                    tracing::warn!(id = %handle.id(), error = %e, "skipping unreadable container");
                }
            }
        }
        tracing::debug!(recovered, "registry recovered from disk");
        Ok(recovered)
    }

    /// Creates a container and returns its identifier.
    ///
    /// Every completed step is rolled back if a later one fails.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for an empty command, `Io` for layout or
    /// bundle failures, and the runtime's error if the launcher handshake
    /// fails.
    pub fn create_container(&self, req: CreateContainerRequest) -> Result<ContainerId> {
        for dir in [
            &self.config.log_dir,
            &self.config.exit_dir,
            &self.config.attach_dir,
        ] {
            conman_core::fs::create_dir_all(dir, 0o755).context("cannot prepare runtime dirs")?;
        }

        let handle = Arc::new(Handle::allocate(&self.config)?);
        let mut saga = CreateSaga::begin(
            Arc::clone(&handle),
            Arc::clone(&self.runtime),
            Arc::clone(&self.store),
        );

        let spec = RuntimeSpec::generate(SpecOptions {
            command: req.command,
            args: req.args,
            root_path: handle.rootfs_dir(),
            root_readonly: req.read_only,
        })?
        .to_bytes()?;
        let rootfs = req
            .root_path
            .unwrap_or_else(|| self.config.rootfs_source.clone());
        handle.bundle(&spec, &rootfs)?;

        // A failed handshake may still leave a container behind in the
        // runtime, so its removal is owed from the moment of the launch.
        saga.completed(Compensation::DeleteContainer);
        let instance = self
            .runtime
            .create_container(
                &handle,
                req.stdin,
                req.stdin_once,
                self.config.create_timeout,
            )
            .context("cannot create container")?;

        handle.created()?;
        self.store.put(Arc::clone(&handle))?;
        saga.completed(Compensation::Deregister);

        tracing::info!(id = %handle.id(), pid = instance.pid, "container created");
        Ok(saga.commit())
    }

    /// Starts a created container and waits until the runtime reports it
    /// running.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id, `InvalidState` if the
    /// container is not `created` (before starting) or reaches a status
    /// other than `created`/`running` (while polling), and `Timeout` if
    /// it is not running within the configured start budget.
    pub fn start_container(&self, id: &ContainerId) -> Result<()> {
        let handle = self.store.get(id)?;
        let recorded = handle.status()?;
        if recorded != Status::Created {
            return Err(invalid_state(id, recorded));
        }
        let (instance, handle) = self.getter.get(id)?;
        if !instance.can_start() {
            return Err(invalid_state(id, instance.status));
        }

        self.runtime
            .start_container(&handle)
            .context("cannot start container")?;
        handle
            .started()
            .context("cannot update status to started")?;

        let started = Instant::now();
        let mut backoff = Backoff::new(self.config.start_policy);
        let timed_out = |backoff: &Backoff| ConmanError::Timeout {
            operation: format!("waiting for container {id} to run"),
            after: backoff.waited(),
        };
        loop {
            let Some(delay) = backoff.next_delay() else {
                return Err(timed_out(&backoff));
            };
            std::thread::sleep(delay);
            if backoff.expired() {
                return Err(timed_out(&backoff));
            }
            let (instance, _) = self.getter.get(id)?;
            match instance.status {
                Status::Running => break,
                Status::Created => {
                    tracing::debug!(id = %id, ?delay, "container not running yet");
                }
                other => return Err(invalid_state(id, other)),
            }
        }
        tracing::info!(id = %id, elapsed = ?started.elapsed(), "container started");
        Ok(())
    }

    /// Stops a running container.
    ///
    /// # Errors
    ///
    /// Always returns `NotImplemented`.
    pub const fn stop_container(&self, _id: &ContainerId) -> Result<()> {
        Err(ConmanError::NotImplemented {
            operation: "StopContainer",
        })
    }

    /// Removes a container.
    ///
    /// # Errors
    ///
    /// Always returns `NotImplemented`.
    pub const fn remove_container(&self, _id: &ContainerId) -> Result<()> {
        Err(ConmanError::NotImplemented {
            operation: "RemoveContainer",
        })
    }

    /// Lists every registered container with its live state.
    ///
    /// # Errors
    ///
    /// Fails as a whole if any container cannot be queried.
    pub fn list_containers(&self) -> Result<Vec<ContainerSummary>> {
        Ok(self
            .getter
            .list()?
            .into_iter()
            .map(|(instance, handle)| ContainerSummary {
                id: handle.id().clone(),
                pod_sandbox_id: String::new(),
                image: String::new(),
                image_ref: String::new(),
                state: CriState::from(instance.status),
                created_at: instance.created_at.map_or(0, |t| t.timestamp()),
                labels: std::collections::HashMap::new(),
                annotations: std::collections::HashMap::new(),
            })
            .collect())
    }

    /// Returns a timestamped usage record for a live container.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id, or the runtime's error if the
    /// container cannot be queried.
    pub fn container_stats(&self, id: &ContainerId) -> Result<ContainerStats> {
        let (_, handle) = self.getter.get(id)?;
        Ok(ContainerStats::empty(handle.id().clone(), Utc::now()))
    }
}

fn invalid_state(id: &ContainerId, status: Status) -> ConmanError {
    ConmanError::InvalidState {
        id: id.to_string(),
        status: status.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;
    use std::time::Duration;

    use conman_common::config::StartPolicy;
    use conman_common::error::ErrorKind;

    use super::*;
    use crate::instance::Instance;

    /// Runtime whose `state` answers come from a script.
    #[derive(Default)]
    struct ScriptedRuntime {
        states: Mutex<VecDeque<Status>>,
        fail_create: bool,
        deleted: Mutex<usize>,
        started: Mutex<usize>,
    }

    impl ScriptedRuntime {
        fn answering(states: &[Status]) -> Self {
            Self {
                states: Mutex::new(states.iter().copied().collect()),
                ..Self::default()
            }
        }
    }

    impl OciRuntime for ScriptedRuntime {
        fn create_container(&self, _: &Handle, _: bool, _: bool, _: Duration) -> Result<Instance> {
            if self.fail_create {
                return Err(ConmanError::Timeout {
                    operation: "handshake".into(),
                    after: Duration::from_millis(1),
                });
            }
            Ok(Instance::from_pid(42))
        }

        fn start_container(&self, _: &Handle) -> Result<()> {
            *self.started.lock().expect("lock") += 1;
            Ok(())
        }

        fn container(&self, _: &Handle) -> Result<Instance> {
            let mut states = self.states.lock().expect("lock");
            let status = if states.len() > 1 {
                states.pop_front().unwrap_or_default()
            } else {
                states.front().copied().unwrap_or_default()
            };
            Ok(Instance {
                status,
                pid: 42,
                ..Instance::default()
            })
        }

        fn delete_container(&self, _: &Handle) -> Result<()> {
            *self.deleted.lock().expect("lock") += 1;
            Ok(())
        }
    }

    fn config(root: &Path) -> RuntimeConfig {
        let rootfs = root.join("rootfs-src");
        std::fs::create_dir_all(rootfs.join("bin")).expect("rootfs");
        std::fs::write(rootfs.join("bin/echo"), b"echo").expect("write");
        RuntimeConfig {
            root_dir: root.join("lib"),
            log_dir: root.join("logs"),
            exit_dir: root.join("exits"),
            attach_dir: root.join("attach"),
            rootfs_source: rootfs,
            start_policy: StartPolicy {
                initial_delay: Duration::from_millis(5),
                max_delay: Duration::from_millis(20),
                max_wait: Duration::from_millis(200),
                jitter: 0.0,
            },
            ..RuntimeConfig::default()
        }
    }

    fn request() -> CreateContainerRequest {
        CreateContainerRequest {
            command: vec!["/bin/echo".into()],
            args: vec!["hi".into()],
            ..CreateContainerRequest::default()
        }
    }

    fn service(root: &Path, runtime: ScriptedRuntime) -> (RuntimeService, Arc<ScriptedRuntime>) {
        let runtime = Arc::new(runtime);
        let svc = RuntimeService::with_runtime(
            config(root),
            Arc::clone(&runtime) as Arc<dyn OciRuntime>,
        );
        (svc, runtime)
    }

    #[test]
    fn create_registers_and_records_created() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (svc, _) = service(dir.path(), ScriptedRuntime::default());
        let id = svc.create_container(request()).expect("create");

        let handle = svc.store().get(&id).expect("registered");
        assert_eq!(handle.status().expect("status"), Status::Created);
        assert!(handle.rootfs_dir().join("bin/echo").is_file());
        let spec: serde_json::Value = serde_json::from_slice(
            &std::fs::read(handle.runtime_spec_file()).expect("spec"),
        )
        .expect("json");
        assert_eq!(spec["process"]["args"][1], "hi");
        assert!(dir.path().join("logs").is_dir());
    }

    #[test]
    fn failed_handshake_leaves_nothing_behind() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (svc, runtime) = service(
            dir.path(),
            ScriptedRuntime {
                fail_create: true,
                ..ScriptedRuntime::default()
            },
        );
        let err = svc.create_container(request()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(svc.store().is_empty());
        let leftovers: Vec<PathBuf> = std::fs::read_dir(svc.config().containers_dir())
            .expect("containers dir")
            .map(|e| e.expect("entry").path())
            .collect();
        assert!(leftovers.is_empty(), "orphans: {leftovers:?}");
        assert_eq!(*runtime.deleted.lock().expect("lock"), 1);
    }

    #[test]
    fn empty_command_is_rejected_and_rolled_back() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (svc, runtime) = service(dir.path(), ScriptedRuntime::default());
        let err = svc
            .create_container(CreateContainerRequest::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(
            std::fs::read_dir(svc.config().containers_dir())
                .expect("dir")
                .count(),
            0
        );
        assert_eq!(*runtime.deleted.lock().expect("lock"), 0);
    }

    #[test]
    fn start_polls_until_running() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (svc, runtime) = service(
            dir.path(),
            ScriptedRuntime::answering(&[Status::Created, Status::Created, Status::Running]),
        );
        let id = svc.create_container(request()).expect("create");
        svc.start_container(&id).expect("start");

        assert_eq!(*runtime.started.lock().expect("lock"), 1);
        let handle = svc.store().get(&id).expect("get");
        assert_eq!(handle.status().expect("status"), Status::Running);
    }

    #[test]
    fn start_on_running_container_is_invalid_state() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (svc, runtime) =
            service(dir.path(), ScriptedRuntime::answering(&[Status::Running]));
        let id = svc.create_container(request()).expect("create");
        svc.store().get(&id).expect("get").started().expect("started");

        let err = svc.start_container(&id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert!(err.to_string().contains("running"));
        assert_eq!(*runtime.started.lock().expect("lock"), 0);
    }

    #[test]
    fn start_aborts_on_unexpected_status() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (svc, _) = service(
            dir.path(),
            ScriptedRuntime::answering(&[Status::Created, Status::Stopped]),
        );
        let id = svc.create_container(request()).expect("create");
        let err = svc.start_container(&id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert!(err.to_string().contains("stopped"));
    }

    #[test]
    fn start_gives_up_after_max_wait() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (svc, _) = service(dir.path(), ScriptedRuntime::answering(&[Status::Created]));
        let id = svc.create_container(request()).expect("create");
        let err = svc.start_container(&id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }

    #[test]
    fn start_with_zero_delays_still_times_out() {
        let dir = tempfile::tempdir().expect("tempdir");
        let runtime = Arc::new(ScriptedRuntime::answering(&[Status::Created]));
        let svc = RuntimeService::with_runtime(
            RuntimeConfig {
                start_policy: StartPolicy {
                    initial_delay: Duration::ZERO,
                    max_delay: Duration::from_millis(100),
                    max_wait: Duration::from_millis(50),
                    jitter: 0.0,
                },
                ..config(dir.path())
            },
            Arc::clone(&runtime) as Arc<dyn OciRuntime>,
        );
        let id = svc.create_container(request()).expect("create");

        let started = Instant::now();
        let err = svc.start_container(&id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(started.elapsed() < Duration::from_secs(2), "{:?}", started.elapsed());
    }

    #[test]
    fn start_unknown_id_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (svc, _) = service(dir.path(), ScriptedRuntime::default());
        let err = svc.start_container(&ContainerId::new("nope")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn stop_and_remove_are_not_implemented() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (svc, _) = service(dir.path(), ScriptedRuntime::default());
        let id = ContainerId::new("any");
        assert_eq!(
            svc.stop_container(&id).unwrap_err().kind(),
            ErrorKind::NotImplemented
        );
        assert_eq!(
            svc.remove_container(&id).unwrap_err().kind(),
            ErrorKind::NotImplemented
        );
    }

    #[test]
    fn list_projects_live_state() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (svc, _) = service(dir.path(), ScriptedRuntime::answering(&[Status::Stopped]));
        let a = svc.create_container(request()).expect("a");
        let b = svc.create_container(request()).expect("b");

        let list = svc.list_containers().expect("list");
        let mut ids: Vec<_> = list.iter().map(|c| c.id.clone()).collect();
        ids.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(ids, expected);
        assert!(list.iter().all(|c| c.state == CriState::Exited));
        assert!(list.iter().all(|c| c.image.is_empty() && c.labels.is_empty()));
    }

    #[test]
    fn stats_are_timestamped_and_zero() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (svc, _) = service(dir.path(), ScriptedRuntime::answering(&[Status::Running]));
        let id = svc.create_container(request()).expect("create");
        let before = Utc::now();
        let stats = svc.container_stats(&id).expect("stats");
        assert_eq!(stats.id, id);
        assert!(stats.cpu.timestamp >= before);
        assert_eq!(stats.cpu.timestamp, stats.memory.timestamp);
        assert_eq!(stats.cpu.usage_core_nano_seconds, 0);
        assert_eq!(stats.memory.working_set_bytes, 0);
    }

    #[test]
    fn recover_registers_containers_with_status() {
        let dir = tempfile::tempdir().expect("tempdir");
        let id = {
            let (svc, _) = service(dir.path(), ScriptedRuntime::default());
            svc.create_container(request()).expect("create")
        };
        let cfg = config(dir.path());
        // A directory without a state file is not a container yet.
        std::fs::create_dir_all(cfg.containers_dir().join("half-made")).expect("mkdir");

        let (svc, _) = service(dir.path(), ScriptedRuntime::default());
        assert_eq!(svc.recover().expect("recover"), 1);
        assert!(svc.store().get(&id).is_ok());
    }

    #[test]
    fn recover_without_root_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (svc, _) = service(dir.path(), ScriptedRuntime::default());
        assert_eq!(svc.recover().expect("recover"), 0);
    }
}

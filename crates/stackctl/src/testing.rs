//! In-memory backends for exercising commands without docker or systemd.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use stack::{
    ContainerState, ContainerStats, DownRequest, ExecOutput, LogsRequest, Orchestrator,
    ProjectPaths, ResourceLimits, SliceManager, SliceState, StackError,
};

use crate::config;
use crate::context::StackContext;

const SERVICES: [&str; 4] = ["db", "kong", "rest", "auth"];

#[derive(Default)]
struct OrchestratorState {
    cgroup_driver: Option<String>,
    fail_up: bool,
    exec_exit_code: i32,
    running: bool,
    calls: Vec<String>,
    up_overrides: Vec<PathBuf>,
    down_overrides: Vec<PathBuf>,
    exec_calls: Vec<Vec<String>>,
}

/// Records every call; `up` marks all services running, `down` removes them.
#[derive(Clone, Default)]
pub struct FakeOrchestrator {
    state: Arc<Mutex<OrchestratorState>>,
}

impl FakeOrchestrator {
    pub fn with_cgroup_driver(self, driver: &str) -> Self {
        self.state.lock().unwrap().cgroup_driver = Some(driver.to_string());
        self
    }

    pub fn failing_up(self) -> Self {
        self.state.lock().unwrap().fail_up = true;
        self
    }

    pub fn with_exec_exit_code(self, code: i32) -> Self {
        self.state.lock().unwrap().exec_exit_code = code;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().unwrap().running
    }

    pub fn up_overrides(&self) -> Vec<PathBuf> {
        self.state.lock().unwrap().up_overrides.clone()
    }

    pub fn down_overrides(&self) -> Vec<PathBuf> {
        self.state.lock().unwrap().down_overrides.clone()
    }

    pub fn exec_calls(&self) -> Vec<Vec<String>> {
        self.state.lock().unwrap().exec_calls.clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.state.lock().unwrap().calls.push(call.into());
    }
}

#[async_trait]
impl Orchestrator for FakeOrchestrator {
    fn name(&self) -> &str {
        "fake"
    }

    async fn services(&self) -> stack::Result<Vec<String>> {
        Ok(SERVICES.iter().map(|s| s.to_string()).collect())
    }

    async fn cgroup_driver(&self) -> stack::Result<String> {
        let driver = self.state.lock().unwrap().cgroup_driver.clone();
        Ok(driver.unwrap_or_else(|| "systemd".into()))
    }

    async fn up(&self, overrides: &[PathBuf]) -> stack::Result<()> {
        self.record("up");
        let mut state = self.state.lock().unwrap();
        if state.fail_up {
            return Err(StackError::CommandFailed {
                command: "docker compose up".into(),
                detail: "image pull failed".into(),
            });
        }
        state.up_overrides = overrides.to_vec();
        state.running = true;
        Ok(())
    }

    async fn down(&self, request: &DownRequest<'_>) -> stack::Result<()> {
        self.record(if request.remove_volumes { "down -v" } else { "down" });
        let mut state = self.state.lock().unwrap();
        state.down_overrides = request.overrides.to_vec();
        state.running = false;
        Ok(())
    }

    async fn ps(&self) -> stack::Result<Vec<ContainerState>> {
        if !self.is_running() {
            return Ok(Vec::new());
        }
        Ok(SERVICES
            .iter()
            .map(|service| ContainerState {
                name: format!("supabase-{service}"),
                service: service.to_string(),
                state: "running".into(),
                health: "healthy".into(),
                ports: if *service == "kong" {
                    vec!["8000->8000/tcp".into()]
                } else {
                    Vec::new()
                },
            })
            .collect())
    }

    async fn stats(&self, containers: &[String]) -> stack::Result<Vec<ContainerStats>> {
        Ok(containers
            .iter()
            .map(|name| ContainerStats {
                name: name.clone(),
                cpu_percent: 1.5,
                memory_bytes: 64 * 1024 * 1024,
                memory_limit_bytes: 1024 * 1024 * 1024,
                pids: 12,
            })
            .collect())
    }

    async fn logs(&self, request: &LogsRequest<'_>) -> stack::Result<()> {
        self.record(format!(
            "logs {} tail={} follow={}",
            request.service.unwrap_or("*"),
            request.tail,
            request.follow
        ));
        Ok(())
    }

    async fn exec(&self, container: &str, args: &[&str]) -> stack::Result<ExecOutput> {
        let mut state = self.state.lock().unwrap();
        let mut call = vec![container.to_string()];
        call.extend(args.iter().map(|a| a.to_string()));
        state.exec_calls.push(call);
        let exit_code = state.exec_exit_code;
        Ok(ExecOutput {
            exit_code,
            stdout: if exit_code == 0 { "TRUNCATE TABLE".into() } else { String::new() },
            stderr: if exit_code == 0 {
                String::new()
            } else {
                "ERROR:  relation \"auth.users\" does not exist".into()
            },
        })
    }
}

#[derive(Default)]
struct SliceRegistry {
    active: BTreeMap<String, ResourceLimits>,
    removals: Vec<String>,
    fail_create: bool,
}

/// Active slices and their limits, as systemd would hold them.
#[derive(Clone, Default)]
pub struct FakeSlices {
    registry: Arc<Mutex<SliceRegistry>>,
}

impl FakeSlices {
    pub fn failing_create(self) -> Self {
        self.registry.lock().unwrap().fail_create = true;
        self
    }

    pub fn active(&self) -> Vec<String> {
        self.registry.lock().unwrap().active.keys().cloned().collect()
    }

    /// Every slice `remove` was called for, in order.
    pub fn removals(&self) -> Vec<String> {
        self.registry.lock().unwrap().removals.clone()
    }
}

#[async_trait]
impl SliceManager for FakeSlices {
    fn name(&self) -> &str {
        "fake"
    }

    async fn create(&self, slice: &str, limits: &ResourceLimits) -> stack::Result<()> {
        let mut registry = self.registry.lock().unwrap();
        if registry.fail_create {
            return Err(StackError::CommandFailed {
                command: format!("sudo -n systemctl start {slice}"),
                detail: "sudo: a password is required".into(),
            });
        }
        registry.active.insert(slice.to_string(), *limits);
        Ok(())
    }

    async fn remove(&self, slice: &str) {
        let mut registry = self.registry.lock().unwrap();
        registry.removals.push(slice.to_string());
        registry.active.remove(slice);
    }

    async fn state(&self, slice: &str) -> stack::Result<SliceState> {
        let limits = self.registry.lock().unwrap().active.get(slice).copied();
        Ok(SliceState {
            name: slice.to_string(),
            active: limits.is_some(),
            memory_current: limits.map(|_| 512 * 1024 * 1024),
            memory_max: limits.map(|l| l.memory_mb * 1024 * 1024),
            cpu_quota: limits.map(|l| format!("{}ms", u64::from(l.cpu_quota_percent) * 10)),
        })
    }
}

/// Context over `dir` with default config, no settle delay, and fake backends.
pub async fn context(
    dir: &Path,
    orchestrator: FakeOrchestrator,
    slices: Option<FakeSlices>,
) -> StackContext {
    let mut config = config::load(dir, None).await.unwrap();
    config.settle_secs = 0;
    StackContext {
        config,
        paths: ProjectPaths::new(dir.to_path_buf()),
        orchestrator: Box::new(orchestrator),
        slices: slices.map(|s| Box::new(s) as Box<dyn SliceManager>),
    }
}

/// Lay out `.env` and every init file so the project does not need setup.
pub fn seed_project(dir: &Path, env: &str) {
    std::fs::write(dir.join(".env"), env).unwrap();
    for rel in stack::INIT_FILES {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "-- init\n").unwrap();
    }
}

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Memory ceiling and CPU quota applied to the whole stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    pub memory_mb: u64,
    /// Percent of one CPU (`200` = two CPUs).
    pub cpu_quota_percent: u32,
}

pub struct DownRequest<'a> {
    /// Extra compose files the stack was started with.
    pub overrides: &'a [PathBuf],
    /// Also remove named volumes declared in the compose project.
    pub remove_volumes: bool,
}

pub struct LogsRequest<'a> {
    pub service: Option<&'a str>,
    pub tail: u32,
    pub follow: bool,
}

pub struct ExecOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// One container of the compose project, as reported by `ps`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerState {
    pub name: String,
    pub service: String,
    /// `running`, `exited`, `restarting`, ...
    pub state: String,
    /// Empty when the image defines no health check.
    pub health: String,
    pub ports: Vec<String>,
}

impl ContainerState {
    pub fn is_running(&self) -> bool {
        self.state == "running"
    }
}

/// Point-in-time resource usage for one container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerStats {
    pub name: String,
    pub cpu_percent: f64,
    pub memory_bytes: u64,
    pub memory_limit_bytes: u64,
    pub pids: u32,
}

/// Runtime state of a systemd slice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceState {
    pub name: String,
    pub active: bool,
    pub memory_current: Option<u64>,
    pub memory_max: Option<u64>,
    /// Raw `CPUQuotaPerSecUSec` value, e.g. `2s` for 200%.
    pub cpu_quota: Option<String>,
}

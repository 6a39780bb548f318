use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ContainerState, ContainerStats, DownRequest, ExecOutput, LogsRequest};

/// The container-orchestration tool driving the stack (e.g. `docker compose`).
#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// Human-readable name for this backend (e.g. "docker compose").
    fn name(&self) -> &str;
    /// Service names declared by the project's compose files.
    async fn services(&self) -> Result<Vec<String>>;
    /// Cgroup driver of the container engine (`systemd` or `cgroupfs`).
    ///
    /// A cgroup-parent slice only takes effect under the `systemd` driver.
    async fn cgroup_driver(&self) -> Result<String>;
    /// Create and start all services in the background, layering `overrides`
    /// on top of the project's compose files.
    async fn up(&self, overrides: &[PathBuf]) -> Result<()>;
    /// Stop and remove the project's containers.
    async fn down(&self, request: &DownRequest<'_>) -> Result<()>;
    /// Containers of the project, running or not.
    async fn ps(&self) -> Result<Vec<ContainerState>>;
    /// One-shot resource usage for the named containers.
    async fn stats(&self, containers: &[String]) -> Result<Vec<ContainerStats>>;
    /// Stream service logs to the terminal.
    async fn logs(&self, request: &LogsRequest<'_>) -> Result<()>;
    /// Run a command inside a running container and capture its output.
    async fn exec(&self, container: &str, args: &[&str]) -> Result<ExecOutput>;
}

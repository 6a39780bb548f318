use std::path::{Path, PathBuf};

use stack::{Orchestrator, ProjectPaths, SliceManager};
use stack_compose::{ComposeConfig, DockerCompose, SystemdSlices};
use tracing::debug;

use crate::config::{self, StackConfig};
use crate::error::CtlResult;

/// Everything a lifecycle command needs: config, project layout, and the
/// backends driving containers and slices.
pub struct StackContext {
    pub config: StackConfig,
    pub paths: ProjectPaths,
    pub orchestrator: Box<dyn Orchestrator>,
    /// `None` when the host has no systemd.
    pub slices: Option<Box<dyn SliceManager>>,
}

impl StackContext {
    /// Load config and connect to docker compose, detecting systemd.
    pub async fn open(project_dir: PathBuf, config_path: Option<&Path>) -> CtlResult<Self> {
        let config = config::load(&project_dir, config_path).await?;
        let orchestrator = DockerCompose::new(ComposeConfig {
            project_dir: project_dir.clone(),
            compose_files: config.compose_files.clone(),
            project_name: config.project_name.clone(),
        })
        .await?;
        let slices = SystemdSlices::detect().map(|s| Box::new(s) as Box<dyn SliceManager>);
        debug!(
            orchestrator = orchestrator.name(),
            slices = slices.as_ref().map_or("none", |s| s.name()),
            "backends ready"
        );

        Ok(Self {
            config,
            paths: ProjectPaths::new(project_dir),
            orchestrator: Box::new(orchestrator),
            slices,
        })
    }
}

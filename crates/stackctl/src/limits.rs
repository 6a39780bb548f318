use std::path::{Path, PathBuf};

use stack::Plan;
use stack_compose::{render_cgroup_parent, render_static_limits};
use tracing::{debug, info, warn};

use crate::context::StackContext;
use crate::error::{CtlError, CtlResult};
use crate::session::LimitMode;

/// cgroup driver under which a `cgroup_parent` slice takes effect.
const SYSTEMD_DRIVER: &str = "systemd";

/// Limits put in place for a start.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedLimits {
    pub mode: LimitMode,
    pub slice: Option<String>,
    /// Compose files to layer over the project's own.
    pub overrides: Vec<PathBuf>,
}

/// Put `plan`'s limits in place before `up`.
///
/// Uses a systemd slice when the host and container engine both support it,
/// static per-service limits otherwise.
pub async fn apply(ctx: &StackContext, plan: &Plan) -> CtlResult<AppliedLimits> {
    let Some(limits) = plan.limits else {
        info!(plan = plan.name, "no resource limits");
        return Ok(AppliedLimits {
            mode: LimitMode::Unlimited,
            slice: None,
            overrides: Vec::new(),
        });
    };

    let services = ctx.orchestrator.services().await?;

    if let Some(slices) = &ctx.slices {
        let driver = ctx.orchestrator.cgroup_driver().await?;
        if driver == SYSTEMD_DRIVER {
            let slice = ctx.config.slice.as_str();
            let path = ctx.paths.cgroup_override();
            write_override(&path, &render_cgroup_parent(&services, slice)?).await?;
            if let Err(e) = slices.create(slice, &limits).await {
                remove_override(&path).await;
                return Err(e.into());
            }
            info!(plan = plan.name, slice, "containers will run under slice");
            return Ok(AppliedLimits {
                mode: LimitMode::Slice,
                slice: Some(slice.to_string()),
                overrides: vec![path],
            });
        }
        warn!(
            driver = %driver,
            "container engine does not use the systemd cgroup driver, using static limits"
        );
    }

    let path = ctx.paths.static_override(plan.name);
    write_override(&path, &render_static_limits(&services, &limits)?).await?;
    info!(plan = plan.name, file = %path.display(), "static per-service limits");
    Ok(AppliedLimits {
        mode: LimitMode::Static,
        slice: None,
        overrides: vec![path],
    })
}

/// Undo [`apply`]: stop the slice and delete `overrides`.
///
/// The slice is checked whenever systemd is present, so no slice outlives a
/// session regardless of its mode. Only an active slice is stopped, as that
/// needs privileges. Failures are logged, never returned.
pub async fn release(ctx: &StackContext, overrides: &[PathBuf]) {
    if let Some(slices) = &ctx.slices {
        let slice = ctx.config.slice.as_str();
        match slices.state(slice).await {
            Ok(state) if !state.active => debug!(slice, "slice not active"),
            Ok(_) => {
                slices.remove(slice).await;
                debug!(slice, "slice stopped");
            }
            Err(e) => {
                warn!(slice, error = %e, "could not query slice, stopping it anyway");
                slices.remove(slice).await;
            }
        }
    }
    for path in overrides {
        remove_override(path).await;
    }
}

async fn remove_override(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(file = %path.display(), "override removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(file = %path.display(), error = %e, "failed to remove override"),
    }
}

async fn write_override(path: &Path, content: &str) -> CtlResult<()> {
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| CtlError::Internal(format!("create {}: {e}", dir.display())))?;
    }
    tokio::fs::write(path, content)
        .await
        .map_err(|e| CtlError::Internal(format!("write {}: {e}", path.display())))
}

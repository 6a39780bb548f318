use std::path::{Path, PathBuf};

use stack::DownRequest;
use tracing::info;

use crate::context::StackContext;
use crate::error::{CtlError, CtlResult};
use crate::limits;
use crate::session::Session;

pub async fn run_stop(ctx: &StackContext) -> CtlResult<()> {
    stop_stack(ctx, false).await?;
    println!("stack stopped");
    Ok(())
}

/// Take the stack down with the overrides it was started with, release its
/// limits and forget the session. Safe when nothing is running.
pub(crate) async fn stop_stack(ctx: &StackContext, remove_volumes: bool) -> CtlResult<()> {
    let session = Session::load(&ctx.paths.session()).await?;
    let overrides: Vec<PathBuf> = session
        .map(|s| s.overrides)
        .unwrap_or_default()
        .into_iter()
        .filter(|p| p.is_file())
        .collect();

    ctx.orchestrator
        .down(&DownRequest {
            overrides: &overrides,
            remove_volumes,
        })
        .await?;

    let mut generated = generated_overrides(&ctx.paths.state_dir()).await?;
    generated.extend(overrides);
    limits::release(ctx, &generated).await;

    Session::clear(&ctx.paths.session()).await?;
    info!(remove_volumes, "stack stopped");
    Ok(())
}

/// Override files left in the state directory by any earlier start.
async fn generated_overrides(state_dir: &Path) -> CtlResult<Vec<PathBuf>> {
    let mut entries = match tokio::fs::read_dir(state_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(CtlError::Internal(format!(
                "read {}: {e}",
                state_dir.display()
            )));
        }
    };
    let mut found = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| CtlError::Internal(format!("read {}: {e}", state_dir.display())))?
    {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with("docker-compose.") && name.ends_with(".yml") {
            found.push(entry.path());
        }
    }
    Ok(found)
}

use std::io::{BufRead, IsTerminal, Write};
use std::path::Path;

use clap::Args;
use stack_compose::Privilege;
use tracing::{info, warn};

use crate::context::StackContext;
use crate::error::{CtlError, CtlResult};

use super::stop;

#[derive(Args)]
pub struct ResetArgs {
    /// Remove containers and delete all volume data
    #[arg(long)]
    pub hard: bool,
    /// Do not ask for confirmation
    #[arg(long, short)]
    pub yes: bool,
}

pub async fn run_reset(ctx: &StackContext, args: ResetArgs) -> CtlResult<()> {
    if !args.hard {
        fast_reset(ctx).await?;
        println!("data reset, containers still running");
        return Ok(());
    }

    if !args.yes && !confirm_hard_reset(&ctx.config.reset.data_dirs)? {
        println!("aborted");
        return Ok(());
    }
    hard_reset(ctx).await?;
    println!("hard reset done, run `stackctl start` to reinitialize");
    Ok(())
}

/// Truncate the configured tables and empty the storage directory while
/// the containers keep running.
async fn fast_reset(ctx: &StackContext) -> CtlResult<()> {
    let reset = &ctx.config.reset;
    if reset.tables.is_empty() {
        info!("no tables configured, skipping truncate");
    } else {
        let sql = format!("TRUNCATE TABLE {} CASCADE;", reset.tables.join(", "));
        let args = [
            "psql",
            "-U",
            reset.db_user.as_str(),
            "-d",
            reset.db_name.as_str(),
            "-v",
            "ON_ERROR_STOP=1",
            "-c",
            sql.as_str(),
        ];
        let out = ctx.orchestrator.exec(&reset.db_container, &args).await?;
        if out.exit_code != 0 {
            return Err(CtlError::Reset(format!(
                "psql in {} exited with {}: {}",
                reset.db_container,
                out.exit_code,
                out.stderr.trim()
            )));
        }
        info!(tables = reset.tables.len(), "tables truncated");
    }

    empty_dir(&reset.storage_dir).await?;
    info!(dir = %reset.storage_dir.display(), "storage emptied");
    Ok(())
}

/// Tear the stack down with its volumes and recreate the data directories empty.
async fn hard_reset(ctx: &StackContext) -> CtlResult<()> {
    stop::stop_stack(ctx, true).await?;
    for dir in &ctx.config.reset.data_dirs {
        remove_path(dir).await?;
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| CtlError::Reset(format!("create {}: {e}", dir.display())))?;
        info!(dir = %dir.display(), "data directory recreated");
    }
    Ok(())
}

fn confirm_hard_reset(dirs: &[std::path::PathBuf]) -> CtlResult<bool> {
    if !std::io::stdin().is_terminal() {
        return Err(CtlError::Reset(
            "refusing to delete data without confirmation; pass --yes".into(),
        ));
    }
    let listed: Vec<String> = dirs.iter().map(|d| d.display().to_string()).collect();
    eprint!(
        "This removes all containers and deletes {}. Continue? [y/N] ",
        listed.join(", ")
    );
    std::io::stderr().flush()?;
    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

async fn empty_dir(dir: &Path) -> CtlResult<()> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| CtlError::Reset(format!("create {}: {e}", dir.display())));
        }
        Err(e) => return Err(CtlError::Reset(format!("read {}: {e}", dir.display()))),
    };
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| CtlError::Reset(format!("read {}: {e}", dir.display())))?
    {
        remove_path(&entry.path()).await?;
    }
    Ok(())
}

/// Delete a file or directory tree. Container-owned files fall back to a
/// privileged `rm`.
async fn remove_path(path: &Path) -> CtlResult<()> {
    let result = match tokio::fs::symlink_metadata(path).await {
        Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(path).await,
        Ok(_) => tokio::fs::remove_file(path).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            warn!(path = %path.display(), "permission denied, removing with elevated privileges");
            let target = path.display().to_string();
            stack_compose::exec_inherit("rm", &["-rf", target.as_str()], Privilege::elevated())
                .await?;
            Ok(())
        }
        Err(e) => Err(CtlError::Reset(format!("remove {}: {e}", path.display()))),
    }
}

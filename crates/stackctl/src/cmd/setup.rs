use std::path::Path;

use clap::Args;
use stack::{ProjectPaths, check_setup};

use crate::bootstrap;
use crate::config;
use crate::error::{CtlError, CtlResult};

use super::start::describe_missing;

#[derive(Args)]
pub struct SetupArgs {
    /// Only report whether setup is needed (exit 1 if it is)
    #[arg(long)]
    pub check: bool,
}

/// Does not need docker: only files in the project directory are touched.
pub async fn run_setup(
    project_dir: &Path,
    config_path: Option<&Path>,
    args: SetupArgs,
) -> CtlResult<()> {
    let config = config::load(project_dir, config_path).await?;
    let paths = ProjectPaths::new(project_dir.to_path_buf());
    let report = check_setup(&paths);

    if args.check {
        if report.needs_setup() {
            return Err(CtlError::SetupRequired(describe_missing(&report)));
        }
        if !report.missing.is_empty() {
            println!("tolerating missing: {}", report.missing.join(", "));
        }
        println!("setup complete");
        return Ok(());
    }

    bootstrap::run(&paths, &config).await?;
    println!("setup complete");
    Ok(())
}

use std::path::PathBuf;

use clap::Args;
use serde::Serialize;
use stack::{SetupReport, SliceState, check_setup};

use crate::context::StackContext;
use crate::error::{CtlError, CtlResult};
use crate::session::Session;

use super::resources::format_slice;
use super::start::describe_missing;

#[derive(Args)]
pub struct StatusArgs {
    /// Print machine-readable JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct StatusReport {
    project_dir: PathBuf,
    needs_setup: bool,
    setup: SetupReport,
    session: Option<Session>,
    slice: Option<SliceState>,
    containers_running: usize,
    containers_total: usize,
}

pub async fn run_status(ctx: &StackContext, args: StatusArgs) -> CtlResult<()> {
    let report = collect(ctx).await?;
    if args.json {
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| CtlError::Internal(format!("serialize status: {e}")))?;
        println!("{json}");
    } else {
        print!("{}", render(&report));
    }
    Ok(())
}

async fn collect(ctx: &StackContext) -> CtlResult<StatusReport> {
    let setup = check_setup(&ctx.paths);
    let session = Session::load(&ctx.paths.session()).await?;
    let slice = match &ctx.slices {
        Some(slices) => Some(slices.state(&ctx.config.slice).await?),
        None => None,
    };
    let containers = ctx.orchestrator.ps().await?;
    Ok(StatusReport {
        project_dir: ctx.paths.root().to_path_buf(),
        needs_setup: setup.needs_setup(),
        setup,
        session,
        slice,
        containers_running: containers.iter().filter(|c| c.is_running()).count(),
        containers_total: containers.len(),
    })
}

fn render(report: &StatusReport) -> String {
    let setup = if report.needs_setup {
        format!("needed ({})", describe_missing(&report.setup))
    } else {
        "complete".to_string()
    };
    let plan = match &report.session {
        Some(s) => format!(
            "{} ({}) since {}",
            s.plan,
            s.mode,
            s.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        ),
        None => "not started".to_string(),
    };
    let slice = report
        .slice
        .as_ref()
        .map_or("systemd not available".to_string(), format_slice);

    format!(
        "Project:     {}\nSetup:       {setup}\nPlan:        {plan}\nLimits:      {slice}\nContainers:  {}/{} running\n",
        report.project_dir.display(),
        report.containers_running,
        report.containers_total,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::start::start_stack;
    use crate::testing::{FakeOrchestrator, FakeSlices, context, seed_project};
    use stack::Plan;

    #[tokio::test]
    async fn fresh_project() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), FakeOrchestrator::default(), None).await;

        let report = collect(&ctx).await.unwrap();
        assert!(report.needs_setup);
        assert!(report.session.is_none());
        assert_eq!(report.containers_total, 0);

        let text = render(&report);
        assert!(text.contains("Setup:       needed (.env missing; 10 init files missing"), "{text}");
        assert!(text.contains("Plan:        not started\n"), "{text}");
        assert!(text.contains("Limits:      systemd not available\n"), "{text}");
    }

    #[tokio::test]
    async fn running_stack() {
        let dir = tempfile::tempdir().unwrap();
        seed_project(dir.path(), "");
        let ctx = context(
            dir.path(),
            FakeOrchestrator::default(),
            Some(FakeSlices::default()),
        )
        .await;
        start_stack(&ctx, Plan::parse("2gb").unwrap()).await.unwrap();

        let report = collect(&ctx).await.unwrap();
        assert!(!report.needs_setup);
        assert_eq!(report.containers_running, 4);
        assert!(report.slice.as_ref().unwrap().active);

        let text = render(&report);
        assert!(text.contains("Setup:       complete\n"), "{text}");
        assert!(text.contains("Plan:        2gb (slice) since "), "{text}");
        assert!(text.contains("Containers:  4/4 running\n"), "{text}");

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["session"]["plan"], "2gb");
        assert_eq!(json["slice"]["memory_max"], 2048u64 * 1024 * 1024);
    }
}

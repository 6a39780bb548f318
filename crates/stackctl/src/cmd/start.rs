use std::time::Duration;

use chrono::Utc;
use clap::Args;
use stack::{Plan, SetupReport, check_setup};
use tracing::info;

use crate::bootstrap;
use crate::context::StackContext;
use crate::error::{CtlError, CtlResult};
use crate::limits;
use crate::session::Session;

use super::containers;
use super::stop;

#[derive(Args)]
pub struct StartArgs {
    /// Resource plan: 1gb, 2gb, 4gb, 8gb, 16gb or unlimited
    #[arg(long, default_value = "unlimited")]
    pub plan: String,
    /// Fail instead of running first-time setup
    #[arg(long)]
    pub skip_setup: bool,
    /// Return right after the containers are created
    #[arg(long)]
    pub no_wait: bool,
}

pub async fn run_start(ctx: &StackContext, args: StartArgs) -> CtlResult<()> {
    let plan = Plan::parse(&args.plan)?;
    ensure_setup(ctx, args.skip_setup).await?;

    let session = start_stack(ctx, plan).await?;
    if !args.no_wait {
        settle(ctx).await;
    }

    let containers = ctx.orchestrator.ps().await?;
    print!("{}", containers::format_table(&containers));
    println!();
    println!("started with plan {} ({} limits)", session.plan, session.mode);
    Ok(())
}

/// Run first-time setup when the project needs it.
pub(crate) async fn ensure_setup(ctx: &StackContext, skip_setup: bool) -> CtlResult<()> {
    let report = check_setup(&ctx.paths);
    if !report.needs_setup() {
        return Ok(());
    }
    if skip_setup {
        return Err(CtlError::SetupRequired(format!(
            "{}; run `stackctl setup`",
            describe_missing(&report)
        )));
    }
    info!(missing = report.missing.len(), "project needs setup, running it first");
    bootstrap::run(&ctx.paths, &ctx.config).await
}

pub(crate) fn describe_missing(report: &SetupReport) -> String {
    let mut parts = Vec::new();
    if !report.env_present {
        parts.push(".env missing".to_string());
    }
    if !report.missing.is_empty() {
        parts.push(format!(
            "{} init files missing ({})",
            report.missing.len(),
            report.missing.join(", ")
        ));
    }
    parts.join("; ")
}

/// Stop whatever runs now, then bring the stack up under `plan`.
///
/// Limits are released again if `up` fails.
pub(crate) async fn start_stack(ctx: &StackContext, plan: &Plan) -> CtlResult<Session> {
    stop::stop_stack(ctx, false).await?;

    let applied = limits::apply(ctx, plan).await?;
    if let Err(e) = ctx.orchestrator.up(&applied.overrides).await {
        limits::release(ctx, &applied.overrides).await;
        return Err(e.into());
    }

    let session = Session {
        plan: plan.name.to_string(),
        mode: applied.mode,
        slice: applied.slice,
        overrides: applied.overrides,
        started_at: Utc::now(),
    };
    session.save(&ctx.paths.session()).await?;
    info!(plan = plan.name, mode = %session.mode, "stack started");
    Ok(session)
}

/// Fixed delay for services to finish booting.
pub(crate) async fn settle(ctx: &StackContext) {
    let secs = ctx.config.settle_secs;
    if secs > 0 {
        info!(secs, "waiting for services to settle");
        tokio::time::sleep(Duration::from_secs(secs)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::LimitMode;
    use crate::testing::{FakeOrchestrator, FakeSlices, context, seed_project};

    fn args(plan: &str) -> StartArgs {
        StartArgs {
            plan: plan.into(),
            skip_setup: true,
            no_wait: false,
        }
    }

    #[tokio::test]
    async fn unknown_plan_fails_before_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        seed_project(dir.path(), "KONG_HTTP_PORT=8000\n");
        let orchestrator = FakeOrchestrator::default();
        let slices = FakeSlices::default();
        let ctx = context(dir.path(), orchestrator.clone(), Some(slices.clone())).await;

        let err = run_start(&ctx, args("3gb")).await.unwrap_err();
        assert!(err.to_string().contains("3gb"), "got: {err}");
        assert!(orchestrator.calls().is_empty());
        assert!(slices.active().is_empty());
        assert!(!ctx.paths.session().exists());
    }

    #[tokio::test]
    async fn skip_setup_on_fresh_project_fails() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = FakeOrchestrator::default();
        let ctx = context(dir.path(), orchestrator.clone(), None).await;

        let err = run_start(&ctx, args("unlimited")).await.unwrap_err();
        assert!(matches!(err, CtlError::SetupRequired(_)), "got: {err}");
        assert!(err.to_string().contains(".env missing"), "got: {err}");
        assert!(orchestrator.calls().is_empty());
    }

    #[tokio::test]
    async fn start_with_slice_records_session() {
        let dir = tempfile::tempdir().unwrap();
        seed_project(dir.path(), "KONG_HTTP_PORT=8000\n");
        let orchestrator = FakeOrchestrator::default();
        let slices = FakeSlices::default();
        let ctx = context(dir.path(), orchestrator.clone(), Some(slices.clone())).await;

        run_start(&ctx, args("4gb")).await.unwrap();

        assert_eq!(orchestrator.calls(), vec!["down", "up"]);
        assert_eq!(orchestrator.up_overrides(), vec![ctx.paths.cgroup_override()]);
        assert_eq!(slices.active(), vec!["supabase-stack.slice".to_string()]);

        let session = Session::load(&ctx.paths.session()).await.unwrap().unwrap();
        assert_eq!(session.plan, "4gb");
        assert_eq!(session.mode, LimitMode::Slice);
        assert_eq!(session.overrides, vec![ctx.paths.cgroup_override()]);
    }

    #[tokio::test]
    async fn restart_with_other_plan_replaces_previous_session() {
        let dir = tempfile::tempdir().unwrap();
        seed_project(dir.path(), "");
        let orchestrator = FakeOrchestrator::default();
        let ctx = context(dir.path(), orchestrator.clone(), None).await;

        run_start(&ctx, args("2gb")).await.unwrap();
        run_start(&ctx, args("8gb")).await.unwrap();

        // The second start took the first one down with its override.
        assert_eq!(orchestrator.down_overrides(), vec![ctx.paths.static_override("2gb")]);
        assert!(!ctx.paths.static_override("2gb").exists());
        assert!(ctx.paths.static_override("8gb").exists());
        let session = Session::load(&ctx.paths.session()).await.unwrap().unwrap();
        assert_eq!(session.plan, "8gb");
        assert_eq!(session.mode, LimitMode::Static);
    }

    #[tokio::test]
    async fn failed_up_releases_limits() {
        let dir = tempfile::tempdir().unwrap();
        seed_project(dir.path(), "");
        let orchestrator = FakeOrchestrator::default().failing_up();
        let slices = FakeSlices::default();
        let ctx = context(dir.path(), orchestrator.clone(), Some(slices.clone())).await;

        let err = run_start(&ctx, args("1gb")).await.unwrap_err();
        assert!(err.to_string().contains("image pull failed"), "got: {err}");
        assert!(slices.active().is_empty());
        assert!(!ctx.paths.cgroup_override().exists());
        assert!(!ctx.paths.session().exists());
    }

    #[test]
    fn missing_files_description() {
        let report = SetupReport {
            env_present: false,
            missing: vec!["volumes/db/jwt.sql", "volumes/api/kong.yml"],
        };
        assert_eq!(
            describe_missing(&report),
            ".env missing; 2 init files missing (volumes/db/jwt.sql, volumes/api/kong.yml)"
        );
    }
}

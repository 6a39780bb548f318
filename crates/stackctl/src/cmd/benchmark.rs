use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use clap::Args;
use stack::{PLANS, Plan};
use tracing::{info, warn};

use crate::context::StackContext;
use crate::env_file;
use crate::error::{CtlError, CtlResult};
use crate::loadtest::LoadTest;
use crate::report::{BenchmarkSummary, PlanResult};

use super::start::{ensure_setup, settle, start_stack};
use super::stop::stop_stack;

#[derive(Args)]
pub struct BenchmarkArgs {
    /// Comma-separated plans to run, in order (default: all)
    #[arg(long, value_delimiter = ',')]
    pub plans: Vec<String>,
    /// Requests per plan
    #[arg(long)]
    pub requests: Option<usize>,
    /// Requests in flight at once
    #[arg(long)]
    pub concurrency: Option<usize>,
    /// Directory receiving the timestamped result folder
    #[arg(long)]
    pub output: Option<PathBuf>,
}

pub async fn run_benchmark(ctx: &StackContext, args: BenchmarkArgs) -> CtlResult<()> {
    let plans = select_plans(&args.plans)?;
    let bench = &ctx.config.benchmark;
    let requests = args.requests.unwrap_or(bench.requests);
    let concurrency = args.concurrency.unwrap_or(bench.concurrency);
    if requests == 0 || concurrency == 0 {
        return Err(CtlError::Benchmark(
            "--requests and --concurrency must be positive".into(),
        ));
    }
    let output_dir = args
        .output
        .map(|p| ctx.paths.resolve(&p))
        .unwrap_or_else(|| bench.output_dir.clone());

    ensure_setup(ctx, false).await?;
    let env = env_file::read(&ctx.paths.env_file())?;
    let api_key = env
        .get(env_file::ANON_KEY)
        .filter(|k| !k.is_empty())
        .cloned()
        .ok_or_else(|| CtlError::Config(format!("{} missing from .env", env_file::ANON_KEY)))?;
    let base = match &bench.api_url {
        Some(url) => url.trim_end_matches('/').to_string(),
        None => format!("http://localhost:{}", env_file::kong_http_port(&env)?),
    };
    let load = LoadTest {
        url: format!("{base}{}", bench.path),
        api_key,
        requests,
        concurrency,
        timeout: Duration::from_secs(bench.timeout_secs),
    };

    let started_at = Utc::now();
    let mut results = Vec::with_capacity(plans.len());
    for plan in plans {
        info!(plan = plan.name, "benchmarking plan");
        let result = bench_plan(ctx, plan, &load).await;
        // Always stop before moving on or reporting an error.
        match stop_stack(ctx, false).await {
            Ok(()) => {}
            Err(e) if result.is_err() => warn!(error = %e, "stop after failed plan also failed"),
            Err(e) => return Err(e),
        }
        results.push(result?);
    }

    let summary = BenchmarkSummary {
        started_at,
        url: load.url,
        requests,
        concurrency,
        plans: results,
    };
    let dir = output_dir.join(started_at.format("%Y%m%d-%H%M%S").to_string());
    let (json, md) = summary.write(&dir).await?;
    print!("{}", summary.to_markdown());
    println!();
    println!("wrote {} and {}", json.display(), md.display());
    Ok(())
}

/// Start `plan`, let it settle, measure.
async fn bench_plan(ctx: &StackContext, plan: &Plan, load: &LoadTest) -> CtlResult<PlanResult> {
    let session = start_stack(ctx, plan).await?;
    settle(ctx).await;

    let running: Vec<String> = ctx
        .orchestrator
        .ps()
        .await?
        .into_iter()
        .filter(|c| c.is_running())
        .map(|c| c.name)
        .collect();
    let containers = ctx.orchestrator.stats(&running).await?;
    let slice = match (&session.slice, &ctx.slices) {
        (Some(name), Some(slices)) => Some(slices.state(name).await?),
        _ => None,
    };

    let result = load.run().await?;
    Ok(PlanResult {
        plan: plan.name.to_string(),
        description: plan.description(),
        mode: session.mode,
        containers,
        slice,
        load: result,
    })
}

/// Validate every requested plan up front; empty means all of them.
fn select_plans(names: &[String]) -> CtlResult<Vec<&'static Plan>> {
    if names.is_empty() {
        return Ok(PLANS.iter().collect());
    }
    names
        .iter()
        .map(|n| Plan::parse(n.trim()).map_err(CtlError::from))
        .collect()
}

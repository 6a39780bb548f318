mod bootstrap;
mod cmd;
mod config;
mod context;
mod env_file;
mod error;
mod jwt;
mod limits;
mod loadtest;
mod report;
mod session;
#[cfg(test)]
mod testing;

use std::fmt;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::fmt::time::FormatTime;

use crate::context::StackContext;
use crate::error::{CtlError, CtlResult};

struct Elapsed(Instant);

impl FormatTime for Elapsed {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> fmt::Result {
        let d = self.0.elapsed();
        let total_secs = d.as_secs();
        let mins = total_secs / 60;
        let secs = total_secs % 60;
        let millis = d.subsec_millis();
        write!(w, "[{mins:02}:{secs:02}:{millis:03}]")
    }
}

#[derive(Parser)]
#[command(name = "stackctl", version, about = "Operate a self-hosted Supabase stack")]
struct Cli {
    /// Directory holding the compose project and `.env`
    #[arg(long, global = true, env = "STACK_PROJECT_DIR", default_value = ".")]
    project_dir: PathBuf,
    /// Path to stack.yaml (default: <project-dir>/stack.yaml if present)
    #[arg(long, global = true, env = "STACK_CONFIG")]
    config: Option<PathBuf>,
    /// Debug logging
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create .env with fresh secrets and download missing init files
    Setup(cmd::SetupArgs),
    /// List resource plans
    Plans,
    /// Start the stack, optionally under a resource plan
    Start(cmd::StartArgs),
    /// Stop the stack and release its resource limits
    Stop,
    /// Show setup state, active plan, slice and container counts
    Status(cmd::StatusArgs),
    /// Show every container of the project
    ContainerStatus,
    /// Show CPU and memory usage of running containers
    Resources,
    /// Show service logs
    Logs(cmd::LogsArgs),
    /// Wipe data (fast), or remove volumes and recreate them (--hard)
    Reset(cmd::ResetArgs),
    /// Start each plan in turn and measure it under HTTP load
    Benchmark(cmd::BenchmarkArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(usage_exit_code(e.kind()));
        }
    };

    tracing_subscriber::fmt()
        .with_timer(Elapsed(Instant::now()))
        .with_writer(std::io::stderr)
        .with_max_level(if cli.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        })
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if std::io::stderr().is_terminal() {
                eprintln!("\x1b[31merror:\x1b[0m {e}");
            } else {
                eprintln!("error: {e}");
            }
            ExitCode::FAILURE
        }
    }
}

/// Help and version requests succeed; every usage error is a failure.
fn usage_exit_code(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
        _ => 1,
    }
}

async fn run(cli: Cli) -> CtlResult<()> {
    let project_dir = std::path::absolute(&cli.project_dir).map_err(|e| {
        CtlError::Config(format!(
            "project dir {}: {e}",
            cli.project_dir.display()
        ))
    })?;
    let config_path = cli.config.as_deref();
    let open = || StackContext::open(project_dir.clone(), config_path);

    match cli.command {
        Command::Setup(args) => cmd::run_setup(&project_dir, config_path, args).await,
        Command::Plans => {
            cmd::run_plans();
            Ok(())
        }
        Command::Start(args) => cmd::run_start(&open().await?, args).await,
        Command::Stop => cmd::run_stop(&open().await?).await,
        Command::Status(args) => cmd::run_status(&open().await?, args).await,
        Command::ContainerStatus => cmd::run_container_status(&open().await?).await,
        Command::Resources => cmd::run_resources(&open().await?).await,
        Command::Logs(args) => cmd::run_logs(&open().await?, args).await,
        Command::Reset(args) => cmd::run_reset(&open().await?, args).await,
        Command::Benchmark(args) => cmd::run_benchmark(&open().await?, args).await,
    }
}

use clap::Args;
use stack::LogsRequest;

use crate::context::StackContext;
use crate::error::CtlResult;

#[derive(Args)]
pub struct LogsArgs {
    /// Only show logs of this service
    pub service: Option<String>,
    /// Lines to show from the end of each log
    #[arg(long, default_value_t = 100)]
    pub tail: u32,
    /// Print the current logs and exit
    #[arg(long)]
    pub no_follow: bool,
}

pub async fn run_logs(ctx: &StackContext, args: LogsArgs) -> CtlResult<()> {
    ctx.orchestrator
        .logs(&LogsRequest {
            service: args.service.as_deref(),
            tail: args.tail,
            follow: !args.no_follow,
        })
        .await?;
    Ok(())
}

use stack::ContainerState;

use crate::context::StackContext;
use crate::error::CtlResult;

pub async fn run_container_status(ctx: &StackContext) -> CtlResult<()> {
    let containers = ctx.orchestrator.ps().await?;
    if containers.is_empty() {
        println!("no containers");
        return Ok(());
    }
    print!("{}", format_table(&containers));
    Ok(())
}

pub(crate) fn format_table(containers: &[ContainerState]) -> String {
    let rows: Vec<Vec<String>> = containers
        .iter()
        .map(|c| {
            vec![
                c.name.clone(),
                c.service.clone(),
                c.state.clone(),
                if c.health.is_empty() { "-".into() } else { c.health.clone() },
                c.ports.join(", "),
            ]
        })
        .collect();
    super::table(&["NAME", "SERVICE", "STATE", "HEALTH", "PORTS"], &rows)
}

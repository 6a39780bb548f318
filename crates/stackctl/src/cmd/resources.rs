use stack::{ContainerStats, SliceState};

use crate::context::StackContext;
use crate::error::CtlResult;

pub async fn run_resources(ctx: &StackContext) -> CtlResult<()> {
    let names: Vec<String> = ctx
        .orchestrator
        .ps()
        .await?
        .into_iter()
        .filter(|c| c.is_running())
        .map(|c| c.name)
        .collect();
    if names.is_empty() {
        println!("no running containers");
    } else {
        let stats = ctx.orchestrator.stats(&names).await?;
        print!("{}", format_stats(&stats));
    }

    if let Some(slices) = &ctx.slices {
        let state = slices.state(&ctx.config.slice).await?;
        println!();
        println!("{}", format_slice(&state));
    }
    Ok(())
}

fn format_stats(stats: &[ContainerStats]) -> String {
    let mut rows: Vec<Vec<String>> = stats
        .iter()
        .map(|s| {
            vec![
                s.name.clone(),
                format!("{:.2}%", s.cpu_percent),
                format_bytes(s.memory_bytes),
                format_bytes(s.memory_limit_bytes),
                s.pids.to_string(),
            ]
        })
        .collect();
    let cpu: f64 = stats.iter().map(|s| s.cpu_percent).sum();
    let memory: u64 = stats.iter().map(|s| s.memory_bytes).sum();
    rows.push(vec![
        "TOTAL".into(),
        format!("{cpu:.2}%"),
        format_bytes(memory),
        String::new(),
        String::new(),
    ]);
    super::table(&["NAME", "CPU", "MEMORY", "LIMIT", "PIDS"], &rows)
}

pub(crate) fn format_slice(state: &SliceState) -> String {
    if !state.active {
        return format!("slice {}: inactive", state.name);
    }
    let current = state.memory_current.map_or("-".into(), format_bytes);
    let max = state.memory_max.map_or("unlimited".into(), format_bytes);
    let cpu = state.cpu_quota.as_deref().unwrap_or("unlimited");
    format!(
        "slice {}: active, memory {current} / {max}, cpu quota {cpu}/s",
        state.name
    )
}

/// Binary units with one decimal, e.g. `1.5GiB`.
pub(crate) fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = "B";
    for next in UNITS {
        unit = next;
        if value < 1024.0 || next == "TiB" {
            break;
        }
        value /= 1024.0;
    }
    if unit == "B" {
        format!("{bytes}B")
    } else {
        format!("{value:.1}{unit}")
    }
}

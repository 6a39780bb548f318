//! Compose override files layered on top of the project's own compose files.

use std::collections::BTreeMap;

use serde::Serialize;
use stack::{ResourceLimits, StackError};

/// Share of the plan's memory and CPU given to each service, in percent.
/// Services not listed here run without per-service limits.
pub const SERVICE_SHARES: [(&str, u32); 9] = [
    ("db", 40),
    ("studio", 12),
    ("rest", 10),
    ("storage", 10),
    ("kong", 8),
    ("auth", 6),
    ("supavisor", 6),
    ("imgproxy", 4),
    ("meta", 4),
];

const MIN_SERVICE_MEMORY_MB: u64 = 64;
const MIN_SERVICE_CPUS: f64 = 0.1;

const HEADER: &str = "# Generated by stackctl. Removed on stop; do not edit.\n";

#[derive(Serialize)]
struct ComposeOverride {
    services: BTreeMap<String, ServiceOverride>,
}

#[derive(Serialize, Default)]
struct ServiceOverride {
    #[serde(skip_serializing_if = "Option::is_none")]
    cgroup_parent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mem_limit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cpus: Option<f64>,
}

fn render(services: BTreeMap<String, ServiceOverride>) -> stack::Result<String> {
    let body = serde_yaml_ng::to_string(&ComposeOverride { services })
        .map_err(|e| StackError::Parse(format!("serialize override: {e}")))?;
    Ok(format!("{HEADER}{body}"))
}

/// Place every service of the project under `slice`.
pub fn render_cgroup_parent(services: &[String], slice: &str) -> stack::Result<String> {
    let services = services
        .iter()
        .map(|name| {
            let entry = ServiceOverride {
                cgroup_parent: Some(slice.to_string()),
                ..Default::default()
            };
            (name.clone(), entry)
        })
        .collect();
    render(services)
}

/// Split `limits` across the known services present in the project.
pub fn render_static_limits(
    services: &[String],
    limits: &ResourceLimits,
) -> stack::Result<String> {
    let services = SERVICE_SHARES
        .iter()
        .filter(|(name, _)| services.iter().any(|s| s == name))
        .map(|(name, share)| {
            let memory_mb = (limits.memory_mb * u64::from(*share) / 100).max(MIN_SERVICE_MEMORY_MB);
            let cpus = (limits.cpus() * f64::from(*share) / 100.0).max(MIN_SERVICE_CPUS);
            let entry = ServiceOverride {
                mem_limit: Some(format!("{memory_mb}m")),
                cpus: Some((cpus * 100.0).round() / 100.0),
                ..Default::default()
            };
            (name.to_string(), entry)
        })
        .collect();
    render(services)
}

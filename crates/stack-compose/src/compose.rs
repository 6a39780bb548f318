use std::collections::BTreeSet;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use stack::{
    ContainerState, ContainerStats, DownRequest, ExecOutput, LogsRequest, Orchestrator,
    StackError,
};
use tracing::{debug, info};

use crate::command::{Privilege, exec, exec_inherit, output};

const DOCKER: &str = "docker";

#[derive(Debug, Clone)]
pub struct ComposeConfig {
    /// Directory compose resolves relative paths and `.env` against.
    pub project_dir: PathBuf,
    /// Base compose files, in `-f` order.
    pub compose_files: Vec<PathBuf>,
    /// Explicit project name; compose derives one from the directory otherwise.
    pub project_name: Option<String>,
}

/// [`Orchestrator`] backed by the `docker compose` CLI plugin.
pub struct DockerCompose {
    config: ComposeConfig,
}

impl DockerCompose {
    /// Create a compose backend after verifying docker is usable.
    pub async fn new(config: ComposeConfig) -> Result<Self, StackError> {
        crate::prerequisites::check_docker().await?;
        info!(
            project_dir = %config.project_dir.display(),
            files = config.compose_files.len(),
            "docker compose backend ready"
        );
        Ok(Self { config })
    }

    /// Arguments for `docker <args>` running a compose subcommand.
    fn compose_args(&self, overrides: &[PathBuf], tail: &[&str]) -> Vec<String> {
        let mut args = vec![
            "compose".to_string(),
            "--project-directory".to_string(),
            self.config.project_dir.display().to_string(),
        ];
        if let Some(name) = &self.config.project_name {
            args.push("-p".into());
            args.push(name.clone());
        }
        for file in self.config.compose_files.iter().chain(overrides) {
            args.push("-f".into());
            args.push(file.display().to_string());
        }
        args.extend(tail.iter().map(|s| s.to_string()));
        args
    }

    async fn compose_capture(&self, tail: &[&str]) -> Result<String, StackError> {
        let args = self.compose_args(&[], tail);
        let refs: Vec<&str> = args.iter().map(String::as_str).collect();
        Ok(exec(DOCKER, &refs, Privilege::User).await?)
    }

    async fn compose_inherit(&self, overrides: &[PathBuf], tail: &[&str]) -> Result<(), StackError> {
        let args = self.compose_args(overrides, tail);
        let refs: Vec<&str> = args.iter().map(String::as_str).collect();
        Ok(exec_inherit(DOCKER, &refs, Privilege::User).await?)
    }
}

#[async_trait]
impl Orchestrator for DockerCompose {
    fn name(&self) -> &str {
        "docker compose"
    }

    async fn services(&self) -> stack::Result<Vec<String>> {
        let out = self.compose_capture(&["config", "--services"]).await?;
        Ok(out
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }

    async fn cgroup_driver(&self) -> stack::Result<String> {
        Ok(exec(
            DOCKER,
            &["info", "--format", "{{.CgroupDriver}}"],
            Privilege::User,
        )
        .await?)
    }

    async fn up(&self, overrides: &[PathBuf]) -> stack::Result<()> {
        self.compose_inherit(overrides, &["up", "-d", "--remove-orphans"])
            .await
    }

    async fn down(&self, request: &DownRequest<'_>) -> stack::Result<()> {
        self.compose_inherit(request.overrides, &down_args(request.remove_volumes))
            .await
    }

    async fn ps(&self) -> stack::Result<Vec<ContainerState>> {
        let out = self
            .compose_capture(&["ps", "--all", "--format", "json"])
            .await?;
        parse_ps(&out)
    }

    async fn stats(&self, containers: &[String]) -> stack::Result<Vec<ContainerStats>> {
        if containers.is_empty() {
            return Ok(Vec::new());
        }
        let mut args = vec!["stats", "--no-stream", "--format", "{{json .}}"];
        args.extend(containers.iter().map(String::as_str));
        let out = exec(DOCKER, &args, Privilege::User).await?;
        parse_stats(&out)
    }

    async fn logs(&self, request: &LogsRequest<'_>) -> stack::Result<()> {
        let tail = request.tail.to_string();
        let mut args = vec!["logs", "--tail", tail.as_str()];
        if request.follow {
            args.push("--follow");
        }
        if let Some(service) = request.service {
            args.push(service);
        }
        self.compose_inherit(&[], &args).await
    }

    async fn exec(&self, container: &str, args: &[&str]) -> stack::Result<ExecOutput> {
        let mut full = vec!["exec", container];
        full.extend_from_slice(args);
        let out = output(DOCKER, &full, Privilege::User).await?;
        let exit_code = out.status.code().unwrap_or(-1);
        debug!(container, exit_code, "docker exec finished");
        Ok(ExecOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
        })
    }
}

/// Compose subcommand tail for `down`.
fn down_args(remove_volumes: bool) -> Vec<&'static str> {
    let mut tail = vec!["down", "--remove-orphans"];
    if remove_volumes {
        tail.push("-v");
    }
    tail
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PsEntry {
    name: String,
    service: String,
    state: String,
    #[serde(default)]
    health: String,
    #[serde(default)]
    publishers: Option<Vec<Publisher>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Publisher {
    #[serde(default)]
    target_port: u16,
    #[serde(default)]
    published_port: u16,
    #[serde(default)]
    protocol: String,
}

impl From<PsEntry> for ContainerState {
    fn from(entry: PsEntry) -> Self {
        // IPv4 and IPv6 bindings of the same port show up twice.
        let ports: BTreeSet<String> = entry
            .publishers
            .unwrap_or_default()
            .iter()
            .filter(|p| p.published_port != 0)
            .map(|p| format!("{}->{}/{}", p.published_port, p.target_port, p.protocol))
            .collect();
        Self {
            name: entry.name,
            service: entry.service,
            state: entry.state,
            health: entry.health,
            ports: ports.into_iter().collect(),
        }
    }
}

/// Parse `compose ps --format json`.
///
/// Older compose releases print one JSON array, newer ones one object per line.
fn parse_ps(raw: &str) -> stack::Result<Vec<ContainerState>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    let entries: Vec<PsEntry> = if raw.starts_with('[') {
        serde_json::from_str(raw).map_err(|e| StackError::Parse(format!("compose ps: {e}")))?
    } else {
        raw.lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| {
                serde_json::from_str(l).map_err(|e| StackError::Parse(format!("compose ps: {e}")))
            })
            .collect::<Result<_, _>>()?
    };
    Ok(entries.into_iter().map(ContainerState::from).collect())
}

#[derive(Debug, Deserialize)]
struct StatsEntry {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "CPUPerc")]
    cpu_perc: String,
    #[serde(rename = "MemUsage")]
    mem_usage: String,
    #[serde(rename = "PIDs", default)]
    pids: String,
}

/// Parse `docker stats --no-stream --format '{{json .}}'`.
fn parse_stats(raw: &str) -> stack::Result<Vec<ContainerStats>> {
    raw.lines()
        .filter(|l| !l.trim().is_empty())
        .map(|line| {
            let entry: StatsEntry = serde_json::from_str(line)
                .map_err(|e| StackError::Parse(format!("docker stats: {e}")))?;
            let cpu_percent = parse_percent(&entry.cpu_perc)?;
            let (used, limit) = entry
                .mem_usage
                .split_once('/')
                .ok_or_else(|| StackError::Parse(format!("mem usage: {}", entry.mem_usage)))?;
            Ok(ContainerStats {
                name: entry.name,
                cpu_percent,
                memory_bytes: parse_size(used)?,
                memory_limit_bytes: parse_size(limit)?,
                pids: entry.pids.trim().parse().unwrap_or(0),
            })
        })
        .collect()
}

fn parse_percent(raw: &str) -> stack::Result<f64> {
    let trimmed = raw.trim().trim_end_matches('%');
    if trimmed == "--" {
        return Ok(0.0);
    }
    trimmed
        .parse()
        .map_err(|_| StackError::Parse(format!("percentage: {raw}")))
}

/// Parse a docker size like `12.5MiB`, `1.944GiB` or `512kB` into bytes.
fn parse_size(raw: &str) -> stack::Result<u64> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(raw.len());
    let (number, unit) = raw.split_at(split);
    let value: f64 = number
        .trim()
        .parse()
        .map_err(|_| StackError::Parse(format!("size: {raw}")))?;
    let multiplier: f64 = match unit {
        "" | "B" => 1.0,
        "kB" | "KB" => 1e3,
        "MB" => 1e6,
        "GB" => 1e9,
        "TB" => 1e12,
        "KiB" => 1024.0,
        "MiB" => 1024.0 * 1024.0,
        "GiB" => 1024.0 * 1024.0 * 1024.0,
        "TiB" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        other => return Err(StackError::Parse(format!("size unit '{other}' in {raw}"))),
    };
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Ok((value * multiplier).round() as u64)
}

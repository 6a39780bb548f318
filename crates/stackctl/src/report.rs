//! Benchmark summary files.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use stack::{ContainerStats, SliceState};

use crate::error::{CtlError, CtlResult};
use crate::loadtest::LoadTestResult;
use crate::session::LimitMode;

const MIB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Serialize)]
pub struct BenchmarkSummary {
    pub started_at: DateTime<Utc>,
    pub url: String,
    pub requests: usize,
    pub concurrency: usize,
    pub plans: Vec<PlanResult>,
}

/// Measurements for one plan.
#[derive(Debug, Serialize)]
pub struct PlanResult {
    pub plan: String,
    pub description: String,
    pub mode: LimitMode,
    pub containers: Vec<ContainerStats>,
    /// Present when the plan ran under a slice.
    pub slice: Option<SliceState>,
    pub load: LoadTestResult,
}

impl PlanResult {
    pub fn memory_bytes(&self) -> u64 {
        self.containers.iter().map(|c| c.memory_bytes).sum()
    }

    pub fn cpu_percent(&self) -> f64 {
        self.containers.iter().map(|c| c.cpu_percent).sum()
    }
}

impl BenchmarkSummary {
    /// Write `summary.json` and `summary.md` into `dir`.
    pub async fn write(&self, dir: &Path) -> CtlResult<(PathBuf, PathBuf)> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| CtlError::Internal(format!("create {}: {e}", dir.display())))?;

        let json_path = dir.join("summary.json");
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| CtlError::Internal(format!("serialize summary: {e}")))?;
        tokio::fs::write(&json_path, json)
            .await
            .map_err(|e| CtlError::Internal(format!("write {}: {e}", json_path.display())))?;

        let md_path = dir.join("summary.md");
        tokio::fs::write(&md_path, self.to_markdown())
            .await
            .map_err(|e| CtlError::Internal(format!("write {}: {e}", md_path.display())))?;

        Ok((json_path, md_path))
    }

    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# Benchmark {}", self.started_at.format("%Y-%m-%d %H:%M:%S UTC"));
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "`GET {}`, {} requests, concurrency {}",
            self.url, self.requests, self.concurrency
        );
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "| Plan | Mode | Memory (MiB) | CPU % | Req/s | OK | Failed | p50 ms | p95 ms | p99 ms | Max ms |"
        );
        let _ = writeln!(out, "|---|---|---:|---:|---:|---:|---:|---:|---:|---:|---:|");
        for r in &self.plans {
            let l = &r.load.latency;
            let _ = writeln!(
                out,
                "| {} | {} | {:.0} | {:.1} | {:.1} | {} | {} | {:.1} | {:.1} | {:.1} | {:.1} |",
                r.plan,
                r.mode,
                r.memory_bytes() as f64 / MIB,
                r.cpu_percent(),
                r.load.requests_per_sec,
                r.load.succeeded,
                r.load.failed,
                l.p50_ms,
                l.p95_ms,
                l.p99_ms,
                l.max_ms,
            );
        }
        out
    }
}

//! Concurrent HTTP load generator for the benchmark.

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::error::{CtlError, CtlResult};

pub struct LoadTest {
    pub url: String,
    /// Sent as both `apikey` and a bearer token.
    pub api_key: String,
    pub requests: usize,
    pub concurrency: usize,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadTestResult {
    pub requests: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub wall_ms: u64,
    pub requests_per_sec: f64,
    pub latency: LatencySummary,
}

/// Latencies of all requests, in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LatencySummary {
    pub mean_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub max_ms: f64,
}

impl LoadTest {
    /// Send `requests` GETs, at most `concurrency` in flight.
    ///
    /// A non-2xx status or transport error counts as a failure, not an error.
    pub async fn run(&self) -> CtlResult<LoadTestResult> {
        let client = self.client()?;
        let semaphore = Arc::new(Semaphore::new(self.concurrency.max(1)));
        let mut tasks = JoinSet::new();

        info!(
            url = %self.url,
            requests = self.requests,
            concurrency = self.concurrency,
            "load test started"
        );
        let started = Instant::now();
        for _ in 0..self.requests {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| CtlError::Benchmark(format!("semaphore closed: {e}")))?;
            let client = client.clone();
            let url = self.url.clone();
            tasks.spawn(async move {
                let _permit = permit;
                let t = Instant::now();
                let ok = match client.get(&url).send().await {
                    Ok(response) => response.status().is_success(),
                    Err(e) => {
                        debug!(error = %e, "request failed");
                        false
                    }
                };
                (ok, t.elapsed())
            });
        }

        let mut latencies = Vec::with_capacity(self.requests);
        let mut succeeded = 0;
        while let Some(joined) = tasks.join_next().await {
            let (ok, latency) =
                joined.map_err(|e| CtlError::Benchmark(format!("request task panicked: {e}")))?;
            if ok {
                succeeded += 1;
            }
            latencies.push(latency);
        }
        let wall = started.elapsed();

        let result = LoadTestResult {
            requests: self.requests,
            succeeded,
            failed: self.requests - succeeded,
            wall_ms: u64::try_from(wall.as_millis()).unwrap_or(u64::MAX),
            requests_per_sec: rate(self.requests, wall),
            latency: summarize(&mut latencies),
        };
        info!(
            succeeded = result.succeeded,
            failed = result.failed,
            rps = %format!("{:.1}", result.requests_per_sec),
            p95_ms = %format!("{:.1}", result.latency.p95_ms),
            "load test finished"
        );
        Ok(result)
    }

    fn client(&self) -> CtlResult<reqwest::Client> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&self.api_key)
            .map_err(|e| CtlError::Benchmark(format!("invalid api key: {e}")))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|e| CtlError::Benchmark(format!("invalid api key: {e}")))?;
        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);

        reqwest::Client::builder()
            .default_headers(headers)
            .timeout(self.timeout)
            .pool_max_idle_per_host(self.concurrency)
            .build()
            .map_err(|e| CtlError::Benchmark(format!("build http client: {e}")))
    }
}

fn rate(count: usize, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 { count as f64 / secs } else { 0.0 }
}

/// Sorts `latencies` in place.
fn summarize(latencies: &mut [Duration]) -> LatencySummary {
    if latencies.is_empty() {
        return LatencySummary::default();
    }
    latencies.sort_unstable();
    let ms = |d: Duration| d.as_micros() as f64 / 1000.0;
    let total: f64 = latencies.iter().copied().map(ms).sum();
    LatencySummary {
        mean_ms: total / latencies.len() as f64,
        p50_ms: percentile(latencies, 50).map_or(0.0, ms),
        p95_ms: percentile(latencies, 95).map_or(0.0, ms),
        p99_ms: percentile(latencies, 99).map_or(0.0, ms),
        max_ms: latencies.last().copied().map_or(0.0, ms),
    }
}

/// Nearest-rank percentile of a sorted slice.
fn percentile(sorted: &[Duration], p: usize) -> Option<Duration> {
    let rank = (p * sorted.len()).div_ceil(100).max(1);
    sorted.get(rank - 1).copied()
}

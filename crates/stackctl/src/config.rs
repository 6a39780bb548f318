use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CtlError, CtlResult};

pub(crate) const CONFIG_FILE: &str = "stack.yaml";
pub(crate) const DEFAULT_SLICE: &str = "supabase-stack.slice";
pub(crate) const DEFAULT_SETTLE_SECS: u64 = 20;
pub(crate) const DEFAULT_INIT_SOURCE: &str =
    "https://raw.githubusercontent.com/supabase/supabase/master/docker";
pub(crate) const DEFAULT_REQUESTS: usize = 1000;
pub(crate) const DEFAULT_CONCURRENCY: usize = 20;

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackConfig {
    pub compose_files: Vec<PathBuf>,
    pub project_name: Option<String>,
    /// systemd slice holding the stack's containers for limited plans.
    pub slice: String,
    /// Fixed delay after `up` before the stack is considered settled.
    pub settle_secs: u64,
    pub init: InitConfig,
    pub reset: ResetConfig,
    pub benchmark: BenchmarkConfig,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            compose_files: vec![PathBuf::from("docker-compose.yml")],
            project_name: None,
            slice: DEFAULT_SLICE.into(),
            settle_secs: DEFAULT_SETTLE_SECS,
            init: InitConfig::default(),
            reset: ResetConfig::default(),
            benchmark: BenchmarkConfig::default(),
        }
    }
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InitConfig {
    /// Base URL the init files and `.env.example` are fetched from.
    pub source_url: String,
}

impl Default for InitConfig {
    fn default() -> Self {
        Self {
            source_url: DEFAULT_INIT_SOURCE.into(),
        }
    }
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResetConfig {
    pub db_container: String,
    pub db_user: String,
    pub db_name: String,
    /// Tables truncated by a fast reset, schema-qualified.
    pub tables: Vec<String>,
    /// Emptied by a fast reset.
    pub storage_dir: PathBuf,
    /// Deleted and recreated by a hard reset.
    pub data_dirs: Vec<PathBuf>,
}

impl Default for ResetConfig {
    fn default() -> Self {
        Self {
            db_container: "supabase-db".into(),
            db_user: "postgres".into(),
            db_name: "postgres".into(),
            tables: vec![
                "auth.users".into(),
                "auth.audit_log_entries".into(),
                "storage.buckets".into(),
                "storage.objects".into(),
            ],
            storage_dir: PathBuf::from("volumes/storage"),
            data_dirs: vec![
                PathBuf::from("volumes/db/data"),
                PathBuf::from("volumes/storage"),
            ],
        }
    }
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkConfig {
    /// Defaults to `http://localhost:$KONG_HTTP_PORT`.
    pub api_url: Option<String>,
    pub path: String,
    pub requests: usize,
    pub concurrency: usize,
    pub timeout_secs: u64,
    pub output_dir: PathBuf,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            path: "/rest/v1/".into(),
            requests: DEFAULT_REQUESTS,
            concurrency: DEFAULT_CONCURRENCY,
            timeout_secs: 10,
            output_dir: PathBuf::from("benchmarks"),
        }
    }
}

/// Load the stack config.
///
/// An explicit `config_path` must exist. Otherwise `stack.yaml` in the
/// project directory is used when present, and defaults when not. Relative
/// paths resolve against the config file's directory (the project directory
/// for defaults).
pub async fn load(project_dir: &Path, config_path: Option<&Path>) -> CtlResult<StackConfig> {
    let implicit = project_dir.join(CONFIG_FILE);
    let (path, required) = match config_path {
        Some(p) => (p.to_path_buf(), true),
        None => (implicit, false),
    };

    let exists = tokio::fs::try_exists(&path)
        .await
        .map_err(|e| CtlError::Config(format!("check {}: {e}", path.display())))?;

    let mut config = if exists {
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| CtlError::Config(format!("read {}: {e}", path.display())))?;
        let mut config: StackConfig = serde_yaml_ng::from_str(&content)
            .map_err(|e| CtlError::Config(format!("parse {}: {e}", path.display())))?;
        config.resolve_relative_paths(path.parent().unwrap_or(project_dir));
        tracing::debug!(path = %path.display(), "config loaded");
        config
    } else if required {
        return Err(CtlError::Config(format!(
            "config file not found: {}",
            path.display()
        )));
    } else {
        let mut config = StackConfig::default();
        config.resolve_relative_paths(project_dir);
        config
    };

    config.validate()?;
    config.benchmark.path = normalize_path(&config.benchmark.path);
    Ok(config)
}

impl StackConfig {
    /// Resolve relative paths against `base` (the directory containing the YAML file).
    fn resolve_relative_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        self.compose_files.iter_mut().for_each(resolve);
        resolve(&mut self.reset.storage_dir);
        self.reset.data_dirs.iter_mut().for_each(resolve);
        resolve(&mut self.benchmark.output_dir);
    }

    fn validate(&self) -> CtlResult<()> {
        if self.compose_files.is_empty() {
            return Err(CtlError::Config("compose_files must not be empty".into()));
        }
        stack_compose::validate_slice_name(&self.slice)?;
        if let Some(bad) = self.reset.tables.iter().find(|t| !is_table_name(t)) {
            return Err(CtlError::Config(format!(
                "reset.tables: invalid table name '{bad}' (expected schema.table)"
            )));
        }
        if self.reset.db_container.is_empty() {
            return Err(CtlError::Config("reset.db_container must not be empty".into()));
        }
        if self.benchmark.requests == 0 || self.benchmark.concurrency == 0 {
            return Err(CtlError::Config(
                "benchmark.requests and benchmark.concurrency must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// `table` or `schema.table`, each part `[A-Za-z0-9_]+`.
pub(crate) fn is_table_name(name: &str) -> bool {
    let ident = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    match name.split_once('.') {
        Some((schema, table)) => ident(schema) && ident(table),
        None => ident(name),
    }
}

fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{CtlError, CtlResult};

/// How the running stack's resources are limited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitMode {
    /// All containers run under a systemd slice.
    Slice,
    /// Per-service compose limits.
    Static,
    Unlimited,
}

impl std::fmt::Display for LimitMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            LimitMode::Slice => "slice",
            LimitMode::Static => "static",
            LimitMode::Unlimited => "unlimited",
        })
    }
}

/// What `start` set up, so `stop` and `status` can find it again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub plan: String,
    pub mode: LimitMode,
    pub slice: Option<String>,
    pub overrides: Vec<PathBuf>,
    #[serde(serialize_with = "serialize_iso")]
    pub started_at: DateTime<Utc>,
}

/// Serialize as ISO 8601 with millisecond precision.
fn serialize_iso<S: serde::Serializer>(dt: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
}

impl Session {
    /// Read the session record; `None` when no stack was started.
    pub async fn load(path: &Path) -> CtlResult<Option<Self>> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CtlError::Internal(format!("read {}: {e}", path.display())));
            }
        };
        match serde_json::from_str(&content) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                // A corrupt record must not block `stop`.
                warn!(error = %e, path = %path.display(), "ignoring unreadable session file");
                Ok(None)
            }
        }
    }

    /// Atomic write: write to a temp file in the same directory, then rename.
    pub async fn save(&self, path: &Path) -> CtlResult<()> {
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| CtlError::Internal(format!("create {}: {e}", dir.display())))?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| CtlError::Internal(format!("serialize session: {e}")))?;
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, json.as_bytes())
            .await
            .map_err(|e| CtlError::Internal(format!("write {}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| CtlError::Internal(format!("rename {}: {e}", path.display())))
    }

    /// Remove the session record if present.
    pub async fn clear(path: &Path) -> CtlResult<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CtlError::Internal(format!(
                "remove {}: {e}",
                path.display()
            ))),
        }
    }
}

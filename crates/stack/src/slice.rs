use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ResourceLimits, SliceState};

/// Host init-system support for resource-limited process groups.
#[async_trait]
pub trait SliceManager: Send + Sync {
    /// Human-readable name for this backend (e.g. "systemd").
    fn name(&self) -> &str;
    /// Start `slice` and apply `limits` to it. Idempotent.
    async fn create(&self, slice: &str, limits: &ResourceLimits) -> Result<()>;
    /// Stop `slice`. A slice that does not exist is not an error.
    async fn remove(&self, slice: &str);
    /// Current state of `slice`; inactive if it does not exist.
    async fn state(&self, slice: &str) -> Result<SliceState>;
}

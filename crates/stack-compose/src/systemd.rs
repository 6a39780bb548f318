use std::path::Path;

use async_trait::async_trait;
use stack::{ResourceLimits, SliceManager, SliceState, StackError};
use tracing::{info, warn};

use crate::command::{Privilege, exec, exec_inherit};

const SYSTEMCTL: &str = "systemctl";

/// Present when systemd is the running init system.
const SYSTEMD_RUNTIME_DIR: &str = "/run/systemd/system";

/// [`SliceManager`] backed by `systemctl`.
pub struct SystemdSlices {
    privilege: Privilege,
}

impl SystemdSlices {
    /// Returns `None` unless this host runs systemd and `systemctl` is on PATH.
    pub fn detect() -> Option<Self> {
        if !cfg!(target_os = "linux") {
            return None;
        }
        if which::which(SYSTEMCTL).is_err() || !Path::new(SYSTEMD_RUNTIME_DIR).is_dir() {
            return None;
        }
        Some(Self {
            privilege: Privilege::elevated(),
        })
    }
}

/// A slice unit name: `[A-Za-z0-9_.-]+` ending in `.slice`.
pub fn validate_slice_name(name: &str) -> Result<(), StackError> {
    let Some(stem) = name.strip_suffix(".slice") else {
        return Err(StackError::InvalidConfig(format!(
            "slice name must end in .slice: {name}"
        )));
    };
    let valid = !stem.is_empty()
        && stem
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if valid {
        Ok(())
    } else {
        Err(StackError::InvalidConfig(format!(
            "invalid slice name: {name}"
        )))
    }
}

#[async_trait]
impl SliceManager for SystemdSlices {
    fn name(&self) -> &str {
        "systemd"
    }

    async fn create(&self, slice: &str, limits: &ResourceLimits) -> stack::Result<()> {
        validate_slice_name(slice)?;
        exec_inherit(SYSTEMCTL, &["start", slice], self.privilege).await?;
        let args = set_property_args(slice, limits);
        let refs: Vec<&str> = args.iter().map(String::as_str).collect();
        exec_inherit(SYSTEMCTL, &refs, self.privilege).await?;
        info!(
            slice,
            memory = %limits.memory_max(),
            cpu = %limits.cpu_quota(),
            "slice created"
        );
        Ok(())
    }

    async fn remove(&self, slice: &str) {
        if let Err(e) = exec_inherit(SYSTEMCTL, &["stop", slice], self.privilege).await {
            warn!(slice, error = %e, "failed to stop slice");
        }
    }

    async fn state(&self, slice: &str) -> stack::Result<SliceState> {
        let out = exec(
            SYSTEMCTL,
            &[
                "show",
                slice,
                "--property=ActiveState,MemoryCurrent,MemoryMax,CPUQuotaPerSecUSec",
            ],
            Privilege::User,
        )
        .await?;
        Ok(parse_show(slice, &out))
    }
}

/// `systemctl` arguments applying `limits` to a started slice until reboot.
fn set_property_args(slice: &str, limits: &ResourceLimits) -> Vec<String> {
    vec![
        "set-property".into(),
        "--runtime".into(),
        slice.to_string(),
        format!("MemoryMax={}", limits.memory_max()),
        format!("CPUQuota={}", limits.cpu_quota()),
    ]
}

/// Parse `systemctl show` `Key=Value` output.
fn parse_show(slice: &str, raw: &str) -> SliceState {
    let mut state = SliceState {
        name: slice.to_string(),
        ..Default::default()
    };
    for line in raw.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "ActiveState" => state.active = value == "active",
            "MemoryCurrent" => state.memory_current = parse_bytes(value),
            "MemoryMax" => state.memory_max = parse_bytes(value),
            "CPUQuotaPerSecUSec" => state.cpu_quota = parse_unset(value).map(String::from),
            _ => {}
        }
    }
    state
}

/// `[not set]`, `infinity` and empty values mean "no value".
fn parse_unset(value: &str) -> Option<&str> {
    match value {
        "" | "infinity" | "[not set]" => None,
        other => Some(other),
    }
}

fn parse_bytes(value: &str) -> Option<u64> {
    parse_unset(value).and_then(|v| v.parse().ok())
}

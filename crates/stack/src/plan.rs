//! Named resource tiers.
//!
//! A plan maps a name like `4gb` to a memory ceiling and a CPU quota. The
//! table is static; `unlimited` is the only plan without limits.

use crate::error::{Result, StackError};
use crate::types::ResourceLimits;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Plan {
    pub name: &'static str,
    /// `None` for the unlimited plan.
    pub limits: Option<ResourceLimits>,
}

pub const PLANS: [Plan; 6] = [
    Plan::limited("1gb", 1024, 100),
    Plan::limited("2gb", 2 * 1024, 200),
    Plan::limited("4gb", 4 * 1024, 200),
    Plan::limited("8gb", 8 * 1024, 400),
    Plan::limited("16gb", 16 * 1024, 400),
    Plan {
        name: "unlimited",
        limits: None,
    },
];

pub(crate) fn plan_names() -> Vec<&'static str> {
    PLANS.iter().map(|p| p.name).collect()
}

impl Plan {
    const fn limited(name: &'static str, memory_mb: u64, cpu_quota_percent: u32) -> Self {
        Self {
            name,
            limits: Some(ResourceLimits {
                memory_mb,
                cpu_quota_percent,
            }),
        }
    }

    /// Find a plan by exact name.
    pub fn lookup(name: &str) -> Option<&'static Plan> {
        PLANS.iter().find(|p| p.name == name)
    }

    /// Like [`Plan::lookup`], but an unknown name is an error.
    pub fn parse(name: &str) -> Result<&'static Plan> {
        Self::lookup(name).ok_or_else(|| StackError::InvalidPlan(name.to_string()))
    }

    /// One-line description of the named plan, or `None` if the name is unknown.
    pub fn describe(name: &str) -> Option<String> {
        Self::lookup(name).map(Plan::description)
    }

    pub fn description(&self) -> String {
        match &self.limits {
            None => format!("{}: no memory or CPU limits", self.name),
            Some(limits) => format!(
                "{}: {} memory, {} CPU (MemoryMax={}, CPUQuota={})",
                self.name,
                limits.memory_display(),
                limits.cpu_display(),
                limits.memory_max(),
                limits.cpu_quota(),
            ),
        }
    }

    pub fn is_unlimited(&self) -> bool {
        self.limits.is_none()
    }
}

impl ResourceLimits {
    /// systemd `MemoryMax=` value: whole gibibytes as `G`, otherwise `M`.
    pub fn memory_max(&self) -> String {
        if self.memory_mb % 1024 == 0 {
            format!("{}G", self.memory_mb / 1024)
        } else {
            format!("{}M", self.memory_mb)
        }
    }

    /// systemd `CPUQuota=` value.
    pub fn cpu_quota(&self) -> String {
        format!("{}%", self.cpu_quota_percent)
    }

    /// CPU count as a decimal (`200%` → `2`, `150%` → `1.5`).
    pub fn cpus(&self) -> f64 {
        f64::from(self.cpu_quota_percent) / 100.0
    }

    fn memory_display(&self) -> String {
        if self.memory_mb % 1024 == 0 {
            format!("{} GiB", self.memory_mb / 1024)
        } else {
            format!("{} MiB", self.memory_mb)
        }
    }

    fn cpu_display(&self) -> String {
        let cpus = self.cpus();
        if cpus.fract() == 0.0 {
            format!("{cpus:.0}")
        } else {
            format!("{cpus:.2}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_plan_has_a_description() {
        for plan in &PLANS {
            let desc = Plan::describe(plan.name).unwrap();
            assert!(!desc.is_empty());
            assert!(desc.starts_with(plan.name), "got: {desc}");
        }
    }

    #[test]
    fn unknown_names_have_no_description() {
        for name in ["", "3gb", "4GB", "unlimited ", "small"] {
            assert!(Plan::describe(name).is_none(), "{name:?} should be unknown");
        }
    }

    #[test]
    fn parse_rejects_unknown_plan() {
        let err = Plan::parse("32gb").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("32gb"), "got: {msg}");
        assert!(msg.contains("unlimited"), "got: {msg}");
    }

    #[test]
    fn plan_names_are_unique() {
        let mut names = plan_names();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), PLANS.len());
    }

    #[test]
    fn only_unlimited_has_no_limits() {
        let unlimited: Vec<_> = PLANS.iter().filter(|p| p.is_unlimited()).collect();
        assert_eq!(unlimited.len(), 1);
        assert_eq!(unlimited[0].name, "unlimited");
    }

    #[test]
    fn systemd_values() {
        let plan = Plan::lookup("4gb").unwrap();
        let limits = plan.limits.unwrap();
        assert_eq!(limits.memory_max(), "4G");
        assert_eq!(limits.cpu_quota(), "200%");
        assert_eq!(
            plan.description(),
            "4gb: 4 GiB memory, 2 CPU (MemoryMax=4G, CPUQuota=200%)"
        );
    }

    #[test]
    fn odd_sizes_render_in_mebibytes() {
        let limits = ResourceLimits {
            memory_mb: 1536,
            cpu_quota_percent: 150,
        };
        assert_eq!(limits.memory_max(), "1536M");
        assert_eq!(limits.cpus(), 1.5);
        assert_eq!(limits.cpu_display(), "1.50");
    }
}

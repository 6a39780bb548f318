mod command;
mod compose;
mod overrides;
mod prerequisites;
mod systemd;

pub use command::{CommandError, Privilege, exec, exec_inherit};
pub use compose::{ComposeConfig, DockerCompose};
pub use overrides::{SERVICE_SHARES, render_cgroup_parent, render_static_limits};
pub use systemd::{SystemdSlices, validate_slice_name};

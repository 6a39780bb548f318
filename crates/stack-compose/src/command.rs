use std::process::Output;

use tokio::process::Command;
use tracing::trace;

/// Error from a failed command.
#[derive(Debug, thiserror::Error)]
#[error("command failed: {command}\n{detail}")]
pub struct CommandError {
    pub command: String,
    pub detail: String,
}

impl From<CommandError> for stack::StackError {
    fn from(e: CommandError) -> Self {
        stack::StackError::CommandFailed {
            command: e.command,
            detail: e.detail,
        }
    }
}

/// How a command should be executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privilege {
    /// Prefix with `sudo`; `sudo -n` when output is captured, since nobody
    /// can answer a password prompt there.
    Sudo,
    /// Run as the current user.
    User,
}

impl Privilege {
    /// `Sudo` unless the process already runs as root.
    pub fn elevated() -> Self {
        if nix::unistd::geteuid().is_root() {
            Privilege::User
        } else {
            Privilege::Sudo
        }
    }
}

/// Whether the command shares the terminal with the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stdio {
    Captured,
    Inherited,
}

/// Program and arguments as spawned.
fn command_line<'a>(
    program: &'a str,
    args: &[&'a str],
    privilege: Privilege,
    stdio: Stdio,
) -> Vec<&'a str> {
    let mut parts = Vec::with_capacity(args.len() + 3);
    if privilege == Privilege::Sudo {
        parts.push("sudo");
        if stdio == Stdio::Captured {
            parts.push("-n");
        }
    }
    parts.push(program);
    parts.extend_from_slice(args);
    parts
}

/// Format a human-readable display string for a direct command invocation.
fn format_command_display(
    program: &str,
    args: &[&str],
    privilege: Privilege,
    stdio: Stdio,
) -> String {
    command_line(program, args, privilege, stdio).join(" ")
}

fn build(program: &str, args: &[&str], privilege: Privilege, stdio: Stdio) -> Command {
    let mut line = command_line(program, args, privilege, stdio).into_iter();
    let mut cmd = Command::new(line.next().unwrap_or(program));
    cmd.args(line);
    cmd
}

/// Run a command and capture its output, whatever the exit status.
///
/// Only a failure to spawn is an error.
pub async fn output(
    program: &str,
    args: &[&str],
    privilege: Privilege,
) -> Result<Output, CommandError> {
    let cmd_display = format_command_display(program, args, privilege, Stdio::Captured);
    trace!(command = %cmd_display, "output");

    build(program, args, privilege, Stdio::Captured)
        .output()
        .await
        .map_err(|e| CommandError {
            command: cmd_display,
            detail: e.to_string(),
        })
}

/// Execute a command.
///
/// Invokes the program binary directly with the given arguments.
/// Returns trimmed stdout on success.
pub async fn exec(
    program: &str,
    args: &[&str],
    privilege: Privilege,
) -> Result<String, CommandError> {
    let output = output(program, args, privilege).await?;

    if output.status.success() {
        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(stdout)
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Err(CommandError {
            command: format_command_display(program, args, privilege, Stdio::Captured),
            detail: stderr,
        })
    }
}

/// Execute a command with the terminal attached (progress output, log streams).
pub async fn exec_inherit(
    program: &str,
    args: &[&str],
    privilege: Privilege,
) -> Result<(), CommandError> {
    let cmd_display = format_command_display(program, args, privilege, Stdio::Inherited);
    trace!(command = %cmd_display, "exec_inherit");

    let status = build(program, args, privilege, Stdio::Inherited)
        .status()
        .await
        .map_err(|e| CommandError {
            command: cmd_display.clone(),
            detail: e.to_string(),
        })?;

    if status.success() {
        Ok(())
    } else {
        Err(CommandError {
            command: cmd_display,
            detail: format!("exited with {status}"),
        })
    }
}

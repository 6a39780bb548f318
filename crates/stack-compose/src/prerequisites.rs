use stack::StackError;

use crate::command::{Privilege, exec};

/// Verify that docker and its compose plugin are installed and usable.
///
/// Collects all failures and returns them in a single `BackendNotAvailable` error.
pub async fn check_docker() -> Result<(), StackError> {
    let mut errors = Vec::new();

    if which::which("docker").is_err() {
        errors.push("required command not found: docker".to_string());
    } else {
        check_compose_plugin(&mut errors).await;
        check_daemon(&mut errors).await;
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(StackError::BackendNotAvailable(errors.join("; ")))
    }
}

async fn check_compose_plugin(errors: &mut Vec<String>) {
    if let Err(e) = exec("docker", &["compose", "version"], Privilege::User).await {
        errors.push(format!("docker compose plugin not available: {}", e.detail));
    }
}

async fn check_daemon(errors: &mut Vec<String>) {
    if let Err(e) = exec(
        "docker",
        &["info", "--format", "{{.ServerVersion}}"],
        Privilege::User,
    )
    .await
    {
        errors.push(format!(
            "docker daemon not reachable (is it running, and is this user in the docker group?): {}",
            e.detail
        ));
    }
}

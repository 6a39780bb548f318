use std::path::{Path, PathBuf};

/// Directory under the project root holding the session record and the
/// generated compose override files.
pub const STATE_DIR: &str = ".stack";

/// Project-level paths derived from the project directory.
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    root: PathBuf,
}

impl ProjectPaths {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn env_file(&self) -> PathBuf {
        self.root.join(".env")
    }

    pub fn env_example(&self) -> PathBuf {
        self.root.join(".env.example")
    }

    pub fn volumes(&self) -> PathBuf {
        self.root.join("volumes")
    }

    /// Resolve a project-relative path (absolute paths pass through).
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root.join(STATE_DIR)
    }

    pub fn session(&self) -> PathBuf {
        self.state_dir().join("session.json")
    }

    /// Override file placing every service under a systemd slice.
    pub fn cgroup_override(&self) -> PathBuf {
        self.state_dir().join("docker-compose.slice.yml")
    }

    /// Override file with static per-service limits for `plan`.
    pub fn static_override(&self, plan: &str) -> PathBuf {
        self.state_dir().join(format!("docker-compose.{plan}.yml"))
    }
}

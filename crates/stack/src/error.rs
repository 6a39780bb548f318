#[derive(Debug, thiserror::Error)]
pub enum StackError {
    #[error("unknown plan '{0}' (expected one of: {names})", names = crate::plan::plan_names().join(", "))]
    InvalidPlan(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("command failed: {command}\n{detail}")]
    CommandFailed { command: String, detail: String },

    #[error("backend not available: {0}")]
    BackendNotAvailable(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StackError>;

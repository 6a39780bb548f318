#[derive(Debug, thiserror::Error)]
pub enum CtlError {
    #[error(transparent)]
    Stack(#[from] stack::StackError),

    #[error("config error: {0}")]
    Config(String),

    #[error("setup required: {0}")]
    SetupRequired(String),

    #[error("download error: {0}")]
    Download(String),

    #[error("reset failed: {0}")]
    Reset(String),

    #[error("benchmark error: {0}")]
    Benchmark(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<stack_compose::CommandError> for CtlError {
    fn from(e: stack_compose::CommandError) -> Self {
        CtlError::Stack(e.into())
    }
}

pub type CtlResult<T> = Result<T, CtlError>;

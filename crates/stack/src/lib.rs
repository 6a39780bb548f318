mod error;
mod orchestrator;
mod paths;
mod plan;
mod setup;
mod slice;
mod types;

pub use error::{Result, StackError};
pub use orchestrator::Orchestrator;
pub use paths::{ProjectPaths, STATE_DIR};
pub use plan::{PLANS, Plan};
pub use setup::{INIT_FILES, MAX_MISSING_INIT_FILES, SetupReport, check_setup};
pub use slice::SliceManager;
pub use types::{
    ContainerState, ContainerStats, DownRequest, ExecOutput, LogsRequest, ResourceLimits,
    SliceState,
};

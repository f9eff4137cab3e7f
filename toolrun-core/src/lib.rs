pub mod batch;
pub mod config;
pub mod error;
pub mod models;

pub use batch::{load_batch, parse_batch};
pub use config::RunnerConfig;
pub use error::{Result, SpawnError, ToolrunError};
pub use models::{ExitOutcome, ProcessInvocation, ProcessResult, LINE_SEPARATOR};

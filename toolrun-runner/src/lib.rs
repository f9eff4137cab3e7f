pub mod args;
pub mod environment;
pub mod executor;
pub mod process;

pub use args::split_arguments;
pub use executor::{exit_code_of, OutputAccumulator, ProcessRunner};
pub use process::{resolve_executable, LaunchPlan};

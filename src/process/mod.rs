//! External process execution.
//!
//! Everything that touches the operating system's programs goes through the
//! [`CommandRunner`] trait. [`ProcessRunner`] is the real implementation
//! built on `tokio::process`.

mod path_finder;
mod runner;

pub(crate) use path_finder::find_executable;
pub(crate) use runner::split_command;
pub use runner::{CommandOutput, CommandRunner, ProcessError, ProcessRunner};

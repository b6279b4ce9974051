//! Local runner for Bitbucket-style CI pipelines.
//!
//! Each step of a pipeline runs in a fresh container: the project directory
//! is copied into a workspace, the step's commands are composed into one
//! shell script, and the script's combined output is split back into
//! per-command segments using random marker lines.
//!
//! - **[`core`]**: Pure logic (planning, cache paths, script composition,
//!   output demultiplexing). No I/O.
//! - **[`io`]**: Filesystem, process and container operations.
//!
//! [`run`] ties both together; [`report`] renders progress for the user.

pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod pipeline;
pub mod report;
pub mod run;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

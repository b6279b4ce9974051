//! Shared deterministic types for the execution engine.
//!
//! These types are the contract between the demultiplexer, the executor and
//! the orchestrator. They carry no I/O handles.

use std::path::PathBuf;

/// Bind mount of a host directory into the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub host: PathBuf,
    pub container: String,
}

/// Output captured for one command that actually ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub command: String,
    pub lines: Vec<String>,
}

/// Result of executing one step's script.
///
/// `commands` never holds more entries than the step declared: fail-fast
/// truncates it to the commands whose framing marker was observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Resolved exit status (0 = success).
    pub exit_code: i32,
    pub commands: Vec<CommandOutput>,
    /// Output printed before the first command started, such as a runtime
    /// error for a script that never ran or a failed ignore cleanup.
    pub preamble: Vec<String>,
    /// Set when the container environment itself failed (missing image,
    /// failed transfer, runtime error) rather than a user command.
    pub fault: Option<String>,
}

impl ExecutionResult {
    /// Result for a step that failed before or outside its script.
    pub fn fault(message: impl Into<String>) -> Self {
        Self {
            exit_code: -1,
            commands: Vec::new(),
            preamble: Vec::new(),
            fault: Some(message.into()),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0 && self.fault.is_none()
    }
}

/// Where the exit status of a script run comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusSource {
    /// Buffered capture: the runtime-reported code is authoritative.
    Reported(i32),
    /// Streaming capture: success is inferred from the sentinel marker on the
    /// final captured line; any transport code is ignored.
    Sentinel,
}

/// Per-step lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// Run-level lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Completed,
    StoppedEarly,
}

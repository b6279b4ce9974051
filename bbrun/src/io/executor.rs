//! Step execution inside an ephemeral container.
//!
//! [`ContainerExecutor`] owns the container lifecycle for one step: create,
//! prepare the workspace, run the composed script, capture output, tear down.
//! Every failure along the way becomes a failed [`ExecutionResult`]; nothing
//! here returns an error to the orchestrator.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, bail};
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument, warn};

use crate::core::demux::{Demultiplexer, demultiplex_buffered};
use crate::core::script::{ScriptRequest, compose_script};
use crate::core::tokens::Tokens;
use crate::core::types::{ExecutionResult, Mount, StatusSource};
use crate::io::container::{ContainerId, ContainerRuntime};

/// Container-side location of the composed script.
pub const SCRIPT_PATH: &str = "/tmp/bbrun-step.sh";

/// How script output is captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMode {
    /// Wait for completion; the runtime-reported exit code decides success.
    Buffered,
    /// Consume output chunk by chunk for live echo; a trailing sentinel
    /// marker decides success.
    Streaming,
}

/// Everything needed to run one step.
#[derive(Debug, Clone)]
pub struct StepRequest<'a> {
    pub image: &'a str,
    pub mounts: &'a [Mount],
    pub commands: &'a [String],
    /// Workspace-relative paths removed before the first command.
    pub ignored_paths: &'a [String],
    /// Host directory copied into the workspace.
    pub project_root: &'a Path,
    pub workspace_dir: &'a str,
    pub shell: &'a str,
    pub mode: CaptureMode,
}

pub struct ContainerExecutor<'r, R: ContainerRuntime + ?Sized> {
    runtime: &'r R,
}

impl<'r, R: ContainerRuntime + ?Sized> ContainerExecutor<'r, R> {
    pub fn new(runtime: &'r R) -> Self {
        Self { runtime }
    }

    /// Run one step. In streaming mode `echo` receives every output line as
    /// it is reconstructed; buffered runs echo nothing.
    #[instrument(skip_all, fields(image = %request.image, mode = ?request.mode))]
    pub fn run(&self, request: &StepRequest<'_>, echo: &mut dyn FnMut(&str)) -> ExecutionResult {
        match self.try_run(request, echo) {
            Ok(result) => {
                debug!(
                    exit_code = result.exit_code,
                    executed = result.commands.len(),
                    "step script finished"
                );
                result
            }
            Err(err) => {
                warn!(err = %format!("{err:#}"), "step environment failed");
                ExecutionResult::fault(format!("{err:#}"))
            }
        }
    }

    fn try_run(
        &self,
        request: &StepRequest<'_>,
        echo: &mut dyn FnMut(&str),
    ) -> Result<ExecutionResult> {
        let tokens = Tokens::generate(request.commands);
        let script = compose_script(&ScriptRequest {
            commands: request.commands,
            ignored_paths: request.ignored_paths,
            tokens: &tokens,
            with_sentinel: request.mode == CaptureMode::Streaming,
        });
        // Removed when dropped, whatever happens below.
        let script_file = write_script(&script)?;

        let container = ContainerGuard::create(self.runtime, request.image, request.mounts)?;
        let id = container.id();

        let mkdir = vec![
            "mkdir".to_string(),
            "-p".to_string(),
            request.workspace_dir.to_string(),
        ];
        let created = self
            .runtime
            .exec(id, &mkdir, None)
            .context("create workspace directory")?;
        if created.exit_code != 0 {
            bail!(
                "create workspace directory {} failed: {}",
                request.workspace_dir,
                String::from_utf8_lossy(&created.output).trim()
            );
        }

        self.runtime
            .copy_in(id, request.project_root, request.workspace_dir)
            .context("copy workspace")?;
        self.runtime
            .copy_in(id, script_file.path(), SCRIPT_PATH)
            .context("copy step script")?;
        info!(container = %id, "workspace ready, running script");

        let argv = vec![request.shell.to_string(), SCRIPT_PATH.to_string()];
        match request.mode {
            CaptureMode::Buffered => {
                let output = self
                    .runtime
                    .exec(id, &argv, Some(request.workspace_dir))
                    .context("run step script")?;
                Ok(demultiplex_buffered(
                    &output.output,
                    request.commands,
                    &tokens,
                    output.exit_code,
                ))
            }
            CaptureMode::Streaming => {
                let chunks = self
                    .runtime
                    .exec_stream(id, &argv, Some(request.workspace_dir))
                    .context("run step script")?;
                let mut demux = Demultiplexer::new(&tokens);
                for chunk in chunks {
                    demux.feed(&chunk.context("read step output")?, echo);
                }
                Ok(demux.finish(request.commands, StatusSource::Sentinel, echo))
            }
        }
    }
}

fn write_script(script: &str) -> Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("bbrun-")
        .suffix(".sh")
        .tempfile()
        .context("create step script file")?;
    file.write_all(script.as_bytes())
        .context("write step script")?;
    file.flush().context("flush step script")?;
    debug!(path = %file.path().display(), "step script written");
    Ok(file)
}

/// Destroys its container when dropped.
struct ContainerGuard<'r, R: ContainerRuntime + ?Sized> {
    runtime: &'r R,
    id: ContainerId,
}

impl<'r, R: ContainerRuntime + ?Sized> ContainerGuard<'r, R> {
    fn create(runtime: &'r R, image: &str, mounts: &[Mount]) -> Result<Self> {
        let id = runtime
            .create(image, mounts)
            .with_context(|| format!("start container from image {image}"))?;
        Ok(Self { runtime, id })
    }

    fn id(&self) -> &ContainerId {
        &self.id
    }
}

impl<R: ContainerRuntime + ?Sized> Drop for ContainerGuard<'_, R> {
    fn drop(&mut self) {
        if let Err(err) = self.runtime.destroy(&self.id) {
            let err = format!("{err:#}");
            warn!(container = %self.id, err = %err, "container teardown failed");
        }
    }
}

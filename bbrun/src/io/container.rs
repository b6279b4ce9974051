//! Container runtime abstraction.
//!
//! The [`ContainerRuntime`] trait decouples the executor from the actual
//! container backend (currently the `docker` CLI). Tests use fakes that run
//! scripts locally or replay canned output without a daemon.

use std::path::Path;
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use tracing::{debug, info, instrument, warn};

use crate::core::types::Mount;
use crate::io::process::{CommandOutput, run_command, spawn_stream};

/// Identifier of a running container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerId(pub String);

impl std::fmt::Display for ContainerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Buffered result of a command run inside a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutput {
    pub exit_code: i32,
    /// Combined output of the command.
    pub output: Vec<u8>,
}

/// Lazily produced output chunks of a streaming exec.
pub type OutputChunks<'a> = Box<dyn Iterator<Item = Result<Vec<u8>>> + 'a>;

/// Low-level operations on ephemeral containers.
pub trait ContainerRuntime {
    /// Start a long-lived container from `image` with `mounts` bound.
    fn create(&self, image: &str, mounts: &[Mount]) -> Result<ContainerId>;

    /// Run `argv` inside the container and wait for it.
    fn exec(&self, id: &ContainerId, argv: &[String], workdir: Option<&str>) -> Result<ExecOutput>;

    /// Run `argv` inside the container, yielding output as it is produced.
    fn exec_stream<'a>(
        &'a self,
        id: &ContainerId,
        argv: &[String],
        workdir: Option<&str>,
    ) -> Result<OutputChunks<'a>>;

    /// Copy a host file or directory tree to `target` inside the container.
    fn copy_in(&self, id: &ContainerId, source: &Path, target: &str) -> Result<()>;

    /// Stop and remove the container.
    fn destroy(&self, id: &ContainerId) -> Result<()>;
}

/// Runtime that drives the `docker` CLI.
#[derive(Debug, Clone)]
pub struct DockerRuntime {
    bin: String,
    shell: String,
    timeout: Duration,
}

impl DockerRuntime {
    pub fn new(bin: impl Into<String>, shell: impl Into<String>, timeout: Duration) -> Self {
        Self {
            bin: bin.into(),
            shell: shell.into(),
            timeout,
        }
    }

    fn command(&self) -> Command {
        Command::new(&self.bin)
    }

    fn exec_command(&self, id: &ContainerId, argv: &[String], workdir: Option<&str>) -> Command {
        let mut cmd = self.command();
        cmd.arg("exec");
        if let Some(dir) = workdir {
            cmd.args(["--workdir", dir]);
        }
        cmd.arg(&id.0).args(argv);
        cmd
    }

    /// Run a housekeeping command, failing on timeout or non-zero exit.
    fn run_checked(&self, cmd: Command, what: &str) -> Result<CommandOutput> {
        let output = run_command(cmd, Some(self.timeout)).with_context(|| what.to_string())?;
        if output.timed_out {
            bail!("{what} timed out after {:?}", self.timeout);
        }
        if !output.status.success() {
            bail!(
                "{what} failed with status {}: {}",
                output.code(),
                output.stderr_lossy()
            );
        }
        Ok(output)
    }
}

impl ContainerRuntime for DockerRuntime {
    #[instrument(skip_all, fields(image = %image, mounts = mounts.len()))]
    fn create(&self, image: &str, mounts: &[Mount]) -> Result<ContainerId> {
        let mut cmd = self.command();
        cmd.args(["run", "--detach", "--tty", "--entrypoint"]);
        cmd.arg(&self.shell);
        for mount in mounts {
            cmd.arg("--volume")
                .arg(format!("{}:{}", mount.host.display(), mount.container));
        }
        cmd.arg(image).args(["-c", "tail -f /dev/null"]);

        let output = self.run_checked(cmd, &format!("start container from {image}"))?;
        let id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if id.is_empty() {
            return Err(anyhow!("docker run printed no container id"));
        }
        info!(container = %id, "container started");
        Ok(ContainerId(id))
    }

    #[instrument(skip_all, fields(container = %id))]
    fn exec(&self, id: &ContainerId, argv: &[String], workdir: Option<&str>) -> Result<ExecOutput> {
        let output = run_command(self.exec_command(id, argv, workdir), None)
            .with_context(|| format!("exec in container {id}"))?;
        if !output.stderr.is_empty() {
            debug!(stderr = %output.stderr_lossy(), "docker exec wrote to stderr");
        }
        let exit_code = output.code();
        let mut combined = output.stdout;
        combined.extend_from_slice(&output.stderr);
        Ok(ExecOutput {
            exit_code,
            output: combined,
        })
    }

    #[instrument(skip_all, fields(container = %id))]
    fn exec_stream<'a>(
        &'a self,
        id: &ContainerId,
        argv: &[String],
        workdir: Option<&str>,
    ) -> Result<OutputChunks<'a>> {
        let stream = spawn_stream(self.exec_command(id, argv, workdir))
            .with_context(|| format!("exec in container {id}"))?;
        Ok(Box::new(stream))
    }

    #[instrument(skip_all, fields(container = %id, target = %target))]
    fn copy_in(&self, id: &ContainerId, source: &Path, target: &str) -> Result<()> {
        // `dir/.` copies the directory's contents rather than the directory.
        let source = if source.is_dir() {
            source.join(".")
        } else {
            source.to_path_buf()
        };
        let mut cmd = self.command();
        cmd.arg("cp").arg(&source).arg(format!("{id}:{target}"));
        self.run_checked(cmd, &format!("copy {} into container", source.display()))?;
        Ok(())
    }

    #[instrument(skip_all, fields(container = %id))]
    fn destroy(&self, id: &ContainerId) -> Result<()> {
        let mut cmd = self.command();
        cmd.args(["rm", "--force", "--volumes"]).arg(&id.0);
        match self.run_checked(cmd, "remove container") {
            Ok(_) => {
                debug!("container removed");
                Ok(())
            }
            Err(err) => {
                warn!(err = %err, "failed to remove container");
                Err(err)
            }
        }
    }
}

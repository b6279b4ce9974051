//! Helpers for running child processes with buffered or streamed output.

use std::io::Read;
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

const CHUNK_SIZE: usize = 8192;

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub timed_out: bool,
}

impl CommandOutput {
    /// Exit code, or -1 when the process was killed by a signal.
    pub fn code(&self) -> i32 {
        self.status.code().unwrap_or(-1)
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }
}

/// Run a command to completion and capture stdout/stderr without risking pipe
/// deadlocks.
///
/// Output is read concurrently while the child runs. With a `timeout`, the
/// child is killed once it elapses and `timed_out` is set.
#[instrument(skip_all, fields(timeout = ?timeout))]
pub fn run_command(mut cmd: Command, timeout: Option<Duration>) -> Result<CommandOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!(program = ?cmd.get_program(), "spawning child process");
    let mut child = spawn(&mut cmd)?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let stdout_handle = thread::spawn(move || read_stream(stdout));
    let stderr_handle = thread::spawn(move || read_stream(stderr));

    let mut timed_out = false;
    let status = match timeout {
        None => child.wait().context("wait for command")?,
        Some(timeout) => match child.wait_timeout(timeout).context("wait for command")? {
            Some(status) => status,
            None => {
                warn!(
                    timeout_secs = timeout.as_secs(),
                    "command timed out, killing"
                );
                timed_out = true;
                child.kill().context("kill command")?;
                child.wait().context("wait command after kill")?
            }
        },
    };

    let stdout = join_output(stdout_handle).context("join stdout")?;
    let stderr = join_output(stderr_handle).context("join stderr")?;

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        timed_out,
    })
}

/// Spawn a command and expose its stdout as a lazy sequence of chunks.
///
/// Stderr is drained on a helper thread and logged once the stream ends.
#[instrument(skip_all)]
pub fn spawn_stream(mut cmd: Command) -> Result<ChunkStream> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!(program = ?cmd.get_program(), "spawning streaming child process");
    let mut child = spawn(&mut cmd)?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;
    let stderr_handle = thread::spawn(move || read_stream(stderr));

    Ok(ChunkStream {
        child,
        stdout,
        stderr_handle: Some(stderr_handle),
        done: false,
    })
}

/// Stdout of a running child, read in chunks as they arrive.
///
/// The child is reaped when the stream ends, or killed if the stream is
/// dropped early.
pub struct ChunkStream {
    child: Child,
    stdout: ChildStdout,
    stderr_handle: Option<thread::JoinHandle<Result<Vec<u8>>>>,
    done: bool,
}

impl ChunkStream {
    fn reap(&mut self) -> Result<()> {
        self.done = true;
        let status = self.child.wait().context("wait for streaming command")?;
        if let Some(handle) = self.stderr_handle.take() {
            let stderr = join_output(handle).context("join stderr")?;
            if !stderr.is_empty() {
                let stderr = String::from_utf8_lossy(&stderr);
                warn!(stderr = %stderr.trim(), "streaming command wrote to stderr");
            }
        }
        // Streamed runs infer success from the output; the code is diagnostic only.
        debug!(exit_code = ?status.code(), "streaming command finished");
        Ok(())
    }
}

impl Iterator for ChunkStream {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut chunk = vec![0u8; CHUNK_SIZE];
        match self.stdout.read(&mut chunk) {
            Ok(0) => self.reap().err().map(Err),
            Ok(n) => {
                chunk.truncate(n);
                Some(Ok(chunk))
            }
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => self.next(),
            Err(err) => {
                self.done = true;
                Some(Err(err).context("read streaming output"))
            }
        }
    }
}

impl Drop for ChunkStream {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            warn!("streaming command dropped before completion, killing");
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

fn spawn(cmd: &mut Command) -> Result<Child> {
    match cmd.spawn() {
        Ok(child) => Ok(child),
        Err(e) => {
            error!(err = %e, program = ?cmd.get_program(), "failed to spawn command");
            Err(e).with_context(|| format!("spawn {}", cmd.get_program().to_string_lossy()))
        }
    }
}

fn join_output(handle: thread::JoinHandle<Result<Vec<u8>>>) -> Result<Vec<u8>> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

fn read_stream<R: Read>(mut reader: R) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf).context("read output")?;
    Ok(buf)
}

//! Test-only container runtimes.
//!
//! - [`ScriptedRuntime`] records every call and replays canned results.
//! - [`LocalShellRuntime`] runs scripts with the host `sh` inside a scratch
//!   directory that stands in for the container filesystem.

use std::cell::{Cell, RefCell};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, anyhow};
use tempfile::TempDir;

use crate::core::types::Mount;
use crate::io::container::{ContainerId, ContainerRuntime, ExecOutput, OutputChunks};
use crate::io::process::{run_command, spawn_stream};

/// One recorded runtime call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeCall {
    Create { image: String, mounts: Vec<Mount> },
    Exec { argv: Vec<String>, workdir: Option<String> },
    ExecStream { argv: Vec<String>, workdir: Option<String> },
    CopyIn { source: PathBuf, target: String },
    Destroy(ContainerId),
}

/// Runtime that records calls and returns fixed results.
#[derive(Debug, Default)]
pub struct ScriptedRuntime {
    calls: RefCell<Vec<RuntimeCall>>,
    create_error: Option<String>,
    copy_error: Option<String>,
    exit_code: i32,
    output: Vec<u8>,
}

impl ScriptedRuntime {
    /// Every operation succeeds and scripts print nothing.
    pub fn succeeding() -> Self {
        Self::default()
    }

    pub fn failing_create(mut self, message: &str) -> Self {
        self.create_error = Some(message.to_string());
        self
    }

    pub fn failing_copy(mut self, message: &str) -> Self {
        self.copy_error = Some(message.to_string());
        self
    }

    /// Exit code and output returned by every non-housekeeping exec.
    pub fn with_script_result(mut self, exit_code: i32, output: &[u8]) -> Self {
        self.exit_code = exit_code;
        self.output = output.to_vec();
        self
    }

    pub fn calls(&self) -> Vec<RuntimeCall> {
        self.calls.borrow().clone()
    }

    fn record(&self, call: RuntimeCall) {
        self.calls.borrow_mut().push(call);
    }
}

impl ContainerRuntime for ScriptedRuntime {
    fn create(&self, image: &str, mounts: &[Mount]) -> Result<ContainerId> {
        self.record(RuntimeCall::Create {
            image: image.to_string(),
            mounts: mounts.to_vec(),
        });
        match &self.create_error {
            Some(message) => Err(anyhow!("{message}")),
            None => Ok(ContainerId("scripted".to_string())),
        }
    }

    fn exec(
        &self,
        _id: &ContainerId,
        argv: &[String],
        workdir: Option<&str>,
    ) -> Result<ExecOutput> {
        self.record(RuntimeCall::Exec {
            argv: argv.to_vec(),
            workdir: workdir.map(str::to_string),
        });
        if argv.first().map(String::as_str) == Some("mkdir") {
            return Ok(ExecOutput {
                exit_code: 0,
                output: Vec::new(),
            });
        }
        Ok(ExecOutput {
            exit_code: self.exit_code,
            output: self.output.clone(),
        })
    }

    fn exec_stream<'a>(
        &'a self,
        _id: &ContainerId,
        argv: &[String],
        workdir: Option<&str>,
    ) -> Result<OutputChunks<'a>> {
        self.record(RuntimeCall::ExecStream {
            argv: argv.to_vec(),
            workdir: workdir.map(str::to_string),
        });
        let chunks: Vec<Result<Vec<u8>>> = self
            .output
            .chunks(3)
            .map(|chunk| Ok(chunk.to_vec()))
            .collect();
        Ok(Box::new(chunks.into_iter()))
    }

    fn copy_in(&self, _id: &ContainerId, source: &Path, target: &str) -> Result<()> {
        self.record(RuntimeCall::CopyIn {
            source: source.to_path_buf(),
            target: target.to_string(),
        });
        match &self.copy_error {
            Some(message) => Err(anyhow!("{message}")),
            None => Ok(()),
        }
    }

    fn destroy(&self, id: &ContainerId) -> Result<()> {
        self.record(RuntimeCall::Destroy(id.clone()));
        Ok(())
    }
}

/// Runtime whose "containers" are directories under a scratch root and whose
/// execs run on the host.
///
/// Absolute container paths (in arguments, workdirs and copy targets) are
/// re-rooted under the container's directory. Mounts are recorded but not
/// applied.
pub struct LocalShellRuntime {
    root: TempDir,
    next_id: Cell<u32>,
    created: RefCell<Vec<(String, Vec<Mount>)>>,
    destroyed: RefCell<Vec<ContainerId>>,
}

impl LocalShellRuntime {
    pub fn new() -> Result<Self> {
        Ok(Self {
            root: tempfile::tempdir().context("create runtime root")?,
            next_id: Cell::new(0),
            created: RefCell::new(Vec::new()),
            destroyed: RefCell::new(Vec::new()),
        })
    }

    /// `(image, mounts)` of every container created so far.
    pub fn created(&self) -> Vec<(String, Vec<Mount>)> {
        self.created.borrow().clone()
    }

    pub fn destroyed(&self) -> Vec<ContainerId> {
        self.destroyed.borrow().clone()
    }

    /// Host path backing `path` inside container `id`.
    pub fn host_path(&self, id: &ContainerId, path: &str) -> PathBuf {
        self.root.path().join(&id.0).join(path.trim_start_matches('/'))
    }

    fn command(&self, id: &ContainerId, argv: &[String], workdir: Option<&str>) -> Result<Command> {
        let (program, args) = argv.split_first().ok_or_else(|| anyhow!("empty argv"))?;
        let mut cmd = Command::new(program);
        for arg in args {
            if arg.starts_with('/') {
                cmd.arg(self.host_path(id, arg));
            } else {
                cmd.arg(arg);
            }
        }
        cmd.current_dir(self.host_path(id, workdir.unwrap_or("/")));
        Ok(cmd)
    }
}

impl ContainerRuntime for LocalShellRuntime {
    fn create(&self, image: &str, mounts: &[Mount]) -> Result<ContainerId> {
        let n = self.next_id.get() + 1;
        self.next_id.set(n);
        let id = ContainerId(format!("local-{n}"));
        fs::create_dir_all(self.host_path(&id, "/tmp")).context("create container root")?;
        self.created
            .borrow_mut()
            .push((image.to_string(), mounts.to_vec()));
        Ok(id)
    }

    fn exec(&self, id: &ContainerId, argv: &[String], workdir: Option<&str>) -> Result<ExecOutput> {
        let output = run_command(self.command(id, argv, workdir)?, None)?;
        let exit_code = output.code();
        let mut combined = output.stdout;
        combined.extend_from_slice(&output.stderr);
        Ok(ExecOutput {
            exit_code,
            output: combined,
        })
    }

    fn exec_stream<'a>(
        &'a self,
        id: &ContainerId,
        argv: &[String],
        workdir: Option<&str>,
    ) -> Result<OutputChunks<'a>> {
        let stream = spawn_stream(self.command(id, argv, workdir)?)?;
        Ok(Box::new(stream))
    }

    fn copy_in(&self, id: &ContainerId, source: &Path, target: &str) -> Result<()> {
        let target = self.host_path(id, target);
        if source.is_dir() {
            copy_tree(source, &target)
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(source, &target)
                .with_context(|| format!("copy {} to {}", source.display(), target.display()))?;
            Ok(())
        }
    }

    fn destroy(&self, id: &ContainerId) -> Result<()> {
        let dir = self.root.path().join(&id.0);
        if dir.exists() {
            fs::remove_dir_all(&dir).with_context(|| format!("remove {}", dir.display()))?;
        }
        self.destroyed.borrow_mut().push(id.clone());
        Ok(())
    }
}

fn copy_tree(source: &Path, target: &Path) -> Result<()> {
    fs::create_dir_all(target).with_context(|| format!("create {}", target.display()))?;
    for entry in fs::read_dir(source).with_context(|| format!("read {}", source.display()))? {
        let entry = entry?;
        let dest = target.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_tree(&entry.path(), &dest)?;
        } else {
            fs::copy(entry.path(), &dest)
                .with_context(|| format!("copy {}", entry.path().display()))?;
        }
    }
    Ok(())
}

/// Write `files` (relative path → contents) under `root`.
pub fn write_files(root: &Path, files: &[(&str, &str)]) -> Result<()> {
    for (path, contents) in files {
        let path = root.join(path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
    }
    Ok(())
}

//! Orchestration of a full pipeline run.

use std::io::Write;

use anyhow::{Context, Result};
use tracing::{info, instrument, warn};

use crate::core::plan::plan_pipeline;
use crate::core::types::{ExecutionResult, RunState, StepState};
use crate::io::cache::CacheStore;
use crate::io::config::{ProjectPaths, RunnerConfig};
use crate::io::container::ContainerRuntime;
use crate::io::executor::{CaptureMode, ContainerExecutor, StepRequest};
use crate::io::ignore::ignored_paths;
use crate::pipeline::PipelineDefinition;
use crate::report::Reporter;

/// Options for a single `bbrun` invocation.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub pipeline: String,
    /// Stream output with live echo and print a summary.
    pub verbose: bool,
    /// Stop after the first failing step.
    pub stop_on_failure: bool,
}

/// Outcome of one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub name: String,
    pub image: String,
    pub state: StepState,
    /// `None` while the step is `Pending`.
    pub result: Option<ExecutionResult>,
}

/// Outcome of a pipeline run, steps in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineRunReport {
    pub pipeline: String,
    pub state: RunState,
    pub steps: Vec<StepReport>,
}

impl PipelineRunReport {
    /// First step named `name`.
    pub fn get(&self, name: &str) -> Option<&StepReport> {
        self.steps.iter().find(|step| step.name == name)
    }

    pub fn failed_steps(&self) -> impl Iterator<Item = &StepReport> {
        self.steps.iter().filter(|step| step.state == StepState::Failed)
    }

    /// True when every step ran and succeeded.
    pub fn success(&self) -> bool {
        self.steps.iter().all(|step| step.state == StepState::Succeeded)
    }
}

/// Run `options.pipeline` step by step.
///
/// Configuration problems (unknown pipeline or cache, missing image, bad
/// ignore pattern) are returned as errors before any step executes. Step
/// failures are recorded in the report and never returned as errors.
#[instrument(skip_all, fields(pipeline = %options.pipeline, verbose = options.verbose))]
pub fn run_pipeline<R, W>(
    definition: &PipelineDefinition,
    paths: &ProjectPaths,
    config: &RunnerConfig,
    runtime: &R,
    options: &RunOptions,
    reporter: &mut Reporter<W>,
) -> Result<PipelineRunReport>
where
    R: ContainerRuntime + ?Sized,
    W: Write,
{
    let plan = plan_pipeline(definition, &options.pipeline, &config.workspace_dir)?;
    let ignored = ignored_paths(&paths.root, &config.ignore_file)?;
    let caches = CacheStore::new(&paths.cache_index_path, config.cache_root(&paths.root));
    let executor = ContainerExecutor::new(runtime);
    let mode = if options.verbose {
        CaptureMode::Streaming
    } else {
        CaptureMode::Buffered
    };

    let mut report = PipelineRunReport {
        pipeline: options.pipeline.clone(),
        state: RunState::Running,
        steps: plan
            .iter()
            .map(|step| StepReport {
                name: step.name.clone(),
                image: step.image.clone(),
                state: StepState::Pending,
                result: None,
            })
            .collect(),
    };
    info!(steps = plan.len(), ignored = ignored.len(), "starting pipeline");

    for (index, step) in plan.iter().enumerate() {
        report.steps[index].state = StepState::Running;
        reporter.step_started(&step.name).context("write progress")?;

        let result = match caches.mounts(&step.caches) {
            Ok(mounts) => {
                let request = StepRequest {
                    image: &step.image,
                    mounts: &mounts,
                    commands: &step.commands,
                    ignored_paths: &ignored,
                    project_root: &paths.root,
                    workspace_dir: &config.workspace_dir,
                    shell: &config.shell,
                    mode,
                };
                executor.run(&request, &mut |line: &str| {
                    if let Err(err) = reporter.echo_line(line) {
                        warn!(err = %err, "failed to echo output line");
                    }
                })
            }
            Err(err) => {
                warn!(step = %step.name, err = %format!("{err:#}"), "cache setup failed");
                ExecutionResult::fault(format!("prepare caches: {err:#}"))
            }
        };

        let success = result.success();
        info!(step = %step.name, exit_code = result.exit_code, success, "step finished");
        reporter.step_finished(success).context("write progress")?;

        let entry = &mut report.steps[index];
        entry.state = if success {
            StepState::Succeeded
        } else {
            StepState::Failed
        };
        entry.result = Some(result);

        if !success && options.stop_on_failure {
            report.state = RunState::StoppedEarly;
            break;
        }
    }
    if report.state == RunState::Running {
        report.state = RunState::Completed;
    }

    reporter.diagnostics(&report).context("write diagnostics")?;
    if options.verbose {
        reporter.summary(&report).context("write summary")?;
    }
    Ok(report)
}

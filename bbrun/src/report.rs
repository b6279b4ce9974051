//! User-facing rendering: progress lines, live echo, diagnostics, summary.
//!
//! Everything is written to an arbitrary [`Write`] so output can be captured
//! in tests. Developer diagnostics go through `tracing` instead.

use std::io::{self, Write};

use crate::run::PipelineRunReport;

pub const OK: &str = "[ OK ]";
pub const FAIL: &str = "[FAIL]";

pub struct Reporter<W: Write> {
    out: W,
    name_width: usize,
    verbose: bool,
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W, name_width: usize, verbose: bool) -> Self {
        Self {
            out,
            name_width,
            verbose,
        }
    }

    /// Print `<name>...` padded to the name column. In verbose mode the
    /// step's live output follows on the next lines.
    pub fn step_started(&mut self, name: &str) -> io::Result<()> {
        let label = format!("{name}...");
        write!(self.out, "{label:<width$}", width = self.name_width)?;
        if self.verbose {
            writeln!(self.out)?;
        }
        self.out.flush()
    }

    pub fn echo_line(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.out, "{line}")?;
        self.out.flush()
    }

    pub fn step_finished(&mut self, success: bool) -> io::Result<()> {
        writeln!(self.out, "{}", if success { OK } else { FAIL })?;
        self.out.flush()
    }

    /// Dump every failed step's commands with their captured output. Output
    /// printed before the first command comes right after the header.
    pub fn diagnostics(&mut self, report: &PipelineRunReport) -> io::Result<()> {
        for step in report.failed_steps() {
            let Some(result) = &step.result else {
                continue;
            };
            writeln!(self.out)?;
            writeln!(self.out, "--- {} (exit {}) ---", step.name, result.exit_code)?;
            if let Some(fault) = &result.fault {
                writeln!(self.out, "environment error: {fault}")?;
            }
            for line in &result.preamble {
                writeln!(self.out, "{line}")?;
            }
            for command in &result.commands {
                writeln!(self.out)?;
                writeln!(self.out, "$ {}", command.command)?;
                for line in &command.lines {
                    writeln!(self.out, "{line}")?;
                }
            }
        }
        self.out.flush()
    }

    /// One pass/fail line per step; steps that never ran are marked as such.
    pub fn summary(&mut self, report: &PipelineRunReport) -> io::Result<()> {
        writeln!(self.out)?;
        for step in &report.steps {
            let status = match &step.result {
                Some(result) if result.success() => OK,
                Some(_) => FAIL,
                None => "[SKIP]",
            };
            writeln!(
                self.out,
                "{:<width$}{status}",
                step.name,
                width = self.name_width
            )?;
        }
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{CommandOutput, ExecutionResult, RunState, StepState};
    use crate::run::StepReport;

    fn step(name: &str, result: Option<ExecutionResult>) -> StepReport {
        let state = match &result {
            Some(r) if r.success() => StepState::Succeeded,
            Some(_) => StepState::Failed,
            None => StepState::Pending,
        };
        StepReport {
            name: name.to_string(),
            image: "alpine".to_string(),
            state,
            result,
        }
    }

    fn report() -> PipelineRunReport {
        PipelineRunReport {
            pipeline: "default".to_string(),
            state: RunState::StoppedEarly,
            steps: vec![
                step(
                    "build",
                    Some(ExecutionResult {
                        exit_code: 0,
                        commands: Vec::new(),
                        preamble: Vec::new(),
                        fault: None,
                    }),
                ),
                step(
                    "test",
                    Some(ExecutionResult {
                        exit_code: 2,
                        commands: vec![CommandOutput {
                            command: "make test".to_string(),
                            lines: vec!["1 failed".to_string()],
                        }],
                        preamble: Vec::new(),
                        fault: None,
                    }),
                ),
                step("deploy", None),
            ],
        }
    }

    fn render(verbose: bool, f: impl FnOnce(&mut Reporter<Vec<u8>>) -> io::Result<()>) -> String {
        let mut reporter = Reporter::new(Vec::new(), 10, verbose);
        f(&mut reporter).expect("render");
        String::from_utf8(reporter.into_inner()).expect("utf8")
    }

    #[test]
    fn progress_line_pads_name_then_status() {
        let out = render(false, |r| {
            r.step_started("build")?;
            r.step_finished(true)
        });
        assert_eq!(out, "build...  [ OK ]\n");
    }

    #[test]
    fn verbose_progress_puts_output_between_name_and_status() {
        let out = render(true, |r| {
            r.step_started("build")?;
            r.echo_line("compiling")?;
            r.step_finished(false)
        });
        assert_eq!(out, "build...  \ncompiling\n[FAIL]\n");
    }

    #[test]
    fn diagnostics_cover_only_failed_steps() {
        let out = render(false, |r| r.diagnostics(&report()));
        assert_eq!(out, "\n--- test (exit 2) ---\n\n$ make test\n1 failed\n");
    }

    #[test]
    fn diagnostics_show_output_from_before_the_first_command() {
        let mut report = report();
        report.steps[1].result = Some(ExecutionResult {
            exit_code: 126,
            commands: Vec::new(),
            preamble: vec!["exec: \"sh\": executable file not found".to_string()],
            fault: None,
        });
        let out = render(false, |r| r.diagnostics(&report));
        assert_eq!(
            out,
            "\n--- test (exit 126) ---\nexec: \"sh\": executable file not found\n"
        );
    }

    #[test]
    fn summary_lists_every_step() {
        let out = render(true, |r| r.summary(&report()));
        assert_eq!(out, "\nbuild     [ OK ]\ntest      [FAIL]\ndeploy    [SKIP]\n");
    }
}

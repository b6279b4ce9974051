//! End-to-end pipeline runs against [`LocalShellRuntime`].
//!
//! Scripts execute with the host `sh` inside scratch "container" directories,
//! so these tests exercise script composition, framing and demultiplexing
//! for real without a container daemon.

use std::path::Path;

use bbrun::core::types::{RunState, StepState};
use bbrun::io::cache::load_cache_index;
use bbrun::io::config::{ProjectPaths, RunnerConfig};
use bbrun::io::definition::parse_definition;
use bbrun::report::Reporter;
use bbrun::run::{PipelineRunReport, RunOptions, run_pipeline};
use bbrun::test_support::{LocalShellRuntime, write_files};

const TWO_STEPS: &str = "\
image: alpine
pipelines:
  default:
    - step:
        name: first
        script:
          - echo A
          - echo B
    - step:
        name: second
        script:
          - 'false'
    - step:
        name: third
        script:
          - echo C
";

struct Run {
    report: PipelineRunReport,
    stdout: String,
}

fn config(root: &Path) -> RunnerConfig {
    RunnerConfig {
        cache_dir: Some(root.join("cache-root")),
        ..RunnerConfig::default()
    }
}

fn run(root: &Path, yaml: &str, pipeline: &str, verbose: bool, stop: bool) -> Run {
    let definition = parse_definition(yaml).expect("definition");
    let paths = ProjectPaths::new(root);
    let runtime = LocalShellRuntime::new().expect("runtime");
    let mut reporter = Reporter::new(Vec::new(), 20, verbose);
    let options = RunOptions {
        pipeline: pipeline.to_string(),
        verbose,
        stop_on_failure: stop,
    };
    let report = run_pipeline(
        &definition,
        &paths,
        &config(root),
        &runtime,
        &options,
        &mut reporter,
    )
    .expect("run pipeline");
    assert_eq!(
        runtime.created().len(),
        runtime.destroyed().len(),
        "every container is torn down"
    );
    Run {
        report,
        stdout: String::from_utf8(reporter.into_inner()).expect("utf8"),
    }
}

fn lines(report: &PipelineRunReport, step: &str) -> Vec<Vec<String>> {
    report
        .get(step)
        .and_then(|s| s.result.as_ref())
        .map(|r| r.commands.iter().map(|c| c.lines.clone()).collect())
        .unwrap_or_default()
}

/// Verifies output is split per command and a failing step does not stop
/// later steps by default.
#[test]
fn buffered_run_continues_past_failure() {
    let temp = tempfile::tempdir().expect("tempdir");
    let run = run(temp.path(), TWO_STEPS, "default", false, false);

    assert_eq!(run.report.state, RunState::Completed);
    assert_eq!(
        lines(&run.report, "first"),
        vec![vec!["A".to_string()], vec!["B".to_string()]]
    );
    let second = run.report.get("second").expect("second");
    assert_eq!(second.state, StepState::Failed);
    assert_eq!(second.result.as_ref().map(|r| r.exit_code), Some(1));
    assert_eq!(
        run.report.get("third").map(|s| s.state),
        Some(StepState::Succeeded)
    );
    assert!(!run.report.success());

    assert!(
        run.stdout.contains("first...            [ OK ]"),
        "{}",
        run.stdout
    );
    assert!(
        run.stdout.contains("second...           [FAIL]"),
        "{}",
        run.stdout
    );
    assert!(run.stdout.contains("$ false"), "{}", run.stdout);
}

/// Verifies `stop` leaves the remaining steps pending.
#[test]
fn stop_on_failure_skips_remaining_steps() {
    let temp = tempfile::tempdir().expect("tempdir");
    let run = run(temp.path(), TWO_STEPS, "default", false, true);

    assert_eq!(run.report.state, RunState::StoppedEarly);
    let third = run.report.get("third").expect("third");
    assert_eq!(third.state, StepState::Pending);
    assert!(third.result.is_none());
    assert!(!run.stdout.contains("third..."), "{}", run.stdout);
}

/// Verifies streaming mode echoes output live and resolves status from the
/// sentinel marker.
#[test]
fn streaming_run_echoes_and_uses_sentinel() {
    let temp = tempfile::tempdir().expect("tempdir");
    let run = run(temp.path(), TWO_STEPS, "default", true, true);

    assert_eq!(
        lines(&run.report, "first"),
        vec![vec!["A".to_string()], vec!["B".to_string()]]
    );
    assert_eq!(
        run.report.get("first").map(|s| s.state),
        Some(StepState::Succeeded)
    );
    assert_eq!(
        run.report.get("second").map(|s| s.state),
        Some(StepState::Failed)
    );
    assert!(
        run.stdout.contains("first...            \nA\nB\n[ OK ]\n"),
        "{}",
        run.stdout
    );
    assert!(!run.stdout.contains("bbrun-frame-"), "{}", run.stdout);
    assert!(!run.stdout.contains("bbrun-done-"), "{}", run.stdout);
    assert!(
        run.stdout.contains("third               [SKIP]"),
        "{}",
        run.stdout
    );
}

/// Verifies only commands up to the failing one are reported.
#[test]
fn fail_fast_truncates_commands() {
    let temp = tempfile::tempdir().expect("tempdir");
    let yaml = "\
image: alpine
pipelines:
  default:
    - step:
        script:
          - echo before
          - exit 3
          - echo after
";
    let run = run(temp.path(), yaml, "default", false, false);
    let result = run.report.steps[0].result.clone().expect("result");

    assert_eq!(result.exit_code, 3);
    let commands: Vec<&str> = result.commands.iter().map(|c| c.command.as_str()).collect();
    assert_eq!(commands, vec!["echo before", "exit 3"]);
    assert_eq!(run.report.steps[0].name, "step1");
}

/// Verifies stderr is interleaved into the command's segment.
#[test]
fn stderr_is_captured_with_stdout() {
    let temp = tempfile::tempdir().expect("tempdir");
    let yaml = "\
image: alpine
pipelines:
  default:
    - step:
        script:
          - echo out; echo err >&2
";
    let run = run(temp.path(), yaml, "default", false, false);
    assert_eq!(
        lines(&run.report, "step1"),
        vec![vec!["out".to_string(), "err".to_string()]]
    );
}

/// Verifies the workspace is a copy of the project with ignored paths removed.
#[test]
fn ignored_paths_are_removed_from_workspace() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_files(
        temp.path(),
        &[
            (".bbignore", "target\n*.log\n"),
            ("src/main.rs", "fn main() {}\n"),
            ("target/debug/app", "bin"),
            ("build.log", "noise"),
        ],
    )
    .expect("write project");
    let yaml = "\
image: alpine
pipelines:
  branches:
    main:
      - step:
          script:
            - ls src
            - test ! -e target && test ! -e build.log && echo clean
";
    let run = run(temp.path(), yaml, "branches:main", false, false);

    assert!(run.report.success(), "{}", run.stdout);
    assert_eq!(
        lines(&run.report, "step1"),
        vec![vec!["main.rs".to_string()], vec!["clean".to_string()]]
    );
    assert!(
        temp.path().join("target/debug/app").exists(),
        "host copy untouched"
    );
}

/// Verifies cache directories are created once and reused across runs.
#[test]
fn cache_index_is_stable_across_runs() {
    let temp = tempfile::tempdir().expect("tempdir");
    let yaml = "\
image: alpine
definitions:
  caches:
    deps: vendor
pipelines:
  default:
    - step:
        caches: [deps, pip]
        script:
          - 'true'
";
    run(temp.path(), yaml, "default", false, false);
    let paths = ProjectPaths::new(temp.path());
    let first = load_cache_index(&paths.cache_index_path).expect("index");
    run(temp.path(), yaml, "default", false, false);
    let second = load_cache_index(&paths.cache_index_path).expect("index");

    assert_eq!(first, second);
    assert_eq!(first.len(), 2);
    let deps = first.get("deps").expect("deps id");
    assert!(temp.path().join("cache-root").join(deps).is_dir());
}

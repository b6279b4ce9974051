//! CLI tests for the `bbrun` binary.
//!
//! Only paths that never reach a container runtime are exercised here.

use std::process::Command;

use bbrun::exit_codes;
use bbrun::test_support::write_files;

const DEFINITION: &str = "\
image: alpine
pipelines:
  default:
    - step:
        script: [ls]
  branches:
    main:
      - step:
          script: [ls]
";

#[test]
fn list_prints_pipeline_names() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_files(temp.path(), &[("bitbucket-pipelines.yml", DEFINITION)]).expect("write");

    let output = Command::new(env!("CARGO_BIN_EXE_bbrun"))
        .current_dir(temp.path())
        .arg("--list")
        .output()
        .expect("bbrun --list");

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "branches:main\ndefault\n"
    );
}

#[test]
fn unknown_pipeline_exits_invalid() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_files(temp.path(), &[("bitbucket-pipelines.yml", DEFINITION)]).expect("write");

    let output = Command::new(env!("CARGO_BIN_EXE_bbrun"))
        .current_dir(temp.path())
        .arg("deploy")
        .output()
        .expect("bbrun deploy");

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("deploy"), "{stderr}");
    assert!(output.stdout.is_empty());
}

#[test]
fn missing_definition_exits_invalid() {
    let temp = tempfile::tempdir().expect("tempdir");

    let status = Command::new(env!("CARGO_BIN_EXE_bbrun"))
        .current_dir(temp.path())
        .args(["-f", "ci.yml"])
        .status()
        .expect("bbrun");

    assert_eq!(status.code(), Some(exit_codes::INVALID));
}

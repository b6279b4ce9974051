//! `bbrun`: run a pipeline from `bitbucket-pipelines.yml` locally.
//!
//! Every step runs in a throwaway container built from the step's image.
//! Exit codes are listed in [`bbrun::exit_codes`].

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use bbrun::exit_codes;
use bbrun::io::config::{ProjectPaths, load_config};
use bbrun::io::container::DockerRuntime;
use bbrun::io::definition::{DEFAULT_DEFINITION_FILE, load_definition};
use bbrun::logging;
use bbrun::report::Reporter;
use bbrun::run::{RunOptions, run_pipeline};

#[derive(Parser, Debug)]
#[command(
    name = "bbrun",
    version,
    about = "Run Bitbucket pipelines locally in containers"
)]
struct Cli {
    /// Pipeline to run; grouped pipelines are addressed as `group:name`.
    #[arg(default_value = "default")]
    pipeline: String,

    /// Pipeline definition file.
    #[arg(short, long, default_value = DEFAULT_DEFINITION_FILE)]
    file: PathBuf,

    /// Stream step output live and print a summary.
    #[arg(short, long)]
    verbose: bool,

    /// Stop at the first failing step.
    #[arg(short, long)]
    stop: bool,

    /// Print the available pipeline names and exit.
    #[arg(long)]
    list: bool,
}

fn main() {
    logging::init();
    match run(Cli::parse()) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let root = std::env::current_dir().context("resolve current directory")?;
    let definition = load_definition(&root.join(&cli.file))?;

    if cli.list {
        for name in definition.pipeline_names() {
            println!("{name}");
        }
        return Ok(exit_codes::OK);
    }

    let paths = ProjectPaths::new(&root);
    let config = load_config(&paths.config_path)?;
    let runtime = DockerRuntime::new(
        config.docker_bin.clone(),
        config.shell.clone(),
        config.docker_timeout(),
    );
    let options = RunOptions {
        pipeline: cli.pipeline,
        verbose: cli.verbose,
        stop_on_failure: cli.stop,
    };
    let mut reporter = Reporter::new(io::stdout().lock(), config.name_width, cli.verbose);

    let report = run_pipeline(
        &definition,
        &paths,
        &config,
        &runtime,
        &options,
        &mut reporter,
    )?;
    Ok(if report.success() {
        exit_codes::OK
    } else {
        exit_codes::FAILED
    })
}

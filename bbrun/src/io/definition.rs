//! Loading `bitbucket-pipelines.yml`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::pipeline::PipelineDefinition;

pub const DEFAULT_DEFINITION_FILE: &str = "bitbucket-pipelines.yml";

/// Read and parse a pipeline definition file.
pub fn load_definition(path: &Path) -> Result<PipelineDefinition> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let definition = parse_definition(&contents)
        .with_context(|| format!("parse pipeline definition {}", path.display()))?;
    debug!(
        path = %path.display(),
        pipelines = definition.pipelines.len(),
        "pipeline definition loaded"
    );
    Ok(definition)
}

pub fn parse_definition(contents: &str) -> Result<PipelineDefinition> {
    let definition: PipelineDefinition = serde_yaml::from_str(contents)?;
    Ok(definition)
}

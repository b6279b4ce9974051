//! Planning: turn a named pipeline into fully resolved steps.
//!
//! Every configuration problem is reported here, before any container starts.

use crate::core::cache_paths::{CacheSpec, resolve_cache};
use crate::error::ConfigError;
use crate::pipeline::PipelineDefinition;

/// A step with its display name, image and caches resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedStep {
    pub name: String,
    pub image: String,
    pub commands: Vec<String>,
    pub caches: Vec<CacheSpec>,
}

pub fn plan_pipeline(
    definition: &PipelineDefinition,
    pipeline: &str,
    workspace_dir: &str,
) -> Result<Vec<PlannedStep>, ConfigError> {
    let entries = definition.steps(pipeline)?;
    if entries.is_empty() {
        return Err(ConfigError::EmptyPipeline {
            name: pipeline.to_string(),
        });
    }

    let mut planned = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let step = &entry.step;
        let name = step.display_name(index + 1);

        let image = step
            .image
            .as_ref()
            .map(|image| image.name())
            .or_else(|| definition.default_image())
            .filter(|image| !image.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingImage { step: name.clone() })?
            .to_string();

        if step.script.is_empty() {
            return Err(ConfigError::EmptyScript { step: name });
        }

        let caches = step
            .caches
            .iter()
            .map(|cache| {
                resolve_cache(&name, cache, &definition.definitions.caches, workspace_dir)
            })
            .collect::<Result<Vec<_>, _>>()?;

        planned.push(PlannedStep {
            name,
            image,
            commands: step.script.clone(),
            caches,
        });
    }
    Ok(planned)
}

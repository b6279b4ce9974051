//! In-memory pipeline definition (`bitbucket-pipelines.yml`).
//!
//! Only the subset the runner executes is modelled. Unknown shapes inside a
//! step (e.g. `parallel` groups or pipes) fail deserialization and surface as
//! a malformed definition.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::ConfigError;

/// Separator between a pipeline group and a pipeline name (`branches:main`).
pub const GROUP_SEPARATOR: char = ':';

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct PipelineDefinition {
    /// Default image for steps without their own.
    #[serde(default)]
    pub image: Option<ImageSpec>,
    #[serde(default)]
    pub pipelines: BTreeMap<String, PipelineEntry>,
    #[serde(default)]
    pub definitions: Definitions,
}

/// An image given either as a bare name or as `{ name: ... }`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ImageSpec {
    Name(String),
    Detailed { name: String },
}

impl ImageSpec {
    pub fn name(&self) -> &str {
        match self {
            ImageSpec::Name(name) | ImageSpec::Detailed { name } => name,
        }
    }
}

/// A top-level pipeline (`default`) or a group of named pipelines
/// (`branches`, `tags`, `custom`, ...).
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum PipelineEntry {
    Steps(Vec<StepEntry>),
    Group(BTreeMap<String, Vec<StepEntry>>),
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct StepEntry {
    pub step: Step,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Step {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image: Option<ImageSpec>,
    pub script: Vec<String>,
    #[serde(default)]
    pub caches: Vec<String>,
}

impl Step {
    /// Explicit name, or `step<N>` for the 1-indexed position.
    pub fn display_name(&self, position: usize) -> String {
        match &self.name {
            Some(name) if !name.trim().is_empty() => name.clone(),
            _ => format!("step{position}"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct Definitions {
    #[serde(default)]
    pub caches: BTreeMap<String, CachePaths>,
}

/// Container-side path(s) of a custom cache.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum CachePaths {
    One(String),
    Many(Vec<String>),
}

impl CachePaths {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            CachePaths::One(path) => vec![path.clone()],
            CachePaths::Many(paths) => paths.clone(),
        }
    }
}

impl PipelineDefinition {
    pub fn default_image(&self) -> Option<&str> {
        self.image.as_ref().map(ImageSpec::name)
    }

    /// Every addressable pipeline name, grouped ones as `group:name`.
    pub fn pipeline_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for (key, entry) in &self.pipelines {
            match entry {
                PipelineEntry::Steps(_) => names.push(key.clone()),
                PipelineEntry::Group(group) => {
                    for name in group.keys() {
                        names.push(format!("{key}{GROUP_SEPARATOR}{name}"));
                    }
                }
            }
        }
        names
    }

    /// Look up the steps of `name`.
    pub fn steps(&self, name: &str) -> Result<&[StepEntry], ConfigError> {
        let found = match self.pipelines.get(name) {
            Some(PipelineEntry::Steps(steps)) => Some(steps.as_slice()),
            _ => name
                .split_once(GROUP_SEPARATOR)
                .and_then(|(group, inner)| match self.pipelines.get(group) {
                    Some(PipelineEntry::Group(entries)) => entries.get(inner),
                    _ => None,
                })
                .map(Vec::as_slice),
        };
        found.ok_or_else(|| ConfigError::UnknownPipeline {
            name: name.to_string(),
            available: self.pipeline_names().join(", "),
        })
    }
}

//! Configuration errors raised before any step executes.

use thiserror::Error;

/// A pipeline definition problem detected while planning a run.
///
/// Step execution failures are never reported through this type; they are
/// recorded in the run report instead.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("pipeline `{name}` not found (available: {available})")]
    UnknownPipeline { name: String, available: String },

    #[error("step `{step}` requires unknown cache `{cache}`")]
    UnknownCache { step: String, cache: String },

    #[error("cache `{cache}` has no paths")]
    EmptyCache { cache: String },

    #[error("step `{step}` has no image and the definition sets no default image")]
    MissingImage { step: String },

    #[error("step `{step}` has an empty script")]
    EmptyScript { step: String },

    #[error("pipeline `{name}` has no steps")]
    EmptyPipeline { name: String },
}

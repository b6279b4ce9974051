//! Container-side cache path resolution.

use std::collections::BTreeMap;

use crate::error::ConfigError;
use crate::pipeline::CachePaths;

/// Well-known package manager caches available without a definition.
pub const BUILTIN_CACHES: &[(&str, &str)] = &[
    ("composer", "/root/.composer/cache"),
    ("dotnetcore", "/root/.nuget/packages"),
    ("gradle", "/root/.gradle/caches"),
    ("ivy2", "/root/.ivy2/cache"),
    ("maven", "/root/.m2/repository"),
    ("node", "node_modules"),
    ("pip", "/root/.cache/pip"),
    ("sbt", "/root/.sbt"),
];

pub fn builtin_cache_path(name: &str) -> Option<&'static str> {
    BUILTIN_CACHES
        .iter()
        .find(|(builtin, _)| *builtin == name)
        .map(|(_, path)| *path)
}

/// A cache requested by a step, with absolute container paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSpec {
    pub name: String,
    pub paths: Vec<String>,
}

/// Resolve `name` against custom definitions first, then the built-in table.
///
/// Relative paths are anchored at `workspace_dir`.
pub fn resolve_cache(
    step: &str,
    name: &str,
    custom: &BTreeMap<String, CachePaths>,
    workspace_dir: &str,
) -> Result<CacheSpec, ConfigError> {
    let raw = match custom.get(name) {
        Some(paths) => paths.to_vec(),
        None => match builtin_cache_path(name) {
            Some(path) => vec![path.to_string()],
            None => {
                return Err(ConfigError::UnknownCache {
                    step: step.to_string(),
                    cache: name.to_string(),
                });
            }
        },
    };
    if raw.is_empty() {
        return Err(ConfigError::EmptyCache {
            cache: name.to_string(),
        });
    }
    Ok(CacheSpec {
        name: name.to_string(),
        paths: raw
            .iter()
            .map(|path| container_path(path, workspace_dir))
            .collect(),
    })
}

/// Anchor a relative path at `workspace_dir`; absolute paths pass through.
pub fn container_path(path: &str, workspace_dir: &str) -> String {
    if path.starts_with('/') {
        return path.to_string();
    }
    let relative = path.trim_start_matches("./");
    format!("{}/{}", workspace_dir.trim_end_matches('/'), relative)
}

/// Filesystem-safe directory name for a container path.
pub fn path_slug(path: &str) -> String {
    let slug: String = path
        .trim_matches('/')
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if slug.is_empty() { "_".to_string() } else { slug }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn custom() -> BTreeMap<String, CachePaths> {
        let mut map = BTreeMap::new();
        map.insert("foo".to_string(), CachePaths::One("foo".to_string()));
        map.insert(
            "abs".to_string(),
            CachePaths::One("/var/cache/abs".to_string()),
        );
        map.insert(
            "multi".to_string(),
            CachePaths::Many(vec!["/opt/one".to_string(), "./two".to_string()]),
        );
        map.insert(
            "node".to_string(),
            CachePaths::One("web/node_modules".to_string()),
        );
        map.insert("none".to_string(), CachePaths::Many(Vec::new()));
        map
    }

    #[test]
    fn relative_custom_path_is_anchored_at_workspace() {
        let spec = resolve_cache("build", "foo", &custom(), "/ws").expect("resolve");
        assert_eq!(spec.paths, vec!["/ws/foo".to_string()]);
    }

    #[test]
    fn absolute_custom_path_is_unchanged() {
        let spec = resolve_cache("build", "abs", &custom(), "/ws").expect("resolve");
        assert_eq!(spec.paths, vec!["/var/cache/abs".to_string()]);
    }

    #[test]
    fn multi_path_definitions_resolve_every_path() {
        let spec = resolve_cache("build", "multi", &custom(), "/ws/").expect("resolve");
        assert_eq!(
            spec.paths,
            vec!["/opt/one".to_string(), "/ws/two".to_string()]
        );
    }

    #[test]
    fn custom_definition_shadows_builtin() {
        let spec = resolve_cache("build", "node", &custom(), "/ws").expect("resolve");
        assert_eq!(spec.paths, vec!["/ws/web/node_modules".to_string()]);
    }

    #[test]
    fn builtin_table_is_the_fallback() {
        let spec = resolve_cache("build", "maven", &BTreeMap::new(), "/ws").expect("resolve");
        assert_eq!(spec.paths, vec!["/root/.m2/repository".to_string()]);
        let spec = resolve_cache("build", "node", &BTreeMap::new(), "/ws").expect("resolve");
        assert_eq!(spec.paths, vec!["/ws/node_modules".to_string()]);
    }

    #[test]
    fn unknown_and_empty_caches_are_config_errors() {
        let err = resolve_cache("build", "bogus", &custom(), "/ws").unwrap_err();
        assert_eq!(
            err,
            ConfigError::UnknownCache {
                step: "build".to_string(),
                cache: "bogus".to_string(),
            }
        );
        assert!(matches!(
            resolve_cache("build", "none", &custom(), "/ws"),
            Err(ConfigError::EmptyCache { .. })
        ));
    }

    #[test]
    fn slug_is_stable_and_flat() {
        assert_eq!(path_slug("/root/.m2/repository"), "root_.m2_repository");
        assert_eq!(path_slug("/"), "_");
    }
}

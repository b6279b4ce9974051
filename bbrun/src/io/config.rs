//! Runner configuration stored under `.bbrun/config.toml`.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Runner configuration (TOML).
///
/// Every field is optional in the file; missing fields take the defaults
/// below. The file itself is optional too.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RunnerConfig {
    /// Container CLI binary.
    pub docker_bin: String,

    /// Shell that runs the composed script inside the container.
    pub shell: String,

    /// Absolute workspace directory inside the container.
    pub workspace_dir: String,

    /// Ignore file name, relative to the project root.
    pub ignore_file: String,

    /// Host directory holding cache directories. Defaults to
    /// `$HOME/.cache/bbrun`, or `bbrun/caches` under the system temp
    /// directory when `HOME` is unset.
    pub cache_dir: Option<PathBuf>,

    /// Timeout for container housekeeping (create, copy, destroy) in seconds.
    /// Script execution is not bounded.
    pub docker_timeout_secs: u64,

    /// Column width of the step name in progress lines.
    pub name_width: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            docker_bin: "docker".to_string(),
            shell: "sh".to_string(),
            workspace_dir: "/ws".to_string(),
            ignore_file: ".bbignore".to_string(),
            cache_dir: None,
            docker_timeout_secs: 600,
            name_width: 60,
        }
    }
}

impl RunnerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.docker_bin.trim().is_empty() {
            return Err(anyhow!("docker_bin must be non-empty"));
        }
        if self.shell.trim().is_empty() {
            return Err(anyhow!("shell must be non-empty"));
        }
        let below_root = !self.workspace_dir.trim_end_matches('/').is_empty();
        if !self.workspace_dir.starts_with('/') || !below_root {
            return Err(anyhow!(
                "workspace_dir must be an absolute path below / (got {:?})",
                self.workspace_dir
            ));
        }
        if self.docker_timeout_secs == 0 {
            return Err(anyhow!("docker_timeout_secs must be > 0"));
        }
        Ok(())
    }

    pub fn docker_timeout(&self) -> Duration {
        Duration::from_secs(self.docker_timeout_secs)
    }

    /// Host directory that holds cache directories for `project_root`.
    pub fn cache_root(&self, project_root: &Path) -> PathBuf {
        self.cache_root_from(project_root, std::env::var_os("HOME"))
    }

    /// The fallback stays outside the project: the whole project tree is
    /// copied into every step's workspace.
    fn cache_root_from(&self, project_root: &Path, home: Option<OsString>) -> PathBuf {
        if let Some(dir) = &self.cache_dir {
            return project_root.join(dir);
        }
        match home {
            Some(home) if !home.is_empty() => PathBuf::from(home).join(".cache").join("bbrun"),
            _ => std::env::temp_dir().join("bbrun").join("caches"),
        }
    }
}

/// Paths of the runner's state files inside a project.
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    pub root: PathBuf,
    pub config_path: PathBuf,
    pub cache_index_path: PathBuf,
}

impl ProjectPaths {
    pub fn new(root: &Path) -> Self {
        let state_dir = root.join(".bbrun");
        Self {
            root: root.to_path_buf(),
            config_path: state_dir.join("config.toml"),
            cache_index_path: state_dir.join("caches.json"),
        }
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `RunnerConfig::default()`.
pub fn load_config(path: &Path) -> Result<RunnerConfig> {
    if !path.exists() {
        let cfg = RunnerConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: RunnerConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, RunnerConfig::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "workspace_dir = \"/build\"\ncache_dir = \"cache\"\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.workspace_dir, "/build");
        assert_eq!(cfg.shell, "sh");
        assert_eq!(cfg.cache_root(temp.path()), temp.path().join("cache"));
    }

    #[test]
    fn cache_root_prefers_home() {
        let cfg = RunnerConfig::default();
        let root = cfg.cache_root_from(Path::new("/proj"), Some(OsString::from("/home/dev")));
        assert_eq!(root, PathBuf::from("/home/dev/.cache/bbrun"));
    }

    #[test]
    fn cache_root_without_home_is_outside_project() {
        let cfg = RunnerConfig::default();
        let project = Path::new("/proj");
        for home in [None, Some(OsString::new())] {
            let root = cfg.cache_root_from(project, home);
            assert!(!root.starts_with(project), "{}", root.display());
            assert_eq!(root, std::env::temp_dir().join("bbrun").join("caches"));
        }
    }

    #[test]
    fn relative_workspace_dir_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "workspace_dir = \"ws\"\n").expect("write");
        let err = load_config(&path).unwrap_err();
        assert!(format!("{err:#}").contains("workspace_dir"));
    }

    #[test]
    fn unknown_types_fail_to_parse() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "docker_timeout_secs = \"soon\"\n").expect("write");
        assert!(load_config(&path).is_err());
    }
}

//! `.bbignore`: glob patterns removed from the workspace copy.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, warn};

/// Read patterns from `path`. Blank lines and `#` comments are skipped; a
/// missing file yields no patterns.
pub fn read_patterns(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Expand `patterns` against `root`, returning sorted root-relative paths
/// with `/` separators.
pub fn expand_patterns(root: &Path, patterns: &[String]) -> Result<Vec<String>> {
    // The root is literal; only the user's pattern may contain wildcards.
    let base = glob::Pattern::escape(&root.to_string_lossy());
    let mut matches = Vec::new();
    for pattern in patterns {
        let anchored = format!(
            "{}/{}",
            base.trim_end_matches('/'),
            pattern.trim_start_matches("./")
        );
        let paths =
            glob::glob(&anchored).with_context(|| format!("invalid ignore pattern {pattern:?}"))?;
        for entry in paths {
            let path = match entry {
                Ok(path) => path,
                Err(err) => {
                    warn!(err = %err, pattern = %pattern, "skipping unreadable ignore match");
                    continue;
                }
            };
            let Ok(relative) = path.strip_prefix(root) else {
                continue;
            };
            let relative = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            if !relative.is_empty() {
                matches.push(relative);
            }
        }
    }
    matches.sort();
    matches.dedup();
    debug!(
        patterns = patterns.len(),
        matches = matches.len(),
        "expanded ignore patterns"
    );
    Ok(matches)
}

/// Read the ignore file under `root` and expand it.
pub fn ignored_paths(root: &Path, ignore_file: &str) -> Result<Vec<String>> {
    let patterns = read_patterns(&root.join(ignore_file))?;
    expand_patterns(root, &patterns)
}

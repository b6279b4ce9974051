//! Composition of a step's command list into one `sh` script.

use crate::core::tokens::Tokens;

/// Inputs for composing one step's script.
#[derive(Debug, Clone)]
pub struct ScriptRequest<'a> {
    pub commands: &'a [String],
    /// Workspace-relative paths removed before the first command.
    pub ignored_paths: &'a [String],
    pub tokens: &'a Tokens,
    /// Append the sentinel marker after the last command.
    pub with_sentinel: bool,
}

/// Render the script text.
///
/// The script runs under `set -e`, so the first failing command ends it and
/// later framing markers are never printed.
pub fn compose_script(request: &ScriptRequest<'_>) -> String {
    let mut lines = Vec::with_capacity(request.commands.len() * 2 + 4);
    lines.push("set -e".to_string());
    lines.push("exec 2>&1".to_string());
    for path in request.ignored_paths {
        lines.push(format!("rm -rf -- {}", shell_quote(path)));
    }
    for command in request.commands {
        lines.push(print_marker(&request.tokens.frame));
        lines.push(command.clone());
    }
    if request.with_sentinel {
        lines.push(print_marker(&request.tokens.sentinel));
    }
    lines.push(String::new());
    lines.join("\n")
}

fn print_marker(token: &str) -> String {
    format!("printf '%s\\n' {}", shell_quote(token))
}

/// Quote `value` as a single `sh` word.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

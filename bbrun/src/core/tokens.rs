//! Framing and sentinel markers embedded in composed scripts.

use rand::{Rng, distributions::Alphanumeric};

const TOKEN_LEN: usize = 24;

/// Marker pair used to delimit command output in one step's raw stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tokens {
    /// Printed before every command.
    pub frame: String,
    /// Printed once after the last command when the whole script completed.
    pub sentinel: String,
}

impl Tokens {
    pub fn new(frame: impl Into<String>, sentinel: impl Into<String>) -> Self {
        Self {
            frame: frame.into(),
            sentinel: sentinel.into(),
        }
    }

    /// Generate a fresh marker pair that does not occur in any of `commands`.
    ///
    /// Commands that print their own text (e.g. `cat` of the script) would
    /// otherwise be able to forge a marker.
    pub fn generate(commands: &[String]) -> Self {
        loop {
            let tokens = Self {
                frame: format!("bbrun-frame-{}", random_suffix()),
                sentinel: format!("bbrun-done-{}", random_suffix()),
            };
            if !tokens.collides_with(commands) {
                return tokens;
            }
        }
    }

    fn collides_with(&self, commands: &[String]) -> bool {
        commands
            .iter()
            .any(|cmd| cmd.contains(&self.frame) || cmd.contains(&self.sentinel))
    }
}

fn random_suffix() -> String {
    let mut rng = rand::thread_rng();
    std::iter::repeat_with(|| rng.sample(Alphanumeric))
        .map(char::from)
        .take(TOKEN_LEN)
        .collect()
}

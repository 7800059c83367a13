//! Command safety policy for shell actions.
//!
//! This is a best-effort guard against obviously destructive commands. It is
//! plain substring matching on the substituted command text and is trivially
//! bypassed (quoting, variables, `eval`, a script that writes a script). It is
//! not a sandbox: shell and script actions run with the privileges of the
//! host process. Deployments that need isolation must provide it outside this
//! process.

use std::fmt;

/// Patterns blocked by [`DenyListPolicy::default`].
pub const DEFAULT_DENYLIST: &[&str] = &[
    "rm -rf",
    "rm -fr",
    "sudo ",
    "chmod 777",
    "chmod -r 777",
    "mkfs",
    "dd if=",
    ":(){",
];

/// Decision for a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyDecision {
    /// Command may run.
    Allow,
    /// Command matched a forbidden pattern.
    Block { pattern: String },
}

/// Trait for deciding whether a shell command may run.
///
/// Implement this trait to plug a different rule set into the executor.
/// The command passed in is the final text after parameter substitution.
pub trait CommandPolicy: fmt::Debug + Send + Sync {
    /// Evaluate a command.
    fn evaluate(&self, command: &str) -> PolicyDecision;
}

/// Case-insensitive substring denylist.
#[derive(Debug, Clone)]
pub struct DenyListPolicy {
    patterns: Vec<String>,
}

impl DenyListPolicy {
    /// Create a policy from a set of forbidden substrings.
    #[must_use]
    pub fn new<I>(patterns: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| p.into().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// Add a forbidden substring.
    #[must_use]
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        let pattern = pattern.into().to_lowercase();
        if !pattern.is_empty() && !self.patterns.contains(&pattern) {
            self.patterns.push(pattern);
        }
        self
    }

    /// Configured patterns, lowercased.
    #[must_use]
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

impl Default for DenyListPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_DENYLIST.iter().copied())
    }
}

impl CommandPolicy for DenyListPolicy {
    fn evaluate(&self, command: &str) -> PolicyDecision {
        let lowered = command.to_lowercase();
        self.patterns
            .iter()
            .find(|p| lowered.contains(p.as_str()))
            .map_or(PolicyDecision::Allow, |p| PolicyDecision::Block {
                pattern: p.clone(),
            })
    }
}

/// Policy that allows every command.
#[derive(Debug, Default, Clone)]
pub struct AllowAllPolicy;

impl CommandPolicy for AllowAllPolicy {
    fn evaluate(&self, _command: &str) -> PolicyDecision {
        PolicyDecision::Allow
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_blocks_recursive_delete_case_insensitively() {
        let policy = DenyListPolicy::default();
        assert_eq!(
            policy.evaluate("echo hi && RM -RF /"),
            PolicyDecision::Block {
                pattern: "rm -rf".into()
            }
        );
        assert_eq!(
            policy.evaluate("Sudo reboot"),
            PolicyDecision::Block {
                pattern: "sudo ".into()
            }
        );
    }

    #[test]
    fn test_default_allows_ordinary_commands() {
        let policy = DenyListPolicy::default();
        for cmd in ["echo hello", "ls -la /tmp", "git status", "chmod 644 file"] {
            assert_eq!(policy.evaluate(cmd), PolicyDecision::Allow, "{cmd}");
        }
    }

    #[test]
    fn test_custom_patterns() {
        let policy = DenyListPolicy::new(["Shutdown"]).with_pattern("reboot");
        assert_eq!(policy.patterns(), ["shutdown", "reboot"]);
        assert!(matches!(
            policy.evaluate("sudo SHUTDOWN now"),
            PolicyDecision::Block { pattern } if pattern == "shutdown"
        ));
        assert_eq!(policy.evaluate("rm -rf /"), PolicyDecision::Allow);
    }

    #[test]
    fn test_empty_patterns_are_ignored() {
        let policy = DenyListPolicy::new(["", "x"]).with_pattern("");
        assert_eq!(policy.patterns(), ["x"]);
        assert_eq!(policy.evaluate("echo"), PolicyDecision::Allow);
    }

    #[test]
    fn test_allow_all() {
        assert_eq!(AllowAllPolicy.evaluate("rm -rf /"), PolicyDecision::Allow);
    }
}

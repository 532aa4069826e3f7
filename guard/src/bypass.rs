//! Environment-aware bypass
//!
//! Disposable environments skip confirmation entirely; the decision is made
//! before any request is built or logged.

use crate::registry::ActionPolicyRegistry;
use std::collections::HashSet;
use std::sync::Arc;

/// Environments that skip confirmation unless configured otherwise.
pub const DEFAULT_BYPASS_ENVIRONMENTS: &[&str] = &["test", "development"];

/// Decides whether a call has to be confirmed.
#[derive(Debug, Clone)]
pub struct BypassPolicy {
    registry: Arc<ActionPolicyRegistry>,
    environments: HashSet<String>,
}

impl BypassPolicy {
    pub fn new<I, S>(registry: Arc<ActionPolicyRegistry>, environments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let environments = environments
            .into_iter()
            .map(|e| normalize(e.as_ref()))
            .filter(|e| !e.is_empty())
            .collect();
        Self {
            registry,
            environments,
        }
    }

    /// Whether `environment` is one of the bypass environments.
    pub fn is_bypass_environment(&self, environment: Option<&str>) -> bool {
        environment
            .map(|env| self.environments.contains(&normalize(env)))
            .unwrap_or(false)
    }

    /// Whether calling `tool` in `environment` requires confirmation.
    pub fn requires_confirmation(&self, tool: &str, environment: Option<&str>) -> bool {
        if self.is_bypass_environment(environment) {
            return false;
        }
        self.registry.is_dangerous(tool)
    }

    /// Configured bypass environments, sorted.
    pub fn environments(&self) -> Vec<&str> {
        let mut envs: Vec<&str> = self.environments.iter().map(String::as_str).collect();
        envs.sort_unstable();
        envs
    }
}

fn normalize(env: &str) -> String {
    env.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> BypassPolicy {
        BypassPolicy::new(
            Arc::new(ActionPolicyRegistry::builtin()),
            DEFAULT_BYPASS_ENVIRONMENTS,
        )
    }

    #[test]
    fn test_bypass_environments_skip_confirmation() {
        let policy = policy();
        let registry = ActionPolicyRegistry::builtin();
        for (tool, _) in registry.iter() {
            assert!(!policy.requires_confirmation(tool, Some("test")));
            assert!(!policy.requires_confirmation(tool, Some("development")));
            assert!(policy.requires_confirmation(tool, Some("production")));
            assert!(policy.requires_confirmation(tool, Some("staging")));
            assert!(policy.requires_confirmation(tool, None));
        }
    }

    #[test]
    fn test_unguarded_tools_never_require_confirmation() {
        let policy = policy();
        assert!(!policy.requires_confirmation("list_instances", Some("production")));
        assert!(!policy.requires_confirmation("list_instances", None));
    }

    #[test]
    fn test_environment_labels_are_normalized() {
        let policy = policy();
        assert!(policy.is_bypass_environment(Some(" Test ")));
        assert!(!policy.is_bypass_environment(Some("testing")));
        assert!(!policy.is_bypass_environment(None));
        assert_eq!(policy.environments(), vec!["development", "test"]);
    }

    #[test]
    fn test_empty_bypass_set_guards_everywhere() {
        let policy = BypassPolicy::new(
            Arc::new(ActionPolicyRegistry::builtin()),
            Vec::<String>::new(),
        );
        assert!(policy.requires_confirmation("destroy_virtual_machine", Some("test")));
    }
}

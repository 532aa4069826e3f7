//! Action policy types
//!
//! An [`ActionPolicy`] describes why an operation is dangerous and what the
//! caller has to type back before it is allowed to run.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How bad it is if the operation runs by mistake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Minor, easily undone
    Low,
    /// Noticeable disruption
    Medium,
    /// Data or availability loss for a resource
    High,
    /// Irrecoverable loss or account-wide impact
    Critical,
}

impl Severity {
    /// All severities, lowest first.
    pub const ALL: [Severity; 4] = [
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    /// Lowercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Severity::ALL
            .into_iter()
            .find(|severity| severity.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown severity '{}'", s))
    }
}

/// How far the effects of an operation reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImpactScope {
    /// Only the targeted resource is affected
    SingleResource,
    /// Running services lose availability
    ServiceDisruption,
    /// Shared infrastructure (networks, accounts, clusters) is affected
    Infrastructure,
}

impl ImpactScope {
    /// Kebab-case wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ImpactScope::SingleResource => "single-resource",
            ImpactScope::ServiceDisruption => "service-disruption",
            ImpactScope::Infrastructure => "infrastructure",
        }
    }
}

impl fmt::Display for ImpactScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Confirmation policy for a single guarded operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionPolicy {
    /// Severity of the operation
    pub severity: Severity,

    /// Grouping label (e.g. "Virtual Machine Operations")
    pub category: String,

    /// What the operation does
    pub description: String,

    /// Warning shown before the operation is confirmed
    pub warning_message: String,

    /// Phrase the caller must type back (case-insensitive)
    pub required_confirmation: String,

    /// Whether the effects can be undone
    pub reversible: bool,

    /// Blast radius
    pub impact_scope: ImpactScope,
}

impl ActionPolicy {
    /// Create a policy.
    pub fn new(
        severity: Severity,
        category: impl Into<String>,
        description: impl Into<String>,
        warning_message: impl Into<String>,
        required_confirmation: impl Into<String>,
        reversible: bool,
        impact_scope: ImpactScope,
    ) -> Self {
        Self {
            severity,
            category: category.into(),
            description: description.into(),
            warning_message: warning_message.into(),
            required_confirmation: required_confirmation.into(),
            reversible,
            impact_scope,
        }
    }

    /// Check whether the caller's input matches the required phrase.
    ///
    /// Surrounding whitespace is ignored and both sides are lowercased with
    /// Unicode case mapping; no normalization is applied.
    pub fn phrase_matches(&self, input: &str) -> bool {
        input.trim().to_lowercase() == self.required_confirmation.trim().to_lowercase()
    }

    /// Short title used in prompts.
    pub fn title(&self) -> String {
        format!("{} action requires confirmation", capitalize(self.severity.as_str()))
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn destroy_policy() -> ActionPolicy {
        ActionPolicy::new(
            Severity::Critical,
            "Virtual Machine Operations",
            "Destroy a virtual machine",
            "All data will be lost",
            "destroy permanently",
            false,
            ImpactScope::SingleResource,
        )
    }

    #[test]
    fn test_phrase_matches_ignores_case_and_padding() {
        let policy = destroy_policy();
        assert!(policy.phrase_matches("destroy permanently"));
        assert!(policy.phrase_matches("DESTROY PERMANENTLY"));
        assert!(policy.phrase_matches("  Destroy Permanently \n"));
    }

    #[test]
    fn test_phrase_rejects_other_differences() {
        let policy = destroy_policy();
        assert!(!policy.phrase_matches("destroy  permanently"));
        assert!(!policy.phrase_matches("destroy permanently."));
        assert!(!policy.phrase_matches("destroy"));
        assert!(!policy.phrase_matches(""));
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(
            serde_json::to_value(ImpactScope::ServiceDisruption).unwrap(),
            "service-disruption"
        );
        assert_eq!(serde_json::to_value(Severity::Critical).unwrap(), "critical");
        assert!(Severity::Critical > Severity::High);
    }

    #[test]
    fn test_severity_from_str() {
        assert_eq!("High".parse::<Severity>(), Ok(Severity::High));
        assert_eq!(" critical ".parse::<Severity>(), Ok(Severity::Critical));
        assert!("severe".parse::<Severity>().is_err());
        assert_eq!(format!("{:<6}|", Severity::Low), "low   |");
    }

    #[test]
    fn test_title() {
        assert_eq!(
            destroy_policy().title(),
            "Critical action requires confirmation"
        );
    }
}

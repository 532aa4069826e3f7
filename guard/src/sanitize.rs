//! Parameter redaction for audit and display.
//!
//! Invocation parameters come straight from the caller and may carry
//! credentials. Nothing derived from them is logged, audited or shown to an
//! operator before going through [`Sanitizer::sanitize`].

use regex::Regex;
use serde_json::{Map, Value};

/// Marker that replaces redacted values
pub const REDACTED_MARKER: &str = "[REDACTED]";

/// Suffix appended to truncated values
pub const TRUNCATED_SUFFIX: &str = "...[truncated]";

/// Default maximum length (in characters) of a displayed string value
pub const DEFAULT_MAX_VALUE_LENGTH: usize = 200;

/// Default key fragments treated as sensitive. Compared against keys that have
/// been lowercased with `-` and `_` removed.
pub const DEFAULT_SENSITIVE_KEYS: &[&str] = &[
    "password",
    "passwd",
    "secret",
    "token",
    "apikey",
    "privatekey",
    "credential",
    "authorization",
];

/// Redacts sensitive keys and secret-shaped values, truncates long strings.
#[derive(Debug, Clone)]
pub struct Sanitizer {
    sensitive_keys: Vec<String>,
    max_value_length: usize,
    secret_patterns: Vec<Regex>,
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new(
            DEFAULT_SENSITIVE_KEYS.iter().map(|k| k.to_string()),
            DEFAULT_MAX_VALUE_LENGTH,
        )
    }
}

impl Sanitizer {
    /// Create a sanitizer with the given sensitive key fragments.
    pub fn new<I, S>(sensitive_keys: I, max_value_length: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let sensitive_keys = sensitive_keys
            .into_iter()
            .map(|k| normalize_key(k.as_ref()))
            .filter(|k| !k.is_empty())
            .collect();

        let secret_patterns = vec![
            Regex::new(r"-----BEGIN [A-Z ]*PRIVATE KEY-----").expect("Invalid private key regex"),
            Regex::new(r"(?i)\bbearer\s+[a-z0-9._~+/=-]{8,}").expect("Invalid bearer token regex"),
        ];

        Self {
            sensitive_keys,
            max_value_length,
            secret_patterns,
        }
    }

    /// Whether a parameter key names sensitive data.
    pub fn is_sensitive_key(&self, key: &str) -> bool {
        let key = normalize_key(key);
        self.sensitive_keys
            .iter()
            .any(|fragment| key.contains(fragment.as_str()))
    }

    /// Produce a copy of `params` that is safe to log and display.
    pub fn sanitize(&self, params: &Map<String, Value>) -> Map<String, Value> {
        params
            .iter()
            .map(|(key, value)| {
                let value = if self.is_sensitive_key(key) {
                    Value::String(REDACTED_MARKER.to_string())
                } else {
                    self.sanitize_value(value)
                };
                (key.clone(), value)
            })
            .collect()
    }

    fn sanitize_value(&self, value: &Value) -> Value {
        match value {
            Value::String(s) => Value::String(self.sanitize_str(s)),
            Value::Array(items) => {
                Value::Array(items.iter().map(|v| self.sanitize_value(v)).collect())
            }
            Value::Object(map) => Value::Object(self.sanitize(map)),
            other => other.clone(),
        }
    }

    fn sanitize_str(&self, s: &str) -> String {
        if self.secret_patterns.iter().any(|re| re.is_match(s)) {
            return REDACTED_MARKER.to_string();
        }
        truncate(s, self.max_value_length)
    }
}

/// Truncate to `max` characters, appending [`TRUNCATED_SUFFIX`] when cut.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max).collect();
    out.push_str(TRUNCATED_SUFFIX);
    out
}

fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

//! Key namespacing.
//!
//! Every logical key is prefixed before it reaches a backend so that flush
//! and stats can be scoped to this cache's own data in a shared keyspace.
//! The prefix never leaks back to callers.

/// Prefix applied when a driver is configured without one.
pub const DEFAULT_PREFIX: &str = "cache:";

/// A fixed key prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyNamespace {
    prefix: String,
}

impl KeyNamespace {
    pub fn new(prefix: impl Into<String>) -> Self {
        KeyNamespace {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Build the backend key for a logical key.
    pub fn qualify(&self, key: &str) -> String {
        let mut full = String::with_capacity(self.prefix.len() + key.len());
        full.push_str(&self.prefix);
        full.push_str(key);
        full
    }

    /// Recover the logical key, or `None` if `raw` is outside the namespace.
    pub fn strip<'a>(&self, raw: &'a str) -> Option<&'a str> {
        raw.strip_prefix(self.prefix.as_str())
    }

    /// Glob matching every key in the namespace (Redis `MATCH` syntax).
    ///
    /// Glob metacharacters inside the prefix are escaped so a prefix like
    /// `"app[1]:"` only matches itself.
    pub fn pattern(&self) -> String {
        let mut pattern = String::with_capacity(self.prefix.len() + 1);
        for c in self.prefix.chars() {
            if matches!(c, '*' | '?' | '[' | ']' | '\\') {
                pattern.push('\\');
            }
            pattern.push(c);
        }
        pattern.push('*');
        pattern
    }

    /// Anchored regular expression matching every key in the namespace
    /// (MongoDB `$regex` syntax).
    pub fn regex(&self) -> String {
        let mut regex = String::with_capacity(self.prefix.len() + 1);
        regex.push('^');
        for c in self.prefix.chars() {
            if "\\.^$|?*+()[]{}".contains(c) {
                regex.push('\\');
            }
            regex.push(c);
        }
        regex
    }
}

impl Default for KeyNamespace {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

//! Path pattern matching.
//!
//! # Responsibilities
//! - Classify registered paths as exact or subtree patterns
//! - Match request paths (case-sensitive)
//!
//! # Design Decisions
//! - A pattern ending in `/` matches the whole subtree below it
//! - Any other pattern matches only the identical path
//! - No regex, plain string comparisons only

/// A registered mux pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPattern {
    /// Matches only the identical path.
    Exact(String),
    /// Matches every path that starts with the prefix (which ends in `/`).
    Subtree(String),
}

impl PathPattern {
    /// Classify a raw pattern.
    pub fn parse(pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        if pattern.ends_with('/') {
            PathPattern::Subtree(pattern)
        } else {
            PathPattern::Exact(pattern)
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            PathPattern::Exact(p) | PathPattern::Subtree(p) => p,
        }
    }

    /// Returns true if the request path matches this pattern.
    pub fn matches(&self, path: &str) -> bool {
        match self {
            PathPattern::Exact(p) => p == path,
            PathPattern::Subtree(prefix) => path.starts_with(prefix.as_str()),
        }
    }

    /// Length used for longest-match ordering.
    pub fn specificity(&self) -> usize {
        self.as_str().len()
    }
}

/// Strip the wildcard mount suffix from a listen path.
///
/// Returns the mount prefix when `listen_path` contains `/*` (everything from
/// the first `/*` on is dropped), `None` otherwise.
pub fn mount_prefix(listen_path: &str) -> Option<&str> {
    listen_path.find("/*").map(|idx| &listen_path[..idx])
}

//! HTTP method allow-list for rate limiting.

use std::collections::HashSet;

/// The set of HTTP methods subject to rate limiting.
///
/// Matching is exact and case-sensitive. Requests with any other method are
/// never limited, so an empty filter disables limiting entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodFilter {
    methods: HashSet<String>,
}

impl MethodFilter {
    /// Create a filter limiting the given methods.
    pub fn new<I, S>(methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            methods: methods.into_iter().map(Into::into).collect(),
        }
    }

    /// Check whether requests with `method` are limited.
    pub fn matches(&self, method: &str) -> bool {
        self.methods.contains(method)
    }

    /// Check whether no method is limited.
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for MethodFilter {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_configured_methods() {
        let filter = MethodFilter::new(["POST", "PUT"]);

        assert!(filter.matches("POST"));
        assert!(filter.matches("PUT"));
        assert!(!filter.matches("GET"));
    }

    #[test]
    fn test_match_is_case_sensitive() {
        let filter = MethodFilter::new(["POST"]);
        assert!(!filter.matches("post"));
        assert!(!filter.matches("Post"));
    }

    #[test]
    fn test_empty_filter_matches_nothing() {
        let filter = MethodFilter::default();

        assert!(filter.is_empty());
        for method in ["GET", "POST", "DELETE", ""] {
            assert!(!filter.matches(method));
        }
    }

    #[test]
    fn test_collect_into_filter() {
        let filter: MethodFilter = vec!["GET".to_string()].into_iter().collect();
        assert!(filter.matches("GET"));
    }
}

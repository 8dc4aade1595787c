//! Route classification.
//!
//! An ordered rule table maps a request path and method to a logical category.
//! Rules are evaluated top to bottom and the first match wins, so a specific
//! sub-path (the OTP endpoints) must be listed before its parent prefix (the
//! general auth endpoints).

use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::constants::FALLBACK_CATEGORY;
use crate::error::ConfigError;

// ----------------------------------------------------------------------------
// Rule Configuration
// ----------------------------------------------------------------------------

/// How a rule's pattern is compared against a path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    /// Path equals the pattern or continues with `/` after it
    #[default]
    Prefix,
    /// Path equals the pattern
    Exact,
    /// Pattern is a regular expression searched in the path
    Regex,
}

/// One row of the classification table as it appears in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleConfig {
    #[serde(rename = "match", default)]
    pub kind: MatchKind,
    pub pattern: String,
    /// HTTP methods this rule applies to; empty means any
    #[serde(default)]
    pub methods: Vec<String>,
    pub category: String,
}

impl RuleConfig {
    pub fn prefix(pattern: &str, category: &str) -> Self {
        Self {
            kind: MatchKind::Prefix,
            pattern: pattern.into(),
            methods: Vec::new(),
            category: category.into(),
        }
    }

    pub fn regex(pattern: &str, category: &str) -> Self {
        Self {
            kind: MatchKind::Regex,
            pattern: pattern.into(),
            methods: Vec::new(),
            category: category.into(),
        }
    }

    pub fn with_methods(mut self, methods: &[&str]) -> Self {
        self.methods = methods.iter().map(|m| m.to_string()).collect();
        self
    }
}

/// The built-in table for the admin platform's API.
pub fn default_rules() -> Vec<RuleConfig> {
    vec![
        RuleConfig::prefix("/api/v1/auth/otp", "otp"),
        RuleConfig::prefix("/api/v1/auth", "authentication"),
        RuleConfig::prefix("/api/v1/admin", "admin"),
        RuleConfig::prefix("/api/v1/users", "users"),
        RuleConfig::prefix("/api/v1/posts", "posts"),
        RuleConfig::prefix("/api/v1/comments", "comments"),
        RuleConfig::prefix("/api/v1/connections", "connections"),
        RuleConfig::prefix("/api/v1/meetings", "meetings"),
        RuleConfig::prefix("/api/v1/stories", "stories"),
        RuleConfig::prefix("/api/v1/themes", "themes"),
        RuleConfig::prefix("/api/v1/support", "support"),
        RuleConfig::prefix("/api/v1/notifications", "notifications"),
        RuleConfig::regex(r"^/api/v1/(chat|messages)(/|$)", "messaging"),
        RuleConfig::regex(r"^/api/v1/(uploads|media)(/|$)", "media"),
        RuleConfig::regex(r"^(/api/v1)?/system-health(/|$)", "monitoring"),
        RuleConfig::regex(r"^/(health|healthz|ready)$", "health_check").with_methods(&["GET", "HEAD"]),
    ]
}

// ----------------------------------------------------------------------------
// Compiled Rules
// ----------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum RouteMatcher {
    Prefix(String),
    Exact(String),
    Pattern(Regex),
}

impl RouteMatcher {
    fn matches(&self, path: &str) -> bool {
        match self {
            RouteMatcher::Prefix(prefix) => match path.strip_prefix(prefix.as_str()) {
                Some(rest) => rest.is_empty() || rest.starts_with('/') || prefix.ends_with('/'),
                None => false,
            },
            RouteMatcher::Exact(exact) => path == exact,
            RouteMatcher::Pattern(re) => re.is_match(path),
        }
    }
}

#[derive(Debug, Clone)]
struct ClassificationRule {
    matcher: RouteMatcher,
    /// Upper-cased; empty means any method
    methods: Vec<String>,
    category: Arc<str>,
}

impl ClassificationRule {
    fn compile(index: usize, config: &RuleConfig) -> Result<Self, ConfigError> {
        let field = || format!("classifier.rules[{}]", index);

        if config.category.trim().is_empty() {
            return Err(ConfigError::invalid_value(field(), "category must not be empty"));
        }
        if config.pattern.is_empty() {
            return Err(ConfigError::invalid_value(field(), "pattern must not be empty"));
        }

        let matcher = match config.kind {
            MatchKind::Prefix => RouteMatcher::Prefix(config.pattern.clone()),
            MatchKind::Exact => RouteMatcher::Exact(config.pattern.clone()),
            MatchKind::Regex => RouteMatcher::Pattern(
                Regex::new(&config.pattern)
                    .map_err(|e| ConfigError::invalid_value(field(), e.to_string()))?,
            ),
        };

        Ok(Self {
            matcher,
            methods: config.methods.iter().map(|m| m.to_ascii_uppercase()).collect(),
            category: Arc::from(config.category.as_str()),
        })
    }

    fn matches(&self, path: &str, method: &str) -> bool {
        let method_ok = self.methods.is_empty()
            || self.methods.iter().any(|m| m.eq_ignore_ascii_case(method));
        method_ok && self.matcher.matches(path)
    }
}

// ----------------------------------------------------------------------------
// Route Classifier
// ----------------------------------------------------------------------------

/// Maps a (route, method) pair to its category. Pure and deterministic.
#[derive(Debug, Clone)]
pub struct RouteClassifier {
    rules: Vec<ClassificationRule>,
    fallback: Arc<str>,
}

impl Default for RouteClassifier {
    fn default() -> Self {
        // The built-in table only contains valid patterns.
        Self::from_rules(&default_rules(), FALLBACK_CATEGORY).unwrap_or_else(|_| Self {
            rules: Vec::new(),
            fallback: Arc::from(FALLBACK_CATEGORY),
        })
    }
}

impl RouteClassifier {
    /// Compile a rule table, preserving its order.
    pub fn from_rules(rules: &[RuleConfig], fallback: &str) -> Result<Self, ConfigError> {
        let rules = rules
            .iter()
            .enumerate()
            .map(|(i, rule)| ClassificationRule::compile(i, rule))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            rules,
            fallback: Arc::from(fallback),
        })
    }

    /// Category for a request. Query strings and fragments are ignored.
    pub fn classify(&self, route: &str, method: &str) -> &str {
        self.classify_shared(route, method).as_ref()
    }

    /// Same as [`classify`](Self::classify) but hands out the shared name.
    pub(crate) fn classify_shared(&self, route: &str, method: &str) -> &Arc<str> {
        let path = normalize_path(route);
        self.rules
            .iter()
            .find(|rule| rule.matches(path, method))
            .map(|rule| &rule.category)
            .unwrap_or(&self.fallback)
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

/// Strip the query string and fragment from a request target.
pub fn normalize_path(route: &str) -> &str {
    let end = route.find(|c| c == '?' || c == '#').unwrap_or(route.len());
    &route[..end]
}

/// Key under which a route's hits are counted: `"METHOD path"`.
pub fn route_key(route: &str, method: &str) -> String {
    format!("{} {}", method.to_ascii_uppercase(), normalize_path(route))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case("/api/v1/auth/otp/send", "POST", "otp")]
    #[case("/api/v1/auth/otp", "POST", "otp")]
    #[case("/api/v1/auth/login", "POST", "authentication")]
    #[case("/api/v1/auth", "GET", "authentication")]
    #[case("/api/v1/authors", "GET", "other")]
    #[case("/api/v1/users/42", "DELETE", "users")]
    #[case("/api/v1/posts?page=2", "GET", "posts")]
    #[case("/api/v1/meetings/7/attendees", "GET", "meetings")]
    #[case("/api/v1/chat/rooms", "GET", "messaging")]
    #[case("/api/v1/messages", "POST", "messaging")]
    #[case("/api/v1/messagesx", "POST", "other")]
    #[case("/api/v1/system-health/realtime", "GET", "monitoring")]
    #[case("/system-health/api-hits", "GET", "monitoring")]
    #[case("/health", "GET", "health_check")]
    #[case("/health", "POST", "other")]
    #[case("/", "GET", "other")]
    #[case("", "GET", "other")]
    fn test_default_table(#[case] route: &str, #[case] method: &str, #[case] expected: &str) {
        let classifier = RouteClassifier::default();
        assert_eq!(classifier.classify(route, method), expected);
    }

    #[test]
    fn test_specific_rule_wins_over_parent_prefix() {
        let classifier = RouteClassifier::default();
        assert_eq!(classifier.classify("/api/v1/auth/otp/send", "POST"), "otp");
    }

    #[test]
    fn test_rule_order_is_respected() {
        // With the broad rule first, the specific one is unreachable.
        let rules = vec![
            RuleConfig::prefix("/api/v1/auth", "authentication"),
            RuleConfig::prefix("/api/v1/auth/otp", "otp"),
        ];
        let classifier = RouteClassifier::from_rules(&rules, "other").unwrap();
        assert_eq!(classifier.classify("/api/v1/auth/otp/send", "POST"), "authentication");
    }

    #[test]
    fn test_method_restriction_is_case_insensitive() {
        let rules = vec![RuleConfig::prefix("/api/v1/posts", "post_writes").with_methods(&["post", "Put"])];
        let classifier = RouteClassifier::from_rules(&rules, "reads").unwrap();
        assert_eq!(classifier.classify("/api/v1/posts", "POST"), "post_writes");
        assert_eq!(classifier.classify("/api/v1/posts", "put"), "post_writes");
        assert_eq!(classifier.classify("/api/v1/posts", "GET"), "reads");
    }

    #[test]
    fn test_exact_matcher() {
        let rules = vec![RuleConfig {
            kind: MatchKind::Exact,
            pattern: "/metrics".into(),
            methods: Vec::new(),
            category: "scrape".into(),
        }];
        let classifier = RouteClassifier::from_rules(&rules, "other").unwrap();
        assert_eq!(classifier.classify("/metrics", "GET"), "scrape");
        assert_eq!(classifier.classify("/metrics/extra", "GET"), "other");
    }

    #[test]
    fn test_invalid_regex_is_rejected() {
        let rules = vec![RuleConfig::regex("^/api/(", "broken")];
        let err = RouteClassifier::from_rules(&rules, "other").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "classifier.rules[0]"));
    }

    #[test]
    fn test_empty_category_is_rejected() {
        let rules = vec![RuleConfig::prefix("/api", "  ")];
        assert!(RouteClassifier::from_rules(&rules, "other").is_err());
    }

    #[test]
    fn test_route_key() {
        assert_eq!(route_key("/api/v1/users?sort=asc", "get"), "GET /api/v1/users");
        assert_eq!(normalize_path("/a/b#frag"), "/a/b");
    }

    proptest! {
        #[test]
        fn prop_classify_is_deterministic(
            route in "(/[a-z0-9-]{0,8}){0,5}(\\?[a-z=]{0,6})?",
            method in "(GET|POST|PUT|PATCH|DELETE|get|post)",
        ) {
            let classifier = RouteClassifier::default();
            let first = classifier.classify(&route, &method).to_string();
            for _ in 0..3 {
                prop_assert_eq!(classifier.classify(&route, &method), first.as_str());
            }
            let fresh = RouteClassifier::default();
            prop_assert_eq!(fresh.classify(&route, &method), first.as_str());
        }
    }
}

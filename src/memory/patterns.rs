//! Key-pattern classes walked by the optimizer, most disposable first.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternClass {
    /// Glob understood by the cache's key scan
    pub pattern: String,
    pub description: String,
    /// Only keys idle at least this long are removed; `None` removes any match
    pub min_idle_seconds: Option<u64>,
}

impl PatternClass {
    pub fn new(
        pattern: impl Into<String>,
        description: impl Into<String>,
        min_idle_seconds: Option<u64>,
    ) -> Self {
        Self {
            pattern: pattern.into(),
            description: description.into(),
            min_idle_seconds,
        }
    }

    pub fn accepts_idle(&self, idle_seconds: Option<u64>) -> bool {
        match self.min_idle_seconds {
            None => true,
            Some(cutoff) => idle_seconds.is_some_and(|idle| idle >= cutoff),
        }
    }
}

/// Default cleanup order
pub fn default_pattern_classes() -> Vec<PatternClass> {
    vec![
        PatternClass::new("temp:*", "temporary scratch data", None),
        PatternClass::new("session:expired:*", "expired sessions", None),
        PatternClass::new("cache:old:*", "superseded cache generations", Some(3_600)),
        PatternClass::new("analytics:*", "analytics aggregates", Some(86_400)),
        PatternClass::new("report:cache:*", "cached report renders", Some(3_600)),
        PatternClass::new("api:response:*", "cached API responses", Some(1_800)),
        PatternClass::new("user:pref:cache:*", "cached user preferences", Some(7_200)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_order() {
        let patterns: Vec<String> = default_pattern_classes()
            .into_iter()
            .map(|class| class.pattern)
            .collect();
        assert_eq!(
            patterns,
            vec![
                "temp:*",
                "session:expired:*",
                "cache:old:*",
                "analytics:*",
                "report:cache:*",
                "api:response:*",
                "user:pref:cache:*",
            ]
        );
    }

    #[test]
    fn test_idle_cutoff() {
        let class = PatternClass::new("cache:old:*", "old", Some(60));
        assert!(class.accepts_idle(Some(61)));
        assert!(!class.accepts_idle(Some(10)));
        assert!(!class.accepts_idle(None));
        assert!(PatternClass::new("temp:*", "tmp", None).accepts_idle(None));
    }
}

//! Compiled-pattern cache.
//!
//! Regex conditions are compiled once and shared by every in-flight walk.
//! Lookups and inserts race benignly: two walks missing on the same pattern
//! both compile it and the last insert wins.

use dashmap::DashMap;
use regex::Regex;
use std::sync::{Arc, OnceLock};

static SHARED: OnceLock<Arc<PatternCache>> = OnceLock::new();

/// Concurrent cache of compiled patterns, keyed by pattern source.
#[derive(Debug, Default)]
pub struct PatternCache {
    patterns: DashMap<String, Arc<Regex>>,
}

impl PatternCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide cache instance.
    pub fn shared() -> Arc<PatternCache> {
        SHARED.get_or_init(|| Arc::new(PatternCache::new())).clone()
    }

    /// Fetch a compiled pattern, compiling and caching it on a miss.
    ///
    /// Patterns are anchored at both ends: a value matches only if the whole
    /// value matches.
    pub fn get_or_compile(&self, pattern: &str) -> Result<Arc<Regex>, regex::Error> {
        if let Some(compiled) = self.patterns.get(pattern) {
            return Ok(compiled.value().clone());
        }

        let compiled = Arc::new(Regex::new(&format!("^(?:{})$", pattern))?);
        self.patterns.insert(pattern.to_string(), compiled.clone());
        Ok(compiled)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_match() {
        let cache = PatternCache::new();
        let re = cache.get_or_compile("[0-9]+").unwrap();
        assert!(re.is_match("123"));
        assert!(!re.is_match("a123"));
        assert!(!re.is_match("123a"));
    }

    #[test]
    fn test_alternation_is_anchored_as_a_whole() {
        let cache = PatternCache::new();
        let re = cache.get_or_compile("a|b").unwrap();
        assert!(re.is_match("a"));
        assert!(!re.is_match("ab"));
    }

    #[test]
    fn test_cache_reuse() {
        let cache = PatternCache::new();
        let first = cache.get_or_compile("^A.*").unwrap();
        let second = cache.get_or_compile("^A.*").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_invalid_pattern_not_cached() {
        let cache = PatternCache::new();
        assert!(cache.get_or_compile("(unclosed").is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_concurrent_population() {
        let cache = Arc::new(PatternCache::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for j in 0..50 {
                        let re = cache.get_or_compile(&format!("p{}", (i + j) % 10)).unwrap();
                        assert!(re.is_match(&format!("p{}", (i + j) % 10)));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.len(), 10);
    }

    #[test]
    fn test_shared_instance() {
        assert!(Arc::ptr_eq(&PatternCache::shared(), &PatternCache::shared()));
    }
}

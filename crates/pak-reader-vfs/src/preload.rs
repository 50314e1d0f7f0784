//! Preload patterns: trigger substrings that, once matched by a
//! successful load's path, queue a bounded batch of related paths onto
//! the load queue ahead of need.

use crate::priority::LoadPriority;

/// A registered rule: whenever a
/// successful load's path contains any of `triggers`, the VFS lists
/// every mounted file matching any of `patterns` (glob syntax, e.g.
/// `*.uasset`), caps the result at `max_files`, and enqueues the
/// survivors as a single background batch load at `priority` — never
/// blocking the caller whose load fired the trigger.
#[derive(Debug, Clone)]
pub struct PreloadPattern {
    /// Substrings; a requested path containing any one of these fires
    /// this pattern.
    pub triggers: Vec<String>,
    /// Glob patterns (matched against every mount's `list()`) selecting
    /// which files to preload once triggered.
    pub patterns: Vec<String>,
    pub priority: LoadPriority,
    /// Upper bound on how many files a single trigger enqueues.
    pub max_files: usize,
}

impl PreloadPattern {
    pub fn new(
        triggers: Vec<String>,
        patterns: Vec<String>,
        priority: LoadPriority,
        max_files: usize,
    ) -> Self {
        Self {
            triggers,
            patterns,
            priority,
            max_files,
        }
    }

    /// A single-trigger, single-pattern convenience constructor for the
    /// common case.
    pub fn simple(trigger: impl Into<String>, pattern: impl Into<String>, priority: LoadPriority, max_files: usize) -> Self {
        Self::new(vec![trigger.into()], vec![pattern.into()], priority, max_files)
    }

    /// Whether `path` should fire this pattern.
    pub fn matches_trigger(&self, path: &str) -> bool {
        self.triggers.iter().any(|t| path.contains(t.as_str()))
    }

    /// Whether `path` matches any of this pattern's glob selectors.
    pub fn matches_pattern(&self, path: &str) -> bool {
        self.patterns.iter().any(|p| {
            glob::Pattern::new(p)
                .map(|g| g.matches(path) || g.matches(&path.to_lowercase()))
                .unwrap_or(false)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_on_substring_containment_among_multiple_triggers() {
        let pattern = PreloadPattern::new(
            vec!["level01".to_string(), "level02".to_string()],
            vec!["*.uasset".to_string()],
            LoadPriority::Low,
            64,
        );
        assert!(pattern.matches_trigger("maps/level01/main.umap"));
        assert!(pattern.matches_trigger("maps/level02/main.umap"));
        assert!(!pattern.matches_trigger("maps/level03/main.umap"));
    }

    #[test]
    fn matches_pattern_against_glob_selectors() {
        let pattern = PreloadPattern::simple(".umat", "*.uasset", LoadPriority::Low, 10);
        assert!(pattern.matches_pattern("Content/Foo.uasset"));
        assert!(!pattern.matches_pattern("Content/Foo.umap"));
    }
}

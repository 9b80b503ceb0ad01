//! Suffix index from dotted numeric identifier patterns to handlers.
//!
//! Patterns are registered once at process start and the trie is read-only
//! afterwards, so it is safe to share across concurrent poll tasks without
//! synchronization.

use std::collections::HashMap;

/// One registered pattern that is a suffix of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrieMatch<T> {
    pub pattern: String,
    pub handler: T,
}

#[derive(Debug)]
struct Node<T> {
    children: HashMap<char, Node<T>>,
    entries: Vec<(String, T)>,
}

impl<T> Default for Node<T> {
    fn default() -> Self {
        Self {
            children: HashMap::new(),
            entries: Vec::new(),
        }
    }
}

/// Suffix trie keyed from the least-significant end of the identifier
/// backward. A query matches every registered pattern the query string
/// ends with, so both `14988.1` and `988.1` match a sysObjectID ending in
/// `...14988.1`.
#[derive(Debug)]
pub struct OidTrie<T> {
    root: Node<T>,
}

impl<T: Clone> Default for OidTrie<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> OidTrie<T> {
    pub fn new() -> Self {
        Self {
            root: Node::default(),
        }
    }

    /// Registers `handler` under a dotted numeric suffix pattern. Empty
    /// patterns are ignored.
    pub fn register(&mut self, pattern: &str, handler: T) {
        if pattern.is_empty() {
            return;
        }
        let mut node = &mut self.root;
        for ch in pattern.chars().rev() {
            node = node.children.entry(ch).or_default();
        }
        node.entries.push((pattern.to_string(), handler));
    }

    /// Every registered pattern that is a suffix of `query`, most specific
    /// (longest) first, ties broken lexically. An empty query matches
    /// nothing.
    pub fn search(&self, query: &str) -> Vec<TrieMatch<T>> {
        let mut matches = Vec::new();
        let mut node = &self.root;
        for ch in query.chars().rev() {
            match node.children.get(&ch) {
                Some(next) => node = next,
                None => break,
            }
            for (pattern, handler) in &node.entries {
                matches.push(TrieMatch {
                    pattern: pattern.clone(),
                    handler: handler.clone(),
                });
            }
        }
        matches.sort_by(|a, b| {
            b.pattern
                .len()
                .cmp(&a.pattern.len())
                .then_with(|| a.pattern.cmp(&b.pattern))
        });
        matches
    }

    /// The single unambiguous handler for `query`.
    ///
    /// Returns `None` for an empty query, a query with no match, and a
    /// query matching more than one registered pattern. Multiple matches
    /// mean the registration is ambiguous for this device class; resolving
    /// to nothing disables vendor enrichment instead of guessing.
    pub fn resolve(&self, query: &str) -> Option<T> {
        let mut matches = self.search(query);
        if matches.len() == 1 {
            Some(matches.remove(0).handler)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trie(entries: &[(&str, &str)]) -> OidTrie<String> {
        let mut trie = OidTrie::new();
        for (pattern, handler) in entries {
            trie.register(pattern, handler.to_string());
        }
        trie
    }

    #[test]
    fn exact_pattern_is_among_its_own_matches() {
        let trie = trie(&[("14988.1", "mikrotik"), ("41112.1.4", "ubiquiti")]);
        let matches = trie.search("14988.1");
        assert!(matches.iter().any(|m| m.pattern == "14988.1"));
    }

    #[test]
    fn suffix_of_full_sys_object_id_resolves() {
        let trie = trie(&[("14988.1", "mikrotik")]);
        assert_eq!(
            trie.resolve("1.3.6.1.4.1.14988.1"),
            Some("mikrotik".to_string())
        );
    }

    #[test]
    fn unrelated_query_does_not_resolve() {
        let trie = trie(&[("14988.1", "mikrotik")]);
        assert_eq!(trie.resolve("1.3.6.1.4.1.9.1.1"), None);
        assert!(trie.search("1.3.6.1.4.1.9.1.1").is_empty());
    }

    #[test]
    fn empty_query_matches_nothing() {
        let trie = trie(&[("14988.1", "mikrotik")]);
        assert!(trie.search("").is_empty());
        assert_eq!(trie.resolve(""), None);
    }

    #[test]
    fn overlapping_patterns_are_ambiguous() {
        // Both are string suffixes of a query ending in ...14988.1, so the
        // device must stay unmapped rather than being misclassified.
        let trie = trie(&[("14988.1", "mikrotik"), ("988.1", "other")]);
        let matches = trie.search("1.3.6.1.4.1.14988.1");
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].pattern, "14988.1");
        assert_eq!(trie.resolve("1.3.6.1.4.1.14988.1"), None);
    }

    #[test]
    fn longest_pattern_sorts_first() {
        let trie = trie(&[("1", "a"), ("988.1", "b"), ("14988.1", "c")]);
        let matches = trie.search("1.3.6.1.4.1.14988.1");
        let patterns: Vec<_> = matches.iter().map(|m| m.pattern.as_str()).collect();
        assert_eq!(patterns, vec!["14988.1", "988.1", "1"]);
    }

    #[test]
    fn empty_pattern_is_never_registered() {
        let mut trie: OidTrie<String> = OidTrie::new();
        trie.register("", "nothing".to_string());
        assert!(trie.search("1.2.3").is_empty());
    }
}

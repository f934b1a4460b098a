use compact_str::CompactString;
use rustc_hash::FxBuildHasher;
use smallvec::SmallVec;
use std::collections::HashMap;

#[derive(Default)]
struct TrieNode {
    children: HashMap<CompactString, TrieNode, FxBuildHasher>,
    /// The rule text that terminates here, when this node ends a rule.
    rule: Option<CompactString>,
}

impl TrieNode {
    fn new() -> Self {
        Self {
            children: HashMap::with_hasher(FxBuildHasher),
            rule: None,
        }
    }
}

/// Label-reversed trie for domain suffix matching: a rule `example.com`
/// matches `example.com` and every name below it, always on a label
/// boundary (`notexample.com` does not match).
#[derive(Default)]
pub struct SuffixTrie {
    root: TrieNode,
    len: usize,
}

impl SuffixTrie {
    pub fn new() -> Self {
        Self {
            root: TrieNode::new(),
            len: 0,
        }
    }

    pub fn insert(&mut self, rule: &str) {
        let domain = rule
            .strip_prefix("*.")
            .unwrap_or(rule)
            .trim_start_matches('.');
        let mut node = &mut self.root;
        for label in domain.split('.').rev() {
            node = node.children.entry(CompactString::new(label)).or_default();
        }
        if node.rule.is_none() {
            self.len += 1;
        }
        node.rule = Some(CompactString::new(rule));
    }

    /// Most specific rule covering `domain`, if any.
    #[inline]
    pub fn lookup(&self, domain: &str) -> Option<&str> {
        let labels: SmallVec<[&str; 8]> = domain.split('.').rev().collect();
        let mut node = &self.root;
        let mut matched: Option<&str> = None;

        for label in labels.iter() {
            match node.children.get(*label) {
                Some(child) => {
                    if let Some(rule) = &child.rule {
                        matched = Some(rule);
                    }
                    node = child;
                }
                None => break,
            }
        }

        matched
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

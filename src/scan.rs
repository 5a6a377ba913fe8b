use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::locale::tree::join_path;
use crate::locale::LocaleNode;

/// Dotted path -> source text for every leaf the target language lacks
pub type MissingKeys = BTreeMap<String, String>;

/// Collect every source leaf that is absent or blank in `target`.
///
/// Only leaves are reported, never groups. Blank source leaves are skipped
/// because there is nothing to translate.
pub fn find_missing(source: &LocaleNode, target: Option<&LocaleNode>) -> MissingKeys {
    let mut missing = MissingKeys::new();
    if let LocaleNode::Branch(children) = source {
        for (key, child) in children {
            scan_node(key.clone(), child, child_of(target, key), &mut missing);
        }
    }
    missing
}

fn scan_node(path: String, source: &LocaleNode, target: Option<&LocaleNode>, missing: &mut MissingKeys) {
    match source {
        LocaleNode::Leaf(text) => {
            if text.trim().is_empty() {
                return;
            }
            let present = matches!(target, Some(LocaleNode::Leaf(t)) if !t.trim().is_empty());
            if !present {
                missing.insert(path, text.clone());
            }
        }
        LocaleNode::Branch(children) => {
            for (key, child) in children {
                scan_node(join_path(&path, key), child, child_of(target, key), missing);
            }
        }
    }
}

fn child_of<'a>(node: Option<&'a LocaleNode>, key: &str) -> Option<&'a LocaleNode> {
    match node {
        Some(LocaleNode::Branch(children)) => children.get(key),
        _ => None,
    }
}

/// Fingerprint of "what a completeness check would look at".
///
/// Covers the active language, the languages the check targets and the size
/// of the source tree, so a narrow check never stands in for a wider one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CheckSignature {
    pub language: String,
    pub targets: BTreeSet<String>,
    pub source_keys: usize,
}

impl CheckSignature {
    pub fn new(language: &str, targets: &[String], source: &LocaleNode) -> Self {
        Self {
            language: language.to_string(),
            targets: targets.iter().cloned().collect(),
            source_keys: source.leaf_count(),
        }
    }
}

impl fmt::Display for CheckSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let targets: Vec<&str> = self.targets.iter().map(String::as_str).collect();
        write!(f, "{}:{}[{}]", self.language, self.source_keys, targets.join(","))
    }
}

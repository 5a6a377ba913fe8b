use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

use crate::error::{AutoTranslateError, Result};

/// One node of a locale tree: either a translated string or a nested group of keys
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LocaleNode {
    Leaf(String),
    Branch(BTreeMap<String, LocaleNode>),
}

impl Default for LocaleNode {
    fn default() -> Self {
        Self::empty()
    }
}

impl LocaleNode {
    /// An empty root, as used for a language with no strings yet
    pub fn empty() -> Self {
        Self::Branch(BTreeMap::new())
    }

    /// Look up a dotted path such as `cart.empty_message`
    pub fn get(&self, path: &str) -> Option<&LocaleNode> {
        let mut node = self;
        for segment in split_path(path).ok()? {
            match node {
                Self::Branch(children) => node = children.get(segment)?,
                Self::Leaf(_) => return None,
            }
        }
        Some(node)
    }

    /// Leaf text at a dotted path, if the path ends at a leaf
    pub fn text(&self, path: &str) -> Option<&str> {
        match self.get(path)? {
            Self::Leaf(text) => Some(text.as_str()),
            Self::Branch(_) => None,
        }
    }

    pub fn leaf_count(&self) -> usize {
        match self {
            Self::Leaf(_) => 1,
            Self::Branch(children) => children.values().map(LocaleNode::leaf_count).sum(),
        }
    }

    /// Flatten every leaf into dotted path -> text
    pub fn leaves(&self) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        self.collect_leaves(String::new(), &mut out);
        out
    }

    fn collect_leaves(&self, prefix: String, out: &mut BTreeMap<String, String>) {
        match self {
            Self::Leaf(text) => {
                if !prefix.is_empty() {
                    out.insert(prefix, text.clone());
                }
            }
            Self::Branch(children) => {
                for (key, child) in children {
                    child.collect_leaves(join_path(&prefix, key), out);
                }
            }
        }
    }

    /// Write `text` at a dotted path, creating intermediate branches.
    ///
    /// Siblings along the path are left alone. A leaf found where a branch is
    /// needed is replaced by a branch, since the source tree says the key is a group.
    pub fn set(&mut self, path: &str, text: String) -> Result<()> {
        let segments = split_path(path)?;
        self.set_segments(&segments, text, path);
        Ok(())
    }

    fn set_segments(&mut self, segments: &[&str], text: String, path: &str) {
        if let Self::Leaf(old) = self {
            warn!("Replacing leaf '{}' with a group while writing '{}'", old, path);
            *self = Self::empty();
        }
        if let Self::Branch(children) = self {
            match segments {
                [last] => {
                    children.insert(last.to_string(), Self::Leaf(text));
                }
                [head, rest @ ..] => children
                    .entry(head.to_string())
                    .or_insert_with(Self::empty)
                    .set_segments(rest, text, path),
                [] => {}
            }
        }
    }

    /// First key that cannot be addressed by a dotted path: empty or containing a dot
    pub fn unaddressable_key(&self) -> Option<String> {
        let Self::Branch(children) = self else {
            return None;
        };
        children.iter().find_map(|(key, child)| {
            if key.is_empty() || key.contains('.') {
                return Some(key.clone());
            }
            child.unaddressable_key().map(|inner| join_path(key, &inner))
        })
    }
}

pub(crate) fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

fn split_path(path: &str) -> Result<Vec<&str>> {
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(AutoTranslateError::InvalidPath(path.to_string()));
    }
    Ok(segments)
}

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{AutoTranslateError, Result};
use super::tree::LocaleNode;

const EVENT_BUFFER: usize = 64;

/// Change notification published after a language tree was patched
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LocaleEvent {
    Patched { language: String, keys: usize },
}

/// Owns one locale tree per language.
///
/// Readers get cloned snapshots; the only writer is the merge applier, which
/// swaps in a whole patched tree and then notifies subscribers.
pub struct LocaleStore {
    source_language: String,
    trees: RwLock<HashMap<String, LocaleNode>>,
    events: broadcast::Sender<LocaleEvent>,
}

impl LocaleStore {
    pub fn new(source_language: impl Into<String>) -> Self {
        let (events, _rx) = broadcast::channel(EVENT_BUFFER);
        Self {
            source_language: source_language.into(),
            trees: RwLock::new(HashMap::new()),
            events,
        }
    }

    /// Load every `<lang>.json` file in `dir`
    pub async fn load_dir<P: AsRef<Path>>(dir: P, source_language: &str) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(AutoTranslateError::FileNotFound(dir.display().to_string()));
        }

        let store = Self::new(source_language);
        for entry in WalkDir::new(dir).max_depth(1).into_iter().filter_map(|e| e.ok()) {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(language) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let content = tokio::fs::read_to_string(path).await?;
            let tree: LocaleNode = serde_json::from_str(&content)?;
            // Such a key would be written back nested and look missing forever
            if let Some(key) = tree.unaddressable_key() {
                return Err(AutoTranslateError::InvalidPath(format!(
                    "key '{}' in {} is empty or contains a dot",
                    key,
                    path.display()
                )));
            }
            debug!("Loaded {} strings for '{}' from {}", tree.leaf_count(), language, path.display());
            store.insert_tree(language, tree).await;
        }

        if !store.has_language(source_language).await {
            return Err(AutoTranslateError::FileNotFound(
                dir.join(format!("{}.json", source_language)).display().to_string(),
            ));
        }

        info!("Loaded locales for {} language(s) from {}", store.languages().await.len(), dir.display());
        Ok(store)
    }

    /// Write one language tree back to `<dir>/<lang>.json`
    pub async fn save_language<P: AsRef<Path>>(&self, dir: P, language: &str) -> Result<()> {
        let tree = self
            .snapshot(language)
            .await
            .ok_or_else(|| AutoTranslateError::UnknownLanguage(language.to_string()))?;

        let path = dir.as_ref().join(format!("{}.json", language));
        let content = serde_json::to_string_pretty(&tree)?;
        tokio::fs::write(&path, content + "\n").await?;

        debug!("Saved '{}' locale to {}", language, path.display());
        Ok(())
    }

    pub fn source_language(&self) -> &str {
        &self.source_language
    }

    pub async fn insert_tree(&self, language: &str, tree: LocaleNode) {
        self.trees.write().await.insert(language.to_string(), tree);
    }

    pub async fn has_language(&self, language: &str) -> bool {
        self.trees.read().await.contains_key(language)
    }

    pub async fn languages(&self) -> Vec<String> {
        let mut languages: Vec<String> = self.trees.read().await.keys().cloned().collect();
        languages.sort();
        languages
    }

    /// A consistent copy of one language tree
    pub async fn snapshot(&self, language: &str) -> Option<LocaleNode> {
        self.trees.read().await.get(language).cloned()
    }

    /// Number of leaves in the source tree
    pub async fn source_key_count(&self) -> usize {
        self.trees
            .read()
            .await
            .get(&self.source_language)
            .map(LocaleNode::leaf_count)
            .unwrap_or(0)
    }

    /// Text for `path` in the best available language.
    ///
    /// Falls back to the source tree when the target value is absent or blank.
    pub async fn text(&self, language: &str, path: &str) -> Option<String> {
        let trees = self.trees.read().await;
        let translated = trees
            .get(language)
            .and_then(|tree| tree.text(path))
            .filter(|text| !text.trim().is_empty());

        translated
            .or_else(|| trees.get(&self.source_language).and_then(|tree| tree.text(path)))
            .map(str::to_string)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LocaleEvent> {
        self.events.subscribe()
    }

    /// Apply dotted-path writes to a language as one unit.
    ///
    /// The patch is built on a copy and swapped in only when every path is valid.
    pub(crate) async fn patch(&self, language: &str, entries: &BTreeMap<String, String>) -> Result<usize> {
        if entries.is_empty() {
            return Ok(0);
        }

        {
            let mut trees = self.trees.write().await;
            let mut patched = trees.get(language).cloned().unwrap_or_default();
            for (path, text) in entries {
                patched.set(path, text.clone())?;
            }
            trees.insert(language.to_string(), patched);
        }

        let event = LocaleEvent::Patched {
            language: language.to_string(),
            keys: entries.len(),
        };
        if self.events.send(event).is_err() {
            debug!("No subscribers for locale change on '{}'", language);
        }
        Ok(entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use serde_json::json;

    fn tree(value: serde_json::Value) -> LocaleNode {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_load_and_save_dir() {
        let dir = assert_fs::TempDir::new().unwrap();
        dir.child("en.json")
            .write_str(r#"{"cart": {"empty_message": "Your cart is empty"}}"#)
            .unwrap();
        dir.child("es.json").write_str("{}").unwrap();
        dir.child("notes.txt").write_str("ignored").unwrap();

        let store = LocaleStore::load_dir(dir.path(), "en").await.unwrap();
        assert_eq!(store.languages().await, vec!["en", "es"]);
        assert_eq!(store.source_key_count().await, 1);

        let mut entries = BTreeMap::new();
        entries.insert("cart.empty_message".to_string(), "Tu carrito está vacío".to_string());
        store.patch("es", &entries).await.unwrap();
        store.save_language(dir.path(), "es").await.unwrap();

        let saved: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.child("es.json").path()).unwrap()).unwrap();
        assert_eq!(saved, json!({"cart": {"empty_message": "Tu carrito está vacío"}}));
    }

    #[tokio::test]
    async fn test_load_requires_source_file() {
        let dir = assert_fs::TempDir::new().unwrap();
        dir.child("es.json").write_str("{}").unwrap();

        let result = LocaleStore::load_dir(dir.path(), "en").await;
        assert!(matches!(result, Err(AutoTranslateError::FileNotFound(_))));
    }

    #[tokio::test]
    async fn test_load_rejects_flat_dotted_keys() {
        let dir = assert_fs::TempDir::new().unwrap();
        dir.child("en.json").write_str(r#"{"cart": {"empty": "Empty"}}"#).unwrap();
        dir.child("es.json").write_str(r#"{"cart.empty": "Vacío"}"#).unwrap();

        let result = LocaleStore::load_dir(dir.path(), "en").await;
        assert!(matches!(result, Err(AutoTranslateError::InvalidPath(msg)) if msg.contains("cart.empty")));
    }

    #[tokio::test]
    async fn test_text_falls_back_to_source() {
        let store = LocaleStore::new("en");
        store.insert_tree("en", tree(json!({"a": "Hello", "b": "Bye"}))).await;
        store.insert_tree("es", tree(json!({"a": "Hola", "b": "  "}))).await;

        assert_eq!(store.text("es", "a").await.as_deref(), Some("Hola"));
        assert_eq!(store.text("es", "b").await.as_deref(), Some("Bye"));
        assert_eq!(store.text("fr", "a").await.as_deref(), Some("Hello"));
        assert_eq!(store.text("es", "missing").await, None);
    }

    #[tokio::test]
    async fn test_invalid_patch_leaves_tree_untouched() {
        let store = LocaleStore::new("en");
        store.insert_tree("pt", tree(json!({"a": "Olá"}))).await;
        let mut rx = store.subscribe();

        let mut entries = BTreeMap::new();
        entries.insert("b".to_string(), "novo".to_string());
        entries.insert("c..d".to_string(), "quebrado".to_string());

        assert!(store.patch("pt", &entries).await.is_err());
        assert_eq!(store.snapshot("pt").await, Some(tree(json!({"a": "Olá"}))));
        assert!(rx.try_recv().is_err());
    }
}

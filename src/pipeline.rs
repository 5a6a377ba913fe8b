use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::locale::LocaleStore;
use crate::merge::MergeApplier;
use crate::scan::find_missing;
use crate::translate::{BatchTranslator, CompletionClient};

/// Where a language currently is within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunPhase {
    Idle,
    Scanning,
    Translating,
    Merging,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LanguageOutcome {
    /// Nothing was missing
    Complete,
    /// Missing keys were translated and merged
    Patched { keys: usize, fallbacks: usize },
    /// The batch failed; the tree was not touched
    Failed { error: String },
    Skipped { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub outcomes: BTreeMap<String, LanguageOutcome>,
    pub calls_made: usize,
}

impl RunReport {
    pub fn all_succeeded(&self) -> bool {
        !self.outcomes.values().any(|o| matches!(o, LanguageOutcome::Failed { .. }))
    }

    pub fn translated_keys(&self) -> usize {
        self.outcomes
            .values()
            .map(|o| match o {
                LanguageOutcome::Patched { keys, .. } => *keys,
                _ => 0,
            })
            .sum()
    }

    pub fn failed_languages(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, LanguageOutcome::Failed { .. }))
            .map(|(lang, _)| lang.as_str())
            .collect()
    }
}

/// Scan -> translate -> merge for a set of languages.
///
/// Each language runs as its own task; inside a language the steps are
/// strictly sequential and a failed translation never reaches the merge.
#[derive(Clone)]
pub struct LocalePipeline {
    store: Arc<LocaleStore>,
    translator: BatchTranslator,
    applier: MergeApplier,
    phases: Arc<Mutex<HashMap<String, RunPhase>>>,
}

/// Puts a language back to Idle however its run ends
struct PhaseGuard<'a> {
    pipeline: &'a LocalePipeline,
    language: &'a str,
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        self.pipeline.set_phase(self.language, RunPhase::Idle);
    }
}

impl LocalePipeline {
    pub fn new(store: Arc<LocaleStore>, client: Arc<dyn CompletionClient>) -> Self {
        let translator = BatchTranslator::new(client, store.source_language());
        Self {
            applier: MergeApplier::new(store.clone()),
            store,
            translator,
            phases: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn store(&self) -> &Arc<LocaleStore> {
        &self.store
    }

    pub fn translator(&self) -> &BatchTranslator {
        &self.translator
    }

    pub fn phase(&self, language: &str) -> RunPhase {
        self.phases
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(language)
            .copied()
            .unwrap_or(RunPhase::Idle)
    }

    fn set_phase(&self, language: &str, phase: RunPhase) {
        debug!("'{}' -> {:?}", language, phase);
        self.phases
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(language.to_string(), phase);
    }

    /// Run every language concurrently and collect one outcome per language
    pub async fn run(&self, languages: &[String]) -> RunReport {
        let mut report = RunReport {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            outcomes: BTreeMap::new(),
            calls_made: 0,
        };

        info!("┌─ Translation run {} ────────", report.run_id);

        let mut tasks = JoinSet::new();
        for language in languages.iter().collect::<BTreeSet<_>>() {
            if language == self.store.source_language() {
                report.outcomes.insert(
                    language.clone(),
                    LanguageOutcome::Skipped { reason: "source language".to_string() },
                );
                continue;
            }
            let pipeline = self.clone();
            let language = language.clone();
            tasks.spawn(async move {
                let (outcome, calls) = pipeline.run_language(&language).await;
                (language, outcome, calls)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((language, outcome, calls)) => {
                    report.calls_made += calls;
                    report.outcomes.insert(language, outcome);
                }
                Err(e) => error!("Language task aborted: {}", e),
            }
        }

        for (language, outcome) in &report.outcomes {
            match outcome {
                LanguageOutcome::Failed { error } => warn!("│ {}: failed ({})", language, error),
                other => info!("│ {}: {:?}", language, other),
            }
        }
        info!(
            "└─ {} key(s) translated with {} call(s)",
            report.translated_keys(),
            report.calls_made
        );

        report
    }

    async fn run_language(&self, language: &str) -> (LanguageOutcome, usize) {
        let _idle_on_exit = PhaseGuard { pipeline: self, language };

        self.set_phase(language, RunPhase::Scanning);
        let Some(source) = self.store.snapshot(self.store.source_language()).await else {
            return (
                LanguageOutcome::Failed { error: "source locale is not loaded".to_string() },
                0,
            );
        };
        let target = self.store.snapshot(language).await;
        let missing = find_missing(&source, target.as_ref());
        if missing.is_empty() {
            return (LanguageOutcome::Complete, 0);
        }
        debug!("'{}' is missing {} key(s)", language, missing.len());

        self.set_phase(language, RunPhase::Translating);
        let batch = match self.translator.translate_batch(language, &missing).await {
            Ok(batch) => batch,
            Err(e) => {
                error!("Translation batch for '{}' failed: {}", language, e);
                return (LanguageOutcome::Failed { error: e.to_string() }, 1);
            }
        };

        self.set_phase(language, RunPhase::Merging);
        match self.applier.apply(language, &batch.translations).await {
            Ok(keys) => (
                LanguageOutcome::Patched { keys, fallbacks: batch.fallbacks.len() },
                batch.calls_made,
            ),
            Err(e) => {
                error!("Merging translations into '{}' failed: {}", language, e);
                (LanguageOutcome::Failed { error: e.to_string() }, batch.calls_made)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locale::LocaleNode;
    use crate::translate::fake::FakeCompletionClient;
    use crate::translate::MockCompletionClient;
    use serde_json::json;

    fn tree(value: serde_json::Value) -> LocaleNode {
        serde_json::from_value(value).unwrap()
    }

    fn langs(codes: &[&str]) -> Vec<String> {
        codes.iter().map(|s| s.to_string()).collect()
    }

    async fn store_with(en: serde_json::Value, others: &[(&str, serde_json::Value)]) -> Arc<LocaleStore> {
        let store = Arc::new(LocaleStore::new("en"));
        store.insert_tree("en", tree(en)).await;
        for (lang, value) in others {
            store.insert_tree(lang, tree(value.clone())).await;
        }
        store
    }

    #[tokio::test]
    async fn test_empty_spanish_tree_gets_filled_with_one_call() {
        let store = store_with(json!({"cart": {"empty_message": "Your cart is empty"}}), &[("es", json!({}))]).await;

        let mut client = MockCompletionClient::new();
        client
            .expect_complete()
            .withf(|req| req.target_language == "es" && req.user.contains("cart.empty_message"))
            .times(1)
            .returning(|_| Ok(r#"{"cart.empty_message": "Tu carrito está vacío"}"#.to_string()));

        let pipeline = LocalePipeline::new(store.clone(), Arc::new(client));
        let report = pipeline.run(&langs(&["es"])).await;

        assert_eq!(report.calls_made, 1);
        assert_eq!(report.outcomes["es"], LanguageOutcome::Patched { keys: 1, fallbacks: 0 });
        assert_eq!(
            store.snapshot("es").await.unwrap(),
            tree(json!({"cart": {"empty_message": "Tu carrito está vacío"}}))
        );
    }

    #[tokio::test]
    async fn test_many_missing_keys_single_call() {
        let en = json!({
            "a": "A", "b": "B",
            "nav": {"home": "Home", "shop": "Shop", "deep": {"x": "X"}}
        });
        let store = store_with(en, &[("fr", json!({"a": "A-fr"}))]).await;
        let client = Arc::new(FakeCompletionClient::echo());

        let pipeline = LocalePipeline::new(store.clone(), client.clone());
        let report = pipeline.run(&langs(&["fr"])).await;

        assert_eq!(client.calls_for("fr"), 1);
        assert_eq!(report.translated_keys(), 4);
        assert_eq!(store.text("fr", "a").await.as_deref(), Some("A-fr"));
        assert_eq!(store.text("fr", "nav.deep.x").await.as_deref(), Some("[fr] X"));
    }

    #[tokio::test]
    async fn test_failed_language_is_isolated() {
        let store = store_with(json!({"a": "A"}), &[("es", json!({})), ("fr", json!({"keep": "moi"}))]).await;
        let client = Arc::new(FakeCompletionClient::echo().reply_for("fr", "not json at all"));

        let pipeline = LocalePipeline::new(store.clone(), client.clone());
        let report = pipeline.run(&langs(&["es", "fr"])).await;

        assert!(!report.all_succeeded());
        assert_eq!(report.failed_languages(), vec!["fr"]);
        assert_eq!(store.text("es", "a").await.as_deref(), Some("[es] A"));
        assert_eq!(store.snapshot("fr").await.unwrap(), tree(json!({"keep": "moi"})));
        assert_eq!(pipeline.phase("fr"), RunPhase::Idle);
        assert_eq!(pipeline.phase("es"), RunPhase::Idle);
    }

    #[tokio::test]
    async fn test_complete_language_makes_no_call() {
        let store = store_with(json!({"a": "A"}), &[("pt", json!({"a": "A-pt"}))]).await;
        let mut client = MockCompletionClient::new();
        client.expect_complete().never();

        let pipeline = LocalePipeline::new(store, Arc::new(client));
        let report = pipeline.run(&langs(&["pt", "en"])).await;

        assert_eq!(report.outcomes["pt"], LanguageOutcome::Complete);
        assert!(matches!(report.outcomes["en"], LanguageOutcome::Skipped { .. }));
        assert_eq!(report.calls_made, 0);
    }

    #[tokio::test]
    async fn test_existing_translation_not_reclobbered() {
        let store = store_with(json!({"a": "Changed source", "b": "B"}), &[("es", json!({"a": "Viejo"}))]).await;
        let client = Arc::new(FakeCompletionClient::echo());

        LocalePipeline::new(store.clone(), client).run(&langs(&["es"])).await;

        assert_eq!(store.text("es", "a").await.as_deref(), Some("Viejo"));
        assert_eq!(store.text("es", "b").await.as_deref(), Some("[es] B"));
    }
}

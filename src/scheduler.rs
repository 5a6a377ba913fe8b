use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::pipeline::{LocalePipeline, RunReport};
use crate::scan::CheckSignature;

/// What woke the scheduler up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerEvent {
    /// Application start: check every target language
    Mount,
    /// The UI switched to this language
    LanguageChanged(String),
}

/// Debounced, de-duplicated trigger for the locale pipeline.
///
/// All trigger state lives in the handle, so independent schedulers never
/// share in-flight flags or signatures.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    pipeline: LocalePipeline,
    debounce: Duration,
    supported_languages: Vec<String>,
    state: Mutex<SchedulerState>,
}

struct SchedulerState {
    active_language: String,
    generation: u64,
    pending: BTreeSet<String>,
    in_flight: HashSet<CheckSignature>,
    last_completed: Option<CheckSignature>,
}

/// Clears an in-flight signature when the run finishes, fails or panics
struct InFlightGuard {
    inner: Arc<SchedulerInner>,
    signature: CheckSignature,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.inner.lock_state().in_flight.remove(&self.signature);
    }
}

impl SchedulerInner {
    fn lock_state(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn source_language(&self) -> &str {
        self.pipeline.store().source_language()
    }

    /// Record the event and return the languages it asks for
    fn accept(&self, state: &mut SchedulerState, event: &TriggerEvent) -> Vec<String> {
        match event {
            TriggerEvent::Mount => self
                .supported_languages
                .iter()
                .filter(|lang| lang.as_str() != self.source_language())
                .cloned()
                .collect(),
            TriggerEvent::LanguageChanged(language) => {
                state.active_language = language.clone();
                if language == self.source_language() {
                    debug!("'{}' is the source language, nothing to translate", language);
                    Vec::new()
                } else if !self.supported_languages.contains(language) {
                    debug!("'{}' is not a supported translation target", language);
                    Vec::new()
                } else {
                    vec![language.clone()]
                }
            }
        }
    }
}

impl Scheduler {
    pub fn new(
        pipeline: LocalePipeline,
        supported_languages: Vec<String>,
        active_language: &str,
        debounce: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                pipeline,
                debounce,
                supported_languages,
                state: Mutex::new(SchedulerState {
                    active_language: active_language.to_string(),
                    generation: 0,
                    pending: BTreeSet::new(),
                    in_flight: HashSet::new(),
                    last_completed: None,
                }),
            }),
        }
    }

    pub fn pipeline(&self) -> &LocalePipeline {
        &self.inner.pipeline
    }

    pub fn active_language(&self) -> String {
        self.inner.lock_state().active_language.clone()
    }

    pub fn last_completed(&self) -> Option<CheckSignature> {
        self.inner.lock_state().last_completed.clone()
    }

    /// Schedule a run after the debounce delay.
    ///
    /// Events arriving within the delay are folded into the newest one; older
    /// handles resolve to `None`. Dropping the handle does not cancel the run.
    pub fn notify(&self, event: TriggerEvent) -> JoinHandle<Option<RunReport>> {
        let generation = {
            let mut state = self.inner.lock_state();
            let languages = self.inner.accept(&mut state, &event);
            state.pending.extend(languages);
            state.generation += 1;
            state.generation
        };
        debug!("Trigger {:?} queued (generation {})", event, generation);

        let scheduler = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(scheduler.inner.debounce).await;

            let languages: Vec<String> = {
                let mut state = scheduler.inner.lock_state();
                if state.generation != generation {
                    debug!("Trigger generation {} superseded", generation);
                    return None;
                }
                std::mem::take(&mut state.pending).into_iter().collect()
            };
            scheduler.run_languages(languages).await
        })
    }

    /// Evaluate the guards and run right away, without debouncing
    pub async fn run_now(&self, event: TriggerEvent) -> Option<RunReport> {
        let languages = {
            let mut state = self.inner.lock_state();
            self.inner.accept(&mut state, &event)
        };
        self.run_languages(languages).await
    }

    async fn run_languages(&self, languages: Vec<String>) -> Option<RunReport> {
        if languages.is_empty() {
            return None;
        }

        let store = self.inner.pipeline.store();
        let Some(source) = store.snapshot(store.source_language()).await else {
            info!("Source locale '{}' is not loaded, skipping run", store.source_language());
            return None;
        };

        let guard = {
            let mut state = self.inner.lock_state();
            let signature = CheckSignature::new(&state.active_language, &languages, &source);

            if state.in_flight.contains(&signature) {
                debug!("Run for {} already in flight, skipping", signature);
                return None;
            }
            if state.last_completed.as_ref() == Some(&signature) {
                debug!("Nothing changed since last check ({}), skipping", signature);
                return None;
            }
            state.in_flight.insert(signature.clone());
            InFlightGuard {
                inner: self.inner.clone(),
                signature,
            }
        };

        let report = self.inner.pipeline.run(&languages).await;

        if report.all_succeeded() {
            self.inner.lock_state().last_completed = Some(guard.signature.clone());
        } else {
            info!(
                "Run {} had failures ({}); will retry on the next trigger",
                report.run_id,
                report.failed_languages().join(", ")
            );
        }
        Some(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locale::{LocaleNode, LocaleStore};
    use crate::translate::fake::FakeCompletionClient;
    use serde_json::json;

    const DEBOUNCE: Duration = Duration::from_millis(2000);

    async fn scheduler_with(client: Arc<FakeCompletionClient>, active: &str) -> Scheduler {
        let store = Arc::new(LocaleStore::new("en"));
        let en: LocaleNode = serde_json::from_value(json!({
            "cart": {"empty_message": "Your cart is empty"},
            "changelog": {"banner_title": "What's new"}
        }))
        .unwrap();
        store.insert_tree("en", en).await;

        let pipeline = LocalePipeline::new(store, client);
        let supported = ["en", "es", "fr", "pt"].iter().map(|s| s.to_string()).collect();
        Scheduler::new(pipeline, supported, active, DEBOUNCE)
    }

    #[tokio::test]
    async fn test_second_run_without_changes_is_skipped() {
        let client = Arc::new(FakeCompletionClient::echo());
        let scheduler = scheduler_with(client.clone(), "en").await;

        let first = scheduler.run_now(TriggerEvent::Mount).await.unwrap();
        assert!(first.all_succeeded());
        assert_eq!(client.call_count(), 3);

        assert!(scheduler.run_now(TriggerEvent::Mount).await.is_none());
        assert_eq!(client.call_count(), 3);
        assert_eq!(scheduler.last_completed().unwrap().to_string(), "en:2[es,fr,pt]");
    }

    #[tokio::test]
    async fn test_failed_language_is_retried_next_trigger() {
        let client = Arc::new(FakeCompletionClient::echo().reply_for("pt", "{ broken"));
        let scheduler = scheduler_with(client.clone(), "en").await;

        let first = scheduler.run_now(TriggerEvent::Mount).await.unwrap();
        assert_eq!(first.failed_languages(), vec!["pt"]);
        assert!(scheduler.last_completed().is_none());
        assert!(!scheduler.pipeline().store().has_language("pt").await);

        client.clear_reply("pt");
        let second = scheduler.run_now(TriggerEvent::Mount).await.unwrap();
        assert!(second.all_succeeded());
        assert_eq!(client.calls_for("pt"), 2);
        // es and fr were already complete
        assert_eq!(client.calls_for("es"), 1);
        assert_eq!(second.calls_made, 1);
    }

    #[tokio::test]
    async fn test_language_change_runs_only_that_language() {
        let client = Arc::new(FakeCompletionClient::echo());
        let scheduler = scheduler_with(client.clone(), "en").await;

        let report = scheduler
            .run_now(TriggerEvent::LanguageChanged("fr".to_string()))
            .await
            .unwrap();

        assert_eq!(report.outcomes.keys().collect::<Vec<_>>(), vec!["fr"]);
        assert_eq!(client.call_count(), 1);
        assert_eq!(scheduler.active_language(), "fr");
    }

    #[tokio::test]
    async fn test_mount_after_language_change_covers_every_target() {
        let client = Arc::new(FakeCompletionClient::echo());
        let scheduler = scheduler_with(client.clone(), "es").await;

        let first = scheduler
            .run_now(TriggerEvent::LanguageChanged("es".to_string()))
            .await
            .unwrap();
        assert_eq!(first.outcomes.keys().collect::<Vec<_>>(), vec!["es"]);

        let mount = scheduler.run_now(TriggerEvent::Mount).await.unwrap();
        assert!(mount.all_succeeded());

        let store = scheduler.pipeline().store();
        assert!(store.has_language("fr").await);
        assert!(store.has_language("pt").await);
        assert_eq!(client.calls_for("es"), 1);
    }

    #[tokio::test]
    async fn test_failure_survives_narrow_success() {
        let client = Arc::new(FakeCompletionClient::echo().reply_for("pt", "{ broken"));
        let scheduler = scheduler_with(client.clone(), "en").await;

        let mount = scheduler.run_now(TriggerEvent::Mount).await.unwrap();
        assert_eq!(mount.failed_languages(), vec!["pt"]);
        client.clear_reply("pt");

        let narrow = scheduler
            .run_now(TriggerEvent::LanguageChanged("es".to_string()))
            .await
            .unwrap();
        assert!(narrow.all_succeeded());

        let retry = scheduler.run_now(TriggerEvent::Mount).await.unwrap();
        assert!(retry.all_succeeded());
        assert_eq!(client.calls_for("pt"), 2);
        assert!(scheduler.pipeline().store().has_language("pt").await);
    }

    #[tokio::test]
    async fn test_source_growth_triggers_new_run() {
        let client = Arc::new(FakeCompletionClient::echo());
        let scheduler = scheduler_with(client.clone(), "en").await;
        let es = || TriggerEvent::LanguageChanged("es".to_string());

        assert!(scheduler.run_now(es()).await.is_some());
        assert!(scheduler.run_now(es()).await.is_none());
        assert_eq!(client.calls_for("es"), 1);

        let grown: LocaleNode = serde_json::from_value(json!({
            "cart": {"empty_message": "Your cart is empty"},
            "changelog": {"banner_title": "What's new"},
            "promo": {"title": "Sale"}
        }))
        .unwrap();
        let store = scheduler.pipeline().store().clone();
        store.insert_tree("en", grown).await;

        let report = scheduler.run_now(es()).await.unwrap();
        assert_eq!(client.calls_for("es"), 2);
        assert_eq!(report.translated_keys(), 1);
        assert_eq!(store.text("es", "promo.title").await.as_deref(), Some("[es] Sale"));
        assert_eq!(scheduler.last_completed().unwrap().to_string(), "es:3[es]");
    }

    #[tokio::test]
    async fn test_allow_list_skips_source_and_unknown() {
        let client = Arc::new(FakeCompletionClient::echo());
        let scheduler = scheduler_with(client.clone(), "es").await;

        assert!(scheduler.run_now(TriggerEvent::LanguageChanged("en".to_string())).await.is_none());
        assert!(scheduler.run_now(TriggerEvent::LanguageChanged("de".to_string())).await.is_none());
        assert_eq!(client.call_count(), 0);
        assert_eq!(scheduler.active_language(), "de");
    }

    #[tokio::test]
    async fn test_in_flight_run_blocks_duplicate() {
        let client = Arc::new(FakeCompletionClient::gated());
        let scheduler = scheduler_with(client.clone(), "es").await;

        let first = tokio::spawn({
            let scheduler = scheduler.clone();
            async move { scheduler.run_now(TriggerEvent::LanguageChanged("es".to_string())).await }
        });
        while client.call_count() == 0 {
            tokio::task::yield_now().await;
        }

        let duplicate = scheduler.run_now(TriggerEvent::LanguageChanged("es".to_string())).await;
        assert!(duplicate.is_none());

        client.release(1);
        let report = first.await.unwrap().unwrap();
        assert!(report.all_succeeded());
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_changes_are_debounced() {
        let client = Arc::new(FakeCompletionClient::echo());
        let scheduler = scheduler_with(client.clone(), "en").await;

        let first = scheduler.notify(TriggerEvent::LanguageChanged("es".to_string()));
        tokio::time::sleep(Duration::from_millis(500)).await;
        let second = scheduler.notify(TriggerEvent::LanguageChanged("fr".to_string()));

        assert!(first.await.unwrap().is_none());
        let report = second.await.unwrap().unwrap();

        assert_eq!(report.outcomes.keys().collect::<Vec<_>>(), vec!["es", "fr"]);
        assert_eq!(client.call_count(), 2);
        assert_eq!(scheduler.active_language(), "fr");
    }

    #[tokio::test(start_paused = true)]
    async fn test_nothing_runs_before_debounce_elapses() {
        let client = Arc::new(FakeCompletionClient::echo());
        let scheduler = scheduler_with(client.clone(), "en").await;

        let handle = scheduler.notify(TriggerEvent::Mount);
        tokio::time::sleep(DEBOUNCE / 2).await;
        assert_eq!(client.call_count(), 0);

        assert!(handle.await.unwrap().is_some());
        assert_eq!(client.call_count(), 3);
    }
}

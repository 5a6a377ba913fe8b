use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::translate::BatchTranslator;
use super::entity::{localized_key, CatalogEntity};
use super::store::CatalogStore;

/// What happened to one entity's background translation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EnsureOutcome {
    Translated { id: String, language: String, fields: usize },
    AlreadyTranslated { id: String, language: String },
    Failed { id: String, language: String, error: String },
}

/// Immediate answer from `ensure_*`; the translations themselves run in the background
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnsureSummary {
    /// Tasks started by this call
    pub scheduled: usize,
    /// Entities that already had every field for the language
    pub already_translated: usize,
    /// Entities skipped because a request for them is still outstanding
    pub in_flight: usize,
    /// Entities left for a later pass because the ceiling was reached
    pub deferred: usize,
}

/// Fills in missing per-language name/description fields without blocking readers.
///
/// At most `batch_ceiling` entities are started per call. An entity that is
/// already being translated for a language is never requested twice.
pub struct ProductTranslationEnsurer {
    inner: Arc<EnsurerInner>,
    tasks: Mutex<JoinSet<EnsureOutcome>>,
}

struct EnsurerInner {
    translator: BatchTranslator,
    store: Arc<dyn CatalogStore>,
    fields: Vec<String>,
    batch_ceiling: usize,
    in_flight: Mutex<HashSet<(String, String)>>,
}

/// Holds an (id, language) slot in the in-flight set until dropped
struct InFlightEntry {
    inner: Arc<EnsurerInner>,
    key: (String, String),
}

impl InFlightEntry {
    fn claim(inner: &Arc<EnsurerInner>, id: &str, language: &str) -> Option<Self> {
        let key = (id.to_string(), language.to_string());
        if !inner.lock_in_flight().insert(key.clone()) {
            return None;
        }
        Some(Self {
            inner: inner.clone(),
            key,
        })
    }
}

impl Drop for InFlightEntry {
    fn drop(&mut self) {
        self.inner.lock_in_flight().remove(&self.key);
    }
}

impl EnsurerInner {
    fn lock_in_flight(&self) -> MutexGuard<'_, HashSet<(String, String)>> {
        self.in_flight.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn translate_entity(&self, id: &str, language: &str) -> EnsureOutcome {
        let failed = |error: String| EnsureOutcome::Failed {
            id: id.to_string(),
            language: language.to_string(),
            error,
        };

        // Re-read so a value written since the caller's snapshot is not clobbered
        let entity = match self.store.fetch(id).await {
            Ok(Some(entity)) => entity,
            Ok(None) => return failed("entity no longer exists".to_string()),
            Err(e) => {
                warn!("Failed to load catalog entity '{}': {}", id, e);
                return failed(e.to_string());
            }
        };

        let missing = entity.missing_fields(language, &self.fields);
        if missing.is_empty() {
            return EnsureOutcome::AlreadyTranslated {
                id: id.to_string(),
                language: language.to_string(),
            };
        }

        let batch = match self.translator.translate_batch(language, &missing).await {
            Ok(batch) => batch,
            Err(e) => {
                warn!("Translating catalog entity '{}' to '{}' failed: {}", id, language, e);
                return failed(e.to_string());
            }
        };

        let fields: BTreeMap<String, String> = batch
            .translated_only()
            .into_iter()
            .map(|(field, text)| (localized_key(&field, language), text))
            .collect();
        if fields.is_empty() {
            return failed("reply contained no usable translations".to_string());
        }

        match self.store.update_fields(id, &fields).await {
            Ok(()) => {
                info!("Stored {} translated field(s) for '{}' ({})", fields.len(), id, language);
                EnsureOutcome::Translated {
                    id: id.to_string(),
                    language: language.to_string(),
                    fields: fields.len(),
                }
            }
            Err(e) => {
                error!("Failed to store translations for '{}': {}", id, e);
                failed(e.to_string())
            }
        }
    }
}

impl ProductTranslationEnsurer {
    pub fn new(
        translator: BatchTranslator,
        store: Arc<dyn CatalogStore>,
        fields: Vec<String>,
        batch_ceiling: usize,
    ) -> Self {
        Self {
            inner: Arc::new(EnsurerInner {
                translator,
                store,
                fields,
                batch_ceiling,
                in_flight: Mutex::new(HashSet::new()),
            }),
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    pub fn ensure_one(&self, entity: &CatalogEntity, language: &str) -> EnsureSummary {
        self.ensure_many(std::slice::from_ref(entity), language)
    }

    /// Start background translation for entities lacking `language` fields.
    ///
    /// Returns at once; must be called from within a Tokio runtime.
    pub fn ensure_many(&self, entities: &[CatalogEntity], language: &str) -> EnsureSummary {
        let mut summary = EnsureSummary::default();
        if language == self.inner.translator.source_language() {
            debug!("'{}' is the source language, nothing to ensure", language);
            return summary;
        }

        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        reap_finished(&mut tasks);
        for entity in entities {
            if entity.missing_fields(language, &self.inner.fields).is_empty() {
                summary.already_translated += 1;
                continue;
            }
            if summary.scheduled >= self.inner.batch_ceiling {
                summary.deferred += 1;
                continue;
            }
            let Some(entry) = InFlightEntry::claim(&self.inner, &entity.id, language) else {
                debug!("Translation for '{}' ({}) already in flight", entity.id, language);
                summary.in_flight += 1;
                continue;
            };

            let inner = self.inner.clone();
            let id = entity.id.clone();
            let language = language.to_string();
            tasks.spawn(async move {
                let _entry = entry;
                inner.translate_entity(&id, &language).await
            });
            summary.scheduled += 1;
        }

        if summary.scheduled > 0 || summary.deferred > 0 {
            info!(
                "Ensuring '{}' translations: {} started, {} in flight, {} deferred",
                language, summary.scheduled, summary.in_flight, summary.deferred
            );
        }
        summary
    }

    pub fn is_in_flight(&self, id: &str, language: &str) -> bool {
        self.inner
            .lock_in_flight()
            .contains(&(id.to_string(), language.to_string()))
    }

    pub fn in_flight_count(&self) -> usize {
        self.inner.lock_in_flight().len()
    }

    /// Tasks started but not yet collected, finished or not
    pub fn tracked_tasks(&self) -> usize {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Wait for every task started so far and collect their outcomes
    pub async fn drain(&self) -> Vec<EnsureOutcome> {
        let mut tasks = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(|e| e.into_inner()));

        let mut outcomes = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => error!("Catalog translation task aborted: {}", e),
            }
        }
        outcomes
    }
}

/// Collect tasks that already finished so callers that never drain stay bounded
fn reap_finished(tasks: &mut JoinSet<EnsureOutcome>) {
    while let Some(joined) = tasks.try_join_next() {
        match joined {
            Ok(EnsureOutcome::Failed { id, language, error }) => {
                debug!("Earlier translation of '{}' ({}) failed: {}", id, language, error)
            }
            Ok(outcome) => debug!("Collected finished catalog task: {:?}", outcome),
            Err(e) => error!("Catalog translation task aborted: {}", e),
        }
    }
}

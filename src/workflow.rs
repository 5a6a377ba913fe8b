use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::catalog::{
    CatalogBatchSummary, CatalogBatchTranslator, CatalogStore, EnsureOutcome, EnsureSummary, JsonCatalogStore,
    ProductTranslationEnsurer,
};
use crate::config::Config;
use crate::error::{AutoTranslateError, Result};
use crate::locale::{LocaleEvent, LocaleStore};
use crate::pipeline::{LanguageOutcome, LocalePipeline, RunReport};
use crate::scan::find_missing;
use crate::scheduler::{Scheduler, TriggerEvent};
use crate::translate::{check_completion_availability, CompletionClient, HttpCompletionClient, TranslationBatch};

/// Wires configuration, locale files, the completion client and the catalog
/// together for the command line.
pub struct Workflow {
    config: Config,
    pipeline: LocalePipeline,
}

impl Workflow {
    pub async fn new(config: Config) -> Result<Self> {
        let client = Arc::new(HttpCompletionClient::new(config.completion.clone())?);
        Self::with_client(config, client).await
    }

    pub async fn with_client(config: Config, client: Arc<dyn CompletionClient>) -> Result<Self> {
        let store = LocaleStore::load_dir(&config.locales.directory, &config.locales.source_language).await?;
        let pipeline = LocalePipeline::new(Arc::new(store), client);
        Ok(Self { config, pipeline })
    }

    pub fn store(&self) -> &Arc<LocaleStore> {
        self.pipeline.store()
    }

    /// Resolve requested languages against the allow-list; empty means all targets
    fn resolve_languages(&self, requested: &[String]) -> Result<Vec<String>> {
        if requested.is_empty() {
            return Ok(self.config.target_languages());
        }
        for language in requested {
            if !self.config.locales.supported_languages.contains(language) {
                return Err(AutoTranslateError::UnknownLanguage(language.clone()));
            }
        }
        Ok(requested
            .iter()
            .filter(|lang| **lang != self.config.locales.source_language)
            .cloned()
            .collect())
    }

    /// Missing key count per target language
    pub async fn scan_report(&self, language: Option<&str>) -> Result<BTreeMap<String, usize>> {
        let requested: Vec<String> = language.map(|l| vec![l.to_string()]).unwrap_or_default();
        let languages = self.resolve_languages(&requested)?;

        let store = self.store();
        let source = store
            .snapshot(store.source_language())
            .await
            .ok_or_else(|| AutoTranslateError::UnknownLanguage(store.source_language().to_string()))?;

        let mut report = BTreeMap::new();
        for language in languages {
            let target = store.snapshot(&language).await;
            let missing = find_missing(&source, target.as_ref());
            debug!("'{}' is missing {} key(s)", language, missing.len());
            report.insert(language, missing.len());
        }
        Ok(report)
    }

    /// Run the pipeline once and write every patched language back to disk
    pub async fn sync(&self, languages: &[String]) -> Result<RunReport> {
        let languages = self.resolve_languages(languages)?;
        let report = self.pipeline.run(&languages).await;

        for (language, outcome) in &report.outcomes {
            if matches!(outcome, LanguageOutcome::Patched { .. }) {
                self.store().save_language(&self.config.locales.directory, language).await?;
            }
        }
        Ok(report)
    }

    /// Translate what is missing without touching the store or the files
    pub async fn preview(&self, languages: &[String]) -> Result<Vec<TranslationBatch>> {
        let languages = self.resolve_languages(languages)?;
        let store = self.store();
        let Some(source) = store.snapshot(store.source_language()).await else {
            return Ok(Vec::new());
        };

        let mut batches = Vec::new();
        for language in languages {
            let target = store.snapshot(&language).await;
            let missing = find_missing(&source, target.as_ref());
            if missing.is_empty() {
                continue;
            }
            batches.push(self.pipeline.translator().translate_or_fallback(&language, &missing).await);
        }
        Ok(batches)
    }

    /// Run the scheduler: a mount check first, then one language change per stdin line.
    ///
    /// Returns once stdin closes and every scheduled run has finished.
    pub async fn watch(&self) -> Result<()> {
        self.watch_lines(tokio::io::stdin()).await
    }

    /// Like `watch`, reading language codes from `input`
    pub async fn watch_lines<R: AsyncRead + Unpin>(&self, input: R) -> Result<()> {
        let scheduler = Scheduler::new(
            self.pipeline.clone(),
            self.config.locales.supported_languages.clone(),
            &self.config.locales.source_language,
            Duration::from_millis(self.config.scheduler.debounce_ms),
        );

        let saver = self.spawn_saver();

        let mut handles = vec![scheduler.notify(TriggerEvent::Mount)];
        let mut lines = BufReader::new(input).lines();
        info!("Watching for language changes on stdin");
        while let Some(line) = lines.next_line().await? {
            let language = line.trim();
            if language.is_empty() {
                continue;
            }
            handles.push(scheduler.notify(TriggerEvent::LanguageChanged(language.to_string())));
        }

        // Superseded handles resolve to None; earlier runs may still be in flight
        let mut patched = BTreeSet::new();
        for handle in handles {
            match handle.await {
                Ok(Some(report)) => {
                    info!("Run {} patched {} key(s)", report.run_id, report.translated_keys());
                    patched.extend(
                        report
                            .outcomes
                            .into_iter()
                            .filter(|(_, outcome)| matches!(outcome, LanguageOutcome::Patched { .. }))
                            .map(|(language, _)| language),
                    );
                }
                Ok(None) => {}
                Err(e) => warn!("Scheduled run aborted: {}", e),
            }
        }
        saver.abort();

        // The saver may not have seen the final events yet
        for language in &patched {
            self.store().save_language(&self.config.locales.directory, language).await?;
        }
        debug!("Watch finished, {} language(s) saved", patched.len());
        Ok(())
    }

    /// Persist each language as soon as the store reports a patch
    fn spawn_saver(&self) -> tokio::task::JoinHandle<()> {
        let store = self.store().clone();
        let dir = self.config.locales.directory.clone();
        let mut events = store.subscribe();

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(LocaleEvent::Patched { language, keys }) => {
                        debug!("Saving '{}' after {} patched key(s)", language, keys);
                        if let Err(e) = store.save_language(&dir, &language).await {
                            warn!("Failed to save '{}': {}", language, e);
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => warn!("Missed {} locale event(s)", skipped),
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    async fn open_catalog(&self) -> Result<Arc<dyn CatalogStore>> {
        Ok(Arc::new(JsonCatalogStore::open(&self.config.catalog.path).await?))
    }

    pub async fn translate_catalog(&self, language: &str, limit: usize) -> Result<CatalogBatchSummary> {
        self.resolve_languages(&[language.to_string()])?;
        let batcher = CatalogBatchTranslator::new(
            self.pipeline.translator().clone(),
            self.open_catalog().await?,
            self.config.catalog.fields.clone(),
            self.config.catalog.admin_batch_size,
        );
        batcher.translate_catalog(language, limit).await
    }

    /// Ensure catalog translations for `ids` (all entities when empty) and wait for them
    pub async fn ensure_products(&self, language: &str, ids: &[String]) -> Result<(EnsureSummary, Vec<EnsureOutcome>)> {
        self.resolve_languages(&[language.to_string()])?;
        let store = self.open_catalog().await?;
        let entities: Vec<_> = store
            .list()
            .await?
            .into_iter()
            .filter(|entity| ids.is_empty() || ids.contains(&entity.id))
            .collect();

        let ensurer = ProductTranslationEnsurer::new(
            self.pipeline.translator().clone(),
            store,
            self.config.catalog.fields.clone(),
            self.config.catalog.ensure_batch_ceiling,
        );
        let summary = ensurer.ensure_many(&entities, language);
        let outcomes = ensurer.drain().await;
        Ok((summary, outcomes))
    }

    pub async fn check(&self) -> Result<()> {
        check_completion_availability(&self.config.completion).await
    }
}

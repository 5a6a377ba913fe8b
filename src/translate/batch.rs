use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::Result;
use super::client::CompletionClient;
use super::prompt::build_batch_request;
use super::response::parse_translation_map;

/// Result of one batch call for one language
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslationBatch {
    pub language: String,
    /// Dotted path -> translated text, one entry per requested key
    pub translations: BTreeMap<String, String>,
    /// Keys the reply lacked; their entry holds the source text
    pub fallbacks: Vec<String>,
    /// External calls made to produce this batch (0 or 1)
    pub calls_made: usize,
}

impl TranslationBatch {
    /// Every key mapped back to its source text, without calling out
    pub fn fallback(language: &str, entries: &BTreeMap<String, String>) -> Self {
        Self {
            language: language.to_string(),
            translations: entries.clone(),
            fallbacks: entries.keys().cloned().collect(),
            calls_made: 0,
        }
    }

    /// Only the entries that actually came back translated
    pub fn translated_only(&self) -> BTreeMap<String, String> {
        self.translations
            .iter()
            .filter(|(key, _)| !self.fallbacks.contains(key))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// Translates many keys for one language with a single completion call
#[derive(Clone)]
pub struct BatchTranslator {
    client: Arc<dyn CompletionClient>,
    source_language: String,
}

impl BatchTranslator {
    pub fn new(client: Arc<dyn CompletionClient>, source_language: impl Into<String>) -> Self {
        Self {
            client,
            source_language: source_language.into(),
        }
    }

    pub fn source_language(&self) -> &str {
        &self.source_language
    }

    /// Translate `entries` (dotted path -> source text) into `target_language`.
    ///
    /// Issues exactly one request. A failed call or an unparseable reply fails
    /// the whole batch; a key missing from an otherwise valid reply falls back
    /// to its source text.
    pub async fn translate_batch(
        &self,
        target_language: &str,
        entries: &BTreeMap<String, String>,
    ) -> Result<TranslationBatch> {
        if entries.is_empty() {
            return Ok(TranslationBatch {
                language: target_language.to_string(),
                ..Default::default()
            });
        }

        let request = build_batch_request(&self.source_language, target_language, entries)?;
        debug!("Batch request for '{}' covers {} key(s)", target_language, entries.len());

        let raw = self.client.complete(&request).await?;
        let parsed = parse_translation_map(&raw)?;

        let mut batch = TranslationBatch {
            language: target_language.to_string(),
            calls_made: 1,
            ..Default::default()
        };

        for (key, source_text) in entries {
            match parsed.get(key).filter(|text| !text.trim().is_empty()) {
                Some(text) => {
                    batch.translations.insert(key.clone(), text.trim().to_string());
                }
                None => {
                    batch.translations.insert(key.clone(), source_text.clone());
                    batch.fallbacks.push(key.clone());
                }
            }
        }

        let unexpected = parsed.keys().filter(|k| !entries.contains_key(*k)).count();
        if unexpected > 0 {
            debug!("Ignored {} unexpected key(s) in '{}' reply", unexpected, target_language);
        }
        if !batch.fallbacks.is_empty() {
            warn!(
                "Reply for '{}' lacked {} of {} key(s); using source text for those",
                target_language,
                batch.fallbacks.len(),
                entries.len()
            );
        }
        info!(
            "Translated {} key(s) to '{}' in one call",
            entries.len() - batch.fallbacks.len(),
            target_language
        );

        Ok(batch)
    }

    /// Like `translate_batch`, but a failed batch yields the source text for every key
    pub async fn translate_or_fallback(
        &self,
        target_language: &str,
        entries: &BTreeMap<String, String>,
    ) -> TranslationBatch {
        match self.translate_batch(target_language, entries).await {
            Ok(batch) => batch,
            Err(e) => {
                warn!("Batch translation to '{}' failed, using source text: {}", target_language, e);
                let mut batch = TranslationBatch::fallback(target_language, entries);
                batch.calls_made = 1;
                batch
            }
        }
    }
}

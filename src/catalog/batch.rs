use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::Result;
use crate::translate::BatchTranslator;
use super::entity::localized_key;
use super::store::CatalogStore;

/// Operator-facing result of an admin catalog batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CatalogBatchSummary {
    pub language: String,
    /// Entities missing at least one field for the language
    pub considered: usize,
    pub entities_translated: usize,
    pub fields_written: usize,
    pub calls_made: usize,
    /// (entity id or "*" for the whole batch, error)
    pub failures: Vec<(String, String)>,
}

/// Admin-triggered catalog translation: many entities per external call
pub struct CatalogBatchTranslator {
    translator: BatchTranslator,
    store: Arc<dyn CatalogStore>,
    fields: Vec<String>,
    batch_size: usize,
}

impl CatalogBatchTranslator {
    pub fn new(
        translator: BatchTranslator,
        store: Arc<dyn CatalogStore>,
        fields: Vec<String>,
        batch_size: usize,
    ) -> Self {
        Self {
            translator,
            store,
            fields,
            batch_size,
        }
    }

    /// Translate up to `min(limit, batch_size)` entities with one call
    pub async fn translate_catalog(&self, language: &str, limit: usize) -> Result<CatalogBatchSummary> {
        let mut summary = CatalogBatchSummary {
            language: language.to_string(),
            ..Default::default()
        };
        if language == self.translator.source_language() {
            return Ok(summary);
        }

        let candidates: Vec<_> = self
            .store
            .list()
            .await?
            .into_iter()
            .map(|entity| {
                let missing = entity.missing_fields(language, &self.fields);
                (entity.id, missing)
            })
            .filter(|(_, missing)| !missing.is_empty())
            .collect();
        summary.considered = candidates.len();

        let take = limit.min(self.batch_size);
        let mut entries = BTreeMap::new();
        for (id, missing) in candidates.iter().take(take) {
            for (field, text) in missing {
                entries.insert(format!("{}.{}", id, field), text.clone());
            }
        }
        if entries.is_empty() {
            info!("Catalog is complete for '{}'", language);
            return Ok(summary);
        }

        info!("┌─ Catalog batch for '{}' ────────", language);
        info!("│ Entities: {} of {} missing", take.min(candidates.len()), candidates.len());
        info!("│ Fields:   {}", entries.len());

        let batch = match self.translator.translate_batch(language, &entries).await {
            Ok(batch) => batch,
            Err(e) => {
                error!("└─ Catalog batch for '{}' failed: {}", language, e);
                summary.calls_made = 1;
                summary.failures.push(("*".to_string(), e.to_string()));
                return Ok(summary);
            }
        };
        summary.calls_made = batch.calls_made;

        let mut per_entity: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
        for (key, text) in batch.translated_only() {
            // Field names never contain dots, ids might
            if let Some((id, field)) = key.rsplit_once('.') {
                per_entity
                    .entry(id.to_string())
                    .or_default()
                    .insert(localized_key(field, language), text);
            }
        }

        for (id, fields) in &per_entity {
            match self.store.update_fields(id, fields).await {
                Ok(()) => {
                    summary.entities_translated += 1;
                    summary.fields_written += fields.len();
                }
                Err(e) => {
                    warn!("│ Failed to store '{}': {}", id, e);
                    summary.failures.push((id.clone(), e.to_string()));
                }
            }
        }

        info!(
            "└─ {} entities, {} fields written with {} call(s); {} failure(s)",
            summary.entities_translated,
            summary.fields_written,
            summary.calls_made,
            summary.failures.len()
        );
        Ok(summary)
    }
}

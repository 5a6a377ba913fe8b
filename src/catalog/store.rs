use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{AutoTranslateError, Result};
use super::entity::CatalogEntity;

/// Persistent catalog access used by the ensurer and the admin batch
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Every entity in the catalog
    async fn list(&self) -> Result<Vec<CatalogEntity>>;

    /// Current record for `id`, if any
    async fn fetch(&self, id: &str) -> Result<Option<CatalogEntity>>;

    /// Partial upsert: write only `fields` on the record and bump `updated_at`
    async fn update_fields(&self, id: &str, fields: &BTreeMap<String, String>) -> Result<()>;
}

/// Catalog kept in a single JSON array file
pub struct JsonCatalogStore {
    path: PathBuf,
    entities: Mutex<Vec<CatalogEntity>>,
}

impl JsonCatalogStore {
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(AutoTranslateError::FileNotFound(path.display().to_string()));
        }

        let content = tokio::fs::read_to_string(&path).await?;
        let entities: Vec<CatalogEntity> = serde_json::from_str(&content)
            .map_err(|e| AutoTranslateError::Store(format!("Failed to parse catalog {}: {}", path.display(), e)))?;

        info!("Loaded {} catalog entities from {}", entities.len(), path.display());
        Ok(Self {
            path,
            entities: Mutex::new(entities),
        })
    }

    /// Write to a sibling temp file and rename over the catalog
    async fn persist(&self, entities: &[CatalogEntity]) -> Result<()> {
        let content = serde_json::to_string_pretty(entities)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content + "\n").await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for JsonCatalogStore {
    async fn list(&self) -> Result<Vec<CatalogEntity>> {
        Ok(self.entities.lock().await.clone())
    }

    async fn fetch(&self, id: &str) -> Result<Option<CatalogEntity>> {
        Ok(self.entities.lock().await.iter().find(|e| e.id == id).cloned())
    }

    async fn update_fields(&self, id: &str, fields: &BTreeMap<String, String>) -> Result<()> {
        let mut entities = self.entities.lock().await;
        let mut updated = entities.clone();
        let entity = updated
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| AutoTranslateError::Store(format!("No catalog entity with id '{}'", id)))?;

        for (key, text) in fields {
            entity.set_field(key, text.clone());
        }
        entity.updated_at = Some(Utc::now());

        self.persist(&updated).await?;
        *entities = updated;

        debug!("Updated {} field(s) on catalog entity '{}'", fields.len(), id);
        Ok(())
    }
}

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use crate::error::Result;
use crate::locale::LocaleStore;

/// The single write path into the locale store
#[derive(Clone)]
pub struct MergeApplier {
    store: Arc<LocaleStore>,
}

impl MergeApplier {
    pub fn new(store: Arc<LocaleStore>) -> Self {
        Self { store }
    }

    /// Deep-merge dotted-path translations into one language tree.
    ///
    /// Missing levels are created and unrelated keys are kept. Subscribers get
    /// a `LocaleEvent::Patched` once the whole patch is visible.
    pub async fn apply(&self, language: &str, translations: &BTreeMap<String, String>) -> Result<usize> {
        let written = self.store.patch(language, translations).await?;
        if written > 0 {
            info!("Merged {} translation(s) into '{}'", written, language);
        }
        Ok(written)
    }
}

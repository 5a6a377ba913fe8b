//! Scriptable completion client for tests

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use tokio::sync::Semaphore;

use crate::error::{AutoTranslateError, Result};
use super::client::{CompletionClient, CompletionRequest};

/// Answers every request by tagging each source value with the target language,
/// unless a canned reply was registered for that language.
pub struct FakeCompletionClient {
    replies: Mutex<HashMap<String, String>>,
    failures: Mutex<HashMap<String, String>>,
    calls: Mutex<Vec<CompletionRequest>>,
    gate: Option<Semaphore>,
}

impl FakeCompletionClient {
    pub fn echo() -> Self {
        Self {
            replies: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    /// Every call waits until `release` hands out a permit
    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::echo()
        }
    }

    pub fn reply_for(self, language: &str, raw: &str) -> Self {
        self.replies.lock().unwrap().insert(language.to_string(), raw.to_string());
        self
    }

    pub fn fail_for(self, language: &str, error: &str) -> Self {
        self.failures.lock().unwrap().insert(language.to_string(), error.to_string());
        self
    }

    pub fn clear_reply(&self, language: &str) {
        self.replies.lock().unwrap().remove(language);
        self.failures.lock().unwrap().remove(language);
    }

    pub fn release(&self, permits: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(permits);
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_for(&self, language: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.target_language == language)
            .count()
    }

    /// The source mapping embedded in a request payload
    pub fn payload(request: &CompletionRequest) -> BTreeMap<String, String> {
        let start = request.user.find('{').unwrap_or(0);
        serde_json::from_str(&request.user[start..]).unwrap_or_default()
    }

    pub fn tag(language: &str, source: &str) -> String {
        format!("[{}] {}", language, source)
    }
}

#[async_trait]
impl CompletionClient for FakeCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.calls.lock().unwrap().push(request.clone());

        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|e| AutoTranslateError::Translation(e.to_string()))?
                .forget();
        }

        let language = &request.target_language;
        if let Some(error) = self.failures.lock().unwrap().get(language) {
            return Err(AutoTranslateError::Translation(error.clone()));
        }
        if let Some(raw) = self.replies.lock().unwrap().get(language) {
            return Ok(raw.clone());
        }

        let translated: BTreeMap<String, String> = Self::payload(request)
            .into_iter()
            .map(|(key, source)| (key, Self::tag(language, &source)))
            .collect();
        Ok(serde_json::to_string(&translated)?)
    }
}

use std::collections::BTreeMap;

use crate::error::Result;
use super::client::CompletionRequest;

/// Build the single request covering every entry for one target language
pub fn build_batch_request(
    source_language: &str,
    target_language: &str,
    entries: &BTreeMap<String, String>,
) -> Result<CompletionRequest> {
    let source_name = language_name(source_language);
    let target_name = language_name(target_language);

    let system = format!(
        "You are a professional translator for an e-commerce storefront.\n\
         \n\
         CRITICAL: Translate every value from {} to {} ONLY (language code: {}).\n\
         \n\
         Rules:\n\
         1. Return ONLY a JSON object. No explanations, no markdown, no code fences.\n\
         2. Use exactly the same keys you were given. Never translate, add, or drop keys.\n\
         3. Keep placeholders such as {{{{count}}}}, {{name}}, %s and HTML tags unchanged.\n\
         4. Keep brand names and product codes as they are.",
        source_name, target_name, target_language
    );

    let user = format!(
        "Translate the values of this JSON object to {}:\n{}",
        target_name,
        serde_json::to_string_pretty(entries)?
    );

    Ok(CompletionRequest {
        target_language: target_language.to_string(),
        system,
        user,
    })
}

/// Full language name for clearer prompts
pub fn language_name(code: &str) -> String {
    let name = match code.to_lowercase().as_str() {
        "en" => "English",
        "es" => "Spanish",
        "fr" => "French",
        "pt" => "Portuguese",
        "zh" => "Chinese (Simplified)",
        "de" => "German",
        "it" => "Italian",
        "ja" => "Japanese",
        "ko" => "Korean",
        "nl" => "Dutch",
        "pl" => "Polish",
        "ru" => "Russian",
        "tr" => "Turkish",
        "ar" => "Arabic",
        "hi" => "Hindi",
        "vi" => "Vietnamese",
        "sv" => "Swedish",
        "uk" => "Ukrainian",
        _ => return code.to_string(),
    };
    name.to_string()
}

// Batch translation through an external completion API
//
// - client: CompletionClient trait and the OpenAI-compatible HTTP client
// - prompt: request construction for one language
// - response: repair and parsing of model replies
// - batch: one call per language, per-key fallback

pub mod batch;
pub mod client;
pub mod prompt;
pub mod response;

#[cfg(test)]
pub mod fake;

pub use batch::*;
pub use client::*;
pub use prompt::language_name;
pub use response::parse_translation_map;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AutoTranslateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Translation error: {0}")]
    Translation(String),

    #[error("Malformed completion response: {0}")]
    MalformedResponse(String),

    #[error("Catalog store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid locale path: '{0}'")]
    InvalidPath(String),

    #[error("Unknown language: {0}")]
    UnknownLanguage(String),

    #[error("File not found: {0}")]
    FileNotFound(String),
}

pub type Result<T> = std::result::Result<T, AutoTranslateError>;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A product-like catalog record with per-language copies of its text fields.
///
/// Localized copies sit next to the base fields as `<field>_<lang>`
/// (`name_es`, `description_fr`, ...). Any other attribute (price, stock, ...)
/// is carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntity {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub attributes: BTreeMap<String, Value>,
}

pub fn localized_key(field: &str, language: &str) -> String {
    format!("{}_{}", field, language)
}

impl CatalogEntity {
    pub fn new(id: &str, name: &str, description: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            updated_at: None,
            attributes: BTreeMap::new(),
        }
    }

    /// Builder-style helper to attach a localized value
    pub fn with_localized(mut self, field: &str, language: &str, text: &str) -> Self {
        self.set_field(&localized_key(field, language), text.to_string());
        self
    }

    /// Text value of any field, base or localized
    pub fn field(&self, key: &str) -> Option<&str> {
        match key {
            "id" => Some(self.id.as_str()),
            "name" => Some(self.name.as_str()),
            "description" => Some(self.description.as_str()),
            other => self.attributes.get(other).and_then(Value::as_str),
        }
    }

    pub fn set_field(&mut self, key: &str, text: String) {
        match key {
            "id" => self.id = text,
            "name" => self.name = text,
            "description" => self.description = text,
            other => {
                self.attributes.insert(other.to_string(), Value::String(text));
            }
        }
    }

    /// Fields lacking a non-blank value for `language`, with their source text
    pub fn missing_fields(&self, language: &str, fields: &[String]) -> BTreeMap<String, String> {
        fields
            .iter()
            .filter_map(|field| {
                let source = self.field(field)?.trim();
                if source.is_empty() {
                    return None;
                }
                let present = self
                    .field(&localized_key(field, language))
                    .is_some_and(|value| !value.trim().is_empty());
                (!present).then(|| (field.clone(), source.to_string()))
            })
            .collect()
    }

    /// Display value for `field` in `language`, falling back to the base field
    pub fn localized(&self, field: &str, language: &str) -> Option<&str> {
        self.field(&localized_key(field, language))
            .filter(|value| !value.trim().is_empty())
            .or_else(|| self.field(field))
    }
}

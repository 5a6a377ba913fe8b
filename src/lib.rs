//! Autotranslate - Batch Locale and Catalog Translation
//!
//! Keeps per-language locale trees complete by finding keys missing from the
//! source language, translating them in one batched completion call per
//! language and merging the results without overwriting existing values.
//! Catalog entities get the same treatment for their localized fields.

pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod locale;
pub mod merge;
pub mod pipeline;
pub mod scan;
pub mod scheduler;
pub mod translate;
pub mod workflow;

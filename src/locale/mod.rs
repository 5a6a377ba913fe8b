// Locale trees and the store that owns them
//
// - tree: recursive LocaleNode with dotted-path lookup and writes
// - store: per-language trees, JSON directory persistence, change notifications

pub mod store;
pub mod tree;

pub use store::*;
pub use tree::*;

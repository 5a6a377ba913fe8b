// Catalog entity translation
//
// - entity: product records with <field>_<lang> localized fields
// - store: CatalogStore trait and the JSON file implementation
// - ensurer: background, de-duplicated per-entity translation
// - batch: admin batch translation, many entities per call

pub mod batch;
pub mod ensurer;
pub mod entity;
pub mod store;

pub use batch::*;
pub use ensurer::*;
pub use entity::*;
pub use store::*;

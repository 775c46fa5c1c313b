pub mod blob;
pub mod catalog;
pub mod document;
pub mod epilogue;
pub mod error;
pub mod lists;
pub mod missions;
pub mod sav;
pub mod sdu;
pub mod tables;
pub mod unlocker;

mod yaml;

pub use catalog::{MissionCatalog, MissionSetSelection};
pub use document::{load_document, store_document, DocumentEditor, MemoryEditor};
pub use error::MissionEditError;
pub use tables::TableKind;
pub use unlocker::{HookKind, MissionNamespaces, MissionUnlocker, UnlockHooks, UnlockReport};

//! Patchable state: JSON documents on disk and field-path edits into them.

pub mod document_store;
pub mod field_path;

pub use document_store::DocumentStore;

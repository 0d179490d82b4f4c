//! External stores the pipeline reads from and promotes to

pub mod document;
pub mod object;

pub use document::{Document, DocumentStore, InMemoryDocumentStore, JsonDocumentStore};
pub use object::{InMemoryObjectStore, LocalObjectStore, ObjectStore};

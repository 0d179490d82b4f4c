//! Document store client
//!
//! The pipeline only ever reads whole collections, so the contract is a
//! single `find`.

use crate::core::error::StoreError;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::debug;

/// One raw record as returned by the store
pub type Document = Map<String, Value>;

/// Read access to a document-oriented data source
pub trait DocumentStore: Send + Sync {
    /// Fetch every document of `collection` in `database`
    fn find(&self, collection: &str, database: &str) -> Result<Vec<Document>, StoreError>;
}

/// Document store backed by JSON files
///
/// A collection lives at `<root>/<database>/<collection>.json` (a JSON array
/// of objects) or `<root>/<database>/<collection>.jsonl` (one object per line).
#[derive(Debug, Clone)]
pub struct JsonDocumentStore {
    root: PathBuf,
}

impl JsonDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn collection_path(&self, database: &str, collection: &str) -> Option<PathBuf> {
        let dir = self.root.join(database);
        ["json", "jsonl"]
            .iter()
            .map(|ext| dir.join(format!("{}.{}", collection, ext)))
            .find(|p| p.is_file())
    }
}

impl DocumentStore for JsonDocumentStore {
    fn find(&self, collection: &str, database: &str) -> Result<Vec<Document>, StoreError> {
        if !self.root.is_dir() {
            return Err(StoreError::Unreachable(format!(
                "document store root {} does not exist",
                self.root.display()
            )));
        }
        let path = self
            .collection_path(database, collection)
            .ok_or_else(|| StoreError::NotFound {
                container: database.to_string(),
                name: collection.to_string(),
            })?;
        debug!("Reading collection {}.{} from {}", database, collection, path.display());
        let content = std::fs::read_to_string(&path)?;
        parse_documents(&path, &content)
    }
}

fn parse_documents(path: &Path, content: &str) -> Result<Vec<Document>, StoreError> {
    let values: Vec<Value> = if path.extension().is_some_and(|e| e == "jsonl") {
        content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(serde_json::from_str)
            .collect::<Result<_, _>>()
            .map_err(|e| StoreError::Decode(e.to_string()))?
    } else {
        serde_json::from_str(content).map_err(|e| StoreError::Decode(e.to_string()))?
    };

    values
        .into_iter()
        .enumerate()
        .map(|(i, value)| match value {
            Value::Object(map) => Ok(map),
            other => Err(StoreError::Decode(format!(
                "document {} is not an object: {}",
                i, other
            ))),
        })
        .collect()
}

/// Document store held in memory
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    collections: RwLock<HashMap<(String, String), Vec<Document>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append documents to a collection, creating it if needed
    pub fn insert_many(
        &self,
        database: &str,
        collection: &str,
        documents: impl IntoIterator<Item = Document>,
    ) -> Result<(), StoreError> {
        let mut collections = self
            .collections
            .write()
            .map_err(|_| StoreError::Unreachable("document store lock poisoned".to_string()))?;
        collections
            .entry((database.to_string(), collection.to_string()))
            .or_default()
            .extend(documents);
        Ok(())
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn find(&self, collection: &str, database: &str) -> Result<Vec<Document>, StoreError> {
        let collections = self
            .collections
            .read()
            .map_err(|_| StoreError::Unreachable("document store lock poisoned".to_string()))?;
        collections
            .get(&(database.to_string(), collection.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                container: database.to_string(),
                name: collection.to_string(),
            })
    }
}

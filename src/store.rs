//! The document store boundary: where raw loyalty documents come from.

use std::{
    collections::HashMap,
    future::Future,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Mutex,
};

use serde_json::Value;

use crate::{
    Error,
    record::{DOCUMENT_ID_FIELD, RawDocument},
};

/// Fetches every document of a collection.
pub trait DocumentStore {
    /// Fetch all documents in `collection`.
    ///
    /// # Errors
    /// Returns an error if the collection cannot be read. Callers that own
    /// previously fetched data should keep it when this fails.
    fn fetch_all(
        &self,
        collection: &str,
    ) -> impl Future<Output = Result<Vec<RawDocument>, Error>> + Send;
}

/// Reads collections from JSON exports on disk.
///
/// The collection `name` is read from `<data_dir>/<name>.json`, which holds
/// either an array of documents or an object mapping document IDs to
/// documents. Object exports keep each ID under [DOCUMENT_ID_FIELD] unless
/// the document already has that key.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    data_dir: PathBuf,
}

impl JsonFileStore {
    /// Create a store that reads exports from `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// The directory the exports are read from.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn collection_path(&self, collection: &str) -> Result<PathBuf, Error> {
        validate_collection_name(collection)?;

        Ok(self.data_dir.join(format!("{collection}.json")))
    }
}

impl DocumentStore for JsonFileStore {
    async fn fetch_all(&self, collection: &str) -> Result<Vec<RawDocument>, Error> {
        let path = self.collection_path(collection)?;

        let text = tokio::fs::read_to_string(&path)
            .await
            .map_err(|error| match error.kind() {
                ErrorKind::NotFound => {
                    Error::Store(format!("no export for collection \"{collection}\" at {path:?}"))
                }
                _ => Error::from(error),
            })?;

        let documents = match serde_json::from_str(&text)? {
            Value::Array(documents) => documents,
            Value::Object(documents) => documents
                .into_iter()
                .map(|(id, document)| with_document_id(id, document))
                .collect(),
            _ => {
                return Err(Error::Json(format!(
                    "expected an array or object of documents in {path:?}"
                )));
            }
        };

        tracing::debug!(
            "read {} documents from collection \"{collection}\"",
            documents.len()
        );

        Ok(documents)
    }
}

fn with_document_id(id: String, mut document: Value) -> Value {
    if let Value::Object(fields) = &mut document {
        fields
            .entry(DOCUMENT_ID_FIELD)
            .or_insert_with(|| Value::String(id));
    }

    document
}

/// Fetch `collection` from `store`, logging the error if it fails.
///
/// # Errors
/// Returns the store's error unchanged.
pub async fn fetch_collection<D: DocumentStore>(
    store: &D,
    collection: &str,
) -> Result<Vec<RawDocument>, Error> {
    store
        .fetch_all(collection)
        .await
        .inspect_err(|error| tracing::error!("could not fetch collection \"{collection}\": {error}"))
}

/// Holds collections in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, Vec<RawDocument>>>,
}

impl MemoryStore {
    /// Create a store without any collections.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding one collection.
    pub fn with_collection(collection: &str, documents: Vec<RawDocument>) -> Self {
        let store = Self::new();
        store.replace_collection(collection, documents);
        store
    }

    /// Replace the documents of `collection`, creating it if needed.
    pub fn replace_collection(&self, collection: &str, documents: Vec<RawDocument>) {
        match self.collections.lock() {
            Ok(mut collections) => {
                collections.insert(collection.to_owned(), documents);
            }
            Err(error) => tracing::error!("could not lock the memory store: {error}"),
        }
    }

    /// Remove `collection`, so that fetching it fails.
    pub fn remove_collection(&self, collection: &str) {
        if let Ok(mut collections) = self.collections.lock() {
            collections.remove(collection);
        }
    }
}

impl DocumentStore for MemoryStore {
    async fn fetch_all(&self, collection: &str) -> Result<Vec<RawDocument>, Error> {
        validate_collection_name(collection)?;

        let collections = self
            .collections
            .lock()
            .map_err(|error| Error::Store(format!("could not lock the memory store: {error}")))?;

        collections
            .get(collection)
            .cloned()
            .ok_or_else(|| Error::Store(format!("collection \"{collection}\" does not exist")))
    }
}

/// The stores the server can be configured with.
#[derive(Debug)]
pub enum StoreBackend {
    /// JSON exports on disk.
    JsonFile(JsonFileStore),
    /// Documents held in memory.
    Memory(MemoryStore),
}

impl DocumentStore for StoreBackend {
    async fn fetch_all(&self, collection: &str) -> Result<Vec<RawDocument>, Error> {
        match self {
            StoreBackend::JsonFile(store) => store.fetch_all(collection).await,
            StoreBackend::Memory(store) => store.fetch_all(collection).await,
        }
    }
}

/// Collection names become file names, so only a conservative set of
/// characters is allowed.
fn validate_collection_name(collection: &str) -> Result<(), Error> {
    let is_valid = !collection.is_empty()
        && collection
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

    if is_valid {
        Ok(())
    } else {
        Err(Error::InvalidCollectionName(collection.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::Error;

    use super::{DocumentStore, JsonFileStore, MemoryStore};

    #[tokio::test]
    async fn reads_array_export() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("visits.json"),
            r#"[{"alice": {}}, {"bob": {}}]"#,
        )
        .unwrap();
        let store = JsonFileStore::new(dir.path());

        let documents = store.fetch_all("visits").await.unwrap();

        assert_eq!(documents, vec![json!({"alice": {}}), json!({"bob": {}})]);
    }

    #[tokio::test]
    async fn reads_object_export_in_file_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("visits.json"),
            r#"{"doc-b": {"bob": {}}, "doc-a": {"alice": {}}}"#,
        )
        .unwrap();
        let store = JsonFileStore::new(dir.path());

        let documents = store.fetch_all("visits").await.unwrap();

        assert_eq!(
            documents,
            vec![
                json!({"_id": "doc-b", "bob": {}}),
                json!({"_id": "doc-a", "alice": {}})
            ]
        );
    }

    #[tokio::test]
    async fn object_export_keeps_existing_document_ids() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("points.json"),
            r#"{"doc-a": {"_id": "custom", "puntos": 5}, "doc-b": 3}"#,
        )
        .unwrap();
        let store = JsonFileStore::new(dir.path());

        let documents = store.fetch_all("points").await.unwrap();

        assert_eq!(documents, vec![json!({"_id": "custom", "puntos": 5}), json!(3)]);
    }

    #[tokio::test]
    async fn missing_export_is_a_store_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());

        let result = store.fetch_all("visits").await;

        assert!(matches!(result, Err(Error::Store(_))), "got {result:?}");
    }

    #[tokio::test]
    async fn malformed_export_is_a_json_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("visits.json"), "{not json").unwrap();
        std::fs::write(dir.path().join("scalar.json"), "42").unwrap();
        let store = JsonFileStore::new(dir.path());

        assert!(matches!(
            store.fetch_all("visits").await,
            Err(Error::Json(_))
        ));
        assert!(matches!(
            store.fetch_all("scalar").await,
            Err(Error::Json(_))
        ));
    }

    #[tokio::test]
    async fn rejects_path_like_collection_names() {
        let store = JsonFileStore::new("data");

        for name in ["", "../secrets", "a/b", "visits.json"] {
            assert_eq!(
                store.fetch_all(name).await,
                Err(Error::InvalidCollectionName(name.to_owned()))
            );
        }
    }

    #[tokio::test]
    async fn memory_store_returns_replaced_documents() {
        let store = MemoryStore::with_collection("visits", vec![json!({"alice": {}})]);

        store.replace_collection("visits", vec![json!({"bob": {}})]);

        assert_eq!(
            store.fetch_all("visits").await.unwrap(),
            vec![json!({"bob": {}})]
        );
    }

    #[tokio::test]
    async fn memory_store_fails_for_missing_collection() {
        let store = MemoryStore::with_collection("visits", Vec::new());

        store.remove_collection("visits");

        assert!(matches!(
            store.fetch_all("visits").await,
            Err(Error::Store(_))
        ));
    }
}

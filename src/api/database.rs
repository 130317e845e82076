//! Purpose: Public collection API: `insert`, `find`, `clear` over named collections.
//! Exports: `Database`, `DatabaseOptions`.
//! Role: Dispatcher and registry; routes every operation through its collection's queue.
//! Invariants: Exactly one `LogStore` and one queue exist per collection name per `Database`.
//! Invariants: Operations are queued at call time; same-name operations never overlap.
//! Invariants: Different collection names share nothing and proceed independently.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::runtime::Handle;

use crate::collection_paths::{CollectionNameError, resolve_collection_path};
use crate::core::error::{Error, ErrorKind};
use crate::core::log::{Durability, LogStore};
use crate::core::queue::{OperationQueue, Pending};
use crate::core::record::{Query, Record, validate_record};

#[derive(Clone, Debug)]
pub struct DatabaseOptions {
    pub dir: PathBuf,
    pub durability: Durability,
}

impl DatabaseOptions {
    pub fn new() -> Self {
        Self {
            dir: PathBuf::from("."),
            durability: Durability::Fast,
        }
    }

    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = dir.into();
        self
    }

    pub fn with_durability(mut self, durability: Durability) -> Self {
        self.durability = durability;
        self
    }
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a directory of collections. Cheap to clone; clones share the registry.
#[derive(Clone)]
pub struct Database {
    inner: Arc<Inner>,
}

struct Inner {
    options: DatabaseOptions,
    runtime: Handle,
    collections: Mutex<HashMap<String, Arc<Collection>>>,
}

pub(crate) struct Collection {
    store: Arc<LogStore>,
    queue: OperationQueue,
}

impl Database {
    /// Opens (creating if needed) the collection directory.
    ///
    /// Must be called from within a tokio runtime; collection workers are spawned on it.
    pub fn open(options: DatabaseOptions) -> Result<Self, Error> {
        let runtime = Handle::try_current().map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message("database must be opened inside a tokio runtime")
                .with_source(err)
        })?;
        std::fs::create_dir_all(&options.dir).map_err(|err| {
            Error::io(err, &options.dir).with_message("failed to create database directory")
        })?;
        tracing::info!(dir = %options.dir.display(), durability = ?options.durability, "database opened");
        Ok(Self {
            inner: Arc::new(Inner {
                options,
                runtime,
                collections: Mutex::new(HashMap::new()),
            }),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.inner.options.dir
    }

    /// Appends `record` to `collection` and resolves with the accepted record.
    ///
    /// Null and non-object values fail with `InvalidRecord` without touching the queue.
    pub fn insert(&self, collection: &str, record: Value) -> Pending<Record> {
        let record = match validate_record(record) {
            Ok(record) => record,
            Err(err) => return Pending::ready(Err(err.with_collection(collection))),
        };
        self.enqueue(collection, move |store| {
            store.append(&record)?;
            Ok(record)
        })
    }

    /// Scans `collection` and resolves with every matching record in file order.
    pub fn find(&self, collection: &str, query: Query) -> Pending<Vec<Record>> {
        let name = collection.to_string();
        self.enqueue(collection, move |store| {
            let mut scan = store.read_all()?;
            let mut matches = Vec::new();
            for record in scan.by_ref() {
                let record = record?;
                if query.matches(&record) {
                    matches.push(record);
                }
            }
            if scan.skipped() > 0 {
                tracing::debug!(collection = %name, skipped = scan.skipped(), "scan dropped malformed lines");
            }
            Ok(matches)
        })
    }

    /// Truncates `collection`. Idempotent.
    pub fn clear(&self, collection: &str) -> Pending<()> {
        self.enqueue(collection, |store| store.clear())
    }

    /// Queues `op` behind every operation already submitted for `collection`.
    pub fn enqueue<T, F>(&self, collection: &str, op: F) -> Pending<T>
    where
        T: Send + 'static,
        F: FnOnce(&LogStore) -> Result<T, Error> + Send + 'static,
    {
        let name = collection.to_string();
        match self.collection(collection) {
            Ok(entry) => entry
                .queue
                .submit(move |store| op(store).map_err(|err| err.with_collection(name))),
            Err(err) => Pending::ready(Err(err)),
        }
    }

    /// Returns the registry entry for `name`, creating it on first reference.
    pub(crate) fn collection(&self, name: &str) -> Result<Arc<Collection>, Error> {
        let mut collections = self
            .inner
            .collections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(entry) = collections.get(name) {
            return Ok(Arc::clone(entry));
        }

        let path = resolve_collection_path(name, &self.inner.options.dir)
            .map_err(|err| map_collection_name_error(err, name))?;
        let store = Arc::new(LogStore::new(path, self.inner.options.durability));
        let queue = OperationQueue::spawn(name, Arc::clone(&store), &self.inner.runtime);
        let entry = Arc::new(Collection { store, queue });
        collections.insert(name.to_string(), Arc::clone(&entry));
        tracing::debug!(collection = name, path = %entry.store.path().display(), "collection registered");
        Ok(entry)
    }
}

#[cfg(test)]
impl Collection {
    pub(crate) fn store(&self) -> &Arc<LogStore> {
        &self.store
    }
}

fn map_collection_name_error(err: CollectionNameError, name: &str) -> Error {
    let message = match err {
        CollectionNameError::Empty => "collection name must not be empty",
        CollectionNameError::Reserved => "collection name must not be `.` or `..`",
        CollectionNameError::ContainsPathSeparator => {
            "collection name must not contain path separators"
        }
    };
    Error::new(ErrorKind::Usage)
        .with_message(message)
        .with_collection(name)
}

#[cfg(test)]
mod tests {
    use super::{Database, DatabaseOptions};
    use crate::core::error::ErrorKind;
    use crate::core::log::Durability;
    use std::sync::Arc;

    #[test]
    fn open_outside_runtime_is_usage_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = match Database::open(DatabaseOptions::new().with_dir(dir.path())) {
            Ok(_) => panic!("expected usage error"),
            Err(err) => err,
        };
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn options_default_to_current_dir_and_fast() {
        let options = DatabaseOptions::default();
        assert_eq!(options.dir, std::path::PathBuf::from("."));
        assert_eq!(options.durability, Durability::Fast);
    }

    #[tokio::test]
    async fn open_creates_missing_directory() {
        let temp = tempfile::tempdir().expect("tempdir");
        let dir = temp.path().join("nested").join("db");
        let db = Database::open(DatabaseOptions::new().with_dir(&dir)).expect("open");
        assert!(dir.is_dir());
        assert_eq!(db.dir(), dir.as_path());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_first_references_share_one_store() {
        let temp = tempfile::tempdir().expect("tempdir");
        let db = Database::open(DatabaseOptions::new().with_dir(temp.path())).expect("open");

        let tasks = (0..16)
            .map(|_| {
                let db = db.clone();
                tokio::spawn(async move { db.collection("shared").expect("collection") })
            })
            .collect::<Vec<_>>();
        let mut entries = Vec::new();
        for task in tasks {
            entries.push(task.await.expect("join"));
        }
        let first = &entries[0];
        assert!(entries.iter().all(|entry| Arc::ptr_eq(entry, first)));
        assert!(
            entries
                .iter()
                .all(|entry| Arc::ptr_eq(entry.store(), first.store()))
        );
        assert!(first.store().path().ends_with("shared.ndjson"));
    }

    #[tokio::test]
    async fn bad_collection_names_fail_without_queueing() {
        let temp = tempfile::tempdir().expect("tempdir");
        let db = Database::open(DatabaseOptions::new().with_dir(temp.path())).expect("open");
        for name in ["", "..", "a/b"] {
            let err = db.clear(name).await.expect_err("bad name");
            assert_eq!(err.kind(), ErrorKind::Usage);
        }
    }
}

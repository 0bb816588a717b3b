//! In-memory database, collection and view implementations.
//!
//! Collections are vectors of BSON documents in insertion order, held in a map
//! behind an async-aware read-write lock.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use bson::{Bson, Document, oid::ObjectId};
use futures::{StreamExt, stream};
use mea::rwlock::RwLock;
use tracing::debug;

use docmapper_core::{
    backend::{
        Collection, Database, DatabaseBuilder, DeleteOutcome, DocumentStream, FindView,
        InsertOutcome, UpdateOutcome, ViewCapabilities, WriteView,
    },
    error::{DatasetError, DatasetResult},
};

use crate::{
    evaluator::{compare_documents, matches},
    transform::{apply_update, project, validate_update},
};

type StoreMap = HashMap<String, Vec<Document>>;

const ID: &str = "_id";

/// Thread-safe in-memory document database.
///
/// # Thread Safety
///
/// `InMemoryDatabase` is cloneable and uses an `Arc`-wrapped internal state. Clones,
/// and every collection handle obtained from them, share the same underlying data.
///
/// # Performance
///
/// Every view scans the whole collection; there are no indexes.
///
/// # Example
///
/// ```ignore
/// use docmapper_memory::InMemoryDatabase;
/// use docmapper_core::{backend::Database, dataset::Dataset};
/// use bson::doc;
///
/// let database = InMemoryDatabase::new();
/// let users = Dataset::new(database.collection("users"));
///
/// users.insert_one(doc! { "name": "Jane" }).await?;
/// assert_eq!(users.to_list().await?.len(), 1);
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryDatabase {
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
        }
    }

    /// Creates a builder for constructing an `InMemoryDatabase`.
    pub fn builder() -> InMemoryDatabaseBuilder {
        InMemoryDatabaseBuilder
    }

    /// Creates an empty collection. Existing collections are left untouched.
    pub async fn create_collection(&self, name: &str) {
        self.store
            .write()
            .await
            .entry(name.to_string())
            .or_default();
    }

    /// Drops a collection and its documents. Returns whether it existed.
    pub async fn drop_collection(&self, name: &str) -> bool {
        self.store
            .write()
            .await
            .remove(name)
            .is_some()
    }
}

#[async_trait]
impl Database for InMemoryDatabase {
    type Collection = InMemoryCollection;

    fn collection(&self, name: &str) -> InMemoryCollection {
        InMemoryCollection {
            name: name.to_string(),
            store: Arc::clone(&self.store),
        }
    }

    async fn list_collection_names(&self) -> DatasetResult<Vec<String>> {
        let mut names = self.store
            .read()
            .await
            .keys()
            .cloned()
            .collect::<Vec<_>>();
        names.sort();

        Ok(names)
    }
}

/// Builder for [`InMemoryDatabase`] instances. Building always succeeds.
#[derive(Default, Debug)]
pub struct InMemoryDatabaseBuilder;

#[async_trait]
impl DatabaseBuilder for InMemoryDatabaseBuilder {
    type Database = InMemoryDatabase;

    async fn build(self) -> DatasetResult<Self::Database> {
        Ok(InMemoryDatabase::new())
    }
}

/// A handle on one collection of an [`InMemoryDatabase`].
///
/// The collection is created on first insert.
#[derive(Clone, Debug)]
pub struct InMemoryCollection {
    name: String,
    store: Arc<RwLock<StoreMap>>,
}

#[async_trait]
impl Collection for InMemoryCollection {
    type View = InMemoryView;

    fn name(&self) -> &str {
        &self.name
    }

    fn find(&self, selector: Document) -> InMemoryView {
        InMemoryView {
            collection: self.clone(),
            selector,
            projection: None,
            exclusions: Vec::new(),
            sort: None,
            limit: 0,
            skip: 0,
        }
    }

    async fn insert_one(&self, document: Document) -> DatasetResult<InsertOutcome> {
        let id = document
            .get(ID)
            .cloned()
            .unwrap_or_else(|| Bson::ObjectId(ObjectId::new()));

        // `_id` always leads the stored document.
        let mut stored = Document::new();
        stored.insert(ID, id.clone());
        for (field, value) in document {
            if field != ID {
                stored.insert(field, value);
            }
        }

        let mut store = self.store.write().await;
        let documents = store
            .entry(self.name.clone())
            .or_default();

        if documents.iter().any(|existing| existing.get(ID) == Some(&id)) {
            return Err(DatasetError::DuplicateKey(id.to_string(), self.name.clone()));
        }

        debug!(collection = %self.name, id = %id, "inserting document");
        documents.push(stored);

        Ok(InsertOutcome { inserted_id: id })
    }
}

/// A selector plus query options over an [`InMemoryCollection`].
///
/// Supports every view option. Results are filtered, sorted, then skipped and
/// limited, and projected last. A limit of zero means no limit.
///
/// Opening a cursor snapshots the matched documents under the read lock, so the
/// matched set is held in memory for the life of the cursor and later writes do
/// not show through it. Projection runs lazily as the cursor is consumed.
#[derive(Clone, Debug)]
pub struct InMemoryView {
    collection: InMemoryCollection,
    selector: Document,
    projection: Option<Document>,
    exclusions: Vec<String>,
    sort: Option<Document>,
    limit: u64,
    skip: u64,
}

impl InMemoryView {
    /// Returns the positions of the matched documents, in result order.
    fn select(&self, documents: &[Document]) -> DatasetResult<Vec<usize>> {
        let mut positions = Vec::new();

        for (position, document) in documents.iter().enumerate() {
            if matches(document, &self.selector)? {
                positions.push(position);
            }
        }

        if let Some(sort) = &self.sort {
            positions.sort_by(|a, b| compare_documents(&documents[*a], &documents[*b], sort));
        }

        let limit = match self.limit {
            0 => usize::MAX,
            limit => usize::try_from(limit).unwrap_or(usize::MAX),
        };

        Ok(positions
            .into_iter()
            .skip(usize::try_from(self.skip).unwrap_or(usize::MAX))
            .take(limit)
            .collect())
    }
}

#[async_trait]
impl FindView for InMemoryView {
    const CAPABILITIES: ViewCapabilities = ViewCapabilities::ALL;

    fn projection(mut self, projection: Document) -> Self {
        self.projection = Some(projection);
        self
    }

    fn exclude(mut self, fields: Vec<String>) -> Self {
        self.exclusions = fields;
        self
    }

    fn sort(mut self, sort: Document) -> Self {
        self.sort = Some(sort);
        self
    }

    fn limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    fn skip(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }

    async fn cursor(self) -> DatasetResult<DocumentStream> {
        let matched = {
            let store = self.collection.store.read().await;
            let Some(documents) = store.get(&self.collection.name) else {
                return Ok(stream::empty().boxed());
            };

            self.select(documents)?
                .into_iter()
                .map(|position| documents[position].clone())
                .collect::<Vec<_>>()
        };

        debug!(collection = %self.collection.name, count = matched.len(), "view matched documents");

        // The lock is released here; the stream shapes each document as it is polled.
        let InMemoryView { projection, exclusions, .. } = self;
        Ok(stream::iter(matched)
            .map(move |document| Ok::<_, DatasetError>(project(document, projection.as_ref(), &exclusions)))
            .boxed())
    }
}

#[async_trait]
impl WriteView for InMemoryView {
    async fn update_many(self, update: Document) -> DatasetResult<UpdateOutcome> {
        validate_update(&update)?;

        let mut store = self.collection.store.write().await;
        let Some(documents) = store.get_mut(&self.collection.name) else {
            return Ok(UpdateOutcome::default());
        };

        let positions = self.select(documents)?;

        // Stage every change first so a failing document leaves the collection untouched.
        let mut staged = Vec::with_capacity(positions.len());
        for position in &positions {
            let mut document = documents[*position].clone();
            if apply_update(&mut document, &update)? {
                staged.push((*position, document));
            }
        }

        let outcome = UpdateOutcome {
            matched_count: positions.len() as u64,
            modified_count: staged.len() as u64,
        };

        for (position, document) in staged {
            documents[position] = document;
        }

        debug!(
            collection = %self.collection.name,
            matched = outcome.matched_count,
            modified = outcome.modified_count,
            "updated documents"
        );

        Ok(outcome)
    }

    async fn delete_many(self) -> DatasetResult<DeleteOutcome> {
        let mut store = self.collection.store.write().await;
        let Some(documents) = store.get_mut(&self.collection.name) else {
            return Ok(DeleteOutcome::default());
        };

        let mut positions = self.select(documents)?;
        positions.sort_unstable_by(|a, b| b.cmp(a));

        for position in &positions {
            documents.remove(*position);
        }

        debug!(collection = %self.collection.name, deleted = positions.len(), "deleted documents");

        Ok(DeleteOutcome {
            deleted_count: positions.len() as u64,
        })
    }
}

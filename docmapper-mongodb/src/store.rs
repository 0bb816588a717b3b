use async_trait::async_trait;
use bson::{Bson, Document, doc};
use futures::{StreamExt, TryStreamExt, future};
use mongodb::{
    Client, Collection as MongoCollection,
    options::{ClientOptions, FindOptions},
};
use tracing::{debug, error};

use docmapper_core::{
    backend::{
        Collection, Database, DatabaseBuilder, DeleteOutcome, DocumentStream, FindView,
        InsertOutcome, UpdateOutcome, ViewCapabilities, WriteView,
    },
    config::ConnectionUri,
    dataset::ViewOptions,
    error::{DatasetError, DatasetResult},
};

fn backend_error(e: mongodb::error::Error) -> DatasetError {
    DatasetError::Backend(e.to_string())
}

#[derive(Debug, Clone)]
pub struct MongoDbDatabase {
    client: Client,
    database: String,
}

impl MongoDbDatabase {
    pub fn new(client: Client, database: impl Into<String>) -> Self {
        Self {
            client,
            database: database.into(),
        }
    }

    pub fn builder(uri: &ConnectionUri) -> MongoDbDatabaseBuilder {
        MongoDbDatabaseBuilder::new(&uri.dsn(), &uri.database)
    }

    /// Connects to the database addressed by a `host[:port]/database` URI.
    pub async fn from_uri(uri: &str) -> DatasetResult<Self> {
        Self::builder(&uri.parse()?).build().await
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn name(&self) -> &str {
        &self.database
    }
}

#[async_trait]
impl Database for MongoDbDatabase {
    type Collection = MongoDbCollection;

    fn collection(&self, name: &str) -> MongoDbCollection {
        MongoDbCollection {
            inner: self.client.database(&self.database).collection(name),
            name: name.to_string(),
        }
    }

    async fn list_collection_names(&self) -> DatasetResult<Vec<String>> {
        self.client
            .database(&self.database)
            .list_collection_names()
            .await
            .map_err(backend_error)
    }

    async fn shutdown(self) -> DatasetResult<()> {
        self.client.shutdown().await;

        Ok(())
    }
}

pub struct MongoDbDatabaseBuilder {
    dsn: String,
    database: String,
}

impl MongoDbDatabaseBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
        }
    }
}

#[async_trait]
impl DatabaseBuilder for MongoDbDatabaseBuilder {
    type Database = MongoDbDatabase;

    async fn build(self) -> DatasetResult<Self::Database> {
        debug!(dsn = %self.dsn, database = %self.database, "connecting to mongodb");

        let options = ClientOptions::parse(&self.dsn)
            .await
            .map_err(|e| {
                error!(dsn = %self.dsn, error = %e, "invalid mongodb connection string");
                DatasetError::Initialization(e.to_string())
            })?;
        let client = Client::with_options(options)
            .map_err(|e| {
                error!(dsn = %self.dsn, error = %e, "failed to create mongodb client");
                DatasetError::Initialization(e.to_string())
            })?;

        Ok(MongoDbDatabase::new(client, self.database))
    }
}

#[derive(Debug, Clone)]
pub struct MongoDbCollection {
    inner: MongoCollection<Document>,
    name: String,
}

#[async_trait]
impl Collection for MongoDbCollection {
    type View = MongoDbView;

    fn name(&self) -> &str {
        &self.name
    }

    fn find(&self, selector: Document) -> MongoDbView {
        MongoDbView {
            collection: self.inner.clone(),
            selector,
            options: ViewOptions::default(),
        }
    }

    async fn insert_one(&self, document: Document) -> DatasetResult<InsertOutcome> {
        let result = self.inner
            .insert_one(document)
            .await
            .map_err(backend_error)?;

        Ok(InsertOutcome {
            inserted_id: result.inserted_id,
        })
    }
}

/// A `find` call under construction. Options are collected and turned into
/// [`FindOptions`] when the cursor is opened.
#[derive(Debug, Clone)]
pub struct MongoDbView {
    collection: MongoCollection<Document>,
    selector: Document,
    options: ViewOptions,
}

/// Merges the inclusion projection and the exclusions into one projection document.
fn merged_projection(options: &ViewOptions) -> Option<Document> {
    let exclusions = options.exclusions.as_deref().unwrap_or_default();
    if options.projection.is_none() && exclusions.is_empty() {
        return None;
    }

    let mut projection = options.projection.clone().unwrap_or_default();
    for field in exclusions {
        projection.insert(field.as_str(), Bson::Int32(0));
    }

    Some(projection)
}

fn find_options(options: &ViewOptions) -> FindOptions {
    let mut find = FindOptions::default();

    find.projection = merged_projection(options);
    find.sort = options.sort.clone();
    // The server treats a zero limit as no limit.
    find.limit = options
        .limit
        .filter(|limit| *limit > 0)
        .map(|limit| i64::try_from(limit).unwrap_or(i64::MAX));
    find.skip = options.skip.filter(|skip| *skip > 0);

    find
}

/// Returns whether skip or limit narrow the view below what the selector matches.
fn is_windowed(options: &ViewOptions) -> bool {
    options.limit.is_some_and(|limit| limit > 0) || options.skip.is_some_and(|skip| skip > 0)
}

/// Find options resolving only the `_id`s of the documents a windowed view returns.
fn id_options(options: &ViewOptions) -> FindOptions {
    let mut find = find_options(options);
    find.projection = Some(doc! { "_id": 1 });

    find
}

fn ids_selector(ids: Vec<Bson>) -> Document {
    doc! { "_id": { "$in": ids } }
}

impl MongoDbView {
    /// Returns the selector bulk writes run against.
    ///
    /// A windowed view first resolves the `_id`s it returns, so writes touch exactly
    /// those documents. The lookup and the write are separate server calls.
    async fn write_selector(&self) -> DatasetResult<Document> {
        if !is_windowed(&self.options) {
            return Ok(self.selector.clone());
        }

        let ids = self.collection
            .find(self.selector.clone())
            .with_options(id_options(&self.options))
            .await
            .map_err(backend_error)?
            .map_err(backend_error)
            .try_filter_map(|document| future::ready(Ok(document.get("_id").cloned())))
            .try_collect::<Vec<_>>()
            .await?;

        debug!(collection = %self.collection.name(), count = ids.len(), "resolved windowed view for write");

        Ok(ids_selector(ids))
    }
}

#[async_trait]
impl FindView for MongoDbView {
    const CAPABILITIES: ViewCapabilities = ViewCapabilities::ALL;

    fn projection(mut self, projection: Document) -> Self {
        self.options.projection = Some(projection);
        self
    }

    fn exclude(mut self, fields: Vec<String>) -> Self {
        self.options.exclusions = Some(fields);
        self
    }

    fn sort(mut self, sort: Document) -> Self {
        self.options.sort = Some(sort);
        self
    }

    fn limit(mut self, limit: u64) -> Self {
        self.options.limit = Some(limit);
        self
    }

    fn skip(mut self, skip: u64) -> Self {
        self.options.skip = Some(skip);
        self
    }

    async fn cursor(self) -> DatasetResult<DocumentStream> {
        let options = find_options(&self.options);

        debug!(collection = %self.collection.name(), selector = %self.selector, "opening mongodb cursor");

        Ok(self.collection
            .find(self.selector)
            .with_options(options)
            .await
            .map_err(backend_error)?
            .map_err(backend_error)
            .boxed())
    }
}

#[async_trait]
impl WriteView for MongoDbView {
    async fn update_many(self, update: Document) -> DatasetResult<UpdateOutcome> {
        let selector = self.write_selector().await?;
        let result = self.collection
            .update_many(selector, update)
            .await
            .map_err(backend_error)?;

        Ok(UpdateOutcome {
            matched_count: result.matched_count,
            modified_count: result.modified_count,
        })
    }

    async fn delete_many(self) -> DatasetResult<DeleteOutcome> {
        let selector = self.write_selector().await?;
        let result = self.collection
            .delete_many(selector)
            .await
            .map_err(backend_error)?;

        Ok(DeleteOutcome {
            deleted_count: result.deleted_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclusions_merge_into_the_projection() {
        let options = ViewOptions {
            projection: Some(doc! { "name": 1 }),
            exclusions: Some(vec!["_id".to_string()]),
            ..ViewOptions::default()
        };

        assert_eq!(merged_projection(&options), Some(doc! { "name": 1, "_id": 0 }));
    }

    #[test]
    fn exclusions_alone_form_a_projection() {
        let options = ViewOptions {
            exclusions: Some(vec!["email".to_string(), "age".to_string()]),
            ..ViewOptions::default()
        };

        assert_eq!(merged_projection(&options), Some(doc! { "email": 0, "age": 0 }));
        assert_eq!(merged_projection(&ViewOptions::default()), None);
    }

    #[test]
    fn find_options_carry_sort_and_paging() {
        let options = ViewOptions {
            sort: Some(doc! { "name": 1, "age": -1 }),
            limit: Some(10),
            skip: Some(20),
            ..ViewOptions::default()
        };
        let find = find_options(&options);

        assert_eq!(find.sort, Some(doc! { "name": 1, "age": -1 }));
        assert_eq!(find.limit, Some(10));
        assert_eq!(find.skip, Some(20));
        assert_eq!(find.projection, None);
    }

    #[test]
    fn skip_and_limit_window_writes() {
        assert!(!is_windowed(&ViewOptions::default()));
        assert!(!is_windowed(&ViewOptions {
            sort: Some(doc! { "age": 1 }),
            limit: Some(0),
            skip: Some(0),
            ..ViewOptions::default()
        }));
        assert!(is_windowed(&ViewOptions { limit: Some(2), ..ViewOptions::default() }));
        assert!(is_windowed(&ViewOptions { skip: Some(1), ..ViewOptions::default() }));
    }

    #[test]
    fn windowed_writes_resolve_ids_in_view_order() {
        let options = ViewOptions {
            projection: Some(doc! { "name": 1 }),
            exclusions: Some(vec!["email".to_string()]),
            sort: Some(doc! { "age": 1 }),
            limit: Some(2),
            ..ViewOptions::default()
        };
        let find = id_options(&options);

        assert_eq!(find.projection, Some(doc! { "_id": 1 }));
        assert_eq!(find.sort, Some(doc! { "age": 1 }));
        assert_eq!(find.limit, Some(2));
        assert_eq!(
            ids_selector(vec![Bson::Int32(3), Bson::Int32(7)]),
            doc! { "_id": { "$in": [3, 7] } }
        );
    }

    #[test]
    fn zero_limit_and_skip_are_omitted() {
        let options = ViewOptions {
            limit: Some(0),
            skip: Some(0),
            ..ViewOptions::default()
        };
        let find = find_options(&options);

        assert_eq!(find.limit, None);
        assert_eq!(find.skip, None);
    }
}

//! A registry of named datasets over one database.
//!
//! # Example
//!
//! ```ignore
//! use docmapper::{prelude::*, memory::InMemoryDatabase};
//!
//! let mut repository = Repository::new(InMemoryDatabase::new());
//! let users = repository.dataset("users");
//!
//! users.insert_one(doc! { "name": "Jane" }).await?;
//! assert!(repository.has_dataset("users").await?);
//! assert_eq!(repository.get("users")?.to_list().await?.len(), 1);
//! ```

use std::{collections::HashMap, sync::Arc};

use tracing::debug;

use crate::{
    backend::Database,
    config::RepositoryConfig,
    dataset::Dataset,
    error::{DatasetError, DatasetResult},
    model::Model,
    relation::Relation,
};

/// Hands out datasets over the collections of a [`Database`] and remembers them by name.
#[derive(Debug)]
pub struct Repository<D: Database> {
    database: D,
    datasets: HashMap<String, Dataset<D::Collection>>,
    strict: bool,
}

impl<D: Database> Repository<D> {
    pub fn new(database: D) -> Self {
        Repository {
            database,
            datasets: HashMap::new(),
            strict: false,
        }
    }

    /// Creates a repository whose datasets follow `config`'s strictness.
    pub fn with_config(database: D, config: &RepositoryConfig) -> Self {
        Repository {
            strict: config.strict,
            ..Repository::new(database)
        }
    }

    pub fn database(&self) -> &D {
        &self.database
    }

    /// Creates and registers a dataset over the named collection.
    ///
    /// Registering a name again replaces the earlier dataset.
    pub fn dataset(&mut self, name: &str) -> Dataset<D::Collection> {
        debug!(collection = name, "registering dataset");

        let dataset = Dataset::from_arc(Arc::new(self.database.collection(name))).strict(self.strict);
        self.datasets
            .insert(name.to_string(), dataset.clone());

        dataset
    }

    /// Returns a previously registered dataset.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::DatasetNotFound`] if `name` was never registered.
    pub fn get(&self, name: &str) -> DatasetResult<&Dataset<D::Collection>> {
        self.datasets
            .get(name)
            .ok_or_else(|| DatasetError::DatasetNotFound(name.to_string()))
    }

    /// Returns the names of the registered datasets.
    pub fn dataset_names(&self) -> impl Iterator<Item = &str> {
        self.datasets.keys().map(String::as_str)
    }

    /// Returns whether the database has a collection called `name`.
    pub async fn has_dataset(&self, name: &str) -> DatasetResult<bool> {
        Ok(self
            .database
            .list_collection_names()
            .await?
            .iter()
            .any(|collection| collection == name))
    }

    /// Registers a dataset for `M`'s collection and returns it as a typed relation.
    pub fn relation<M: Model>(&mut self) -> Relation<D::Collection, M> {
        Relation::new(self.dataset(M::collection_name()))
    }

    /// Shuts down the underlying database.
    pub async fn shutdown(self) -> DatasetResult<()> {
        self.database.shutdown().await
    }
}

//! Typed datasets.
//!
//! A [`Relation`] wraps a [`Dataset`] and decodes its results into a [`Model`]. Chain
//! methods mirror the dataset's and return new relations; the untyped dataset stays
//! reachable through [`Relation::dataset`].

use std::marker::PhantomData;

use bson::{Bson, Document};
use futures::{TryStreamExt, future};

use crate::{
    backend::{Collection, InsertOutcome},
    builder::SortSpec,
    dataset::Dataset,
    error::DatasetResult,
    model::{Model, ModelExt},
};

/// A dataset whose documents decode into `M`.
#[derive(Debug)]
pub struct Relation<C: Collection, M: Model> {
    dataset: Dataset<C>,
    _model: PhantomData<fn() -> M>,
}

impl<C: Collection, M: Model> Clone for Relation<C, M> {
    fn clone(&self) -> Self {
        Relation::new(self.dataset.clone())
    }
}

impl<C: Collection, M: Model> Relation<C, M> {
    pub fn new(dataset: Dataset<C>) -> Self {
        Relation {
            dataset,
            _model: PhantomData,
        }
    }

    /// Returns the underlying untyped dataset.
    pub fn dataset(&self) -> &Dataset<C> {
        &self.dataset
    }

    fn map(&self, update: impl FnOnce(&Dataset<C>) -> Dataset<C>) -> Self {
        Relation::new(update(&self.dataset))
    }

    /// See [`Dataset::with_selector`].
    pub fn find(&self, criteria: Document) -> Self {
        self.map(|dataset| dataset.with_selector(criteria))
    }

    pub fn filter(&self, narrowing: Document) -> Self {
        self.map(|dataset| dataset.filter(narrowing))
    }

    pub fn by_pk(&self, id: impl Into<Bson>) -> Self {
        self.map(|dataset| dataset.by_pk(id))
    }

    pub fn only<I, S>(&self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.map(|dataset| dataset.only(fields))
    }

    pub fn without<I, S>(&self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.map(|dataset| dataset.without(fields))
    }

    pub fn sort(&self, spec: impl Into<SortSpec>) -> Self {
        self.map(|dataset| dataset.sort(spec))
    }

    pub fn order(&self, spec: impl Into<SortSpec>) -> Self {
        self.sort(spec)
    }

    pub fn limit(&self, limit: u64) -> Self {
        self.map(|dataset| dataset.limit(limit))
    }

    pub fn skip(&self, skip: u64) -> Self {
        self.map(|dataset| dataset.skip(skip))
    }

    /// Executes the relation and decodes every result.
    ///
    /// # Errors
    ///
    /// Fails with [`DatasetError::Serialization`](crate::error::DatasetError::Serialization) on the first document that does not
    /// decode into `M`.
    pub async fn to_vec(&self) -> DatasetResult<Vec<M>> {
        self.dataset
            .stream()
            .await?
            .and_then(|document| future::ready(M::from_document(document)))
            .try_collect()
            .await
    }

    /// Decodes the first result, if any.
    pub async fn first(&self) -> DatasetResult<Option<M>> {
        self.dataset
            .first()
            .await?
            .map(M::from_document)
            .transpose()
    }

    /// Decodes the only result.
    ///
    /// # Errors
    ///
    /// Fails unless exactly one document matches, see [`Dataset::one`].
    pub async fn one(&self) -> DatasetResult<M> {
        M::from_document(self.dataset.one().await?)
    }

    /// Serializes and inserts `model`.
    pub async fn insert(&self, model: &M) -> DatasetResult<InsertOutcome> {
        self.dataset
            .insert_one(model.to_document()?)
            .await
    }

    /// Inserts a raw document, bypassing the model.
    pub async fn insert_document(&self, document: Document) -> DatasetResult<InsertOutcome> {
        self.dataset.insert_one(document).await
    }
}

impl<C: Collection, M: Model> From<Dataset<C>> for Relation<C, M> {
    fn from(dataset: Dataset<C>) -> Self {
        Relation::new(dataset)
    }
}

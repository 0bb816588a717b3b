//! The chainable, immutable query composer.
//!
//! A [`Dataset`] accumulates a selector and a set of [`ViewOptions`] and only touches
//! the driver when it is materialized. Every chain method borrows the dataset and
//! returns a new one, so a base dataset can be shared and extended in several
//! directions without interference.
//!
//! # Materialization
//!
//! Before execution the dataset opens a fresh view with
//! [`Collection::find`](crate::backend::Collection::find) and applies the non-empty
//! options in a fixed order (projection, exclusion, sort, limit, skip) regardless of
//! the order the chain set them. Options the view type does not support are skipped,
//! or rejected with [`DatasetError::UnsupportedOption`] when the dataset is strict.
//!
//! # Example
//!
//! ```ignore
//! use docmapper::prelude::*;
//! use bson::doc;
//!
//! let users = Dataset::new(database.collection("users"));
//! let names = users
//!     .filter(doc! { "active": true })
//!     .sort(SortSpec::new().asc("name"))
//!     .only(["name"])
//!     .without(["_id"])
//!     .limit(10)
//!     .to_list()
//!     .await?;
//! ```

use std::sync::Arc;

use bson::{Bson, Document, doc};
use futures::TryStreamExt;
use tracing::{debug, warn};

use crate::{
    backend::{
        Collection, DeleteOutcome, DocumentStream, FindView, InsertOutcome, UpdateOutcome,
        ViewOp, WriteView,
    },
    builder::{SortSpec, build_projection, normalize_sort, rejected_sort_entries, try_normalize_sort},
    error::{DatasetError, DatasetResult},
};

/// The options a dataset accumulates on top of its selector.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewOptions {
    /// Inclusion projection built from [`Dataset::only`].
    pub projection: Option<Document>,
    /// Fields removed by [`Dataset::without`].
    pub exclusions: Option<Vec<String>>,
    /// Normalized sort document built from [`Dataset::sort`].
    pub sort: Option<Document>,
    /// Maximum number of results.
    pub limit: Option<u64>,
    /// Number of leading results to discard.
    pub skip: Option<u64>,
}

impl ViewOptions {
    /// Returns whether `op` carries a value worth applying.
    pub fn is_set(&self, op: ViewOp) -> bool {
        match op {
            ViewOp::Projection => self
                .projection
                .as_ref()
                .is_some_and(|projection| !projection.is_empty()),
            ViewOp::Exclusion => self
                .exclusions
                .as_ref()
                .is_some_and(|fields| !fields.is_empty()),
            ViewOp::Sort => self.sort.as_ref().is_some_and(|sort| !sort.is_empty()),
            ViewOp::Limit => self.limit.is_some(),
            ViewOp::Skip => self.skip.is_some(),
        }
    }

    /// Returns whether no option is set.
    pub fn is_empty(&self) -> bool {
        !ViewOp::CANONICAL_ORDER
            .iter()
            .any(|op| self.is_set(*op))
    }
}

/// An immutable query over a collection.
///
/// Cloning is cheap: the collection handle is shared.
#[derive(Debug)]
pub struct Dataset<C: Collection> {
    collection: Arc<C>,
    selector: Document,
    options: ViewOptions,
    strict: bool,
}

impl<C: Collection> Clone for Dataset<C> {
    fn clone(&self) -> Self {
        Dataset {
            collection: Arc::clone(&self.collection),
            selector: self.selector.clone(),
            options: self.options.clone(),
            strict: self.strict,
        }
    }
}

impl<C: Collection> Dataset<C> {
    /// Creates a dataset matching every document in `collection`.
    pub fn new(collection: C) -> Self {
        Self::from_arc(Arc::new(collection))
    }

    /// Creates a dataset matching every document in a shared collection handle.
    pub fn from_arc(collection: Arc<C>) -> Self {
        Dataset {
            collection,
            selector: Document::new(),
            options: ViewOptions::default(),
            strict: false,
        }
    }

    /// Returns the shared collection handle.
    pub fn collection(&self) -> &Arc<C> {
        &self.collection
    }

    /// Returns the current selector.
    pub fn selector(&self) -> &Document {
        &self.selector
    }

    /// Returns the accumulated options.
    pub fn options(&self) -> &ViewOptions {
        &self.options
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    fn derive(&self, update: impl FnOnce(&mut Self)) -> Self {
        let mut next = self.clone();
        update(&mut next);
        next
    }

    /// Returns a dataset over the same collection scoped to `criteria`, with no options.
    pub fn with_selector(&self, criteria: Document) -> Self {
        Dataset {
            collection: Arc::clone(&self.collection),
            selector: criteria,
            options: ViewOptions::default(),
            strict: self.strict,
        }
    }

    /// Returns a dataset with the given options record in place of the current one.
    pub fn with_options(&self, options: ViewOptions) -> Self {
        self.derive(|next| next.options = options)
    }

    /// Narrows the selector with `narrowing`.
    ///
    /// How the two selectors combine is up to the collection, see
    /// [`Collection::merge_selector`].
    pub fn filter(&self, narrowing: Document) -> Self {
        let selector = self
            .collection
            .merge_selector(&self.selector, narrowing);

        self.derive(|next| next.selector = selector)
    }

    /// Narrows the selector to the document with the given `_id`.
    pub fn by_pk(&self, id: impl Into<Bson>) -> Self {
        let id: Bson = id.into();
        self.filter(doc! { "_id": id })
    }

    /// Restricts returned documents to `fields`.
    pub fn only<I, S>(&self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let projection = build_projection(fields);

        self.derive(|next| next.options.projection = Some(projection))
    }

    /// Removes `fields` from returned documents.
    pub fn without<I, S>(&self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields = fields
            .into_iter()
            .map(Into::into)
            .collect::<Vec<String>>();

        self.derive(|next| next.options.exclusions = Some(fields))
    }

    /// Caps the number of results.
    pub fn limit(&self, limit: u64) -> Self {
        self.derive(|next| next.options.limit = Some(limit))
    }

    /// Discards the first `skip` results.
    pub fn skip(&self, skip: u64) -> Self {
        self.derive(|next| next.options.skip = Some(skip))
    }

    /// Orders results by `spec`.
    ///
    /// Entries whose direction cannot be normalized are dropped. Use
    /// [`try_sort`](Dataset::try_sort) to reject them instead.
    pub fn sort(&self, spec: impl Into<SortSpec>) -> Self {
        let spec: SortSpec = spec.into();

        for (field, value) in rejected_sort_entries(&spec) {
            debug!(
                collection = self.collection.name(),
                field = %field,
                value = %value,
                "dropping unrecognized sort direction"
            );
        }

        let sort = normalize_sort(&spec);
        self.derive(|next| next.options.sort = Some(sort))
    }

    /// Alias for [`sort`](Dataset::sort).
    pub fn order(&self, spec: impl Into<SortSpec>) -> Self {
        self.sort(spec)
    }

    /// Orders results by `spec`, failing on the first unrecognized direction.
    pub fn try_sort(&self, spec: impl Into<SortSpec>) -> DatasetResult<Self> {
        let spec: SortSpec = spec.into();
        let sort = try_normalize_sort(&spec).inspect_err(|err| {
            warn!(collection = self.collection.name(), error = %err, "rejecting sort specification");
        })?;

        Ok(self.derive(|next| next.options.sort = Some(sort)))
    }

    /// Sets whether options unsupported by the view are an error rather than skipped.
    pub fn strict(&self, strict: bool) -> Self {
        self.derive(|next| next.strict = strict)
    }

    /// Opens a fresh view and applies the accumulated options in canonical order.
    pub fn view(&self) -> DatasetResult<C::View> {
        let mut view = self.collection.find(self.selector.clone());

        for op in ViewOp::CANONICAL_ORDER {
            if !self.options.is_set(op) {
                continue;
            }

            if !<C::View as FindView>::CAPABILITIES.supports(op) {
                if self.strict {
                    warn!(collection = self.collection.name(), option = %op, "view does not support option");
                    return Err(DatasetError::UnsupportedOption(op));
                }

                debug!(collection = self.collection.name(), option = %op, "skipping unsupported view option");
                continue;
            }

            view = self.apply(view, op);
        }

        Ok(view)
    }

    fn apply(&self, view: C::View, op: ViewOp) -> C::View {
        let options = &self.options;

        match op {
            ViewOp::Projection => match &options.projection {
                Some(projection) => view.projection(projection.clone()),
                None => view,
            },
            ViewOp::Exclusion => match &options.exclusions {
                Some(fields) => view.exclude(fields.clone()),
                None => view,
            },
            ViewOp::Sort => match &options.sort {
                Some(sort) => view.sort(sort.clone()),
                None => view,
            },
            ViewOp::Limit => match options.limit {
                Some(limit) => view.limit(limit),
                None => view,
            },
            ViewOp::Skip => match options.skip {
                Some(skip) => view.skip(skip),
                None => view,
            },
        }
    }

    /// Executes the dataset and returns a lazy cursor over the results.
    pub async fn stream(&self) -> DatasetResult<DocumentStream> {
        self.view()?.cursor().await
    }

    /// Executes the dataset and collects every result.
    pub async fn to_list(&self) -> DatasetResult<Vec<Document>> {
        self.stream()
            .await?
            .try_collect()
            .await
    }

    /// Executes the dataset and hands each result to `visitor` as the cursor yields it.
    pub async fn for_each<F>(&self, mut visitor: F) -> DatasetResult<()>
    where
        F: FnMut(Document),
    {
        let mut stream = self.stream().await?;

        while let Some(document) = stream.try_next().await? {
            visitor(document);
        }

        Ok(())
    }

    /// Returns the first result, if any.
    pub async fn first(&self) -> DatasetResult<Option<Document>> {
        self.stream()
            .await?
            .try_next()
            .await
    }

    /// Returns the only result.
    ///
    /// # Errors
    ///
    /// [`DatasetError::NoResults`] when nothing matches and
    /// [`DatasetError::TooManyResults`] when more than one document does.
    pub async fn one(&self) -> DatasetResult<Document> {
        let mut documents = self.to_list().await?;

        match documents.len() {
            0 => Err(DatasetError::NoResults),
            1 => Ok(documents.remove(0)),
            count => Err(DatasetError::TooManyResults(count)),
        }
    }

    /// Inserts `document` into the collection. Selector and options are ignored.
    pub async fn insert_one(&self, document: Document) -> DatasetResult<InsertOutcome> {
        self.collection.insert_one(document).await
    }

    /// Applies `update` to every document the dataset matches.
    pub async fn update_many(&self, update: Document) -> DatasetResult<UpdateOutcome> {
        self.view()?.update_many(update).await
    }

    /// Deletes every document the dataset matches.
    pub async fn delete_many(&self) -> DatasetResult<DeleteOutcome> {
        self.view()?.delete_many().await
    }
}

#[cfg(test)]
mod tests {
    use std::{
        marker::PhantomData,
        sync::Mutex,
    };

    use async_trait::async_trait;
    use futures::{StreamExt, stream};

    use super::*;
    use crate::backend::ViewCapabilities;

    trait Capabilities: Send + Sync + std::fmt::Debug + 'static {
        const CAPS: ViewCapabilities;
    }

    #[derive(Debug)]
    struct Full;

    impl Capabilities for Full {
        const CAPS: ViewCapabilities = ViewCapabilities::ALL;
    }

    #[derive(Debug)]
    struct LimitOnly;

    impl Capabilities for LimitOnly {
        const CAPS: ViewCapabilities = ViewCapabilities {
            limit: true,
            ..ViewCapabilities::NONE
        };
    }

    type Log = Arc<Mutex<Vec<String>>>;

    #[derive(Debug)]
    struct FakeCollection<K> {
        documents: Vec<Document>,
        log: Log,
        _caps: PhantomData<K>,
    }

    impl<K> FakeCollection<K> {
        fn new(documents: Vec<Document>) -> (Self, Log) {
            let log = Log::default();
            let collection = FakeCollection {
                documents,
                log: Arc::clone(&log),
                _caps: PhantomData,
            };
            (collection, log)
        }
    }

    struct FakeView<K> {
        documents: Vec<Document>,
        log: Log,
        _caps: PhantomData<K>,
    }

    impl<K> FakeView<K> {
        fn record(self, entry: String) -> Self {
            self.log.lock().unwrap().push(entry);
            self
        }
    }

    #[async_trait]
    impl<K: Capabilities> FindView for FakeView<K> {
        const CAPABILITIES: ViewCapabilities = K::CAPS;

        fn projection(self, projection: Document) -> Self {
            self.record(format!("projection {}", projection))
        }

        fn exclude(self, fields: Vec<String>) -> Self {
            self.record(format!("exclude {:?}", fields))
        }

        fn sort(self, sort: Document) -> Self {
            self.record(format!("sort {}", sort))
        }

        fn limit(self, limit: u64) -> Self {
            self.record(format!("limit {}", limit))
        }

        fn skip(self, skip: u64) -> Self {
            self.record(format!("skip {}", skip))
        }

        async fn cursor(self) -> DatasetResult<DocumentStream> {
            Ok(stream::iter(self.documents.into_iter().map(Ok)).boxed())
        }
    }

    #[async_trait]
    impl<K: Capabilities> WriteView for FakeView<K> {
        async fn update_many(self, update: Document) -> DatasetResult<UpdateOutcome> {
            let matched = self.documents.len() as u64;
            self.record(format!("update {}", update));

            Ok(UpdateOutcome { matched_count: matched, modified_count: matched })
        }

        async fn delete_many(self) -> DatasetResult<DeleteOutcome> {
            let deleted = self.documents.len() as u64;
            self.record("delete".to_string());

            Ok(DeleteOutcome { deleted_count: deleted })
        }
    }

    #[async_trait]
    impl<K: Capabilities> Collection for FakeCollection<K> {
        type View = FakeView<K>;

        fn name(&self) -> &str {
            "fake"
        }

        fn find(&self, selector: Document) -> Self::View {
            self.log.lock().unwrap().push(format!("find {}", selector));

            FakeView {
                documents: self.documents.clone(),
                log: Arc::clone(&self.log),
                _caps: PhantomData,
            }
        }

        async fn insert_one(&self, document: Document) -> DatasetResult<InsertOutcome> {
            self.log.lock().unwrap().push(format!("insert {}", document));

            Ok(InsertOutcome { inserted_id: document.get("_id").cloned().unwrap_or(Bson::Null) })
        }
    }

    fn entries(log: &Log) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn options_apply_in_canonical_order() {
        let (collection, log) = FakeCollection::<Full>::new(vec![]);
        let dataset = Dataset::new(collection)
            .skip(2)
            .limit(5)
            .sort(SortSpec::new().asc("name"))
            .without(["_id"])
            .only(["name"]);

        dataset.view().unwrap();

        assert_eq!(
            entries(&log),
            vec![
                "find {}".to_string(),
                format!("projection {}", doc! { "name": 1 }),
                "exclude [\"_id\"]".to_string(),
                format!("sort {}", doc! { "name": 1 }),
                "limit 5".to_string(),
                "skip 2".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn empty_options_are_not_applied() {
        let (collection, log) = FakeCollection::<Full>::new(vec![]);
        let dataset = Dataset::new(collection)
            .only(Vec::<String>::new())
            .sort(SortSpec::new().by("name", "sideways"));

        assert!(dataset.options().is_empty());
        dataset.view().unwrap();

        assert_eq!(entries(&log), vec!["find {}".to_string()]);
    }

    #[tokio::test]
    async fn unsupported_options_are_skipped() {
        let (collection, log) = FakeCollection::<LimitOnly>::new(vec![]);
        let dataset = Dataset::new(collection)
            .only(["name"])
            .sort(SortSpec::new().desc("name"))
            .limit(3)
            .skip(1);

        dataset.view().unwrap();

        assert_eq!(entries(&log), vec!["find {}".to_string(), "limit 3".to_string()]);
    }

    #[tokio::test]
    async fn strict_datasets_reject_unsupported_options() {
        let (collection, _log) = FakeCollection::<LimitOnly>::new(vec![]);
        let dataset = Dataset::new(collection)
            .strict(true)
            .limit(3)
            .sort(SortSpec::new().desc("name"));

        match dataset.to_list().await {
            Err(DatasetError::UnsupportedOption(op)) => assert_eq!(op, ViewOp::Sort),
            other => panic!("unexpected result: {:?}", other),
        }

        assert!(dataset.strict(false).to_list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn chaining_is_order_independent() {
        let (collection, _log) = FakeCollection::<Full>::new(vec![]);
        let base = Dataset::new(collection);

        let left = base
            .filter(doc! { "name": "Jane" })
            .only(["name"])
            .limit(5);
        let right = base
            .limit(5)
            .only(["name"])
            .filter(doc! { "name": "Jane" });
        let direct = base
            .with_selector(doc! { "name": "Jane" })
            .with_options(ViewOptions {
                projection: Some(doc! { "name": 1 }),
                limit: Some(5),
                ..ViewOptions::default()
            });

        assert_eq!(left.selector(), right.selector());
        assert_eq!(left.options(), right.options());
        assert_eq!(left.selector(), direct.selector());
        assert_eq!(left.options(), direct.options());
    }

    #[tokio::test]
    async fn derived_datasets_do_not_alias() {
        let (collection, _log) = FakeCollection::<Full>::new(vec![doc! { "name": "Jane" }]);
        let base = Dataset::new(collection).filter(doc! { "active": true });

        let first = base.limit(1).sort(SortSpec::new().asc("name"));
        let second = base.skip(4).only(["email"]);

        first.to_list().await.unwrap();
        second.to_list().await.unwrap();

        assert_eq!(base.selector(), &doc! { "active": true });
        assert!(base.options().is_empty());
        assert_eq!(first.options().skip, None);
        assert_eq!(first.options().projection, None);
        assert_eq!(second.options().limit, None);
        assert_eq!(second.options().sort, None);
        assert!(Arc::ptr_eq(first.collection(), second.collection()));
    }

    #[tokio::test]
    async fn empty_match_yields_empty_list() {
        let (collection, _log) = FakeCollection::<Full>::new(vec![]);
        let dataset = Dataset::new(collection).filter(doc! { "name": "Nobody" });

        assert_eq!(dataset.to_list().await.unwrap(), Vec::<Document>::new());
        assert_eq!(dataset.first().await.unwrap(), None);
        assert!(matches!(dataset.one().await, Err(DatasetError::NoResults)));
    }

    #[tokio::test]
    async fn for_each_visits_in_cursor_order() {
        let documents = vec![doc! { "n": 1 }, doc! { "n": 2 }, doc! { "n": 3 }];
        let (collection, _log) = FakeCollection::<Full>::new(documents.clone());
        let mut seen = Vec::new();

        Dataset::new(collection)
            .for_each(|document| seen.push(document))
            .await
            .unwrap();

        assert_eq!(seen, documents);
    }

    #[tokio::test]
    async fn one_rejects_multiple_matches() {
        let (collection, _log) = FakeCollection::<Full>::new(vec![doc! { "n": 1 }, doc! { "n": 2 }]);

        assert!(matches!(
            Dataset::new(collection).one().await,
            Err(DatasetError::TooManyResults(2))
        ));
    }

    #[tokio::test]
    async fn insert_bypasses_the_view() {
        let (collection, log) = FakeCollection::<Full>::new(vec![]);
        let outcome = Dataset::new(collection)
            .filter(doc! { "name": "Jane" })
            .limit(1)
            .insert_one(doc! { "_id": 7, "name": "Joe" })
            .await
            .unwrap();

        assert_eq!(outcome.inserted_id, Bson::Int32(7));
        assert_eq!(
            entries(&log),
            vec![format!("insert {}", doc! { "_id": 7, "name": "Joe" })]
        );
    }

    #[tokio::test]
    async fn mutations_run_on_the_resolved_view() {
        let (collection, log) = FakeCollection::<Full>::new(vec![doc! { "n": 1 }, doc! { "n": 2 }]);
        let dataset = Dataset::new(collection).by_pk(1).limit(2);

        let updated = dataset
            .update_many(doc! { "$set": { "seen": true } })
            .await
            .unwrap();
        let deleted = dataset.delete_many().await.unwrap();

        assert_eq!(updated.matched_count, 2);
        assert_eq!(deleted.deleted_count, 2);
        assert_eq!(
            entries(&log),
            vec![
                format!("find {}", doc! { "_id": 1 }),
                "limit 2".to_string(),
                format!("update {}", doc! { "$set": { "seen": true } }),
                format!("find {}", doc! { "_id": 1 }),
                "limit 2".to_string(),
                "delete".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn try_sort_reports_invalid_directions() {
        let (collection, _log) = FakeCollection::<Full>::new(vec![]);
        let dataset = Dataset::new(collection);

        assert!(matches!(
            dataset.try_sort(SortSpec::new().by("name", "up")),
            Err(DatasetError::InvalidSortDirection { .. })
        ));

        let sorted = dataset
            .try_sort(SortSpec::new().desc("name"))
            .unwrap();
        assert_eq!(sorted.options().sort, Some(doc! { "name": -1 }));
    }

    #[tokio::test]
    async fn raw_sort_documents_are_normalized() {
        let (collection, _log) = FakeCollection::<Full>::new(vec![]);
        let dataset = Dataset::new(collection).order(doc! { "name": "asc", "age": -1, "bad": "x" });

        assert_eq!(dataset.options().sort, Some(doc! { "name": 1, "age": -1 }));
    }
}

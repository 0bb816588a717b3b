//! Capability interfaces a driver implements to back a [`Dataset`](crate::dataset::Dataset).
//!
//! A driver exposes three layers:
//!
//! - [`Database`]: hands out collection handles and enumerates collection names.
//! - [`Collection`]: opens views over a selector and inserts documents.
//! - A view type implementing [`FindView`] (query options and enumeration) and
//!   [`WriteView`] (bulk mutation of whatever the view matches).
//!
//! Views declare which query options they understand through
//! [`FindView::CAPABILITIES`]. The dataset consults that constant before applying an
//! option, so a view only has to implement the builder methods it actually supports.
//!
//! # Example
//!
//! ```ignore
//! use docmapper::backend::{Collection, FindView};
//! use bson::doc;
//!
//! let view = collection
//!     .find(doc! { "name": "Jane" })
//!     .sort(doc! { "email": 1 })
//!     .limit(10);
//! let cursor = view.cursor().await?;
//! ```

use std::fmt::{self, Debug};

use async_trait::async_trait;
use bson::{Bson, Document};
use futures::stream::BoxStream;

use crate::{builder::combine_selectors, error::DatasetResult};

/// A lazily consumed stream of documents produced by a view.
pub type DocumentStream = BoxStream<'static, DatasetResult<Document>>;

/// The query options a view may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewOp {
    /// Inclusion projection.
    Projection,
    /// Field exclusion.
    Exclusion,
    /// Sort order.
    Sort,
    /// Maximum number of results.
    Limit,
    /// Number of leading results to discard.
    Skip,
}

impl ViewOp {
    /// Every option, in the order a dataset applies them.
    pub const CANONICAL_ORDER: [ViewOp; 5] = [
        ViewOp::Projection,
        ViewOp::Exclusion,
        ViewOp::Sort,
        ViewOp::Limit,
        ViewOp::Skip,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ViewOp::Projection => "projection",
            ViewOp::Exclusion => "exclusion",
            ViewOp::Sort => "sort",
            ViewOp::Limit => "limit",
            ViewOp::Skip => "skip",
        }
    }
}

impl fmt::Display for ViewOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The set of [`ViewOp`]s a view type supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewCapabilities {
    pub projection: bool,
    pub exclusion: bool,
    pub sort: bool,
    pub limit: bool,
    pub skip: bool,
}

impl ViewCapabilities {
    /// Supports every option.
    pub const ALL: Self = Self {
        projection: true,
        exclusion: true,
        sort: true,
        limit: true,
        skip: true,
    };

    /// Supports no option.
    pub const NONE: Self = Self {
        projection: false,
        exclusion: false,
        sort: false,
        limit: false,
        skip: false,
    };

    /// Returns whether `op` is supported.
    pub const fn supports(&self, op: ViewOp) -> bool {
        match op {
            ViewOp::Projection => self.projection,
            ViewOp::Exclusion => self.exclusion,
            ViewOp::Sort => self.sort,
            ViewOp::Limit => self.limit,
            ViewOp::Skip => self.skip,
        }
    }
}

/// Outcome of inserting a single document.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertOutcome {
    /// The `_id` of the inserted document.
    pub inserted_id: Bson,
}

/// Outcome of a bulk update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateOutcome {
    /// Number of documents the view matched.
    pub matched_count: u64,
    /// Number of documents actually changed.
    pub modified_count: u64,
}

/// Outcome of a bulk delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeleteOutcome {
    /// Number of documents removed.
    pub deleted_count: u64,
}

/// A read view over a collection: a selector plus query options.
///
/// Builder methods consume and return the view. The provided implementations leave
/// the view unchanged; implementors override the ones listed in
/// [`CAPABILITIES`](FindView::CAPABILITIES).
#[async_trait]
pub trait FindView: Sized + Send {
    /// The options this view type understands.
    const CAPABILITIES: ViewCapabilities = ViewCapabilities::NONE;

    /// Restricts returned fields to the inclusion projection.
    fn projection(self, _projection: Document) -> Self {
        self
    }

    /// Removes the given fields from returned documents.
    fn exclude(self, _fields: Vec<String>) -> Self {
        self
    }

    /// Orders results by a normalized sort document.
    fn sort(self, _sort: Document) -> Self {
        self
    }

    /// Caps the number of results.
    fn limit(self, _limit: u64) -> Self {
        self
    }

    /// Discards leading results.
    fn skip(self, _skip: u64) -> Self {
        self
    }

    /// Executes the view and returns a cursor over the matched documents.
    async fn cursor(self) -> DatasetResult<DocumentStream>;
}

/// Bulk mutation of the documents a view matches.
#[async_trait]
pub trait WriteView: Send {
    /// Applies `update` to every matched document.
    async fn update_many(self, update: Document) -> DatasetResult<UpdateOutcome>;

    /// Deletes every matched document.
    async fn delete_many(self) -> DatasetResult<DeleteOutcome>;
}

/// A handle on a single named collection.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; datasets share them behind an `Arc`.
#[async_trait]
pub trait Collection: Send + Sync + Debug {
    /// The view type opened by [`find`](Collection::find).
    type View: FindView + WriteView;

    /// Returns the collection name.
    fn name(&self) -> &str;

    /// Opens a view over the documents matching `selector`.
    fn find(&self, selector: Document) -> Self::View;

    /// Inserts one document, bypassing any view.
    async fn insert_one(&self, document: Document) -> DatasetResult<InsertOutcome>;

    /// Narrows `current` with `narrowing`.
    ///
    /// Drivers with their own selector algebra can override this. The default is
    /// [`combine_selectors`].
    fn merge_selector(&self, current: &Document, narrowing: Document) -> Document {
        combine_selectors(current, narrowing)
    }
}

/// A database exposing named collections.
#[async_trait]
pub trait Database: Send + Sync + Debug {
    type Collection: Collection;

    /// Returns a handle on the named collection. The collection need not exist yet.
    fn collection(&self, name: &str) -> Self::Collection;

    /// Lists the names of all existing collections.
    async fn list_collection_names(&self) -> DatasetResult<Vec<String>>;

    /// Releases driver resources.
    ///
    /// The default implementation is a no-op.
    async fn shutdown(self) -> DatasetResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

/// Factory for [`Database`] implementations.
#[async_trait]
pub trait DatabaseBuilder {
    type Database: Database;

    async fn build(self) -> DatasetResult<Self::Database>;
}

//! Convenient re-exports of commonly used types from docmapper.
//!
//! ```ignore
//! use docmapper::prelude::*;
//! ```

pub use docmapper_core::{
    backend::{
        Collection, Database, DatabaseBuilder, DeleteOutcome, DocumentStream, FindView,
        InsertOutcome, UpdateOutcome, ViewCapabilities, ViewOp, WriteView,
    },
    builder::{
        ASCENDING, DESCENDING, SortDirection, SortSpec, SortValue, build_projection,
        combine_selectors, normalize_sort, try_normalize_sort,
    },
    config::{ConnectionUri, RepositoryConfig},
    dataset::{Dataset, ViewOptions},
    error::{DatasetError, DatasetResult},
    model::{Model, ModelExt},
    relation::Relation,
    repository::Repository,
};

//! Main docmapper crate: a thin, chainable query layer over document databases.
//!
//! This crate is the primary entry point. It re-exports the core types and provides
//! access to the storage backends.
//!
//! # Features
//!
//! - **Immutable datasets** - Chain selectors, projections, sorting and paging without side effects
//! - **Backend capabilities** - Options a driver cannot apply are skipped, or rejected in strict mode
//! - **Typed relations** - Decode results into Serde models
//! - **Multiple backends** - In-memory and MongoDB
//!
//! # Quick Start
//!
//! ```ignore
//! use docmapper::{prelude::*, memory::InMemoryDatabase};
//! use docmapper::bson::doc;
//!
//! #[tokio::main]
//! async fn main() -> DatasetResult<()> {
//!     let mut repository = Repository::new(InMemoryDatabase::new());
//!     let users = repository.dataset("users");
//!
//!     users.insert_one(doc! { "name": "Jane", "email": "jane@doe.org" }).await?;
//!     users.insert_one(doc! { "name": "Joe", "email": "joe@doe.org" }).await?;
//!
//!     let names = users
//!         .sort(SortSpec::new().asc("name"))
//!         .only(["name"])
//!         .without(["_id"])
//!         .to_list()
//!         .await?;
//!
//!     assert_eq!(names, vec![doc! { "name": "Jane" }, doc! { "name": "Joe" }]);
//!
//!     repository.shutdown().await
//! }
//! ```
//!
//! # Typed Relations
//!
//! ```ignore
//! use docmapper::{prelude::*, memory::InMemoryDatabase};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! pub struct User {
//!     pub name: String,
//! }
//!
//! impl Model for User {
//!     fn collection_name() -> &'static str { "users" }
//! }
//!
//! let mut repository = Repository::new(InMemoryDatabase::new());
//! let users = repository.relation::<User>();
//!
//! users.insert(&User { name: "Jane".into() }).await?;
//! let jane = users.filter(doc! { "name": "Jane" }).one().await?;
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing
//! - [`mongodb`] - MongoDB backend (requires `mongodb` feature)

pub mod prelude;

pub use docmapper_core::{backend, builder, config, dataset, error, model, relation, repository};

// Re-export BSON types for convenience
pub use bson;

/// In-memory backend implementations.
pub mod memory {
    pub use docmapper_memory::{InMemoryCollection, InMemoryDatabase, InMemoryDatabaseBuilder, InMemoryView};
}

/// MongoDB backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docmapper_mongodb::{MongoDbCollection, MongoDbDatabase, MongoDbDatabaseBuilder, MongoDbView};
}

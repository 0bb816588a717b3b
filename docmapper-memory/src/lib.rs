//! In-memory database backend for docmapper.
//!
//! This crate implements the docmapper capability traits over plain BSON documents
//! kept in memory behind an async-aware read-write lock. It is meant for development
//! and tests.
//!
//! # Features
//!
//! - **Selectors** - Implicit equality, dotted paths, comparison and logical operators
//! - **Every view option** - Projection, exclusion, multi-key sort, skip and limit
//! - **Bulk writes** - `$set`, `$unset` and `$inc` updates, deletes over a view
//!
//! # Quick Start
//!
//! ```ignore
//! use docmapper::{prelude::*, memory::InMemoryDatabase};
//! use bson::doc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let database = InMemoryDatabase::builder().build().await?;
//!     let users = Dataset::new(database.collection("users"));
//!
//!     users.insert_one(doc! { "name": "Jane" }).await?;
//!     users.insert_one(doc! { "name": "Joe" }).await?;
//!
//!     let names = users
//!         .sort(SortSpec::new().desc("name"))
//!         .only(["name"])
//!         .without(["_id"])
//!         .to_list()
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmapper_memory;

mod evaluator;
mod transform;

pub mod store;

pub use store::{InMemoryCollection, InMemoryDatabase, InMemoryDatabaseBuilder, InMemoryView};

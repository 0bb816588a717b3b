//! MongoDB backend for docmapper.
//!
//! This crate maps the docmapper capability traits onto the official MongoDB driver:
//! views become `find` calls with [`FindOptions`](mongodb::options::FindOptions),
//! bulk writes become `update_many` / `delete_many` on the view's selector.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! docmapper = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Connection
//!
//! Databases are addressed by a short `host[:port]/database` URI, see
//! [`ConnectionUri`](docmapper_core::config::ConnectionUri).
//!
//! # Example
//!
//! ```ignore
//! use docmapper::{prelude::*, mongodb::MongoDbDatabase};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let database = MongoDbDatabase::from_uri("localhost:27017/app").await?;
//!     let users = Dataset::new(database.collection("users"));
//!
//!     let count = users.to_list().await?.len();
//!     database.shutdown().await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmapper_mongodb;

pub mod store;

pub use store::{MongoDbCollection, MongoDbDatabase, MongoDbDatabaseBuilder, MongoDbView};

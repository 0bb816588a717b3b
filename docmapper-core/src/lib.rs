//! A thin dataset adapter that maps a chainable query DSL onto document database drivers.
//!
//! This crate is the core of the docmapper project and provides:
//!
//! - **Criteria builder** ([`builder`]) - Projection and sort document construction
//! - **Capability interfaces** ([`backend`]) - Traits a driver implements to back datasets
//! - **Datasets** ([`dataset`]) - The immutable, chainable query composer
//! - **Relations** ([`relation`]) - Datasets decoding into typed models
//! - **Models** ([`model`]) - Serde types bound to collections
//! - **Repositories** ([`repository`]) - Named dataset registries over a database
//! - **Configuration** ([`config`]) - Connection URIs and repository settings
//! - **Error handling** ([`error`]) - Error types and result types
//!
//! # Example
//!
//! ```ignore
//! use docmapper::prelude::*;
//! use bson::doc;
//!
//! let users = Dataset::new(database.collection("users"));
//!
//! let names = users
//!     .sort(SortSpec::new().asc("name"))
//!     .only(["name"])
//!     .without(["_id"])
//!     .to_list()
//!     .await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmapper_core;

pub mod backend;
pub mod builder;
pub mod config;
pub mod dataset;
pub mod error;
pub mod model;
pub mod relation;
pub mod repository;

//! Typed models mapped onto collection documents.
//!
//! A [`Model`] is any serde type bound to a collection name. [`ModelExt`] is implemented
//! for every model and converts it to and from BSON documents.
//!
//! # Example
//!
//! ```ignore
//! use docmapper::model::Model;
//! use bson::oid::ObjectId;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! pub struct User {
//!     #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
//!     pub id: Option<ObjectId>,
//!     pub name: String,
//! }
//!
//! impl Model for User {
//!     fn collection_name() -> &'static str {
//!         "users"
//!     }
//! }
//! ```

use bson::{Bson, Document, de::deserialize_from_bson, ser::serialize_to_bson};
use serde::{Serialize, de::DeserializeOwned};

use crate::error::{DatasetError, DatasetResult};

/// A serde type stored in a named collection.
pub trait Model: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Returns the name of the collection this model lives in.
    fn collection_name() -> &'static str;
}

/// Conversion helpers available on every [`Model`].
pub trait ModelExt: Model {
    /// Serializes this model into a BSON document.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or the model does not serialize to a document.
    fn to_document(&self) -> DatasetResult<Document>;

    /// Deserializes a model from a BSON document.
    fn from_document(document: Document) -> DatasetResult<Self>;
}

impl<M: Model> ModelExt for M {
    fn to_document(&self) -> DatasetResult<Document> {
        match serialize_to_bson(self)? {
            Bson::Document(document) => Ok(document),
            other => Err(DatasetError::Serialization(format!(
                "{} serialized to {:?}, expected a document",
                M::collection_name(),
                other.element_type()
            ))),
        }
    }

    fn from_document(document: Document) -> DatasetResult<Self> {
        Ok(deserialize_from_bson(Bson::Document(document))?)
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct User {
        name: String,
        email: String,
    }

    impl Model for User {
        fn collection_name() -> &'static str {
            "users"
        }
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct Scalar(i32);

    impl Model for Scalar {
        fn collection_name() -> &'static str {
            "scalars"
        }
    }

    #[test]
    fn models_convert_to_documents() {
        let user = User { name: "Jane".into(), email: "jane@doe.org".into() };
        let document = user.to_document().unwrap();

        assert_eq!(document, doc! { "name": "Jane", "email": "jane@doe.org" });
        assert_eq!(User::from_document(document).unwrap(), user);
    }

    #[test]
    fn non_document_models_are_rejected() {
        assert!(matches!(
            Scalar(3).to_document(),
            Err(DatasetError::Serialization(_))
        ));
    }

    #[test]
    fn missing_fields_fail_to_decode() {
        assert!(matches!(
            User::from_document(doc! { "name": "Jane" }),
            Err(DatasetError::Serialization(_))
        ));
    }
}

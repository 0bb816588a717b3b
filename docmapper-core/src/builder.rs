//! Conversion of user-facing query hints into driver-shaped documents.
//!
//! Everything in this module is a pure function over [`bson::Document`]s:
//!
//! - [`build_projection`] turns a list of field names into an inclusion projection.
//! - [`normalize_sort`] turns a [`SortSpec`] into a sort document using the driver's
//!   integer direction codes, silently dropping entries it cannot interpret.
//! - [`try_normalize_sort`] is the strict counterpart that reports the first such entry.
//! - [`combine_selectors`] narrows one selector with another.
//!
//! # Example
//!
//! ```ignore
//! use docmapper::builder::{SortSpec, build_projection, normalize_sort};
//!
//! let projection = build_projection(["name", "email"]);
//! let sort = normalize_sort(&SortSpec::new().asc("name").by("email", "desc"));
//! ```

use std::{fmt, str::FromStr};

use bson::{Bson, Document};
use thiserror::Error;

use crate::error::{DatasetError, DatasetResult};

/// The driver's integer code for ascending order.
pub const ASCENDING: i32 = 1;
/// The driver's integer code for descending order.
pub const DESCENDING: i32 = -1;

/// Symbolic sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order (A to Z, 0 to 9, earliest to latest).
    Ascending,
    /// Descending order (Z to A, 9 to 0, latest to earliest).
    Descending,
}

impl SortDirection {
    /// Returns the driver's integer code for this direction.
    pub fn code(self) -> i32 {
        match self {
            SortDirection::Ascending => ASCENDING,
            SortDirection::Descending => DESCENDING,
        }
    }
}

/// Returned when a token is not one of the recognized direction names.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unrecognized sort direction: {0}")]
pub struct ParseSortDirectionError(pub String);

impl FromStr for SortDirection {
    type Err = ParseSortDirectionError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        match token {
            "asc" | "ascending" => Ok(SortDirection::Ascending),
            "desc" | "descending" => Ok(SortDirection::Descending),
            other => Err(ParseSortDirectionError(other.to_string())),
        }
    }
}

/// A raw, not yet normalized, sort direction as supplied by a caller.
#[derive(Debug, Clone, PartialEq)]
pub enum SortValue {
    /// A symbolic direction.
    Direction(SortDirection),
    /// A raw integer. Only the driver codes `1` and `-1` are valid.
    Code(i64),
    /// A textual token such as `"asc"` or `"descending"`.
    Token(String),
    /// Any other value.
    Unrecognized(Bson),
}

impl SortValue {
    /// Returns the driver code for this value, or `None` when it cannot be normalized.
    pub fn to_code(&self) -> Option<i32> {
        match self {
            SortValue::Code(code) if *code == ASCENDING as i64 || *code == DESCENDING as i64 => {
                Some(*code as i32)
            }
            SortValue::Direction(direction) => Some(direction.code()),
            SortValue::Token(token) => token
                .parse::<SortDirection>()
                .ok()
                .map(SortDirection::code),
            _ => None,
        }
    }
}

impl fmt::Display for SortValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortValue::Direction(direction) => write!(f, "{:?}", direction),
            SortValue::Code(code) => write!(f, "{}", code),
            SortValue::Token(token) => write!(f, "{:?}", token),
            SortValue::Unrecognized(value) => write!(f, "{}", value),
        }
    }
}

impl From<SortDirection> for SortValue {
    fn from(direction: SortDirection) -> Self {
        SortValue::Direction(direction)
    }
}

impl From<i32> for SortValue {
    fn from(code: i32) -> Self {
        SortValue::Code(code as i64)
    }
}

impl From<i64> for SortValue {
    fn from(code: i64) -> Self {
        SortValue::Code(code)
    }
}

impl From<&str> for SortValue {
    fn from(token: &str) -> Self {
        SortValue::Token(token.to_string())
    }
}

impl From<String> for SortValue {
    fn from(token: String) -> Self {
        SortValue::Token(token)
    }
}

impl From<Bson> for SortValue {
    fn from(value: Bson) -> Self {
        match value {
            Bson::Int32(code) => SortValue::Code(code as i64),
            Bson::Int64(code) => SortValue::Code(code),
            // Integral doubles are equal to the driver codes they spell.
            Bson::Double(code) if code == ASCENDING as f64 || code == DESCENDING as f64 => {
                SortValue::Code(code as i64)
            }
            Bson::String(token) => SortValue::Token(token),
            other => SortValue::Unrecognized(other),
        }
    }
}

/// An ordered list of `(field, direction)` pairs.
///
/// Order matters: the first entry is the primary sort key.
///
/// # Example
///
/// ```ignore
/// use docmapper::builder::{SortSpec, SortDirection};
///
/// let spec = SortSpec::new()
///     .asc("name")
///     .by("age", -1)
///     .by("email", SortDirection::Descending);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SortSpec {
    entries: Vec<(String, SortValue)>,
}

impl SortSpec {
    /// Creates an empty sort specification.
    pub fn new() -> Self {
        SortSpec { entries: Vec::new() }
    }

    /// Appends an ascending entry for `field`.
    pub fn asc(self, field: impl Into<String>) -> Self {
        self.by(field, SortDirection::Ascending)
    }

    /// Appends a descending entry for `field`.
    pub fn desc(self, field: impl Into<String>) -> Self {
        self.by(field, SortDirection::Descending)
    }

    /// Appends an entry for `field` with an arbitrary raw direction.
    pub fn by(mut self, field: impl Into<String>, value: impl Into<SortValue>) -> Self {
        self.entries.push((field.into(), value.into()));
        self
    }

    /// Builds a specification from a raw sort document such as `{ "name": 1, "age": "desc" }`.
    pub fn from_document(document: &Document) -> Self {
        document
            .iter()
            .map(|(field, value)| (field.clone(), SortValue::from(value.clone())))
            .collect()
    }

    /// Iterates the entries in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SortValue)> {
        self.entries
            .iter()
            .map(|(field, value)| (field.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for SortSpec
where
    K: Into<String>,
    V: Into<SortValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        SortSpec {
            entries: iter
                .into_iter()
                .map(|(field, value)| (field.into(), value.into()))
                .collect(),
        }
    }
}

impl From<Document> for SortSpec {
    fn from(document: Document) -> Self {
        SortSpec::from_document(&document)
    }
}

/// Builds an inclusion projection marking every field with `1`.
///
/// Field order follows the input. Repeated fields collapse onto their first position.
pub fn build_projection<I, S>(fields: I) -> Document
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut projection = Document::new();

    for field in fields {
        projection.insert(field.into(), Bson::Int32(1));
    }

    projection
}

/// Normalizes a sort specification into a driver sort document.
///
/// Raw codes `1`/`-1` pass through, symbolic directions and recognized tokens are
/// substituted with their codes, and every other entry is dropped without error.
pub fn normalize_sort(spec: &SortSpec) -> Document {
    let mut sort = Document::new();

    for (field, value) in spec.iter() {
        if let Some(code) = value.to_code() {
            sort.insert(field, Bson::Int32(code));
        }
    }

    sort
}

/// Strict counterpart of [`normalize_sort`].
///
/// # Errors
///
/// Returns [`DatasetError::InvalidSortDirection`] for the first entry that
/// [`normalize_sort`] would have dropped.
pub fn try_normalize_sort(spec: &SortSpec) -> DatasetResult<Document> {
    let mut sort = Document::new();

    for (field, value) in spec.iter() {
        match value.to_code() {
            Some(code) => {
                sort.insert(field, Bson::Int32(code));
            }
            None => {
                return Err(DatasetError::InvalidSortDirection {
                    field: field.to_string(),
                    value: value.to_string(),
                });
            }
        }
    }

    Ok(sort)
}

/// Returns the entries [`normalize_sort`] drops.
pub fn rejected_sort_entries(spec: &SortSpec) -> Vec<(String, SortValue)> {
    spec.iter()
        .filter(|(_, value)| value.to_code().is_none())
        .map(|(field, value)| (field.to_string(), value.clone()))
        .collect()
}

/// Narrows `current` with `narrowing`.
///
/// Disjoint selectors are merged key by key. When both constrain the same key they are
/// wrapped in `$and` so that neither constraint is lost.
pub fn combine_selectors(current: &Document, narrowing: Document) -> Document {
    if current.is_empty() {
        return narrowing;
    }
    if narrowing.is_empty() {
        return current.clone();
    }

    if narrowing.keys().any(|key| current.contains_key(key)) {
        let mut combined = Document::new();
        combined.insert(
            "$and",
            Bson::Array(vec![
                Bson::Document(current.clone()),
                Bson::Document(narrowing),
            ]),
        );
        return combined;
    }

    let mut merged = current.clone();
    for (key, value) in narrowing {
        merged.insert(key, value);
    }
    merged
}

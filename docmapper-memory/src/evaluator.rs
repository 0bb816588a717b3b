//! Selector evaluation and ordering for in-memory documents.
//!
//! Selectors use the driver's query document shape. Supported:
//!
//! - implicit equality (`{ "name": "Jane" }`), matching array members too
//! - dotted paths (`{ "address.city": "Oslo" }`)
//! - field operators `$eq $ne $gt $gte $lt $lte $in $nin $exists $not`
//! - top-level `$and $or $nor`
//!
//! Anything else is rejected with [`DatasetError::InvalidSelector`].

use std::{cmp::Ordering, collections::HashMap};

use bson::{Bson, Document, datetime::DateTime, oid::ObjectId};

use docmapper_core::error::{DatasetError, DatasetResult};

/// Type-erased, comparable representation of BSON values.
///
/// Numbers of every width are normalized to `f64`.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Number(f64),
    String(&'a str),
    Map(HashMap<&'a str, Comparable<'a>>),
    Array(Vec<Comparable<'a>>),
    ObjectId(ObjectId),
    Bool(bool),
    DateTime(DateTime),
    /// Types without a comparison (binary, regex, code, ...).
    Opaque,
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Bson::Document(doc) => Comparable::Map(
                doc
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<HashMap<_, _>>()
            ),
            _ => Comparable::Opaque,
        }
    }
}

impl<'a> Comparable<'a> {
    /// Position of the value's type in the driver's cross-type sort order.
    fn rank(&self) -> u8 {
        match self {
            Comparable::Null => 1,
            Comparable::Number(_) => 2,
            Comparable::String(_) => 3,
            Comparable::Map(_) => 4,
            Comparable::Array(_) => 5,
            Comparable::ObjectId(_) => 7,
            Comparable::Bool(_) => 8,
            Comparable::DateTime(_) => 9,
            Comparable::Opaque => 12,
        }
    }

    /// Total order used for sorting: by type rank first, then by value.
    pub(crate) fn sort_cmp(&self, other: &Self) -> Ordering {
        self.rank()
            .cmp(&other.rank())
            .then_with(|| self.partial_cmp(other).unwrap_or(Ordering::Equal))
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => Some(Ordering::Equal),
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Resolves a dotted path inside `document`. Numeric segments index into arrays.
pub(crate) fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = match current {
            Bson::Document(inner) => inner.get(segment)?,
            Bson::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(current)
}

/// Returns whether `document` satisfies `selector`.
pub(crate) fn matches(document: &Document, selector: &Document) -> DatasetResult<bool> {
    for (key, condition) in selector {
        let matched = match key.as_str() {
            "$and" => {
                let mut all = true;
                for sub in sub_selectors(key, condition)? {
                    if !matches(document, sub)? {
                        all = false;
                        break;
                    }
                }
                all
            }
            "$or" => {
                let mut any = false;
                for sub in sub_selectors(key, condition)? {
                    if matches(document, sub)? {
                        any = true;
                        break;
                    }
                }
                any
            }
            "$nor" => {
                let mut none = true;
                for sub in sub_selectors(key, condition)? {
                    if matches(document, sub)? {
                        none = false;
                        break;
                    }
                }
                none
            }
            operator if operator.starts_with('$') => {
                return Err(DatasetError::InvalidSelector(format!(
                    "unsupported top-level operator {}",
                    operator
                )));
            }
            path => matches_field(lookup(document, path), condition)?,
        };

        if !matched {
            return Ok(false);
        }
    }

    Ok(true)
}

/// Unpacks the operand of `$and`, `$or` and `$nor`.
fn sub_selectors<'a>(operator: &str, value: &'a Bson) -> DatasetResult<Vec<&'a Document>> {
    let invalid = || DatasetError::InvalidSelector(format!("{} expects a non-empty array of documents", operator));

    match value {
        Bson::Array(items) if !items.is_empty() => items
            .iter()
            .map(|item| item.as_document().ok_or_else(invalid))
            .collect(),
        _ => Err(invalid()),
    }
}

fn is_operator_document(document: &Document) -> bool {
    document
        .keys()
        .next()
        .is_some_and(|key| key.starts_with('$'))
}

fn matches_field(value: Option<&Bson>, condition: &Bson) -> DatasetResult<bool> {
    match condition {
        Bson::Document(operators) if is_operator_document(operators) => {
            for (operator, operand) in operators {
                if !apply_operator(value, operator, operand)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        expected => Ok(equals(value, expected)),
    }
}

fn equals(value: Option<&Bson>, expected: &Bson) -> bool {
    let expected = Comparable::from(expected);

    match value {
        None => expected == Comparable::Null,
        Some(array @ Bson::Array(items)) => {
            Comparable::from(array) == expected
                || items
                    .iter()
                    .any(|item| Comparable::from(item) == expected)
        }
        Some(value) => Comparable::from(value) == expected,
    }
}

fn compare(value: Option<&Bson>, operand: &Bson, accept: impl Fn(Ordering) -> bool) -> bool {
    let operand = Comparable::from(operand);
    let check = |candidate: &Bson| {
        Comparable::from(candidate)
            .partial_cmp(&operand)
            .is_some_and(&accept)
    };

    match value {
        None => false,
        Some(Bson::Array(items)) => items.iter().any(check),
        Some(value) => check(value),
    }
}

fn truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(flag) => *flag,
        Bson::Int32(n) => *n != 0,
        Bson::Int64(n) => *n != 0,
        Bson::Double(n) => *n != 0.0,
        Bson::Null => false,
        _ => true,
    }
}

fn apply_operator(value: Option<&Bson>, operator: &str, operand: &Bson) -> DatasetResult<bool> {
    match operator {
        "$eq" => Ok(equals(value, operand)),
        "$ne" => Ok(!equals(value, operand)),
        "$gt" => Ok(compare(value, operand, |ordering| ordering == Ordering::Greater)),
        "$gte" => Ok(compare(value, operand, |ordering| ordering != Ordering::Less)),
        "$lt" => Ok(compare(value, operand, |ordering| ordering == Ordering::Less)),
        "$lte" => Ok(compare(value, operand, |ordering| ordering != Ordering::Greater)),
        "$in" | "$nin" => {
            let candidates = operand.as_array().ok_or_else(|| {
                DatasetError::InvalidSelector(format!("{} expects an array", operator))
            })?;
            let found = candidates
                .iter()
                .any(|candidate| equals(value, candidate));

            Ok(if operator == "$in" { found } else { !found })
        }
        "$exists" => Ok(value.is_some() == truthy(operand)),
        "$not" => match operand {
            Bson::Document(inner) if is_operator_document(inner) => {
                Ok(!matches_field(value, operand)?)
            }
            _ => Err(DatasetError::InvalidSelector("$not expects an operator document".to_string())),
        },
        other => Err(DatasetError::InvalidSelector(format!("unsupported operator {}", other))),
    }
}

/// Orders two documents by a sort document of `field: 1 | -1` entries.
///
/// Missing fields sort as null.
pub(crate) fn compare_documents(left: &Document, right: &Document, sort: &Document) -> Ordering {
    for (field, direction) in sort {
        let null = Bson::Null;
        let a = Comparable::from(lookup(left, field).unwrap_or(&null));
        let b = Comparable::from(lookup(right, field).unwrap_or(&null));

        let ordering = if is_descending(direction) {
            b.sort_cmp(&a)
        } else {
            a.sort_cmp(&b)
        };

        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    Ordering::Equal
}

fn is_descending(direction: &Bson) -> bool {
    match direction {
        Bson::Int32(n) => *n < 0,
        Bson::Int64(n) => *n < 0,
        Bson::Double(n) => *n < 0.0,
        _ => false,
    }
}

//! Projection and update application for in-memory documents.

use bson::{Bson, Document};

use docmapper_core::error::{DatasetError, DatasetResult};

const ID: &str = "_id";

fn is_included(marker: &Bson) -> bool {
    match marker {
        Bson::Boolean(flag) => *flag,
        Bson::Int32(n) => *n != 0,
        Bson::Int64(n) => *n != 0,
        Bson::Double(n) => *n != 0.0,
        _ => true,
    }
}

/// Shapes `document` for output.
///
/// Inclusion entries of `projection` keep only the listed fields plus `_id`; its zero
/// entries and every field of `exclusions` are removed afterwards. Both accept dotted
/// paths into embedded documents.
pub(crate) fn project(document: Document, projection: Option<&Document>, exclusions: &[String]) -> Document {
    let mut excluded = exclusions
        .iter()
        .map(String::as_str)
        .collect::<Vec<_>>();
    let mut included = Vec::new();

    if let Some(projection) = projection {
        for (field, marker) in projection {
            if is_included(marker) {
                included.push(field.as_str());
            } else {
                excluded.push(field.as_str());
            }
        }
    }

    let mut shaped = if included.is_empty() {
        document
    } else {
        included.push(ID);
        include_paths(document, &included)
    };

    for path in excluded {
        unset_path(&mut shaped, path);
    }

    shaped
}

/// Keeps the fields of `document` named by `paths`, descending into embedded
/// documents for dotted paths. Field order follows `document`.
fn include_paths(document: Document, paths: &[&str]) -> Document {
    document
        .into_iter()
        .filter_map(|(field, value)| {
            if paths.contains(&field.as_str()) {
                return Some((field, value));
            }

            let prefix = format!("{}.", field);
            let nested = paths
                .iter()
                .filter_map(|path| path.strip_prefix(prefix.as_str()))
                .collect::<Vec<_>>();

            match value {
                Bson::Document(inner) if !nested.is_empty() => {
                    Some((field, Bson::Document(include_paths(inner, &nested))))
                }
                _ => None,
            }
        })
        .collect()
}

/// Checks that `update` only uses supported operators with well-formed operands.
pub(crate) fn validate_update(update: &Document) -> DatasetResult<()> {
    if update.is_empty() {
        return Err(DatasetError::InvalidUpdate("update document is empty".to_string()));
    }

    for (operator, fields) in update {
        let fields = match (operator.as_str(), fields) {
            ("$set" | "$unset" | "$inc", Bson::Document(fields)) => fields,
            ("$set" | "$unset" | "$inc", _) => {
                return Err(DatasetError::InvalidUpdate(format!("{} expects a document", operator)));
            }
            (other, _) if other.starts_with('$') => {
                return Err(DatasetError::InvalidUpdate(format!("unsupported operator {}", other)));
            }
            (other, _) => {
                return Err(DatasetError::InvalidUpdate(format!(
                    "update documents must only contain operators, found field {}",
                    other
                )));
            }
        };

        for (path, operand) in fields {
            if path == ID || path.starts_with("_id.") {
                return Err(DatasetError::InvalidUpdate("the _id field is immutable".to_string()));
            }
            if operator == "$inc" && !matches!(operand, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_)) {
                return Err(DatasetError::InvalidUpdate(format!("$inc on {} expects a number", path)));
            }
        }
    }

    Ok(())
}

/// Applies a validated `update` to `document`. Returns whether anything changed.
pub(crate) fn apply_update(document: &mut Document, update: &Document) -> DatasetResult<bool> {
    let mut modified = false;

    for (operator, fields) in update {
        let Bson::Document(fields) = fields else {
            continue;
        };

        for (path, operand) in fields {
            modified |= match operator.as_str() {
                "$set" => set_path(document, path, operand.clone())?,
                "$unset" => unset_path(document, path),
                "$inc" => {
                    let next = match get_path(document, path) {
                        Some(current) => add(current, operand, path)?,
                        None => operand.clone(),
                    };
                    set_path(document, path, next)?
                }
                _ => false,
            };
        }
    }

    Ok(modified)
}

fn get_path<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    match path.split_once('.') {
        Some((head, rest)) => match document.get(head)? {
            Bson::Document(inner) => get_path(inner, rest),
            _ => None,
        },
        None => document.get(path),
    }
}

fn set_path(document: &mut Document, path: &str, value: Bson) -> DatasetResult<bool> {
    match path.split_once('.') {
        Some((head, rest)) => {
            if !document.contains_key(head) {
                document.insert(head, Document::new());
            }

            match document.get_mut(head) {
                Some(Bson::Document(inner)) => set_path(inner, rest, value),
                _ => Err(DatasetError::InvalidUpdate(format!("cannot set {} inside a non-document field", path))),
            }
        }
        None => Ok(document.insert(path, value.clone()).as_ref() != Some(&value)),
    }
}

fn unset_path(document: &mut Document, path: &str) -> bool {
    match path.split_once('.') {
        Some((head, rest)) => match document.get_mut(head) {
            Some(Bson::Document(inner)) => unset_path(inner, rest),
            _ => false,
        },
        None => document.remove(path).is_some(),
    }
}

fn add(current: &Bson, operand: &Bson, path: &str) -> DatasetResult<Bson> {
    let overflow = || DatasetError::InvalidUpdate(format!("$inc on {} overflows a 64-bit integer", path));

    Ok(match (current, operand) {
        (Bson::Int32(a), Bson::Int32(b)) => a
            .checked_add(*b)
            .map(Bson::Int32)
            .unwrap_or(Bson::Int64(*a as i64 + *b as i64)),
        (Bson::Int32(a), Bson::Int64(b)) => Bson::Int64((*a as i64).checked_add(*b).ok_or_else(overflow)?),
        (Bson::Int64(a), Bson::Int32(b)) => Bson::Int64(a.checked_add(*b as i64).ok_or_else(overflow)?),
        (Bson::Int64(a), Bson::Int64(b)) => Bson::Int64(a.checked_add(*b).ok_or_else(overflow)?),
        (Bson::Double(a), Bson::Double(b)) => Bson::Double(a + b),
        (Bson::Double(a), Bson::Int32(b)) => Bson::Double(a + *b as f64),
        (Bson::Double(a), Bson::Int64(b)) => Bson::Double(a + *b as f64),
        (Bson::Int32(a), Bson::Double(b)) => Bson::Double(*a as f64 + b),
        (Bson::Int64(a), Bson::Double(b)) => Bson::Double(*a as f64 + b),
        _ => {
            return Err(DatasetError::InvalidUpdate(format!("cannot $inc non-numeric field {}", path)));
        }
    })
}

#[cfg(test)]
mod tests {
    use bson::doc;

    use super::*;

    #[test]
    fn inclusion_keeps_listed_fields_and_id() {
        let document = doc! { "_id": 1, "name": "Jane", "email": "jane@doe.org" };

        assert_eq!(
            project(document.clone(), Some(&doc! { "name": 1 }), &[]),
            doc! { "_id": 1, "name": "Jane" }
        );
        assert_eq!(
            project(document, Some(&doc! { "name": 1 }), &["_id".to_string()]),
            doc! { "name": "Jane" }
        );
    }

    #[test]
    fn exclusion_removes_fields() {
        let document = doc! { "_id": 1, "name": "Jane", "email": "jane@doe.org" };

        assert_eq!(
            project(document.clone(), None, &["email".to_string()]),
            doc! { "_id": 1, "name": "Jane" }
        );
        assert_eq!(
            project(document, Some(&doc! { "email": 0 }), &[]),
            doc! { "_id": 1, "name": "Jane" }
        );
    }

    #[test]
    fn projections_follow_dotted_paths() {
        let document = doc! {
            "_id": 1,
            "name": "Jane",
            "address": { "city": "Oslo", "zip": "0150" },
        };

        assert_eq!(
            project(document.clone(), Some(&doc! { "address.city": 1 }), &[]),
            doc! { "_id": 1, "address": { "city": "Oslo" } }
        );
        assert_eq!(
            project(document.clone(), None, &["address.zip".to_string()]),
            doc! { "_id": 1, "name": "Jane", "address": { "city": "Oslo" } }
        );
        assert_eq!(
            project(document, Some(&doc! { "name": 1, "address.city.street": 1 }), &["_id".to_string()]),
            doc! { "name": "Jane", "address": {} }
        );
    }

    #[test]
    fn updates_must_use_supported_operators() {
        assert!(validate_update(&doc! { "$set": { "name": "Joe" } }).is_ok());
        assert!(validate_update(&doc! { "name": "Joe" }).is_err());
        assert!(validate_update(&doc! { "$push": { "tags": "x" } }).is_err());
        assert!(validate_update(&doc! { "$set": { "_id": 2 } }).is_err());
        assert!(validate_update(&doc! { "$inc": { "age": "one" } }).is_err());
        assert!(validate_update(&doc! {}).is_err());
    }

    #[test]
    fn set_unset_and_inc_apply() {
        let mut document = doc! { "_id": 1, "name": "Jane", "age": 34, "tmp": true };
        let update = doc! {
            "$set": { "name": "Janet", "address.city": "Oslo" },
            "$unset": { "tmp": "" },
            "$inc": { "age": 1, "visits": 2 },
        };

        assert!(apply_update(&mut document, &update).unwrap());
        assert_eq!(
            document,
            doc! {
                "_id": 1,
                "name": "Janet",
                "age": 35,
                "address": { "city": "Oslo" },
                "visits": 2,
            }
        );
    }

    #[test]
    fn unchanged_documents_report_no_modification() {
        let mut document = doc! { "name": "Jane" };

        assert!(!apply_update(&mut document, &doc! { "$set": { "name": "Jane" } }).unwrap());
        assert!(!apply_update(&mut document, &doc! { "$unset": { "missing": "" } }).unwrap());
    }

    #[test]
    fn inc_overflow_is_rejected_or_widened() {
        let mut document = doc! { "big": i64::MAX, "small": i32::MAX };

        assert!(matches!(
            apply_update(&mut document, &doc! { "$inc": { "big": 1_i64 } }),
            Err(DatasetError::InvalidUpdate(_))
        ));
        assert!(matches!(
            apply_update(&mut document, &doc! { "$inc": { "big": 1 } }),
            Err(DatasetError::InvalidUpdate(_))
        ));
        assert!(apply_update(&mut document, &doc! { "$inc": { "small": 1 } }).unwrap());
        assert_eq!(document.get("small"), Some(&Bson::Int64(i32::MAX as i64 + 1)));
    }

    #[test]
    fn inc_rejects_non_numeric_targets() {
        let mut document = doc! { "name": "Jane" };

        assert!(matches!(
            apply_update(&mut document, &doc! { "$inc": { "name": 1 } }),
            Err(DatasetError::InvalidUpdate(_))
        ));
    }
}

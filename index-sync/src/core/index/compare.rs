//! Semantic equivalence of index descriptors.
//!
//! Two descriptors are equivalent when they describe the same index for migration purposes:
//! same key pattern (order and direction significant) and same identity options. `name` and
//! `background` never take part.

use super::descriptor::IndexDescriptor;
use mongodb::bson::{Bson, Document};

/// Weight the server assigns to a text field when none is given.
const DEFAULT_TEXT_WEIGHT: f64 = 1.0;

/// Pure, total and symmetric.
pub fn equivalent(a: &IndexDescriptor, b: &IndexDescriptor) -> bool {
    if a.key != b.key {
        return false;
    }

    if a.unique != b.unique || a.sparse != b.sparse || a.expire_after_seconds != b.expire_after_seconds {
        return false;
    }

    // weights only matter for text indexes; key patterns are equal here so checking one side is enough
    if a.key.has_text() && !bson_semantic_eq(&normalized_weights(a), &normalized_weights(b)) {
        return false;
    }

    bson_semantic_eq(&filter_or_empty(a), &filter_or_empty(b))
}

/// Same declared name but a different definition. Reported, never resolved.
pub fn conflicts(a: &IndexDescriptor, b: &IndexDescriptor) -> bool {
    a.name == b.name && !equivalent(a, b)
}

fn normalized_weights(descriptor: &IndexDescriptor) -> Bson {
    let weights = descriptor
        .weights
        .iter()
        .flat_map(|weights| weights.iter())
        .filter(|(_, weight)| as_number(weight) != Some(DEFAULT_TEXT_WEIGHT))
        .map(|(field, weight)| (field.clone(), weight.clone()))
        .collect::<Document>();
    Bson::Document(weights)
}

fn filter_or_empty(descriptor: &IndexDescriptor) -> Bson {
    Bson::Document(descriptor.partial_filter_expression.clone().unwrap_or_default())
}

fn as_number(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(v) => Some(f64::from(*v)),
        Bson::Int64(v) => Some(*v as f64),
        Bson::Double(v) => Some(*v),
        _ => None,
    }
}

/// Structural equality for option documents.
///
/// Documents compare as field sets (order insensitive) with recursively equal values, arrays
/// compare element-wise in order, and numbers compare by value regardless of BSON width.
pub fn bson_semantic_eq(a: &Bson, b: &Bson) -> bool {
    match (a, b) {
        (Bson::Document(left), Bson::Document(right)) => {
            left.len() == right.len()
                && left.iter().all(|(field, value)| right.get(field).is_some_and(|other| bson_semantic_eq(value, other)))
        }
        (Bson::Array(left), Bson::Array(right)) => {
            left.len() == right.len() && left.iter().zip(right).all(|(l, r)| bson_semantic_eq(l, r))
        }
        _ => match (as_number(a), as_number(b)) {
            (Some(left), Some(right)) => left == right,
            _ => a == b,
        },
    }
}

//! JSON field-map helpers
//!
//! The sync core treats a record as an opaque JSON object carrying an `id`
//! and a `band_id`. These helpers implement the two operations the core
//! needs on that shape: merging partial fields into a full record, and
//! ordering records by an arbitrary column for offline sorting.

use std::cmp::Ordering;

use serde_json::Value;

/// Merge the fields of `patch` into `record`, overwriting existing keys.
///
/// Both values are expected to be JSON objects; anything else leaves
/// `record` untouched. Merging is shallow, matching the remote store's
/// column-level update semantics.
pub fn merge_fields(record: &mut Value, patch: &Value) {
    let (Some(target), Some(fields)) = (record.as_object_mut(), patch.as_object()) else {
        return;
    };
    for (key, value) in fields {
        target.insert(key.clone(), value.clone());
    }
}

static NULL: Value = Value::Null;

/// Fetch a named field from a record, yielding `Null` when absent.
pub fn field<'a>(record: &'a Value, column: &str) -> &'a Value {
    record.get(column).unwrap_or(&NULL)
}

/// Total order over JSON scalars, used for offline `order by`.
///
/// Nulls sort first, then booleans, numbers, and strings. ISO 8601 date
/// strings order correctly under plain lexicographic comparison. Arrays
/// and objects are not meaningful sort keys and compare as equal.
pub fn cmp_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) | Value::Object(_) => 4,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_overwrites_and_adds() {
        let mut record = json!({"id": "1", "title": "old", "completed": false});
        merge_fields(&mut record, &json!({"completed": true, "assignee": "sam"}));
        assert_eq!(
            record,
            json!({"id": "1", "title": "old", "completed": true, "assignee": "sam"})
        );
    }

    #[test]
    fn merge_ignores_non_objects() {
        let mut record = json!({"id": "1"});
        merge_fields(&mut record, &json!("not an object"));
        assert_eq!(record, json!({"id": "1"}));
    }

    #[test]
    fn missing_field_is_null() {
        let record = json!({"id": "1"});
        assert_eq!(field(&record, "date"), &Value::Null);
    }

    #[test]
    fn iso_dates_order_lexicographically() {
        let earlier = json!("2025-04-05");
        let later = json!("2025-04-18");
        assert_eq!(cmp_values(&earlier, &later), Ordering::Less);
    }

    #[test]
    fn numbers_order_numerically() {
        assert_eq!(cmp_values(&json!(9), &json!(50)), Ordering::Less);
        assert_eq!(cmp_values(&json!(2.5), &json!(2.5)), Ordering::Equal);
    }

    #[test]
    fn nulls_sort_first() {
        assert_eq!(cmp_values(&Value::Null, &json!(0)), Ordering::Less);
        assert_eq!(cmp_values(&json!("a"), &Value::Null), Ordering::Greater);
    }
}

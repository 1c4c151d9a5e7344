// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::schema::Schema;
use crate::value::Value;

/// Failure to resolve a schema path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMiss {
    /// Position of the segment that could not be found.
    pub index: usize,
    pub segment: String,
    /// Property names that were available at that point.
    pub available: Vec<String>,
}

fn split_identifier(segment: &str) -> Option<(&str, u64)> {
    let (name, id) = segment.rsplit_once(':')?;
    if name.is_empty() || id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    id.parse::<u64>().ok().map(|id| (name, id))
}

/// Split a trailing `:N` selector off the last segment.
///
/// Earlier segments are never inspected, so `a:1.b` keeps `a:1` as a plain
/// property name.
pub fn extract_identifier(segments: &[String]) -> (Vec<String>, Option<u64>) {
    let mut cleaned = segments.to_vec();
    let id = match cleaned.last_mut() {
        Some(last) => match split_identifier(last) {
            Some((name, id)) => {
                *last = name.to_string();
                Some(id)
            }
            None => None,
        },
        None => None,
    };
    (cleaned, id)
}

fn is_self_segment(segment: &str) -> bool {
    segment == "this" || segment == "."
}

fn is_index(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

/// Walk `segments` through schema properties.
///
/// Missing properties are searched for in `anyOf`, `oneOf` and `allOf`
/// branches, first match wins. A numeric segment on an array schema selects
/// its `items`.
pub fn resolve_schema_path<'a, S: AsRef<str>>(
    schema: &'a Schema,
    segments: &[S],
) -> Result<&'a Schema, PathMiss> {
    let mut current = schema;
    for (index, segment) in segments.iter().enumerate() {
        let segment = segment.as_ref();
        if is_self_segment(segment) {
            continue;
        }
        if let Some(next) = current.property(segment) {
            current = next;
            continue;
        }
        if is_index(segment) && current.is_array_typed() {
            if let Some(items) = current.array_items() {
                current = items;
                continue;
            }
        }
        return Err(PathMiss {
            index,
            segment: segment.to_string(),
            available: current.property_names(),
        });
    }
    Ok(current)
}

/// Walk `segments` through runtime data. Absence at any step yields `None`.
pub fn resolve_data_path<'a, S: AsRef<str>>(data: &'a Value, segments: &[S]) -> Option<&'a Value> {
    let mut current = data;
    for segment in segments {
        let segment = segment.as_ref();
        if is_self_segment(segment) {
            continue;
        }
        current = match current {
            Value::Object(obj) => obj.get(segment)?,
            Value::Array(items) if is_index(segment) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    match current {
        Value::Undefined => None,
        v => Some(v),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn segs(s: &[&str]) -> Vec<String> {
        s.iter().map(|s| s.to_string()).collect()
    }

    fn schema(v: serde_json::Value) -> Schema {
        match Schema::from_serde_json_value(v) {
            Ok(s) => s,
            Err(e) => panic!("{e}"),
        }
    }

    #[test]
    fn identifier_only_on_last_segment() {
        assert_eq!(
            extract_identifier(&segs(&["meetingId:1"])),
            (segs(&["meetingId"]), Some(1))
        );
        assert_eq!(
            extract_identifier(&segs(&["a:2", "b"])),
            (segs(&["a:2", "b"]), None)
        );
        assert_eq!(
            extract_identifier(&segs(&["a", "b:10"])),
            (segs(&["a", "b"]), Some(10))
        );
        for plain in ["x:", ":3", "x:-1", "x:1a", "x"] {
            assert_eq!(extract_identifier(&segs(&[plain])), (segs(&[plain]), None));
        }
        assert_eq!(extract_identifier(&[]), (vec![], None));
    }

    #[test]
    fn schema_path_through_properties_and_combinators() {
        let s = schema(json!({
            "type": "object",
            "properties": {
                "user": {
                    "oneOf": [
                        { "properties": { "name": { "type": "string" } } },
                        { "properties": { "id": { "type": "integer" } } }
                    ]
                },
                "list": { "type": "array", "items": { "properties": { "v": { "type": "boolean" } } } }
            }
        }));
        assert_eq!(resolve_schema_path(&s, &["user", "id"]), Ok(&Schema::integer()));
        assert_eq!(resolve_schema_path(&s, &["this", "user", "name"]), Ok(&Schema::string()));
        assert_eq!(resolve_schema_path(&s, &["list", "0", "v"]), Ok(&Schema::boolean()));
        assert_eq!(resolve_schema_path::<&str>(&s, &[]), Ok(&s));
    }

    #[test]
    fn schema_miss_lists_available_names() {
        let s = schema(json!({"properties": {"a": {}, "b": {}}}));
        let miss = resolve_schema_path(&s, &["c"]).err();
        assert_eq!(
            miss,
            Some(PathMiss {
                index: 0,
                segment: "c".to_string(),
                available: segs(&["a", "b"]),
            })
        );
        let empty = schema(json!({}));
        assert!(resolve_schema_path(&empty, &["anything"]).is_err());
    }

    #[test]
    fn data_path_never_fails() -> anyhow::Result<()> {
        let data = Value::from_json_str(r#"{"a": {"b": [10, {"c": "x"}]}, "n": null}"#)?;
        assert_eq!(resolve_data_path(&data, &["a", "b", "0"]), Some(&Value::from(10u64)));
        assert_eq!(resolve_data_path(&data, &["a", "b", "1", "c"]), Some(&Value::from("x")));
        assert_eq!(resolve_data_path(&data, &["n"]), Some(&Value::Null));
        assert_eq!(resolve_data_path(&data, &["n", "deeper"]), None);
        assert_eq!(resolve_data_path(&data, &["missing", "deeper"]), None);
        assert_eq!(resolve_data_path(&data, &["a", "b", "7"]), None);
        assert_eq!(resolve_data_path(&data, &["a", "b", "x"]), None);
        assert_eq!(resolve_data_path(&data, &["this"]), Some(&data));
        Ok(())
    }
}

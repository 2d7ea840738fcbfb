//! Projection: return only selected paths from a document.
//!
//! Unlike a read with no projection, key attributes are not added back
//! implicitly. List elements selected by index are compacted into a new list
//! in the order they were requested.

use serde_json::{Map, Value};

use super::path::{AttrPath, PathSegment};

/// Apply a projection to a document. An empty path list returns the whole
/// document.
pub fn apply_projection(doc: &Value, paths: &[AttrPath]) -> Value {
    if paths.is_empty() {
        return doc.clone();
    }

    let mut result = Value::Object(Map::new());
    for path in paths {
        if let Some(value) = path.resolve(doc) {
            insert_projected(&mut result, path.segments(), value.clone());
        }
    }
    result
}

fn insert_projected(target: &mut Value, segments: &[PathSegment], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        *target = value;
        return;
    };

    match head {
        PathSegment::Attr(name) => {
            if !target.is_object() {
                *target = Value::Object(Map::new());
            }
            if let Value::Object(map) = target {
                if rest.is_empty() {
                    map.insert(name.clone(), value);
                } else {
                    let child = map.entry(name.clone()).or_insert(Value::Null);
                    insert_projected(child, rest, value);
                }
            }
        }
        PathSegment::Index(_) => {
            if !target.is_array() {
                *target = Value::Array(Vec::new());
            }
            if let Value::Array(list) = target {
                let mut child = Value::Null;
                insert_projected(&mut child, rest, value);
                list.push(child);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn p(s: &str) -> AttrPath {
        AttrPath::parse(s).unwrap()
    }

    fn movie() -> Value {
        json!({
            "year": 2013,
            "title": "Rush",
            "info": {"rating": 8.3, "plot": "p", "actors": ["A", "B", "C"], "rank": 1}
        })
    }

    #[test]
    fn test_empty_projection_returns_full_doc() {
        let doc = movie();
        assert_eq!(apply_projection(&doc, &[]), doc);
    }

    #[test]
    fn test_scan_projection() {
        let result = apply_projection(&movie(), &[p("year"), p("title"), p("info.rating")]);
        assert_eq!(
            result,
            json!({"year": 2013, "title": "Rush", "info": {"rating": 8.3}})
        );
    }

    #[test]
    fn test_keys_not_added_implicitly() {
        let result = apply_projection(&movie(), &[p("info.plot")]);
        assert_eq!(result, json!({"info": {"plot": "p"}}));
    }

    #[test]
    fn test_missing_path_omitted() {
        let doc = json!({"year": 2013, "title": "x"});
        assert_eq!(
            apply_projection(&doc, &[p("year"), p("info.rating")]),
            json!({"year": 2013})
        );
    }

    #[test]
    fn test_list_elements_compacted() {
        let result = apply_projection(&movie(), &[p("info.actors[2]"), p("info.actors[0]")]);
        assert_eq!(result, json!({"info": {"actors": ["C", "A"]}}));
    }
}

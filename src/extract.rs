/*!
 * Field extraction: raw post JSON -> normalized document
 *
 * The projection is fixed-shape. Scalar leaves are copied through as-is
 * (whatever JSON type the source used); missing or null parent objects yield
 * null/empty leaves. Only a non-object top level, or a nested container of the
 * wrong JSON type, is an error.
 */

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Extraction failure for a single payload
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("expected a JSON object at top level, found {found}")]
    NotAnObject { found: &'static str },

    #[error("expected {expected} at '{path}', found {found}")]
    TypeMismatch {
        path: String,
        expected: &'static str,
        found: &'static str,
    },
}

/// Post owner fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OwnerInfo {
    pub username: Value,
    pub is_unpublished: Value,
    pub full_name: Value,
    pub is_verified: Value,
    pub id: Value,
    pub is_private: Value,
}

/// Comment author fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommentOwner {
    pub username: Value,
    pub is_verified: Value,
    pub id: Value,
}

/// One entry of the comment preview
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommentPreview {
    pub text: Value,
    pub created_at: Value,
    pub owner: CommentOwner,
}

/// The document-store entity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizedRecord {
    pub owner: OwnerInfo,
    pub location: Value,
    pub shortcode: Value,
    pub is_ad: Value,
    pub taken_at_timestamp: Value,
    pub comments_disabled: Value,
    pub caption: Value,
    pub comments_count: Value,
    pub comments_preview: Vec<CommentPreview>,
    pub id: Value,
}

impl NormalizedRecord {
    /// Document key as a string, if `id` is a non-empty string or a number
    pub fn document_id(&self) -> Option<String> {
        match &self.id {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Project a raw post payload into a [`NormalizedRecord`]
pub fn extract(payload: &Value) -> Result<NormalizedRecord, ExtractError> {
    let root = payload.as_object().ok_or(ExtractError::NotAnObject {
        found: json_kind(payload),
    })?;

    let owner = object_field(root, "owner", "owner")?;

    let caption_data = object_field(root, "edge_media_to_caption", "edge_media_to_caption")?;
    let caption_edges: &[Value] = match caption_data {
        Some(data) => array_field(data, "edges", "edge_media_to_caption.edges")?,
        None => &[],
    };
    let caption = first_caption(caption_edges)?;

    let comment_data = object_field(
        root,
        "edge_media_preview_comment",
        "edge_media_preview_comment",
    )?;
    let comments_count = match comment_data.and_then(|c| c.get("count")) {
        Some(count) => count.clone(),
        None => Value::from(0),
    };
    let comment_edges: &[Value] = match comment_data {
        Some(data) => array_field(data, "edges", "edge_media_preview_comment.edges")?,
        None => &[],
    };

    let mut comments_preview = Vec::with_capacity(comment_edges.len());
    for (index, edge) in comment_edges.iter().enumerate() {
        let path = format!("edge_media_preview_comment.edges[{}]", index);
        let edge = as_object(edge, &path)?;
        let Some(node) = object_field(edge, "node", &format!("{}.node", path))? else {
            continue;
        };
        let author = object_field(node, "owner", &format!("{}.node.owner", path))?;
        comments_preview.push(CommentPreview {
            text: leaf(Some(node), "text"),
            created_at: leaf(Some(node), "created_at"),
            owner: CommentOwner {
                username: leaf(author, "username"),
                is_verified: leaf(author, "is_verified"),
                id: leaf(author, "id"),
            },
        });
    }

    let shortcode = leaf(Some(root), "shortcode");
    let id = if is_truthy(&shortcode) {
        shortcode.clone()
    } else {
        leaf(Some(root), "id")
    };

    Ok(NormalizedRecord {
        owner: OwnerInfo {
            username: leaf(owner, "username"),
            is_unpublished: leaf(owner, "is_unpublished"),
            full_name: leaf(owner, "full_name"),
            is_verified: leaf(owner, "is_verified"),
            id: leaf(owner, "id"),
            is_private: leaf(owner, "is_private"),
        },
        location: leaf(Some(root), "location"),
        shortcode,
        is_ad: leaf(Some(root), "is_ad"),
        taken_at_timestamp: leaf(Some(root), "taken_at_timestamp"),
        comments_disabled: leaf(Some(root), "comments_disabled"),
        caption,
        comments_count,
        comments_preview,
        id,
    })
}

fn first_caption(edges: &[Value]) -> Result<Value, ExtractError> {
    let Some(first) = edges.first() else {
        return Ok(Value::Null);
    };
    let path = "edge_media_to_caption.edges[0]";
    let edge = as_object(first, path)?;
    let node = object_field(edge, "node", "edge_media_to_caption.edges[0].node")?;
    Ok(leaf(node, "text"))
}

fn leaf(parent: Option<&Map<String, Value>>, key: &str) -> Value {
    parent
        .and_then(|map| map.get(key))
        .cloned()
        .unwrap_or(Value::Null)
}

fn object_field<'a>(
    parent: &'a Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<Option<&'a Map<String, Value>>, ExtractError> {
    match parent.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => as_object(value, path).map(Some),
    }
}

fn array_field<'a>(
    parent: &'a Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<&'a [Value], ExtractError> {
    match parent.get(key) {
        None | Some(Value::Null) => Ok(&[]),
        Some(Value::Array(items)) => Ok(items),
        Some(other) => Err(ExtractError::TypeMismatch {
            path: path.to_string(),
            expected: "array",
            found: json_kind(other),
        }),
    }
}

fn as_object<'a>(value: &'a Value, path: &str) -> Result<&'a Map<String, Value>, ExtractError> {
    value.as_object().ok_or_else(|| ExtractError::TypeMismatch {
        path: path.to_string(),
        expected: "object",
        found: json_kind(value),
    })
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_post() -> Value {
        json!({
            "id": "2981",
            "shortcode": "CxYz",
            "is_ad": false,
            "taken_at_timestamp": 1700000000,
            "comments_disabled": false,
            "location": {"id": "12", "name": "Lisbon"},
            "owner": {
                "username": "alice",
                "is_unpublished": false,
                "full_name": "Alice A",
                "is_verified": true,
                "id": "77",
                "is_private": false,
                "followers": 10
            },
            "edge_media_to_caption": {
                "edges": [{"node": {"text": "sunset"}}, {"node": {"text": "ignored"}}]
            },
            "edge_media_preview_comment": {
                "count": 2,
                "edges": [
                    {"node": {"text": "nice", "created_at": 1700000100,
                              "owner": {"username": "bob", "is_verified": false, "id": "5"}}},
                    {"not_a_node": true}
                ]
            }
        })
    }

    #[test]
    fn test_empty_object_degrades_to_defaults() {
        let record = extract(&json!({})).unwrap();

        assert_eq!(record.owner, OwnerInfo::default());
        assert_eq!(record.caption, Value::Null);
        assert_eq!(record.comments_count, json!(0));
        assert!(record.comments_preview.is_empty());
        assert_eq!(record.id, Value::Null);
        assert_eq!(record.document_id(), None);
    }

    #[test]
    fn test_non_object_inputs_rejected() {
        assert_eq!(
            extract(&json!([1, 2])).unwrap_err(),
            ExtractError::NotAnObject { found: "array" }
        );
        assert_eq!(
            extract(&Value::Null).unwrap_err(),
            ExtractError::NotAnObject { found: "null" }
        );
        assert!(extract(&json!("post")).is_err());
    }

    #[test]
    fn test_full_projection() {
        let record = extract(&sample_post()).unwrap();

        assert_eq!(record.owner.username, json!("alice"));
        assert_eq!(record.owner.is_verified, json!(true));
        assert_eq!(record.location, json!({"id": "12", "name": "Lisbon"}));
        assert_eq!(record.caption, json!("sunset"));
        assert_eq!(record.comments_count, json!(2));
        assert_eq!(record.comments_preview.len(), 1);
        assert_eq!(record.comments_preview[0].text, json!("nice"));
        assert_eq!(record.comments_preview[0].owner.username, json!("bob"));
        assert_eq!(record.id, json!("CxYz"));
        assert_eq!(record.document_id().as_deref(), Some("CxYz"));
    }

    #[test]
    fn test_projection_drops_unknown_fields() {
        let doc = serde_json::to_value(extract(&sample_post()).unwrap()).unwrap();
        assert!(doc["owner"].get("followers").is_none());
        assert!(doc.get("edge_media_to_caption").is_none());
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let post = sample_post();
        let first = serde_json::to_vec(&extract(&post).unwrap()).unwrap();
        let second = serde_json::to_vec(&extract(&post).unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_id_falls_back_when_shortcode_missing_or_empty() {
        assert_eq!(extract(&json!({"id": "9"})).unwrap().id, json!("9"));
        assert_eq!(
            extract(&json!({"shortcode": "", "id": 9})).unwrap().id,
            json!(9)
        );
        assert_eq!(
            extract(&json!({"shortcode": "", "id": 9})).unwrap().document_id().as_deref(),
            Some("9")
        );
    }

    #[test]
    fn test_null_parents_are_tolerated() {
        let record = extract(&json!({
            "owner": null,
            "edge_media_to_caption": null,
            "edge_media_preview_comment": {"edges": null}
        }))
        .unwrap();
        assert_eq!(record.owner.username, Value::Null);
        assert_eq!(record.caption, Value::Null);
        assert_eq!(record.comments_count, json!(0));
        assert!(record.comments_preview.is_empty());
    }

    #[test]
    fn test_caption_edge_without_text() {
        let record = extract(&json!({
            "edge_media_to_caption": {"edges": [{"node": {}}]}
        }))
        .unwrap();
        assert_eq!(record.caption, Value::Null);
    }

    #[test]
    fn test_nested_type_mismatch() {
        let err = extract(&json!({"owner": "alice"})).unwrap_err();
        assert_eq!(
            err,
            ExtractError::TypeMismatch {
                path: "owner".to_string(),
                expected: "object",
                found: "string",
            }
        );

        let err = extract(&json!({"edge_media_preview_comment": {"edges": {}}})).unwrap_err();
        assert!(matches!(err, ExtractError::TypeMismatch { expected: "array", .. }));
    }

    #[test]
    fn test_serialized_field_order() {
        let text = serde_json::to_string(&extract(&json!({"shortcode": "abc"})).unwrap()).unwrap();
        assert!(text.starts_with("{\"owner\":{\"username\":null"));
        assert!(text.ends_with("\"comments_preview\":[],\"id\":\"abc\"}"));
    }
}

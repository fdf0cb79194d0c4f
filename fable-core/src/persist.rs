//! Story persistence: the interchange format and file save/load.
//!
//! The on-disk and exchanged shape is the document's own JSON
//! serialization; exporting then re-importing yields a deep-equal
//! document. Import is atomic: a candidate that fails validation is
//! rejected before anything else happens, so the caller's current
//! document is never left in a mixed state.

use crate::story::Story;
use serde_json::Value;
use std::io;
use std::path::Path;
use thiserror::Error;
use tokio::fs;
use tracing::{info, warn};

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("invalid story document: {0}")]
    Format(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("storage quota exceeded; the in-memory story is intact, export it manually")]
    QuotaExceeded(#[source] io::Error),
}

/// Serialize a story to its interchange JSON.
pub fn to_json(story: &Story) -> Result<String, PersistError> {
    Ok(serde_json::to_string_pretty(story)?)
}

/// Parse and validate a candidate document.
///
/// The required top-level fields are `name`, `startNodeId`, and
/// `nodes`; anything else is handled best-effort (a node without
/// `choices` gets an empty list, a node without an embedded `id` gets
/// its table key). Dangling choice targets do not reject the import -
/// they stay queryable as broken links for the user to repair.
pub fn from_json(raw: &str) -> Result<Story, PersistError> {
    let value: Value = serde_json::from_str(raw)?;
    let object = value
        .as_object()
        .ok_or_else(|| PersistError::Format("document is not a JSON object".to_string()))?;

    for field in ["name", "startNodeId", "nodes"] {
        if !object.contains_key(field) {
            return Err(PersistError::Format(format!(
                "missing required field \"{field}\""
            )));
        }
    }
    if !object["nodes"].is_object() {
        return Err(PersistError::Format(
            "\"nodes\" must be an object keyed by node id".to_string(),
        ));
    }

    let mut story: Story = serde_json::from_value(value)?;

    // Resilience: a node missing its embedded id inherits its table key.
    for (key, node) in story.nodes.iter_mut() {
        if node.id.is_empty() {
            node.id = key.clone();
        }
    }

    let violations = story.validate();
    if !violations.is_empty() {
        warn!(
            story = %story.id,
            violations = violations.len(),
            "imported document has structural violations"
        );
    }

    Ok(story)
}

/// Write a story to a file as interchange JSON.
///
/// Running out of space is reported as its own error so callers can
/// tell the user the in-memory document is still authoritative and
/// manual export is advised.
pub async fn save(story: &Story, path: impl AsRef<Path>) -> Result<(), PersistError> {
    let content = to_json(story)?;
    fs::write(&path, content).await.map_err(|e| {
        if matches!(
            e.kind(),
            io::ErrorKind::StorageFull | io::ErrorKind::QuotaExceeded
        ) {
            PersistError::QuotaExceeded(e)
        } else {
            PersistError::Io(e)
        }
    })?;
    info!(story = %story.id, path = %path.as_ref().display(), "saved story");
    Ok(())
}

/// Load a story from a file, with full import validation.
pub async fn load(path: impl AsRef<Path>) -> Result<Story, PersistError> {
    let content = fs::read_to_string(path).await?;
    from_json(&content)
}

/// File name for a story, derived from its display name.
pub fn story_file_name(name: &str) -> String {
    let sanitized = name
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect::<String>();
    format!("{sanitized}.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::story::NodeId;

    #[test]
    fn test_round_trip_is_deep_equal() {
        let story = Story::starter();
        let json = to_json(&story).unwrap();
        let restored = from_json(&json).unwrap();
        assert_eq!(story, restored);
    }

    #[test]
    fn test_import_rejects_missing_start_node_id() {
        let raw = r#"{"id": "s", "name": "Broken", "nodes": {}}"#;
        let result = from_json(raw);
        match result {
            Err(PersistError::Format(msg)) => assert!(msg.contains("startNodeId")),
            other => panic!("expected format error, got {other:?}"),
        }
    }

    #[test]
    fn test_import_rejects_missing_name() {
        let raw = r#"{"id": "s", "startNodeId": "a", "nodes": {}}"#;
        assert!(matches!(from_json(raw), Err(PersistError::Format(_))));
    }

    #[test]
    fn test_import_rejects_missing_nodes() {
        let raw = r#"{"id": "s", "name": "n", "startNodeId": "a"}"#;
        assert!(matches!(from_json(raw), Err(PersistError::Format(_))));
    }

    #[test]
    fn test_import_rejects_non_object() {
        assert!(matches!(from_json("[1, 2]"), Err(PersistError::Format(_))));
        assert!(matches!(from_json("not json"), Err(PersistError::Json(_))));
    }

    #[test]
    fn test_import_tolerates_missing_choices_and_ids() {
        let raw = r#"{
            "id": "s1",
            "name": "Tolerant",
            "startNodeId": "a",
            "nodes": {
                "a": {"id": "a", "title": "A", "content": "", "choices": [
                    {"id": "c1", "text": "go", "targetNodeId": "b"}
                ]},
                "b": {"title": "No id, no choices"}
            }
        }"#;

        let story = from_json(raw).unwrap();
        let b = story.node(&NodeId::from("b")).unwrap();
        assert_eq!(b.id, NodeId::from("b"));
        assert!(b.choices.is_empty());
        assert!(story.is_valid());
    }

    #[test]
    fn test_import_keeps_dangling_targets_queryable() {
        let raw = r#"{
            "id": "s2",
            "name": "Dangling",
            "startNodeId": "a",
            "nodes": {
                "a": {"id": "a", "choices": [
                    {"id": "c1", "text": "go", "targetNodeId": "ghost"}
                ]}
            }
        }"#;

        let story = from_json(raw).unwrap();
        assert_eq!(crate::query::broken_links(&story).len(), 1);
    }

    #[test]
    fn test_export_shape_matches_interchange_format() {
        let story = Story::starter();
        let json = to_json(&story).unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();

        assert!(value["id"].is_string());
        assert!(value["name"].is_string());
        assert!(value["startNodeId"].is_string());
        assert!(value["nodes"].is_object());

        let start = &value["nodes"][story.start_node_id.as_str()];
        assert!(start["choices"].is_array());
        assert_eq!(start["choices"][0]["targetNodeId"], "gate");
        assert_eq!(start["isAiGenerated"], false);
        // unset optionals are omitted entirely
        assert!(value.get("imageStyle").is_none());
    }

    #[test]
    fn test_story_file_name_sanitized() {
        assert_eq!(story_file_name("My Story!"), "My_Story_.json");
        assert_eq!(story_file_name("plain"), "plain.json");
    }

    #[tokio::test]
    async fn test_save_and_load() {
        use tempfile::TempDir;

        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join(story_file_name("The Crossroads"));

        let story = Story::starter();
        save(&story, &path).await.expect("Save should succeed");
        assert!(path.exists());

        let loaded = load(&path).await.expect("Load should succeed");
        assert_eq!(story, loaded);
    }

    #[tokio::test]
    async fn test_load_missing_file_is_io_error() {
        let result = load("/nonexistent/story.json").await;
        assert!(matches!(result, Err(PersistError::Io(_))));
    }
}

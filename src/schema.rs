//! Index schema persistence and rewriting.
//!
//! The source schema is fetched as raw text and persisted byte-for-byte
//! next to the export files, so the restore side can recreate the index
//! even against a different service. The only mutation ever applied is a
//! structured rename: parse, drop the response wrapper fields, replace
//! the `name` value, serialize. Field definitions pass through untouched.

use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::error::MirrorError;

/// Path of the persisted schema for an index: `{dir}/{index}.schema`.
pub fn schema_file_path(dir: &Path, index: &str) -> PathBuf {
    dir.join(format!("{}.schema", index))
}

/// Persist a raw schema document. Written via temp-then-rename so a
/// partially written schema is never visible under the final name.
pub fn save_schema(dir: &Path, index: &str, raw: &str) -> Result<PathBuf, MirrorError> {
    let path = schema_file_path(dir, index);
    let tmp = path.with_extension("schema.tmp");
    std::fs::write(&tmp, raw)
        .and_then(|_| std::fs::rename(&tmp, &path))
        .map_err(|e| MirrorError::FileWrite {
            path: path.clone(),
            reason: e.to_string(),
        })?;
    Ok(path)
}

/// Load the persisted schema for an index. Missing or empty files are
/// fatal: restore must not manufacture an index without one.
pub fn load_schema(dir: &Path, index: &str) -> Result<String, MirrorError> {
    let path = schema_file_path(dir, index);
    let raw = std::fs::read_to_string(&path).map_err(|e| {
        MirrorError::InvalidSchema(format!(
            "no schema at {} ({}); run backup against the source index first",
            path.display(),
            e
        ))
    })?;
    if raw.trim().is_empty() {
        return Err(MirrorError::InvalidSchema(format!(
            "schema file {} is empty",
            path.display()
        )));
    }
    Ok(raw)
}

/// Rewrite a raw schema document for submission under a new index name.
///
/// Drops protocol wrapper keys (`@odata.*`) the source service attached
/// to its response and replaces the `name` value. Tolerates arbitrary
/// field ordering; everything else passes through structurally unchanged.
pub fn rename_index(raw: &str, new_name: &str) -> Result<String, MirrorError> {
    let mut schema: Value = serde_json::from_str(raw)
        .map_err(|e| MirrorError::InvalidSchema(format!("schema is not valid JSON: {}", e)))?;
    let fields = schema
        .as_object_mut()
        .ok_or_else(|| MirrorError::InvalidSchema("schema is not a JSON object".to_string()))?;

    fields.retain(|key, _| !key.starts_with("@odata."));

    match fields.get_mut("name") {
        Some(name) => *name = Value::String(new_name.to_string()),
        None => {
            return Err(MirrorError::InvalidSchema(
                "schema has no 'name' field".to_string(),
            ))
        }
    }

    serde_json::to_string(&schema)
        .map_err(|e| MirrorError::InvalidSchema(format!("schema failed to serialize: {}", e)))
}

/// Name of the key field declared by a schema, if it can be determined.
pub fn key_field_name(raw: &str) -> Option<String> {
    let schema: Value = serde_json::from_str(raw).ok()?;
    schema.get("fields")?.as_array()?.iter().find_map(|field| {
        if field.get("key").and_then(Value::as_bool).unwrap_or(false) {
            field.get("name").and_then(Value::as_str).map(String::from)
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: &str = r#"{
        "@odata.context": "https://src.example.net/$metadata#indexes/$entity",
        "@odata.etag": "\"0x8D0\"",
        "name": "hotels",
        "fields": [
            {"name": "id", "type": "Edm.String", "key": true},
            {"name": "description", "type": "Edm.String", "key": false}
        ],
        "suggesters": []
    }"#;

    #[test]
    fn rename_replaces_name_and_drops_wrapper_keys() {
        let renamed = rename_index(RAW, "hotels-copy").unwrap();
        let parsed: Value = serde_json::from_str(&renamed).unwrap();
        assert_eq!(parsed["name"], "hotels-copy");
        assert!(parsed.get("@odata.context").is_none());
        assert!(parsed.get("@odata.etag").is_none());
        // Field definitions pass through untouched.
        assert_eq!(parsed["fields"][0]["name"], "id");
        assert_eq!(parsed["fields"][1]["type"], "Edm.String");
        assert!(parsed["suggesters"].as_array().unwrap().is_empty());
    }

    #[test]
    fn rename_tolerates_field_order() {
        let raw = r#"{"fields": [], "name": "a", "@odata.context": "x"}"#;
        let parsed: Value = serde_json::from_str(&rename_index(raw, "b").unwrap()).unwrap();
        assert_eq!(parsed["name"], "b");
    }

    #[test]
    fn rename_without_name_is_invalid() {
        let err = rename_index(r#"{"fields": []}"#, "b").unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn rename_rejects_non_json() {
        assert!(rename_index("", "b").is_err());
        assert!(rename_index("[1, 2]", "b").is_err());
    }

    #[test]
    fn key_field_found() {
        assert_eq!(key_field_name(RAW).as_deref(), Some("id"));
    }

    #[test]
    fn key_field_absent() {
        assert_eq!(key_field_name(r#"{"name": "a", "fields": []}"#), None);
        assert_eq!(key_field_name("not json"), None);
    }

    #[test]
    fn save_and_load_roundtrip() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = save_schema(tmp.path(), "hotels", RAW).unwrap();
        assert_eq!(path, tmp.path().join("hotels.schema"));
        assert_eq!(load_schema(tmp.path(), "hotels").unwrap(), RAW);
        // No stray temp file left behind.
        assert!(!tmp.path().join("hotels.schema.tmp").exists());
    }

    #[test]
    fn load_missing_schema_is_fatal() {
        let tmp = tempfile::TempDir::new().unwrap();
        let err = load_schema(tmp.path(), "ghost").unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn load_empty_schema_is_fatal() {
        let tmp = tempfile::TempDir::new().unwrap();
        save_schema(tmp.path(), "hollow", "  \n").unwrap();
        assert!(load_schema(tmp.path(), "hollow").unwrap_err().is_fatal());
    }
}

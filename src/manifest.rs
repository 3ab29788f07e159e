//! YAML manifests: multi-document files of objects.

use std::path::Path;

use autoscaler_core::Object;
use serde::Deserialize;
use serde::Serialize;

use crate::error::{Error, Result};

/// Parse every non-empty document in `content` as an object.
///
/// # Errors
///
/// Returns error if a document is not a valid object.
pub fn parse_objects(content: &str) -> Result<Vec<Object>> {
    let mut objects = Vec::new();
    for (index, document) in serde_yaml::Deserializer::from_str(content).enumerate() {
        let value = serde_yaml::Value::deserialize(document)
            .map_err(|e| Error::ParseError(format!("document {index}: {e}")))?;
        if value.is_null() {
            continue;
        }
        let object = serde_yaml::from_value(value)
            .map_err(|e| Error::ParseError(format!("document {index}: {e}")))?;
        objects.push(object);
    }
    Ok(objects)
}

/// # Errors
///
/// Returns error if the file cannot be read or parsed.
pub fn load_objects(path: &Path) -> Result<Vec<Object>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::IoError(format!("Failed to read {}: {e}", path.display())))?;
    parse_objects(&content).map_err(|e| Error::ParseError(format!("{}: {e}", path.display())))
}

/// Render values as a multi-document YAML stream.
///
/// # Errors
///
/// Returns error if a value cannot be serialized.
pub fn to_yaml_stream<T: Serialize>(values: &[T]) -> Result<String> {
    let mut out = String::new();
    for value in values {
        out.push_str("---\n");
        out.push_str(
            &serde_yaml::to_string(value).map_err(|e| Error::ParseError(e.to_string()))?,
        );
    }
    Ok(out)
}

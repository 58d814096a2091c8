//! Reading and writing the wrapped-array JSON files.
//!
//! Every data file is a single object holding one array, e.g.
//! `{"items": [...]}`. A bare top-level array is accepted on read.

use std::io::ErrorKind;
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::{StoreError, StoreResult};

fn corrupt(path: &Path, reason: impl Into<String>) -> StoreError {
    StoreError::Corrupt {
        path: path.display().to_string(),
        reason: reason.into(),
    }
}

/// Load the array stored under `key`.
///
/// A missing or empty file reads as an empty list, as does an object without
/// `key`. Anything else that does not parse is an error.
pub(crate) async fn load_items<T: DeserializeOwned>(path: &Path, key: &str) -> StoreResult<Vec<T>> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("Data file {} does not exist yet", path.display());
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    let value: Value =
        serde_json::from_str(&content).map_err(|e| corrupt(path, e.to_string()))?;
    let items = match value {
        Value::Array(items) => Value::Array(items),
        Value::Object(mut map) => match map.remove(key) {
            Some(Value::Null) | None => return Ok(Vec::new()),
            Some(items @ Value::Array(_)) => items,
            Some(other) => {
                return Err(corrupt(path, format!("'{key}' is not an array: {other}")));
            }
        },
        other => return Err(corrupt(path, format!("unexpected top-level value: {other}"))),
    };

    serde_json::from_value(items).map_err(|e| corrupt(path, e.to_string()))
}

/// Replace the file with `{key: items}`.
///
/// The content goes to a sibling temporary file first and is renamed into
/// place, so readers never see a half-written file.
pub(crate) async fn save_items<T: Serialize>(path: &Path, key: &str, items: &[T]) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut wrapper = serde_json::Map::new();
    wrapper.insert(key.to_string(), serde_json::to_value(items)?);
    let content = serde_json::to_string_pretty(&Value::Object(wrapper))?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    tokio::fs::write(&tmp, content).await?;
    tokio::fs::rename(&tmp, path).await?;

    debug!("Saved {} records to {}", items.len(), path.display());
    Ok(())
}

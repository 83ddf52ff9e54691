//! # State File Persistence
//!
//! The session state is stored as one flat JSON object. Writes go through a
//! `.tmp` sibling and `rename()` so a crash mid-write never leaves a torn file.
//!
//! Loading merges the file over the in-memory record key by key: keys the
//! file omits keep their current values.

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

#[derive(Debug)]
pub enum StateError {
    Io(io::Error),
    Parse(serde_json::Error),
    /// The file parsed but is not a JSON object.
    Shape,
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateError::Io(e) => write!(f, "state I/O error: {e}"),
            StateError::Parse(e) => write!(f, "state parse error: {e}"),
            StateError::Shape => write!(f, "state file is not a JSON object"),
        }
    }
}

impl std::error::Error for StateError {}

/// Atomically write `data` as pretty JSON to `path`. Returns bytes written.
pub fn atomic_write_json<T: Serialize>(path: &Path, data: &T) -> Result<usize, StateError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(StateError::Io)?;
    }
    let tmp_path = path.with_extension("tmp");
    let json = serde_json::to_string_pretty(data).map_err(StateError::Parse)?;
    fs::write(&tmp_path, &json).map_err(StateError::Io)?;
    fs::rename(&tmp_path, path).map_err(StateError::Io)?;
    Ok(json.len())
}

/// Read `path` and merge its top-level keys over `current`.
///
/// Returns the merged value and the file's byte length.
pub fn merge_from_file<T>(path: &Path, current: &T) -> Result<(T, usize), StateError>
where
    T: Serialize + DeserializeOwned,
{
    let contents = fs::read_to_string(path).map_err(StateError::Io)?;
    let persisted: Value = serde_json::from_str(&contents).map_err(StateError::Parse)?;
    let Value::Object(persisted) = persisted else {
        return Err(StateError::Shape);
    };

    let mut merged = serde_json::to_value(current).map_err(StateError::Parse)?;
    let Value::Object(fields) = &mut merged else {
        return Err(StateError::Shape);
    };
    for (key, value) in persisted {
        fields.insert(key, value);
    }

    let value = serde_json::from_value(merged).map_err(StateError::Parse)?;
    Ok((value, contents.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Sample {
        a: u32,
        b: String,
    }

    #[test]
    fn test_write_then_merge() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");
        let bytes = atomic_write_json(&path, &Sample { a: 1, b: "x".into() }).unwrap();
        assert!(bytes > 0);
        assert!(!path.with_extension("tmp").exists());

        let current = Sample { a: 9, b: "y".into() };
        let (merged, len) = merge_from_file(&path, &current).unwrap();
        assert_eq!(merged, Sample { a: 1, b: "x".into() });
        assert_eq!(len, bytes);
    }

    #[test]
    fn test_missing_keys_keep_current() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, r#"{"a": 5}"#).unwrap();
        let current = Sample { a: 1, b: "kept".into() };
        let (merged, _) = merge_from_file(&path, &current).unwrap();
        assert_eq!(merged, Sample { a: 5, b: "kept".into() });
    }

    #[test]
    fn test_non_object_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "[1, 2]").unwrap();
        let current = Sample { a: 1, b: String::new() };
        assert!(matches!(
            merge_from_file(&path, &current),
            Err(StateError::Shape)
        ));
    }

    #[test]
    fn test_garbage_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{{{").unwrap();
        let current = Sample { a: 1, b: String::new() };
        assert!(matches!(
            merge_from_file(&path, &current),
            Err(StateError::Parse(_))
        ));
    }
}

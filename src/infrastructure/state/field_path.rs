//! Dotted field paths into JSON documents.
//!
//! Paths address nested values with dot-separated keys and bracketed
//! array indexes: `specs.beam_depth`, `hints[2].pages`. Setting through
//! a missing key creates intermediate objects; setting through a
//! missing index is an error.

use serde_json::Value;

use crate::domain::error::PipelineError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Parse a dotted path into segments.
pub fn parse_path(path: &str) -> Result<Vec<PathSegment>, PipelineError> {
    let invalid = |reason: &str| PipelineError::InvalidFieldPath {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    if path.trim().is_empty() {
        return Err(invalid("path is empty"));
    }

    let mut segments = Vec::new();
    for part in path.split('.') {
        if part.is_empty() {
            return Err(invalid("empty path segment"));
        }

        let (key, indexes) = match part.find('[') {
            Some(bracket) => (&part[..bracket], &part[bracket..]),
            None => (part, ""),
        };

        if !key.is_empty() {
            segments.push(PathSegment::Key(key.to_string()));
        } else if indexes.is_empty() {
            return Err(invalid("empty path segment"));
        }

        let mut rest = indexes;
        while !rest.is_empty() {
            let Some(stripped) = rest.strip_prefix('[') else {
                return Err(invalid("expected '[' in index segment"));
            };
            let Some(close) = stripped.find(']') else {
                return Err(invalid("unclosed index bracket"));
            };
            let index: usize = stripped[..close]
                .parse()
                .map_err(|_| invalid("index is not a number"))?;
            segments.push(PathSegment::Index(index));
            rest = &stripped[close + 1..];
        }
    }

    Ok(segments)
}

/// Read the value at `path`, if present.
pub fn get_path<'a>(doc: &'a Value, segments: &[PathSegment]) -> Option<&'a Value> {
    let mut current = doc;
    for segment in segments {
        current = match segment {
            PathSegment::Key(key) => current.get(key)?,
            PathSegment::Index(index) => current.get(index)?,
        };
    }
    Some(current)
}

/// Set the value at `path`, creating intermediate objects for missing
/// keys. Returns the prior value at the path, if any.
pub fn set_path(
    doc: &mut Value,
    path: &str,
    segments: &[PathSegment],
    new_value: Value,
) -> Result<Option<Value>, PipelineError> {
    let invalid = |reason: String| PipelineError::InvalidFieldPath {
        path: path.to_string(),
        reason,
    };

    let Some((last, parents)) = segments.split_last() else {
        return Err(invalid("path is empty".to_string()));
    };

    let mut current = doc;
    for segment in parents {
        current = match segment {
            PathSegment::Key(key) => {
                if !current.is_object() {
                    return Err(invalid(format!("'{key}' parent is not an object")));
                }
                current
                    .as_object_mut()
                    .map(|map| map.entry(key.clone()).or_insert_with(|| Value::Object(Default::default())))
                    .ok_or_else(|| invalid(format!("'{key}' parent is not an object")))?
            }
            PathSegment::Index(index) => current
                .get_mut(index)
                .ok_or_else(|| invalid(format!("index {index} out of bounds")))?,
        };
    }

    match last {
        PathSegment::Key(key) => {
            let map = current
                .as_object_mut()
                .ok_or_else(|| invalid(format!("'{key}' parent is not an object")))?;
            Ok(map.insert(key.clone(), new_value))
        }
        PathSegment::Index(index) => {
            let slot = current
                .get_mut(index)
                .ok_or_else(|| invalid(format!("index {index} out of bounds")))?;
            Ok(Some(std::mem::replace(slot, new_value)))
        }
    }
}

/// Append a value to the array at `path`, creating the array if the
/// path is absent. Returns `false` when an equal element already
/// exists (no write).
pub fn append_unique(
    doc: &mut Value,
    path: &str,
    segments: &[PathSegment],
    new_value: Value,
) -> Result<bool, PipelineError> {
    let existing = get_path(doc, segments).cloned();
    match existing {
        Some(Value::Array(mut items)) => {
            if items.contains(&new_value) {
                return Ok(false);
            }
            items.push(new_value);
            set_path(doc, path, segments, Value::Array(items))?;
            Ok(true)
        }
        Some(_) => Err(PipelineError::InvalidFieldPath {
            path: path.to_string(),
            reason: "append target is not an array".to_string(),
        }),
        None => {
            set_path(doc, path, segments, Value::Array(vec![new_value]))?;
            Ok(true)
        }
    }
}

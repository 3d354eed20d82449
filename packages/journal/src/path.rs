//! # State Paths
//!
//! Dotted addresses into the JSON state tree (`"resources.images"`).
//!
//! A path is parsed once into non-empty segments. Reads fail on the first
//! absent segment instead of quietly producing nothing, so a typo in a
//! target shows up as an error naming the segment.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::PathError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StatePath {
    segments: Vec<String>,
}

impl StatePath {
    pub fn parse(path: &str) -> Result<Self, PathError> {
        if path.is_empty() {
            return Err(PathError::Empty);
        }
        let segments: Vec<String> = path.split('.').map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(PathError::EmptySegment(path.to_string()));
        }
        Ok(Self { segments })
    }

    pub fn from_segments<I, S>(segments: I) -> Result<Self, PathError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(PathError::Empty);
        }
        if segments.iter().any(|s| s.is_empty() || s.contains('.')) {
            return Err(PathError::EmptySegment(segments.join(".")));
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Extend with one more segment
    pub fn child(&self, segment: &str) -> Result<Self, PathError> {
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Self::from_segments(segments)
    }

    /// Value at this path, failing on the first absent segment
    pub fn get<'a>(&self, state: &'a Value) -> Result<&'a Value, PathError> {
        let mut current = state;
        for segment in &self.segments {
            let object = current.as_object().ok_or_else(|| PathError::NotAnObject {
                path: self.to_string(),
                segment: segment.clone(),
            })?;
            current = object.get(segment).ok_or_else(|| PathError::Missing {
                path: self.to_string(),
                segment: segment.clone(),
            })?;
        }
        Ok(current)
    }

    /// Value at this path, or `None` if any segment is absent
    pub fn get_opt<'a>(&self, state: &'a Value) -> Option<&'a Value> {
        self.get(state).ok()
    }

    pub fn get_mut<'a>(&self, state: &'a mut Value) -> Result<&'a mut Value, PathError> {
        let mut current = state;
        for segment in &self.segments {
            let object = current.as_object_mut().ok_or_else(|| PathError::NotAnObject {
                path: self.to_string(),
                segment: segment.clone(),
            })?;
            current = object.get_mut(segment).ok_or_else(|| PathError::Missing {
                path: self.to_string(),
                segment: segment.clone(),
            })?;
        }
        Ok(current)
    }

    /// Object that holds the last segment, creating intermediate objects
    /// on the way. Non-object intermediates are replaced by empty objects.
    pub(crate) fn parent_object_mut<'a>(
        &self,
        state: &'a mut Value,
    ) -> Result<&'a mut Map<String, Value>, PathError> {
        let (_, parents) = self.split_last();
        let mut current = state.as_object_mut().ok_or_else(|| PathError::NotAnObject {
            path: self.to_string(),
            segment: self.segments.first().cloned().unwrap_or_default(),
        })?;
        for segment in parents {
            let entry = current
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            current = entry.as_object_mut().ok_or_else(|| PathError::NotAnObject {
                path: self.to_string(),
                segment: segment.clone(),
            })?;
        }
        Ok(current)
    }

    /// Last segment and the segments before it
    pub fn split_last(&self) -> (&str, &[String]) {
        match self.segments.split_last() {
            Some((last, parents)) => (last.as_str(), parents),
            None => ("", &[]),
        }
    }
}

impl fmt::Display for StatePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

impl FromStr for StatePath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for StatePath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for StatePath {
    type Error = PathError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<StatePath> for String {
    fn from(path: StatePath) -> Self {
        path.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_rejects_empty_segments() {
        assert_eq!(StatePath::parse(""), Err(PathError::Empty));
        assert!(matches!(StatePath::parse("a..b"), Err(PathError::EmptySegment(_))));
        assert!(matches!(StatePath::parse(".a"), Err(PathError::EmptySegment(_))));
        assert_eq!(StatePath::parse("a.b").unwrap().segments(), ["a", "b"]);
    }

    #[test]
    fn test_get_names_missing_segment() {
        let state = json!({"a": {"b": 1}});
        let path = StatePath::parse("a.c.d").unwrap();
        assert_eq!(
            path.get(&state),
            Err(PathError::Missing {
                path: "a.c.d".into(),
                segment: "c".into()
            })
        );
        assert_eq!(StatePath::parse("a.b").unwrap().get(&state), Ok(&json!(1)));
    }

    #[test]
    fn test_get_through_scalar_fails() {
        let state = json!({"a": 5});
        let path = StatePath::parse("a.b").unwrap();
        assert!(matches!(path.get(&state), Err(PathError::NotAnObject { .. })));
    }

    #[test]
    fn test_serde_as_string() {
        let path: StatePath = serde_json::from_value(json!("x.y")).unwrap();
        assert_eq!(serde_json::to_value(&path).unwrap(), json!("x.y"));
        assert!(serde_json::from_value::<StatePath>(json!("x..y")).is_err());
    }

    #[test]
    fn test_parent_object_mut_creates_intermediates() {
        let mut state = json!({"a": 3});
        let path = StatePath::parse("a.b.c").unwrap();
        path.parent_object_mut(&mut state).unwrap().insert("c".into(), json!(1));
        assert_eq!(state, json!({"a": {"b": {"c": 1}}}));
    }
}

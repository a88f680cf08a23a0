//! Attribute maps attached to log records, spans and metric samples.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// A scalar attribute value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for AttributeValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<u32> for AttributeValue {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

/// An ordered map of attribute names to scalar values.
///
/// Keys are unique; inserting an existing key overwrites its value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Attributes(BTreeMap<String, AttributeValue>);

impl Attributes {
    /// Create an empty attribute map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    ///
    /// ```
    /// use appsight::Attributes;
    ///
    /// let attrs = Attributes::new().with("version", "1.0.0").with("count", 500);
    /// assert_eq!(attrs.len(), 2);
    /// ```
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert a value, returning the one it replaced.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Option<AttributeValue> {
        self.0.insert(key.into(), value.into())
    }

    /// Merge `other` into `self`; values from `other` win on conflicts.
    pub fn merge(&mut self, other: &Self) {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }

    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K, V> FromIterator<(K, V)> for Attributes
where
    K: Into<String>,
    V: Into<AttributeValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut attrs = Self::new();
        for (key, value) in iter {
            attrs.insert(key, value);
        }
        attrs
    }
}

impl fmt::Display for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (key, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key}={value}")?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_later_write_overwrites() {
        let mut attrs = Attributes::new().with("user.id", "user123");
        let previous = attrs.insert("user.id", "user456");

        assert_eq!(previous, Some(AttributeValue::from("user123")));
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs.get("user.id"), Some(&AttributeValue::from("user456")));
    }

    #[test]
    fn test_merge_prefers_other() {
        let mut base = Attributes::new().with("a", 1).with("b", true);
        let other = Attributes::new().with("b", false).with("c", 2.5);
        base.merge(&other);

        assert_eq!(base.len(), 3);
        assert_eq!(base.get("b"), Some(&AttributeValue::Bool(false)));
        assert_eq!(base.get("c"), Some(&AttributeValue::Float(2.5)));
    }

    #[test]
    fn test_from_iter_and_display() {
        let attrs: Attributes = [("b", AttributeValue::from(5)), ("a", "x".into())]
            .into_iter()
            .collect();

        // BTreeMap keeps keys sorted
        assert_eq!(attrs.to_string(), r#"{a="x", b=5}"#);
    }

    #[test]
    fn test_serializes_as_plain_object() {
        let attrs = Attributes::new()
            .with("issues_count", 5)
            .with("batch_id", "batch_001");
        let json = serde_json::to_value(&attrs).unwrap();

        assert_eq!(
            json,
            serde_json::json!({"batch_id": "batch_001", "issues_count": 5})
        );
    }
}

//! Request parameter set.
//!
//! One [`Params`] is created per request from the query string and form
//! body, then mutated in place by the router on every match. Values are
//! either scalars or ordered lists; lists may hold `None` for optional
//! groups that did not participate in a match (only ever under
//! `captures`).

use serde::Serialize;
use std::collections::HashMap;

/// Controller name taken from the first path segment.
pub const CONTROLLER: &str = "controller";
/// Action name resolved by the default `/:action` rule.
pub const ACTION: &str = "action";
/// Decoded regex captures of the last matching rule, in group order.
pub const CAPTURES: &str = "captures";
/// Values of `*` segments, in pattern order.
pub const WILDCARD: &str = "wildcard";
/// Format suffix captured by `.:format`.
pub const FORMAT: &str = "format";

/// A single parameter value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Scalar(String),
    List(Vec<Option<String>>),
}

impl ParamValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Scalar(s) => Some(s),
            ParamValue::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Option<String>]> {
        match self {
            ParamValue::Scalar(_) => None,
            ParamValue::List(items) => Some(items),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Scalar(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::Scalar(s)
    }
}

/// Mapping from parameter name to value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Params {
    entries: HashMap<String, ParamValue>,
}

impl Params {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from decoded `(name, value)` pairs; later pairs win.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut params = Self::new();
        for (k, v) in pairs {
            params.insert(k, v);
        }
        params
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.entries.get(name)
    }

    /// Scalar value by name. Lists return `None`.
    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.entries.get(name).and_then(ParamValue::as_str)
    }

    #[must_use]
    pub fn get_list(&self, name: &str) -> Option<&[Option<String>]> {
        self.entries.get(name).and_then(ParamValue::as_list)
    }

    /// Overwrite `name` with a scalar.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries
            .insert(name.into(), ParamValue::Scalar(value.into()));
    }

    /// Append to the list under `name`, replacing a scalar if one is there.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let value = Some(value.into());
        match self.entries.entry(name.into()) {
            std::collections::hash_map::Entry::Occupied(mut slot) => match slot.get_mut() {
                ParamValue::List(items) => items.push(value),
                scalar @ ParamValue::Scalar(_) => *scalar = ParamValue::List(vec![value]),
            },
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(ParamValue::List(vec![value]));
            }
        }
    }

    pub fn set_captures(&mut self, captures: Vec<Option<String>>) {
        self.entries
            .insert(CAPTURES.to_string(), ParamValue::List(captures));
    }

    #[must_use]
    pub fn captures(&self) -> Option<&[Option<String>]> {
        self.get_list(CAPTURES)
    }

    /// `*` values in pattern order; empty when no wildcard matched.
    #[must_use]
    pub fn wildcard(&self) -> Vec<&str> {
        self.get_list(WILDCARD)
            .map(|items| items.iter().flatten().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn remove(&mut self, name: &str) -> Option<ParamValue> {
        self.entries.remove(name)
    }

    #[must_use]
    pub fn contains_key(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// JSON object view, used by auto-render and the echo action.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        // string keys and values only, so serialization cannot fail
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_insert_overwrites_scalar() {
        let mut p = Params::new();
        p.insert("id", "1");
        p.insert("id", "2");
        assert_eq!(p.get_str("id"), Some("2"));
    }

    #[test]
    fn test_push_accumulates() {
        let mut p = Params::new();
        p.push(WILDCARD, "a");
        p.push(WILDCARD, "b");
        assert_eq!(p.wildcard(), vec!["a", "b"]);
        assert_eq!(p.get_str(WILDCARD), None);
    }

    #[test]
    fn test_to_json_keeps_nulls_in_captures() {
        let mut p = Params::from_pairs([("controller", "post")]);
        p.set_captures(vec![Some("edit".into()), None, None]);
        assert_eq!(
            p.to_json(),
            json!({"controller": "post", "captures": ["edit", null, null]})
        );
    }
}

use std::collections::HashMap;

use serde_json::{Map, Value};

/// Flattened claims of a verified credential: claim name to string values.
///
/// Array claims contribute one value per element, scalar claims are
/// stringified, and blank values are dropped so "first non-empty" lookups
/// reduce to "first present".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClaimSet {
    claims: HashMap<String, Vec<String>>,
}

impl ClaimSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a decoded JWT payload.
    pub fn from_json(payload: &Map<String, Value>) -> Self {
        let mut set = Self::new();
        for (name, value) in payload {
            set.insert_value(name, value);
        }
        set
    }

    fn insert_value(&mut self, name: &str, value: &Value) {
        match value {
            Value::String(s) => self.insert(name, s.as_str()),
            Value::Number(n) => self.insert(name, n.to_string()),
            Value::Bool(b) => self.insert(name, b.to_string()),
            Value::Array(items) => {
                for item in items {
                    self.insert_value(name, item);
                }
            }
            Value::Null | Value::Object(_) => {}
        }
    }

    /// Add a value under `name`. Blank values are ignored.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let value = value.into();
        if value.trim().is_empty() {
            return;
        }
        self.claims.entry(name.into()).or_default().push(value);
    }

    /// Builder form of [`ClaimSet::insert`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn first(&self, name: &str) -> Option<&str> {
        self.claims
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// First value of the first claim in `names` that is present.
    pub fn first_of(&self, names: &[&str]) -> Option<&str> {
        names.iter().find_map(|name| self.first(name))
    }

    /// Every value of every claim in `names`, in order.
    pub fn values_of<'a>(&'a self, names: &'a [&'a str]) -> impl Iterator<Item = &'a str> + 'a {
        names
            .iter()
            .filter_map(move |name| self.claims.get(*name))
            .flat_map(|values| values.iter().map(String::as_str))
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}

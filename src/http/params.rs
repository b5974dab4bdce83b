//! Key/value parameters decoded from query strings and urlencoded forms.
//!
//! A key seen once maps to a single string; a key seen again is promoted to
//! a list holding every value in order of appearance.

use std::collections::btree_map::{self, BTreeMap};

use serde::Serialize;

/// Value of one parameter key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    One(String),
    Many(Vec<String>),
}

impl ParamValue {
    /// The first value for the key.
    pub fn first(&self) -> &str {
        match self {
            ParamValue::One(value) => value,
            ParamValue::Many(values) => values.first().map(String::as_str).unwrap_or_default(),
        }
    }

    /// Every value for the key, in order of appearance.
    pub fn all(&self) -> Vec<&str> {
        match self {
            ParamValue::One(value) => vec![value.as_str()],
            ParamValue::Many(values) => values.iter().map(String::as_str).collect(),
        }
    }

    pub fn is_many(&self) -> bool {
        matches!(self, ParamValue::Many(_))
    }

    fn push(&mut self, value: String) {
        match self {
            ParamValue::One(first) => {
                let first = std::mem::take(first);
                *self = ParamValue::Many(vec![first, value]);
            }
            ParamValue::Many(values) => values.push(value),
        }
    }
}

/// Parsed `application/x-www-form-urlencoded` data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ParamMap(BTreeMap<String, ParamValue>);

impl ParamMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode urlencoded input (`a=1&b=2&a=3`).
    pub fn parse(input: &[u8]) -> Self {
        let mut map = Self::new();
        for (key, value) in form_urlencoded::parse(input) {
            map.append(key.into_owned(), value.into_owned());
        }
        map
    }

    /// Add a value, promoting the key to a list if it already exists.
    pub fn append(&mut self, key: String, value: String) {
        match self.0.entry(key) {
            btree_map::Entry::Vacant(slot) => {
                slot.insert(ParamValue::One(value));
            }
            btree_map::Entry::Occupied(mut slot) => slot.get_mut().push(value),
        }
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    /// First value of `key`.
    pub fn first(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(ParamValue::first)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

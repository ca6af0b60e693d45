//! Key/value parameter sets sent with every Bot API call.
//!
//! # Design
//! The API accepts flat string fields. Scalars are written as text, and only
//! when they differ from their zero value so unset optionals never reach the
//! wire. Structured fields (keyboards, entity lists, command scopes) are
//! written as JSON text. A `BTreeMap` keeps field order stable, which makes
//! debug logs and encoded bodies deterministic.

use std::collections::btree_map;
use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::ParamsError;

/// Field name to string value, as sent to the API.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(BTreeMap<String, String>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
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

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Add `value` unless it is empty.
    pub fn add_non_empty(&mut self, key: &str, value: &str) {
        if !value.is_empty() {
            self.insert(key, value);
        }
    }

    /// Add `value` unless it equals the type's zero value.
    pub fn add_non_zero<T>(&mut self, key: &str, value: T)
    where
        T: Default + PartialEq + ToString,
    {
        if value != T::default() {
            self.insert(key, value.to_string());
        }
    }

    /// Add `true` flags; `false` is the API default and is omitted.
    pub fn add_bool(&mut self, key: &str, value: bool) {
        if value {
            self.insert(key, "true");
        }
    }

    /// Add a chat target, preferring the numeric id over the channel handle.
    pub fn add_first_valid(&mut self, key: &str, id: i64, handle: &str) {
        if id != 0 {
            self.insert(key, id.to_string());
        } else {
            self.add_non_empty(key, handle);
        }
    }

    /// Add `value` serialized as JSON text.
    pub fn add_json<T>(&mut self, key: &str, value: &T) -> Result<(), ParamsError>
    where
        T: Serialize + ?Sized,
    {
        let encoded = serde_json::to_string(value).map_err(|source| ParamsError {
            field: key.to_string(),
            source,
        })?;
        self.insert(key, encoded);
        Ok(())
    }

    pub fn add_json_opt<T: Serialize>(
        &mut self,
        key: &str,
        value: Option<&T>,
    ) -> Result<(), ParamsError> {
        match value {
            Some(value) => self.add_json(key, value),
            None => Ok(()),
        }
    }

    /// Add a JSON list, skipping it entirely when empty.
    pub fn add_json_non_empty<T: Serialize>(
        &mut self,
        key: &str,
        values: &[T],
    ) -> Result<(), ParamsError> {
        if values.is_empty() {
            return Ok(());
        }
        self.add_json(key, values)
    }

    /// Render as an `application/x-www-form-urlencoded` body.
    pub fn encode_form(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.iter())
            .finish()
    }
}

impl IntoIterator for Params {
    type Item = (String, String);
    type IntoIter = btree_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for Params {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        params.extend(iter);
        params
    }
}

// src/config/values.rs

//! Key/value configuration handed to schedules, processes and edges.
//!
//! Keys are plain strings; nested blocks use `:` as a separator
//! (`edge:capacity`). Values are stored as strings and parsed on access.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::errors::{Result, SchedError};

/// Separator between a block name and the key inside it.
pub const BLOCK_SEP: char = ':';

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    values: BTreeMap<String, String>,
}

impl Config {
    /// A configuration without any values.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn set_value(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Builder-style variant of [`Config::set_value`].
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_value(key, value);
        self
    }

    pub fn has_value(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Raw string value for `key`, if present.
    pub fn raw_value(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Parse the value stored under `key`.
    pub fn get_value<T>(&self, key: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        let raw = self
            .values
            .get(key)
            .ok_or_else(|| SchedError::NoSuchConfigValue(key.to_string()))?;

        raw.trim().parse::<T>().map_err(|e| SchedError::BadConfigValue {
            key: key.to_string(),
            reason: format!("cannot parse {raw:?}: {e}"),
        })
    }

    /// Like [`Config::get_value`], but falls back to `default` when the key
    /// is absent. A present but unparsable value is still an error.
    pub fn get_value_or<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        if self.has_value(key) {
            self.get_value(key)
        } else {
            Ok(default)
        }
    }

    /// Extract every `prefix:<rest>` entry as a new config keyed by `<rest>`.
    pub fn subblock(&self, prefix: &str) -> Config {
        let values = self
            .values
            .iter()
            .filter_map(|(key, value)| {
                let rest = key.strip_prefix(prefix)?.strip_prefix(BLOCK_SEP)?;
                Some((rest.to_string(), value.clone()))
            })
            .collect();

        Config { values }
    }

    /// Copy all values from `other` into `self`, overwriting existing keys.
    pub fn merge(&mut self, other: &Config) {
        for (key, value) in &other.values {
            self.values.insert(key.clone(), value.clone());
        }
    }
}

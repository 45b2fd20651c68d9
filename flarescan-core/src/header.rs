//! Observation header values consumed by the pipeline.

use crate::error::{Error, Result};
use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Key/value header of an event list.
///
/// Values are kept as the raw strings delivered by the extractor; typed
/// accessors parse them on demand.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ObservationHeader {
    entries: BTreeMap<String, String>,
}

impl ObservationHeader {
    /// Creates an empty header.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a keyword.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Sets a keyword, builder style.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.insert(key, value.to_string());
        self
    }

    /// Raw value of a keyword.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Iterates over all keywords in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Parses a keyword as a float.
    ///
    /// # Errors
    /// Returns [`Error::HeaderError`] if the keyword is missing or not a number.
    pub fn float(&self, key: &str) -> Result<f64> {
        let raw = self.get(key).ok_or_else(|| Error::HeaderError {
            key: key.to_string(),
            reason: "missing".into(),
        })?;
        raw.trim().parse::<f64>().map_err(|e| Error::HeaderError {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    /// Observation identifier (`OBS_ID`).
    #[must_use]
    pub fn observation_id(&self) -> Option<&str> {
        self.get("OBS_ID")
    }

    /// Acquisition submode (`SUBMODE`).
    #[must_use]
    pub fn submode(&self) -> Option<&str> {
        self.get("SUBMODE")
    }
}

//! Therapist records and the directory that holds them.

use std::collections::BTreeMap;
use std::path::Path;

use blossom_core::Result;
use blossom_core::error::StorageError;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info};

use crate::fuzzy::closest;
use crate::index::AttributeIndex;

/// One therapist as stored in `therapists.json`.
///
/// Fields beyond the filterable ones (bio, qualifications, ...) are kept
/// in `extra` so profile lookups can show them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TherapistRecord {
    #[serde(default)]
    pub gender: Option<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub languages: Vec<String>,

    #[serde(default, alias = "target_age_group", deserialize_with = "null_as_default")]
    pub patient_age_group: BTreeMap<String, bool>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub specialisations: Vec<String>,

    /// Day → `[start, end]`, or null when unavailable that day.
    #[serde(default, deserialize_with = "null_as_default")]
    pub availability: BTreeMap<String, Option<[String; 2]>>,

    /// Therapy type → price band → price, or null when not offered.
    #[serde(default, deserialize_with = "null_as_default")]
    pub rates: BTreeMap<String, BTreeMap<String, Option<f64>>>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// A JSON `null` reads as the empty collection.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// The loaded provider directory plus its attribute index.
#[derive(Debug, Clone, Default)]
pub struct TherapistDirectory {
    records: BTreeMap<String, TherapistRecord>,
    index: AttributeIndex,
}

impl TherapistDirectory {
    pub fn new(records: BTreeMap<String, TherapistRecord>) -> Self {
        let index = AttributeIndex::build(&records);
        Self { records, index }
    }

    /// Load from a JSON file keyed by therapist name. A missing file is an
    /// empty directory.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "No therapist directory found, starting empty");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| StorageError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let records: BTreeMap<String, TherapistRecord> =
            serde_json::from_str(&content).map_err(|e| StorageError::Corrupted {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        debug!(path = %path.display(), therapists = records.len(), "Therapist directory loaded");
        Ok(Self::new(records))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(|s| s.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&TherapistRecord> {
        self.records.get(name)
    }

    pub fn index(&self) -> &AttributeIndex {
        &self.index
    }

    /// Resolve `name` to a therapist, exactly or else by closest edit
    /// distance, and return the resolved name with a pruned profile.
    ///
    /// `None` only when the directory is empty.
    pub fn lookup_provider(&self, name: &str) -> Option<(String, serde_json::Value)> {
        let resolved = if self.records.contains_key(name) {
            name
        } else {
            closest(name, self.names())?
        };

        let record = self.records.get(resolved)?;
        let value = serde_json::to_value(record).ok()?;
        let profile = prune(value).unwrap_or_else(|| serde_json::json!({}));

        debug!(query = name, resolved, "Therapist lookup");
        Some((resolved.to_string(), profile))
    }
}

/// Drop nulls and `false` recursively, then any object or array the
/// removal left empty. Returns `None` when nothing survives.
fn prune(value: serde_json::Value) -> Option<serde_json::Value> {
    use serde_json::Value;

    match value {
        Value::Null | Value::Bool(false) => None,
        Value::Object(map) => {
            let pruned: serde_json::Map<String, Value> = map
                .into_iter()
                .filter_map(|(k, v)| prune(v).map(|v| (k, v)))
                .collect();
            (!pruned.is_empty()).then_some(Value::Object(pruned))
        }
        Value::Array(items) => {
            let pruned: Vec<Value> = items.into_iter().filter_map(prune).collect();
            (!pruned.is_empty()).then_some(Value::Array(pruned))
        }
        other => Some(other),
    }
}

//! Id-map: vector id → (question, answer), plus the next unused id.
//!
//! On disk this is a JSON object keyed by the decimal id, each value a
//! `[question, answer]` pair, with the reserved `__counter` key holding
//! the next id to hand out.

use std::collections::BTreeMap;
use std::path::Path;

use blossom_core::error::StorageError;

const COUNTER_KEY: &str = "__counter";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdMap {
    entries: BTreeMap<u64, (String, String)>,
    counter: u64,
}

impl IdMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The next id [`IdMap::insert`] will assign.
    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// Record a pair under a fresh id and return it.
    pub fn insert(&mut self, question: String, answer: String) -> u64 {
        let id = self.counter;
        self.entries.insert(id, (question, answer));
        self.counter += 1;
        id
    }

    pub fn remove(&mut self, id: u64) -> Option<(String, String)> {
        self.entries.remove(&id)
    }

    pub fn get(&self, id: u64) -> Option<(&str, &str)> {
        self.entries
            .get(&id)
            .map(|(q, a)| (q.as_str(), a.as_str()))
    }

    /// Replace the answer stored for `id`. Returns false if `id` is unknown.
    pub fn set_answer(&mut self, id: u64, answer: String) -> bool {
        match self.entries.get_mut(&id) {
            Some(entry) => {
                entry.1 = answer;
                true
            }
            None => false,
        }
    }

    /// Id of the entry holding `question`.
    pub fn find_question(&self, question: &str) -> Option<u64> {
        self.entries
            .iter()
            .find(|(_, (q, _))| q == question)
            .map(|(id, _)| *id)
    }

    pub fn ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.entries.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, &str, &str)> {
        self.entries
            .iter()
            .map(|(id, (q, a))| (*id, q.as_str(), a.as_str()))
    }

    /// Forget every entry and restart ids at zero.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.counter = 0;
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for (id, (q, a)) in &self.entries {
            map.insert(id.to_string(), serde_json::json!([q, a]));
        }
        map.insert(COUNTER_KEY.into(), serde_json::json!(self.counter));
        serde_json::Value::Object(map)
    }

    pub fn from_json(value: &serde_json::Value) -> Result<Self, String> {
        let object = value
            .as_object()
            .ok_or_else(|| "id-map must be a JSON object".to_string())?;

        let mut map = Self::new();
        for (key, value) in object {
            if key == COUNTER_KEY {
                map.counter = value
                    .as_u64()
                    .ok_or_else(|| format!("{COUNTER_KEY} must be a non-negative integer"))?;
                continue;
            }
            let id: u64 = key
                .parse()
                .map_err(|_| format!("invalid id key '{key}'"))?;
            let pair: (String, String) = serde_json::from_value(value.clone())
                .map_err(|e| format!("entry {id}: {e}"))?;
            map.entries.insert(id, pair);
        }

        // Never hand out an id that is already taken.
        if let Some(max) = map.entries.keys().next_back() {
            map.counter = map.counter.max(max + 1);
        }
        Ok(map)
    }

    pub fn load(path: &Path) -> Result<Self, StorageError> {
        let content = std::fs::read_to_string(path).map_err(|e| StorageError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let value: serde_json::Value =
            serde_json::from_str(&content).map_err(|e| StorageError::Corrupted {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        Self::from_json(&value).map_err(|reason| StorageError::Corrupted {
            path: path.display().to_string(),
            reason,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, StorageError> {
        serde_json::to_vec_pretty(&self.to_json()).map_err(|e| StorageError::Write {
            path: "id map".into(),
            reason: e.to_string(),
        })
    }
}

//! Document metadata keyed by namespaced key and by internal id.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::IndexError;
use crate::vector::InternalId;

/// Build the globally unique `"namespace:external_id"` key.
#[must_use]
pub fn namespaced_key(namespace: &str, external_id: &str) -> String {
    format!("{namespace}:{external_id}")
}

/// A document about to be inserted: everything except its internal id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentDraft {
    pub namespace: String,
    pub external_id: String,
    pub ticker: String,
    pub doc_type: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
    pub full_text: String,
}

impl DocumentDraft {
    #[must_use]
    pub fn namespaced_key(&self) -> String {
        namespaced_key(&self.namespace, &self.external_id)
    }

    #[must_use]
    pub fn into_record(self, internal_id: InternalId) -> DocumentRecord {
        DocumentRecord {
            internal_id,
            namespaced_key: namespaced_key(&self.namespace, &self.external_id),
            namespace: self.namespace,
            ticker: self.ticker,
            doc_type: self.doc_type,
            attributes: self.attributes,
            full_text: self.full_text,
        }
    }
}

/// Metadata for one stored vector. Immutable once inserted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub internal_id: InternalId,
    pub namespaced_key: String,
    pub namespace: String,
    pub ticker: String,
    pub doc_type: String,
    pub attributes: BTreeMap<String, serde_json::Value>,
    pub full_text: String,
}

impl DocumentRecord {
    /// The caller-supplied id, i.e. the key with its namespace prefix removed.
    #[must_use]
    pub fn external_id(&self) -> &str {
        self.namespaced_key
            .strip_prefix(self.namespace.as_str())
            .and_then(|rest| rest.strip_prefix(':'))
            .unwrap_or(&self.namespaced_key)
    }
}

/// Result of [`DocumentStore::purge_where`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeOutcome {
    /// Pre-purge ids of the surviving records, in their original order.
    /// Survivor `i` now carries internal id `i`.
    pub retained: Vec<InternalId>,
    pub removed: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentStore {
    records: BTreeMap<InternalId, DocumentRecord>,
    keys: HashMap<String, InternalId>,
}

impl DocumentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn exists(&self, namespaced_key: &str) -> bool {
        self.keys.contains_key(namespaced_key)
    }

    /// Store `record` under its key and id.
    ///
    /// This is not an upsert: callers check [`DocumentStore::exists`] first.
    ///
    /// # Errors
    ///
    /// [`IndexError::DuplicateKey`] if the key is already present,
    /// [`IndexError::IdInUse`] if the id already maps to a record.
    pub fn put(&mut self, record: DocumentRecord) -> Result<(), IndexError> {
        if self.keys.contains_key(&record.namespaced_key) {
            return Err(IndexError::DuplicateKey(record.namespaced_key));
        }
        if self.records.contains_key(&record.internal_id) {
            return Err(IndexError::IdInUse(record.internal_id));
        }
        self.keys
            .insert(record.namespaced_key.clone(), record.internal_id);
        self.records.insert(record.internal_id, record);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, internal_id: InternalId) -> Option<&DocumentRecord> {
        self.records.get(&internal_id)
    }

    #[must_use]
    pub fn get_by_key(&self, namespaced_key: &str) -> Option<&DocumentRecord> {
        self.keys
            .get(namespaced_key)
            .and_then(|id| self.records.get(id))
    }

    /// Records in ascending internal-id order.
    pub fn iter(&self) -> impl Iterator<Item = &DocumentRecord> {
        self.records.values()
    }

    /// Remove every record matching `predicate` and renumber the survivors
    /// densely, preserving their relative order.
    ///
    /// The returned `retained` list drives [`crate::VectorIndex::compact`].
    pub fn purge_where<P>(&mut self, predicate: P) -> PurgeOutcome
    where
        P: Fn(&DocumentRecord) -> bool,
    {
        let before = self.records.len();
        let mut retained = Vec::with_capacity(before);
        let mut records = BTreeMap::new();
        let mut keys = HashMap::with_capacity(before);

        for (old_id, mut record) in std::mem::take(&mut self.records) {
            if predicate(&record) {
                continue;
            }
            let new_id = retained.len() as InternalId;
            retained.push(old_id);
            record.internal_id = new_id;
            keys.insert(record.namespaced_key.clone(), new_id);
            records.insert(new_id, record);
        }

        self.records = records;
        self.keys = keys;
        PurgeOutcome {
            removed: before - retained.len(),
            retained,
        }
    }

    /// Internal-id → record map with string keys, as persisted.
    #[must_use]
    pub fn metadata_by_id(&self) -> BTreeMap<String, &DocumentRecord> {
        self.records
            .iter()
            .map(|(id, record)| (id.to_string(), record))
            .collect()
    }

    /// Namespaced-key → internal-id map, as persisted.
    #[must_use]
    pub fn id_map(&self) -> BTreeMap<&str, InternalId> {
        self.keys.iter().map(|(k, id)| (k.as_str(), *id)).collect()
    }

    /// Rebuild a store from its two persisted maps, checking that they agree.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Corrupt`] if an id key does not parse, a record's
    /// id or key disagrees with the maps, or the maps differ in size.
    pub fn from_parts(
        metadata: BTreeMap<String, DocumentRecord>,
        id_map: HashMap<String, InternalId>,
    ) -> Result<Self, IndexError> {
        if metadata.len() != id_map.len() {
            return Err(IndexError::Corrupt(format!(
                "metadata has {} records but id map has {} keys",
                metadata.len(),
                id_map.len()
            )));
        }

        let mut records = BTreeMap::new();
        for (raw_id, record) in metadata {
            let id: InternalId = raw_id
                .parse()
                .map_err(|_| IndexError::Corrupt(format!("non-numeric record id '{raw_id}'")))?;
            if record.internal_id != id {
                return Err(IndexError::Corrupt(format!(
                    "record stored under id {id} claims id {}",
                    record.internal_id
                )));
            }
            if id_map.get(&record.namespaced_key) != Some(&id) {
                return Err(IndexError::Corrupt(format!(
                    "id map disagrees with record {id} ({})",
                    record.namespaced_key
                )));
            }
            records.insert(id, record);
        }

        Ok(Self {
            records,
            keys: id_map,
        })
    }
}

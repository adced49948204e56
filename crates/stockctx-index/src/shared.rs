//! Process-wide handle over the vector arena and its metadata.
//!
//! The arena has no internal synchronisation, so every mutation (the
//! existence check, the append, and the metadata put) runs inside one write
//! critical section. Searches share a read lock and never see a half-finished
//! insert. Saving holds the write lock for the whole snapshot so the files on
//! disk describe a single point in time.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::IndexError;
use crate::snapshot::{IndexStats, PersistenceManager};
use crate::store::{DocumentDraft, DocumentRecord, DocumentStore};
use crate::vector::{InternalId, SearchHit, VectorIndex};

/// What [`SharedIndex::insert`] did with a draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(InternalId),
    /// The namespaced key was already stored; nothing changed.
    AlreadyPresent,
}

struct IndexState {
    index: VectorIndex,
    store: DocumentStore,
}

pub struct SharedIndex {
    state: RwLock<IndexState>,
    persistence: PersistenceManager,
}

impl SharedIndex {
    /// Load the last snapshot (or start empty) and wrap it.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::DimensionMismatch`] if the snapshot on disk was
    /// built for another embedding dimension.
    pub fn open(persistence: PersistenceManager) -> Result<Self, IndexError> {
        let loaded = persistence.load()?;
        Ok(Self {
            state: RwLock::new(IndexState {
                index: loaded.index,
                store: loaded.store,
            }),
            persistence,
        })
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.read().index.dimension()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read().index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().index.is_empty()
    }

    #[must_use]
    pub fn contains(&self, namespaced_key: &str) -> bool {
        self.read().store.exists(namespaced_key)
    }

    #[must_use]
    pub fn get(&self, internal_id: InternalId) -> Option<DocumentRecord> {
        self.read().store.get(internal_id).cloned()
    }

    /// Insert `draft` with its embedding as one unit.
    ///
    /// Returns [`InsertOutcome::AlreadyPresent`] without touching anything if
    /// the draft's key is stored already.
    ///
    /// # Errors
    ///
    /// [`IndexError::DimensionMismatch`] or [`IndexError::NonFinite`] from the
    /// arena; nothing is stored in either half on error.
    pub fn insert(
        &self,
        draft: DocumentDraft,
        vector: Vec<f32>,
    ) -> Result<InsertOutcome, IndexError> {
        let mut state = self.write();
        if state.store.exists(&draft.namespaced_key()) {
            return Ok(InsertOutcome::AlreadyPresent);
        }
        let id = state.index.add(vector)?;
        state.store.put(draft.into_record(id))?;
        Ok(InsertOutcome::Inserted(id))
    }

    /// Exact top-`k` search over every namespace.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::DimensionMismatch`] for a wrongly sized query.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, IndexError> {
        self.read().index.search(query, k)
    }

    /// Run `f` against the arena and store under a single read lock.
    pub fn with_read<R>(&self, f: impl FnOnce(&VectorIndex, &DocumentStore) -> R) -> R {
        let state = self.read();
        f(&state.index, &state.store)
    }

    /// Remove every record for `ticker` (optionally only within `namespace`)
    /// and compact the arena. Survivors are renumbered densely in their
    /// original order. Returns the number of removed documents.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::UnknownId`] if the store and arena have drifted
    /// apart; in that case neither half is modified.
    pub fn purge(&self, ticker: &str, namespace: Option<&str>) -> Result<usize, IndexError> {
        let mut state = self.write();

        let mut store = state.store.clone();
        let outcome = store.purge_where(|r| {
            r.ticker == ticker && namespace.is_none_or(|ns| r.namespace == ns)
        });
        if outcome.removed == 0 {
            return Ok(0);
        }

        let index = state.index.compact(&outcome.retained)?;
        state.index = index;
        state.store = store;

        tracing::info!(
            ticker,
            namespace = namespace.unwrap_or("*"),
            removed = outcome.removed,
            remaining = outcome.retained.len(),
            "purged documents and compacted index"
        );
        Ok(outcome.removed)
    }

    /// Snapshot to disk while holding the write lock.
    ///
    /// # Errors
    ///
    /// Propagates [`PersistenceManager::save`] failures; the previous snapshot
    /// stays intact.
    pub fn save(&self) -> Result<(), IndexError> {
        let state = self.write();
        self.persistence.save(&state.index, &state.store)
    }

    #[must_use]
    pub fn stats(&self) -> IndexStats {
        let state = self.read();
        PersistenceManager::stats(&state.index, &state.store)
    }

    fn read(&self) -> RwLockReadGuard<'_, IndexState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, IndexState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashSet};
    use std::sync::Arc;

    use super::*;

    fn draft(namespace: &str, id: &str, ticker: &str) -> DocumentDraft {
        DocumentDraft {
            namespace: namespace.to_string(),
            external_id: id.to_string(),
            ticker: ticker.to_string(),
            doc_type: "social_post".to_string(),
            attributes: BTreeMap::new(),
            full_text: format!("post {id}"),
        }
    }

    fn basis(dimension: usize, i: usize) -> Vec<f32> {
        let mut v = vec![0.1; dimension];
        v[i % dimension] = 1.0 + i as f32;
        v
    }

    fn open_in(dir: &std::path::Path, dimension: usize) -> SharedIndex {
        SharedIndex::open(PersistenceManager::new(dir, dimension)).unwrap()
    }

    #[test]
    fn insert_then_contains_and_get() {
        let dir = tempfile::tempdir().unwrap();
        let shared = open_in(dir.path(), 4);

        let outcome = shared.insert(draft("news", "a", "AAPL"), basis(4, 0)).unwrap();
        assert_eq!(outcome, InsertOutcome::Inserted(0));
        assert!(shared.contains("news:a"));
        assert_eq!(shared.get(0).unwrap().ticker, "AAPL");
        assert_eq!(shared.len(), 1);
    }

    #[test]
    fn second_insert_of_same_key_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let shared = open_in(dir.path(), 4);
        shared.insert(draft("news", "a", "AAPL"), basis(4, 0)).unwrap();

        let outcome = shared.insert(draft("news", "a", "AAPL"), basis(4, 1)).unwrap();
        assert_eq!(outcome, InsertOutcome::AlreadyPresent);
        assert_eq!(shared.len(), 1);
    }

    #[test]
    fn wrong_dimension_leaves_both_halves_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let shared = open_in(dir.path(), 4);
        let err = shared
            .insert(draft("news", "a", "AAPL"), vec![1.0, 2.0])
            .unwrap_err();
        assert!(matches!(err, IndexError::DimensionMismatch { .. }));
        assert!(!shared.contains("news:a"));
        assert!(shared.is_empty());
    }

    #[test]
    fn concurrent_inserts_get_unique_ids() {
        let dir = tempfile::tempdir().unwrap();
        let shared = Arc::new(open_in(dir.path(), 8));

        std::thread::scope(|scope| {
            for worker in 0..5 {
                let shared = Arc::clone(&shared);
                scope.spawn(move || {
                    for i in 0..20 {
                        let key = format!("w{worker}-{i}");
                        shared
                            .insert(draft("sentiment", &key, "TSLA"), basis(8, worker * 20 + i))
                            .unwrap();
                        let _ = shared.search(&basis(8, i), 3).unwrap();
                    }
                });
            }
        });

        assert_eq!(shared.len(), 100);
        let stats = shared.stats();
        assert_eq!(stats.record_count, 100);
        let ids: HashSet<InternalId> = shared.with_read(|_, store| {
            store.iter().map(|r| r.internal_id).collect()
        });
        assert_eq!(ids, (0..100).collect());
    }

    #[test]
    fn purge_compacts_and_preserves_survivors() {
        let dir = tempfile::tempdir().unwrap();
        let shared = open_in(dir.path(), 4);
        let tickers = ["AAPL", "TSLA", "AAPL", "TSLA", "MSFT"];
        for (i, t) in tickers.iter().enumerate() {
            shared
                .insert(draft("news", &format!("d{i}"), t), basis(4, i))
                .unwrap();
        }
        let before: Vec<Vec<f32>> = shared.with_read(|index, _| {
            [0, 2, 4].iter().map(|&id| index.reconstruct(id).unwrap()).collect()
        });

        let removed = shared.purge("TSLA", None).unwrap();

        assert_eq!(removed, 2);
        assert_eq!(shared.len(), 3);
        shared.with_read(|index, store| {
            let keys: Vec<&str> = store.iter().map(|r| r.namespaced_key.as_str()).collect();
            assert_eq!(keys, vec!["news:d0", "news:d2", "news:d4"]);
            for (new_id, expected) in before.iter().enumerate() {
                assert_eq!(&index.reconstruct(new_id as InternalId).unwrap(), expected);
            }
        });
        assert!(!shared.contains("news:d1"));
    }

    #[test]
    fn purge_can_be_scoped_to_a_namespace() {
        let dir = tempfile::tempdir().unwrap();
        let shared = open_in(dir.path(), 4);
        shared.insert(draft("news", "a", "AAPL"), basis(4, 0)).unwrap();
        shared.insert(draft("sentiment", "b", "AAPL"), basis(4, 1)).unwrap();

        assert_eq!(shared.purge("AAPL", Some("sentiment")).unwrap(), 1);
        assert!(shared.contains("news:a"));
        assert!(!shared.contains("sentiment:b"));
    }

    #[test]
    fn purge_of_unknown_ticker_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let shared = open_in(dir.path(), 4);
        shared.insert(draft("news", "a", "AAPL"), basis(4, 0)).unwrap();
        assert_eq!(shared.purge("NVDA", None).unwrap(), 0);
        assert_eq!(shared.len(), 1);
    }

    #[test]
    fn ids_continue_after_purge() {
        let dir = tempfile::tempdir().unwrap();
        let shared = open_in(dir.path(), 4);
        shared.insert(draft("news", "a", "TSLA"), basis(4, 0)).unwrap();
        shared.insert(draft("news", "b", "AAPL"), basis(4, 1)).unwrap();
        shared.purge("TSLA", None).unwrap();

        let outcome = shared.insert(draft("news", "c", "AAPL"), basis(4, 2)).unwrap();
        assert_eq!(outcome, InsertOutcome::Inserted(1));
    }

    #[test]
    fn saved_state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let shared = open_in(dir.path(), 4);
            shared.insert(draft("news", "a", "AAPL"), basis(4, 0)).unwrap();
            shared.insert(draft("sentiment", "b", "AAPL"), basis(4, 1)).unwrap();
            shared.save().unwrap();
            shared.insert(draft("news", "unsaved", "AAPL"), basis(4, 2)).unwrap();
        }

        let reopened = open_in(dir.path(), 4);
        assert_eq!(reopened.len(), 2);
        assert!(reopened.contains("news:a"));
        assert!(reopened.contains("sentiment:b"));
        assert!(!reopened.contains("news:unsaved"));
        let hits = reopened.search(&basis(4, 1), 1).unwrap();
        assert_eq!(hits[0].id, 1);
    }
}

//! All-or-nothing snapshot persistence for the index and its metadata.
//!
//! Every save writes a fresh generation directory holding three artifacts:
//!
//! | File | Contents |
//! |------|----------|
//! | `vectors.bin` | [`VectorIndex::to_bytes`] blob |
//! | `metadata.json` | internal id (as string) → [`DocumentRecord`] |
//! | `id_map.json` | namespaced key → internal id |
//!
//! The `CURRENT` file names the live generation (`gen-<n>`). It is replaced
//! by a single rename once the new generation is fully on disk, so a reader
//! sees either the old snapshot or the new one and never a mix.
//!
//! There is no write-ahead log: whatever was inserted after the last
//! successful [`PersistenceManager::save`] is gone after a crash.

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::IndexError;
use crate::store::{DocumentRecord, DocumentStore};
use crate::vector::{InternalId, VectorIndex};

const VECTORS_FILE: &str = "vectors.bin";
const METADATA_FILE: &str = "metadata.json";
const ID_MAP_FILE: &str = "id_map.json";
const CURRENT_FILE: &str = "CURRENT";
const CURRENT_TMP_FILE: &str = "CURRENT.tmp";
const GENERATION_PREFIX: &str = "gen-";

/// Counts reported by [`PersistenceManager::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub vector_count: usize,
    pub record_count: usize,
    pub dimension: usize,
}

/// The two halves restored by [`PersistenceManager::load`].
#[derive(Debug)]
pub struct LoadedSnapshot {
    pub index: VectorIndex,
    pub store: DocumentStore,
}

#[derive(Debug, Clone)]
pub struct PersistenceManager {
    dir: PathBuf,
    dimension: usize,
}

impl PersistenceManager {
    /// `dimension` is the embedding size the running process is configured
    /// for; snapshots built for another size are refused on load.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, dimension: usize) -> Self {
        Self {
            dir: dir.into(),
            dimension,
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Directory of the generation `CURRENT` points at, if there is one.
    #[must_use]
    pub fn live_dir(&self) -> Option<PathBuf> {
        self.current_generation().map(|n| self.generation_dir(n))
    }

    /// Write the three artifacts as one unit.
    ///
    /// The artifacts are written and fsynced into a new generation
    /// directory, then `CURRENT` is switched to it with one rename. Any
    /// failure before the switch removes the new generation and leaves the
    /// previous snapshot live. Older generations are removed after the
    /// switch.
    ///
    /// # Errors
    ///
    /// [`IndexError::DimensionMismatch`] if `index` was built for another
    /// dimension, [`IndexError::Json`] on encoding failure, and
    /// [`IndexError::Io`] on any filesystem failure.
    pub fn save(&self, index: &VectorIndex, store: &DocumentStore) -> Result<(), IndexError> {
        if index.dimension() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: index.dimension(),
            });
        }

        let artifacts = [
            (VECTORS_FILE, index.to_bytes()),
            (METADATA_FILE, serde_json::to_vec(&store.metadata_by_id())?),
            (ID_MAP_FILE, serde_json::to_vec(&store.id_map())?),
        ];

        fs::create_dir_all(&self.dir).map_err(|source| IndexError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let generation = self.current_generation().map_or(1, |n| n + 1);
        let staging = self.generation_dir(generation);
        if let Err(e) = stage_generation(&staging, &artifacts) {
            remove_dir_quietly(&staging);
            return Err(e);
        }

        if let Err(e) = self.switch_current(generation) {
            remove_dir_quietly(&staging);
            return Err(e);
        }

        self.remove_stale_generations(generation);
        tracing::debug!(
            dir = %staging.display(),
            vectors = index.len(),
            records = store.len(),
            "snapshot saved"
        );
        Ok(())
    }

    /// Restore the live snapshot.
    ///
    /// No `CURRENT` pointer is a cold start and yields an empty index. An
    /// unreadable pointer, or a generation that is unreadable, unparseable,
    /// or internally inconsistent, is logged and discarded, and an empty
    /// index is returned in its place.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::DimensionMismatch`] when the snapshot was built
    /// for a different embedding dimension than this manager's.
    pub fn load(&self) -> Result<LoadedSnapshot, IndexError> {
        let pointer = self.dir.join(CURRENT_FILE);
        if !pointer.exists() {
            tracing::info!(dir = %self.dir.display(), "no snapshot found, starting empty");
            return self.empty();
        }
        let Some(live) = self.live_dir() else {
            return self.discard(&IndexError::Corrupt(format!(
                "{} does not name a generation",
                pointer.display()
            )));
        };

        let vectors =
            read_file(&live.join(VECTORS_FILE)).and_then(|b| VectorIndex::from_bytes(&b));
        let index = match vectors {
            Ok(index) => index,
            Err(e) => return self.discard(&e),
        };

        if index.dimension() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: index.dimension(),
            });
        }

        let store = match read_store(&live, &index) {
            Ok(store) => store,
            Err(e) => return self.discard(&e),
        };

        tracing::info!(
            dir = %live.display(),
            vectors = index.len(),
            "snapshot loaded"
        );
        Ok(LoadedSnapshot { index, store })
    }

    #[must_use]
    pub fn stats(index: &VectorIndex, store: &DocumentStore) -> IndexStats {
        IndexStats {
            vector_count: index.len(),
            record_count: store.len(),
            dimension: index.dimension(),
        }
    }

    fn current_generation(&self) -> Option<u64> {
        let raw = fs::read_to_string(self.dir.join(CURRENT_FILE)).ok()?;
        parse_generation(raw.trim())
    }

    fn generation_dir(&self, generation: u64) -> PathBuf {
        self.dir.join(format!("{GENERATION_PREFIX}{generation}"))
    }

    fn switch_current(&self, generation: u64) -> Result<(), IndexError> {
        let tmp = self.dir.join(CURRENT_TMP_FILE);
        let pointer = self.dir.join(CURRENT_FILE);
        let name = format!("{GENERATION_PREFIX}{generation}\n");
        if let Err(e) = write_synced(&tmp, name.as_bytes()) {
            remove_file_quietly(&tmp);
            return Err(e);
        }
        if let Err(source) = fs::rename(&tmp, &pointer) {
            remove_file_quietly(&tmp);
            return Err(IndexError::Io {
                path: pointer,
                source,
            });
        }
        sync_dir(&self.dir);
        Ok(())
    }

    /// Best effort: a generation left behind only costs disk space.
    fn remove_stale_generations(&self, live: u64) {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return;
        };
        for entry in entries.flatten() {
            let name = entry.file_name();
            let stale = name
                .to_str()
                .and_then(parse_generation)
                .is_some_and(|n| n != live);
            if stale {
                remove_dir_quietly(&entry.path());
            }
        }
    }

    fn discard(&self, error: &IndexError) -> Result<LoadedSnapshot, IndexError> {
        tracing::warn!(
            dir = %self.dir.display(),
            error = %error,
            "snapshot unreadable, discarding and starting empty"
        );
        self.empty()
    }

    fn empty(&self) -> Result<LoadedSnapshot, IndexError> {
        Ok(LoadedSnapshot {
            index: VectorIndex::new(self.dimension)?,
            store: DocumentStore::new(),
        })
    }
}

fn parse_generation(name: &str) -> Option<u64> {
    name.strip_prefix(GENERATION_PREFIX)?.parse().ok()
}

/// Write every artifact into a fresh `dir`. A directory left over from an
/// interrupted save under the same name is replaced.
fn stage_generation(dir: &Path, artifacts: &[(&str, Vec<u8>)]) -> Result<(), IndexError> {
    let io = |source| IndexError::Io {
        path: dir.to_path_buf(),
        source,
    };
    if dir.exists() {
        fs::remove_dir_all(dir).map_err(io)?;
    }
    fs::create_dir(dir).map_err(io)?;
    for (name, bytes) in artifacts {
        write_synced(&dir.join(name), bytes)?;
    }
    sync_dir(dir);
    Ok(())
}

fn read_store(dir: &Path, index: &VectorIndex) -> Result<DocumentStore, IndexError> {
    let metadata: BTreeMap<String, DocumentRecord> =
        serde_json::from_slice(&read_file(&dir.join(METADATA_FILE))?)?;
    let id_map: HashMap<String, InternalId> =
        serde_json::from_slice(&read_file(&dir.join(ID_MAP_FILE))?)?;
    let store = DocumentStore::from_parts(metadata, id_map)?;

    if store.len() != index.len() {
        return Err(IndexError::Corrupt(format!(
            "{} vectors but {} metadata records",
            index.len(),
            store.len()
        )));
    }
    let arena_len = index.len() as InternalId;
    if let Some(stray) = store.iter().find(|r| r.internal_id >= arena_len) {
        return Err(IndexError::Corrupt(format!(
            "record {} points past the vector arena",
            stray.internal_id
        )));
    }
    Ok(store)
}

fn read_file(path: &Path) -> Result<Vec<u8>, IndexError> {
    fs::read(path).map_err(|source| IndexError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<(), IndexError> {
    let io = |source| IndexError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::create(path).map_err(io)?;
    file.write_all(bytes).map_err(io)?;
    file.sync_all().map_err(io)
}

fn remove_file_quietly(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove temp file");
        }
    }
}

fn remove_dir_quietly(path: &Path) {
    if let Err(e) = fs::remove_dir_all(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove snapshot generation");
        }
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Err(e) = File::open(dir).and_then(|d| d.sync_all()) {
        tracing::debug!(dir = %dir.display(), error = %e, "directory fsync failed");
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}

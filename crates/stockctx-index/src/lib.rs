//! Persistent similarity index for stockctx.
//!
//! A flat, append-only vector arena ([`VectorIndex`]) paired 1:1 with a
//! metadata store keyed by namespaced document keys ([`DocumentStore`]).
//! Removal happens only through ticker-scoped purges that rebuild the arena.
//! [`PersistenceManager`] writes both halves as one all-or-nothing snapshot,
//! and [`SharedIndex`] is the lock-guarded handle the rest of the workspace
//! holds.

pub mod error;
pub mod shared;
pub mod snapshot;
pub mod store;
pub mod vector;

pub use error::IndexError;
pub use shared::{InsertOutcome, SharedIndex};
pub use snapshot::{IndexStats, LoadedSnapshot, PersistenceManager};
pub use store::{namespaced_key, DocumentDraft, DocumentRecord, DocumentStore, PurgeOutcome};
pub use vector::{l2_normalize, InternalId, SearchHit, VectorIndex};

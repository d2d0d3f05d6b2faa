//! The sync engine: debounced reconciliation of the in-memory plan
//! document with the remote store.

mod engine;

pub use engine::{SyncEngine, SyncState};

//! Path storage.
//!
//! `traits` defines the read contract the projector and executor depend on;
//! `memory` is the in-process store that ingests updates.

mod memory;
mod traits;

pub use memory::{PathStore, StalePolicy, StoreConfig};
pub use traits::{EntryOrigin, PathMatch, PathSource, Snapshot, StoreEntry};

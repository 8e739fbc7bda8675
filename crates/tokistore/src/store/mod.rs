//! # Storage Layer
//!
//! [`TripStore`] is the single mutation/query gateway for trips, places, cards and
//! media. It owns in-memory copies of all four collections and drives a
//! [`StorageBackend`] that knows how to persist them.
//!
//! ## Cache and Disk
//!
//! The caches are the read path; the backend is written on every mutation:
//!
//! 1. **Stage**: build the next version of every affected collection.
//! 2. **Persist**: hand each whole collection to the backend (atomic replace).
//! 3. **Commit**: swap the staged collections into the cache and notify subscribers.
//!
//! A mutation touching several collections (deleting a trip, importing a bundle)
//! persists them as one unit: when a later save fails, the collections already
//! written are saved back from the cache. A failed persist therefore leaves both
//! cache and disk at their previous state and the error reaches the caller.
//! Payload files are removed only after the index that listed them is committed.
//!
//! ## Loading
//!
//! Opening a store is best effort. A collection file that does not exist yields an
//! empty collection (first run, logged at debug). A file that exists but cannot be
//! parsed also yields an empty collection, but is logged as a warning so data loss
//! is distinguishable from a fresh install.
//!
//! ## Invariants Enforced Here
//!
//! - **Place dedup**: at most one place per 5-character geohash.
//! - **Snapshots**: card place label/coordinates are captured at creation only.
//! - **Cascades**: deleting a trip sweeps its cards; deleting a card (or a trip)
//!   deletes media that no remaining card or trip cover references.
//! - **Unknown ids**: updates and deletes on an unknown id fail with
//!   [`crate::error::TokiError::NotFound`]; they never silently succeed.
//!
//! ## Concurrency
//!
//! A store has exactly one owner. There is no internal locking; callers sharing a
//! store across threads must wrap it in their own mutex.
//!
//! ## Implementations
//!
//! - [`fs_backend::FsBackend`]: production, one JSON file per collection plus a
//!   `media/` directory of payloads.
//! - [`mem_backend::MemBackend`]: for testing logic without filesystem I/O.

pub mod backend;
mod cards;
pub mod fs_backend;
mod media;
pub mod mem_backend;
mod places;
pub mod trip_store;

pub use backend::{Collection, StorageBackend};
pub use trip_store::TripStore;

/// Preference key naming the current trip.
pub const ACTIVE_TRIP_KEY: &str = "activeTripId";

/// Emitted to subscribers after a mutation has been persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreEvent {
    TripsChanged,
    PlacesChanged,
    CardsChanged,
    MediaChanged,
    ActiveTripChanged,
}

/// Report from the `doctor` operation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DoctorReport {
    /// Media index entries dropped because their payload file is gone.
    pub missing_payloads: usize,
    /// Cards removed because their trip no longer exists.
    pub dangling_cards: usize,
    /// Media no card or trip references (reported, not removed).
    pub orphaned_media: usize,
}

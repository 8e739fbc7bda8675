//! # Tokistore Architecture
//!
//! Tokistore is the **local data store of a trip journal**: it records trips,
//! places, cards (photo/note/audio entries) and media payloads, and moves whole
//! trips between devices as bundles. It is a library first; the `toki` binary is
//! one client among many possible UIs.
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Bundles (bundle/)                                          │
//! │  - export_trip / import_trip (merge with id remapping)      │
//! │  - tar.gz archives carrying payload files                   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  TripStore (store/trip_store.rs + places/cards/media)       │
//! │  - The only mutation/query surface                          │
//! │  - Owns the in-memory collections, enforces invariants      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  StorageBackend (store/backend.rs)                          │
//! │  - FsBackend (production), MemBackend (testing)             │
//! │  - Whole-collection atomic writes, blob files, preferences  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`model`] and [`geohash`] are leaves used by every layer.
//!
//! ## Key Principle: No Terminal I/O in the Library
//!
//! Code here takes Rust values and returns `Result`s. It never prints, never
//! exits, and logs through `tracing` only; the host decides where logs go.
//!
//! ## Testing Strategy
//!
//! - **Store and bundle logic**: unit tests beside the code, on [`store::mem_backend::MemBackend`].
//! - **Filesystem behaviour**: integration tests in `tests/` on a temp directory.
//!
//! ## Module Overview
//!
//! - [`geohash`]: base-32 geohash codec, the place deduplication key
//! - [`model`]: `Trip`, `Place`, `Card`, `Media` and their invariants
//! - [`store`]: storage backends and the `TripStore` façade
//! - [`bundle`]: export/import bundles and archives
//! - [`config`]: layered configuration
//! - [`error`]: error types

pub mod bundle;
pub mod config;
pub mod error;
pub mod geohash;
pub mod model;
pub mod store;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

pub use error::{Result, TokiError};
pub use store::TripStore;

//! File-backed fixtures for tests that need real disk behaviour.

use crate::store::fs_backend::FsBackend;
use crate::store::{Collection, TripStore};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A data directory in a temp dir with a store opened over it.
///
/// The directory lives as long as the `TestEnv`.
pub struct TestEnv {
    temp_dir: TempDir,
    pub store: TripStore<FsBackend>,
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("failed to create temp dir");
        let store = TripStore::open(FsBackend::new(temp_dir.path()));
        Self { temp_dir, store }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn collection_path(&self, collection: Collection) -> PathBuf {
        self.root().join(collection.filename())
    }

    /// Overwrite a collection file behind the store's back.
    pub fn write_raw(&self, collection: Collection, text: &str) {
        fs::write(self.collection_path(collection), text).expect("failed to write collection");
    }

    /// Drop the in-memory state and load again from disk.
    pub fn reopen(&mut self) {
        self.store = TripStore::open(FsBackend::new(self.temp_dir.path()));
    }
}

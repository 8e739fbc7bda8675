use super::backend::{check_blob_name, Collection, StorageBackend};
use crate::error::{Result, TokiError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;

/// In-memory storage backend for testing.
///
/// Uses `RefCell` for interior mutability since the store is single-owner.
/// Collections are kept as JSON text so the serde path is the same as on disk.
#[derive(Default)]
pub struct MemBackend {
    collections: RefCell<HashMap<Collection, String>>,
    blobs: RefCell<HashMap<String, Vec<u8>>>,
    prefs: RefCell<HashMap<String, String>>,
    simulate_write_error: RefCell<bool>,
    failing_collection: RefCell<Option<Collection>>,
}

impl MemBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable write error simulation for testing error handling.
    pub fn set_simulate_write_error(&self, simulate: bool) {
        *self.simulate_write_error.borrow_mut() = simulate;
    }

    /// Make saves of one collection fail while everything else keeps working.
    pub fn fail_saves_of(&self, collection: Option<Collection>) {
        *self.failing_collection.borrow_mut() = collection;
    }

    /// Test helper to plant raw (possibly corrupt) text for a collection.
    pub fn set_raw(&self, collection: Collection, text: &str) {
        self.collections
            .borrow_mut()
            .insert(collection, text.to_string());
    }

    pub fn raw(&self, collection: Collection) -> Option<String> {
        self.collections.borrow().get(&collection).cloned()
    }

    pub fn blob_count(&self) -> usize {
        self.blobs.borrow().len()
    }

    fn check_writable(&self) -> Result<()> {
        if *self.simulate_write_error.borrow() {
            return Err(TokiError::Store("Simulated write error".to_string()));
        }
        Ok(())
    }
}

impl StorageBackend for MemBackend {
    fn load<T: DeserializeOwned>(&self, collection: Collection) -> Result<Option<Vec<T>>> {
        match self.collections.borrow().get(&collection) {
            Some(text) => Ok(Some(serde_json::from_str(text)?)),
            None => Ok(None),
        }
    }

    fn save<T: Serialize>(&self, collection: Collection, records: &[T]) -> Result<()> {
        self.check_writable()?;
        if *self.failing_collection.borrow() == Some(collection) {
            return Err(TokiError::Store(format!(
                "Simulated write error for {}",
                collection.filename()
            )));
        }
        let text = serde_json::to_string(records)?;
        self.collections.borrow_mut().insert(collection, text);
        Ok(())
    }

    fn write_blob(&self, filename: &str, data: &[u8]) -> Result<()> {
        check_blob_name(filename)?;
        self.check_writable()?;
        self.blobs
            .borrow_mut()
            .insert(filename.to_string(), data.to_vec());
        Ok(())
    }

    fn read_blob(&self, filename: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.blobs.borrow().get(filename).cloned())
    }

    fn delete_blob(&self, filename: &str) -> Result<()> {
        self.check_writable()?;
        self.blobs.borrow_mut().remove(filename);
        Ok(())
    }

    fn blob_exists(&self, filename: &str) -> bool {
        self.blobs.borrow().contains_key(filename)
    }

    fn blob_path(&self, filename: &str) -> PathBuf {
        PathBuf::from(format!("memory://media/{}", filename))
    }

    fn get_pref(&self, key: &str) -> Result<Option<String>> {
        Ok(self.prefs.borrow().get(key).cloned())
    }

    fn set_pref(&self, key: &str, value: Option<&str>) -> Result<()> {
        self.check_writable()?;
        let mut prefs = self.prefs.borrow_mut();
        match value {
            Some(v) => {
                prefs.insert(key.to_string(), v.to_string());
            }
            None => {
                prefs.remove(key);
            }
        }
        Ok(())
    }
}

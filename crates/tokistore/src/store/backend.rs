use crate::error::{Result, TokiError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Component, Path, PathBuf};

/// The four entity collections, one file each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Trips,
    Places,
    Cards,
    Media,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Trips,
        Collection::Places,
        Collection::Cards,
        Collection::Media,
    ];

    pub fn filename(self) -> &'static str {
        match self {
            Collection::Trips => "trips.json",
            Collection::Places => "places.json",
            Collection::Cards => "cards.json",
            Collection::Media => "media.json",
        }
    }
}

/// Blob names must be a single plain file name; anything that could resolve
/// outside the media directory is refused.
pub fn check_blob_name(filename: &str) -> Result<()> {
    let mut components = Path::new(filename).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if !filename.contains(['/', '\\', '\0']) => Ok(()),
        _ => Err(TokiError::InvalidId {
            id: filename.to_string(),
        }),
    }
}

/// Abstract interface for raw storage I/O.
/// This trait handles the "how" of storage (filesystem vs memory),
/// while TripStore handles the "what" (caching, dedup, cascades).
pub trait StorageBackend {
    // --- Collection Operations ---

    /// Load a whole collection.
    /// Returns Ok(None) if it was never written (first run).
    /// Returns Err if it exists but cannot be read or parsed.
    fn load<T: DeserializeOwned>(&self, collection: Collection) -> Result<Option<Vec<T>>>;

    /// Replace a whole collection.
    /// MUST be atomic (e.g. write to tmp then rename) so readers never see a partial file.
    fn save<T: Serialize>(&self, collection: Collection, records: &[T]) -> Result<()>;

    // --- Blob Operations ---

    /// Write a media payload under `filename` (atomic).
    /// Names rejected by [`check_blob_name`] fail with `InvalidId`.
    fn write_blob(&self, filename: &str, data: &[u8]) -> Result<()>;

    /// Read a media payload. Returns Ok(None) if it does not exist.
    fn read_blob(&self, filename: &str) -> Result<Option<Vec<u8>>>;

    /// Delete a media payload. Deleting a missing payload is not an error.
    fn delete_blob(&self, filename: &str) -> Result<()>;

    fn blob_exists(&self, filename: &str) -> bool;

    /// Location of the payload. For FsBackend a real path, for MemBackend a virtual one.
    fn blob_path(&self, filename: &str) -> PathBuf;

    // --- Preferences ---

    /// Read a scalar preference (e.g. `activeTripId`).
    fn get_pref(&self, key: &str) -> Result<Option<String>>;

    /// Set or clear a scalar preference.
    fn set_pref(&self, key: &str, value: Option<&str>) -> Result<()>;
}

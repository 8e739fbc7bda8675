use super::backend::{check_blob_name, Collection, StorageBackend};
use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const MEDIA_DIR: &str = "media";
const PREFS_FILE: &str = "prefs.json";

/// Filesystem backend.
///
/// ```text
/// {root}/
/// ├── trips.json
/// ├── places.json
/// ├── cards.json
/// ├── media.json          # media index (metadata only)
/// ├── prefs.json          # key-value preferences (activeTripId)
/// └── media/{id}.{ext}    # payloads
/// ```
pub struct FsBackend {
    root: PathBuf,
    pretty: bool,
}

impl FsBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            pretty: true,
        }
    }

    pub fn with_pretty_json(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn media_dir(&self) -> PathBuf {
        self.root.join(MEDIA_DIR)
    }

    fn ensure_dir(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path)?;
        }
        Ok(())
    }

    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
        let bytes = if self.pretty {
            serde_json::to_vec_pretty(value)?
        } else {
            serde_json::to_vec(value)?
        };
        Ok(bytes)
    }

    /// Write to a sibling tmp file, then rename over the target.
    fn atomic_write(&self, dir: &Path, target: &Path, data: &[u8]) -> Result<()> {
        self.ensure_dir(dir)?;
        let tmp = dir.join(format!(".toki-{}.tmp", Uuid::new_v4()));
        fs::write(&tmp, data)?;
        if let Err(e) = fs::rename(&tmp, target) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    fn blob_target(&self, filename: &str) -> Result<PathBuf> {
        check_blob_name(filename)?;
        Ok(self.media_dir().join(filename))
    }

    fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn load_prefs(&self) -> Result<BTreeMap<String, String>> {
        match Self::read_optional(&self.root.join(PREFS_FILE))? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(BTreeMap::new()),
        }
    }
}

impl StorageBackend for FsBackend {
    fn load<T: DeserializeOwned>(&self, collection: Collection) -> Result<Option<Vec<T>>> {
        let path = self.root.join(collection.filename());
        match Self::read_optional(&path)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn save<T: Serialize>(&self, collection: Collection, records: &[T]) -> Result<()> {
        let data = self.encode(records)?;
        let target = self.root.join(collection.filename());
        self.atomic_write(&self.root, &target, &data)
    }

    fn write_blob(&self, filename: &str, data: &[u8]) -> Result<()> {
        let target = self.blob_target(filename)?;
        self.atomic_write(&self.media_dir(), &target, data)
    }

    fn read_blob(&self, filename: &str) -> Result<Option<Vec<u8>>> {
        Self::read_optional(&self.blob_target(filename)?)
    }

    fn delete_blob(&self, filename: &str) -> Result<()> {
        match fs::remove_file(self.blob_target(filename)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn blob_exists(&self, filename: &str) -> bool {
        self.blob_target(filename)
            .map(|path| path.is_file())
            .unwrap_or(false)
    }

    fn blob_path(&self, filename: &str) -> PathBuf {
        self.media_dir().join(filename)
    }

    fn get_pref(&self, key: &str) -> Result<Option<String>> {
        Ok(self.load_prefs()?.remove(key))
    }

    fn set_pref(&self, key: &str, value: Option<&str>) -> Result<()> {
        // A corrupt prefs file is replaced rather than blocking the write.
        let mut prefs = self.load_prefs().unwrap_or_default();
        match value {
            Some(v) => {
                prefs.insert(key.to_string(), v.to_string());
            }
            None => {
                prefs.remove(key);
            }
        }
        let data = self.encode(&prefs)?;
        self.atomic_write(&self.root, &self.root.join(PREFS_FILE), &data)
    }
}

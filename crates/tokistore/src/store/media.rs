use super::backend::StorageBackend;
use super::trip_store::TripStore;
use crate::error::{EntityKind, Result, TokiError};
use crate::model::{media_filename, new_id, validate_id, Media};
use std::path::PathBuf;
use tracing::{debug, warn};

impl<B: StorageBackend> TripStore<B> {
    /// The media index (metadata only).
    pub fn media(&self) -> &[Media] {
        &self.media
    }

    pub fn media_record(&self, id: &str) -> Option<&Media> {
        self.media.iter().find(|m| m.id == id)
    }

    /// Store a payload and upsert its index entry. Returns the media id.
    ///
    /// Passing an existing `media_id` overwrites that payload; if the MIME type
    /// changed, the file under the old extension is removed. A caller-chosen id
    /// must pass [`validate_id`].
    pub fn save_media(&mut self, data: &[u8], mime: &str, media_id: Option<&str>) -> Result<String> {
        let id = media_id.map(str::to_string).unwrap_or_else(new_id);
        validate_id(&id)?;
        let filename = media_filename(&id, mime);

        // Payload first, so an index entry never points at nothing
        self.backend.write_blob(&filename, data)?;

        let mut next = self.media.clone();
        let previous = match next.iter_mut().find(|m| m.id == id) {
            Some(existing) => {
                let old = existing.filename();
                existing.mime = mime.to_string();
                Some(old)
            }
            None => {
                next.push(Media::new(&id, mime));
                None
            }
        };
        if let Err(e) = self.commit_media(next) {
            if previous.is_none() {
                self.remove_payloads(&[filename]);
            }
            return Err(e);
        }

        if let Some(old) = previous.filter(|old| *old != filename) {
            if let Err(e) = self.backend.delete_blob(&old) {
                warn!("Could not remove replaced payload {}: {}", old, e);
            }
        }

        debug!(id = %id, mime, bytes = data.len(), "Saved media");
        Ok(id)
    }

    /// Read a payload. Unknown ids and missing or unreadable files yield `None`.
    pub fn load_media(&self, id: &str) -> Option<Vec<u8>> {
        let media = self.media_record(id)?;
        match self.backend.read_blob(&media.filename()) {
            Ok(data) => data,
            Err(e) => {
                warn!("Could not read payload for media {}: {}", id, e);
                None
            }
        }
    }

    /// Where the payload of `id` lives, if the id is known.
    pub fn media_path(&self, id: &str) -> Option<PathBuf> {
        self.media_record(id)
            .map(|m| self.backend.blob_path(&m.filename()))
    }

    /// Refine dimensions/EXIF of a media record. `mime` and `created_at` are kept
    /// from the stored record since the payload file name depends on them.
    pub fn update_media(&mut self, media: Media) -> Result<Media> {
        let pos = self
            .media
            .iter()
            .position(|m| m.id == media.id)
            .ok_or_else(|| TokiError::not_found(EntityKind::Media, media.id.clone()))?;

        let mut updated = media;
        updated.mime = self.media[pos].mime.clone();
        updated.created_at = self.media[pos].created_at;

        let mut next = self.media.clone();
        next[pos] = updated.clone();
        self.commit_media(next)?;
        Ok(updated)
    }

    /// Explicitly delete a media record and its payload, referenced or not.
    pub fn delete_media(&mut self, id: &str) -> Result<()> {
        if self.media_record(id).is_none() {
            return Err(TokiError::not_found(EntityKind::Media, id));
        }
        self.remove_media_records(&[id.to_string()])
    }

    /// Media that no card and no trip cover references.
    pub fn orphaned_media(&self) -> Vec<&Media> {
        self.media
            .iter()
            .filter(|m| !self.is_media_referenced(&m.id))
            .collect()
    }

    /// Drop index entries, then payloads. A payload that cannot be removed is
    /// left behind with a warning; the index is already consistent.
    pub(crate) fn remove_media_records(&mut self, ids: &[String]) -> Result<()> {
        let (next, payloads) = self.media_without(ids);
        self.commit_media(next)?;
        self.remove_payloads(&payloads);
        Ok(())
    }

    /// The media index without `ids`, plus the payload files those ids own.
    pub(crate) fn media_without(&self, ids: &[String]) -> (Vec<Media>, Vec<String>) {
        let (dropped, kept): (Vec<Media>, Vec<Media>) =
            self.media.iter().cloned().partition(|m| ids.contains(&m.id));
        (kept, dropped.iter().map(Media::filename).collect())
    }

    /// Best effort; only called once the index no longer lists the payloads.
    pub(crate) fn remove_payloads(&self, filenames: &[String]) {
        for filename in filenames {
            if let Err(e) = self.backend.delete_blob(filename) {
                warn!("Could not remove payload {}: {}", filename, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::error::TokiError;
    use crate::model::{CardKind, NewCard};
    use crate::store::mem_backend::MemBackend;
    use crate::store::{Collection, StorageBackend, TripStore};
    use std::collections::BTreeMap;

    fn make_store() -> TripStore<MemBackend> {
        TripStore::open(MemBackend::new())
    }

    #[test]
    fn test_save_and_load_media() {
        let mut store = make_store();
        let id = store.save_media(b"\x89PNG", "image/png", None).unwrap();

        assert_eq!(store.load_media(&id).unwrap(), b"\x89PNG");
        assert!(store.backend().blob_exists(&format!("{id}.png")));
        assert_eq!(store.media_record(&id).unwrap().mime, "image/png");
    }

    #[test]
    fn test_unknown_mime_uses_bin() {
        let mut store = make_store();
        store
            .save_media(b"data", "application/octet-stream", Some("raw"))
            .unwrap();
        assert!(store.backend().blob_exists("raw.bin"));
    }

    #[test]
    fn test_resave_with_explicit_id_overwrites() {
        let mut store = make_store();
        store.save_media(b"v1", "image/jpeg", Some("m1")).unwrap();
        store.save_media(b"v2", "image/jpeg", Some("m1")).unwrap();

        assert_eq!(store.media().len(), 1);
        assert_eq!(store.load_media("m1").unwrap(), b"v2");
    }

    #[test]
    fn test_resave_with_new_mime_moves_file() {
        let mut store = make_store();
        store.save_media(b"v1", "image/jpeg", Some("m1")).unwrap();
        store.save_media(b"v2", "image/png", Some("m1")).unwrap();

        assert!(!store.backend().blob_exists("m1.jpg"));
        assert!(store.backend().blob_exists("m1.png"));
        assert_eq!(store.backend().blob_count(), 1);
    }

    #[test]
    fn test_load_media_never_fails() {
        let mut store = make_store();
        assert!(store.load_media("unknown").is_none());

        store.save_media(b"x", "image/jpeg", Some("m1")).unwrap();
        store.backend().delete_blob("m1.jpg").unwrap();
        assert!(store.load_media("m1").is_none());
    }

    #[test]
    fn test_failed_payload_write_leaves_index_alone() {
        let mut store = make_store();
        store.backend().set_simulate_write_error(true);
        assert!(store.save_media(b"x", "image/jpeg", Some("m1")).is_err());
        assert!(store.media().is_empty());
        assert!(store.backend().raw(Collection::Media).is_none());
    }

    #[test]
    fn test_failed_index_write_removes_new_payload() {
        let mut store = make_store();
        store.backend().fail_saves_of(Some(Collection::Media));
        assert!(store.save_media(b"x", "image/jpeg", Some("m1")).is_err());
        assert!(store.media().is_empty());
        assert_eq!(store.backend().blob_count(), 0);
    }

    #[test]
    fn test_save_media_rejects_path_like_ids() {
        let mut store = make_store();
        for bad in ["../x", "..", "a/b", ""] {
            let err = store.save_media(b"x", "image/jpeg", Some(bad)).unwrap_err();
            assert!(matches!(err, TokiError::InvalidId { .. }), "{:?}", bad);
        }
        assert!(store.media().is_empty());
        assert_eq!(store.backend().blob_count(), 0);
    }

    #[test]
    fn test_update_media_keeps_mime() {
        let mut store = make_store();
        store.save_media(b"x", "image/jpeg", Some("m1")).unwrap();

        let mut edit = store.media_record("m1").unwrap().clone();
        edit.width = Some(4032);
        edit.height = Some(3024);
        edit.mime = "image/png".into();
        let mut exif = BTreeMap::new();
        exif.insert("Model".to_string(), "Pixel 8".to_string());
        edit.exif = Some(exif);
        let updated = store.update_media(edit).unwrap();

        assert_eq!(updated.width, Some(4032));
        assert_eq!(updated.mime, "image/jpeg");
        assert_eq!(store.load_media("m1").unwrap(), b"x");
    }

    #[test]
    fn test_delete_media_explicit() {
        let mut store = make_store();
        store.save_media(b"x", "audio/m4a", Some("a1")).unwrap();
        store.delete_media("a1").unwrap();

        assert!(store.media().is_empty());
        assert!(!store.backend().blob_exists("a1.m4a"));
        assert!(matches!(
            store.delete_media("a1"),
            Err(TokiError::NotFound { .. })
        ));
    }

    #[test]
    fn test_orphaned_media() {
        let mut store = make_store();
        let trip = store.create_trip("Trip", None, None).unwrap();
        store.save_media(b"x", "image/jpeg", Some("used")).unwrap();
        store.save_media(b"y", "image/jpeg", Some("cover")).unwrap();
        store.save_media(b"z", "image/jpeg", Some("orphan")).unwrap();
        store
            .create_card(NewCard::new(&trip.id, CardKind::Photo).with_media("used"))
            .unwrap();
        let mut with_cover = trip.clone();
        with_cover.cover_media_id = Some("cover".into());
        store.update_trip(with_cover).unwrap();

        let orphans: Vec<&str> = store.orphaned_media().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(orphans, vec!["orphan"]);
    }

    #[test]
    fn test_media_path() {
        let mut store = make_store();
        store.save_media(b"x", "audio/webm", Some("a1")).unwrap();
        let path = store.media_path("a1").unwrap();
        assert!(path.to_string_lossy().ends_with("a1.webm"));
        assert!(store.media_path("nope").is_none());
    }
}

//! Gzip-compressed tar packaging of a [`Bundle`] with its media payloads.
//!
//! ```text
//! bundle.json
//! media/{id}.{ext}     # one per mediaIndex entry whose payload exists
//! ```

use super::{export_trip, import_trip, Bundle};
use crate::error::{Result, TokiError};
use crate::model::{Media, Trip};
use crate::store::{StorageBackend, TripStore};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::{Component, Path};
use tracing::{debug, warn};

pub const BUNDLE_ENTRY: &str = "bundle.json";
const MEDIA_PREFIX: &str = "media";

/// A parsed archive: the bundle plus payload bytes keyed by filename.
#[derive(Debug)]
pub struct Archive {
    pub bundle: Bundle,
    pub payloads: BTreeMap<String, Vec<u8>>,
}

/// Export `trip_id` and write it, payloads included, to `writer`.
///
/// Payloads missing on disk are skipped with a warning; the bundle still lists
/// them so the receiving side knows what was referenced.
pub fn write_archive<B: StorageBackend, W: Write>(
    store: &TripStore<B>,
    trip_id: &str,
    writer: W,
    compression: u32,
) -> Result<Bundle> {
    let bundle = export_trip(store, trip_id)?;

    let enc = GzEncoder::new(writer, Compression::new(compression.min(9)));
    let mut tar = tar::Builder::new(enc);

    let json = bundle.to_json()?;
    append(&mut tar, BUNDLE_ENTRY, json.as_bytes())?;

    for entry in &bundle.media_index {
        match store.backend().read_blob(&entry.filename)? {
            Some(data) => {
                let name = format!("{}/{}", MEDIA_PREFIX, entry.filename);
                append(&mut tar, &name, &data)?;
            }
            None => warn!("Payload {} missing, not archived", entry.filename),
        }
    }

    tar.into_inner()?.finish()?;
    Ok(bundle)
}

fn append<W: Write>(tar: &mut tar::Builder<W>, name: &str, data: &[u8]) -> Result<()> {
    let mut header = tar::Header::new_gnu();
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    tar.append_data(&mut header, name, data)?;
    Ok(())
}

/// Parse an archive produced by [`write_archive`].
///
/// Only `bundle.json` and flat files under `media/` are accepted; anything else
/// (nested paths, `..`, absolute paths) is rejected. Every `mediaIndex` filename
/// must be the one its media record derives.
pub fn read_archive<R: Read>(reader: R) -> Result<Archive> {
    let mut archive = tar::Archive::new(GzDecoder::new(reader));
    let mut json = None;
    let mut payloads = BTreeMap::new();

    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.into_owned();

        if path == Path::new(BUNDLE_ENTRY) {
            let mut text = String::new();
            entry.read_to_string(&mut text)?;
            json = Some(text);
        } else if let Some(filename) = media_filename(&path) {
            let mut data = Vec::new();
            entry.read_to_end(&mut data)?;
            payloads.insert(filename, data);
        } else {
            return Err(TokiError::Archive(format!(
                "unexpected entry {}",
                path.display()
            )));
        }
    }

    let json = json.ok_or_else(|| TokiError::Archive(format!("missing {}", BUNDLE_ENTRY)))?;
    let bundle = Bundle::from_json(&json)?;

    for entry in &bundle.media_index {
        let expected = bundle
            .media
            .iter()
            .find(|m| m.id == entry.media_id)
            .map(Media::filename);
        if expected.as_deref() != Some(entry.filename.as_str()) {
            return Err(TokiError::Archive(format!(
                "media index entry {} does not match media {}",
                entry.filename, entry.media_id
            )));
        }
    }

    Ok(Archive { bundle, payloads })
}

/// `media/{name}` with a single plain file name component.
fn media_filename(path: &Path) -> Option<String> {
    let mut components = path.components();
    match (components.next(), components.next(), components.next()) {
        (Some(Component::Normal(dir)), Some(Component::Normal(name)), None)
            if dir == MEDIA_PREFIX =>
        {
            name.to_str().map(str::to_string)
        }
        _ => None,
    }
}

/// Read an archive, install payloads for media not already present, then merge
/// the bundle with [`import_trip`]. Payloads installed by a failed import are
/// removed again.
pub fn import_archive<B: StorageBackend, R: Read>(
    store: &mut TripStore<B>,
    reader: R,
) -> Result<Trip> {
    let Archive { bundle, payloads } = read_archive(reader)?;

    let mut installed = Vec::new();
    let result = install_payloads(store, &bundle, &payloads, &mut installed)
        .and_then(|()| import_trip(store, bundle));

    if result.is_err() {
        for filename in &installed {
            if let Err(e) = store.backend.delete_blob(filename) {
                warn!("Could not remove payload {} after failed import: {}", filename, e);
            }
        }
    }
    result
}

fn install_payloads<B: StorageBackend>(
    store: &TripStore<B>,
    bundle: &Bundle,
    payloads: &BTreeMap<String, Vec<u8>>,
    installed: &mut Vec<String>,
) -> Result<()> {
    for media in &bundle.media {
        if store.media_record(&media.id).is_some()
            || !bundle.media_index.iter().any(|e| e.media_id == media.id)
        {
            continue;
        }
        let filename = media.filename();
        match payloads.get(&filename) {
            Some(data) => {
                store.backend.write_blob(&filename, data)?;
                debug!("Installed payload {}", filename);
                installed.push(filename);
            }
            None => warn!("Archive has no payload for media {}", media.id),
        }
    }
    Ok(())
}

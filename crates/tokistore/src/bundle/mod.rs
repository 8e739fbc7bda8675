//! # Trip Bundles
//!
//! A [`Bundle`] is a self-describing snapshot of one trip and everything it
//! references, used to move a trip between devices.
//!
//! ```text
//! { "version": 1,
//!   "trip": Trip,
//!   "places": [Place],
//!   "cards": [Card],
//!   "media": [Media],                       // metadata only
//!   "mediaIndex": [{ "mediaId", "filename" }] }
//! ```
//!
//! The JSON carries metadata only. [`archive`] packages it together with the
//! payload files named in `mediaIndex`.
//!
//! ## Import Is a Merge
//!
//! [`import_trip`] never overwrites local data:
//!
//! 1. **Places** whose id is not present locally are appended as-is. There is no
//!    geohash re-dedup: places from different trips stay distinct.
//! 2. **Media** entries whose id is not present locally are registered. Copying
//!    payload bytes is the caller's job ([`archive::import_archive`] does it).
//! 3. **Trip** gets a fresh id. A local name collision appends `" 2"`, `" 3"`, ...
//! 4. **Cards** get fresh ids and point at the new trip; everything else
//!    (place/media ids, snapshots) is kept verbatim.
//!
//! Importing the same bundle twice therefore yields two independent trips that
//! share the same place and media records.

pub mod archive;

use crate::error::{EntityKind, Result, TokiError};
use crate::model::{new_id, validate_id, Card, Media, Place, Trip};
use crate::store::{StorageBackend, TripStore};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::info;

/// Highest bundle schema version this build understands.
pub const BUNDLE_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaIndexEntry {
    pub media_id: String,
    pub filename: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    pub version: u32,
    pub trip: Trip,
    #[serde(default)]
    pub places: Vec<Place>,
    #[serde(default)]
    pub cards: Vec<Card>,
    #[serde(default)]
    pub media: Vec<Media>,
    #[serde(default)]
    pub media_index: Vec<MediaIndexEntry>,
}

impl Bundle {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a bundle. See [`Bundle::validate`] for what is rejected.
    pub fn from_json(json: &str) -> Result<Self> {
        let bundle: Bundle = serde_json::from_str(json)?;
        bundle.validate()?;
        Ok(bundle)
    }

    /// Reject schema versions newer than [`BUNDLE_VERSION`] and place, card or
    /// media ids that are not plain names.
    pub fn validate(&self) -> Result<()> {
        if self.version > BUNDLE_VERSION {
            return Err(TokiError::ImportConflict {
                found: self.version,
                supported: BUNDLE_VERSION,
            });
        }

        let ids = self
            .places
            .iter()
            .map(|p| p.id.as_str())
            .chain(self.cards.iter().map(|c| c.id.as_str()))
            .chain(self.media.iter().map(|m| m.id.as_str()))
            .chain(self.media_index.iter().map(|e| e.media_id.as_str()));
        for id in ids {
            validate_id(id)?;
        }
        Ok(())
    }
}

/// Collect a trip and everything its cards reference.
///
/// Cards are listed in `taken_at` order; places and media follow first-reference
/// order without duplicates. Dangling place/media ids are skipped. The trip's
/// cover media is included when present.
pub fn export_trip<B: StorageBackend>(store: &TripStore<B>, trip_id: &str) -> Result<Bundle> {
    let trip = store
        .trip(trip_id)
        .cloned()
        .ok_or_else(|| TokiError::not_found(EntityKind::Trip, trip_id))?;

    let cards: Vec<Card> = store
        .cards_for_trip(trip_id)
        .into_iter()
        .cloned()
        .collect();

    let mut seen_places = HashSet::new();
    let places: Vec<Place> = cards
        .iter()
        .filter_map(|c| c.place_id.as_deref())
        .filter(|id| seen_places.insert(*id))
        .filter_map(|id| store.place(id).cloned())
        .collect();

    let mut seen_media = HashSet::new();
    let media: Vec<Media> = trip
        .cover_media_id
        .as_deref()
        .into_iter()
        .chain(cards.iter().filter_map(|c| c.media_id.as_deref()))
        .filter(|id| seen_media.insert(*id))
        .filter_map(|id| store.media_record(id).cloned())
        .collect();

    let media_index = media
        .iter()
        .map(|m| MediaIndexEntry {
            media_id: m.id.clone(),
            filename: m.filename(),
        })
        .collect();

    info!(
        trip = %trip.id,
        cards = cards.len(),
        places = places.len(),
        media = media.len(),
        "Exported trip"
    );

    Ok(Bundle {
        version: BUNDLE_VERSION,
        trip,
        places,
        cards,
        media,
        media_index,
    })
}

/// Merge a bundle into the store as a new trip. See the module docs for the rules.
pub fn import_trip<B: StorageBackend>(store: &mut TripStore<B>, bundle: Bundle) -> Result<Trip> {
    bundle.validate()?;

    let local_places: HashSet<&str> = store.places().iter().map(|p| p.id.as_str()).collect();
    let mut new_places = Vec::new();
    for place in bundle.places {
        if !local_places.contains(place.id.as_str())
            && !new_places.iter().any(|p: &Place| p.id == place.id)
        {
            new_places.push(place);
        }
    }

    // Only ids listed in the media index are registered.
    let local_media: HashSet<&str> = store.media().iter().map(|m| m.id.as_str()).collect();
    let mut new_media: Vec<Media> = Vec::new();
    for entry in &bundle.media_index {
        if local_media.contains(entry.media_id.as_str())
            || new_media.iter().any(|m| m.id == entry.media_id)
        {
            continue;
        }
        if let Some(media) = bundle.media.iter().find(|m| m.id == entry.media_id) {
            new_media.push(media.clone());
        }
    }

    let mut trip = bundle.trip;
    trip.id = new_id();
    trip.name = unique_trip_name(store, &trip.name);

    let cards: Vec<Card> = bundle
        .cards
        .into_iter()
        .map(|mut card| {
            card.id = new_id();
            card.trip_id = trip.id.clone();
            card
        })
        .collect();

    info!(
        trip = %trip.id,
        name = %trip.name,
        cards = cards.len(),
        places = new_places.len(),
        media = new_media.len(),
        "Imported trip"
    );

    store.merge_import(new_places, new_media, trip.clone(), cards)?;
    Ok(trip)
}

/// `name`, or `name 2`, `name 3`, ... whichever is not taken locally.
fn unique_trip_name<B: StorageBackend>(store: &TripStore<B>, name: &str) -> String {
    if store.trip_by_name(name).is_none() {
        return name.to_string();
    }
    (2..)
        .map(|n| format!("{} {}", name, n))
        .find(|candidate| store.trip_by_name(candidate).is_none())
        .unwrap_or_else(|| format!("{} {}", name, new_id()))
}

use super::backend::{Collection, StorageBackend};
use super::{DoctorReport, StoreEvent, ACTIVE_TRIP_KEY};
use crate::error::{EntityKind, Result, TokiError};
use crate::model::{Card, Media, Place, Trip};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, warn};

type Listener = Box<dyn Fn(&StoreEvent)>;

/// Next versions of the collections one mutation touches. `None` means
/// unchanged.
#[derive(Default)]
pub(crate) struct Staged {
    pub trips: Option<Vec<Trip>>,
    pub places: Option<Vec<Place>>,
    pub cards: Option<Vec<Card>>,
    pub media: Option<Vec<Media>>,
}

impl Staged {
    /// Referenced collections are written before the ones pointing at them.
    const ORDER: [Collection; 4] = [
        Collection::Places,
        Collection::Media,
        Collection::Trips,
        Collection::Cards,
    ];
}

pub struct TripStore<B: StorageBackend> {
    /// The underlying storage backend.
    /// Exposed as pub(crate) for testing and internal access only.
    pub(crate) backend: B,
    pub(crate) trips: Vec<Trip>,
    pub(crate) places: Vec<Place>,
    pub(crate) cards: Vec<Card>,
    pub(crate) media: Vec<Media>,
    active_trip_id: Option<String>,
    listeners: Vec<Listener>,
}

impl<B: StorageBackend> TripStore<B> {
    /// Open a store over `backend`, loading every collection best effort.
    pub fn open(backend: B) -> Self {
        let trips: Vec<Trip> = load_or_empty(&backend, Collection::Trips);
        let places = load_or_empty(&backend, Collection::Places);
        let cards = load_or_empty(&backend, Collection::Cards);
        let media = load_or_empty(&backend, Collection::Media);

        let active_trip_id = match backend.get_pref(ACTIVE_TRIP_KEY) {
            Ok(id) => id.filter(|id| trips.iter().any(|t| &t.id == id)),
            Err(e) => {
                warn!("Ignoring unreadable preferences: {}", e);
                None
            }
        };

        debug!(
            trips = trips.len(),
            places = places.len(),
            cards = cards.len(),
            media = media.len(),
            "Opened trip store"
        );

        Self {
            backend,
            trips,
            places,
            cards,
            media,
            active_trip_id,
            listeners: Vec::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Register a callback invoked after every committed mutation.
    pub fn subscribe<F>(&mut self, listener: F)
    where
        F: Fn(&StoreEvent) + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    pub(crate) fn emit(&self, event: StoreEvent) {
        for listener in &self.listeners {
            listener(&event);
        }
    }

    // --- Commit helpers: persist first, then swap into the cache ---

    /// Persist every staged collection, then swap them into the cache and
    /// notify subscribers.
    ///
    /// Collections are written in `Staged::ORDER`. If one save fails, the
    /// collections already written are saved back from the cache, so the backend
    /// and the cache both stay at their previous state and no event is emitted.
    pub(crate) fn commit(&mut self, staged: Staged) -> Result<()> {
        let mut written = Vec::new();
        for collection in Staged::ORDER {
            let saved = match collection {
                Collection::Places => save_staged(&self.backend, collection, &staged.places),
                Collection::Media => save_staged(&self.backend, collection, &staged.media),
                Collection::Trips => save_staged(&self.backend, collection, &staged.trips),
                Collection::Cards => save_staged(&self.backend, collection, &staged.cards),
            };
            match saved {
                Some(Ok(())) => written.push(collection),
                Some(Err(e)) => {
                    self.restore(&written);
                    return Err(e);
                }
                None => {}
            }
        }

        if let Some(next) = staged.places {
            self.places = next;
            self.emit(StoreEvent::PlacesChanged);
        }
        if let Some(next) = staged.media {
            self.media = next;
            self.emit(StoreEvent::MediaChanged);
        }
        if let Some(next) = staged.trips {
            self.trips = next;
            self.emit(StoreEvent::TripsChanged);
        }
        if let Some(next) = staged.cards {
            self.cards = next;
            self.emit(StoreEvent::CardsChanged);
        }
        Ok(())
    }

    /// Write the cached (pre-mutation) version of `collections` back.
    fn restore(&self, collections: &[Collection]) {
        for &collection in collections.iter().rev() {
            let restored = match collection {
                Collection::Trips => self.backend.save(collection, &self.trips),
                Collection::Places => self.backend.save(collection, &self.places),
                Collection::Cards => self.backend.save(collection, &self.cards),
                Collection::Media => self.backend.save(collection, &self.media),
            };
            match restored {
                Ok(()) => debug!("Restored {} after failed commit", collection.filename()),
                Err(e) => warn!(
                    "Could not restore {} after failed commit: {}",
                    collection.filename(),
                    e
                ),
            }
        }
    }

    pub(crate) fn commit_trips(&mut self, next: Vec<Trip>) -> Result<()> {
        self.commit(Staged {
            trips: Some(next),
            ..Staged::default()
        })
    }

    pub(crate) fn commit_places(&mut self, next: Vec<Place>) -> Result<()> {
        self.commit(Staged {
            places: Some(next),
            ..Staged::default()
        })
    }

    pub(crate) fn commit_cards(&mut self, next: Vec<Card>) -> Result<()> {
        self.commit(Staged {
            cards: Some(next),
            ..Staged::default()
        })
    }

    pub(crate) fn commit_media(&mut self, next: Vec<Media>) -> Result<()> {
        self.commit(Staged {
            media: Some(next),
            ..Staged::default()
        })
    }

    // --- Trips ---

    pub fn trips(&self) -> &[Trip] {
        &self.trips
    }

    pub fn trip(&self, id: &str) -> Option<&Trip> {
        self.trips.iter().find(|t| t.id == id)
    }

    pub fn trip_by_name(&self, name: &str) -> Option<&Trip> {
        self.trips.iter().find(|t| t.name == name)
    }

    /// Create a trip with default settings. Becomes the active trip if none is set.
    pub fn create_trip(
        &mut self,
        name: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Trip> {
        let trip = Trip::new(name, start_date, end_date);

        let mut next = self.trips.clone();
        next.push(trip.clone());
        self.commit_trips(next)?;
        debug!(id = %trip.id, name = %trip.name, "Created trip");

        if self.active_trip_id.is_none() {
            self.set_active_trip(Some(&trip.id))?;
        }

        Ok(trip)
    }

    /// Replace a trip by id. `created_at` is kept from the stored record.
    pub fn update_trip(&mut self, trip: Trip) -> Result<Trip> {
        let pos = self
            .trips
            .iter()
            .position(|t| t.id == trip.id)
            .ok_or_else(|| TokiError::not_found(EntityKind::Trip, trip.id.clone()))?;

        let mut updated = trip;
        updated.created_at = self.trips[pos].created_at;
        updated.touch();

        let mut next = self.trips.clone();
        next[pos] = updated.clone();
        self.commit_trips(next)?;
        Ok(updated)
    }

    /// Delete a trip and every card belonging to it. Media referenced only by
    /// the swept cards is deleted as well.
    pub fn delete_trip(&mut self, id: &str) -> Result<()> {
        if self.trip(id).is_none() {
            return Err(TokiError::not_found(EntityKind::Trip, id));
        }

        let (swept, kept): (Vec<Card>, Vec<Card>) =
            self.cards.iter().cloned().partition(|c| c.trip_id == id);
        let next_trips: Vec<Trip> = self.trips.iter().filter(|t| t.id != id).cloned().collect();

        let candidates: HashSet<String> = swept
            .iter()
            .filter_map(|c| c.media_id.clone())
            .chain(self.trip(id).and_then(|t| t.cover_media_id.clone()))
            .collect();
        let unreferenced: Vec<String> = candidates
            .into_iter()
            .filter(|m| !media_referenced(m, &kept, &next_trips))
            .collect();

        let (next_media, payloads) = self.media_without(&unreferenced);
        self.commit(Staged {
            trips: Some(next_trips),
            cards: Some(kept),
            media: (!payloads.is_empty()).then_some(next_media),
            ..Staged::default()
        })?;
        self.remove_payloads(&payloads);

        if self.active_trip_id.as_deref() == Some(id) {
            // Open drops a dangling active id, so a failed clear is only logged.
            if let Err(e) = self.backend.set_pref(ACTIVE_TRIP_KEY, None) {
                warn!("Could not clear active trip {}: {}", id, e);
            }
            self.active_trip_id = None;
            self.emit(StoreEvent::ActiveTripChanged);
        }

        debug!(
            id,
            cards = swept.len(),
            media = unreferenced.len(),
            "Deleted trip"
        );
        Ok(())
    }

    // --- Active trip ---

    pub fn active_trip_id(&self) -> Option<&str> {
        self.active_trip_id.as_deref()
    }

    pub fn active_trip(&self) -> Option<&Trip> {
        self.active_trip_id.as_deref().and_then(|id| self.trip(id))
    }

    pub fn set_active_trip(&mut self, id: Option<&str>) -> Result<()> {
        if let Some(id) = id {
            if self.trip(id).is_none() {
                return Err(TokiError::not_found(EntityKind::Trip, id));
            }
        }
        self.backend.set_pref(ACTIVE_TRIP_KEY, id)?;
        self.active_trip_id = id.map(str::to_string);
        self.emit(StoreEvent::ActiveTripChanged);
        Ok(())
    }

    // --- Maintenance ---

    /// Verify and fix consistency issues.
    pub fn doctor(&mut self) -> Result<DoctorReport> {
        let mut report = DoctorReport::default();

        let trip_ids: HashSet<&str> = self.trips.iter().map(|t| t.id.as_str()).collect();
        let cards: Vec<Card> = self
            .cards
            .iter()
            .filter(|c| trip_ids.contains(c.trip_id.as_str()))
            .cloned()
            .collect();
        report.dangling_cards = self.cards.len() - cards.len();

        let media: Vec<Media> = self
            .media
            .iter()
            .filter(|m| self.backend.blob_exists(&m.filename()))
            .cloned()
            .collect();
        report.missing_payloads = self.media.len() - media.len();

        self.commit(Staged {
            cards: (report.dangling_cards > 0).then_some(cards),
            media: (report.missing_payloads > 0).then_some(media),
            ..Staged::default()
        })?;

        report.orphaned_media = self.orphaned_media().len();
        debug!(?report, "Doctor finished");
        Ok(report)
    }

    /// Merge foreign records in one commit (used by bundle import).
    /// Places and media must already be filtered to ids not present locally.
    pub(crate) fn merge_import(
        &mut self,
        places: Vec<Place>,
        media: Vec<Media>,
        trip: Trip,
        cards: Vec<Card>,
    ) -> Result<()> {
        let next_places = (!places.is_empty()).then(|| {
            let mut next = self.places.clone();
            next.extend(places);
            next
        });
        let next_media = (!media.is_empty()).then(|| {
            let mut next = self.media.clone();
            next.extend(media);
            next
        });

        let mut next_trips = self.trips.clone();
        next_trips.push(trip);
        let mut next_cards = self.cards.clone();
        next_cards.extend(cards);

        self.commit(Staged {
            trips: Some(next_trips),
            places: next_places,
            cards: Some(next_cards),
            media: next_media,
        })
    }

    pub(crate) fn is_media_referenced(&self, media_id: &str) -> bool {
        media_referenced(media_id, &self.cards, &self.trips)
    }
}

fn save_staged<B: StorageBackend, T: Serialize>(
    backend: &B,
    collection: Collection,
    next: &Option<Vec<T>>,
) -> Option<Result<()>> {
    next.as_ref().map(|records| backend.save(collection, records))
}

/// True if any card or trip cover points at `media_id`.
pub(crate) fn media_referenced(media_id: &str, cards: &[Card], trips: &[Trip]) -> bool {
    cards.iter().any(|c| c.media_id.as_deref() == Some(media_id))
        || trips
            .iter()
            .any(|t| t.cover_media_id.as_deref() == Some(media_id))
}

fn load_or_empty<B: StorageBackend, T: DeserializeOwned>(
    backend: &B,
    collection: Collection,
) -> Vec<T> {
    match backend.load(collection) {
        Ok(Some(records)) => records,
        Ok(None) => {
            debug!("{} not present, starting empty", collection.filename());
            Vec::new()
        }
        Err(e) => {
            warn!(
                "{} is unreadable, starting empty: {}",
                collection.filename(),
                e
            );
            Vec::new()
        }
    }
}
